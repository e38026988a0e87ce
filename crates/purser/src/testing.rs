//! Test fixtures: an engine wired to the in-memory mock ledger and the JSON
//! binding provider.

use std::sync::Arc;

use purser_binding::JsonBindingProvider;
use purser_ledger::mock::MockLedger;
use purser_ledger::{ActorId, Keypair, Signer};

use crate::{Configuration, ContractConfiguration, Engine, SponsorConfiguration};

/// Interface of the traffic-light contract used across the test-suites.
pub const TRAFFIC_LIGHT_INTERFACE: &str = r#"{
    "TrafficLight": {
        "commands": ["Green", "Red", "Yellow"],
        "queries": ["TrafficLight"],
        "events": ["Changed"]
    }
}"#;

/// Address the traffic-light contract is registered under.
pub const TRAFFIC_LIGHT_ADDRESS: &str = "0x4d9f20b2d1a8cf6c1f1e2f7a9b3c5d7e0a1b2c3d4e5f60718293a4b5c6d7e8f9";

/// Mnemonic the default sponsor is derived from.
pub const SPONSOR_MNEMONIC: &str = "cradle velvet cabin orbit sudden matrix";

pub struct TestEnvironment {
    pub engine: Engine,
    pub ledger: Arc<MockLedger>,
}

impl TestEnvironment {
    /// Engine with the traffic-light contract registered and a sponsor
    /// configured.
    pub async fn new() -> Self {
        Self::with_configuration(Configuration {
            contracts: Self::traffic_light_contracts(),
            sponsor: Some(SponsorConfiguration {
                name: "sponsor".to_string(),
                mnemonic: SPONSOR_MNEMONIC.to_string(),
            }),
            ..Configuration::default()
        })
        .await
    }

    /// Engine with the traffic-light contract registered but no sponsor.
    pub async fn without_sponsor() -> Self {
        Self::with_configuration(Configuration {
            contracts: Self::traffic_light_contracts(),
            ..Configuration::default()
        })
        .await
    }

    /// Engine with no contracts and no sponsor.
    pub async fn empty() -> Self {
        Self::with_configuration(Configuration::default()).await
    }

    /// Engine over a fresh mock ledger with the given configuration.
    pub async fn with_configuration(configuration: Configuration) -> Self {
        let ledger = Arc::new(MockLedger::new());
        let engine = Engine::new(configuration, ledger.clone(), Arc::new(JsonBindingProvider::new()))
            .await
            .expect("test engine initialization failed");

        Self { engine, ledger }
    }

    pub fn contract_address() -> ActorId {
        TRAFFIC_LIGHT_ADDRESS.parse().expect("invalid test address")
    }

    fn traffic_light_contracts() -> Vec<ContractConfiguration> {
        vec![ContractConfiguration {
            name: "traffic_light".to_string(),
            address: Self::contract_address(),
            interface: TRAFFIC_LIGHT_INTERFACE.to_string(),
        }]
    }

    /// Fresh keypair on the mock ledger.
    pub async fn user(&self, name: &str) -> Keypair {
        self.engine.create_keypair(name).await.expect("keypair generation failed")
    }

    /// Fresh keypair wrapped as a direct signer.
    pub async fn signer(&self, name: &str) -> Signer {
        Signer::pair(self.user(name).await)
    }
}
