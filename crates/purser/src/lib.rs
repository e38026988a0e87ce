//! Client-side orchestration layer between application code and a contract
//! chain.
//!
//! The [`Engine`] resolves which contract/service/method an invocation is
//! addressed to, negotiates gas and value parameters, binds signer and
//! sponsorship credentials, drives the ordered callback lifecycle around each
//! invocation, and manages sponsorship vouchers and on-chain event
//! subscriptions. The chain itself sits behind the
//! [`purser_ledger::Ledger`] collaborator; interface parsing behind
//! [`purser_binding::BindingProvider`].

use std::collections::HashMap;
use std::sync::Arc;

use purser_binding::BindingProvider;
use purser_ledger::{ActorId, Client as LedgerClient, Keypair, Ledger, LockedKeypair};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

mod callback;
pub use callback::{Callbacks, Phase};

mod error;
pub use error::Error;

mod invocation;
pub use invocation::{CommandRequest, CommandResponse, GasPolicy, QueryRequest, DEFAULT_GAS_OVERHEAD_PERCENT};

mod registry;
pub use registry::{CallTarget, ContractBinding, ContractRegistry, VoucherTarget};

mod subscription;
pub use subscription::{SubscribeRequest, Subscription};

mod voucher;
pub use voucher::{IssueVoucherRequest, RenewVoucherRequest, TopUpVoucherRequest, MIN_VOUCHER_DURATION_BLOCKS, MIN_VOUCHER_TOKENS};

#[cfg(feature = "testing")]
pub mod testing;

/// Engine configuration: the ledger endpoint, the contracts registered at
/// construction and the optional sponsor credentials vouchers are signed
/// with.
#[derive(Clone, Debug, Deserialize)]
pub struct Configuration {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub contracts: Vec<ContractConfiguration>,

    #[serde(default)]
    pub sponsor: Option<SponsorConfiguration>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            contracts: Vec::new(),
            sponsor: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ContractConfiguration {
    pub name: String,
    pub address: ActorId,
    /// Interface text, handed to the binding provider.
    pub interface: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SponsorConfiguration {
    pub name: String,
    pub mnemonic: String,
}

fn default_endpoint() -> String {
    "ws://127.0.0.1:9944".to_string()
}

/// The orchestration engine. Cheap to clone; clones share the registry, the
/// sponsor reference and the listener store.
#[derive(Clone)]
pub struct Engine {
    ledger: LedgerClient,
    bindings: Arc<dyn BindingProvider>,
    registry: Arc<ContractRegistry>,
    sponsor: Arc<RwLock<Option<Keypair>>>,
    listeners: subscription::ListenerStore,
}

impl Engine {
    /// Create an engine over `ledger` and `bindings`. Derives the sponsor
    /// keypair when credentials are configured, connects the ledger to the
    /// configured endpoint, then registers the configured contracts. A
    /// registration failure is fatal and tears the fresh connection down.
    pub async fn new(configuration: Configuration, ledger: Arc<dyn Ledger>, bindings: Arc<dyn BindingProvider>) -> Result<Self, Error> {
        let ledger = LedgerClient::new(ledger);

        let sponsor = match &configuration.sponsor {
            Some(credentials) => Some(
                ledger
                    .derive_keypair(&credentials.mnemonic, &credentials.name)
                    .await
                    .map_err(|error| Error::SponsorDerivation(error.to_string()))?,
            ),
            None => None,
        };

        ledger
            .connect(&configuration.endpoint)
            .await
            .map_err(|error| Error::Connection(error.to_string()))?;

        let registry = match Self::build_registry(&configuration, bindings.as_ref()) {
            Ok(registry) => registry,
            Err(error) => {
                ledger.disconnect().await;
                return Err(error);
            },
        };

        debug!(contracts = registry.len(), "engine initialized");

        Ok(Self {
            ledger,
            bindings,
            registry: Arc::new(registry),
            sponsor: Arc::new(RwLock::new(sponsor)),
            listeners: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn build_registry(configuration: &Configuration, bindings: &dyn BindingProvider) -> Result<ContractRegistry, Error> {
        let mut registry = ContractRegistry::new();
        for contract in &configuration.contracts {
            if contract.name.starts_with("0x") {
                return Err(Error::InvalidContractName(contract.name.clone()));
            }
            if contract.interface.trim().is_empty() {
                return Err(Error::EmptyInterface(contract.name.clone()));
            }

            let interface = bindings.parse(&contract.interface)?;
            registry.register(
                contract.name.clone(),
                ContractBinding {
                    name: Some(contract.name.clone()),
                    address: contract.address,
                    interface,
                },
            );
        }

        Ok(registry)
    }

    /// Replace the sponsor used to sign voucher operations. In-flight
    /// operations keep the sponsor they already captured; the last write
    /// wins.
    pub async fn set_voucher_sponsor(&self, mnemonic: &str, name: &str) -> Result<(), Error> {
        let sponsor = self
            .ledger
            .derive_keypair(mnemonic, name)
            .await
            .map_err(|error| Error::SponsorDerivation(error.to_string()))?;

        *self.sponsor.write().await = Some(sponsor);

        Ok(())
    }

    /// Binding registered under `name`, if any.
    pub fn contract(&self, name: &str) -> Option<Arc<ContractBinding>> {
        self.registry.get(name)
    }

    /// Number of registered contracts.
    pub fn contract_count(&self) -> usize {
        self.registry.len()
    }

    /// Generate a fresh keypair named `name`.
    pub async fn create_keypair(&self, name: &str) -> Result<Keypair, Error> {
        self.ledger.generate_keypair(name).await.map_err(|error| Error::Keyring(error.to_string()))
    }

    /// Derive a keypair from `mnemonic`.
    pub async fn derive_keypair(&self, mnemonic: &str, name: &str) -> Result<Keypair, Error> {
        self.ledger
            .derive_keypair(mnemonic, name)
            .await
            .map_err(|error| Error::Keyring(error.to_string()))
    }

    /// Lock `pair` under `password` for storage.
    pub fn lock_keypair(&self, pair: &Keypair, password: &str) -> Result<LockedKeypair, Error> {
        self.ledger.lock_keypair(pair, password).map_err(|error| Error::Keyring(error.to_string()))
    }

    /// Recover the keypair locked in `locked` with `password`.
    pub fn unlock_keypair(&self, locked: &LockedKeypair, password: &str) -> Result<Keypair, Error> {
        self.ledger
            .unlock_keypair(locked, password)
            .map_err(|error| Error::Keyring(error.to_string()))
    }

    /// Close every open listener and the ledger connection.
    pub async fn disconnect(&self) {
        self.unsubscribe_all().await;
        self.ledger.disconnect().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use purser_binding::JsonBindingProvider;
    use purser_ledger::mock::MockLedger;
    use purser_ledger::ActorId;

    use crate::testing::{TestEnvironment, TRAFFIC_LIGHT_INTERFACE};
    use crate::{Configuration, ContractConfiguration, Engine, Error, IssueVoucherRequest, SponsorConfiguration};

    fn contract(name: &str, interface: &str) -> ContractConfiguration {
        ContractConfiguration {
            name: name.to_string(),
            address: TestEnvironment::contract_address(),
            interface: interface.to_string(),
        }
    }

    async fn try_new(configuration: Configuration) -> (Result<Engine, Error>, Arc<MockLedger>) {
        let ledger = Arc::new(MockLedger::new());
        let result = Engine::new(configuration, ledger.clone(), Arc::new(JsonBindingProvider::new())).await;

        (result, ledger)
    }

    #[tokio::test]
    async fn address_prefixed_names_are_fatal_and_disconnect() {
        let configuration = Configuration {
            contracts: vec![contract("0xtraffic", TRAFFIC_LIGHT_INTERFACE)],
            ..Configuration::default()
        };

        let (result, ledger) = try_new(configuration).await;
        assert!(matches!(result, Err(Error::InvalidContractName(name)) if name == "0xtraffic"));
        assert!(!ledger.is_connected());
    }

    #[tokio::test]
    async fn empty_interfaces_are_fatal_and_disconnect() {
        let configuration = Configuration {
            contracts: vec![contract("traffic_light", "   ")],
            ..Configuration::default()
        };

        let (result, ledger) = try_new(configuration).await;
        assert!(matches!(result, Err(Error::EmptyInterface(name)) if name == "traffic_light"));
        assert!(!ledger.is_connected());
    }

    #[tokio::test]
    async fn unparsable_interfaces_are_fatal_and_disconnect() {
        let configuration = Configuration {
            contracts: vec![contract("traffic_light", "{broken")],
            ..Configuration::default()
        };

        let (result, ledger) = try_new(configuration).await;
        assert!(matches!(result, Err(Error::Binding(_))));
        assert!(!ledger.is_connected());
    }

    #[tokio::test]
    async fn sponsor_derivation_failure_rejects_construction() {
        let configuration = Configuration {
            sponsor: Some(SponsorConfiguration {
                name: "sponsor".to_string(),
                mnemonic: "   ".to_string(),
            }),
            ..Configuration::default()
        };

        let (result, ledger) = try_new(configuration).await;
        assert!(matches!(result, Err(Error::SponsorDerivation(_))));
        assert!(!ledger.is_connected());
    }

    #[tokio::test]
    async fn construction_registers_contracts_in_order() {
        let env = TestEnvironment::new().await;

        assert_eq!(env.engine.contract_count(), 1);
        let binding = env.engine.contract("traffic_light").unwrap();
        assert_eq!(binding.address, TestEnvironment::contract_address());
        assert_eq!(binding.service_names(), vec!["TrafficLight"]);
        assert!(env.ledger.is_connected());
    }

    #[tokio::test]
    async fn the_sponsor_setter_enables_voucher_signing() {
        let env = TestEnvironment::without_sponsor().await;
        let owner = ActorId::new([11; 32]);

        let result = env.engine.create_voucher(IssueVoucherRequest::new(owner, 3, 1_200)).await;
        assert!(matches!(result, Err(Error::NoVoucherSigner)));

        env.engine.set_voucher_sponsor("liability ticket sponsor words", "sponsor").await.unwrap();
        env.engine.create_voucher(IssueVoucherRequest::new(owner, 3, 1_200)).await.unwrap();
    }

    #[tokio::test]
    async fn disconnect_tears_down_listeners_and_the_connection() {
        let env = TestEnvironment::new().await;

        env.engine
            .subscribe(crate::SubscribeRequest::new("TrafficLight", "Changed", |_| async {}))
            .await
            .unwrap();
        assert_eq!(env.engine.listener_count().await, 1);

        env.engine.disconnect().await;

        assert_eq!(env.engine.listener_count().await, 0);
        assert!(!env.ledger.is_connected());
    }

    #[tokio::test]
    async fn configuration_deserializes_with_defaults() {
        let configuration: Configuration = serde_json::from_str("{}").unwrap();

        assert_eq!(configuration.endpoint, "ws://127.0.0.1:9944");
        assert!(configuration.contracts.is_empty());
        assert!(configuration.sponsor.is_none());
    }

    #[tokio::test]
    async fn keypair_roundtrip_through_the_engine() {
        let env = TestEnvironment::new().await;

        let pair = env.engine.create_keypair("session").await.unwrap();
        let locked = env.engine.lock_keypair(&pair, "secret").unwrap();
        let unlocked = env.engine.unlock_keypair(&locked, "secret").unwrap();

        assert_eq!(unlocked.address(), pair.address());
        assert!(env.engine.unlock_keypair(&locked, "other").is_err());
    }
}
