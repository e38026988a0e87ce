use std::sync::Arc;

use indexmap::IndexMap;
use purser_binding::{BindingProvider, InterfaceSpec};
use purser_ledger::ActorId;

use crate::Error;

/// A contract address paired with its parsed interface. `name` is `None` for
/// ad-hoc bindings built from inline targets.
#[derive(Clone, Debug)]
pub struct ContractBinding {
    pub name: Option<String>,
    pub address: ActorId,
    pub interface: InterfaceSpec,
}

impl ContractBinding {
    pub fn service_names(&self) -> Vec<String> {
        self.interface.service_names().into_iter().map(str::to_string).collect()
    }
}

/// Which contract an invocation is addressed to.
#[derive(Clone, Debug, Default)]
pub enum CallTarget {
    /// First registered contract. Deterministic but arbitrary; multi-contract
    /// setups should always pass an explicit target.
    #[default]
    Default,
    /// A contract registered under this name.
    Named(String),
    /// An unregistered contract given by address and interface text.
    Inline { address: ActorId, interface: String },
}

/// Which contracts a voucher is bound to.
#[derive(Clone, Debug, Default)]
pub enum VoucherTarget {
    /// First registered contract.
    #[default]
    Default,
    /// A contract registered under this name.
    Named(String),
    /// A single contract address.
    Address(ActorId),
    /// An explicit address list.
    Addresses(Vec<ActorId>),
}

/// Named contract bindings created at engine construction, read-only
/// afterwards. Iteration order is registration order.
#[derive(Debug, Default)]
pub struct ContractRegistry {
    contracts: IndexMap<String, Arc<ContractBinding>>,
}

impl ContractRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&mut self, name: String, binding: ContractBinding) {
        self.contracts.insert(name, Arc::new(binding));
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ContractBinding>> {
        self.contracts.get(name).cloned()
    }

    pub fn first(&self) -> Option<Arc<ContractBinding>> {
        self.contracts.values().next().cloned()
    }

    /// Resolve `target` to a usable binding. Inline targets are parsed into a
    /// transient binding that is not retained.
    pub fn resolve(&self, target: &CallTarget, bindings: &dyn BindingProvider) -> Result<Arc<ContractBinding>, Error> {
        match target {
            CallTarget::Default => self.first().ok_or(Error::NoContractsStored),
            CallTarget::Named(name) => self.get(name).ok_or_else(|| Error::UnknownContract(name.clone())),
            CallTarget::Inline { address, interface } => {
                let interface = bindings.parse(interface)?;

                Ok(Arc::new(ContractBinding {
                    name: None,
                    address: *address,
                    interface,
                }))
            },
        }
    }

    /// Resolve `target` to the contract addresses a voucher should cover.
    pub fn resolve_addresses(&self, target: &VoucherTarget) -> Result<Vec<ActorId>, Error> {
        match target {
            VoucherTarget::Default => self.first().map(|binding| vec![binding.address]).ok_or(Error::NoContractsStored),
            VoucherTarget::Named(name) => self
                .get(name)
                .map(|binding| vec![binding.address])
                .ok_or_else(|| Error::UnknownContract(name.clone())),
            VoucherTarget::Address(address) => Ok(vec![*address]),
            VoucherTarget::Addresses(addresses) => Ok(addresses.clone()),
        }
    }
}
