//! Binding provider boundary.
//!
//! A binding provider turns an interface description into the structured
//! table of services, methods and events the engine validates calls against.
//! The grammar of the description is the provider's concern; the engine only
//! consumes the parsed [`InterfaceSpec`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod json;
pub use json::JsonBindingProvider;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed interface: {0}")]
    Malformed(String),
}

/// Kind of a service method: state-changing command or read-only query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    Command,
    Query,
}

/// Methods and events declared by one service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    methods: IndexMap<String, MethodKind>,
    events: Vec<String>,
}

impl ServiceSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, name: impl Into<String>) -> Self {
        self.methods.insert(name.into(), MethodKind::Command);
        self
    }

    pub fn with_query(mut self, name: impl Into<String>) -> Self {
        self.methods.insert(name.into(), MethodKind::Query);
        self
    }

    pub fn with_event(mut self, name: impl Into<String>) -> Self {
        self.events.push(name.into());
        self
    }

    /// Kind of the method declared under `name`, if any.
    pub fn method(&self, name: &str) -> Option<MethodKind> {
        self.methods.get(name).copied()
    }

    /// Names of the methods of `kind`, in declaration order.
    pub fn methods_of(&self, kind: MethodKind) -> Vec<&str> {
        self.methods
            .iter()
            .filter(|(_, method)| **method == kind)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn commands(&self) -> Vec<&str> {
        self.methods_of(MethodKind::Command)
    }

    pub fn queries(&self) -> Vec<&str> {
        self.methods_of(MethodKind::Query)
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.events.iter().any(|event| event == name)
    }
}

/// Parsed interface of one contract: service name to declared methods and
/// events, in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceSpec {
    services: IndexMap<String, ServiceSpec>,
}

impl InterfaceSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(mut self, name: impl Into<String>, service: ServiceSpec) -> Self {
        self.services.insert(name.into(), service);
        self
    }

    pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.get(name)
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Binding provider collaborator: parses interface text into an
/// [`InterfaceSpec`].
pub trait BindingProvider: Send + Sync {
    fn parse(&self, interface: &str) -> Result<InterfaceSpec, ParseError>;
}
