use indexmap::IndexMap;
use serde::Deserialize;

use crate::{BindingProvider, InterfaceSpec, ParseError, ServiceSpec};

#[derive(Deserialize)]
struct RawService {
    #[serde(default)]
    commands: Vec<String>,
    #[serde(default)]
    queries: Vec<String>,
    #[serde(default)]
    events: Vec<String>,
}

/// Reference binding provider over a JSON interface description of the form
/// `{"Service": {"commands": [...], "queries": [...], "events": [...]}}`.
/// Every section is optional.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonBindingProvider;

impl JsonBindingProvider {
    pub fn new() -> Self {
        Self
    }
}

impl BindingProvider for JsonBindingProvider {
    fn parse(&self, interface: &str) -> Result<InterfaceSpec, ParseError> {
        let raw: IndexMap<String, RawService> = serde_json::from_str(interface).map_err(|error| ParseError::Malformed(error.to_string()))?;

        let mut spec = InterfaceSpec::new();
        for (name, service) in raw {
            let mut table = ServiceSpec::new();
            for method in service.commands {
                table = table.with_command(method);
            }
            for method in service.queries {
                table = table.with_query(method);
            }
            for event in service.events {
                table = table.with_event(event);
            }

            spec = spec.with_service(name, table);
        }

        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use crate::{BindingProvider, JsonBindingProvider, MethodKind, ParseError};

    const INTERFACE: &str = r#"{
        "Vault": {
            "commands": ["Deposit", "Withdraw"],
            "queries": ["BalanceOf"],
            "events": ["Deposited"]
        },
        "Admin": {
            "commands": ["Pause"]
        }
    }"#;

    #[test]
    fn parses_services_in_declaration_order() {
        let spec = JsonBindingProvider::new().parse(INTERFACE).unwrap();
        assert_eq!(spec.service_names(), vec!["Vault", "Admin"]);
    }

    #[test]
    fn classifies_methods_by_kind() {
        let spec = JsonBindingProvider::new().parse(INTERFACE).unwrap();
        let vault = spec.service("Vault").unwrap();

        assert_eq!(vault.commands(), vec!["Deposit", "Withdraw"]);
        assert_eq!(vault.queries(), vec!["BalanceOf"]);
        assert_eq!(vault.method("Deposit"), Some(MethodKind::Command));
        assert_eq!(vault.method("BalanceOf"), Some(MethodKind::Query));
        assert_eq!(vault.method("Missing"), None);
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let spec = JsonBindingProvider::new().parse(INTERFACE).unwrap();
        let admin = spec.service("Admin").unwrap();

        assert!(admin.queries().is_empty());
        assert!(admin.events().is_empty());
    }

    #[test]
    fn events_are_exposed() {
        let spec = JsonBindingProvider::new().parse(INTERFACE).unwrap();
        let vault = spec.service("Vault").unwrap();

        assert!(vault.has_event("Deposited"));
        assert!(!vault.has_event("Withdrawn"));
    }

    #[test]
    fn malformed_interface_carries_the_parser_message() {
        let result = JsonBindingProvider::new().parse("not json at all");
        let ParseError::Malformed(message) = result.unwrap_err();

        assert!(!message.is_empty());
    }
}
