use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::LedgerError;
use crate::types::ActorId;

/// An unlocked signing account. The seed is only readable by [`Ledger`](crate::Ledger)
/// implementations, which own the signing algorithm.
#[derive(Clone, PartialEq, Eq)]
pub struct Keypair {
    name: String,
    address: ActorId,
    seed: [u8; 32],
}

impl Keypair {
    pub fn new(name: impl Into<String>, address: ActorId, seed: [u8; 32]) -> Self {
        Self {
            name: name.into(),
            address,
            seed,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> ActorId {
        self.address
    }

    pub fn seed(&self) -> &[u8; 32] {
        &self.seed
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Password-encrypted form of a [`Keypair`], safe to persist or to hand to a
/// contract for storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LockedKeypair {
    pub address: ActorId,
    /// Ciphertext produced by the ledger's keyring.
    pub encoded: Value,
    /// Cipher and content descriptors of the ciphertext.
    pub encoding: Value,
    pub meta: Value,
}

impl LockedKeypair {
    pub fn new(address: ActorId, encoded: Value, name: &str) -> Self {
        Self {
            address,
            encoded,
            encoding: Self::default_encoding(),
            meta: json!({ "name": name }),
        }
    }

    fn default_encoding() -> Value {
        json!({
            "content": ["pkcs8", "ed25519"],
            "type": ["scrypt", "xsalsa20-poly1305"],
            "version": "3"
        })
    }

    /// Strip the encoding and meta envelopes, leaving only what contract
    /// state stores.
    pub fn into_contract_form(self) -> Value {
        json!({
            "address": self.address,
            "encoded": self.encoded
        })
    }

    /// Rebuild a locked keypair from its contract-state form, restoring the
    /// envelopes so it can be unlocked again.
    pub fn from_contract_form(value: &Value, name: &str) -> Result<Self, LedgerError> {
        let address = value
            .get("address")
            .and_then(Value::as_str)
            .ok_or_else(|| LedgerError::Decode("missing address in contract keypair data".to_string()))?;
        let encoded = value
            .get("encoded")
            .cloned()
            .ok_or_else(|| LedgerError::Decode("missing encoded payload in contract keypair data".to_string()))?;

        Ok(Self::new(address.parse()?, encoded, name))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{ActorId, LockedKeypair};

    #[test]
    fn contract_form_roundtrip() {
        let locked = LockedKeypair::new(ActorId::ZERO, json!("a1b2c3"), "vault");

        let stored = locked.clone().into_contract_form();
        assert!(stored.get("encoding").is_none());
        assert!(stored.get("meta").is_none());

        let recovered = LockedKeypair::from_contract_form(&stored, "vault").unwrap();
        assert_eq!(recovered, locked);
    }

    #[test]
    fn contract_form_requires_the_payload() {
        let result = LockedKeypair::from_contract_form(&json!({ "address": ActorId::ZERO }), "vault");
        assert!(result.is_err());
    }
}
