use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LedgerError;

/// Smallest-unit factor of one native token.
pub const UNIT: u128 = 1_000_000_000_000;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name([u8; 32]);

        impl $name {
            /// The all-zero identifier.
            pub const ZERO: Self = Self([0u8; 32]);

            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = LedgerError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let digits = value.strip_prefix("0x").unwrap_or(value);
                let bytes = hex::decode(digits).map_err(|_| LedgerError::InvalidIdentifier(value.to_string()))?;
                let bytes: [u8; 32] = bytes.try_into().map_err(|_| LedgerError::InvalidIdentifier(value.to_string()))?;

                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                value.parse().map_err(D::Error::custom)
            }
        }
    };
}

id_type! {
    /// Address of an account or contract on the chain.
    ActorId
}

id_type! {
    /// Identifier of a message dispatched to a contract.
    MessageId
}

id_type! {
    /// Hash of a chain block.
    BlockHash
}

id_type! {
    /// Hash of a submitted transaction.
    TxHash
}

id_type! {
    /// Identifier of a sponsorship voucher.
    VoucherId
}

#[cfg(test)]
mod tests {
    use crate::{ActorId, LedgerError};

    const ADDRESS: &str = "0x68b29f22ab41b49a48b968eb1066b4b04129c79d7cd7f0a56e0bd1a1ee7ce736";

    #[test]
    fn parse_and_display_roundtrip() {
        let address: ActorId = ADDRESS.parse().unwrap();
        assert_eq!(address.to_string(), ADDRESS);
    }

    #[test]
    fn parse_accepts_unprefixed_hex() {
        let address: ActorId = ADDRESS.trim_start_matches("0x").parse().unwrap();
        assert_eq!(address.to_string(), ADDRESS);
    }

    #[test]
    fn parse_rejects_wrong_width() {
        let result = "0xab".parse::<ActorId>();
        assert!(matches!(result, Err(LedgerError::InvalidIdentifier(_))));
    }

    #[test]
    fn serde_uses_the_string_form() {
        let address: ActorId = ADDRESS.parse().unwrap();
        let encoded = serde_json::to_string(&address).unwrap();
        assert_eq!(encoded, format!("\"{ADDRESS}\""));

        let decoded: ActorId = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, address);
    }

    #[test]
    fn zero_address_is_all_zeroes() {
        assert_eq!(ActorId::ZERO.as_bytes(), &[0u8; 32]);
    }
}
