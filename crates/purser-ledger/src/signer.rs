use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::keyring::Keypair;
use crate::types::ActorId;

/// Signing callback provided by an external wallet or browser extension.
#[async_trait]
pub trait ExternalSigner: Send + Sync {
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, LedgerError>;
}

/// Credential a command is signed with: a key pair held by the caller, or an
/// address whose signatures are produced externally.
#[derive(Clone)]
pub enum Signer {
    Pair(Keypair),
    Delegated {
        address: ActorId,
        signer: Arc<dyn ExternalSigner>,
    },
}

impl Signer {
    pub fn pair(keypair: Keypair) -> Self {
        Self::Pair(keypair)
    }

    pub fn delegated(address: ActorId, signer: Arc<dyn ExternalSigner>) -> Self {
        Self::Delegated { address, signer }
    }

    /// Address the signed call originates from.
    pub fn address(&self) -> ActorId {
        match self {
            Self::Pair(pair) => pair.address(),
            Self::Delegated { address, .. } => *address,
        }
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pair(pair) => f.debug_tuple("Pair").field(pair).finish(),
            Self::Delegated { address, .. } => f
                .debug_struct("Delegated")
                .field("address", address)
                .finish_non_exhaustive(),
        }
    }
}
