use thiserror::Error;

use crate::types::VoucherId;

/// Errors surfaced by [`Ledger`](crate::Ledger) implementations.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("voucher {0} not found")]
    VoucherNotFound(VoucherId),

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),
}
