//! Ledger RPC client boundary.
//!
//! The engine talks to the chain exclusively through the [`Ledger`] trait:
//! extrinsic submission, gas estimation, voucher primitives, block and
//! balance queries, event streams and keyring operations. Applications plug
//! in the client of their chain; the `testing` feature ships an in-memory
//! [`mock::MockLedger`] for test-suites.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use tracing::instrument;

mod call;
pub use call::{ContractCall, Dispatch};

mod error;
pub use error::LedgerError;

mod keyring;
pub use keyring::{Keypair, LockedKeypair};

mod signer;
pub use signer::{ExternalSigner, Signer};

mod types;
pub use types::{ActorId, BlockHash, MessageId, TxHash, VoucherId, UNIT};

mod voucher;
pub use voucher::{TxStatus, VoucherDetails, VoucherExtrinsic, VoucherOperation, VoucherUpdate};

#[cfg(feature = "testing")]
pub mod mock;

/// Stream of decoded event payloads for one contract/service/event listener.
pub type EventStream = BoxStream<'static, Value>;

/// Stream of inclusion statuses for a signed voucher extrinsic.
pub type StatusStream = BoxStream<'static, TxStatus>;

macro_rules! log_if_error {
    ($e: expr) => {
        match $e {
            Ok(v) => Ok(v),
            Err(error) => {
                tracing::warn!(message=%error);
                Err(error)
            }
        }
    };
}

/// Chain client collaborator. Implementations own the wire protocol, the
/// signing algorithm and payload codecs; the engine only relies on the
/// semantics documented per method.
#[async_trait]
pub trait Ledger: Send + Sync + 'static {
    /// Open the connection against `endpoint`.
    async fn connect(&self, endpoint: &str) -> Result<(), LedgerError>;

    /// Tear the connection down. Idempotent.
    async fn disconnect(&self);

    /// Number of the most recent finalized block.
    async fn finalized_block_number(&self) -> Result<u32, LedgerError>;

    /// Estimate the gas consumed by `call` issued from `origin`, with
    /// `overhead_percent` percent added on top of the raw estimate.
    async fn estimate_gas(&self, origin: ActorId, call: &ContractCall, overhead_percent: u64) -> Result<u64, LedgerError>;

    /// Sign `call` with `signer` and submit it, resolving once the message is
    /// included in a block.
    async fn send(&self, call: &ContractCall, signer: &Signer) -> Result<Dispatch, LedgerError>;

    /// Await and decode the service reply to a dispatched call.
    async fn reply(&self, dispatch: &Dispatch) -> Result<Value, LedgerError>;

    /// Execute a read-only method against `program`. The reserved `value` and
    /// `at_block` slots precede the method arguments on the wire; callers
    /// that have no use for them pass `None`.
    #[allow(clippy::too_many_arguments)]
    async fn read_state(
        &self,
        program: ActorId,
        service: &str,
        method: &str,
        origin: ActorId,
        value: Option<u128>,
        at_block: Option<BlockHash>,
        args: &[Value],
    ) -> Result<Value, LedgerError>;

    /// Build an unsigned issue operation, allocating the voucher id.
    async fn issue_voucher(
        &self,
        owner: ActorId,
        programs: &[ActorId],
        balance: u128,
        duration_blocks: u32,
    ) -> Result<(VoucherId, VoucherExtrinsic), LedgerError>;

    /// Build an unsigned update operation against an existing voucher.
    async fn update_voucher(&self, owner: ActorId, voucher: VoucherId, update: &VoucherUpdate) -> Result<VoucherExtrinsic, LedgerError>;

    /// Sign `extrinsic` with `sponsor` and submit it, reporting inclusion
    /// statuses until the stream ends.
    async fn submit_voucher(&self, extrinsic: &VoucherExtrinsic, sponsor: &Keypair) -> Result<StatusStream, LedgerError>;

    async fn voucher_details(&self, owner: ActorId, voucher: VoucherId) -> Result<VoucherDetails, LedgerError>;

    /// Remaining voucher balance in smallest units.
    async fn voucher_balance(&self, voucher: VoucherId) -> Result<u128, LedgerError>;

    /// Ids of the vouchers owned by `owner` and bound to `program`.
    async fn vouchers_for_account(&self, owner: ActorId, program: ActorId) -> Result<Vec<VoucherId>, LedgerError>;

    /// Open a listener on `event` emitted by `service` of `program`.
    async fn subscribe_events(&self, program: ActorId, service: &str, event: &str) -> Result<EventStream, LedgerError>;

    async fn derive_keypair(&self, mnemonic: &str, name: &str) -> Result<Keypair, LedgerError>;

    async fn generate_keypair(&self, name: &str) -> Result<Keypair, LedgerError>;

    fn lock_keypair(&self, pair: &Keypair, password: &str) -> Result<LockedKeypair, LedgerError>;

    fn unlock_keypair(&self, locked: &LockedKeypair, password: &str) -> Result<Keypair, LedgerError>;
}

/// Instrumented facade over a [`Ledger`] implementation. Every call is traced
/// and failures are logged before they propagate.
#[derive(Clone)]
pub struct Client {
    inner: Arc<dyn Ledger>,
}

impl Client {
    pub fn new(provider: Arc<dyn Ledger>) -> Self {
        Self { inner: provider }
    }

    #[instrument(name = "connect", skip(self))]
    pub async fn connect(&self, endpoint: &str) -> Result<(), LedgerError> {
        log_if_error!(self.inner.connect(endpoint).await)
    }

    pub async fn disconnect(&self) {
        self.inner.disconnect().await
    }

    #[instrument(name = "finalized_block_number", skip(self))]
    pub async fn finalized_block_number(&self) -> Result<u32, LedgerError> {
        log_if_error!(self.inner.finalized_block_number().await)
    }

    #[instrument(name = "estimate_gas", skip(self, call), fields(service = %call.service, method = %call.method))]
    pub async fn estimate_gas(&self, origin: ActorId, call: &ContractCall, overhead_percent: u64) -> Result<u64, LedgerError> {
        log_if_error!(self.inner.estimate_gas(origin, call, overhead_percent).await)
    }

    #[instrument(name = "send", skip(self, call, signer), fields(destination = %call.destination, service = %call.service, method = %call.method))]
    pub async fn send(&self, call: &ContractCall, signer: &Signer) -> Result<Dispatch, LedgerError> {
        log_if_error!(self.inner.send(call, signer).await)
    }

    #[instrument(name = "reply", skip(self, dispatch), fields(message_id = %dispatch.message_id))]
    pub async fn reply(&self, dispatch: &Dispatch) -> Result<Value, LedgerError> {
        log_if_error!(self.inner.reply(dispatch).await)
    }

    #[instrument(name = "read_state", skip(self, args, value, at_block))]
    #[allow(clippy::too_many_arguments)]
    pub async fn read_state(
        &self,
        program: ActorId,
        service: &str,
        method: &str,
        origin: ActorId,
        value: Option<u128>,
        at_block: Option<BlockHash>,
        args: &[Value],
    ) -> Result<Value, LedgerError> {
        log_if_error!(self.inner.read_state(program, service, method, origin, value, at_block, args).await)
    }

    #[instrument(name = "issue_voucher", skip(self, programs))]
    pub async fn issue_voucher(
        &self,
        owner: ActorId,
        programs: &[ActorId],
        balance: u128,
        duration_blocks: u32,
    ) -> Result<(VoucherId, VoucherExtrinsic), LedgerError> {
        log_if_error!(self.inner.issue_voucher(owner, programs, balance, duration_blocks).await)
    }

    #[instrument(name = "update_voucher", skip(self, update))]
    pub async fn update_voucher(&self, owner: ActorId, voucher: VoucherId, update: &VoucherUpdate) -> Result<VoucherExtrinsic, LedgerError> {
        log_if_error!(self.inner.update_voucher(owner, voucher, update).await)
    }

    #[instrument(name = "submit_voucher", skip(self, extrinsic, sponsor), fields(owner = %extrinsic.owner))]
    pub async fn submit_voucher(&self, extrinsic: &VoucherExtrinsic, sponsor: &Keypair) -> Result<StatusStream, LedgerError> {
        log_if_error!(self.inner.submit_voucher(extrinsic, sponsor).await)
    }

    #[instrument(name = "voucher_details", skip(self))]
    pub async fn voucher_details(&self, owner: ActorId, voucher: VoucherId) -> Result<VoucherDetails, LedgerError> {
        log_if_error!(self.inner.voucher_details(owner, voucher).await)
    }

    #[instrument(name = "voucher_balance", skip(self))]
    pub async fn voucher_balance(&self, voucher: VoucherId) -> Result<u128, LedgerError> {
        log_if_error!(self.inner.voucher_balance(voucher).await)
    }

    #[instrument(name = "vouchers_for_account", skip(self))]
    pub async fn vouchers_for_account(&self, owner: ActorId, program: ActorId) -> Result<Vec<VoucherId>, LedgerError> {
        log_if_error!(self.inner.vouchers_for_account(owner, program).await)
    }

    #[instrument(name = "subscribe_events", skip(self))]
    pub async fn subscribe_events(&self, program: ActorId, service: &str, event: &str) -> Result<EventStream, LedgerError> {
        log_if_error!(self.inner.subscribe_events(program, service, event).await)
    }

    #[instrument(name = "derive_keypair", skip(self, mnemonic))]
    pub async fn derive_keypair(&self, mnemonic: &str, name: &str) -> Result<Keypair, LedgerError> {
        log_if_error!(self.inner.derive_keypair(mnemonic, name).await)
    }

    #[instrument(name = "generate_keypair", skip(self))]
    pub async fn generate_keypair(&self, name: &str) -> Result<Keypair, LedgerError> {
        log_if_error!(self.inner.generate_keypair(name).await)
    }

    pub fn lock_keypair(&self, pair: &Keypair, password: &str) -> Result<LockedKeypair, LedgerError> {
        log_if_error!(self.inner.lock_keypair(pair, password))
    }

    pub fn unlock_keypair(&self, locked: &LockedKeypair, password: &str) -> Result<Keypair, LedgerError> {
        log_if_error!(self.inner.unlock_keypair(locked, password))
    }
}
