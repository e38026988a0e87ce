//! In-memory [`Ledger`] used by the test-suites. State mutations follow the
//! real semantics: voucher operations only take effect once their extrinsic
//! reports `Finalized`, and event listeners are plain channels fed by
//! [`MockLedger::emit`].

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{self, StreamExt};
use rand::Rng;
use serde_json::Value;

use crate::{
    ActorId, BlockHash, ContractCall, Dispatch, EventStream, Keypair, Ledger, LedgerError, LockedKeypair, MessageId, Signer, StatusStream,
    TxHash, TxStatus, VoucherDetails, VoucherExtrinsic, VoucherId, VoucherOperation, VoucherUpdate,
};

/// Gas returned by [`MockLedger::estimate_gas`] before overhead is applied.
pub const BASE_GAS: u64 = 100_000_000;

/// Record of a call accepted by [`MockLedger::send`].
#[derive(Clone, Debug)]
pub struct SentCall {
    pub call: ContractCall,
    pub signer: ActorId,
}

/// Record of a read issued through [`MockLedger::read_state`].
#[derive(Clone, Debug)]
pub struct StateRead {
    pub program: ActorId,
    pub service: String,
    pub method: String,
    pub origin: ActorId,
    pub args: Vec<Value>,
}

#[derive(Default)]
struct State {
    connected: bool,
    finalized_block: u32,

    replies: HashMap<(String, String), Value>,
    states: HashMap<(String, String), Value>,
    dispatched: HashMap<MessageId, (String, String)>,

    vouchers: HashMap<VoucherId, VoucherDetails>,

    sent: Vec<SentCall>,
    reads: Vec<StateRead>,
    estimates: Vec<u64>,

    fail_next_send: Option<String>,
    fail_next_read: Option<String>,
    fail_next_submission: Option<String>,

    listeners: HashMap<(ActorId, String, String), Vec<mpsc::UnboundedSender<Value>>>,
}

#[derive(Default)]
pub struct MockLedger {
    state: Mutex<State>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply returned for commands addressed to `service`/`method`.
    pub fn set_reply(&self, service: &str, method: &str, value: Value) {
        self.lock().replies.insert((service.to_string(), method.to_string()), value);
    }

    /// State returned for queries addressed to `service`/`method`.
    pub fn set_state(&self, service: &str, method: &str, value: Value) {
        self.lock().states.insert((service.to_string(), method.to_string()), value);
    }

    pub fn set_finalized_block(&self, number: u32) {
        self.lock().finalized_block = number;
    }

    pub fn fail_next_send(&self, message: &str) {
        self.lock().fail_next_send = Some(message.to_string());
    }

    pub fn fail_next_read(&self, message: &str) {
        self.lock().fail_next_read = Some(message.to_string());
    }

    pub fn fail_next_submission(&self, message: &str) {
        self.lock().fail_next_submission = Some(message.to_string());
    }

    /// Deliver an event payload to every open listener on
    /// `program`/`service`/`event`.
    pub fn emit(&self, program: ActorId, service: &str, event: &str, payload: Value) {
        let mut state = self.lock();
        if let Some(senders) = state.listeners.get_mut(&(program, service.to_string(), event.to_string())) {
            senders.retain(|sender| sender.unbounded_send(payload.clone()).is_ok());
        }
    }

    pub fn sent(&self) -> Vec<SentCall> {
        self.lock().sent.clone()
    }

    pub fn reads(&self) -> Vec<StateRead> {
        self.lock().reads.clone()
    }

    /// Overhead percentages passed to `estimate_gas`, in call order.
    pub fn estimates(&self) -> Vec<u64> {
        self.lock().estimates.clone()
    }

    pub fn voucher(&self, voucher: VoucherId) -> Option<VoucherDetails> {
        self.lock().vouchers.get(&voucher).cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("mock ledger state poisoned")
    }

    fn random_id() -> [u8; 32] {
        rand::rng().random()
    }

    fn keypair_from_seed(name: &str, seed: [u8; 32]) -> Keypair {
        Keypair::new(name, ActorId::new(digest(&seed)), seed)
    }
}

// FNV-style mixing, wide enough to derive stable mock identities
fn digest(input: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut acc: u64 = 0xcbf2_9ce4_8422_2325;

    for (index, byte) in input.iter().enumerate() {
        acc = (acc ^ u64::from(*byte)).wrapping_mul(0x100_0000_01b3);
        out[index % 32] ^= (acc >> 24) as u8;
    }
    for slot in out.iter_mut() {
        acc = acc.wrapping_mul(0x100_0000_01b3).wrapping_add(0x9e37_79b9);
        *slot ^= (acc >> 32) as u8;
    }

    out
}

#[async_trait]
impl Ledger for MockLedger {
    async fn connect(&self, _endpoint: &str) -> Result<(), LedgerError> {
        self.lock().connected = true;
        Ok(())
    }

    async fn disconnect(&self) {
        self.lock().connected = false;
    }

    async fn finalized_block_number(&self) -> Result<u32, LedgerError> {
        Ok(self.lock().finalized_block)
    }

    async fn estimate_gas(&self, _origin: ActorId, _call: &ContractCall, overhead_percent: u64) -> Result<u64, LedgerError> {
        self.lock().estimates.push(overhead_percent);
        Ok(BASE_GAS + BASE_GAS * overhead_percent / 100)
    }

    async fn send(&self, call: &ContractCall, signer: &Signer) -> Result<Dispatch, LedgerError> {
        let mut state = self.lock();
        if let Some(message) = state.fail_next_send.take() {
            return Err(LedgerError::Execution(message));
        }

        let dispatch = Dispatch {
            message_id: MessageId::new(Self::random_id()),
            transaction_hash: TxHash::new(Self::random_id()),
            block_hash: BlockHash::new(Self::random_id()),
        };

        state.sent.push(SentCall {
            call: call.clone(),
            signer: signer.address(),
        });
        state.dispatched.insert(dispatch.message_id, (call.service.clone(), call.method.clone()));

        Ok(dispatch)
    }

    async fn reply(&self, dispatch: &Dispatch) -> Result<Value, LedgerError> {
        let state = self.lock();
        let key = state
            .dispatched
            .get(&dispatch.message_id)
            .ok_or_else(|| LedgerError::Execution(format!("unknown message {}", dispatch.message_id)))?;

        Ok(state.replies.get(key).cloned().unwrap_or(Value::Null))
    }

    async fn read_state(
        &self,
        program: ActorId,
        service: &str,
        method: &str,
        origin: ActorId,
        _value: Option<u128>,
        _at_block: Option<BlockHash>,
        args: &[Value],
    ) -> Result<Value, LedgerError> {
        let mut state = self.lock();
        if let Some(message) = state.fail_next_read.take() {
            return Err(LedgerError::Execution(message));
        }

        state.reads.push(StateRead {
            program,
            service: service.to_string(),
            method: method.to_string(),
            origin,
            args: args.to_vec(),
        });

        Ok(state
            .states
            .get(&(service.to_string(), method.to_string()))
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn issue_voucher(
        &self,
        owner: ActorId,
        programs: &[ActorId],
        balance: u128,
        duration_blocks: u32,
    ) -> Result<(VoucherId, VoucherExtrinsic), LedgerError> {
        let voucher = VoucherId::new(Self::random_id());

        let extrinsic = VoucherExtrinsic {
            owner,
            operation: VoucherOperation::Issue {
                voucher,
                programs: programs.to_vec(),
                balance,
                duration_blocks,
            },
        };

        Ok((voucher, extrinsic))
    }

    async fn update_voucher(&self, owner: ActorId, voucher: VoucherId, update: &VoucherUpdate) -> Result<VoucherExtrinsic, LedgerError> {
        if !self.lock().vouchers.contains_key(&voucher) {
            return Err(LedgerError::VoucherNotFound(voucher));
        }

        Ok(VoucherExtrinsic {
            owner,
            operation: VoucherOperation::Update { voucher, update: *update },
        })
    }

    async fn submit_voucher(&self, extrinsic: &VoucherExtrinsic, _sponsor: &Keypair) -> Result<StatusStream, LedgerError> {
        let mut state = self.lock();
        if let Some(message) = state.fail_next_submission.take() {
            return Err(LedgerError::Execution(message));
        }

        match &extrinsic.operation {
            VoucherOperation::Issue {
                voucher,
                programs,
                balance,
                duration_blocks,
            } => {
                let expiry_block = state.finalized_block + duration_blocks;
                state.vouchers.insert(
                    *voucher,
                    VoucherDetails {
                        owner: extrinsic.owner,
                        programs: programs.clone(),
                        balance: *balance,
                        expiry_block,
                    },
                );
            },
            VoucherOperation::Update { voucher, update } => {
                let details = state.vouchers.get_mut(voucher).ok_or(LedgerError::VoucherNotFound(*voucher))?;
                if let Some(blocks) = update.prolong_blocks {
                    details.expiry_block += blocks;
                }
                if let Some(amount) = update.top_up {
                    details.balance += amount;
                }
            },
        }

        let block = BlockHash::new(Self::random_id());
        let statuses = [TxStatus::Ready, TxStatus::Broadcast, TxStatus::InBlock(block), TxStatus::Finalized(block)];

        Ok(stream::iter(statuses).boxed())
    }

    async fn voucher_details(&self, _owner: ActorId, voucher: VoucherId) -> Result<VoucherDetails, LedgerError> {
        self.lock().vouchers.get(&voucher).cloned().ok_or(LedgerError::VoucherNotFound(voucher))
    }

    async fn voucher_balance(&self, voucher: VoucherId) -> Result<u128, LedgerError> {
        self.lock()
            .vouchers
            .get(&voucher)
            .map(|details| details.balance)
            .ok_or(LedgerError::VoucherNotFound(voucher))
    }

    async fn vouchers_for_account(&self, owner: ActorId, program: ActorId) -> Result<Vec<VoucherId>, LedgerError> {
        Ok(self
            .lock()
            .vouchers
            .iter()
            .filter(|(_, details)| details.owner == owner && details.programs.contains(&program))
            .map(|(voucher, _)| *voucher)
            .collect())
    }

    async fn subscribe_events(&self, program: ActorId, service: &str, event: &str) -> Result<EventStream, LedgerError> {
        let (sender, receiver) = mpsc::unbounded();

        self.lock()
            .listeners
            .entry((program, service.to_string(), event.to_string()))
            .or_default()
            .push(sender);

        Ok(receiver.boxed())
    }

    async fn derive_keypair(&self, mnemonic: &str, name: &str) -> Result<Keypair, LedgerError> {
        if mnemonic.trim().is_empty() {
            return Err(LedgerError::Keyring("empty mnemonic".to_string()));
        }

        Ok(Self::keypair_from_seed(name, digest(mnemonic.as_bytes())))
    }

    async fn generate_keypair(&self, name: &str) -> Result<Keypair, LedgerError> {
        Ok(Self::keypair_from_seed(name, Self::random_id()))
    }

    fn lock_keypair(&self, pair: &Keypair, password: &str) -> Result<LockedKeypair, LedgerError> {
        let mask = digest(password.as_bytes());
        let ciphertext: Vec<u8> = pair.seed().iter().zip(mask).map(|(byte, mask)| byte ^ mask).collect();

        Ok(LockedKeypair::new(pair.address(), Value::String(hex::encode(ciphertext)), pair.name()))
    }

    fn unlock_keypair(&self, locked: &LockedKeypair, password: &str) -> Result<Keypair, LedgerError> {
        let ciphertext = locked
            .encoded
            .as_str()
            .and_then(|encoded| hex::decode(encoded).ok())
            .ok_or_else(|| LedgerError::Keyring("malformed encoded payload".to_string()))?;

        let seed: Vec<u8> = ciphertext.iter().zip(digest(password.as_bytes())).map(|(byte, mask)| byte ^ mask).collect();
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| LedgerError::Keyring("malformed encoded payload".to_string()))?;

        let name = locked.meta.get("name").and_then(Value::as_str).unwrap_or("unlocked");
        let pair = Self::keypair_from_seed(name, seed);

        if pair.address() != locked.address {
            return Err(LedgerError::Keyring("wrong password".to_string()));
        }

        Ok(pair)
    }
}
