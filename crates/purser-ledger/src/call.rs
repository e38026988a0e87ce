use serde_json::Value;

use crate::types::{ActorId, BlockHash, MessageId, TxHash, VoucherId};

/// A state-changing call addressed to one service method of a contract.
/// Gas, voucher and value attachments are optional and applied through the
/// builder methods before submission.
#[derive(Clone, Debug)]
pub struct ContractCall {
    pub destination: ActorId,
    pub service: String,
    pub method: String,
    pub args: Vec<Value>,

    pub gas_limit: Option<u64>,
    pub voucher: Option<VoucherId>,
    pub value: u128,
}

impl ContractCall {
    pub fn new(destination: ActorId, service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            destination,
            service: service.into(),
            method: method.into(),
            args: Vec::new(),
            gas_limit: None,
            voucher: None,
            value: 0,
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_gas(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// Charge the fees of this call to `voucher` instead of the signer.
    pub fn with_voucher(mut self, voucher: VoucherId) -> Self {
        self.voucher = Some(voucher);
        self
    }

    /// Native token amount transferred along with the call.
    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }
}

/// Transport metadata of a call accepted into a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dispatch {
    pub message_id: MessageId,
    pub transaction_hash: TxHash,
    pub block_hash: BlockHash,
}
