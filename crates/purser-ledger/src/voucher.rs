use serde::{Deserialize, Serialize};

use crate::types::{ActorId, BlockHash, VoucherId};

/// On-chain state of a sponsorship voucher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherDetails {
    pub owner: ActorId,
    /// Contract addresses the voucher may pay fees for.
    pub programs: Vec<ActorId>,
    /// Remaining balance in smallest units.
    pub balance: u128,
    pub expiry_block: u32,
}

/// Mutation applied to an existing voucher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoucherUpdate {
    /// Number of blocks the expiry is extended by.
    pub prolong_blocks: Option<u32>,
    /// Balance added, in smallest units.
    pub top_up: Option<u128>,
}

impl VoucherUpdate {
    pub fn prolong(blocks: u32) -> Self {
        Self {
            prolong_blocks: Some(blocks),
            ..Self::default()
        }
    }

    pub fn top_up(amount: u128) -> Self {
        Self {
            top_up: Some(amount),
            ..Self::default()
        }
    }
}

/// Unsigned voucher operation built by the ledger, waiting for the sponsor's
/// signature.
#[derive(Clone, Debug)]
pub struct VoucherExtrinsic {
    pub owner: ActorId,
    pub operation: VoucherOperation,
}

#[derive(Clone, Debug)]
pub enum VoucherOperation {
    Issue {
        voucher: VoucherId,
        programs: Vec<ActorId>,
        /// Initial balance in smallest units.
        balance: u128,
        duration_blocks: u32,
    },
    Update {
        voucher: VoucherId,
        update: VoucherUpdate,
    },
}

/// Inclusion status reported while a signed extrinsic makes its way on chain.
/// Only `Finalized` is terminal success; the other statuses are intermediate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxStatus {
    Ready,
    Broadcast,
    InBlock(BlockHash),
    Finalized(BlockHash),
    Invalid(String),
}
