use futures::StreamExt;
use purser_ledger::{ActorId, TxStatus, VoucherExtrinsic, VoucherId, VoucherUpdate, UNIT};
use tracing::{instrument, trace};

use crate::callback::{dispatch, Callbacks, Phase};
use crate::registry::VoucherTarget;
use crate::{Engine, Error};

/// Chain-level minimum duration of a voucher, enforced client-side to fail
/// fast.
pub const MIN_VOUCHER_DURATION_BLOCKS: u32 = 20;

/// Minimum number of tokens a voucher is issued with.
pub const MIN_VOUCHER_TOKENS: u128 = 1;

/// Options for issuing a new sponsorship voucher. Token amounts are given in
/// whole tokens and scaled to smallest units at the ledger boundary.
pub struct IssueVoucherRequest {
    pub(crate) owner: ActorId,
    pub(crate) tokens: u128,
    pub(crate) duration_blocks: u32,
    pub(crate) target: VoucherTarget,
    pub(crate) callbacks: Option<Callbacks>,
}

impl IssueVoucherRequest {
    pub fn new(owner: ActorId, tokens: u128, duration_blocks: u32) -> Self {
        Self {
            owner,
            tokens,
            duration_blocks,
            target: VoucherTarget::Default,
            callbacks: None,
        }
    }

    /// Contracts the voucher may pay fees for.
    pub fn with_target(mut self, target: VoucherTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = Some(callbacks);
        self
    }
}

/// Options for extending the expiry of an existing voucher.
pub struct RenewVoucherRequest {
    pub(crate) owner: ActorId,
    pub(crate) voucher: VoucherId,
    pub(crate) blocks: u32,
    pub(crate) callbacks: Option<Callbacks>,
}

impl RenewVoucherRequest {
    pub fn new(owner: ActorId, voucher: VoucherId, blocks: u32) -> Self {
        Self {
            owner,
            voucher,
            blocks,
            callbacks: None,
        }
    }

    pub fn with_callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = Some(callbacks);
        self
    }
}

/// Options for adding tokens to an existing voucher.
pub struct TopUpVoucherRequest {
    pub(crate) owner: ActorId,
    pub(crate) voucher: VoucherId,
    pub(crate) tokens: u128,
    pub(crate) callbacks: Option<Callbacks>,
}

impl TopUpVoucherRequest {
    pub fn new(owner: ActorId, voucher: VoucherId, tokens: u128) -> Self {
        Self {
            owner,
            voucher,
            tokens,
            callbacks: None,
        }
    }

    pub fn with_callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = Some(callbacks);
        self
    }
}

impl Engine {
    /// Issue a new voucher for `request.owner`, paid for and signed by the
    /// configured sponsor. Resolves with the new voucher id.
    #[instrument(name = "create_voucher", skip(self, request), fields(owner = %request.owner))]
    pub async fn create_voucher(&self, request: IssueVoucherRequest) -> Result<VoucherId, Error> {
        let IssueVoucherRequest {
            owner,
            tokens,
            duration_blocks,
            target,
            callbacks,
        } = request;

        let programs = self.registry.resolve_addresses(&target)?;

        if self.sponsor.read().await.is_none() {
            return Err(Error::NoVoucherSigner);
        }
        if tokens < MIN_VOUCHER_TOKENS {
            return Err(Error::TokensBelowMinimum {
                given: tokens,
                minimum: MIN_VOUCHER_TOKENS,
            });
        }
        if duration_blocks < MIN_VOUCHER_DURATION_BLOCKS {
            return Err(Error::BlocksBelowMinimum {
                given: duration_blocks,
                minimum: MIN_VOUCHER_DURATION_BLOCKS,
            });
        }

        let (voucher, extrinsic) = self
            .ledger
            .issue_voucher(owner, &programs, tokens * UNIT, duration_blocks)
            .await
            .map_err(|error| Error::SigningFailed(error.to_string()))?;

        self.sign_voucher_extrinsic(extrinsic, callbacks.as_ref()).await?;

        Ok(voucher)
    }

    /// Extend the expiry of `request.voucher` by `request.blocks` blocks.
    #[instrument(name = "renew_voucher", skip(self, request), fields(voucher = %request.voucher))]
    pub async fn renew_voucher(&self, request: RenewVoucherRequest) -> Result<(), Error> {
        let RenewVoucherRequest {
            owner,
            voucher,
            blocks,
            callbacks,
        } = request;

        if blocks < MIN_VOUCHER_DURATION_BLOCKS {
            return Err(Error::BlocksBelowMinimum {
                given: blocks,
                minimum: MIN_VOUCHER_DURATION_BLOCKS,
            });
        }

        let update = VoucherUpdate::prolong(blocks);
        let extrinsic = self
            .ledger
            .update_voucher(owner, voucher, &update)
            .await
            .map_err(|error| Error::SigningFailed(error.to_string()))?;

        self.sign_voucher_extrinsic(extrinsic, callbacks.as_ref()).await
    }

    /// Add `request.tokens` whole tokens to the balance of `request.voucher`.
    #[instrument(name = "top_up_voucher", skip(self, request), fields(voucher = %request.voucher))]
    pub async fn top_up_voucher(&self, request: TopUpVoucherRequest) -> Result<(), Error> {
        let TopUpVoucherRequest {
            owner,
            voucher,
            tokens,
            callbacks,
        } = request;

        if tokens == 0 {
            return Err(Error::TokensBelowMinimum {
                given: tokens,
                minimum: MIN_VOUCHER_TOKENS,
            });
        }

        let update = VoucherUpdate::top_up(tokens * UNIT);
        let extrinsic = self
            .ledger
            .update_voucher(owner, voucher, &update)
            .await
            .map_err(|error| Error::SigningFailed(error.to_string()))?;

        self.sign_voucher_extrinsic(extrinsic, callbacks.as_ref()).await
    }

    /// Remaining balance of `voucher` in whole tokens.
    #[instrument(name = "voucher_balance", skip(self))]
    pub async fn voucher_balance(&self, voucher: VoucherId) -> Result<u128, Error> {
        let balance = self
            .ledger
            .voucher_balance(voucher)
            .await
            .map_err(|error| Error::QueryFailed(error.to_string()))?;

        Ok(balance / UNIT)
    }

    /// Whether `voucher` has expired relative to the latest finalized block.
    /// Expiry is observed, not enforced: the voucher stays on chain.
    #[instrument(name = "voucher_is_expired", skip(self))]
    pub async fn voucher_is_expired(&self, owner: ActorId, voucher: VoucherId) -> Result<bool, Error> {
        let details = self
            .ledger
            .voucher_details(owner, voucher)
            .await
            .map_err(|error| Error::QueryFailed(error.to_string()))?;
        let current = self
            .ledger
            .finalized_block_number()
            .await
            .map_err(|error| Error::QueryFailed(error.to_string()))?;

        Ok(current > details.expiry_block)
    }

    /// Ids of the vouchers owned by `owner` on the contracts `target`
    /// resolves to.
    #[instrument(name = "vouchers_for_account", skip(self, target))]
    pub async fn vouchers_for_account(&self, owner: ActorId, target: VoucherTarget) -> Result<Vec<VoucherId>, Error> {
        let programs = self.registry.resolve_addresses(&target)?;

        let mut vouchers = Vec::new();
        for program in programs {
            let found = self
                .ledger
                .vouchers_for_account(owner, program)
                .await
                .map_err(|error| Error::QueryFailed(error.to_string()))?;

            for voucher in found {
                if !vouchers.contains(&voucher) {
                    vouchers.push(voucher);
                }
            }
        }

        Ok(vouchers)
    }

    /// Sign `extrinsic` with the configured sponsor and drive it to
    /// finalization. Only the finalized status is terminal success;
    /// intermediate statuses are observed at trace level.
    async fn sign_voucher_extrinsic(&self, extrinsic: VoucherExtrinsic, callbacks: Option<&Callbacks>) -> Result<(), Error> {
        let sponsor = self.sponsor.read().await.clone().ok_or(Error::NoVoucherSigner)?;

        dispatch(callbacks, Phase::Load, None).await;

        let mut statuses = match self.ledger.submit_voucher(&extrinsic, &sponsor).await {
            Ok(statuses) => statuses,
            Err(error) => {
                dispatch(callbacks, Phase::Error, None).await;
                return Err(Error::SigningFailed(error.to_string()));
            },
        };

        while let Some(status) = statuses.next().await {
            match status {
                TxStatus::Finalized(block) => {
                    trace!(block = %block, "voucher extrinsic finalized");
                    dispatch(callbacks, Phase::Success, None).await;
                    return Ok(());
                },
                TxStatus::Invalid(reason) => {
                    dispatch(callbacks, Phase::Error, None).await;
                    return Err(Error::SigningFailed(reason));
                },
                status => trace!(?status, "voucher extrinsic status"),
            }
        }

        dispatch(callbacks, Phase::Error, None).await;
        Err(Error::SigningFailed("status stream ended before finalization".to_string()))
    }
}
