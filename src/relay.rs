//! The gasless transfer relay pipeline.
//!
//! A transfer goes through validation, chain and token resolution, fee computation, signature
//! verification, replay protection, pre-flight checks and gas estimation before it is submitted.
//! Every step before submission can reject the transfer without any on-chain write.

use crate::{
    chains::{ChainProfile, ChainRef, ChainRegistry, TokenProfile},
    contract::GaslessContract,
    error::{ChainError, RelayError, TransferError},
    estimation::GasEstimator,
    nonce::ReplayGuard,
    pricing::{FeeBreakdown, FeeCalculator},
    signature::SignatureVerifier,
    transactions::{TransactionSubmitter, TransferLifecycle, TransferState, unix_now},
    types::{
        FeeEstimateRequest, FeeEstimateResponse, RelayOutcome, RelayReceipt, ResolvedTransfer,
        TransferIntent,
    },
};
use alloy::primitives::{Address, ChainId, U256};
use std::{collections::HashMap, sync::Arc};
use tracing::{Instrument, debug, info, info_span, warn};

/// Components of a [`Relay`].
#[derive(Debug)]
struct RelayInner {
    /// Supported chains.
    chains: ChainRegistry,
    /// Relayer contract per chain.
    contracts: HashMap<ChainId, Arc<dyn GaslessContract>>,
    /// Fee calculator.
    fees: FeeCalculator,
    /// Signature verifier.
    verifier: SignatureVerifier,
    /// Replay guard.
    replay: ReplayGuard,
    /// Gas estimator.
    gas: GasEstimator,
    /// Transaction submitter.
    submitter: TransactionSubmitter,
}

/// Relays signed transfers.
#[derive(Debug, Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

impl Relay {
    /// Creates a new relay.
    pub fn new(
        chains: ChainRegistry,
        contracts: HashMap<ChainId, Arc<dyn GaslessContract>>,
        fees: FeeCalculator,
        replay: ReplayGuard,
        gas: GasEstimator,
        submitter: TransactionSubmitter,
    ) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                chains,
                contracts,
                fees,
                verifier: SignatureVerifier,
                replay,
                gas,
                submitter,
            }),
        }
    }

    /// Returns the supported chains.
    pub fn chains(&self) -> &ChainRegistry {
        &self.inner.chains
    }

    /// Returns the replay guard.
    pub fn replay_guard(&self) -> &ReplayGuard {
        &self.inner.replay
    }

    /// Returns the relayer contract of `chain`.
    fn contract(&self, chain: &ChainProfile) -> Result<Arc<dyn GaslessContract>, ChainError> {
        chain.contract()?;
        self.inner
            .contracts
            .get(&chain.chain_id)
            .cloned()
            .ok_or_else(|| ChainError::misconfigured(chain.chain_id, "no provider for chain"))
    }

    /// Relays a transfer and waits for its confirmation.
    pub async fn relay(&self, chain: ChainRef, intent: TransferIntent) -> RelayOutcome {
        let span = info_span!("relay", %chain, from = %intent.from, nonce = %intent.nonce);
        let result = self.try_relay(&chain, intent).instrument(span).await;
        if let Err(err) = &result {
            warn!(%chain, kind = %err.kind(), %err, "Transfer rejected");
        }
        result.into()
    }

    async fn try_relay(
        &self,
        chain: &ChainRef,
        intent: TransferIntent,
    ) -> Result<RelayReceipt, RelayError> {
        intent.validate(unix_now())?;

        let (chain, token) = self.inner.chains.resolve_token(chain, &intent.token_symbol)?;
        let contract = self.contract(&chain)?;

        let mut lifecycle =
            TransferLifecycle::new(format!("{}:{}:{}", chain.chain_id, intent.from, intent.nonce));
        let result = self.process(&chain, token, contract, intent, &mut lifecycle).await;
        if result.is_err() {
            lifecycle.reject();
            if lifecycle.state() == TransferState::Rejected {
                self.inner.submitter.record_rejected(chain.chain_id);
            }
        }
        result
    }

    async fn process(
        &self,
        chain: &ChainProfile,
        token: TokenProfile,
        contract: Arc<dyn GaslessContract>,
        intent: TransferIntent,
        lifecycle: &mut TransferLifecycle,
    ) -> Result<RelayReceipt, RelayError> {
        if intent.permit.is_some() && !contract.supports_permit(token.address).await? {
            return Err(TransferError::PermitUnsupported(token.address).into());
        }

        let resolved = self.authorize(chain, token, intent).await?;
        let request = resolved.request();
        let relayer_fee = resolved.relayer_fee;
        lifecycle.advance(TransferState::SignatureOk).map_err(eyre::Report::new)?;

        let reservation = self
            .inner
            .replay
            .check_and_reserve(contract.as_ref(), chain.chain_id, request.from, request.nonce)
            .await?;
        lifecycle.advance(TransferState::NonceOk).map_err(eyre::Report::new)?;

        let call = resolved.call();
        self.inner.submitter.preflight(contract.as_ref(), &call).await?;

        let gas = self.inner.gas.estimate(chain, contract.as_ref(), &call).await?;
        lifecycle.advance(TransferState::GasEstimated).map_err(eyre::Report::new)?;

        let receipt = self
            .inner
            .submitter
            .submit(chain.chain_id, contract, call, gas, reservation, lifecycle)
            .await?;

        info!(
            chain_id = chain.chain_id,
            tx_hash = %receipt.tx_hash,
            fee = %relayer_fee,
            token = %resolved.token.symbol,
            "Relayed transfer"
        );
        Ok(RelayReceipt {
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            fee: relayer_fee,
            explorer_url: chain.explorer_url(receipt.tx_hash),
        })
    }

    /// Computes the fee of `intent` and verifies that its sender signed it.
    async fn authorize(
        &self,
        chain: &ChainProfile,
        token: TokenProfile,
        intent: TransferIntent,
    ) -> Result<ResolvedTransfer, RelayError> {
        let fee = self.inner.fees.compute_fee(chain, &token, intent.amount).await;
        let relayer_fee = signed_fee(&fee, intent.relayer_fee)?;

        let resolved = ResolvedTransfer {
            chain_id: chain.chain_id,
            contract: chain.contract()?,
            token,
            fee,
            relayer_fee,
            resolved_nonce: intent.nonce,
            expiration_deadline: intent.deadline,
            intent,
        };
        let signature = &resolved.intent.signature;
        self.inner.verifier.verify(chain, resolved.contract, &resolved.request(), signature)?;
        Ok(resolved)
    }

    /// Relays a batch of transfers.
    ///
    /// The batch is bounded, then every intent is validated, priced and verified like a single
    /// transfer. Valid batches are refused by the submitter with [`TransferError::NotImplemented`].
    pub async fn relay_batch(
        &self,
        chain: ChainRef,
        intents: Vec<TransferIntent>,
    ) -> Result<Vec<RelayOutcome>, RelayError> {
        self.inner.submitter.check_batch_size(intents.len())?;

        let now = unix_now();
        let chain = self.inner.chains.resolve(&chain)?;
        self.contract(&chain)?;

        let mut calls = Vec::with_capacity(intents.len());
        for intent in intents {
            intent.validate(now)?;
            let token = chain.token(&intent.token_symbol)?.clone();
            calls.push(self.authorize(&chain, token, intent).await?.call());
        }
        debug!(chain_id = chain.chain_id, count = calls.len(), "Authorized batch");

        match self.inner.submitter.submit_batch(&calls)? {}
    }

    /// Estimates the relayer fee of a transfer.
    pub async fn estimate_fee(
        &self,
        request: FeeEstimateRequest,
    ) -> Result<FeeEstimateResponse, RelayError> {
        if request.amount.is_zero() {
            return Err(TransferError::validation("amount must be positive").into());
        }
        let (chain, token) =
            self.inner.chains.resolve_token(&request.chain_id, &request.token_symbol)?;
        let fee = self.inner.fees.compute_fee(&chain, &token, request.amount).await;

        Ok(FeeEstimateResponse {
            success: true,
            fee: fee.fee,
            fee_usd: fee.fee_usd,
            max_fee: fee.max_fee_allowed,
            degraded: fee.degraded,
        })
    }

    /// Returns the nonce the next transfer of `user` on `chain` must carry.
    pub async fn current_nonce(&self, chain: ChainRef, user: Address) -> Result<U256, RelayError> {
        let chain = self.inner.chains.resolve(&chain)?;
        Ok(self.contract(&chain)?.current_nonce(user).await?)
    }
}

/// Returns the fee to charge: the fee signed by the user if it is within bounds, otherwise the
/// computed fee.
fn signed_fee(fee: &FeeBreakdown, signed: Option<U256>) -> Result<U256, TransferError> {
    let Some(signed) = signed else { return Ok(fee.fee) };
    if signed < fee.fee {
        return Err(TransferError::validation(format!(
            "relayer fee {signed} is below the required fee {}",
            fee.fee
        )));
    }
    if signed > fee.max_fee_allowed {
        return Err(TransferError::validation(format!(
            "relayer fee {signed} exceeds the maximum fee {}",
            fee.max_fee_allowed
        )));
    }
    Ok(signed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakdown() -> FeeBreakdown {
        FeeBreakdown {
            percentage_fee: U256::from(2500),
            min_fee_tokens: Some(U256::from(100_000)),
            max_fee_allowed: U256::from(100_000),
            fee: U256::from(100_000),
            usd_price: Some(1.0),
            fee_usd: Some(0.1),
            degraded: false,
        }
    }

    #[test]
    fn signed_fee_must_be_within_bounds() {
        assert_eq!(signed_fee(&breakdown(), None).unwrap(), U256::from(100_000));
        assert_eq!(
            signed_fee(&breakdown(), Some(U256::from(100_000))).unwrap(),
            U256::from(100_000)
        );
        assert!(signed_fee(&breakdown(), Some(U256::from(99_999))).is_err());
        assert!(signed_fee(&breakdown(), Some(U256::from(100_001))).is_err());
    }
}
