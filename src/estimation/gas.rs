use crate::{
    cache::TtlCache,
    chains::{ChainProfile, GasPolicy},
    constants::{BPS_DENOMINATOR, GAS_PRICE_TTL},
    contract::GaslessContract,
    error::TransferError,
    transactions::TransferCall,
};
use alloy::{eips::eip1559::Eip1559Estimation, primitives::ChainId};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

/// Gas parameters of a relayer transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    /// Gas limit.
    pub gas_limit: u64,
    /// Max fee per gas, in wei.
    pub max_fee_per_gas: u128,
    /// Max priority fee per gas, in wei.
    pub max_priority_fee_per_gas: u128,
}

/// Applies the buffer multiplier to simulated gas usage, rounding up, capped at the gas limit of
/// the policy.
pub fn buffered_gas_limit(raw: u64, policy: &GasPolicy) -> u64 {
    let multiplier_bps = (policy.buffer_multiplier * BPS_DENOMINATOR as f64).round() as u128;
    let buffered = (raw as u128 * multiplier_bps).div_ceil(BPS_DENOMINATOR as u128);
    buffered.min(policy.gas_limit as u128) as u64
}

/// Clamps a fee estimate to the gas price ceiling of the policy.
pub fn clamp_fees(estimate: Eip1559Estimation, policy: &GasPolicy) -> Eip1559Estimation {
    let max_fee_per_gas = policy
        .max_gas_price
        .map_or(estimate.max_fee_per_gas, |ceiling| estimate.max_fee_per_gas.min(ceiling));
    Eip1559Estimation {
        max_fee_per_gas,
        max_priority_fee_per_gas: estimate.max_priority_fee_per_gas.min(max_fee_per_gas),
    }
}

/// Estimates gas limits and fees, caching network fee estimates per chain.
#[derive(Debug, Clone)]
pub struct GasEstimator {
    prices: Arc<TtlCache<ChainId, Eip1559Estimation, TransferError>>,
}

impl Default for GasEstimator {
    fn default() -> Self {
        Self::new(GAS_PRICE_TTL)
    }
}

impl GasEstimator {
    /// Creates an estimator that caches fee estimates for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self { prices: Arc::new(TtlCache::new("gas_price", ttl)) }
    }

    /// Estimates the gas parameters of `call` on `chain`.
    ///
    /// A simulation that reverts is returned as an error, since the transaction would revert
    /// on-chain. Any other simulation failure falls back to the gas limit of the policy.
    pub async fn estimate(
        &self,
        chain: &ChainProfile,
        contract: &dyn GaslessContract,
        call: &TransferCall,
    ) -> Result<GasEstimate, TransferError> {
        let policy = &chain.gas_policy;
        let gas_limit = match contract.estimate_gas(call).await {
            Ok(raw) => buffered_gas_limit(raw, policy),
            Err(err @ TransferError::Reverted(_)) => return Err(err),
            Err(err) => {
                let chain_id = chain.chain_id;
                warn!(chain_id, %err, "Gas estimation failed, using gas limit cap");
                policy.gas_limit
            }
        };

        let fees = self.fees(chain, contract).await;
        let estimate = GasEstimate {
            gas_limit,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
        };
        debug!(chain_id = chain.chain_id, ?estimate, "Estimated gas");
        Ok(estimate)
    }

    /// Returns the fee estimate of `chain`.
    ///
    /// Served from cache while fresh, otherwise fetched from the network. Falls back to the static
    /// fees of the policy if the network is unavailable.
    pub async fn fees(
        &self,
        chain: &ChainProfile,
        contract: &dyn GaslessContract,
    ) -> Eip1559Estimation {
        let policy = &chain.gas_policy;
        let estimate = match self
            .prices
            .get_or_refresh(&chain.chain_id, || contract.fee_estimate())
            .await
        {
            Ok((cached, _)) => cached.value,
            Err(err) => {
                warn!(chain_id = chain.chain_id, %err, "Fee estimation failed, using static fees");
                Eip1559Estimation {
                    max_fee_per_gas: policy.max_fee_per_gas,
                    max_priority_fee_per_gas: policy.max_priority_fee_per_gas,
                }
            }
        };
        clamp_fees(estimate, policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chains::tests::sepolia,
        contract::mock::MockContract,
        error::ErrorKind,
        types::TransferRequest,
    };
    use alloy::primitives::Bytes;
    use std::sync::atomic::Ordering;

    fn policy() -> GasPolicy {
        sepolia().gas_settings
    }

    fn chain() -> ChainProfile {
        ChainProfile::from_config(sepolia()).unwrap()
    }

    fn call() -> TransferCall {
        TransferCall::Standard { request: TransferRequest::default(), signature: Bytes::new() }
    }

    #[test]
    fn applies_buffer_and_cap() {
        let mut policy = policy();
        assert_eq!(buffered_gas_limit(100_000, &policy), 120_000);
        assert_eq!(buffered_gas_limit(100_001, &policy), 120_002);

        policy.gas_limit = 110_000;
        assert_eq!(buffered_gas_limit(100_000, &policy), 110_000);
    }

    #[test]
    fn clamps_to_max_gas_price() {
        let mut policy = policy();
        policy.max_gas_price = Some(10);
        let clamped = clamp_fees(
            Eip1559Estimation { max_fee_per_gas: 50, max_priority_fee_per_gas: 20 },
            &policy,
        );
        assert_eq!(clamped.max_fee_per_gas, 10);
        assert_eq!(clamped.max_priority_fee_per_gas, 10);
    }

    #[tokio::test]
    async fn caches_network_fees_per_chain() {
        let contract = MockContract {
            gas_used: Some(100_000),
            fees: Some(Eip1559Estimation { max_fee_per_gas: 7, max_priority_fee_per_gas: 1 }),
            ..Default::default()
        };
        let estimator = GasEstimator::default();

        let first = estimator.estimate(&chain(), &contract, &call()).await.unwrap();
        let second = estimator.estimate(&chain(), &contract, &call()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first,
            GasEstimate { gas_limit: 120_000, max_fee_per_gas: 7, max_priority_fee_per_gas: 1 }
        );
        assert_eq!(contract.fee_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn falls_back_to_static_policy() {
        let contract = MockContract::default();
        let estimate =
            GasEstimator::default().estimate(&chain(), &contract, &call()).await.unwrap();

        let policy = policy();
        assert_eq!(
            estimate,
            GasEstimate {
                gas_limit: policy.gas_limit,
                max_fee_per_gas: policy.max_fee_per_gas,
                max_priority_fee_per_gas: policy.max_priority_fee_per_gas,
            }
        );
    }

    #[tokio::test]
    async fn reverting_simulation_is_an_error() {
        let contract = MockContract {
            revert: Some("ERC20: insufficient allowance".to_string()),
            ..Default::default()
        };
        let err = GasEstimator::default().estimate(&chain(), &contract, &call()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientAllowance);
    }
}
