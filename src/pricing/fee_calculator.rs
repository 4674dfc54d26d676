//! Relayer fee calculation.

use crate::{
    chains::{ChainProfile, FeePolicy, TokenProfile},
    constants::BPS_DENOMINATOR,
    price::PriceOracle,
};
use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How a relayer fee was derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    /// `amount * base_fee_bps / 10000`.
    pub percentage_fee: U256,
    /// The USD minimum fee in token units, `None` if no price was available.
    pub min_fee_tokens: Option<U256>,
    /// `amount * max_fee_bps / 10000`.
    pub max_fee_allowed: U256,
    /// The fee charged.
    pub fee: U256,
    /// USD price of the token used for the minimum fee.
    pub usd_price: Option<f64>,
    /// The fee valued in USD.
    pub fee_usd: Option<f64>,
    /// Whether the minimum fee was skipped because no price was available.
    pub degraded: bool,
}

/// Returns `floor(amount * bps / 10000)` without overflowing.
pub fn apply_bps(amount: U256, bps: u16) -> U256 {
    let denominator = U256::from(BPS_DENOMINATOR);
    let bps = U256::from(bps);
    (amount / denominator) * bps + (amount % denominator) * bps / denominator
}

/// Converts a USD value to token base units, rounding down.
fn usd_to_tokens(usd: f64, usd_price: f64, decimals: u8) -> Option<U256> {
    let tokens = (usd / usd_price * 10f64.powi(decimals as i32)).floor();
    if !tokens.is_finite() || tokens < 0.0 {
        return None;
    }
    if tokens >= u128::MAX as f64 {
        return Some(U256::from(u128::MAX));
    }
    Some(U256::from(tokens as u128))
}

/// Values token base units in USD.
fn tokens_to_usd(amount: U256, usd_price: f64, decimals: u8) -> f64 {
    amount.saturating_to::<u128>() as f64 / 10f64.powi(decimals as i32) * usd_price
}

/// Applies a fee policy to an amount.
///
/// `usd_price` is the USD price of one whole token. Without a price the minimum fee is skipped.
pub fn apply_policy(
    policy: &FeePolicy,
    amount: U256,
    decimals: u8,
    usd_price: Option<f64>,
) -> FeeBreakdown {
    let percentage_fee = apply_bps(amount, policy.base_fee_bps);
    let max_fee_allowed = apply_bps(amount, policy.max_fee_bps);
    let min_fee_tokens =
        usd_price.and_then(|price| usd_to_tokens(policy.min_fee_usd, price, decimals));

    let calculated = min_fee_tokens.map_or(percentage_fee, |min| percentage_fee.max(min));
    let fee = calculated.min(max_fee_allowed);

    FeeBreakdown {
        percentage_fee,
        min_fee_tokens,
        max_fee_allowed,
        fee,
        usd_price,
        fee_usd: usd_price.map(|price| tokens_to_usd(fee, price, decimals)),
        degraded: min_fee_tokens.is_none(),
    }
}

/// Computes relayer fees from chain fee policies and token prices.
#[derive(Debug, Clone)]
pub struct FeeCalculator {
    oracle: PriceOracle,
}

impl FeeCalculator {
    /// Creates a new fee calculator.
    pub const fn new(oracle: PriceOracle) -> Self {
        Self { oracle }
    }

    /// Returns the price oracle.
    pub const fn oracle(&self) -> &PriceOracle {
        &self.oracle
    }

    /// Computes the relayer fee of transferring `amount` of `token` on `chain`.
    ///
    /// If the token price is unavailable the fee falls back to the percentage fee, bounded by the
    /// maximum.
    pub async fn compute_fee(
        &self,
        chain: &ChainProfile,
        token: &TokenProfile,
        amount: U256,
    ) -> FeeBreakdown {
        let usd_price = match self.oracle.usd_price(&token.price_feed_id).await {
            Ok(quote) => Some(quote.usd_price),
            Err(err) => {
                warn!(
                    chain_id = chain.chain_id,
                    token = %token.symbol,
                    %err,
                    "Token price unavailable, skipping minimum fee"
                );
                None
            }
        };

        let breakdown = apply_policy(&chain.fee_policy, amount, token.decimals, usd_price);
        debug!(
            chain_id = chain.chain_id,
            token = %token.symbol,
            %amount,
            fee = %breakdown.fee,
            degraded = breakdown.degraded,
            "Computed relayer fee"
        );
        breakdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: FeePolicy = FeePolicy { base_fee_bps: 25, max_fee_bps: 1000, min_fee_usd: 0.10 };

    #[test]
    fn minimum_fee_applies_to_small_amounts() {
        let breakdown = apply_policy(&POLICY, U256::from(1_000_000), 6, Some(1.0));

        assert_eq!(breakdown.percentage_fee, U256::from(2500));
        assert_eq!(breakdown.min_fee_tokens, Some(U256::from(100_000)));
        assert_eq!(breakdown.max_fee_allowed, U256::from(100_000));
        assert_eq!(breakdown.fee, U256::from(100_000));
        assert!(!breakdown.degraded);
    }

    #[test]
    fn percentage_fee_applies_to_large_amounts() {
        let breakdown = apply_policy(&POLICY, U256::from(1_000_000_000_000u64), 6, Some(1.0));
        assert_eq!(breakdown.fee, U256::from(2_500_000_000u64));
        assert_eq!(breakdown.fee_usd, Some(2500.0));
    }

    #[test]
    fn fee_is_capped_at_maximum() {
        let breakdown = apply_policy(&POLICY, U256::from(10_000), 6, Some(1.0));
        assert_eq!(breakdown.min_fee_tokens, Some(U256::from(100_000)));
        assert_eq!(breakdown.fee, U256::from(1000));
    }

    #[test]
    fn fee_stays_within_bounds() {
        for amount in [1u64, 9_999, 10_000, 123_456_789, 1 << 40] {
            for price in [None, Some(0.5), Some(3000.0)] {
                let amount = U256::from(amount);
                let breakdown = apply_policy(&POLICY, amount, 18, price);
                assert!(breakdown.percentage_fee <= breakdown.fee);
                assert!(breakdown.fee <= breakdown.max_fee_allowed);
            }
        }
    }

    #[test]
    fn missing_price_degrades_to_percentage_fee() {
        let breakdown = apply_policy(&POLICY, U256::from(1_000_000), 6, None);
        assert!(breakdown.degraded);
        assert_eq!(breakdown.fee, U256::from(2500));
        assert_eq!(breakdown.fee_usd, None);
    }

    #[test]
    fn bps_do_not_overflow() {
        assert_eq!(apply_bps(U256::MAX, 10_000), U256::MAX);
        assert_eq!(apply_bps(U256::from(19_999), 1), U256::from(1));
    }
}
