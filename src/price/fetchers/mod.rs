use crate::error::PricingError;
use async_trait::async_trait;
use std::fmt;

mod hermes;
pub use hermes::{HermesClient, HermesPrice, HermesPriceUpdate, HermesResponse};

/// A price as published by a feed: `mantissa * 10^exponent` USD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPrice {
    /// Integer mantissa.
    pub mantissa: i64,
    /// Decimal exponent, usually negative.
    pub exponent: i32,
    /// Unix timestamp the price was published at.
    pub publish_time: u64,
}

impl RawPrice {
    /// Converts the price to a positive USD value.
    pub fn to_usd(&self, feed_id: &str) -> Result<f64, PricingError> {
        let mantissa = self.mantissa as f64;
        let price = if self.exponent < 0 {
            mantissa / 10f64.powi(-self.exponent)
        } else {
            mantissa * 10f64.powi(self.exponent)
        };
        if !price.is_finite() || price <= 0.0 {
            return Err(PricingError::InvalidPriceData {
                feed_id: feed_id.to_string(),
                reason: format!("non-positive price {}e{}", self.mantissa, self.exponent),
            });
        }
        Ok(price)
    }
}

/// A source of USD prices.
#[async_trait]
pub trait PriceFeed: fmt::Debug + Send + Sync {
    /// Fetches the latest price of `feed_id`.
    async fn fetch(&self, feed_id: &str) -> Result<RawPrice, PricingError>;
}

/// Normalizes a feed id: lower-case hex without `0x` prefix.
pub fn normalize_feed_id(feed_id: &str) -> String {
    let feed_id = feed_id.trim();
    feed_id.strip_prefix("0x").unwrap_or(feed_id).to_ascii_lowercase()
}
