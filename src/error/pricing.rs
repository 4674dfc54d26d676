//! Pricing-specific error types.

use super::ErrorKind;

/// Errors that can occur while fetching token prices.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PricingError {
    /// No price could be fetched and none is cached.
    #[error("price unavailable for feed {0}")]
    PriceUnavailable(String),

    /// The feed returned a price that cannot be used.
    #[error("invalid price data for feed {feed_id}: {reason}")]
    InvalidPriceData {
        /// The feed that returned the data.
        feed_id: String,
        /// Why the data was rejected.
        reason: String,
    },

    /// The price feed could not be reached or returned an unexpected response.
    #[error("price feed request failed: {0}")]
    Network(String),
}

impl PricingError {
    /// Returns the stable kind of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::PriceUnavailable(_) => ErrorKind::PriceUnavailable,
            Self::InvalidPriceData { .. } => ErrorKind::InvalidPriceData,
            Self::Network(_) => ErrorKind::Network,
        }
    }
}

impl From<reqwest::Error> for PricingError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
