//! Transport layers for chain node providers.

use alloy::transports::layers::RetryBackoffLayer;

mod timeout;
pub use timeout::{RequestTimeoutLayer, RequestTimeoutService};

/// [`RetryBackoffLayer`] used for chain providers.
///
/// A rate limited request is retried once after 800ms. The CU/s is set to max value to avoid any
/// throttling. Providers wrap it in a [`RequestTimeoutLayer`], so the retry counts against the same
/// request timeout.
pub const RETRY_LAYER: RetryBackoffLayer = RetryBackoffLayer::new(1, 800, u64::MAX);
