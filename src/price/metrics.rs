//! Price metrics

use metrics::{Counter, Gauge};
use metrics_derive::Metrics;

/// Metrics for a single price feed.
#[derive(Metrics, Clone)]
#[metrics(scope = "oracle")]
pub struct FeedMetrics {
    /// Last fetched USD price.
    pub price: Gauge,
    /// Number of outbound fetches.
    pub fetches: Counter,
    /// Number of failed fetches.
    pub fetch_failures: Counter,
    /// Number of lookups served from a fresh cache entry.
    pub cache_hits: Counter,
    /// Number of lookups served from a stale cache entry after a failed fetch.
    pub stale_hits: Counter,
}
