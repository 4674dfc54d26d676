use metrics::{Counter, Histogram};
use metrics_derive::Metrics;

/// Metrics of relayed transfers on a chain.
#[derive(Metrics, Clone)]
#[metrics(scope = "transfers")]
pub struct TransferMetrics {
    /// Number of broadcast transfers.
    pub submitted: Counter,
    /// Number of confirmed transfers.
    pub confirmed: Counter,
    /// Number of reverted transfers.
    pub reverted: Counter,
    /// Number of transfers refused before broadcast.
    pub rejected: Counter,
    /// Time from broadcast to confirmation, in milliseconds.
    pub confirmation_time: Histogram,
}
