//! Relay constants.

use std::time::Duration;

/// Denominator for fee values expressed in basis points.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// How long a fetched USD price is served from cache before it is refreshed.
pub const PRICE_TTL: Duration = Duration::from_secs(30);

/// How long a network fee estimate is served from cache before it is refreshed.
pub const GAS_PRICE_TTL: Duration = Duration::from_secs(30);

/// Multiplier applied to simulated gas usage when none is configured for a chain.
pub const DEFAULT_GAS_BUFFER_MULTIPLIER: f64 = 1.2;

/// Maximum number of transfers accepted by a single batch request.
pub const MAX_BATCH_SIZE: usize = 10;

/// Timeout applied to every JSON-RPC request sent to a chain node.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(8);

/// Timeout applied to price feed requests.
pub const DEFAULT_PRICE_FEED_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for a submitted transaction to be included.
///
/// This bounds the time a request observes confirmation, not the transaction itself: once
/// broadcast, a transaction may still land after this elapses.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// How long an idempotency key is retained by the replay guard.
pub const DEFAULT_REPLAY_TTL: Duration = Duration::from_secs(600);

/// Default Pyth Hermes endpoint used for USD price feeds.
pub const DEFAULT_PRICE_FEED_URL: &str = "https://hermes.pyth.network";

/// Placeholder replaced by the transaction hash in explorer URL templates.
pub const EXPLORER_TX_PLACEHOLDER: &str = "{txHash}";

/// How often expired replay keys are purged.
pub const REPLAY_PURGE_INTERVAL: Duration = Duration::from_secs(60);
