//! Gas estimation for relayer transactions.

mod gas;
pub use gas::{GasEstimate, GasEstimator, buffered_gas_limit, clamp_fees};
