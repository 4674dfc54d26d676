//! Relayer fee pricing.

mod fee_calculator;
pub use fee_calculator::{FeeBreakdown, FeeCalculator, apply_bps};
