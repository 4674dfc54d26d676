//! USD price oracle and the feeds it reads from.

mod fetchers;
pub use fetchers::*;

mod metrics;

mod oracle;
pub use oracle::{PriceOracle, PriceQuote};
