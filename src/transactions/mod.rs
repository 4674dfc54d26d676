//! Relayer transactions.

mod metrics;

mod submitter;
pub use submitter::{TransactionSubmitter, unix_now};

mod transaction;
pub use transaction::{InvalidTransition, TransferCall, TransferLifecycle, TransferState};
