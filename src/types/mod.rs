//! Shared primitive types.

mod contracts;
pub use contracts::*;

mod outcome;
pub use outcome::*;

mod rpc;
pub use rpc::*;

mod transfer;
pub use transfer::*;
