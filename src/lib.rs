//! # Gasless Relay
//!
//! Library for a relay that executes signed ERC-20 transfers on behalf of their senders and
//! charges its fee in the transferred token.
//!
//! A transfer is relayed by [`relay::Relay`], which resolves the chain and token, computes the
//! fee, verifies the signature, guards against replays, estimates gas and submits the transaction.

pub mod cache;
pub mod chains;
pub mod cli;
pub mod config;
pub mod constants;
pub mod contract;
pub mod error;
pub mod estimation;
pub mod metrics;
pub mod nonce;
pub mod price;
pub mod pricing;
pub mod relay;
pub mod rpc;
pub mod signature;
pub mod signers;
pub mod spawn;
pub mod transactions;
pub mod transport;
pub mod types;
pub mod version;
