use super::ErrorKind;
use alloy::primitives::ChainId;
use thiserror::Error;

/// Errors related to resolving chains and tokens.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The chain is not supported.
    #[error("unsupported chain {0}")]
    UnsupportedChain(String),
    /// The token is not supported on the chain.
    #[error("unsupported token {symbol} on chain {chain_id}")]
    UnsupportedToken {
        /// The chain the token was looked up on.
        chain_id: ChainId,
        /// The requested symbol.
        symbol: String,
    },
    /// The chain is configured, but a required field is missing or invalid.
    #[error("chain {chain_id} is misconfigured: {reason}")]
    MisconfiguredChain {
        /// The misconfigured chain.
        chain_id: ChainId,
        /// What is wrong with it.
        reason: String,
    },
}

impl ChainError {
    /// Creates a new [`ChainError::MisconfiguredChain`].
    pub fn misconfigured(chain_id: ChainId, reason: impl Into<String>) -> Self {
        Self::MisconfiguredChain { chain_id, reason: reason.into() }
    }

    /// Returns the stable kind of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedChain(_) => ErrorKind::UnsupportedChain,
            Self::UnsupportedToken { .. } => ErrorKind::UnsupportedToken,
            Self::MisconfiguredChain { .. } => ErrorKind::MisconfiguredChain,
        }
    }
}
