use crate::error::{ErrorKind, RelayError};
use alloy::primitives::{TxHash, U256};
use serde::{Deserialize, Serialize};

/// A confirmed relayed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayReceipt {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Block the transaction was included in.
    pub block_number: u64,
    /// Gas used by the transaction.
    pub gas_used: u64,
    /// Relayer fee charged, in token base units.
    pub fee: U256,
    /// Explorer link of the transaction.
    pub explorer_url: String,
}

/// Final result of relaying a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RelayOutcome {
    /// The transfer was confirmed.
    Success(RelayReceipt),
    /// The transfer failed.
    #[serde(rename_all = "camelCase")]
    Failure {
        /// Stable error kind.
        error_kind: ErrorKind,
        /// Caller-facing message.
        message: String,
    },
}

impl RelayOutcome {
    /// Whether the transfer was confirmed.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the error kind of a failed transfer.
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure { error_kind, .. } => Some(*error_kind),
        }
    }
}

impl From<Result<RelayReceipt, RelayError>> for RelayOutcome {
    fn from(result: Result<RelayReceipt, RelayError>) -> Self {
        match result {
            Ok(receipt) => Self::Success(receipt),
            Err(err) => Self::Failure { error_kind: err.kind(), message: err.public_message() },
        }
    }
}
