use super::ErrorKind;
use crate::types::{IERC20Errors::IERC20ErrorsErrors, IGaslessRelayer::IGaslessRelayerErrors};
use alloy::{
    primitives::{Address, Bytes, U256},
    rpc::types::error::EthRpcErrorCode,
    sol_types::{SolInterface, decode_revert_reason},
    transports::{RpcError, TransportErrorKind},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors related to validating and executing a transfer.
#[derive(Debug, Clone, Error)]
pub enum TransferError {
    /// The request is malformed.
    #[error("invalid request: {0}")]
    Validation(String),
    /// The request deadline is not in the future.
    #[error("deadline {deadline} has expired (now {now})")]
    DeadlineExpired {
        /// The deadline of the request.
        deadline: u64,
        /// The time it was checked at.
        now: u64,
    },
    /// The request nonce is not the current on-chain nonce of the sender.
    #[error("invalid nonce: expected {expected}, got {got}")]
    StaleNonce {
        /// The on-chain nonce.
        expected: U256,
        /// The nonce of the request.
        got: U256,
    },
    /// An identical request is already being relayed.
    #[error("duplicate request {0}")]
    DuplicateRequest(String),
    /// The sender does not hold enough tokens.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// The amount the transfer moves.
        required: U256,
        /// The balance of the sender.
        available: U256,
    },
    /// The sender has not approved the relayer contract for enough tokens.
    #[error("insufficient allowance: required {required}, available {available}")]
    InsufficientAllowance {
        /// The amount the transfer moves.
        required: U256,
        /// The allowance granted to the relayer contract.
        available: U256,
    },
    /// The token does not implement ERC-2612.
    #[error("token {0} does not support ERC-2612 permits")]
    PermitUnsupported(Address),
    /// The contract call reverted.
    #[error(transparent)]
    Reverted(#[from] ContractRevert),
    /// A node could not be reached or returned an unexpected response.
    #[error("network error: {0}")]
    Network(String),
    /// The operation is not implemented.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
}

impl TransferError {
    /// Creates a new [`TransferError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Returns the stable kind of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::DeadlineExpired { .. } => ErrorKind::DeadlineExpired,
            Self::StaleNonce { .. } => ErrorKind::StaleNonce,
            Self::DuplicateRequest(_) => ErrorKind::DuplicateRequest,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::InsufficientAllowance { .. } => ErrorKind::InsufficientAllowance,
            Self::PermitUnsupported(_) => ErrorKind::PermitUnsupported,
            Self::Reverted(revert) => revert.category.kind(),
            Self::Network(_) => ErrorKind::Network,
            Self::NotImplemented(_) => ErrorKind::NotImplemented,
        }
    }
}

impl From<RpcError<TransportErrorKind>> for TransferError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        if let Some(data) = err.as_error_resp().and_then(|resp| resp.as_revert_data()) {
            return Self::Reverted(ContractRevert::new(data));
        }
        if let Some(resp) = err.as_error_resp()
            && resp.message.contains("revert")
        {
            return Self::Reverted(ContractRevert::from_message(resp.message.to_string()));
        }
        Self::Network(err.to_string())
    }
}

impl From<alloy::contract::Error> for TransferError {
    fn from(err: alloy::contract::Error) -> Self {
        match err {
            alloy::contract::Error::TransportError(err) => err.into(),
            err => Self::Network(err.to_string()),
        }
    }
}

impl From<alloy::providers::PendingTransactionError> for TransferError {
    fn from(err: alloy::providers::PendingTransactionError) -> Self {
        match err {
            alloy::providers::PendingTransactionError::TransportError(err) => err.into(),
            err => Self::Network(err.to_string()),
        }
    }
}

/// Known reasons for a relayer contract revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RevertCategory {
    /// The sender did not approve enough tokens.
    InsufficientAllowance,
    /// The sender does not hold enough tokens.
    InsufficientBalance,
    /// The contract rejected the signature.
    InvalidSignature,
    /// The contract rejected the nonce.
    InvalidNonce,
    /// The request or permit deadline passed.
    Expired,
    /// The token rejected the permit.
    PermitUnsupported,
    /// Anything else.
    Unknown,
}

impl RevertCategory {
    /// Classifies a free-form revert reason, e.g. `ERC20: insufficient allowance`.
    pub fn from_reason(reason: &str) -> Self {
        let reason = reason.to_ascii_lowercase();
        if reason.contains("allowance") {
            Self::InsufficientAllowance
        } else if reason.contains("balance") {
            Self::InsufficientBalance
        } else if reason.contains("signature") || reason.contains("signer") {
            Self::InvalidSignature
        } else if reason.contains("nonce") {
            Self::InvalidNonce
        } else if reason.contains("expired") || reason.contains("deadline") {
            Self::Expired
        } else if reason.contains("permit") {
            Self::PermitUnsupported
        } else {
            Self::Unknown
        }
    }

    /// Returns the [`ErrorKind`] a revert of this category is reported as.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientAllowance => ErrorKind::InsufficientAllowance,
            Self::InsufficientBalance => ErrorKind::InsufficientBalance,
            Self::InvalidSignature => ErrorKind::SignatureMismatch,
            Self::InvalidNonce => ErrorKind::StaleNonce,
            Self::Expired => ErrorKind::DeadlineExpired,
            Self::PermitUnsupported => ErrorKind::PermitUnsupported,
            Self::Unknown => ErrorKind::ContractRevert,
        }
    }
}

/// An on-chain revert of a relayer contract call.
#[derive(Debug, Clone, Error)]
pub struct ContractRevert {
    /// The classified reason.
    pub category: RevertCategory,
    /// Human readable reason, decoded when possible.
    pub reason: String,
    /// The raw revert data, if the node returned any.
    pub data: Option<Bytes>,
}

impl std::fmt::Display for ContractRevert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transfer reverted: {}", self.reason)
    }
}

impl ContractRevert {
    /// Decodes revert data returned by the relayer contract or the token it called.
    ///
    /// Unknown data is kept verbatim as the reason.
    pub fn new(data: Bytes) -> Self {
        let (category, reason) = IGaslessRelayerErrors::abi_decode(&data)
            .ok()
            .map(|err| relayer_error(&err))
            .or_else(|| IERC20ErrorsErrors::abi_decode(&data).ok().map(|err| token_error(&err)))
            .or_else(|| {
                decode_revert_reason(&data)
                    .map(|reason| (RevertCategory::from_reason(&reason), reason))
            })
            .unwrap_or_else(|| (RevertCategory::Unknown, data.to_string()));

        Self { category, reason, data: Some(data) }
    }

    /// Creates a revert from a node error message that did not carry revert data.
    pub fn from_message(message: String) -> Self {
        Self { category: RevertCategory::from_reason(&message), reason: message, data: None }
    }
}

impl From<ContractRevert> for jsonrpsee::types::error::ErrorObject<'static> {
    fn from(revert: ContractRevert) -> Self {
        super::rpc_err(EthRpcErrorCode::ExecutionError.code(), revert.to_string(), revert.data)
    }
}

fn relayer_error(err: &IGaslessRelayerErrors) -> (RevertCategory, String) {
    let category = match err {
        IGaslessRelayerErrors::InvalidSignature(_) => RevertCategory::InvalidSignature,
        IGaslessRelayerErrors::InvalidNonce(_) => RevertCategory::InvalidNonce,
        IGaslessRelayerErrors::DeadlineExpired(_) => RevertCategory::Expired,
        IGaslessRelayerErrors::InsufficientBalance(_) => RevertCategory::InsufficientBalance,
        IGaslessRelayerErrors::InsufficientAllowance(_) => RevertCategory::InsufficientAllowance,
        IGaslessRelayerErrors::PermitNotSupported(_) => RevertCategory::PermitUnsupported,
        IGaslessRelayerErrors::FeeExceedsMaximum(_)
        | IGaslessRelayerErrors::UnauthorizedRelayer(_) => RevertCategory::Unknown,
    };
    (category, format!("{err:?}"))
}

fn token_error(err: &IERC20ErrorsErrors) -> (RevertCategory, String) {
    let category = match err {
        IERC20ErrorsErrors::ERC20InsufficientBalance(_) => RevertCategory::InsufficientBalance,
        IERC20ErrorsErrors::ERC20InsufficientAllowance(_) => RevertCategory::InsufficientAllowance,
        IERC20ErrorsErrors::ERC2612ExpiredSignature(_) => RevertCategory::Expired,
        IERC20ErrorsErrors::ERC2612InvalidSigner(_) => RevertCategory::InvalidSignature,
    };
    (category, format!("{err:?}"))
}
