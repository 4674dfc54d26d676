//! Relay error types.
//!
//! Every failure of the relay pipeline is a [`RelayError`]. Each variant maps to a stable
//! [`ErrorKind`] that callers can match on, and the conversion into a JSON-RPC error object happens
//! once, at the RPC boundary.
use alloy::primitives::Bytes;
use core::fmt;
use jsonrpsee::core::RpcResult;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod chain;
pub use chain::ChainError;

mod pricing;
pub use pricing::PricingError;

mod signature;
pub use signature::SignatureError;

mod transfer;
pub use transfer::{ContractRevert, RevertCategory, TransferError};

/// The overarching error type returned by the relay pipeline.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Errors related to chain and token resolution.
    #[error(transparent)]
    Chain(#[from] ChainError),
    /// Errors related to price feeds.
    #[error(transparent)]
    Pricing(#[from] PricingError),
    /// Errors related to the authorizing signature.
    #[error(transparent)]
    Signature(#[from] SignatureError),
    /// Errors related to validating and executing a transfer.
    #[error(transparent)]
    Transfer(#[from] TransferError),
    /// An internal error occurred.
    #[error(transparent)]
    Internal(#[from] eyre::Error),
}

impl RelayError {
    /// Returns the stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Chain(err) => err.kind(),
            Self::Pricing(err) => err.kind(),
            Self::Signature(err) => err.kind(),
            Self::Transfer(err) => err.kind(),
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the message that is safe to show to callers.
    ///
    /// Internal and network errors are replaced by a generic message, since they can carry node
    /// URLs and credentials. The full error is only logged.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_string(),
            Self::Transfer(TransferError::Network(_)) => "chain node unavailable".to_string(),
            Self::Pricing(PricingError::Network(_)) => "price feed unavailable".to_string(),
            err => err.to_string(),
        }
    }
}

/// Stable, caller-facing classification of a [`RelayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed request: address, amount or deadline.
    Validation,
    /// The chain is not configured.
    UnsupportedChain,
    /// The token is not configured on the chain.
    UnsupportedToken,
    /// The chain is configured but cannot be used, e.g. the contract is not deployed.
    MisconfiguredChain,
    /// The signature could not be parsed.
    SignatureFormat,
    /// The signature was not produced by the sender.
    SignatureMismatch,
    /// The nonce does not match the on-chain nonce.
    StaleNonce,
    /// The same request is already being processed.
    DuplicateRequest,
    /// The sender does not hold enough tokens.
    InsufficientBalance,
    /// The sender has not approved enough tokens.
    InsufficientAllowance,
    /// The token does not support ERC-2612 permits.
    PermitUnsupported,
    /// No price is available for the token.
    PriceUnavailable,
    /// The price feed returned unusable data.
    InvalidPriceData,
    /// A node or the price feed could not be reached.
    Network,
    /// The contract call reverted.
    ContractRevert,
    /// The request deadline has passed.
    DeadlineExpired,
    /// The operation is not implemented.
    NotImplemented,
    /// An internal error occurred.
    Internal,
}

impl ErrorKind {
    /// Returns the kind as a static string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::UnsupportedChain => "UNSUPPORTED_CHAIN",
            Self::UnsupportedToken => "UNSUPPORTED_TOKEN",
            Self::MisconfiguredChain => "MISCONFIGURED_CHAIN",
            Self::SignatureFormat => "SIGNATURE_FORMAT",
            Self::SignatureMismatch => "SIGNATURE_MISMATCH",
            Self::StaleNonce => "STALE_NONCE",
            Self::DuplicateRequest => "DUPLICATE_REQUEST",
            Self::InsufficientBalance => "INSUFFICIENT_BALANCE",
            Self::InsufficientAllowance => "INSUFFICIENT_ALLOWANCE",
            Self::PermitUnsupported => "PERMIT_UNSUPPORTED",
            Self::PriceUnavailable => "PRICE_UNAVAILABLE",
            Self::InvalidPriceData => "INVALID_PRICE_DATA",
            Self::Network => "NETWORK",
            Self::ContractRevert => "CONTRACT_REVERT",
            Self::DeadlineExpired => "DEADLINE_EXPIRED",
            Self::NotImplemented => "NOT_IMPLEMENTED",
            Self::Internal => "INTERNAL",
        }
    }

    /// Whether the error was caused by the request itself rather than the relay or the network.
    pub const fn is_caller_error(&self) -> bool {
        !matches!(self, Self::PriceUnavailable | Self::Network | Self::Internal)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RelayError> for jsonrpsee::types::error::ErrorObject<'static> {
    fn from(err: RelayError) -> Self {
        let kind = err.kind();
        match err {
            RelayError::Transfer(TransferError::Reverted(revert)) => revert.into(),
            RelayError::Transfer(TransferError::NotImplemented(_)) => {
                rpc_err(jsonrpsee::types::error::METHOD_NOT_FOUND_CODE, err.to_string(), None)
            }
            err if kind.is_caller_error() => invalid_params(err.public_message()),
            err => internal_rpc(err.public_message()),
        }
    }
}

/// A helper trait to provide an RPC error code.
pub trait ToRpcResult<Ok, Err>: Sized {
    /// Converts result to [`RpcResult`] by converting error variant to
    /// [`jsonrpsee::types::error::ErrorObject`]
    fn to_rpc_result(self) -> RpcResult<Ok>
    where
        Err: fmt::Display;
}

macro_rules! impl_error_helpers {
    ($err:ty) => {
        impl<Ok> ToRpcResult<Ok, $err> for Result<Ok, $err> {
            fn to_rpc_result(self) -> RpcResult<Ok> {
                self.map_err(|err| RelayError::from(err).into())
            }
        }
    };
}

impl_error_helpers!(RelayError);
impl_error_helpers!(ChainError);
impl_error_helpers!(PricingError);
impl_error_helpers!(SignatureError);
impl_error_helpers!(TransferError);

/// Constructs an invalid params JSON‑RPC error.
fn invalid_params(msg: impl Into<String>) -> jsonrpsee::types::error::ErrorObject<'static> {
    rpc_err(jsonrpsee::types::error::INVALID_PARAMS_CODE, msg, None)
}

/// Constructs an internal JSON‑RPC error.
fn internal_rpc(msg: impl Into<String>) -> jsonrpsee::types::error::ErrorObject<'static> {
    rpc_err(jsonrpsee::types::error::INTERNAL_ERROR_CODE, msg, None)
}

/// Constructs a JSON‑RPC error with `code`, `message` and optional `data`.
fn rpc_err(
    code: i32,
    msg: impl Into<String>,
    data: Option<Bytes>,
) -> jsonrpsee::types::error::ErrorObject<'static> {
    jsonrpsee::types::error::ErrorObject::owned(code, msg.into(), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};
    use jsonrpsee::types::error::{ErrorObject, INTERNAL_ERROR_CODE, INVALID_PARAMS_CODE};

    #[test]
    fn internal_errors_are_not_leaked() {
        let err = RelayError::Internal(eyre::eyre!("database password is hunter2"));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.public_message(), "an internal error occurred");

        let obj: ErrorObject<'static> = err.into();
        assert_eq!(obj.code(), INTERNAL_ERROR_CODE);
        assert!(!obj.message().contains("hunter2"));
    }

    #[test]
    fn network_errors_are_not_leaked() {
        let url = "error sending request for url (https://node.example/v2/secret-key)";
        let err: RelayError = TransferError::Network(url.to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.public_message(), "chain node unavailable");

        let obj: ErrorObject<'static> = err.into();
        assert_eq!(obj.code(), INTERNAL_ERROR_CODE);
        assert!(!obj.message().contains("secret-key"));

        let err: RelayError = PricingError::Network(url.to_string()).into();
        assert_eq!(err.public_message(), "price feed unavailable");
    }

    #[test]
    fn caller_errors_map_to_invalid_params() {
        let err: RelayError =
            TransferError::StaleNonce { expected: U256::from(4), got: U256::from(3) }.into();
        assert_eq!(err.kind(), ErrorKind::StaleNonce);

        let obj: ErrorObject<'static> = err.into();
        assert_eq!(obj.code(), INVALID_PARAMS_CODE);
    }

    #[test]
    fn kinds_serialize_as_stable_strings() {
        let err: RelayError = SignatureError::Mismatch {
            expected: Address::ZERO,
            recovered: Address::repeat_byte(1),
        }
        .into();
        assert_eq!(serde_json::to_string(&err.kind()).unwrap(), "\"SIGNATURE_MISMATCH\"");
        assert_eq!(err.kind().to_string(), "SIGNATURE_MISMATCH");
    }
}
