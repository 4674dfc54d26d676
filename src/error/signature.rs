use super::ErrorKind;
use alloy::primitives::Address;
use thiserror::Error;

/// Errors related to the signature authorizing a transfer.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The signature is not 65 bytes long.
    #[error("invalid signature length: expected 65 bytes, got {0}")]
    InvalidLength(usize),
    /// The recovery id is not one of 0, 1, 27 or 28.
    #[error("invalid signature recovery id {0}")]
    InvalidRecoveryId(u8),
    /// The signature is well-formed but no signer could be recovered from it.
    #[error("could not recover signer: {0}")]
    Recovery(#[from] alloy::primitives::SignatureError),
    /// The recovered signer is not the sender of the transfer.
    #[error("invalid signature: expected signer {expected}, recovered {recovered}")]
    Mismatch {
        /// The sender of the transfer.
        expected: Address,
        /// The address recovered from the signature.
        recovered: Address,
    },
}

impl SignatureError {
    /// Returns the stable kind of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidLength(_) | Self::InvalidRecoveryId(_) => ErrorKind::SignatureFormat,
            Self::Recovery(_) | Self::Mismatch { .. } => ErrorKind::SignatureMismatch,
        }
    }
}
