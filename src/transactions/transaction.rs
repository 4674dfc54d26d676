use crate::types::{IGaslessRelayer, PermitData, TransferRequest};
use alloy::{
    primitives::{Bytes, TxHash},
    sol_types::SolCall,
};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// A call to one of the relayer contract entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferCall {
    /// Transfer of tokens already approved to the relayer contract.
    Standard {
        /// The transfer.
        request: TransferRequest,
        /// Signature of `request.from`.
        signature: Bytes,
    },
    /// ERC-2612 permit and transfer in the same call.
    Permit {
        /// The transfer.
        request: TransferRequest,
        /// Signature of `request.from`.
        signature: Bytes,
        /// The permit.
        permit: PermitData,
    },
}

impl TransferCall {
    /// Creates the call for `request`, using the permit entry point if a permit is given.
    pub fn new(request: TransferRequest, signature: Bytes, permit: Option<PermitData>) -> Self {
        match permit {
            Some(permit) => Self::Permit { request, signature, permit },
            None => Self::Standard { request, signature },
        }
    }

    /// Returns the transfer.
    pub const fn request(&self) -> &TransferRequest {
        match self {
            Self::Standard { request, .. } | Self::Permit { request, .. } => request,
        }
    }

    /// Whether this is a permit transfer.
    pub const fn is_permit(&self) -> bool {
        matches!(self, Self::Permit { .. })
    }

    /// Returns the ABI encoded call.
    pub fn calldata(&self) -> Bytes {
        match self {
            Self::Standard { request, signature } => {
                IGaslessRelayer::processStandardGaslessTransferCall {
                    request: request.clone(),
                    signature: signature.clone(),
                }
                .abi_encode()
            }
            Self::Permit { request, signature, permit } => {
                IGaslessRelayer::processPermitBasedGaslessTransferCall {
                    request: request.clone(),
                    signature: signature.clone(),
                    permit: permit.clone(),
                }
                .abi_encode()
            }
        }
        .into()
    }
}

/// State of a transfer in the relay pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// The request passed validation and was resolved against the chain configuration.
    Validated,
    /// The signature was verified.
    SignatureOk,
    /// The nonce matches the on-chain nonce and is reserved.
    NonceOk,
    /// Gas parameters were estimated.
    GasEstimated,
    /// The transaction was broadcast.
    Submitted(TxHash),
    /// The transaction was included and succeeded.
    Confirmed(TxHash),
    /// The transaction was included and reverted.
    Reverted(TxHash),
    /// The transfer was refused before it was broadcast.
    Rejected,
}

impl TransferState {
    /// Whether the state is final.
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Confirmed(_) | Self::Reverted(_) | Self::Rejected)
    }

    /// Whether `next` may follow this state.
    pub fn can_advance_to(&self, next: &Self) -> bool {
        match (self, next) {
            (Self::Validated, Self::SignatureOk)
            | (Self::SignatureOk, Self::NonceOk)
            | (Self::NonceOk, Self::GasEstimated)
            | (Self::GasEstimated, Self::Submitted(_)) => true,
            (Self::Submitted(sent), Self::Confirmed(mined) | Self::Reverted(mined)) => {
                sent == mined
            }
            (Self::Submitted(_), Self::Rejected) => false,
            (state, Self::Rejected) => !state.is_final(),
            _ => false,
        }
    }
}

/// A refused state transition.
#[derive(Debug, Clone, Copy, Error)]
#[error("invalid transfer state transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
    /// The current state.
    pub from: TransferState,
    /// The refused state.
    pub to: TransferState,
}

/// Tracks the state of a single transfer.
#[derive(Debug, Clone)]
pub struct TransferLifecycle {
    /// Identifies the transfer in logs.
    id: String,
    state: TransferState,
}

impl TransferLifecycle {
    /// Starts tracking a validated transfer.
    pub fn new(id: impl fmt::Display) -> Self {
        Self { id: id.to_string(), state: TransferState::Validated }
    }

    /// Returns the current state.
    pub const fn state(&self) -> TransferState {
        self.state
    }

    /// Moves to `next`, refusing transitions the pipeline never performs.
    pub fn advance(&mut self, next: TransferState) -> Result<(), InvalidTransition> {
        if !self.state.can_advance_to(&next) {
            return Err(InvalidTransition { from: self.state, to: next });
        }
        debug!(transfer = %self.id, from = ?self.state, to = ?next, "Transfer state changed");
        self.state = next;
        Ok(())
    }

    /// Moves to [`TransferState::Rejected`] if the transfer was not broadcast yet.
    pub fn reject(&mut self) {
        let _ = self.advance(TransferState::Rejected);
    }
}
