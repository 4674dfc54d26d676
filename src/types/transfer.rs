use crate::{
    chains::TokenProfile,
    error::TransferError,
    pricing::FeeBreakdown,
    transactions::TransferCall,
    types::{PermitData, TransferRequest},
};
use alloy::primitives::{Address, B256, Bytes, ChainId, U256};
use serde::{Deserialize, Serialize};

/// ERC-2612 permit parameters as submitted by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitParams {
    /// Approved amount.
    pub value: U256,
    /// Permit deadline, in unix seconds.
    pub deadline: u64,
    /// Recovery id.
    pub v: u8,
    /// Signature `r`.
    pub r: B256,
    /// Signature `s`.
    pub s: B256,
}

impl From<&PermitParams> for PermitData {
    fn from(permit: &PermitParams) -> Self {
        Self {
            value: permit.value,
            deadline: U256::from(permit.deadline),
            v: permit.v,
            r: permit.r,
            s: permit.s,
        }
    }
}

/// A transfer authorized off-chain by its sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferIntent {
    /// Sender.
    pub from: Address,
    /// Recipient.
    pub to: Address,
    /// Symbol of the transferred token.
    #[serde(alias = "token")]
    pub token_symbol: String,
    /// Amount in token base units.
    pub amount: U256,
    /// Relayer fee the sender signed. The relay computes it when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relayer_fee: Option<U256>,
    /// Nonce of the sender on the relayer contract.
    pub nonce: U256,
    /// Deadline, in unix seconds.
    pub deadline: u64,
    /// Signature of the sender.
    pub signature: Bytes,
    /// Permit, if the transfer approves the relayer contract in the same call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permit: Option<PermitParams>,
}

impl TransferIntent {
    /// Validates the request without touching the network.
    pub fn validate(&self, now: u64) -> Result<(), TransferError> {
        if self.from.is_zero() {
            return Err(TransferError::validation("sender is the zero address"));
        }
        if self.to.is_zero() {
            return Err(TransferError::validation("recipient is the zero address"));
        }
        if self.token_symbol.trim().is_empty() {
            return Err(TransferError::validation("token symbol is empty"));
        }
        if self.amount.is_zero() {
            return Err(TransferError::validation("amount must be positive"));
        }
        if self.deadline <= now {
            return Err(TransferError::DeadlineExpired { deadline: self.deadline, now });
        }
        if let Some(permit) = &self.permit {
            if permit.deadline <= now {
                return Err(TransferError::DeadlineExpired { deadline: permit.deadline, now });
            }
            if permit.value < self.amount {
                return Err(TransferError::validation("permit value is below the amount"));
            }
        }
        Ok(())
    }
}

/// A validated transfer enriched with chain data.
#[derive(Debug, Clone)]
pub struct ResolvedTransfer {
    /// The original intent.
    pub intent: TransferIntent,
    /// The chain ID.
    pub chain_id: ChainId,
    /// The relayer contract.
    pub contract: Address,
    /// The transferred token.
    pub token: TokenProfile,
    /// How the relayer fee was derived.
    pub fee: FeeBreakdown,
    /// The relayer fee charged.
    pub relayer_fee: U256,
    /// The nonce checked against the chain.
    pub resolved_nonce: U256,
    /// Deadline, in unix seconds.
    pub expiration_deadline: u64,
}

impl ResolvedTransfer {
    /// Returns the request as consumed by the relayer contract.
    pub fn request(&self) -> TransferRequest {
        TransferRequest {
            from: self.intent.from,
            to: self.intent.to,
            token: self.token.address,
            amount: self.intent.amount,
            relayerFee: self.relayer_fee,
            nonce: self.resolved_nonce,
            deadline: U256::from(self.expiration_deadline),
        }
    }

    /// Returns the contract call relaying this transfer.
    pub fn call(&self) -> TransferCall {
        TransferCall::new(
            self.request(),
            self.intent.signature.clone(),
            self.intent.permit.as_ref().map(PermitData::from),
        )
    }
}
