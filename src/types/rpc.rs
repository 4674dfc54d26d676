//! RPC request and response types.

use super::{PermitParams, RelayOutcome, TransferIntent};
use crate::{chains::ChainRef, error::ErrorKind};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use serde::{Deserialize, Serialize};

/// Transfer fields of a [`RelayRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferParams {
    /// Sender.
    pub from: Address,
    /// Recipient.
    pub to: Address,
    /// Token symbol.
    pub token: String,
    /// Amount in token base units.
    pub amount: U256,
    /// Relayer fee the sender signed, as returned by `relay_estimateFee`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relayer_fee: Option<U256>,
    /// Nonce of the sender on the relayer contract.
    pub nonce: U256,
    /// Deadline, in unix seconds.
    pub deadline: u64,
}

/// Request of `relay_sendTransfer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    /// Chain id or name.
    pub chain_id: ChainRef,
    /// The transfer.
    pub request: TransferParams,
    /// Permit, for tokens that were not approved to the relayer contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permit: Option<PermitParams>,
    /// Signature of the sender.
    pub signature: Bytes,
}

impl RelayRequest {
    /// Splits the request into the chain and the transfer intent.
    pub fn into_intent(self) -> (ChainRef, TransferIntent) {
        let Self { chain_id, request, permit, signature } = self;
        let intent = TransferIntent {
            from: request.from,
            to: request.to,
            token_symbol: request.token,
            amount: request.amount,
            relayer_fee: request.relayer_fee,
            nonce: request.nonce,
            deadline: request.deadline,
            signature,
            permit,
        };
        (chain_id, intent)
    }
}

/// Response of `relay_sendTransfer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    /// Whether the transfer was confirmed.
    pub success: bool,
    /// Transaction hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<TxHash>,
    /// Human readable result.
    pub message: String,
    /// Relayer fee charged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<U256>,
    /// Gas used by the transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    /// Block the transaction was included in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Explorer link of the transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    /// Stable error kind of a failed transfer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl From<RelayOutcome> for RelayResponse {
    fn from(outcome: RelayOutcome) -> Self {
        match outcome {
            RelayOutcome::Success(receipt) => Self {
                success: true,
                transaction_hash: Some(receipt.tx_hash),
                message: "transfer confirmed".to_string(),
                fee: Some(receipt.fee),
                gas_used: Some(receipt.gas_used),
                block_number: Some(receipt.block_number),
                explorer_url: Some(receipt.explorer_url),
                error_kind: None,
            },
            RelayOutcome::Failure { error_kind, message } => Self {
                success: false,
                transaction_hash: None,
                message,
                fee: None,
                gas_used: None,
                block_number: None,
                explorer_url: None,
                error_kind: Some(error_kind),
            },
        }
    }
}

/// Request of `relay_estimateFee`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEstimateRequest {
    /// Chain id or name.
    pub chain_id: ChainRef,
    /// Token symbol.
    pub token_symbol: String,
    /// Amount in token base units.
    pub amount: U256,
}

/// Response of `relay_estimateFee`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEstimateResponse {
    /// Always `true`; failures are returned as JSON-RPC errors.
    pub success: bool,
    /// Relayer fee, in token base units.
    pub fee: U256,
    /// Relayer fee in USD, if the token price is known.
    pub fee_usd: Option<f64>,
    /// Maximum fee for the amount, in token base units.
    pub max_fee: U256,
    /// Whether the minimum fee was skipped because the token price is unavailable.
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_carry_the_error_kind() {
        let response = RelayResponse::from(RelayOutcome::Failure {
            error_kind: ErrorKind::StaleNonce,
            message: "invalid nonce".to_string(),
        });
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["errorKind"], "STALE_NONCE");
        assert!(json.get("transactionHash").is_none());
    }

    #[test]
    fn accepts_chain_names_and_ids() {
        let request: FeeEstimateRequest =
            serde_json::from_str(r#"{ "chainId": "sepolia", "tokenSymbol": "USDC", "amount": "0x1" }"#)
                .unwrap();
        assert_eq!(request.chain_id, ChainRef::Name("sepolia".to_string()));

        let request: FeeEstimateRequest =
            serde_json::from_str(r#"{ "chainId": 8453, "tokenSymbol": "USDC", "amount": "0x1" }"#)
                .unwrap();
        assert_eq!(request.chain_id, ChainRef::Id(8453));
    }
}
