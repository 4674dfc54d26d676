//! # Relay RPC
//!
//! Implementation of the `relay_` namespace.
//!
//! - `relay_sendTransfer` relays a signed transfer and waits for its confirmation.
//! - `relay_estimateFee` quotes the relayer fee of a transfer.
//! - `relay_getNonce` returns the nonce the next transfer of a user must carry.

use crate::{
    chains::ChainRef,
    error::ToRpcResult,
    relay::Relay,
    types::{FeeEstimateRequest, FeeEstimateResponse, RelayRequest, RelayResponse},
    version::RELAY_SHORT_VERSION,
};
use alloy::primitives::{Address, U256};
use jsonrpsee::{
    core::{RpcResult, async_trait},
    proc_macros::rpc,
};
use tracing::instrument;

/// The `relay_` RPC namespace.
#[rpc(server, namespace = "relay")]
pub trait RelayApi {
    /// Checks the health of the relay and returns its version.
    #[method(name = "health", aliases = ["health"])]
    async fn health(&self) -> RpcResult<String>;

    /// Relays a signed transfer.
    ///
    /// Refused and reverted transfers are reported in the response rather than as RPC errors.
    #[method(name = "sendTransfer")]
    async fn send_transfer(&self, request: RelayRequest) -> RpcResult<RelayResponse>;

    /// Estimates the relayer fee of a transfer.
    #[method(name = "estimateFee")]
    async fn estimate_fee(&self, request: FeeEstimateRequest) -> RpcResult<FeeEstimateResponse>;

    /// Returns the nonce the next transfer of `address` on `chain` must carry.
    #[method(name = "getNonce")]
    async fn get_nonce(&self, chain: ChainRef, address: Address) -> RpcResult<U256>;
}

#[async_trait]
impl RelayApiServer for Relay {
    async fn health(&self) -> RpcResult<String> {
        Ok(RELAY_SHORT_VERSION.to_string())
    }

    #[instrument(skip_all, fields(chain = %request.chain_id, from = %request.request.from))]
    async fn send_transfer(&self, request: RelayRequest) -> RpcResult<RelayResponse> {
        let (chain, intent) = request.into_intent();
        Ok(self.relay(chain, intent).await.into())
    }

    #[instrument(skip_all, fields(chain = %request.chain_id, token = %request.token_symbol))]
    async fn estimate_fee(&self, request: FeeEstimateRequest) -> RpcResult<FeeEstimateResponse> {
        Relay::estimate_fee(self, request).await.to_rpc_result()
    }

    async fn get_nonce(&self, chain: ChainRef, address: Address) -> RpcResult<U256> {
        self.current_nonce(chain, address).await.to_rpc_result()
    }
}
