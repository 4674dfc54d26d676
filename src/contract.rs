//! Access to the relayer contract of a chain.

use crate::{
    error::{ContractRevert, TransferError},
    estimation::GasEstimate,
    transactions::TransferCall,
    types::{IERC20, IGaslessRelayer},
};
use alloy::{
    eips::eip1559::Eip1559Estimation,
    network::TransactionBuilder,
    primitives::{Address, TxHash, U256},
    providers::{DynProvider, PendingTransactionBuilder, Provider},
    rpc::types::{TransactionReceipt, TransactionRequest},
};
use async_trait::async_trait;
use std::{fmt, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Outcome of a mined relayer transaction.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Block the transaction was included in.
    pub block_number: u64,
    /// Gas used by the transaction.
    pub gas_used: u64,
    /// The revert, if the transaction failed.
    pub revert: Option<ContractRevert>,
}

impl TransferReceipt {
    /// Whether the transaction succeeded.
    pub const fn is_success(&self) -> bool {
        self.revert.is_none()
    }
}

/// The relayer contract of a chain and the token reads the pipeline performs around it.
#[async_trait]
pub trait GaslessContract: fmt::Debug + Send + Sync {
    /// Returns the nonce the next transfer of `user` must carry.
    async fn current_nonce(&self, user: Address) -> Result<U256, TransferError>;

    /// Whether `token` implements ERC-2612.
    async fn supports_permit(&self, token: Address) -> Result<bool, TransferError>;

    /// Token balance of `owner`.
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, TransferError>;

    /// Allowance `owner` granted to the relayer contract.
    async fn allowance(&self, token: Address, owner: Address) -> Result<U256, TransferError>;

    /// Simulates `call` and returns the gas it uses.
    async fn estimate_gas(&self, call: &TransferCall) -> Result<u64, TransferError>;

    /// Returns the current network EIP-1559 fee estimate.
    async fn fee_estimate(&self) -> Result<Eip1559Estimation, TransferError>;

    /// Signs and broadcasts `call`.
    async fn send(&self, call: &TransferCall, gas: &GasEstimate) -> Result<TxHash, TransferError>;

    /// Waits for the receipt of a broadcast `call`.
    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        call: &TransferCall,
    ) -> Result<TransferReceipt, TransferError>;
}

/// A [`GaslessContract`] backed by a chain node.
#[derive(Debug)]
pub struct OnchainContract {
    /// Address of the relayer contract.
    address: Address,
    /// Provider with the relayer wallet.
    provider: DynProvider,
    /// Address of the relayer wallet.
    relayer: Address,
    /// Confirmations required before a receipt is returned.
    confirmations: u64,
    /// How long to wait for a receipt.
    receipt_timeout: Duration,
    /// Serializes broadcasts so each fills the next pending nonce of the relayer.
    send_lock: Mutex<()>,
}

impl OnchainContract {
    /// Creates a new [`OnchainContract`].
    pub fn new(address: Address, provider: DynProvider, relayer: Address) -> Self {
        Self {
            address,
            provider,
            relayer,
            confirmations: 1,
            receipt_timeout: crate::constants::DEFAULT_RECEIPT_TIMEOUT,
            send_lock: Mutex::new(()),
        }
    }

    /// Sets the confirmations required before a receipt is returned.
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }

    /// Sets how long to wait for a receipt.
    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    fn request(&self, call: &TransferCall) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(self.relayer)
            .with_to(self.address)
            .with_input(call.calldata())
    }

    /// Replays a failed transaction at its block to recover the revert reason.
    async fn revert_reason(
        &self,
        call: &TransferCall,
        receipt: &TransactionReceipt,
    ) -> ContractRevert {
        let mut call_request = self.request(call);
        if receipt.gas_used > 0 {
            call_request = call_request.with_gas_limit(receipt.gas_used);
        }
        let block = receipt.block_number.unwrap_or_default();

        match self.provider.call(call_request).block(block.into()).await {
            Err(err) => match TransferError::from(err) {
                TransferError::Reverted(revert) => revert,
                err => {
                    let tx_hash = receipt.transaction_hash;
                    warn!(%tx_hash, %err, "Failed to replay reverted transaction");
                    ContractRevert::from_message("transaction reverted".to_string())
                }
            },
            Ok(_) => ContractRevert::from_message("transaction reverted".to_string()),
        }
    }
}

#[async_trait]
impl GaslessContract for OnchainContract {
    async fn current_nonce(&self, user: Address) -> Result<U256, TransferError> {
        let relayer = IGaslessRelayer::new(self.address, &self.provider);
        Ok(relayer.getCurrentUserNonce(user).call().await?)
    }

    async fn supports_permit(&self, token: Address) -> Result<bool, TransferError> {
        Ok(IGaslessRelayer::new(self.address, &self.provider)
            .checkERC2612PermitSupport(token)
            .call()
            .await?)
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, TransferError> {
        Ok(IERC20::new(token, &self.provider).balanceOf(owner).call().await?)
    }

    async fn allowance(&self, token: Address, owner: Address) -> Result<U256, TransferError> {
        Ok(IERC20::new(token, &self.provider).allowance(owner, self.address).call().await?)
    }

    async fn estimate_gas(&self, call: &TransferCall) -> Result<u64, TransferError> {
        Ok(self.provider.estimate_gas(self.request(call)).await?)
    }

    async fn fee_estimate(&self) -> Result<Eip1559Estimation, TransferError> {
        Ok(self.provider.estimate_eip1559_fees().await?)
    }

    async fn send(&self, call: &TransferCall, gas: &GasEstimate) -> Result<TxHash, TransferError> {
        let request = self
            .request(call)
            .with_gas_limit(gas.gas_limit)
            .with_max_fee_per_gas(gas.max_fee_per_gas)
            .with_max_priority_fee_per_gas(gas.max_priority_fee_per_gas);

        let _guard = self.send_lock.lock().await;
        let pending = self.provider.send_transaction(request).await?;
        let tx_hash = *pending.tx_hash();
        debug!(%tx_hash, contract = %self.address, "Broadcast relayer transaction");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        call: &TransferCall,
    ) -> Result<TransferReceipt, TransferError> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .with_required_confirmations(self.confirmations)
            .with_timeout(Some(self.receipt_timeout))
            .get_receipt()
            .await?;

        let revert =
            if receipt.status() { None } else { Some(self.revert_reason(call, &receipt).await) };

        Ok(TransferReceipt {
            tx_hash,
            block_number: receipt.block_number.unwrap_or_default(),
            gas_used: receipt.gas_used,
            revert,
        })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory relayer contract.
    #[derive(Debug, Default)]
    pub(crate) struct MockContract {
        pub(crate) nonce: U256,
        pub(crate) permit: bool,
        pub(crate) balance: U256,
        pub(crate) allowance: U256,
        /// Gas used by a simulation, `None` if the node is unreachable.
        pub(crate) gas_used: Option<u64>,
        /// Revert reason returned by simulations.
        pub(crate) revert: Option<String>,
        /// Network fee estimate, `None` if the node is unreachable.
        pub(crate) fees: Option<Eip1559Estimation>,
        /// Revert reason of mined transactions.
        pub(crate) mined_revert: Option<String>,
        pub(crate) fee_calls: AtomicUsize,
        pub(crate) sends: AtomicUsize,
    }

    impl MockContract {
        pub(crate) fn sends(&self) -> usize {
            self.sends.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GaslessContract for MockContract {
        async fn current_nonce(&self, _user: Address) -> Result<U256, TransferError> {
            Ok(self.nonce)
        }

        async fn supports_permit(&self, _token: Address) -> Result<bool, TransferError> {
            Ok(self.permit)
        }

        async fn balance_of(
            &self,
            _token: Address,
            _owner: Address,
        ) -> Result<U256, TransferError> {
            Ok(self.balance)
        }

        async fn allowance(&self, _token: Address, _owner: Address) -> Result<U256, TransferError> {
            Ok(self.allowance)
        }

        async fn estimate_gas(&self, _call: &TransferCall) -> Result<u64, TransferError> {
            if let Some(reason) = &self.revert {
                return Err(ContractRevert::from_message(reason.clone()).into());
            }
            self.gas_used.ok_or_else(|| TransferError::Network("connection refused".to_string()))
        }

        async fn fee_estimate(&self) -> Result<Eip1559Estimation, TransferError> {
            self.fee_calls.fetch_add(1, Ordering::SeqCst);
            self.fees.ok_or_else(|| TransferError::Network("connection refused".to_string()))
        }

        async fn send(
            &self,
            _call: &TransferCall,
            _gas: &GasEstimate,
        ) -> Result<TxHash, TransferError> {
            let n = self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(TxHash::with_last_byte(n as u8 + 1))
        }

        async fn wait_for_receipt(
            &self,
            tx_hash: TxHash,
            _call: &TransferCall,
        ) -> Result<TransferReceipt, TransferError> {
            let revert = self.mined_revert.clone().map(ContractRevert::from_message);
            Ok(TransferReceipt { tx_hash, block_number: 100, gas_used: 80_000, revert })
        }
    }
}
