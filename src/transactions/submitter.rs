use super::{
    TransferCall,
    metrics::TransferMetrics,
    transaction::{TransferLifecycle, TransferState},
};
use crate::{
    constants::MAX_BATCH_SIZE,
    contract::{GaslessContract, TransferReceipt},
    error::{RelayError, TransferError},
    estimation::GasEstimate,
    nonce::Reservation,
};
use alloy::primitives::{ChainId, U256};
use std::{convert::Infallible, sync::Arc, time::SystemTime};
use tokio::time::Instant;
use tracing::{info, warn};

/// Returns the current unix timestamp in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// Executes relayer contract calls and observes their receipts.
#[derive(Debug, Clone)]
pub struct TransactionSubmitter {
    max_batch_size: usize,
}

impl Default for TransactionSubmitter {
    fn default() -> Self {
        Self::new(MAX_BATCH_SIZE)
    }
}

impl TransactionSubmitter {
    /// Creates a new submitter accepting batches of up to `max_batch_size` transfers.
    pub const fn new(max_batch_size: usize) -> Self {
        Self { max_batch_size }
    }

    fn metrics(chain_id: ChainId) -> TransferMetrics {
        TransferMetrics::new_with_labels(&[("chain_id", chain_id.to_string())])
    }

    /// Records a transfer refused before broadcast.
    pub fn record_rejected(&self, chain_id: ChainId) {
        Self::metrics(chain_id).rejected.increment(1);
    }

    /// Checks that the sender holds the transferred amount and, for standard transfers, has
    /// approved it to the relayer contract.
    pub async fn preflight(
        &self,
        contract: &dyn GaslessContract,
        call: &TransferCall,
    ) -> Result<(), TransferError> {
        let request = call.request();
        let required = request.amount;

        if call.is_permit() {
            let available = contract.balance_of(request.token, request.from).await?;
            return check_balance(required, available);
        }

        let (available, allowance) = tokio::try_join!(
            contract.balance_of(request.token, request.from),
            contract.allowance(request.token, request.from)
        )?;
        check_balance(required, available)?;
        if allowance < required {
            return Err(TransferError::InsufficientAllowance { required, available: allowance });
        }
        Ok(())
    }

    /// Broadcasts `call` and waits for its receipt.
    ///
    /// The deadline is checked again right before broadcasting. Broadcasting and waiting run in a
    /// spawned task, so the transfer is still observed if the caller goes away. A reverted
    /// transaction is returned as [`TransferError::Reverted`].
    pub async fn submit(
        &self,
        chain_id: ChainId,
        contract: Arc<dyn GaslessContract>,
        call: TransferCall,
        gas: GasEstimate,
        reservation: Reservation,
        lifecycle: &mut TransferLifecycle,
    ) -> Result<TransferReceipt, RelayError> {
        let deadline = call.request().deadline;
        let now = unix_now();
        if deadline <= U256::from(now) {
            return Err(TransferError::DeadlineExpired { deadline: deadline.saturating_to(), now }
                .into());
        }

        let mut task_lifecycle = lifecycle.clone();
        let handle = tokio::spawn(async move {
            let metrics = Self::metrics(chain_id);
            let result = execute(
                contract.as_ref(),
                &call,
                &gas,
                &reservation,
                &mut task_lifecycle,
                &metrics,
            )
            .await;
            // A mined transaction, reverted or not, leaves the on-chain nonce authoritative.
            if result.is_ok() {
                reservation.finalize();
            }
            (task_lifecycle, result)
        });

        let (updated, result) =
            handle.await.map_err(|err| eyre::eyre!("submission task failed: {err}"))?;
        *lifecycle = updated;

        let receipt = result?;
        match &receipt.revert {
            Some(revert) => Err(TransferError::Reverted(revert.clone()).into()),
            None => Ok(receipt),
        }
    }

    /// Checks that a batch of `len` transfers is neither empty nor too large.
    pub fn check_batch_size(&self, len: usize) -> Result<(), TransferError> {
        if len == 0 {
            return Err(TransferError::validation("empty batch"));
        }
        if len > self.max_batch_size {
            return Err(TransferError::validation(format!(
                "batch of {len} transfers exceeds the maximum of {}",
                self.max_batch_size
            )));
        }
        Ok(())
    }

    /// Submits a batch of authorized transfers.
    ///
    /// Batch relaying is not supported: valid batches are refused with
    /// [`TransferError::NotImplemented`] instead of being relayed one by one.
    pub fn submit_batch(&self, calls: &[TransferCall]) -> Result<Infallible, TransferError> {
        self.check_batch_size(calls.len())?;
        Err(TransferError::NotImplemented("batch transfers"))
    }
}

fn check_balance(required: U256, available: U256) -> Result<(), TransferError> {
    if available < required {
        return Err(TransferError::InsufficientBalance { required, available });
    }
    Ok(())
}

async fn execute(
    contract: &dyn GaslessContract,
    call: &TransferCall,
    gas: &GasEstimate,
    reservation: &Reservation,
    lifecycle: &mut TransferLifecycle,
    metrics: &TransferMetrics,
) -> Result<TransferReceipt, RelayError> {
    let tx_hash = contract.send(call, gas).await?;
    let sent_at = Instant::now();
    reservation.mark_submitted(tx_hash);
    metrics.submitted.increment(1);
    lifecycle.advance(TransferState::Submitted(tx_hash)).map_err(eyre::Report::new)?;
    info!(%tx_hash, permit = call.is_permit(), key = %reservation.key(), "Submitted transfer");

    let receipt = contract.wait_for_receipt(tx_hash, call).await?;
    match &receipt.revert {
        None => {
            metrics.confirmed.increment(1);
            metrics.confirmation_time.record(sent_at.elapsed().as_millis() as f64);
            lifecycle.advance(TransferState::Confirmed(tx_hash)).map_err(eyre::Report::new)?;
            info!(
                %tx_hash,
                block_number = receipt.block_number,
                gas_used = receipt.gas_used,
                "Transfer confirmed"
            );
        }
        Some(revert) => {
            metrics.reverted.increment(1);
            lifecycle.advance(TransferState::Reverted(tx_hash)).map_err(eyre::Report::new)?;
            warn!(%tx_hash, reason = %revert.reason, "Transfer reverted");
        }
    }
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        contract::mock::MockContract,
        error::ErrorKind,
        nonce::{ReplayGuard, ReplayKey},
        types::{PermitData, TransferRequest},
    };
    use alloy::primitives::{Address, Bytes, TxHash};

    fn request(amount: u64) -> TransferRequest {
        TransferRequest {
            from: Address::repeat_byte(0xaa),
            to: Address::repeat_byte(0xbb),
            token: Address::repeat_byte(0x22),
            amount: U256::from(amount),
            deadline: U256::from(unix_now() + 600),
            ..Default::default()
        }
    }

    fn ready_lifecycle() -> TransferLifecycle {
        let mut lifecycle = TransferLifecycle::new("test");
        lifecycle.advance(TransferState::SignatureOk).unwrap();
        lifecycle.advance(TransferState::NonceOk).unwrap();
        lifecycle.advance(TransferState::GasEstimated).unwrap();
        lifecycle
    }

    #[tokio::test]
    async fn preflight_checks_balance_and_allowance() {
        let submitter = TransactionSubmitter::default();
        let standard = TransferCall::new(request(100), Bytes::new(), None);
        let permit = TransferCall::new(request(100), Bytes::new(), Some(PermitData::default()));

        let contract = MockContract { balance: U256::from(50), ..Default::default() };
        let err = submitter.preflight(&contract, &standard).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);

        let contract = MockContract { balance: U256::from(100), ..Default::default() };
        let err = submitter.preflight(&contract, &standard).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientAllowance);

        // Permits grant the allowance in the same call.
        assert!(submitter.preflight(&contract, &permit).await.is_ok());
    }

    #[tokio::test]
    async fn confirmed_transfers_evict_the_replay_key() {
        let guard = ReplayGuard::default();
        let key = ReplayKey { chain_id: 1, from: Address::repeat_byte(0xaa), nonce: U256::ZERO };
        let reservation = guard.reserve(key).unwrap();
        let contract = Arc::new(MockContract::default());
        let mut lifecycle = ready_lifecycle();

        let receipt = TransactionSubmitter::default()
            .submit(
                1,
                contract.clone(),
                TransferCall::new(request(100), Bytes::new(), None),
                GasEstimate { gas_limit: 100_000, max_fee_per_gas: 2, max_priority_fee_per_gas: 1 },
                reservation,
                &mut lifecycle,
            )
            .await
            .unwrap();

        assert_eq!(contract.sends(), 1);
        assert_eq!(lifecycle.state(), TransferState::Confirmed(receipt.tx_hash));
        assert!(guard.is_empty());
    }

    #[tokio::test]
    async fn mined_reverts_release_the_replay_key() {
        let guard = ReplayGuard::default();
        let key = ReplayKey { chain_id: 1, from: Address::repeat_byte(0xaa), nonce: U256::ZERO };
        let contract = Arc::new(MockContract {
            mined_revert: Some("ERC20: transfer amount exceeds balance".to_string()),
            ..Default::default()
        });
        let mut lifecycle = ready_lifecycle();

        let err = TransactionSubmitter::default()
            .submit(
                1,
                contract.clone(),
                TransferCall::new(request(100), Bytes::new(), None),
                GasEstimate { gas_limit: 100_000, max_fee_per_gas: 2, max_priority_fee_per_gas: 1 },
                guard.reserve(key).unwrap(),
                &mut lifecycle,
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
        assert_eq!(lifecycle.state(), TransferState::Reverted(TxHash::with_last_byte(1)));
        // the user nonce did not advance, so the same key must be usable again
        assert!(guard.is_empty());
        assert!(guard.reserve(key).is_ok());
    }

    #[tokio::test]
    async fn expired_deadline_is_not_submitted() {
        let guard = ReplayGuard::default();
        let key = ReplayKey { chain_id: 1, from: Address::repeat_byte(0xaa), nonce: U256::ZERO };
        let contract = Arc::new(MockContract::default());
        let mut request = request(100);
        request.deadline = U256::from(unix_now() - 1);

        let err = TransactionSubmitter::default()
            .submit(
                1,
                contract.clone(),
                TransferCall::new(request, Bytes::new(), None),
                GasEstimate { gas_limit: 100_000, max_fee_per_gas: 2, max_priority_fee_per_gas: 1 },
                guard.reserve(key).unwrap(),
                &mut ready_lifecycle(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DeadlineExpired);
        assert_eq!(contract.sends(), 0);
        assert!(guard.is_empty());
    }

    #[test]
    fn batches_are_bounded_and_not_implemented() {
        let submitter = TransactionSubmitter::default();
        let call = TransferCall::new(request(1), Bytes::new(), None);

        assert_eq!(submitter.check_batch_size(0).unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(submitter.check_batch_size(11).unwrap_err().kind(), ErrorKind::Validation);
        assert!(submitter.check_batch_size(10).is_ok());

        let err = submitter.submit_batch(&vec![call.clone(); 11]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = submitter.submit_batch(&vec![call; 10]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
    }
}
