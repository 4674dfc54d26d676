//! Replay protection for user nonces.
//!
//! A transfer is identified by `(chain_id, from, nonce)`. The nonce must match the authoritative
//! on-chain nonce of the sender, and only one request per key may be in flight in this process.
//!
//! Keys are reserved with [`ReplayGuard::check_and_reserve`]. The returned [`Reservation`]
//! releases the key when dropped, unless the transaction was broadcast: submitted keys are kept
//! until the transaction is mined or the key expires. Once mined, successful or reverted, the
//! on-chain nonce decides whether the key can be used again.

use crate::{constants::DEFAULT_REPLAY_TTL, contract::GaslessContract, error::TransferError};
use alloy::primitives::{Address, ChainId, TxHash, U256};
use dashmap::{DashMap, mapref::entry::Entry};
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::time::Instant;
use tracing::{debug, trace};

/// Idempotency key of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplayKey {
    /// The chain ID.
    pub chain_id: ChainId,
    /// The sender.
    pub from: Address,
    /// The nonce of the transfer.
    pub nonce: U256,
}

impl fmt::Display for ReplayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.chain_id, self.from, self.nonce)
    }
}

/// Status of a reserved key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayStatus {
    /// The transfer is being validated.
    Reserved,
    /// The transfer was broadcast.
    Submitted(TxHash),
}

#[derive(Debug, Clone, Copy)]
struct ReplayEntry {
    /// Distinguishes reservations of the same key after expiry.
    id: u64,
    status: ReplayStatus,
    created_at: Instant,
}

/// Guards against relaying the same transfer twice.
#[derive(Debug, Clone)]
pub struct ReplayGuard {
    entries: Arc<DashMap<ReplayKey, ReplayEntry>>,
    next_id: Arc<AtomicU64>,
    ttl: Duration,
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(DEFAULT_REPLAY_TTL)
    }
}

impl ReplayGuard {
    /// Creates a guard that keeps keys for at most `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self { entries: Default::default(), next_id: Default::default(), ttl }
    }

    /// Reserves the key of a transfer and checks `nonce` against the on-chain nonce of `from`.
    ///
    /// The key is released again if the nonce is stale.
    pub async fn check_and_reserve(
        &self,
        contract: &dyn GaslessContract,
        chain_id: ChainId,
        from: Address,
        nonce: U256,
    ) -> Result<Reservation, TransferError> {
        // Reserve before reading the nonce: a transfer confirmed between the two steps is then
        // either still reserved or already reflected in the on-chain nonce.
        let reservation = self.reserve(ReplayKey { chain_id, from, nonce })?;
        let expected = contract.current_nonce(from).await?;
        if expected != nonce {
            debug!(chain_id, %from, %expected, got = %nonce, "Stale nonce");
            return Err(TransferError::StaleNonce { expected, got: nonce });
        }
        Ok(reservation)
    }

    /// Reserves `key`, failing if it is already reserved and has not expired.
    pub fn reserve(&self, key: ReplayKey) -> Result<Reservation, TransferError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = ReplayEntry { id, status: ReplayStatus::Reserved, created_at: Instant::now() };

        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().created_at.elapsed() < self.ttl {
                    debug!(%key, status = ?occupied.get().status, "Duplicate request");
                    return Err(TransferError::DuplicateRequest(key.to_string()));
                }
                occupied.insert(entry);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }

        trace!(%key, "Reserved replay key");
        Ok(Reservation { entries: self.entries.clone(), key, id })
    }

    /// Returns the status of `key`, if it is tracked.
    pub fn status(&self, key: &ReplayKey) -> Option<ReplayStatus> {
        self.entries.get(key).map(|entry| entry.status)
    }

    /// Removes expired keys. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A reserved replay key.
///
/// Dropping the reservation before [`Reservation::mark_submitted`] releases the key.
#[derive(Debug)]
pub struct Reservation {
    entries: Arc<DashMap<ReplayKey, ReplayEntry>>,
    key: ReplayKey,
    id: u64,
}

impl Reservation {
    /// Returns the reserved key.
    pub const fn key(&self) -> &ReplayKey {
        &self.key
    }

    /// Marks the transfer as broadcast. The key is kept after this reservation is dropped.
    pub fn mark_submitted(&self, tx_hash: TxHash) {
        if let Some(mut entry) = self.entries.get_mut(&self.key)
            && entry.id == self.id
        {
            entry.status = ReplayStatus::Submitted(tx_hash);
        }
    }

    /// Evicts the key once the transaction is mined.
    pub fn finalize(self) {
        self.entries.remove_if(&self.key, |_, entry| entry.id == self.id);
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let removed = self
            .entries
            .remove_if(&self.key, |_, entry| {
                entry.id == self.id && entry.status == ReplayStatus::Reserved
            })
            .is_some();
        if removed {
            trace!(key = %self.key, "Released replay key");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ReplayKey {
        ReplayKey { chain_id: 1, from: Address::repeat_byte(0xaa), nonce: U256::from(7) }
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let guard = ReplayGuard::default();
        let _reservation = guard.reserve(key()).unwrap();

        assert!(matches!(guard.reserve(key()), Err(TransferError::DuplicateRequest(_))));
        assert!(guard.reserve(ReplayKey { nonce: U256::from(8), ..key() }).is_ok());
    }

    #[test]
    fn dropped_reservations_release_the_key() {
        let guard = ReplayGuard::default();
        drop(guard.reserve(key()).unwrap());

        assert!(guard.is_empty());
        assert!(guard.reserve(key()).is_ok());
    }

    #[test]
    fn submitted_keys_outlive_the_reservation() {
        let guard = ReplayGuard::default();
        let reservation = guard.reserve(key()).unwrap();
        reservation.mark_submitted(TxHash::repeat_byte(1));
        drop(reservation);

        assert_eq!(guard.status(&key()), Some(ReplayStatus::Submitted(TxHash::repeat_byte(1))));
        assert!(matches!(guard.reserve(key()), Err(TransferError::DuplicateRequest(_))));
    }

    #[test]
    fn mined_keys_are_evicted() {
        let guard = ReplayGuard::default();
        let reservation = guard.reserve(key()).unwrap();
        reservation.mark_submitted(TxHash::repeat_byte(1));
        reservation.finalize();

        assert!(guard.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn keys_expire_after_ttl() {
        let guard = ReplayGuard::new(Duration::from_secs(600));
        let reservation = guard.reserve(key()).unwrap();
        reservation.mark_submitted(TxHash::repeat_byte(1));
        drop(reservation);

        tokio::time::advance(Duration::from_secs(601)).await;
        assert_eq!(guard.purge_expired(), 1);
        assert!(guard.reserve(key()).is_ok());
    }

    #[tokio::test]
    async fn concurrent_reservations_admit_one() {
        let guard = ReplayGuard::default();
        let tasks = (0..16).map(|_| {
            let guard = guard.clone();
            tokio::spawn(async move { guard.reserve(key()).map(std::mem::forget) })
        });

        let admitted = futures_util::future::join_all(tasks)
            .await
            .into_iter()
            .filter(|result| matches!(result, Ok(Ok(()))))
            .count();
        assert_eq!(admitted, 1);
    }
}
