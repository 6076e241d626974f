//! # Period Locks
//!
//! Advisory locks serializing draft computation per `(partner, period start)`
//! and transfer initiation per payout.
//!
//! ```text
//! compute_draft(partner-1, Sep)  ── try_acquire ──► guard held ──► compute, save
//! compute_draft(partner-1, Sep)  ── try_acquire ──► busy ──► ConcurrentModification
//! compute_draft(partner-2, Sep)  ── try_acquire ──► guard held (independent key)
//!
//! initiate_transfer(po-1)  ── acquire_transfer ──► provider, store reference
//! initiate_transfer(po-1)  ── acquire_transfer ──► waits ──► sees the reference
//! ```
//!
//! The lock only covers one process. The version check on the payout
//! header and the store's unique indexes still reject a racing writer in
//! another process.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LockKey {
    Period(String, DateTime<Utc>),
    Transfer(String),
}

/// Guard for one lock key; released on drop.
#[derive(Debug)]
pub struct PeriodGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Table of per-(partner, period) advisory locks.
#[derive(Debug, Clone, Default)]
pub struct PeriodLocks {
    inner: Arc<Mutex<HashMap<LockKey, Arc<Mutex<()>>>>>,
}

impl PeriodLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock for `(partner_id, period_start)` without waiting.
    ///
    /// Returns `None` when another task holds it.
    pub async fn try_acquire(&self, partner_id: &str, period_start: DateTime<Utc>) -> Option<PeriodGuard> {
        let lock = self.entry(LockKey::Period(partner_id.to_string(), period_start)).await;
        lock.try_lock_owned().ok().map(|guard| PeriodGuard { _guard: guard })
    }

    /// Takes the transfer lock of a payout, waiting for a running
    /// initiation to finish.
    pub async fn acquire_transfer(&self, payout_id: &str) -> PeriodGuard {
        let lock = self.entry(LockKey::Transfer(payout_id.to_string())).await;
        PeriodGuard {
            _guard: lock.lock_owned().await,
        }
    }

    async fn entry(&self, key: LockKey) -> Arc<Mutex<()>> {
        let mut table = self.inner.lock().await;

        // Drop entries nobody holds or waits on
        table.retain(|_, lock| Arc::strong_count(lock) > 1);

        table
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Number of keys currently tracked.
    pub async fn tracked(&self) -> usize {
        self.inner.lock().await.len()
    }
}
