//! Background purge of expired ledger rows.
//!
//! Lookups already ignore expired refresh records and blacklist entries, so
//! this task only reclaims space. Each tick goes through `TokenLedger`, which
//! owns the expiry clock and the purge logging. It holds a `Weak` reference to the ledger
//! storage: once the server drops its last `Arc`, the next tick fails to
//! upgrade and the task exits.
//!
//! # Invariants
//! - A failed purge is logged and retried on the next tick; it never stops
//!   the task.

use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::auth::TokenLedger;
use crate::store::LedgerStorage;
use crate::time::TimeSource;

/// Spawn the purge task.
///
/// The first purge runs one full `interval` after spawning.
pub fn spawn_purge_task(
    storage: Weak<dyn LedgerStorage>,
    clock: Arc<dyn TimeSource>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        purge_loop(storage, clock, interval).await;
    })
}

async fn purge_loop(storage: Weak<dyn LedgerStorage>, clock: Arc<dyn TimeSource>, interval: Duration) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(storage) = storage.upgrade() else {
            tracing::debug!("ledger storage dropped, stopping purge task");
            break;
        };

        let ledger = TokenLedger::new(storage, Arc::clone(&clock));
        if let Err(e) = ledger.purge_expired().await {
            tracing::warn!("ledger purge failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryLedgerStorage;
    use crate::time::ManualTimeSource;
    use crate::types::RefreshTokenRecord;

    fn record(token: &str, expires_at_ms: u64) -> RefreshTokenRecord {
        RefreshTokenRecord {
            subject_id: "subject".to_string(),
            token: token.to_string(),
            expires_at_ms,
            created_at_ms: 0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_task_removes_expired_rows() {
        let clock = Arc::new(ManualTimeSource::new(10_000));
        let memory = Arc::new(MemoryLedgerStorage::new());
        memory.insert_refresh(record("old", 5_000)).await.expect("insert");
        memory.insert_refresh(record("live", 50_000)).await.expect("insert");

        let storage: Arc<dyn LedgerStorage> = memory.clone();
        let handle = spawn_purge_task(Arc::downgrade(&storage), clock, Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(memory.refresh_count(), 1);

        drop(storage);
        drop(memory);
        tokio::time::sleep(Duration::from_secs(60)).await;
        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok(), "purge task should exit once storage is dropped");
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_task_survives_storage_errors() {
        let clock = Arc::new(ManualTimeSource::new(10_000));
        let memory = Arc::new(MemoryLedgerStorage::new());
        memory.insert_refresh(record("old", 5_000)).await.expect("insert");
        memory.set_failing(true);

        let storage: Arc<dyn LedgerStorage> = memory.clone();
        let handle = spawn_purge_task(Arc::downgrade(&storage), clock, Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(memory.refresh_count(), 1);
        assert!(!handle.is_finished());

        memory.set_failing(false);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(memory.refresh_count(), 0);
        handle.abort();
    }
}
