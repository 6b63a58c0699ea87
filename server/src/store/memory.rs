//! In-process store implementations.
//!
//! Used by the test suite and for running the server without any database.
//! Each store carries a switch that simulates an outage so degraded-store
//! behavior can be exercised deterministically.
//!
//! # Thread Safety
//!
//! State sits behind `RwLock`/`Mutex`; a poisoned lock surfaces as
//! `StoreError::Backend` rather than a panic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use crate::store::{CandidateStore, LedgerStorage, PrimaryUserStore, StoreError};
use crate::time::TimeSource;
use crate::types::{BlacklistEntry, Candidate, PrimaryUser, RefreshTokenRecord, new_record_id};

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

fn outage() -> StoreError {
    StoreError::Unavailable("simulated outage".to_string())
}

/// Primary users keyed by id, with a unique email index.
#[derive(Debug, Default)]
pub struct MemoryPrimaryStore {
    state: RwLock<PrimaryState>,
    failing: AtomicBool,
}

#[derive(Debug, Default)]
struct PrimaryState {
    users: HashMap<String, PrimaryUser>,
    /// email -> id
    email_index: HashMap<String, String>,
}

impl MemoryPrimaryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of stored users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().map_or(0, |state| state.users.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(outage());
        }
        Ok(())
    }
}

#[async_trait]
impl PrimaryUserStore for MemoryPrimaryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<PrimaryUser>, StoreError> {
        self.check()?;
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .email_index
            .get(email)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<PrimaryUser>, StoreError> {
        self.check()?;
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.users.get(id).cloned())
    }

    async fn insert(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        now_ms: u64,
    ) -> Result<PrimaryUser, StoreError> {
        self.check()?;
        let mut state = self.state.write().map_err(|_| poisoned())?;
        if state.email_index.contains_key(email) {
            return Err(StoreError::Duplicate);
        }

        let user = PrimaryUser {
            id: new_record_id(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            last_login_ms: now_ms,
        };
        state.email_index.insert(user.email.clone(), user.id.clone());
        state.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn set_last_login(&self, id: &str, now_ms: u64) -> Result<(), StoreError> {
        self.check()?;
        let mut state = self.state.write().map_err(|_| poisoned())?;
        if let Some(user) = state.users.get_mut(id) {
            user.last_login_ms = now_ms;
        }
        Ok(())
    }
}

/// Candidates keyed by email.
pub struct MemoryCandidateStore {
    candidates: RwLock<HashMap<String, Candidate>>,
    reachable: AtomicBool,
    touch_failing: AtomicBool,
    touch_calls: AtomicUsize,
    clock: Arc<dyn TimeSource>,
}

impl MemoryCandidateStore {
    /// An empty, reachable store.
    #[must_use]
    pub fn new(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            candidates: RwLock::new(HashMap::new()),
            reachable: AtomicBool::new(true),
            touch_failing: AtomicBool::new(false),
            touch_calls: AtomicUsize::new(0),
            clock,
        }
    }

    /// Insert or replace a candidate. Stands in for the external system's writes.
    pub fn upsert(&self, candidate: Candidate) {
        if let Ok(mut candidates) = self.candidates.write() {
            candidates.insert(candidate.email.clone(), candidate);
        }
    }

    /// When `false`, every call fails with `StoreError::Unavailable`.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Make `touch_last_login` fail while lookups keep working.
    pub fn set_touch_failing(&self, failing: bool) {
        self.touch_failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `touch_last_login` calls received, including failed ones.
    #[must_use]
    pub fn touch_calls(&self) -> usize {
        self.touch_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(outage())
        }
    }
}

impl std::fmt::Debug for MemoryCandidateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCandidateStore")
            .field("reachable", &self.reachable.load(Ordering::SeqCst))
            .field("touch_calls", &self.touch_calls())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CandidateStore for MemoryCandidateStore {
    async fn probe(&self) -> Result<(), StoreError> {
        self.check()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Candidate>, StoreError> {
        self.check()?;
        let candidates = self.candidates.read().map_err(|_| poisoned())?;
        Ok(candidates.get(email).cloned())
    }

    async fn touch_last_login(&self, email: &str) -> Result<(), StoreError> {
        self.touch_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        if self.touch_failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated write failure".to_string()));
        }
        let mut candidates = self.candidates.write().map_err(|_| poisoned())?;
        if let Some(candidate) = candidates.get_mut(email) {
            candidate.last_login_ms = Some(self.clock.now_ms());
        }
        Ok(())
    }
}

/// Refresh records and blacklist entries keyed by token string.
#[derive(Debug, Default)]
pub struct MemoryLedgerStorage {
    refresh: Mutex<HashMap<String, RefreshTokenRecord>>,
    blacklist: Mutex<HashMap<String, BlacklistEntry>>,
    failing: AtomicBool,
}

impl MemoryLedgerStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Stored refresh records, expired ones included.
    #[must_use]
    pub fn refresh_count(&self) -> usize {
        self.refresh.lock().map_or(0, |records| records.len())
    }

    /// Stored blacklist entries, expired ones included.
    #[must_use]
    pub fn blacklist_count(&self) -> usize {
        self.blacklist.lock().map_or(0, |entries| entries.len())
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(outage());
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStorage for MemoryLedgerStorage {
    async fn insert_refresh(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.refresh.lock().map_err(|_| poisoned())?;
        if records.contains_key(&record.token) {
            return Err(StoreError::Duplicate);
        }
        records.insert(record.token.clone(), record);
        Ok(())
    }

    async fn find_refresh(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        self.check()?;
        let records = self.refresh.lock().map_err(|_| poisoned())?;
        Ok(records.get(token).cloned())
    }

    async fn take_refresh(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        self.check()?;
        let mut records = self.refresh.lock().map_err(|_| poisoned())?;
        Ok(records.remove(token))
    }

    async fn delete_refresh(&self, token: &str) -> Result<bool, StoreError> {
        self.check()?;
        let mut records = self.refresh.lock().map_err(|_| poisoned())?;
        Ok(records.remove(token).is_some())
    }

    async fn insert_blacklist(&self, entry: BlacklistEntry) -> Result<(), StoreError> {
        self.check()?;
        let mut entries = self.blacklist.lock().map_err(|_| poisoned())?;
        if entries.contains_key(&entry.token) {
            return Err(StoreError::Duplicate);
        }
        entries.insert(entry.token.clone(), entry);
        Ok(())
    }

    async fn find_blacklist(&self, token: &str) -> Result<Option<BlacklistEntry>, StoreError> {
        self.check()?;
        let entries = self.blacklist.lock().map_err(|_| poisoned())?;
        Ok(entries.get(token).cloned())
    }

    async fn purge_expired(&self, now_ms: u64) -> Result<u64, StoreError> {
        self.check()?;
        let mut removed = 0_u64;
        {
            let mut records = self.refresh.lock().map_err(|_| poisoned())?;
            let before = records.len();
            records.retain(|_, record| record.is_live(now_ms));
            removed += (before - records.len()) as u64;
        }
        {
            let mut entries = self.blacklist.lock().map_err(|_| poisoned())?;
            let before = entries.len();
            entries.retain(|_, entry| entry.is_live(now_ms));
            removed += (before - entries.len()) as u64;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualTimeSource;

    fn refresh_record(token: &str, expires_at_ms: u64) -> RefreshTokenRecord {
        RefreshTokenRecord {
            subject_id: "subject".to_string(),
            token: token.to_string(),
            expires_at_ms,
            created_at_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_primary_insert_rejects_duplicate_email() {
        let store = MemoryPrimaryStore::new();
        let first = store
            .insert("Alice", "alice@example.com", "hash", 1)
            .await
            .expect("first insert");
        assert_eq!(first.last_login_ms, 1);

        let second = store.insert("Alice 2", "alice@example.com", "hash", 2).await;
        assert_eq!(second, Err(StoreError::Duplicate));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_primary_lookup_by_email_and_id() {
        let store = MemoryPrimaryStore::new();
        let user = store
            .insert("Alice", "alice@example.com", "hash", 1)
            .await
            .expect("insert");

        let by_email = store.find_by_email("alice@example.com").await.expect("lookup");
        assert_eq!(by_email.as_ref().map(|u| u.id.as_str()), Some(user.id.as_str()));

        let by_id = store.find_by_id(&user.id).await.expect("lookup");
        assert_eq!(by_id.map(|u| u.email), Some("alice@example.com".to_string()));

        assert!(store.find_by_email("nobody@example.com").await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn test_primary_set_last_login() {
        let store = MemoryPrimaryStore::new();
        let user = store
            .insert("Alice", "alice@example.com", "hash", 1)
            .await
            .expect("insert");
        store.set_last_login(&user.id, 42).await.expect("update");
        let reloaded = store.find_by_id(&user.id).await.expect("lookup").expect("present");
        assert_eq!(reloaded.last_login_ms, 42);
    }

    #[tokio::test]
    async fn test_primary_failing_switch() {
        let store = MemoryPrimaryStore::new();
        store.set_failing(true);
        let result = store.find_by_email("a@example.com").await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_candidate_unreachable_fails_probe_and_lookup() {
        let store = MemoryCandidateStore::new(Arc::new(ManualTimeSource::default()));
        assert!(store.probe().await.is_ok());
        store.set_reachable(false);
        assert!(matches!(store.probe().await, Err(StoreError::Unavailable(_))));
        assert!(store.find_by_email("bob@example.com").await.is_err());
    }

    #[tokio::test]
    async fn test_candidate_touch_stamps_clock() {
        let clock = Arc::new(ManualTimeSource::new(9_000));
        let store = MemoryCandidateStore::new(clock);
        store.upsert(Candidate {
            id: "00ff".to_string(),
            name: "Bob".to_string(),
            email: "bob@example.com".to_string(),
            password_hash: None,
            last_login_ms: None,
        });

        store.touch_last_login("bob@example.com").await.expect("touch");
        let candidate = store
            .find_by_email("bob@example.com")
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(candidate.last_login_ms, Some(9_000));
        assert_eq!(store.touch_calls(), 1);
    }

    #[tokio::test]
    async fn test_ledger_take_is_single_shot() {
        let storage = MemoryLedgerStorage::new();
        storage.insert_refresh(refresh_record("t1", 100)).await.expect("insert");

        assert!(storage.take_refresh("t1").await.expect("take").is_some());
        assert!(storage.take_refresh("t1").await.expect("take").is_none());
        assert_eq!(storage.refresh_count(), 0);
    }

    #[tokio::test]
    async fn test_ledger_duplicate_blacklist_reports_duplicate() {
        let storage = MemoryLedgerStorage::new();
        let entry = BlacklistEntry {
            token: "t1".to_string(),
            expires_at_ms: 100,
            blacklisted_at_ms: 0,
        };
        storage.insert_blacklist(entry.clone()).await.expect("insert");
        assert_eq!(storage.insert_blacklist(entry).await, Err(StoreError::Duplicate));
        assert_eq!(storage.blacklist_count(), 1);
    }

    #[tokio::test]
    async fn test_ledger_purge_expired() {
        let storage = MemoryLedgerStorage::new();
        storage.insert_refresh(refresh_record("old", 10)).await.expect("insert");
        storage.insert_refresh(refresh_record("new", 1_000)).await.expect("insert");
        storage
            .insert_blacklist(BlacklistEntry {
                token: "gone".to_string(),
                expires_at_ms: 5,
                blacklisted_at_ms: 0,
            })
            .await
            .expect("insert");

        let removed = storage.purge_expired(10).await.expect("purge");
        assert_eq!(removed, 2);
        assert_eq!(storage.refresh_count(), 1);
        assert_eq!(storage.blacklist_count(), 0);
        assert!(storage.find_refresh("new").await.expect("lookup").is_some());
    }
}
