//! Storage seams for the auth core.
//!
//! The auth core never talks to a database driver directly. It sees three
//! capabilities, each an object-safe async trait so implementations can be
//! swapped behind an `Arc<dyn ...>`:
//!
//! - [`PrimaryUserStore`]: locally registered users (document-store role).
//! - [`CandidateStore`]: the externally owned `candidates` table.
//! - [`LedgerStorage`]: refresh-token records and the token blacklist.
//!
//! # Invariants
//! - `PrimaryUserStore::insert` enforces email uniqueness with a unique index
//!   and reports a violation as `StoreError::Duplicate`.
//! - `LedgerStorage::insert_blacklist` reports an existing token as
//!   `StoreError::Duplicate`; `insert_refresh` does the same for a reused token.
//! - Implementations do not filter expired ledger rows on lookup; the
//!   `TokenLedger` applies the TTL against its own clock.

pub mod memory;
pub mod mysql;
pub mod sqlite;
pub mod sweep;

use async_trait::async_trait;

use crate::types::{BlacklistEntry, Candidate, PrimaryUser, RefreshTokenRecord};

/// Error returned by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique index rejected the write.
    Duplicate,
    /// The backend could not be reached (connect/acquire failure, timeout).
    Unavailable(String),
    /// Any other backend failure.
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Duplicate => write!(f, "unique constraint violated"),
            Self::Unavailable(reason) => write!(f, "store unavailable: {reason}"),
            Self::Backend(reason) => write!(f, "store error: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => Self::Duplicate,
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => Self::Unavailable(error.to_string()),
            _ => Self::Backend(error.to_string()),
        }
    }
}

/// Locally registered users.
#[async_trait]
pub trait PrimaryUserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<PrimaryUser>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<PrimaryUser>, StoreError>;

    /// Insert a new user with a freshly generated id.
    ///
    /// # Errors
    /// Returns `StoreError::Duplicate` if `email` is already taken.
    async fn insert(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        now_ms: u64,
    ) -> Result<PrimaryUser, StoreError>;

    async fn set_last_login(&self, id: &str, now_ms: u64) -> Result<(), StoreError>;
}

/// The external system of record for candidates.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// Live connectivity probe: acquire a connection and release it.
    async fn probe(&self) -> Result<(), StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Candidate>, StoreError>;

    /// Stamp the candidate's `last_login` with the store's own clock.
    async fn touch_last_login(&self, email: &str) -> Result<(), StoreError>;
}

/// Refresh-token records and blacklist entries.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    async fn insert_refresh(&self, record: RefreshTokenRecord) -> Result<(), StoreError>;

    async fn find_refresh(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Atomically remove and return the record for `token`.
    ///
    /// Of two concurrent callers with the same token, at most one receives
    /// `Some`.
    async fn take_refresh(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Returns whether a record was removed.
    async fn delete_refresh(&self, token: &str) -> Result<bool, StoreError>;

    async fn insert_blacklist(&self, entry: BlacklistEntry) -> Result<(), StoreError>;

    async fn find_blacklist(&self, token: &str) -> Result<Option<BlacklistEntry>, StoreError>;

    /// Remove refresh records and blacklist entries with `expires_at_ms <= now_ms`.
    ///
    /// Returns the total number of rows removed.
    async fn purge_expired(&self, now_ms: u64) -> Result<u64, StoreError>;
}
