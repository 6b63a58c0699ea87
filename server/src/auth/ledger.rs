//! Token ledger: outstanding refresh tokens and the revocation blacklist.
//!
//! # Post-conditions
//! - `find_refresh` / `take_refresh` never return a record past its
//!   `expires_at_ms`; the TTL is enforced lazily on every lookup, whatever the
//!   storage layer's own eviction does.
//! - `blacklist` is idempotent.
//!
//! # Invariants
//! - `is_blacklisted` fails OPEN: a storage error reads as "not blacklisted",
//!   so a ledger outage degrades to plain signature checks instead of locking
//!   every session out.
//! - `blacklist` never fails on a malformed or already expired token; it only
//!   reports storage errors.

use std::sync::Arc;

use crate::auth::jwt::unverified_expiry_ms;
use crate::store::{LedgerStorage, StoreError};
use crate::time::TimeSource;
use crate::types::{BlacklistEntry, RefreshTokenRecord};

/// Refresh-token records and blacklist over a `LedgerStorage`.
#[derive(Clone)]
pub struct TokenLedger {
    storage: Arc<dyn LedgerStorage>,
    clock: Arc<dyn TimeSource>,
}

impl TokenLedger {
    #[must_use]
    pub fn new(storage: Arc<dyn LedgerStorage>, clock: Arc<dyn TimeSource>) -> Self {
        Self { storage, clock }
    }

    /// Persist the durable counterpart of a freshly issued refresh token.
    pub async fn record_refresh(
        &self,
        subject_id: &str,
        token: &str,
        expires_at_ms: u64,
    ) -> Result<(), StoreError> {
        self.storage
            .insert_refresh(RefreshTokenRecord {
                subject_id: subject_id.to_string(),
                token: token.to_string(),
                expires_at_ms,
                created_at_ms: self.clock.now_ms(),
            })
            .await
    }

    /// Look up a live refresh record.
    pub async fn find_refresh(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let now_ms = self.clock.now_ms();
        Ok(self
            .storage
            .find_refresh(token)
            .await?
            .filter(|record| record.is_live(now_ms)))
    }

    /// Atomically remove a refresh record, returning it if it was live.
    ///
    /// An expired record is removed too but reported as absent.
    pub async fn take_refresh(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let now_ms = self.clock.now_ms();
        Ok(self
            .storage
            .take_refresh(token)
            .await?
            .filter(|record| record.is_live(now_ms)))
    }

    /// Returns whether a record was removed.
    pub async fn delete_refresh(&self, token: &str) -> Result<bool, StoreError> {
        self.storage.delete_refresh(token).await
    }

    /// Revoke a token until its natural expiry.
    ///
    /// The expiry is read from the token without verifying it. Malformed
    /// tokens, tokens without `exp` and tokens already past `exp` are skipped.
    pub async fn blacklist(&self, token: &str) -> Result<(), StoreError> {
        let Some(expires_at_ms) = unverified_expiry_ms(token) else {
            tracing::warn!("cannot blacklist token: invalid token format");
            return Ok(());
        };

        let now_ms = self.clock.now_ms();
        if expires_at_ms <= now_ms {
            tracing::debug!("skipping blacklist of already expired token");
            return Ok(());
        }

        let entry = BlacklistEntry {
            token: token.to_string(),
            expires_at_ms,
            blacklisted_at_ms: now_ms,
        };
        match self.storage.insert_blacklist(entry).await {
            Ok(()) => {
                tracing::debug!("token blacklisted");
                Ok(())
            }
            Err(StoreError::Duplicate) => {
                tracing::debug!("token already blacklisted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Whether a token has been revoked. Fails open.
    pub async fn is_blacklisted(&self, token: &str) -> bool {
        match self.storage.find_blacklist(token).await {
            Ok(entry) => entry.is_some_and(|entry| entry.is_live(self.clock.now_ms())),
            Err(e) => {
                tracing::warn!("blacklist lookup failed, treating token as not blacklisted: {e}");
                false
            }
        }
    }

    /// Drop expired refresh records and blacklist entries from storage.
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let removed = self.storage.purge_expired(self.clock.now_ms()).await?;
        if removed > 0 {
            tracing::info!("purged {removed} expired ledger rows");
        }
        Ok(removed)
    }
}
