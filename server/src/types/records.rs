//! Stored records for both credential stores and the token ledger.
//!
//! Timestamps are milliseconds since Unix epoch, taken from the injected
//! `TimeSource`.

use crate::types::identity::{Origin, Principal};

/// A locally registered user in the primary store.
///
/// # Invariants
/// - `email` is unique within the primary store.
/// - Records are never hard-deleted by the auth core.
#[derive(Clone, PartialEq, Eq)]
pub struct PrimaryUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub last_login_ms: u64,
}

impl PrimaryUser {
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            origin: Origin::Primary,
        }
    }
}

// Hand-written so hashes never end up in logs.
impl std::fmt::Debug for PrimaryUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryUser")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("last_login_ms", &self.last_login_ms)
            .finish_non_exhaustive()
    }
}

/// A row of the external `candidates` table.
///
/// Read-only from this service's side except for `last_login`.
#[derive(Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Hex rendering of the row's binary key.
    pub id: String,
    pub name: String,
    pub email: String,
    /// `None` when the external system never set a password for this candidate.
    pub password_hash: Option<String>,
    pub last_login_ms: Option<u64>,
}

impl Candidate {
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            origin: Origin::External,
        }
    }
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("has_password", &self.password_hash.is_some())
            .field("last_login_ms", &self.last_login_ms)
            .finish()
    }
}

/// Durable counterpart of an outstanding refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub subject_id: String,
    /// Unique across the ledger.
    pub token: String,
    pub expires_at_ms: u64,
    pub created_at_ms: u64,
}

impl RefreshTokenRecord {
    /// Lookups treat expired records as absent.
    #[must_use]
    pub const fn is_live(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms
    }
}

/// A token revoked before its natural expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlacklistEntry {
    /// Unique across the blacklist.
    pub token: String,
    pub expires_at_ms: u64,
    pub blacklisted_at_ms: u64,
}

impl BlacklistEntry {
    #[must_use]
    pub const fn is_live(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms
    }
}
