//! Credential store adapters.
//!
//! Two independently owned user populations sit behind a shared
//! `{id, name, email}` projection:
//!
//! - [`PrimaryCredentials`] owns locally registered users: create, lookup,
//!   password verification, last-login bookkeeping.
//! - [`ExternalCredentials`] reads the external system of record: availability
//!   probe, lookup, authentication, and a best-effort last-login stamp.
//!
//! # Invariants
//! - Best-effort writes (`record_login`, `touch_last_login`) never propagate
//!   failures; they are logged and swallowed.
//! - `ExternalCredentials::authenticate` fails closed: a candidate without a
//!   password hash never authenticates.

use std::sync::Arc;

use crate::auth::PasswordHasher;
use crate::store::{CandidateStore, PrimaryUserStore, StoreError};
use crate::time::TimeSource;
use crate::types::{Candidate, PrimaryUser};

/// Error returned when creating a primary credential fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// The unique email index rejected the insert.
    DuplicateEmail,
    /// Any other store failure.
    Store(StoreError),
}

impl std::fmt::Display for CredentialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateEmail => write!(f, "email already registered"),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CredentialError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::DuplicateEmail => None,
        }
    }
}

impl From<StoreError> for CredentialError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate => Self::DuplicateEmail,
            other => Self::Store(other),
        }
    }
}

/// Adapter over the primary user store.
#[derive(Clone)]
pub struct PrimaryCredentials {
    store: Arc<dyn PrimaryUserStore>,
    hasher: PasswordHasher,
    clock: Arc<dyn TimeSource>,
}

impl PrimaryCredentials {
    #[must_use]
    pub fn new(
        store: Arc<dyn PrimaryUserStore>,
        hasher: PasswordHasher,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            store,
            hasher,
            clock,
        }
    }

    pub async fn lookup_by_email(&self, email: &str) -> Result<Option<PrimaryUser>, StoreError> {
        self.store.find_by_email(email).await
    }

    pub async fn lookup_by_id(&self, id: &str) -> Result<Option<PrimaryUser>, StoreError> {
        self.store.find_by_id(id).await
    }

    /// Create a user from an already computed password hash.
    ///
    /// # Errors
    /// Returns `CredentialError::DuplicateEmail` when another record with this
    /// email exists, including one inserted by a concurrent registration.
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<PrimaryUser, CredentialError> {
        let user = self
            .store
            .insert(name, email, password_hash, self.clock.now_ms())
            .await?;
        tracing::info!("created primary user {} for {}", user.id, user.email);
        Ok(user)
    }

    pub async fn verify_password(&self, user: &PrimaryUser, plaintext: &str) -> bool {
        self.hasher.verify(plaintext, &user.password_hash).await
    }

    /// Stamp `last_login` with the current time. Best-effort.
    pub async fn record_login(&self, user: &PrimaryUser) {
        if let Err(e) = self.store.set_last_login(&user.id, self.clock.now_ms()).await {
            tracing::warn!("failed to update last login for primary user {}: {e}", user.id);
        }
    }
}

/// Adapter over the external candidate store.
#[derive(Clone)]
pub struct ExternalCredentials {
    store: Arc<dyn CandidateStore>,
    hasher: PasswordHasher,
}

impl ExternalCredentials {
    #[must_use]
    pub fn new(store: Arc<dyn CandidateStore>, hasher: PasswordHasher) -> Self {
        Self { store, hasher }
    }

    /// Live connectivity probe.
    pub async fn is_available(&self) -> bool {
        match self.store.probe().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("external credential store not available: {e}");
                false
            }
        }
    }

    pub async fn lookup_by_email(&self, email: &str) -> Result<Option<Candidate>, StoreError> {
        self.store.find_by_email(email).await
    }

    /// Look up a candidate and check the password.
    ///
    /// Returns `Ok(None)` when the candidate does not exist, has no password
    /// set, or the password does not match.
    pub async fn authenticate(
        &self,
        email: &str,
        plaintext: &str,
    ) -> Result<Option<Candidate>, StoreError> {
        let Some(candidate) = self.store.find_by_email(email).await? else {
            tracing::debug!("no external candidate for {email}");
            return Ok(None);
        };

        let Some(hash) = candidate.password_hash.as_deref() else {
            tracing::warn!("external candidate {email} has no password set");
            return Ok(None);
        };

        if !self.hasher.verify(plaintext, hash).await {
            tracing::debug!("external password mismatch for {email}");
            return Ok(None);
        }

        Ok(Some(candidate))
    }

    /// Stamp the candidate's `last_login`. Best-effort.
    pub async fn touch_last_login(&self, email: &str) {
        if let Err(e) = self.store.touch_last_login(email).await {
            tracing::warn!("failed to update last login for external candidate {email}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryCandidateStore, MemoryPrimaryStore};
    use crate::time::ManualTimeSource;

    fn candidate(email: &str, password_hash: Option<String>) -> Candidate {
        Candidate {
            id: "0a0b".to_string(),
            name: "Bob".to_string(),
            email: email.to_string(),
            password_hash,
            last_login_ms: None,
        }
    }

    #[tokio::test]
    async fn test_primary_create_duplicate_email() {
        let clock = Arc::new(ManualTimeSource::default());
        let credentials = PrimaryCredentials::new(
            Arc::new(MemoryPrimaryStore::new()),
            PasswordHasher::fast_for_tests(),
            clock,
        );
        credentials
            .create("Alice", "alice@example.com", "hash")
            .await
            .expect("create");
        let second = credentials.create("Alice", "alice@example.com", "hash").await;
        assert_eq!(second, Err(CredentialError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_primary_verify_password() {
        let hasher = PasswordHasher::fast_for_tests();
        let clock = Arc::new(ManualTimeSource::default());
        let credentials =
            PrimaryCredentials::new(Arc::new(MemoryPrimaryStore::new()), hasher, clock);
        let hash = hasher.hash("pw").await.expect("hash");
        let user = credentials
            .create("Alice", "alice@example.com", &hash)
            .await
            .expect("create");

        assert!(credentials.verify_password(&user, "pw").await);
        assert!(!credentials.verify_password(&user, "nope").await);
    }

    #[tokio::test]
    async fn test_primary_record_login_swallows_failure() {
        let store = Arc::new(MemoryPrimaryStore::new());
        let clock = Arc::new(ManualTimeSource::new(1_000));
        let credentials =
            PrimaryCredentials::new(store.clone(), PasswordHasher::fast_for_tests(), clock.clone());
        let user = credentials
            .create("Alice", "alice@example.com", "hash")
            .await
            .expect("create");

        clock.advance(500);
        credentials.record_login(&user).await;
        let reloaded = credentials
            .lookup_by_id(&user.id)
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(reloaded.last_login_ms, 1_500);

        store.set_failing(true);
        credentials.record_login(&user).await;
    }

    #[tokio::test]
    async fn test_external_authenticate_paths() {
        let hasher = PasswordHasher::fast_for_tests();
        let store = Arc::new(MemoryCandidateStore::new(Arc::new(ManualTimeSource::default())));
        let hash = hasher.hash("secret").await.expect("hash");
        store.upsert(candidate("bob@example.com", Some(hash)));
        store.upsert(candidate("nopass@example.com", None));
        let credentials = ExternalCredentials::new(store, hasher);

        let ok = credentials
            .authenticate("bob@example.com", "secret")
            .await
            .expect("authenticate");
        assert_eq!(ok.map(|c| c.email), Some("bob@example.com".to_string()));

        let wrong = credentials
            .authenticate("bob@example.com", "guess")
            .await
            .expect("authenticate");
        assert!(wrong.is_none());

        let missing = credentials
            .authenticate("nobody@example.com", "secret")
            .await
            .expect("authenticate");
        assert!(missing.is_none());

        let no_password = credentials
            .authenticate("nopass@example.com", "")
            .await
            .expect("authenticate");
        assert!(no_password.is_none());
    }

    #[tokio::test]
    async fn test_external_availability_and_errors() {
        let store = Arc::new(MemoryCandidateStore::new(Arc::new(ManualTimeSource::default())));
        let credentials = ExternalCredentials::new(store.clone(), PasswordHasher::fast_for_tests());
        assert!(credentials.is_available().await);

        store.set_reachable(false);
        assert!(!credentials.is_available().await);
        assert!(credentials.authenticate("bob@example.com", "pw").await.is_err());
    }

    #[tokio::test]
    async fn test_external_touch_swallows_failure() {
        let store = Arc::new(MemoryCandidateStore::new(Arc::new(ManualTimeSource::default())));
        store.set_touch_failing(true);
        let credentials = ExternalCredentials::new(store.clone(), PasswordHasher::fast_for_tests());
        credentials.touch_last_login("bob@example.com").await;
        assert_eq!(store.touch_calls(), 1);
    }

    #[test]
    fn test_credential_error_from_store_error() {
        assert_eq!(
            CredentialError::from(StoreError::Duplicate),
            CredentialError::DuplicateEmail
        );
        assert!(matches!(
            CredentialError::from(StoreError::Backend("x".to_string())),
            CredentialError::Store(_)
        ));
    }
}
