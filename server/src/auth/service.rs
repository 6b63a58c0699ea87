//! Authentication orchestrator.
//!
//! Composes the credential adapters, the token issuer and the token ledger
//! into the register / login / refresh / logout / authorize operations. Each
//! operation is a short, sequential transaction; nothing is held between
//! requests except the shared store handles.
//!
//! # Invariants
//! - Registration succeeds only after a negative answer from BOTH stores. An
//!   unreachable external store fails the registration (fail-closed).
//! - Blacklist reads fail open (see `TokenLedger::is_blacklisted`). The two
//!   polarities protect different properties and stay separate.
//! - Login resolves sources in priority order, external first when reachable;
//!   records present in both stores are never merged.
//! - Every refresh consumes its ledger record atomically, so a refresh token
//!   can be exchanged at most once.

use std::sync::Arc;

use crate::auth::credentials::{CredentialError, ExternalCredentials, PrimaryCredentials};
use crate::auth::jwt::{TokenIssuer, TokenKind, TokenPair};
use crate::auth::ledger::TokenLedger;
use crate::auth::{AuthError, PasswordHasher, TokenConfig};
use crate::store::{CandidateStore, LedgerStorage, PrimaryUserStore};
use crate::time::TimeSource;
use crate::types::{Identity, Origin, Principal};

/// Shared resources the orchestrator is built from.
pub struct AuthServiceParts {
    pub primary_store: Arc<dyn PrimaryUserStore>,
    pub candidate_store: Arc<dyn CandidateStore>,
    pub ledger_storage: Arc<dyn LedgerStorage>,
    pub token_config: TokenConfig,
    pub hasher: PasswordHasher,
    pub clock: Arc<dyn TimeSource>,
}

/// A freshly authenticated principal and its token pair.
#[derive(Debug, Clone)]
pub struct Session {
    pub principal: Principal,
    pub tokens: TokenPair,
}

/// The result of a refresh-token rotation.
#[derive(Debug, Clone)]
pub struct RotatedSession {
    pub identity: Identity,
    pub tokens: TokenPair,
}

fn non_empty(token: Option<&str>) -> Option<&str> {
    token.filter(|token| !token.is_empty())
}

pub struct AuthService {
    primary: PrimaryCredentials,
    external: ExternalCredentials,
    issuer: TokenIssuer,
    ledger: TokenLedger,
    hasher: PasswordHasher,
}

impl AuthService {
    #[must_use]
    pub fn new(parts: AuthServiceParts) -> Self {
        let AuthServiceParts {
            primary_store,
            candidate_store,
            ledger_storage,
            token_config,
            hasher,
            clock,
        } = parts;

        Self {
            primary: PrimaryCredentials::new(primary_store, hasher, Arc::clone(&clock)),
            external: ExternalCredentials::new(candidate_store, hasher),
            issuer: TokenIssuer::new(token_config, Arc::clone(&clock)),
            ledger: TokenLedger::new(ledger_storage, clock),
            hasher,
        }
    }

    #[cfg(test)]
    pub(crate) const fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    #[cfg(test)]
    pub(crate) const fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    /// Register a new primary user.
    ///
    /// # Errors
    /// - `MissingFields` if any input is empty.
    /// - `AlreadyExists` if either store already knows `email`, including a
    ///   concurrent registration that won the unique-index race.
    /// - `ServiceUnavailable` if the external store cannot be probed.
    /// - `CheckFailed` if a uniqueness lookup errors.
    /// - `Internal` if hashing, token signing or ledger writes fail.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }

        match self.primary.lookup_by_email(email).await {
            Ok(Some(_)) => {
                tracing::info!("registration rejected, {email} already registered");
                return Err(AuthError::AlreadyExists);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!("primary uniqueness check failed for {email}: {e}");
                return Err(AuthError::CheckFailed);
            }
        }

        if !self.external.is_available().await {
            tracing::error!("external store unavailable during registration, blocking {email}");
            return Err(AuthError::ServiceUnavailable);
        }

        match self.external.lookup_by_email(email).await {
            Ok(Some(_)) => {
                tracing::info!("registration rejected, {email} already registered");
                return Err(AuthError::AlreadyExists);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!("external uniqueness check failed for {email}: {e}");
                return Err(AuthError::CheckFailed);
            }
        }

        let password_hash = self
            .hasher
            .hash(password)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let user = match self.primary.create(name, email, &password_hash).await {
            Ok(user) => user,
            Err(CredentialError::DuplicateEmail) => {
                tracing::info!("registration for {email} lost a concurrent insert race");
                return Err(AuthError::AlreadyExists);
            }
            Err(CredentialError::Store(e)) => return Err(AuthError::Internal(e.to_string())),
        };

        let principal = user.principal();
        let tokens = self.start_session(&principal).await?;
        Ok(Session { principal, tokens })
    }

    /// Authenticate against the external store first, then the primary store.
    ///
    /// # Errors
    /// - `MissingFields` if either input is empty.
    /// - `InvalidCredentials` if neither store produced a match.
    /// - `Internal` if the primary lookup or session start fails.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }

        let principal = match self.login_external(email, password).await {
            Some(principal) => principal,
            None => self
                .login_primary(email, password)
                .await?
                .ok_or_else(|| {
                    tracing::info!("login failed for {email}");
                    AuthError::InvalidCredentials
                })?,
        };

        tracing::info!("login succeeded for {email} via {} store", principal.origin);
        let tokens = self.start_session(&principal).await?;
        Ok(Session { principal, tokens })
    }

    /// External store attempt. Any failure falls through to the primary store.
    async fn login_external(&self, email: &str, password: &str) -> Option<Principal> {
        if !self.external.is_available().await {
            tracing::debug!("external store unreachable, skipping external authentication");
            return None;
        }

        match self.external.authenticate(email, password).await {
            Ok(Some(candidate)) => {
                self.external.touch_last_login(email).await;
                Some(candidate.principal())
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("external authentication errored for {email}: {e}");
                None
            }
        }
    }

    async fn login_primary(&self, email: &str, password: &str) -> Result<Option<Principal>, AuthError> {
        let user = self
            .primary
            .lookup_by_email(email)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let Some(user) = user else {
            return Ok(None);
        };
        if !self.primary.verify_password(&user, password).await {
            tracing::debug!("primary password mismatch for {email}");
            return Ok(None);
        }

        self.primary.record_login(&user).await;
        Ok(Some(user.principal()))
    }

    /// Exchange a refresh token for a new pair, revoking the old one.
    ///
    /// # Errors
    /// - `Unauthenticated` if the token is absent, fails verification, is not
    ///   a refresh token, or has no live ledger record.
    /// - `Invalidated` if the token is blacklisted.
    /// - `Internal` if the ledger cannot be read or written.
    pub async fn refresh_session(&self, refresh_token: Option<&str>) -> Result<RotatedSession, AuthError> {
        let token = non_empty(refresh_token).ok_or(AuthError::Unauthenticated)?;

        if self.ledger.is_blacklisted(token).await {
            tracing::info!("refresh rejected, token has been invalidated");
            return Err(AuthError::Invalidated);
        }

        let claims = self.issuer.verify(token, TokenKind::Refresh).map_err(|e| {
            tracing::debug!("refresh token rejected: {e}");
            AuthError::Unauthenticated
        })?;

        let record = self
            .ledger
            .take_refresh(token)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .ok_or_else(|| {
                tracing::info!("refresh rejected, no live ledger record for {}", claims.sub);
                AuthError::Unauthenticated
            })?;

        let identity = claims.identity();
        let tokens = self
            .issuer
            .issue_pair(&identity.id, &identity.email, identity.origin)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        // The ledger record is already gone; the blacklist entry is a second line.
        if let Err(e) = self.ledger.blacklist(token).await {
            tracing::warn!("failed to blacklist rotated refresh token: {e}");
        }

        self.ledger
            .record_refresh(&record.subject_id, &tokens.refresh.token, tokens.refresh.expires_at_ms)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        tracing::debug!("rotated refresh token for {}", identity.id);
        Ok(RotatedSession { identity, tokens })
    }

    /// End a session. Never fails.
    ///
    /// Each present token is blacklisted independently and the refresh record
    /// is deleted; every failure is logged and skipped.
    pub async fn logout(&self, access_token: Option<&str>, refresh_token: Option<&str>) {
        let access_token = non_empty(access_token);
        let refresh_token = non_empty(refresh_token);

        for token in [access_token, refresh_token].into_iter().flatten() {
            if let Err(e) = self.ledger.blacklist(token).await {
                tracing::warn!("failed to blacklist token during logout: {e}");
            }
        }

        if let Some(token) = refresh_token
            && let Err(e) = self.ledger.delete_refresh(token).await
        {
            tracing::warn!("failed to delete refresh record during logout: {e}");
        }
    }

    /// Resolve the principal behind an access token.
    ///
    /// # Errors
    /// Returns `Unauthenticated` if the token is absent, blacklisted, fails
    /// verification, or is not an access token.
    pub async fn authorize(&self, access_token: Option<&str>) -> Result<Identity, AuthError> {
        let token = non_empty(access_token).ok_or(AuthError::Unauthenticated)?;

        if self.ledger.is_blacklisted(token).await {
            tracing::debug!("access token has been invalidated");
            return Err(AuthError::Unauthenticated);
        }

        let claims = self.issuer.verify(token, TokenKind::Access).map_err(|e| {
            tracing::debug!("access token rejected: {e}");
            AuthError::Unauthenticated
        })?;
        Ok(claims.identity())
    }

    /// Load the current record of an authorized principal from its own store.
    ///
    /// # Errors
    /// Returns `NotFound` if the record is gone and `Internal` on store errors.
    pub async fn profile(&self, identity: &Identity) -> Result<Principal, AuthError> {
        let principal = match identity.origin {
            Origin::Primary => self
                .primary
                .lookup_by_id(&identity.id)
                .await
                .map_err(|e| AuthError::Internal(e.to_string()))?
                .map(|user| user.principal()),
            Origin::External => self
                .external
                .lookup_by_email(&identity.email)
                .await
                .map_err(|e| AuthError::Internal(e.to_string()))?
                .map(|candidate| candidate.principal()),
        };
        principal.ok_or(AuthError::NotFound)
    }

    /// Issue a pair for `principal` and persist the refresh record.
    async fn start_session(&self, principal: &Principal) -> Result<TokenPair, AuthError> {
        let tokens = self
            .issuer
            .issue_pair(&principal.id, &principal.email, principal.origin)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        self.ledger
            .record_refresh(&principal.id, &tokens.refresh.token, tokens.refresh.expires_at_ms)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryCandidateStore, MemoryLedgerStorage, MemoryPrimaryStore};
    use crate::time::ManualTimeSource;

    struct Fixture {
        service: AuthService,
        candidates: Arc<MemoryCandidateStore>,
        ledger: Arc<MemoryLedgerStorage>,
        clock: Arc<ManualTimeSource>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualTimeSource::default());
        let candidates = Arc::new(MemoryCandidateStore::new(clock.clone()));
        let ledger = Arc::new(MemoryLedgerStorage::new());
        let service = AuthService::new(AuthServiceParts {
            primary_store: Arc::new(MemoryPrimaryStore::new()),
            candidate_store: candidates.clone(),
            ledger_storage: ledger.clone(),
            token_config: TokenConfig::with_default_lifetimes(b"service-test-secret".to_vec())
                .expect("valid config"),
            hasher: PasswordHasher::fast_for_tests(),
            clock: clock.clone(),
        });
        Fixture {
            service,
            candidates,
            ledger,
            clock,
        }
    }

    #[tokio::test]
    async fn test_register_records_refresh_token() {
        let f = fixture();
        let session = f
            .service
            .register("Alice", "alice@example.com", "pw")
            .await
            .expect("register");

        assert_eq!(session.principal.origin, Origin::Primary);
        assert_eq!(f.ledger.refresh_count(), 1);
        let record = f
            .service
            .ledger()
            .find_refresh(&session.tokens.refresh.token)
            .await
            .expect("find")
            .expect("live");
        assert_eq!(record.subject_id, session.principal.id);
    }

    #[tokio::test]
    async fn test_register_rejects_empty_fields() {
        let f = fixture();
        for (name, email, password) in [("", "a@x.io", "pw"), ("A", "", "pw"), ("A", "a@x.io", "")] {
            assert_eq!(
                f.service.register(name, email, password).await.err(),
                Some(AuthError::MissingFields)
            );
        }
    }

    #[tokio::test]
    async fn test_register_fails_closed_when_external_unreachable() {
        let f = fixture();
        f.candidates.set_reachable(false);
        let result = f.service.register("Alice", "alice@example.com", "pw").await;
        assert_eq!(result.err(), Some(AuthError::ServiceUnavailable));
        assert_eq!(f.ledger.refresh_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_rotates_once() {
        let f = fixture();
        let session = f
            .service
            .register("Alice", "alice@example.com", "pw")
            .await
            .expect("register");
        let old = session.tokens.refresh.token;

        let rotated = f.service.refresh_session(Some(&old)).await.expect("refresh");
        assert_ne!(rotated.tokens.refresh.token, old);
        assert_eq!(rotated.identity, session.principal.identity());

        let replay = f.service.refresh_session(Some(&old)).await;
        assert_eq!(replay.err(), Some(AuthError::Invalidated));
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let f = fixture();
        let session = f
            .service
            .register("Alice", "alice@example.com", "pw")
            .await
            .expect("register");
        let result = f
            .service
            .refresh_session(Some(&session.tokens.access.token))
            .await;
        assert_eq!(result.err(), Some(AuthError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_authorize_until_expiry() {
        let f = fixture();
        let session = f
            .service
            .register("Alice", "alice@example.com", "pw")
            .await
            .expect("register");
        let access = session.tokens.access.token;

        let identity = f.service.authorize(Some(&access)).await.expect("authorize");
        assert_eq!(identity.email, "alice@example.com");

        f.clock.advance(15 * 60 * 1000);
        assert_eq!(
            f.service.authorize(Some(&access)).await.err(),
            Some(AuthError::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn test_logout_without_tokens_is_silent() {
        let f = fixture();
        f.service.logout(None, Some("")).await;
        assert_eq!(f.ledger.blacklist_count(), 0);
    }
}
