//! Common helpers for end-to-end tests.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};

use crate::auth::{AuthService, AuthServiceParts, PasswordHasher, TokenConfig};
use crate::http::{AppState, CookiePolicy, router};
use crate::store::memory::{MemoryCandidateStore, MemoryLedgerStorage, MemoryPrimaryStore};
use crate::store::{LedgerStorage, PrimaryUserStore};
use crate::time::ManualTimeSource;
use crate::types::Candidate;

pub const ACCESS_LIFETIME: Duration = Duration::from_secs(15 * 60);
pub const REFRESH_LIFETIME: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// An `AuthService` wired to in-memory stores, plus handles to poke at them.
pub struct Harness {
    pub service: Arc<AuthService>,
    pub primary: Arc<MemoryPrimaryStore>,
    pub candidates: Arc<MemoryCandidateStore>,
    pub ledger: Arc<MemoryLedgerStorage>,
    pub clock: Arc<ManualTimeSource>,
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        Self::with_stores(Arc::new(MemoryPrimaryStore::new()), Arc::new(MemoryLedgerStorage::new()))
    }

    /// Build a harness around the given primary store and ledger storage,
    /// e.g. a SQLite store serving both roles.
    pub fn with_backends(
        primary_store: Arc<dyn PrimaryUserStore>,
        ledger_storage: Arc<dyn LedgerStorage>,
    ) -> (Arc<AuthService>, Arc<MemoryCandidateStore>, Arc<ManualTimeSource>) {
        let clock = Arc::new(ManualTimeSource::default());
        let candidates = Arc::new(MemoryCandidateStore::new(clock.clone()));
        let service = build_service(primary_store, candidates.clone(), ledger_storage, clock.clone());
        (service, candidates, clock)
    }

    fn with_stores(primary: Arc<MemoryPrimaryStore>, ledger: Arc<MemoryLedgerStorage>) -> Self {
        let clock = Arc::new(ManualTimeSource::default());
        let candidates = Arc::new(MemoryCandidateStore::new(clock.clone()));
        let service = build_service(primary.clone(), candidates.clone(), ledger.clone(), clock.clone());
        Self {
            service,
            primary,
            candidates,
            ledger,
            clock,
        }
    }

    /// Add a candidate to the external store with a bcrypt hash of `password`.
    pub fn seed_candidate(&self, name: &str, email: &str, password: Option<&str>) -> Candidate {
        #[allow(clippy::expect_used)]
        let password_hash = password.map(|pw| bcrypt::hash(pw, 4).expect("bcrypt hash"));
        let candidate = Candidate {
            id: format!("c0ffee{:02x}", email.len()),
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            last_login_ms: None,
        };
        self.candidates.upsert(candidate.clone());
        candidate
    }

    /// The axum router over this harness's service.
    #[must_use]
    pub fn router(&self) -> Router {
        router(AppState {
            auth: Arc::clone(&self.service),
            cookies: CookiePolicy {
                secure: false,
                access_max_age: ACCESS_LIFETIME,
                refresh_max_age: REFRESH_LIFETIME,
            },
        })
    }

    /// Move the clock past the access-token lifetime.
    pub fn expire_access(&self) {
        self.clock.advance(duration_ms(ACCESS_LIFETIME));
    }
}

fn build_service(
    primary_store: Arc<dyn PrimaryUserStore>,
    candidate_store: Arc<MemoryCandidateStore>,
    ledger_storage: Arc<dyn LedgerStorage>,
    clock: Arc<ManualTimeSource>,
) -> Arc<AuthService> {
    #[allow(clippy::expect_used)]
    let token_config = TokenConfig::new(b"e2e-test-secret".to_vec(), ACCESS_LIFETIME, REFRESH_LIFETIME)
        .expect("valid token config");
    Arc::new(AuthService::new(AuthServiceParts {
        primary_store,
        candidate_store,
        ledger_storage,
        token_config,
        hasher: PasswordHasher::fast_for_tests(),
        clock,
    }))
}

#[must_use]
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// =============================================================================
// HTTP helpers
// =============================================================================

/// A JSON POST request with optional cookies.
#[must_use]
pub fn post_json(uri: &str, body: &serde_json::Value, cookies: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie_header(cookies) {
        builder = builder.header(header::COOKIE, cookie);
    }
    #[allow(clippy::expect_used)]
    builder.body(Body::from(body.to_string())).expect("request")
}

/// A bodyless request with optional cookies.
#[must_use]
pub fn request(method: &str, uri: &str, cookies: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie_header(cookies) {
        builder = builder.header(header::COOKIE, cookie);
    }
    #[allow(clippy::expect_used)]
    builder.body(Body::empty()).expect("request")
}

fn cookie_header(cookies: &[(&str, &str)]) -> Option<String> {
    (!cookies.is_empty()).then(|| {
        cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    })
}

/// All `Set-Cookie` headers of a response.
#[must_use]
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// The value a response sets for cookie `name`.
#[must_use]
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies(response).into_iter().find_map(|cookie| {
        cookie
            .strip_prefix(&prefix)
            .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
    })
}

/// Collect and parse a JSON response body.
pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    #[allow(clippy::expect_used)]
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    #[allow(clippy::expect_used)]
    serde_json::from_slice(&bytes).expect("json body")
}
