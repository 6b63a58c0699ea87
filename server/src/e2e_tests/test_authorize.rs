//! Access-token authorization and the profile lookup behind it.

use crate::auth::{AuthError, TokenConfig, TokenIssuer};
use crate::e2e_tests::helpers::*;
use crate::types::Origin;

#[tokio::test]
async fn test_access_token_round_trip_until_expiry() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");
    let access = session.tokens.access.token;

    let identity = h.service.authorize(Some(&access)).await.expect("authorize");
    assert_eq!(identity, session.principal.identity());

    h.clock.advance(duration_ms(ACCESS_LIFETIME) - 1_000);
    assert!(h.service.authorize(Some(&access)).await.is_ok());

    h.clock.advance(1_000);
    assert_eq!(
        h.service.authorize(Some(&access)).await.err(),
        Some(AuthError::Unauthenticated)
    );
}

#[tokio::test]
async fn test_refresh_token_cannot_authorize() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");

    assert_eq!(
        h.service
            .authorize(Some(&session.tokens.refresh.token))
            .await
            .err(),
        Some(AuthError::Unauthenticated)
    );
}

#[tokio::test]
async fn test_authorize_rejects_foreign_signature() {
    let h = Harness::new();
    let foreign = TokenIssuer::new(
        TokenConfig::with_default_lifetimes(b"someone-elses-secret".to_vec()).expect("config"),
        h.clock.clone(),
    );
    let pair = foreign
        .issue_pair("mallory", "mallory@example.com", Origin::Primary)
        .expect("issue");

    assert_eq!(
        h.service.authorize(Some(&pair.access.token)).await.err(),
        Some(AuthError::Unauthenticated)
    );
}

#[tokio::test]
async fn test_authorize_fails_open_on_blacklist_outage() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");
    let access = session.tokens.access.token;
    h.service.ledger().blacklist(&access).await.expect("blacklist");

    h.ledger.set_failing(true);
    assert!(h.service.authorize(Some(&access)).await.is_ok());
}

#[tokio::test]
async fn test_profile_primary_and_external() {
    let h = Harness::new();
    let alice = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");
    h.seed_candidate("Bob", "bob@example.com", Some("builder"));
    let bob = h
        .service
        .login("bob@example.com", "builder")
        .await
        .expect("login");

    let profile = h
        .service
        .profile(&alice.principal.identity())
        .await
        .expect("primary profile");
    assert_eq!(profile.name, "Alice");
    assert_eq!(profile.origin, Origin::Primary);

    let profile = h
        .service
        .profile(&bob.principal.identity())
        .await
        .expect("external profile");
    assert_eq!(profile.name, "Bob");
    assert_eq!(profile.origin, Origin::External);
}

#[tokio::test]
async fn test_profile_of_unknown_subject() {
    let h = Harness::new();
    let identity = crate::types::Identity {
        id: "deadbeef".to_string(),
        email: "gone@example.com".to_string(),
        origin: Origin::Primary,
    };
    assert_eq!(
        h.service.profile(&identity).await.err(),
        Some(AuthError::NotFound)
    );
}
