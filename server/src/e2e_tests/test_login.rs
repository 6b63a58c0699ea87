//! Login resolution order across the two stores.

use crate::auth::AuthError;
use crate::e2e_tests::helpers::*;
use crate::types::Origin;

#[tokio::test]
async fn test_login_external_candidate() {
    let h = Harness::new();
    let bob = h.seed_candidate("Bob", "bob@example.com", Some("builder"));

    let session = h
        .service
        .login("bob@example.com", "builder")
        .await
        .expect("login");

    assert_eq!(session.principal.origin, Origin::External);
    assert_eq!(session.principal.id, bob.id);
    assert_eq!(session.principal.name, "Bob");
    assert_eq!(h.candidates.touch_calls(), 1);
    assert_eq!(h.ledger.refresh_count(), 1);
}

#[tokio::test]
async fn test_login_prefers_external_when_both_match() {
    let h = Harness::new();
    h.service
        .register("Primary Eve", "eve@example.com", "same-password")
        .await
        .expect("register");
    h.seed_candidate("External Eve", "eve@example.com", Some("same-password"));

    let session = h
        .service
        .login("eve@example.com", "same-password")
        .await
        .expect("login");
    assert_eq!(session.principal.origin, Origin::External);
    assert_eq!(session.principal.name, "External Eve");
}

#[tokio::test]
async fn test_login_falls_back_to_primary_on_external_mismatch() {
    let h = Harness::new();
    h.service
        .register("Primary Eve", "eve@example.com", "primary-pw")
        .await
        .expect("register");
    h.seed_candidate("External Eve", "eve@example.com", Some("external-pw"));

    let session = h
        .service
        .login("eve@example.com", "primary-pw")
        .await
        .expect("login");
    assert_eq!(session.principal.origin, Origin::Primary);
    assert_eq!(h.candidates.touch_calls(), 0);
}

#[tokio::test]
async fn test_login_falls_back_to_primary_when_external_unreachable() {
    let h = Harness::new();
    h.service
        .register("Alice", "alice@example.com", "wonderland")
        .await
        .expect("register");
    h.candidates.set_reachable(false);

    let session = h
        .service
        .login("alice@example.com", "wonderland")
        .await
        .expect("login");
    assert_eq!(session.principal.origin, Origin::Primary);
}

#[tokio::test]
async fn test_login_candidate_without_password_cannot_authenticate() {
    let h = Harness::new();
    h.seed_candidate("Carol", "carol@example.com", None);

    let result = h.service.login("carol@example.com", "anything").await;
    assert_eq!(result.err(), Some(AuthError::InvalidCredentials));
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let h = Harness::new();
    h.service
        .register("Alice", "alice@example.com", "wonderland")
        .await
        .expect("register");

    let wrong_password = h.service.login("alice@example.com", "nope").await.err();
    let unknown_email = h.service.login("nobody@example.com", "nope").await.err();
    assert_eq!(wrong_password, Some(AuthError::InvalidCredentials));
    assert_eq!(wrong_password, unknown_email);
}

#[tokio::test]
async fn test_login_survives_last_login_failure() {
    let h = Harness::new();
    h.seed_candidate("Bob", "bob@example.com", Some("builder"));
    h.candidates.set_touch_failing(true);

    let session = h.service.login("bob@example.com", "builder").await;
    assert!(session.is_ok());
    assert_eq!(h.candidates.touch_calls(), 1);
}

#[tokio::test]
async fn test_login_primary_outage_is_internal() {
    let h = Harness::new();
    h.primary.set_failing(true);

    let result = h.service.login("alice@example.com", "pw").await;
    assert!(matches!(result, Err(AuthError::Internal(_))));
}

#[tokio::test]
async fn test_login_missing_fields() {
    let h = Harness::new();
    assert_eq!(
        h.service.login("", "pw").await.err(),
        Some(AuthError::MissingFields)
    );
    assert_eq!(
        h.service.login("alice@example.com", "").await.err(),
        Some(AuthError::MissingFields)
    );
}
