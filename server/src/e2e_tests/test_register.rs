//! Registration against the two stores.

use crate::auth::AuthError;
use crate::e2e_tests::helpers::*;
use crate::types::Origin;

#[tokio::test]
async fn test_register_fresh_user() {
    let h = Harness::new();

    let session = h
        .service
        .register("Alice", "alice@example.com", "wonderland")
        .await
        .expect("register");

    assert_eq!(session.principal.name, "Alice");
    assert_eq!(session.principal.email, "alice@example.com");
    assert_eq!(session.principal.origin, Origin::Primary);
    assert_eq!(h.primary.len(), 1);
    assert_eq!(h.ledger.refresh_count(), 1);
}

#[tokio::test]
async fn test_register_existing_primary_email() {
    let h = Harness::new();
    h.service
        .register("Alice", "alice@example.com", "wonderland")
        .await
        .expect("first registration");

    let second = h
        .service
        .register("Alice Again", "alice@example.com", "other")
        .await;
    assert_eq!(second.err(), Some(AuthError::AlreadyExists));
    assert_eq!(h.primary.len(), 1);
    assert_eq!(h.ledger.refresh_count(), 1);
}

#[tokio::test]
async fn test_register_existing_external_email() {
    let h = Harness::new();
    h.seed_candidate("Bob", "bob@example.com", Some("builder"));

    let result = h.service.register("Bob", "bob@example.com", "anything").await;
    assert_eq!(result.err(), Some(AuthError::AlreadyExists));
    assert!(h.primary.is_empty());
    assert_eq!(h.ledger.refresh_count(), 0);
}

#[tokio::test]
async fn test_register_external_candidate_without_password_still_blocks() {
    let h = Harness::new();
    h.seed_candidate("Carol", "carol@example.com", None);

    let result = h.service.register("Carol", "carol@example.com", "pw").await;
    assert_eq!(result.err(), Some(AuthError::AlreadyExists));
    assert!(h.primary.is_empty());
}

#[tokio::test]
async fn test_register_external_unreachable_is_unavailable() {
    let h = Harness::new();
    h.candidates.set_reachable(false);

    let result = h.service.register("Alice", "alice@example.com", "pw").await;
    assert_eq!(result.err(), Some(AuthError::ServiceUnavailable));
    assert!(h.primary.is_empty());
}

#[tokio::test]
async fn test_register_external_unreachable_blocks_fresh_email() {
    let h = Harness::new();
    h.service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");
    h.candidates.set_reachable(false);

    // A populated primary store does not let a fresh email through.
    let fresh = h.service.register("Dave", "dave@example.com", "pw").await;
    assert_eq!(fresh.err(), Some(AuthError::ServiceUnavailable));
    assert_eq!(h.primary.len(), 1);
}

#[tokio::test]
async fn test_register_primary_duplicate_answers_before_external_probe() {
    let h = Harness::new();
    h.service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");
    h.candidates.set_reachable(false);

    // The primary check runs first, so a known email is a duplicate even
    // while the external store is down.
    let again = h.service.register("Alice", "alice@example.com", "pw").await;
    assert_eq!(again.err(), Some(AuthError::AlreadyExists));
    assert_eq!(h.primary.len(), 1);
}

#[tokio::test]
async fn test_register_primary_failure_with_external_down_is_check_failed() {
    let h = Harness::new();
    h.primary.set_failing(true);
    h.candidates.set_reachable(false);

    let result = h.service.register("Alice", "alice@example.com", "pw").await;
    assert_eq!(result.err(), Some(AuthError::CheckFailed));
}

#[tokio::test]
async fn test_register_primary_lookup_failure_is_check_failed() {
    let h = Harness::new();
    h.primary.set_failing(true);

    let result = h.service.register("Alice", "alice@example.com", "pw").await;
    assert_eq!(result.err(), Some(AuthError::CheckFailed));
}

#[tokio::test]
async fn test_register_missing_fields() {
    let h = Harness::new();
    let result = h.service.register("", "alice@example.com", "pw").await;
    assert_eq!(result.err(), Some(AuthError::MissingFields));
    assert!(h.primary.is_empty());
}

#[tokio::test]
async fn test_concurrent_registrations_create_one_user() {
    let h = Harness::new();

    let (first, second) = tokio::join!(
        h.service.register("Alice", "alice@example.com", "one"),
        h.service.register("Alice", "alice@example.com", "two"),
    );

    let successes = [first.is_ok(), second.is_ok()].into_iter().filter(|ok| *ok).count();
    assert_eq!(successes, 1);
    let failure = first.err().or(second.err());
    assert_eq!(failure, Some(AuthError::AlreadyExists));
    assert_eq!(h.primary.len(), 1);
}

#[tokio::test]
async fn test_registered_user_can_log_in() {
    let h = Harness::new();
    let registered = h
        .service
        .register("Alice", "alice@example.com", "wonderland")
        .await
        .expect("register");

    let session = h
        .service
        .login("alice@example.com", "wonderland")
        .await
        .expect("login");
    assert_eq!(session.principal, registered.principal);
}
