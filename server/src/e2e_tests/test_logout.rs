//! Logout revokes both tokens and never fails.

use crate::auth::AuthError;
use crate::e2e_tests::helpers::*;

#[tokio::test]
async fn test_logout_revokes_both_tokens() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");
    let access = session.tokens.access.token;
    let refresh = session.tokens.refresh.token;

    h.service.logout(Some(&access), Some(&refresh)).await;

    assert_eq!(h.ledger.blacklist_count(), 2);
    assert_eq!(h.ledger.refresh_count(), 0);
    assert_eq!(
        h.service.authorize(Some(&access)).await.err(),
        Some(AuthError::Unauthenticated)
    );
    assert_eq!(
        h.service.refresh_session(Some(&refresh)).await.err(),
        Some(AuthError::Invalidated)
    );
}

#[tokio::test]
async fn test_logout_with_only_refresh_token() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");

    h.service
        .logout(None, Some(&session.tokens.refresh.token))
        .await;
    assert_eq!(h.ledger.blacklist_count(), 1);
    assert_eq!(h.ledger.refresh_count(), 0);
}

#[tokio::test]
async fn test_logout_tolerates_ledger_outage() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");
    h.ledger.set_failing(true);

    // Completes without panicking or erroring.
    h.service
        .logout(
            Some(&session.tokens.access.token),
            Some(&session.tokens.refresh.token),
        )
        .await;

    h.ledger.set_failing(false);
    assert_eq!(h.ledger.blacklist_count(), 0);
}

#[tokio::test]
async fn test_logout_ignores_malformed_tokens() {
    let h = Harness::new();
    h.service.logout(Some("garbage"), Some("also.garbage")).await;
    assert_eq!(h.ledger.blacklist_count(), 0);
}

#[tokio::test]
async fn test_logout_skips_expired_access_token() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");
    h.expire_access();

    h.service
        .logout(
            Some(&session.tokens.access.token),
            Some(&session.tokens.refresh.token),
        )
        .await;
    // Only the still-valid refresh token needs an entry.
    assert_eq!(h.ledger.blacklist_count(), 1);
}
