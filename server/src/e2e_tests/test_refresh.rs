//! Refresh-token rotation.

use crate::auth::AuthError;
use crate::e2e_tests::helpers::*;
use crate::types::Origin;

#[tokio::test]
async fn test_refresh_rotates_pair() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");
    let old_refresh = session.tokens.refresh.token.clone();

    let rotated = h
        .service
        .refresh_session(Some(&old_refresh))
        .await
        .expect("refresh");

    assert_eq!(rotated.identity.id, session.principal.id);
    assert_eq!(rotated.identity.origin, Origin::Primary);
    assert_ne!(rotated.tokens.refresh.token, old_refresh);
    assert_ne!(rotated.tokens.access.token, session.tokens.access.token);

    // Old record gone, new record present.
    assert_eq!(h.ledger.refresh_count(), 1);
    assert!(h.service.ledger().is_blacklisted(&old_refresh).await);
    let record = h
        .service
        .ledger()
        .find_refresh(&rotated.tokens.refresh.token)
        .await
        .expect("find")
        .expect("live record");
    assert_eq!(record.subject_id, session.principal.id);

    // The new access token works.
    let identity = h
        .service
        .authorize(Some(&rotated.tokens.access.token))
        .await
        .expect("authorize");
    assert_eq!(identity.email, "alice@example.com");
}

#[tokio::test]
async fn test_refresh_old_token_never_succeeds_twice() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");
    let old_refresh = session.tokens.refresh.token;

    h.service
        .refresh_session(Some(&old_refresh))
        .await
        .expect("first refresh");
    let replay = h.service.refresh_session(Some(&old_refresh)).await;
    assert!(matches!(
        replay,
        Err(AuthError::Invalidated | AuthError::Unauthenticated)
    ));
}

#[tokio::test]
async fn test_refresh_replay_rejected_when_blacklist_unavailable() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");
    let old_refresh = session.tokens.refresh.token;
    h.service
        .refresh_session(Some(&old_refresh))
        .await
        .expect("first refresh");

    // Even with the blacklist entry invisible, the consumed ledger record
    // keeps the old token from being exchanged again.
    let storage = crate::store::memory::MemoryLedgerStorage::new();
    let (service, _, _) = Harness::with_backends(h.primary.clone(), std::sync::Arc::new(storage));
    assert_eq!(
        service.refresh_session(Some(&old_refresh)).await.err(),
        Some(AuthError::Unauthenticated)
    );
}

#[tokio::test]
async fn test_concurrent_refresh_only_one_wins() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");
    let token = session.tokens.refresh.token;

    let (first, second) = tokio::join!(
        h.service.refresh_session(Some(&token)),
        h.service.refresh_session(Some(&token)),
    );
    let successes = [first.is_ok(), second.is_ok()].into_iter().filter(|ok| *ok).count();
    assert_eq!(successes, 1);
    assert_eq!(h.ledger.refresh_count(), 1);
}

#[tokio::test]
async fn test_refresh_blacklisted_token_is_invalidated() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");
    let token = session.tokens.refresh.token;

    h.service.ledger().blacklist(&token).await.expect("blacklist");

    assert_eq!(
        h.service.refresh_session(Some(&token)).await.err(),
        Some(AuthError::Invalidated)
    );
}

#[tokio::test]
async fn test_refresh_missing_token() {
    let h = Harness::new();
    assert_eq!(
        h.service.refresh_session(None).await.err(),
        Some(AuthError::Unauthenticated)
    );
    assert_eq!(
        h.service.refresh_session(Some("")).await.err(),
        Some(AuthError::Unauthenticated)
    );
}

#[tokio::test]
async fn test_refresh_rejects_garbage_and_access_tokens() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");

    assert_eq!(
        h.service.refresh_session(Some("not.a.jwt")).await.err(),
        Some(AuthError::Unauthenticated)
    );
    assert_eq!(
        h.service
            .refresh_session(Some(&session.tokens.access.token))
            .await
            .err(),
        Some(AuthError::Unauthenticated)
    );
}

#[tokio::test]
async fn test_refresh_after_expiry_fails() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");

    h.clock.advance(duration_ms(REFRESH_LIFETIME) - 1_000);
    let rotated = h
        .service
        .refresh_session(Some(&session.tokens.refresh.token))
        .await
        .expect("refresh just before expiry");

    h.clock.advance(duration_ms(REFRESH_LIFETIME));
    assert_eq!(
        h.service
            .refresh_session(Some(&rotated.tokens.refresh.token))
            .await
            .err(),
        Some(AuthError::Unauthenticated)
    );
}

#[tokio::test]
async fn test_refresh_without_ledger_record_fails() {
    let h = Harness::new();
    let pair = h
        .service
        .issuer()
        .issue_pair("ghost", "ghost@example.com", Origin::Primary)
        .expect("issue");

    // Validly signed, but never recorded.
    assert_eq!(
        h.service.refresh_session(Some(&pair.refresh.token)).await.err(),
        Some(AuthError::Unauthenticated)
    );
}

#[tokio::test]
async fn test_refresh_ledger_outage_is_internal() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");
    h.ledger.set_failing(true);

    let result = h
        .service
        .refresh_session(Some(&session.tokens.refresh.token))
        .await;
    assert!(matches!(result, Err(AuthError::Internal(_))));
}

#[tokio::test]
async fn test_refresh_external_principal_keeps_origin() {
    let h = Harness::new();
    h.seed_candidate("Bob", "bob@example.com", Some("builder"));
    let session = h
        .service
        .login("bob@example.com", "builder")
        .await
        .expect("login");

    let rotated = h
        .service
        .refresh_session(Some(&session.tokens.refresh.token))
        .await
        .expect("refresh");
    assert_eq!(rotated.identity.origin, Origin::External);
    assert_eq!(rotated.identity.email, "bob@example.com");
}
