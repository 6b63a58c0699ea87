//! The full flow over the SQLite primary store and ledger.

use std::sync::Arc;

use crate::auth::AuthError;
use crate::e2e_tests::helpers::*;
use crate::store::sqlite::SqliteStore;
use crate::types::Origin;

async fn sqlite_store(dir: &tempfile::TempDir) -> Arc<SqliteStore> {
    Arc::new(
        SqliteStore::open(&dir.path().join("auth.db"))
            .await
            .expect("open sqlite store"),
    )
}

#[tokio::test]
async fn test_register_login_refresh_logout_over_sqlite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = sqlite_store(&dir).await;
    let (service, _candidates, _clock) = Harness::with_backends(store.clone(), store);

    let registered = service
        .register("Alice", "alice@example.com", "wonderland")
        .await
        .expect("register");
    assert_eq!(registered.principal.origin, Origin::Primary);

    assert_eq!(
        service
            .register("Alice", "alice@example.com", "again")
            .await
            .err(),
        Some(AuthError::AlreadyExists)
    );

    let session = service
        .login("alice@example.com", "wonderland")
        .await
        .expect("login");
    assert_eq!(session.principal.id, registered.principal.id);

    let old_refresh = session.tokens.refresh.token;
    let rotated = service
        .refresh_session(Some(&old_refresh))
        .await
        .expect("refresh");
    assert!(service.refresh_session(Some(&old_refresh)).await.is_err());

    service
        .logout(
            Some(&rotated.tokens.access.token),
            Some(&rotated.tokens.refresh.token),
        )
        .await;
    assert_eq!(
        service
            .authorize(Some(&rotated.tokens.access.token))
            .await
            .err(),
        Some(AuthError::Unauthenticated)
    );
    assert_eq!(
        service
            .refresh_session(Some(&rotated.tokens.refresh.token))
            .await
            .err(),
        Some(AuthError::Invalidated)
    );
}

#[tokio::test]
async fn test_sqlite_state_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let refresh = {
        let store = sqlite_store(&dir).await;
        let (service, _, _) = Harness::with_backends(store.clone(), store);
        service
            .register("Alice", "alice@example.com", "pw")
            .await
            .expect("register")
            .tokens
            .refresh
            .token
    };

    let store = sqlite_store(&dir).await;
    let (service, _, _) = Harness::with_backends(store.clone(), store);
    assert!(service.refresh_session(Some(&refresh)).await.is_ok());
}
