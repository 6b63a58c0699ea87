#![cfg_attr(test, allow(clippy::disallowed_methods))]
// Forbid unwrap() in production code; a misconfigured server should log and exit.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use std::net::SocketAddr;
use std::sync::Arc;

use auth_server::auth::{AuthService, AuthServiceParts};
use auth_server::config::ServerConfig;
use auth_server::http::{self, AppState, CookiePolicy};
use auth_server::store::mysql::MySqlCandidateStore;
use auth_server::store::sqlite::SqliteStore;
use auth_server::store::sweep::spawn_purge_task;
use auth_server::store::{CandidateStore, LedgerStorage};
use auth_server::time::{SystemTimeSource, TimeSource};
use axum::http::HeaderValue;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_server=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment variables
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: primary_database_url={}, listen_port={}, mysql={:?}",
        config.primary_database_url,
        config.listen_port,
        config.mysql
    );

    if let Some(parent) = config
        .primary_database_path()
        .and_then(|path| path.parent().map(std::path::Path::to_path_buf))
        .filter(|parent| !parent.as_os_str().is_empty())
        && let Err(e) = std::fs::create_dir_all(&parent)
    {
        tracing::error!("Failed to create data directory {}: {e}", parent.display());
        std::process::exit(1);
    }

    let primary = match SqliteStore::connect(&config.primary_database_url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Failed to open primary database: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!("Primary database ready");

    // The external store may be down at startup; requests probe it per call.
    let candidates = Arc::new(MySqlCandidateStore::connect_lazy(&config.mysql));
    match candidates.probe().await {
        Ok(()) => tracing::info!("External candidate store reachable"),
        Err(e) => tracing::warn!("External candidate store not reachable at startup: {e}"),
    }

    let clock: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);
    let ledger_storage: Arc<dyn LedgerStorage> = primary.clone();
    let _purge_task = spawn_purge_task(
        Arc::downgrade(&ledger_storage),
        Arc::clone(&clock),
        config.purge_interval,
    );

    let cookies = CookiePolicy {
        secure: config.cookie_secure,
        access_max_age: config.tokens.access_lifetime(),
        refresh_max_age: config.tokens.refresh_lifetime(),
    };
    let auth = Arc::new(AuthService::new(AuthServiceParts {
        primary_store: primary,
        candidate_store: candidates,
        ledger_storage,
        token_config: config.tokens.clone(),
        hasher: config.hasher,
        clock,
    }));

    let client_origin = match HeaderValue::from_str(&config.client_url) {
        Ok(origin) => origin,
        Err(e) => {
            tracing::error!("CLIENT_URL is not a valid origin: {e}");
            std::process::exit(1);
        }
    };

    let app = http::router(AppState { auth, cookies })
        .layer(http::cors_layer(client_origin))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind: {e}");
            std::process::exit(1);
        });

    axum::serve(listener, app).await.unwrap_or_else(|e| {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    });
}
