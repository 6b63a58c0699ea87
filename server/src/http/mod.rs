//! HTTP surface.
//!
//! Routes are mounted under `/api/users`; `/data` sits behind
//! [`middleware::require_auth`]. Handlers only translate between HTTP and
//! `AuthService`; every decision is made in the service.

pub mod cookies;
mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use crate::auth::AuthService;
pub use cookies::CookiePolicy;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub cookies: CookiePolicy,
}

/// Build the application router.
#[must_use]
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/data", get(handlers::user_data))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let users = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/refresh-token", post(handlers::refresh_token))
        .route("/logout", post(handlers::logout))
        .merge(protected);

    Router::new()
        .route("/", get(handlers::liveness))
        .nest("/api/users", users)
        .with_state(state)
}

/// CORS for the single browser client; cookies require credentials.
#[must_use]
pub fn cors_layer(client_origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(client_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
