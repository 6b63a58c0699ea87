//! Access-token gate for protected routes.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;

use super::AppState;
use super::cookies::{ACCESS_COOKIE, token_from};
use crate::auth::AuthError;

/// Resolve the access token to an `Identity` and attach it to the request.
///
/// The `accessToken` cookie wins over the `Authorization` header.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = token_from(&jar, ACCESS_COOKIE).or_else(|| bearer_token(request.headers()));
    let identity = state.auth.authorize(token.as_deref()).await?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// `Authorization: Bearer <token>`, or the raw header value.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(value).expect("header value"),
        );
        headers
    }

    #[test]
    fn test_bearer_token_forms() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc".to_string()));
        assert_eq!(bearer_token(&headers("abc")), Some("abc".to_string()));
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
