use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{Value, json};

use super::AppState;
use super::cookies::{ACCESS_COOKIE, REFRESH_COOKIE, token_from};
use crate::auth::AuthError;
use crate::types::{Identity, Principal};

/// Absent and `null` fields both deserialize to `None` and read as empty.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterBody {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginBody {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Unwrap a JSON body, reporting any extractor rejection as missing fields.
///
/// A wrong content type, malformed JSON or a mistyped field all leave the
/// required fields unreadable, so they share the `MissingFields` answer.
fn read_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    match body {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            tracing::debug!("rejected request body: {rejection}");
            Err(AuthError::MissingFields)
        }
    }
}

fn user_json(principal: &Principal) -> Value {
    json!({
        "id": principal.id,
        "name": principal.name,
        "email": principal.email,
    })
}

pub async fn liveness() -> &'static str {
    "Server is live..."
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<RegisterBody>, JsonRejection>,
) -> Result<(StatusCode, CookieJar, Json<Value>), AuthError> {
    let body = read_body(body)?;
    let session = state
        .auth
        .register(
            body.name.as_deref().unwrap_or_default(),
            body.email.as_deref().unwrap_or_default(),
            body.password.as_deref().unwrap_or_default(),
        )
        .await?;

    let jar = state.cookies.set_tokens(jar, &session.tokens);
    let body = json!({
        "message": "User created successfully",
        "user": user_json(&session.principal),
        "source": session.principal.origin,
    });
    Ok((StatusCode::CREATED, jar, Json(body)))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<(CookieJar, Json<Value>), AuthError> {
    let body = read_body(body)?;
    let session = state
        .auth
        .login(
            body.email.as_deref().unwrap_or_default(),
            body.password.as_deref().unwrap_or_default(),
        )
        .await?;

    let jar = state.cookies.set_tokens(jar, &session.tokens);
    let body = json!({
        "message": "Login successful",
        "user": user_json(&session.principal),
        "source": session.principal.origin,
    });
    Ok((jar, Json(body)))
}

/// Rotate the refresh token. Any 401 also clears both cookies.
pub async fn refresh_token(State(state): State<AppState>, jar: CookieJar) -> Response {
    let token = token_from(&jar, REFRESH_COOKIE);
    match state.auth.refresh_session(token.as_deref()).await {
        Ok(rotated) => {
            let jar = state.cookies.set_tokens(jar, &rotated.tokens);
            let body = json!({
                "message": "Token refreshed successfully",
                "source": rotated.identity.origin,
            });
            (jar, Json(body)).into_response()
        }
        Err(e) if e.status_code() == StatusCode::UNAUTHORIZED => {
            (state.cookies.clear_tokens(jar), e).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<Value>) {
    let access = token_from(&jar, ACCESS_COOKIE);
    let refresh = token_from(&jar, REFRESH_COOKIE);
    state.auth.logout(access.as_deref(), refresh.as_deref()).await;

    let jar = state.cookies.clear_tokens(jar);
    (jar, Json(json!({ "message": "Logout successful" })))
}

pub async fn user_data(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Value>, AuthError> {
    let principal = state.auth.profile(&identity).await?;
    Ok(Json(json!({
        "user": user_json(&principal),
        "source": principal.origin,
    })))
}
