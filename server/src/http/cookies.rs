//! Session cookies.
//!
//! Both tokens travel as HTTP-only, `SameSite=Lax` cookies on path `/`. A
//! cookie's `Max-Age` matches its token's lifetime so the browser drops it
//! when the token would stop verifying anyway.

use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::auth::TokenPair;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Attributes shared by every cookie the server sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
    pub access_max_age: Duration,
    pub refresh_max_age: Duration,
}

impl CookiePolicy {
    /// Add both token cookies to `jar`.
    #[must_use]
    pub fn set_tokens(&self, jar: CookieJar, tokens: &TokenPair) -> CookieJar {
        jar.add(self.build(ACCESS_COOKIE, tokens.access.token.clone(), self.access_max_age))
            .add(self.build(REFRESH_COOKIE, tokens.refresh.token.clone(), self.refresh_max_age))
    }

    /// Overwrite both token cookies with empty, immediately expiring ones.
    #[must_use]
    pub fn clear_tokens(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.build(ACCESS_COOKIE, String::new(), Duration::ZERO))
            .add(self.build(REFRESH_COOKIE, String::new(), Duration::ZERO))
    }

    fn build(&self, name: &'static str, value: String, max_age: Duration) -> Cookie<'static> {
        let max_age = time::Duration::seconds(i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX));
        Cookie::build((name, value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(max_age)
            .build()
    }
}

/// Read a non-empty cookie value.
#[must_use]
pub fn token_from(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}
