//! Token signing configuration.
//!
//! # Pre-conditions
//! - The signing secret must be non-empty.
//! - Both lifetimes must be at least one second.
//!
//! # Post-conditions
//! - `TokenConfig` instances are immutable once created.
//!
//! # Invariants
//! - Access and refresh lifetimes are independent; neither is derived from
//!   the other.

use std::time::Duration;

/// Error returned when token configuration is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenConfigError {
    /// The HS256 secret is empty.
    EmptySecret,
    /// A token lifetime is shorter than one second.
    LifetimeTooShort(&'static str),
}

impl std::fmt::Display for TokenConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySecret => write!(f, "HS256 secret must not be empty"),
            Self::LifetimeTooShort(which) => {
                write!(f, "{which} token lifetime must be at least one second")
            }
        }
    }
}

impl std::error::Error for TokenConfigError {}

/// HS256 signing secret plus the two token lifetimes.
#[derive(Clone)]
pub struct TokenConfig {
    secret: Vec<u8>,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenConfig {
    /// Default access-token lifetime: 15 minutes.
    pub const DEFAULT_ACCESS_LIFETIME: Duration = Duration::from_secs(15 * 60);
    /// Default refresh-token lifetime: 14 days.
    pub const DEFAULT_REFRESH_LIFETIME: Duration = Duration::from_secs(14 * 24 * 60 * 60);

    /// Create a configuration with explicit lifetimes.
    ///
    /// # Errors
    /// Returns `TokenConfigError::EmptySecret` if the secret is empty, or
    /// `TokenConfigError::LifetimeTooShort` if either lifetime is under a second.
    pub fn new(
        secret: Vec<u8>,
        access_lifetime: Duration,
        refresh_lifetime: Duration,
    ) -> Result<Self, TokenConfigError> {
        if secret.is_empty() {
            return Err(TokenConfigError::EmptySecret);
        }
        if access_lifetime.as_secs() == 0 {
            return Err(TokenConfigError::LifetimeTooShort("access"));
        }
        if refresh_lifetime.as_secs() == 0 {
            return Err(TokenConfigError::LifetimeTooShort("refresh"));
        }
        Ok(Self {
            secret,
            access_lifetime,
            refresh_lifetime,
        })
    }

    /// Create a configuration with the default 15 minute / 14 day lifetimes.
    pub fn with_default_lifetimes(secret: Vec<u8>) -> Result<Self, TokenConfigError> {
        Self::new(
            secret,
            Self::DEFAULT_ACCESS_LIFETIME,
            Self::DEFAULT_REFRESH_LIFETIME,
        )
    }

    #[must_use]
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    #[must_use]
    pub const fn access_lifetime(&self) -> Duration {
        self.access_lifetime
    }

    #[must_use]
    pub const fn refresh_lifetime(&self) -> Duration {
        self.refresh_lifetime
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_lifetime", &self.access_lifetime)
            .field("refresh_lifetime", &self.refresh_lifetime)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lifetimes() {
        let config = TokenConfig::with_default_lifetimes(b"secret".to_vec()).expect("valid");
        assert_eq!(config.access_lifetime(), Duration::from_secs(900));
        assert_eq!(config.refresh_lifetime(), Duration::from_secs(1_209_600));
        assert_eq!(config.secret(), b"secret");
    }

    #[test]
    fn test_empty_secret_rejected() {
        let result = TokenConfig::with_default_lifetimes(Vec::new());
        assert!(matches!(result, Err(TokenConfigError::EmptySecret)));
    }

    #[test]
    fn test_sub_second_lifetime_rejected() {
        let result = TokenConfig::new(
            b"secret".to_vec(),
            Duration::from_millis(500),
            Duration::from_secs(60),
        );
        assert!(matches!(result, Err(TokenConfigError::LifetimeTooShort("access"))));

        let result = TokenConfig::new(b"secret".to_vec(), Duration::from_secs(60), Duration::ZERO);
        assert!(matches!(result, Err(TokenConfigError::LifetimeTooShort("refresh"))));
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = TokenConfig::with_default_lifetimes(b"super-secret".to_vec()).expect("valid");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("access_lifetime"));
    }

    #[test]
    fn test_token_config_error_display() {
        assert_eq!(
            TokenConfigError::EmptySecret.to_string(),
            "HS256 secret must not be empty"
        );
        assert_eq!(
            TokenConfigError::LifetimeTooShort("refresh").to_string(),
            "refresh token lifetime must be at least one second"
        );
    }
}
