//! Token issuing and verification.
//!
//! Mints HS256 access/refresh pairs and verifies them back into claims.
//!
//! # Pre-conditions
//! - The signing secret is non-empty (enforced by `TokenConfig`).
//!
//! # Post-conditions
//! - `verify` returns claims only for a token whose signature checks out,
//!   whose `exp` lies in the future of the injected clock and whose `kind`
//!   matches the expected one.
//!
//! # Invariants
//! - Expiry is judged against the `TimeSource`, not the library's wall clock,
//!   with zero leeway.
//! - Every token carries a random `jti`, so two tokens minted for the same
//!   subject in the same second still differ.

use std::collections::HashSet;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::TokenConfig;
use crate::time::TimeSource;
use crate::types::{Identity, Origin, hex_encode};

/// Which role a token plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Access => write!(f, "access"),
            Self::Refresh => write!(f, "refresh"),
        }
    }
}

/// Claims embedded in every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject id, scoped to `origin`.
    pub sub: String,
    pub email: String,
    pub kind: TokenKind,
    pub origin: Origin,
    /// Issued-at, seconds since Unix epoch.
    pub iat: u64,
    /// Expiry, seconds since Unix epoch.
    pub exp: u64,
    /// Random nonce.
    pub jti: String,
}

impl Claims {
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.sub.clone(),
            email: self.email.clone(),
            origin: self.origin,
        }
    }
}

/// A signed token together with its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at_ms: u64,
}

/// An access token and a refresh token minted together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Error returned when issuing or verifying a token fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The signature does not match the configured secret.
    InvalidSignature,
    /// The token's `exp` is not in the future.
    Expired,
    /// The token is of the other kind than the one required.
    WrongKind { expected: TokenKind, found: TokenKind },
    /// The token is malformed or its claims cannot be parsed.
    Malformed,
    /// The token could not be signed.
    Signing(String),
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSignature => write!(f, "invalid JWT signature"),
            Self::Expired => write!(f, "JWT has expired"),
            Self::WrongKind { expected, found } => {
                write!(f, "expected {expected} token, found {found} token")
            }
            Self::Malformed => write!(f, "malformed JWT"),
            Self::Signing(reason) => write!(f, "failed to sign JWT: {reason}"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Number of random bytes in a `jti`.
const JTI_BYTES: usize = 16;

/// Mints and verifies tokens with the process-wide secret.
pub struct TokenIssuer {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock: Arc<dyn TimeSource>,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(config: TokenConfig, clock: Arc<dyn TimeSource>) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret());
        let decoding_key = DecodingKey::from_secret(config.secret());
        Self {
            config,
            encoding_key,
            decoding_key,
            clock,
        }
    }

    /// Mint an access/refresh pair for a principal.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if encoding fails.
    pub fn issue_pair(
        &self,
        subject_id: &str,
        email: &str,
        origin: Origin,
    ) -> Result<TokenPair, TokenError> {
        let now_secs = self.clock.now_secs();
        let access = self.issue(subject_id, email, origin, TokenKind::Access, now_secs)?;
        let refresh = self.issue(subject_id, email, origin, TokenKind::Refresh, now_secs)?;
        Ok(TokenPair { access, refresh })
    }

    fn issue(
        &self,
        subject_id: &str,
        email: &str,
        origin: Origin,
        kind: TokenKind,
        now_secs: u64,
    ) -> Result<IssuedToken, TokenError> {
        let lifetime = match kind {
            TokenKind::Access => self.config.access_lifetime(),
            TokenKind::Refresh => self.config.refresh_lifetime(),
        };
        let exp = now_secs.saturating_add(lifetime.as_secs());
        let jti: [u8; JTI_BYTES] = rand::random();
        let claims = Claims {
            sub: subject_id.to_string(),
            email: email.to_string(),
            kind,
            origin,
            iat: now_secs,
            exp,
            jti: hex_encode(&jti),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok(IssuedToken {
            token,
            expires_at_ms: exp.saturating_mul(1000),
        })
    }

    /// Verify a token's signature, expiry and kind.
    ///
    /// # Errors
    /// - `TokenError::InvalidSignature` if the signature does not match.
    /// - `TokenError::Expired` if `exp` is not after the current time.
    /// - `TokenError::WrongKind` if the token is not of kind `expected`.
    /// - `TokenError::Malformed` for anything unparseable.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the injected clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = ["exp", "sub"].into_iter().map(String::from).collect();

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(map_jwt_error)?
            .claims;

        if claims.sub.is_empty() {
            return Err(TokenError::Malformed);
        }
        if claims.exp <= self.clock.now_secs() {
            return Err(TokenError::Expired);
        }
        if claims.kind != expected {
            return Err(TokenError::WrongKind {
                expected,
                found: claims.kind,
            });
        }
        Ok(claims)
    }
}

/// Claims read by [`unverified_expiry_ms`].
#[derive(Debug, Deserialize)]
struct ExpiryClaim {
    exp: Option<u64>,
}

/// Read a token's `exp` without checking its signature.
///
/// Returns `None` when the token is malformed or carries no `exp`. The result
/// must only be used to size a revocation record, never to trust the token.
#[must_use]
pub fn unverified_expiry_ms(token: &str) -> Option<u64> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let data = decode::<ExpiryClaim>(token, &DecodingKey::from_secret(&[]), &validation).ok()?;
    data.claims.exp.map(|exp| exp.saturating_mul(1000))
}

/// Maps jsonwebtoken errors to our `TokenError` type.
fn map_jwt_error(error: jsonwebtoken::errors::Error) -> TokenError {
    use jsonwebtoken::errors::ErrorKind;

    match error.kind() {
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualTimeSource;
    use std::time::Duration;

    const SECRET: &[u8] = b"test-secret-key-that-is-long-enough";

    fn issuer_with_clock() -> (TokenIssuer, Arc<ManualTimeSource>) {
        let clock = Arc::new(ManualTimeSource::default());
        let config = TokenConfig::new(
            SECRET.to_vec(),
            Duration::from_secs(15 * 60),
            Duration::from_secs(14 * 24 * 60 * 60),
        )
        .expect("valid config");
        (TokenIssuer::new(config, clock.clone()), clock)
    }

    fn forge(claims: &Claims, secret: &[u8]) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret),
        )
        .expect("failed to create test token")
    }

    #[test]
    fn test_issue_pair_round_trips_claims() {
        let (issuer, clock) = issuer_with_clock();
        let pair = issuer
            .issue_pair("user-123", "alice@example.com", Origin::Primary)
            .expect("issue");

        let access = issuer.verify(&pair.access.token, TokenKind::Access).expect("access");
        assert_eq!(access.sub, "user-123");
        assert_eq!(access.email, "alice@example.com");
        assert_eq!(access.origin, Origin::Primary);
        assert_eq!(access.exp, clock.now_secs() + 900);

        let refresh = issuer
            .verify(&pair.refresh.token, TokenKind::Refresh)
            .expect("refresh");
        assert_eq!(refresh.kind, TokenKind::Refresh);
        assert_eq!(refresh.exp, clock.now_secs() + 1_209_600);
        assert_eq!(pair.refresh.expires_at_ms, refresh.exp * 1000);
    }

    #[test]
    fn test_pairs_minted_in_same_second_differ() {
        let (issuer, _clock) = issuer_with_clock();
        let first = issuer.issue_pair("u", "u@example.com", Origin::External).expect("issue");
        let second = issuer.issue_pair("u", "u@example.com", Origin::External).expect("issue");
        assert_ne!(first.refresh.token, second.refresh.token);
        assert_ne!(first.access.token, second.access.token);
    }

    #[test]
    fn test_wrong_kind_is_distinct() {
        let (issuer, _clock) = issuer_with_clock();
        let pair = issuer.issue_pair("u", "u@example.com", Origin::Primary).expect("issue");

        assert_eq!(
            issuer.verify(&pair.refresh.token, TokenKind::Access),
            Err(TokenError::WrongKind {
                expected: TokenKind::Access,
                found: TokenKind::Refresh,
            })
        );
        assert_eq!(
            issuer.verify(&pair.access.token, TokenKind::Refresh),
            Err(TokenError::WrongKind {
                expected: TokenKind::Refresh,
                found: TokenKind::Access,
            })
        );
    }

    #[test]
    fn test_expiry_follows_injected_clock() {
        let (issuer, clock) = issuer_with_clock();
        let pair = issuer.issue_pair("u", "u@example.com", Origin::Primary).expect("issue");

        clock.advance(899_000);
        assert!(issuer.verify(&pair.access.token, TokenKind::Access).is_ok());

        clock.advance(1_000);
        assert_eq!(
            issuer.verify(&pair.access.token, TokenKind::Access),
            Err(TokenError::Expired)
        );
        // The refresh token outlives the access token.
        assert!(issuer.verify(&pair.refresh.token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn test_invalid_signature() {
        let (issuer, clock) = issuer_with_clock();
        let claims = Claims {
            sub: "u".to_string(),
            email: "u@example.com".to_string(),
            kind: TokenKind::Access,
            origin: Origin::Primary,
            iat: clock.now_secs(),
            exp: clock.now_secs() + 60,
            jti: "n".to_string(),
        };
        let token = forge(&claims, b"wrong-secret-key-that-is-different");
        assert_eq!(
            issuer.verify(&token, TokenKind::Access),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_malformed_and_empty_tokens() {
        let (issuer, _clock) = issuer_with_clock();
        assert_eq!(
            issuer.verify("not-a-valid-jwt", TokenKind::Access),
            Err(TokenError::Malformed)
        );
        assert_eq!(issuer.verify("", TokenKind::Access), Err(TokenError::Malformed));
    }

    #[test]
    fn test_empty_subject_is_malformed() {
        let (issuer, clock) = issuer_with_clock();
        let claims = Claims {
            sub: String::new(),
            email: "u@example.com".to_string(),
            kind: TokenKind::Access,
            origin: Origin::Primary,
            iat: clock.now_secs(),
            exp: clock.now_secs() + 60,
            jti: "n".to_string(),
        };
        let token = forge(&claims, SECRET);
        assert_eq!(issuer.verify(&token, TokenKind::Access), Err(TokenError::Malformed));
    }

    #[test]
    fn test_unverified_expiry_ignores_signature() {
        let claims = Claims {
            sub: "u".to_string(),
            email: "u@example.com".to_string(),
            kind: TokenKind::Refresh,
            origin: Origin::External,
            iat: 10,
            exp: 1_234,
            jti: "n".to_string(),
        };
        let token = forge(&claims, b"some-other-secret");
        assert_eq!(unverified_expiry_ms(&token), Some(1_234_000));
    }

    #[test]
    fn test_unverified_expiry_of_garbage_is_none() {
        assert_eq!(unverified_expiry_ms("garbage"), None);
        assert_eq!(unverified_expiry_ms(""), None);
        assert_eq!(unverified_expiry_ms("a.b.c"), None);
    }

    #[test]
    fn test_token_error_display() {
        assert_eq!(TokenError::InvalidSignature.to_string(), "invalid JWT signature");
        assert_eq!(TokenError::Expired.to_string(), "JWT has expired");
        assert_eq!(TokenError::Malformed.to_string(), "malformed JWT");
        assert_eq!(
            TokenError::WrongKind {
                expected: TokenKind::Access,
                found: TokenKind::Refresh,
            }
            .to_string(),
            "expected access token, found refresh token"
        );
    }
}
