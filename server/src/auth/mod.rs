//! Authentication.
//!
//! Credential adapters over the two user stores, token issuing, the token
//! ledger and the orchestrator that ties them together.
//!
//! # Pre-conditions
//! - A non-empty signing secret is configured.
//!
//! # Post-conditions
//! - Signing configuration is immutable once loaded.
//!
//! # Invariants
//! - Every token this module accepts was signed with the configured secret.

pub mod credentials;
pub mod error;
pub mod jwt;
pub mod ledger;
pub mod password;
pub mod service;
pub mod token_config;

pub use credentials::{CredentialError, ExternalCredentials, PrimaryCredentials};
pub use error::AuthError;
pub use jwt::{Claims, IssuedToken, TokenError, TokenIssuer, TokenKind, TokenPair};
pub use ledger::TokenLedger;
pub use password::{PasswordError, PasswordHasher};
pub use service::{AuthService, AuthServiceParts, RotatedSession, Session};
pub use token_config::{TokenConfig, TokenConfigError};
