//! Errors surfaced by the authentication orchestrator.
//!
//! `Display` is for logs and may carry detail. What a client sees comes from
//! [`AuthError::public_message`], which never says which store or which check
//! failed for credential-related errors.

/// Outcome of a failed register/login/refresh/authorize/profile call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// A required request field is missing or empty.
    MissingFields,
    /// The email is already registered in one of the stores.
    AlreadyExists,
    /// A store needed for a safety guarantee could not be reached.
    ServiceUnavailable,
    /// A uniqueness check errored after the store was reachable.
    CheckFailed,
    /// Unknown email or wrong password; deliberately indistinguishable.
    InvalidCredentials,
    /// No token, bad token, wrong kind, expired, revoked access token or no
    /// matching ledger record.
    Unauthenticated,
    /// The refresh token was explicitly revoked.
    Invalidated,
    /// The principal's record no longer exists in its store.
    NotFound,
    /// Transient store or signing failure; the detail is for logs only.
    Internal(String),
}

impl AuthError {
    /// The message sent to clients.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::MissingFields => "Missing required fields",
            Self::AlreadyExists => "User already exists. Please use login instead.",
            Self::ServiceUnavailable => {
                "Registration temporarily unavailable. Please try again later."
            }
            Self::CheckFailed => "System error during registration check. Please try again.",
            Self::InvalidCredentials => "Invalid email or password",
            Self::Unauthenticated => "Unauthorized. Please login again.",
            Self::Invalidated => "Token has been invalidated. Please login again.",
            Self::NotFound => "User not found",
            Self::Internal(_) => "Internal server error. Please try again.",
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Internal(detail) => write!(f, "internal error: {detail}"),
            other => f.write_str(other.public_message()),
        }
    }
}

impl std::error::Error for AuthError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_detail_stays_out_of_public_message() {
        let error = AuthError::Internal("sqlite: disk I/O error".to_string());
        assert_eq!(error.to_string(), "internal error: sqlite: disk I/O error");
        assert!(!error.public_message().contains("sqlite"));
    }

    #[test]
    fn test_credential_messages_do_not_name_a_store() {
        for error in [
            AuthError::AlreadyExists,
            AuthError::InvalidCredentials,
            AuthError::CheckFailed,
            AuthError::ServiceUnavailable,
        ] {
            let message = error.public_message().to_lowercase();
            assert!(!message.contains("mysql"));
            assert!(!message.contains("external"));
            assert!(!message.contains("primary"));
            assert!(!message.contains("password is"));
        }
    }

    #[test]
    fn test_display_matches_public_message() {
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "Invalid email or password"
        );
        assert_eq!(
            AuthError::Invalidated.to_string(),
            "Token has been invalidated. Please login again."
        );
    }
}
