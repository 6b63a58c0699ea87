//! Resolved principals.
//!
//! # Invariants
//! - An `Identity` is never persisted; it lives for one request/response cycle.
//! - A `Principal` never carries a password or password hash.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which of the two credential stores authenticated a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Locally registered users owned by this service.
    Primary,
    /// Candidates owned by the external system of record.
    External,
}

impl Origin {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::External => "external",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The principal attached to an authorized request.
///
/// Built from verified access-token claims; no store is consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Subject id, scoped to `origin`.
    pub id: String,
    pub email: String,
    pub origin: Origin,
}

/// The user-facing projection shared by both stores: `{id, name, email}` plus origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: String,
    pub name: String,
    pub email: String,
    pub origin: Origin,
}

impl Principal {
    /// Drop the display name, keeping what a token carries.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            email: self.email.clone(),
            origin: self.origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Origin::Primary).expect("serialize"),
            "\"primary\""
        );
        assert_eq!(
            serde_json::to_string(&Origin::External).expect("serialize"),
            "\"external\""
        );
        let parsed: Origin = serde_json::from_str("\"external\"").expect("deserialize");
        assert_eq!(parsed, Origin::External);
    }

    #[test]
    fn test_origin_display_matches_serde() {
        assert_eq!(Origin::Primary.to_string(), "primary");
        assert_eq!(Origin::External.to_string(), "external");
    }

    #[test]
    fn test_principal_json_has_no_password() {
        let principal = Principal {
            id: "abc".to_string(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            origin: Origin::Primary,
        };
        let json = serde_json::to_value(&principal).expect("serialize");
        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["origin"], "primary");
        assert!(json.get("password").is_none());
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_principal_identity_projection() {
        let principal = Principal {
            id: "00ff".to_string(),
            name: "Bob".to_string(),
            email: "bob@example.com".to_string(),
            origin: Origin::External,
        };
        let identity = principal.identity();
        assert_eq!(identity.id, "00ff");
        assert_eq!(identity.email, "bob@example.com");
        assert_eq!(identity.origin, Origin::External);
    }
}
