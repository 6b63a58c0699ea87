//! Server configuration module.
//!
//! Loads configuration for the auth server from environment variables.
//!
//! # Environment Variables
//!
//! - `JWT_SECRET`: HS256 signing secret (required, non-empty)
//! - `ACCESS_TOKEN_EXPIRY`: access-token lifetime as `<n>[smhd]` (default: `15m`)
//! - `REFRESH_TOKEN_EXPIRY`: refresh-token lifetime as `<n>[smhd]` (default: `14d`)
//! - `PORT`: port to listen on (default: `5000`)
//! - `PRIMARY_DATABASE_URL`: SQLite URL of the primary and ledger store
//!   (default: `sqlite://data/auth.db`)
//! - `MYSQL_HOST`, `MYSQL_PORT`, `MYSQL_DATABASE`, `MYSQL_USER`,
//!   `MYSQL_PASSWORD`: external candidate store
//! - `CLIENT_URL`: the single origin allowed by CORS (default: `http://localhost:5173`)
//! - `COOKIE_SECURE`: set the `Secure` cookie attribute (default: `false`)
//! - `BCRYPT_COST`: bcrypt work factor, 10..=31 (default: `10`)
//! - `LEDGER_PURGE_INTERVAL_SECS`: seconds between expired-row sweeps (default: `3600`)
//!
//! # Invariants
//!
//! - A loaded `ServerConfig` always holds a valid `TokenConfig` and
//!   `PasswordHasher`; invalid values are rejected here, not at first use.

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::{PasswordHasher, TokenConfig};
use crate::store::mysql::MySqlSettings;

/// Server configuration.
///
/// # Post-conditions
///
/// - `listen_port` is a parsed `u16`.
/// - `purge_interval` is at least one second.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tokens: TokenConfig,
    pub hasher: PasswordHasher,
    pub listen_port: u16,
    pub primary_database_url: String,
    pub mysql: MySqlSettings,
    pub client_url: String,
    pub cookie_secure: bool,
    pub purge_interval: Duration,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable is missing.
    MissingEnvVar(String),
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEnvVar(name) => {
                write!(f, "missing required environment variable: {name}")
            }
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

fn invalid(name: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        message: message.into(),
    }
}

/// Parse a lifetime such as `30s`, `15m`, `12h` or `14d`.
///
/// Returns `None` for an empty, zero, unitless or overflowing value.
#[must_use]
pub fn parse_lifetime(value: &str) -> Option<Duration> {
    let value = value.trim();
    let unit = value.chars().last()?;
    let amount: u64 = value[..value.len() - unit.len_utf8()].parse().ok()?;
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return None,
    };
    let secs = amount.checked_mul(multiplier)?;
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl ServerConfig {
    /// Default port for the server.
    pub const DEFAULT_PORT: u16 = 5000;
    pub const DEFAULT_PRIMARY_DATABASE_URL: &'static str = "sqlite://data/auth.db";
    pub const DEFAULT_CLIENT_URL: &'static str = "http://localhost:5173";
    pub const DEFAULT_ACCESS_TOKEN_EXPIRY: &'static str = "15m";
    pub const DEFAULT_REFRESH_TOKEN_EXPIRY: &'static str = "14d";
    pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `JWT_SECRET` is missing or empty, or if any set
    /// variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ServerConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let secret = lookup("JWT_SECRET")
            .ok_or_else(|| ConfigError::MissingEnvVar("JWT_SECRET".to_string()))?;
        if secret.is_empty() {
            return Err(invalid("JWT_SECRET", "must not be empty"));
        }

        let access = Self::load_lifetime(&lookup, "ACCESS_TOKEN_EXPIRY", Self::DEFAULT_ACCESS_TOKEN_EXPIRY)?;
        let refresh = Self::load_lifetime(&lookup, "REFRESH_TOKEN_EXPIRY", Self::DEFAULT_REFRESH_TOKEN_EXPIRY)?;
        let tokens = TokenConfig::new(secret.into_bytes(), access, refresh)
            .map_err(|e| invalid("JWT_SECRET", e.to_string()))?;

        let hasher = match lookup("BCRYPT_COST") {
            Some(value) => {
                let cost = value
                    .parse::<u32>()
                    .map_err(|_| invalid("BCRYPT_COST", format!("'{value}' is not a number")))?;
                PasswordHasher::new(cost).map_err(|e| invalid("BCRYPT_COST", e.to_string()))?
            }
            None => PasswordHasher::default(),
        };

        let listen_port = Self::load_port(&lookup, "PORT", Self::DEFAULT_PORT)?;

        let mysql = MySqlSettings {
            host: lookup("MYSQL_HOST").unwrap_or_else(|| MySqlSettings::DEFAULT_HOST.to_string()),
            port: Self::load_port(&lookup, "MYSQL_PORT", MySqlSettings::DEFAULT_PORT)?,
            database: lookup("MYSQL_DATABASE")
                .unwrap_or_else(|| MySqlSettings::DEFAULT_DATABASE.to_string()),
            user: lookup("MYSQL_USER").unwrap_or_else(|| MySqlSettings::DEFAULT_USER.to_string()),
            password: lookup("MYSQL_PASSWORD").unwrap_or_default(),
            ..MySqlSettings::default()
        };

        let cookie_secure = match lookup("COOKIE_SECURE").as_deref() {
            None | Some("false" | "0") => false,
            Some("true" | "1") => true,
            Some(other) => {
                return Err(invalid("COOKIE_SECURE", format!("'{other}' is not a boolean")));
            }
        };

        let purge_interval = match lookup("LEDGER_PURGE_INTERVAL_SECS") {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(invalid(
                        "LEDGER_PURGE_INTERVAL_SECS",
                        format!("'{value}' is not a positive number of seconds"),
                    ));
                }
            },
            None => Self::DEFAULT_PURGE_INTERVAL,
        };

        Ok(Self {
            tokens,
            hasher,
            listen_port,
            primary_database_url: lookup("PRIMARY_DATABASE_URL")
                .unwrap_or_else(|| Self::DEFAULT_PRIMARY_DATABASE_URL.to_string()),
            mysql,
            client_url: lookup("CLIENT_URL").unwrap_or_else(|| Self::DEFAULT_CLIENT_URL.to_string()),
            cookie_secure,
            purge_interval,
        })
    }

    /// Filesystem path of the primary database, when it is a file URL.
    ///
    /// Returns `None` for in-memory databases.
    #[must_use]
    pub fn primary_database_path(&self) -> Option<PathBuf> {
        let rest = self
            .primary_database_url
            .strip_prefix("sqlite://")
            .or_else(|| self.primary_database_url.strip_prefix("sqlite:"))?;
        let path = rest.split('?').next().unwrap_or(rest);
        (!path.is_empty() && path != ":memory:").then(|| PathBuf::from(path))
    }

    fn load_lifetime(
        lookup: &impl Fn(&str) -> Option<String>,
        name: &str,
        default: &str,
    ) -> Result<Duration, ConfigError> {
        let value = lookup(name).unwrap_or_else(|| default.to_string());
        parse_lifetime(&value).ok_or_else(|| {
            invalid(name, format!("'{value}' is not a duration like 30s, 15m, 12h or 14d"))
        })
    }

    fn load_port(
        lookup: &impl Fn(&str) -> Option<String>,
        name: &str,
        default: u16,
    ) -> Result<u16, ConfigError> {
        match lookup(name) {
            Some(value) => value.parse::<u16>().map_err(|_| {
                invalid(name, format!("'{value}' is not a valid port number (must be 1-65535)"))
            }),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = load(&[("JWT_SECRET", "s3cret")]).expect("config");
        assert_eq!(config.listen_port, 5000);
        assert_eq!(config.tokens.access_lifetime(), Duration::from_secs(900));
        assert_eq!(config.tokens.refresh_lifetime(), Duration::from_secs(1_209_600));
        assert_eq!(config.primary_database_url, "sqlite://data/auth.db");
        assert_eq!(config.client_url, "http://localhost:5173");
        assert_eq!(config.mysql.host, "localhost");
        assert_eq!(config.mysql.port, 3306);
        assert_eq!(config.hasher.cost(), 10);
        assert!(!config.cookie_secure);
        assert_eq!(config.purge_interval, Duration::from_secs(3600));
    }

    #[test]
    fn test_secret_is_required() {
        assert_eq!(
            load(&[]).err(),
            Some(ConfigError::MissingEnvVar("JWT_SECRET".to_string()))
        );
        assert!(matches!(
            load(&[("JWT_SECRET", "")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("JWT_SECRET", "s3cret"),
            ("ACCESS_TOKEN_EXPIRY", "30s"),
            ("REFRESH_TOKEN_EXPIRY", "2h"),
            ("PORT", "8080"),
            ("MYSQL_PORT", "3307"),
            ("MYSQL_PASSWORD", "pw"),
            ("COOKIE_SECURE", "true"),
            ("BCRYPT_COST", "12"),
            ("LEDGER_PURGE_INTERVAL_SECS", "60"),
        ])
        .expect("config");
        assert_eq!(config.tokens.access_lifetime(), Duration::from_secs(30));
        assert_eq!(config.tokens.refresh_lifetime(), Duration::from_secs(7200));
        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.mysql.port, 3307);
        assert_eq!(config.mysql.password, "pw");
        assert!(config.cookie_secure);
        assert_eq!(config.hasher.cost(), 12);
        assert_eq!(config.purge_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for (name, value) in [
            ("ACCESS_TOKEN_EXPIRY", "15 minutes"),
            ("REFRESH_TOKEN_EXPIRY", "0d"),
            ("PORT", "70000"),
            ("BCRYPT_COST", "4"),
            ("COOKIE_SECURE", "yes"),
            ("LEDGER_PURGE_INTERVAL_SECS", "0"),
        ] {
            let result = load(&[("JWT_SECRET", "s3cret"), (name, value)]);
            assert!(
                matches!(&result, Err(ConfigError::InvalidValue { name: n, .. }) if n == name),
                "{name}={value} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_lifetime() {
        assert_eq!(parse_lifetime("45s"), Some(Duration::from_secs(45)));
        assert_eq!(parse_lifetime("15m"), Some(Duration::from_secs(900)));
        assert_eq!(parse_lifetime("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_lifetime("14d"), Some(Duration::from_secs(1_209_600)));
        assert_eq!(parse_lifetime(""), None);
        assert_eq!(parse_lifetime("m"), None);
        assert_eq!(parse_lifetime("10"), None);
        assert_eq!(parse_lifetime("10w"), None);
        assert_eq!(parse_lifetime("-1m"), None);
    }

    #[test]
    fn test_primary_database_path() {
        let mut config = load(&[("JWT_SECRET", "s3cret")]).expect("config");
        assert_eq!(
            config.primary_database_path(),
            Some(PathBuf::from("data/auth.db"))
        );

        config.primary_database_url = "sqlite::memory:".to_string();
        assert_eq!(config.primary_database_path(), None);
    }

    #[test]
    fn test_config_error_display_missing() {
        let error = ConfigError::MissingEnvVar("TEST_VAR".to_string());
        assert_eq!(
            error.to_string(),
            "missing required environment variable: TEST_VAR"
        );
    }
}
