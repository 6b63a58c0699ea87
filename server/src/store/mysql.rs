//! MySQL-backed candidate store.
//!
//! The `candidates` table belongs to an external system of record. This
//! service only reads it and stamps `last_login`; it never creates or deletes
//! rows.
//!
//! # Pre-conditions
//! - `candidates` has at least `id` (binary key), `name`, `email`,
//!   `password_hash` (nullable) and `last_login` (nullable `DATETIME`).
//!
//! # Post-conditions
//! - The pool is created lazily: constructing the store never touches the
//!   network, so an unreachable server does not prevent startup. Reachability
//!   is reported per call by `probe`.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::MySqlPool;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};

use crate::store::{CandidateStore, StoreError};
use crate::types::{Candidate, hex_encode};

/// Connection parameters for the external store.
#[derive(Clone, PartialEq, Eq)]
pub struct MySqlSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Connections kept in the pool.
    pub max_connections: u32,
    /// How long `probe` and queries wait for a pooled connection.
    pub acquire_timeout: Duration,
}

impl MySqlSettings {
    pub const DEFAULT_HOST: &'static str = "localhost";
    pub const DEFAULT_PORT: u16 = 3306;
    pub const DEFAULT_DATABASE: &'static str = "candidates";
    pub const DEFAULT_USER: &'static str = "root";
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
}

impl Default for MySqlSettings {
    fn default() -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_string(),
            port: Self::DEFAULT_PORT,
            database: Self::DEFAULT_DATABASE.to_string(),
            user: Self::DEFAULT_USER.to_string(),
            password: String::new(),
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Self::DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

// Hand-written so the password never reaches a log line.
impl std::fmt::Debug for MySqlSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish_non_exhaustive()
    }
}

type CandidateRow = (Vec<u8>, Option<String>, String, Option<String>, Option<i64>);

fn candidate_from_row((id, name, email, password_hash, last_login_ms): CandidateRow) -> Candidate {
    Candidate {
        id: hex_encode(&id),
        name: name.unwrap_or_default(),
        email,
        // An empty hash is as good as none: nothing can verify against it.
        password_hash: password_hash.filter(|hash| !hash.is_empty()),
        last_login_ms: last_login_ms.and_then(|ms| u64::try_from(ms).ok()),
    }
}

/// Candidate lookups against the external MySQL database.
#[derive(Debug, Clone)]
pub struct MySqlCandidateStore {
    pool: MySqlPool,
}

impl MySqlCandidateStore {
    /// Build the store with a lazily connecting pool.
    #[must_use]
    pub fn connect_lazy(settings: &MySqlSettings) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .database(&settings.database)
            .username(&settings.user)
            .password(&settings.password);
        let pool = MySqlPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect_lazy_with(options);
        Self { pool }
    }
}

#[async_trait]
impl CandidateStore for MySqlCandidateStore {
    async fn probe(&self) -> Result<(), StoreError> {
        let connection = self.pool.acquire().await?;
        drop(connection);
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Candidate>, StoreError> {
        let row = sqlx::query_as::<_, CandidateRow>(
            "SELECT id, name, email, password_hash,
                    CAST(UNIX_TIMESTAMP(last_login) * 1000 AS SIGNED) AS last_login_ms
             FROM candidates
             WHERE email = ?
             LIMIT 1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(candidate_from_row))
    }

    async fn touch_last_login(&self, email: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE candidates SET last_login = NOW() WHERE email = ?")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
