//! SQLite-backed primary user store and token ledger.
//!
//! Plays the document-store role: owns locally registered users, outstanding
//! refresh tokens and the blacklist. Tables and unique indexes are created on
//! open, so a fresh file is usable immediately.
//!
//! # Invariants
//! - `primary_users.email`, `refresh_tokens.token` and
//!   `blacklisted_tokens.token` are unique. Inserts use `ON CONFLICT DO NOTHING`
//!   and report a skipped row as `StoreError::Duplicate`.
//! - Timestamps are stored as signed 64-bit milliseconds.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::store::{LedgerStorage, PrimaryUserStore, StoreError};
use crate::types::{BlacklistEntry, PrimaryUser, RefreshTokenRecord, new_record_id};

/// Maximum pooled connections.
const MAX_CONNECTIONS: u32 = 8;

const SCHEMA: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS primary_users (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        last_login_ms INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS refresh_tokens (
        token TEXT PRIMARY KEY NOT NULL,
        subject_id TEXT NOT NULL,
        expires_at_ms INTEGER NOT NULL,
        created_at_ms INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS refresh_tokens_subject ON refresh_tokens (subject_id)",
    "CREATE TABLE IF NOT EXISTS blacklisted_tokens (
        token TEXT PRIMARY KEY NOT NULL,
        expires_at_ms INTEGER NOT NULL,
        blacklisted_at_ms INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS blacklisted_tokens_expiry ON blacklisted_tokens (expires_at_ms)",
];

type UserRow = (String, String, String, String, i64);
type RefreshRow = (String, String, i64, i64);
type BlacklistRow = (String, i64, i64);

fn to_db(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

fn from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn user_from_row((id, name, email, password_hash, last_login_ms): UserRow) -> PrimaryUser {
    PrimaryUser {
        id,
        name,
        email,
        password_hash,
        last_login_ms: from_db(last_login_ms),
    }
}

fn refresh_from_row((subject_id, token, expires_at_ms, created_at_ms): RefreshRow) -> RefreshTokenRecord {
    RefreshTokenRecord {
        subject_id,
        token,
        expires_at_ms: from_db(expires_at_ms),
        created_at_ms: from_db(created_at_ms),
    }
}

fn blacklist_from_row((token, expires_at_ms, blacklisted_at_ms): BlacklistRow) -> BlacklistEntry {
    BlacklistEntry {
        token,
        expires_at_ms: from_db(expires_at_ms),
        blacklisted_at_ms: from_db(blacklisted_at_ms),
    }
}

/// A SQLite database holding primary users and the token ledger.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at a `sqlite://` URL.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        Self::open_with(options).await
    }

    /// Open (creating if missing) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self::open_with(options).await
    }

    async fn open_with(options: SqliteConnectOptions) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.create_schema().await?;
        Ok(store)
    }

    async fn create_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl PrimaryUserStore for SqliteStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<PrimaryUser>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, password_hash, last_login_ms FROM primary_users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<PrimaryUser>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, password_hash, last_login_ms FROM primary_users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn insert(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        now_ms: u64,
    ) -> Result<PrimaryUser, StoreError> {
        let user = PrimaryUser {
            id: new_record_id(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            last_login_ms: now_ms,
        };
        let result = sqlx::query(
            "INSERT INTO primary_users (id, name, email, password_hash, last_login_ms)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT DO NOTHING",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(to_db(now_ms))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate);
        }
        Ok(user)
    }

    async fn set_last_login(&self, id: &str, now_ms: u64) -> Result<(), StoreError> {
        sqlx::query("UPDATE primary_users SET last_login_ms = ? WHERE id = ?")
            .bind(to_db(now_ms))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStorage for SqliteStore {
    async fn insert_refresh(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO refresh_tokens (token, subject_id, expires_at_ms, created_at_ms)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (token) DO NOTHING",
        )
        .bind(&record.token)
        .bind(&record.subject_id)
        .bind(to_db(record.expires_at_ms))
        .bind(to_db(record.created_at_ms))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate);
        }
        Ok(())
    }

    async fn find_refresh(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let row = sqlx::query_as::<_, RefreshRow>(
            "SELECT subject_id, token, expires_at_ms, created_at_ms FROM refresh_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(refresh_from_row))
    }

    async fn take_refresh(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        // A single DELETE ... RETURNING is atomic; a concurrent caller sees no row.
        let row = sqlx::query_as::<_, RefreshRow>(
            "DELETE FROM refresh_tokens WHERE token = ?
             RETURNING subject_id, token, expires_at_ms, created_at_ms",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(refresh_from_row))
    }

    async fn delete_refresh(&self, token: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_blacklist(&self, entry: BlacklistEntry) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO blacklisted_tokens (token, expires_at_ms, blacklisted_at_ms)
             VALUES (?, ?, ?)
             ON CONFLICT (token) DO NOTHING",
        )
        .bind(&entry.token)
        .bind(to_db(entry.expires_at_ms))
        .bind(to_db(entry.blacklisted_at_ms))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate);
        }
        Ok(())
    }

    async fn find_blacklist(&self, token: &str) -> Result<Option<BlacklistEntry>, StoreError> {
        let row = sqlx::query_as::<_, BlacklistRow>(
            "SELECT token, expires_at_ms, blacklisted_at_ms FROM blacklisted_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(blacklist_from_row))
    }

    async fn purge_expired(&self, now_ms: u64) -> Result<u64, StoreError> {
        let now = to_db(now_ms);
        let refresh = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at_ms <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        let blacklist = sqlx::query("DELETE FROM blacklisted_tokens WHERE expires_at_ms <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(refresh.rows_affected() + blacklist.rows_affected())
    }
}
