//! SQLite storage layer for credentials, user preferences, and the usage log

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{UsageRecord, UsageStatus};

/// Storage backend using SQLite
pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Create an in-memory database (useful for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS api_keys (
                user_id INTEGER NOT NULL,
                provider TEXT NOT NULL,
                encrypted_key TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(user_id, provider)
            );

            CREATE TABLE IF NOT EXISTS user_preferences (
                user_id INTEGER PRIMARY KEY,
                preferred_provider TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS usage_log (
                id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                provider TEXT NOT NULL,
                language TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                text_length INTEGER NOT NULL,
                confidence REAL NOT NULL,
                cost REAL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_api_keys_user ON api_keys(user_id);
            CREATE INDEX IF NOT EXISTS idx_usage_log_user ON usage_log(user_id);
            CREATE INDEX IF NOT EXISTS idx_usage_log_created ON usage_log(created_at);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }

    // ========== API keys ==========

    /// Store or replace the encrypted API key for (user, provider)
    pub fn store_api_key(&self, user_id: i64, provider: &str, encrypted_key: &str) -> Result<()> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            r#"
            INSERT INTO api_keys (user_id, provider, encrypted_key, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, 1, ?4, ?4)
            ON CONFLICT(user_id, provider)
            DO UPDATE SET encrypted_key = excluded.encrypted_key, is_active = 1,
                          updated_at = excluded.updated_at
            "#,
            params![user_id, provider, encrypted_key, now],
        )?;
        debug!("Stored API key for user {} provider {}", user_id, provider);
        Ok(())
    }

    /// Fetch the encrypted API key for (user, provider), active keys only
    pub fn get_api_key(&self, user_id: i64, provider: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let key = conn
            .query_row(
                "SELECT encrypted_key FROM api_keys
                 WHERE user_id = ?1 AND provider = ?2 AND is_active = 1",
                params![user_id, provider],
                |row| row.get(0),
            )
            .optional()?;
        Ok(key)
    }

    /// Delete the API key for (user, provider); returns whether a row existed
    pub fn delete_api_key(&self, user_id: i64, provider: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM api_keys WHERE user_id = ?1 AND provider = ?2",
            params![user_id, provider],
        )?;
        if deleted > 0 {
            debug!("Deleted API key for user {} provider {}", user_id, provider);
        }
        Ok(deleted > 0)
    }

    /// Mark a stored key inactive without deleting it; returns whether an
    /// active key existed
    pub fn deactivate_api_key(&self, user_id: i64, provider: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();
        let updated = conn.execute(
            "UPDATE api_keys SET is_active = 0, updated_at = ?3
             WHERE user_id = ?1 AND provider = ?2 AND is_active = 1",
            params![user_id, provider, now],
        )?;
        Ok(updated > 0)
    }

    /// Providers for which the user has an active stored key
    pub fn list_key_providers(&self, user_id: i64) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT provider FROM api_keys WHERE user_id = ?1 AND is_active = 1 ORDER BY provider",
        )?;
        let providers = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(providers)
    }

    // ========== User preferences ==========

    /// Upsert the user's preferred provider. The name is stored as-is,
    /// with no validation against the registry.
    pub fn set_preferred_provider(&self, user_id: i64, provider: &str) -> Result<()> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            r#"
            INSERT INTO user_preferences (user_id, preferred_provider, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id)
            DO UPDATE SET preferred_provider = excluded.preferred_provider,
                          updated_at = excluded.updated_at
            "#,
            params![user_id, provider, now],
        )?;
        debug!("User {} preferred provider set to {}", user_id, provider);
        Ok(())
    }

    pub fn get_preferred_provider(&self, user_id: i64) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let provider = conn
            .query_row(
                "SELECT preferred_provider FROM user_preferences WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(provider)
    }

    // ========== Usage log ==========

    /// Append an immutable usage record
    pub fn append_usage(&self, record: &UsageRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO usage_log (id, user_id, provider, language, duration_ms,
                                   text_length, confidence, cost, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                record.id.to_string(),
                record.user_id,
                record.provider,
                record.language,
                record.duration_ms as i64,
                record.text_length,
                record.confidence as f64,
                record.cost,
                record.status.as_str(),
                record.created_at.to_rfc3339(),
            ],
        )?;
        debug!("Appended usage record {}", record.id);
        Ok(())
    }

    /// Most recent usage records for a user, newest first
    pub fn recent_usage(&self, user_id: i64, limit: usize) -> Result<Vec<UsageRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, provider, language, duration_ms, text_length,
                    confidence, cost, status, created_at
             FROM usage_log WHERE user_id = ?1
             ORDER BY created_at DESC LIMIT ?2",
        )?;

        let records = stmt
            .query_map(params![user_id, limit as i64], |row| {
                let id: String = row.get(0)?;
                let duration_ms: i64 = row.get(4)?;
                let confidence: f64 = row.get(6)?;
                let status: String = row.get(8)?;
                let created_at: String = row.get(9)?;
                Ok((
                    id,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    duration_ms,
                    row.get::<_, u32>(5)?,
                    confidence,
                    row.get::<_, Option<f64>>(7)?,
                    status,
                    created_at,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut out = Vec::with_capacity(records.len());
        for (
            id,
            user_id,
            provider,
            language,
            duration_ms,
            text_length,
            confidence,
            cost,
            status,
            created_at,
        ) in records
        {
            out.push(UsageRecord {
                id: id.parse().unwrap_or_else(|_| Uuid::nil()),
                user_id,
                provider,
                language,
                duration_ms: duration_ms as u64,
                text_length,
                confidence: confidence as f32,
                cost,
                status: status.parse().unwrap_or(UsageStatus::Failed),
                created_at: created_at
                    .parse::<DateTime<Utc>>()
                    .unwrap_or_else(|_| Utc::now()),
            });
        }
        Ok(out)
    }
}
