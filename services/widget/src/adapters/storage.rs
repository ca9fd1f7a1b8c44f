//! services/widget/src/adapters/storage.rs
//!
//! This module contains the durable storage adapter implementing the
//! `VisitorStore` port from the `core` crate, plus an in-memory variant for
//! tests and ephemeral runs. One sqlite file stands in for the browser's
//! per-origin durable storage.

use async_trait::async_trait;
use chatlite_core::ports::{PortError, PortResult, VisitorStore};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

//=========================================================================================
// Sqlite-backed store
//=========================================================================================

/// A visitor-identity store backed by a local sqlite database.
#[derive(Clone)]
pub struct SqliteVisitorStore {
    pool: SqlitePool,
}

impl SqliteVisitorStore {
    /// Opens (creating if missing) the database at `db_path` and ensures the
    /// schema exists.
    pub async fn new(db_path: impl AsRef<Path>) -> PortResult<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PortError::Unexpected(e.to_string()))?;
            }
        }

        let db_url = format!("sqlite://{}", db_path.to_string_lossy());
        let options = SqliteConnectOptions::from_str(&db_url)
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visitor_keys (
                origin TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (origin, key)
            );
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl VisitorStore for SqliteVisitorStore {
    async fn get(&self, origin: &str, key: &str) -> PortResult<Option<String>> {
        let row = sqlx::query("SELECT value FROM visitor_keys WHERE origin = ? AND key = ?")
            .bind(origin)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        match row {
            Some(row) => {
                let value: String = row
                    .try_get("value")
                    .map_err(|e| PortError::Unexpected(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, origin: &str, key: &str, value: &str) -> PortResult<()> {
        sqlx::query(
            r#"
            INSERT INTO visitor_keys (origin, key, value)
            VALUES (?, ?, ?)
            ON CONFLICT(origin, key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(origin)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(())
    }
}

//=========================================================================================
// In-memory store
//=========================================================================================

/// A `VisitorStore` holding everything in process memory. Used by tests and
/// by harness runs that do not want a database file.
#[derive(Default)]
pub struct MemoryVisitorStore {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryVisitorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VisitorStore for MemoryVisitorStore {
    async fn get(&self, origin: &str, key: &str) -> PortResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| PortError::Unexpected("visitor store lock poisoned".to_string()))?;
        Ok(entries.get(&(origin.to_string(), key.to_string())).cloned())
    }

    async fn put(&self, origin: &str, key: &str, value: &str) -> PortResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PortError::Unexpected("visitor store lock poisoned".to_string()))?;
        entries.insert((origin.to_string(), key.to_string()), value.to_string());
        Ok(())
    }
}
