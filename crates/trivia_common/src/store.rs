//! Persistent key-value collaborator for cross-request deduplication.
//!
//! The dedup tracker only needs `get`/`put` with a TTL. The real
//! implementation is SQLite (WAL mode, single connection behind a
//! mutex, blocking work pushed to the blocking pool); tests use the
//! in-memory store. Store failures are soft: callers treat any error
//! as "this tier is unavailable".

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

/// Durable key-value collaborator with TTL semantics.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch a live (non-expired) value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value that expires after `ttl`.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}

/// SQLite-backed store for dedup records.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub async fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        info!("Opening dedup database at: {}", path.display());

        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open(&path).context("Failed to open SQLite database")?;

            // WAL for concurrent readers alongside the writer
            conn.pragma_update(None, "journal_mode", "WAL")
                .context("Failed to enable WAL mode")?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .context("Failed to set synchronous mode")?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS dedup_records (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    written_at INTEGER NOT NULL,
                    expires_at INTEGER NOT NULL
                )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_dedup_expires
                 ON dedup_records(expires_at)",
                [],
            )?;

            Ok(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory SQLite, used by tests that want the real SQL path.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection> {
            let conn = Connection::open_in_memory()?;
            conn.execute(
                "CREATE TABLE IF NOT EXISTS dedup_records (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    written_at INTEGER NOT NULL,
                    expires_at INTEGER NOT NULL
                )",
                [],
            )?;
            Ok(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = Arc::clone(&self.conn);
        let key = key.to_string();
        let now = Utc::now().timestamp();

        tokio::task::spawn_blocking(move || -> Result<Option<String>> {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT value FROM dedup_records WHERE key = ?1 AND expires_at > ?2",
            )?;
            let value = stmt
                .query_row(params![key, now], |row| row.get::<_, String>(0))
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(value)
        })
        .await?
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let key = key.to_string();
        let value = value.to_string();
        let now = Utc::now().timestamp();
        let expires_at = now + ttl.as_secs() as i64;

        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT OR REPLACE INTO dedup_records (key, value, written_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![key, value, now, expires_at],
            )?;
            // Lazy purge of anything already expired
            conn.execute(
                "DELETE FROM dedup_records WHERE expires_at <= ?1",
                params![now],
            )?;
            Ok(())
        })
        .await?
    }
}

/// Process-local store for tests and store-less deployments.
#[derive(Default)]
pub struct MemoryStore {
    entries: std::sync::Mutex<HashMap<String, (String, i64)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Utc::now().timestamp();
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(v, _)| v.clone()))
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let expires_at = Utc::now().timestamp() + ttl.as_secs() as i64;
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }
}
