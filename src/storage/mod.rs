//! Key-value storage scopes for tracker state
//!
//! The tracker persists state in two scopes mirroring the browser storage
//! split the collector expects: a short-lived scope holding the active
//! session envelope, and a long-lived scope holding the user identity,
//! consent flag, activity markers, and unload backups.
//!
//! [`MemoryStore`] backs the short-lived scope (and tests); [`SqliteStore`]
//! backs the long-lived scope with a single key-value table on disk.

use crate::error::{CryptiqueError, Result};
use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

pub mod keys;

/// A flat string key-value store with interior mutability
///
/// Mirrors the browser Storage interface: get, set, remove. All failures
/// surface as `Result` so callers can degrade to defaults instead of
/// propagating, matching the tracker's never-fatal error posture.
pub trait StorageScope: Send + Sync {
    /// Read the value stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the value stored under `key`, if any
    fn remove(&self, key: &str) -> Result<()>;
}

/// Volatile in-memory scope
///
/// Lives only as long as the process, the analog of `sessionStorage` for a
/// headless embedding. Also the storage backend of choice in unit tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageScope for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CryptiqueError::Storage("memory store lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CryptiqueError::Storage("memory store lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CryptiqueError::Storage("memory store lock poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Durable key-value scope backed by SQLite
///
/// The analog of `localStorage`: user identity, consent, activity markers,
/// funnel progress, and unload backups survive process restarts here.
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    /// Create a new store in the user's data directory
    ///
    /// Initializes the database file under the platform data dir. The path
    /// can be overridden with the `CRYPTIQUE_STORE_DB` environment variable,
    /// which makes it easy to point the binary at a test DB or alternate
    /// file without changing the application data dir.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var("CRYPTIQUE_STORE_DB") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = directories::ProjectDirs::from("io", "cryptique", "cryptique")
            .ok_or_else(|| CryptiqueError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| CryptiqueError::Storage(e.to_string()))?;

        let db_path = data_dir.join("tracker.db");
        let store = Self { db_path };

        store.init()?;

        Ok(store)
    }

    /// Create a new store that uses the specified database path
    ///
    /// This is primarily useful for tests where the default application data
    /// directory is not desirable (for example, using a temporary directory).
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        // Ensure parent directory exists so opening the DB file succeeds.
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| CryptiqueError::Storage(e.to_string()))?;
        }

        let store = Self { db_path };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create kv table")
        .map_err(|e| CryptiqueError::Storage(e.to_string()))?;

        Ok(())
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| CryptiqueError::Storage(e.to_string()))?;
        Ok(conn)
    }
}

impl StorageScope for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.open()?;

        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .context("Failed to query kv entry")
            .map_err(|e| CryptiqueError::Storage(e.to_string()))?;

        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.open()?;
        let now = chrono::Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            updated_at = excluded.updated_at",
            params![key, value, now],
        )
        .context("Failed to upsert kv entry")
        .map_err(|e| CryptiqueError::Storage(e.to_string()))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.open()?;

        conn.execute("DELETE FROM kv WHERE key = ?", params![key])
            .context("Failed to delete kv entry")
            .map_err(|e| CryptiqueError::Storage(e.to_string()))?;

        Ok(())
    }
}
