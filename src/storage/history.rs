// src/storage/history.rs
//! Append-only browsing history log
//!
//! One SQLite table keyed by an auto-increment id. The schema version is
//! kept in `PRAGMA user_version`; a database stamped with any other version
//! is dropped and recreated.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};

use crate::error::{HostError, Result};

/// Current schema version of the history table.
pub const SCHEMA_VERSION: i64 = 1;

/// One persisted history row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub address: String,
    pub icon_reference: String,
    /// Local time, `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
}

/// Durable home of extracted address signals.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one entry and return its id.
    async fn append(&self, address: &str, icon_reference: &str, timestamp: &str) -> Result<i64>;

    /// All entries, newest first.
    async fn list_all(&self) -> Result<Vec<HistoryEntry>>;

    /// Remove every entry; returns how many were removed.
    async fn clear(&self) -> Result<u64>;

    async fn close(&self) {}
}

/// SQLite-backed history store.
#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    /// Open (creating if needed) the database at `path` and bring its
    /// schema up to date.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(path = %path.display(), "📚 History store opened");
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;
        if version == SCHEMA_VERSION {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        if version != 0 {
            info!(from = version, to = SCHEMA_VERSION, "Recreating history table");
            sqlx::query("DROP TABLE IF EXISTS history")
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                address TEXT NOT NULL,
                icon_reference TEXT,
                observed_at TEXT NOT NULL
            )",
        )
        .execute(&mut *tx)
        .await?;
        // PRAGMA does not take bound parameters.
        sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!("History schema at version {}", SCHEMA_VERSION);
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, address: &str, icon_reference: &str, timestamp: &str) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO history (address, icon_reference, observed_at) VALUES (?1, ?2, ?3)",
        )
        .bind(address)
        .bind(icon_reference)
        .bind(timestamp)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        debug!(id, "History entry added");
        Ok(id)
    }

    async fn list_all(&self) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            "SELECT id, address, COALESCE(icon_reference, '') AS icon_reference, observed_at
             FROM history ORDER BY observed_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .iter()
            .map(|row| {
                Ok(HistoryEntry {
                    id: row.try_get("id")?,
                    address: row.try_get("address")?,
                    icon_reference: row.try_get("icon_reference")?,
                    timestamp: row.try_get("observed_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        debug!("Retrieved {} history entries", entries.len());
        Ok(entries)
    }

    async fn clear(&self) -> Result<u64> {
        let removed = sqlx::query("DELETE FROM history")
            .execute(&self.pool)
            .await?
            .rows_affected();
        info!(removed, "All history cleared");
        Ok(removed)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Volatile history store, for `--in-memory` runs and tests.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    entries: Mutex<Vec<HistoryEntry>>,
    /// Ids are never reused, even after `clear`.
    last_id: AtomicI64,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<HistoryEntry>>> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| HostError::Unavailable("history store lock poisoned".into()))?)
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, address: &str, icon_reference: &str, timestamp: &str) -> Result<i64> {
        let mut entries = self.lock()?;
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        entries.push(HistoryEntry {
            id,
            address: address.to_string(),
            icon_reference: icon_reference.to_string(),
            timestamp: timestamp.to_string(),
        });
        Ok(id)
    }

    async fn list_all(&self) -> Result<Vec<HistoryEntry>> {
        let mut entries = self.lock()?.clone();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(entries)
    }

    async fn clear(&self) -> Result<u64> {
        let mut entries = self.lock()?;
        let removed = entries.len() as u64;
        entries.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn open_temp() -> (SqliteHistoryStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteHistoryStore::open(&dir.path().join("history.db"))
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn append_assigns_increasing_ids() {
        let (store, _dir) = open_temp().await;
        let first = store.append("a.com", "icon-a", "2024-01-01 10:00:00").await.unwrap();
        let second = store.append("b.com", "icon-b", "2024-01-01 10:00:01").await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let (store, _dir) = open_temp().await;
        store.append("old.com", "", "2024-01-01 09:00:00").await.unwrap();
        store.append("new.com", "", "2024-01-02 09:00:00").await.unwrap();
        store.append("mid.com", "", "2024-01-01 12:00:00").await.unwrap();

        let addresses: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.address)
            .collect();
        assert_eq!(addresses, vec!["new.com", "mid.com", "old.com"]);
    }

    #[tokio::test]
    async fn null_icon_reads_as_empty() {
        let (store, _dir) = open_temp().await;
        sqlx::query("INSERT INTO history (address, icon_reference, observed_at) VALUES ('x.io', NULL, '2024-01-01 00:00:00')")
            .execute(&store.pool)
            .await
            .unwrap();
        let entries = store.list_all().await.unwrap();
        assert_eq!(entries[0].icon_reference, "");
    }

    #[tokio::test]
    async fn clear_empties_the_log() {
        let (store, _dir) = open_temp().await;
        store.append("a.com", "", "2024-01-01 00:00:00").await.unwrap();
        store.append("b.com", "", "2024-01-01 00:00:01").await.unwrap();
        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopen_keeps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        {
            let store = SqliteHistoryStore::open(&path).await.unwrap();
            store.append("kept.com", "", "2024-01-01 00:00:00").await.unwrap();
            store.close().await;
        }
        let store = SqliteHistoryStore::open(&path).await.unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_schema_version_is_recreated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        {
            let store = SqliteHistoryStore::open(&path).await.unwrap();
            store.append("stale.com", "", "2024-01-01 00:00:00").await.unwrap();
            sqlx::query("PRAGMA user_version = 7")
                .execute(&store.pool)
                .await
                .unwrap();
            store.close().await;
        }
        let store = SqliteHistoryStore::open(&path).await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_store_matches_ordering() {
        let store = MemoryHistoryStore::new();
        store.append("a.com", "", "2024-01-01 00:00:00").await.unwrap();
        store.append("b.com", "", "2024-01-01 00:00:00").await.unwrap();
        let entries = store.list_all().await.unwrap();
        assert_eq!(entries[0].address, "b.com");
        assert_eq!(store.clear().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_clear() {
        let (sqlite, _dir) = open_temp().await;
        let memory = MemoryHistoryStore::new();
        let stores: [&dyn HistoryStore; 2] = [&sqlite, &memory];

        for store in stores {
            let before = store.append("a.com", "", "2024-01-01 00:00:00").await.unwrap();
            store.clear().await.unwrap();
            let after = store.append("b.com", "", "2024-01-01 00:00:01").await.unwrap();
            assert!(after > before, "id {after} reused after clear (was {before})");
        }
    }
}
