use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;

use super::schema::INITIAL_SCHEMA;
use super::{KeyValueStore, StoreError, WriteBatch};

/// Key/value store kept in a single SQLite table.
///
/// Calls run on the caller's task; each is a handful of indexed row
/// operations, and `commit` wraps the whole batch in one transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens an in-memory SQLite store.
    ///
    /// Automatically initializes the schema on connection open.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Opens a file-based SQLite store at the given path.
    ///
    /// Creates the database file if it does not exist.
    /// Automatically initializes the schema on connection open.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(INITIAL_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, keys: &[String]) -> Result<HashMap<String, Value>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached("SELECT value FROM entries WHERE key = ?1")?;

        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = stmt.query_row([key], |row| row.get(0)).optional()?;
            if let Some(raw) = raw {
                found.insert(key.clone(), serde_json::from_str(&raw)?);
            }
        }
        Ok(found)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut conn = self.lock()?;

        // Encode before opening the transaction so a bad value writes nothing.
        let mut encoded = Vec::with_capacity(batch.len());
        for (key, value) in batch.puts() {
            encoded.push((key, serde_json::to_string(value)?));
        }

        let tx = conn.transaction()?;
        {
            let mut delete = tx.prepare_cached("DELETE FROM entries WHERE key = ?1")?;
            for key in batch.deletes() {
                delete.execute([key])?;
            }
            let mut upsert = tx.prepare_cached(
                "INSERT INTO entries (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?;
            for (key, value) in &encoded {
                upsert.execute((key, value))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn bytes_in_use(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
             FROM entries",
            [],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(total).unwrap_or(0))
    }
}
