//! libSQL backend: async `KeyValueStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::KeyValueStore;

/// Dismissal store on a single reused libSQL connection.
pub struct LibSqlBackend {
    // Keeps the database alive for the connection's lifetime.
    _db: LibSqlDatabase,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file, creating parent directories.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("creating {}: {e}", parent.display()))
            })?;
        }

        let backend = Self::open(libsql::Builder::new_local(path).build().await).await?;
        info!(path = %path.display(), "Dismissal database opened");
        Ok(backend)
    }

    /// Throwaway in-memory database.
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        Self::open(libsql::Builder::new_local(":memory:").build().await).await
    }

    async fn open(built: libsql::Result<LibSqlDatabase>) -> Result<Self, DatabaseError> {
        let db = built.map_err(|e| DatabaseError::Pool(format!("opening database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("connecting: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self { _db: db, conn })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[async_trait]
impl KeyValueStore for LibSqlBackend {
    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT value FROM dismissals WHERE key = ?1", params![key])
            .await
            .map_err(|e| DatabaseError::Query(format!("get_value: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let raw: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("get_value row parse: {e}")))?;
                let value = serde_json::from_str(&raw)
                    .map_err(|e| DatabaseError::Serialization(format!("{key}: {e}")))?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_value: {e}"))),
        }
    }

    async fn set_value(&self, key: &str, value: &serde_json::Value) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let raw = serde_json::to_string(value)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "INSERT INTO dismissals (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![key, raw, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_value: {e}")))?;

        debug!(key, "Dismissal value written");
        Ok(())
    }

    async fn delete_value(&self, key: &str) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute("DELETE FROM dismissals WHERE key = ?1", params![key])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_value: {e}")))?;
        Ok(count > 0)
    }

    async fn list_keys(&self) -> Result<Vec<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT key FROM dismissals ORDER BY key", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("list_keys: {e}")))?;

        let mut keys = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_keys: {e}")))?
        {
            let key: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("list_keys row parse: {e}")))?;
            keys.push(key);
        }
        Ok(keys)
    }
}
