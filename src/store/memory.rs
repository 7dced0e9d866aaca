//! In-memory `KeyValueStore` for tests and ephemeral sessions.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::DatabaseError;
use crate::store::traits::KeyValueStore;

/// Map-backed store. Writes can be made to fail to exercise error paths.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, serde_json::Value>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set_value`/`delete_value` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self, op: &str) -> Result<(), DatabaseError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DatabaseError::Query(format!("{op}: store is read-only")));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, DatabaseError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: &serde_json::Value) -> Result<(), DatabaseError> {
        self.check_writable("set_value")?;
        self.values
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete_value(&self, key: &str) -> Result<bool, DatabaseError> {
        self.check_writable("delete_value")?;
        Ok(self.values.write().await.remove(key).is_some())
    }

    async fn list_keys(&self) -> Result<Vec<String>, DatabaseError> {
        Ok(self.values.read().await.keys().cloned().collect())
    }
}
