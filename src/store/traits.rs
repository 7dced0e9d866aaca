//! `KeyValueStore` trait: the persistence port behind dismissal records.

use async_trait::async_trait;

use crate::error::DatabaseError;

/// Backend-agnostic async key-value store with JSON values.
///
/// Writes must be durable once the returned future resolves.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key was never written or was deleted.
    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, DatabaseError>;

    /// Insert or overwrite a value.
    async fn set_value(&self, key: &str, value: &serde_json::Value) -> Result<(), DatabaseError>;

    /// Delete a value. Returns whether a row was removed.
    async fn delete_value(&self, key: &str) -> Result<bool, DatabaseError>;

    /// List every stored key.
    async fn list_keys(&self) -> Result<Vec<String>, DatabaseError>;
}
