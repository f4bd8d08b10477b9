use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::errors::Result;
use super::watch::WatchStream;

/// A key-value-version tuple returned by bulk queries.
#[derive(Debug)]
pub struct KeyValueVersion {
    pub key: String,
    pub value: Vec<u8>,
    pub version: i64,
}

/// Shared key-value view used for cluster membership.
#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn put(&self, key: &str, value: Value) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn watch(&self, prefix: &str) -> Result<WatchStream>;

    /// Put a key with a time-to-live. The key is automatically deleted after `ttl`
    /// unless it is put again before the deadline.
    async fn put_with_ttl(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    /// Retrieve all key-value pairs under a given prefix.
    async fn get_bulk(&self, prefix: &str) -> Result<Vec<KeyValueVersion>>;
}
