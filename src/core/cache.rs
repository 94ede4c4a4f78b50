//! Key-value collection abstraction used for instrument metadata.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A collection of JSON values keyed by string.
///
/// Entries are write-once from the point of view of callers: there is no
/// removal or expiry, a key once stored keeps its value for the lifetime of the
/// backing store.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key`. Persistent collections must have durably
    /// written the entry by the time this returns.
    async fn put(&self, key: &str, value: Value) -> Result<()>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
