use crate::core::cache::KeyValueCollection;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Collection backed by a single JSON object on disk.
///
/// The file is read once by [`JsonFileCollection::load`] and rewritten in full
/// by [`JsonFileCollection::flush`] after every `put`. The lock is held across
/// the insert and the flush so concurrent writers cannot lose updates.
pub struct JsonFileCollection {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Value>>,
}

impl JsonFileCollection {
    /// Reads `path` into memory. A missing file is an empty collection.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read cache file: {}", path.display()))?;
            let object: Map<String, Value> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse cache file: {}", path.display()))?;
            object.into_iter().collect()
        } else {
            debug!("No cache file at {}, starting empty", path.display());
            BTreeMap::new()
        };

        debug!("Loaded {} cached entries from {}", entries.len(), path.display());
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes every entry back to disk.
    pub async fn flush(&self) -> Result<()> {
        let entries = self.entries.lock().await;
        self.write_entries(&entries).await
    }

    async fn write_entries(&self, entries: &BTreeMap<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("Failed to write cache file: {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to replace cache file: {}", self.path.display()))?;

        debug!("Flushed {} entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl KeyValueCollection for JsonFileCollection {
    async fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.lock().await;
        let value = entries.get(key).cloned();
        if value.is_some() {
            debug!("Cache HIT for key: {}", key);
        } else {
            debug!("Cache MISS for key: {}", key);
        }
        value
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        if !value.is_object() {
            bail!("Cache entries must be JSON objects, got {value} for key {key}");
        }
        let mut entries = self.entries.lock().await;
        let previous = entries.insert(key.to_string(), value);
        debug!("Cache PUT for key: {}", key);

        // Memory never holds an entry the file does not
        if let Err(e) = self.write_entries(&entries).await {
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let cache = JsonFileCollection::load(dir.path().join("cache_figi.json")).unwrap();

        assert!(cache.is_empty().await);
        assert!(cache.get("US0378331005").await.is_none());
    }

    #[tokio::test]
    async fn test_put_writes_through_to_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cache_figi.json");
        let cache = JsonFileCollection::load(&path).unwrap();

        cache
            .put("US0378331005", json!({"ticker": "AAPL", "exchCode": "US"}))
            .await
            .unwrap();

        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["US0378331005"]["ticker"], "AAPL");

        // A second store opened on the same file sees the entry
        let reloaded = JsonFileCollection::load(&path).unwrap();
        assert_eq!(
            reloaded.get("US0378331005").await,
            Some(json!({"ticker": "AAPL", "exchCode": "US"}))
        );
        assert_eq!(reloaded.len().await, 1);
    }

    #[tokio::test]
    async fn test_put_rejects_non_object_values() {
        let dir = tempdir().unwrap();
        let cache = JsonFileCollection::load(dir.path().join("cache.json")).unwrap();

        let result = cache.put("KEY", json!("plain string")).await;
        assert!(result.is_err());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_store_unchanged() {
        let dir = tempdir().unwrap();
        // A regular file where the data directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let cache = JsonFileCollection::load(blocker.join("cache_figi.json")).unwrap();

        let result = cache.put("US0378331005", json!({"ticker": "AAPL"})).await;
        assert!(result.is_err());
        assert!(cache.get("US0378331005").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_load_fails_on_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json").unwrap();

        let result = JsonFileCollection::load(&path);
        assert!(result.is_err());
        assert!(
            result
                .err()
                .unwrap()
                .to_string()
                .contains("Failed to parse cache file")
        );
    }

    #[tokio::test]
    async fn test_flush_keeps_existing_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, r#"{"FR0000120271": {"ticker": "TTE"}}"#).unwrap();

        let cache = JsonFileCollection::load(&path).unwrap();
        cache.flush().await.unwrap();

        let reloaded = JsonFileCollection::load(&path).unwrap();
        assert_eq!(
            reloaded.get("FR0000120271").await,
            Some(json!({"ticker": "TTE"}))
        );
    }
}
