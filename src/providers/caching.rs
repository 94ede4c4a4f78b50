use crate::core::cache::KeyValueCollection;
use crate::core::instrument::{Identifier, InstrumentRecord, ReferenceDataProvider};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cache-first wrapper around a reference data provider.
///
/// Successful resolutions are written through to the collection before they
/// are returned. Failures are never cached so a later run can retry them.
pub struct CachingReferenceDataProvider<T: ReferenceDataProvider> {
    inner: T,
    cache: Arc<dyn KeyValueCollection>,
}

impl<T: ReferenceDataProvider> CachingReferenceDataProvider<T> {
    pub fn new(inner: T, cache: Arc<dyn KeyValueCollection>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<T: ReferenceDataProvider + Send + Sync> ReferenceDataProvider
    for CachingReferenceDataProvider<T>
{
    async fn resolve(&self, identifier: &Identifier) -> Result<InstrumentRecord> {
        if let Some(cached) = self.cache.get(identifier.as_str()).await {
            match InstrumentRecord::from_value(cached) {
                Ok(record) => {
                    debug!("Cache hit for instrument: {}", identifier);
                    return Ok(record);
                }
                Err(e) => warn!("Ignoring unreadable cache entry for {}: {}", identifier, e),
            }
        }

        debug!("Cache miss for instrument: {}", identifier);
        let record = self.inner.resolve(identifier).await?;
        if let Err(e) = self.cache.put(identifier.as_str(), record.to_value()).await {
            warn!("Failed to persist instrument {}: {:#}", identifier, e);
        }
        Ok(record)
    }
}
