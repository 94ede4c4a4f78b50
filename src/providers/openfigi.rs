use crate::core::instrument::{Identifier, InstrumentRecord, ReferenceDataProvider};
use crate::providers::util::{build_client, join_url};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, instrument};

pub const API_KEY_HEADER: &str = "X-OPENFIGI-APIKEY";

/// Maps ISINs to instrument records through the OpenFIGI mapping API.
pub struct OpenFigiProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenFigiProvider {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(OpenFigiProvider {
            base_url: base_url.to_string(),
            api_key,
            client: build_client(timeout)?,
        })
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct MappingJob<'a> {
    id_type: &'a str,
    id_value: &'a str,
}

#[derive(Deserialize, Debug)]
struct MappingResult {
    #[serde(default)]
    data: Option<Vec<Map<String, Value>>>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warning: Option<String>,
}

#[async_trait]
impl ReferenceDataProvider for OpenFigiProvider {
    #[instrument(
        name = "OpenFigiMapping",
        skip(self),
        fields(identifier = %identifier)
    )]
    async fn resolve(&self, identifier: &Identifier) -> Result<InstrumentRecord> {
        let url = join_url(&self.base_url, "/v3/mapping");
        let jobs = [MappingJob {
            id_type: "ID_ISIN",
            id_value: identifier.as_str(),
        }];
        debug!("Requesting mapping from {}", url);

        let mut request = self.client.post(&url).json(&jobs);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for identifier: {}", e, identifier))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for identifier: {}",
                response.status(),
                identifier
            ));
        }

        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to get response text for identifier: {identifier}"))?;

        let results: Vec<MappingResult> = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse OpenFIGI response for {}: {}", identifier, e))?;

        let first = results
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty mapping response for identifier: {}", identifier))?;

        if let Some(record) = first.data.and_then(|data| data.into_iter().next()) {
            debug!("Mapped {} to {:?}", identifier, record.get("ticker"));
            return Ok(InstrumentRecord::from_raw(record));
        }

        let reason = first
            .error
            .or(first.warning)
            .unwrap_or_else(|| "no data".to_string());
        Err(anyhow!(
            "No mapping found for identifier: {} ({})",
            identifier,
            reason
        ))
    }
}
