use crate::core::spot::AggregationMode;
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{debug, warn};

/// Environment variable that overrides `providers.openfigi.api_key`.
pub const OPENFIGI_API_KEY_ENV: &str = "OPENFIGI_API_KEY";
pub const MAX_UNDERLYINGS: usize = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

const DEFAULT_OPENFIGI_URL: &str = "https://api.openfigi.com";
const DEFAULT_YAHOO_URL: &str = "https://query1.finance.yahoo.com";

/// Observation dates, either as a YAML list or as one newline-separated block.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum DateList {
    List(Vec<String>),
    Text(String),
}

impl Default for DateList {
    fn default() -> Self {
        DateList::List(Vec::new())
    }
}

impl DateList {
    /// Trimmed, non-blank entries in input order.
    pub fn entries(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            DateList::List(items) => items.iter().map(String::as_str).collect(),
            DateList::Text(text) => text.lines().collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UnderlyingConfig {
    pub isin: String,
    #[serde(default)]
    pub dates: DateList,
    /// 0 means "equal weighting".
    #[serde(default)]
    pub weight: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OpenFigiProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub openfigi: Option<OpenFigiProviderConfig>,
    pub yahoo: Option<YahooProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            openfigi: Some(OpenFigiProviderConfig {
                base_url: DEFAULT_OPENFIGI_URL.to_string(),
                api_key: None,
            }),
            yahoo: Some(YahooProviderConfig {
                base_url: DEFAULT_YAHOO_URL.to_string(),
            }),
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub underlyings: Vec<UnderlyingConfig>,
    #[serde(default)]
    pub mode: AggregationMode,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            underlyings: Vec::new(),
            mode: AggregationMode::default(),
            providers: ProvidersConfig::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            data_path: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "spotcalc", "spotcalc")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("org", "spotcalc", "spotcalc")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn openfigi_base_url(&self) -> &str {
        self.providers
            .openfigi
            .as_ref()
            .map_or(DEFAULT_OPENFIGI_URL, |p| &p.base_url)
    }

    pub fn yahoo_base_url(&self) -> &str {
        self.providers
            .yahoo
            .as_ref()
            .map_or(DEFAULT_YAHOO_URL, |p| &p.base_url)
    }

    /// API key for OpenFIGI. The environment variable takes precedence over
    /// the config file.
    pub fn openfigi_api_key(&self) -> Option<String> {
        std::env::var(OPENFIGI_API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                self.providers
                    .openfigi
                    .as_ref()
                    .and_then(|p| p.api_key.clone())
                    .filter(|k| !k.trim().is_empty())
            })
    }

    /// Bound applied to every outbound request. Zero is rejected.
    pub fn request_timeout(&self) -> Result<Duration> {
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than zero");
        }
        Ok(Duration::from_secs(self.timeout_secs))
    }

    /// Checks the run inputs before any network access happens.
    pub fn validate(&self) -> Result<()> {
        if self.underlyings.is_empty() {
            bail!("No underlyings configured");
        }
        if self.underlyings.len() > MAX_UNDERLYINGS {
            bail!(
                "Too many underlyings: {} (at most {} are supported)",
                self.underlyings.len(),
                MAX_UNDERLYINGS
            );
        }
        self.request_timeout()?;
        // Blank ISINs are skipped later, per underlying
        for underlying in &self.underlyings {
            if !underlying.weight.is_finite() || underlying.weight < 0.0 {
                bail!(
                    "Underlying {} has an invalid weight: {} (must be >= 0)",
                    underlying.isin,
                    underlying.weight
                );
            }
        }
        if self.openfigi_api_key().is_none() {
            warn!(
                "No OpenFIGI API key configured (set {} or providers.openfigi.api_key); requests are rate limited",
                OPENFIGI_API_KEY_ENV
            );
        }
        Ok(())
    }
}
