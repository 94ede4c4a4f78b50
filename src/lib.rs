pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::AggregationMode;
use crate::providers::caching::CachingReferenceDataProvider;
use crate::providers::openfigi::OpenFigiProvider;
use crate::providers::yahoo_finance::YahooHistoryProvider;
use anyhow::Result;
use std::path::PathBuf;
use tracing::{debug, info};

pub enum AppCommand {
    Spot {
        mode: Option<AggregationMode>,
        export: Option<PathBuf>,
    },
    Resolve {
        isins: Vec<String>,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("spotcalc starting...");

    let config = match config_path {
        Some(path) => crate::core::config::AppConfig::load_from_path(path)?,
        None => crate::core::config::AppConfig::load()?,
    };
    debug!(
        "Loaded config: {} underlyings, mode {}, timeout {}s",
        config.underlyings.len(),
        config.mode,
        config.timeout_secs
    );

    let cache = store::open_instrument_cache(&config)?;
    let timeout = config.request_timeout()?;
    let figi_provider = OpenFigiProvider::new(
        config.openfigi_base_url(),
        config.openfigi_api_key(),
        timeout,
    )?;
    let resolver = CachingReferenceDataProvider::new(figi_provider, cache);

    match command {
        AppCommand::Spot { mode, export } => {
            let prices = YahooHistoryProvider::new(config.yahoo_base_url(), timeout)?;
            cli::spot::run(&config, mode, export.as_deref(), &resolver, &prices).await?;
            Ok(())
        }
        AppCommand::Resolve { isins } => cli::resolve::run(&isins, &resolver).await,
    }
}
