pub mod json_file;
pub mod memory;

use crate::core::cache::KeyValueCollection;
use crate::core::config::AppConfig;
use anyhow::Result;
use json_file::JsonFileCollection;
use std::sync::Arc;

/// File name of the instrument metadata cache inside the data directory.
pub const INSTRUMENT_CACHE_FILE: &str = "cache_figi.json";

/// Opens the persistent instrument cache for `config`.
pub fn open_instrument_cache(config: &AppConfig) -> Result<Arc<dyn KeyValueCollection>> {
    let path = config.default_data_path()?.join(INSTRUMENT_CACHE_FILE);
    Ok(Arc::new(JsonFileCollection::load(path)?))
}
