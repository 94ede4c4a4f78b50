pub mod caching;
pub mod openfigi;
pub mod util;
pub mod yahoo_finance;
