//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod instrument;
pub mod log;
pub mod price;
pub mod report;
pub mod spot;

// Re-export main types for cleaner imports
pub use instrument::{Identifier, InstrumentRecord, ReferenceDataProvider};
pub use price::{PricePoint, PriceProvider};
pub use spot::{AggregationMode, SpotRun};
