//! Pricing abstractions and nearest-date matching

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Text format of user supplied observation dates (day/month/year).
pub const OBSERVATION_DATE_FORMAT: &str = "%d/%m/%Y";

/// Calendar days searched on each side of a target date.
pub const LOOKUP_WINDOW_DAYS: i64 = 4;

/// Close price on an actual trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

pub fn parse_observation_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), OBSERVATION_DATE_FORMAT)
        .with_context(|| format!("Invalid observation date '{}', expected DD/MM/YYYY", raw.trim()))
}

/// Half-open `[start, end)` window around `target`.
pub fn lookup_window(target: NaiveDate) -> (NaiveDate, NaiveDate) {
    let span = Duration::days(LOOKUP_WINDOW_DAYS);
    (target - span, target + span)
}

/// Picks the point closest to `target`.
///
/// Points are ordered by date first; among equally distant points the earliest
/// one wins.
pub fn closest_point(points: &[PricePoint], target: NaiveDate) -> Option<PricePoint> {
    let mut ordered: Vec<PricePoint> = points
        .iter()
        .copied()
        .filter(|p| p.price.is_finite() && p.price > 0.0)
        .collect();
    ordered.sort_by_key(|p| p.date);
    ordered
        .into_iter()
        .min_by_key(|p| (p.date - target).num_days().abs())
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Close price of the trading day nearest `date`, `None` when the window
    /// around it has no data.
    async fn price_near(&self, ticker: &str, date: NaiveDate) -> Result<Option<PricePoint>>;
}
