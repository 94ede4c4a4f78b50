//! Per-underlying and global spot calculation.
use crate::core::config::UnderlyingConfig;
use crate::core::instrument::{Identifier, InstrumentRecord, ReferenceDataProvider};
use crate::core::price::{PricePoint, PriceProvider, parse_observation_date};
use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use tracing::{debug, warn};

/// Statistic applied to the usable prices of one underlying. Chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum AggregationMode {
    #[default]
    Mean,
    Max,
    Min,
}

impl AggregationMode {
    pub fn label(&self) -> &'static str {
        match self {
            AggregationMode::Mean => "Simple average",
            AggregationMode::Max => "Highest close (max)",
            AggregationMode::Min => "Lowest close (min)",
        }
    }
}

impl Display for AggregationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                AggregationMode::Mean => "mean",
                AggregationMode::Max => "max",
                AggregationMode::Min => "min",
            }
        )
    }
}

impl FromStr for AggregationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mean" | "average" => Ok(AggregationMode::Mean),
            "max" => Ok(AggregationMode::Max),
            "min" => Ok(AggregationMode::Min),
            _ => Err(anyhow!(
                "Invalid aggregation mode: {} (expected mean, max or min)",
                s
            )),
        }
    }
}

impl TryFrom<String> for AggregationMode {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Reduces the usable prices of one underlying. `None` when there are none.
pub fn summarize(values: &[f64], mode: AggregationMode) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let spot = match mode {
        AggregationMode::Mean => values.iter().sum::<f64>() / values.len() as f64,
        AggregationMode::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregationMode::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
    };
    Some(spot)
}

/// Weight actually used: the configured one if strictly positive, else 1.0.
pub fn effective_weight(weight: f64) -> f64 {
    if weight > 0.0 { weight } else { 1.0 }
}

/// An underlying ready for pricing.
#[derive(Debug, Clone)]
pub struct UnderlyingSpec {
    pub identifier: Identifier,
    pub record: InstrumentRecord,
    /// Raw observation dates as entered, never empty.
    pub dates: Vec<String>,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    InvalidIdentifier(String),
    NoDates,
    Resolution(String),
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InvalidIdentifier(e) => write!(f, "invalid identifier: {e}"),
            SkipReason::NoDates => write!(f, "no observation dates"),
            SkipReason::Resolution(e) => write!(f, "unable to resolve instrument: {e}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkippedUnderlying {
    pub input: String,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct Preparation {
    pub specs: Vec<UnderlyingSpec>,
    pub skipped: Vec<SkippedUnderlying>,
}

/// Turns configured underlyings into resolved specs, in input order.
///
/// Underlyings without dates are dropped before any lookup. A repeated
/// identifier replaces the earlier entry in its original position.
pub async fn prepare_underlyings(
    underlyings: &[UnderlyingConfig],
    resolver: &(dyn ReferenceDataProvider + Send + Sync),
    update_callback: &(dyn Fn()),
) -> Preparation {
    let mut preparation = Preparation::default();

    for underlying in underlyings {
        let skip = |reason| SkippedUnderlying {
            input: underlying.isin.clone(),
            reason,
        };

        let identifier = match Identifier::new(&underlying.isin) {
            Ok(id) => id,
            Err(e) => {
                preparation
                    .skipped
                    .push(skip(SkipReason::InvalidIdentifier(e.to_string())));
                update_callback();
                continue;
            }
        };

        let dates = underlying.dates.entries();
        if dates.is_empty() {
            warn!("No observation dates for {}, underlying ignored", identifier);
            preparation.skipped.push(skip(SkipReason::NoDates));
            update_callback();
            continue;
        }

        match resolver.resolve(&identifier).await {
            Ok(record) => {
                let spec = UnderlyingSpec {
                    identifier,
                    record,
                    dates,
                    weight: underlying.weight,
                };
                if let Some(existing) = preparation
                    .specs
                    .iter_mut()
                    .find(|s| s.identifier == spec.identifier)
                {
                    warn!("Duplicate underlying {}, keeping the last entry", spec.identifier);
                    *existing = spec;
                } else {
                    preparation.specs.push(spec);
                }
            }
            Err(e) => {
                warn!("Failed to resolve {}: {:#}", identifier, e);
                preparation
                    .skipped
                    .push(skip(SkipReason::Resolution(format!("{e:#}"))));
            }
        }
        update_callback();
    }

    preparation
}

/// Outcome of one observation date.
#[derive(Debug, Clone)]
pub struct Observation {
    pub raw: String,
    pub date: Option<NaiveDate>,
    pub point: Option<PricePoint>,
    pub error: Option<String>,
}

impl Observation {
    pub fn price(&self) -> Option<f64> {
        self.point.map(|p| p.price)
    }
}

#[derive(Debug, Clone)]
pub struct UnderlyingResult {
    pub spec: UnderlyingSpec,
    pub observations: Vec<Observation>,
    pub spot: Option<f64>,
    pub effective_weight: f64,
}

impl UnderlyingResult {
    pub fn usable_prices(&self) -> Vec<f64> {
        self.observations.iter().filter_map(Observation::price).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalResult {
    pub spot: f64,
    pub total_weight: f64,
    pub contributors: usize,
    pub mode: AggregationMode,
}

#[derive(Debug)]
pub struct SpotRun {
    pub mode: AggregationMode,
    pub underlyings: Vec<UnderlyingResult>,
    pub global: Option<GlobalResult>,
    /// Underlyings dropped before pricing, in input order.
    pub skipped: Vec<SkippedUnderlying>,
}

impl SpotRun {
    pub fn global_or_err(&self) -> Result<&GlobalResult> {
        self.global
            .as_ref()
            .ok_or_else(|| anyhow!("Unable to compute the global spot: no valid prices"))
    }
}

/// Weight-normalized average of the underlyings that have a spot.
pub fn global_spot(results: &[UnderlyingResult], mode: AggregationMode) -> Option<GlobalResult> {
    let (weighted_sum, total_weight, contributors) = results
        .iter()
        .filter_map(|r| r.spot.map(|spot| (spot, r.effective_weight)))
        .fold((0.0, 0.0, 0usize), |(sum, weights, n), (spot, w)| {
            (sum + spot * w, weights + w, n + 1)
        });

    if total_weight > 0.0 {
        Some(GlobalResult {
            spot: weighted_sum / total_weight,
            total_weight,
            contributors,
            mode,
        })
    } else {
        None
    }
}

async fn observe(
    symbol: Option<&str>,
    raw: &str,
    prices: &(dyn PriceProvider + Send + Sync),
) -> Observation {
    let mut observation = Observation {
        raw: raw.to_string(),
        date: None,
        point: None,
        error: None,
    };

    let date = match parse_observation_date(raw) {
        Ok(date) => date,
        Err(e) => {
            debug!("{:#}", e);
            observation.error = Some(e.to_string());
            return observation;
        }
    };
    observation.date = Some(date);

    let Some(symbol) = symbol else {
        observation.error = Some("No ticker available".to_string());
        return observation;
    };

    match prices.price_near(symbol, date).await {
        Ok(Some(point)) => observation.point = Some(point),
        Ok(None) => {
            debug!("No price for {} around {}", symbol, date);
            observation.error = Some(format!("No price found around {raw}"));
        }
        Err(e) => {
            debug!("Price lookup error for {} on {}: {:#}", symbol, date, e);
            observation.error = Some(e.to_string());
        }
    }
    observation
}

/// Prices every observation date of every underlying, one call at a time,
/// and combines the results.
///
/// Failures stay local: a bad date or an unavailable price only removes that
/// value from its underlying.
pub async fn aggregate(
    underlyings: &[UnderlyingSpec],
    mode: AggregationMode,
    prices: &(dyn PriceProvider + Send + Sync),
    update_callback: &(dyn Fn()),
) -> SpotRun {
    let mut results = Vec::with_capacity(underlyings.len());

    for spec in underlyings {
        let symbol = spec.record.symbol();
        if symbol.is_none() {
            warn!("No ticker for {}, its dates cannot be priced", spec.identifier);
        }

        let mut observations = Vec::with_capacity(spec.dates.len());
        for raw in &spec.dates {
            observations.push(observe(symbol, raw, prices).await);
        }

        let usable: Vec<f64> = observations.iter().filter_map(Observation::price).collect();
        let spot = summarize(&usable, mode);
        debug!(
            "Spot for {}: {:?} from {}/{} prices",
            spec.identifier,
            spot,
            usable.len(),
            observations.len()
        );

        results.push(UnderlyingResult {
            spec: spec.clone(),
            observations,
            spot,
            effective_weight: effective_weight(spec.weight),
        });
        update_callback();
    }

    let global = global_spot(&results, mode);
    SpotRun {
        mode,
        underlyings: results,
        global,
        skipped: Vec::new(),
    }
}
