//! Tabular export of a spot run.
//!
//! One row per underlying, written as CSV so that any spreadsheet can open it.
//! Spots are rounded to six decimals here and nowhere else.

use crate::core::spot::{SpotRun, UnderlyingResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;

pub const MISSING: &str = "N/A";
pub const SPOT_DECIMALS: usize = 6;

pub fn format_spot(value: f64) -> String {
    format!("{:.*}", SPOT_DECIMALS, value)
}

fn serialize_spot<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_str(&format_spot(*v)),
        None => serializer.serialize_str(MISSING),
    }
}

fn deserialize_spot<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    if raw.is_empty() || raw == MISSING {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    #[serde(rename = "ISIN")]
    pub isin: String,
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "Dates")]
    pub dates: String,
    #[serde(rename = "Values")]
    pub values: String,
    #[serde(
        rename = "Spot",
        serialize_with = "serialize_spot",
        deserialize_with = "deserialize_spot"
    )]
    pub spot: Option<f64>,
    #[serde(rename = "Weight")]
    pub weight: f64,
}

impl From<&UnderlyingResult> for ReportRow {
    fn from(result: &UnderlyingResult) -> Self {
        let values = result
            .observations
            .iter()
            .map(|o| o.price().map_or(MISSING.to_string(), |p| p.to_string()))
            .collect::<Vec<_>>()
            .join(", ");

        ReportRow {
            isin: result.spec.identifier.to_string(),
            ticker: result.spec.record.symbol().unwrap_or(MISSING).to_string(),
            dates: result.spec.dates.join(", "),
            values,
            spot: result.spot,
            weight: result.effective_weight,
        }
    }
}

pub fn report_rows(run: &SpotRun) -> Vec<ReportRow> {
    run.underlyings.iter().map(ReportRow::from).collect()
}

pub fn write_report<P: AsRef<Path>>(path: P, rows: &[ReportRow]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create report: {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(())
}

pub fn read_report<P: AsRef<Path>>(path: P) -> Result<Vec<ReportRow>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open report: {}", path.display()))?;
    reader
        .deserialize()
        .collect::<Result<Vec<ReportRow>, _>>()
        .with_context(|| format!("Failed to parse report: {}", path.display()))
}
