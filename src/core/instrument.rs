//! Instrument identifiers and resolved reference data.

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt::Display;
use std::str::FromStr;

/// Normalized instrument code (trimmed, uppercase).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            bail!("Identifier must not be empty");
        }
        Ok(Identifier(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Identifier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Identifier::new(s)
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference data for one instrument.
///
/// The raw payload is kept verbatim for traceability; the few fields the
/// calculation needs are lifted out when the record is built.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentRecord {
    pub ticker: Option<String>,
    pub security_type: Option<String>,
    pub raw: Map<String, Value>,
}

impl InstrumentRecord {
    pub fn from_raw(raw: Map<String, Value>) -> Self {
        let field = |name: &str| {
            raw.get(name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        InstrumentRecord {
            ticker: field("ticker"),
            security_type: field("securityType"),
            raw,
        }
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::from_raw(map)),
            other => Err(anyhow!("Instrument record must be a JSON object, got {other}")),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.raw.clone())
    }

    /// Symbol used for price lookups: the ticker, else the security type.
    pub fn symbol(&self) -> Option<&str> {
        self.ticker.as_deref().or(self.security_type.as_deref())
    }

    /// Optional string field from the raw payload.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.raw.get(name).and_then(Value::as_str)
    }
}

#[async_trait]
pub trait ReferenceDataProvider: Send + Sync {
    async fn resolve(&self, identifier: &Identifier) -> Result<InstrumentRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identifier_is_normalized() {
        let id = Identifier::new("  fr0000120271 \n").unwrap();
        assert_eq!(id.as_str(), "FR0000120271");
        assert_eq!(id.to_string(), "FR0000120271");
        assert!(Identifier::new("   ").is_err());
        assert_eq!(
            "us0378331005".parse::<Identifier>().unwrap(),
            Identifier::new("US0378331005").unwrap()
        );
    }

    #[test]
    fn test_symbol_prefers_ticker() {
        let record = InstrumentRecord::from_value(json!({
            "figi": "BBG000B9XRY4",
            "ticker": "AAPL",
            "securityType": "Common Stock"
        }))
        .unwrap();
        assert_eq!(record.symbol(), Some("AAPL"));
        assert_eq!(record.field("figi"), Some("BBG000B9XRY4"));
    }

    #[test]
    fn test_symbol_falls_back_to_security_type() {
        let record = InstrumentRecord::from_value(json!({
            "ticker": null,
            "securityType": "Index"
        }))
        .unwrap();
        assert!(record.ticker.is_none());
        assert_eq!(record.symbol(), Some("Index"));

        let empty = InstrumentRecord::from_value(json!({"ticker": ""})).unwrap();
        assert_eq!(empty.symbol(), None);
    }

    #[test]
    fn test_record_round_trips_raw_payload() {
        let value = json!({"ticker": "SAP", "exchCode": "GY", "extra": [1, 2]});
        let record = InstrumentRecord::from_value(value.clone()).unwrap();
        assert_eq!(record.to_value(), value);
        assert!(InstrumentRecord::from_value(json!([1])).is_err());
    }
}
