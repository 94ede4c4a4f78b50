use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::price::{PricePoint, PriceProvider, closest_point, lookup_window};
use crate::providers::util::build_client;

/// Unix timestamp of midnight UTC on `date`.
fn day_start_timestamp(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Converts the chart arrays into dated closes.
///
/// Bar timestamps are UTC instants; shifting them by the exchange offset and
/// truncating gives the exchange-local trading day without any timezone.
fn daily_points(item: &ChartItem) -> Vec<PricePoint> {
    let (Some(timestamps), Some(closes)) = (
        item.timestamp.as_ref(),
        item.indicators
            .as_ref()
            .and_then(|inds| inds.quote.first())
            .and_then(|q| q.close.as_ref()),
    ) else {
        return Vec::new();
    };

    let offset = item.meta.as_ref().map_or(0, |m| m.gmtoffset);
    timestamps
        .iter()
        .zip(closes.iter())
        .filter_map(|(ts, close)| {
            let price = (*close)?;
            let date = DateTime::from_timestamp(ts + offset, 0)?.date_naive();
            Some(PricePoint { date, price })
        })
        .collect()
}

/// Daily close history from the Yahoo Finance chart API.
pub struct YahooHistoryProvider {
    base_url: String,
    client: reqwest::Client,
}

impl YahooHistoryProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(YahooHistoryProvider {
            base_url: base_url.to_string(),
            client: build_client(timeout)?,
        })
    }

    /// Chart endpoint for `symbol`. The symbol is one encoded path segment,
    /// so tickers such as `BRK/B` stay intact.
    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid Yahoo base URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Yahoo base URL cannot have a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .append_pair("period1", &day_start_timestamp(start).to_string())
            .append_pair("period2", &day_start_timestamp(end).to_string())
            .append_pair("interval", "1d")
            .append_pair("events", "history");
        Ok(url)
    }

    /// Daily closes in `[start, end)`.
    pub async fn fetch_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        let symbol = ticker.trim().to_uppercase();
        let url = self.chart_url(&symbol, start, end)?;
        debug!("Requesting price history from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for symbol: {}", e, symbol))?;

        let status = response.status();
        let text = response.text().await?;
        let data: YahooChartResponse = match serde_json::from_str(&text) {
            Ok(data) => data,
            Err(e) if status.is_success() => {
                return Err(anyhow!("Failed to parse JSON response for {}: {}", symbol, e));
            }
            Err(_) => return Err(anyhow!("HTTP error: {} for symbol: {}", status, symbol)),
        };

        if let Some(error) = data.chart.error {
            return Err(anyhow!(
                "Yahoo error for symbol {}: {} ({})",
                symbol,
                error.description,
                error.code
            ));
        }

        let mut points: Vec<PricePoint> = data
            .chart
            .result
            .unwrap_or_default()
            .iter()
            .flat_map(daily_points)
            .filter(|p| p.date >= start && p.date < end)
            .collect();
        points.sort_by_key(|p| p.date);
        Ok(points)
    }
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[async_trait]
impl PriceProvider for YahooHistoryProvider {
    #[instrument(
        name = "YahooHistoryFetch",
        skip(self),
        fields(ticker = %ticker, date = %date)
    )]
    async fn price_near(&self, ticker: &str, date: NaiveDate) -> Result<Option<PricePoint>> {
        let (start, end) = lookup_window(date);
        let points = self.fetch_history(ticker, start, end).await?;
        if points.is_empty() {
            debug!("Empty history for {} between {} and {}", ticker, start, end);
            return Ok(None);
        }
        Ok(closest_point(&points, date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // 09:30 New York time expressed in UTC
    fn ny_open(date: NaiveDate) -> i64 {
        day_start_timestamp(date) + 14 * 3600 + 30 * 60
    }

    fn chart_body(bars: &[(NaiveDate, Option<f64>)]) -> String {
        let timestamps: Vec<String> = bars.iter().map(|(d, _)| ny_open(*d).to_string()).collect();
        let closes: Vec<String> = bars
            .iter()
            .map(|(_, c)| c.map_or("null".to_string(), |v| v.to_string()))
            .collect();
        format!(
            r#"{{
                "chart": {{
                    "result": [{{
                        "meta": {{ "currency": "USD", "gmtoffset": -18000 }},
                        "timestamp": [{}],
                        "indicators": {{ "quote": [{{ "close": [{}] }}] }}
                    }}],
                    "error": null
                }}
            }}"#,
            timestamps.join(", "),
            closes.join(", ")
        )
    }

    async fn create_mock_server(symbol: &str, status: u16, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        let request_path = format!("/v8/finance/chart/{symbol}");

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(status).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn provider(server: &MockServer) -> YahooHistoryProvider {
        YahooHistoryProvider::new(&server.uri(), Duration::from_secs(10)).unwrap()
    }

    #[tokio::test]
    async fn test_price_near_picks_closest_trading_day() {
        let body = chart_body(&[
            (d(2024, 1, 2), Some(102.0)),
            (d(2024, 1, 3), Some(103.0)),
            (d(2024, 1, 4), Some(104.0)),
        ]);
        let mock_server = create_mock_server("ABC", 200, &body).await;

        // New Year's Day has no bar, the next session is one day away
        let point = provider(&mock_server)
            .price_near("abc", d(2024, 1, 1))
            .await
            .unwrap();
        assert_eq!(
            point,
            Some(PricePoint {
                date: d(2024, 1, 2),
                price: 102.0
            })
        );
    }

    #[tokio::test]
    async fn test_price_near_sends_window_bounds() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/ABC"))
            .and(query_param(
                "period1",
                day_start_timestamp(d(2023, 12, 28)).to_string(),
            ))
            .and(query_param(
                "period2",
                day_start_timestamp(d(2024, 1, 5)).to_string(),
            ))
            .and(query_param("interval", "1d"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(chart_body(&[(d(2024, 1, 1), Some(100.0))])),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let point = provider(&mock_server)
            .price_near("ABC", d(2024, 1, 1))
            .await
            .unwrap();
        assert_eq!(point.map(|p| p.price), Some(100.0));
    }

    #[tokio::test]
    async fn test_timestamps_are_shifted_to_exchange_day() {
        // 23:00 New York on Jan 2 is already Jan 3 in UTC
        let late = day_start_timestamp(d(2024, 1, 3)) + 4 * 3600;
        let body = format!(
            r#"{{"chart": {{"result": [{{
                "meta": {{ "gmtoffset": -18000 }},
                "timestamp": [{late}],
                "indicators": {{ "quote": [{{ "close": [55.5] }}] }}
            }}], "error": null}}}}"#
        );
        let mock_server = create_mock_server("LATE", 200, &body).await;

        let point = provider(&mock_server)
            .price_near("LATE", d(2024, 1, 2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(point.date, d(2024, 1, 2));
        assert_eq!(point.price, 55.5);
    }

    #[tokio::test]
    async fn test_null_closes_are_skipped() {
        let body = chart_body(&[(d(2024, 1, 3), None), (d(2024, 1, 5), Some(7.0))]);
        let mock_server = create_mock_server("GAPS", 200, &body).await;

        let point = provider(&mock_server)
            .price_near("GAPS", d(2024, 1, 3))
            .await
            .unwrap();
        assert_eq!(point.map(|p| p.date), Some(d(2024, 1, 5)));
    }

    #[tokio::test]
    async fn test_empty_history_is_no_point() {
        let body = r#"{"chart": {"result": [{"meta": {"gmtoffset": 0}, "indicators": {"quote": [{}]}}], "error": null}}"#;
        let mock_server = create_mock_server("ILLIQ", 200, body).await;

        let point = provider(&mock_server)
            .price_near("ILLIQ", d(2024, 1, 3))
            .await
            .unwrap();
        assert!(point.is_none());
    }

    #[tokio::test]
    async fn test_unknown_symbol_error() {
        let body = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        let mock_server = create_mock_server("NOPE", 404, body).await;

        let result = provider(&mock_server).price_near("NOPE", d(2024, 1, 3)).await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "Yahoo error for symbol NOPE: No data found, symbol may be delisted (Not Found)"
        );
    }

    #[tokio::test]
    async fn test_server_error_response() {
        let mock_server = create_mock_server("ABC", 500, "").await;

        let result = provider(&mock_server).price_near("ABC", d(2024, 1, 3)).await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "HTTP error: 500 Internal Server Error for symbol: ABC"
        );
    }

    #[tokio::test]
    async fn test_symbol_with_slash_is_one_path_segment() {
        let body = chart_body(&[(d(2024, 1, 3), Some(410.5))]);
        let mock_server = create_mock_server("BRK%2FB", 200, &body).await;

        let point = provider(&mock_server)
            .price_near("brk/b", d(2024, 1, 3))
            .await
            .unwrap();
        assert_eq!(point.map(|p| p.price), Some(410.5));
    }

    #[tokio::test]
    async fn test_request_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/SLOW"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(chart_body(&[(d(2024, 1, 3), Some(1.0))]))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let provider =
            YahooHistoryProvider::new(&mock_server.uri(), Duration::from_millis(50)).unwrap();
        let result = provider.price_near("SLOW", d(2024, 1, 3)).await;
        assert!(result.unwrap_err().to_string().starts_with("Request error"));
    }
}
