//! Yahoo Finance price provider.
//!
//! Fetches daily closes from Yahoo's v8 chart API. Yahoo has no official
//! API and is subject to unannounced format changes, so parsing is strict
//! about structure and lenient about missing values.

use super::provider::{FetchError, PriceProvider};
use crate::config::{DateRange, FetchWindow, Period};
use crate::domain::PricePoint;
use chrono::{DateTime, NaiveDate};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

const BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    currency: Option<String>,
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Yahoo Finance price provider. One attempt per request.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: Url,
}

impl YahooProvider {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_base_url(BASE_URL)
    }

    /// Point the provider at another chart endpoint (proxies, mirrors).
    pub fn with_base_url(base_url: &str) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| FetchError::Other(format!("invalid chart URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::Other(format!("invalid chart URL '{base_url}'")));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| FetchError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Build the chart API URL for a symbol and window. The symbol is one
    /// percent-encoded path segment.
    fn chart_url(&self, symbol: &str, window: &FetchWindow) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Other(format!("invalid chart URL '{}'", self.base_url)))?
            .pop_if_empty()
            .push(symbol);

        {
            let mut query = url.query_pairs_mut();
            match window {
                FetchWindow::Range(range) => {
                    let (start_ts, end_ts) = range_timestamps(range)?;
                    query
                        .append_pair("period1", &start_ts.to_string())
                        .append_pair("period2", &end_ts.to_string());
                }
                FetchWindow::Period(Period::Auto) => {
                    return Err(FetchError::Other(
                        "'auto' must be resolved to a date range before fetching".into(),
                    ))
                }
                FetchWindow::Period(period) => {
                    query.append_pair("range", &period.to_string());
                }
            }
            query
                .append_pair("interval", "1d")
                .append_pair("events", "history");
        }
        Ok(url)
    }
}

/// Unix timestamps covering `range` inclusively.
fn range_timestamps(range: &DateRange) -> Result<(i64, i64), FetchError> {
    let start = range
        .start()
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| FetchError::Other(format!("invalid start date {}", range.start())))?;
    let end = range
        .end()
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| FetchError::Other(format!("invalid end date {}", range.end())))?;
    Ok((start.and_utc().timestamp(), end.and_utc().timestamp()))
}

/// Parse the chart API response into price points.
///
/// Timestamps are shifted by the exchange's `gmtoffset` so that a bar is
/// dated by the exchange's own calendar day.
fn parse_response(
    symbol: &str,
    resp: ChartResponse,
    window: &FetchWindow,
) -> Result<Vec<PricePoint>, FetchError> {
    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) if err.code == "Not Found" => FetchError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        Some(err) => FetchError::ResponseFormatChanged(format!("{}: {}", err.code, err.description)),
        None => FetchError::ResponseFormatChanged("empty result with no error".into()),
    })?;

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::ResponseFormatChanged("result array is empty".into()))?;

    // No timestamps: the symbol exists but nothing traded in the window.
    let Some(timestamps) = data.timestamp else {
        return Ok(Vec::new());
    };

    let offset = data.meta.as_ref().and_then(|m| m.gmtoffset).unwrap_or(0);
    if let Some(currency) = data.meta.as_ref().and_then(|m| m.currency.as_deref()) {
        tracing::debug!(%symbol, %currency, "quote currency");
    }

    let closes = data
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .ok_or_else(|| FetchError::ResponseFormatChanged("no quote data".into()))?;

    let mut points = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = local_date(ts, offset).ok_or_else(|| {
            FetchError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
        })?;

        // Skip bars without a close (holidays, halted trading)
        let Some(close) = closes.get(i).copied().flatten() else {
            continue;
        };

        if let FetchWindow::Range(range) = window {
            if !range.contains(date) {
                continue;
            }
        }

        points.push(PricePoint { date, close });
    }

    points.sort_by_key(|p| p.date);
    Ok(points)
}

fn local_date(ts: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts.checked_add(gmtoffset)?, 0).map(|dt| dt.naive_utc().date())
}

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, symbol: &str, window: &FetchWindow) -> Result<Vec<PricePoint>, FetchError> {
        let url = self.chart_url(symbol, window)?;
        tracing::debug!(%symbol, %window, %url, "requesting chart");

        let resp = self.client.get(url).send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                FetchError::NetworkUnreachable(e.to_string())
            } else {
                FetchError::Other(e.to_string())
            }
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                symbol: symbol.to_string(),
                status: status.as_u16(),
            });
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            FetchError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        parse_response(symbol, chart, window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn parse(json: &str, window: &FetchWindow) -> Result<Vec<PricePoint>, FetchError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        parse_response("TEST", resp, window)
    }

    const TWO_DAYS: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"currency": "EUR", "symbol": "VWRL.AS", "gmtoffset": 3600},
                "timestamp": [1704182400, 1704268800, 1704355200],
                "indicators": {
                    "quote": [{
                        "open": [1.0, 2.0, 3.0],
                        "close": [105.12, null, 106.5]
                    }],
                    "adjclose": [{"adjclose": [105.12, null, 106.5]}]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_closes_and_skips_nulls() {
        let window = FetchWindow::Period(Period::Days5);
        let points = parse(TWO_DAYS, &window).unwrap();
        assert_eq!(
            points,
            vec![
                PricePoint { date: d(2024, 1, 2), close: 105.12 },
                PricePoint { date: d(2024, 1, 4), close: 106.5 },
            ]
        );
    }

    #[test]
    fn drops_points_outside_explicit_range() {
        let window = FetchWindow::Range(DateRange::new(d(2024, 1, 3), d(2024, 1, 5)).unwrap());
        let points = parse(TWO_DAYS, &window).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].date, d(2024, 1, 4));
    }

    #[test]
    fn gmtoffset_moves_bar_to_exchange_day() {
        // 2024-01-02 15:00 UTC is 2024-01-03 00:00 in Tokyo.
        let json = r#"{"chart":{"result":[{
            "meta":{"gmtoffset":32400},
            "timestamp":[1704207600],
            "indicators":{"quote":[{"close":[2500.0]}]}
        }],"error":null}}"#;
        let points = parse(json, &FetchWindow::Period(Period::Day1)).unwrap();
        assert_eq!(points[0].date, d(2024, 1, 3));
    }

    #[test]
    fn missing_timestamps_is_empty_series() {
        let json = r#"{"chart":{"result":[{
            "meta":{"currency":"USD"},
            "indicators":{"quote":[{}]}
        }],"error":null}}"#;
        let points = parse(json, &FetchWindow::Period(Period::Day1)).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn not_found_maps_to_symbol_not_found() {
        let json = r#"{"chart":{"result":null,"error":{
            "code":"Not Found","description":"No data found, symbol may be delisted"
        }}}"#;
        let err = parse(json, &FetchWindow::Period(Period::Day1)).unwrap_err();
        assert!(matches!(err, FetchError::SymbolNotFound { ref symbol } if symbol == "TEST"));
    }

    #[test]
    fn other_errors_are_format_changes() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"x"}}}"#;
        let err = parse(json, &FetchWindow::Period(Period::Day1)).unwrap_err();
        assert!(matches!(err, FetchError::ResponseFormatChanged(_)));
    }

    #[test]
    fn url_uses_range_or_period() {
        let provider = YahooProvider::with_base_url("http://localhost").unwrap();
        let range = FetchWindow::Range(DateRange::new(d(2024, 1, 2), d(2024, 1, 5)).unwrap());
        let url = provider.chart_url("ABC", &range).unwrap();
        assert!(url
            .as_str()
            .starts_with("http://localhost/ABC?period1=1704153600&period2=1704499199"));
        assert!(url.as_str().contains("interval=1d"));

        let url = provider
            .chart_url("ABC", &FetchWindow::Period(Period::Ytd))
            .unwrap();
        assert!(url.as_str().contains("range=ytd"));

        assert!(provider
            .chart_url("ABC", &FetchWindow::Period(Period::Auto))
            .is_err());
    }

    #[test]
    fn symbols_are_encoded_as_one_path_segment() {
        let provider = YahooProvider::with_base_url("http://localhost/chart/").unwrap();
        let window = FetchWindow::Period(Period::Day1);

        let url = provider.chart_url("BRK/B", &window).unwrap();
        assert_eq!(url.path(), "/chart/BRK%2FB");

        let url = provider.chart_url("ABC DEF", &window).unwrap();
        assert_eq!(url.path(), "/chart/ABC%20DEF");

        let url = provider.chart_url("A?x=1&y", &window).unwrap();
        assert_eq!(url.path(), "/chart/A%3Fx=1&y");
        let keys: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(keys, vec!["range", "interval", "events"]);
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(YahooProvider::with_base_url("not a url").is_err());
        assert!(YahooProvider::with_base_url("mailto:someone@example.com").is_err());
    }
}
