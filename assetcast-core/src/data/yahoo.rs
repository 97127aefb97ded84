//! Yahoo Finance data provider.
//!
//! Fetches daily OHLCV bars from Yahoo's v8 chart API and maps them into an
//! [`AssetSeries`]. One HTTP request per call; retry lives in the gateway.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes, which surface as [`DataError::ResponseFormatChanged`].

use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use super::provider::{DataError, MarketDataProvider};
use crate::domain::{AssetSeries, PriceBar};

const CHART_ENDPOINT: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

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
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
}

impl YahooProvider {
    pub fn new() -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Build the chart API URL for a ticker and an inclusive date range.
    fn chart_url(ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::default()).and_utc().timestamp();
        let end_ts = end
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(start_ts);
        format!(
            "{CHART_ENDPOINT}/{ticker}?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true"
        )
    }

    /// Parse the chart API response into bars.
    fn parse_response(ticker: &str, resp: ChartResponse) -> Result<Vec<PriceBar>, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let timestamps = data
            .timestamp
            .ok_or_else(|| DataError::ResponseFormatChanged("no timestamps".into()))?;

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();
            let adj_close = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());

            // Holidays come back as all-null rows.
            if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
                continue;
            }

            let close = close.unwrap_or(f64::NAN);
            bars.push(PriceBar {
                date,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close,
                adj_close: adj_close.unwrap_or(close),
                volume: volume.unwrap_or(0),
            });
        }

        if bars.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            });
        }

        let malformed = malformed_bars(&bars);
        if !malformed.is_empty() {
            warn!(
                ticker,
                count = malformed.len(),
                first = %malformed[0],
                "provider returned bars with inconsistent OHLC values"
            );
        }

        Ok(bars)
    }
}

/// Dates of bars that have a close but fail the OHLC sanity check.
fn malformed_bars(bars: &[PriceBar]) -> Vec<NaiveDate> {
    bars.iter()
        .filter(|b| !b.is_void() && !b.is_sane())
        .map(|b| b.date)
        .collect()
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<AssetSeries, DataError> {
        let url = Self::chart_url(ticker, start, end);
        debug!(%url, "requesting chart");

        let resp = self.client.get(&url).send().map_err(|e| {
            if e.is_timeout() {
                DataError::NetworkUnreachable(format!("request timed out: {e}"))
            } else {
                DataError::NetworkUnreachable(e.to_string())
            }
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            });
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if !status.is_success() {
            return Err(DataError::Other(format!("HTTP {status} for {ticker}")));
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {ticker}: {e}"))
        })?;

        let bars = Self::parse_response(ticker, chart)?;
        Ok(AssetSeries::new(ticker, bars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Vec<PriceBar>, DataError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        YahooProvider::parse_response("BTC-USD", resp)
    }

    #[test]
    fn url_covers_inclusive_range() {
        let start = NaiveDate::from_ymd_opt(2019, 11, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2019, 11, 2).unwrap();
        let url = YahooProvider::chart_url("BTC-USD", start, end);
        assert!(url.contains("/BTC-USD?"));
        assert!(url.contains("period1=1572566400"));
        assert!(url.contains("period2=1572739199"));
        assert!(url.contains("interval=1d"));
    }

    #[test]
    fn parses_bars_and_skips_holidays() {
        let json = r#"{"chart":{"result":[{
            "timestamp":[1704153600,1704240000,1704326400],
            "indicators":{
                "quote":[{"open":[1.0,null,3.0],"high":[1.5,null,3.5],
                          "low":[0.5,null,2.5],"close":[1.2,null,3.2],
                          "volume":[10,null,30]}],
                "adjclose":[{"adjclose":[1.1,null,3.1]}]
            }}],"error":null}}"#;
        let bars = parse(json).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[1].close, 3.2);
        assert_eq!(bars[1].adj_close, 3.1);
        assert_eq!(bars[1].volume, 30);
    }

    #[test]
    fn not_found_error_maps_to_symbol_not_found() {
        let json = r#"{"chart":{"result":null,
            "error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        assert!(matches!(parse(json), Err(DataError::SymbolNotFound { .. })));
    }

    #[test]
    fn other_chart_errors_are_format_changes() {
        let json = r#"{"chart":{"result":null,
            "error":{"code":"Bad Request","description":"Invalid input"}}}"#;
        assert!(matches!(
            parse(json),
            Err(DataError::ResponseFormatChanged(_))
        ));
    }

    #[test]
    fn inconsistent_bars_are_kept_and_flagged() {
        let json = r#"{"chart":{"result":[{
            "timestamp":[1704153600,1704240000,1704326400],
            "indicators":{"quote":[{"open":[1.0,2.0,3.0],"high":[1.5,1.0,3.5],
                                    "low":[0.5,1.5,2.5],"close":[1.2,null,3.2],
                                    "volume":[10,20,30]}]}}],"error":null}}"#;
        let bars = parse(json).unwrap();
        assert_eq!(bars.len(), 3);
        // The second bar has high < low but no close, so it is void rather than malformed.
        assert!(malformed_bars(&bars).is_empty());

        let mut bars = bars;
        bars[2].high = 2.0;
        assert_eq!(
            malformed_bars(&bars),
            vec![NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()]
        );
    }

    #[test]
    fn missing_adjclose_falls_back_to_close() {
        let json = r#"{"chart":{"result":[{
            "timestamp":[1704153600],
            "indicators":{"quote":[{"open":[1.0],"high":[1.0],"low":[1.0],
                                    "close":[1.0],"volume":[1]}]}}],"error":null}}"#;
        let bars = parse(json).unwrap();
        assert_eq!(bars[0].adj_close, 1.0);
    }
}
