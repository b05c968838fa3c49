//! Daily OHLCV bars from Yahoo's v8 chart API.
//!
//! One GET per call, no retry. Missing arrays in the payload are treated as a
//! malformed response rather than as "no data".

use crate::error::DataError;
use crate::models::PriceBar;
use crate::providers::PriceHistoryProvider;
use chrono::{DateTime, NaiveDate};
use log::debug;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

pub const DEFAULT_CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const PROVIDER_NAME: &str = "yahoo_finance";

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
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    close: Option<Vec<Option<f64>>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

pub struct YahooClient {
    http: Client,
    base_url: String,
}

impl YahooClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn chart_url(&self, symbol: &str) -> String {
        format!("{}/{}", self.base_url, symbol)
    }
}

impl PriceHistoryProvider for YahooClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, DataError> {
        let period1 = day_start_timestamp(start);
        let period2 = day_start_timestamp(end) + 86_399;
        let query = [
            ("period1", period1.to_string()),
            ("period2", period2.to_string()),
            ("interval", "1d".to_string()),
        ];

        let response = self
            .http
            .get(self.chart_url(symbol))
            .query(&query)
            .send()
            .await
            .map_err(|err| DataError::Network(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DataError::UnknownTicker(symbol.to_string()));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited);
        }
        if !status.is_success() {
            return Err(DataError::Http {
                status: status.as_u16(),
                message: format!("chart request for {} failed", symbol),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| DataError::Network(err.to_string()))?;
        let bars = parse_chart_payload(symbol, &body)?;
        debug!(
            "Fetched {} daily bars for {} ({} - {})",
            bars.len(),
            symbol,
            start,
            end
        );
        Ok(bars)
    }
}

fn day_start_timestamp(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

pub(crate) fn parse_chart_payload(symbol: &str, body: &str) -> Result<Vec<PriceBar>, DataError> {
    let response: ChartResponse = serde_json::from_str(body)
        .map_err(|err| DataError::Malformed(format!("chart response for {}: {}", symbol, err)))?;

    let Some(results) = response.chart.result else {
        return Err(match response.chart.error {
            Some(err) if err.code == "Not Found" => DataError::UnknownTicker(symbol.to_string()),
            Some(err) => DataError::Malformed(format!("{}: {}", err.code, err.description)),
            None => DataError::Malformed("empty result with no error".to_string()),
        });
    };

    let data = results
        .into_iter()
        .next()
        .ok_or_else(|| DataError::NoData(symbol.to_string()))?;
    let timestamps = data
        .timestamp
        .ok_or_else(|| DataError::Malformed("missing timestamp array".to_string()))?;
    let quote = data
        .indicators
        .and_then(|indicators| indicators.quote.into_iter().next())
        .ok_or_else(|| DataError::Malformed("missing quote data".to_string()))?;
    let closes = quote
        .close
        .ok_or_else(|| DataError::Malformed("missing close prices".to_string()))?;

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| DataError::Malformed(format!("invalid timestamp: {}", ts)))?;

        let close = closes.get(i).copied().flatten();
        let Some(close) = close.filter(|value| value.is_finite() && *value > 0.0) else {
            // holidays come back as all-null rows
            continue;
        };
        let open = quote.open.get(i).copied().flatten().unwrap_or(close);
        let high = quote.high.get(i).copied().flatten().unwrap_or(close);
        let low = quote.low.get(i).copied().flatten().unwrap_or(close);
        let volume = quote.volume.get(i).copied().flatten().unwrap_or(0.0);

        bars.push(PriceBar {
            date,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    if bars.is_empty() {
        return Err(DataError::NoData(symbol.to_string()));
    }

    Ok(bars)
}
