//! Macro series from FRED's observations endpoint.

use crate::error::DataError;
use crate::models::MacroObservation;
use crate::providers::MacroSeriesProvider;
use chrono::NaiveDate;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

pub const DEFAULT_OBSERVATIONS_URL: &str = "https://api.stlouisfed.org/fred/series/observations";
const PROVIDER_NAME: &str = "fred";
const MISSING_VALUE: &str = ".";
// Full real-time window with initial-release output: one row per period,
// stamped with the day that value was first published.
const REALTIME_START: &str = "1776-07-04";
const REALTIME_END: &str = "9999-12-31";
const OUTPUT_INITIAL_RELEASE: &str = "4";

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Option<Vec<RawObservation>>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    #[serde(default)]
    realtime_start: Option<String>,
    date: String,
    value: String,
}

pub struct FredClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl FredClient {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }
}

impl MacroSeriesProvider for FredClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch_series(
        &self,
        series_id: &str,
        start: NaiveDate,
    ) -> Result<Vec<MacroObservation>, DataError> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!(
                "FRED_API_KEY is not set; series {} will have no observations",
                series_id
            );
            return Ok(Vec::new());
        };

        let observation_start = start.format("%Y-%m-%d").to_string();
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("series_id", series_id),
                ("api_key", api_key),
                ("file_type", "json"),
                ("observation_start", observation_start.as_str()),
                ("realtime_start", REALTIME_START),
                ("realtime_end", REALTIME_END),
                ("output_type", OUTPUT_INITIAL_RELEASE),
            ])
            .send()
            .await
            .map_err(|err| DataError::Network(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(DataError::UnknownTicker(series_id.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DataError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| DataError::Network(err.to_string()))?;
        let observations = parse_observations(series_id, &body)?;
        debug!(
            "Fetched {} observations for {} since {}",
            observations.len(),
            series_id,
            start
        );
        Ok(observations)
    }
}

pub(crate) fn parse_observations(
    series_id: &str,
    body: &str,
) -> Result<Vec<MacroObservation>, DataError> {
    let response: ObservationsResponse = serde_json::from_str(body)
        .map_err(|err| DataError::Malformed(format!("series {}: {}", series_id, err)))?;
    let raw = response.observations.ok_or_else(|| {
        DataError::Malformed(format!("series {}: missing observations", series_id))
    })?;

    Ok(raw
        .into_iter()
        .filter(|obs| obs.value != MISSING_VALUE)
        .filter_map(|obs| {
            let date = parse_date(&obs.date)?;
            let value = obs.value.trim().parse::<f64>().ok()?;
            // without a vintage stamp the period start is the best known release day
            let released = obs
                .realtime_start
                .as_deref()
                .and_then(parse_date)
                .map_or(date, |released| released.max(date));
            Some(MacroObservation {
                date,
                released,
                value,
            })
        })
        .collect())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}
