use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// One macro data point. `date` is the period the value covers; `released` is
/// the first day the value was public, which is what the as-of join keys on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroObservation {
    pub date: NaiveDate,
    pub released: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Nasdaq,
    Nyse,
    Tsx,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Nasdaq => "NASDAQ",
            Market::Nyse => "NYSE",
            Market::Tsx => "TSX",
        }
    }

    pub fn currency(&self) -> &'static str {
        match self {
            Market::Nasdaq | Market::Nyse => "USD",
            Market::Tsx => "CAD",
        }
    }

    /// Exchange suffix the price provider expects on listed symbols.
    pub fn symbol_suffix(&self) -> Option<&'static str> {
        match self {
            Market::Tsx => Some(".TO"),
            Market::Nasdaq | Market::Nyse => None,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NASDAQ" => Ok(Market::Nasdaq),
            "NYSE" => Ok(Market::Nyse),
            "TSX" => Ok(Market::Tsx),
            other => Err(format!(
                "market must be one of NASDAQ, NYSE, TSX (value: {})",
                other
            )),
        }
    }
}

/// Request as received from a caller. Fields stay optional so validation can
/// report exactly which one is missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionRequest {
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub target_date: Option<String>,
}

impl PredictionRequest {
    pub fn new(ticker: &str, market: &str, target_date: &str) -> Self {
        Self {
            ticker: Some(ticker.to_string()),
            market: Some(market.to_string()),
            target_date: Some(target_date.to_string()),
        }
    }
}

pub const FEATURE_COUNT: usize = 8;
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "close",
    "sma_20",
    "volatility_20",
    "log_return_5d",
    "log_return_10d",
    "volume_zscore_60",
    "macro_rate",
    "macro_index",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub close: f64,
    pub sma_20: f64,
    pub volatility_20: f64,
    pub log_return_5d: f64,
    pub log_return_10d: f64,
    pub volume_zscore_60: f64,
    pub macro_rate: f64,
    pub macro_index: f64,
}

impl FeatureRow {
    /// Column order matches `FEATURE_NAMES`.
    pub fn to_vector(&self) -> Vec<f64> {
        vec![
            self.close,
            self.sma_20,
            self.volatility_20,
            self.log_return_5d,
            self.log_return_10d,
            self.volume_zscore_60,
            self.macro_rate,
            self.macro_index,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.to_vector().iter().all(|value| value.is_finite())
    }
}

/// Feature row tied to the trading day (and bar index) it was computed for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatedFeatureRow {
    pub date: NaiveDate,
    pub bar_index: usize,
    pub features: FeatureRow,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub scored_predictions: i64,
    pub direction_hit_rate: f64,
    pub mean_abs_pct_error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub ticker: String,
    pub market: Market,
    pub target_date: NaiveDate,
    pub days_ahead: i64,
    pub current_price: f64,
    pub predicted_price: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub currency: String,
    pub r_squared: f64,
    pub hit_rate: f64,
    pub training_samples: usize,
    pub volatility: f64,
    pub feature_importance: BTreeMap<String, f64>,
    pub clamped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_record: Option<TrackRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Row appended to the prediction log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: Uuid,
    pub ticker: String,
    pub market: Market,
    pub target_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub days_ahead: i64,
    pub current_price: f64,
    pub predicted_price: f64,
    pub raw_predicted_price: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub currency: String,
    pub r_squared: f64,
    pub hit_rate: f64,
    pub training_samples: i64,
    pub volatility: f64,
    pub feature_importance: Value,
    pub latest_features: Value,
    pub trainer: String,
}

/// Logged prediction whose target date has passed but has no outcome yet.
#[derive(Debug, Clone)]
pub struct DuePrediction {
    pub id: Uuid,
    pub ticker: String,
    pub target_date: NaiveDate,
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_parses_case_insensitively() {
        assert_eq!("tsx".parse::<Market>().unwrap(), Market::Tsx);
        assert_eq!(" Nasdaq ".parse::<Market>().unwrap(), Market::Nasdaq);
        assert!("LSE".parse::<Market>().is_err());
    }

    #[test]
    fn feature_vector_follows_name_order() {
        let row = FeatureRow {
            close: 1.0,
            sma_20: 2.0,
            volatility_20: 3.0,
            log_return_5d: 4.0,
            log_return_10d: 5.0,
            volume_zscore_60: 6.0,
            macro_rate: 7.0,
            macro_index: 8.0,
        };
        let vector = row.to_vector();
        assert_eq!(vector.len(), FEATURE_NAMES.len());
        assert_eq!(vector, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn round_to_handles_requested_places() {
        assert_eq!(round_to(12.345_6, 2), 12.35);
        assert_eq!(round_to(0.123_45, 3), 0.123);
        assert_eq!(round_to(0.012_345_6, 4), 0.0123);
    }

    #[test]
    fn error_response_serializes_single_field() {
        let body = serde_json::to_value(ErrorResponse {
            error: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "error": "boom" }));
    }
}
