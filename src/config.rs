use crate::features::MacroPolicy;
use crate::fred::DEFAULT_OBSERVATIONS_URL;
use crate::http_client::TrainerTls;
use crate::ridge::DEFAULT_LAMBDA;
use crate::yahoo::DEFAULT_CHART_URL;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HISTORY_DAYS: i64 = 730;
pub const DEFAULT_MIN_PRICE_BARS: usize = 200;
pub const DEFAULT_MIN_TRAINING_MARGIN: usize = 30;
pub const DEFAULT_MACRO_LOOKBACK_DAYS: i64 = 120;
pub const DEFAULT_MACRO_RATE_SERIES: &str = "FEDFUNDS";
pub const DEFAULT_MACRO_INDEX_SERIES: &str = "CPIAUCSL";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
/// Upper bound for every day or bar count setting (about a century).
pub const MAX_SPAN: usize = 36_500;
const MAX_HTTP_TIMEOUT_SECS: usize = 3_600;

/// Collects the process environment (after `.env` loading) into a settings map.
pub fn settings_from_env() -> HashMap<String, String> {
    env::vars().collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSettings {
    pub database_url: Option<String>,
    pub ridge_lambda: f64,
    pub history_days: i64,
    pub min_price_bars: usize,
    pub min_training_margin: usize,
    pub macro_rate_series: String,
    pub macro_index_series: String,
    pub macro_lookback_days: i64,
    pub macro_policy: MacroPolicy,
    pub price_history_url: String,
    pub macro_series_url: String,
    pub fred_api_key: Option<String>,
    pub http_timeout: Duration,
    pub trainer_url: Option<String>,
    pub trainer_tls: TrainerTls,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            ridge_lambda: DEFAULT_LAMBDA,
            history_days: DEFAULT_HISTORY_DAYS,
            min_price_bars: DEFAULT_MIN_PRICE_BARS,
            min_training_margin: DEFAULT_MIN_TRAINING_MARGIN,
            macro_rate_series: DEFAULT_MACRO_RATE_SERIES.to_string(),
            macro_index_series: DEFAULT_MACRO_INDEX_SERIES.to_string(),
            macro_lookback_days: DEFAULT_MACRO_LOOKBACK_DAYS,
            macro_policy: MacroPolicy::StrictDrop,
            price_history_url: DEFAULT_CHART_URL.to_string(),
            macro_series_url: DEFAULT_OBSERVATIONS_URL.to_string(),
            fred_api_key: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            trainer_url: None,
            trainer_tls: TrainerTls::default(),
        }
    }
}

impl ForecastSettings {
    pub fn from_settings_map(settings: &HashMap<String, String>) -> Result<Self> {
        let ridge_lambda = setting_f64(settings, "RIDGE_LAMBDA", DEFAULT_LAMBDA, 0.0)?;
        if ridge_lambda <= 0.0 {
            return Err(anyhow!(
                "Setting RIDGE_LAMBDA must be > 0 (value: {})",
                ridge_lambda
            ));
        }
        let history_days = setting_usize(
            settings,
            "HISTORY_DAYS",
            DEFAULT_HISTORY_DAYS as usize,
            1,
            MAX_SPAN,
        )? as i64;
        let min_price_bars = setting_usize(
            settings,
            "MIN_PRICE_BARS",
            DEFAULT_MIN_PRICE_BARS,
            1,
            MAX_SPAN,
        )?;
        let min_training_margin = setting_usize(
            settings,
            "MIN_TRAINING_MARGIN",
            DEFAULT_MIN_TRAINING_MARGIN,
            1,
            MAX_SPAN,
        )?;
        let macro_lookback_days = setting_usize(
            settings,
            "MACRO_LOOKBACK_DAYS",
            DEFAULT_MACRO_LOOKBACK_DAYS as usize,
            0,
            MAX_SPAN,
        )? as i64;
        let macro_policy =
            parse_macro_policy(setting(settings, "MACRO_POLICY").unwrap_or("drop"))?;
        let http_timeout_secs = setting_usize(
            settings,
            "HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT_SECS as usize,
            1,
            MAX_HTTP_TIMEOUT_SECS,
        )?;

        Ok(Self {
            database_url: setting(settings, "DATABASE_URL").map(str::to_string),
            ridge_lambda,
            history_days,
            min_price_bars,
            min_training_margin,
            macro_rate_series: setting(settings, "MACRO_RATE_SERIES")
                .unwrap_or(DEFAULT_MACRO_RATE_SERIES)
                .to_string(),
            macro_index_series: setting(settings, "MACRO_INDEX_SERIES")
                .unwrap_or(DEFAULT_MACRO_INDEX_SERIES)
                .to_string(),
            macro_lookback_days,
            macro_policy,
            price_history_url: setting(settings, "PRICE_HISTORY_URL")
                .unwrap_or(DEFAULT_CHART_URL)
                .to_string(),
            macro_series_url: setting(settings, "MACRO_SERIES_URL")
                .unwrap_or(DEFAULT_OBSERVATIONS_URL)
                .to_string(),
            fred_api_key: setting(settings, "FRED_API_KEY").map(str::to_string),
            http_timeout: Duration::from_secs(http_timeout_secs as u64),
            trainer_url: setting(settings, "TRAINER_URL").map(str::to_string),
            trainer_tls: TrainerTls {
                ca_cert: setting(settings, "TRAINER_MTLS_CA_CERT").map(PathBuf::from),
                client_cert: setting(settings, "TRAINER_MTLS_CLIENT_CERT").map(PathBuf::from),
                client_key: setting(settings, "TRAINER_MTLS_CLIENT_KEY").map(PathBuf::from),
            },
        })
    }
}

pub fn parse_macro_policy(raw: &str) -> Result<MacroPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "drop" | "strict" => Ok(MacroPolicy::StrictDrop),
        "constant" | "fallback" => Ok(MacroPolicy::constant_fallback()),
        other => Err(anyhow!(
            "MACRO_POLICY must be drop or constant (value: {})",
            other
        )),
    }
}

fn setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn setting_f64(
    settings: &HashMap<String, String>,
    key: &str,
    default: f64,
    min: f64,
) -> Result<f64> {
    let Some(raw) = setting(settings, key) else {
        return Ok(default);
    };
    let value = raw
        .parse::<f64>()
        .map_err(|_| anyhow!("Setting {} must be a number (value: {})", key, raw))?;
    if !value.is_finite() {
        return Err(anyhow!("Setting {} must be finite (value: {})", key, raw));
    }
    if value < min {
        return Err(anyhow!(
            "Setting {} must be >= {} (value: {})",
            key,
            min,
            raw
        ));
    }
    Ok(value)
}

fn setting_usize(
    settings: &HashMap<String, String>,
    key: &str,
    default: usize,
    min: usize,
    max: usize,
) -> Result<usize> {
    let Some(raw) = setting(settings, key) else {
        return Ok(default);
    };
    let value = raw
        .parse::<f64>()
        .map_err(|_| anyhow!("Setting {} must be a number (value: {})", key, raw))?;
    if !value.is_finite() {
        return Err(anyhow!("Setting {} must be finite (value: {})", key, raw));
    }
    if value.fract() != 0.0 {
        return Err(anyhow!(
            "Setting {} must be an integer (value: {})",
            key,
            raw
        ));
    }
    if value < min as f64 {
        return Err(anyhow!(
            "Setting {} must be >= {} (value: {})",
            key,
            min,
            raw
        ));
    }
    if value > max as f64 {
        return Err(anyhow!(
            "Setting {} must be <= {} (value: {})",
            key,
            max,
            raw
        ));
    }
    Ok(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_map_yields_defaults() {
        let parsed = ForecastSettings::from_settings_map(&HashMap::new()).unwrap();
        assert_eq!(parsed, ForecastSettings::default());
        assert_eq!(parsed.macro_policy, MacroPolicy::StrictDrop);
    }

    #[test]
    fn overrides_are_trimmed_and_parsed() {
        let parsed = ForecastSettings::from_settings_map(&settings(&[
            ("RIDGE_LAMBDA", " 2.5 "),
            ("HISTORY_DAYS", "365"),
            ("MACRO_POLICY", "Constant"),
            ("TRAINER_URL", "http://127.0.0.1:9000"),
            ("FRED_API_KEY", ""),
        ]))
        .unwrap();
        assert_eq!(parsed.ridge_lambda, 2.5);
        assert_eq!(parsed.history_days, 365);
        assert_eq!(parsed.macro_policy, MacroPolicy::constant_fallback());
        assert_eq!(parsed.trainer_url.as_deref(), Some("http://127.0.0.1:9000"));
        assert!(parsed.fred_api_key.is_none());
    }

    #[test]
    fn lambda_must_be_strictly_positive() {
        let err = ForecastSettings::from_settings_map(&settings(&[("RIDGE_LAMBDA", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("RIDGE_LAMBDA must be > 0"));
    }

    #[test]
    fn integer_settings_reject_fractions() {
        let err = ForecastSettings::from_settings_map(&settings(&[("MIN_PRICE_BARS", "20.5")]))
            .unwrap_err();
        assert!(err.to_string().contains("must be an integer"));
    }

    #[test]
    fn day_spans_are_bounded() {
        for key in ["HISTORY_DAYS", "MACRO_LOOKBACK_DAYS"] {
            let err = ForecastSettings::from_settings_map(&settings(&[(key, "1e15")]))
                .unwrap_err();
            assert!(err.to_string().contains("must be <= 36500"), "{key}: {err}");
        }
        let parsed =
            ForecastSettings::from_settings_map(&settings(&[("HISTORY_DAYS", "36500")])).unwrap();
        assert_eq!(parsed.history_days, 36_500);
    }

    #[test]
    fn unknown_macro_policy_is_rejected() {
        assert!(parse_macro_policy("zero").is_err());
    }
}
