//! Single-shot forecast pipeline.
//!
//! `Validating → FetchingData → Aligning → Training → Predicting → Persisting → Done`,
//! with `Failed` reachable from every step. Each request fits its own
//! standardizer and model from freshly fetched data; nothing is cached between
//! requests.

use crate::bands::ConfidenceBand;
use crate::config::ForecastSettings;
use crate::diagnostics::{directional_hit_rate, feature_importance, r_squared};
use crate::error::{DataError, ForecastError};
use crate::features::{build_feature_rows, MacroSeries};
use crate::models::{
    round_to, Market, MacroObservation, PredictionRecord, PredictionRequest, PredictionResult,
    PriceBar, FEATURE_COUNT, FEATURE_NAMES,
};
use crate::providers::{DiscardLog, MacroSeriesProvider, PredictionLog, PriceHistoryProvider};
use crate::standardizer::Standardizer;
use crate::trainer::ModelTrainer;
use chrono::{Duration, NaiveDate, Utc};
use log::{debug, error, info, warn};
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastStage {
    Validating,
    FetchingData,
    Aligning,
    Training,
    Predicting,
    Persisting,
    Done,
    Failed,
}

/// Outcome of one request together with the stages it passed through.
#[derive(Debug)]
pub struct ForecastRun {
    pub stages: Vec<ForecastStage>,
    pub outcome: Result<PredictionResult, ForecastError>,
}

impl ForecastRun {
    pub fn reached(&self, stage: ForecastStage) -> bool {
        self.stages.contains(&stage)
    }
}

#[derive(Default)]
struct StageTracker {
    stages: Vec<ForecastStage>,
}

impl StageTracker {
    fn enter(&mut self, stage: ForecastStage) {
        if let Some(previous) = self.stages.last() {
            debug!("Forecast stage {:?} -> {:?}", previous, stage);
        } else {
            debug!("Forecast stage {:?}", stage);
        }
        self.stages.push(stage);
    }

    fn current(&self) -> Option<ForecastStage> {
        self.stages.last().copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ValidatedRequest {
    ticker: String,
    market: Market,
    target_date: NaiveDate,
    days_ahead: i64,
}

pub struct Forecaster<'a, P, M, T, L = DiscardLog> {
    settings: &'a ForecastSettings,
    prices: &'a P,
    macros: &'a M,
    trainer: &'a T,
    log: &'a L,
}

impl<'a, P, M, T> Forecaster<'a, P, M, T, DiscardLog>
where
    P: PriceHistoryProvider,
    M: MacroSeriesProvider,
    T: ModelTrainer,
{
    pub fn new(
        settings: &'a ForecastSettings,
        prices: &'a P,
        macros: &'a M,
        trainer: &'a T,
    ) -> Self {
        Self {
            settings,
            prices,
            macros,
            trainer,
            log: &DiscardLog,
        }
    }
}

impl<'a, P, M, T, L> Forecaster<'a, P, M, T, L>
where
    P: PriceHistoryProvider,
    M: MacroSeriesProvider,
    T: ModelTrainer,
    L: PredictionLog,
{
    pub fn with_log<L2: PredictionLog>(self, log: &'a L2) -> Forecaster<'a, P, M, T, L2> {
        Forecaster {
            settings: self.settings,
            prices: self.prices,
            macros: self.macros,
            trainer: self.trainer,
            log,
        }
    }

    pub async fn forecast(
        &self,
        request: &PredictionRequest,
        today: NaiveDate,
    ) -> Result<PredictionResult, ForecastError> {
        self.run(request, today).await.outcome
    }

    pub async fn run(&self, request: &PredictionRequest, today: NaiveDate) -> ForecastRun {
        let mut tracker = StageTracker::default();
        let outcome = self.execute(request, today, &mut tracker).await;

        match &outcome {
            Ok(result) => {
                tracker.enter(ForecastStage::Done);
                info!(
                    "Forecast {} {} -> {}: {:.2} (band {:.2}..{:.2}, r2 {:.3}, {} samples)",
                    result.ticker,
                    result.market,
                    result.target_date,
                    result.predicted_price,
                    result.lower_bound,
                    result.upper_bound,
                    result.r_squared,
                    result.training_samples
                );
            }
            Err(err) => {
                let failed_at = tracker.current();
                tracker.enter(ForecastStage::Failed);
                warn!("Forecast failed during {:?}: {}", failed_at, err);
            }
        }

        ForecastRun {
            stages: tracker.stages,
            outcome,
        }
    }

    async fn execute(
        &self,
        request: &PredictionRequest,
        today: NaiveDate,
        tracker: &mut StageTracker,
    ) -> Result<PredictionResult, ForecastError> {
        tracker.enter(ForecastStage::Validating);
        let request = validate_request(request, today)?;
        let horizon = request.days_ahead as usize;

        tracker.enter(ForecastStage::FetchingData);
        let price_start = today - Duration::days(self.settings.history_days);
        let macro_start = price_start - Duration::days(self.settings.macro_lookback_days);
        let (bars, rate, index) = tokio::join!(
            self.prices
                .fetch_daily_bars(&request.ticker, price_start, today),
            self.macros
                .fetch_series(&self.settings.macro_rate_series, macro_start),
            self.macros
                .fetch_series(&self.settings.macro_index_series, macro_start),
        );

        let bars = match bars {
            Ok(bars) => sanitize_bars(bars),
            Err(DataError::NoData(_)) => Vec::new(),
            Err(DataError::UnknownTicker(symbol)) => {
                return Err(ForecastError::Validation(format!(
                    "unknown ticker: {}",
                    symbol
                )))
            }
            Err(err) => return Err(ForecastError::upstream(self.prices.name(), err)),
        };
        if bars.len() < self.settings.min_price_bars {
            return Err(ForecastError::InsufficientHistory {
                bars: bars.len(),
                required: self.settings.min_price_bars,
            });
        }
        let rate = self.resolve_macro(&self.settings.macro_rate_series, rate)?;
        let index = self.resolve_macro(&self.settings.macro_index_series, index)?;

        tracker.enter(ForecastStage::Aligning);
        let rows = build_feature_rows(&bars, &rate, &index, self.settings.macro_policy);
        let required = horizon + self.settings.min_training_margin;
        debug!(
            "{}: {} bars, {} aligned rows (rate obs {}, index obs {})",
            request.ticker,
            bars.len(),
            rows.len(),
            rate.len(),
            index.len()
        );
        if rows.len() < required {
            return Err(ForecastError::InsufficientAlignedHistory {
                rows: rows.len(),
                required,
            });
        }
        let Some(latest) = rows.last() else {
            return Err(ForecastError::InsufficientAlignedHistory { rows: 0, required });
        };

        tracker.enter(ForecastStage::Training);
        let mut flat = Vec::with_capacity(rows.len() * FEATURE_COUNT);
        let mut targets = Vec::with_capacity(rows.len());
        let mut bases = Vec::with_capacity(rows.len());
        for row in &rows {
            let Some(label) = bars.get(row.bar_index + horizon) else {
                continue;
            };
            flat.extend(row.features.to_vector());
            targets.push(label.close);
            bases.push(row.features.close);
        }
        if targets.is_empty() {
            return Err(ForecastError::InsufficientAlignedHistory { rows: 0, required });
        }
        let features = Array2::from_shape_vec((targets.len(), FEATURE_COUNT), flat)
            .map_err(|err| ForecastError::NumericDegeneracy(err.to_string()))?;
        let targets = Array1::from(targets);

        let standardizer = Standardizer::fit(&features)?;
        let standardized = standardizer.apply_all(&features)?;
        let model = self
            .trainer
            .fit(&standardized, &targets, self.settings.ridge_lambda)
            .await?;

        tracker.enter(ForecastStage::Predicting);
        let latest_vector = Array1::from(latest.features.to_vector());
        let raw_prediction = model
            .predict(standardizer.apply(latest_vector.view())?.view())
            .map_err(|err| ForecastError::NumericDegeneracy(err.to_string()))?;
        if !raw_prediction.is_finite() {
            return Err(ForecastError::NumericDegeneracy(
                "prediction is not finite".to_string(),
            ));
        }

        let current_price = latest.features.close;
        let volatility = latest.features.volatility_20;
        let band = ConfidenceBand::from_volatility(current_price, volatility, request.days_ahead);
        let clamped = !band.contains(raw_prediction);
        let predicted_price = band.clamp(raw_prediction);
        if clamped {
            debug!(
                "{}: raw prediction {:.4} clamped into [{:.4}, {:.4}]",
                request.ticker, raw_prediction, band.lower, band.upper
            );
        }

        let targets = targets.to_vec();
        let fitted = model
            .predict_all(&standardized)
            .map_err(|err| ForecastError::NumericDegeneracy(err.to_string()))?
            .to_vec();
        let result = PredictionResult {
            ticker: request.ticker.clone(),
            market: request.market,
            target_date: request.target_date,
            days_ahead: request.days_ahead,
            current_price: round_to(current_price, 2),
            predicted_price: round_to(predicted_price, 2),
            lower_bound: round_to(band.lower, 2),
            upper_bound: round_to(band.upper, 2),
            currency: request.market.currency().to_string(),
            r_squared: round_to(r_squared(&targets, &fitted), 3),
            hit_rate: round_to(directional_hit_rate(&bases, &targets, &fitted), 3),
            training_samples: targets.len(),
            volatility: round_to(volatility, 4),
            feature_importance: feature_importance(&FEATURE_NAMES, &model.weights.to_vec()),
            clamped,
            track_record: None,
        };

        tracker.enter(ForecastStage::Persisting);
        let latest_features: BTreeMap<&str, f64> = FEATURE_NAMES
            .iter()
            .copied()
            .zip(latest_vector.iter().copied())
            .collect();
        let record = PredictionRecord {
            id: Uuid::new_v4(),
            ticker: result.ticker.clone(),
            market: result.market,
            target_date: result.target_date,
            created_at: Utc::now(),
            days_ahead: result.days_ahead,
            current_price: result.current_price,
            predicted_price: result.predicted_price,
            raw_predicted_price: raw_prediction,
            lower_bound: result.lower_bound,
            upper_bound: result.upper_bound,
            currency: result.currency.clone(),
            r_squared: result.r_squared,
            hit_rate: result.hit_rate,
            training_samples: result.training_samples as i64,
            volatility: result.volatility,
            feature_importance: serde_json::to_value(&result.feature_importance)
                .unwrap_or_default(),
            latest_features: serde_json::to_value(&latest_features).unwrap_or_default(),
            trainer: self.trainer.name().to_string(),
        };
        if let Err(err) = self.log.append(&record).await {
            error!(
                "Failed to persist prediction {} for {}: {:#}",
                record.id, record.ticker, err
            );
        }

        let track_record = match self.log.track_record(&result.ticker, result.market).await {
            Ok(track_record) => track_record,
            Err(err) => {
                warn!(
                    "Failed to load track record for {}: {:#}",
                    result.ticker, err
                );
                None
            }
        };

        Ok(PredictionResult {
            track_record,
            ..result
        })
    }

    fn resolve_macro(
        &self,
        series_id: &str,
        fetched: Result<Vec<MacroObservation>, DataError>,
    ) -> Result<MacroSeries, ForecastError> {
        match fetched {
            Ok(observations) => Ok(MacroSeries::from_observations(observations)),
            Err(err) if err.is_transient() || matches!(err, DataError::NoData(_)) => {
                warn!(
                    "Macro series {} unavailable, continuing without it: {}",
                    series_id, err
                );
                Ok(MacroSeries::default())
            }
            Err(err) => Err(ForecastError::upstream(
                self.macros.name(),
                format!("series {}: {}", series_id, err),
            )),
        }
    }
}

fn validate_request(
    request: &PredictionRequest,
    today: NaiveDate,
) -> Result<ValidatedRequest, ForecastError> {
    let ticker = required_field(request.ticker.as_deref(), "ticker")?;
    let market = required_field(request.market.as_deref(), "market")?;
    let target_date = required_field(request.target_date.as_deref(), "target_date")?;

    if !ticker
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^'))
    {
        return Err(ForecastError::Validation(format!(
            "ticker contains invalid characters: {}",
            ticker
        )));
    }
    let market: Market = market.parse().map_err(ForecastError::Validation)?;
    let target_date = NaiveDate::parse_from_str(target_date, "%Y-%m-%d").map_err(|_| {
        ForecastError::Validation(format!(
            "target_date must be a date in YYYY-MM-DD format (value: {})",
            target_date
        ))
    })?;
    if target_date <= today {
        return Err(ForecastError::Validation(format!(
            "target_date must be after {} (value: {})",
            today, target_date
        )));
    }

    let mut ticker = ticker.to_ascii_uppercase();
    if let Some(suffix) = market.symbol_suffix() {
        if !ticker.ends_with(suffix) {
            ticker.push_str(suffix);
        }
    }

    Ok(ValidatedRequest {
        ticker,
        market,
        target_date,
        days_ahead: (target_date - today).num_days(),
    })
}

fn required_field<'r>(value: Option<&'r str>, name: &str) -> Result<&'r str, ForecastError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ForecastError::Validation(format!("{} is required", name)))
}

/// Sorts bars by date, keeps the last bar reported for a date, and drops bars
/// whose close or volume cannot feed the log transforms.
pub fn sanitize_bars(mut bars: Vec<PriceBar>) -> Vec<PriceBar> {
    let fetched = bars.len();
    bars.sort_by_key(|bar| bar.date);

    let mut clean: Vec<PriceBar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match clean.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => clean.push(bar),
        }
    }
    clean.retain(|bar| {
        bar.close.is_finite() && bar.close > 0.0 && bar.volume.is_finite() && bar.volume >= 0.0
    });

    if clean.len() != fetched {
        debug!("Dropped {} unusable price bars", fetched - clean.len());
    }
    clean
}
