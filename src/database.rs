use crate::diagnostics::directional_hit_rate;
use crate::models::{DuePrediction, Market, PredictionRecord, TrackRecord};
use crate::providers::PredictionLog;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use log::{error, warn};
use tokio_postgres::{Client, NoTls};
use uuid::Uuid;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS predictions (
    id TEXT PRIMARY KEY,
    ticker TEXT NOT NULL,
    market TEXT NOT NULL,
    target_date DATE NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    days_ahead BIGINT NOT NULL,
    current_price DOUBLE PRECISION NOT NULL,
    predicted_price DOUBLE PRECISION NOT NULL,
    raw_predicted_price DOUBLE PRECISION NOT NULL,
    lower_bound DOUBLE PRECISION NOT NULL,
    upper_bound DOUBLE PRECISION NOT NULL,
    currency TEXT NOT NULL,
    r_squared DOUBLE PRECISION NOT NULL,
    hit_rate DOUBLE PRECISION NOT NULL,
    training_samples BIGINT NOT NULL,
    volatility DOUBLE PRECISION NOT NULL,
    feature_importance TEXT NOT NULL,
    latest_features TEXT NOT NULL,
    trainer TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS predictions_ticker_market_idx
    ON predictions (ticker, market, target_date);
CREATE TABLE IF NOT EXISTS prediction_outcomes (
    prediction_id TEXT NOT NULL REFERENCES predictions (id),
    actual_price DOUBLE PRECISION NOT NULL,
    observed_on DATE NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS prediction_outcomes_prediction_idx
    ON prediction_outcomes (prediction_id);
";

pub struct Database {
    client: Client,
}

impl Database {
    pub async fn new<S: AsRef<str>>(database_url: S) -> Result<Self> {
        let database_url = database_url.as_ref().to_string();
        let (client, connection) = tokio_postgres::connect(&database_url, NoTls)
            .await
            .with_context(|| format!("failed to connect to PostgreSQL at {}", database_url))?;

        tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!("PostgreSQL connection error: {}", err);
            }
        });

        Ok(Self { client })
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        self.client
            .batch_execute(SCHEMA_SQL)
            .await
            .context("failed to create prediction tables")
    }

    pub async fn insert_prediction(&self, record: &PredictionRecord) -> Result<()> {
        let id = record.id.to_string();
        let feature_importance = record.feature_importance.to_string();
        let latest_features = record.latest_features.to_string();

        self.client
            .execute(
                "INSERT INTO predictions (
                    id, ticker, market, target_date, created_at, days_ahead,
                    current_price, predicted_price, raw_predicted_price,
                    lower_bound, upper_bound, currency, r_squared, hit_rate,
                    training_samples, volatility, feature_importance, latest_features, trainer
                 )
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)",
                &[
                    &id,
                    &record.ticker,
                    &record.market.as_str(),
                    &record.target_date,
                    &record.created_at,
                    &record.days_ahead,
                    &record.current_price,
                    &record.predicted_price,
                    &record.raw_predicted_price,
                    &record.lower_bound,
                    &record.upper_bound,
                    &record.currency,
                    &record.r_squared,
                    &record.hit_rate,
                    &record.training_samples,
                    &record.volatility,
                    &feature_importance,
                    &latest_features,
                    &record.trainer,
                ],
            )
            .await
            .with_context(|| format!("failed to insert prediction {}", id))?;

        Ok(())
    }

    /// Predictions whose target date is on or before `as_of` and that have no
    /// recorded outcome yet.
    pub async fn get_due_predictions(&self, as_of: NaiveDate) -> Result<Vec<DuePrediction>> {
        let rows = self
            .client
            .query(
                "SELECT p.id, p.ticker, p.target_date
                 FROM predictions p
                 WHERE p.target_date <= $1
                   AND NOT EXISTS (
                       SELECT 1 FROM prediction_outcomes o WHERE o.prediction_id = p.id
                   )
                 ORDER BY p.target_date, p.ticker",
                &[&as_of],
            )
            .await?;

        let mut due = Vec::with_capacity(rows.len());
        for row in rows {
            let raw_id: String = row.get("id");
            match Uuid::parse_str(&raw_id) {
                Ok(id) => due.push(DuePrediction {
                    id,
                    ticker: row.get("ticker"),
                    target_date: row.get("target_date"),
                }),
                Err(err) => warn!("Skipping prediction with invalid id {}: {}", raw_id, err),
            }
        }

        Ok(due)
    }

    pub async fn insert_prediction_outcome(
        &self,
        prediction_id: Uuid,
        actual_price: f64,
        observed_on: NaiveDate,
    ) -> Result<()> {
        let id = prediction_id.to_string();
        let created_at = Utc::now();

        self.client
            .execute(
                "INSERT INTO prediction_outcomes (prediction_id, actual_price, observed_on, created_at)
                 VALUES ($1, $2, $3, $4)",
                &[&id, &actual_price, &observed_on, &created_at],
            )
            .await
            .with_context(|| format!("failed to record outcome for prediction {}", id))?;

        Ok(())
    }

    pub async fn get_track_record(
        &self,
        ticker: &str,
        market: Market,
    ) -> Result<Option<TrackRecord>> {
        let rows = self
            .client
            .query(
                "SELECT p.current_price, p.predicted_price, o.actual_price
                 FROM predictions p
                 JOIN prediction_outcomes o ON o.prediction_id = p.id
                 WHERE p.ticker = $1 AND p.market = $2",
                &[&ticker, &market.as_str()],
            )
            .await?;

        let scored: Vec<ScoredPrediction> = rows
            .into_iter()
            .map(|row| ScoredPrediction {
                base_price: row.get(0),
                predicted_price: row.get(1),
                actual_price: row.get(2),
            })
            .collect();

        Ok(summarize_track_record(&scored))
    }
}

impl PredictionLog for Database {
    async fn append(&self, record: &PredictionRecord) -> Result<()> {
        self.insert_prediction(record).await
    }

    async fn track_record(&self, ticker: &str, market: Market) -> Result<Option<TrackRecord>> {
        self.get_track_record(ticker, market).await
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ScoredPrediction {
    pub base_price: f64,
    pub predicted_price: f64,
    pub actual_price: f64,
}

pub(crate) fn summarize_track_record(scored: &[ScoredPrediction]) -> Option<TrackRecord> {
    if scored.is_empty() {
        return None;
    }
    let base: Vec<f64> = scored.iter().map(|s| s.base_price).collect();
    let actual: Vec<f64> = scored.iter().map(|s| s.actual_price).collect();
    let predicted: Vec<f64> = scored.iter().map(|s| s.predicted_price).collect();

    let errors: Vec<f64> = scored
        .iter()
        .filter(|s| s.actual_price != 0.0)
        .map(|s| ((s.predicted_price - s.actual_price) / s.actual_price).abs() * 100.0)
        .collect();
    let mean_abs_pct_error = if errors.is_empty() {
        0.0
    } else {
        errors.iter().sum::<f64>() / errors.len() as f64
    };

    Some(TrackRecord {
        scored_predictions: scored.len() as i64,
        direction_hit_rate: directional_hit_rate(&base, &actual, &predicted),
        mean_abs_pct_error,
    })
}
