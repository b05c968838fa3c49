//! Ports for the external collaborators the forecaster consumes.
//!
//! Implementations: `YahooClient` (prices), `FredClient` (macro series) and
//! `Database` (prediction log). Tests substitute in-memory versions.

use crate::error::DataError;
use crate::models::{Market, MacroObservation, PredictionRecord, PriceBar, TrackRecord};
use anyhow::Result;
use chrono::NaiveDate;
use std::future::Future;

pub trait PriceHistoryProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Daily bars for `symbol` dated within `[start, end]`, ordered by date.
    fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<Vec<PriceBar>, DataError>> + Send;
}

pub trait MacroSeriesProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Observations of `series_id` dated on or after `start`.
    fn fetch_series(
        &self,
        series_id: &str,
        start: NaiveDate,
    ) -> impl Future<Output = Result<Vec<MacroObservation>, DataError>> + Send;
}

/// Append-only sink for prediction records plus the per-request accuracy read.
pub trait PredictionLog: Send + Sync {
    fn append(&self, record: &PredictionRecord) -> impl Future<Output = Result<()>> + Send;

    fn track_record(
        &self,
        ticker: &str,
        market: Market,
    ) -> impl Future<Output = Result<Option<TrackRecord>>> + Send;
}

/// Log that drops every record; used when no database is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardLog;

impl PredictionLog for DiscardLog {
    async fn append(&self, _record: &PredictionRecord) -> Result<()> {
        Ok(())
    }

    async fn track_record(&self, _ticker: &str, _market: Market) -> Result<Option<TrackRecord>> {
        Ok(None)
    }
}

/// An absent log behaves like `DiscardLog`.
impl<L: PredictionLog> PredictionLog for Option<L> {
    async fn append(&self, record: &PredictionRecord) -> Result<()> {
        match self {
            Some(log) => log.append(record).await,
            None => Ok(()),
        }
    }

    async fn track_record(&self, ticker: &str, market: Market) -> Result<Option<TrackRecord>> {
        match self {
            Some(log) => log.track_record(ticker, market).await,
            None => Ok(None),
        }
    }
}
