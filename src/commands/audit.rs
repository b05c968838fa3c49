use crate::context::AppContext;
use crate::forecaster::sanitize_bars;
use crate::models::PriceBar;
use crate::providers::PriceHistoryProvider;
use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use log::{info, warn};

/// Window fetched before each target date so weekends and holidays still
/// resolve to the last trading close.
const OUTCOME_LOOKBACK_DAYS: i64 = 10;

pub async fn run(app: &AppContext, as_of: Option<NaiveDate>) -> Result<()> {
    let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
    let db = app.database().await?;
    let due = db.get_due_predictions(as_of).await?;
    if due.is_empty() {
        info!("No predictions are due for scoring as of {}", as_of);
        return Ok(());
    }

    let prices = app.price_provider();
    let mut recorded = 0usize;
    let mut skipped = 0usize;

    for prediction in due {
        let start = prediction.target_date - Duration::days(OUTCOME_LOOKBACK_DAYS);
        let bars = match prices
            .fetch_daily_bars(&prediction.ticker, start, prediction.target_date)
            .await
        {
            Ok(bars) => sanitize_bars(bars),
            Err(err) => {
                warn!(
                    "Skipping prediction {} ({}): price fetch failed: {}",
                    prediction.id, prediction.ticker, err
                );
                skipped += 1;
                continue;
            }
        };

        let Some(bar) = close_as_of(&bars, prediction.target_date) else {
            warn!(
                "Skipping prediction {} ({}): no close on or before {}",
                prediction.id, prediction.ticker, prediction.target_date
            );
            skipped += 1;
            continue;
        };

        db.insert_prediction_outcome(prediction.id, bar.close, bar.date)
            .await?;
        recorded += 1;
    }

    info!(
        "Recorded {} prediction outcome(s), skipped {}",
        recorded, skipped
    );
    Ok(())
}

fn close_as_of(bars: &[PriceBar], date: NaiveDate) -> Option<&PriceBar> {
    bars.iter().rev().find(|bar| bar.date <= date)
}
