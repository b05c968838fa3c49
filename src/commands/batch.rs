use crate::context::{AppContext, TrainerChoice};
use crate::forecaster::Forecaster;
use crate::models::{Market, PredictionRequest};
use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::time::Duration as StdDuration;

pub const DEFAULT_DAYS_AHEAD: u32 = 7;
pub const DEFAULT_DELAY_SECS: u64 = 12;
/// Universe used when no tickers are given on the command line.
pub const DEFAULT_TICKERS: [&str; 5] = ["AAPL", "MSFT", "GOOGL", "AMZN", "NVDA"];

/// Daily batch: one forecast per ticker, sequentially, with a pause between
/// requests to stay under provider rate limits.
pub async fn run(
    app: &AppContext,
    market: Market,
    tickers: &[String],
    days_ahead: u32,
    delay_secs: u64,
    trainer: TrainerChoice,
) -> Result<()> {
    let tickers = resolve_tickers(tickers);
    if days_ahead == 0 {
        return Err(anyhow!("--days-ahead must be at least 1"));
    }

    let prices = app.price_provider();
    let macros = app.macro_provider();
    let trainer = app.trainer(trainer)?;
    let log = app.prediction_log().await;
    let forecaster = Forecaster::new(app.settings(), &prices, &macros, &trainer).with_log(&log);

    let today = Utc::now().date_naive();
    let target_date = (today + Duration::days(days_ahead as i64))
        .format("%Y-%m-%d")
        .to_string();
    info!(
        "Forecasting {} {} ticker(s) for {}",
        tickers.len(),
        market,
        target_date
    );

    let pb = ProgressBar::new(tickers.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )?
            .progress_chars("#>-"),
    );

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    for (idx, ticker) in tickers.iter().enumerate() {
        if idx > 0 && delay_secs > 0 {
            tokio::time::sleep(StdDuration::from_secs(delay_secs)).await;
        }
        pb.set_message(ticker.to_string());

        let request = PredictionRequest::new(ticker, market.as_str(), &target_date);
        match forecaster.forecast(&request, today).await {
            Ok(result) => {
                succeeded += 1;
                info!(
                    "{}: {:.2} -> {:.2} {} by {}",
                    result.ticker,
                    result.current_price,
                    result.predicted_price,
                    result.currency,
                    result.target_date
                );
            }
            Err(err) => {
                failed += 1;
                warn!("Skipping {}: {}", ticker, err);
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        "Batch complete: {} prediction(s) generated, {} failed",
        succeeded, failed
    );
    Ok(())
}

fn resolve_tickers(requested: &[String]) -> Vec<&str> {
    let tickers: Vec<&str> = requested
        .iter()
        .map(|ticker| ticker.trim())
        .filter(|ticker| !ticker.is_empty())
        .collect();
    if tickers.is_empty() {
        info!(
            "No tickers given, using the default universe ({})",
            DEFAULT_TICKERS.join(",")
        );
        return DEFAULT_TICKERS.to_vec();
    }
    tickers
}
