use crate::context::{AppContext, TrainerChoice};
use crate::forecaster::Forecaster;
use crate::models::{ErrorResponse, PredictionRequest};
use anyhow::{Context, Result};
use chrono::Utc;

pub async fn run(
    app: &AppContext,
    request: PredictionRequest,
    persist: bool,
    trainer: TrainerChoice,
) -> Result<()> {
    let prices = app.price_provider();
    let macros = app.macro_provider();
    let trainer = app.trainer(trainer)?;
    let log = if persist {
        app.prediction_log().await
    } else {
        None
    };

    let today = Utc::now().date_naive();
    let forecaster = Forecaster::new(app.settings(), &prices, &macros, &trainer).with_log(&log);

    match forecaster.forecast(&request, today).await {
        Ok(result) => {
            let output =
                serde_json::to_string_pretty(&result).context("failed to serialize prediction")?;
            println!("{}", output);
            Ok(())
        }
        Err(err) => {
            let output = serde_json::to_string_pretty(&ErrorResponse {
                error: err.to_string(),
            })
            .context("failed to serialize error response")?;
            println!("{}", output);
            let status = err.status_code();
            Err(err).context(format!("prediction failed (status {})", status))
        }
    }
}
