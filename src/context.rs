use crate::config::ForecastSettings;
use crate::database::Database;
use crate::fred::FredClient;
use crate::http_client::{build_data_client, build_trainer_client};
use crate::trainer::Trainer;
use crate::yahoo::YahooClient;
use anyhow::{anyhow, Result};
use clap::ValueEnum;
use log::{info, warn};
use reqwest::Client;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TrainerChoice {
    /// Remote when TRAINER_URL is set, local otherwise
    #[default]
    Auto,
    Local,
    Remote,
}

pub struct AppContext {
    settings: ForecastSettings,
    http: Client,
}

impl AppContext {
    pub async fn initialize(settings: ForecastSettings) -> Result<Self> {
        let http = build_data_client(settings.http_timeout)?;
        Ok(Self { settings, http })
    }

    pub fn settings(&self) -> &ForecastSettings {
        &self.settings
    }

    pub async fn database(&self) -> Result<Database> {
        let Some(database_url) = self.settings.database_url.as_deref() else {
            return Err(anyhow!(
                "DATABASE_URL must be set to use database-backed forecaster commands."
            ));
        };
        Database::new(database_url).await
    }

    /// Prediction log for a forecast run. Missing or unreachable databases only
    /// disable persistence.
    pub async fn prediction_log(&self) -> Option<Database> {
        if self.settings.database_url.is_none() {
            warn!("DATABASE_URL is not set; predictions will not be persisted");
            return None;
        }
        match self.database().await {
            Ok(db) => Some(db),
            Err(err) => {
                warn!("Prediction log unavailable, continuing without it: {:#}", err);
                None
            }
        }
    }

    pub fn price_provider(&self) -> YahooClient {
        YahooClient::new(self.http.clone(), self.settings.price_history_url.clone())
    }

    pub fn macro_provider(&self) -> FredClient {
        FredClient::new(
            self.http.clone(),
            self.settings.macro_series_url.clone(),
            self.settings.fred_api_key.clone(),
        )
    }

    pub fn trainer(&self, choice: TrainerChoice) -> Result<Trainer> {
        let url = self.settings.trainer_url.as_deref();
        match (choice, url) {
            (TrainerChoice::Local, _) | (TrainerChoice::Auto, None) => Ok(Trainer::local()),
            (TrainerChoice::Remote, None) => Err(anyhow!(
                "TRAINER_URL must be set to use the remote trainer."
            )),
            (TrainerChoice::Remote | TrainerChoice::Auto, Some(url)) => {
                info!("Using remote trainer at {}", url);
                let http =
                    build_trainer_client(self.settings.http_timeout, &self.settings.trainer_tls)?;
                Ok(Trainer::remote(http, url))
            }
        }
    }
}
