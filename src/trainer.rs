//! Model training port: the closed-form fit can run in process or on a
//! remote trainer service speaking a small JSON protocol.

use crate::error::ForecastError;
use crate::ridge::{RidgeModel, RidgeRegression};
use log::debug;
use ndarray::{Array1, Array2};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;

pub trait ModelTrainer: Send + Sync {
    fn name(&self) -> &str;

    /// Fits ridge weights plus intercept on standardized `features`.
    fn fit(
        &self,
        features: &Array2<f64>,
        targets: &Array1<f64>,
        lambda: f64,
    ) -> impl Future<Output = Result<RidgeModel, ForecastError>> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRidgeTrainer;

impl ModelTrainer for LocalRidgeTrainer {
    fn name(&self) -> &str {
        "local"
    }

    async fn fit(
        &self,
        features: &Array2<f64>,
        targets: &Array1<f64>,
        lambda: f64,
    ) -> Result<RidgeModel, ForecastError> {
        let regression = RidgeRegression::new(lambda)
            .map_err(|err| ForecastError::Validation(err.to_string()))?;
        regression
            .fit(features, targets)
            .map_err(|err| ForecastError::NumericDegeneracy(err.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct FitRequest {
    features: Vec<Vec<f64>>,
    targets: Vec<f64>,
    lambda: f64,
}

#[derive(Debug, Deserialize)]
struct FitResponse {
    weights: Vec<f64>,
    intercept: f64,
}

pub struct RemoteRidgeTrainer {
    http: Client,
    base_url: String,
}

impl RemoteRidgeTrainer {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl ModelTrainer for RemoteRidgeTrainer {
    fn name(&self) -> &str {
        "remote"
    }

    async fn fit(
        &self,
        features: &Array2<f64>,
        targets: &Array1<f64>,
        lambda: f64,
    ) -> Result<RidgeModel, ForecastError> {
        let width = features.ncols();
        let url = format!("{}/fit", self.base_url);
        debug!(
            "Posting {} training rows ({} features) to {}",
            features.nrows(),
            width,
            url
        );
        let request = FitRequest {
            features: features.outer_iter().map(|row| row.to_vec()).collect(),
            targets: targets.to_vec(),
            lambda,
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| ForecastError::upstream("trainer", err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ForecastError::upstream(
                "trainer",
                format!("HTTP {}: {}", status.as_u16(), body),
            ));
        }

        let fitted: FitResponse = response.json().await.map_err(|err| {
            ForecastError::upstream("trainer", format!("malformed response: {}", err))
        })?;

        if fitted.weights.len() != width {
            return Err(ForecastError::upstream(
                "trainer",
                format!(
                    "returned {} weights for {} features",
                    fitted.weights.len(),
                    width
                ),
            ));
        }
        if !fitted.intercept.is_finite() || fitted.weights.iter().any(|w| !w.is_finite()) {
            return Err(ForecastError::NumericDegeneracy(
                "trainer returned non-finite coefficients".to_string(),
            ));
        }

        Ok(RidgeModel {
            weights: Array1::from(fitted.weights),
            intercept: fitted.intercept,
            lambda,
        })
    }
}

pub enum Trainer {
    Local(LocalRidgeTrainer),
    Remote(RemoteRidgeTrainer),
}

impl Trainer {
    pub fn local() -> Self {
        Trainer::Local(LocalRidgeTrainer)
    }

    pub fn remote(http: Client, base_url: impl Into<String>) -> Self {
        Trainer::Remote(RemoteRidgeTrainer::new(http, base_url))
    }
}

impl ModelTrainer for Trainer {
    fn name(&self) -> &str {
        match self {
            Trainer::Local(trainer) => trainer.name(),
            Trainer::Remote(trainer) => trainer.name(),
        }
    }

    async fn fit(
        &self,
        features: &Array2<f64>,
        targets: &Array1<f64>,
        lambda: f64,
    ) -> Result<RidgeModel, ForecastError> {
        match self {
            Trainer::Local(trainer) => trainer.fit(features, targets, lambda).await,
            Trainer::Remote(trainer) => trainer.fit(features, targets, lambda).await,
        }
    }
}
