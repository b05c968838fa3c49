use thiserror::Error;

/// Failures reported by the price and macro data providers.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("no data returned for {0}")]
    NoData(String),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("unknown ticker: {0}")]
    UnknownTicker(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl DataError {
    /// Failures that say nothing about the payload itself.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::Network(_) | DataError::Http { .. } | DataError::RateLimited
        )
    }
}

/// Terminal failure of a prediction request.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("{0}")]
    Validation(String),

    #[error("{provider}: {message}")]
    UpstreamData { provider: String, message: String },

    #[error("insufficient raw history: {bars} price bars available, at least {required} required")]
    InsufficientHistory { bars: usize, required: usize },

    #[error(
        "insufficient aligned history: {rows} feature rows survived alignment, at least {required} required (macro data may not cover the price window)"
    )]
    InsufficientAlignedHistory { rows: usize, required: usize },

    #[error("numeric degeneracy: {0}")]
    NumericDegeneracy(String),
}

impl ForecastError {
    pub fn upstream(provider: &str, error: impl std::fmt::Display) -> Self {
        ForecastError::UpstreamData {
            provider: provider.to_string(),
            message: error.to_string(),
        }
    }

    /// HTTP-equivalent status for hosts that expose the forecaster over HTTP.
    pub fn status_code(&self) -> u16 {
        match self {
            ForecastError::Validation(_) => 400,
            ForecastError::UpstreamData { .. } => 502,
            ForecastError::InsufficientHistory { .. }
            | ForecastError::InsufficientAlignedHistory { .. } => 422,
            ForecastError::NumericDegeneracy(_) => 500,
        }
    }
}
