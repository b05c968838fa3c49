pub const BAND_SIGMAS: f64 = 2.0;

/// Price interval implied by the latest realized daily volatility, assuming
/// log-returns scale with the square root of time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceBand {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceBand {
    pub fn from_volatility(current_price: f64, daily_volatility: f64, horizon_days: i64) -> Self {
        let horizon = horizon_days.max(0) as f64;
        let half_width = BAND_SIGMAS * daily_volatility * horizon.sqrt();
        Self {
            lower: current_price * (1.0 - half_width),
            upper: current_price * (1.0 + half_width),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    /// Forces `value` into the band. Applied to every point prediction, even
    /// when the model's own estimate lies outside it.
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.lower).min(self.upper)
    }
}
