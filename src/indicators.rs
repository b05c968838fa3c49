//! Rolling-window transforms over a per-trading-day series.
//!
//! Every function returns one entry per input index; `None` marks indices whose
//! lookback window is not yet full. No function reads past index `i`.

use statrs::statistics::Statistics;

/// Mean of the `period` most recent values ending at each index.
pub fn moving_average(series: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut values = vec![None; series.len()];
    if period == 0 || series.len() < period {
        return values;
    }

    let mut window_sum: f64 = series[..period].iter().sum();
    values[period - 1] = Some(window_sum / period as f64);
    for i in period..series.len() {
        window_sum += series[i] - series[i - period];
        values[i] = Some(window_sum / period as f64);
    }

    values
}

/// `ln(series[i] / series[i - period])`.
///
/// Inputs must be strictly positive; a non-positive value yields a non-finite entry.
pub fn log_momentum(series: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut values = vec![None; series.len()];
    if period == 0 {
        return values;
    }
    for i in period..series.len() {
        values[i] = Some((series[i] / series[i - period]).ln());
    }
    values
}

/// Standardizes `series[i]` against the trailing `period` window (population std).
///
/// A window with zero spread divides by 1 instead of 0.
pub fn rolling_zscore(series: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut values = vec![None; series.len()];
    if period == 0 || series.len() < period {
        return values;
    }

    for i in (period - 1)..series.len() {
        let window = &series[i + 1 - period..=i];
        let mean = window.iter().mean();
        let std_dev = window.iter().population_std_dev();
        let scale = if std_dev == 0.0 { 1.0 } else { std_dev };
        values[i] = Some((series[i] - mean) / scale);
    }

    values
}

/// Population standard deviation of the `period` daily log returns ending at `i`.
pub fn realized_volatility(series: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut values = vec![None; series.len()];
    if period == 0 || series.len() <= period {
        return values;
    }

    let returns: Vec<f64> = series.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    // returns[j - 1] is the return into day j
    for i in period..series.len() {
        values[i] = Some(returns[i - period..i].iter().population_std_dev());
    }

    values
}
