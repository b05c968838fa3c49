use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// In-sample coefficient of determination, clamped into `[0, 1]`.
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() || actual.len() != predicted.len() {
        return 0.0;
    }
    let mean = actual.iter().mean();
    let ss_tot: f64 = actual.iter().map(|y| (y - mean).powi(2)).sum();
    if ss_tot == 0.0 || !ss_tot.is_finite() {
        return 0.0;
    }
    let ss_res: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(y, p)| (y - p).powi(2))
        .sum();
    let score = 1.0 - ss_res / ss_tot;
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Fraction of examples where the predicted move from `base` has the same sign
/// as the realized move. A flat move on either side counts as a miss.
pub fn directional_hit_rate(base: &[f64], actual: &[f64], predicted: &[f64]) -> f64 {
    let total = base.len().min(actual.len()).min(predicted.len());
    if total == 0 {
        return 0.0;
    }
    let hits = (0..total)
        .filter(|&i| {
            let realized = (actual[i] - base[i]).signum_or_zero();
            let expected = (predicted[i] - base[i]).signum_or_zero();
            realized != 0 && realized == expected
        })
        .count();
    hits as f64 / total as f64
}

trait SignumOrZero {
    fn signum_or_zero(self) -> i8;
}

impl SignumOrZero for f64 {
    fn signum_or_zero(self) -> i8 {
        if self > 0.0 {
            1
        } else if self < 0.0 {
            -1
        } else {
            0
        }
    }
}

const IMPORTANCE_HUNDREDTHS: u64 = 10_000;

/// Absolute weight magnitudes as percentages of their total, to two decimals.
/// Shares are apportioned by largest remainder so a non-zero map sums to 100.
pub fn feature_importance(names: &[&str], weights: &[f64]) -> BTreeMap<String, f64> {
    let magnitudes: Vec<f64> = weights.iter().map(|w| w.abs()).collect();
    let total: f64 = magnitudes.iter().sum();
    let hundredths = if total > 0.0 && total.is_finite() {
        apportion(&magnitudes, total, IMPORTANCE_HUNDREDTHS)
    } else {
        vec![0; magnitudes.len()]
    };
    names
        .iter()
        .zip(hundredths)
        .map(|(name, units)| (name.to_string(), units as f64 / 100.0))
        .collect()
}

/// Splits `units` in proportion to `magnitudes`; the parts add up to `units`.
fn apportion(magnitudes: &[f64], total: f64, units: u64) -> Vec<u64> {
    let exact: Vec<f64> = magnitudes
        .iter()
        .map(|magnitude| magnitude / total * units as f64)
        .collect();
    let mut parts: Vec<u64> = exact.iter().map(|value| value.floor() as u64).collect();
    let assigned: u64 = parts.iter().sum();

    let mut by_remainder: Vec<usize> = (0..exact.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        let remainder_a = exact[a] - exact[a].floor();
        let remainder_b = exact[b] - exact[b].floor();
        remainder_b.total_cmp(&remainder_a).then(a.cmp(&b))
    });
    for &i in by_remainder
        .iter()
        .take(units.saturating_sub(assigned) as usize)
    {
        parts[i] += 1;
    }
    parts
}
