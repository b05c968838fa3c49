use crate::indicators::{log_momentum, moving_average, realized_volatility, rolling_zscore};
use crate::models::{DatedFeatureRow, FeatureRow, MacroObservation, PriceBar};
use chrono::NaiveDate;

pub const SMA_PERIOD: usize = 20;
pub const VOLATILITY_PERIOD: usize = 20;
pub const MOMENTUM_SHORT: usize = 5;
pub const MOMENTUM_LONG: usize = 10;
pub const VOLUME_ZSCORE_PERIOD: usize = 60;

pub const FALLBACK_MACRO_RATE: f64 = 5.33;
pub const FALLBACK_MACRO_INDEX: f64 = 308.0;

/// What to do with a trading day that has no macro observation on or before it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MacroPolicy {
    #[default]
    StrictDrop,
    /// Substitute fixed values. Hides missing data; opt-in only.
    ConstantFallback { rate: f64, index: f64 },
}

impl MacroPolicy {
    pub fn constant_fallback() -> Self {
        MacroPolicy::ConstantFallback {
            rate: FALLBACK_MACRO_RATE,
            index: FALLBACK_MACRO_INDEX,
        }
    }
}

/// Macro observations ordered by release day. When several values are
/// released on the same day only the one for the latest period is kept.
#[derive(Debug, Clone, Default)]
pub struct MacroSeries {
    observations: Vec<MacroObservation>,
}

impl MacroSeries {
    pub fn from_observations(mut observations: Vec<MacroObservation>) -> Self {
        observations.retain(|obs| obs.value.is_finite());
        for obs in observations.iter_mut() {
            obs.released = obs.released.max(obs.date);
        }
        observations.sort_by_key(|obs| (obs.released, obs.date));
        let mut deduped: Vec<MacroObservation> = Vec::with_capacity(observations.len());
        for obs in observations {
            match deduped.last_mut() {
                Some(last) if last.released == obs.released => *last = obs,
                _ => deduped.push(obs),
            }
        }
        Self {
            observations: deduped,
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Latest value released on or before `date`.
    pub fn value_as_of(&self, date: NaiveDate) -> Option<f64> {
        let idx = self.observations.partition_point(|obs| obs.released <= date);
        idx.checked_sub(1).map(|i| self.observations[i].value)
    }

    fn cursor(&self) -> AsOfCursor<'_> {
        AsOfCursor {
            observations: &self.observations,
            next: 0,
        }
    }
}

/// Forward-only as-of lookup for monotonically increasing query dates.
struct AsOfCursor<'a> {
    observations: &'a [MacroObservation],
    next: usize,
}

impl AsOfCursor<'_> {
    fn advance_to(&mut self, date: NaiveDate) -> Option<f64> {
        while self
            .observations
            .get(self.next)
            .is_some_and(|obs| obs.released <= date)
        {
            self.next += 1;
        }
        self.next
            .checked_sub(1)
            .map(|i| self.observations[i].value)
    }
}

/// Builds one feature row per trading day whose indicator windows are full and
/// whose macro fields resolve as-of that day. Bars must be date-sorted.
pub fn build_feature_rows(
    bars: &[PriceBar],
    macro_rate: &MacroSeries,
    macro_index: &MacroSeries,
    policy: MacroPolicy,
) -> Vec<DatedFeatureRow> {
    let closes: Vec<f64> = bars.iter().map(|bar| bar.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|bar| bar.volume).collect();

    let sma = moving_average(&closes, SMA_PERIOD);
    let volatility = realized_volatility(&closes, VOLATILITY_PERIOD);
    let momentum_short = log_momentum(&closes, MOMENTUM_SHORT);
    let momentum_long = log_momentum(&closes, MOMENTUM_LONG);
    let volume_zscore = rolling_zscore(&volumes, VOLUME_ZSCORE_PERIOD);

    let mut rate_cursor = macro_rate.cursor();
    let mut index_cursor = macro_index.cursor();
    let mut rows = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let rate = rate_cursor.advance_to(bar.date);
        let index = index_cursor.advance_to(bar.date);

        let (
            Some(sma_20),
            Some(volatility_20),
            Some(log_return_5d),
            Some(log_return_10d),
            Some(volume_zscore_60),
        ) = (
            sma[i],
            volatility[i],
            momentum_short[i],
            momentum_long[i],
            volume_zscore[i],
        )
        else {
            continue;
        };

        let (macro_rate, macro_index) = match (rate, index, policy) {
            (Some(rate), Some(index), _) => (rate, index),
            (_, _, MacroPolicy::StrictDrop) => continue,
            (
                rate,
                index,
                MacroPolicy::ConstantFallback {
                    rate: fallback_rate,
                    index: fallback_index,
                },
            ) => (
                rate.unwrap_or(fallback_rate),
                index.unwrap_or(fallback_index),
            ),
        };

        let features = FeatureRow {
            close: bar.close,
            sma_20,
            volatility_20,
            log_return_5d,
            log_return_10d,
            volume_zscore_60,
            macro_rate,
            macro_index,
        };
        if !features.is_finite() {
            continue;
        }

        rows.push(DatedFeatureRow {
            date: bar.date,
            bar_index: i,
            features,
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
    }

    fn bars(count: usize) -> Vec<PriceBar> {
        (0..count)
            .map(|i| {
                let close = 50.0 + i as f64 * 0.25 + if i % 2 == 0 { 0.3 } else { 0.0 };
                PriceBar {
                    date: day(i as i64),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000.0 + (i % 7) as f64 * 10.0,
                }
            })
            .collect()
    }

    fn observation(offset: i64, value: f64) -> MacroObservation {
        MacroObservation {
            date: day(offset),
            released: day(offset),
            value,
        }
    }

    fn released_later(offset: i64, lag: i64, value: f64) -> MacroObservation {
        MacroObservation {
            date: day(offset),
            released: day(offset + lag),
            value,
        }
    }

    #[test]
    fn as_of_lookup_never_reads_future_observations() {
        let series = MacroSeries::from_observations(vec![
            observation(10, 1.0),
            observation(0, 0.5),
            observation(40, 2.0),
        ]);
        assert_eq!(series.value_as_of(day(-1)), None);
        assert_eq!(series.value_as_of(day(0)), Some(0.5));
        assert_eq!(series.value_as_of(day(39)), Some(1.0));
        assert_eq!(series.value_as_of(day(40)), Some(2.0));
    }

    #[test]
    fn values_resolve_from_release_day_not_period_start() {
        // period starting day 30, published day 72
        let series = MacroSeries::from_observations(vec![
            released_later(0, 40, 310.0),
            released_later(30, 42, 314.0),
        ]);
        assert_eq!(series.value_as_of(day(39)), None);
        assert_eq!(series.value_as_of(day(45)), Some(310.0));
        assert_eq!(series.value_as_of(day(71)), Some(310.0));
        assert_eq!(series.value_as_of(day(72)), Some(314.0));
    }

    #[test]
    fn feature_rows_never_see_unreleased_values() {
        let bars = bars(100);
        let rate = MacroSeries::from_observations(vec![observation(-30, 5.0)]);
        let index = MacroSeries::from_observations(vec![
            released_later(-30, 0, 310.0),
            released_later(60, 25, 314.0),
        ]);
        let rows = build_feature_rows(&bars, &rate, &index, MacroPolicy::StrictDrop);
        assert!(rows.iter().any(|row| row.date >= day(60) && row.date < day(85)));
        for row in rows {
            let expected = if row.date >= day(85) { 314.0 } else { 310.0 };
            assert_eq!(row.features.macro_index, expected, "row {}", row.date);
        }
    }

    #[test]
    fn same_day_releases_keep_latest_period() {
        let series = MacroSeries::from_observations(vec![
            released_later(10, 20, 2.0),
            released_later(0, 30, 1.0),
        ]);
        assert_eq!(series.len(), 1);
        assert_eq!(series.value_as_of(day(30)), Some(2.0));
    }

    #[test]
    fn duplicate_macro_dates_keep_last_report() {
        let series = MacroSeries::from_observations(vec![
            observation(5, 1.0),
            observation(5, 1.5),
            observation(6, f64::NAN),
        ]);
        assert_eq!(series.len(), 1);
        assert_eq!(series.value_as_of(day(6)), Some(1.5));
    }

    #[test]
    fn rows_start_once_longest_window_is_full() {
        let bars = bars(100);
        let rate = MacroSeries::from_observations(vec![observation(-30, 5.0)]);
        let index = MacroSeries::from_observations(vec![observation(-30, 300.0)]);
        let rows = build_feature_rows(&bars, &rate, &index, MacroPolicy::StrictDrop);
        assert_eq!(rows.len(), 100 - (VOLUME_ZSCORE_PERIOD - 1));
        assert_eq!(rows[0].bar_index, VOLUME_ZSCORE_PERIOD - 1);
        assert!(rows.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn macro_fields_resolve_as_of_each_day() {
        let bars = bars(90);
        let rate = MacroSeries::from_observations(vec![
            observation(-5, 4.0),
            observation(70, 4.5),
        ]);
        let index = MacroSeries::from_observations(vec![observation(-5, 300.0)]);
        let rows = build_feature_rows(&bars, &rate, &index, MacroPolicy::StrictDrop);
        for row in rows {
            let expected = if row.date >= day(70) { 4.5 } else { 4.0 };
            assert_eq!(row.features.macro_rate, expected, "row {}", row.date);
        }
    }

    #[test]
    fn days_before_first_macro_release_are_dropped() {
        let bars = bars(100);
        let rate = MacroSeries::from_observations(vec![observation(80, 5.0)]);
        let index = MacroSeries::from_observations(vec![observation(0, 300.0)]);
        let rows = build_feature_rows(&bars, &rate, &index, MacroPolicy::StrictDrop);
        assert_eq!(rows.len(), 20);
        assert_eq!(rows[0].date, day(80));
    }

    #[test]
    fn empty_macro_series_excludes_every_row() {
        let bars = bars(100);
        let rows = build_feature_rows(
            &bars,
            &MacroSeries::default(),
            &MacroSeries::default(),
            MacroPolicy::StrictDrop,
        );
        assert!(rows.is_empty());
    }

    #[test]
    fn constant_fallback_fills_missing_macro_values() {
        let bars = bars(100);
        let rows = build_feature_rows(
            &bars,
            &MacroSeries::default(),
            &MacroSeries::default(),
            MacroPolicy::constant_fallback(),
        );
        assert_eq!(rows.len(), 100 - (VOLUME_ZSCORE_PERIOD - 1));
        assert!(rows
            .iter()
            .all(|row| row.features.macro_rate == FALLBACK_MACRO_RATE
                && row.features.macro_index == FALLBACK_MACRO_INDEX));
    }
}
