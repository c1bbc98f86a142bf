//! Feature derivation over an aligned history/flow table.
//!
//! All per-row features are computed independently except `mean_value_20` and
//! `value_ratio_20`, which look back over the trailing window. Rows are
//! visited once, in ascending date order, so a value at date t never depends
//! on anything after t.

pub mod flow;
pub mod rolling;

pub use flow::{individual_percent, individual_power, per_capita, PER_CAPITA_SCALE};
pub use rolling::{rolling_mean, rolling_sum};

use crate::data::align::AlignedTable;
use crate::domain::{FeatureRow, FeatureTable};
use chrono::NaiveDate;

/// Trailing rows in the traded-value moving average.
pub const MEAN_VALUE_WINDOW: usize = 20;

/// Default trailing rows in the individual-power pile.
pub const DEFAULT_PILE_WINDOW: usize = 14;

/// Scale by `10^places`, round half to even, and scale back.
pub fn round_to(x: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (x * scale).round_ties_even() / scale
}

/// `round(value / mean, 2)`, absent when the mean is zero or missing.
pub fn value_ratio(value: Option<f64>, mean: Option<f64>) -> Option<f64> {
    let (value, mean) = (value?, mean?);
    if mean == 0.0 {
        return None;
    }
    let ratio = value / mean;
    ratio.is_finite().then(|| round_to(ratio, 2))
}

/// Derive the feature table for one symbol from its aligned feeds.
pub fn derive(symbol: &str, aligned: &AlignedTable) -> FeatureTable {
    let values: Vec<Option<f64>> = aligned
        .rows
        .iter()
        .map(|r| r.history.as_ref().and_then(|h| h.value))
        .collect();
    let means = rolling_mean(&values, MEAN_VALUE_WINDOW);

    let rows = aligned
        .rows
        .iter()
        .zip(values.iter().zip(means))
        .map(|(row, (&value, mean_value_20))| {
            let mut out = FeatureRow::empty(row.date);

            if let Some(h) = &row.history {
                out.volume = h.volume;
                out.value = h.value;
                out.close = h.close;
            }
            out.mean_value_20 = mean_value_20;
            out.value_ratio_20 = value_ratio(value, mean_value_20);

            if let Some(f) = &row.flow {
                out.buy_per_capita = per_capita(f.individual_buy_value, f.individual_buy_count);
                out.sell_per_capita = per_capita(f.individual_sell_value, f.individual_sell_count);
                out.individual_power = individual_power(out.buy_per_capita, out.sell_per_capita);
                out.individual_buy_percent =
                    individual_percent(f.individual_buy_value, f.corporate_buy_value);
                out.individual_sell_percent =
                    individual_percent(f.individual_sell_value, f.corporate_sell_value);
            }

            out
        })
        .collect();

    FeatureTable::new(symbol, rows)
}

/// Rolling sum of `individual_power` over `window` rows, paired with dates.
///
/// Needs a full window of present values; see [`rolling_sum`].
pub fn pile(table: &FeatureTable, window: usize) -> Vec<(NaiveDate, Option<f64>)> {
    let power: Vec<Option<f64>> = table.rows.iter().map(|r| r.individual_power).collect();
    table.dates().zip(rolling_sum(&power, window)).collect()
}

/// Default epsilon for floating-point comparisons in feature tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-9;

/// Assert two f64 values are approximately equal.
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "expected {expected}, got {actual} (diff = {})",
        (actual - expected).abs()
    );
}
