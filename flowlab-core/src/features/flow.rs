//! Per-row investor-flow features.
//!
//! Every function returns `None` instead of dividing by zero or working on a
//! missing operand.

use super::round_to;

/// Rescales a per-trade value in the currency subunit to a comparable
/// per-person unit.
pub const PER_CAPITA_SCALE: f64 = 10_000_000.0;

/// `value / (count * PER_CAPITA_SCALE)`.
pub fn per_capita(value: Option<f64>, count: Option<f64>) -> Option<f64> {
    let (value, count) = (value?, count?);
    if count == 0.0 {
        return None;
    }
    let result = value / (count * PER_CAPITA_SCALE);
    result.is_finite().then_some(result)
}

/// Signed buyer/seller dominance.
///
/// Positive when individual buyers trade larger per head than sellers,
/// negative when sellers do; the magnitude is the ratio, rounded to 2 places.
pub fn individual_power(buy_per_capita: Option<f64>, sell_per_capita: Option<f64>) -> Option<f64> {
    let (buy, sell) = (buy_per_capita?, sell_per_capita?);
    if buy <= 0.0 || sell <= 0.0 {
        return None;
    }
    if buy >= sell {
        Some(round_to(buy / sell, 2))
    } else {
        Some(-round_to(sell / buy, 2))
    }
}

/// Individual share of one side's traded value, in percent.
///
/// The fraction is rounded to 3 places before scaling, so results land on a
/// 0.1% grid.
pub fn individual_percent(individual: Option<f64>, corporate: Option<f64>) -> Option<f64> {
    let (individual, corporate) = (individual?, corporate?);
    let total = individual + corporate;
    if total == 0.0 {
        return None;
    }
    let fraction = individual / total;
    fraction.is_finite().then(|| round_to(fraction, 3) * 100.0)
}
