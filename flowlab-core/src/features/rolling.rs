//! Trailing-window aggregates over optional series.
//!
//! Windows are counted in rows, not calendar days. An absent value still
//! occupies its slot in the window.

/// Trailing mean with a warm-up: the window grows from one row up to `window`
/// rows, then slides. Absent values are skipped; a window with no present
/// values yields `None`.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    assert!(window >= 1, "rolling window must be >= 1");

    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let (sum, count) = values[start..=i]
                .iter()
                .flatten()
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            (count > 0).then(|| sum / count as f64)
        })
        .collect()
}

/// Trailing sum that needs a full window: `None` until `window` rows exist and
/// whenever any value in the window is absent.
pub fn rolling_sum(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    assert!(window >= 1, "rolling window must be >= 1");

    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            values[i + 1 - window..=i].iter().copied().sum::<Option<f64>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{assert_approx, DEFAULT_EPSILON};

    fn some(xs: &[f64]) -> Vec<Option<f64>> {
        xs.iter().copied().map(Some).collect()
    }

    #[test]
    fn mean_warms_up_then_slides() {
        let result = rolling_mean(&some(&[10.0, 20.0, 30.0, 40.0]), 3);
        assert_approx(result[0].unwrap(), 10.0, DEFAULT_EPSILON);
        assert_approx(result[1].unwrap(), 15.0, DEFAULT_EPSILON);
        assert_approx(result[2].unwrap(), 20.0, DEFAULT_EPSILON);
        // mean(20,30,40)
        assert_approx(result[3].unwrap(), 30.0, DEFAULT_EPSILON);
    }

    #[test]
    fn mean_skips_absent_but_keeps_slot() {
        let values = vec![Some(10.0), None, Some(30.0), Some(50.0)];
        let result = rolling_mean(&values, 3);
        assert_approx(result[1].unwrap(), 10.0, DEFAULT_EPSILON);
        assert_approx(result[2].unwrap(), 20.0, DEFAULT_EPSILON);
        // window [None, 30, 50]
        assert_approx(result[3].unwrap(), 40.0, DEFAULT_EPSILON);
    }

    #[test]
    fn mean_of_all_absent_is_absent() {
        let result = rolling_mean(&[None, None], 20);
        assert_eq!(result, vec![None, None]);
    }

    #[test]
    fn sum_requires_full_window() {
        let result = rolling_sum(&some(&[1.0, 2.0, 3.0, 4.0]), 3);
        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert_approx(result[2].unwrap(), 6.0, DEFAULT_EPSILON);
        assert_approx(result[3].unwrap(), 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sum_with_gap_is_absent() {
        let values = vec![Some(1.0), None, Some(3.0), Some(4.0), Some(5.0)];
        let result = rolling_sum(&values, 2);
        assert_eq!(result[1], None);
        assert_eq!(result[2], None);
        assert_approx(result[3].unwrap(), 7.0, DEFAULT_EPSILON);
        assert_approx(result[4].unwrap(), 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn empty_series() {
        assert!(rolling_mean(&[], 20).is_empty());
        assert!(rolling_sum(&[], 14).is_empty());
    }
}
