//! Individual-power pile: the trailing sum of `individual_power`.
//!
//! A long positive pile means individual buyers have out-sized sellers for a
//! stretch of sessions. Needs a full window of present values.

use chrono::NaiveDate;
use flowlab_core::domain::FeatureTable;
use flowlab_core::features::{self, DEFAULT_PILE_WINDOW};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    #[error("pile window must be >= 1")]
    ZeroWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PilePoint {
    pub date: NaiveDate,
    pub pile: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pile {
    window: usize,
}

impl Default for Pile {
    fn default() -> Self {
        Self {
            window: DEFAULT_PILE_WINDOW,
        }
    }
}

impl Pile {
    pub fn new(window: usize) -> Result<Self, IndicatorError> {
        if window == 0 {
            return Err(IndicatorError::ZeroWindow);
        }
        Ok(Self { window })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn compute(&self, table: &FeatureTable) -> Vec<PilePoint> {
        features::pile(table, self.window)
            .into_iter()
            .map(|(date, pile)| PilePoint { date, pile })
            .collect()
    }

    /// Most recent point with a full window.
    pub fn latest(&self, table: &FeatureTable) -> Option<PilePoint> {
        self.compute(table).into_iter().rev().find(|p| p.pile.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowlab_core::domain::FeatureRow;

    fn table(powers: &[Option<f64>]) -> FeatureTable {
        let base = NaiveDate::from_ymd_opt(2021, 3, 21).unwrap();
        let rows = powers
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let mut row = FeatureRow::empty(base + chrono::Duration::days(i as i64));
                row.individual_power = p;
                row
            })
            .collect();
        FeatureTable::new("X", rows)
    }

    #[test]
    fn zero_window_rejected() {
        assert_eq!(Pile::new(0), Err(IndicatorError::ZeroWindow));
        assert_eq!(Pile::default().window(), 14);
    }

    #[test]
    fn pile_over_window() {
        let t = table(&[Some(1.5), Some(-2.0), Some(3.0), None, Some(1.0)]);
        let points = Pile::new(2).unwrap().compute(&t);
        let piles: Vec<_> = points.iter().map(|p| p.pile).collect();
        assert_eq!(piles, vec![None, Some(-0.5), Some(1.0), None, None]);
    }

    #[test]
    fn latest_skips_incomplete_windows() {
        let t = table(&[Some(1.0), Some(2.0), None]);
        let latest = Pile::new(2).unwrap().latest(&t).unwrap();
        assert_eq!(latest.pile, Some(3.0));
        assert_eq!(latest.date, NaiveDate::from_ymd_opt(2021, 3, 22).unwrap());

        assert!(Pile::new(5).unwrap().latest(&t).is_none());
    }
}
