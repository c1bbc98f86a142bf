//! FeatureRow and FeatureTable: the unified per-symbol output.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One date of the merged, derived feature table.
///
/// History fields (`volume`, `value`, `close`) are absent on flow-only dates;
/// flow-derived fields are absent on history-only dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub volume: Option<f64>,
    pub value: Option<f64>,
    pub close: Option<f64>,
    pub mean_value_20: Option<f64>,
    pub value_ratio_20: Option<f64>,
    pub buy_per_capita: Option<f64>,
    pub sell_per_capita: Option<f64>,
    pub individual_power: Option<f64>,
    pub individual_buy_percent: Option<f64>,
    pub individual_sell_percent: Option<f64>,
}

impl FeatureRow {
    /// A row with every value absent.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            volume: None,
            value: None,
            close: None,
            mean_value_20: None,
            value_ratio_20: None,
            buy_per_capita: None,
            sell_per_capita: None,
            individual_power: None,
            individual_buy_percent: None,
            individual_sell_percent: None,
        }
    }

    /// Whether any flow-derived field is present.
    pub fn has_flow(&self) -> bool {
        self.buy_per_capita.is_some()
            || self.sell_per_capita.is_some()
            || self.individual_power.is_some()
            || self.individual_buy_percent.is_some()
            || self.individual_sell_percent.is_some()
    }
}

/// Date-ordered feature rows for one symbol. Dates are unique and ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub symbol: String,
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(symbol: impl Into<String>, rows: Vec<FeatureRow>) -> Self {
        Self {
            symbol: symbol.into(),
            rows,
        }
    }

    pub fn empty(symbol: impl Into<String>) -> Self {
        Self::new(symbol, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.iter().map(|r| r.date)
    }

    /// Rows with `start <= date <= end`, as a new table.
    ///
    /// Relies on the ascending-date invariant (binary search on both ends).
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> FeatureTable {
        if start > end {
            return FeatureTable::empty(self.symbol.clone());
        }
        let lo = self.rows.partition_point(|r| r.date < start);
        let hi = self.rows.partition_point(|r| r.date <= end);
        FeatureTable::new(self.symbol.clone(), self.rows[lo..hi].to_vec())
    }

    /// Whether dates are strictly increasing.
    pub fn is_strictly_ordered(&self) -> bool {
        self.rows.windows(2).all(|w| w[0].date < w[1].date)
    }
}

/// A symbol's persisted table plus its high-water mark.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub symbol: String,
    pub table: FeatureTable,
    pub last_date: Option<NaiveDate>,
}

impl CacheEntry {
    pub fn new(table: FeatureTable) -> Self {
        Self {
            symbol: table.symbol.clone(),
            last_date: table.last_date(),
            table,
        }
    }

    /// Whether the stored table reaches `end`.
    pub fn covers(&self, end: NaiveDate) -> bool {
        self.last_date.is_some_and(|last| last >= end)
    }
}
