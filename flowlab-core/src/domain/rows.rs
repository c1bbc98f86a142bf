//! Normalized per-day rows of the two raw feeds.
//!
//! Produced by the aligner from the provider's raw rows: dates are canonical,
//! flow expressions are evaluated. A field that was blank or could not be
//! evaluated is `None`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day of price/volume history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub date: NaiveDate,
    pub volume: Option<f64>,
    pub value: Option<f64>,
    pub close: Option<f64>,
}

/// One published day of investor-classified flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRow {
    pub date: NaiveDate,
    pub individual_buy_count: Option<f64>,
    pub individual_buy_value: Option<f64>,
    pub individual_sell_count: Option<f64>,
    pub individual_sell_value: Option<f64>,
    pub corporate_buy_value: Option<f64>,
    pub corporate_sell_value: Option<f64>,
}
