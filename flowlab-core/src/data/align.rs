//! History/flow time alignment.
//!
//! Given the two raw feeds for one symbol, normalize each onto canonical
//! dates and outer-join them on a common timeline. A date present in only one
//! feed gets `None` for the other feed's fields (no forward-fill).

use super::provider::{RawFlowRow, RawHistoryRow};
use crate::calendar::{self, CalendarSystem};
use crate::domain::{FlowRow, HistoryRow};
use crate::expr::{self, ExprError};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignError {
    /// Both feeds absent or empty: the instrument cannot be derived at all.
    #[error("no history and no flow data")]
    NoData,
}

/// One date of the joined table. `history`/`flow` are `None` when that feed
/// did not publish the date.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub date: NaiveDate,
    pub history: Option<HistoryRow>,
    pub flow: Option<FlowRow>,
}

/// What normalization had to paper over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignReport {
    /// Raw rows whose date was missing or unparseable.
    pub sentinel_dates: usize,
    /// Raw rows dropped because an earlier row had the same date.
    pub duplicate_dates: usize,
    /// Flow cells that failed expression evaluation.
    pub malformed_fields: usize,
}

/// Both feeds on a common, strictly increasing date axis.
#[derive(Debug, Clone)]
pub struct AlignedTable {
    pub rows: Vec<AlignedRow>,
    pub report: AlignReport,
}

impl AlignedTable {
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.iter().map(|r| r.date)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Align raw history and flow for one symbol.
///
/// `None` and an empty vector are treated alike. Fails with `NoData` only
/// when both feeds have nothing.
pub fn align(
    history: Option<&[RawHistoryRow]>,
    flow: Option<&[RawFlowRow]>,
    calendar: CalendarSystem,
) -> Result<AlignedTable, AlignError> {
    let history = history.unwrap_or_default();
    let flow = flow.unwrap_or_default();
    if history.is_empty() && flow.is_empty() {
        return Err(AlignError::NoData);
    }

    let mut report = AlignReport::default();
    let mut history_by_date = normalize_history(history, calendar, &mut report);
    let mut flow_by_date = normalize_flow(flow, calendar, &mut report);

    // Union of both feeds' dates, ascending
    let dates: BTreeSet<NaiveDate> = history_by_date
        .keys()
        .chain(flow_by_date.keys())
        .copied()
        .collect();

    let rows: Vec<AlignedRow> = dates
        .into_iter()
        .map(|date| AlignedRow {
            date,
            history: history_by_date.remove(&date),
            flow: flow_by_date.remove(&date),
        })
        .collect();

    if report.sentinel_dates > 0 {
        warn!(
            count = report.sentinel_dates,
            "raw rows with missing or unparseable dates mapped to sentinel date"
        );
    }
    if report.duplicate_dates > 0 {
        warn!(
            count = report.duplicate_dates,
            "duplicate raw dates collapsed (first occurrence kept)"
        );
    }
    if report.malformed_fields > 0 {
        warn!(
            count = report.malformed_fields,
            "malformed flow expressions treated as absent"
        );
    }
    debug!(rows = rows.len(), "aligned history and flow");

    Ok(AlignedTable { rows, report })
}

/// Canonical date for a raw date cell, falling back to the sentinel.
fn resolve_date(raw: Option<&str>, calendar: CalendarSystem, report: &mut AlignReport) -> NaiveDate {
    match raw.map(|s| calendar::to_canonical(s, calendar)) {
        Some(Ok(date)) => date,
        _ => {
            report.sentinel_dates += 1;
            calendar::sentinel_date()
        }
    }
}

fn normalize_history(
    raw: &[RawHistoryRow],
    calendar: CalendarSystem,
    report: &mut AlignReport,
) -> BTreeMap<NaiveDate, HistoryRow> {
    let mut out = BTreeMap::new();
    for row in raw {
        let date = resolve_date(row.date.as_deref(), calendar, report);
        if out.contains_key(&date) {
            report.duplicate_dates += 1;
            continue;
        }
        out.insert(
            date,
            HistoryRow {
                date,
                volume: finite(row.volume),
                value: finite(row.value),
                close: finite(row.close),
            },
        );
    }
    out
}

fn normalize_flow(
    raw: &[RawFlowRow],
    calendar: CalendarSystem,
    report: &mut AlignReport,
) -> BTreeMap<NaiveDate, FlowRow> {
    let mut out = BTreeMap::new();
    for row in raw {
        let date = resolve_date(row.date.as_deref(), calendar, report);
        if out.contains_key(&date) {
            report.duplicate_dates += 1;
            continue;
        }

        let mut cell = |raw: &Option<String>| match expr::evaluate_cell(raw.as_deref()) {
            Ok(v) => v,
            Err(ExprError::MalformedExpression { input, reason }) => {
                debug!(%date, %input, %reason, "malformed flow cell");
                report.malformed_fields += 1;
                None
            }
        };

        let normalized = FlowRow {
            date,
            individual_buy_count: cell(&row.individual_buy_count),
            individual_buy_value: cell(&row.individual_buy_value),
            individual_sell_count: cell(&row.individual_sell_count),
            individual_sell_value: cell(&row.individual_sell_value),
            corporate_buy_value: cell(&row.corporate_buy_value),
            corporate_sell_value: cell(&row.corporate_sell_value),
        };
        out.insert(date, normalized);
    }
    out
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}
