//! In-memory provider that counts fetches.
//!
//! Used by tests and by callers that already hold raw rows. Feeds can be
//! replaced between calls to simulate a source that keeps publishing.

use super::provider::{DataError, FeedProvider, RawFlowRow, RawHistoryRow};
use crate::calendar::CalendarSystem;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryProvider {
    calendar: CalendarSystem,
    history: RwLock<BTreeMap<String, Vec<RawHistoryRow>>>,
    flow: RwLock<BTreeMap<String, Vec<RawFlowRow>>>,
    failing: RwLock<BTreeSet<String>>,
    history_calls: AtomicUsize,
    flow_calls: AtomicUsize,
}

impl MemoryProvider {
    pub fn new(calendar: CalendarSystem) -> Self {
        Self {
            calendar,
            ..Self::default()
        }
    }

    pub fn with_history(self, symbol: &str, rows: Vec<RawHistoryRow>) -> Self {
        self.set_history(symbol, rows);
        self
    }

    pub fn with_flow(self, symbol: &str, rows: Vec<RawFlowRow>) -> Self {
        self.set_flow(symbol, rows);
        self
    }

    pub fn set_history(&self, symbol: &str, rows: Vec<RawHistoryRow>) {
        if let Ok(mut map) = self.history.write() {
            map.insert(symbol.to_string(), rows);
        }
    }

    pub fn set_flow(&self, symbol: &str, rows: Vec<RawFlowRow>) {
        if let Ok(mut map) = self.flow.write() {
            map.insert(symbol.to_string(), rows);
        }
    }

    /// Make every fetch for `symbol` fail with a provider error.
    pub fn fail_symbol(&self, symbol: &str) {
        if let Ok(mut set) = self.failing.write() {
            set.insert(symbol.to_string());
        }
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn flow_calls(&self) -> usize {
        self.flow_calls.load(Ordering::SeqCst)
    }

    /// Total fetches of either feed.
    pub fn calls(&self) -> usize {
        self.history_calls() + self.flow_calls()
    }

    fn check_failing(&self, symbol: &str) -> Result<(), DataError> {
        let failing = self
            .failing
            .read()
            .map_err(|_| DataError::CacheError("provider lock poisoned".into()))?;
        if failing.contains(symbol) {
            return Err(DataError::Provider {
                symbol: symbol.to_string(),
                reason: "simulated failure".into(),
            });
        }
        Ok(())
    }
}

impl FeedProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn calendar(&self) -> CalendarSystem {
        self.calendar
    }

    fn fetch_history(&self, symbol: &str) -> Result<Option<Vec<RawHistoryRow>>, DataError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing(symbol)?;
        let map = self
            .history
            .read()
            .map_err(|_| DataError::CacheError("provider lock poisoned".into()))?;
        Ok(map.get(symbol).cloned())
    }

    fn fetch_flow(&self, symbol: &str) -> Result<Option<Vec<RawFlowRow>>, DataError> {
        self.flow_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing(symbol)?;
        let map = self
            .flow
            .read()
            .map_err(|_| DataError::CacheError("provider lock poisoned".into()))?;
        Ok(map.get(symbol).cloned())
    }

    fn symbols(&self) -> Option<Vec<String>> {
        let history = self.history.read().ok()?;
        let flow = self.flow.read().ok()?;
        let all: BTreeSet<String> = history.keys().chain(flow.keys()).cloned().collect();
        Some(all.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(date: &str) -> RawHistoryRow {
        RawHistoryRow {
            date: Some(date.into()),
            volume: Some(1.0),
            value: Some(2.0),
            close: Some(3.0),
        }
    }

    #[test]
    fn counts_fetches() {
        let p = MemoryProvider::new(CalendarSystem::Gregorian).with_history("A", vec![row("2021-01-02")]);
        assert_eq!(p.fetch_history("A").unwrap().unwrap().len(), 1);
        assert!(p.fetch_flow("A").unwrap().is_none());
        assert!(p.fetch_history("B").unwrap().is_none());
        assert_eq!(p.history_calls(), 2);
        assert_eq!(p.flow_calls(), 1);
        assert_eq!(p.calls(), 3);
    }

    #[test]
    fn failing_symbol_errors() {
        let p = MemoryProvider::new(CalendarSystem::Gregorian).with_history("A", vec![row("2021-01-02")]);
        p.fail_symbol("A");
        assert!(matches!(p.fetch_history("A"), Err(DataError::Provider { .. })));
    }

    #[test]
    fn lists_symbols_from_both_feeds() {
        let p = MemoryProvider::new(CalendarSystem::Gregorian)
            .with_history("B", vec![])
            .with_flow("A", vec![RawFlowRow::default()]);
        assert_eq!(p.symbols().unwrap(), vec!["A", "B"]);
    }
}
