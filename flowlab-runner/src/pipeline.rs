//! Collection pipeline: date conversion, single-symbol runs, batch runs.

use crate::range_cache::{CollectError, EndDate, RangeCache};
use flowlab_core::calendar::{self, CalendarSystem};
use flowlab_core::data::FeedProvider;
use flowlab_core::domain::FeatureTable;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Progress reporting for batch collection.
pub trait BatchProgress: Sync {
    fn on_start(&self, symbol: &str, index: usize, total: usize);
    fn on_complete(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        result: &Result<FeatureTable, CollectError>,
    );
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that logs through `tracing`.
pub struct LogProgress;

impl BatchProgress for LogProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        info!(symbol, "[{}/{}] collecting", index + 1, total);
    }

    fn on_complete(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        result: &Result<FeatureTable, CollectError>,
    ) {
        match result {
            Ok(table) => info!(symbol, rows = table.len(), "[{}/{}] OK", index + 1, total),
            Err(CollectError::Cancelled) => {}
            Err(e) => warn!(symbol, error = %e, "[{}/{}] FAILED", index + 1, total),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        info!(succeeded, failed, total, "batch complete");
    }
}

/// Per-symbol outcomes of a batch run, in input order.
#[derive(Debug)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub results: Vec<(String, Result<FeatureTable, CollectError>)>,
}

impl BatchReport {
    fn from_results(results: Vec<(String, Result<FeatureTable, CollectError>)>) -> Self {
        let cancelled = results
            .iter()
            .filter(|(_, r)| matches!(r, Err(CollectError::Cancelled)))
            .count();
        let succeeded = results.iter().filter(|(_, r)| r.is_ok()).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded - cancelled,
            cancelled,
            results,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }

    pub fn get(&self, symbol: &str) -> Option<&Result<FeatureTable, CollectError>> {
        self.results.iter().find(|(s, _)| s == symbol).map(|(_, r)| r)
    }

    pub fn errors(&self) -> impl Iterator<Item = (&str, &CollectError)> {
        self.results
            .iter()
            .filter_map(|(s, r)| r.as_ref().err().map(|e| (s.as_str(), e)))
    }
}

pub struct Pipeline<P: FeedProvider> {
    cache: RangeCache<P>,
    calendar: CalendarSystem,
    default_start: String,
    parallel: bool,
    cancel: Arc<AtomicBool>,
}

impl<P: FeedProvider> Pipeline<P> {
    /// `calendar` is the calendar request dates are written in; `default_start`
    /// is used by batch runs.
    pub fn new(cache: RangeCache<P>, calendar: CalendarSystem, default_start: impl Into<String>) -> Self {
        Self {
            cache,
            calendar,
            default_start: default_start.into(),
            parallel: false,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn cache(&self) -> &RangeCache<P> {
        &self.cache
    }

    /// Flag that, once set, stops batch runs from starting further symbols.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Collect one symbol. `end = None` means through the latest known row.
    pub fn run(
        &self,
        symbol: &str,
        start: &str,
        end: Option<&str>,
        persist: bool,
    ) -> Result<FeatureTable, CollectError> {
        let start = calendar::to_canonical(start, self.calendar)?;
        let end = match end {
            Some(s) => EndDate::On(calendar::to_canonical(s, self.calendar)?),
            None => EndDate::Latest,
        };
        self.cache.get_with_persist(symbol, start, end, persist)
    }

    /// Collect every symbol from the default start through its latest row.
    pub fn run_all(&self, symbols: &[String], persist: bool) -> BatchReport {
        self.run_all_with_progress(symbols, persist, &LogProgress)
    }

    pub fn run_all_with_progress(
        &self,
        symbols: &[String],
        persist: bool,
        progress: &dyn BatchProgress,
    ) -> BatchReport {
        let total = symbols.len();
        let one = |(index, symbol): (usize, &String)| {
            if self.cancel.load(Ordering::SeqCst) {
                return (symbol.clone(), Err(CollectError::Cancelled));
            }
            progress.on_start(symbol, index, total);
            let result = self.run(symbol, &self.default_start, None, persist);
            progress.on_complete(symbol, index, total, &result);
            (symbol.clone(), result)
        };

        let results: Vec<_> = if self.parallel {
            symbols.par_iter().enumerate().map(one).collect()
        } else {
            symbols.iter().enumerate().map(one).collect()
        };

        let report = BatchReport::from_results(results);
        if report.cancelled > 0 {
            warn!(cancelled = report.cancelled, "batch cancelled before all symbols ran");
        }
        progress.on_batch_complete(report.succeeded, report.failed, report.total);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowlab_core::data::FeatureStore;
    use flowlab_core::data::MemoryProvider;
    use flowlab_core::data::RawHistoryRow;

    fn history(days: u32) -> Vec<RawHistoryRow> {
        (1..=days)
            .map(|d| RawHistoryRow {
                date: Some(format!("2021-01-{d:02}")),
                volume: Some(10.0),
                value: Some(100.0),
                close: Some(1.0),
            })
            .collect()
    }

    fn pipeline(provider: MemoryProvider, dir: &std::path::Path) -> Pipeline<MemoryProvider> {
        let cache = RangeCache::new(provider, FeatureStore::new(dir));
        Pipeline::new(cache, CalendarSystem::Gregorian, "2021-01-01")
    }

    #[test]
    fn invalid_date_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(MemoryProvider::new(CalendarSystem::Gregorian), dir.path());
        let err = p.run("X", "2021-02-30", None, false).unwrap_err();
        assert!(matches!(err, CollectError::InvalidDate(_)));
        assert_eq!(p.cache().provider().calls(), 0);
    }

    #[test]
    fn latest_end_uses_provider_last_row() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MemoryProvider::new(CalendarSystem::Gregorian).with_history("A", history(5));
        let p = pipeline(provider, dir.path());

        let table = p.run("A", "2021-01-03", None, false).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.last_date(), chrono::NaiveDate::from_ymd_opt(2021, 1, 5));
    }

    #[test]
    fn cancelled_batch_fetches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MemoryProvider::new(CalendarSystem::Gregorian).with_history("A", history(2));
        let p = pipeline(provider, dir.path());
        p.cancel_handle().store(true, Ordering::SeqCst);

        let report = p.run_all(&["A".to_string(), "B".to_string()], false);
        assert_eq!(report.cancelled, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(p.cache().provider().calls(), 0);
    }

    #[test]
    fn report_counts() {
        let report = BatchReport::from_results(vec![
            ("A".into(), Ok(FeatureTable::empty("A"))),
            ("B".into(), Err(CollectError::Unscrapable { symbol: "B".into() })),
            ("C".into(), Err(CollectError::Cancelled)),
        ]);
        assert_eq!((report.succeeded, report.failed, report.cancelled), (1, 1, 1));
        assert!(!report.all_succeeded());
        assert_eq!(report.errors().count(), 2);
        assert!(report.get("A").unwrap().is_ok());
    }
}
