//! Integration tests for the collection pipeline and batch runs.

use chrono::NaiveDate;
use flowlab_core::calendar::CalendarSystem;
use flowlab_core::data::{
    encode_symbol, FeatureStore, FileFeedProvider, MemoryProvider, RawHistoryRow,
};
use flowlab_core::domain::FeatureTable;
use flowlab_runner::{
    BatchProgress, CollectError, FlowlabConfig, Pile, Pipeline, RangeCache,
};
use std::sync::atomic::{AtomicUsize, Ordering};

fn history(days: u32) -> Vec<RawHistoryRow> {
    (1..=days)
        .map(|day| RawHistoryRow {
            date: Some(format!("2021-01-{day:02}")),
            volume: Some(10.0),
            value: Some(500.0),
            close: Some(5.0),
        })
        .collect()
}

fn memory_pipeline(provider: MemoryProvider, dir: &std::path::Path) -> Pipeline<MemoryProvider> {
    let cache = RangeCache::new(provider, FeatureStore::new(dir));
    Pipeline::new(cache, CalendarSystem::Gregorian, "2021-01-01")
}

#[derive(Default)]
struct CountingProgress {
    started: AtomicUsize,
    completed: AtomicUsize,
    batches: AtomicUsize,
}

impl BatchProgress for CountingProgress {
    fn on_start(&self, _symbol: &str, _index: usize, _total: usize) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_complete(
        &self,
        _symbol: &str,
        _index: usize,
        _total: usize,
        _result: &Result<FeatureTable, CollectError>,
    ) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {
        self.batches.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn bad_symbol_does_not_abort_batch() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MemoryProvider::new(CalendarSystem::Gregorian).with_history("good", history(5));
    let pipeline = memory_pipeline(provider, dir.path());

    let symbols = vec!["bad".to_string(), "good".to_string()];
    let report = pipeline.run_all(&symbols, false);

    assert_eq!(report.total, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert!(matches!(
        report.get("bad"),
        Some(Err(CollectError::Unscrapable { .. }))
    ));
    let good = report.get("good").unwrap().as_ref().unwrap();
    assert_eq!(good.len(), 5);
    assert_eq!(report.results[0].0, "bad");
}

#[test]
fn parallel_batch_matches_sequential() {
    let symbols: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
    let provider = || {
        symbols.iter().fold(MemoryProvider::new(CalendarSystem::Gregorian), |p, s| {
            p.with_history(s, history(6))
        })
    };

    let seq_dir = tempfile::tempdir().unwrap();
    let sequential = memory_pipeline(provider(), seq_dir.path()).run_all(&symbols, true);

    let par_dir = tempfile::tempdir().unwrap();
    let parallel = memory_pipeline(provider(), par_dir.path())
        .with_parallel(true)
        .run_all(&symbols, true);

    assert!(sequential.all_succeeded() && parallel.all_succeeded());
    for ((s1, r1), (s2, r2)) in sequential.results.iter().zip(&parallel.results) {
        assert_eq!(s1, s2);
        assert_eq!(r1.as_ref().unwrap(), r2.as_ref().unwrap());
    }
    assert_eq!(FeatureStore::new(par_dir.path()).status().unwrap().len(), 4);
}

#[test]
fn progress_sees_every_symbol() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MemoryProvider::new(CalendarSystem::Gregorian).with_history("A", history(2));
    let pipeline = memory_pipeline(provider, dir.path());
    let progress = CountingProgress::default();

    let symbols = vec!["A".to_string(), "B".to_string(), "C".to_string()];
    pipeline.run_all_with_progress(&symbols, false, &progress);

    assert_eq!(progress.started.load(Ordering::SeqCst), 3);
    assert_eq!(progress.completed.load(Ordering::SeqCst), 3);
    assert_eq!(progress.batches.load(Ordering::SeqCst), 1);
}

#[test]
fn persist_flag_controls_store_writes() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MemoryProvider::new(CalendarSystem::Gregorian)
        .with_history("A", history(3))
        .with_history("B", history(3));
    let pipeline = memory_pipeline(provider, dir.path());

    pipeline.run("A", "2021-01-01", Some("2021-01-03"), false).unwrap();
    pipeline.run("B", "2021-01-01", Some("2021-01-03"), true).unwrap();

    let store = FeatureStore::new(dir.path());
    assert!(store.get_meta("A").is_none());
    assert_eq!(store.get_meta("B").unwrap().row_count, 3);
}

#[test]
fn jalali_request_over_exported_files() {
    let feed = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let sym_dir = feed.path().join(encode_symbol("شستا"));
    std::fs::create_dir_all(&sym_dir).unwrap();
    std::fs::write(
        sym_dir.join("history.csv"),
        "date,volume,value,close\n\
         1399-12-27,1,100,10\n\
         1400-01-05,1,200,20\n\
         1400-01-06,1,300,30\n",
    )
    .unwrap();

    let config = FlowlabConfig::default();
    let provider = FileFeedProvider::new(feed.path(), CalendarSystem::Jalali);
    let cache = RangeCache::new(provider, FeatureStore::new(cache_dir.path()));
    let pipeline = Pipeline::new(cache, config.calendar, config.default_start.clone());

    // Default start 1400-01-01 excludes the 1399 session.
    let report = pipeline.run_all(&["شستا".to_string()], true);
    let table = report.get("شستا").unwrap().as_ref().unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.first_date(), NaiveDate::from_ymd_opt(2021, 3, 25));
    // The mean still saw the 1399 session.
    assert_eq!(table.rows[0].mean_value_20, Some(150.0));

    let explicit = pipeline.run("شستا", "1400-01-06", Some("1400-01-06"), true).unwrap();
    assert_eq!(explicit.len(), 1);
    assert_eq!(explicit.rows[0].close, Some(30.0));

    assert!(matches!(
        pipeline.run("شستا", "1400-02-32", None, true),
        Err(CollectError::InvalidDate(_))
    ));
}

#[test]
fn pile_over_collected_table() {
    let dir = tempfile::tempdir().unwrap();
    let flow: Vec<_> = (1..=4)
        .map(|day| flowlab_core::data::RawFlowRow {
            date: Some(format!("2021-01-{day:02}")),
            individual_buy_count: Some("10".into()),
            individual_buy_value: Some("1000000000".into()),
            individual_sell_count: Some("20".into()),
            individual_sell_value: Some("1000000000".into()),
            corporate_buy_value: Some("0".into()),
            corporate_sell_value: Some("0".into()),
        })
        .collect();
    let provider = MemoryProvider::new(CalendarSystem::Gregorian).with_flow("P", flow);
    let pipeline = memory_pipeline(provider, dir.path());

    let table = pipeline.run("P", "2021-01-01", None, false).unwrap();
    let latest = Pile::new(3).unwrap().latest(&table).unwrap();
    assert_eq!(latest.pile, Some(6.0));
    assert_eq!(latest.date, NaiveDate::from_ymd_opt(2021, 1, 4).unwrap());
}
