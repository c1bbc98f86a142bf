//! Date-range-aware feature cache.
//!
//! Each symbol moves through `Empty → Partial(last_date) → Partial(later) → …`.
//! A request whose end the stored table already reaches is served without
//! touching the provider. Anything else fetches both raw feeds, re-derives
//! the whole table, merges it with what was stored per the refresh strategy,
//! and writes it back.
//!
//! Entries live in memory for the lifetime of the cache and, when persisting,
//! in the [`FeatureStore`] on disk.

use chrono::NaiveDate;
use flowlab_core::calendar::CalendarError;
use flowlab_core::data::{align, AlignError, DataError, FeatureStore, FeedProvider};
use flowlab_core::domain::{CacheEntry, FeatureTable};
use flowlab_core::features::derive;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    InvalidDate(#[from] CalendarError),

    #[error("invalid range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// Neither feed returned anything for the symbol.
    #[error("no history and no flow data for '{symbol}'")]
    Unscrapable { symbol: String },

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("collection cancelled")]
    Cancelled,
}

/// How a freshly derived table is combined with the stored one.
pub trait RefreshStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn merge(&self, stored: Option<&FeatureTable>, fresh: FeatureTable) -> FeatureTable;
}

/// The fresh table replaces the stored one wholesale.
#[derive(Debug, Clone, Copy, Default)]
pub struct Replace;

impl RefreshStrategy for Replace {
    fn name(&self) -> &str {
        "replace"
    }

    fn merge(&self, _stored: Option<&FeatureTable>, fresh: FeatureTable) -> FeatureTable {
        fresh
    }
}

/// Stored rows are kept; only fresh rows dated after the stored last date are
/// appended.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendTail;

impl RefreshStrategy for AppendTail {
    fn name(&self) -> &str {
        "append_tail"
    }

    fn merge(&self, stored: Option<&FeatureTable>, fresh: FeatureTable) -> FeatureTable {
        let Some(last) = stored.and_then(|s| s.last_date()) else {
            return fresh;
        };
        let mut rows = stored.map(|s| s.rows.clone()).unwrap_or_default();
        rows.extend(fresh.rows.into_iter().filter(|r| r.date > last));
        FeatureTable::new(fresh.symbol, rows)
    }
}

/// Config-level selector for the refresh strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    #[default]
    Replace,
    AppendTail,
}

impl RefreshMode {
    pub fn strategy(self) -> Box<dyn RefreshStrategy> {
        match self {
            RefreshMode::Replace => Box::new(Replace),
            RefreshMode::AppendTail => Box::new(AppendTail),
        }
    }
}

/// Requested end of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndDate {
    On(NaiveDate),
    /// The cached entry's last row if one exists, else the provider's last row.
    Latest,
}

pub struct RangeCache<P: FeedProvider> {
    provider: P,
    store: FeatureStore,
    refresh: Box<dyn RefreshStrategy>,
    persist: bool,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl<P: FeedProvider> RangeCache<P> {
    /// A persisting cache with the `Replace` strategy.
    pub fn new(provider: P, store: FeatureStore) -> Self {
        Self {
            provider,
            store,
            refresh: Box::new(Replace),
            persist: true,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_refresh(mut self, refresh: Box<dyn RefreshStrategy>) -> Self {
        self.refresh = refresh;
        self
    }

    /// Whether [`get`](Self::get) writes refreshed tables to the store.
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    /// Rows of `symbol` dated within `[start, end]`.
    pub fn get(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<FeatureTable, CollectError> {
        self.get_with_persist(symbol, start, EndDate::On(end), self.persist)
    }

    /// Rows of `symbol` from `start` through the latest known row.
    pub fn get_through_latest(&self, symbol: &str, start: NaiveDate) -> Result<FeatureTable, CollectError> {
        self.get_with_persist(symbol, start, EndDate::Latest, self.persist)
    }

    /// [`get`](Self::get) with an explicit end policy and persistence switch.
    pub fn get_with_persist(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: EndDate,
        persist: bool,
    ) -> Result<FeatureTable, CollectError> {
        if let EndDate::On(end) = end {
            if start > end {
                return Err(CollectError::InvalidRange { start, end });
            }
        }

        let stored = self.load_entry(symbol)?;
        let hit_end = match (&stored, end) {
            (Some(entry), EndDate::On(end)) if entry.covers(end) => Some(end),
            (Some(entry), EndDate::Latest) => entry.last_date,
            _ => None,
        };
        if let (Some(entry), Some(end)) = (&stored, hit_end) {
            debug!(symbol, %start, %end, "cache hit");
            return Ok(entry.table.slice(start, end));
        }

        debug!(symbol, %start, ?end, cached_through = ?stored.as_ref().and_then(|e| e.last_date), "cache miss");
        let entry = self.refresh_entry(symbol, stored, persist)?;
        match end {
            EndDate::On(end) => Ok(entry.table.slice(start, end)),
            EndDate::Latest => Ok(entry
                .last_date
                .map(|last| entry.table.slice(start, last))
                .unwrap_or_else(|| FeatureTable::empty(symbol))),
        }
    }

    /// In-memory entry, else the persisted one.
    fn load_entry(&self, symbol: &str) -> Result<Option<CacheEntry>, CollectError> {
        if let Some(entry) = self.lock_entries().get(symbol) {
            return Ok(Some(entry.clone()));
        }
        Ok(self.store.load(symbol)?)
    }

    fn refresh_entry(
        &self,
        symbol: &str,
        stored: Option<CacheEntry>,
        persist: bool,
    ) -> Result<CacheEntry, CollectError> {
        let history = self.provider.fetch_history(symbol)?;
        let flow = self.provider.fetch_flow(symbol)?;

        let aligned = match align(history.as_deref(), flow.as_deref(), self.provider.calendar()) {
            Ok(aligned) => aligned,
            Err(AlignError::NoData) => {
                return Err(CollectError::Unscrapable {
                    symbol: symbol.to_string(),
                })
            }
        };

        let fresh = derive(symbol, &aligned);
        let table = self.refresh.merge(stored.as_ref().map(|e| &e.table), fresh);
        let entry = CacheEntry::new(table);

        if persist {
            self.store.write(&entry.table)?;
        }
        info!(
            symbol,
            rows = entry.table.len(),
            last_date = ?entry.last_date,
            strategy = self.refresh.name(),
            persisted = persist,
            "refreshed feature table"
        );

        self.lock_entries().insert(symbol.to_string(), entry.clone());
        Ok(entry)
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A poisoned map only ever holds complete entries
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
