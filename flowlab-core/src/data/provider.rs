//! Feed provider trait and structured error types.
//!
//! The FeedProvider trait abstracts over where raw history and investor-flow
//! rows come from (exported files, synthetic data, an in-memory fixture) so
//! the pipeline can swap implementations and tests can count fetches.

use crate::calendar::CalendarSystem;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw daily history row from a provider (before date normalization).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHistoryRow {
    pub date: Option<String>,
    pub volume: Option<f64>,
    pub value: Option<f64>,
    pub close: Option<f64>,
}

/// Raw investor-flow row. Value and count cells are arithmetic expressions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawFlowRow {
    pub date: Option<String>,
    pub individual_buy_count: Option<String>,
    pub individual_buy_value: Option<String>,
    pub individual_sell_count: Option<String>,
    pub individual_sell_value: Option<String>,
    pub corporate_buy_value: Option<String>,
    pub corporate_sell_value: Option<String>,
}

/// Structured error types for data operations.
///
/// These are designed to be displayable in both library logs and the CLI.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("provider error for '{symbol}': {reason}")]
    Provider { symbol: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("polars error: {0}")]
    Polars(String),

    #[error("corrupt cache file {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("cache error: {0}")]
    CacheError(String),
}

/// Trait for raw feed providers.
///
/// Implementations handle the specifics of fetching from a particular source.
/// The store sits above this trait; providers don't know about the cache.
/// `Ok(None)` means the provider has nothing for this symbol (absent feed).
pub trait FeedProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Calendar that the provider's date strings are written in.
    fn calendar(&self) -> CalendarSystem {
        CalendarSystem::Gregorian
    }

    /// Full trade history for a symbol.
    fn fetch_history(&self, symbol: &str) -> Result<Option<Vec<RawHistoryRow>>, DataError>;

    /// Full investor-classified flow for a symbol.
    fn fetch_flow(&self, symbol: &str) -> Result<Option<Vec<RawFlowRow>>, DataError>;

    /// Symbols the provider knows about, if it can enumerate them.
    fn symbols(&self) -> Option<Vec<String>> {
        None
    }
}

impl<P: FeedProvider + ?Sized> FeedProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn calendar(&self) -> CalendarSystem {
        (**self).calendar()
    }

    fn fetch_history(&self, symbol: &str) -> Result<Option<Vec<RawHistoryRow>>, DataError> {
        (**self).fetch_history(symbol)
    }

    fn fetch_flow(&self, symbol: &str) -> Result<Option<Vec<RawFlowRow>>, DataError> {
        (**self).fetch_flow(symbol)
    }

    fn symbols(&self) -> Option<Vec<String>> {
        (**self).symbols()
    }
}
