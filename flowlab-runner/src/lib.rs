//! FlowLab Runner: range cache, collection pipeline, indicators.
//!
//! This crate builds on `flowlab-core` to provide:
//! - A date-range-aware cache over the per-symbol feature store
//! - Pluggable refresh strategies (full replace, append tail)
//! - Single-symbol and batch collection with progress and cancellation
//! - The individual-power pile indicator
//! - TOML configuration

pub mod config;
pub mod indicator;
pub mod pipeline;
pub mod range_cache;

pub use config::{ConfigError, FlowlabConfig};
pub use indicator::{IndicatorError, Pile, PilePoint};
pub use pipeline::{BatchProgress, BatchReport, LogProgress, Pipeline};
pub use range_cache::{
    AppendTail, CollectError, EndDate, RangeCache, RefreshMode, RefreshStrategy, Replace,
};
