//! Domain types for flowlab

pub mod feature;
pub mod rows;

pub use feature::{CacheEntry, FeatureRow, FeatureTable};
pub use rows::{FlowRow, HistoryRow};
