//! FlowLab Core: calendar normalization, raw feed alignment, investor-flow
//! feature derivation, and the per-symbol feature store.
//!
//! This crate holds everything that is a pure function of the raw feeds:
//! - Domain types (raw rows, feature rows, feature tables, cache entries)
//! - Calendar conversion onto canonical Gregorian dates
//! - A safe arithmetic evaluator for flow cells
//! - History/flow outer-join alignment
//! - Feature derivation (rolling value mean, per-capita, power, shares)
//! - Feed providers (files, synthetic, in-memory) and the on-disk store

pub mod calendar;
pub mod data;
pub mod domain;
pub mod expr;
pub mod features;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared with the batch worker pool are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::FeatureRow>();
        require_sync::<domain::FeatureRow>();
        require_send::<domain::FeatureTable>();
        require_sync::<domain::FeatureTable>();
        require_send::<domain::CacheEntry>();
        require_sync::<domain::CacheEntry>();

        // Providers
        require_send::<data::FileFeedProvider>();
        require_sync::<data::FileFeedProvider>();
        require_send::<data::SyntheticProvider>();
        require_sync::<data::SyntheticProvider>();
        require_send::<data::MemoryProvider>();
        require_sync::<data::MemoryProvider>();

        // Store and errors
        require_send::<data::FeatureStore>();
        require_sync::<data::FeatureStore>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();
    }

    /// Derivation is a pure function of the aligned feeds.
    #[test]
    fn derive_takes_no_provider_or_store() {
        fn _check_signature(aligned: &data::AlignedTable) -> domain::FeatureTable {
            features::derive("X", aligned)
        }
    }
}
