//! Raw feeds, alignment, and the persisted feature store.

pub mod align;
pub mod file_feed;
pub mod memory;
pub mod provider;
pub mod schema;
pub mod store;
pub mod synthetic;
pub mod universe;

pub use align::{align, AlignError, AlignReport, AlignedRow, AlignedTable};
pub use file_feed::FileFeedProvider;
pub use memory::MemoryProvider;
pub use provider::{DataError, FeedProvider, RawFlowRow, RawHistoryRow};
pub use schema::{SchemaError, FEATURE_COLUMNS, FLOW_COLUMNS, HISTORY_COLUMNS};
pub use store::{decode_symbol, encode_symbol, FeatureStore, StoreMeta};
pub use synthetic::SyntheticProvider;
pub use universe::{Universe, UniverseError};
