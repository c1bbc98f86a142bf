//! Column contracts for the persisted feature table and the raw feed exports.

use polars::prelude::*;

/// Columns of a persisted feature table, in file order.
pub const FEATURE_COLUMNS: [&str; 11] = [
    "date",
    "volume",
    "value",
    "close",
    "mean_value_20",
    "value_ratio_20",
    "buy_per_capita",
    "sell_per_capita",
    "individual_power",
    "individual_buy_percent",
    "individual_sell_percent",
];

/// Columns a raw history export must carry.
pub const HISTORY_COLUMNS: [&str; 4] = ["date", "volume", "value", "close"];

/// Columns a raw investor-flow (client types) export must carry.
pub const FLOW_COLUMNS: [&str; 7] = [
    "date",
    "individual_buy_count",
    "individual_buy_value",
    "individual_sell_count",
    "individual_sell_value",
    "corporate_buy_value",
    "corporate_sell_value",
];

/// Check that a raw export has every required column.
pub fn validate_columns(df: &DataFrame, required: &[&str]) -> Result<(), SchemaError> {
    let schema = df.schema();
    for name in required {
        if !schema.contains(name) {
            return Err(SchemaError::MissingColumn(name.to_string()));
        }
    }
    Ok(())
}

/// Check a persisted table header against [`FEATURE_COLUMNS`].
pub fn validate_feature_header<'a>(
    header: impl IntoIterator<Item = &'a str>,
) -> Result<(), SchemaError> {
    let actual: Vec<&str> = header.into_iter().collect();
    if actual != FEATURE_COLUMNS {
        return Err(SchemaError::HeaderMismatch {
            expected: FEATURE_COLUMNS.join(","),
            actual: actual.join(","),
        });
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Header mismatch: expected [{expected}], got [{actual}]")]
    HeaderMismatch { expected: String, actual: String },
}
