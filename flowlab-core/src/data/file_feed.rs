//! Provider over exported feed files.
//!
//! Layout: `{feed_dir}/{encoded_symbol}/history.csv` and
//! `{feed_dir}/{encoded_symbol}/client_types.csv`. Either file may be missing;
//! a missing file is an absent feed, not an error.
//!
//! All columns are read as strings so flow cells keep their expression text.

use super::provider::{DataError, FeedProvider, RawFlowRow, RawHistoryRow};
use super::schema::{validate_columns, FLOW_COLUMNS, HISTORY_COLUMNS};
use super::store::{decode_symbol, encode_symbol};
use crate::calendar::CalendarSystem;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const HISTORY_FILE: &str = "history.csv";
pub const FLOW_FILE: &str = "client_types.csv";

pub struct FileFeedProvider {
    feed_dir: PathBuf,
    calendar: CalendarSystem,
}

impl FileFeedProvider {
    pub fn new(feed_dir: impl Into<PathBuf>, calendar: CalendarSystem) -> Self {
        Self {
            feed_dir: feed_dir.into(),
            calendar,
        }
    }

    pub fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.feed_dir.join(encode_symbol(symbol))
    }

    fn read_strings(&self, symbol: &str, path: &Path, required: &[&str]) -> Result<Option<DataFrame>, DataError> {
        if !path.exists() {
            debug!(symbol, path = %path.display(), "feed file absent");
            return Ok(None);
        }

        let df = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()
            .and_then(|lf| lf.collect())
            .map_err(|e| DataError::Polars(format!("{}: {e}", path.display())))?;

        validate_columns(&df, required).map_err(|e| DataError::Provider {
            symbol: symbol.to_string(),
            reason: format!("{}: {e}", path.display()),
        })?;
        Ok(Some(df))
    }
}

impl FeedProvider for FileFeedProvider {
    fn name(&self) -> &str {
        "file"
    }

    fn calendar(&self) -> CalendarSystem {
        self.calendar
    }

    fn fetch_history(&self, symbol: &str) -> Result<Option<Vec<RawHistoryRow>>, DataError> {
        let path = self.symbol_dir(symbol).join(HISTORY_FILE);
        let Some(df) = self.read_strings(symbol, &path, &HISTORY_COLUMNS)? else {
            return Ok(None);
        };

        let dates = string_column(&df, "date")?;
        let volume = float_column(&df, "volume")?;
        let value = float_column(&df, "value")?;
        let close = float_column(&df, "close")?;

        let rows = (0..df.height())
            .map(|i| RawHistoryRow {
                date: dates.get(i).map(str::to_string),
                volume: volume.get(i),
                value: value.get(i),
                close: close.get(i),
            })
            .collect();
        Ok(Some(rows))
    }

    fn fetch_flow(&self, symbol: &str) -> Result<Option<Vec<RawFlowRow>>, DataError> {
        let path = self.symbol_dir(symbol).join(FLOW_FILE);
        let Some(df) = self.read_strings(symbol, &path, &FLOW_COLUMNS)? else {
            return Ok(None);
        };

        let cols = FLOW_COLUMNS
            .iter()
            .map(|name| string_column(&df, name))
            .collect::<Result<Vec<_>, _>>()?;
        let cell = |col: usize, i: usize| cols[col].get(i).map(str::to_string);

        let rows = (0..df.height())
            .map(|i| RawFlowRow {
                date: cell(0, i),
                individual_buy_count: cell(1, i),
                individual_buy_value: cell(2, i),
                individual_sell_count: cell(3, i),
                individual_sell_value: cell(4, i),
                corporate_buy_value: cell(5, i),
                corporate_sell_value: cell(6, i),
            })
            .collect();
        Ok(Some(rows))
    }

    fn symbols(&self) -> Option<Vec<String>> {
        let entries = std::fs::read_dir(&self.feed_dir).ok()?;
        let mut symbols: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().and_then(decode_symbol))
            .collect();
        symbols.sort();
        Some(symbols)
    }
}

fn string_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a StringChunked, DataError> {
    df.column(name)
        .and_then(|c| c.str())
        .map_err(|e| DataError::Polars(format!("{name} column: {e}")))
}

/// Non-strict cast: unparseable cells become null.
fn float_column(df: &DataFrame, name: &str) -> Result<Float64Chunked, DataError> {
    let map_err = |e: PolarsError| DataError::Polars(format!("{name} column: {e}"));
    let cast = df
        .column(name)
        .and_then(|c| c.cast(&DataType::Float64))
        .map_err(map_err)?;
    cast.f64().cloned().map_err(map_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_feed(dir: &Path, symbol: &str, history: Option<&str>, flow: Option<&str>) {
        let sym_dir = dir.join(encode_symbol(symbol));
        fs::create_dir_all(&sym_dir).unwrap();
        if let Some(h) = history {
            fs::write(sym_dir.join(HISTORY_FILE), h).unwrap();
        }
        if let Some(f) = flow {
            fs::write(sym_dir.join(FLOW_FILE), f).unwrap();
        }
    }

    const FLOW_HEADER: &str = "date,individual_buy_count,individual_buy_value,individual_sell_count,\
                               individual_sell_value,corporate_buy_value,corporate_sell_value\n";

    #[test]
    fn reads_history_with_bad_numbers_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        write_feed(
            dir.path(),
            "فولاد",
            Some("date,volume,value,close\n1400-01-05,100,2000,20\n1400-01-06,x,3000,\n"),
            None,
        );

        let provider = FileFeedProvider::new(dir.path(), CalendarSystem::Jalali);
        let rows = provider.fetch_history("فولاد").unwrap().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date.as_deref(), Some("1400-01-05"));
        assert_eq!(rows[0].value, Some(2000.0));
        assert_eq!(rows[1].volume, None);
        assert_eq!(rows[1].close, None);

        assert!(provider.fetch_flow("فولاد").unwrap().is_none());
    }

    #[test]
    fn flow_cells_keep_expression_text() {
        let dir = tempfile::tempdir().unwrap();
        let flow = format!("{FLOW_HEADER}2021-01-02,10,\"1,000+500\",5,2000,0,0\n");
        write_feed(dir.path(), "X", None, Some(&flow));

        let provider = FileFeedProvider::new(dir.path(), CalendarSystem::Gregorian);
        let rows = provider.fetch_flow("X").unwrap().unwrap();
        assert_eq!(rows[0].individual_buy_value.as_deref(), Some("1,000+500"));
        assert_eq!(rows[0].individual_buy_count.as_deref(), Some("10"));
        assert!(provider.fetch_history("X").unwrap().is_none());
    }

    #[test]
    fn missing_column_is_provider_error() {
        let dir = tempfile::tempdir().unwrap();
        write_feed(dir.path(), "X", Some("date,close\n2021-01-02,3\n"), None);
        let provider = FileFeedProvider::new(dir.path(), CalendarSystem::Gregorian);
        assert!(matches!(
            provider.fetch_history("X"),
            Err(DataError::Provider { .. })
        ));
    }

    #[test]
    fn unknown_symbol_has_no_feeds() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileFeedProvider::new(dir.path(), CalendarSystem::Gregorian);
        assert!(provider.fetch_history("NOPE").unwrap().is_none());
        assert!(provider.fetch_flow("NOPE").unwrap().is_none());
    }

    #[test]
    fn lists_symbol_directories() {
        let dir = tempfile::tempdir().unwrap();
        write_feed(dir.path(), "B/2", Some("date,volume,value,close\n"), None);
        write_feed(dir.path(), "A", None, None);
        fs::write(dir.path().join("stray.txt"), "").unwrap();

        let provider = FileFeedProvider::new(dir.path(), CalendarSystem::Gregorian);
        assert_eq!(provider.symbols().unwrap(), vec!["A", "B/2"]);
    }
}
