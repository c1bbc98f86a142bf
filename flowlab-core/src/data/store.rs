//! Flat per-symbol feature store.
//!
//! Layout: `{cache_dir}/{encoded_symbol}.csv` plus `{encoded_symbol}.meta.json`
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Integrity validation on load (header check, ordered unique dates)
//! - Quarantine for corrupt files ({filename}.quarantined)
//! - Metadata sidecar per symbol (hash, date range, row count)

use super::provider::DataError;
use super::schema::{validate_feature_header, FEATURE_COLUMNS};
use crate::domain::{CacheEntry, FeatureRow, FeatureTable};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Metadata sidecar for a stored symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub symbol: String,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub row_count: usize,
    pub data_hash: String,
    pub cached_at: chrono::NaiveDateTime,
}

/// The per-symbol feature store.
#[derive(Debug, Clone)]
pub struct FeatureStore {
    cache_dir: PathBuf,
}

impl FeatureStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Root directory of the store.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path to the table file: `{cache_dir}/{encoded_symbol}.csv`
    pub fn table_path(&self, symbol: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.csv", encode_symbol(symbol)))
    }

    /// Path to the metadata sidecar for a symbol.
    fn meta_path(&self, symbol: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.meta.json", encode_symbol(symbol)))
    }

    /// Persist a symbol's table, replacing whatever was stored.
    ///
    /// The table file is written to a temp path and renamed into place.
    pub fn write(&self, table: &FeatureTable) -> Result<StoreMeta, DataError> {
        fs::create_dir_all(&self.cache_dir)?;

        let bytes = table_to_csv(table)?;
        let path = self.table_path(&table.symbol);
        let tmp_path = path.with_extension("csv.tmp");
        fs::write(&tmp_path, &bytes)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            // Clean up temp file on rename failure
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })?;

        let meta = StoreMeta {
            symbol: table.symbol.clone(),
            first_date: table.first_date(),
            last_date: table.last_date(),
            row_count: table.len(),
            data_hash: blake3::hash(&bytes).to_hex().to_string(),
            cached_at: chrono::Local::now().naive_local(),
        };
        // The table is already in place; a missing sidecar only hides it from status.
        if let Err(e) = self.write_meta(&meta) {
            warn!(symbol = %table.symbol, error = %e, "failed to write cache metadata");
        }

        debug!(symbol = %table.symbol, rows = table.len(), path = %path.display(), "stored feature table");
        Ok(meta)
    }

    fn write_meta(&self, meta: &StoreMeta) -> Result<(), DataError> {
        let meta_json = serde_json::to_string_pretty(meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        let meta_path = self.meta_path(&meta.symbol);
        let meta_tmp = meta_path.with_extension("json.tmp");
        fs::write(&meta_tmp, meta_json)?;
        fs::rename(&meta_tmp, &meta_path).map_err(|e| {
            let _ = fs::remove_file(&meta_tmp);
            DataError::Io(e)
        })
    }

    /// Load a symbol's persisted entry.
    ///
    /// `Ok(None)` when nothing is stored. A file that fails validation is
    /// quarantined and reported as `Ok(None)` so the caller re-derives it.
    pub fn load(&self, symbol: &str) -> Result<Option<CacheEntry>, DataError> {
        let path = self.table_path(symbol);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)?;
        match csv_to_table(symbol, &bytes) {
            Ok(table) => Ok(Some(CacheEntry::new(table))),
            Err(e) => {
                let quarantine = path.with_extension("csv.quarantined");
                warn!(
                    path = %path.display(),
                    error = %e,
                    "quarantining corrupt cache file"
                );
                if let Err(e) = fs::rename(&path, &quarantine) {
                    warn!(path = %path.display(), error = %e, "failed to quarantine cache file");
                }
                match fs::remove_file(self.meta_path(symbol)) {
                    Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                        warn!(symbol, error = %e, "failed to remove cache metadata");
                    }
                    _ => {}
                }
                Ok(None)
            }
        }
    }

    /// Metadata for a stored symbol, if any.
    pub fn get_meta(&self, symbol: &str) -> Option<StoreMeta> {
        let content = fs::read_to_string(self.meta_path(symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Metadata for every stored symbol, sorted by symbol.
    pub fn status(&self) -> Result<Vec<StoreMeta>, DataError> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }

        let mut metas = Vec::new();
        for entry in fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(encoded) = name.strip_suffix(".meta.json") else {
                continue;
            };
            let Some(symbol) = decode_symbol(encoded) else {
                continue;
            };
            if let Some(meta) = self.get_meta(&symbol) {
                metas.push(meta);
            }
        }
        metas.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(metas)
    }
}

// ── Symbol encoding ─────────────────────────────────────────────────

/// Filesystem-safe file stem for a symbol.
///
/// Unicode alphanumerics (so native-script names stay readable), `-` and `_`
/// pass through; every other UTF-8 byte becomes `%XX`.
pub fn encode_symbol(symbol: &str) -> String {
    let mut out = String::with_capacity(symbol.len());
    for c in symbol.chars() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{b:02X}"));
            }
        }
    }
    out
}

/// Inverse of [`encode_symbol`]. `None` if the escapes are malformed.
pub fn decode_symbol(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

// ── CSV helpers ─────────────────────────────────────────────────────

fn fmt_cell(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn table_to_csv(table: &FeatureTable) -> Result<Vec<u8>, DataError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(FEATURE_COLUMNS)?;
    for row in &table.rows {
        writer.write_record([
            row.date.format(DATE_FORMAT).to_string(),
            fmt_cell(row.volume),
            fmt_cell(row.value),
            fmt_cell(row.close),
            fmt_cell(row.mean_value_20),
            fmt_cell(row.value_ratio_20),
            fmt_cell(row.buy_per_capita),
            fmt_cell(row.sell_per_capita),
            fmt_cell(row.individual_power),
            fmt_cell(row.individual_buy_percent),
            fmt_cell(row.individual_sell_percent),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| DataError::CacheError(format!("csv flush: {e}")))
}

/// Write a table as CSV in the persisted layout.
pub fn write_csv<W: std::io::Write>(table: &FeatureTable, mut out: W) -> Result<(), DataError> {
    out.write_all(&table_to_csv(table)?)?;
    Ok(())
}

fn csv_to_table(symbol: &str, bytes: &[u8]) -> Result<FeatureTable, DataError> {
    let corrupt = |reason: String| DataError::Corrupt {
        path: symbol.to_string(),
        reason,
    };

    let mut reader = csv::Reader::from_reader(bytes);
    let header = reader.headers()?.clone();
    validate_feature_header(header.iter()).map_err(|e| corrupt(e.to_string()))?;

    let mut rows: Vec<FeatureRow> = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let cell = |idx: usize| -> Result<Option<f64>, DataError> {
            let raw = record.get(idx).unwrap_or_default().trim();
            if raw.is_empty() {
                return Ok(None);
            }
            raw.parse::<f64>()
                .map(Some)
                .map_err(|_| corrupt(format!("row {i}: bad number '{raw}' in {}", FEATURE_COLUMNS[idx])))
        };

        let raw_date = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT)
            .map_err(|_| corrupt(format!("row {i}: bad date '{raw_date}'")))?;
        if rows.last().is_some_and(|prev| prev.date >= date) {
            return Err(corrupt(format!("row {i}: dates not strictly increasing")));
        }

        rows.push(FeatureRow {
            date,
            volume: cell(1)?,
            value: cell(2)?,
            close: cell(3)?,
            mean_value_20: cell(4)?,
            value_ratio_20: cell(5)?,
            buy_per_capita: cell(6)?,
            sell_per_capita: cell(7)?,
            individual_power: cell(8)?,
            individual_buy_percent: cell(9)?,
            individual_sell_percent: cell(10)?,
        });
    }

    Ok(FeatureTable::new(symbol, rows))
}
