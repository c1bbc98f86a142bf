//! Serializable collector configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file)
//! yields a working configuration:
//!
//! ```toml
//! cache_dir = "data/features"
//! default_start = "1400-01-01"
//! calendar = "jalali"
//! pile_window = 14
//! parallel = false
//! refresh = "replace"
//! ```

use crate::range_cache::RefreshMode;
use flowlab_core::calendar::{self, CalendarSystem};
use flowlab_core::features::DEFAULT_PILE_WINDOW;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlowlabConfig {
    /// Directory holding `{symbol}.csv` feature tables and their sidecars.
    pub cache_dir: PathBuf,

    /// Start date used when a request gives none, written in `calendar`.
    pub default_start: String,

    /// Calendar that request dates (`default_start`, CLI `--start`/`--end`) use.
    pub calendar: CalendarSystem,

    /// Trailing rows in the individual-power pile.
    pub pile_window: usize,

    /// Fan batch collection out over the rayon pool.
    pub parallel: bool,

    pub refresh: RefreshMode,
}

impl Default for FlowlabConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("data/features"),
            default_start: "1400-01-01".into(),
            calendar: CalendarSystem::Jalali,
            pile_window: DEFAULT_PILE_WINDOW,
            parallel: false,
            refresh: RefreshMode::Replace,
        }
    }
}

impl FlowlabConfig {
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Load `path` if given, else the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pile_window == 0 {
            return Err(ConfigError::Invalid("pile_window must be >= 1".into()));
        }
        calendar::to_canonical(&self.default_start, self.calendar).map_err(|e| {
            ConfigError::Invalid(format!("default_start: {e}"))
        })?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
