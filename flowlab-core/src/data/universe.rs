//! Universe configuration: symbol lists grouped by market sector.
//!
//! Stored as TOML with one array of native-script symbols per group:
//!
//! ```toml
//! [groups]
//! Banks = ["وبملت", "وتجارت"]
//! Metals = ["فولاد", "فملی"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse universe TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize universe: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// The complete universe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Universe {
    pub groups: BTreeMap<String, Vec<String>>,
}

impl Universe {
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path).map_err(|source| UniverseError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, UniverseError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Every symbol across all groups, deduplicated, in first-seen order.
    pub fn all_symbols(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.groups
            .values()
            .flatten()
            .filter(|s| seen.insert(s.as_str()))
            .cloned()
            .collect()
    }

    pub fn group_symbols(&self, group: &str) -> Option<&[String]> {
        self.groups.get(group).map(|v| v.as_slice())
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(|s| s.as_str()).collect()
    }

    pub fn symbol_count(&self) -> usize {
        self.all_symbols().len()
    }

    /// A small default list of liquid TSE names.
    pub fn default_tse() -> Self {
        let group = |symbols: &[&str]| symbols.iter().map(|s| s.to_string()).collect();

        let mut groups = BTreeMap::new();
        groups.insert("Automotive".into(), group(&["خودرو", "خساپا"]));
        groups.insert("Banks".into(), group(&["وبملت", "وتجارت", "وبصادر"]));
        groups.insert("Holdings".into(), group(&["شستا", "وغدیر"]));
        groups.insert("Metals".into(), group(&["فولاد", "فملی", "کاوه"]));
        groups.insert("Petrochemicals".into(), group(&["شپنا", "شبندر", "پارس"]));

        Self { groups }
    }
}
