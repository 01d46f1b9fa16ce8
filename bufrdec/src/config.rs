//! Optional scan configuration: extra filename conventions for table
//! directories following a house naming scheme, read from TOML.
//!
//! ```toml
//! [[patterns]]
//! name = "ECMWF exports"
//! regex = '^ecmwf_table([bd])_v(\d+)\.csv$'
//! glob = "ecmwf_table*.csv"
//! kind_group = 1
//! version_group = 2
//! is_local = true
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::pattern::{FieldMap, TablePattern};

/// One extra filename convention. Group indices refer to the regex
/// captures; `kind_group` must capture a `b` or `d`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSpec {
    pub name: String,
    pub regex: String,
    pub glob: String,
    pub kind_group: usize,
    #[serde(default)]
    pub version_group: Option<usize>,
    #[serde(default)]
    pub center_group: Option<usize>,
    #[serde(default)]
    pub subcenter_group: Option<usize>,
    #[serde(default)]
    pub is_local: bool,
}

impl PatternSpec {
    pub fn compile(&self) -> Result<TablePattern> {
        let fields = FieldMap {
            kind: self.kind_group,
            version: self.version_group,
            center: self.center_group,
            subcenter: self.subcenter_group,
            is_local: self.is_local,
        };
        TablePattern::new(&self.name, &self.regex, &self.glob, fields)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub patterns: Vec<PatternSpec>,
}

impl ScanConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scan config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Bad scan config {}", path.display()))
    }

    /// Compiles every entry, failing on the first bad regex or group map.
    pub fn compile(&self) -> Result<Vec<TablePattern>> {
        self.patterns.iter().map(|spec| spec.compile()).collect()
    }
}
