//! Filename conventions for descriptor table files.
//!
//! Table directories mix WMO releases, older master snapshots and
//! centre-local files. Each convention is one [`TablePattern`]: a regex
//! over the filename plus a map saying which capture group carries which
//! field. [`TableScanner`] tries the built-in conventions in order and
//! accepts extra patterns compiled from a scan config.

use anyhow::{Context, Result, bail};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    B,
    D,
}

/// What a filename told us about the table file behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFileMeta {
    pub kind: TableKind,
    pub version: Option<u32>,
    pub center: Option<u32>,
    pub subcenter: Option<u32>,
    pub is_local: bool,
    pub filename: String,
}

/// Capture group indices for the fields a convention encodes. Group 0 is
/// the whole match; fields without a group stay `None` in the metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldMap {
    pub kind: usize,
    pub version: Option<usize>,
    pub center: Option<usize>,
    pub subcenter: Option<usize>,
    pub is_local: bool,
}

impl FieldMap {
    fn highest_group(&self) -> usize {
        [Some(self.kind), self.version, self.center, self.subcenter]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(0)
    }
}

/// One compiled filename convention.
#[derive(Debug)]
pub struct TablePattern {
    name: String,
    regex: Regex,
    glob: String,
    fields: FieldMap,
}

impl TablePattern {
    pub fn new(name: &str, pattern: &str, glob: &str, fields: FieldMap) -> Result<Self> {
        let regex = Regex::new(pattern)
            .with_context(|| format!("Pattern {:?} has an invalid regex", name))?;
        let highest = fields.highest_group();
        if highest >= regex.captures_len() {
            bail!(
                "Pattern {:?} maps capture group {} but the regex has only {}",
                name,
                highest,
                regex.captures_len() - 1
            );
        }
        Ok(TablePattern {
            name: name.to_string(),
            regex,
            glob: glob.to_string(),
            fields,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Glob narrowing the directory listing before the regex runs.
    pub fn file_glob(&self) -> &str {
        &self.glob
    }

    pub fn match_filename(&self, filename: &str) -> Option<TableFileMeta> {
        let caps = self.regex.captures(filename)?;
        let kind = match caps.get(self.fields.kind)?.as_str() {
            k if k.eq_ignore_ascii_case("b") => TableKind::B,
            k if k.eq_ignore_ascii_case("d") => TableKind::D,
            _ => return None,
        };
        let number = |group: Option<usize>| -> Option<u32> {
            caps.get(group?).and_then(|m| m.as_str().parse().ok())
        };

        Some(TableFileMeta {
            kind,
            version: number(self.fields.version),
            center: number(self.fields.center),
            subcenter: number(self.fields.subcenter),
            is_local: self.fields.is_local,
            filename: filename.to_string(),
        })
    }
}

/// Matches filenames against a prioritized list of conventions.
pub struct TableScanner {
    patterns: Vec<TablePattern>,
}

impl Default for TableScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl TableScanner {
    /// Scanner knowing the built-in conventions:
    /// `BUFR_TableB_en_29.csv` and `BUFRCREX_TableD_en_35.csv` (WMO
    /// releases), `bufrtabb_29.csv` (older master snapshots) and
    /// `localtabb_85_2.csv` (centre-local, subcentre then version).
    pub fn new() -> Self {
        let builtin = |name, pattern, glob, fields| {
            TablePattern::new(name, pattern, glob, fields).expect("builtin table pattern")
        };
        TableScanner {
            patterns: vec![
                builtin(
                    "WMO release",
                    r"^BUFR(?:CREX)?_Table([BD])_[a-z]{2}_(\d+)\.csv$",
                    "*Table[BD]_*.csv",
                    FieldMap {
                        kind: 1,
                        version: Some(2),
                        ..FieldMap::default()
                    },
                ),
                builtin(
                    "master snapshot",
                    r"^bufrtab([bd])_(\d+)\.csv$",
                    "bufrtab[bd]_*.csv",
                    FieldMap {
                        kind: 1,
                        version: Some(2),
                        ..FieldMap::default()
                    },
                ),
                builtin(
                    "centre-local",
                    r"^localtab([bd])_(\d+)_(\d+)\.csv$",
                    "localtab[bd]_*.csv",
                    FieldMap {
                        kind: 1,
                        subcenter: Some(2),
                        version: Some(3),
                        is_local: true,
                        ..FieldMap::default()
                    },
                ),
            ],
        }
    }

    pub fn push(&mut self, pattern: TablePattern) {
        self.patterns.push(pattern);
    }

    pub fn patterns(&self) -> &[TablePattern] {
        &self.patterns
    }

    pub fn match_filename(&self, filename: &str) -> Option<TableFileMeta> {
        self.patterns.iter().find_map(|p| p.match_filename(filename))
    }

    /// Walks `dir` with each pattern's glob and keeps every filename a
    /// pattern recognizes. A file reachable through several globs is
    /// reported once, for the first pattern claiming it.
    pub fn scan_directory<P: AsRef<Path>>(
        &self,
        dir: P,
        kind_filter: Option<TableKind>,
    ) -> Result<Vec<(PathBuf, TableFileMeta)>> {
        let dir = dir.as_ref();
        let mut found: BTreeMap<PathBuf, TableFileMeta> = BTreeMap::new();

        for pattern in &self.patterns {
            let glob_path = dir.join(pattern.file_glob());
            let glob_str = glob_path
                .to_str()
                .context("Table directory path is not valid UTF-8")?;

            for entry in glob::glob(glob_str).context("Bad file glob")? {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        log::warn!("Skipping unreadable table file: {}", e);
                        continue;
                    }
                };
                let Some(name) = path.file_name().and_then(|f| f.to_str()) else {
                    continue;
                };
                let Some(meta) = pattern.match_filename(name) else {
                    continue;
                };
                if kind_filter.is_some_and(|k| meta.kind != k) {
                    continue;
                }
                log::debug!("{} identified as {}", name, pattern.name());
                found.entry(path).or_insert(meta);
            }
        }

        Ok(found.into_iter().collect())
    }
}
