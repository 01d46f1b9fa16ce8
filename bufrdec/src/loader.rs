//! Reads WMO-format CSV descriptor tables into a [`TableStore`].
//!
//! Table B files carry one element per row; Table D files carry one
//! sequence link per row, with consecutive rows sharing `FXY1` forming
//! one chain.

use anyhow::Context;
use csv::ReaderBuilder;
use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;
use std::fmt::Debug;
use std::fs;
use std::path::Path;

use crate::config::ScanConfig;
use crate::descriptor::Descriptor;
use crate::errors::{Error, Result};
use crate::pattern::{TableKind, TableScanner};
use crate::table_path::get_tables_base_path;
use crate::tables::{ElementEntry, SequenceEntry, TableStore};

/// Optional per-directory scan config, next to the tables it describes.
const SCAN_CONFIG_FILE: &str = "patterns.toml";

pub trait EntryLoader: Default {
    type RawEntry: for<'de> serde::Deserialize<'de> + Debug;
    type Output;

    fn process_entry(&mut self, raw: Self::RawEntry) -> anyhow::Result<Option<Self::Output>>;

    fn finish(&mut self) -> anyhow::Result<Option<Self::Output>> {
        Ok(None)
    }
}

pub fn load_entries<C: EntryLoader>(
    path: &Path,
    loader: &mut C,
) -> anyhow::Result<Vec<C::Output>> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read table file: {}", path.display()))?;
    // WMO publishes UTF-8, but centre-local tables are often Latin-1.
    let text: Cow<'_, str> = match std::str::from_utf8(&bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => {
            let (decoded, _, _) = WINDOWS_1252.decode(&bytes);
            Cow::Owned(decoded.into_owned())
        }
    };

    let mut entries = vec![];
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b',')
        .flexible(true) // Allow variable number of fields
        .from_reader(text.as_bytes());

    let mut line_num = 1; // Start at 1 for header
    for result in rdr.deserialize() {
        line_num += 1;
        match result {
            Ok(record) => {
                let record: C::RawEntry = record;
                if let Some(processed_entry) = loader.process_entry(record)? {
                    entries.push(processed_entry);
                }
            }
            Err(e) => {
                // Log the error but continue processing
                log::warn!("Skipping line {} in {}: {}", line_num, path.display(), e);
            }
        }
    }

    if let Some(processed_entry) = loader.finish()? {
        entries.push(processed_entry);
    }
    Ok(entries)
}

#[derive(Debug, serde::Deserialize)]
pub struct RawElementRow {
    #[serde(rename = "FXY")]
    pub fxy: String,
    #[serde(rename = "ElementName_en")]
    pub element_name_en: String,
    #[serde(rename = "BUFR_Unit")]
    pub bufr_unit: String,
    #[serde(rename = "BUFR_Scale")]
    pub bufr_scale: i32,
    #[serde(rename = "BUFR_ReferenceValue")]
    pub bufr_reference_value: i64,
    #[serde(rename = "BUFR_DataWidth_Bits")]
    pub bufr_datawidth_bits: u32,
    #[serde(rename = "Status")]
    pub status: Option<String>,
}

#[derive(Default)]
pub struct ElementCsvLoader;

impl EntryLoader for ElementCsvLoader {
    type RawEntry = RawElementRow;
    type Output = ElementEntry;

    fn process_entry(&mut self, raw: Self::RawEntry) -> anyhow::Result<Option<Self::Output>> {
        let descriptor = Descriptor::from_str(&raw.fxy)?;

        let entry = ElementEntry {
            descriptor,
            name: raw.element_name_en,
            unit: raw.bufr_unit,
            scale: raw.bufr_scale,
            reference: raw.bufr_reference_value,
            bits: raw.bufr_datawidth_bits,
        };

        Ok(Some(entry))
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct RawSequenceRow {
    #[serde(rename = "FXY1")]
    pub fxy1: String,
    #[serde(rename = "Title_en")]
    pub title_en: Option<String>,
    #[serde(rename = "FXY2")]
    pub fxy2: String,
    #[serde(rename = "Status")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SequenceCsvLoader {
    current_chain: Option<SequenceEntry>,
}

impl EntryLoader for SequenceCsvLoader {
    type RawEntry = RawSequenceRow;
    type Output = SequenceEntry;

    fn process_entry(&mut self, raw: Self::RawEntry) -> anyhow::Result<Option<Self::Output>> {
        let fxy = Descriptor::from_str(&raw.fxy1)?;
        let link = Descriptor::from_str(&raw.fxy2)?;

        let continues = self
            .current_chain
            .as_ref()
            .is_some_and(|chain| chain.descriptor == fxy);

        if continues {
            if let Some(chain) = self.current_chain.as_mut() {
                chain.chain.push(link);
            }
            return Ok(None);
        }

        // A new FXY1 closes the previous chain.
        let finished = self.current_chain.take();
        self.current_chain = Some(SequenceEntry {
            descriptor: fxy,
            title: raw.title_en,
            chain: vec![link],
        });
        Ok(finished)
    }

    fn finish(&mut self) -> anyhow::Result<Option<Self::Output>> {
        Ok(self.current_chain.take())
    }
}

pub fn load_elements_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<ElementEntry>> {
    let mut loader = ElementCsvLoader;
    load_entries(path.as_ref(), &mut loader)
}

pub fn load_sequences_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<SequenceEntry>> {
    let mut loader = SequenceCsvLoader::default();
    load_entries(path.as_ref(), &mut loader)
}

/// Loads the master B and D tables of exactly the given version from the
/// configured base directory. Fails if no Table B file of that version is
/// found; version fallback is the caller's business.
pub fn load_master_tables(version: u8) -> Result<TableStore> {
    load_master_tables_from(&get_tables_base_path(), version)
}

/// Built-in filename conventions plus any `patterns.toml` sitting in the
/// table directory. A broken config is skipped with a warning rather
/// than blocking the load.
fn scanner_for(dir: &Path) -> TableScanner {
    let mut scanner = TableScanner::new();
    let config_path = dir.join(SCAN_CONFIG_FILE);
    if config_path.is_file() {
        match ScanConfig::load(&config_path).and_then(|c| c.compile()) {
            Ok(patterns) => {
                for pattern in patterns {
                    scanner.push(pattern);
                }
            }
            Err(e) => log::warn!("Ignoring {}: {:#}", config_path.display(), e),
        }
    }
    scanner
}

pub fn load_master_tables_from<P: AsRef<Path>>(dir: P, version: u8) -> Result<TableStore> {
    let dir = dir.as_ref();
    let scanner = scanner_for(dir);
    let files = scanner.scan_directory(dir, None)?;

    let mut store = TableStore::new();
    let mut found_b = false;

    for (path, meta) in &files {
        if meta.is_local || meta.version != Some(version as u32) {
            continue;
        }
        match meta.kind {
            TableKind::B => {
                for entry in load_elements_csv(path)? {
                    store.insert_element(entry);
                }
                found_b = true;
            }
            TableKind::D => {
                for entry in load_sequences_csv(path)? {
                    store.insert_sequence(entry);
                }
            }
        }
    }

    if !found_b {
        return Err(Error::TableNotFoundEmpty);
    }
    Ok(store)
}

/// Loads centre-local tables matching the given centre/subcentre and local
/// version. Files that name no centre or subcentre match any.
pub fn load_local_tables(center: u16, subcenter: u16, version: u8) -> Result<TableStore> {
    load_local_tables_from(&get_tables_base_path(), center, subcenter, version)
}

pub fn load_local_tables_from<P: AsRef<Path>>(
    dir: P,
    center: u16,
    subcenter: u16,
    version: u8,
) -> Result<TableStore> {
    let dir = dir.as_ref();
    let scanner = scanner_for(dir);
    let files = scanner.scan_directory(dir, None)?;

    let mut store = TableStore::new();
    let mut found = false;

    for (path, meta) in &files {
        if !meta.is_local || meta.version != Some(version as u32) {
            continue;
        }
        if meta.center.is_some_and(|c| c != center as u32) {
            continue;
        }
        if meta.subcenter.is_some_and(|sc| sc != subcenter as u32) {
            continue;
        }
        match meta.kind {
            TableKind::B => {
                for entry in load_elements_csv(path)? {
                    store.insert_element(entry);
                }
            }
            TableKind::D => {
                for entry in load_sequences_csv(path)? {
                    store.insert_sequence(entry);
                }
            }
        }
        found = true;
    }

    if !found {
        return Err(Error::TableNotFoundEmpty);
    }
    Ok(store)
}
