use crate::descriptor::Descriptor;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementEntry {
    pub descriptor: Descriptor,
    pub name: String,
    pub unit: String,
    pub scale: i32,
    pub reference: i64,
    pub bits: u32,
}

impl ElementEntry {
    /// Unit spellings vary between WMO and centre-local tables, so the
    /// classifiers ignore case and spacing.
    pub fn is_string(&self) -> bool {
        let unit = self.unit.trim();
        unit.eq_ignore_ascii_case("CCITT IA5") || unit.eq_ignore_ascii_case("CCITTIA5")
    }

    pub fn is_code_table(&self) -> bool {
        self.unit.trim().eq_ignore_ascii_case("code table")
    }

    pub fn is_flag_table(&self) -> bool {
        self.unit.trim().eq_ignore_ascii_case("flag table")
    }
}

impl Display for ElementEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = if self.name.len() > 40 {
            format!("{}...", &self.name[..37])
        } else {
            self.name.clone()
        };

        let unit = if self.unit.len() > 15 {
            format!("{}...", &self.unit[..12])
        } else {
            self.unit.clone()
        };

        write!(
            f,
            "{} | {:<40} | {:<15} | {:>5} | {:>8} | {:>8}",
            self.descriptor, name, unit, self.scale, self.reference, self.bits
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceEntry {
    pub descriptor: Descriptor,
    pub title: Option<String>,
    pub chain: Vec<Descriptor>,
}

impl Display for SequenceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | {:<40} | {} descriptors",
            self.descriptor,
            self.title.as_deref().unwrap_or(""),
            self.chain.len()
        )
    }
}

/// One message's view of Table B and Table D, master and local entries
/// merged. Lookups never touch the filesystem.
#[derive(Debug, Clone, Default)]
pub struct TableStore {
    b: FxHashMap<Descriptor, ElementEntry>,
    d: FxHashMap<Descriptor, SequenceEntry>,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_element(&mut self, entry: ElementEntry) {
        self.b.insert(entry.descriptor, entry);
    }

    pub fn insert_sequence(&mut self, entry: SequenceEntry) {
        self.d.insert(entry.descriptor, entry);
    }

    pub fn lookup_element(&self, descriptor: &Descriptor) -> Option<&ElementEntry> {
        self.b.get(descriptor)
    }

    pub fn lookup_sequence(&self, descriptor: &Descriptor) -> Option<&SequenceEntry> {
        self.d.get(descriptor)
    }

    /// Overlays `other` onto this store. Local tables win over master
    /// entries with the same descriptor.
    pub fn absorb(&mut self, other: TableStore) {
        self.b.extend(other.b);
        self.d.extend(other.d);
    }

    pub fn element_count(&self) -> usize {
        self.b.len()
    }

    pub fn sequence_count(&self) -> usize {
        self.d.len()
    }

    pub fn is_empty(&self) -> bool {
        self.b.is_empty() && self.d.is_empty()
    }
}
