//! Report records for the TAC forms this crate assembles.
//!
//! Each record mirrors the section layout of its alphanumeric form:
//! named section sub-records whose fields start absent and are filled in
//! by descriptor-group handlers, plus a mask of which optional sections
//! got at least one write.

use bitflags::bitflags;
use serde::Serialize;
use std::fmt;

pub mod buoy;
pub mod climat;
pub mod synop;

pub use buoy::BuoyRecord;
pub use climat::ClimatRecord;
pub use synop::SynopRecord;

bitflags! {
    /// Optional TAC sections a handler has populated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SectionMask: u32 {
        const SEC1 = 1 << 0;
        const SEC2 = 1 << 1;
        const SEC3 = 1 << 2;
        const SEC4 = 1 << 3;
    }
}

impl fmt::Display for SectionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let mut first = true;
        for (n, bit) in [
            (1, SectionMask::SEC1),
            (2, SectionMask::SEC2),
            (3, SectionMask::SEC3),
            (4, SectionMask::SEC4),
        ] {
            if self.contains(bit) {
                if !first {
                    write!(f, " ")?;
                }
                write!(f, "{}", n)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Renders an optional report field, absent as a slash.
pub(crate) fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("/")
}

/// The report families a message can translate into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportKind {
    /// FM-12, surface observation from a land station.
    Synop,
    /// FM-18, observation from a drifting or moored buoy.
    Buoy,
    /// FM-71, monthly climatological summary from a land station.
    Climat,
}

impl ReportKind {
    /// Picks the report family from section 1 categories (BUFR Table A
    /// data category, common table C-13 international subcategory).
    /// Categories with no surface form here return `None`.
    pub fn from_category(category: u8, subcategory: Option<u8>) -> Option<ReportKind> {
        match category {
            0 if subcategory == Some(20) => Some(ReportKind::Climat),
            0 => Some(ReportKind::Synop),
            1 => Some(ReportKind::Buoy),
            _ => None,
        }
    }

    /// The token opening the alphanumeric form.
    pub fn token(&self) -> &'static str {
        match self {
            ReportKind::Synop => "AAXX",
            ReportKind::Buoy => "ZZYY",
            ReportKind::Climat => "CLIMAT",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::Synop => write!(f, "SYNOP"),
            ReportKind::Buoy => write!(f, "BUOY"),
            ReportKind::Climat => write!(f, "CLIMAT"),
        }
    }
}

/// One report under assembly or finished, tagged by family.
#[derive(Debug, Clone, Serialize)]
pub enum ReportRecord {
    Synop(SynopRecord),
    Buoy(BuoyRecord),
    Climat(ClimatRecord),
}

impl ReportRecord {
    /// A fresh record of the given family, every field absent.
    pub fn new(kind: ReportKind) -> Self {
        match kind {
            ReportKind::Synop => ReportRecord::Synop(SynopRecord::default()),
            ReportKind::Buoy => ReportRecord::Buoy(BuoyRecord::default()),
            ReportKind::Climat => ReportRecord::Climat(ClimatRecord::default()),
        }
    }

    pub fn kind(&self) -> ReportKind {
        match self {
            ReportRecord::Synop(_) => ReportKind::Synop,
            ReportRecord::Buoy(_) => ReportKind::Buoy,
            ReportRecord::Climat(_) => ReportKind::Climat,
        }
    }

    /// The form token, present once assembly has completed.
    pub fn header(&self) -> Option<&str> {
        match self {
            ReportRecord::Synop(r) => r.header.as_deref(),
            ReportRecord::Buoy(r) => r.header.as_deref(),
            ReportRecord::Climat(r) => r.header.as_deref(),
        }
    }

    pub(crate) fn stamp_header(&mut self) {
        let token = self.kind().token().to_string();
        match self {
            ReportRecord::Synop(r) => r.header = Some(token),
            ReportRecord::Buoy(r) => r.header = Some(token),
            ReportRecord::Climat(r) => r.header = Some(token),
        }
    }

    /// Which optional sections handlers have written to.
    pub fn sections(&self) -> SectionMask {
        match self {
            ReportRecord::Synop(r) => r.mask,
            ReportRecord::Buoy(r) => r.mask,
            ReportRecord::Climat(r) => r.mask,
        }
    }
}

impl fmt::Display for ReportRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportRecord::Synop(r) => r.fmt(f),
            ReportRecord::Buoy(r) => r.fmt(f),
            ReportRecord::Climat(r) => r.fmt(f),
        }
    }
}
