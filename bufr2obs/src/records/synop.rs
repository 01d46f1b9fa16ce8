use serde::Serialize;
use std::fmt;

use super::{SectionMask, field};

/// FM-12 section 0, the header groups.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SynopSec0 {
    /// Wind indicator iw: instrument source and speed units.
    pub iw: Option<String>,
}

/// FM-12 section 1, the land-station body.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SynopSec1 {
    /// Station-operation indicator ix.
    pub ix: Option<String>,
}

/// A surface synoptic report from a land station.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SynopRecord {
    /// Form token, stamped when assembly completes.
    pub header: Option<String>,
    #[serde(skip)]
    pub mask: SectionMask,
    pub s0: SynopSec0,
    pub s1: SynopSec1,
}

impl fmt::Display for SynopRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SYNOP report ({}):", field(&self.header))?;
        writeln!(f, "  iw (wind indicator):       {}", field(&self.s0.iw))?;
        writeln!(f, "  ix (station operation):    {}", field(&self.s1.ix))?;
        write!(f, "  Sections present:          {}", self.mask)
    }
}
