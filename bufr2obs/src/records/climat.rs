use serde::Serialize;
use std::fmt;

use super::{SectionMask, field};

/// A monthly climatological summary. Group handlers so far only feed the
/// subset state for this family; the record carries the form framing.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ClimatRecord {
    /// Form token, stamped when assembly completes.
    pub header: Option<String>,
    #[serde(skip)]
    pub mask: SectionMask,
}

impl fmt::Display for ClimatRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CLIMAT report ({}):", field(&self.header))?;
        write!(f, "  Sections present:          {}", self.mask)
    }
}
