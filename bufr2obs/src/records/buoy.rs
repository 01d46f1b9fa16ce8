use serde::Serialize;
use std::fmt;

use super::{SectionMask, field};

/// FM-18 section 0, the header groups.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BuoySec0 {
    /// Wind indicator iw: instrument source and speed units.
    pub iw: Option<String>,
}

/// FM-18 section 3, temperature, salinity and current measurements.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BuoySec3 {
    /// k2, method of salinity/depth measurement.
    pub k2: Option<String>,
    /// k3, duration and time of current measurement.
    pub k3: Option<String>,
    /// k6, method of removing platform motion from current.
    pub k6: Option<String>,
}

/// A report from a drifting or moored buoy.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BuoyRecord {
    /// Form token, stamped when assembly completes.
    pub header: Option<String>,
    #[serde(skip)]
    pub mask: SectionMask,
    pub s0: BuoySec0,
    pub s3: BuoySec3,
}

impl fmt::Display for BuoyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BUOY report ({}):", field(&self.header))?;
        writeln!(f, "  iw (wind indicator):       {}", field(&self.s0.iw))?;
        writeln!(f, "  k2 (salinity method):      {}", field(&self.s3.k2))?;
        writeln!(f, "  k3 (current measurement):  {}", field(&self.s3.k3))?;
        writeln!(f, "  k6 (platform motion):      {}", field(&self.s3.k6))?;
        write!(f, "  Sections present:          {}", self.mask)
    }
}
