//! Translation of decoded BUFR subsets into surface-observation report
//! records (SYNOP, BUOY, CLIMAT), one report per subset.

pub mod dispatch;
pub mod errors;
pub mod records;
pub mod state;
pub mod translate;
mod x02;

pub use crate::dispatch::Dispatcher;
pub use crate::errors::{Error, Result};
pub use crate::records::{ReportKind, ReportRecord};
pub use crate::state::{StatusFlags, SubsetState};
pub use crate::translate::{Assembler, Phase};
