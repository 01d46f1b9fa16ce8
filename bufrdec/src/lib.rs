pub mod bitmap;
pub mod bits;
pub mod block;
pub mod compressed;
pub mod config;
pub mod decoder;
pub mod descriptor;
pub mod errors;
pub mod loader;
pub mod parser;
pub mod pattern;
pub mod scratch;
pub mod sections;
pub mod subset;
pub mod table_path;
pub mod tables;
#[doc(hidden)]
pub mod test_support;
pub mod tree;

pub use crate::decoder::{Decoder, ErrorSlot};
pub use crate::descriptor::Descriptor;
pub use crate::errors::{Error, Result};
pub use crate::parser::*;
pub use crate::subset::{Atom, SubsetSequence};
pub use crate::table_path::{get_tables_base_path, set_tables_base_path};
