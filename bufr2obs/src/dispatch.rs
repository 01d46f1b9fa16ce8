//! Routing from decoded atoms to descriptor-group handlers.
//!
//! One registry keyed by descriptor group (X); each registered group owns
//! a handler that matches on the element (Y) and on the report family.
//! Groups and elements without a handler are deliberate no-ops, so
//! messages full of unimplemented descriptors still translate whatever
//! the registered groups understand.

use rustc_hash::FxHashMap;

use bufrdec::Atom;

use crate::errors::Result;
use crate::records::ReportRecord;
use crate::state::SubsetState;
use crate::x02;

/// A group handler: one atom, the subset state, the record under
/// assembly. Writes record fields, sets status bits, or both. The only
/// failure is [`Error::RecordRequired`](crate::errors::Error) when a
/// record is structurally required but absent.
pub type GroupHandler =
    fn(&Atom, &mut SubsetState, Option<&mut ReportRecord>) -> Result<()>;

pub struct Dispatcher {
    groups: FxHashMap<u8, GroupHandler>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Builds the registry with every implemented descriptor group.
    pub fn new() -> Self {
        let mut groups: FxHashMap<u8, GroupHandler> = FxHashMap::default();
        groups.insert(2, x02::dispatch as GroupHandler);
        Dispatcher { groups }
    }

    /// Routes one atom. Unknown groups succeed without side effects.
    pub fn dispatch(
        &self,
        atom: &Atom,
        state: &mut SubsetState,
        record: Option<&mut ReportRecord>,
    ) -> Result<()> {
        // Only element descriptors route by class; 2 05 literal atoms
        // keep their operator code.
        if atom.desc.f != 0 {
            return Ok(());
        }
        state.ival = atom.ival;
        match self.groups.get(&atom.desc.x) {
            Some(run) => run(atom, state, record),
            None => Ok(()),
        }
    }
}
