//! Assembly of one report per subset.
//!
//! Atoms are fed strictly in the order the decoder stored them; nothing
//! is revisited. Completing a report stamps its form token but emits
//! nothing, the caller retrieves the record when it wants it.

use bufrdec::{Atom, ErrorSlot, SubsetSequence};

use crate::dispatch::Dispatcher;
use crate::errors::Result;
use crate::records::{ReportKind, ReportRecord};
use crate::state::SubsetState;

/// Where a report stands between the first atom and retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Accumulating,
    Complete,
}

/// Builds one [`ReportRecord`] from a subset's atom sequence.
pub struct Assembler {
    dispatcher: Dispatcher,
    state: SubsetState,
    record: ReportRecord,
    phase: Phase,
    error: ErrorSlot,
}

impl Assembler {
    pub fn new(kind: ReportKind) -> Self {
        Assembler {
            dispatcher: Dispatcher::new(),
            state: SubsetState::new(),
            record: ReportRecord::new(kind),
            phase: Phase::Empty,
            error: ErrorSlot::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Feeds the next atom. On a handler failure the record stays as
    /// accumulated so far; the caller should discard it and can read the
    /// diagnostic from [`last_error`](Assembler::last_error).
    pub fn push(&mut self, atom: &Atom) -> Result<()> {
        if self.phase == Phase::Empty {
            self.phase = Phase::Accumulating;
        }
        match self
            .dispatcher
            .dispatch(atom, &mut self.state, Some(&mut self.record))
        {
            Ok(()) => Ok(()),
            Err(err) => {
                self.error.set(&err);
                Err(err)
            }
        }
    }

    /// Runs a whole subset through the dispatcher and completes the
    /// report.
    pub fn assemble(&mut self, subset: &SubsetSequence) -> Result<()> {
        for atom in subset.atoms() {
            self.push(atom)?;
        }
        self.complete();
        Ok(())
    }

    /// Marks the report finished and stamps its form token.
    pub fn complete(&mut self) {
        self.record.stamp_header();
        self.phase = Phase::Complete;
    }

    pub fn record(&self) -> &ReportRecord {
        &self.record
    }

    pub fn into_record(self) -> ReportRecord {
        self.record
    }

    pub fn state(&self) -> &SubsetState {
        &self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        if self.error.is_empty() {
            None
        } else {
            Some(self.error.get())
        }
    }

    /// Fresh record and state for the next subset; the dispatcher
    /// registry is kept.
    pub fn reset(&mut self, kind: ReportKind) {
        self.record = ReportRecord::new(kind);
        self.state.clean();
        self.phase = Phase::Empty;
        self.error.clear();
    }
}
