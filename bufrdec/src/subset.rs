use crate::descriptor::Descriptor;
use crate::errors::{Error, Result};
use crate::scratch::{MAX_SUBSET_ATOMS, Scratch, alloc_vec};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AtomFlags: u32 {
        /// Value was encoded as all ones (outside class 31).
        const MISSING = 1 << 0;
        /// Element carries character data.
        const STRING = 1 << 1;
        /// Unit is a code table; the value is an index, not a quantity.
        const CODE_TABLE = 1 << 2;
        /// Unit is a flag table; the value is a bit pattern.
        const FLAG_TABLE = 1 << 3;
        /// Quality value attached to an earlier atom through a bitmap.
        const QUALITY = 1 << 4;
    }
}

/// One decoded element value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    pub desc: Descriptor,
    pub value: f64,
    /// The value truncated to an integer, which is what report handlers
    /// consume for code and flag tables.
    pub ival: i64,
    pub text: Option<String>,
    #[serde(skip)]
    pub flags: AtomFlags,
}

impl Atom {
    pub fn number(desc: Descriptor, value: f64, flags: AtomFlags) -> Self {
        Atom {
            desc,
            value,
            ival: value as i64,
            text: None,
            flags,
        }
    }

    pub fn text(desc: Descriptor, text: String) -> Self {
        Atom {
            desc,
            value: 0.0,
            ival: 0,
            text: Some(text),
            flags: AtomFlags::STRING,
        }
    }

    pub fn missing(desc: Descriptor, flags: AtomFlags) -> Self {
        Atom {
            desc,
            value: f64::NAN,
            ival: 0,
            text: None,
            flags: flags | AtomFlags::MISSING,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.flags.contains(AtomFlags::MISSING)
    }
}

/// Decoded atoms for the subset currently being worked on. One allocation
/// per decode context, reused for every subset of every message.
#[derive(Debug, Default)]
pub struct SubsetSequence {
    atoms: Option<Vec<Atom>>,
}

impl SubsetSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, atom: Atom) -> Result<()> {
        if self.atoms.is_none() {
            self.init()?;
        }
        if let Some(atoms) = self.atoms.as_mut() {
            if atoms.len() >= MAX_SUBSET_ATOMS {
                return Err(Error::CapacityExceeded {
                    what: "subset atoms",
                    limit: MAX_SUBSET_ATOMS,
                });
            }
            atoms.push(atom);
        }
        Ok(())
    }

    pub fn atoms(&self) -> &[Atom] {
        self.atoms.as_deref().unwrap_or(&[])
    }

    pub fn get(&self, index: usize) -> Option<&Atom> {
        self.atoms().get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Atom> {
        self.atoms.as_mut().and_then(|a| a.get_mut(index))
    }

    pub fn len(&self) -> usize {
        self.atoms().len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.atoms.as_ref().map(|a| a.capacity()).unwrap_or(0)
    }
}

impl Scratch for SubsetSequence {
    fn init(&mut self) -> Result<()> {
        self.atoms = Some(alloc_vec("subset atoms", MAX_SUBSET_ATOMS)?);
        Ok(())
    }

    fn clean(&mut self) -> Result<()> {
        match self.atoms.as_mut() {
            Some(atoms) => {
                atoms.clear();
                Ok(())
            }
            None => self.init(),
        }
    }

    fn free(&mut self) {
        self.atoms = None;
    }

    fn is_allocated(&self) -> bool {
        self.atoms.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(y: u8) -> Atom {
        Atom::number(Descriptor::new(0, 2, y), 1.0, AtomFlags::empty())
    }

    #[test]
    fn init_then_clean_matches_init_alone() {
        let mut a = SubsetSequence::new();
        a.init().unwrap();
        a.clean().unwrap();

        let mut b = SubsetSequence::new();
        b.init().unwrap();

        assert!(a.is_allocated() && b.is_allocated());
        assert_eq!(a.len(), b.len());
        assert_eq!(a.capacity(), b.capacity());
    }

    #[test]
    fn clean_preserves_storage() {
        let mut seq = SubsetSequence::new();
        seq.init().unwrap();
        for y in 0..10 {
            seq.push(atom(y)).unwrap();
        }
        let cap = seq.capacity();

        seq.clean().unwrap();
        assert!(seq.is_empty());
        assert!(seq.is_allocated());
        assert_eq!(seq.capacity(), cap);
    }

    #[test]
    fn clean_on_unallocated_falls_back_to_init() {
        let mut seq = SubsetSequence::new();
        assert!(!seq.is_allocated());
        seq.clean().unwrap();
        assert!(seq.is_allocated());
        assert!(seq.is_empty());
    }

    #[test]
    fn free_is_idempotent() {
        let mut seq = SubsetSequence::new();
        seq.init().unwrap();
        seq.push(atom(1)).unwrap();

        seq.free();
        assert!(!seq.is_allocated());
        seq.free();
        assert!(!seq.is_allocated());
        assert_eq!(seq.len(), 0);
    }

    #[test]
    fn push_reports_overflow() {
        let mut seq = SubsetSequence::new();
        seq.init().unwrap();
        for _ in 0..MAX_SUBSET_ATOMS {
            seq.push(atom(0)).unwrap();
        }
        match seq.push(atom(0)) {
            Err(Error::CapacityExceeded { limit, .. }) => assert_eq!(limit, MAX_SUBSET_ATOMS),
            other => panic!("expected capacity error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn missing_atom_keeps_flags() {
        let a = Atom::missing(Descriptor::new(0, 2, 1), AtomFlags::CODE_TABLE);
        assert!(a.is_missing());
        assert!(a.flags.contains(AtomFlags::CODE_TABLE));
        assert_eq!(a.ival, 0);
    }

    #[test]
    fn truncation_matches_integer_cast() {
        let a = Atom::number(Descriptor::new(0, 12, 101), 3.7, AtomFlags::empty());
        assert_eq!(a.ival, 3);
        let b = Atom::number(Descriptor::new(0, 12, 101), -2.4, AtomFlags::empty());
        assert_eq!(b.ival, -2);
    }
}
