use crate::bits::BitInput;
use crate::descriptor::Descriptor;
use crate::errors::{Error, Result};
use crate::scratch::{MAX_COMPRESSED_REFS, Scratch, alloc_vec};
use crate::subset::{Atom, AtomFlags};

pub(crate) fn all_ones(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Layout of one element in a compressed data section: the shared base
/// value plus where the per-subset increments sit in the bit stream.
#[derive(Debug, Clone)]
pub struct CompressedRef {
    pub desc: Descriptor,
    /// Effective element width after operators.
    pub bits: u32,
    /// Base (minimum) value read once for all subsets.
    pub base: u64,
    /// Increment width. Bits for numeric elements, octets for character
    /// elements; zero means every subset shares the base.
    pub inc_bits: u32,
    /// Absolute bit offset of the first subset's increment.
    pub inc_offset: usize,
    pub scale: i32,
    pub reference: i64,
    /// Base octets for character elements.
    pub base_bytes: Option<Vec<u8>>,
    pub flags: AtomFlags,
}

impl CompressedRef {
    /// Reconstructs this element's value for one subset.
    pub(crate) fn extract(&self, data: &[u8], subset: usize) -> Result<Atom> {
        if self.flags.contains(AtomFlags::STRING) {
            return self.extract_text(data, subset);
        }

        let raw = if self.inc_bits == 0 {
            self.base
        } else {
            let mut input = BitInput::at(data, self.inc_offset + subset * self.inc_bits as usize);
            let inc = input.take_bits(self.inc_bits as usize)?;
            if inc == all_ones(self.inc_bits) && !self.desc.is_replication_factor() {
                return Ok(Atom::missing(self.desc, self.flags));
            }
            self.base.wrapping_add(inc)
        };

        if self.bits > 0 && raw == all_ones(self.bits) && !self.desc.is_replication_factor() {
            return Ok(Atom::missing(self.desc, self.flags));
        }

        let value = (raw as f64 + self.reference as f64) * 10.0f64.powi(-self.scale);
        Ok(Atom::number(self.desc, value, self.flags))
    }

    fn extract_text(&self, data: &[u8], subset: usize) -> Result<Atom> {
        let bytes = if self.inc_bits == 0 {
            self.base_bytes.clone().unwrap_or_default()
        } else {
            let nbytes = self.inc_bits as usize;
            let mut input = BitInput::at(data, self.inc_offset + subset * nbytes * 8);
            input.take_bytes(nbytes)?
        };

        if !bytes.is_empty() && bytes.iter().all(|b| *b == 0xFF) {
            return Ok(Atom::missing(self.desc, self.flags));
        }

        let text = String::from_utf8_lossy(&bytes).trim_end().to_string();
        Ok(Atom::text(self.desc, text))
    }
}

/// Per-message element layouts for a compressed data section. One
/// allocation per decode context, rebuilt for each compressed message.
#[derive(Debug, Default)]
pub struct CompressedRefs {
    refs: Option<Vec<CompressedRef>>,
}

impl CompressedRefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, entry: CompressedRef) -> Result<()> {
        if self.refs.is_none() {
            self.init()?;
        }
        if let Some(refs) = self.refs.as_mut() {
            if refs.len() >= MAX_COMPRESSED_REFS {
                return Err(Error::CapacityExceeded {
                    what: "compressed references",
                    limit: MAX_COMPRESSED_REFS,
                });
            }
            refs.push(entry);
        }
        Ok(())
    }

    pub fn refs(&self) -> &[CompressedRef] {
        self.refs.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.refs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.refs.as_ref().map(|r| r.capacity()).unwrap_or(0)
    }
}

impl Scratch for CompressedRefs {
    fn init(&mut self) -> Result<()> {
        self.refs = Some(alloc_vec("compressed references", MAX_COMPRESSED_REFS)?);
        Ok(())
    }

    fn clean(&mut self) -> Result<()> {
        match self.refs.as_mut() {
            Some(refs) => {
                refs.clear();
                Ok(())
            }
            None => self.init(),
        }
    }

    fn free(&mut self) {
        self.refs = None;
    }

    fn is_allocated(&self) -> bool {
        self.refs.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_ref() -> CompressedRef {
        CompressedRef {
            desc: Descriptor::new(0, 12, 101),
            bits: 12,
            base: 100,
            inc_bits: 4,
            inc_offset: 16,
            scale: 1,
            reference: -1000,
            base_bytes: None,
            flags: AtomFlags::empty(),
        }
    }

    #[test]
    fn extracts_incremented_values() {
        // Increments for two subsets packed at bit 16: 0x3, then 0x7.
        let data = [0x00, 0x00, 0x37];
        let r = numeric_ref();

        let a0 = r.extract(&data, 0).unwrap();
        assert!((a0.value - (-89.7)).abs() < 1e-9);
        let a1 = r.extract(&data, 1).unwrap();
        assert!((a1.value - (-89.3)).abs() < 1e-9);
    }

    #[test]
    fn all_ones_increment_is_missing() {
        let data = [0x00, 0x00, 0x3F];
        let r = numeric_ref();
        assert!(!r.extract(&data, 0).unwrap().is_missing());
        assert!(r.extract(&data, 1).unwrap().is_missing());
    }

    #[test]
    fn shared_base_and_missing_base() {
        let mut r = numeric_ref();
        r.inc_bits = 0;
        let a = r.extract(&[], 3).unwrap();
        assert!((a.value - (-90.0)).abs() < 1e-9);

        r.base = all_ones(12);
        assert!(r.extract(&[], 0).unwrap().is_missing());
    }

    #[test]
    fn replication_factors_are_never_missing() {
        let mut r = numeric_ref();
        r.desc = Descriptor::new(0, 31, 1);
        r.bits = 8;
        r.base = all_ones(8);
        r.inc_bits = 0;
        let a = r.extract(&[], 0).unwrap();
        assert!(!a.is_missing());
    }

    #[test]
    fn extracts_text_variants() {
        let mut r = numeric_ref();
        r.flags = AtomFlags::STRING;
        r.bits = 32;
        r.inc_bits = 2;
        r.inc_offset = 0;
        r.base_bytes = Some(b"ABCD".to_vec());

        let data = b"EFGH";
        assert_eq!(r.extract(data, 0).unwrap().text.as_deref(), Some("EF"));
        assert_eq!(r.extract(data, 1).unwrap().text.as_deref(), Some("GH"));

        r.inc_bits = 0;
        assert_eq!(r.extract(data, 1).unwrap().text.as_deref(), Some("ABCD"));

        r.base_bytes = Some(vec![0xFF; 4]);
        assert!(r.extract(data, 0).unwrap().is_missing());
    }

    #[test]
    fn lifecycle_resets_in_place() {
        let mut refs = CompressedRefs::new();
        refs.init().unwrap();
        refs.push(numeric_ref()).unwrap();
        let cap = refs.capacity();

        refs.clean().unwrap();
        assert!(refs.is_empty());
        assert!(refs.is_allocated());
        assert_eq!(refs.capacity(), cap);

        refs.free();
        refs.free();
        assert!(!refs.is_allocated());

        refs.clean().unwrap();
        assert!(refs.is_allocated());
    }
}
