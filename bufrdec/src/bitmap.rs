use crate::errors::{Error, Result};
use crate::scratch::{MAX_BITMAPS, Scratch};

/// One data-present bitmap: which of the atoms preceding its definition are
/// covered, and the quality atoms later paired with them.
///
/// The Nth data-present bit refers to the atom at `anchor - nbits + N`,
/// counting over the atoms decoded before the bitmap opened.
#[derive(Debug, Default, Clone)]
pub struct Bitmap {
    /// Atoms already in the subset sequence when the bitmap opened.
    pub anchor: usize,
    /// Total data-present bits consumed.
    pub nbits: usize,
    /// Bit ordinals flagged as data present (bit value zero).
    pub present: Vec<usize>,
    /// Pairs of (target atom index, quality atom index).
    pub quality: Vec<(usize, usize)>,
    next_pair: usize,
}

impl Bitmap {
    fn reset(&mut self) {
        self.anchor = 0;
        self.nbits = 0;
        self.present.clear();
        self.quality.clear();
        self.next_pair = 0;
    }

    pub(crate) fn open(&mut self, anchor: usize) {
        self.reset();
        self.anchor = anchor;
    }

    pub(crate) fn record_bit(&mut self, bit: u64) {
        if bit == 0 {
            self.present.push(self.nbits);
        }
        self.nbits += 1;
    }

    /// Subset-sequence index of the nth present target, if the bitmap is
    /// well formed.
    pub fn target(&self, nth: usize) -> Option<usize> {
        let ordinal = *self.present.get(nth)?;
        let start = self.anchor.checked_sub(self.nbits)?;
        Some(start + ordinal)
    }

    /// Pairs the next uncovered target with a quality atom. Returns the
    /// target index, or None when every present target is already paired.
    pub(crate) fn attach_quality(&mut self, quality_index: usize) -> Option<usize> {
        let target = self.target(self.next_pair)?;
        self.quality.push((target, quality_index));
        self.next_pair += 1;
        Some(target)
    }

    /// Restarts quality pairing from the first present target. Used when a
    /// defined bitmap is recalled for another attribute pass.
    pub(crate) fn rewind(&mut self) {
        self.next_pair = 0;
    }
}

/// Registry of the bitmaps defined by the current message. Slots are
/// allocated on first use and kept across messages; `clean` only resets
/// contents and the use count.
#[derive(Debug, Default)]
pub struct BitmapSet {
    slots: [Option<Box<Bitmap>>; MAX_BITMAPS],
    count: usize,
}

impl BitmapSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the next bitmap slot and returns its index.
    ///
    /// At the capacity limit this fails naming the limit. A slot left
    /// allocated by an earlier message is reused as-is without advancing
    /// the use count.
    pub fn allocate(&mut self) -> Result<usize> {
        if self.count >= MAX_BITMAPS {
            return Err(Error::CapacityExceeded {
                what: "bitmaps",
                limit: MAX_BITMAPS,
            });
        }
        let index = self.count;
        if self.slots[index].is_some() {
            return Ok(index);
        }
        self.slots[index] = Some(Box::default());
        self.count += 1;
        Ok(index)
    }

    pub fn get(&self, index: usize) -> Option<&Bitmap> {
        self.slots.get(index).and_then(|s| s.as_deref())
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Bitmap> {
        self.slots.get_mut(index).and_then(|s| s.as_deref_mut())
    }

    /// Bitmaps acquired since the last clean.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Slots holding allocated storage, in use or not.
    pub fn allocated(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl Scratch for BitmapSet {
    /// The slot array is inline; init starts from an empty registry.
    fn init(&mut self) -> Result<()> {
        self.free();
        Ok(())
    }

    fn clean(&mut self) -> Result<()> {
        for slot in self.slots.iter_mut().flatten() {
            slot.reset();
        }
        self.count = 0;
        Ok(())
    }

    fn free(&mut self) {
        self.slots = Default::default();
        self.count = 0;
    }

    fn is_allocated(&self) -> bool {
        self.slots.iter().any(|s| s.is_some())
    }
}
