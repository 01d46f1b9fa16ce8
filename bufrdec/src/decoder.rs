//! Descriptor-driven extraction of subset values from section 4.
//!
//! A [`Decoder`] owns the per-message scratch resources: the expanded
//! descriptor tree, the subset sequence buffer, the compressed layout
//! table and the bitmap registry. `start_message` primes them for one
//! message, `next_subset` yields subsets in order. Storage is allocated
//! once and reused across messages until `free`.

use std::mem;
use std::sync::Arc;

use crate::bitmap::BitmapSet;
use crate::bits::BitInput;
use crate::block::MessageBlock;
use crate::compressed::{CompressedRef, CompressedRefs, all_ones};
use crate::descriptor::Descriptor;
use crate::errors::{Error, Result};
use crate::scratch::{MAX_ERROR_LEN, Scratch};
use crate::sections::{BufrMessage, MessageEdition};
use crate::subset::{Atom, AtomFlags, SubsetSequence};
use crate::tables::{ElementEntry, TableStore};
use crate::tree::ExpandedTree;

/// Message recorded for the most recent failed decode operation,
/// truncated to `MAX_ERROR_LEN` bytes on a character boundary.
#[derive(Debug, Default)]
pub struct ErrorSlot {
    message: String,
}

impl ErrorSlot {
    pub fn set(&mut self, error: &dyn std::fmt::Display) {
        let mut text = error.to_string();
        if text.len() > MAX_ERROR_LEN {
            let mut end = MAX_ERROR_LEN;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        self.message = text;
    }

    pub fn clear(&mut self) {
        self.message.clear();
    }

    pub fn get(&self) -> &str {
        &self.message
    }

    pub fn is_empty(&self) -> bool {
        self.message.is_empty()
    }
}

/// Operator modifications active while walking one subset. Reset at every
/// subset boundary.
#[derive(Debug, Default)]
struct State {
    common_scale: Option<i32>,
    common_data_width: Option<i32>,
    common_str_width: Option<usize>,
    local_data_width: Option<u32>,
    temp_operator: Option<i32>,
    /// Width of pending 2 03 reference redefinitions.
    ref_reading: Option<u32>,
    /// Stacked 2 04 associated field widths.
    assoc_bits: Vec<u32>,
    /// Bitmap currently taking 0 31 031 bits.
    bitmapping: Option<usize>,
    /// Bitmap quality atoms currently resolve against.
    active_bitmap: Option<usize>,
    /// Most recent bitmap closed under 2 36 000.
    last_defined: Option<usize>,
    defining_bitmap: bool,
}

impl State {
    /// Code tables, flag tables and class 31 keep their Table B widths
    /// whatever operators are active.
    fn no_change(entry: &ElementEntry) -> bool {
        entry.is_code_table() || entry.is_flag_table() || entry.descriptor.is_replication_factor()
    }

    fn data_width(&self, entry: &ElementEntry) -> u32 {
        // 2 06 states the encoded width outright, table entry or not
        if let Some(width) = self.local_data_width {
            return width;
        }
        if Self::no_change(entry) {
            return entry.bits;
        }
        let mut bits = entry.bits;
        if let Some(change) = self.common_data_width {
            bits = bits.saturating_add_signed(change - 128);
        }
        if let Some(change) = self.temp_operator {
            bits = bits.saturating_add_signed((10 * change + 2) / 3);
        }
        bits
    }

    fn scale(&self, entry: &ElementEntry) -> i32 {
        if Self::no_change(entry) {
            return entry.scale;
        }
        let mut scale = entry.scale;
        if let Some(change) = self.common_scale {
            scale += change - 128;
        }
        if let Some(change) = self.temp_operator {
            scale += change;
        }
        scale
    }

    fn reference(&self, entry: &ElementEntry) -> i64 {
        if Self::no_change(entry) {
            return entry.reference;
        }
        match self.temp_operator {
            Some(change) => entry
                .reference
                .saturating_mul(10i64.saturating_pow(change as u32)),
            None => entry.reference,
        }
    }

    /// Applies an operator that only alters decode state. Returns false
    /// for operators that touch the bit stream or the bitmap registry,
    /// which the walk handles itself.
    fn apply_operator(&mut self, desc: Descriptor) -> bool {
        let y = desc.y;
        match desc.x {
            1 => self.common_data_width = (y != 0).then_some(y as i32),
            2 => self.common_scale = (y != 0).then_some(y as i32),
            3 => {
                if y == 0 || y == 255 {
                    self.ref_reading = None;
                } else {
                    log::debug!("Discarding reference value redefinitions of {} bits", y);
                    self.ref_reading = Some(y as u32);
                }
            }
            4 => {
                if y == 0 {
                    self.assoc_bits.pop();
                } else {
                    log::debug!("Discarding associated fields of {} bits", y);
                    self.assoc_bits.push(y as u32);
                }
            }
            6 => self.local_data_width = Some(y as u32),
            7 => self.temp_operator = (y != 0).then_some(y as i32),
            8 => self.common_str_width = (y != 0).then_some(y as usize),
            _ => return false,
        }
        true
    }
}

/// One pending range of the descriptor walk. `Run` visits descriptors of
/// a tree node left to right; `Repeat` re-enters a replication body.
#[derive(Debug, Clone, Copy)]
enum Frame {
    Run {
        node: usize,
        idx: usize,
        end: usize,
    },
    Repeat {
        node: usize,
        start: usize,
        end: usize,
        remaining: u64,
    },
}

fn skip_bits(input: &mut BitInput<'_>, mut nbits: usize) -> Result<()> {
    while nbits > 0 {
        let chunk = nbits.min(64);
        input.take_bits(chunk)?;
        nbits -= chunk;
    }
    Ok(())
}

/// Walks the expanded tree over one uncompressed subset, pushing atoms
/// in descriptor order.
struct Walker<'a> {
    tables: &'a TableStore,
    tree: &'a ExpandedTree,
    input: BitInput<'a>,
    seq: &'a mut SubsetSequence,
    bitmaps: &'a mut BitmapSet,
    state: State,
    stack: Vec<Frame>,
}

impl<'a> Walker<'a> {
    fn new(
        tables: &'a TableStore,
        tree: &'a ExpandedTree,
        input: BitInput<'a>,
        seq: &'a mut SubsetSequence,
        bitmaps: &'a mut BitmapSet,
    ) -> Self {
        Walker {
            tables,
            tree,
            input,
            seq,
            bitmaps,
            state: State::default(),
            stack: Vec::new(),
        }
    }

    /// Runs the walk to completion and returns the bit position after the
    /// subset, for the next subset to resume from.
    fn run(mut self) -> Result<usize> {
        let root = self
            .tree
            .root()
            .ok_or_else(|| Error::ParseError("Empty descriptor tree".to_string()))?;
        self.stack.push(Frame::Run {
            node: 0,
            idx: 0,
            end: root.descs.len(),
        });

        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Run { node, idx, end } => {
                    if idx < end {
                        self.step(node, idx, end)?;
                    }
                }
                Frame::Repeat {
                    node,
                    start,
                    end,
                    remaining,
                } => {
                    if remaining > 0 {
                        self.stack.push(Frame::Repeat {
                            node,
                            start,
                            end,
                            remaining: remaining - 1,
                        });
                        self.stack.push(Frame::Run {
                            node,
                            idx: start,
                            end,
                        });
                    }
                }
            }
        }
        Ok(self.input.position())
    }

    fn step(&mut self, node: usize, idx: usize, end: usize) -> Result<()> {
        let current = self
            .tree
            .seq(node)
            .ok_or_else(|| Error::ParseError("Walk left the expanded tree".to_string()))?;
        let item = current.descs[idx];
        match item.desc.f {
            0 => {
                self.stack.push(Frame::Run {
                    node,
                    idx: idx + 1,
                    end,
                });
                self.element(item.desc)
            }
            1 => self.replicate(node, idx, end, item.desc),
            2 => {
                self.stack.push(Frame::Run {
                    node,
                    idx: idx + 1,
                    end,
                });
                self.operator(item.desc)
            }
            3 => {
                let child = item.child.ok_or(Error::MissingTableD(item.desc))?;
                let len = self
                    .tree
                    .seq(child)
                    .map(|s| s.descs.len())
                    .ok_or(Error::MissingTableD(item.desc))?;
                self.stack.push(Frame::Run {
                    node,
                    idx: idx + 1,
                    end,
                });
                self.stack.push(Frame::Run {
                    node: child,
                    idx: 0,
                    end: len,
                });
                Ok(())
            }
            _ => Err(Error::ParseError(format!(
                "Descriptor {} has an invalid F value",
                item.desc
            ))),
        }
    }

    fn replicate(&mut self, node: usize, idx: usize, end: usize, desc: Descriptor) -> Result<()> {
        let delayed = desc.y == 0;
        let count = if delayed {
            let factor = self
                .tree
                .seq(node)
                .and_then(|s| s.descs.get(idx + 1))
                .map(|item| item.desc)
                .filter(|d| d.is_replication_factor())
                .ok_or_else(|| {
                    Error::ParseError(format!(
                        "Delayed replication {} is not followed by a class 31 factor",
                        desc
                    ))
                })?;
            self.read_count(factor)?
        } else {
            desc.y as u64
        };

        let body_start = idx + 1 + usize::from(delayed);
        let body_end = body_start + desc.x as usize;
        if body_end > end {
            return Err(Error::ParseError(format!(
                "Not enough descriptors to replicate after {}",
                desc
            )));
        }
        self.stack.push(Frame::Run {
            node,
            idx: body_end,
            end,
        });
        self.stack.push(Frame::Repeat {
            node,
            start: body_start,
            end: body_end,
            remaining: count,
        });
        Ok(())
    }

    /// Replication counts are consumed in place and never become atoms.
    fn read_count(&mut self, factor: Descriptor) -> Result<u64> {
        let entry = self
            .tables
            .lookup_element(&factor)
            .ok_or(Error::MissingTableB(factor))?;
        self.input.take_bits(entry.bits as usize)
    }

    fn element(&mut self, desc: Descriptor) -> Result<()> {
        let data_present_bit = desc.f == 0 && desc.x == 31 && desc.y == 31;
        if !data_present_bit {
            self.close_bitmap();
        }

        let entry = match self.tables.lookup_element(&desc) {
            Some(entry) => entry,
            None => {
                // 2 06 lets unknown local descriptors pass through
                if let Some(width) = self.state.local_data_width.take() {
                    skip_bits(&mut self.input, width as usize)?;
                    self.state.temp_operator = None;
                    return Ok(());
                }
                return Err(Error::MissingTableB(desc));
            }
        };

        if let Some(width) = self.state.ref_reading {
            skip_bits(&mut self.input, width as usize)?;
            return Ok(());
        }

        if desc.x != 31 {
            for i in 0..self.state.assoc_bits.len() {
                let bits = self.state.assoc_bits[i];
                skip_bits(&mut self.input, bits as usize)?;
            }
        }

        let mut atom = self.decode_value(entry)?;
        self.state.temp_operator = None;
        self.state.local_data_width = None;

        if data_present_bit {
            let index = match self.state.bitmapping {
                Some(index) => index,
                None => {
                    let index = self.bitmaps.allocate()?;
                    let anchor = self.seq.len();
                    if let Some(bitmap) = self.bitmaps.get_mut(index) {
                        bitmap.open(anchor);
                    }
                    self.state.bitmapping = Some(index);
                    index
                }
            };
            if let Some(bitmap) = self.bitmaps.get_mut(index) {
                bitmap.record_bit(atom.ival as u64);
            }
        } else if desc.x == 33 {
            let next_index = self.seq.len();
            if let Some(bitmap) = self
                .state
                .active_bitmap
                .and_then(|i| self.bitmaps.get_mut(i))
            {
                if bitmap.attach_quality(next_index).is_some() {
                    atom.flags |= AtomFlags::QUALITY;
                }
            }
        }
        self.seq.push(atom)
    }

    /// Leaving a 0 31 031 run fixes the bitmap as the one quality atoms
    /// resolve against.
    fn close_bitmap(&mut self) {
        if let Some(index) = self.state.bitmapping.take() {
            self.state.active_bitmap = Some(index);
            if self.state.defining_bitmap {
                self.state.last_defined = Some(index);
                self.state.defining_bitmap = false;
            }
        }
    }

    fn decode_value(&mut self, entry: &ElementEntry) -> Result<Atom> {
        if entry.is_string() {
            let nbytes = self
                .state
                .common_str_width
                .unwrap_or((entry.bits / 8) as usize);
            let bytes = self.input.take_bytes(nbytes)?;
            if !bytes.is_empty() && bytes.iter().all(|b| *b == 0xFF) {
                return Ok(Atom::missing(entry.descriptor, AtomFlags::STRING));
            }
            let text = String::from_utf8_lossy(&bytes).trim_end().to_string();
            return Ok(Atom::text(entry.descriptor, text));
        }

        let bits = self.state.data_width(entry);
        let raw = self.input.take_bits(bits as usize)?;

        let mut flags = AtomFlags::empty();
        if entry.is_code_table() {
            flags |= AtomFlags::CODE_TABLE;
        } else if entry.is_flag_table() {
            flags |= AtomFlags::FLAG_TABLE;
        }

        if bits > 0 && raw == all_ones(bits) && !entry.descriptor.is_replication_factor() {
            return Ok(Atom::missing(entry.descriptor, flags));
        }

        let value = (raw as f64 + self.state.reference(entry) as f64)
            * 10f64.powi(-self.state.scale(entry));
        Ok(Atom::number(entry.descriptor, value, flags))
    }

    fn operator(&mut self, desc: Descriptor) -> Result<()> {
        if self.state.apply_operator(desc) {
            return Ok(());
        }
        match desc.x {
            5 => {
                let bytes = self.input.take_bytes(desc.y as usize)?;
                let text = String::from_utf8_lossy(&bytes).trim_end().to_string();
                self.seq.push(Atom::text(desc, text))?;
            }
            22 => {
                // quality information follows; pairing happens per atom
            }
            35 => {
                self.state.bitmapping = None;
                self.state.active_bitmap = None;
                self.state.defining_bitmap = false;
            }
            36 => self.state.defining_bitmap = true,
            37 => match desc.y {
                0 => {
                    if let Some(index) = self.state.last_defined {
                        if let Some(bitmap) = self.bitmaps.get_mut(index) {
                            bitmap.rewind();
                        }
                        self.state.active_bitmap = Some(index);
                    }
                }
                255 => self.state.active_bitmap = None,
                _ => {}
            },
            x => log::debug!("Operator 2 {:02} {:03} is not supported, ignoring", x, desc.y),
        }
        Ok(())
    }
}

/// Walks the expanded tree over a compressed data section, recording the
/// base value and increment layout of every element once for the whole
/// message.
struct Compiler<'a> {
    tables: &'a TableStore,
    tree: &'a ExpandedTree,
    input: BitInput<'a>,
    refs: &'a mut CompressedRefs,
    n_subsets: usize,
    state: State,
    stack: Vec<Frame>,
}

impl<'a> Compiler<'a> {
    fn new(
        tables: &'a TableStore,
        tree: &'a ExpandedTree,
        input: BitInput<'a>,
        refs: &'a mut CompressedRefs,
        n_subsets: usize,
    ) -> Self {
        Compiler {
            tables,
            tree,
            input,
            refs,
            n_subsets,
            state: State::default(),
            stack: Vec::new(),
        }
    }

    fn run(mut self) -> Result<()> {
        let root = self
            .tree
            .root()
            .ok_or_else(|| Error::ParseError("Empty descriptor tree".to_string()))?;
        self.stack.push(Frame::Run {
            node: 0,
            idx: 0,
            end: root.descs.len(),
        });

        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Run { node, idx, end } => {
                    if idx < end {
                        self.step(node, idx, end)?;
                    }
                }
                Frame::Repeat {
                    node,
                    start,
                    end,
                    remaining,
                } => {
                    if remaining > 0 {
                        self.stack.push(Frame::Repeat {
                            node,
                            start,
                            end,
                            remaining: remaining - 1,
                        });
                        self.stack.push(Frame::Run {
                            node,
                            idx: start,
                            end,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn step(&mut self, node: usize, idx: usize, end: usize) -> Result<()> {
        let current = self
            .tree
            .seq(node)
            .ok_or_else(|| Error::ParseError("Walk left the expanded tree".to_string()))?;
        let item = current.descs[idx];
        match item.desc.f {
            0 => {
                self.stack.push(Frame::Run {
                    node,
                    idx: idx + 1,
                    end,
                });
                self.element(item.desc)
            }
            1 => self.replicate(node, idx, end, item.desc),
            2 => {
                self.stack.push(Frame::Run {
                    node,
                    idx: idx + 1,
                    end,
                });
                self.operator(item.desc)
            }
            3 => {
                let child = item.child.ok_or(Error::MissingTableD(item.desc))?;
                let len = self
                    .tree
                    .seq(child)
                    .map(|s| s.descs.len())
                    .ok_or(Error::MissingTableD(item.desc))?;
                self.stack.push(Frame::Run {
                    node,
                    idx: idx + 1,
                    end,
                });
                self.stack.push(Frame::Run {
                    node: child,
                    idx: 0,
                    end: len,
                });
                Ok(())
            }
            _ => Err(Error::ParseError(format!(
                "Descriptor {} has an invalid F value",
                item.desc
            ))),
        }
    }

    fn replicate(&mut self, node: usize, idx: usize, end: usize, desc: Descriptor) -> Result<()> {
        let delayed = desc.y == 0;
        let count = if delayed {
            let factor = self
                .tree
                .seq(node)
                .and_then(|s| s.descs.get(idx + 1))
                .map(|item| item.desc)
                .filter(|d| d.is_replication_factor())
                .ok_or_else(|| {
                    Error::ParseError(format!(
                        "Delayed replication {} is not followed by a class 31 factor",
                        desc
                    ))
                })?;
            self.read_count(factor)?
        } else {
            desc.y as u64
        };

        let body_start = idx + 1 + usize::from(delayed);
        let body_end = body_start + desc.x as usize;
        if body_end > end {
            return Err(Error::ParseError(format!(
                "Not enough descriptors to replicate after {}",
                desc
            )));
        }
        self.stack.push(Frame::Run {
            node,
            idx: body_end,
            end,
        });
        self.stack.push(Frame::Repeat {
            node,
            start: body_start,
            end: body_end,
            remaining: count,
        });
        Ok(())
    }

    /// A shared replication count: the base is the count and the
    /// increment width must be zero, since subsets of a compressed
    /// message all carry the same structure.
    fn read_count(&mut self, factor: Descriptor) -> Result<u64> {
        let entry = self
            .tables
            .lookup_element(&factor)
            .ok_or(Error::MissingTableB(factor))?;
        let base = self.input.take_bits(entry.bits as usize)?;
        let inc_bits = self.input.take_bits(6)?;
        if inc_bits != 0 {
            return Err(Error::ParseError(
                "Compressed delayed replication counts must not vary between subsets".to_string(),
            ));
        }
        Ok(base)
    }

    fn element(&mut self, desc: Descriptor) -> Result<()> {
        let entry = match self.tables.lookup_element(&desc) {
            Some(entry) => entry,
            None => {
                if let Some(width) = self.state.local_data_width.take() {
                    self.skip_run(width)?;
                    self.state.temp_operator = None;
                    return Ok(());
                }
                return Err(Error::MissingTableB(desc));
            }
        };

        if let Some(width) = self.state.ref_reading {
            self.skip_run(width)?;
            return Ok(());
        }

        if desc.x != 31 {
            for i in 0..self.state.assoc_bits.len() {
                let bits = self.state.assoc_bits[i];
                self.skip_run(bits)?;
            }
        }

        if entry.is_string() {
            let nbytes = self
                .state
                .common_str_width
                .unwrap_or((entry.bits / 8) as usize);
            let base_bytes = self.input.take_bytes(nbytes)?;
            let octets = self.input.take_bits(6)? as u32;
            let inc_offset = self.input.position();
            skip_bits(&mut self.input, self.n_subsets * octets as usize * 8)?;
            self.refs.push(CompressedRef {
                desc,
                bits: (nbytes * 8) as u32,
                base: 0,
                inc_bits: octets,
                inc_offset,
                scale: 0,
                reference: 0,
                base_bytes: Some(base_bytes),
                flags: AtomFlags::STRING,
            })?;
        } else {
            let bits = self.state.data_width(entry);
            let base = self.input.take_bits(bits as usize)?;
            let inc_bits = self.input.take_bits(6)? as u32;
            let inc_offset = self.input.position();
            skip_bits(&mut self.input, self.n_subsets * inc_bits as usize)?;

            let mut flags = AtomFlags::empty();
            if entry.is_code_table() {
                flags |= AtomFlags::CODE_TABLE;
            } else if entry.is_flag_table() {
                flags |= AtomFlags::FLAG_TABLE;
            }

            self.refs.push(CompressedRef {
                desc,
                bits,
                base,
                inc_bits,
                inc_offset,
                scale: self.state.scale(entry),
                reference: self.state.reference(entry),
                base_bytes: None,
                flags,
            })?;
        }

        self.state.temp_operator = None;
        self.state.local_data_width = None;
        Ok(())
    }

    fn operator(&mut self, desc: Descriptor) -> Result<()> {
        if self.state.apply_operator(desc) {
            return Ok(());
        }
        match desc.x {
            5 => {
                let base_bytes = self.input.take_bytes(desc.y as usize)?;
                let octets = self.input.take_bits(6)? as u32;
                let inc_offset = self.input.position();
                skip_bits(&mut self.input, self.n_subsets * octets as usize * 8)?;
                self.refs.push(CompressedRef {
                    desc,
                    bits: desc.y as u32 * 8,
                    base: 0,
                    inc_bits: octets,
                    inc_offset,
                    scale: 0,
                    reference: 0,
                    base_bytes: Some(base_bytes),
                    flags: AtomFlags::STRING,
                })?;
            }
            22 | 35 | 36 | 37 => {
                // 0 31 031 runs still decode as plain elements, only the
                // quality pairing is skipped for compressed data
                log::debug!(
                    "Bitmap operator 2 {:02} {:03} in compressed data, quality links are not tracked",
                    desc.x,
                    desc.y
                );
            }
            x => log::debug!("Operator 2 {:02} {:03} is not supported, ignoring", x, desc.y),
        }
        Ok(())
    }

    /// Skips one discarded element in base plus increment form.
    fn skip_run(&mut self, width: u32) -> Result<()> {
        self.input.take_bits(width as usize)?;
        let inc_bits = self.input.take_bits(6)? as usize;
        skip_bits(&mut self.input, self.n_subsets * inc_bits)
    }
}

/// Position of the decode within the current message.
#[derive(Debug, Default, Clone, Copy)]
struct Cursor {
    bit_pos: usize,
    subset_no: usize,
    n_subsets: usize,
    compressed: bool,
    started: bool,
}

/// Decode context holding the table handle and all per-message scratch
/// state.
///
/// ```no_run
/// # fn main() -> bufrdec::Result<()> {
/// let file = bufrdec::parse("synop.bufr")?;
/// for block in file.messages() {
///     let mut decoder = bufrdec::Decoder::from_message(block)?;
///     decoder.start_message(block)?;
///     while let Some(subset) = decoder.next_subset(block)? {
///         for atom in subset.atoms() {
///             println!("{} = {}", atom.desc, atom.value);
///         }
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Decoder {
    tables: Arc<TableStore>,
    tree: ExpandedTree,
    seq: SubsetSequence,
    refs: CompressedRefs,
    bitmaps: BitmapSet,
    error: ErrorSlot,
    cursor: Cursor,
}

impl Decoder {
    /// A decoder with an empty table store. Useful together with
    /// [`substitute_tables`](Self::substitute_tables).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(tables: Arc<TableStore>) -> Self {
        Decoder {
            tables,
            ..Default::default()
        }
    }

    /// A decoder primed with the tables the message's section 1
    /// advertises, loaded from the configured table directory.
    pub fn from_message(block: &MessageBlock) -> Result<Self> {
        let tables = block.load_tables()?;
        Ok(Self::with_tables(tables))
    }

    pub fn tables(&self) -> &Arc<TableStore> {
        &self.tables
    }

    /// Swaps in a different table set and returns the previous one.
    /// `None` installs an empty store.
    pub fn substitute_tables(&mut self, tables: Option<Arc<TableStore>>) -> Arc<TableStore> {
        mem::replace(&mut self.tables, tables.unwrap_or_default())
    }

    /// Primes the context for one message: expands the descriptor tree
    /// and, for compressed data, compiles the element layout table.
    pub fn start_message(&mut self, message: &BufrMessage) -> Result<()> {
        self.error.clear();
        match self.start_inner(message) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.error.set(&err);
                Err(err)
            }
        }
    }

    fn start_inner(&mut self, message: &BufrMessage) -> Result<()> {
        self.tree.clean()?;
        self.seq.clean()?;
        self.refs.clean()?;
        self.bitmaps.clean()?;

        let descriptors = message.descriptors()?;
        self.tree.expand(&descriptors, &self.tables)?;

        self.cursor = Cursor {
            bit_pos: 0,
            subset_no: 0,
            n_subsets: message.subsets_count() as usize,
            compressed: message.is_compressed(),
            started: true,
        };

        if self.cursor.compressed {
            let data = message.data_block()?;
            let compiler = Compiler::new(
                &self.tables,
                &self.tree,
                BitInput::new(data),
                &mut self.refs,
                self.cursor.n_subsets,
            );
            compiler.run()?;
        }
        Ok(())
    }

    /// Decodes the next subset into the sequence buffer. Returns `None`
    /// once every subset of the message has been yielded.
    pub fn next_subset(&mut self, message: &BufrMessage) -> Result<Option<&SubsetSequence>> {
        self.error.clear();
        match self.next_inner(message) {
            Ok(true) => Ok(Some(&self.seq)),
            Ok(false) => Ok(None),
            Err(err) => {
                self.error.set(&err);
                Err(err)
            }
        }
    }

    fn next_inner(&mut self, message: &BufrMessage) -> Result<bool> {
        if !self.cursor.started {
            return Err(Error::ParseError(
                "No message has been started".to_string(),
            ));
        }
        if self.cursor.subset_no >= self.cursor.n_subsets {
            return Ok(false);
        }
        self.seq.clean()?;

        let data = message.data_block()?;
        if self.cursor.compressed {
            for r in self.refs.refs() {
                self.seq.push(r.extract(data, self.cursor.subset_no)?)?;
            }
        } else {
            let walker = Walker::new(
                &self.tables,
                &self.tree,
                BitInput::at(data, self.cursor.bit_pos),
                &mut self.seq,
                &mut self.bitmaps,
            );
            self.cursor.bit_pos = walker.run()?;
        }
        self.cursor.subset_no += 1;
        Ok(true)
    }

    /// Subsets decoded so far from the current message.
    pub fn subset_index(&self) -> usize {
        self.cursor.subset_no
    }

    /// The failure recorded by the most recent operation, if any.
    pub fn last_error(&self) -> Option<&str> {
        if self.error.is_empty() {
            None
        } else {
            Some(self.error.get())
        }
    }

    pub fn tree(&self) -> &ExpandedTree {
        &self.tree
    }

    pub fn bitmaps(&self) -> &BitmapSet {
        &self.bitmaps
    }

    pub fn compressed_refs(&self) -> &CompressedRefs {
        &self.refs
    }

    /// Resets per-message state, keeping allocated storage for reuse.
    /// A new message must be started before decoding again.
    pub fn clean(&mut self) -> Result<()> {
        self.error.clear();
        self.tree.clean()?;
        self.seq.clean()?;
        self.refs.clean()?;
        self.bitmaps.clean()?;
        self.cursor = Cursor::default();
        Ok(())
    }

    /// Releases all scratch storage. The decoder stays usable; buffers
    /// reallocate on the next message.
    pub fn free(&mut self) {
        self.tree.free();
        self.seq.free();
        self.refs.free();
        self.bitmaps.free();
        self.error.clear();
        self.cursor = Cursor::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_bytes;
    use crate::tables::SequenceEntry;
    use crate::test_support::{MessageBuilder, pack_bits};

    fn element(
        f: u8,
        x: u8,
        y: u8,
        name: &str,
        unit: &str,
        scale: i32,
        reference: i64,
        bits: u32,
    ) -> ElementEntry {
        ElementEntry {
            descriptor: Descriptor::new(f, x, y),
            name: name.to_string(),
            unit: unit.to_string(),
            scale,
            reference,
            bits,
        }
    }

    fn test_store() -> Arc<TableStore> {
        let mut store = TableStore::new();
        for e in [
            element(0, 1, 1, "WMO block number", "Numeric", 0, 0, 7),
            element(0, 1, 2, "WMO station number", "Numeric", 0, 0, 10),
            element(0, 1, 15, "Station or site name", "CCITT IA5", 0, 0, 32),
            element(0, 2, 1, "Type of station", "Code table", 0, 0, 2),
            element(0, 10, 4, "Pressure", "Pa", -1, 0, 14),
            element(0, 12, 101, "Temperature/air temperature", "K", 2, 0, 16),
            element(
                0,
                31,
                1,
                "Delayed descriptor replication factor",
                "Numeric",
                0,
                0,
                8,
            ),
            element(0, 31, 21, "Associated field significance", "Code table", 0, 0, 6),
            element(0, 31, 31, "Data present indicator", "Flag table", 0, 0, 1),
            element(0, 33, 7, "Per cent confidence", "%", 0, 0, 7),
        ] {
            store.insert_element(e);
        }
        store.insert_sequence(SequenceEntry {
            descriptor: Descriptor::new(3, 1, 1),
            title: Some("WMO station identification".to_string()),
            chain: vec![Descriptor::new(0, 1, 1), Descriptor::new(0, 1, 2)],
        });
        Arc::new(store)
    }

    fn single_message(raw: &[u8]) -> MessageBlock {
        let file = parse_bytes(raw).unwrap();
        file.message_at(0).unwrap().clone()
    }

    fn decode_single(raw: &[u8]) -> Vec<Atom> {
        let block = single_message(raw);
        let mut dec = Decoder::with_tables(test_store());
        dec.start_message(&block).unwrap();
        let subset = dec.next_subset(&block).unwrap().unwrap();
        subset.atoms().to_vec()
    }

    #[test]
    fn decodes_a_station_report() {
        let raw = MessageBuilder::edition4()
            .descriptors(&[Descriptor::new(3, 1, 1), Descriptor::new(0, 12, 101)])
            .data(&pack_bits(&[(12, 7), (345, 10), (27315, 16)]))
            .build();
        let atoms = decode_single(&raw);

        assert_eq!(atoms.len(), 3);
        assert_eq!(atoms[0].desc, Descriptor::new(0, 1, 1));
        assert_eq!(atoms[0].ival, 12);
        assert_eq!(atoms[1].ival, 345);
        assert_eq!(atoms[2].desc, Descriptor::new(0, 12, 101));
        assert!((atoms[2].value - 273.15).abs() < 1e-6);
    }

    #[test]
    fn subsets_end_with_none() {
        let raw = MessageBuilder::edition4()
            .descriptors(&[Descriptor::new(0, 1, 1)])
            .data(&pack_bits(&[(12, 7)]))
            .build();
        let block = single_message(&raw);
        let mut dec = Decoder::with_tables(test_store());
        dec.start_message(&block).unwrap();

        assert!(dec.next_subset(&block).unwrap().is_some());
        assert!(dec.next_subset(&block).unwrap().is_none());
        assert_eq!(dec.subset_index(), 1);
    }

    #[test]
    fn all_ones_decodes_as_missing() {
        let raw = MessageBuilder::edition4()
            .descriptors(&[Descriptor::new(0, 2, 1), Descriptor::new(0, 1, 1)])
            .data(&pack_bits(&[(3, 2), (12, 7)]))
            .build();
        let atoms = decode_single(&raw);

        assert!(atoms[0].is_missing());
        assert!(atoms[0].flags.contains(AtomFlags::CODE_TABLE));
        assert_eq!(atoms[1].ival, 12);
    }

    #[test]
    fn strings_trim_padding_and_detect_missing() {
        let mut fields = vec![
            (b'O' as u64, 8u32),
            (b'S' as u64, 8),
            (b'L' as u64, 8),
            (0x20, 8),
        ];
        fields.extend([(0xFFu64, 8u32); 4]);
        let raw = MessageBuilder::edition4()
            .descriptors(&[Descriptor::new(0, 1, 15), Descriptor::new(0, 1, 15)])
            .data(&pack_bits(&fields))
            .build();
        let atoms = decode_single(&raw);

        assert_eq!(atoms[0].text.as_deref(), Some("OSL"));
        assert!(atoms[1].is_missing());
        assert!(atoms[1].flags.contains(AtomFlags::STRING));
    }

    #[test]
    fn fixed_replication_repeats_the_body() {
        let raw = MessageBuilder::edition3()
            .descriptors(&[Descriptor::new(1, 1, 3), Descriptor::new(0, 1, 1)])
            .data(&pack_bits(&[(1, 7), (2, 7), (3, 7)]))
            .build();
        let atoms = decode_single(&raw);

        assert_eq!(
            atoms.iter().map(|a| a.ival).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn delayed_replication_consumes_the_count() {
        let raw = MessageBuilder::edition4()
            .descriptors(&[
                Descriptor::new(1, 1, 0),
                Descriptor::new(0, 31, 1),
                Descriptor::new(0, 12, 101),
                Descriptor::new(0, 1, 1),
            ])
            .data(&pack_bits(&[(2, 8), (27315, 16), (27425, 16), (12, 7)]))
            .build();
        let atoms = decode_single(&raw);

        // the count itself never becomes an atom
        assert_eq!(atoms.len(), 3);
        assert_eq!(atoms[0].desc, Descriptor::new(0, 12, 101));
        assert!((atoms[1].value - 274.25).abs() < 1e-6);
        assert_eq!(atoms[2].ival, 12);
    }

    #[test]
    fn zero_count_skips_the_replicated_body() {
        let raw = MessageBuilder::edition4()
            .descriptors(&[
                Descriptor::new(1, 1, 0),
                Descriptor::new(0, 31, 1),
                Descriptor::new(0, 12, 101),
                Descriptor::new(0, 1, 1),
            ])
            .data(&pack_bits(&[(0, 8), (12, 7)]))
            .build();
        let atoms = decode_single(&raw);

        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].desc, Descriptor::new(0, 1, 1));
        assert_eq!(atoms[0].ival, 12);
    }

    #[test]
    fn width_and_scale_operators_apply_and_cancel() {
        let raw = MessageBuilder::edition4()
            .descriptors(&[
                Descriptor::new(2, 1, 131),
                Descriptor::new(2, 2, 129),
                Descriptor::new(0, 12, 101),
                Descriptor::new(2, 2, 0),
                Descriptor::new(2, 1, 0),
                Descriptor::new(0, 12, 101),
            ])
            .data(&pack_bits(&[(273153, 19), (27315, 16)]))
            .build();
        let atoms = decode_single(&raw);

        assert!((atoms[0].value - 273.153).abs() < 1e-6);
        assert!((atoms[1].value - 273.15).abs() < 1e-6);
    }

    #[test]
    fn scale_reference_width_operator() {
        let raw = MessageBuilder::edition4()
            .descriptors(&[
                Descriptor::new(2, 7, 1),
                Descriptor::new(0, 12, 101),
                Descriptor::new(2, 7, 0),
                Descriptor::new(0, 12, 101),
            ])
            .data(&pack_bits(&[(273153, 20), (27315, 16)]))
            .build();
        let atoms = decode_single(&raw);

        assert!((atoms[0].value - 273.153).abs() < 1e-6);
        assert!((atoms[1].value - 273.15).abs() < 1e-6);
    }

    #[test]
    fn local_width_covers_unknown_descriptors() {
        let raw = MessageBuilder::edition4()
            .descriptors(&[
                Descriptor::new(2, 6, 12),
                Descriptor::new(0, 63, 255),
                Descriptor::new(0, 1, 1),
            ])
            .data(&pack_bits(&[(0xABC, 12), (12, 7)]))
            .build();
        let atoms = decode_single(&raw);

        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].ival, 12);
    }

    #[test]
    fn reference_redefinitions_are_read_and_dropped() {
        let raw = MessageBuilder::edition4()
            .descriptors(&[
                Descriptor::new(2, 3, 8),
                Descriptor::new(0, 12, 101),
                Descriptor::new(2, 3, 255),
                Descriptor::new(0, 12, 101),
            ])
            .data(&pack_bits(&[(200, 8), (27315, 16)]))
            .build();
        let atoms = decode_single(&raw);

        assert_eq!(atoms.len(), 1);
        assert!((atoms[0].value - 273.15).abs() < 1e-6);
    }

    #[test]
    fn associated_fields_are_skipped() {
        let raw = MessageBuilder::edition4()
            .descriptors(&[
                Descriptor::new(2, 4, 8),
                Descriptor::new(0, 31, 21),
                Descriptor::new(0, 12, 101),
                Descriptor::new(2, 4, 0),
                Descriptor::new(0, 12, 101),
            ])
            .data(&pack_bits(&[(1, 6), (0xAA, 8), (27315, 16), (27425, 16)]))
            .build();
        let atoms = decode_single(&raw);

        assert_eq!(atoms.len(), 3);
        assert_eq!(atoms[0].desc, Descriptor::new(0, 31, 21));
        assert_eq!(atoms[0].ival, 1);
        assert!((atoms[1].value - 273.15).abs() < 1e-6);
        assert!((atoms[2].value - 274.25).abs() < 1e-6);
    }

    #[test]
    fn character_operator_pushes_literal_text() {
        let raw = MessageBuilder::edition4()
            .descriptors(&[Descriptor::new(2, 5, 4), Descriptor::new(0, 1, 1)])
            .data(&pack_bits(&[
                (b'N' as u64, 8),
                (b'I' as u64, 8),
                (b'L' as u64, 8),
                (0x20, 8),
                (12, 7),
            ]))
            .build();
        let atoms = decode_single(&raw);

        assert_eq!(atoms[0].desc, Descriptor::new(2, 5, 4));
        assert_eq!(atoms[0].text.as_deref(), Some("NIL"));
        assert_eq!(atoms[1].ival, 12);
    }

    #[test]
    fn bitmap_attaches_quality_to_targets() {
        let raw = MessageBuilder::edition4()
            .descriptors(&[
                Descriptor::new(0, 12, 101),
                Descriptor::new(0, 10, 4),
                Descriptor::new(2, 22, 0),
                Descriptor::new(2, 36, 0),
                Descriptor::new(1, 1, 2),
                Descriptor::new(0, 31, 31),
                Descriptor::new(0, 33, 7),
                Descriptor::new(0, 33, 7),
            ])
            .data(&pack_bits(&[
                (27315, 16),
                (10132, 14),
                (0, 1),
                (0, 1),
                (95, 7),
                (80, 7),
            ]))
            .build();
        let block = single_message(&raw);
        let mut dec = Decoder::with_tables(test_store());
        dec.start_message(&block).unwrap();
        let atoms = dec.next_subset(&block).unwrap().unwrap().atoms().to_vec();

        assert_eq!(atoms.len(), 6);
        assert!((atoms[1].value - 101320.0).abs() < 1e-6);
        assert_eq!(atoms[4].ival, 95);
        assert!(atoms[4].flags.contains(AtomFlags::QUALITY));
        assert!(atoms[5].flags.contains(AtomFlags::QUALITY));

        let bitmap = dec.bitmaps().get(0).unwrap();
        assert_eq!(bitmap.quality, vec![(0, 4), (1, 5)]);
    }

    #[test]
    fn recalled_bitmap_restarts_pairing() {
        let raw = MessageBuilder::edition4()
            .descriptors(&[
                Descriptor::new(0, 12, 101),
                Descriptor::new(0, 10, 4),
                Descriptor::new(2, 36, 0),
                Descriptor::new(1, 1, 2),
                Descriptor::new(0, 31, 31),
                Descriptor::new(0, 33, 7),
                Descriptor::new(0, 33, 7),
                Descriptor::new(2, 37, 0),
                Descriptor::new(0, 33, 7),
                Descriptor::new(2, 37, 255),
                Descriptor::new(0, 33, 7),
            ])
            .data(&pack_bits(&[
                (27315, 16),
                (10132, 14),
                (0, 1),
                (0, 1),
                (95, 7),
                (80, 7),
                (90, 7),
                (85, 7),
            ]))
            .build();
        let block = single_message(&raw);
        let mut dec = Decoder::with_tables(test_store());
        dec.start_message(&block).unwrap();
        let atoms = dec.next_subset(&block).unwrap().unwrap().atoms().to_vec();

        assert_eq!(atoms.len(), 8);
        assert!(atoms[6].flags.contains(AtomFlags::QUALITY));
        assert!(!atoms[7].flags.contains(AtomFlags::QUALITY));

        let bitmap = dec.bitmaps().get(0).unwrap();
        assert_eq!(bitmap.quality, vec![(0, 4), (1, 5), (0, 6)]);
    }

    #[test]
    fn cancel_back_reference_stops_attachment() {
        let raw = MessageBuilder::edition4()
            .descriptors(&[
                Descriptor::new(0, 12, 101),
                Descriptor::new(2, 36, 0),
                Descriptor::new(1, 1, 1),
                Descriptor::new(0, 31, 31),
                Descriptor::new(2, 35, 0),
                Descriptor::new(0, 33, 7),
            ])
            .data(&pack_bits(&[(27315, 16), (0, 1), (95, 7)]))
            .build();
        let atoms = decode_single(&raw);

        assert_eq!(atoms.len(), 3);
        assert!(!atoms[2].flags.contains(AtomFlags::QUALITY));
    }

    #[test]
    fn compressed_increments_reconstruct_subsets() {
        let raw = MessageBuilder::edition4()
            .subsets(2, true)
            .descriptors(&[Descriptor::new(0, 12, 101), Descriptor::new(0, 1, 1)])
            .data(&pack_bits(&[
                (27300, 16),
                (5, 6),
                (5, 5),
                (15, 5),
                (12, 7),
                (0, 6),
            ]))
            .build();
        let block = single_message(&raw);
        let mut dec = Decoder::with_tables(test_store());
        dec.start_message(&block).unwrap();
        assert_eq!(dec.compressed_refs().len(), 2);

        let first = dec.next_subset(&block).unwrap().unwrap();
        assert!((first.atoms()[0].value - 273.05).abs() < 1e-6);
        assert_eq!(first.atoms()[1].ival, 12);

        let second = dec.next_subset(&block).unwrap().unwrap();
        assert!((second.atoms()[0].value - 273.15).abs() < 1e-6);
        assert_eq!(second.atoms()[1].ival, 12);

        assert!(dec.next_subset(&block).unwrap().is_none());
    }

    #[test]
    fn compressed_missing_increment_marks_one_subset() {
        let raw = MessageBuilder::edition4()
            .subsets(2, true)
            .descriptors(&[Descriptor::new(0, 12, 101)])
            .data(&pack_bits(&[(27300, 16), (4, 6), (5, 4), (15, 4)]))
            .build();
        let block = single_message(&raw);
        let mut dec = Decoder::with_tables(test_store());
        dec.start_message(&block).unwrap();

        let first = dec.next_subset(&block).unwrap().unwrap();
        assert!((first.atoms()[0].value - 273.05).abs() < 1e-6);

        let second = dec.next_subset(&block).unwrap().unwrap();
        assert!(second.atoms()[0].is_missing());
    }

    #[test]
    fn compressed_strings_vary_by_subset() {
        let raw = MessageBuilder::edition4()
            .subsets(2, true)
            .descriptors(&[Descriptor::new(0, 1, 15)])
            .data(&pack_bits(&[
                (0x20, 8),
                (0x20, 8),
                (0x20, 8),
                (0x20, 8),
                (4, 6),
                (b'W' as u64, 8),
                (b'X' as u64, 8),
                (b'Y' as u64, 8),
                (b'Z' as u64, 8),
                (0xFF, 8),
                (0xFF, 8),
                (0xFF, 8),
                (0xFF, 8),
            ]))
            .build();
        let block = single_message(&raw);
        let mut dec = Decoder::with_tables(test_store());
        dec.start_message(&block).unwrap();

        let first = dec.next_subset(&block).unwrap().unwrap();
        assert_eq!(first.atoms()[0].text.as_deref(), Some("WXYZ"));

        let second = dec.next_subset(&block).unwrap().unwrap();
        assert!(second.atoms()[0].is_missing());
        assert!(second.atoms()[0].flags.contains(AtomFlags::STRING));
    }

    #[test]
    fn compressed_delayed_counts_are_shared() {
        let raw = MessageBuilder::edition4()
            .subsets(2, true)
            .descriptors(&[
                Descriptor::new(1, 1, 0),
                Descriptor::new(0, 31, 1),
                Descriptor::new(0, 1, 1),
            ])
            .data(&pack_bits(&[
                (2, 8),
                (0, 6),
                (7, 7),
                (2, 6),
                (1, 2),
                (2, 2),
                (20, 7),
                (0, 6),
            ]))
            .build();
        let block = single_message(&raw);
        let mut dec = Decoder::with_tables(test_store());
        dec.start_message(&block).unwrap();
        assert_eq!(dec.compressed_refs().len(), 2);

        let first = dec.next_subset(&block).unwrap().unwrap();
        assert_eq!(
            first.atoms().iter().map(|a| a.ival).collect::<Vec<_>>(),
            vec![8, 20]
        );

        let second = dec.next_subset(&block).unwrap().unwrap();
        assert_eq!(
            second.atoms().iter().map(|a| a.ival).collect::<Vec<_>>(),
            vec![9, 20]
        );
    }

    #[test]
    fn compressed_counts_must_not_vary() {
        let raw = MessageBuilder::edition4()
            .subsets(2, true)
            .descriptors(&[
                Descriptor::new(1, 1, 0),
                Descriptor::new(0, 31, 1),
                Descriptor::new(0, 1, 1),
            ])
            .data(&pack_bits(&[(2, 8), (1, 6), (0, 1), (0, 1)]))
            .build();
        let block = single_message(&raw);
        let mut dec = Decoder::with_tables(test_store());

        assert!(dec.start_message(&block).is_err());
        assert!(dec.last_error().unwrap().contains("replication"));
    }

    #[test]
    fn decode_failures_land_in_the_error_slot() {
        let raw = MessageBuilder::edition4()
            .descriptors(&[Descriptor::new(0, 63, 255)])
            .data(&pack_bits(&[(0, 7)]))
            .build();
        let block = single_message(&raw);
        let mut dec = Decoder::with_tables(test_store());
        dec.start_message(&block).unwrap();

        assert!(dec.next_subset(&block).is_err());
        assert!(dec.last_error().unwrap().contains("0 63 255"));
    }

    #[test]
    fn next_subset_requires_a_started_message() {
        let raw = MessageBuilder::edition4()
            .descriptors(&[Descriptor::new(0, 1, 1)])
            .data(&pack_bits(&[(12, 7)]))
            .build();
        let block = single_message(&raw);
        let mut dec = Decoder::with_tables(test_store());

        assert!(dec.next_subset(&block).is_err());
        assert!(dec.last_error().unwrap().contains("started"));
    }

    #[test]
    fn substitute_tables_swaps_the_store() {
        let store = test_store();
        let mut dec = Decoder::with_tables(store.clone());

        let previous = dec.substitute_tables(None);
        assert!(Arc::ptr_eq(&previous, &store));
        assert!(dec.tables().is_empty());

        dec.substitute_tables(Some(store.clone()));
        assert!(Arc::ptr_eq(dec.tables(), &store));
    }

    #[test]
    fn uncompressed_subsets_resume_at_the_next_bit() {
        let raw = MessageBuilder::edition4()
            .subsets(2, false)
            .descriptors(&[Descriptor::new(0, 1, 1)])
            .data(&pack_bits(&[(12, 7), (34, 7)]))
            .build();
        let block = single_message(&raw);
        let mut dec = Decoder::with_tables(test_store());
        dec.start_message(&block).unwrap();

        assert_eq!(dec.next_subset(&block).unwrap().unwrap().atoms()[0].ival, 12);
        assert_eq!(dec.next_subset(&block).unwrap().unwrap().atoms()[0].ival, 34);
        assert!(dec.next_subset(&block).unwrap().is_none());
    }

    #[test]
    fn clean_and_free_reset_the_context() {
        let raw = MessageBuilder::edition4()
            .descriptors(&[Descriptor::new(0, 1, 1)])
            .data(&pack_bits(&[(12, 7)]))
            .build();
        let block = single_message(&raw);
        let mut dec = Decoder::with_tables(test_store());
        dec.start_message(&block).unwrap();
        dec.next_subset(&block).unwrap().unwrap();

        dec.clean().unwrap();
        assert_eq!(dec.subset_index(), 0);
        assert!(dec.next_subset(&block).is_err());

        dec.free();
        assert!(!dec.bitmaps().is_allocated());

        dec.start_message(&block).unwrap();
        assert!(dec.next_subset(&block).unwrap().is_some());
    }

    #[test]
    fn long_errors_are_truncated() {
        let mut slot = ErrorSlot::default();
        slot.set(&Error::ParseError("x".repeat(MAX_ERROR_LEN * 2)));

        assert!(slot.get().len() <= MAX_ERROR_LEN);
        assert!(slot.get().starts_with("Parse Error"));
    }
}
