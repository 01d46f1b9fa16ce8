use crate::errors::{Error, Result};

/// Most descriptors a single subset can expand to.
pub const MAX_SUBSET_ATOMS: usize = 16_384;

/// Most element layouts a compressed message can carry.
pub const MAX_COMPRESSED_REFS: usize = 16_384;

/// Most sequence nodes an expanded descriptor tree can hold.
pub const MAX_TREE_SEQS: usize = 512;

/// Deepest Table D nesting accepted before expansion is abandoned.
pub const MAX_TREE_DEPTH: usize = 16;

/// Most data-present bitmaps a single message can define.
pub const MAX_BITMAPS: usize = 8;

/// Upper bound on the retained diagnostic text.
pub const MAX_ERROR_LEN: usize = 1024;

/// Reusable decode buffers share one lifecycle: allocate once, reset in
/// place between uses, release on teardown.
///
/// `init` obtains backing storage at full capacity and empties the logical
/// contents. `clean` is the cheap between-uses reset: contents are emptied
/// while the storage stays allocated; on a buffer that was never initialized
/// it falls back to `init`. `free` releases the storage and may be called
/// repeatedly.
pub trait Scratch {
    fn init(&mut self) -> Result<()>;

    fn clean(&mut self) -> Result<()>;

    fn free(&mut self);

    fn is_allocated(&self) -> bool;
}

/// Fallible fixed-capacity allocation, so running out of memory surfaces as
/// a recoverable error instead of an abort.
pub(crate) fn alloc_vec<T>(what: &'static str, capacity: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(capacity)
        .map_err(|_| Error::Allocation { what, capacity })?;
    Ok(v)
}
