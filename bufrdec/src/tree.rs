use crate::descriptor::Descriptor;
use crate::errors::{Error, Result};
use crate::scratch::{MAX_TREE_DEPTH, MAX_TREE_SEQS, Scratch, alloc_vec};
use crate::tables::TableStore;

/// One position in an expanded sequence. Sequence descriptors point at the
/// child node holding their Table D chain.
#[derive(Debug, Clone, Copy)]
pub struct DescItem {
    pub desc: Descriptor,
    pub child: Option<usize>,
}

/// A descriptor run at one nesting level. The root node carries the
/// unexpanded descriptors of section 3; every Table D reference below it
/// gets its own node.
#[derive(Debug, Clone)]
pub struct SeqNode {
    /// The sequence descriptor this node expands, None for the root.
    pub key: Option<Descriptor>,
    pub level: usize,
    pub descs: Vec<DescItem>,
}

/// Arena of expanded sequences for the current message. One allocation per
/// decode context, rebuilt per message; replication is left to the data
/// walk since delayed counts are only known then.
#[derive(Debug, Default)]
pub struct ExpandedTree {
    seqs: Option<Vec<SeqNode>>,
}

impl ExpandedTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the tree from section 3's descriptor list, resolving every
    /// sequence descriptor through Table D.
    pub fn expand(&mut self, descriptors: &[Descriptor], tables: &TableStore) -> Result<()> {
        self.clean()?;
        let mut seqs = self.seqs.take().unwrap_or_default();
        let result = build_seq(&mut seqs, None, 0, descriptors, tables);
        self.seqs = Some(seqs);
        result.map(|_| ())
    }

    pub fn root(&self) -> Option<&SeqNode> {
        self.seqs().first()
    }

    pub fn seq(&self, index: usize) -> Option<&SeqNode> {
        self.seqs().get(index)
    }

    pub fn seqs(&self) -> &[SeqNode] {
        self.seqs.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.seqs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.seqs.as_ref().map(|s| s.capacity()).unwrap_or(0)
    }
}

fn build_seq(
    seqs: &mut Vec<SeqNode>,
    key: Option<Descriptor>,
    level: usize,
    chain: &[Descriptor],
    tables: &TableStore,
) -> Result<usize> {
    if level > MAX_TREE_DEPTH {
        return Err(Error::ParseError(format!(
            "Sequence nesting deeper than {} levels at {}",
            MAX_TREE_DEPTH,
            key.map(|d| d.to_string()).unwrap_or_default()
        )));
    }
    if seqs.len() >= MAX_TREE_SEQS {
        return Err(Error::CapacityExceeded {
            what: "expanded sequences",
            limit: MAX_TREE_SEQS,
        });
    }

    let index = seqs.len();
    seqs.push(SeqNode {
        key,
        level,
        descs: Vec::with_capacity(chain.len()),
    });

    for desc in chain {
        let child = if desc.is_sequence() {
            let entry = tables
                .lookup_sequence(desc)
                .ok_or(Error::MissingTableD(*desc))?;
            let chain = entry.chain.clone();
            Some(build_seq(seqs, Some(*desc), level + 1, &chain, tables)?)
        } else {
            None
        };
        seqs[index].descs.push(DescItem { desc: *desc, child });
    }

    Ok(index)
}

impl Scratch for ExpandedTree {
    fn init(&mut self) -> Result<()> {
        self.seqs = Some(alloc_vec("expanded sequences", MAX_TREE_SEQS)?);
        Ok(())
    }

    fn clean(&mut self) -> Result<()> {
        match self.seqs.as_mut() {
            Some(seqs) => {
                seqs.clear();
                Ok(())
            }
            None => self.init(),
        }
    }

    fn free(&mut self) {
        self.seqs = None;
    }

    fn is_allocated(&self) -> bool {
        self.seqs.is_some()
    }
}
