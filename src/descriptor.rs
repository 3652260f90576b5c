//! Leaf descriptors and the descriptor table.
//!
//! One [`LeafDescriptor`] is produced per leaf of the dataset. It owns the source
//! buffers detached from the value tree and knows where its bytes go: either a direct
//! address (struct leaves) or a transition table index resolved at commit time
//! (non-struct leaves).

use crate::error::{Result, SwapError};
use crate::live::Address;
use crate::typemap::ParamScope;

/// Where a leaf's bytes are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafTarget {
    /// Leaf found while descending into a struct value; the address was computed from
    /// the parameter base address plus field offsets.
    Struct {
        /// Destination in the live block.
        address: Address,
        /// Parameter table the containing struct parameter belongs to.
        scope: ParamScope,
    },
    /// Top-level flat value; the destination is looked up in the live transition table.
    Transition {
        /// Transition table index.
        index: usize,
    },
}

/// One leaf of the dataset, ready to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafDescriptor {
    /// Data type index: a type map index for struct leaves, a live data type id for
    /// non-struct leaves.
    pub data_type: usize,
    /// Whether real and imaginary parts must be interleaved on commit.
    pub complex: bool,
    /// Element size declared by the source buffer.
    pub element_size: usize,
    /// Element count declared by the source buffer. Zero makes the commit a no-op.
    pub element_count: usize,
    /// Real part, detached from the value tree.
    pub real: Option<Vec<u8>>,
    /// Imaginary part, detached from the value tree.
    pub imag: Option<Vec<u8>>,
    /// Destination.
    pub target: LeafTarget,
}

impl LeafDescriptor {
    /// Whether the leaf was discovered inside a struct value.
    pub fn is_struct_leaf(&self) -> bool {
        matches!(self.target, LeafTarget::Struct { .. })
    }

    /// Declared payload size in bytes (`element_size * element_count`).
    pub fn declared_bytes(&self) -> Result<usize> {
        self.element_size
            .checked_mul(self.element_count)
            .ok_or_else(|| {
                SwapError::Commit(format!(
                    "{} elements of {} bytes exceed the addressable size",
                    self.element_count, self.element_size
                ))
            })
    }
}

/// Leaf counts produced by the counting pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeafCounts {
    /// Number of top-level dataset entries.
    pub top_level_entries: usize,
    /// Leaves found inside struct values.
    pub struct_leaves: usize,
    /// Flat top-level entries.
    pub non_struct_leaves: usize,
}

impl LeafCounts {
    /// Total number of descriptors the dataset needs.
    pub fn total(&self) -> usize {
        self.struct_leaves.saturating_add(self.non_struct_leaves)
    }
}

/// The descriptors of one rehydration attempt.
///
/// Created empty, sized from [`LeafCounts`], filled by the builder, read by the
/// committer. Dropping the table releases every detached buffer.
#[derive(Debug, Default)]
pub struct DescriptorTable {
    counts: LeafCounts,
    leaves: Vec<LeafDescriptor>,
}

impl DescriptorTable {
    /// Allocates room for exactly `counts.total()` descriptors.
    pub fn with_counts(counts: LeafCounts) -> Result<Self> {
        let mut leaves = Vec::new();
        leaves.try_reserve_exact(counts.total()).map_err(|e| {
            SwapError::Allocation(format!(
                "cannot allocate {} leaf descriptors: {e}",
                counts.total()
            ))
        })?;
        Ok(Self { counts, leaves })
    }

    /// Appends a descriptor. Fails if the table is already full.
    pub fn push(&mut self, leaf: LeafDescriptor) -> Result<()> {
        if self.leaves.len() >= self.counts.total() {
            return Err(SwapError::Internal(format!(
                "descriptor table overflow: counting pass sized it for {} leaves",
                self.counts.total()
            )));
        }
        self.leaves.push(leaf);
        Ok(())
    }

    /// Counts the table was sized from.
    pub fn counts(&self) -> LeafCounts {
        self.counts
    }

    /// Number of descriptors currently held.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Whether no descriptors are held.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Whether every slot sized by the counting pass has been filled.
    pub fn is_complete(&self) -> bool {
        self.leaves.len() == self.counts.total()
    }

    /// Descriptors in table order.
    pub fn leaves(&self) -> &[LeafDescriptor] {
        &self.leaves
    }
}
