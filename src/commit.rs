//! Commit pass: copies every leaf descriptor into the live parameter block.
//!
//! For each leaf, in table order:
//!
//! 1. Leaves with no elements are skipped.
//! 2. The authoritative element size is reconciled: the type map's size for struct
//!    leaves (halved for complex types, whose real and imaginary parts travel in
//!    separate buffers), the live size table for non-struct leaves.
//! 3. Non-struct leaves are size-checked and their destination is resolved through the
//!    transition table.
//! 4. Bytes are copied contiguously, or interleaved real/imaginary for complex leaves.
//!
//! With [`CommitMode::InPlace`] a failure on leaf `k` leaves leaves `0..k` written. This
//! is the engine's known consistency gap; [`CommitMode::Staged`] closes it by
//! committing into a copy of the block and publishing the copy only on success.

use tracing::{debug, trace};

use crate::descriptor::{DescriptorTable, LeafDescriptor, LeafTarget};
use crate::error::{Result, SwapError};
use crate::live::{Address, LiveTables};
use crate::typemap::TypeMap;

/// How leaves reach the live parameter block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommitMode {
    /// Write each leaf straight into live memory. A commit failure leaves the leaves
    /// before it written.
    #[default]
    InPlace,
    /// Write into a staging copy of the block and copy it back only if every leaf
    /// succeeded. Costs one block-sized allocation per commit.
    Staged,
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Leaves whose bytes were copied.
    pub leaves_written: usize,
    /// Leaves skipped because they carried no elements.
    pub leaves_skipped: usize,
    /// Total bytes written into the block.
    pub bytes_written: usize,
}

/// Commits `table` using the given mode.
pub fn commit_with_mode<M, L>(
    mode: CommitMode,
    table: &DescriptorTable,
    type_map: &M,
    live: &L,
    memory: &mut [u8],
) -> Result<CommitStats>
where
    M: TypeMap + ?Sized,
    L: LiveTables + ?Sized,
{
    match mode {
        CommitMode::InPlace => commit(table, type_map, live, memory),
        CommitMode::Staged => commit_staged(table, type_map, live, memory),
    }
}

/// Copies every leaf of `table` straight into `memory`.
pub fn commit<M, L>(
    table: &DescriptorTable,
    type_map: &M,
    live: &L,
    memory: &mut [u8],
) -> Result<CommitStats>
where
    M: TypeMap + ?Sized,
    L: LiveTables + ?Sized,
{
    let mut stats = CommitStats::default();
    for (index, leaf) in table.leaves().iter().enumerate() {
        match commit_leaf(index, leaf, type_map, live, memory)? {
            Some(bytes) => {
                stats.leaves_written += 1;
                stats.bytes_written += bytes;
            }
            None => stats.leaves_skipped += 1,
        }
    }
    Ok(stats)
}

/// All-or-nothing variant of [`commit`]: `memory` is only written if every leaf commits.
pub fn commit_staged<M, L>(
    table: &DescriptorTable,
    type_map: &M,
    live: &L,
    memory: &mut [u8],
) -> Result<CommitStats>
where
    M: TypeMap + ?Sized,
    L: LiveTables + ?Sized,
{
    let mut staging = Vec::new();
    staging.try_reserve_exact(memory.len()).map_err(|e| {
        SwapError::Allocation(format!(
            "cannot allocate a {} byte staging block: {e}",
            memory.len()
        ))
    })?;
    staging.extend_from_slice(memory);

    let stats = commit(table, type_map, live, &mut staging)?;
    memory.copy_from_slice(&staging);
    debug!(bytes = memory.len(), "published staged parameter block");
    Ok(stats)
}

/// Commits one leaf. Returns the number of bytes written, or `None` if it was skipped.
fn commit_leaf<M, L>(
    index: usize,
    leaf: &LeafDescriptor,
    type_map: &M,
    live: &L,
    memory: &mut [u8],
) -> Result<Option<usize>>
where
    M: TypeMap + ?Sized,
    L: LiveTables + ?Sized,
{
    if leaf.element_count == 0 {
        debug!(leaf = index, "skipping leaf without elements");
        return Ok(None);
    }

    let unit = reconciled_size(index, leaf, type_map, live)?;
    let n_params = leaf.declared_bytes()? / unit;

    let address = match leaf.target {
        LeafTarget::Struct { address, .. } => address,
        LeafTarget::Transition { index: transition } => {
            check_size(index, leaf, unit, type_map)?;
            live.transition_address(transition).ok_or_else(|| {
                SwapError::Commit(format!(
                    "leaf {index}: transition table has no entry {transition}"
                ))
            })?
        }
    };

    let real = leaf.real.as_deref().unwrap_or_default();
    let written = if leaf.complex {
        let pairs = if leaf.is_struct_leaf() {
            leaf.element_count
        } else {
            n_params
        };
        let len = copy_len(pairs, unit, index)?;
        let re = source(real, len, index, "real")?;
        let im = match leaf.imag.as_deref() {
            Some(imag) => Some(source(imag, len, index, "imaginary")?),
            None => None,
        };
        let written = copy_len(len, 2, index)?;
        let dst = destination(memory, address, written, index)?;
        interleave(dst, re, im, unit);
        written
    } else {
        let len = n_params * unit;
        let src = source(real, len, index, "real")?;
        destination(memory, address, len, index)?.copy_from_slice(src);
        len
    };

    trace!(leaf = index, %address, bytes = written, complex = leaf.complex, "committed leaf");
    Ok(Some(written))
}

fn reconciled_size<M, L>(
    index: usize,
    leaf: &LeafDescriptor,
    type_map: &M,
    live: &L,
) -> Result<usize>
where
    M: TypeMap + ?Sized,
    L: LiveTables + ?Sized,
{
    let size = if leaf.is_struct_leaf() {
        let size = type_map.byte_size(leaf.data_type)?;
        if leaf.complex {
            size / 2
        } else {
            size
        }
    } else {
        live.live_byte_size(leaf.data_type).ok_or_else(|| {
            SwapError::Commit(format!(
                "leaf {index}: the running model has no size for data type {}",
                leaf.data_type
            ))
        })?
    };

    if size == 0 {
        return Err(SwapError::Commit(format!(
            "leaf {index}: data type {} has a zero element size",
            leaf.data_type
        )));
    }
    Ok(size)
}

/// Built-in numeric types must match the live size exactly; other types (enumerations,
/// fixed-point containers) only need the live size to be a whole multiple.
fn check_size<M: TypeMap + ?Sized>(
    index: usize,
    leaf: &LeafDescriptor,
    live_size: usize,
    type_map: &M,
) -> Result<()> {
    let compatible = if type_map.is_builtin_numeric(leaf.data_type) {
        leaf.element_size == live_size
    } else {
        leaf.element_size != 0 && live_size % leaf.element_size == 0
    };

    if compatible {
        Ok(())
    } else {
        Err(SwapError::SizeMismatch {
            leaf: index,
            data_type: leaf.data_type,
            declared: leaf.element_size,
            live: live_size,
        })
    }
}

fn copy_len(count: usize, unit: usize, leaf: usize) -> Result<usize> {
    count.checked_mul(unit).ok_or_else(|| {
        SwapError::Commit(format!(
            "leaf {leaf}: {count} units of {unit} bytes exceed the addressable size"
        ))
    })
}

fn source<'a>(buf: &'a [u8], len: usize, leaf: usize, part: &str) -> Result<&'a [u8]> {
    buf.get(..len).ok_or_else(|| {
        SwapError::Commit(format!(
            "leaf {leaf}: {part} source holds {} bytes, {len} required",
            buf.len()
        ))
    })
}

fn destination(memory: &mut [u8], address: Address, len: usize, leaf: usize) -> Result<&mut [u8]> {
    let block = memory.len();
    let start = address.as_usize();
    start
        .checked_add(len)
        .and_then(|end| memory.get_mut(start..end))
        .ok_or_else(|| {
            SwapError::Commit(format!(
                "leaf {leaf}: destination {address} + {len} bytes lies outside the \
                 {block} byte parameter block"
            ))
        })
}

/// Writes `re[j]`, `im[j]` pairs of `unit` bytes. A missing imaginary part is written
/// as zeros.
fn interleave(dst: &mut [u8], re: &[u8], im: Option<&[u8]>, unit: usize) {
    let mut im_chunks = im.map(|im| im.chunks_exact(unit));
    for (pair, re_chunk) in dst.chunks_exact_mut(2 * unit).zip(re.chunks_exact(unit)) {
        let (dst_re, dst_im) = pair.split_at_mut(unit);
        dst_re.copy_from_slice(re_chunk);
        match im_chunks.as_mut().and_then(Iterator::next) {
            Some(im_chunk) => dst_im.copy_from_slice(im_chunk),
            None => dst_im.fill(0),
        }
    }
}
