//! Leaf counting pass.
//!
//! Walks the type map (and the shape of the dataset) to find how many descriptors a
//! rehydration needs, without allocating any of them. The descriptor builder visits
//! the same leaves in the same order, so the two passes must agree; the session
//! checks that they do.

use tracing::debug;

use crate::dataset::{EntryKind, ParameterTable};
use crate::descriptor::LeafCounts;
use crate::error::{Result, SwapError};
use crate::typemap::TypeMap;
use crate::value::Value;

/// Number of leaves contributed by one value of the given type and shape.
///
/// A leaf type (no children, or any fixed-point quantity) counts as one leaf whatever
/// its dimensions. A structured type counts the leaves of all its fields, multiplied
/// by the element count of `dimension` when it is a struct array.
pub fn count_leaves<M: TypeMap + ?Sized>(
    type_map: &M,
    data_type: usize,
    dimension: usize,
    fixed_point: usize,
) -> Result<usize> {
    if type_map.is_leaf(data_type, fixed_point)? {
        return Ok(1);
    }

    let mut per_instance = 0usize;
    for child in 0..type_map.child_count(data_type)? {
        let element = type_map.element(data_type, child)?;
        let leaves = count_leaves(
            type_map,
            element.data_type,
            element.dimension,
            element.fixed_point,
        )?;
        per_instance = per_instance
            .checked_add(leaves)
            .ok_or_else(|| too_many_leaves(data_type))?;
    }

    per_instance
        .checked_mul(type_map.element_count(dimension)?)
        .ok_or_else(|| too_many_leaves(data_type))
}

fn too_many_leaves(data_type: usize) -> SwapError {
    SwapError::validation(format!(
        "data type {data_type} expands to more leaves than can be addressed"
    ))
}

/// Counts the struct and non-struct leaves of every entry in a parameter table.
///
/// Flat and absent `values` contribute one non-struct leaf each. Struct cells
/// contribute the leaves of every non-empty slot, resolved through the slot's
/// `structParamInfo` record.
pub fn count_dataset<M: TypeMap + ?Sized>(
    params: &ParameterTable<'_>,
    type_map: &M,
) -> Result<LeafCounts> {
    let mut counts = LeafCounts {
        top_level_entries: params.len(),
        ..LeafCounts::default()
    };

    for entry in 0..params.len() {
        match params.kind(entry) {
            EntryKind::Absent | EntryKind::Flat => counts.non_struct_leaves += 1,
            EntryKind::EmptyCell => {}
            EntryKind::StructCell { len } => {
                let metas = params.record_metas(entry, len)?;
                let cell = params.values(entry).and_then(Value::as_cell);
                for (pos, meta) in metas.iter().enumerate() {
                    if cell.and_then(|c| c.get(pos)).is_none() {
                        continue;
                    }
                    let param = type_map.parameter(meta.scope, meta.index)?;
                    let leaves = count_leaves(
                        type_map,
                        param.data_type,
                        param.dimension,
                        param.fixed_point,
                    )?;
                    counts.struct_leaves = counts
                        .struct_leaves
                        .checked_add(leaves)
                        .ok_or_else(|| too_many_leaves(param.data_type))?;
                }
            }
        }
    }

    debug!(
        entries = counts.top_level_entries,
        struct_leaves = counts.struct_leaves,
        non_struct_leaves = counts.non_struct_leaves,
        "counted dataset leaves"
    );
    Ok(counts)
}
