//! Descriptor building pass.
//!
//! Walks the type map and the value tree in lock-step and emits one
//! [`LeafDescriptor`] per leaf, in the same order [`crate::counter`] visits them.
//! Source buffers are detached from the value tree as they are consumed, so the
//! descriptor table becomes their sole owner.
//!
//! The two trees are shaped differently: the type map is a set of flat index tables,
//! the value tree is nested named records. The walk is driven by the type map; the
//! value side is tracked with a [`Cursor`] that may point at a node, at a single record
//! of a struct array, or at nothing (the dataset omits that part of the parameter).

use tracing::debug;

use crate::dataset::{EntryInfo, EntryKind, ParameterTable, RecordMeta, VALUES};
use crate::descriptor::{DescriptorTable, LeafDescriptor, LeafTarget};
use crate::error::{Result, SwapError};
use crate::live::Address;
use crate::typemap::{ParamScope, TypeMap};
use crate::value::{CellArray, RecordView, StructArray, Value};

/// Position on the value side of the walk.
#[derive(Debug)]
enum Cursor<'v> {
    /// The dataset has no value here; leaves below are emitted empty.
    Absent,
    /// A node of the value tree.
    Node(&'v mut Value),
    /// One record of a struct array, viewed as a single struct.
    Record(RecordView<'v>),
}

impl<'v> From<Option<&'v mut Value>> for Cursor<'v> {
    fn from(value: Option<&'v mut Value>) -> Self {
        value.map_or(Self::Absent, Self::Node)
    }
}

/// Fills `table` from the parameter entries, detaching every consumed buffer.
///
/// `entries` must be the same array the counting pass ran over.
pub fn build_descriptors<M: TypeMap + ?Sized>(
    entries: &mut StructArray,
    type_map: &M,
    table: &mut DescriptorTable,
) -> Result<()> {
    for entry in 0..entries.len() {
        let (kind, info, metas) = {
            let params = ParameterTable::unchecked(entries);
            let kind = params.kind(entry);
            let info = match kind {
                // Never committed, so unreadable descriptive fields are tolerated.
                EntryKind::Absent => Some(params.info(entry).unwrap_or_default()),
                EntryKind::Flat => Some(params.info(entry)?),
                _ => None,
            };
            let metas = match kind {
                EntryKind::StructCell { len } => params.record_metas(entry, len)?,
                _ => Vec::new(),
            };
            (kind, info, metas)
        };

        match (kind, info) {
            (EntryKind::Absent, Some(info)) => table.push(empty_flat_leaf(&info))?,
            (EntryKind::Flat, Some(info)) => {
                let value = entries.field_mut(entry, VALUES).ok_or_else(|| {
                    SwapError::Internal(format!("values of entry {entry} vanished"))
                })?;
                table.push(flat_leaf(value, &info, entry)?)?;
            }
            (EntryKind::StructCell { .. }, _) => {
                let cell = entries
                    .field_mut(entry, VALUES)
                    .and_then(Value::as_cell_mut)
                    .ok_or_else(|| {
                        SwapError::Internal(format!("values cell of entry {entry} vanished"))
                    })?;
                build_struct_cell(cell, &metas, type_map, table, entry)?;
            }
            _ => {}
        }
    }

    debug!(descriptors = table.len(), "built leaf descriptors");
    Ok(())
}

fn empty_flat_leaf(info: &EntryInfo) -> LeafDescriptor {
    LeafDescriptor {
        data_type: info.data_type_id,
        complex: info.complex,
        element_size: 0,
        element_count: 0,
        real: None,
        imag: None,
        target: LeafTarget::Transition {
            index: info.transition_index,
        },
    }
}

fn flat_leaf(value: &mut Value, info: &EntryInfo, entry: usize) -> Result<LeafDescriptor> {
    let Value::Numeric(array) = value else {
        return Err(SwapError::validation(format!(
            "entry {entry}: a {} value outside a cell was found where a flat value was expected",
            value.kind()
        )));
    };

    let element_size = array.element_size();
    let element_count = array.element_count()?;
    let real = array.take_real();
    // Logical and char arrays have no imaginary part to detach.
    let imag = if array.is_numeric() {
        array.take_imag()
    } else {
        None
    };

    Ok(LeafDescriptor {
        data_type: info.data_type_id,
        complex: info.complex,
        element_size,
        element_count,
        real,
        imag,
        target: LeafTarget::Transition {
            index: info.transition_index,
        },
    })
}

fn build_struct_cell<M: TypeMap + ?Sized>(
    cell: &mut CellArray,
    metas: &[RecordMeta],
    type_map: &M,
    table: &mut DescriptorTable,
    entry: usize,
) -> Result<()> {
    if cell.rows() != 1 {
        return Err(SwapError::validation(format!(
            "entry {entry}: struct values must be a cell array with exactly one row, found {:?}",
            cell.dims()
        )));
    }

    for (pos, meta) in metas.iter().enumerate() {
        let Some(value) = cell.get_mut(pos) else {
            continue;
        };
        let Value::Struct(array) = value else {
            return Err(SwapError::validation(format!(
                "entry {entry}: a {} value was found where a struct value was expected \
                 (slot {pos})",
                value.kind()
            )));
        };
        build_struct_param(array, *meta, type_map, table)?;
    }
    Ok(())
}

/// Emits the leaves of one struct (or struct array) parameter.
fn build_struct_param<M: TypeMap + ?Sized>(
    array: &mut StructArray,
    meta: RecordMeta,
    type_map: &M,
    table: &mut DescriptorTable,
) -> Result<()> {
    let param = type_map.parameter(meta.scope, meta.index)?;
    if param.fixed_point != 0 {
        return Err(SwapError::validation(format!(
            "fixed-point index of struct params should be 0 ({:?} parameter {}, index {})",
            meta.scope, meta.index, param.fixed_point
        )));
    }

    let expected = type_map.element_count(param.dimension)?;
    if array.len() != expected {
        return Err(SwapError::validation(format!(
            "{:?} parameter {} holds {} struct elements, the model declares {expected}",
            meta.scope,
            meta.index,
            array.len()
        )));
    }

    let stride = type_map.byte_size(param.data_type)?;
    let mut walker = LeafWalker {
        type_map,
        table,
        scope: meta.scope,
    };
    for pos in 0..array.len() {
        let base = param.address.offset(stride_offset(pos, stride)?)?;
        let cursor = array.record_mut(pos).map_or(Cursor::Absent, Cursor::Record);
        walker.walk(param.data_type, param.dimension, param.fixed_point, base, cursor)?;
    }
    Ok(())
}

/// Byte offset of position `pos` in an array of `stride`-byte elements.
fn stride_offset(pos: usize, stride: usize) -> Result<usize> {
    pos.checked_mul(stride).ok_or_else(|| {
        SwapError::validation(format!(
            "element {pos} of a {stride} byte struct array lies beyond the addressable range"
        ))
    })
}

struct LeafWalker<'t, M: ?Sized> {
    type_map: &'t M,
    table: &'t mut DescriptorTable,
    scope: ParamScope,
}

impl<M: TypeMap + ?Sized> LeafWalker<'_, M> {
    /// Visits one value of `data_type` located at `base`.
    fn walk(
        &mut self,
        data_type: usize,
        dimension: usize,
        fixed_point: usize,
        base: Address,
        cursor: Cursor<'_>,
    ) -> Result<()> {
        let type_map = self.type_map;
        if type_map.is_leaf(data_type, fixed_point)? {
            return self.leaf(data_type, base, cursor);
        }

        let mut record = match cursor {
            Cursor::Absent => None,
            Cursor::Record(view) => Some(view),
            Cursor::Node(Value::Struct(s)) => s.record_mut(0),
            Cursor::Node(other) => {
                return Err(SwapError::validation(format!(
                    "a {} value was found where a struct value was expected (data type {data_type}, \
                     dimension {dimension})",
                    other.kind()
                )));
            }
        };

        for child in 0..type_map.child_count(data_type)? {
            let element = type_map.element(data_type, child)?;
            let field_base = base.offset(element.offset)?;
            let sub = record.as_mut().and_then(|r| r.field_mut(element.name));
            let array_len = type_map.element_count(element.dimension)?;

            if array_len == 1 || type_map.is_leaf(element.data_type, element.fixed_point)? {
                self.walk(
                    element.data_type,
                    element.dimension,
                    element.fixed_point,
                    field_base,
                    Cursor::from(sub),
                )?;
                continue;
            }

            // Struct array field: one single-record view per position.
            let stride = type_map.byte_size(element.data_type)?;
            let mut elements = match sub {
                None => None,
                Some(Value::Struct(s)) => Some(s),
                Some(other) => {
                    return Err(SwapError::validation(format!(
                        "field {} holds a {} value where a struct array was expected",
                        element.name,
                        other.kind()
                    )));
                }
            };
            for j in 0..array_len {
                let cursor = elements
                    .as_mut()
                    .and_then(|s| s.record_mut(j))
                    .map_or(Cursor::Absent, Cursor::Record);
                self.walk(
                    element.data_type,
                    element.dimension,
                    element.fixed_point,
                    field_base.offset(stride_offset(j, stride)?)?,
                    cursor,
                )?;
            }
        }
        Ok(())
    }

    fn leaf(&mut self, data_type: usize, address: Address, cursor: Cursor<'_>) -> Result<()> {
        let complex = self.type_map.is_complex(data_type)?;
        let (element_size, element_count, real, imag) = match cursor {
            Cursor::Absent => (0, 0, None, None),
            Cursor::Node(Value::Numeric(array)) => {
                let real = array.take_real();
                let imag = if array.is_numeric() {
                    array.take_imag()
                } else {
                    None
                };
                (array.element_size(), array.element_count()?, real, imag)
            }
            Cursor::Node(other) => {
                return Err(SwapError::validation(format!(
                    "a {} value was found where a leaf value was expected (data type {data_type})",
                    other.kind()
                )));
            }
            Cursor::Record(_) => {
                return Err(SwapError::validation(format!(
                    "a struct record was found where a leaf value was expected (data type \
                     {data_type})"
                )));
            }
        };

        self.table.push(LeafDescriptor {
            data_type,
            complex,
            element_size,
            element_count,
            real,
            imag,
            target: LeafTarget::Struct {
                address,
                scope: self.scope,
            },
        })
    }
}
