//! Parameter dataset layout.
//!
//! A dataset root is a 1x1 struct:
//!
//! ```text
//! root
//! ├── modelChecksum     double, 1x4
//! └── parameters        struct array of entries, or a cell of such arrays (parameter sets)
//!     ├── dataTypeName  char
//!     ├── dataTypeId    scalar
//!     ├── complex       scalar
//!     ├── dtTransIdx    scalar
//!     ├── values        flat buffer, or 1xK cell of struct values
//!     └── structParamInfo   1xK struct array {ModelParam, CAPIIdx}   (struct entries only)
//! ```
//!
//! This module only reads the layout; it never detaches buffers.

use crate::checksum::{ModelChecksum, CHECKSUM_LEN};
use crate::error::{Result, SwapError};
use crate::typemap::ParamScope;
use crate::value::{ClassId, StructArray, Value};

/// Root field holding the model checksum.
pub const MODEL_CHECKSUM: &str = "modelChecksum";
/// Root field holding the parameter entries.
pub const PARAMETERS: &str = "parameters";
/// Entry field: human-readable data type name.
pub const DATA_TYPE_NAME: &str = "dataTypeName";
/// Entry field: live data type id.
pub const DATA_TYPE_ID: &str = "dataTypeId";
/// Entry field: complexity flag.
pub const COMPLEX: &str = "complex";
/// Entry field: transition table index.
pub const DT_TRANS_IDX: &str = "dtTransIdx";
/// Entry field: the parameter values.
pub const VALUES: &str = "values";
/// Entry field: per-record metadata of struct values.
pub const STRUCT_PARAM_INFO: &str = "structParamInfo";
/// Record metadata field: model (1) or block (0) parameter.
pub const MODEL_PARAM: &str = "ModelParam";
/// Record metadata field: parameter index within its scope.
pub const CAPI_IDX: &str = "CAPIIdx";

const REQUIRED_ENTRY_FIELDS: [&str; 4] = [DATA_TYPE_NAME, DATA_TYPE_ID, COMPLEX, DT_TRANS_IDX];

/// Read-only view of a dataset root.
#[derive(Debug, Clone, Copy)]
pub struct Dataset<'a> {
    root: &'a StructArray,
}

impl<'a> Dataset<'a> {
    /// Wraps a root value, which must be a 1x1 struct.
    pub fn new(root: &'a Value) -> Result<Self> {
        match root {
            Value::Struct(s) if s.len() == 1 => Ok(Self { root: s }),
            _ => Err(SwapError::validation("parameter dataset root must be a 1x1 structure")),
        }
    }

    /// Extracts the model checksum: a real double array with at least one row and
    /// exactly four columns.
    pub fn checksum(&self) -> Result<ModelChecksum> {
        let field = self.root.field(0, MODEL_CHECKSUM).ok_or_else(|| {
            SwapError::validation("parameter dataset must contain a modelChecksum field")
        })?;
        let invalid = || SwapError::validation("invalid modelChecksum in parameter dataset");
        let array = field.as_numeric().ok_or_else(invalid)?;
        if array.class() != ClassId::Double
            || array.is_complex()
            || array.dims().len() > 2
            || array.rows() < 1
            || array.cols().ok() != Some(CHECKSUM_LEN)
        {
            return Err(invalid());
        }
        let values = array.to_f64s().ok_or_else(invalid)?;
        let components: [f64; CHECKSUM_LEN] = values
            .get(..CHECKSUM_LEN)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(invalid)?;
        Ok(ModelChecksum::new(components))
    }

    /// Number of selectable parameter sets: 0 without a `parameters` field, the slot
    /// count when `parameters` is a cell, 1 otherwise.
    pub fn parameter_set_count(&self) -> usize {
        match self.root.field(0, PARAMETERS) {
            None => 0,
            Some(Value::Cell(c)) => c.len(),
            Some(_) => 1,
        }
    }

    /// Selects the parameter entries. `parameter_set` is 1-based and only consulted when
    /// `parameters` is a cell of parameter sets. Returns `None` when the dataset has no
    /// `parameters` field.
    pub fn parameters(&self, parameter_set: usize) -> Result<Option<ParameterTable<'a>>> {
        let Some(params) = self.root.field(0, PARAMETERS) else {
            return Ok(None);
        };
        let entries = match params {
            Value::Struct(s) => s,
            Value::Cell(c) => {
                let slot = resolve_set(c.len(), parameter_set)?;
                c.get(slot).and_then(Value::as_struct).ok_or_else(bad_set)?
            }
            other => return Err(bad_parameters(other)),
        };
        ParameterTable::new(entries).map(Some)
    }
}

/// Mutable counterpart of [`Dataset::parameters`], used by the descriptor builder to
/// detach buffers. Performs no entry validation.
pub fn parameters_mut(root: &mut Value, parameter_set: usize) -> Result<Option<&mut StructArray>> {
    let root = match root {
        Value::Struct(s) if s.len() == 1 => s,
        _ => return Err(SwapError::validation("parameter dataset root must be a 1x1 structure")),
    };
    let Some(params) = root.field_mut(0, PARAMETERS) else {
        return Ok(None);
    };
    let entries = match params {
        Value::Struct(s) => s,
        Value::Cell(c) => {
            let slot = resolve_set(c.len(), parameter_set)?;
            c.get_mut(slot)
                .and_then(Value::as_struct_mut)
                .ok_or_else(bad_set)?
        }
        other => return Err(bad_parameters(other)),
    };
    Ok(Some(entries))
}

fn resolve_set(len: usize, parameter_set: usize) -> Result<usize> {
    if parameter_set > 0 && parameter_set <= len {
        Ok(parameter_set - 1)
    } else {
        Err(SwapError::validation(format!(
            "invalid index {parameter_set} into parameter cell array of {len} sets"
        )))
    }
}

fn bad_set() -> SwapError {
    SwapError::validation("invalid parameter field in parameter structure")
}

fn bad_parameters(found: &Value) -> SwapError {
    SwapError::validation(format!(
        "parameters field must be a struct array or a cell of struct arrays, found {}",
        found.kind()
    ))
}

/// The always-present descriptive fields of one entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryInfo {
    /// Data type name as recorded by the generator.
    pub type_name: String,
    /// Live data type id.
    pub data_type_id: usize,
    /// Whether the entry's values are complex.
    pub complex: bool,
    /// Transition table index of the entry's live data.
    pub transition_index: usize,
}

/// How an entry's `values` field is shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// No `values` at all: contributes one empty non-struct leaf.
    Absent,
    /// A flat (non-cell) value: contributes one non-struct leaf.
    Flat,
    /// A cell that is empty or whose first slot is empty: contributes nothing.
    EmptyCell,
    /// A cell of `len` struct values.
    StructCell {
        /// Number of cell slots.
        len: usize,
    },
}

impl EntryKind {
    /// Classifies a `values` field.
    pub fn of(values: Option<&Value>) -> Self {
        match values {
            None => Self::Absent,
            Some(Value::Cell(c)) if c.get(0).is_none() => Self::EmptyCell,
            Some(Value::Cell(c)) => Self::StructCell { len: c.len() },
            Some(_) => Self::Flat,
        }
    }
}

/// Per-record metadata of a struct entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordMeta {
    /// Which parameter table the record belongs to.
    pub scope: ParamScope,
    /// Index of the parameter within that table.
    pub index: usize,
}

/// Read-only view of the selected parameter entries.
#[derive(Debug, Clone, Copy)]
pub struct ParameterTable<'a> {
    entries: &'a StructArray,
}

impl<'a> ParameterTable<'a> {
    /// Wraps an entry array, checking that it declares every required descriptive
    /// field. All elements of a struct array share their fields, so the check covers
    /// the whole table.
    pub fn new(entries: &'a StructArray) -> Result<Self> {
        if !entries.is_empty() {
            for field in REQUIRED_ENTRY_FIELDS {
                if entries.field(0, field).is_none() {
                    return Err(SwapError::validation(format!(
                        "parameters struct must contain a {field} field"
                    )));
                }
            }
        }
        Ok(Self { entries })
    }

    pub(crate) fn unchecked(entries: &'a StructArray) -> Self {
        Self { entries }
    }

    /// Number of top-level entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads the descriptive fields of entry `index`.
    pub fn info(&self, index: usize) -> Result<EntryInfo> {
        let type_name = self
            .entries
            .field(index, DATA_TYPE_NAME)
            .and_then(Value::as_numeric)
            .and_then(|n| n.to_text())
            .unwrap_or_default();
        Ok(EntryInfo {
            type_name,
            data_type_id: self.scalar_index(index, DATA_TYPE_ID)?,
            complex: self.scalar(index, COMPLEX)? != 0.0,
            transition_index: self.scalar_index(index, DT_TRANS_IDX)?,
        })
    }

    /// The `values` field of entry `index`.
    pub fn values(&self, index: usize) -> Option<&'a Value> {
        self.entries.field(index, VALUES)
    }

    /// Classifies entry `index`.
    pub fn kind(&self, index: usize) -> EntryKind {
        EntryKind::of(self.values(index))
    }

    /// Reads and checks the `structParamInfo` of a struct entry holding `len` values.
    pub fn record_metas(&self, index: usize, len: usize) -> Result<Vec<RecordMeta>> {
        let info = self
            .entries
            .field(index, STRUCT_PARAM_INFO)
            .and_then(Value::as_struct)
            .ok_or_else(|| {
                SwapError::validation(format!(
                    "the entry for struct parameters must have a nonempty structParamInfo \
                     field (entry {index})"
                ))
            })?;
        if info.len() != len {
            return Err(SwapError::validation(format!(
                "the length of the structParamInfo field ({}) must equal the length of the \
                 values field ({len}) (entry {index})",
                info.len()
            )));
        }
        (0..len).map(|pos| record_meta(info, index, pos)).collect()
    }

    fn scalar(&self, index: usize, field: &str) -> Result<f64> {
        self.entries
            .field(index, field)
            .and_then(Value::as_numeric)
            .and_then(|n| n.scalar_f64())
            .ok_or_else(|| {
                SwapError::validation(format!("entry {index} has no numeric {field} value"))
            })
    }

    fn scalar_index(&self, index: usize, field: &str) -> Result<usize> {
        to_index(self.scalar(index, field)?)
            .ok_or_else(|| SwapError::validation(format!("entry {index}: {field} is not an index")))
    }
}

fn record_meta(info: &StructArray, entry: usize, pos: usize) -> Result<RecordMeta> {
    let read = |field: &str| {
        info.field(pos, field)
            .and_then(Value::as_numeric)
            .and_then(|n| n.scalar_f64())
            .ok_or_else(|| {
                SwapError::validation(format!(
                    "the structParamInfo of entry {entry} must have a nonempty {field} field \
                     (record {pos})"
                ))
            })
    };
    let model = read(MODEL_PARAM)? != 0.0;
    let raw_index = read(CAPI_IDX)?;
    let index = to_index(raw_index).ok_or_else(|| {
        SwapError::validation(format!(
            "entry {entry} record {pos}: CAPIIdx {raw_index} is not a parameter index"
        ))
    })?;
    Ok(RecordMeta {
        scope: ParamScope::from_model_flag(model),
        index,
    })
}

fn to_index(v: f64) -> Option<usize> {
    if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= usize::MAX as f64 {
        Some(v as usize)
    } else {
        None
    }
}
