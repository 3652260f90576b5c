//! Tools for inspecting the contents of parameter files.
//! Useful for checking a dataset against a model before applying it.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::checksum::ModelChecksum;
use crate::dataset::{Dataset, EntryKind, ParameterTable};
use crate::error::Result;
use crate::reader::DatasetReader;
use crate::value::Value;

/// A structural report of a parameter dataset.
#[derive(Debug, Serialize)]
pub struct DatasetReport {
    /// Total size of the file on disk, when inspected from a file.
    pub file_size: Option<u64>,
    /// Payload compression algorithm, when inspected from a file.
    pub compression: Option<String>,
    /// Model checksum recorded in the dataset.
    pub checksum: ModelChecksum,
    /// One report per parameter set (empty without a `parameters` field).
    pub sets: Vec<ParameterSetReport>,
}

/// The entries of one parameter set.
#[derive(Debug, Serialize)]
pub struct ParameterSetReport {
    /// 1-based set number.
    pub set: usize,
    /// Entries in table order.
    pub entries: Vec<EntryReport>,
}

/// Summary of a single parameter entry.
#[derive(Debug, Serialize)]
pub struct EntryReport {
    /// Position in the parameter table.
    pub index: usize,
    /// Recorded data type name.
    pub type_name: String,
    /// Live data type id.
    pub data_type_id: usize,
    /// Complexity flag.
    pub complex: bool,
    /// Transition table index.
    pub transition_index: usize,
    /// Shape of the `values` field ("numeric", "struct cell", ...).
    pub kind: String,
    /// Elements of a flat value, or non-empty slots of a struct cell.
    pub element_count: usize,
    /// Payload bytes held by the entry's values.
    pub byte_size: usize,
}

/// The dataset inspector tool.
#[derive(Debug)]
pub struct DatasetInspector;

impl DatasetInspector {
    /// Opens a parameter file and reports on its contents.
    pub fn inspect<P: AsRef<Path>>(path: P) -> Result<DatasetReport> {
        let reader = DatasetReader::open(path)?;
        let root = reader.read_value()?;
        let mut report = Self::inspect_value(&root)?;
        report.file_size = Some(reader.file_size());
        report.compression = Some(reader.compression_name()?.to_string());
        Ok(report)
    }

    /// Reports on a decoded dataset root.
    pub fn inspect_value(root: &Value) -> Result<DatasetReport> {
        let dataset = Dataset::new(root)?;
        let checksum = dataset.checksum()?;

        let mut sets = Vec::new();
        for set in 1..=dataset.parameter_set_count() {
            let Some(params) = dataset.parameters(set)? else {
                break;
            };
            sets.push(ParameterSetReport {
                set,
                entries: Self::inspect_entries(&params)?,
            });
        }

        Ok(DatasetReport {
            file_size: None,
            compression: None,
            checksum,
            sets,
        })
    }

    fn inspect_entries(params: &ParameterTable<'_>) -> Result<Vec<EntryReport>> {
        let mut entries = Vec::with_capacity(params.len());
        for index in 0..params.len() {
            let info = match params.kind(index) {
                EntryKind::Absent => params.info(index).unwrap_or_default(),
                _ => params.info(index)?,
            };
            let values = params.values(index);
            let (kind, element_count) = match params.kind(index) {
                EntryKind::Absent => ("absent", 0),
                EntryKind::Flat => (
                    values.map_or("numeric", Value::kind),
                    values.map_or(Ok(0), Value::element_count)?,
                ),
                EntryKind::EmptyCell => ("empty cell", 0),
                EntryKind::StructCell { .. } => (
                    "struct cell",
                    values
                        .and_then(Value::as_cell)
                        .map_or(0, |c| (0..c.len()).filter(|&i| c.get(i).is_some()).count()),
                ),
            };
            entries.push(EntryReport {
                index,
                type_name: info.type_name,
                data_type_id: info.data_type_id,
                complex: info.complex,
                transition_index: info.transition_index,
                kind: kind.to_string(),
                element_count,
                byte_size: values.map_or(0, payload_bytes),
            });
        }
        Ok(entries)
    }
}

fn payload_bytes(value: &Value) -> usize {
    match value {
        Value::Numeric(n) => n.real().map_or(0, <[u8]>::len) + n.imag().map_or(0, <[u8]>::len),
        Value::Struct(s) => (0..s.len())
            .flat_map(|i| s.field_names().iter().filter_map(move |f| s.field(i, f)))
            .map(payload_bytes)
            .sum(),
        Value::Cell(c) => (0..c.len()).filter_map(|i| c.get(i)).map(payload_bytes).sum(),
    }
}

impl fmt::Display for DatasetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== PARAMETER DATASET REPORT ===")?;
        if let Some(size) = self.file_size {
            writeln!(f, "File Size:      {size}")?;
        }
        if let Some(algo) = &self.compression {
            writeln!(f, "Compression:    {algo}")?;
        }
        writeln!(f, "Model Checksum: {}", self.checksum)?;
        writeln!(f, "\n[PARAMETER SETS]")?;
        for (i, set) in self.sets.iter().enumerate() {
            set.fmt_tree(f, i + 1 == self.sets.len())?;
        }
        Ok(())
    }
}

impl ParameterSetReport {
    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, is_last: bool) -> fmt::Result {
        let connector = if is_last { "└── " } else { "├── " };
        let child_prefix = if is_last { "    " } else { "│   " };
        writeln!(f, "{connector}Set {} ({} entries)", self.set, self.entries.len())?;

        for (i, entry) in self.entries.iter().enumerate() {
            let entry_connector = if i + 1 == self.entries.len() {
                "└── "
            } else {
                "├── "
            };
            let complex = if entry.complex { ", complex" } else { "" };
            writeln!(
                f,
                "{child_prefix}{entry_connector}[{}] {} (id {}{complex}) | {} | Elements: {} | Size: {}b | Trans: {}",
                entry.index,
                entry.type_name,
                entry.data_type_id,
                entry.kind,
                entry.element_count,
                entry.byte_size,
                entry.transition_index,
            )?;
        }
        Ok(())
    }
}
