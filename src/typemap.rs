//! Static metadata describing the live parameter layout.
//!
//! A [`TypeMap`] answers every structural question the engine asks about the running
//! model: how many fields a data type has, where each field lives inside its parent,
//! the shape of a dimensioned quantity, the byte size of a type, and where a tunable
//! parameter is located in live memory.
//!
//! The data is organised as flat index tables, the way code generators emit it:
//!
//! ```text
//! data types:  [name, size, complex, first element, element count]
//! elements:    [name, data type, dimension, fixed-point, byte offset]
//! dimensions:  [first extent, rank]  ->  extents: [e0, e1, ...]
//! parameters:  [name, data type, dimension, fixed-point, address index]  (model / block)
//! addresses:   [Address]
//! ```
//!
//! [`StaticTypeMap`] is an in-memory implementation of those tables.

use crate::error::{Result, SwapError};
use crate::live::Address;

/// Highest data type id that is a built-in numeric type by default.
pub const LAST_BUILTIN_DATA_TYPE_ID: usize = 13;

/// Selects which parameter table a tunable parameter lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamScope {
    /// Model-wide (workspace) parameter.
    Model,
    /// Parameter owned by a single block.
    Block,
}

impl ParamScope {
    /// Maps the dataset's `ModelParam` flag to a scope.
    pub fn from_model_flag(model_param: bool) -> Self {
        if model_param {
            Self::Model
        } else {
            Self::Block
        }
    }
}

/// One field of a structured data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementInfo<'a> {
    /// Field name, used to look the field up in a struct value.
    pub name: &'a str,
    /// Data type index of the field.
    pub data_type: usize,
    /// Dimension index of the field.
    pub dimension: usize,
    /// Fixed-point index of the field; 0 means "not fixed-point".
    pub fixed_point: usize,
    /// Byte offset of the field inside one instance of the parent type.
    pub offset: usize,
}

/// Location and type of a tunable parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterInfo {
    /// Data type index of the parameter.
    pub data_type: usize,
    /// Dimension index of the parameter.
    pub dimension: usize,
    /// Fixed-point index of the parameter; 0 means "not fixed-point".
    pub fixed_point: usize,
    /// Base address of the parameter in the live block.
    pub address: Address,
}

/// Read-only query surface over the model's layout metadata.
pub trait TypeMap {
    /// Number of child elements of a data type; 0 for scalar and array-of-scalar types.
    fn child_count(&self, data_type: usize) -> Result<usize>;

    /// Metadata of the `child`-th element of a structured data type.
    fn element(&self, data_type: usize, child: usize) -> Result<ElementInfo<'_>>;

    /// Per-axis extents of a dimension entry. The slice length is the rank.
    fn extents(&self, dimension: usize) -> Result<&[usize]>;

    /// Byte size of one instance of a data type. Complex types report the size of the
    /// real and imaginary parts together.
    fn byte_size(&self, data_type: usize) -> Result<usize>;

    /// Whether a data type is complex.
    fn is_complex(&self, data_type: usize) -> Result<bool>;

    /// Resolves a tunable parameter by scope and index.
    fn parameter(&self, scope: ParamScope, index: usize) -> Result<ParameterInfo>;

    /// Whether a live data type id denotes a built-in numeric type, for which dataset
    /// element sizes must match the live sizes exactly.
    fn is_builtin_numeric(&self, data_type_id: usize) -> bool;

    /// Rank of a dimension entry.
    fn rank(&self, dimension: usize) -> Result<usize> {
        Ok(self.extents(dimension)?.len())
    }

    /// Total element count of a dimensioned quantity (empty product is 1).
    fn element_count(&self, dimension: usize) -> Result<usize> {
        let extents = self.extents(dimension)?;
        extents
            .iter()
            .try_fold(1usize, |acc, &extent| acc.checked_mul(extent))
            .ok_or_else(|| {
                SwapError::validation(format!(
                    "dimension {dimension} {extents:?} describes more elements than can be addressed"
                ))
            })
    }

    /// Whether a (data type, fixed-point) pair is treated as a single opaque leaf.
    ///
    /// Fixed-point quantities are leaves even when their nominal type is structured.
    fn is_leaf(&self, data_type: usize, fixed_point: usize) -> Result<bool> {
        Ok(fixed_point > 0 || self.child_count(data_type)? == 0)
    }
}

#[derive(Debug, Clone)]
struct DataTypeEntry {
    name: String,
    byte_size: usize,
    is_complex: bool,
    first_element: usize,
    num_elements: usize,
}

#[derive(Debug, Clone)]
struct ElementEntry {
    name: String,
    data_type: usize,
    dimension: usize,
    fixed_point: usize,
    offset: usize,
}

#[derive(Debug, Clone, Copy)]
struct DimensionEntry {
    first_extent: usize,
    rank: usize,
}

#[derive(Debug, Clone)]
struct ParameterEntry {
    name: String,
    data_type: usize,
    dimension: usize,
    fixed_point: usize,
    address_index: usize,
}

/// A field declaration passed to [`StaticTypeMap::add_struct`].
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    data_type: usize,
    dimension: usize,
    fixed_point: usize,
    offset: usize,
}

impl FieldSpec {
    /// Declares a field of type `data_type` with shape `dimension` at byte `offset`.
    pub fn new(name: impl Into<String>, data_type: usize, dimension: usize, offset: usize) -> Self {
        Self {
            name: name.into(),
            data_type,
            dimension,
            fixed_point: 0,
            offset,
        }
    }

    /// Marks the field as fixed-point with the given (non-zero) fixed-point index.
    pub fn fixed_point(mut self, index: usize) -> Self {
        self.fixed_point = index;
        self
    }
}

/// In-memory implementation of the layout tables.
#[derive(Debug, Clone)]
pub struct StaticTypeMap {
    data_types: Vec<DataTypeEntry>,
    elements: Vec<ElementEntry>,
    dimensions: Vec<DimensionEntry>,
    extents: Vec<usize>,
    model_params: Vec<ParameterEntry>,
    block_params: Vec<ParameterEntry>,
    addresses: Vec<Address>,
    builtin_numeric: Vec<usize>,
}

impl Default for StaticTypeMap {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticTypeMap {
    /// Creates empty tables. Data type ids `0..=13` are treated as built-in numeric.
    pub fn new() -> Self {
        Self {
            data_types: Vec::new(),
            elements: Vec::new(),
            dimensions: Vec::new(),
            extents: Vec::new(),
            model_params: Vec::new(),
            block_params: Vec::new(),
            addresses: Vec::new(),
            builtin_numeric: (0..=LAST_BUILTIN_DATA_TYPE_ID).collect(),
        }
    }

    /// Replaces the set of data type ids considered built-in numeric.
    pub fn with_builtin_numeric_ids(mut self, ids: impl IntoIterator<Item = usize>) -> Self {
        self.builtin_numeric = ids.into_iter().collect();
        self.builtin_numeric.sort_unstable();
        self.builtin_numeric.dedup();
        self
    }

    /// Registers a scalar (leaf) data type and returns its index.
    pub fn add_scalar(&mut self, name: impl Into<String>, byte_size: usize, is_complex: bool) -> usize {
        self.data_types.push(DataTypeEntry {
            name: name.into(),
            byte_size,
            is_complex,
            first_element: 0,
            num_elements: 0,
        });
        self.data_types.len() - 1
    }

    /// Registers a structured data type whose fields are laid out contiguously in the
    /// element table. Returns the data type index.
    pub fn add_struct(
        &mut self,
        name: impl Into<String>,
        byte_size: usize,
        fields: impl IntoIterator<Item = FieldSpec>,
    ) -> usize {
        let first_element = self.elements.len();
        self.elements.extend(fields.into_iter().map(|f| ElementEntry {
            name: f.name,
            data_type: f.data_type,
            dimension: f.dimension,
            fixed_point: f.fixed_point,
            offset: f.offset,
        }));
        self.data_types.push(DataTypeEntry {
            name: name.into(),
            byte_size,
            is_complex: false,
            first_element,
            num_elements: self.elements.len() - first_element,
        });
        self.data_types.len() - 1
    }

    /// Registers a dimension entry and returns its index.
    pub fn add_dimension(&mut self, extents: &[usize]) -> usize {
        self.dimensions.push(DimensionEntry {
            first_extent: self.extents.len(),
            rank: extents.len(),
        });
        self.extents.extend_from_slice(extents);
        self.dimensions.len() - 1
    }

    /// Registers a tunable parameter located at `address` and returns its index within
    /// the scope's table.
    pub fn add_parameter(
        &mut self,
        scope: ParamScope,
        name: impl Into<String>,
        data_type: usize,
        dimension: usize,
        fixed_point: usize,
        address: Address,
    ) -> usize {
        self.addresses.push(address);
        let entry = ParameterEntry {
            name: name.into(),
            data_type,
            dimension,
            fixed_point,
            address_index: self.addresses.len() - 1,
        };
        let table = match scope {
            ParamScope::Model => &mut self.model_params,
            ParamScope::Block => &mut self.block_params,
        };
        table.push(entry);
        table.len() - 1
    }

    /// Name of a data type, if it exists.
    pub fn data_type_name(&self, data_type: usize) -> Option<&str> {
        self.data_types.get(data_type).map(|d| d.name.as_str())
    }

    /// Name of a tunable parameter, if it exists.
    pub fn parameter_name(&self, scope: ParamScope, index: usize) -> Option<&str> {
        self.params(scope).get(index).map(|p| p.name.as_str())
    }

    fn params(&self, scope: ParamScope) -> &[ParameterEntry] {
        match scope {
            ParamScope::Model => &self.model_params,
            ParamScope::Block => &self.block_params,
        }
    }

    fn data_type(&self, data_type: usize) -> Result<&DataTypeEntry> {
        self.data_types.get(data_type).ok_or_else(|| {
            SwapError::validation(format!("data type index {data_type} is not in the type map"))
        })
    }
}

impl TypeMap for StaticTypeMap {
    fn child_count(&self, data_type: usize) -> Result<usize> {
        Ok(self.data_type(data_type)?.num_elements)
    }

    fn element(&self, data_type: usize, child: usize) -> Result<ElementInfo<'_>> {
        let entry = self.data_type(data_type)?;
        if child >= entry.num_elements {
            return Err(SwapError::validation(format!(
                "data type {data_type} has {} elements, element {child} requested",
                entry.num_elements
            )));
        }
        let element = self.elements.get(entry.first_element + child).ok_or_else(|| {
            SwapError::validation(format!(
                "element table too short for data type {data_type} (element {child})"
            ))
        })?;
        Ok(ElementInfo {
            name: &element.name,
            data_type: element.data_type,
            dimension: element.dimension,
            fixed_point: element.fixed_point,
            offset: element.offset,
        })
    }

    fn extents(&self, dimension: usize) -> Result<&[usize]> {
        let entry = self.dimensions.get(dimension).ok_or_else(|| {
            SwapError::validation(format!("dimension index {dimension} is not in the type map"))
        })?;
        self.extents
            .get(entry.first_extent..entry.first_extent + entry.rank)
            .ok_or_else(|| {
                SwapError::validation(format!("extent table too short for dimension {dimension}"))
            })
    }

    fn byte_size(&self, data_type: usize) -> Result<usize> {
        Ok(self.data_type(data_type)?.byte_size)
    }

    fn is_complex(&self, data_type: usize) -> Result<bool> {
        Ok(self.data_type(data_type)?.is_complex)
    }

    fn parameter(&self, scope: ParamScope, index: usize) -> Result<ParameterInfo> {
        let entry = self.params(scope).get(index).ok_or_else(|| {
            SwapError::validation(format!("{scope:?} parameter index {index} is not in the type map"))
        })?;
        let address = self
            .addresses
            .get(entry.address_index)
            .copied()
            .ok_or_else(|| {
                SwapError::validation(format!(
                    "address index {} of {scope:?} parameter {index} is out of range",
                    entry.address_index
                ))
            })?;
        Ok(ParameterInfo {
            data_type: entry.data_type,
            dimension: entry.dimension,
            fixed_point: entry.fixed_point,
            address,
        })
    }

    fn is_builtin_numeric(&self, data_type_id: usize) -> bool {
        self.builtin_numeric.binary_search(&data_type_id).is_ok()
    }
}
