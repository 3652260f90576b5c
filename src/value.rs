//! Dynamically-typed value tree of a parameter dataset.
//!
//! A dataset is a nested tree of three node kinds, mirroring the array model of the
//! tools that produce parameter files:
//!
//! * [`NumericArray`]: a flat buffer of fixed-size elements (numeric, logical or
//!   char), with an optional separate imaginary buffer.
//! * [`StructArray`]: a row of records sharing one ordered list of field names.
//! * [`CellArray`]: a grid of heterogeneous, possibly empty, slots.
//!
//! Buffers are owned by their node until the descriptor builder detaches them with
//! [`NumericArray::take_real`] / [`NumericArray::take_imag`]. After that the node still
//! reports its shape but no longer holds data, so dropping the tree never touches
//! memory the descriptor table owns.
//!
//! Element bytes are stored in host byte order, exactly as they will be copied into
//! live memory.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwapError};

/// Element class of a [`NumericArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassId {
    /// 64-bit float.
    Double,
    /// 32-bit float.
    Single,
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// Boolean stored as one byte per element.
    Logical,
    /// UTF-16 code unit.
    Char,
}

impl ClassId {
    /// Size in bytes of one element of this class.
    pub const fn element_size(self) -> usize {
        match self {
            Self::Double | Self::Int64 | Self::UInt64 => 8,
            Self::Single | Self::Int32 | Self::UInt32 => 4,
            Self::Int16 | Self::UInt16 | Self::Char => 2,
            Self::Int8 | Self::UInt8 | Self::Logical => 1,
        }
    }

    /// Whether the class is numeric. Logical and char arrays carry no imaginary part.
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Logical | Self::Char)
    }
}

/// Rust element types that map onto a numeric [`ClassId`].
pub trait NumericElement: Copy + private::Sealed {
    /// The class this element type is stored as.
    const CLASS: ClassId;

    /// Appends the host-order bytes of `self` to `out`.
    fn extend_bytes(self, out: &mut Vec<u8>);
}

mod private {
    pub trait Sealed {}
}

macro_rules! impl_numeric_element {
    ($($t:ty => $class:ident),* $(,)?) => {
        $(
            impl private::Sealed for $t {}

            impl NumericElement for $t {
                const CLASS: ClassId = ClassId::$class;

                fn extend_bytes(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_numeric_element!(
    f64 => Double,
    f32 => Single,
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
);

fn to_bytes<T: NumericElement>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::CLASS.element_size());
    for v in values {
        v.extend_bytes(&mut out);
    }
    out
}

/// A flat buffer of fixed-size elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericArray {
    class: ClassId,
    dims: Vec<usize>,
    real: Option<Vec<u8>>,
    imag: Option<Vec<u8>>,
}

impl NumericArray {
    /// Creates an array from raw element bytes. `dims` must describe exactly
    /// `real.len() / class.element_size()` elements.
    pub fn from_raw(class: ClassId, dims: Vec<usize>, real: Vec<u8>) -> Result<Self> {
        let expected = byte_len(&dims, class.element_size())?;
        if real.len() != expected {
            return Err(SwapError::validation(format!(
                "{class:?} array of shape {dims:?} needs {expected} bytes, got {}",
                real.len()
            )));
        }
        Ok(Self {
            class,
            dims,
            real: Some(real),
            imag: None,
        })
    }

    /// Creates a 1xN row vector.
    pub fn row<T: NumericElement>(values: &[T]) -> Self {
        Self {
            class: T::CLASS,
            dims: vec![1, values.len()],
            real: Some(to_bytes(values)),
            imag: None,
        }
    }

    /// Creates a 1x1 array.
    pub fn scalar<T: NumericElement>(value: T) -> Self {
        Self::row(&[value])
    }

    /// Creates a complex 1xN row vector from separate real and imaginary parts.
    pub fn complex_row<T: NumericElement>(real: &[T], imag: &[T]) -> Result<Self> {
        if real.len() != imag.len() {
            return Err(SwapError::validation(format!(
                "complex array has {} real and {} imaginary elements",
                real.len(),
                imag.len()
            )));
        }
        Ok(Self {
            class: T::CLASS,
            dims: vec![1, real.len()],
            real: Some(to_bytes(real)),
            imag: Some(to_bytes(imag)),
        })
    }

    /// Creates a 1xN logical row vector.
    pub fn logical(values: &[bool]) -> Self {
        Self {
            class: ClassId::Logical,
            dims: vec![1, values.len()],
            real: Some(values.iter().map(|&b| u8::from(b)).collect()),
            imag: None,
        }
    }

    /// Creates a 1xN char row vector.
    pub fn text(s: &str) -> Self {
        let units: Vec<u16> = s.encode_utf16().collect();
        Self {
            class: ClassId::Char,
            dims: vec![1, units.len()],
            real: Some(to_bytes(&units)),
            imag: None,
        }
    }

    /// Returns the element class.
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Returns the shape.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of rows (first extent).
    pub fn rows(&self) -> usize {
        self.dims.first().copied().unwrap_or(0)
    }

    /// Product of all extents after the first.
    pub fn cols(&self) -> Result<usize> {
        extent_product(self.dims.get(1..).unwrap_or_default())
    }

    /// Size in bytes of one element.
    pub fn element_size(&self) -> usize {
        self.class.element_size()
    }

    /// Number of elements described by the shape (independent of detached buffers).
    ///
    /// Fails with [`SwapError::Validation`] when the extents multiply past `usize`.
    pub fn element_count(&self) -> Result<usize> {
        extent_product(&self.dims)
    }

    /// Whether the element class is numeric.
    pub fn is_numeric(&self) -> bool {
        self.class.is_numeric()
    }

    /// Whether the array carries an imaginary buffer.
    pub fn is_complex(&self) -> bool {
        self.imag.is_some()
    }

    /// Real (or only) element bytes, unless detached.
    pub fn real(&self) -> Option<&[u8]> {
        self.real.as_deref()
    }

    /// Imaginary element bytes, if present and not detached.
    pub fn imag(&self) -> Option<&[u8]> {
        self.imag.as_deref()
    }

    /// Detaches the real buffer, leaving the node without data.
    pub fn take_real(&mut self) -> Option<Vec<u8>> {
        self.real.take()
    }

    /// Detaches the imaginary buffer.
    pub fn take_imag(&mut self) -> Option<Vec<u8>> {
        self.imag.take()
    }

    /// Adds an imaginary part of the same length as the real part.
    pub fn with_imag(mut self, imag: Vec<u8>) -> Result<Self> {
        let expected = byte_len(&self.dims, self.element_size())?;
        if imag.len() != expected || !self.is_numeric() {
            return Err(SwapError::validation(format!(
                "imaginary part of {} bytes does not fit a {:?} array of shape {:?}",
                imag.len(),
                self.class,
                self.dims
            )));
        }
        self.imag = Some(imag);
        Ok(self)
    }

    /// Reads the first real element as `f64`, converting from the element class.
    pub fn scalar_f64(&self) -> Option<f64> {
        let bytes = self.real.as_deref()?;
        macro_rules! first {
            ($t:ty) => {{
                let raw = bytes.get(..std::mem::size_of::<$t>())?;
                <$t>::from_ne_bytes(raw.try_into().ok()?) as f64
            }};
        }
        Some(match self.class {
            ClassId::Double => first!(f64),
            ClassId::Single => first!(f32),
            ClassId::Int8 => first!(i8),
            ClassId::UInt8 | ClassId::Logical => first!(u8),
            ClassId::Int16 => first!(i16),
            ClassId::UInt16 | ClassId::Char => first!(u16),
            ClassId::Int32 => first!(i32),
            ClassId::UInt32 => first!(u32),
            ClassId::Int64 => first!(i64),
            ClassId::UInt64 => first!(u64),
        })
    }

    /// Decodes all real elements of a double array.
    pub fn to_f64s(&self) -> Option<Vec<f64>> {
        if self.class != ClassId::Double {
            return None;
        }
        let bytes = self.real.as_deref()?;
        bytes
            .chunks_exact(8)
            .map(|c| c.try_into().ok().map(f64::from_ne_bytes))
            .collect()
    }

    /// Decodes a char array into a `String`.
    pub fn to_text(&self) -> Option<String> {
        if self.class != ClassId::Char {
            return None;
        }
        let units: Vec<u16> = self
            .real
            .as_deref()?
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
            .collect();
        Some(String::from_utf16_lossy(&units))
    }
}

/// Product of `extents`, or a validation error if it does not fit in `usize`.
fn extent_product(extents: &[usize]) -> Result<usize> {
    extents
        .iter()
        .try_fold(1usize, |acc, &extent| acc.checked_mul(extent))
        .ok_or_else(|| shape_overflow(extents))
}

/// Byte length of an array of `dims` with `element_size`-byte elements.
fn byte_len(dims: &[usize], element_size: usize) -> Result<usize> {
    extent_product(dims)?
        .checked_mul(element_size)
        .ok_or_else(|| shape_overflow(dims))
}

fn shape_overflow(dims: &[usize]) -> SwapError {
    SwapError::validation(format!(
        "array shape {dims:?} describes more elements than can be addressed"
    ))
}

/// A row of records sharing one ordered list of field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructArray {
    field_names: Vec<String>,
    records: Vec<Vec<Option<Value>>>,
}

impl StructArray {
    /// Creates an empty struct array with the given fields.
    pub fn new<S: Into<String>>(field_names: impl IntoIterator<Item = S>) -> Self {
        Self {
            field_names: field_names.into_iter().map(Into::into).collect(),
            records: Vec::new(),
        }
    }

    /// Creates a 1x1 struct from `(name, value)` pairs.
    pub fn scalar<S: Into<String>>(fields: impl IntoIterator<Item = (S, Value)>) -> Self {
        let (names, values): (Vec<String>, Vec<Option<Value>>) = fields
            .into_iter()
            .map(|(n, v)| (n.into(), Some(v)))
            .unzip();
        Self {
            field_names: names,
            records: vec![values],
        }
    }

    /// Appends a record. Its length must equal the number of fields.
    pub fn push_record(&mut self, record: Vec<Option<Value>>) -> Result<()> {
        if record.len() != self.field_names.len() {
            return Err(SwapError::validation(format!(
                "record has {} fields, struct array declares {}",
                record.len(),
                self.field_names.len()
            )));
        }
        self.records.push(record);
        Ok(())
    }

    /// Builder-style [`StructArray::push_record`].
    pub fn with_record(mut self, record: Vec<Option<Value>>) -> Result<Self> {
        self.push_record(record)?;
        Ok(self)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the array holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ordered field names.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Position of a field, if declared.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.field_names.iter().position(|f| f == name)
    }

    /// Value of field `name` in record `index`; `None` if the field is undeclared, the
    /// record does not exist, or the slot is empty.
    pub fn field(&self, index: usize, name: &str) -> Option<&Value> {
        let f = self.field_index(name)?;
        self.records.get(index)?.get(f)?.as_ref()
    }

    /// Mutable access to field `name` in record `index`.
    pub fn field_mut(&mut self, index: usize, name: &str) -> Option<&mut Value> {
        let f = self.field_index(name)?;
        self.records.get_mut(index)?.get_mut(f)?.as_mut()
    }

    /// A mutable view of one record.
    pub fn record_mut(&mut self, index: usize) -> Option<RecordView<'_>> {
        let fields = self.records.get_mut(index)?;
        Some(RecordView {
            names: &self.field_names,
            fields,
        })
    }
}

/// A single-record view into a [`StructArray`].
///
/// The view aliases the record's field slots of one array position without copying
/// any payload, so a struct-array element can be walked exactly like a 1x1 struct.
/// Detaching a buffer through the view detaches it from the underlying array.
#[derive(Debug)]
pub struct RecordView<'a> {
    names: &'a [String],
    fields: &'a mut [Option<Value>],
}

impl RecordView<'_> {
    /// Mutable access to a field by name; `None` if undeclared or empty.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut Value> {
        let f = self.names.iter().position(|n| n == name)?;
        self.fields.get_mut(f)?.as_mut()
    }

    /// Ordered field names of the viewed record.
    pub fn field_names(&self) -> &[String] {
        self.names
    }
}

/// A grid of heterogeneous, possibly empty, slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellArray {
    dims: Vec<usize>,
    cells: Vec<Option<Value>>,
}

impl CellArray {
    /// Creates a cell array of the given shape. The slot count must match the shape.
    pub fn new(dims: Vec<usize>, cells: Vec<Option<Value>>) -> Result<Self> {
        let expected = extent_product(&dims)?;
        if cells.len() != expected {
            return Err(SwapError::validation(format!(
                "cell array of shape {dims:?} needs {expected} slots, got {}",
                cells.len()
            )));
        }
        Ok(Self { dims, cells })
    }

    /// Creates a 1xN cell row.
    pub fn row(cells: Vec<Option<Value>>) -> Self {
        Self {
            dims: vec![1, cells.len()],
            cells,
        }
    }

    /// Returns the shape.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of rows (first extent).
    pub fn rows(&self) -> usize {
        self.dims.first().copied().unwrap_or(0)
    }

    /// Product of all extents after the first.
    pub fn cols(&self) -> Result<usize> {
        extent_product(self.dims.get(1..).unwrap_or_default())
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the cell array has no slots.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Content of slot `index`, if present and non-empty.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.cells.get(index)?.as_ref()
    }

    /// Mutable content of slot `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.cells.get_mut(index)?.as_mut()
    }
}

/// A node of the value tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Flat element buffer.
    Numeric(NumericArray),
    /// Struct array.
    Struct(StructArray),
    /// Cell array.
    Cell(CellArray),
}

impl Value {
    /// Short name of the node kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Numeric(n) if n.is_numeric() => "numeric",
            Self::Numeric(n) if n.class() == ClassId::Char => "char",
            Self::Numeric(_) => "logical",
            Self::Struct(_) => "struct",
            Self::Cell(_) => "cell",
        }
    }

    /// Number of elements (records for structs, slots for cells).
    pub fn element_count(&self) -> Result<usize> {
        match self {
            Self::Numeric(n) => n.element_count(),
            Self::Struct(s) => Ok(s.len()),
            Self::Cell(c) => Ok(c.len()),
        }
    }

    /// Returns the numeric array, if this is one.
    pub fn as_numeric(&self) -> Option<&NumericArray> {
        match self {
            Self::Numeric(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the struct array, if this is one.
    pub fn as_struct(&self) -> Option<&StructArray> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Mutable struct array access.
    pub fn as_struct_mut(&mut self) -> Option<&mut StructArray> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the cell array, if this is one.
    pub fn as_cell(&self) -> Option<&CellArray> {
        match self {
            Self::Cell(c) => Some(c),
            _ => None,
        }
    }

    /// Mutable cell array access.
    pub fn as_cell_mut(&mut self) -> Option<&mut CellArray> {
        match self {
            Self::Cell(c) => Some(c),
            _ => None,
        }
    }
}

impl From<NumericArray> for Value {
    fn from(v: NumericArray) -> Self {
        Self::Numeric(v)
    }
}

impl From<StructArray> for Value {
    fn from(v: StructArray) -> Self {
        Self::Struct(v)
    }
}

impl From<CellArray> for Value {
    fn from(v: CellArray) -> Self {
        Self::Cell(v)
    }
}
