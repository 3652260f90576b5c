//! Shared fixtures: a small model layout and dataset constructors.
#![allow(dead_code)]

use paramswap::{
    Address, CellArray, FieldSpec, ModelChecksum, NumericArray, ParamScope, Result,
    StaticLiveTables, StaticTypeMap, StructArray, Value,
};

pub const CHECKSUM: [f64; 4] = [1_234.0, 5_678.0, 91_011.0, 121_314.0];

/// Every byte of a fresh block holds this value, so untouched regions are easy to spot.
pub const FILL: u8 = 0xAA;
pub const BLOCK_SIZE: usize = 256;

// Non-struct destinations (transition table entries 0..=3).
pub const DOUBLES_ADDR: usize = 0; // 3 x f64
pub const CPLX_FLAT_ADDR: usize = 24; // 3 x complex f32, interleaved
pub const INTS_ADDR: usize = 48; // 2 x i32
pub const ENUM_ADDR: usize = 56; // 2 x enum (4 bytes)

// Struct parameters.
pub const GAINS_ADDR: usize = 64; // Gains[3], 16 bytes each
pub const CPLX_STRUCT_ADDR: usize = 112; // Wave, 24 bytes
pub const OUTER_ADDR: usize = 144; // Outer, 48 bytes
pub const SCALAR_GAINS_ADDR: usize = 192; // Gains, 16 bytes

// Live data type ids.
pub const ID_DOUBLE: usize = 0;
pub const ID_SINGLE: usize = 1;
pub const ID_INT32: usize = 6;
pub const ID_ENUM: usize = 14;

/// Type map indices of the fixture model.
#[derive(Debug, Clone, Copy)]
pub struct Types {
    pub double: usize,
    pub single: usize,
    pub int32: usize,
    pub csingle: usize,
    pub gains: usize,
    pub wave: usize,
    pub fix_word: usize,
    pub outer: usize,
    pub scalar_dim: usize,
    pub row3: usize,
    pub row2: usize,
}

/// Model parameter indices.
#[derive(Debug, Clone, Copy)]
pub struct Params {
    pub gains: usize,
    pub outer: usize,
    pub scalar_gains: usize,
    /// Block-scope parameter.
    pub wave: usize,
}

#[derive(Debug, Clone)]
pub struct Model {
    pub type_map: StaticTypeMap,
    pub live: StaticLiveTables,
    pub types: Types,
    pub params: Params,
}

/// Builds the fixture model:
///
/// ```text
/// Gains  (16 bytes) { a: f64 @0, b: f32 @8, c: i32 @12 }
/// Wave   (24 bytes) { z: complex f32 [1x3] @0 }
/// FixWord (4 bytes) { hi: i32 @0, lo: i32 @0 }   only ever used as fixed-point
/// Outer  (48 bytes) { scale: f64 @0, inner: Gains[1x2] @8, word: FixWord (fixed-point) @40 }
/// ```
pub fn model() -> Model {
    let mut map = StaticTypeMap::new();
    let double = map.add_scalar("double", 8, false);
    let single = map.add_scalar("single", 4, false);
    let int32 = map.add_scalar("int32", 4, false);
    let csingle = map.add_scalar("creal32_T", 8, true);

    let scalar_dim = map.add_dimension(&[1, 1]);
    let row3 = map.add_dimension(&[1, 3]);
    let row2 = map.add_dimension(&[1, 2]);

    let gains = map.add_struct(
        "Gains",
        16,
        [
            FieldSpec::new("a", double, scalar_dim, 0),
            FieldSpec::new("b", single, scalar_dim, 8),
            FieldSpec::new("c", int32, scalar_dim, 12),
        ],
    );
    let wave = map.add_struct("Wave", 24, [FieldSpec::new("z", csingle, row3, 0)]);
    let fix_word = map.add_struct(
        "FixWord",
        4,
        [
            FieldSpec::new("hi", int32, scalar_dim, 0),
            FieldSpec::new("lo", int32, scalar_dim, 0),
        ],
    );
    let outer = map.add_struct(
        "Outer",
        48,
        [
            FieldSpec::new("scale", double, scalar_dim, 0),
            FieldSpec::new("inner", gains, row2, 8),
            FieldSpec::new("word", fix_word, scalar_dim, 40).fixed_point(1),
        ],
    );

    let p_gains = map.add_parameter(ParamScope::Model, "G", gains, row3, 0, Address::new(GAINS_ADDR));
    let p_outer = map.add_parameter(ParamScope::Model, "O", outer, scalar_dim, 0, Address::new(OUTER_ADDR));
    let p_scalar_gains = map.add_parameter(
        ParamScope::Model,
        "G1",
        gains,
        scalar_dim,
        0,
        Address::new(SCALAR_GAINS_ADDR),
    );
    let p_wave = map.add_parameter(ParamScope::Block, "W", wave, scalar_dim, 0, Address::new(CPLX_STRUCT_ADDR));

    let mut sizes = vec![8, 4, 1, 1, 2, 2, 4, 4, 1, 0, 0, 0, 0, 0];
    sizes.push(4); // ID_ENUM
    let mut live = StaticLiveTables::new(ModelChecksum::new(CHECKSUM), sizes);
    live.add_transition(Address::new(DOUBLES_ADDR));
    live.add_transition(Address::new(CPLX_FLAT_ADDR));
    live.add_transition(Address::new(INTS_ADDR));
    live.add_transition(Address::new(ENUM_ADDR));

    Model {
        type_map: map,
        live,
        types: Types {
            double,
            single,
            int32,
            csingle,
            gains,
            wave,
            fix_word,
            outer,
            scalar_dim,
            row3,
            row2,
        },
        params: Params {
            gains: p_gains,
            outer: p_outer,
            scalar_gains: p_scalar_gains,
            wave: p_wave,
        },
    }
}

/// Routes engine logs to the test harness output. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

pub fn block() -> Vec<u8> {
    vec![FILL; BLOCK_SIZE]
}

pub const ENTRY_FIELDS: [&str; 6] = [
    "dataTypeName",
    "dataTypeId",
    "complex",
    "dtTransIdx",
    "values",
    "structParamInfo",
];

pub fn num(v: f64) -> Value {
    NumericArray::scalar(v).into()
}

/// A flat entry record.
pub fn flat_entry(
    type_name: &str,
    data_type_id: usize,
    complex: bool,
    transition: usize,
    values: Option<Value>,
) -> Vec<Option<Value>> {
    vec![
        Some(NumericArray::text(type_name).into()),
        Some(num(data_type_id as f64)),
        Some(num(if complex { 1.0 } else { 0.0 })),
        Some(num(transition as f64)),
        values,
        None,
    ]
}

/// A struct entry record: `values` become a 1xK cell, `metas` the `(ModelParam,
/// CAPIIdx)` of each slot.
pub fn struct_entry(
    type_name: &str,
    values: Vec<Option<Value>>,
    metas: &[(bool, usize)],
) -> Result<Vec<Option<Value>>> {
    let mut info = StructArray::new(["ModelParam", "CAPIIdx"]);
    for &(model, index) in metas {
        info.push_record(vec![
            Some(num(if model { 1.0 } else { 0.0 })),
            Some(num(index as f64)),
        ])?;
    }
    Ok(vec![
        Some(NumericArray::text(type_name).into()),
        Some(num(0.0)),
        Some(num(0.0)),
        Some(num(0.0)),
        Some(CellArray::row(values).into()),
        Some(info.into()),
    ])
}

pub fn parameters(entries: Vec<Vec<Option<Value>>>) -> Result<StructArray> {
    let mut params = StructArray::new(ENTRY_FIELDS);
    for entry in entries {
        params.push_record(entry)?;
    }
    Ok(params)
}

/// A dataset root with the given checksum and `parameters` field.
pub fn dataset_with(checksum: [f64; 4], parameters: impl Into<Value>) -> Value {
    StructArray::scalar([
        ("modelChecksum", Value::from(NumericArray::row(&checksum))),
        ("parameters", parameters.into()),
    ])
    .into()
}

pub fn dataset(parameters: impl Into<Value>) -> Value {
    dataset_with(CHECKSUM, parameters)
}

/// One `Gains` record in field order `a, b, c`.
pub fn gains_record(a: f64, b: f32, c: i32) -> Vec<Option<Value>> {
    vec![
        Some(num(a)),
        Some(NumericArray::scalar(b).into()),
        Some(NumericArray::scalar(c).into()),
    ]
}

pub fn gains_array(records: &[(f64, f32, i32)]) -> Result<StructArray> {
    let mut array = StructArray::new(["a", "b", "c"]);
    for &(a, b, c) in records {
        array.push_record(gains_record(a, b, c))?;
    }
    Ok(array)
}

/// An `Outer` value; `inner` may hold fewer records than the two the layout declares.
pub fn outer_value(scale: f64, inner: &[(f64, f32, i32)], word: i32) -> Result<Value> {
    Ok(StructArray::scalar([
        ("scale", num(scale)),
        ("inner", gains_array(inner)?.into()),
        ("word", NumericArray::scalar(word).into()),
    ])
    .into())
}

/// A `Wave` value with `z = [1+10i, 2+20i, 3+30i]`.
pub fn wave_value() -> Result<Value> {
    Ok(StructArray::scalar([(
        "z",
        Value::from(NumericArray::complex_row(&[1.0f32, 2.0, 3.0], &[10.0f32, 20.0, 30.0])?),
    )])
    .into())
}

/// Five entries covering every entry kind:
///
/// 0. flat doubles `[1.5, 2.5, 3.5]` (transition 0)
/// 1. `Gains[3]` struct array
/// 2. `Outer` with a two-element inner struct array and a fixed-point word
/// 3. flat int32 entry without `values` (transition 2)
/// 4. block-scope `Wave` holding a complex field
pub fn mixed_parameters(model: &Model) -> Result<StructArray> {
    parameters(vec![
        flat_entry(
            "double",
            ID_DOUBLE,
            false,
            0,
            Some(NumericArray::row(&[1.5f64, 2.5, 3.5]).into()),
        ),
        struct_entry(
            "Gains",
            vec![Some(
                gains_array(&[(1.0, 2.0, 3), (4.0, 5.0, 6), (7.0, 8.0, 9)])?.into(),
            )],
            &[(true, model.params.gains)],
        )?,
        struct_entry(
            "Outer",
            vec![Some(outer_value(0.5, &[(10.0, 11.0, 12), (13.0, 14.0, 15)], -7)?)],
            &[(true, model.params.outer)],
        )?,
        flat_entry("int32", ID_INT32, false, 2, None),
        struct_entry("Wave", vec![Some(wave_value()?)], &[(false, model.params.wave)])?,
    ])
}

pub fn read_f64(block: &[u8], at: usize) -> f64 {
    f64::from_ne_bytes(block[at..at + 8].try_into().expect("8 bytes"))
}

pub fn read_f32(block: &[u8], at: usize) -> f32 {
    f32::from_ne_bytes(block[at..at + 4].try_into().expect("4 bytes"))
}

pub fn read_i32(block: &[u8], at: usize) -> i32 {
    i32::from_ne_bytes(block[at..at + 4].try_into().expect("4 bytes"))
}

pub fn untouched(block: &[u8], range: std::ops::Range<usize>) -> bool {
    block[range].iter().all(|&b| b == FILL)
}
