#![allow(missing_docs)]

mod common;

use common::*;
use paramswap::builder::build_descriptors;
use paramswap::counter::{count_dataset, count_leaves};
use paramswap::dataset::{parameters_mut, Dataset};
use paramswap::{
    Address, DescriptorTable, LeafCounts, LeafTarget, NumericArray, ParamScope, Result,
    StructArray, SwapError, Value,
};

/// Runs the counting and building passes over parameter set 1 of `root`.
fn build(model: &Model, root: &mut Value) -> Result<DescriptorTable> {
    let counts = {
        let dataset = Dataset::new(root)?;
        let params = dataset.parameters(1)?.expect("dataset has parameters");
        count_dataset(&params, &model.type_map)?
    };
    let mut table = DescriptorTable::with_counts(counts)?;
    let entries = parameters_mut(root, 1)?.expect("dataset has parameters");
    build_descriptors(entries, &model.type_map, &mut table)?;
    Ok(table)
}

fn struct_addresses(table: &DescriptorTable) -> Vec<usize> {
    table
        .leaves()
        .iter()
        .filter_map(|leaf| match leaf.target {
            LeafTarget::Struct { address, .. } => Some(address.as_usize()),
            LeafTarget::Transition { .. } => None,
        })
        .collect()
}

/// Every numeric buffer reachable from `value`, as (has real, has imag).
fn buffers(value: &Value, out: &mut Vec<(bool, bool)>) {
    match value {
        Value::Numeric(n) => out.push((n.real().is_some(), n.imag().is_some())),
        Value::Struct(s) => {
            for i in 0..s.len() {
                for name in s.field_names() {
                    if let Some(v) = s.field(i, name) {
                        buffers(v, out);
                    }
                }
            }
        }
        Value::Cell(c) => {
            for i in 0..c.len() {
                if let Some(v) = c.get(i) {
                    buffers(v, out);
                }
            }
        }
    }
}

// --- COUNTING ---

#[test]
fn test_count_leaves_per_type() -> Result<()> {
    let m = model();
    let t = m.types;

    assert_eq!(count_leaves(&m.type_map, t.double, t.scalar_dim, 0)?, 1);
    // Leaf types count once whatever their shape.
    assert_eq!(count_leaves(&m.type_map, t.csingle, t.row3, 0)?, 1);
    assert_eq!(count_leaves(&m.type_map, t.gains, t.scalar_dim, 0)?, 3);
    assert_eq!(count_leaves(&m.type_map, t.gains, t.row3, 0)?, 9);
    // scale + inner (3 x 2) + word
    assert_eq!(count_leaves(&m.type_map, t.outer, t.scalar_dim, 0)?, 8);
    Ok(())
}

/// A field with a non-zero fixed-point index is a single leaf even though its type has
/// children.
#[test]
fn test_fixed_point_short_circuit() -> Result<()> {
    let m = model();
    let t = m.types;

    assert_eq!(count_leaves(&m.type_map, t.fix_word, t.scalar_dim, 0)?, 2);
    assert_eq!(count_leaves(&m.type_map, t.fix_word, t.scalar_dim, 1)?, 1);
    assert_eq!(count_leaves(&m.type_map, t.fix_word, t.row3, 5)?, 1);

    let mut root = dataset(parameters(vec![struct_entry(
        "Outer",
        vec![Some(outer_value(0.5, &[(1.0, 2.0, 3), (4.0, 5.0, 6)], 99)?)],
        &[(true, m.params.outer)],
    )?])?);
    let table = build(&m, &mut root)?;

    let word = table.leaves().last().expect("word leaf");
    assert_eq!(word.data_type, t.fix_word);
    assert_eq!(word.element_count, 1);
    assert_eq!(
        word.target,
        LeafTarget::Struct {
            address: Address::new(OUTER_ADDR + 40),
            scope: ParamScope::Model,
        }
    );
    Ok(())
}

#[test]
fn test_count_dataset_mixed() -> Result<()> {
    let m = model();
    let root = dataset(mixed_parameters(&m)?);
    let dataset = Dataset::new(&root)?;
    let params = dataset.parameters(1)?.expect("parameters");

    let counts = count_dataset(&params, &m.type_map)?;
    assert_eq!(
        counts,
        LeafCounts {
            top_level_entries: 5,
            struct_leaves: 9 + 8 + 1,
            non_struct_leaves: 2,
        }
    );
    assert_eq!(counts.total(), 20);
    Ok(())
}

/// The building pass produces exactly as many descriptors as the counting pass sized
/// the table for.
#[test]
fn test_leaf_count_consistency() -> Result<()> {
    let m = model();

    let datasets = vec![
        mixed_parameters(&m)?,
        parameters(vec![flat_entry("double", ID_DOUBLE, false, 0, None)])?,
        parameters(vec![struct_entry(
            "Outer",
            vec![Some(outer_value(1.0, &[(1.0, 2.0, 3)], 4)?)],
            &[(true, m.params.outer)],
        )?])?,
        parameters(vec![
            struct_entry(
                "Gains",
                vec![
                    Some(gains_array(&[(1.0, 2.0, 3)])?.into()),
                    None,
                    Some(gains_array(&[(4.0, 5.0, 6)])?.into()),
                ],
                &[
                    (true, m.params.scalar_gains),
                    (true, m.params.scalar_gains),
                    (true, m.params.scalar_gains),
                ],
            )?,
            flat_entry(
                "int32",
                ID_INT32,
                false,
                2,
                Some(NumericArray::row(&[1i32, 2]).into()),
            ),
        ])?,
    ];

    for params in datasets {
        let mut root = dataset(params);
        let table = build(&m, &mut root)?;
        assert!(table.is_complete());
        assert_eq!(table.len(), table.counts().total());
    }
    Ok(())
}

// --- BUILDING ---

#[test]
fn test_descriptor_order_and_targets() -> Result<()> {
    let m = model();
    let mut root = dataset(mixed_parameters(&m)?);
    let table = build(&m, &mut root)?;
    let leaves = table.leaves();

    assert_eq!(leaves[0].target, LeafTarget::Transition { index: 0 });
    assert_eq!(leaves[0].data_type, ID_DOUBLE);
    assert_eq!(leaves[0].element_count, 3);
    assert_eq!(leaves[0].element_size, 8);

    // Gains[3]: a, b, c per element, 16 bytes apart.
    let gains: Vec<usize> = struct_addresses(&table)[..9].to_vec();
    assert_eq!(
        gains,
        vec![64, 72, 76, 80, 88, 92, 96, 104, 108]
    );

    // Outer: scale, inner[0].{a,b,c}, inner[1].{a,b,c}, word.
    let outer: Vec<usize> = struct_addresses(&table)[9..17].to_vec();
    assert_eq!(outer, vec![144, 152, 160, 164, 168, 176, 180, 184]);

    // Absent int32 values: one empty non-struct leaf.
    let absent = &leaves[18];
    assert_eq!(absent.target, LeafTarget::Transition { index: 2 });
    assert_eq!(absent.element_count, 0);
    assert!(absent.real.is_none());

    // Block-scope complex field.
    let wave = &leaves[19];
    assert!(wave.complex);
    assert_eq!(
        wave.target,
        LeafTarget::Struct {
            address: Address::new(CPLX_STRUCT_ADDR),
            scope: ParamScope::Block,
        }
    );
    assert!(wave.imag.is_some());
    Ok(())
}

/// A struct array of 3 elements of 16 bytes at base A yields leaves at A, A+16, A+32.
#[test]
fn test_struct_array_addressing() -> Result<()> {
    let m = model();
    let mut root = dataset(parameters(vec![struct_entry(
        "Gains",
        vec![Some(
            gains_array(&[(1.0, 2.0, 3), (4.0, 5.0, 6), (7.0, 8.0, 9)])?.into(),
        )],
        &[(true, m.params.gains)],
    )?])?);
    let table = build(&m, &mut root)?;

    let a_addresses: Vec<usize> = table
        .leaves()
        .iter()
        .filter(|leaf| leaf.data_type == m.types.double)
        .filter_map(|leaf| match leaf.target {
            LeafTarget::Struct { address, .. } => Some(address.as_usize()),
            LeafTarget::Transition { .. } => None,
        })
        .collect();
    assert_eq!(a_addresses, vec![GAINS_ADDR, GAINS_ADDR + 16, GAINS_ADDR + 32]);
    Ok(())
}

/// After building, the dataset no longer holds any of the consumed buffers, and every
/// populated descriptor owns the bytes that were in the dataset.
#[test]
fn test_ownership_exclusivity() -> Result<()> {
    let m = model();
    let mut root = dataset(mixed_parameters(&m)?);
    let table = build(&m, &mut root)?;

    let entries = Dataset::new(&root)?
        .parameters(1)?
        .expect("parameters");
    for i in 0..entries.len() {
        let mut found = Vec::new();
        if let Some(values) = entries.values(i) {
            buffers(values, &mut found);
        }
        assert!(
            found.iter().all(|&(real, imag)| !real && !imag),
            "entry {i} still owns buffers: {found:?}"
        );
    }

    let doubles = table.leaves()[0].real.as_deref().expect("detached doubles");
    let expected: Vec<u8> = [1.5f64, 2.5, 3.5].iter().flat_map(|v| v.to_ne_bytes()).collect();
    assert_eq!(doubles, expected.as_slice());

    let wave = table.leaves().last().expect("wave leaf");
    let imag: Vec<u8> = [10.0f32, 20.0, 30.0].iter().flat_map(|v| v.to_ne_bytes()).collect();
    assert_eq!(wave.imag.as_deref(), Some(imag.as_slice()));
    Ok(())
}

/// Missing fields and missing struct-array positions still occupy descriptor slots,
/// with no elements.
#[test]
fn test_absent_struct_values_yield_empty_leaves() -> Result<()> {
    let m = model();
    let mut gains = StructArray::new(["a", "c"]);
    gains.push_record(vec![Some(num(2.0)), Some(NumericArray::scalar(5i32).into())])?;

    let mut root = dataset(parameters(vec![
        struct_entry("Gains", vec![Some(gains.into())], &[(true, m.params.scalar_gains)])?,
        struct_entry(
            "Outer",
            vec![Some(outer_value(1.0, &[(1.0, 2.0, 3)], 4)?)],
            &[(true, m.params.outer)],
        )?,
    ])?);
    let table = build(&m, &mut root)?;
    let counts: Vec<usize> = table.leaves().iter().map(|l| l.element_count).collect();

    // Gains {a, b (absent), c}, Outer {scale, inner[0] x3, inner[1] x3 (absent), word}.
    assert_eq!(counts, vec![1, 0, 1, 1, 1, 1, 1, 0, 0, 0, 1]);
    Ok(())
}

#[test]
fn test_empty_cells_contribute_nothing() -> Result<()> {
    let m = model();
    let mut root = dataset(parameters(vec![
        struct_entry("Gains", vec![None], &[(true, m.params.scalar_gains)])?,
        flat_entry("double", ID_DOUBLE, false, 0, Some(num(1.0))),
    ])?);
    let table = build(&m, &mut root)?;

    assert_eq!(table.counts().struct_leaves, 0);
    assert_eq!(table.len(), 1);
    Ok(())
}

#[test]
fn test_logical_values_keep_no_imaginary_part() -> Result<()> {
    let m = model();
    let mut root = dataset(parameters(vec![flat_entry(
        "boolean",
        8,
        false,
        0,
        Some(NumericArray::logical(&[true, false, true]).into()),
    )])?);
    let table = build(&m, &mut root)?;

    let leaf = &table.leaves()[0];
    assert_eq!(leaf.element_size, 1);
    assert_eq!(leaf.real.as_deref(), Some(&[1u8, 0, 1][..]));
    assert!(leaf.imag.is_none());
    Ok(())
}

// --- VALIDATION ---

fn build_err(model: &Model, params: StructArray) -> SwapError {
    let mut root = dataset(params);
    match build(model, &mut root) {
        Ok(table) => panic!("expected a validation error, built {} leaves", table.len()),
        Err(err) => err,
    }
}

#[test]
fn test_struct_param_info_required() -> Result<()> {
    let m = model();
    let mut entry = struct_entry(
        "Gains",
        vec![Some(gains_array(&[(1.0, 2.0, 3)])?.into())],
        &[(true, m.params.scalar_gains)],
    )?;
    entry[5] = None;

    let err = build_err(&m, parameters(vec![entry])?);
    assert!(matches!(err, SwapError::Validation(ref msg) if msg.contains("structParamInfo")));
    Ok(())
}

#[test]
fn test_struct_param_info_length_mismatch() -> Result<()> {
    let m = model();
    let entry = struct_entry(
        "Gains",
        vec![Some(gains_array(&[(1.0, 2.0, 3)])?.into())],
        &[(true, m.params.scalar_gains), (true, m.params.scalar_gains)],
    )?;

    let err = build_err(&m, parameters(vec![entry])?);
    assert!(matches!(err, SwapError::Validation(ref msg) if msg.contains("length")));
    Ok(())
}

#[test]
fn test_record_meta_fields_required() -> Result<()> {
    let m = model();
    let mut entry = struct_entry(
        "Gains",
        vec![Some(gains_array(&[(1.0, 2.0, 3)])?.into())],
        &[],
    )?;
    let info = StructArray::new(["ModelParam"]).with_record(vec![Some(num(1.0))])?;
    entry[5] = Some(info.into());

    let err = build_err(&m, parameters(vec![entry])?);
    assert!(matches!(err, SwapError::Validation(ref msg) if msg.contains("CAPIIdx")));
    Ok(())
}

#[test]
fn test_fixed_point_struct_param_rejected() -> Result<()> {
    let mut m = model();
    let fixed = m.type_map.add_parameter(
        ParamScope::Model,
        "F",
        m.types.gains,
        m.types.scalar_dim,
        2,
        Address::new(0),
    );
    let entry = struct_entry(
        "Gains",
        vec![Some(gains_array(&[(1.0, 2.0, 3)])?.into())],
        &[(true, fixed)],
    )?;

    let err = build_err(&m, parameters(vec![entry])?);
    assert!(matches!(err, SwapError::Validation(ref msg) if msg.contains("fixed-point")));
    Ok(())
}

#[test]
fn test_non_struct_value_in_cell_rejected() -> Result<()> {
    let m = model();
    let entry = struct_entry("Gains", vec![Some(num(1.0))], &[(true, m.params.scalar_gains)])?;

    let err = build_err(&m, parameters(vec![entry])?);
    assert!(matches!(err, SwapError::Validation(_)));
    Ok(())
}

#[test]
fn test_struct_value_outside_cell_rejected() -> Result<()> {
    let m = model();
    let entry = flat_entry(
        "Gains",
        ID_DOUBLE,
        false,
        0,
        Some(gains_array(&[(1.0, 2.0, 3)])?.into()),
    );

    let err = build_err(&m, parameters(vec![entry])?);
    assert!(matches!(err, SwapError::Validation(_)));
    Ok(())
}

#[test]
fn test_scalar_where_struct_expected_rejected() -> Result<()> {
    let m = model();
    let outer = StructArray::scalar([
        ("scale", num(1.0)),
        ("inner", num(2.0)),
        ("word", NumericArray::scalar(3i32).into()),
    ]);
    let entry = struct_entry("Outer", vec![Some(outer.into())], &[(true, m.params.outer)])?;

    let err = build_err(&m, parameters(vec![entry])?);
    assert!(matches!(err, SwapError::Validation(ref msg) if msg.contains("inner")));
    Ok(())
}

#[test]
fn test_struct_cell_must_have_one_row() -> Result<()> {
    let m = model();
    let mut entry = struct_entry(
        "Gains",
        vec![
            Some(gains_array(&[(1.0, 2.0, 3)])?.into()),
            Some(gains_array(&[(4.0, 5.0, 6)])?.into()),
        ],
        &[(true, m.params.scalar_gains), (true, m.params.scalar_gains)],
    )?;
    let column = paramswap::CellArray::new(
        vec![2, 1],
        vec![
            Some(gains_array(&[(1.0, 2.0, 3)])?.into()),
            Some(gains_array(&[(4.0, 5.0, 6)])?.into()),
        ],
    )?;
    entry[4] = Some(column.into());

    let err = build_err(&m, parameters(vec![entry])?);
    assert!(matches!(err, SwapError::Validation(ref msg) if msg.contains("one row")));
    Ok(())
}

#[test]
fn test_struct_array_length_must_match_model() -> Result<()> {
    let m = model();
    let entry = struct_entry(
        "Gains",
        vec![Some(gains_array(&[(1.0, 2.0, 3), (4.0, 5.0, 6)])?.into())],
        &[(true, m.params.gains)],
    )?;

    let err = build_err(&m, parameters(vec![entry])?);
    assert!(matches!(err, SwapError::Validation(ref msg) if msg.contains("declares 3")));
    Ok(())
}
