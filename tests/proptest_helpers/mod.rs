#![allow(dead_code)]

use coordconv::ir::{ColumnData, Field, Record, Table};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

/// Coordinates written as shortest round-trip floats come back exactly;
/// shifting by half a box size may lose the last bit.
pub const EPS_SHIFT: f64 = 1e-9;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Pixel coordinates on a typical detector.
pub fn arb_coordinate() -> impl Strategy<Value = f64> {
    (0u32..8192u32, 0u32..1000u32).prop_map(|(whole, frac)| whole as f64 + frac as f64 / 1000.0)
}

pub fn arb_confidence() -> impl Strategy<Value = f64> {
    -50.0f64..50.0f64
}

pub fn arb_micrograph_name() -> impl Strategy<Value = String> {
    "[a-z]{1,6}/mic[0-9]{3}\\.mrc"
}

/// A particle with a square box.
pub fn arb_record() -> impl Strategy<Value = Record> {
    (
        arb_coordinate(),
        arb_coordinate(),
        prop_oneof![Just(64u32), Just(128u32), 16u32..512u32],
        proptest::option::of(arb_confidence()),
        proptest::option::of(arb_micrograph_name()),
    )
        .prop_map(|(x, y, size, conf, name)| Record {
            w: Some(size as f64),
            h: Some(size as f64),
            conf,
            name,
            ..Record::at(x, y)
        })
}

pub fn arb_records(max: usize) -> impl Strategy<Value = Vec<Record>> {
    proptest::collection::vec(arb_record(), 1..max)
}

/// The float values of a field, panicking if it is absent or text.
pub fn floats(table: &Table, field: Field) -> Vec<f64> {
    match table.field(field) {
        Some(data) => data.to_floats().expect("numeric column"),
        None => panic!("field '{}' is absent", field),
    }
}

pub fn assert_close(actual: &[f64], expected: &[f64], eps: f64) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() <= eps, "{} differs from {} by more than {}", a, e, eps);
    }
}

pub fn float_column(values: &[f64]) -> ColumnData {
    ColumnData::Float(values.to_vec())
}
