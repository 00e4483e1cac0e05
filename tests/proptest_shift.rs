mod proptest_helpers;

use std::path::Path;

use coordconv::conversion::transform::{shift, transform};
use coordconv::conversion::{Format, ShiftRule, TransformOptions};
use coordconv::ir::{Field, Table};
use proptest::prelude::*;
use proptest_helpers::{arb_records, assert_close, floats, proptest_config, EPS_SHIFT};

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn corner_center_corner_returns_to_start(records in arb_records(32)) {
        let original = Table::from_records(&records);
        let mut table = original.clone();
        let path = Path::new("picks.box");

        shift(&mut table, ShiftRule::CornerToCenter, None, path).unwrap();
        shift(&mut table, ShiftRule::CenterToCorner, None, path).unwrap();

        assert_close(&floats(&table, Field::X), &floats(&original, Field::X), EPS_SHIFT);
        assert_close(&floats(&table, Field::Y), &floats(&original, Field::Y), EPS_SHIFT);
    }

    #[test]
    fn center_moves_by_half_the_box(records in arb_records(32)) {
        let mut table = Table::from_records(&records);
        shift(&mut table, ShiftRule::CornerToCenter, None, Path::new("picks.box")).unwrap();

        let expected: Vec<f64> = records
            .iter()
            .map(|r| r.x + r.w.unwrap() / 2.0)
            .collect();
        assert_close(&floats(&table, Field::X), &expected, 0.0);
    }

    #[test]
    fn forced_box_size_overrides_file_sizes(records in arb_records(32), size in 8u32..1024u32) {
        let mut table = Table::from_records(&records);
        shift(&mut table, ShiftRule::CenterToCorner, Some(size), Path::new("picks.star")).unwrap();

        let expected: Vec<f64> = records.iter().map(|r| r.y - size as f64 / 2.0).collect();
        assert_close(&floats(&table, Field::Y), &expected, 0.0);
        prop_assert!(floats(&table, Field::W).iter().all(|&w| w == size as f64));
    }

    #[test]
    fn same_convention_is_bit_identical(records in arb_records(32)) {
        let table = Table::from_records(&records);
        let options = TransformOptions::default();

        for (from, to) in [(Format::Star, Format::Tsv), (Format::Tsv, Format::Star), (Format::Cbox, Format::Box)] {
            let (out, _) = transform(table.clone(), from, to, &options, Path::new("in")).unwrap();
            let x: Vec<u64> = floats(&out, Field::X).iter().map(|v| v.to_bits()).collect();
            let expected: Vec<u64> = records.iter().map(|r| r.x.to_bits()).collect();
            prop_assert_eq!(x, expected);
        }
    }
}
