//! Library-level conversions through `process_conversion`.

mod common;

use std::fs;
use std::path::{Path, PathBuf};

use coordconv::conversion::{
    process_conversion, ColumnSpec, ConversionIssueCode, ConversionSeverity, ConvertOptions,
    Format,
};
use coordconv::ir::HeaderMode;
use coordconv::CoordconvError;

use common::{copy_fixture, read_lines};

#[test]
fn star_to_tsv_keeps_center_coordinates_and_names() {
    let temp = tempfile::tempdir().unwrap();
    let input = copy_fixture("relion_autopick.star", temp.path());
    let out_dir = temp.path().join("out");

    let options = ConvertOptions::new(Format::Star, Format::Tsv);
    let report = process_conversion(&[input], &out_dir, &options).unwrap();

    assert_eq!(report.inputs, 1);
    assert_eq!(report.rows_written(), 3);
    assert_eq!(report.warning_count(), 0);
    assert_eq!(
        read_lines(&out_dir.join("relion_autopick.tsv")),
        vec![
            "1021.0\t872.0\t0.92314\tMotionCorr/job002/mic001.mrc",
            "404.0\t133.0\t0.41233\tMotionCorr/job002/mic001.mrc",
            "2210.0\t1630.0\t0.67781\tMotionCorr/job002/mic002.mrc",
        ]
    );
}

#[test]
fn index_overrides_can_swap_axes() {
    let temp = tempfile::tempdir().unwrap();
    let input = copy_fixture("eman.box", temp.path());
    let out_dir = temp.path().join("out");

    let mut options = ConvertOptions::new(Format::Box, Format::Box);
    options.columns[0] = ColumnSpec::ByIndex(1);
    options.columns[1] = ColumnSpec::ByIndex(0);
    options.columns[4] = ColumnSpec::Excluded;
    process_conversion(&[input], &out_dir, &options).unwrap();

    assert_eq!(
        read_lines(&out_dir.join("eman.box")),
        vec!["10\t10\t20\t20", "50\t100\t64\t64"]
    );
}

#[test]
fn missing_override_column_is_skipped() {
    let temp = tempfile::tempdir().unwrap();
    let input = copy_fixture("picks.tsv", temp.path());
    let out_dir = temp.path().join("out");

    let mut options = ConvertOptions::new(Format::Tsv, Format::Star);
    options.columns[5] = ColumnSpec::ByIndex(7);
    let report = process_conversion(&[input], &out_dir, &options).unwrap();

    assert!(report.has_issue(ConversionIssueCode::ColumnNotFound));
    assert_eq!(
        read_lines(&out_dir.join("picks.star"))[3..],
        [
            "_rlnCoordinateX #1",
            "_rlnCoordinateY #2",
            "_rlnAutopickFigureOfMerit #3",
            "512.5\t300.0\t0.8",
            "128.0\t64.0\t0.2",
        ]
    );
}

#[test]
fn excluded_field_stays_out_when_header_reuses_its_name() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("scored.tsv");
    fs::write(&input, "x\ty\tconf\n10.5\t20.5\t0.5\n30.5\t40.5\t0.7\n").unwrap();
    let out_dir = temp.path().join("out");

    let mut options = ConvertOptions::new(Format::Tsv, Format::Tsv);
    options.header_mode = HeaderMode::Row(0);
    options.include_header = true;
    options.columns[4] = ColumnSpec::Excluded;
    process_conversion(&[input], &out_dir, &options).unwrap();

    assert_eq!(
        read_lines(&out_dir.join("scored.tsv")),
        vec!["x\ty", "10.5\t20.5", "30.5\t40.5"]
    );
}

/// `target` relative to `base`, both absolute.
fn relative_to(base: &Path, target: &Path) -> PathBuf {
    let base: Vec<_> = base.components().collect();
    let target: Vec<_> = target.components().collect();
    let common = base.iter().zip(&target).take_while(|(a, b)| a == b).count();
    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component);
    }
    relative
}

#[test]
fn relative_inputs_are_written_directly_into_out_dir() {
    let temp = tempfile::tempdir_in(env!("CARGO_TARGET_TMPDIR")).unwrap();
    for dir in ["sub", "side"] {
        fs::create_dir_all(temp.path().join(dir)).unwrap();
    }
    fs::write(temp.path().join("sub/mic1.box"), "100\t200\t64\t64\n").unwrap();
    fs::write(temp.path().join("side/mic2.box"), "300\t400\t64\t64\n").unwrap();
    let out_dir = temp.path().join("out");

    let cwd = std::env::current_dir().unwrap();
    let relative = relative_to(&cwd, temp.path());
    let parent_hop = Path::new("..")
        .join(cwd.file_name().unwrap())
        .join(&relative);
    let inputs = vec![
        relative.join("sub/mic1.box"),
        parent_hop.join("side/mic2.box"),
    ];

    let options = ConvertOptions::new(Format::Box, Format::Star);
    let report = process_conversion(&inputs, &out_dir, &options).unwrap();

    assert_eq!(report.outputs.len(), 2);
    assert!(out_dir.join("mic1.star").is_file());
    assert!(out_dir.join("mic2.star").is_file());
    assert!(!out_dir.join("sub").exists());
}

#[test]
fn single_out_merges_inputs_in_order() {
    let temp = tempfile::tempdir().unwrap();
    let first = copy_fixture("relion_autopick.star", temp.path());
    let second_dir = temp.path().join("more");
    fs::create_dir_all(&second_dir).unwrap();
    let second = copy_fixture("relion_autopick.star", &second_dir);
    let out_dir = temp.path().join("out");

    let mut options = ConvertOptions::new(Format::Star, Format::Star);
    options.single_out = true;
    options.suffix = "_merged".to_string();
    let report = process_conversion(&[first, second], &out_dir, &options).unwrap();

    assert_eq!(report.outputs.len(), 1);
    assert_eq!(report.outputs[0].path, out_dir.join("all_merged.star"));
    assert_eq!(report.outputs[0].rows, 6);
    let lines = read_lines(&out_dir.join("all_merged.star"));
    assert_eq!(lines.iter().filter(|l| l.ends_with("mic002.mrc")).count(), 2);
}

#[test]
fn single_out_without_names_warns() {
    let temp = tempfile::tempdir().unwrap();
    let input = copy_fixture("eman.box", temp.path());
    let out_dir = temp.path().join("out");

    let mut options = ConvertOptions::new(Format::Box, Format::Tsv);
    options.single_out = true;
    let report = process_conversion(&[input], &out_dir, &options).unwrap();

    assert!(report.has_issue(ConversionIssueCode::MergedWithoutNames));
    assert_eq!(report.warning_count(), 1);
    assert!(out_dir.join("all.tsv").is_file());
}

#[test]
fn duplicate_inputs_are_read_once() {
    let temp = tempfile::tempdir().unwrap();
    let input = copy_fixture("eman.box", temp.path());
    let out_dir = temp.path().join("out");

    let options = ConvertOptions::new(Format::Box, Format::Star);
    let report = process_conversion(&[input.clone(), input], &out_dir, &options).unwrap();

    assert_eq!(report.inputs, 1);
    assert_eq!(report.outputs.len(), 1);
    assert!(report.has_issue(ConversionIssueCode::DuplicateInput));
}

#[test]
fn empty_delimited_input_writes_header_only_star() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("empty.box");
    fs::write(&input, "").unwrap();
    let out_dir = temp.path().join("out");

    let options = ConvertOptions::new(Format::Box, Format::Star);
    let report = process_conversion(&[input], &out_dir, &options).unwrap();

    assert!(report.has_issue(ConversionIssueCode::EmptyInput));
    assert_eq!(report.rows_written(), 0);
    assert!(out_dir.join("empty.star").is_file());
}

#[test]
fn validation_runs_before_reading() {
    let temp = tempfile::tempdir().unwrap();
    let out_dir = temp.path().join("out");

    let options = ConvertOptions::new(Format::Tsv, Format::Box);
    let err = process_conversion(&[PathBuf::from("missing.tsv")], &out_dir, &options).unwrap_err();
    assert!(matches!(err, CoordconvError::Configuration(_)));
    assert!(!out_dir.exists());
}

#[test]
fn report_serializes_with_snake_case_codes() {
    let temp = tempfile::tempdir().unwrap();
    let input = copy_fixture("eman.box", temp.path());
    let out_dir = temp.path().join("out");

    let mut options = ConvertOptions::new(Format::Box, Format::Star);
    options.multi_out = true;
    let report = process_conversion(&[input], &out_dir, &options).unwrap();

    assert_eq!(report.issues[0].severity, ConversionSeverity::Warning);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["from"], "box");
    assert_eq!(json["issues"][0]["code"], "multi_output_fallback");
    assert_eq!(json["issues"][0]["severity"], "warning");
    assert_eq!(json["outputs"][0]["rows"], 2);
}
