//! Positional delimited formats: BOX, CBOX and generic TSV.
//!
//! These formats carry one particle per line as whitespace separated
//! values and have no self-describing header, so columns are identified by
//! position and the column resolver assigns meaning to them:
//!
//! - **BOX** (EMAN): `x y w h [conf]`, lower-left corner origin.
//! - **CBOX** (crYOLO): a STAR-like preamble followed by rows where the
//!   width, height and confidence live in columns 3, 4 and 8.
//! - **TSV**: `x y [conf]`, center origin.
//!
//! # Reader policy
//!
//! With [`HeaderMode::Auto`] every leading line up to the first one that
//! does not start with `_` and contains a digit is skipped. With
//! [`HeaderMode::Row`] nothing is skipped automatically and the given
//! non-blank line names the columns. In both modes rows without a single
//! numeric cell (comment or footer lines) are discarded after parsing.
//!
//! # Writer policy
//!
//! Rows are written tab separated in a caller supplied field order; only
//! fields present in the table are written.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::column::{Column, ColumnData, Label};
use super::field::Field;
use super::table::Table;
use super::token::{has_digit, infer_column, parse_number, row_is_all_non_numeric};
use super::Overwrite;
use crate::error::CoordconvError;

const FORMAT: &str = "delimited";

/// How the first lines of a delimited file are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HeaderMode {
    /// Skip leading non-numeric lines; columns are labelled by position.
    #[default]
    Auto,
    /// The n-th non-blank line (zero based) is a header row naming the columns.
    Row(usize),
}

/// Reads a delimited particle file.
pub fn read_delimited(path: &Path, header: HeaderMode) -> Result<Table, CoordconvError> {
    let content = std::fs::read_to_string(path)?;
    parse_delimited(&content, header, path)
}

/// Reads delimited particle rows from a string.
///
/// Useful for testing without file I/O.
pub fn from_delimited_str(content: &str, header: HeaderMode) -> Result<Table, CoordconvError> {
    parse_delimited(content, header, Path::new("<string>"))
}

/// Coerces every column of a table to numeric storage.
///
/// Used for CBOX input, where every column is declared numeric; the first
/// token that does not parse fails with [`CoordconvError::NumericParse`].
pub fn coerce_numeric(table: Table, path: &Path) -> Result<Table, CoordconvError> {
    let mut columns = Vec::with_capacity(table.num_columns());
    for column in table.columns() {
        let data = match &column.data {
            ColumnData::Text(values) => {
                let mut floats = Vec::with_capacity(values.len());
                for (row, token) in values.iter().enumerate() {
                    let value = if token.is_empty() {
                        f64::NAN
                    } else {
                        parse_number(token).ok_or_else(|| {
                            CoordconvError::NumericParse {
                                path: path.to_path_buf(),
                                column: column.label.to_string(),
                                row,
                                token: token.clone(),
                            }
                        })?
                    };
                    floats.push(value);
                }
                ColumnData::Float(floats)
            }
            numeric => numeric.clone(),
        };
        columns.push(Column::new(column.label.clone(), data));
    }
    Ok(Table::from_columns(columns))
}

/// Writes a table as a tab separated file.
///
/// `order` lists the fields to write; fields missing from the table are
/// skipped. With `include_header` the first line carries the field names.
pub fn write_delimited(
    path: &Path,
    table: &Table,
    order: &[Field],
    include_header: bool,
    overwrite: Overwrite,
) -> Result<(), CoordconvError> {
    overwrite.prepare(path)?;
    let file = File::create(path)?;
    let writer = write_rows(BufWriter::new(file), table, order, include_header, path)?;
    writer.into_inner().map_err(|e| e.into_error())?.flush()?;
    Ok(())
}

/// Renders a table as tab separated text.
pub fn to_delimited_string(
    table: &Table,
    order: &[Field],
    include_header: bool,
) -> Result<String, CoordconvError> {
    let dummy_path = Path::new("<string>");
    let bytes = write_rows(Vec::new(), table, order, include_header, dummy_path)?;
    String::from_utf8(bytes).map_err(|e| {
        CoordconvError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

fn write_rows<W: Write>(
    writer: W,
    table: &Table,
    order: &[Field],
    include_header: bool,
    path: &Path,
) -> Result<W, CoordconvError> {
    let (fields, positions): (Vec<Field>, Vec<usize>) = order
        .iter()
        .filter_map(|&field| table.field_position(field).map(|p| (field, p)))
        .unzip();

    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(writer);

    let to_write_error = |source: csv::Error| CoordconvError::DelimitedWrite {
        path: path.to_path_buf(),
        source,
    };

    if !positions.is_empty() {
        if include_header {
            csv_writer
                .write_record(fields.iter().map(Field::as_str))
                .map_err(to_write_error)?;
        }
        for row in 0..table.num_rows() {
            csv_writer
                .write_record(table.render_row(row, &positions))
                .map_err(to_write_error)?;
        }
    }

    csv_writer
        .into_inner()
        .map_err(|e| CoordconvError::Io(e.into_error()))
}

fn malformed(path: &Path, message: String) -> CoordconvError {
    CoordconvError::MalformedInput {
        path: path.to_path_buf(),
        format: FORMAT,
        message,
    }
}

fn parse_delimited(
    content: &str,
    header: HeaderMode,
    path: &Path,
) -> Result<Table, CoordconvError> {
    let lines: Vec<(usize, &str)> = content.lines().enumerate().collect();

    let (names, body): (Option<Vec<String>>, Vec<(usize, &str)>) = match header {
        HeaderMode::Auto => {
            let start = lines
                .iter()
                .position(|(_, line)| !line.starts_with('_') && has_digit(line))
                .unwrap_or(0);
            (None, lines[start..].to_vec())
        }
        HeaderMode::Row(n) => {
            let mut non_blank = lines.into_iter().filter(|(_, line)| !line.trim().is_empty());
            let Some((_, header_line)) = non_blank.nth(n) else {
                return Err(malformed(
                    path,
                    format!("header row {} not found", n),
                ));
            };
            let names = header_line
                .split_whitespace()
                .map(str::to_string)
                .collect();
            (Some(names), non_blank.collect())
        }
    };

    let rows: Vec<(usize, Vec<&str>)> = body
        .into_iter()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| (i + 1, line.split_whitespace().collect()))
        .collect();

    let width = match (&names, rows.first()) {
        (Some(names), _) => names.len(),
        (None, Some((_, first))) => first.len(),
        (None, None) => return Ok(Table::default()),
    };

    for (line_num, tokens) in &rows {
        if tokens.len() > width {
            return Err(malformed(
                path,
                format!(
                    "line {}: expected {} fields, saw {}",
                    line_num,
                    width,
                    tokens.len()
                ),
            ));
        }
    }

    let rows: Vec<Vec<&str>> = rows
        .into_iter()
        .map(|(_, tokens)| tokens)
        .filter(|tokens| !row_is_all_non_numeric(tokens))
        .collect();

    let columns = (0..width)
        .map(|col| {
            let label = match &names {
                Some(names) => Label::Name(names[col].clone()),
                None => Label::Position(col),
            };
            let data = if rows.is_empty() {
                ColumnData::Float(Vec::new())
            } else {
                let tokens: Vec<Option<&str>> = rows.iter().map(|row| row.get(col).copied()).collect();
                infer_column(&tokens)
            };
            Column::new(label, data)
        })
        .collect();

    Ok(Table::from_columns(columns))
}

/// Fuzz-only entrypoint for delimited parsing.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_delimited(input: &str) -> Result<(), CoordconvError> {
    let _ = parse_delimited(input, HeaderMode::Auto, Path::new("<fuzz>"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CBOX: &str = "\
data_global

_cbox_format_version 1.0

data_cryolo

loop_
_CoordinateX #1
_CoordinateY #2
_CoordinateZ #3
_Width #4
_Height #5
_Depth #6
_EstWidth #7
_EstHeight #8
_Confidence #9
_NumBoxes #10
_Angle #11
84.0 1412.0 <NA> 190.0 190.0 <NA> 184.3 191.2 0.83 <NA> <NA>
371.0 615.0 <NA> 190.0 190.0 <NA> 183.9 186.0 0.34 <NA> <NA>
";

    #[test]
    fn auto_mode_skips_preamble() {
        let table = from_delimited_str(CBOX, HeaderMode::Auto).expect("parse failed");
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.num_columns(), 11);
        assert_eq!(table.columns()[8].data, ColumnData::Float(vec![0.83, 0.34]));
        assert_eq!(table.columns()[0].label, Label::Position(0));
    }

    #[test]
    fn footer_rows_are_dropped() {
        let content = "10 10 20 20 0.9\n30 40 20 20 0.5\nend of picks\n";
        let table = from_delimited_str(content, HeaderMode::Auto).expect("parse failed");
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.columns()[0].data, ColumnData::Int(vec![10, 30]));
    }

    #[test]
    fn header_row_names_columns() {
        let content = "x y conf\n1.5 2.5 0.7\n";
        let table = from_delimited_str(content, HeaderMode::Row(0)).expect("parse failed");
        assert_eq!(table.field(Field::Conf), Some(&ColumnData::Float(vec![0.7])));
    }

    #[test]
    fn missing_header_row_is_malformed() {
        let err = from_delimited_str("1 2\n", HeaderMode::Row(3)).unwrap_err();
        assert!(matches!(err, CoordconvError::MalformedInput { .. }));
    }

    #[test]
    fn empty_input_is_an_empty_table() {
        let table = from_delimited_str("", HeaderMode::Auto).expect("parse failed");
        assert!(table.is_empty());
        assert_eq!(table.num_columns(), 0);
    }

    #[test]
    fn overlong_row_is_malformed() {
        let err = from_delimited_str("1 2 3\n1 2 3 4\n", HeaderMode::Auto).unwrap_err();
        assert!(matches!(err, CoordconvError::MalformedInput { .. }));
    }

    #[test]
    fn coerce_numeric_rejects_text() {
        let table = from_delimited_str("1 2 a\n3 4 5\n", HeaderMode::Auto).expect("parse failed");
        let err = coerce_numeric(table, Path::new("picks.cbox")).unwrap_err();
        match err {
            CoordconvError::NumericParse { column, token, .. } => {
                assert_eq!(column, "2");
                assert_eq!(token, "a");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn writer_follows_requested_order() {
        let mut table = Table::default();
        table.set_field(Field::X, ColumnData::Int(vec![10]));
        table.set_field(Field::Y, ColumnData::Int(vec![20]));
        table.set_field(Field::Conf, ColumnData::Float(vec![0.5]));

        let out = to_delimited_string(&table, &[Field::Conf, Field::W, Field::X, Field::Y], true)
            .expect("serialize failed");
        assert_eq!(out, "conf\tx\ty\n0.5\t10\t20\n");

        let out = to_delimited_string(&table, &Field::ALL, false).expect("serialize failed");
        assert_eq!(out, "10\t20\t0.5\n");
    }
}
