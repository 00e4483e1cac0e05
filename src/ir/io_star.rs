//! STAR format reader and writer.
//!
//! STAR is the metadata-tagged columnar format used by RELION. A file is a
//! sequence of `data_<name>` blocks; a particle block declares its columns
//! with one `_rlnSomeLabel #<index>` directive per column (one based) and
//! is followed by whitespace separated data rows.
//!
//! ```text
//! data_
//!
//! loop_
//! _rlnCoordinateX #1
//! _rlnCoordinateY #2
//! _rlnAutopickFigureOfMerit #3
//! 120.0	80.5	0.93
//! ```
//!
//! # Reader policy
//!
//! - Blocks whose name contains `data_optics` are skipped entirely.
//! - The first line after at least one directive that contains a digit
//!   starts the data section.
//! - Columns are labelled with their directive names; the column resolver
//!   maps `_rlnCoordinateX` and friends onto particle fields.
//!
//! # Writer policy
//!
//! The writer emits a single anonymous `data_` block. Directives are
//! written only for fields present in the table, in canonical field order,
//! numbered from 1; rows are tab separated with no header row.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::column::{Column, ColumnData, Label};
use super::field::Field;
use super::table::Table;
use super::token::{has_digit, infer_column};
use super::Overwrite;
use crate::error::CoordconvError;

pub const STAR_COL_X: &str = "_rlnCoordinateX";
pub const STAR_COL_Y: &str = "_rlnCoordinateY";
pub const STAR_COL_CONF: &str = "_rlnAutopickFigureOfMerit";
pub const STAR_COL_NAME: &str = "_rlnMicrographName";

const SKIPPED_BLOCKS: [&str; 1] = ["data_optics"];
const FORMAT: &str = "star";

/// STAR label written for each field, `None` for fields STAR output never carries.
pub fn star_label(field: Field) -> Option<&'static str> {
    match field {
        Field::X => Some(STAR_COL_X),
        Field::Y => Some(STAR_COL_Y),
        Field::Conf => Some(STAR_COL_CONF),
        Field::Name => Some(STAR_COL_NAME),
        Field::W | Field::H => None,
    }
}

/// Reads a STAR file into a table labelled by its header directives.
pub fn read_star(path: &Path) -> Result<Table, CoordconvError> {
    let content = fs::read_to_string(path)?;
    parse_star(&content, path)
}

/// Reads a STAR document from a string.
///
/// Useful for testing without file I/O.
pub fn from_star_str(content: &str) -> Result<Table, CoordconvError> {
    parse_star(content, Path::new("<string>"))
}

/// Writes a table as a STAR file.
pub fn write_star(path: &Path, table: &Table, overwrite: Overwrite) -> Result<(), CoordconvError> {
    overwrite.prepare(path)?;
    fs::write(path, to_star_string(table))?;
    Ok(())
}

/// Renders a table as a STAR document.
pub fn to_star_string(table: &Table) -> String {
    let mut out = String::from("data_\n\nloop_\n");

    let mut positions = Vec::new();
    for field in Field::ALL {
        let (Some(label), Some(position)) = (star_label(field), table.field_position(field))
        else {
            continue;
        };
        positions.push(position);
        out.push_str(&format!("{} #{}\n", label, positions.len()));
    }

    if positions.is_empty() {
        return out;
    }
    for row in 0..table.num_rows() {
        out.push_str(&table.render_row(row, &positions).join("\t"));
        out.push('\n');
    }

    out
}

fn malformed(path: &Path, message: impl Into<String>) -> CoordconvError {
    CoordconvError::MalformedInput {
        path: path.to_path_buf(),
        format: FORMAT,
        message: message.into(),
    }
}

/// Locates the header directives and the first data line.
///
/// Returns the directive map (zero-based column -> label) and the index of
/// the line where data rows begin.
fn scan_header(content: &str, path: &Path) -> Result<(BTreeMap<usize, String>, usize), CoordconvError> {
    let mut header: BTreeMap<usize, String> = BTreeMap::new();
    let mut data_start = 0;
    let mut skip_block = false;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("data_") {
            skip_block = SKIPPED_BLOCKS.iter().any(|name| trimmed.contains(name));
            continue;
        }
        if skip_block {
            continue;
        }
        if line.starts_with('_') && trimmed.matches('#').count() == 1 {
            let (label, index) = trimmed.split_once('#').unwrap_or((trimmed, ""));
            let index: usize = index
                .trim()
                .parse()
                .ok()
                .filter(|&n| n >= 1)
                .ok_or_else(|| {
                    malformed(
                        path,
                        format!("line {}: invalid column index in directive '{}'", i + 1, trimmed),
                    )
                })?;
            header.insert(index - 1, label.trim().to_string());
            data_start = i + 1;
        } else if !header.is_empty() && has_digit(line) {
            data_start = i;
            break;
        }
    }

    Ok((header, data_start))
}

fn parse_star(content: &str, path: &Path) -> Result<Table, CoordconvError> {
    let (header, data_start) = scan_header(content, path)?;

    let rows: Vec<(usize, Vec<&str>)> = content
        .lines()
        .enumerate()
        .skip(data_start)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| (i + 1, line.split_whitespace().collect()))
        .collect();

    if rows.is_empty() {
        // Header only: keep the declared columns with no rows.
        let columns = header
            .values()
            .map(|label| Column::new(Label::Name(label.clone()), ColumnData::Float(Vec::new())))
            .collect();
        return Ok(Table::from_columns(columns));
    }

    let width = rows[0].1.len();
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
    if let Some((&index, label)) = header.last_key_value().filter(|(i, _)| **i >= width) {
        return Err(malformed(
            path,
            format!(
                "directive '{} #{}' refers past the {} data column(s)",
                label,
                index + 1,
                width
            ),
        ));
    }

    let columns = (0..width)
        .map(|col| {
            let tokens: Vec<Option<&str>> =
                rows.iter().map(|(_, row)| row.get(col).copied()).collect();
            let label = match header.get(&col) {
                Some(name) => Label::Name(name.clone()),
                None => Label::Position(col),
            };
            Column::new(label, infer_column(&tokens))
        })
        .collect();

    Ok(Table::from_columns(columns))
}

/// Fuzz-only entrypoint for STAR parsing.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_star(input: &str) -> Result<(), CoordconvError> {
    let _ = parse_star(input, Path::new("<fuzz>"))?;
    Ok(())
}
