//! Coordinate transformation between output conventions.
//!
//! Operates on tables whose columns have already been resolved to fields.
//! The stages run in a fixed order: origin shift, rounding, confidence
//! normalization, confidence backfill, output column selection.

use std::path::Path;

use tracing::debug;

use super::Format;
use crate::error::CoordconvError;
use crate::ir::{ColumnData, Field, Table};

/// Origin conversion implied by an input/output format pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShiftRule {
    /// Center-origin input written as corner-origin boxes.
    CenterToCorner,
    /// Corner-origin boxes written as center-origin coordinates.
    CornerToCenter,
    /// Coordinates pass through unchanged.
    Unchanged,
}

impl ShiftRule {
    pub fn between(from: Format, to: Format) -> Self {
        match (from, to) {
            (Format::Star | Format::Tsv | Format::Cs, Format::Box) => ShiftRule::CenterToCorner,
            (Format::Box, Format::Star | Format::Tsv) => ShiftRule::CornerToCenter,
            _ => ShiftRule::Unchanged,
        }
    }
}

/// Target range for confidence normalization.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfidenceRange {
    pub min: f64,
    pub max: f64,
}

/// When confidence values are rescaled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NormalizePolicy {
    /// Always rescale onto the target range.
    #[default]
    Always,
    /// Rescale only if the observed values are not already inside the range.
    OutOfRangeOnly,
}

/// Per-run transformation settings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransformOptions {
    /// Box size forced onto center-to-corner conversions.
    pub box_size: Option<u32>,
    /// Decimal places for `x`, `y`, `w` and `h`; negative values round to tens, hundreds, ...
    pub round_to: Option<i32>,
    pub normalize_conf: Option<ConfidenceRange>,
    pub normalize_policy: NormalizePolicy,
    /// Confidence filled in when the input carries none.
    pub require_conf: Option<f64>,
}

/// What [`transform`] did to the confidence column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfidenceChanges {
    pub normalized: bool,
    pub backfilled: bool,
}

/// Applies every transformation stage to one table.
pub fn transform(
    mut table: Table,
    from: Format,
    to: Format,
    options: &TransformOptions,
    path: &Path,
) -> Result<(Table, ConfidenceChanges), CoordconvError> {
    let mut changes = ConfidenceChanges::default();
    shift(&mut table, ShiftRule::between(from, to), options.box_size, path)?;
    if let Some(digits) = options.round_to {
        round(&mut table, digits, path)?;
    }
    if let Some(range) = options.normalize_conf {
        changes.normalized =
            normalize_confidence(&mut table, range, options.normalize_policy, path)?;
    }
    if let Some(value) = options.require_conf {
        changes.backfilled = backfill_confidence(&mut table, value);
    }
    Ok((select_output(table, to), changes))
}

/// Reads a field as floats, failing if it is absent or not numeric.
fn numeric(table: &Table, field: Field, path: &Path) -> Result<Vec<f64>, CoordconvError> {
    let data = table
        .field(field)
        .ok_or_else(|| CoordconvError::MissingColumn {
            path: path.to_path_buf(),
            column: field.to_string(),
            available: table.describe_labels(),
        })?;
    data.to_floats().map_err(|token| CoordconvError::TypeMismatch {
        path: path.to_path_buf(),
        column: field.to_string(),
        message: format!("could not convert '{}' to a number", token),
    })
}

/// Moves `x`/`y` between corner and center origin.
///
/// Tables without rows are left untouched.
pub fn shift(
    table: &mut Table,
    rule: ShiftRule,
    box_size: Option<u32>,
    path: &Path,
) -> Result<(), CoordconvError> {
    if rule == ShiftRule::Unchanged || table.is_empty() {
        return Ok(());
    }

    let direction = match rule {
        ShiftRule::CenterToCorner => {
            let rows = table.num_rows();
            match box_size {
                Some(size) => {
                    table.set_field(Field::W, ColumnData::Int(vec![i64::from(size); rows]));
                    table.set_field(Field::H, ColumnData::Int(vec![i64::from(size); rows]));
                }
                None if !table.has_field(Field::W) && !table.has_field(Field::H) => {
                    return Err(CoordconvError::Configuration(format!(
                        "box size required to convert {} to corner coordinates",
                        path.display()
                    )));
                }
                None => {}
            }
            -1.0
        }
        _ => 1.0,
    };

    let w = numeric(table, Field::W, path)?;
    let h = numeric(table, Field::H, path)?;
    let x = numeric(table, Field::X, path)?;
    let y = numeric(table, Field::Y, path)?;

    let x = x.iter().zip(&w).map(|(x, w)| x + direction * w / 2.0).collect();
    let y = y.iter().zip(&h).map(|(y, h)| y + direction * h / 2.0).collect();

    table.set_field(Field::X, ColumnData::Float(x));
    table.set_field(Field::Y, ColumnData::Float(y));
    table.set_field(Field::W, ColumnData::Float(w));
    table.set_field(Field::H, ColumnData::Float(h));
    Ok(())
}

/// Rounds half to even at the given number of decimal places.
pub fn round_half_even(value: f64, digits: i32) -> f64 {
    if digits >= 0 {
        let factor = 10f64.powi(digits);
        let scaled = value * factor;
        if scaled.is_finite() {
            scaled.round_ties_even() / factor
        } else {
            value
        }
    } else {
        let factor = 10f64.powi(digits.saturating_neg());
        if !factor.is_finite() {
            return 0.0_f64.copysign(value);
        }
        (value / factor).round_ties_even() * factor
    }
}

/// Rounds each geometric field that is present.
///
/// Precision `0` stores the result as integers.
pub fn round(table: &mut Table, digits: i32, path: &Path) -> Result<(), CoordconvError> {
    for field in Field::GEOMETRY {
        let Some(data) = table.field(field) else {
            continue;
        };
        let rounded = match data {
            ColumnData::Int(values) if digits >= 0 => ColumnData::Int(values.clone()),
            ColumnData::Int(values) => ColumnData::Int(
                values
                    .iter()
                    .map(|&v| round_half_even(v as f64, digits) as i64)
                    .collect(),
            ),
            ColumnData::Float(values) => {
                let values: Vec<f64> = values.iter().map(|&v| round_half_even(v, digits)).collect();
                if digits == 0 {
                    ColumnData::Int(to_integers(&values, field, path)?)
                } else {
                    ColumnData::Float(values)
                }
            }
            ColumnData::Text(_) => {
                return Err(CoordconvError::TypeMismatch {
                    path: path.to_path_buf(),
                    column: field.to_string(),
                    message: "cannot round text values".to_string(),
                })
            }
        };
        table.set_field(field, rounded);
    }
    Ok(())
}

fn to_integers(values: &[f64], field: Field, path: &Path) -> Result<Vec<i64>, CoordconvError> {
    values
        .iter()
        .map(|&v| {
            if v.is_finite() {
                Ok(v as i64)
            } else {
                Err(CoordconvError::InvalidValue {
                    path: path.to_path_buf(),
                    column: field.to_string(),
                    message: format!("cannot convert non-finite value {} to integer", v),
                })
            }
        })
        .collect()
}

/// Rescales `conf` onto `range`.
///
/// Returns true if the column was rewritten. Missing values are ignored when
/// computing the observed range and stay missing, unless every observed
/// value is equal, in which case the whole column becomes `range.min`.
pub fn normalize_confidence(
    table: &mut Table,
    range: ConfidenceRange,
    policy: NormalizePolicy,
    path: &Path,
) -> Result<bool, CoordconvError> {
    if !table.has_field(Field::Conf) {
        return Ok(false);
    }
    let values = numeric(table, Field::Conf, path)?;
    let observed = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<(f64, f64)>, &v| match acc {
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            None => Some((v, v)),
        });
    let Some((old_min, old_max)) = observed else {
        return Ok(false);
    };

    if policy == NormalizePolicy::OutOfRangeOnly && !(old_min <= range.min || old_max > range.max) {
        debug!(
            "confidence range [{}, {}] already inside [{}, {}]",
            old_min, old_max, range.min, range.max
        );
        return Ok(false);
    }

    let old_range = old_max - old_min;
    let new_range = range.max - range.min;
    let normalized = if old_range == 0.0 {
        vec![range.min; values.len()]
    } else {
        values
            .iter()
            .map(|v| (v - old_min) * new_range / old_range + range.min)
            .collect()
    };
    table.set_field(Field::Conf, ColumnData::Float(normalized));
    Ok(true)
}

/// Adds a constant `conf` column if the table has none.
pub fn backfill_confidence(table: &mut Table, value: f64) -> bool {
    if table.has_field(Field::Conf) {
        return false;
    }
    let rows = table.num_rows();
    table.set_field(Field::Conf, ColumnData::Float(vec![value; rows]));
    true
}

/// Fields written by each output format, in output order.
pub fn output_fields(to: Format) -> &'static [Field] {
    match to {
        Format::Box => &Field::ALL,
        _ => &[Field::X, Field::Y, Field::Conf, Field::Name],
    }
}

/// Keeps the fields the output format writes, dropping unmapped raw columns.
pub fn select_output(table: Table, to: Format) -> Table {
    table.select_fields(output_fields(to))
}
