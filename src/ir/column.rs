//! Typed, labelled columns.

use std::fmt;

use super::field::Field;
use super::token::{format_float, parse_number};

/// The identifier of a column inside a [`Table`](super::Table).
///
/// Positional formats without a header produce `Position` labels; STAR
/// headers and explicit header rows produce `Name` labels. Only column
/// resolution (or a reader that decodes fields itself) produces `Field`
/// labels, so a source column whose header happens to read `conf` is
/// never taken for the confidence field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    Position(usize),
    Name(String),
    Field(Field),
}

impl Label {
    /// Label for a resolved semantic field.
    pub fn field(field: Field) -> Self {
        Label::Field(field)
    }

    /// Returns true if this label is the resolved given field.
    #[inline]
    pub fn is_field(&self, field: Field) -> bool {
        matches!(self, Label::Field(f) if *f == field)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Position(index) => write!(f, "{}", index),
            Label::Name(name) => f.write_str(name),
            Label::Field(field) => f.write_str(field.as_str()),
        }
    }
}

/// Column values with their declared storage type.
///
/// Missing values are `NaN` in `Float` columns and the empty string in
/// `Text` columns; `Int` columns have no gaps.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnData {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Text(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An empty column of the same storage type.
    pub fn empty_like(&self) -> Self {
        match self {
            ColumnData::Int(_) => ColumnData::Int(Vec::new()),
            ColumnData::Float(_) => ColumnData::Float(Vec::new()),
            ColumnData::Text(_) => ColumnData::Text(Vec::new()),
        }
    }

    /// Renders the value at `row` for output.
    pub fn render(&self, row: usize) -> String {
        match self {
            ColumnData::Int(v) => v[row].to_string(),
            ColumnData::Float(v) => format_float(v[row]),
            ColumnData::Text(v) => v[row].clone(),
        }
    }

    /// Returns true if the value at `row` is missing.
    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            ColumnData::Int(_) => false,
            ColumnData::Float(v) => v[row].is_nan(),
            ColumnData::Text(v) => v[row].is_empty(),
        }
    }

    /// Converts the column to floats.
    ///
    /// Text cells must parse as numbers (missing tokens become `NaN`); the
    /// first offending token is returned as the error.
    pub fn to_floats(&self) -> Result<Vec<f64>, String> {
        match self {
            ColumnData::Int(v) => Ok(v.iter().map(|&i| i as f64).collect()),
            ColumnData::Float(v) => Ok(v.clone()),
            ColumnData::Text(v) => v
                .iter()
                .map(|token| {
                    if token.is_empty() {
                        Ok(f64::NAN)
                    } else {
                        parse_number(token).ok_or_else(|| token.clone())
                    }
                })
                .collect(),
        }
    }

    /// Keeps only the rows whose index is listed, in the given order.
    pub fn take(&self, rows: &[usize]) -> Self {
        match self {
            ColumnData::Int(v) => ColumnData::Int(rows.iter().map(|&r| v[r]).collect()),
            ColumnData::Float(v) => ColumnData::Float(rows.iter().map(|&r| v[r]).collect()),
            ColumnData::Text(v) => ColumnData::Text(rows.iter().map(|&r| v[r].clone()).collect()),
        }
    }

    /// A column of `len` missing values of the same storage type.
    ///
    /// Integer columns cannot hold gaps and widen to float.
    pub(crate) fn missing_like(&self, len: usize) -> Self {
        match self {
            ColumnData::Int(_) | ColumnData::Float(_) => ColumnData::Float(vec![f64::NAN; len]),
            ColumnData::Text(_) => ColumnData::Text(vec![String::new(); len]),
        }
    }

    /// Appends `other` to `self`, widening the storage type when the two differ.
    pub(crate) fn append(self, other: ColumnData) -> ColumnData {
        match (self, other) {
            (ColumnData::Int(mut a), ColumnData::Int(b)) => {
                a.extend(b);
                ColumnData::Int(a)
            }
            (ColumnData::Text(mut a), other) => {
                a.extend((0..other.len()).map(|r| other.render(r)));
                ColumnData::Text(a)
            }
            (this, ColumnData::Text(b)) => {
                let mut a: Vec<String> = (0..this.len()).map(|r| this.render(r)).collect();
                a.extend(b);
                ColumnData::Text(a)
            }
            (this, other) => {
                // Only Int/Float mixes remain, neither side can fail to convert.
                let mut a = this.to_floats().unwrap_or_default();
                a.extend(other.to_floats().unwrap_or_default());
                ColumnData::Float(a)
            }
        }
    }
}

/// A labelled column.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub label: Label,
    pub data: ColumnData,
}

impl Column {
    pub fn new(label: Label, data: ColumnData) -> Self {
        Self { label, data }
    }
}
