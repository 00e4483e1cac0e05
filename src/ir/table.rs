//! The uniform tabular record set every reader produces and every writer consumes.

use std::collections::HashMap;

use super::column::{Column, ColumnData, Label};
use super::field::Field;

/// One detected particle.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub x: f64,
    pub y: f64,
    pub w: Option<f64>,
    pub h: Option<f64>,
    pub conf: Option<f64>,
    pub name: Option<String>,
}

impl Record {
    /// A record with only a position.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            w: None,
            h: None,
            conf: None,
            name: None,
        }
    }
}

/// Missing values standing in for a column absent from one side of a concat.
fn gap_like(data: &ColumnData, len: usize) -> ColumnData {
    if len == 0 {
        data.empty_like()
    } else {
        data.missing_like(len)
    }
}

/// An ordered set of rows sharing a column schema.
///
/// Columns are kept in file order. Before column resolution labels are
/// whatever the reader found; afterwards the semantic fields carry
/// `Label::Field(Field::X)`, `Label::Field(Field::Y)`, and so on.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// Creates a table from equally sized columns.
    pub fn from_columns(columns: Vec<Column>) -> Self {
        let rows = columns.first().map_or(0, |c| c.data.len());
        debug_assert!(columns.iter().all(|c| c.data.len() == rows));
        Self { columns, rows }
    }

    /// Builds a table from records.
    ///
    /// Optional fields become columns only if at least one record sets them.
    pub fn from_records(records: &[Record]) -> Self {
        let mut columns = vec![
            Column::new(
                Label::field(Field::X),
                ColumnData::Float(records.iter().map(|r| r.x).collect()),
            ),
            Column::new(
                Label::field(Field::Y),
                ColumnData::Float(records.iter().map(|r| r.y).collect()),
            ),
        ];

        let optional: [(Field, fn(&Record) -> Option<f64>); 3] = [
            (Field::W, |r| r.w),
            (Field::H, |r| r.h),
            (Field::Conf, |r| r.conf),
        ];
        for (field, get) in optional {
            if records.iter().any(|r| get(r).is_some()) {
                columns.push(Column::new(
                    Label::field(field),
                    ColumnData::Float(records.iter().map(|r| get(r).unwrap_or(f64::NAN)).collect()),
                ));
            }
        }

        if records.iter().any(|r| r.name.is_some()) {
            columns.push(Column::new(
                Label::field(Field::Name),
                ColumnData::Text(
                    records
                        .iter()
                        .map(|r| r.name.clone().unwrap_or_default())
                        .collect(),
                ),
            ));
        }

        Self {
            columns,
            rows: records.len(),
        }
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the table has no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.columns.iter().map(|c| &c.label)
    }

    /// Comma separated labels, for error messages.
    pub fn describe_labels(&self) -> String {
        self.labels()
            .map(|l| format!("'{}'", l))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn position(&self, label: &Label) -> Option<usize> {
        self.columns.iter().position(|c| &c.label == label)
    }

    pub fn field_position(&self, field: Field) -> Option<usize> {
        self.columns.iter().position(|c| c.label.is_field(field))
    }

    pub fn field(&self, field: Field) -> Option<&ColumnData> {
        self.field_position(field).map(|i| &self.columns[i].data)
    }

    #[inline]
    pub fn has_field(&self, field: Field) -> bool {
        self.field_position(field).is_some()
    }

    /// Sets a field column, replacing it in place or appending it.
    ///
    /// A table without columns adopts the row count of `data`.
    pub fn set_field(&mut self, field: Field, data: ColumnData) {
        if self.columns.is_empty() {
            self.rows = data.len();
        }
        debug_assert_eq!(data.len(), self.rows);
        match self.field_position(field) {
            Some(i) => self.columns[i].data = data,
            None => self.columns.push(Column::new(Label::field(field), data)),
        }
    }

    pub fn remove_field(&mut self, field: Field) -> Option<ColumnData> {
        let i = self.field_position(field)?;
        Some(self.columns.remove(i).data)
    }

    /// Assigns new labels to columns by position, all at once.
    pub fn relabel(&mut self, new_labels: &HashMap<usize, Label>) {
        for (index, column) in self.columns.iter_mut().enumerate() {
            if let Some(label) = new_labels.get(&index) {
                column.label = label.clone();
            }
        }
    }

    /// Keeps the listed fields that are present, in the listed order.
    pub fn select_fields(mut self, fields: &[Field]) -> Table {
        let mut selected = Vec::with_capacity(fields.len());
        for field in fields {
            if let Some(i) = self.field_position(*field) {
                selected.push(self.columns.remove(i));
            }
        }
        Table {
            columns: selected,
            rows: self.rows,
        }
    }

    /// Keeps only the listed rows, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.label.clone(), c.data.take(rows)))
                .collect(),
            rows: rows.len(),
        }
    }

    /// Concatenates tables row-wise.
    ///
    /// The column set is the union of all inputs in order of first
    /// appearance; a table lacking a column contributes missing values.
    pub fn concat(tables: impl IntoIterator<Item = Table>) -> Table {
        let mut merged = Table::default();
        for table in tables {
            merged = merged.append(table);
        }
        merged
    }

    fn append(self, other: Table) -> Table {
        let total = self.rows + other.rows;
        let Table {
            columns: mut left,
            rows: left_rows,
        } = self;
        let Table {
            columns: right,
            rows: right_rows,
        } = other;

        let mut right: Vec<Option<Column>> = right.into_iter().map(Some).collect();
        let mut columns = Vec::with_capacity(left.len() + right.len());

        for column in left.drain(..) {
            let matched = right
                .iter_mut()
                .find(|c| c.as_ref().is_some_and(|c| c.label == column.label))
                .and_then(Option::take);
            let tail = match matched {
                Some(c) => c.data,
                None => gap_like(&column.data, right_rows),
            };
            columns.push(Column::new(column.label, column.data.append(tail)));
        }

        for column in right.into_iter().flatten() {
            let head = gap_like(&column.data, left_rows);
            columns.push(Column::new(column.label, head.append(column.data)));
        }

        Table {
            columns,
            rows: total,
        }
    }

    /// Renders one row, restricted to the given column positions.
    pub fn render_row(&self, row: usize, positions: &[usize]) -> Vec<String> {
        positions
            .iter()
            .map(|&i| self.columns[i].data.render(row))
            .collect()
    }

    /// Materializes the resolved fields as records.
    ///
    /// Fails with the offending field if `x`/`y` are absent or a numeric
    /// field holds text.
    pub fn records(&self) -> Result<Vec<Record>, String> {
        let numeric = |field: Field| -> Result<Option<Vec<f64>>, String> {
            self.field(field)
                .map(|data| data.to_floats())
                .transpose()
                .map_err(|token| format!("field '{}' holds non-numeric value '{}'", field, token))
        };

        let xs = numeric(Field::X)?.ok_or("field 'x' is absent")?;
        let ys = numeric(Field::Y)?.ok_or("field 'y' is absent")?;
        let ws = numeric(Field::W)?;
        let hs = numeric(Field::H)?;
        let confs = numeric(Field::Conf)?;
        let names = self.field(Field::Name);

        let opt = |values: &Option<Vec<f64>>, row: usize| {
            values
                .as_ref()
                .map(|v| v[row])
                .filter(|v| !v.is_nan())
        };

        Ok((0..self.rows)
            .map(|row| Record {
                x: xs[row],
                y: ys[row],
                w: opt(&ws, row),
                h: opt(&hs, row),
                conf: opt(&confs, row),
                name: names
                    .filter(|data| !data.is_missing(row))
                    .map(|data| data.render(row)),
            })
            .collect())
    }
}
