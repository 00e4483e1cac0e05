//! Column mapping resolution.
//!
//! Each input format has a [`FormatDescriptor`] naming the default source
//! column of every field. User overrides ([`ColumnSpec`]) are merged with
//! those defaults once per run into a [`ColumnMapping`], which is then
//! applied to every input table independently.
//!
//! References that do not exist in a given table (an index past its last
//! column, or a name it does not carry) are skipped for that table only.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::ir::io_star::{STAR_COL_CONF, STAR_COL_NAME, STAR_COL_X, STAR_COL_Y};
use crate::ir::{Field, Label, Table};

/// A user-supplied source for one field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ColumnSpec {
    /// Use the input format's default.
    #[default]
    Auto,
    /// Leave the field out of the conversion.
    Excluded,
    ByName(String),
    ByIndex(usize),
}

impl ColumnSpec {
    /// Parses the CLI spelling: `auto`, `none`, a zero-based index, or a column name.
    pub fn parse(value: &str) -> Self {
        match value {
            "auto" => ColumnSpec::Auto,
            "none" => ColumnSpec::Excluded,
            other => match other.parse::<usize>() {
                Ok(index) => ColumnSpec::ByIndex(index),
                Err(_) => ColumnSpec::ByName(other.to_string()),
            },
        }
    }
}

/// A concrete source column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Name(String),
    Index(usize),
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Name(name) => write!(f, "'{}'", name),
            ColumnRef::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Default source column of a field in some input format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefaultColumn {
    Name(&'static str),
    Index(usize),
}

impl From<DefaultColumn> for ColumnRef {
    fn from(column: DefaultColumn) -> Self {
        match column {
            DefaultColumn::Name(name) => ColumnRef::Name(name.to_string()),
            DefaultColumn::Index(index) => ColumnRef::Index(index),
        }
    }
}

/// Default field-to-column layout of an input format.
///
/// Entries are in canonical field order (`x, y, w, h, conf, name`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatDescriptor {
    defaults: [Option<DefaultColumn>; 6],
}

impl FormatDescriptor {
    pub const STAR: Self = Self {
        defaults: [
            Some(DefaultColumn::Name(STAR_COL_X)),
            Some(DefaultColumn::Name(STAR_COL_Y)),
            None,
            None,
            Some(DefaultColumn::Name(STAR_COL_CONF)),
            Some(DefaultColumn::Name(STAR_COL_NAME)),
        ],
    };

    pub const BOX: Self = Self::positional([Some(0), Some(1), Some(2), Some(3), Some(4), None]);

    pub const CBOX: Self = Self::positional([Some(0), Some(1), Some(3), Some(4), Some(8), None]);

    pub const TSV: Self = Self::positional([Some(0), Some(1), None, None, Some(2), None]);

    /// Record field positions of cryoSPARC files. The reader already labels
    /// its output columns, so these indices rarely land on a column.
    pub const CS: Self = Self::positional([Some(10), Some(11), Some(3), Some(3), None, Some(8)]);

    const fn positional(indices: [Option<usize>; 6]) -> Self {
        let mut defaults = [None; 6];
        let mut i = 0;
        while i < 6 {
            if let Some(index) = indices[i] {
                defaults[i] = Some(DefaultColumn::Index(index));
            }
            i += 1;
        }
        Self { defaults }
    }

    pub fn default_for(&self, field: Field) -> Option<DefaultColumn> {
        self.defaults[field as usize]
    }

    /// Whether the format carries box dimensions by default.
    pub fn has_box_size(&self) -> bool {
        self.default_for(Field::W).is_some() && self.default_for(Field::H).is_some()
    }
}

/// The resolved source column of every field, `None` for excluded fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    pub x: Option<ColumnRef>,
    pub y: Option<ColumnRef>,
    pub w: Option<ColumnRef>,
    pub h: Option<ColumnRef>,
    pub conf: Option<ColumnRef>,
    pub name: Option<ColumnRef>,
}

impl ColumnMapping {
    pub fn get(&self, field: Field) -> Option<&ColumnRef> {
        match field {
            Field::X => self.x.as_ref(),
            Field::Y => self.y.as_ref(),
            Field::W => self.w.as_ref(),
            Field::H => self.h.as_ref(),
            Field::Conf => self.conf.as_ref(),
            Field::Name => self.name.as_ref(),
        }
    }

    fn slot(&mut self, field: Field) -> &mut Option<ColumnRef> {
        match field {
            Field::X => &mut self.x,
            Field::Y => &mut self.y,
            Field::W => &mut self.w,
            Field::H => &mut self.h,
            Field::Conf => &mut self.conf,
            Field::Name => &mut self.name,
        }
    }

    /// Mapped fields with their source, in canonical order.
    pub fn entries(&self) -> impl Iterator<Item = (Field, &ColumnRef)> {
        Field::ALL
            .into_iter()
            .filter_map(|field| self.get(field).map(|column| (field, column)))
    }
}

impl fmt::Display for ColumnMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, field) in Field::ALL.into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match self.get(field) {
                Some(column) => write!(f, "'{}': {}", field, column)?,
                None => write!(f, "'{}': None", field)?,
            }
        }
        f.write_str("}")
    }
}

/// Merges user overrides (in canonical field order) with format defaults.
pub fn resolve_mapping(specs: &[ColumnSpec; 6], descriptor: &FormatDescriptor) -> ColumnMapping {
    let mut mapping = ColumnMapping {
        x: None,
        y: None,
        w: None,
        h: None,
        conf: None,
        name: None,
    };
    for (field, spec) in Field::ALL.into_iter().zip(specs) {
        *mapping.slot(field) = match spec {
            ColumnSpec::Auto => descriptor.default_for(field).map(ColumnRef::from),
            ColumnSpec::Excluded => None,
            ColumnSpec::ByName(name) => Some(ColumnRef::Name(name.clone())),
            ColumnSpec::ByIndex(index) => Some(ColumnRef::Index(*index)),
        };
    }
    mapping
}

/// Relabels the mapped source columns of a table with their field names.
///
/// Returns the table together with the mapped fields that found no column
/// and are not otherwise present in it.
pub fn apply_mapping(mut table: Table, mapping: &ColumnMapping) -> (Table, Vec<Field>) {
    let mut new_labels: HashMap<usize, Label> = HashMap::new();
    let mut unmatched = Vec::new();

    for (field, column) in mapping.entries() {
        let position = match column {
            ColumnRef::Index(index) => Some(*index).filter(|&i| i < table.num_columns()),
            ColumnRef::Name(name) => table.position(&Label::Name(name.clone())),
        };
        match position {
            Some(position) => {
                // Later fields win when two target the same column.
                new_labels.insert(position, Label::field(field));
            }
            None => unmatched.push(field),
        }
    }

    table.relabel(&new_labels);
    unmatched.retain(|&field| !table.has_field(field));
    (table, unmatched)
}
