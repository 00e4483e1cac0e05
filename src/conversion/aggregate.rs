//! Output fan-in and fan-out, and output path resolution.
//!
//! Tables are keyed by a path-like identifier: the input path for
//! per-file output, [`MERGED_KEY`] for single-file output, or the
//! micrograph name for per-micrograph output. The key's stem becomes the
//! output file stem.

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::ir::{Field, Table};

/// Key of the merged table in single-file output.
pub const MERGED_KEY: &str = "all";

/// A table waiting to be written, keyed by its output identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyedTable {
    pub key: PathBuf,
    pub table: Table,
}

impl KeyedTable {
    pub fn new(key: impl Into<PathBuf>, table: Table) -> Self {
        Self {
            key: key.into(),
            table,
        }
    }
}

/// Concatenates all tables, in order, under [`MERGED_KEY`].
pub fn merge_single(tables: Vec<KeyedTable>) -> KeyedTable {
    KeyedTable::new(
        MERGED_KEY,
        Table::concat(tables.into_iter().map(|keyed| keyed.table)),
    )
}

/// Result of splitting tables by micrograph name.
#[derive(Debug, PartialEq)]
pub enum Split {
    /// One table per distinct name, sorted by name, with `name` removed.
    ByName(Vec<KeyedTable>),
    /// Some table lacks a `name` column; the input tables are returned as is.
    MissingNames(Vec<KeyedTable>),
}

/// Regroups the rows of all tables by their `name` value.
///
/// Rows with a missing name are dropped.
pub fn split_by_name(tables: Vec<KeyedTable>) -> Split {
    if !tables.iter().all(|keyed| keyed.table.has_field(Field::Name)) {
        return Split::MissingNames(tables);
    }

    let merged = Table::concat(tables.into_iter().map(|keyed| keyed.table));
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    if let Some(names) = merged.field(Field::Name) {
        for row in 0..merged.num_rows() {
            if !names.is_missing(row) {
                groups.entry(names.render(row)).or_default().push(row);
            }
        }
    }

    Split::ByName(
        groups
            .into_iter()
            .map(|(name, rows)| {
                let mut table = merged.take_rows(&rows);
                table.remove_field(Field::Name);
                KeyedTable::new(name, table)
            })
            .collect(),
    )
}

/// Resolves `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

/// Output location of a keyed table.
///
/// A key that is itself one of the input paths is written directly into
/// `out_dir`; keys and inputs are compared as absolute paths against the
/// current directory. Any other key is joined onto `out_dir`, and a result
/// outside `out_dir` is rebased beneath it.
pub fn resolve_output_path(
    key: &Path,
    out_dir: &Path,
    inputs: &[PathBuf],
    suffix: &str,
    extension: &str,
) -> io::Result<PathBuf> {
    let out_dir = normalize(&std::path::absolute(out_dir)?);
    let key_abs = normalize(&std::path::absolute(key)?);
    let stem = key_abs
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut is_input = false;
    for input in inputs {
        if normalize(&std::path::absolute(input)?) == key_abs {
            is_input = true;
            break;
        }
    }

    let full = normalize(&out_dir.join(key));
    let parent = if is_input {
        out_dir.clone()
    } else {
        match full.parent() {
            Some(parent) if parent.starts_with(&out_dir) => parent.to_path_buf(),
            Some(parent) => {
                let relative: PathBuf = parent
                    .components()
                    .filter(|c| matches!(c, Component::Normal(_)))
                    .collect();
                out_dir.join(relative)
            }
            None => out_dir.clone(),
        }
    };

    Ok(parent.join(format!("{}{}.{}", stem, suffix, extension)))
}
