//! The conversion pipeline.
//!
//! A run reads every input into a [`Table`], resolves its columns onto
//! particle fields, transforms coordinates into the output convention,
//! optionally merges or splits the tables, and writes one file per
//! resulting table. All inputs are read before anything is transformed,
//! and everything is transformed before the first file is written.
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//! use coordconv::conversion::{process_conversion, ConvertOptions, Format};
//!
//! let options = ConvertOptions::new(Format::Box, Format::Star);
//! let inputs = vec![PathBuf::from("picks/mic001.box")];
//! let report = process_conversion(&inputs, Path::new("converted"), &options)?;
//! println!("{}", report);
//! # Ok::<(), coordconv::CoordconvError>(())
//! ```

pub mod aggregate;
pub mod report;
pub mod resolve;
pub mod transform;

pub use aggregate::{resolve_output_path, KeyedTable, Split, MERGED_KEY};
pub use report::{
    ConversionIssue, ConversionIssueCode, ConversionReport, ConversionSeverity, WrittenOutput,
};
pub use resolve::{ColumnMapping, ColumnRef, ColumnSpec, FormatDescriptor};
pub use transform::{
    ConfidenceChanges, ConfidenceRange, NormalizePolicy, ShiftRule, TransformOptions,
};

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::error::CoordconvError;
use crate::ir::io_cs::read_cs;
use crate::ir::io_delimited::{coerce_numeric, read_delimited, write_delimited};
use crate::ir::io_star::{read_star, write_star};
use crate::ir::{Field, HeaderMode, Overwrite, Table};

/// Particle coordinate file format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Format {
    /// RELION STAR.
    #[default]
    Star,
    /// EMAN box files.
    Box,
    /// crYOLO extended box files.
    Cbox,
    /// Generic tab-separated coordinates.
    Tsv,
    /// cryoSPARC `.cs` record arrays.
    Cs,
}

impl Format {
    pub const ALL: [Format; 5] = [
        Format::Star,
        Format::Box,
        Format::Cbox,
        Format::Tsv,
        Format::Cs,
    ];

    /// Format identifier as used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Format::Star => "star",
            Format::Box => "box",
            Format::Cbox => "cbox",
            Format::Tsv => "tsv",
            Format::Cs => "cs",
        }
    }

    /// File extension of written files.
    pub fn extension(&self) -> &'static str {
        self.name()
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, Format::Star | Format::Box | Format::Tsv)
    }

    /// Default column layout when reading this format.
    pub fn descriptor(&self) -> FormatDescriptor {
        match self {
            Format::Star => FormatDescriptor::STAR,
            Format::Box => FormatDescriptor::BOX,
            Format::Cbox => FormatDescriptor::CBOX,
            Format::Tsv => FormatDescriptor::TSV,
            Format::Cs => FormatDescriptor::CS,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = CoordconvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|format| format.name() == s)
            .ok_or_else(|| {
                CoordconvError::Configuration(format!(
                    "unknown format '{}' (supported: star, box, cbox, tsv, cs)",
                    s
                ))
            })
    }
}

/// How transformed tables become output files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// One output per input file.
    #[default]
    PerInput,
    /// All inputs merged into one file.
    Single,
    /// One output per micrograph name.
    Multi,
}

/// Settings of one conversion run.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvertOptions {
    pub from: Format,
    pub to: Format,
    /// Source of each field, in canonical order `x, y, w, h, conf, name`.
    pub columns: [ColumnSpec; 6],
    /// Column order of box/tsv output; entries that are not field names are ignored.
    pub output_order: Vec<String>,
    /// Appended to every output file stem.
    pub suffix: String,
    /// Write a header row in box/tsv output.
    pub include_header: bool,
    pub single_out: bool,
    pub multi_out: bool,
    pub header_mode: HeaderMode,
    pub overwrite: Overwrite,
    pub transform: TransformOptions,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            from: Format::default(),
            to: Format::default(),
            columns: Default::default(),
            output_order: Field::ALL.iter().map(|f| f.to_string()).collect(),
            suffix: String::new(),
            include_header: false,
            single_out: false,
            multi_out: false,
            header_mode: HeaderMode::default(),
            overwrite: Overwrite::default(),
            transform: TransformOptions::default(),
        }
    }
}

impl ConvertOptions {
    pub fn new(from: Format, to: Format) -> Self {
        Self {
            from,
            to,
            ..Default::default()
        }
    }

    /// Checks everything that can be checked before touching any file.
    pub fn validate(&self, inputs: &[PathBuf]) -> Result<OutputMode, CoordconvError> {
        let mode = match (self.single_out, self.multi_out) {
            (true, true) => {
                return Err(CoordconvError::Configuration(
                    "cannot fulfill both single_out and multi_out flags".to_string(),
                ))
            }
            (true, false) => OutputMode::Single,
            (false, true) => OutputMode::Multi,
            (false, false) => OutputMode::PerInput,
        };

        if !self.to.is_writable() {
            return Err(CoordconvError::Configuration(format!(
                "cannot write '{}' output (writable formats: star, box, tsv)",
                self.to
            )));
        }

        if ShiftRule::between(self.from, self.to) == ShiftRule::CenterToCorner
            && self.transform.box_size.is_none()
            && !self.from.descriptor().has_box_size()
        {
            return Err(CoordconvError::Configuration(format!(
                "box size required for '{}' input",
                self.from
            )));
        }

        if let Some(range) = self.transform.normalize_conf {
            if !(range.min.is_finite() && range.max.is_finite()) {
                return Err(CoordconvError::Configuration(format!(
                    "confidence range [{}, {}] must be finite",
                    range.min, range.max
                )));
            }
        }

        if inputs.is_empty() {
            return Err(CoordconvError::Configuration(
                "no input paths given".to_string(),
            ));
        }
        let missing: Vec<String> = inputs
            .iter()
            .filter(|p| !p.is_file())
            .map(|p| p.display().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(CoordconvError::Configuration(format!(
                "bad input paths: {}",
                missing.join(", ")
            )));
        }

        Ok(mode)
    }

    /// Fields written to delimited output, in order.
    pub fn output_fields(&self) -> Vec<Field> {
        self.output_order
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect()
    }
}

/// Reads one input file with the reader of its format.
pub fn read_input(path: &Path, format: Format, header: HeaderMode) -> Result<Table, CoordconvError> {
    match format {
        Format::Star => read_star(path),
        Format::Cs => read_cs(path),
        Format::Box | Format::Tsv => read_delimited(path, header),
        Format::Cbox => coerce_numeric(read_delimited(path, header)?, path),
    }
}

/// Runs a full conversion and returns its report.
///
/// Duplicate input paths are read once. Output files are placed beneath
/// `out_dir` (see [`resolve_output_path`]).
pub fn process_conversion(
    inputs: &[PathBuf],
    out_dir: &Path,
    options: &ConvertOptions,
) -> Result<ConversionReport, CoordconvError> {
    let mode = options.validate(inputs)?;
    let mut report = ConversionReport::new(options.from.name(), options.to.name());

    let mut seen = HashSet::new();
    let mut distinct = Vec::with_capacity(inputs.len());
    for path in inputs {
        if seen.insert(path.clone()) {
            distinct.push(path.clone());
        } else {
            report.add(ConversionIssue::info(
                ConversionIssueCode::DuplicateInput,
                format!("{} was given more than once and is read once", path.display()),
            ));
        }
    }
    report.inputs = distinct.len();

    let mapping = resolve::resolve_mapping(&options.columns, &options.from.descriptor());
    info!("using the following input column mapping:");
    info!("{}", mapping);

    let mut tables = Vec::with_capacity(distinct.len());
    for path in &distinct {
        debug!("reading {}", path.display());
        let table = read_input(path, options.from, options.header_mode)?;
        if table.is_empty() {
            report.add(ConversionIssue::info(
                ConversionIssueCode::EmptyInput,
                format!("{} has no particle rows", path.display()),
            ));
        }
        tables.push((path.clone(), table));
    }

    let mut transformed = Vec::with_capacity(tables.len());
    for (path, table) in tables {
        let (table, unmatched) = resolve::apply_mapping(table, &mapping);
        for field in unmatched {
            if let Some(column) = mapping.get(field) {
                debug!(
                    "column {} for '{}' not found in {}; skipping",
                    column,
                    field,
                    path.display()
                );
                report.add(ConversionIssue::info(
                    ConversionIssueCode::ColumnNotFound,
                    format!("column {} for '{}' not found in {}", column, field, path.display()),
                ));
            }
        }
        let table = transform_one(table, &path, options, &mut report)?;
        transformed.push(KeyedTable::new(path, table));
    }

    let outputs = prepare_outputs(transformed, mode, &mut report);
    write_outputs(outputs, out_dir, &distinct, options, &mut report)?;
    Ok(report)
}

fn transform_one(
    table: Table,
    path: &Path,
    options: &ConvertOptions,
    report: &mut ConversionReport,
) -> Result<Table, CoordconvError> {
    let (table, changes) =
        transform::transform(table, options.from, options.to, &options.transform, path)?;

    if let (true, Some(range)) = (changes.normalized, options.transform.normalize_conf) {
        report.add(ConversionIssue::info(
            ConversionIssueCode::ConfidenceNormalized,
            format!(
                "confidences in {} rescaled to [{}, {}]",
                path.display(),
                range.min,
                range.max
            ),
        ));
    }
    if let (true, Some(value)) = (changes.backfilled, options.transform.require_conf) {
        report.add(ConversionIssue::info(
            ConversionIssueCode::ConfidenceBackfilled,
            format!("filled missing confidences in {} with {}", path.display(), value),
        ));
    }
    Ok(table)
}

/// Applies the output mode to the transformed tables.
///
/// A per-micrograph split that cannot be fulfilled is reported and falls
/// back to per-input output.
pub fn prepare_outputs(
    tables: Vec<KeyedTable>,
    mode: OutputMode,
    report: &mut ConversionReport,
) -> Vec<KeyedTable> {
    match mode {
        OutputMode::PerInput => tables,
        OutputMode::Single => {
            let merged = aggregate::merge_single(tables);
            if !merged.table.has_field(Field::Name) {
                let message = "merged output has no micrograph names";
                warn!("{}", message);
                report.add(ConversionIssue::warning(
                    ConversionIssueCode::MergedWithoutNames,
                    message,
                ));
            }
            vec![merged]
        }
        OutputMode::Multi => match aggregate::split_by_name(tables) {
            Split::ByName(groups) => groups,
            Split::MissingNames(tables) => {
                let message = "cannot fulfill multi_out without micrograph name information";
                warn!("{}", message);
                report.add(ConversionIssue::warning(
                    ConversionIssueCode::MultiOutputFallback,
                    message,
                ));
                tables
            }
        },
    }
}

/// Writes every keyed table beneath `out_dir`.
pub fn write_outputs(
    outputs: Vec<KeyedTable>,
    out_dir: &Path,
    inputs: &[PathBuf],
    options: &ConvertOptions,
    report: &mut ConversionReport,
) -> Result<(), CoordconvError> {
    let order = options.output_fields();
    for KeyedTable { key, table } in outputs {
        let path = resolve_output_path(
            &key,
            out_dir,
            inputs,
            &options.suffix,
            options.to.extension(),
        )?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        match options.to {
            Format::Star => write_star(&path, &table, options.overwrite)?,
            Format::Box | Format::Tsv => {
                info!("using the following output column order:");
                info!("{}", options.output_order.join(" "));
                write_delimited(&path, &table, &order, options.include_header, options.overwrite)?;
            }
            Format::Cbox | Format::Cs => {
                return Err(CoordconvError::Configuration(format!(
                    "cannot write '{}' output",
                    options.to
                )))
            }
        }

        info!("wrote to {}", path.display());
        report.outputs.push(WrittenOutput {
            path,
            rows: table.num_rows(),
        });
    }
    Ok(())
}
