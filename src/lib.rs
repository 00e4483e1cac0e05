//! coordconv: convert cryo-EM particle coordinates between picker formats.
//!
//! Particle pickers disagree on almost everything: RELION writes STAR
//! tables with named columns and center coordinates, EMAN writes box files
//! with lower-left corners, crYOLO adds an extended box format, cryoSPARC
//! stores NumPy record arrays with coordinates as fractions of the
//! micrograph size. coordconv reads all of them into one tabular
//! representation and writes STAR, BOX or TSV.
//!
//! # Modules
//!
//! - [`ir`]: Tables, particle fields, and the format readers and writers
//! - [`conversion`]: Column resolution, coordinate transforms, output fan-in/fan-out
//! - [`logging`]: Console log output
//! - [`error`]: Error types for coordconv operations

pub mod conversion;
pub mod error;
pub mod ir;
pub mod logging;

use std::fs;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::{debug, info};

use conversion::{
    process_conversion, ColumnSpec, ConfidenceRange, ConvertOptions, Format, NormalizePolicy,
    TransformOptions,
};
use ir::{HeaderMode, Overwrite};

pub use error::CoordconvError;

/// Format names accepted on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ConvertFormat {
    Star,
    Box,
    Cbox,
    Tsv,
    Cs,
}

impl From<ConvertFormat> for Format {
    fn from(format: ConvertFormat) -> Self {
        match format {
            ConvertFormat::Star => Format::Star,
            ConvertFormat::Box => Format::Box,
            ConvertFormat::Cbox => Format::Cbox,
            ConvertFormat::Tsv => Format::Tsv,
            ConvertFormat::Cs => Format::Cs,
        }
    }
}

/// How the conversion report is printed once all files are written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

/// The coordconv CLI application.
///
/// Converts particle coordinate files between several formats. The -f
/// (input format) and -t (output format) options define the conversion;
/// -c gives more granular control over which input columns are used.
#[derive(Parser, Debug)]
#[command(name = "coordconv")]
#[command(version, author, about)]
struct Cli {
    /// Path(s) to input particle coordinates.
    #[arg(required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Output directory for generated coordinate files (created if it does not exist).
    out_dir: PathBuf,

    /// Format FROM which to convert the input.
    #[arg(short = 'f', value_enum)]
    from: ConvertFormat,

    /// Format TO which to convert the input (star, box or tsv).
    #[arg(short = 't', value_enum)]
    to: ConvertFormat,

    /// Box size to use (required if the input does not include one).
    #[arg(short = 'b')]
    box_size: Option<u32>,

    /// Input columns for [x, y, w, h, conf, name]: STAR column names or zero-based
    /// indices. 'none' excludes a field, 'auto' keeps the format default.
    #[arg(
        short = 'c',
        num_args = 6,
        value_names = ["X_COL", "Y_COL", "W_COL", "H_COL", "CONF_COL", "NAME_COL"],
        default_values = ["auto", "auto", "auto", "auto", "auto", "auto"]
    )]
    columns: Vec<String>,

    /// Column order of BOX/TSV output. Any string that is not a field name
    /// (like 'none') drops that position.
    #[arg(
        short = 'd',
        num_args = 6,
        value_names = ["COL", "COL", "COL", "COL", "COL", "COL"],
        default_values = ["x", "y", "w", "h", "conf", "name"]
    )]
    output_order: Vec<String>,

    /// Suffix appended to generated file names.
    #[arg(short = 's', default_value = "")]
    suffix: String,

    /// Include a header row in BOX/TSV output.
    #[arg(long)]
    header: bool,

    /// Write a single output file with a micrograph name column.
    #[arg(long = "single_out")]
    single_out: bool,

    /// Split output into one file per micrograph name.
    #[arg(long = "multi_out")]
    multi_out: bool,

    /// Round coordinates to this many decimal places.
    #[arg(long = "round", allow_negative_numbers = true)]
    round_to: Option<i32>,

    /// Confidence used where the input has none.
    #[arg(long = "require_conf", allow_negative_numbers = true)]
    require_conf: Option<f64>,

    /// Normalize confidences onto [MIN, MAX].
    #[arg(
        long = "norm_conf",
        num_args = 2,
        value_names = ["MIN", "MAX"],
        allow_negative_numbers = true
    )]
    norm_conf: Option<Vec<f64>>,

    /// With --norm_conf, only rescale when confidences fall outside the range.
    #[arg(long = "norm_conf_if_outside", requires = "norm_conf")]
    norm_conf_if_outside: bool,

    /// Zero-based non-blank line of delimited input that names its columns.
    #[arg(long = "in_header_row")]
    in_header_row: Option<usize>,

    /// Allow existing output files to be replaced.
    #[arg(long)]
    force: bool,

    /// Print a conversion report ('text' or 'json') after writing.
    #[arg(long, value_enum)]
    report: Option<ReportFormat>,

    /// Silence info-level output.
    #[arg(long, env = "COORDCONV_QUIET")]
    quiet: bool,
}

impl Cli {
    fn to_options(&self) -> ConvertOptions {
        let mut columns: [ColumnSpec; 6] = Default::default();
        for (slot, value) in columns.iter_mut().zip(&self.columns) {
            *slot = ColumnSpec::parse(value);
        }

        ConvertOptions {
            from: self.from.into(),
            to: self.to.into(),
            columns,
            output_order: self.output_order.clone(),
            suffix: self.suffix.clone(),
            include_header: self.header,
            single_out: self.single_out,
            multi_out: self.multi_out,
            header_mode: self
                .in_header_row
                .map_or(HeaderMode::Auto, HeaderMode::Row),
            overwrite: Overwrite::from_force(self.force),
            transform: TransformOptions {
                box_size: self.box_size,
                round_to: self.round_to,
                normalize_conf: self.norm_conf.as_deref().and_then(|range| match range {
                    [min, max] => Some(ConfidenceRange {
                        min: *min,
                        max: *max,
                    }),
                    _ => None,
                }),
                normalize_policy: if self.norm_conf_if_outside {
                    NormalizePolicy::OutOfRangeOnly
                } else {
                    NormalizePolicy::Always
                },
                require_conf: self.require_conf,
            },
        }
    }
}

/// Run the coordconv CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), CoordconvError> {
    let cli = Cli::parse();
    logging::init(cli.quiet)?;

    let options = cli.to_options();
    let inputs: Vec<PathBuf> = cli
        .input
        .iter()
        .map(|path| fs::canonicalize(path).unwrap_or_else(|_| path.clone()))
        .collect();
    options.validate(&inputs)?;

    fs::create_dir_all(&cli.out_dir)?;
    let out_dir = fs::canonicalize(&cli.out_dir)?;

    let report = process_conversion(&inputs, &out_dir, &options)?;
    match cli.report {
        Some(ReportFormat::Json) => println!("{}", serde_json::to_string_pretty(&report)?),
        Some(ReportFormat::Text) => print!("{}", report),
        None => debug!("conversion summary:\n{}", report),
    }
    info!("done.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("coordconv").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn trailing_positional_is_the_output_directory() {
        let cli = parse(&["a.box", "b.box", "out", "-f", "box", "-t", "star"]);
        assert_eq!(cli.input, vec![PathBuf::from("a.box"), PathBuf::from("b.box")]);
        assert_eq!(cli.out_dir, PathBuf::from("out"));
    }

    #[test]
    fn defaults_map_to_default_options() {
        let options = parse(&["a.box", "out", "-f", "box", "-t", "star"]).to_options();
        assert_eq!(options, ConvertOptions::new(Format::Box, Format::Star));
    }

    #[test]
    fn flags_map_onto_options() {
        let options = parse(&[
            "a.star", "out", "-f", "star", "-t", "box", "-b", "128", "-c", "auto", "auto", "none",
            "none", "_rlnMaxValueProbDistribution", "3", "--round", "-1", "--norm_conf", "0", "1",
            "--norm_conf_if_outside", "--in_header_row", "2", "--force", "-s", "_picked",
        ])
        .to_options();

        assert_eq!(options.transform.box_size, Some(128));
        assert_eq!(options.columns[2], ColumnSpec::Excluded);
        assert_eq!(
            options.columns[4],
            ColumnSpec::ByName("_rlnMaxValueProbDistribution".into())
        );
        assert_eq!(options.columns[5], ColumnSpec::ByIndex(3));
        assert_eq!(options.transform.round_to, Some(-1));
        assert_eq!(
            options.transform.normalize_conf,
            Some(ConfidenceRange { min: 0.0, max: 1.0 })
        );
        assert_eq!(options.transform.normalize_policy, NormalizePolicy::OutOfRangeOnly);
        assert_eq!(options.header_mode, HeaderMode::Row(2));
        assert_eq!(options.overwrite, Overwrite::Force);
        assert_eq!(options.suffix, "_picked");
    }

    #[test]
    fn column_overrides_need_six_values() {
        let result = Cli::try_parse_from([
            "coordconv", "a.box", "out", "-f", "box", "-t", "star", "-c", "0", "1",
        ]);
        assert!(result.is_err());
    }
}
