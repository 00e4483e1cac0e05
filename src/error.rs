use std::path::PathBuf;
use thiserror::Error;

/// The main error type for coordconv operations.
///
/// Every variant is fatal for the current run; non-fatal conditions are
/// reported through [`ConversionReport`](crate::conversion::ConversionReport)
/// issues instead.
#[derive(Debug, Error)]
pub enum CoordconvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Conflicting flags, missing box size, unsupported format pair, bad inputs.
    #[error("{0}")]
    Configuration(String),

    #[error("input '{format}' file {path} not properly formatted: {message}")]
    MalformedInput {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("could not load binary records from {path}: {message}")]
    UnreadableInput { path: PathBuf, message: String },

    #[error("no data found in file at {path}")]
    EmptyInput { path: PathBuf },

    #[error("failed to parse '{token}' as a number in column {column} of {path} (row {row})")]
    NumericParse {
        path: PathBuf,
        column: String,
        row: usize,
        token: String,
    },

    #[error("didn't find column '{column}' in input columns ({available}) of {path}")]
    MissingColumn {
        path: PathBuf,
        column: String,
        available: String,
    },

    #[error("unexpected type in column '{column}' of {path} ({message})")]
    TypeMismatch {
        path: PathBuf,
        column: String,
        message: String,
    },

    #[error("unexpected value in column '{column}' of {path} ({message})")]
    InvalidValue {
        path: PathBuf,
        column: String,
        message: String,
    },

    #[error("{path} already exists; re-run with the force flag to replace existing files")]
    OutputConflict { path: PathBuf },

    #[error("Failed to write {path}: {source}")]
    DelimitedWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to serialize conversion report: {0}")]
    ReportSerialize(#[from] serde_json::Error),
}
