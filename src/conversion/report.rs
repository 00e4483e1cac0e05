//! Conversion report types for tracking outputs and policy decisions.
//!
//! Non-fatal conditions met during a run (fallbacks, skipped columns,
//! rescaled confidences) are recorded here next to the files written, so
//! callers can inspect what happened without scraping log lines.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// A report generated by one conversion run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ConversionReport {
    /// Source format name.
    pub from: String,
    /// Target format name.
    pub to: String,
    /// Number of distinct input files read.
    pub inputs: usize,
    /// Files written, in write order.
    pub outputs: Vec<WrittenOutput>,
    /// Issues discovered during conversion.
    pub issues: Vec<ConversionIssue>,
}

impl ConversionReport {
    /// Create a new empty report for a conversion between formats.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Default::default()
        }
    }

    /// Add an issue to the report.
    pub fn add(&mut self, issue: ConversionIssue) {
        self.issues.push(issue);
    }

    /// Count of warning-level issues.
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Warning)
            .count()
    }

    /// Count of info-level issues (policy decisions, notes).
    pub fn info_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Info)
            .count()
    }

    /// Total number of particle rows written across all outputs.
    pub fn rows_written(&self) -> usize {
        self.outputs.iter().map(|o| o.rows).sum()
    }

    /// Returns true if any issue with the given code was recorded.
    pub fn has_issue(&self, code: ConversionIssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  {} -> {}: {} input file(s), {} output file(s), {} particle(s)",
            self.from,
            self.to,
            self.inputs,
            self.outputs.len(),
            self.rows_written()
        )?;

        for (title, severity) in [
            ("Warnings", ConversionSeverity::Warning),
            ("Notes", ConversionSeverity::Info),
        ] {
            let matching: Vec<&ConversionIssue> = self
                .issues
                .iter()
                .filter(|i| i.severity == severity)
                .collect();
            if matching.is_empty() {
                continue;
            }
            writeln!(f)?;
            writeln!(f, "{} ({}):", title, matching.len())?;
            for issue in matching {
                writeln!(f, "  - {}", issue.message)?;
            }
        }

        Ok(())
    }
}

/// One file written by the run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WrittenOutput {
    pub path: PathBuf,
    pub rows: usize,
}

/// A single issue discovered during conversion.
#[derive(Clone, Debug, Serialize)]
pub struct ConversionIssue {
    pub severity: ConversionSeverity,
    pub code: ConversionIssueCode,
    pub message: String,
}

impl ConversionIssue {
    /// Create a warning-level issue.
    pub fn warning(code: ConversionIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: ConversionSeverity::Warning,
            code,
            message: message.into(),
        }
    }

    /// Create an info-level issue (policy note).
    pub fn info(code: ConversionIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: ConversionSeverity::Info,
            code,
            message: message.into(),
        }
    }
}

/// Severity level for conversion issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionSeverity {
    /// The output differs from what was asked for.
    Warning,
    /// A policy decision; the output is as asked for.
    Info,
}

/// Stable issue codes for programmatic consumption.
///
/// These codes are part of the JSON schema and should remain stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionIssueCode {
    /// Per-micrograph output was requested but some input lacks names.
    MultiOutputFallback,
    /// Inputs were merged into one file without micrograph names.
    MergedWithoutNames,
    /// The same input path was given more than once.
    DuplicateInput,
    /// An input file holds no particle rows.
    EmptyInput,
    /// A mapped column was not found in an input file.
    ColumnNotFound,
    /// Confidence values were rescaled.
    ConfidenceNormalized,
    /// A constant confidence column was added.
    ConfidenceBackfilled,
}
