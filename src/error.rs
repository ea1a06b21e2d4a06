//! Error taxonomy and the per-parse warning sink.

use serde::Serialize;
use thiserror::Error;

/// Document-fatal errors. Any of these aborts the parse.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid document format: fewer than three top-level blocks")]
    TooShort,
    #[error("empty or missing metadata section")]
    MissingMetadata,
    #[error("invalid metadata line: {0:?}")]
    InvalidMetadata(String),
    #[error("missing FORMAT metadata entry")]
    MissingFormat,
    #[error("invalid or missing name section")]
    MissingName,
}

/// Section-local errors. Raised by the definition micro-parsers and the
/// section self-parsers, caught at the nearest dispatch boundary and
/// downgraded to a warning so one bad section cannot destroy the document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SectionError {
    #[error("invalid {0} section format")]
    Format(&'static str),
    #[error("invalid type format: {0:?}")]
    TypeFormat(String),
    #[error("type {0:?} is not an array type")]
    NotArray(String),
    #[error("multiple values for attribute {0}")]
    MultipleValues(String),
    #[error("default value specified for a non-optional parameter {0}")]
    DefaultOnRequired(String),
    #[error("invalid response status code {0:?}")]
    BadStatusCode(String),
}

/// Misuse surfaced from [`crate::Blueprint::merge`].
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("data structures collide: {0}")]
    DataStructureCollision(String),
    #[error("cannot merge duplicate action: {0}")]
    DuplicateAction(String),
}

/// A recoverable diagnostic with the section context it was raised in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub context: String,
    pub message: String,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.context.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.context, self.message)
        }
    }
}

/// Per-parse configuration.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Echo warnings to stderr as they are recorded.
    pub report_warnings: bool,
    /// Re-parse a resource window as a single implicit action when it has
    /// payload-level sections or no resource-level list.
    pub implicit_actions: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            report_warnings: true,
            implicit_actions: true,
        }
    }
}

/// Collects warnings for one parse. Each parse owns its sink, so the
/// diagnostics of concurrent parses never interleave.
#[derive(Debug)]
pub(crate) struct WarningSink {
    report: bool,
    warnings: Vec<Warning>,
}

impl WarningSink {
    pub(crate) fn new(report: bool) -> Self {
        Self {
            report,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn warn(&mut self, context: impl Into<String>, message: impl Into<String>) {
        let warning = Warning {
            context: context.into(),
            message: message.into(),
        };
        if self.report {
            eprintln!("{warning}");
        }
        self.warnings.push(warning);
    }

    pub(crate) fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}
