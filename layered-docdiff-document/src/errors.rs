//! Error and warning types for document comparison.
//!
//! A comparison either completes or fails with one [`CompareError`]. Anomalies
//! confined to a single element or table pair are recorded as
//! [`CompareWarning`]s on the result and the run continues.

use std::fmt;
use std::path::PathBuf;

use layered_docdiff::DiffError;
use serde::Serialize;
use thiserror::Error;

/// Matching stage a fatal error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Sentences,
    Figures,
    Tables,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Sentences => "sentence",
            Stage::Figures => "figure",
            Stage::Tables => "table",
        })
    }
}

/// Fatal errors that abort a comparison run.
#[derive(Debug, Error)]
pub enum CompareError {
    /// The assignment for one unit kind could not be solved.
    #[error("{stage} matching failed: {source}")]
    Assignment {
        stage: Stage,
        #[source]
        source: DiffError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for comparison runs.
pub type CompareResult<T> = Result<T, CompareError>;

/// Errors loading or validating a [`CompareConfig`](crate::CompareConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("threshold `{name}` must be within [0, 1], got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },
}

/// Failure resolving a table or figure attachment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachmentError {
    #[error("attachment not found: {0}")]
    NotFound(String),

    #[error("malformed attachment {file_ref}: {reason}")]
    Malformed { file_ref: String, reason: String },
}

/// Failure reported by an extraction service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// Worth retrying, e.g. a service timeout.
    #[error("transient extraction failure: {0}")]
    Transient(String),

    #[error("extraction failed: {0}")]
    Permanent(String),
}

impl ExtractionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ExtractionError::Transient(_))
    }
}

/// Failure rendering annotations onto a document.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to serialize overlay: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("render failed: {0}")]
    Backend(String),
}

/// Non-fatal anomaly absorbed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompareWarning {
    /// A table element whose path lacks a usable row or column index.
    UnresolvableCellIndex { document: String, element: usize },
    /// A selected element without bounds.
    MissingBounds { document: String, element: usize },
    /// A selected element without a page, or on a page of unknown height.
    MissingPage {
        document: String,
        element: usize,
        page: Option<u32>,
    },
    /// A selected element whose bounds contain NaN or infinity.
    NonFiniteBounds { document: String, element: usize },
    /// An attachment that could not be loaded or compared.
    MalformedAttachment {
        document: String,
        file_ref: String,
        reason: String,
    },
}

impl fmt::Display for CompareWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareWarning::UnresolvableCellIndex { document, element } => {
                write!(f, "{}: element {} has no row/column index", document, element)
            }
            CompareWarning::MissingBounds { document, element } => {
                write!(f, "{}: element {} has no bounds", document, element)
            }
            CompareWarning::MissingPage {
                document,
                element,
                page: Some(page),
            } => write!(f, "{}: element {} is on unknown page {}", document, element, page),
            CompareWarning::MissingPage {
                document,
                element,
                page: None,
            } => write!(f, "{}: element {} has no page", document, element),
            CompareWarning::NonFiniteBounds { document, element } => {
                write!(f, "{}: element {} has non-finite bounds", document, element)
            }
            CompareWarning::MalformedAttachment {
                document,
                file_ref,
                reason,
            } => write!(f, "{}: skipped {}: {}", document, file_ref, reason),
        }
    }
}
