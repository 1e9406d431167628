//! Fatal error types for the diff primitives.
//!
//! Only structural invariant violations live here. Per-element anomalies are
//! absorbed by the document layer and never surface as a `DiffError`.

use thiserror::Error;

/// Errors that abort an assignment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiffError {
    /// A similarity score was NaN or infinite, so no cost matrix can be built.
    #[error("assignment infeasible: similarity at ({row}, {column}) is not finite ({value})")]
    AssignmentInfeasible { row: usize, column: usize, value: f64 },

    /// A precomputed similarity matrix had a row of the wrong length.
    #[error("similarity matrix row {row} has {found} columns, expected {expected}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Result type for diff primitives.
pub type DiffResult<T> = Result<T, DiffError>;
