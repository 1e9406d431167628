#![doc(
    html_logo_url = "https://raw.githubusercontent.com/storyscript/layered-nlp/main/assets/layered-nlp.svg",
    issue_tracker_base_url = "https://github.com/storyscript/layered-nlp/issues/"
)]

//! Diff-and-match primitives for comparing two structurally extracted documents.
//!
//! This crate holds the leaves of the comparison engine. None of them know
//! about documents, pages or similarity models:
//!
//! - [`TokenAligner`] - greedy lookahead diff producing kept/inserted/deleted [`TokenSpan`]s
//! - [`OptimalMatcher`] - minimum-cost bipartite assignment over a similarity matrix
//! - [`RegionMapper`] - document-space [`BoundingBox`] to page-local [`Rectangle`]
//!
//! The document-level pipeline lives in `layered-docdiff-document`.
//!
//! ## Example
//!
//! ```
//! use layered_docdiff::OptimalMatcher;
//!
//! let matcher = OptimalMatcher::new(0.65);
//! let result = matcher
//!     .match_units(vec!["a", "b"], vec!["b", "c"], |x, y| if x == y { 1.0 } else { 0.0 })
//!     .unwrap();
//!
//! assert_eq!(result.pairs, vec![("b", "b")]);
//! assert_eq!(result.unmatched_a, vec!["a"]);
//! assert_eq!(result.unmatched_b, vec!["c"]);
//! ```

mod assignment;
mod errors;
mod region;
mod token_diff;

pub use assignment::{IndexAssignment, MatchResult, OptimalMatcher, SimilarityMatrix};
pub use errors::{DiffError, DiffResult};
pub use region::{BoundingBox, Rectangle, RegionMapper};
pub use token_diff::{simple_tokenize, SpanKind, SpanStats, TokenAligner, TokenDiff, TokenSpan};

#[cfg(test)]
mod tests;
