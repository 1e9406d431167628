//! Document-level comparison for layered-docdiff.
//!
//! Takes two structurally extracted documents, pairs up their sentences,
//! figures and tables, diffs matched tables cell by cell, and produces
//! page-local highlight annotations for each side.
//!
//! ## Core Types
//!
//! - [`ExtractedDocument`] / [`Element`] - extraction output the engine consumes
//! - [`DocumentDiffOrchestrator`] - runs segment, match, refine, annotate
//! - [`AnnotationAccumulator`] - append-only page annotations per document
//! - [`TextSimilarity`] / [`ImageSimilarity`] - similarity oracles supplied by the host
//! - [`CompareConfig`] - thresholds, attachment kinds and styles, loadable from TOML
//!
//! ## Example
//!
//! ```
//! use layered_docdiff::BoundingBox;
//! use layered_docdiff_document::{
//!     CompareConfig, DocumentDiffOrchestrator, Element, ExtractedDocument,
//!     InMemoryAttachments, PixelSimilarity, TokenOverlapSimilarity,
//! };
//!
//! let bounds = BoundingBox::new(72.0, 700.0, 300.0, 720.0);
//! let a = ExtractedDocument::new("a.pdf", vec![Element::with_text("The sky is blue.").placed(0, bounds)])
//!     .with_uniform_pages(1, 792.0);
//! let b = ExtractedDocument::new(
//!     "b.pdf",
//!     vec![
//!         Element::with_text("The sky is blue.").placed(0, bounds),
//!         Element::with_text("It rained today.").placed(0, bounds),
//!     ],
//! )
//! .with_uniform_pages(1, 792.0);
//!
//! let config = CompareConfig::default();
//! let attachments = InMemoryAttachments::new();
//! let orchestrator =
//!     DocumentDiffOrchestrator::new(&config, &TokenOverlapSimilarity, &PixelSimilarity, &attachments);
//!
//! let result = orchestrator.compare(&a, &b).unwrap();
//! assert_eq!(result.sentences.pairs.len(), 1);
//! assert_eq!(result.sentences.unmatched_b[0].text, "It rained today.");
//! assert_eq!(result.annotations_a.len(), 0);
//! assert_eq!(result.annotations_b.len(), 1);
//! ```

mod annotation;
mod collaborators;
mod config;
mod element;
mod errors;
mod orchestrator;
mod report;
mod segment;
mod similarity;
mod table;

// Extraction data model
pub use element::{
    file_name, CellLocator, Element, ExtractedDocument, PathIndices, CELL_SEGMENT,
    FIGURE_SEGMENT, ROW_SEGMENT, TABLE_SEGMENT,
};

// Segmentation
pub use segment::{
    FigureUnit, LocatedElement, SegmentedDocument, Segmenter, SentenceSplitter, SentenceUnit,
    TableUnit,
};

// Tables
pub use table::{compare_cells, CellDiff, TableData};

// Annotations
pub use annotation::{
    Annotation, AnnotationAccumulator, AnnotationStyle, AnnotationStyles, Category, Hit, HitSet,
};

// Similarity oracles
pub use similarity::{
    cosine_similarity, Embedder, EmbeddingSimilarity, ImageSimilarity, MemoizedSimilarity,
    PixelSimilarity, TextSimilarity, TokenOverlapSimilarity,
};

// Collaborators
pub use collaborators::{
    extract_with_retry, AttachmentLoader, ExtractionCache, ExtractionService, ImageData,
    InMemoryAttachments, JsonOverlayRenderer, Renderer, RetryPolicy,
};

pub use config::CompareConfig;

pub use errors::{
    AttachmentError, CompareError, CompareResult, CompareWarning, ConfigError, ExtractionError,
    RenderError, Stage,
};

pub use orchestrator::{
    ComparisonResult, DocumentDiffOrchestrator, SentencePairDiff, TablePairDiff,
};

pub use report::{excerpt, ComparisonSummary};

#[cfg(test)]
mod tests {
    mod annotate;
    mod orchestrator;
    mod properties;
}
