//! The comparison pipeline: segment, match, refine, annotate.
//!
//! A run over one pair of documents is a straight line through four stages.
//! Each matching stage either succeeds or aborts the whole run with a
//! [`CompareError`]; per-element problems are collected as warnings instead.

use std::collections::BTreeSet;

use layered_docdiff::{MatchResult, OptimalMatcher, SimilarityMatrix, TokenAligner, TokenDiff};
use serde::Serialize;

use crate::annotation::{Annotation, AnnotationAccumulator, Category, Hit, HitSet};
use crate::collaborators::{AttachmentLoader, ImageData};
use crate::config::CompareConfig;
use crate::element::ExtractedDocument;
use crate::errors::{CompareError, CompareResult, CompareWarning, Stage};
use crate::segment::{FigureUnit, LocatedElement, SegmentedDocument, Segmenter, SentenceUnit, TableUnit};
use crate::similarity::{ImageSimilarity, TextSimilarity};
use crate::table::{compare_cells, CellDiff};

/// Token diff of a matched sentence pair whose texts differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentencePairDiff {
    /// Index into [`ComparisonResult::sentences`]' pairs.
    pub pair: usize,
    pub diff: TokenDiff,
}

/// Changed cells of one matched table pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TablePairDiff {
    pub file_ref_a: String,
    pub file_ref_b: String,
    pub cells: Vec<CellDiff>,
}

/// Everything a comparison run produces.
#[derive(Debug, Serialize)]
pub struct ComparisonResult {
    pub sentences: MatchResult<SentenceUnit>,
    pub sentence_diffs: Vec<SentencePairDiff>,
    pub figures: MatchResult<FigureUnit>,
    pub tables: MatchResult<TableUnit>,
    pub table_diffs: Vec<TablePairDiff>,
    /// Annotations for the first document, in pass order.
    pub annotations_a: Vec<Annotation>,
    /// Annotations for the second document, in pass order.
    pub annotations_b: Vec<Annotation>,
    pub warnings: Vec<CompareWarning>,
}

impl ComparisonResult {
    /// True when some unit went unmatched or some matched pair changed.
    pub fn has_differences(&self) -> bool {
        !self.sentences.unmatched_a.is_empty()
            || !self.sentences.unmatched_b.is_empty()
            || !self.figures.unmatched_a.is_empty()
            || !self.figures.unmatched_b.is_empty()
            || !self.tables.unmatched_a.is_empty()
            || !self.tables.unmatched_b.is_empty()
            || !self.table_diffs.is_empty()
            || !self.sentence_diffs.is_empty()
    }

    pub fn changed_cells(&self) -> usize {
        self.table_diffs.iter().map(|t| t.cells.len()).sum()
    }
}

/// Compares two extracted documents.
///
/// Holds no state between runs; the same orchestrator can compare any number
/// of document pairs.
pub struct DocumentDiffOrchestrator<'c> {
    config: &'c CompareConfig,
    text: &'c dyn TextSimilarity,
    image: &'c dyn ImageSimilarity,
    segmenter: Segmenter<'c>,
}

impl<'c> DocumentDiffOrchestrator<'c> {
    pub fn new(
        config: &'c CompareConfig,
        text: &'c dyn TextSimilarity,
        image: &'c dyn ImageSimilarity,
        attachments: &'c dyn AttachmentLoader,
    ) -> Self {
        Self {
            config,
            text,
            image,
            segmenter: Segmenter::new(config, attachments),
        }
    }

    /// Compare `a` against `b`.
    ///
    /// Fails before any work when the configuration is out of range.
    pub fn compare(
        &self,
        a: &ExtractedDocument,
        b: &ExtractedDocument,
    ) -> CompareResult<ComparisonResult> {
        self.config.validate()?;
        let mut warnings = Vec::new();

        let SegmentedDocument {
            sentences: sentences_a,
            tables: tables_a,
            figures: figures_a,
            located: located_a,
            ..
        } = self.segmenter.segment(a, &mut warnings);
        let SegmentedDocument {
            sentences: sentences_b,
            tables: tables_b,
            figures: figures_b,
            located: located_b,
            ..
        } = self.segmenter.segment(b, &mut warnings);

        let sentences = self.match_sentences(sentences_a, sentences_b)?;
        let figures = self.match_figures(figures_a, figures_b)?;
        let tables = self.match_tables(tables_a, tables_b)?;

        let sentence_diffs = sentence_diffs(&sentences);
        let table_diffs = self.refine_tables(a, b, &tables, &mut warnings);

        let mut accumulator_a = AnnotationAccumulator::new(a, &self.config.styles);
        let mut accumulator_b = AnnotationAccumulator::new(b, &self.config.styles);

        annotate_sentences(&mut accumulator_a, &located_a, &sentences.unmatched_a, Category::Delete);
        annotate_sentences(&mut accumulator_b, &located_b, &sentences.unmatched_b, Category::Insert);

        let figure_refs_a = file_refs(figures.unmatched_a.iter().map(|f| &f.file_ref));
        let figure_refs_b = file_refs(figures.unmatched_b.iter().map(|f| &f.file_ref));
        annotate(&mut accumulator_a, &located_a, Category::FigureUnmatchedA, Hit::Figures(figure_refs_a));
        annotate(&mut accumulator_b, &located_b, Category::FigureUnmatchedB, Hit::Figures(figure_refs_b));

        let table_refs_a = file_refs(tables.unmatched_a.iter().map(|t| &t.file_ref));
        let table_refs_b = file_refs(tables.unmatched_b.iter().map(|t| &t.file_ref));
        annotate(&mut accumulator_a, &located_a, Category::TableUnmatchedA, Hit::Attachments(table_refs_a));
        annotate(&mut accumulator_b, &located_b, Category::TableUnmatchedB, Hit::Attachments(table_refs_b));

        // One pass per matched table pair, over that table's elements.
        for table in &table_diffs {
            let cells_a: BTreeSet<_> = table.cells.iter().map(CellDiff::locator_a).collect();
            let cells_b: BTreeSet<_> = table.cells.iter().filter_map(CellDiff::locator_b).collect();
            let scope_a = table_elements(&located_a, &table.file_ref_a);
            let scope_b = table_elements(&located_b, &table.file_ref_b);
            annotate(&mut accumulator_a, &scope_a, Category::CellModified, Hit::Cells(cells_a));
            annotate(&mut accumulator_b, &scope_b, Category::CellModified, Hit::Cells(cells_b));
        }

        let (annotations_a, warnings_a) = accumulator_a.into_parts();
        let (annotations_b, warnings_b) = accumulator_b.into_parts();
        warnings.extend(warnings_a);
        warnings.extend(warnings_b);

        tracing::info!(
            document_a = %a.id,
            document_b = %b.id,
            sentence_pairs = sentences.pairs.len(),
            figure_pairs = figures.pairs.len(),
            table_pairs = tables.pairs.len(),
            changed_cells = table_diffs.iter().map(|t| t.cells.len()).sum::<usize>(),
            annotations_a = annotations_a.len(),
            annotations_b = annotations_b.len(),
            warnings = warnings.len(),
            "comparison complete"
        );

        Ok(ComparisonResult {
            sentences,
            sentence_diffs,
            figures,
            tables,
            table_diffs,
            annotations_a,
            annotations_b,
            warnings,
        })
    }

    fn match_sentences(
        &self,
        units_a: Vec<SentenceUnit>,
        units_b: Vec<SentenceUnit>,
    ) -> CompareResult<MatchResult<SentenceUnit>> {
        assign(Stage::Sentences, self.config.sentence_threshold, units_a, units_b, |a, b| {
            let texts_a: Vec<&str> = a.iter().map(|s| s.text.as_str()).collect();
            let texts_b: Vec<&str> = b.iter().map(|s| s.text.as_str()).collect();
            self.text.similarity_matrix(&texts_a, &texts_b)
        })
    }

    fn match_figures(
        &self,
        units_a: Vec<FigureUnit>,
        units_b: Vec<FigureUnit>,
    ) -> CompareResult<MatchResult<FigureUnit>> {
        assign(Stage::Figures, self.config.figure_threshold, units_a, units_b, |a, b| {
            let images_a: Vec<&ImageData> = a.iter().map(|f| &f.image).collect();
            let images_b: Vec<&ImageData> = b.iter().map(|f| &f.image).collect();
            self.image.similarity_matrix(&images_a, &images_b)
        })
    }

    /// Tables are scored on their flattened content.
    fn match_tables(
        &self,
        units_a: Vec<TableUnit>,
        units_b: Vec<TableUnit>,
    ) -> CompareResult<MatchResult<TableUnit>> {
        assign(Stage::Tables, self.config.table_threshold, units_a, units_b, |a, b| {
            let flat_a: Vec<String> = a.iter().map(|t| t.data.flatten()).collect();
            let flat_b: Vec<String> = b.iter().map(|t| t.data.flatten()).collect();
            let texts_a: Vec<&str> = flat_a.iter().map(String::as_str).collect();
            let texts_b: Vec<&str> = flat_b.iter().map(String::as_str).collect();
            self.text.similarity_matrix(&texts_a, &texts_b)
        })
    }

    fn refine_tables(
        &self,
        a: &ExtractedDocument,
        b: &ExtractedDocument,
        tables: &MatchResult<TableUnit>,
        warnings: &mut Vec<CompareWarning>,
    ) -> Vec<TablePairDiff> {
        let mut diffs = Vec::new();
        for (table_a, table_b) in &tables.pairs {
            match compare_cells(&table_a.data, &table_b.data) {
                Ok(cells) if cells.is_empty() => {}
                Ok(cells) => diffs.push(TablePairDiff {
                    file_ref_a: table_a.file_ref.clone(),
                    file_ref_b: table_b.file_ref.clone(),
                    cells,
                }),
                Err(reason) => {
                    let (document, file_ref) = if table_a.data.check_shape().is_err() {
                        (&a.id, &table_a.file_ref)
                    } else {
                        (&b.id, &table_b.file_ref)
                    };
                    tracing::debug!(%document, %file_ref, %reason, "skipping cell comparison");
                    warnings.push(CompareWarning::MalformedAttachment {
                        document: document.clone(),
                        file_ref: file_ref.clone(),
                        reason,
                    });
                }
            }
        }
        diffs
    }
}

/// Score, solve and post-filter one unit kind.
///
/// The oracle is not consulted when either side is empty.
fn assign<U, F>(
    stage: Stage,
    threshold: f64,
    units_a: Vec<U>,
    units_b: Vec<U>,
    score: F,
) -> CompareResult<MatchResult<U>>
where
    F: FnOnce(&[U], &[U]) -> SimilarityMatrix,
{
    if units_a.is_empty() || units_b.is_empty() {
        tracing::debug!(%stage, a = units_a.len(), b = units_b.len(), "nothing to match");
        return Ok(MatchResult::all_unmatched(units_a, units_b));
    }

    let matrix = score(&units_a, &units_b);
    let assignment = matrix
        .check_shape(units_a.len(), units_b.len())
        .and_then(|()| OptimalMatcher::new(threshold).match_matrix(&matrix))
        .map_err(|source| CompareError::Assignment { stage, source })?;

    tracing::debug!(
        %stage,
        pairs = assignment.pairs.len(),
        unmatched_a = assignment.unmatched_a.len(),
        unmatched_b = assignment.unmatched_b.len(),
        "matched"
    );
    Ok(assignment.apply(units_a, units_b))
}

fn sentence_diffs(sentences: &MatchResult<SentenceUnit>) -> Vec<SentencePairDiff> {
    sentences
        .pairs
        .iter()
        .enumerate()
        .filter(|(_, (a, b))| a.text != b.text)
        .map(|(pair, (a, b))| SentencePairDiff {
            pair,
            diff: TokenAligner::align_text(&a.text, &b.text),
        })
        .filter(|d| d.diff.has_changes())
        .collect()
}

/// Annotate the elements unmatched sentences came from, each element once.
fn annotate_sentences(
    accumulator: &mut AnnotationAccumulator<'_>,
    located: &[LocatedElement<'_>],
    unmatched: &[SentenceUnit],
    category: Category,
) {
    if unmatched.is_empty() {
        return;
    }
    let sources: BTreeSet<usize> = unmatched.iter().map(|s| s.element).collect();
    let elements: Vec<LocatedElement<'_>> = located
        .iter()
        .filter(|l| sources.contains(&l.index))
        .copied()
        .collect();
    let texts = unmatched.iter().map(|s| s.text.clone()).collect();
    accumulator.accumulate(&elements, &[HitSet::new(category, Hit::Text(texts))]);
}

fn annotate(
    accumulator: &mut AnnotationAccumulator<'_>,
    located: &[LocatedElement<'_>],
    category: Category,
    hit: Hit,
) {
    let empty = match &hit {
        Hit::Text(v) | Hit::Figures(v) | Hit::Attachments(v) => v.is_empty(),
        Hit::Cells(cells) => cells.is_empty(),
    };
    if !empty {
        accumulator.accumulate(located, &[HitSet::new(category, hit)]);
    }
}

/// Elements under the same table path as the element carrying `file_ref`.
///
/// When no table element carries the attachment, every element is in scope.
fn table_elements<'d>(located: &[LocatedElement<'d>], file_ref: &str) -> Vec<LocatedElement<'d>> {
    let roots: BTreeSet<&[String]> = located
        .iter()
        .filter(|l| l.element.references(file_ref))
        .filter_map(|l| l.element.table_path())
        .collect();
    if roots.is_empty() {
        tracing::debug!(%file_ref, "no table element carries attachment");
        return located.to_vec();
    }
    located
        .iter()
        .filter(|l| l.element.table_path().map_or(false, |p| roots.contains(p)))
        .copied()
        .collect()
}

fn file_refs<'u>(refs: impl Iterator<Item = &'u String>) -> Vec<String> {
    refs.cloned().collect()
}
