//! Segmentation of an extracted document into comparable units.
//!
//! Each document is split into three disjoint unit sets:
//!
//! - sentences, from the text of non-table elements
//! - tables, one per distinct spreadsheet-like attachment of a table element
//! - figures, one per distinct image attachment of a figure element
//!
//! Table-cell elements get their [`CellLocator`] resolved here, once, so later
//! passes never re-read the raw path.

use std::collections::HashSet;

use regex::Regex;
use serde::Serialize;

use crate::collaborators::{AttachmentLoader, ImageData};
use crate::config::CompareConfig;
use crate::element::{CellLocator, Element, ExtractedDocument, PathIndices};
use crate::errors::CompareWarning;
use crate::table::TableData;

/// A sentence and the element it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentenceUnit {
    pub text: String,
    /// Index into the document's element list.
    pub element: usize,
}

/// A table attachment with its loaded content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableUnit {
    pub file_ref: String,
    pub data: TableData,
}

/// A figure attachment with its loaded pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FigureUnit {
    pub file_ref: String,
    #[serde(skip)]
    pub image: ImageData,
}

/// An element plus the structural locator resolved for it.
#[derive(Debug, Clone, Copy)]
pub struct LocatedElement<'d> {
    pub index: usize,
    pub element: &'d Element,
    /// Set for table elements whose path names both a row and a cell.
    pub cell: Option<CellLocator>,
}

/// Units and located elements of one document.
#[derive(Debug)]
pub struct SegmentedDocument<'d> {
    pub document: &'d ExtractedDocument,
    pub sentences: Vec<SentenceUnit>,
    pub tables: Vec<TableUnit>,
    pub figures: Vec<FigureUnit>,
    pub located: Vec<LocatedElement<'d>>,
}

impl<'d> SegmentedDocument<'d> {
    /// True when no unit of any kind was found.
    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty() && self.tables.is_empty() && self.figures.is_empty()
    }
}

/// Splits running text into sentences.
///
/// Breaks on runs of newlines, and on a period followed by whitespace and an
/// uppercase ASCII letter unless the period follows a digit, so "3.14" and
/// "Version 2. The" stay whole.
#[derive(Debug, Clone)]
pub struct SentenceSplitter {
    boundary: Regex,
}

impl SentenceSplitter {
    pub fn new() -> Self {
        let boundary = Regex::new(r"\n+|\.\s+[A-Z]").expect("Invalid sentence boundary regex");
        Self { boundary }
    }

    /// Trimmed, non-empty sentences of `text`.
    pub fn split<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let mut pieces = Vec::new();
        let mut piece_start = 0;
        let mut pos = 0;

        while let Some(m) = self.boundary.find_at(text, pos) {
            if m.as_str().starts_with('\n') {
                pieces.push(&text[piece_start..m.start()]);
                piece_start = m.end();
                pos = m.end();
                continue;
            }

            // Only the period separates; the capital starts the next sentence.
            pos = m.start() + 1;
            let follows_non_digit = text[..m.start()]
                .chars()
                .next_back()
                .map_or(false, |c| !c.is_ascii_digit());
            if follows_non_digit {
                pieces.push(&text[piece_start..m.start()]);
                piece_start = pos;
            }
        }
        pieces.push(&text[piece_start..]);

        pieces
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl Default for SentenceSplitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns extracted documents into [`SegmentedDocument`]s.
pub struct Segmenter<'a> {
    config: &'a CompareConfig,
    attachments: &'a dyn AttachmentLoader,
    splitter: SentenceSplitter,
}

impl<'a> Segmenter<'a> {
    pub fn new(config: &'a CompareConfig, attachments: &'a dyn AttachmentLoader) -> Self {
        Self {
            config,
            attachments,
            splitter: SentenceSplitter::new(),
        }
    }

    pub fn segment<'d>(
        &self,
        document: &'d ExtractedDocument,
        warnings: &mut Vec<CompareWarning>,
    ) -> SegmentedDocument<'d> {
        let located = self.locate(document, warnings);
        let sentences = self.sentences(document);
        let tables = self.tables(document, warnings);
        let figures = self.figures(document, warnings);

        tracing::debug!(
            document = %document.id,
            sentences = sentences.len(),
            tables = tables.len(),
            figures = figures.len(),
            "segmented document"
        );

        SegmentedDocument {
            document,
            sentences,
            tables,
            figures,
            located,
        }
    }

    fn locate<'d>(
        &self,
        document: &'d ExtractedDocument,
        warnings: &mut Vec<CompareWarning>,
    ) -> Vec<LocatedElement<'d>> {
        document
            .elements
            .iter()
            .enumerate()
            .map(|(index, element)| {
                let cell = if element.is_table() {
                    PathIndices::resolve(&element.path).locator()
                } else {
                    None
                };
                if element.is_table() && cell.is_none() && element.trimmed_text().is_some() {
                    tracing::debug!(document = %document.id, element = index, "no cell index in path");
                    warnings.push(CompareWarning::UnresolvableCellIndex {
                        document: document.id.clone(),
                        element: index,
                    });
                }
                LocatedElement {
                    index,
                    element,
                    cell,
                }
            })
            .collect()
    }

    fn sentences(&self, document: &ExtractedDocument) -> Vec<SentenceUnit> {
        let mut sentences = Vec::new();
        for (index, element) in document.elements.iter().enumerate() {
            if element.is_table() {
                continue;
            }
            if let Some(text) = element.trimmed_text() {
                sentences.extend(self.splitter.split(text).into_iter().map(|s| SentenceUnit {
                    text: s.to_string(),
                    element: index,
                }));
            }
        }
        sentences
    }

    fn tables(
        &self,
        document: &ExtractedDocument,
        warnings: &mut Vec<CompareWarning>,
    ) -> Vec<TableUnit> {
        attachment_refs(document, Element::is_table, &self.config.table_extensions)
            .into_iter()
            .filter_map(|file_ref| {
                match self.attachments.load_table(&document.id, &file_ref) {
                    Ok(data) => Some(TableUnit { file_ref, data }),
                    Err(err) => {
                        tracing::debug!(document = %document.id, %file_ref, %err, "skipping table");
                        warnings.push(CompareWarning::MalformedAttachment {
                            document: document.id.clone(),
                            file_ref,
                            reason: err.to_string(),
                        });
                        None
                    }
                }
            })
            .collect()
    }

    fn figures(
        &self,
        document: &ExtractedDocument,
        warnings: &mut Vec<CompareWarning>,
    ) -> Vec<FigureUnit> {
        attachment_refs(document, Element::is_figure, &self.config.figure_extensions)
            .into_iter()
            .filter_map(|file_ref| {
                match self.attachments.load_image(&document.id, &file_ref) {
                    Ok(image) => Some(FigureUnit { file_ref, image }),
                    Err(err) => {
                        tracing::debug!(document = %document.id, %file_ref, %err, "skipping figure");
                        warnings.push(CompareWarning::MalformedAttachment {
                            document: document.id.clone(),
                            file_ref,
                            reason: err.to_string(),
                        });
                        None
                    }
                }
            })
            .collect()
    }
}

/// Distinct attachment references with one of `extensions`, taken from the
/// elements `owner` accepts, in first-seen order.
///
/// Table elements also carry image renditions of themselves; those never
/// become figures.
fn attachment_refs(
    document: &ExtractedDocument,
    owner: fn(&Element) -> bool,
    extensions: &[String],
) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut refs = Vec::new();
    let owned = document.elements.iter().filter(|el| owner(el));
    for file_ref in owned.flat_map(|el| &el.attached_file_refs) {
        if has_extension(file_ref, extensions) && seen.insert(file_ref) {
            refs.push(file_ref.clone());
        }
    }
    refs
}

fn has_extension(file_ref: &str, extensions: &[String]) -> bool {
    let lower = file_ref.to_ascii_lowercase();
    extensions
        .iter()
        .any(|ext| lower.ends_with(&ext.to_ascii_lowercase()))
}
