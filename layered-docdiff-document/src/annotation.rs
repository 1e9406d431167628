//! Page annotations built from matched and unmatched units.
//!
//! An [`AnnotationAccumulator`] owns one document's annotation list. Each call
//! to [`AnnotationAccumulator::accumulate`] is one annotation pass: it scans
//! the given elements, selects those hit by each [`HitSet`], and appends one
//! [`Annotation`] per selected, placeable element. Passes only ever append, so
//! repeating a pass repeats its annotations.

use std::collections::BTreeSet;

use layered_docdiff::{Rectangle, RegionMapper};
use serde::{Deserialize, Serialize};

use crate::element::CellLocator;
use crate::element::ExtractedDocument;
use crate::errors::CompareWarning;
use crate::segment::LocatedElement;

/// What an annotation marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Text only in the first document.
    Delete,
    /// Text only in the second document.
    Insert,
    FigureUnmatchedA,
    FigureUnmatchedB,
    TableUnmatchedA,
    TableUnmatchedB,
    /// A cell of a matched table whose content changed.
    CellModified,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Delete,
        Category::Insert,
        Category::FigureUnmatchedA,
        Category::FigureUnmatchedB,
        Category::TableUnmatchedA,
        Category::TableUnmatchedB,
        Category::CellModified,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Delete => "delete",
            Category::Insert => "insert",
            Category::FigureUnmatchedA => "figure_unmatched_a",
            Category::FigureUnmatchedB => "figure_unmatched_b",
            Category::TableUnmatchedA => "table_unmatched_a",
            Category::TableUnmatchedB => "table_unmatched_b",
            Category::CellModified => "cell_modified",
        }
    }
}

/// Rendering hints for one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnotationStyle {
    /// RGB, each channel in [0, 1].
    pub color: [f32; 3],
    pub stroke_width: f32,
}

impl AnnotationStyle {
    pub const fn new(color: [f32; 3], stroke_width: f32) -> Self {
        Self {
            color,
            stroke_width,
        }
    }
}

/// Caller-supplied style per category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationStyles {
    pub delete: AnnotationStyle,
    pub insert: AnnotationStyle,
    pub figure_unmatched_a: AnnotationStyle,
    pub figure_unmatched_b: AnnotationStyle,
    pub table_unmatched_a: AnnotationStyle,
    pub table_unmatched_b: AnnotationStyle,
    pub cell_modified: AnnotationStyle,
}

impl Default for AnnotationStyles {
    fn default() -> Self {
        Self {
            delete: AnnotationStyle::new([1.0, 0.0, 0.0], 1.5),
            insert: AnnotationStyle::new([0.0, 1.0, 0.0], 1.5),
            figure_unmatched_a: AnnotationStyle::new([0.0, 0.0, 1.0], 2.0),
            figure_unmatched_b: AnnotationStyle::new([1.0, 1.0, 0.0], 2.0),
            table_unmatched_a: AnnotationStyle::new([0.0, 0.0, 0.0], 1.5),
            table_unmatched_b: AnnotationStyle::new([0.6, 0.3, 0.1], 1.5),
            cell_modified: AnnotationStyle::new([0.4, 0.2, 0.1], 1.5),
        }
    }
}

impl AnnotationStyles {
    pub fn get(&self, category: Category) -> AnnotationStyle {
        match category {
            Category::Delete => self.delete,
            Category::Insert => self.insert,
            Category::FigureUnmatchedA => self.figure_unmatched_a,
            Category::FigureUnmatchedB => self.figure_unmatched_b,
            Category::TableUnmatchedA => self.table_unmatched_a,
            Category::TableUnmatchedB => self.table_unmatched_b,
            Category::CellModified => self.cell_modified,
        }
    }
}

/// One highlight rectangle on one page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub page: u32,
    pub rect: Rectangle,
    pub category: Category,
    pub color: [f32; 3],
    pub stroke_width: f32,
}

/// Which elements a pass selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hit {
    /// Elements whose text contains at least one of these strings.
    Text(Vec<String>),
    /// Figure elements attached to one of these file references.
    Figures(Vec<String>),
    /// Any element attached to one of these file references.
    Attachments(Vec<String>),
    /// Table elements with text, located at one of these cells.
    Cells(BTreeSet<CellLocator>),
}

/// A hit predicate and the category its selections are annotated with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitSet {
    pub category: Category,
    pub hit: Hit,
}

impl HitSet {
    pub fn new(category: Category, hit: Hit) -> Self {
        Self { category, hit }
    }

    fn selects(&self, located: &LocatedElement<'_>) -> bool {
        let element = located.element;
        match &self.hit {
            Hit::Text(needles) => element.text.as_deref().map_or(false, |text| {
                needles
                    .iter()
                    .any(|n| !n.is_empty() && text.contains(n.as_str()))
            }),
            Hit::Figures(refs) => element.is_figure() && refs.iter().any(|r| element.references(r)),
            Hit::Attachments(refs) => refs.iter().any(|r| element.references(r)),
            Hit::Cells(cells) => {
                element.is_table()
                    && element.trimmed_text().is_some()
                    && located.cell.map_or(false, |c| cells.contains(&c))
            }
        }
    }
}

/// Append-only annotation list for one document.
pub struct AnnotationAccumulator<'a> {
    document: &'a ExtractedDocument,
    styles: &'a AnnotationStyles,
    annotations: Vec<Annotation>,
    warnings: Vec<CompareWarning>,
}

impl<'a> AnnotationAccumulator<'a> {
    pub fn new(document: &'a ExtractedDocument, styles: &'a AnnotationStyles) -> Self {
        Self {
            document,
            styles,
            annotations: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Run one pass per hit set over `elements`, returning how many
    /// annotations were appended.
    ///
    /// Within a hit set each element is annotated at most once. Selected
    /// elements without bounds or a known page are skipped with a warning.
    pub fn accumulate(&mut self, elements: &[LocatedElement<'_>], hits: &[HitSet]) -> usize {
        let before = self.annotations.len();
        for hit in hits {
            for located in elements.iter().filter(|l| hit.selects(l)) {
                if let Some(annotation) = self.place(located, hit.category) {
                    self.annotations.push(annotation);
                }
            }
        }
        let added = self.annotations.len() - before;
        tracing::debug!(document = %self.document.id, added, "annotation pass");
        added
    }

    fn place(&mut self, located: &LocatedElement<'_>, category: Category) -> Option<Annotation> {
        let document = &self.document.id;
        let element = located.element;

        let bounds = match element.bounds {
            Some(bounds) if bounds.is_finite() => bounds,
            Some(_) => {
                self.warnings.push(CompareWarning::NonFiniteBounds {
                    document: document.clone(),
                    element: located.index,
                });
                return None;
            }
            None => {
                self.warnings.push(CompareWarning::MissingBounds {
                    document: document.clone(),
                    element: located.index,
                });
                return None;
            }
        };

        let placed = element
            .page
            .and_then(|page| Some((page, self.document.page_height(page)?)));
        let (page, page_height) = match placed {
            Some(placed) => placed,
            None => {
                self.warnings.push(CompareWarning::MissingPage {
                    document: document.clone(),
                    element: located.index,
                    page: element.page,
                });
                return None;
            }
        };

        let style = self.styles.get(category);
        Some(Annotation {
            page,
            rect: RegionMapper::to_page_rect(&bounds, page_height),
            category,
            color: style.color,
            stroke_width: style.stroke_width,
        })
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn warnings(&self) -> &[CompareWarning] {
        &self.warnings
    }

    pub fn into_parts(self) -> (Vec<Annotation>, Vec<CompareWarning>) {
        (self.annotations, self.warnings)
    }
}
