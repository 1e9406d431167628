//! Extracted document elements and their structural locators.

use std::collections::{BTreeMap, BTreeSet};

use layered_docdiff::BoundingBox;
use serde::{Deserialize, Serialize};

/// Path segment marking table membership.
pub const TABLE_SEGMENT: &str = "Table";
/// Path segment marking figure membership.
pub const FIGURE_SEGMENT: &str = "Figure";
/// Path segment preceding a row index.
pub const ROW_SEGMENT: &str = "Row";
/// Path segment preceding a cell (column) index.
pub const CELL_SEGMENT: &str = "Cell";

/// One unit produced by structural extraction.
///
/// Immutable once extracted; the orchestrator only borrows it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(default)]
    pub text: Option<String>,
    /// Role/index tokens, e.g. `["Table", "Row", "2", "Cell", "3"]`.
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub bounds: Option<BoundingBox>,
    /// Rendered attachments (figure images, table spreadsheets).
    #[serde(default)]
    pub attached_file_refs: BTreeSet<String>,
}

impl Element {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn at_path(mut self, segments: &[&str]) -> Self {
        self.path = segments.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn placed(mut self, page: u32, bounds: BoundingBox) -> Self {
        self.page = Some(page);
        self.bounds = Some(bounds);
        self
    }

    pub fn attach(mut self, file_ref: impl Into<String>) -> Self {
        self.attached_file_refs.insert(file_ref.into());
        self
    }

    pub fn is_table(&self) -> bool {
        self.has_segment(TABLE_SEGMENT)
    }

    pub fn is_figure(&self) -> bool {
        self.has_segment(FIGURE_SEGMENT)
    }

    /// Path up to the table segment, plus the table index when one follows.
    ///
    /// `["Document", "Table", "2", "Row", "0"]` gives `["Document", "Table", "2"]`.
    pub fn table_path(&self) -> Option<&[String]> {
        let at = self.path.iter().position(|s| s == TABLE_SEGMENT)?;
        let indexed = self
            .path
            .get(at + 1)
            .map_or(false, |s| s.parse::<usize>().is_ok());
        let end = if indexed { at + 2 } else { at + 1 };
        Some(&self.path[..end])
    }

    fn has_segment(&self, segment: &str) -> bool {
        self.path.iter().any(|s| s == segment)
    }

    /// Trimmed text, or `None` when absent or blank.
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// True when one of the attachments has the same file name as `file_ref`.
    pub fn references(&self, file_ref: &str) -> bool {
        let wanted = file_name(file_ref);
        self.attached_file_refs
            .iter()
            .any(|r| file_name(r) == wanted)
    }
}

/// Final path component of a `/` or `\` separated reference.
pub fn file_name(file_ref: &str) -> &str {
    file_ref
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_ref)
}

/// Row and column indices read out of an element path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathIndices {
    pub row: Option<usize>,
    pub column: Option<usize>,
}

impl PathIndices {
    /// Scan `path` for `Row <n>` and `Cell <n>` pairs.
    ///
    /// A role tag followed by a non-integer is ignored. When a tag repeats, the
    /// last parsable index wins.
    pub fn resolve<S: AsRef<str>>(path: &[S]) -> Self {
        let mut indices = Self::default();
        for pair in path.windows(2) {
            let index = match pair[1].as_ref().parse::<usize>() {
                Ok(index) => index,
                Err(_) => continue,
            };
            match pair[0].as_ref() {
                ROW_SEGMENT => indices.row = Some(index),
                CELL_SEGMENT => indices.column = Some(index),
                _ => {}
            }
        }
        indices
    }

    pub fn locator(self) -> Option<CellLocator> {
        Some(CellLocator {
            row: self.row?,
            column: self.column?,
        })
    }
}

/// Position of a table cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellLocator {
    pub row: usize,
    pub column: usize,
}

impl CellLocator {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

/// Output of the extraction collaborator for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    /// Identity used for attachment lookups and host-side caching.
    pub id: String,
    pub elements: Vec<Element>,
    pub page_count: u32,
    #[serde(default)]
    pub page_heights: BTreeMap<u32, f64>,
}

impl ExtractedDocument {
    pub fn new(id: impl Into<String>, elements: Vec<Element>) -> Self {
        Self {
            id: id.into(),
            elements,
            ..Default::default()
        }
    }

    /// Register `count` pages sharing one height.
    pub fn with_uniform_pages(mut self, count: u32, height: f64) -> Self {
        self.page_count = count;
        self.page_heights = (0..count).map(|p| (p, height)).collect();
        self
    }

    /// Height of `page`, if the page exists.
    pub fn page_height(&self, page: u32) -> Option<f64> {
        if page >= self.page_count {
            return None;
        }
        self.page_heights.get(&page).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_row_and_cell() {
        let path = ["Document", "Table", "Row", "2", "Cell", "3", "P"];
        let indices = PathIndices::resolve(&path);

        assert_eq!(indices.row, Some(2));
        assert_eq!(indices.column, Some(3));
        assert_eq!(indices.locator(), Some(CellLocator::new(2, 3)));
    }

    #[test]
    fn test_table_path() {
        let indexed = Element::default().at_path(&["Document", "Table", "2", "Row", "0", "Cell", "1"]);
        assert_eq!(indexed.table_path(), Some(&["Document", "Table", "2"].map(String::from)[..]));

        let bare = Element::default().at_path(&["Document", "Table", "Row", "0"]);
        assert_eq!(bare.table_path(), Some(&["Document", "Table"].map(String::from)[..]));

        assert_eq!(Element::default().at_path(&["Document", "P"]).table_path(), None);
    }

    #[test]
    fn test_missing_row_has_no_locator() {
        let indices = PathIndices::resolve(&["Table", "Cell", "3"]);
        assert_eq!(indices.row, None);
        assert_eq!(indices.locator(), None);
    }

    #[test]
    fn test_non_integer_index_is_ignored() {
        let indices = PathIndices::resolve(&["Table", "Row", "x", "Row", "4", "Cell", "1", "Cell", "?"]);
        assert_eq!(indices.locator(), Some(CellLocator::new(4, 1)));
    }

    #[test]
    fn test_references_compare_file_names() {
        let el = Element::with_text("chart").attach("figures/fileoutpart3.png");
        assert!(el.references("fileoutpart3.png"));
        assert!(el.references("/tmp/run/figures/fileoutpart3.png"));
        assert!(!el.references("fileoutpart30.png"));
    }

    #[test]
    fn test_trimmed_text() {
        assert_eq!(Element::with_text("  hi \n").trimmed_text(), Some("hi"));
        assert_eq!(Element::with_text(" \n ").trimmed_text(), None);
        assert_eq!(Element::default().trimmed_text(), None);
    }

    #[test]
    fn test_page_height_requires_known_page() {
        let doc = ExtractedDocument::new("a", vec![]).with_uniform_pages(2, 792.0);
        assert_eq!(doc.page_height(1), Some(792.0));
        assert_eq!(doc.page_height(2), None);
    }

    #[test]
    fn test_deserializes_sparse_element() {
        let el: Element = serde_json::from_str(
            r#"{"text": "Revenue", "page": 0, "bounds": [1, 2, 3, 4], "path": ["Table"]}"#,
        )
        .unwrap();
        assert!(el.is_table());
        assert_eq!(el.bounds, Some(BoundingBox::new(1.0, 2.0, 3.0, 4.0)));
        assert!(el.attached_file_refs.is_empty());
    }
}
