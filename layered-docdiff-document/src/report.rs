//! Plain-text summary of a [`ComparisonResult`].

use std::fmt;

use layered_docdiff::{SpanKind, TokenDiff};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::orchestrator::ComparisonResult;

/// Counts per unit kind plus one line per difference.
///
/// ```text
/// sentences: 1 matched, 0 only in A, 1 only in B, 0 changed
///   B  It rained today.
/// figures: 0 matched, 0 only in A, 0 only in B
/// tables: 0 matched, 0 only in A, 0 only in B, 0 changed cells
/// annotations: 0 in A, 1 in B
/// warnings: 0
/// ```
pub struct ComparisonSummary<'r> {
    result: &'r ComparisonResult,
    excerpt_width: usize,
}

impl<'r> ComparisonSummary<'r> {
    pub const DEFAULT_EXCERPT_WIDTH: usize = 60;

    pub fn new(result: &'r ComparisonResult) -> Self {
        Self {
            result,
            excerpt_width: Self::DEFAULT_EXCERPT_WIDTH,
        }
    }

    /// Maximum display width of quoted text, in terminal columns.
    pub fn excerpt_width(mut self, width: usize) -> Self {
        self.excerpt_width = width;
        self
    }

    fn excerpt(&self, text: &str) -> String {
        excerpt(text, self.excerpt_width)
    }
}

/// Collapse whitespace and cut `text` to at most `width` columns, marking a
/// cut with an ellipsis.
pub fn excerpt(text: &str, width: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if UnicodeWidthStr::width(collapsed.as_str()) <= width {
        return collapsed;
    }
    if width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for c in collapsed.chars() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > width - 1 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

/// Changed spans as `-deleted +inserted`, kept tokens omitted.
fn render_changes(diff: &TokenDiff) -> String {
    let mut out = String::new();
    for span in diff.changes() {
        let sign = match span.kind {
            SpanKind::Deleted => '-',
            SpanKind::Inserted => '+',
            SpanKind::Kept => continue,
        };
        if !out.is_empty() {
            out.push(' ');
        }
        out.push(sign);
        out.push_str(&span.tokens.join(" "));
    }
    out
}

impl<'r> fmt::Display for ComparisonSummary<'r> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.result;

        write!(
            f,
            "sentences: {} matched, {} only in A, {} only in B, {} changed",
            r.sentences.pairs.len(),
            r.sentences.unmatched_a.len(),
            r.sentences.unmatched_b.len(),
            r.sentence_diffs.len()
        )?;
        for sentence in &r.sentences.unmatched_a {
            write!(f, "\n  A  {}", self.excerpt(&sentence.text))?;
        }
        for sentence in &r.sentences.unmatched_b {
            write!(f, "\n  B  {}", self.excerpt(&sentence.text))?;
        }
        for changed in &r.sentence_diffs {
            if let Some((a, _)) = r.sentences.pairs.get(changed.pair) {
                write!(
                    f,
                    "\n  ~  {}: {}",
                    self.excerpt(&a.text),
                    render_changes(&changed.diff)
                )?;
            }
        }

        write!(
            f,
            "\nfigures: {} matched, {} only in A, {} only in B",
            r.figures.pairs.len(),
            r.figures.unmatched_a.len(),
            r.figures.unmatched_b.len()
        )?;
        for figure in &r.figures.unmatched_a {
            write!(f, "\n  A  {}", figure.file_ref)?;
        }
        for figure in &r.figures.unmatched_b {
            write!(f, "\n  B  {}", figure.file_ref)?;
        }

        write!(
            f,
            "\ntables: {} matched, {} only in A, {} only in B, {} changed cells",
            r.tables.pairs.len(),
            r.tables.unmatched_a.len(),
            r.tables.unmatched_b.len(),
            r.changed_cells()
        )?;
        for table in &r.tables.unmatched_a {
            write!(f, "\n  A  {}", table.file_ref)?;
        }
        for table in &r.tables.unmatched_b {
            write!(f, "\n  B  {}", table.file_ref)?;
        }
        for table in &r.table_diffs {
            for cell in &table.cells {
                write!(
                    f,
                    "\n  ~  {} row {} {}: {}",
                    table.file_ref_a,
                    cell.row,
                    cell.column_name,
                    render_changes(&cell.diff)
                )?;
            }
        }

        write!(
            f,
            "\nannotations: {} in A, {} in B",
            r.annotations_a.len(),
            r.annotations_b.len()
        )?;

        write!(f, "\nwarnings: {}", r.warnings.len())?;
        for warning in &r.warnings {
            write!(f, "\n  !  {}", warning)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use layered_docdiff::{MatchResult, TokenAligner};

    use super::*;
    use crate::errors::CompareWarning;
    use crate::orchestrator::{SentencePairDiff, TablePairDiff};
    use crate::segment::{SentenceUnit, TableUnit};
    use crate::table::{compare_cells, TableData};

    fn sentence(text: &str) -> SentenceUnit {
        SentenceUnit {
            text: text.to_string(),
            element: 0,
        }
    }

    fn empty_result() -> ComparisonResult {
        ComparisonResult {
            sentences: MatchResult::all_unmatched(vec![], vec![]),
            sentence_diffs: vec![],
            figures: MatchResult::all_unmatched(vec![], vec![]),
            tables: MatchResult::all_unmatched(vec![], vec![]),
            table_diffs: vec![],
            annotations_a: vec![],
            annotations_b: vec![],
            warnings: vec![],
        }
    }

    #[test]
    fn test_excerpt_respects_display_width() {
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("a  b\nc", 10), "a b c");
        assert_eq!(excerpt("abcdefgh", 5), "abcd…");
        // Wide characters take two columns each.
        assert_eq!(excerpt("日本語テキスト", 6), "日本…");
        assert_eq!(excerpt("abc", 0), "");
    }

    #[test]
    fn test_summary_of_identical_documents() {
        let summary = ComparisonSummary::new(&empty_result()).to_string();
        insta::assert_snapshot!(summary, @r###"
        sentences: 0 matched, 0 only in A, 0 only in B, 0 changed
        figures: 0 matched, 0 only in A, 0 only in B
        tables: 0 matched, 0 only in A, 0 only in B, 0 changed cells
        annotations: 0 in A, 0 in B
        warnings: 0
        "###);
    }

    #[test]
    fn test_summary_lists_differences() {
        let a = TableData::new(["Quarter", "Revenue"], vec![vec!["Q2", "1.5 M"]]);
        let b = TableData::new(["Quarter", "Revenue"], vec![vec!["Q2", "1.7 M"]]);
        let cells = compare_cells(&a, &b).unwrap();

        let mut result = empty_result();
        result.sentences = MatchResult {
            pairs: vec![(
                sentence("The cat sat on the mat"),
                sentence("The dog sat on the mat"),
            )],
            unmatched_a: vec![],
            unmatched_b: vec![sentence("It rained today and the streets were wet for hours.")],
        };
        result.sentence_diffs = vec![SentencePairDiff {
            pair: 0,
            diff: TokenAligner::align_text("The cat sat on the mat", "The dog sat on the mat"),
        }];
        result.tables = MatchResult {
            pairs: vec![(
                TableUnit {
                    file_ref: "tables/t1.xlsx".into(),
                    data: a,
                },
                TableUnit {
                    file_ref: "tables/t1.xlsx".into(),
                    data: b,
                },
            )],
            unmatched_a: vec![],
            unmatched_b: vec![],
        };
        result.table_diffs = vec![TablePairDiff {
            file_ref_a: "tables/t1.xlsx".into(),
            file_ref_b: "tables/t1.xlsx".into(),
            cells,
        }];
        result.warnings = vec![CompareWarning::MissingBounds {
            document: "b.pdf".into(),
            element: 4,
        }];

        let summary = ComparisonSummary::new(&result).excerpt_width(30).to_string();
        insta::assert_snapshot!(summary, @r###"
        sentences: 1 matched, 0 only in A, 1 only in B, 1 changed
          B  It rained today and the stree…
          ~  The cat sat on the mat: -cat +dog
        figures: 0 matched, 0 only in A, 0 only in B
        tables: 1 matched, 0 only in A, 0 only in B, 1 changed cells
          ~  tables/t1.xlsx row 0 Revenue: -1.5 +1.7
        annotations: 0 in A, 0 in B
        warnings: 1
          !  b.pdf: element 4 has no bounds
        "###);
    }
}
