//! Token-level comparison between two short token sequences.
//!
//! The aligner walks both sequences with a pair of cursors and, on a mismatch,
//! looks ahead in the revised sequence for the next occurrence of the current
//! original token. It resynchronizes on the *next* match rather than searching
//! for a globally minimal edit script, so results are easy to explain but are
//! not guaranteed to be minimal. It is meant for sentences and table cells,
//! not whole documents.
//!
//! # Example
//!
//! ```
//! use layered_docdiff::{SpanKind, TokenAligner};
//!
//! let diff = TokenAligner::align(&["the", "cat", "sat"], &["the", "dog", "sat"]);
//! let changes: Vec<_> = diff.changes().map(|s| (s.kind, s.position)).collect();
//! assert_eq!(changes, vec![(SpanKind::Deleted, 1), (SpanKind::Inserted, 1)]);
//! ```

use serde::{Deserialize, Serialize};

/// How a span of tokens relates the two sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// Present in both sequences.
    Kept,
    /// Present only in the revised sequence.
    Inserted,
    /// Present only in the original sequence.
    Deleted,
}

/// A run of tokens sharing one [`SpanKind`].
///
/// `position` indexes the original sequence for `Kept` and `Deleted` spans and
/// the revised sequence for `Inserted` spans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpan {
    pub kind: SpanKind,
    pub position: usize,
    pub tokens: Vec<String>,
}

impl TokenSpan {
    fn new(kind: SpanKind, position: usize, tokens: Vec<String>) -> Self {
        Self {
            kind,
            position,
            tokens,
        }
    }
}

/// Token counts per span kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanStats {
    pub kept: usize,
    pub inserted: usize,
    pub deleted: usize,
}

/// Queryable result of aligning two token sequences.
///
/// Spans are stored in emission order. Filtering out the inserted spans yields
/// the original sequence in order; filtering out the deleted spans yields the
/// revised sequence in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDiff {
    pub spans: Vec<TokenSpan>,
}

impl TokenDiff {
    /// Iterate over spans that are not `Kept`.
    pub fn changes(&self) -> impl Iterator<Item = &TokenSpan> {
        self.spans.iter().filter(|s| s.kind != SpanKind::Kept)
    }

    /// Iterate over `Inserted` spans.
    pub fn inserted(&self) -> impl Iterator<Item = &TokenSpan> {
        self.of_kind(SpanKind::Inserted)
    }

    /// Iterate over `Deleted` spans.
    pub fn deleted(&self) -> impl Iterator<Item = &TokenSpan> {
        self.of_kind(SpanKind::Deleted)
    }

    /// Iterate over `Kept` spans.
    pub fn kept(&self) -> impl Iterator<Item = &TokenSpan> {
        self.of_kind(SpanKind::Kept)
    }

    fn of_kind(&self, kind: SpanKind) -> impl Iterator<Item = &TokenSpan> {
        self.spans.iter().filter(move |s| s.kind == kind)
    }

    /// True when at least one token was inserted or deleted.
    pub fn has_changes(&self) -> bool {
        self.changes().next().is_some()
    }

    /// The original sequence, rebuilt from kept and deleted spans.
    pub fn original_tokens(&self) -> Vec<&str> {
        self.tokens_excluding(SpanKind::Inserted)
    }

    /// The revised sequence, rebuilt from kept and inserted spans.
    pub fn revised_tokens(&self) -> Vec<&str> {
        self.tokens_excluding(SpanKind::Deleted)
    }

    /// The common subsequence the aligner settled on.
    pub fn kept_tokens(&self) -> Vec<&str> {
        self.kept()
            .flat_map(|s| s.tokens.iter().map(String::as_str))
            .collect()
    }

    fn tokens_excluding(&self, excluded: SpanKind) -> Vec<&str> {
        self.spans
            .iter()
            .filter(|s| s.kind != excluded)
            .flat_map(|s| s.tokens.iter().map(String::as_str))
            .collect()
    }

    pub fn stats(&self) -> SpanStats {
        let mut stats = SpanStats::default();
        for span in &self.spans {
            let count = span.tokens.len();
            match span.kind {
                SpanKind::Kept => stats.kept += count,
                SpanKind::Inserted => stats.inserted += count,
                SpanKind::Deleted => stats.deleted += count,
            }
        }
        stats
    }
}

/// Greedy lookahead aligner.
pub struct TokenAligner;

impl TokenAligner {
    /// Align `original` against `revised` by exact token equality.
    ///
    /// No normalization happens here; callers tokenize with
    /// [`simple_tokenize`] or their own rules first.
    pub fn align<L, R>(original: &[L], revised: &[R]) -> TokenDiff
    where
        L: AsRef<str>,
        R: AsRef<str>,
    {
        let mut spans: Vec<TokenSpan> = Vec::new();
        let (mut i, mut j) = (0, 0);

        while i < original.len() && j < revised.len() {
            let token = original[i].as_ref();

            if token == revised[j].as_ref() {
                push_kept(&mut spans, i, token);
                i += 1;
                j += 1;
                continue;
            }

            let resync = revised[j + 1..]
                .iter()
                .position(|t| t.as_ref() == token)
                .map(|offset| j + 1 + offset);

            match resync {
                Some(k) => {
                    spans.push(TokenSpan::new(
                        SpanKind::Inserted,
                        j,
                        owned(&revised[j..k]),
                    ));
                    j = k;
                }
                None => {
                    spans.push(TokenSpan::new(
                        SpanKind::Deleted,
                        i,
                        vec![token.to_string()],
                    ));
                    i += 1;
                }
            }
        }

        for (idx, token) in original.iter().enumerate().skip(i) {
            spans.push(TokenSpan::new(
                SpanKind::Deleted,
                idx,
                vec![token.as_ref().to_string()],
            ));
        }
        for (idx, token) in revised.iter().enumerate().skip(j) {
            spans.push(TokenSpan::new(
                SpanKind::Inserted,
                idx,
                vec![token.as_ref().to_string()],
            ));
        }

        TokenDiff { spans }
    }

    /// Tokenize both texts with [`simple_tokenize`] and align them.
    pub fn align_text(original: &str, revised: &str) -> TokenDiff {
        Self::align(&simple_tokenize(original), &simple_tokenize(revised))
    }
}

/// Kept tokens extend the previous span when it is also kept; nothing else can
/// have been emitted in between, so the run is contiguous in both sequences.
fn push_kept(spans: &mut Vec<TokenSpan>, position: usize, token: &str) {
    if let Some(last) = spans.last_mut() {
        if last.kind == SpanKind::Kept {
            last.tokens.push(token.to_string());
            return;
        }
    }
    spans.push(TokenSpan::new(
        SpanKind::Kept,
        position,
        vec![token.to_string()],
    ));
}

fn owned<S: AsRef<str>>(tokens: &[S]) -> Vec<String> {
    tokens.iter().map(|t| t.as_ref().to_string()).collect()
}

/// Replace newlines with spaces and split on whitespace.
pub fn simple_tokenize(text: &str) -> Vec<String> {
    text.replace('\n', " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
