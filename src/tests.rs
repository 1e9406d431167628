//! Property tests for the diff primitives.

use std::collections::HashMap;

use proptest::prelude::*;

use crate::{
    BoundingBox, OptimalMatcher, RegionMapper, SimilarityMatrix, SpanKind, TokenAligner,
};

/// Small alphabet so sequences share tokens often.
fn token_seq() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "d", "e"]), 0..12)
        .prop_map(|v| v.into_iter().map(str::to_string).collect())
}

fn score_rows(max_rows: usize, max_cols: usize) -> impl Strategy<Value = (usize, Vec<Vec<f64>>)> {
    (1..=max_rows, 1..=max_cols).prop_flat_map(|(rows, cols)| {
        (
            Just(cols),
            prop::collection::vec(prop::collection::vec(0.0f64..=1.0, cols), rows),
        )
    })
}

fn multiset<'a>(tokens: impl IntoIterator<Item = &'a str>) -> HashMap<&'a str, usize> {
    let mut counts = HashMap::new();
    for t in tokens {
        *counts.entry(t).or_insert(0) += 1;
    }
    counts
}

proptest! {
    #[test]
    fn alignment_reconstructs_both_sides(a in token_seq(), b in token_seq()) {
        let diff = TokenAligner::align(&a, &b);

        let kept_and_deleted = diff
            .spans
            .iter()
            .filter(|s| s.kind != SpanKind::Inserted)
            .flat_map(|s| s.tokens.iter().map(String::as_str));
        let kept_and_inserted = diff
            .spans
            .iter()
            .filter(|s| s.kind != SpanKind::Deleted)
            .flat_map(|s| s.tokens.iter().map(String::as_str));

        prop_assert_eq!(multiset(kept_and_deleted), multiset(a.iter().map(String::as_str)));
        prop_assert_eq!(multiset(kept_and_inserted), multiset(b.iter().map(String::as_str)));
        prop_assert_eq!(diff.original_tokens(), a.iter().map(String::as_str).collect::<Vec<_>>());
        prop_assert_eq!(diff.revised_tokens(), b.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn self_alignment_is_all_kept(a in token_seq()) {
        let diff = TokenAligner::align(&a, &a);
        prop_assert!(diff.spans.iter().all(|s| s.kind == SpanKind::Kept));
        prop_assert_eq!(diff.kept_tokens().len(), a.len());
    }

    #[test]
    fn empty_original_is_all_inserted(b in token_seq()) {
        let empty: Vec<String> = Vec::new();
        let diff = TokenAligner::align(&empty, &b);
        prop_assert!(diff.spans.iter().all(|s| s.kind == SpanKind::Inserted));
        prop_assert_eq!(diff.stats().inserted, b.len());
    }

    #[test]
    fn assignment_is_a_partition((cols, rows) in score_rows(6, 6), threshold in 0.0f64..=1.0) {
        let n = rows.len();
        let matrix = SimilarityMatrix::from_rows(rows, cols).unwrap();
        let assignment = OptimalMatcher::new(threshold).match_matrix(&matrix).unwrap();

        prop_assert!(assignment.pairs.len() <= n.min(cols));

        let mut seen_a = vec![0usize; n];
        let mut seen_b = vec![0usize; cols];
        for &(a, b) in &assignment.pairs {
            seen_a[a] += 1;
            seen_b[b] += 1;
            prop_assert!(matrix.get(a, b) >= threshold);
        }
        for &a in &assignment.unmatched_a {
            seen_a[a] += 1;
        }
        for &b in &assignment.unmatched_b {
            seen_b[b] += 1;
        }
        prop_assert!(seen_a.iter().all(|&c| c == 1));
        prop_assert!(seen_b.iter().all(|&c| c == 1));
    }

    #[test]
    fn raising_threshold_never_adds_pairs((cols, rows) in score_rows(5, 5), low in 0.0f64..=1.0) {
        let matrix = SimilarityMatrix::from_rows(rows, cols).unwrap();
        let relaxed = OptimalMatcher::new(low).match_matrix(&matrix).unwrap();
        let strict = OptimalMatcher::new(1.0).match_matrix(&matrix).unwrap();
        prop_assert!(strict.pairs.len() <= relaxed.pairs.len());
    }

    #[test]
    fn unique_perfect_pair_is_found(n in 1usize..6, m in 1usize..6, seed in 0usize..36) {
        let (row, col) = (seed % n, (seed / n) % m);
        let matrix = SimilarityMatrix::from_fn(n, m, |i, j| if (i, j) == (row, col) { 1.0 } else { 0.0 });
        let assignment = OptimalMatcher::new(1.0).match_matrix(&matrix).unwrap();
        prop_assert_eq!(assignment.pairs, vec![(row, col)]);
    }

    #[test]
    fn page_reflection_round_trips(
        left in -500.0f64..500.0,
        bottom in 0.0f64..800.0,
        height in 0.0f64..200.0,
        page_height in 100.0f64..2000.0,
    ) {
        let bounds = BoundingBox::new(left, bottom, left + 50.0, bottom + height);
        let rect = RegionMapper::to_page_rect(&bounds, page_height);
        let back = RegionMapper::to_page_rect(
            &BoundingBox::new(rect.left, rect.bottom, rect.right, rect.top),
            page_height,
        );
        prop_assert!((back.top - bounds.top).abs() < 1e-9);
        prop_assert!((back.bottom - bounds.bottom).abs() < 1e-9);
    }
}
