//! Similarity oracles consumed by the matcher.
//!
//! The engine only needs a pure, deterministic score in `[0, 1]` for a pair of
//! texts or images. Scoring is usually model-backed and expensive, so each
//! trait exposes a `similarity_matrix` hook that hosts can override to batch.
//! The reference oracles here cover model-free hosts and tests.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

use layered_docdiff::{simple_tokenize, SimilarityMatrix};

use crate::collaborators::ImageData;

/// Scores a pair of texts.
pub trait TextSimilarity {
    fn similarity(&self, a: &str, b: &str) -> f64;

    /// Score every `(a[i], b[j])` pair.
    fn similarity_matrix(&self, a: &[&str], b: &[&str]) -> SimilarityMatrix {
        SimilarityMatrix::from_fn(a.len(), b.len(), |i, j| self.similarity(a[i], b[j]))
    }
}

impl<F> TextSimilarity for F
where
    F: Fn(&str, &str) -> f64,
{
    fn similarity(&self, a: &str, b: &str) -> f64 {
        self(a, b)
    }
}

/// Scores a pair of images.
pub trait ImageSimilarity {
    fn similarity(&self, a: &ImageData, b: &ImageData) -> f64;

    fn similarity_matrix(&self, a: &[&ImageData], b: &[&ImageData]) -> SimilarityMatrix {
        SimilarityMatrix::from_fn(a.len(), b.len(), |i, j| self.similarity(a[i], b[j]))
    }
}

impl<F> ImageSimilarity for F
where
    F: Fn(&ImageData, &ImageData) -> f64,
{
    fn similarity(&self, a: &ImageData, b: &ImageData) -> f64 {
        self(a, b)
    }
}

/// Cosine of the angle between two vectors.
///
/// Returns 0.0 for empty vectors, mismatched lengths, or a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let norm = norm_a.sqrt() * norm_b.sqrt();
    if norm == 0.0 {
        return 0.0;
    }
    dot / norm
}

/// Turns text into a fixed-size embedding vector.
pub trait Embedder {
    fn embed(&self, text: &str) -> Vec<f32>;

    /// Embed several texts at once.
    ///
    /// Default implementation calls `embed` in a loop. Override for backends
    /// with native batch support.
    fn embed_batch(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Cosine similarity over embeddings, each text embedded at most once.
pub struct EmbeddingSimilarity<E> {
    embedder: E,
    cache: Mutex<HashMap<String, Vec<f32>>>,
}

impl<E: Embedder> EmbeddingSimilarity<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of distinct texts embedded so far.
    pub fn cached(&self) -> usize {
        lock(&self.cache).len()
    }

    /// Embed whichever of `texts` are not cached yet, in one batch.
    ///
    /// A batch returning the wrong number of vectors is discarded and the
    /// texts are embedded one at a time instead.
    fn warm(&self, texts: &[&str]) {
        let missing: Vec<&str> = {
            let cache = lock(&self.cache);
            let mut missing = Vec::new();
            for &text in texts {
                if !cache.contains_key(text) && !missing.contains(&text) {
                    missing.push(text);
                }
            }
            missing
        };
        if missing.is_empty() {
            return;
        }

        tracing::trace!(count = missing.len(), "embedding batch");
        let mut vectors = self.embedder.embed_batch(&missing);
        if vectors.len() != missing.len() {
            tracing::warn!(
                expected = missing.len(),
                found = vectors.len(),
                "embedding batch size mismatch, embedding texts individually"
            );
            vectors = missing.iter().map(|text| self.embedder.embed(text)).collect();
        }

        let mut cache = lock(&self.cache);
        for (text, vector) in missing.into_iter().zip(vectors) {
            cache.insert(text.to_string(), vector);
        }
    }
}

impl<E: Embedder> TextSimilarity for EmbeddingSimilarity<E> {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        self.warm(&[a, b]);
        let cache = lock(&self.cache);
        match (cache.get(a), cache.get(b)) {
            (Some(va), Some(vb)) => cosine_similarity(va, vb),
            _ => 0.0,
        }
    }

    fn similarity_matrix(&self, a: &[&str], b: &[&str]) -> SimilarityMatrix {
        let all: Vec<&str> = a.iter().chain(b).copied().collect();
        self.warm(&all);

        let cache = lock(&self.cache);
        SimilarityMatrix::from_fn(a.len(), b.len(), |i, j| {
            match (cache.get(a[i]), cache.get(b[j])) {
                (Some(va), Some(vb)) => cosine_similarity(va, vb),
                _ => 0.0,
            }
        })
    }
}

/// Caches the scores of any text oracle by ordered pair.
pub struct MemoizedSimilarity<S> {
    inner: S,
    scores: Mutex<HashMap<(String, String), f64>>,
}

impl<S: TextSimilarity> MemoizedSimilarity<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            scores: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached(&self) -> usize {
        lock(&self.scores).len()
    }
}

impl<S: TextSimilarity> TextSimilarity for MemoizedSimilarity<S> {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let key = (a.to_string(), b.to_string());
        if let Some(&score) = lock(&self.scores).get(&key) {
            return score;
        }
        let score = self.inner.similarity(a, b);
        lock(&self.scores).insert(key, score);
        score
    }
}

fn lock<K: Eq + Hash, V>(map: &Mutex<HashMap<K, V>>) -> std::sync::MutexGuard<'_, HashMap<K, V>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Jaccard coefficient over lowercased word sets.
///
/// Punctuation at either end of a word is ignored, so "blue." and "Blue"
/// are the same word. Two texts without words are identical.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenOverlapSimilarity;

impl TokenOverlapSimilarity {
    fn words(text: &str) -> std::collections::HashSet<String> {
        simple_tokenize(text)
            .iter()
            .map(|t| t.trim_matches(|c: char| c.is_ascii_punctuation()))
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect()
    }
}

impl TextSimilarity for TokenOverlapSimilarity {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let words_a = Self::words(a);
        let words_b = Self::words(b);

        if words_a.is_empty() && words_b.is_empty() {
            return 1.0;
        }

        let intersection = words_a.intersection(&words_b).count();
        let union = words_a.union(&words_b).count();

        intersection as f64 / union as f64
    }
}

/// One minus the mean absolute pixel difference.
///
/// Images of different dimensions score 0.0. Two empty images score 1.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelSimilarity;

impl ImageSimilarity for PixelSimilarity {
    fn similarity(&self, a: &ImageData, b: &ImageData) -> f64 {
        if a.width != b.width || a.height != b.height || a.pixels.len() != b.pixels.len() {
            return 0.0;
        }
        if a.pixels.is_empty() {
            return 1.0;
        }

        let total: u64 = a
            .pixels
            .iter()
            .zip(&b.pixels)
            .map(|(&x, &y)| u64::from(x.abs_diff(y)))
            .sum();
        1.0 - total as f64 / (a.pixels.len() as f64 * 255.0)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct CountingEmbedder {
        calls: Cell<usize>,
    }

    // Embeds by word count and first letter, enough to tell texts apart.
    impl Embedder for CountingEmbedder {
        fn embed(&self, text: &str) -> Vec<f32> {
            self.calls.set(self.calls.get() + 1);
            let first = text.bytes().next().unwrap_or(0) as f32;
            vec![text.split_whitespace().count() as f32, first]
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_embedding_similarity_embeds_each_text_once() {
        let oracle = EmbeddingSimilarity::new(CountingEmbedder {
            calls: Cell::new(0),
        });

        let matrix = oracle.similarity_matrix(&["a b", "c"], &["a b", "c", "a b"]);
        assert_eq!((matrix.rows(), matrix.columns()), (2, 3));
        assert!((matrix.get(0, 0) - 1.0).abs() < 1e-9);
        assert_eq!(oracle.cached(), 2);

        oracle.similarity("a b", "c");
        assert_eq!(oracle.embedder.calls.get(), 2);
    }

    // Drops the last vector of every batch.
    struct ShortBatchEmbedder;

    impl Embedder for ShortBatchEmbedder {
        fn embed(&self, text: &str) -> Vec<f32> {
            vec![text.len() as f32, 1.0]
        }

        fn embed_batch(&self, texts: &[&str]) -> Vec<Vec<f32>> {
            let mut vectors: Vec<Vec<f32>> = texts.iter().map(|text| self.embed(text)).collect();
            vectors.pop();
            vectors
        }
    }

    #[test]
    fn test_short_embedding_batch_falls_back_to_single_texts() {
        let oracle = EmbeddingSimilarity::new(ShortBatchEmbedder);

        let matrix = oracle.similarity_matrix(&["same text"], &["same text", "other"]);
        assert_eq!(oracle.cached(), 2);
        assert!((matrix.get(0, 0) - 1.0).abs() < 1e-9);
        assert!(matrix.get(0, 1) > 0.0);
    }

    #[test]
    fn test_memoized_similarity_caches_pairs() {
        let calls = Cell::new(0);
        let inner = |a: &str, b: &str| {
            calls.set(calls.get() + 1);
            if a == b {
                1.0
            } else {
                0.0
            }
        };
        let oracle = MemoizedSimilarity::new(inner);

        assert_eq!(oracle.similarity("x", "x"), 1.0);
        assert_eq!(oracle.similarity("x", "x"), 1.0);
        assert_eq!(oracle.similarity("x", "y"), 0.0);
        assert_eq!(calls.get(), 2);
        assert_eq!(oracle.cached(), 2);
    }

    #[test]
    fn test_token_overlap() {
        let oracle = TokenOverlapSimilarity;
        assert_eq!(oracle.similarity("The sky is blue.", "the SKY is Blue"), 1.0);
        assert_eq!(oracle.similarity("a b", "b c"), 1.0 / 3.0);
        assert_eq!(oracle.similarity("a", "b"), 0.0);
        assert_eq!(oracle.similarity("", "  "), 1.0);
        assert_eq!(oracle.similarity("a", ""), 0.0);
    }

    #[test]
    fn test_pixel_similarity() {
        let image = |pixels: Vec<u8>| ImageData {
            width: 1,
            height: 1,
            pixels,
        };
        let oracle = PixelSimilarity;

        assert_eq!(oracle.similarity(&image(vec![10, 20, 30]), &image(vec![10, 20, 30])), 1.0);
        assert_eq!(oracle.similarity(&image(vec![0, 0, 0]), &image(vec![255, 255, 255])), 0.0);

        let wide = ImageData {
            width: 2,
            ..image(vec![0; 6])
        };
        assert_eq!(oracle.similarity(&image(vec![0; 3]), &wide), 0.0);
    }

    #[test]
    fn test_closures_are_oracles() {
        let text = |a: &str, b: &str| if a == b { 1.0 } else { 0.1 };
        let matrix = TextSimilarity::similarity_matrix(&text, &["a"], &["a", "b"]);
        assert_eq!(matrix.get(0, 1), 0.1);
    }
}
