//! Contracts for the collaborators around the comparison engine.
//!
//! The engine never talks to an extraction service, loads a file or writes a
//! document itself. Hosts plug those capabilities in through the traits here.
//! A few host-side helpers (retrying extraction, caching its results, an
//! in-memory attachment store and a JSON overlay renderer) are provided for
//! convenience; the engine does not depend on any of them.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::annotation::Annotation;
use crate::element::{file_name, ExtractedDocument};
use crate::errors::{AttachmentError, ExtractionError, RenderError};
use crate::table::TableData;

/// Decoded raster image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB bytes.
    pub pixels: Vec<u8>,
}

/// Resolves attachment references to structured content.
pub trait AttachmentLoader {
    fn load_table(&self, document: &str, file_ref: &str) -> Result<TableData, AttachmentError>;

    fn load_image(&self, document: &str, file_ref: &str) -> Result<ImageData, AttachmentError>;
}

/// Turns a raw document into extracted elements.
///
/// May fail transiently; see [`extract_with_retry`].
pub trait ExtractionService {
    fn extract(&self, document: &str, bytes: &[u8]) -> Result<ExtractedDocument, ExtractionError>;
}

/// Draws annotations onto a document and returns the persisted bytes.
///
/// How the output is stored (incremental or full rewrite) is the renderer's
/// own decision.
pub trait Renderer {
    fn apply(
        &self,
        document: &ExtractedDocument,
        annotations: &[Annotation],
    ) -> Result<Vec<u8>, RenderError>;
}

/// Attachments held in memory, keyed by document id and file name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAttachments {
    tables: HashMap<(String, String), TableData>,
    images: HashMap<(String, String), ImageData>,
}

impl InMemoryAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_table(&mut self, document: &str, file_ref: &str, table: TableData) {
        self.tables.insert(key(document, file_ref), table);
    }

    pub fn insert_image(&mut self, document: &str, file_ref: &str, image: ImageData) {
        self.images.insert(key(document, file_ref), image);
    }
}

fn key(document: &str, file_ref: &str) -> (String, String) {
    (document.to_string(), file_name(file_ref).to_string())
}

impl AttachmentLoader for InMemoryAttachments {
    fn load_table(&self, document: &str, file_ref: &str) -> Result<TableData, AttachmentError> {
        self.tables
            .get(&key(document, file_ref))
            .cloned()
            .ok_or_else(|| AttachmentError::NotFound(file_ref.to_string()))
    }

    fn load_image(&self, document: &str, file_ref: &str) -> Result<ImageData, AttachmentError> {
        self.images
            .get(&key(document, file_ref))
            .cloned()
            .ok_or_else(|| AttachmentError::NotFound(file_ref.to_string()))
    }
}

/// How often and how patiently to retry a transient extraction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Run `service.extract`, retrying transient failures per `policy`.
///
/// Permanent failures and the last transient failure are returned as-is.
pub fn extract_with_retry<S: ExtractionService + ?Sized>(
    service: &S,
    document: &str,
    bytes: &[u8],
    policy: &RetryPolicy,
) -> Result<ExtractedDocument, ExtractionError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match service.extract(document, bytes) {
            Ok(extracted) => return Ok(extracted),
            Err(err) if err.is_transient() && attempt < attempts => {
                tracing::warn!(
                    document,
                    attempt,
                    attempts,
                    error = %err,
                    "extraction failed, retrying"
                );
                thread::sleep(policy.delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Host-owned cache of extraction results keyed by document identity.
///
/// Holds at most `capacity` documents and evicts the oldest insertion first.
pub struct ExtractionCache<S> {
    service: S,
    policy: RetryPolicy,
    capacity: usize,
    entries: HashMap<String, ExtractedDocument>,
    order: VecDeque<String>,
}

impl<S: ExtractionService> ExtractionCache<S> {
    pub fn new(service: S, capacity: usize) -> Self {
        Self {
            service,
            policy: RetryPolicy::default(),
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, document: &str) -> bool {
        self.entries.contains_key(document)
    }

    /// Cached extraction for `document`, extracting `bytes` on a miss.
    pub fn get_or_extract(
        &mut self,
        document: &str,
        bytes: &[u8],
    ) -> Result<&ExtractedDocument, ExtractionError> {
        if !self.entries.contains_key(document) {
            let extracted = extract_with_retry(&self.service, document, bytes, &self.policy)?;
            while self.entries.len() >= self.capacity {
                match self.order.pop_front() {
                    Some(oldest) => {
                        tracing::debug!(document = %oldest, "evicting cached extraction");
                        self.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            self.order.push_back(document.to_string());
            self.entries.insert(document.to_string(), extracted);
        }
        self.entries
            .get(document)
            .ok_or_else(|| ExtractionError::Permanent(format!("{} missing from cache", document)))
    }

    pub fn invalidate(&mut self, document: &str) {
        if self.entries.remove(document).is_some() {
            self.order.retain(|d| d != document);
        }
    }
}

/// Renders annotations as a JSON overlay grouped by page.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOverlayRenderer {
    pub pretty: bool,
}

#[derive(Serialize)]
struct Overlay<'a> {
    document: &'a str,
    pages: Vec<OverlayPage<'a>>,
}

#[derive(Serialize)]
struct OverlayPage<'a> {
    page: u32,
    height: Option<f64>,
    annotations: Vec<&'a Annotation>,
}

impl Renderer for JsonOverlayRenderer {
    fn apply(
        &self,
        document: &ExtractedDocument,
        annotations: &[Annotation],
    ) -> Result<Vec<u8>, RenderError> {
        let mut by_page: BTreeMap<u32, Vec<&Annotation>> = BTreeMap::new();
        for annotation in annotations {
            by_page.entry(annotation.page).or_default().push(annotation);
        }

        let overlay = Overlay {
            document: &document.id,
            pages: by_page
                .into_iter()
                .map(|(page, annotations)| OverlayPage {
                    page,
                    height: document.page_height(page),
                    annotations,
                })
                .collect(),
        };

        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&overlay)?
        } else {
            serde_json::to_vec(&overlay)?
        };
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use layered_docdiff::Rectangle;

    use super::*;
    use crate::annotation::{AnnotationStyle, Category};

    struct Flaky {
        failures: Cell<u32>,
        transient: bool,
        calls: Cell<u32>,
    }

    impl Flaky {
        fn new(failures: u32, transient: bool) -> Self {
            Self {
                failures: Cell::new(failures),
                transient,
                calls: Cell::new(0),
            }
        }
    }

    impl ExtractionService for Flaky {
        fn extract(&self, document: &str, _bytes: &[u8]) -> Result<ExtractedDocument, ExtractionError> {
            self.calls.set(self.calls.get() + 1);
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(if self.transient {
                    ExtractionError::Transient("timeout".into())
                } else {
                    ExtractionError::Permanent("bad pdf".into())
                });
            }
            Ok(ExtractedDocument::new(document, vec![]))
        }
    }

    fn quick() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            delay: Duration::from_millis(0),
        }
    }

    #[test]
    fn test_retry_recovers_from_transient_failures() {
        let service = Flaky::new(2, true);
        let doc = extract_with_retry(&service, "a.pdf", b"", &quick()).unwrap();
        assert_eq!(doc.id, "a.pdf");
        assert_eq!(service.calls.get(), 3);
    }

    #[test]
    fn test_retry_gives_up_after_last_attempt() {
        let service = Flaky::new(5, true);
        let err = extract_with_retry(&service, "a.pdf", b"", &quick()).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(service.calls.get(), 3);
    }

    #[test]
    fn test_permanent_failure_is_not_retried() {
        let service = Flaky::new(1, false);
        assert!(extract_with_retry(&service, "a.pdf", b"", &quick()).is_err());
        assert_eq!(service.calls.get(), 1);
    }

    #[test]
    fn test_cache_evicts_oldest() {
        let mut cache = ExtractionCache::new(Flaky::new(0, true), 2).with_policy(quick());
        cache.get_or_extract("a", b"").unwrap();
        cache.get_or_extract("b", b"").unwrap();
        cache.get_or_extract("a", b"").unwrap();
        assert_eq!(cache.service.calls.get(), 2);

        cache.get_or_extract("c", b"").unwrap();
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("a"));
        assert!(cache.contains("b") && cache.contains("c"));

        cache.invalidate("b");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_in_memory_attachments_match_file_name() {
        let mut store = InMemoryAttachments::new();
        store.insert_table("a", "tables/t1.xlsx", TableData::new(["x"], vec![vec!["1"]]));

        assert!(store.load_table("a", "/abs/tables/t1.xlsx").is_ok());
        assert_eq!(
            store.load_table("b", "t1.xlsx"),
            Err(AttachmentError::NotFound("t1.xlsx".into()))
        );
        assert!(store.load_image("a", "t1.xlsx").is_err());
    }

    #[test]
    fn test_json_overlay_groups_by_page() {
        let doc = ExtractedDocument::new("report.pdf", vec![]).with_uniform_pages(2, 100.0);
        let style = AnnotationStyle::new([1.0, 0.0, 0.0], 1.5);
        let annotation = |page| Annotation {
            page,
            rect: Rectangle {
                left: 0.0,
                top: 10.0,
                right: 5.0,
                bottom: 20.0,
            },
            category: Category::Delete,
            color: style.color,
            stroke_width: style.stroke_width,
        };

        let bytes = JsonOverlayRenderer::default()
            .apply(&doc, &[annotation(1), annotation(0), annotation(1)])
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["document"], "report.pdf");
        assert_eq!(value["pages"][0]["page"], 0);
        assert_eq!(value["pages"][1]["annotations"].as_array().unwrap().len(), 2);
        assert_eq!(value["pages"][1]["annotations"][0]["category"], "delete");
        assert_eq!(value["pages"][1]["height"], 100.0);
    }
}
