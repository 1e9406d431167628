use layered_docdiff::BoundingBox;

use crate::{
    AnnotationAccumulator, AnnotationStyles, Category, CellLocator, CompareConfig,
    CompareWarning, Element, ExtractedDocument, Hit, HitSet, InMemoryAttachments, Segmenter,
};

fn cell(path: &[&str], value: &str) -> Element {
    Element::with_text(value)
        .at_path(path)
        .placed(0, BoundingBox::new(100.0, 500.0, 180.0, 515.0))
}

fn table_document() -> ExtractedDocument {
    ExtractedDocument::new(
        "a.pdf",
        vec![
            cell(&["Document", "Table", "TR", "Row", "2", "Cell", "3", "P"], "42"),
            cell(&["Document", "Table", "TR", "Cell", "3", "P"], "17"),
            cell(&["Document", "Table", "Row", "x", "Cell", "3"], "99"),
        ],
    )
    .with_uniform_pages(1, 842.0)
}

#[test]
fn cell_locators_are_resolved_once_at_segmentation() {
    let doc = table_document();
    let config = CompareConfig::default();
    let store = InMemoryAttachments::new();
    let mut warnings = Vec::new();
    let segmented = Segmenter::new(&config, &store).segment(&doc, &mut warnings);

    let cells: Vec<_> = segmented.located.iter().map(|l| l.cell).collect();
    assert_eq!(cells, vec![Some(CellLocator::new(2, 3)), None, None]);
    assert_eq!(
        warnings,
        vec![
            CompareWarning::UnresolvableCellIndex {
                document: "a.pdf".into(),
                element: 1
            },
            CompareWarning::UnresolvableCellIndex {
                document: "a.pdf".into(),
                element: 2
            },
        ]
    );
    assert!(segmented.sentences.is_empty());
}

#[test]
fn element_without_row_is_skipped_from_cell_annotation() {
    let doc = table_document();
    let config = CompareConfig::default();
    let store = InMemoryAttachments::new();
    let segmented = Segmenter::new(&config, &store).segment(&doc, &mut Vec::new());

    let styles = AnnotationStyles::default();
    let mut accumulator = AnnotationAccumulator::new(&doc, &styles);
    let cells = [CellLocator::new(2, 3)].into_iter().collect();
    accumulator.accumulate(
        &segmented.located,
        &[HitSet::new(Category::CellModified, Hit::Cells(cells))],
    );

    let (annotations, warnings) = accumulator.into_parts();
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].rect.top, 327.0);
    assert_eq!(annotations[0].rect.bottom, 342.0);
    assert_eq!(annotations[0].color, [0.4, 0.2, 0.1]);
    assert!(warnings.is_empty());
}

#[test]
fn repeated_accumulation_doubles_annotations() {
    let doc = table_document();
    let config = CompareConfig::default();
    let store = InMemoryAttachments::new();
    let segmented = Segmenter::new(&config, &store).segment(&doc, &mut Vec::new());

    let styles = AnnotationStyles::default();
    let mut accumulator = AnnotationAccumulator::new(&doc, &styles);
    let hits = [
        HitSet::new(Category::Delete, Hit::Text(vec!["42".into(), "17".into()])),
        HitSet::new(Category::Insert, Hit::Text(vec!["99".into()])),
    ];

    let first = accumulator.accumulate(&segmented.located, &hits);
    let second = accumulator.accumulate(&segmented.located, &hits);

    assert_eq!(first, 3);
    assert_eq!(second, 3);
    assert_eq!(accumulator.annotations().len(), 6);
    assert_eq!(accumulator.annotations()[..3], accumulator.annotations()[3..]);
}
