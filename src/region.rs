//! Document-space boxes and page-local rendering rectangles.
//!
//! Extraction reports bounds with the origin at the bottom-left of the page and
//! y growing upward. Renderers draw with the origin at the top-left and y
//! growing downward. [`RegionMapper`] reflects one into the other.

use serde::{Deserialize, Serialize};

/// Axis-aligned box in document coordinates (bottom-left origin, y up).
///
/// Serializes as `[left, bottom, right, top]`, the order extraction services
/// emit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl BoundingBox {
    pub fn new(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.left, self.bottom, self.right, self.top]
            .iter()
            .all(|v| v.is_finite())
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([left, bottom, right, top]: [f64; 4]) -> Self {
        Self::new(left, bottom, right, top)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.left, b.bottom, b.right, b.top]
    }
}

/// Page-local rectangle in rendering coordinates (top-left origin, y down).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rectangle {
    /// Reflect back into document coordinates on a page of `page_height`.
    pub fn to_document_box(&self, page_height: f64) -> BoundingBox {
        BoundingBox {
            left: self.left,
            bottom: page_height - self.bottom,
            right: self.right,
            top: page_height - self.top,
        }
    }
}

/// Stateless document-to-page coordinate transform.
pub struct RegionMapper;

impl RegionMapper {
    /// Map `bounds` onto a page of `page_height`.
    ///
    /// Total for finite input; non-finite values propagate unchanged, so
    /// callers reject them first.
    pub fn to_page_rect(bounds: &BoundingBox, page_height: f64) -> Rectangle {
        Rectangle {
            left: bounds.left,
            top: page_height - bounds.top,
            right: bounds.right,
            bottom: page_height - bounds.bottom,
        }
    }
}
