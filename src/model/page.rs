//! Page-level types.

use lopdf::ObjectId;
use serde::{Deserialize, Serialize};

use super::document::{Document, PageEntry};
use crate::geometry::{Matrix, Rect};

/// A single page in a loaded document.
///
/// Pages are borrowed views: they hold a reference to their [`Document`] and
/// cannot outlive it.
#[derive(Debug, Clone, Copy)]
pub struct Page<'a> {
    document: &'a Document,
    index: usize,
    entry: &'a PageEntry,
}

impl<'a> Page<'a> {
    pub(crate) fn new(document: &'a Document, index: usize, entry: &'a PageEntry) -> Self {
        Self {
            document,
            index,
            entry,
        }
    }

    /// Zero-based page index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Page number (1-indexed).
    pub fn number(&self) -> u32 {
        self.index as u32 + 1
    }

    /// Intrinsic width in points, after rotation.
    pub fn width(&self) -> f64 {
        self.entry.geometry.width()
    }

    /// Intrinsic height in points, after rotation.
    pub fn height(&self) -> f64 {
        self.entry.geometry.height()
    }

    /// Page rotation in degrees (0, 90, 180, 270).
    pub fn rotation(&self) -> u16 {
        self.entry.geometry.rotation
    }

    pub fn geometry(&self) -> &'a PageGeometry {
        &self.entry.geometry
    }

    /// Object id of the page dictionary.
    pub fn id(&self) -> ObjectId {
        self.entry.id
    }

    /// The document this page belongs to.
    pub fn document(&self) -> &'a Document {
        self.document
    }
}

/// Boxes and rotation of a page, resolved through the page tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    /// The `/MediaBox`
    pub media_box: Rect,
    /// CropBox ∩ MediaBox, the area that is actually shown
    pub visible_box: Rect,
    /// Clockwise rotation in degrees, normalized to 0, 90, 180 or 270
    pub rotation: u16,
}

impl PageGeometry {
    /// Build from the raw boxes. A crop box that misses the media box is ignored.
    pub fn new(media_box: Rect, crop_box: Option<Rect>, rotate: i64) -> Self {
        let visible_box = crop_box
            .and_then(|crop| crop.intersect(&media_box))
            .unwrap_or(media_box);
        Self {
            media_box,
            visible_box,
            rotation: normalize_rotation(rotate),
        }
    }

    fn is_sideways(&self) -> bool {
        self.rotation == 90 || self.rotation == 270
    }

    pub fn width(&self) -> f64 {
        if self.is_sideways() {
            self.visible_box.height()
        } else {
            self.visible_box.width()
        }
    }

    pub fn height(&self) -> f64 {
        if self.is_sideways() {
            self.visible_box.width()
        } else {
            self.visible_box.height()
        }
    }

    /// Map page space to a y-down space of `width() x height()` units with
    /// the visible box's top-left corner (after rotation) at the origin.
    pub fn base_transform(&self) -> Matrix {
        let Rect { x0, y0, x1, y1 } = self.visible_box;
        match self.rotation {
            90 => Matrix::new(0.0, 1.0, 1.0, 0.0, -y0, -x0),
            180 => Matrix::new(-1.0, 0.0, 0.0, 1.0, x1, -y0),
            270 => Matrix::new(0.0, -1.0, -1.0, 0.0, y1, x1),
            _ => Matrix::new(1.0, 0.0, 0.0, -1.0, -x0, y1),
        }
    }
}

/// `/Rotate` must be a multiple of 90; anything else is snapped down.
fn normalize_rotation(rotate: i64) -> u16 {
    let r = rotate.rem_euclid(360);
    ((r / 90) * 90) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn close(a: Point, x: f64, y: f64) -> bool {
        (a.x - x).abs() < 1e-9 && (a.y - y).abs() < 1e-9
    }

    #[test]
    fn test_crop_box_is_intersected() {
        let geometry = PageGeometry::new(
            Rect::new(0.0, 0.0, 600.0, 800.0),
            Some(Rect::new(50.0, 50.0, 700.0, 700.0)),
            0,
        );
        assert_eq!(geometry.visible_box, Rect::new(50.0, 50.0, 600.0, 700.0));
        assert_eq!(geometry.width(), 550.0);
        assert_eq!(geometry.height(), 650.0);
    }

    #[test]
    fn test_disjoint_crop_box_is_ignored() {
        let media = Rect::new(0.0, 0.0, 100.0, 100.0);
        let geometry = PageGeometry::new(media, Some(Rect::new(200.0, 200.0, 300.0, 300.0)), 0);
        assert_eq!(geometry.visible_box, media);
    }

    #[test]
    fn test_rotation_normalization() {
        assert_eq!(normalize_rotation(-90), 270);
        assert_eq!(normalize_rotation(450), 90);
        assert_eq!(normalize_rotation(100), 90);
    }

    #[test]
    fn test_rotated_page_swaps_size() {
        let geometry = PageGeometry::new(Rect::new(0.0, 0.0, 200.0, 100.0), None, 90);
        assert_eq!(geometry.width(), 100.0);
        assert_eq!(geometry.height(), 200.0);
    }

    #[test]
    fn test_base_transform_maps_corners() {
        let media = Rect::new(10.0, 20.0, 210.0, 120.0);

        let upright = PageGeometry::new(media, None, 0).base_transform();
        assert!(close(upright.apply(Point::new(10.0, 120.0)), 0.0, 0.0));
        assert!(close(upright.apply(Point::new(210.0, 20.0)), 200.0, 100.0));

        let quarter = PageGeometry::new(media, None, 90).base_transform();
        assert!(close(quarter.apply(Point::new(10.0, 20.0)), 0.0, 0.0));
        assert!(close(quarter.apply(Point::new(210.0, 120.0)), 100.0, 200.0));

        let half = PageGeometry::new(media, None, 180).base_transform();
        assert!(close(half.apply(Point::new(210.0, 20.0)), 0.0, 0.0));

        let three = PageGeometry::new(media, None, 270).base_transform();
        assert!(close(three.apply(Point::new(210.0, 120.0)), 0.0, 0.0));
        assert!(close(three.apply(Point::new(10.0, 20.0)), 100.0, 200.0));
    }
}
