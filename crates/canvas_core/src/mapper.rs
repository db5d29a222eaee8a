//! Translation between virtual space and physical viewport pixels.
//!
//! The mapper only translates. It never clips: callers intersect the result
//! with the item area before hit-testing or drawing.

use crate::geometry::{Point, Rect, Size};

/// Bidirectional virtual/physical transform for one viewport.
///
/// `offset` is the "virtual begin": the virtual coordinate shown at physical
/// pixel 0 on each axis. An axis without virtualization keeps offset 0, which
/// makes both directions the identity on that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoordinateMapper {
    offset: Point,
    viewport: Size,
}

impl CoordinateMapper {
    pub fn new(offset: Point, viewport: Size) -> Self {
        Self { offset, viewport }
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    /// Physical pixel to virtual coordinate.
    pub fn to_virtual(&self, physical: Point) -> Point {
        physical.offset(self.offset.x, self.offset.y)
    }

    /// Virtual coordinate to physical pixel.
    pub fn to_physical(&self, virtual_point: Point) -> Point {
        virtual_point.offset(-self.offset.x, -self.offset.y)
    }

    /// The part of virtual space currently shown, in virtual coordinates.
    pub fn visible_virtual_rect(&self) -> Rect {
        Rect::new(
            self.offset.x,
            self.offset.y,
            self.viewport.width,
            self.viewport.height,
        )
    }

    /// Translate a virtual rectangle to physical pixels.
    ///
    /// The flag reports whether any part of the rectangle falls inside the
    /// viewport. Degenerate rectangles are never visible.
    pub fn bounds_to_physical(&self, bounds: Rect) -> (Rect, bool) {
        let physical = bounds.translate(-self.offset.x, -self.offset.y);
        let visible = physical.intersects(&Rect::from_size(self.viewport));
        (physical, visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_without_offset() {
        let mapper = CoordinateMapper::new(Point::default(), Size::new(400, 300));
        let p = Point::new(37, 91);
        assert_eq!(mapper.to_virtual(p), p);
        assert_eq!(mapper.to_physical(p), p);
    }

    #[test]
    fn test_translation_by_offset() {
        let mapper = CoordinateMapper::new(Point::new(100, 250), Size::new(400, 300));
        assert_eq!(mapper.to_virtual(Point::new(0, 0)), Point::new(100, 250));
        assert_eq!(mapper.to_physical(Point::new(150, 260)), Point::new(50, 10));
    }

    #[test]
    fn test_bounds_visibility() {
        let mapper = CoordinateMapper::new(Point::new(100, 0), Size::new(400, 300));

        let (rect, visible) = mapper.bounds_to_physical(Rect::new(80, 10, 30, 30));
        assert_eq!(rect, Rect::new(-20, 10, 30, 30));
        assert!(visible, "partially visible rect must be reported visible");

        let (_, visible) = mapper.bounds_to_physical(Rect::new(0, 10, 100, 30));
        assert!(!visible, "rect ending exactly at the viewport edge is hidden");

        let (_, visible) = mapper.bounds_to_physical(Rect::new(600, 10, 30, 30));
        assert!(!visible);
    }

    #[test]
    fn test_bounds_are_not_clipped() {
        let mapper = CoordinateMapper::new(Point::new(0, 0), Size::new(100, 100));
        let (rect, visible) = mapper.bounds_to_physical(Rect::new(50, 50, 500, 500));
        assert!(visible);
        assert_eq!(rect.width, 500);
    }

    #[test]
    fn test_visible_virtual_rect() {
        let mapper = CoordinateMapper::new(Point::new(30, 40), Size::new(200, 100));
        assert_eq!(mapper.visible_virtual_rect(), Rect::new(30, 40, 200, 100));
    }
}
