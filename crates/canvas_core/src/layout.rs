//! Address-to-bounds resolution and aggregate content size.
//!
//! Layout is lazy: the engine remembers the registry revision and the
//! descriptor revision it last laid out against and only recomputes when
//! either has moved.

use crate::geometry::{Point, Rect, Size};
use crate::registry::{CanvasItem, Extent, ItemAddress, ItemId, ItemRegistry, ItemSize};
use serde::{Deserialize, Serialize};

/// Shared cell geometry for grid-addressed items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutDescriptor {
    /// Size of one grid cell.
    pub cell: Size,
    /// Gap between neighbouring cells.
    pub spacing: Size,
    /// Margin around the grid, also added after the last item.
    pub padding: i32,
}

impl Default for LayoutDescriptor {
    fn default() -> Self {
        Self {
            cell: Size::new(96, 64),
            spacing: Size::new(8, 8),
            padding: 8,
        }
    }
}

impl LayoutDescriptor {
    /// Virtual position of a grid cell's top-left corner, or `None` when it
    /// lies beyond the representable coordinate range.
    pub fn cell_origin(&self, col: i32, row: i32) -> Option<Point> {
        let pitch = |cell: i32, gap: i32, n: i32| {
            cell.checked_add(gap)?.checked_mul(n)?.checked_add(self.padding)
        };
        Some(Point::new(
            pitch(self.cell.width, self.spacing.width, col)?,
            pitch(self.cell.height, self.spacing.height, row)?,
        ))
    }

    fn origin(&self, address: ItemAddress) -> Option<Point> {
        if !address.is_valid() {
            return None;
        }
        match address {
            ItemAddress::Cell { col, row } => self.cell_origin(col, row),
            ItemAddress::Free { x, y } => Some(Point::new(x, y)),
            ItemAddress::Unplaced => None,
        }
    }

    fn measure(extent: Extent, cell: i32) -> Option<i32> {
        match extent {
            Extent::Auto => Some(cell),
            Extent::Fixed(px) => Some(px),
            Extent::Spring => None,
        }
    }
}

/// Non-empty bounds whose far edges fit in `i32`.
fn placed(origin: Point, width: i32, height: i32) -> Option<Rect> {
    origin.x.checked_add(width)?;
    origin.y.checked_add(height)?;
    let rect = Rect::new(origin.x, origin.y, width, height);
    (!rect.is_empty()).then_some(rect)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LayoutStamp {
    registry_revision: u64,
    descriptor_revision: u64,
    content: Size,
}

/// Lays out a registry against a [`LayoutDescriptor`].
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    descriptor: LayoutDescriptor,
    descriptor_revision: u64,
    stamp: Option<LayoutStamp>,
    passes: u64,
}

impl LayoutEngine {
    pub fn new(descriptor: LayoutDescriptor) -> Self {
        Self {
            descriptor,
            descriptor_revision: 0,
            stamp: None,
            passes: 0,
        }
    }

    pub fn descriptor(&self) -> &LayoutDescriptor {
        &self.descriptor
    }

    /// Replace the descriptor. Invalidates the layout if anything changed.
    pub fn set_descriptor(&mut self, descriptor: LayoutDescriptor) -> bool {
        if descriptor == self.descriptor {
            return false;
        }
        self.descriptor = descriptor;
        self.descriptor_revision += 1;
        true
    }

    /// Whether the next [`ensure`](Self::ensure) will recompute.
    pub fn is_dirty<T: CanvasItem>(&self, registry: &ItemRegistry<T>) -> bool {
        match self.stamp {
            Some(stamp) => {
                stamp.registry_revision != registry.revision()
                    || stamp.descriptor_revision != self.descriptor_revision
            }
            None => true,
        }
    }

    /// Content size from the last pass, if any.
    pub fn content_size(&self) -> Option<Size> {
        self.stamp.map(|s| s.content)
    }

    /// Number of full layout passes run so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Bounds of an item ignoring spring extents, or `None` when the
    /// address is invalid or the result would be degenerate.
    pub fn resolve(&self, address: ItemAddress, size: ItemSize) -> Option<Rect> {
        let origin = self.descriptor.origin(address)?;
        let width = LayoutDescriptor::measure(size.width, self.descriptor.cell.width)?;
        let height = LayoutDescriptor::measure(size.height, self.descriptor.cell.height)?;
        placed(origin, width, height)
    }

    /// Lay out the registry if stale and return the content size.
    pub fn ensure<T: CanvasItem>(&mut self, registry: &mut ItemRegistry<T>) -> Size {
        if !self.is_dirty(registry) {
            if let Some(stamp) = self.stamp {
                return stamp.content;
            }
        }
        let content = self.relayout(registry);
        self.stamp = Some(LayoutStamp {
            registry_revision: registry.revision(),
            descriptor_revision: self.descriptor_revision,
            content,
        });
        content
    }

    fn relayout<T: CanvasItem>(&mut self, registry: &mut ItemRegistry<T>) -> Size {
        self.passes += 1;
        let d = self.descriptor;

        struct Measured {
            id: ItemId,
            origin: Option<Point>,
            width: Option<i32>,
            height: Option<i32>,
            visible: bool,
        }

        let measured: Vec<Measured> = registry
            .iter()
            .map(|(id, item)| {
                let size = item.size();
                Measured {
                    id,
                    origin: d.origin(item.address()),
                    width: LayoutDescriptor::measure(size.width, d.cell.width),
                    height: LayoutDescriptor::measure(size.height, d.cell.height),
                    visible: item.is_visible(),
                }
            })
            .collect();

        // Spring extents fill to the edge of the fixed-size content.
        let mut fixed_right = 0;
        let mut fixed_bottom = 0;
        for m in measured.iter().filter(|m| m.visible) {
            let Some(origin) = m.origin else { continue };
            let right_edge = m.width.filter(|w| *w > 0).and_then(|w| origin.x.checked_add(w));
            if let Some(edge) = right_edge {
                fixed_right = fixed_right.max(edge);
            }
            let bottom_edge = m.height.filter(|h| *h > 0).and_then(|h| origin.y.checked_add(h));
            if let Some(edge) = bottom_edge {
                fixed_bottom = fixed_bottom.max(edge);
            }
        }

        let mut right = 0;
        let mut bottom = 0;
        for m in &measured {
            let bounds = m.origin.and_then(|origin| {
                let width = m.width.unwrap_or(fixed_right - origin.x);
                let height = m.height.unwrap_or(fixed_bottom - origin.y);
                placed(origin, width, height)
            });

            if let Some(b) = bounds.filter(|_| m.visible) {
                right = right.max(b.right());
                bottom = bottom.max(b.bottom());
            }
            registry.set_bounds(m.id, bounds);
        }

        let content = if right == 0 && bottom == 0 {
            Size::default()
        } else {
            Size::new(right.saturating_add(d.padding), bottom.saturating_add(d.padding))
        };
        tracing::debug!(
            items = measured.len(),
            width = content.width,
            height = content.height,
            "layout pass"
        );
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SurfaceId;

    #[derive(Debug, Clone)]
    struct Cell {
        address: ItemAddress,
        size: ItemSize,
        visible: bool,
    }

    impl Cell {
        fn at(col: i32, row: i32) -> Self {
            Self {
                address: ItemAddress::Cell { col, row },
                size: ItemSize::default(),
                visible: true,
            }
        }
    }

    impl CanvasItem for Cell {
        fn address(&self) -> ItemAddress {
            self.address
        }
        fn size(&self) -> ItemSize {
            self.size
        }
        fn is_visible(&self) -> bool {
            self.visible
        }
    }

    fn descriptor() -> LayoutDescriptor {
        LayoutDescriptor {
            cell: Size::new(100, 50),
            spacing: Size::new(10, 5),
            padding: 20,
        }
    }

    #[test]
    fn test_cell_origin() {
        let d = descriptor();
        assert_eq!(d.cell_origin(0, 0), Some(Point::new(20, 20)));
        assert_eq!(d.cell_origin(2, 3), Some(Point::new(240, 185)));
        assert_eq!(d.cell_origin(30_000_000, 0), None);
    }

    #[test]
    fn test_out_of_range_address_gets_no_bounds() {
        let mut reg = ItemRegistry::new(SurfaceId(1));
        let near = reg.insert(Cell::at(1, 0));
        let far_cell = reg.insert(Cell::at(30_000_000, 0));
        let far_row = reg.insert(Cell::at(0, i32::MAX));
        let far_free = reg.insert(Cell {
            address: ItemAddress::Free {
                x: i32::MAX - 10,
                y: 0,
            },
            size: ItemSize::fixed(50, 50),
            visible: true,
        });
        let banner = reg.insert(Cell {
            size: ItemSize {
                width: Extent::Spring,
                height: Extent::Fixed(30),
            },
            ..Cell::at(0, 1)
        });
        let mut layout = LayoutEngine::new(descriptor());
        let content = layout.ensure(&mut reg);

        assert_eq!(reg.bounds(far_cell), None);
        assert_eq!(reg.bounds(far_row), None);
        assert_eq!(reg.bounds(far_free), None);
        assert_eq!(reg.bounds(near), Some(Rect::new(130, 20, 100, 50)));
        assert_eq!(reg.bounds(banner), Some(Rect::new(20, 75, 210, 30)));
        assert_eq!(content, Size::new(250, 125));
        assert_eq!(
            layout.resolve(ItemAddress::Cell { col: 30_000_000, row: 0 }, ItemSize::default()),
            None
        );
    }

    #[test]
    fn test_grid_and_free_bounds() {
        let mut reg = ItemRegistry::new(SurfaceId(1));
        let grid = reg.insert(Cell::at(1, 1));
        let free = reg.insert(Cell {
            address: ItemAddress::Free { x: 500, y: 10 },
            size: ItemSize::fixed(30, 40),
            visible: true,
        });
        let mut layout = LayoutEngine::new(descriptor());
        let content = layout.ensure(&mut reg);

        assert_eq!(reg.bounds(grid), Some(Rect::new(130, 75, 100, 50)));
        assert_eq!(reg.bounds(free), Some(Rect::new(500, 10, 30, 40)));
        assert_eq!(content, Size::new(550, 145));
    }

    #[test]
    fn test_invalid_address_gets_no_bounds() {
        let mut reg = ItemRegistry::new(SurfaceId(1));
        let bad = reg.insert(Cell::at(-1, 0));
        let unplaced = reg.insert(Cell {
            address: ItemAddress::Unplaced,
            ..Cell::at(0, 0)
        });
        let degenerate = reg.insert(Cell {
            size: ItemSize::fixed(0, 10),
            ..Cell::at(0, 0)
        });
        let mut layout = LayoutEngine::new(descriptor());
        let content = layout.ensure(&mut reg);

        assert_eq!(reg.bounds(bad), None);
        assert_eq!(reg.bounds(unplaced), None);
        assert_eq!(reg.bounds(degenerate), None);
        assert_eq!(content, Size::default());
    }

    #[test]
    fn test_spring_fills_to_content_edge() {
        let mut reg = ItemRegistry::new(SurfaceId(1));
        reg.insert(Cell::at(3, 0)); // right edge: 20 + 3*110 + 100 = 450
        let banner = reg.insert(Cell {
            size: ItemSize {
                width: Extent::Spring,
                height: Extent::Fixed(30),
            },
            ..Cell::at(0, 2)
        });
        let mut layout = LayoutEngine::new(descriptor());
        layout.ensure(&mut reg);

        assert_eq!(reg.bounds(banner), Some(Rect::new(20, 130, 430, 30)));
    }

    #[test]
    fn test_hidden_items_do_not_grow_content() {
        let mut reg = ItemRegistry::new(SurfaceId(1));
        reg.insert(Cell::at(0, 0));
        let far = reg.insert(Cell {
            visible: false,
            ..Cell::at(20, 20)
        });
        let mut layout = LayoutEngine::new(descriptor());
        let content = layout.ensure(&mut reg);

        assert_eq!(content, Size::new(140, 90));
        assert!(reg.bounds(far).is_some(), "hidden items still get bounds");
    }

    #[test]
    fn test_layout_is_lazy() {
        let mut reg = ItemRegistry::new(SurfaceId(1));
        let id = reg.insert(Cell::at(0, 0));
        let mut layout = LayoutEngine::new(descriptor());

        layout.ensure(&mut reg);
        layout.ensure(&mut reg);
        assert_eq!(layout.passes(), 1);
        assert!(!layout.is_dirty(&reg));

        reg.modify(id, |c| c.address = ItemAddress::Cell { col: 4, row: 0 });
        assert!(layout.is_dirty(&reg));
        let content = layout.ensure(&mut reg);
        assert_eq!(layout.passes(), 2);
        assert_eq!(content.width, 20 + 4 * 110 + 100 + 20);

        assert!(!layout.set_descriptor(descriptor()));
        assert!(layout.set_descriptor(LayoutDescriptor::default()));
        assert!(layout.is_dirty(&reg));
    }
}
