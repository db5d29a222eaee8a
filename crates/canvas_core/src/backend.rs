//! Interfaces of the collaborators a canvas drives: the drawing surface,
//! the two scrollbar widgets and the painter.
//!
//! Concrete implementations live outside this crate.

use crate::geometry::{Point, Rect, Size};
use crate::interaction::MouseState;
use crate::registry::ItemId;
use crate::scroll::ScrollbarState;

/// Allocates and presents the off-screen back buffer.
pub trait SurfaceProvider {
    /// A drawable the painter renders into.
    type Handle;
    type Error: std::fmt::Display;

    /// Allocate a drawable of `size`. Called again whenever the client size changes.
    fn acquire_drawable(&mut self, size: Size) -> Result<Self::Handle, Self::Error>;

    /// Copy a painted drawable to the visible surface.
    fn blit(&mut self, handle: &Self::Handle) -> Result<(), Self::Error>;

    /// Release a drawable that will not be used again.
    fn dispose(&mut self, handle: Self::Handle);
}

/// A scrollbar control.
pub trait ScrollbarWidget {
    /// Apply new values. If the widget raises a value-changed notification
    /// while being updated, the notified value is returned.
    fn push(&mut self, state: ScrollbarState) -> Option<i32>;
}

/// Renders one frame into a drawable.
pub trait Painter<T, H> {
    fn paint(&mut self, target: &mut H, frame: &Frame<'_, T>);
}

/// Engine-owned state of an item, as the painter should show it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemVisualState {
    pub mouse: MouseState,
    pub selected: bool,
    pub enabled: bool,
}

/// One item to draw.
#[derive(Debug)]
pub struct PaintItem<'a, T> {
    pub id: ItemId,
    pub item: &'a T,
    /// Physical bounds, unclipped.
    pub bounds: Rect,
    /// Part of `bounds` inside the item area.
    pub clip: Rect,
    pub state: ItemVisualState,
}

/// Everything needed to paint the visible part of the canvas.
#[derive(Debug)]
pub struct Frame<'a, T> {
    /// Full client size; the drawable has this size.
    pub client: Size,
    /// Client area minus scrollbar strips.
    pub item_area: Rect,
    /// Virtual coordinate shown at the item area's origin.
    pub offset: Point,
    /// Visible items, bottom to top.
    pub items: Vec<PaintItem<'a, T>>,
}
