//! vcanvas Core Engine
//!
//! Platform-agnostic virtualized canvas: a small viewport sliding over a
//! much larger virtual surface populated with items.
//!
//! This crate implements:
//! - Virtual/physical coordinate mapping
//! - Per-axis scroll state with two-pass scrollbar negotiation
//! - An ordered item registry with Z-order and sticky hit-testing
//! - Lazy layout from grid or free addresses to virtual bounds
//! - The mouse interaction state machine (hover, press, click, drag, selection)
//! - Redraw gating (suppression, reentrancy, attachment)
//!
//! [`VirtualCanvas`] wires all of it together behind one facade.

pub mod backend;
pub mod canvas;
pub mod debounce;
pub mod geometry;
pub mod input;
pub mod interaction;
pub mod layout;
pub mod mapper;
pub mod redraw;
pub mod registry;
pub mod scroll;

use thiserror::Error;

pub use backend::{Frame, ItemVisualState, PaintItem, Painter, ScrollbarWidget, SurfaceProvider};
pub use canvas::{CanvasConfig, VirtualCanvas};
pub use debounce::Debouncer;
pub use geometry::{Point, Rect, Size};
pub use input::{Modifiers, MouseButtons};
pub use interaction::{
    DragState, InteractionConfig, InteractionController, InteractionEvent, MouseState,
    PressSnapshot, SelectionSet,
};
pub use layout::{LayoutDescriptor, LayoutEngine};
pub use mapper::CoordinateMapper;
pub use redraw::{Deferral, RedrawGate, RedrawOutcome, RedrawStats};
pub use registry::{
    CanvasItem, Extent, ItemAddress, ItemId, ItemRegistry, ItemSize, RegistryChange, SurfaceId,
};
pub use scroll::{
    Axis, AxisExtent, Negotiation, ScrollAxis, ScrollbarState, Scrollbars, MIN_SCROLLBAR_MARGIN,
};

/// Errors that can occur during canvas operations.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("No valid frame has been painted at the current size")]
    NoValidFrame,

    #[error("Item {0} not found on canvas")]
    ItemNotFound(ItemId),

    #[error("Surface error: {0}")]
    Surface(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CanvasError::ItemNotFound(ItemId(3)).to_string(),
            "Item #3 not found on canvas"
        );
        assert_eq!(
            CanvasError::Surface("lost device".into()).to_string(),
            "Surface error: lost device"
        );
    }
}
