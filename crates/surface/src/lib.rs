//! vcanvas Surface Collaborators
//!
//! Headless implementations of the interfaces a canvas drives.
//!
//! This crate provides:
//! - [`MemorySurface`]: an in-memory back-buffer provider with counters
//! - [`RecordingPainter`]: a painter that records a display list per frame
//! - [`ScrollbarModel`]: a scrollbar widget model that can be shared with the host

mod painter;
mod scrollbar;

pub use painter::{FrameRecord, PaintRecord, RecordingPainter};
pub use scrollbar::ScrollbarModel;
pub use vcanvas_core::backend::{
    Frame, ItemVisualState, PaintItem, Painter, ScrollbarWidget, SurfaceProvider,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vcanvas_core::Size;

/// Errors that can occur during surface operations.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Cannot allocate a drawable of {0}x{1}")]
    InvalidSize(i32, i32),

    #[error("Drawable {0} is not owned by this surface")]
    UnknownDrawable(u64),

    #[error("Surface lost")]
    Lost,
}

/// An off-screen drawable owned by a [`MemorySurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drawable {
    id: u64,
    size: Size,
    /// What the painter drew into this drawable most recently.
    pub contents: Option<FrameRecord>,
}

impl Drawable {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn size(&self) -> Size {
        self.size
    }
}

/// Allocation and presentation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SurfaceCounters {
    pub acquired: u64,
    pub disposed: u64,
    pub blits: u64,
}

/// A back-buffer provider that keeps everything in memory.
///
/// The last blitted drawable's contents stand in for the visible window.
#[derive(Debug, Default)]
pub struct MemorySurface {
    next_id: u64,
    live: Vec<u64>,
    counters: SurfaceCounters,
    presented: Option<FrameRecord>,
    lost: bool,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> SurfaceCounters {
        self.counters
    }

    /// Contents of the last blit.
    pub fn presented(&self) -> Option<&FrameRecord> {
        self.presented.as_ref()
    }

    /// Number of drawables acquired and not yet disposed.
    pub fn live_drawables(&self) -> usize {
        self.live.len()
    }

    /// Simulate device loss: every further acquire and blit fails until
    /// [`restore`](Self::restore).
    pub fn lose(&mut self) {
        self.lost = true;
    }

    pub fn restore(&mut self) {
        self.lost = false;
    }
}

impl SurfaceProvider for MemorySurface {
    type Handle = Drawable;
    type Error = SurfaceError;

    fn acquire_drawable(&mut self, size: Size) -> Result<Drawable, SurfaceError> {
        if self.lost {
            return Err(SurfaceError::Lost);
        }
        if size.is_empty() {
            return Err(SurfaceError::InvalidSize(size.width, size.height));
        }
        self.next_id += 1;
        self.live.push(self.next_id);
        self.counters.acquired += 1;
        tracing::debug!(id = self.next_id, width = size.width, height = size.height, "drawable acquired");
        Ok(Drawable {
            id: self.next_id,
            size,
            contents: None,
        })
    }

    fn blit(&mut self, handle: &Drawable) -> Result<(), SurfaceError> {
        if self.lost {
            return Err(SurfaceError::Lost);
        }
        if !self.live.contains(&handle.id) {
            return Err(SurfaceError::UnknownDrawable(handle.id));
        }
        self.counters.blits += 1;
        self.presented = handle.contents.clone();
        Ok(())
    }

    fn dispose(&mut self, handle: Drawable) {
        if let Some(pos) = self.live.iter().position(|&id| id == handle.id) {
            self.live.swap_remove(pos);
            self.counters.disposed += 1;
        } else {
            tracing::warn!(id = handle.id, "dispose of unknown drawable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_dispose() {
        let mut surface = MemorySurface::new();
        let a = surface.acquire_drawable(Size::new(10, 10)).unwrap();
        let b = surface.acquire_drawable(Size::new(20, 10)).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(surface.live_drawables(), 2);

        surface.dispose(a);
        assert_eq!(surface.live_drawables(), 1);
        assert_eq!(surface.counters().disposed, 1);
    }

    #[test]
    fn test_empty_size_is_rejected() {
        let mut surface = MemorySurface::new();
        assert!(matches!(
            surface.acquire_drawable(Size::new(0, 10)),
            Err(SurfaceError::InvalidSize(0, 10))
        ));
    }

    #[test]
    fn test_blit_of_disposed_drawable_fails() {
        let mut surface = MemorySurface::new();
        let a = surface.acquire_drawable(Size::new(10, 10)).unwrap();
        let copy = a.clone();
        surface.dispose(a);
        assert!(matches!(surface.blit(&copy), Err(SurfaceError::UnknownDrawable(_))));
    }

    #[test]
    fn test_lost_surface() {
        let mut surface = MemorySurface::new();
        let a = surface.acquire_drawable(Size::new(10, 10)).unwrap();
        surface.lose();
        assert!(matches!(surface.blit(&a), Err(SurfaceError::Lost)));
        surface.restore();
        assert!(surface.blit(&a).is_ok());
        assert_eq!(surface.counters().blits, 1);
    }
}
