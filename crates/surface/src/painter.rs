//! A painter that records what it was asked to draw.

use crate::Drawable;
use serde::{Deserialize, Serialize};
use vcanvas_core::backend::{Frame, ItemVisualState, Painter};
use vcanvas_core::{ItemId, MouseState, Point, Rect, Size};

/// One drawn item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaintRecord {
    pub id: ItemId,
    pub bounds: Rect,
    pub clip: Rect,
    pub hover: bool,
    pub pressed: bool,
    pub selected: bool,
    pub enabled: bool,
}

impl PaintRecord {
    fn new(id: ItemId, bounds: Rect, clip: Rect, state: ItemVisualState) -> Self {
        Self {
            id,
            bounds,
            clip,
            hover: state.mouse == MouseState::Hover,
            pressed: state.mouse == MouseState::Down,
            selected: state.selected,
            enabled: state.enabled,
        }
    }
}

/// Display list of one frame, bottom to top.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Sequence number of the frame, starting at 1.
    pub frame: u64,
    pub client: Size,
    pub item_area: Rect,
    pub offset: Point,
    pub items: Vec<PaintRecord>,
}

impl FrameRecord {
    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|r| r.id).collect()
    }

    pub fn find(&self, id: ItemId) -> Option<&PaintRecord> {
        self.items.iter().find(|r| r.id == id)
    }
}

/// Writes a [`FrameRecord`] into the drawable for every frame.
#[derive(Debug, Default)]
pub struct RecordingPainter {
    frames: u64,
}

impl RecordingPainter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames painted so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl<T> Painter<T, Drawable> for RecordingPainter {
    fn paint(&mut self, target: &mut Drawable, frame: &Frame<'_, T>) {
        self.frames += 1;
        let items = frame
            .items
            .iter()
            .map(|item| PaintRecord::new(item.id, item.bounds, item.clip, item.state))
            .collect();
        target.contents = Some(FrameRecord {
            frame: self.frames,
            client: frame.client,
            item_area: frame.item_area,
            offset: frame.offset,
            items,
        });
    }
}
