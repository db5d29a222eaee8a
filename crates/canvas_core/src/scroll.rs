//! Per-axis scroll state and cross-axis scrollbar negotiation.
//!
//! A scrollbar on one axis eats into the client area of the other axis, so
//! whether a horizontal bar is needed depends on whether a vertical bar is
//! shown and vice versa. [`Scrollbars::negotiate`] resolves this with a
//! bounded two-pass approximation: vertical first, then horizontal, then one
//! re-check of vertical. No further passes are made.

use crate::geometry::{Point, Rect, Size};
use serde::{Deserialize, Serialize};

/// Extra room (beyond its own thickness) an axis must have before a
/// scrollbar is offered on it at all.
pub const MIN_SCROLLBAR_MARGIN: i32 = 4;

/// One of the two scrolling dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    /// The opposite axis.
    pub fn other(self) -> Axis {
        match self {
            Axis::Horizontal => Axis::Vertical,
            Axis::Vertical => Axis::Horizontal,
        }
    }

    /// This axis's component of a size.
    pub fn of_size(self, size: Size) -> i32 {
        match self {
            Axis::Horizontal => size.width,
            Axis::Vertical => size.height,
        }
    }

    /// This axis's component of a point.
    pub fn of_point(self, point: Point) -> i32 {
        match self {
            Axis::Horizontal => point.x,
            Axis::Vertical => point.y,
        }
    }

    /// Start and length of a rectangle along this axis.
    pub fn span_of(self, rect: Rect) -> (i32, i32) {
        match self {
            Axis::Horizontal => (rect.x, rect.width),
            Axis::Vertical => (rect.y, rect.height),
        }
    }
}

/// How an axis obtains its virtual extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisExtent {
    /// No virtualization: content is shown natively and never scrolls.
    Native,
    /// Extent follows the laid-out content size.
    #[default]
    Content,
    /// Explicit extent in virtual pixels.
    Fixed(i32),
}

/// Values pushed to a scrollbar widget after negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScrollbarState {
    pub minimum: i32,
    pub maximum: i32,
    pub value: i32,
    pub large_change: i32,
    pub small_change: i32,
    pub visible: bool,
}

/// Scroll state for a single axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollAxis {
    axis: Axis,
    /// Resolved virtual extent; `None` means virtualization is off.
    extent: Option<i32>,
    /// Client size on this axis as reported by the host.
    client: i32,
    offset: i32,
    uses_scrollbar: bool,
    thickness: i32,
    small_step: i32,
}

impl ScrollAxis {
    pub fn new(axis: Axis, thickness: i32, small_step: i32) -> Self {
        Self {
            axis,
            extent: None,
            client: 0,
            offset: 0,
            uses_scrollbar: false,
            thickness: thickness.max(0),
            small_step: small_step.max(1),
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn extent(&self) -> Option<i32> {
        self.extent
    }

    pub fn client(&self) -> i32 {
        self.client
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn uses_scrollbar(&self) -> bool {
        self.uses_scrollbar
    }

    pub fn thickness(&self) -> i32 {
        self.thickness
    }

    pub fn small_step(&self) -> i32 {
        self.small_step
    }

    /// Whether this axis needs a scrollbar, given the thickness the other
    /// axis's scrollbar takes away from this axis's client size.
    pub fn needs_scrollbar(&self, reserved_by_other: i32) -> bool {
        let Some(extent) = self.extent else {
            return false;
        };
        let available = self.client - reserved_by_other;
        extent > available && available > self.thickness + MIN_SCROLLBAR_MARGIN
    }

    /// Largest valid offset. Zero while no scrollbar is active.
    pub fn max_offset(&self) -> i32 {
        match self.extent {
            Some(extent) if self.uses_scrollbar => (extent - self.client).max(0),
            _ => 0,
        }
    }

    /// Set the offset, clamped to the valid range. Returns whether it changed.
    pub fn set_offset(&mut self, offset: i32) -> bool {
        let clamped = offset.clamp(0, self.max_offset());
        let changed = clamped != self.offset;
        self.offset = clamped;
        changed
    }

    /// Scroll by a pixel delta.
    pub fn scroll_by(&mut self, delta: i32) -> bool {
        self.set_offset(self.offset.saturating_add(delta))
    }

    /// Scroll by a number of small steps (arrow buttons, mouse wheel).
    pub fn scroll_lines(&mut self, lines: i32) -> bool {
        self.scroll_by(lines.saturating_mul(self.small_step))
    }

    /// Scroll by a number of visible spans (track clicks, page keys).
    pub fn scroll_pages(&mut self, pages: i32) -> bool {
        self.scroll_by(pages.saturating_mul(self.client.max(1)))
    }

    /// Minimal offset change that brings `[start, start + len)` into view.
    ///
    /// When the span is larger than the client area its start wins.
    pub fn reveal(&mut self, start: i32, len: i32) -> bool {
        let end = start.saturating_add(len.max(0));
        let target = if start < self.offset || len >= self.client {
            start
        } else if end > self.offset + self.client {
            end - self.client
        } else {
            self.offset
        };
        self.set_offset(target)
    }

    fn reclamp(&mut self) -> bool {
        self.set_offset(self.offset)
    }

    /// Values to push to this axis's scrollbar widget.
    pub fn scrollbar_state(&self) -> ScrollbarState {
        if !self.uses_scrollbar {
            return ScrollbarState {
                visible: false,
                ..ScrollbarState::default()
            };
        }
        ScrollbarState {
            minimum: 0,
            maximum: self.extent.unwrap_or(0),
            value: self.offset,
            large_change: self.client,
            small_change: self.small_step,
            visible: true,
        }
    }
}

/// Outcome of a negotiation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Negotiation {
    pub horizontal: bool,
    pub vertical: bool,
    /// Whether either offset had to be re-clamped.
    pub offset_changed: bool,
}

/// The pair of scroll axes of one viewport.
#[derive(Debug, Clone)]
pub struct Scrollbars {
    horizontal: ScrollAxis,
    vertical: ScrollAxis,
    /// Held while values are pushed to widgets so their value-changed
    /// notifications are ignored.
    syncing: bool,
}

impl Scrollbars {
    pub fn new(thickness: i32, small_step: i32) -> Self {
        Self {
            horizontal: ScrollAxis::new(Axis::Horizontal, thickness, small_step),
            vertical: ScrollAxis::new(Axis::Vertical, thickness, small_step),
            syncing: false,
        }
    }

    pub fn axis(&self, axis: Axis) -> &ScrollAxis {
        match axis {
            Axis::Horizontal => &self.horizontal,
            Axis::Vertical => &self.vertical,
        }
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut ScrollAxis {
        match axis {
            Axis::Horizontal => &mut self.horizontal,
            Axis::Vertical => &mut self.vertical,
        }
    }

    /// Per-axis virtual begin.
    pub fn offset(&self) -> Point {
        Point::new(self.horizontal.offset, self.vertical.offset)
    }

    pub fn client(&self) -> Size {
        Size::new(self.horizontal.client, self.vertical.client)
    }

    /// Update the client size. Call [`negotiate`](Self::negotiate) afterwards.
    pub fn set_client(&mut self, client: Size) {
        self.horizontal.client = client.width.max(0);
        self.vertical.client = client.height.max(0);
    }

    /// Update the resolved extents. Call [`negotiate`](Self::negotiate) afterwards.
    pub fn set_extents(&mut self, horizontal: Option<i32>, vertical: Option<i32>) {
        self.horizontal.extent = horizontal.map(|e| e.max(0));
        self.vertical.extent = vertical.map(|e| e.max(0));
    }

    pub fn set_thickness(&mut self, thickness: i32) {
        self.horizontal.thickness = thickness.max(0);
        self.vertical.thickness = thickness.max(0);
    }

    /// Run the two-pass negotiation and re-clamp both offsets.
    pub fn negotiate(&mut self) -> Negotiation {
        self.negotiate_from(Axis::Vertical)
    }

    /// Negotiation with an explicit first axis; `negotiate` starts vertical.
    pub fn negotiate_from(&mut self, first: Axis) -> Negotiation {
        self.horizontal.uses_scrollbar = false;
        self.vertical.uses_scrollbar = false;

        let second = first.other();
        let uses = self.axis(first).needs_scrollbar(0);
        self.axis_mut(first).uses_scrollbar = uses;

        let reserved = self.reserved_by(first);
        let uses = self.axis(second).needs_scrollbar(reserved);
        self.axis_mut(second).uses_scrollbar = uses;

        // Second pass: the other bar may have appeared and shrunk our room.
        let reserved = self.reserved_by(second);
        let uses = self.axis(first).needs_scrollbar(reserved);
        self.axis_mut(first).uses_scrollbar = uses;

        let h_changed = self.horizontal.reclamp();
        let v_changed = self.vertical.reclamp();

        tracing::trace!(
            horizontal = self.horizontal.uses_scrollbar,
            vertical = self.vertical.uses_scrollbar,
            "scrollbar negotiation"
        );

        Negotiation {
            horizontal: self.horizontal.uses_scrollbar,
            vertical: self.vertical.uses_scrollbar,
            offset_changed: h_changed || v_changed,
        }
    }

    /// Thickness taken from the opposite axis by `axis`'s scrollbar.
    fn reserved_by(&self, axis: Axis) -> i32 {
        let a = self.axis(axis);
        if a.uses_scrollbar {
            a.thickness
        } else {
            0
        }
    }

    /// The client area not covered by active scrollbar strips.
    ///
    /// The vertical bar occupies a strip at the right edge and the
    /// horizontal bar a strip at the bottom.
    pub fn item_area(&self) -> Rect {
        let client = self.client();
        Rect::new(
            0,
            0,
            (client.width - self.reserved_by(Axis::Vertical)).max(0),
            (client.height - self.reserved_by(Axis::Horizontal)).max(0),
        )
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing
    }

    pub(crate) fn set_syncing(&mut self, syncing: bool) {
        self.syncing = syncing;
    }
}
