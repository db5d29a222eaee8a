//! vcanvas Session Protocol
//!
//! Shared types for driving a canvas session as newline-delimited JSON:
//! one [`CanvasCommand`] per input line, one [`CanvasResponse`] per output line.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vcanvas_core::{
    Axis, AxisExtent, CanvasItem, Extent, InteractionEvent, ItemAddress, ItemId, ItemSize,
    Modifiers, MouseButtons, Point, Rect, RedrawOutcome, RedrawStats, ScrollbarState, Size,
};
use vcanvas_surface::{FrameRecord, SurfaceCounters};

/// Maximum size of one protocol line, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Errors that can occur while encoding or decoding protocol lines.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Empty message")]
    Empty,

    #[error("Invalid message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Description of an item as sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSpec {
    pub address: ItemAddress,
    #[serde(default)]
    pub width: Extent,
    #[serde(default)]
    pub height: Extent,
    #[serde(default)]
    pub z_order: i32,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub interactive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ItemSpec {
    /// An auto-sized item in a grid cell.
    pub fn cell(col: i32, row: i32) -> Self {
        Self::at(ItemAddress::Cell { col, row })
    }

    /// A fixed-size item at a virtual position.
    pub fn free(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            width: Extent::Fixed(width),
            height: Extent::Fixed(height),
            ..Self::at(ItemAddress::Free { x, y })
        }
    }

    fn at(address: ItemAddress) -> Self {
        Self {
            address,
            width: Extent::Auto,
            height: Extent::Auto,
            z_order: 0,
            visible: true,
            enabled: true,
            interactive: true,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl CanvasItem for ItemSpec {
    fn address(&self) -> ItemAddress {
        self.address
    }

    fn size(&self) -> ItemSize {
        ItemSize {
            width: self.width,
            height: self.height,
        }
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn z_order(&self) -> i32 {
        self.z_order
    }
}

/// Commands accepted by a canvas session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanvasCommand {
    /// Attach the host surface. Paints once if a redraw is owed.
    Attach,
    /// Detach the host surface and release the back buffer.
    Detach,
    /// New client size in physical pixels.
    Resize { width: i32, height: i32 },
    /// Change how one axis obtains its virtual extent.
    SetExtent { axis: Axis, extent: AxisExtent },

    /// Add a single item.
    AddItem { item: ItemSpec },
    /// Add several items inside one suppressed batch.
    AddItems { items: Vec<ItemSpec> },
    /// Replace an item's description.
    UpdateItem { id: ItemId, item: ItemSpec },
    RemoveItem { id: ItemId },
    ClearItems,
    BringToFront { id: ItemId },
    SendToBack { id: ItemId },
    /// Generate `count` grid items on the background loader.
    LoadItems {
        count: usize,
        #[serde(default = "default_columns")]
        columns: i32,
    },

    SetOffset { axis: Axis, offset: i32 },
    ScrollBy { axis: Axis, delta: i32 },
    ScrollLines { axis: Axis, lines: i32 },
    ScrollPages { axis: Axis, pages: i32 },
    ScrollIntoView { id: ItemId },
    /// Mouse wheel; positive deltas scroll down (right with Shift).
    Wheel {
        delta: i32,
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// The user moved a scrollbar thumb.
    ScrollbarValue { axis: Axis, value: i32 },

    MouseMove { x: i32, y: i32 },
    MouseDown {
        x: i32,
        y: i32,
        #[serde(default = "default_buttons")]
        buttons: MouseButtons,
        #[serde(default)]
        modifiers: Modifiers,
    },
    MouseUp {
        x: i32,
        y: i32,
        #[serde(default)]
        modifiers: Modifiers,
    },
    MouseLeave,
    /// External drag entered the surface.
    DragEnter,
    /// External drag left the surface.
    DragLeave,

    SelectOnly { id: ItemId },
    ClearSelection,

    Redraw,
    SuppressPush,
    SuppressPop,
    ForceClear,
    PresentLastFrame,

    /// Physical point to item.
    HitTest { x: i32, y: i32 },
    /// Query the session state.
    QueryState,
    /// Query the last presented frame.
    QueryFrame,
    /// Respond with the state once background loading and deferred layout
    /// have settled.
    WaitIdle,
    /// Stop the session.
    Stop,
}

fn default_columns() -> i32 {
    10
}

fn default_buttons() -> MouseButtons {
    MouseButtons::LEFT
}

/// Wire form of [`InteractionEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CanvasEvent {
    ItemEnter {
        id: ItemId,
    },
    ItemLeave {
        id: ItemId,
    },
    Press {
        id: ItemId,
        buttons: MouseButtons,
        modifiers: Modifiers,
        position: Point,
    },
    Click {
        id: ItemId,
        buttons: MouseButtons,
        modifiers: Modifiers,
        position: Point,
    },
    DoubleClick {
        id: ItemId,
        buttons: MouseButtons,
        modifiers: Modifiers,
        position: Point,
    },
    DragStart {
        id: ItemId,
        origin: Point,
    },
    DragMove {
        id: ItemId,
        position: Point,
    },
    DragEnd {
        id: ItemId,
        position: Point,
        target: Option<ItemId>,
    },
    SelectionChanged {
        selected: Vec<ItemId>,
    },
}

impl From<&InteractionEvent> for CanvasEvent {
    fn from(event: &InteractionEvent) -> Self {
        match event.clone() {
            InteractionEvent::ItemEnter(id) => CanvasEvent::ItemEnter { id },
            InteractionEvent::ItemLeave(id) => CanvasEvent::ItemLeave { id },
            InteractionEvent::Press {
                item,
                buttons,
                modifiers,
                position,
            } => CanvasEvent::Press {
                id: item,
                buttons,
                modifiers,
                position,
            },
            InteractionEvent::Click {
                item,
                buttons,
                modifiers,
                position,
            } => CanvasEvent::Click {
                id: item,
                buttons,
                modifiers,
                position,
            },
            InteractionEvent::DoubleClick {
                item,
                buttons,
                modifiers,
                position,
            } => CanvasEvent::DoubleClick {
                id: item,
                buttons,
                modifiers,
                position,
            },
            InteractionEvent::DragStart { item, origin } => CanvasEvent::DragStart { id: item, origin },
            InteractionEvent::DragMove { item, position } => {
                CanvasEvent::DragMove { id: item, position }
            }
            InteractionEvent::DragEnd {
                item,
                position,
                target,
            } => CanvasEvent::DragEnd {
                id: item,
                position,
                target,
            },
            InteractionEvent::SelectionChanged { selected } => {
                CanvasEvent::SelectionChanged { selected }
            }
        }
    }
}

/// Wire form of [`RedrawOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedrawResult {
    Painted,
    DeferredDetached,
    DeferredSuppressed,
    Dropped,
}

impl From<RedrawOutcome> for RedrawResult {
    fn from(outcome: RedrawOutcome) -> Self {
        use vcanvas_core::Deferral;
        match outcome {
            RedrawOutcome::Painted => RedrawResult::Painted,
            RedrawOutcome::Deferred(Deferral::Detached) => RedrawResult::DeferredDetached,
            RedrawOutcome::Deferred(Deferral::Suppressed) => RedrawResult::DeferredSuppressed,
            RedrawOutcome::Dropped => RedrawResult::Dropped,
        }
    }
}

/// Paint statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaintStats {
    pub frames_painted: u64,
    pub requests_deferred: u64,
    pub requests_dropped: u64,
    pub layout_passes: u64,
    pub surface: SurfaceCounters,
}

impl PaintStats {
    pub fn new(redraw: RedrawStats, layout_passes: u64, surface: SurfaceCounters) -> Self {
        Self {
            frames_painted: redraw.frames_painted,
            requests_deferred: redraw.requests_deferred,
            requests_dropped: redraw.requests_dropped,
            layout_passes,
            surface,
        }
    }
}

/// Snapshot of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub attached: bool,
    pub suppressed: bool,
    pub client: Size,
    pub item_area: Rect,
    pub offset: Point,
    pub content: Option<Size>,
    pub horizontal: ScrollbarState,
    pub vertical: ScrollbarState,
    pub items: usize,
    pub hovered: Option<ItemId>,
    pub selected: Vec<ItemId>,
    /// Items still queued on the background loader.
    pub loading: usize,
    pub stats: PaintStats,
}

/// Responses from a canvas session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CanvasResponse {
    /// Command executed successfully.
    Ok,
    /// Command failed with an error.
    Error {
        /// Error message describing what went wrong.
        message: String,
    },
    ItemAdded {
        id: ItemId,
    },
    ItemsAdded {
        ids: Vec<ItemId>,
    },
    /// Background load accepted.
    Loading {
        requested: usize,
    },
    /// Result of a scrolling command.
    Scrolled {
        changed: bool,
        offset: Point,
    },
    /// Interaction events produced by a pointer command.
    Events {
        events: Vec<CanvasEvent>,
    },
    Redraw {
        outcome: RedrawResult,
    },
    Hit {
        id: Option<ItemId>,
    },
    State(SessionState),
    Frame {
        frame: Option<FrameRecord>,
    },
}

impl CanvasResponse {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Wrap interaction events.
    pub fn events<'a>(events: impl IntoIterator<Item = &'a InteractionEvent>) -> Self {
        Self::Events {
            events: events.into_iter().map(CanvasEvent::from).collect(),
        }
    }
}

/// Serialize a message as one protocol line, newline included.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(message)?;
    if line.len() + 1 > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: line.len() + 1,
            max: MAX_MESSAGE_SIZE,
        });
    }
    line.push('\n');
    Ok(line)
}

/// Parse one protocol line. Surrounding whitespace is ignored.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, ProtocolError> {
    if line.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: line.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::Empty);
    }
    Ok(serde_json::from_str(trimmed)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serialization() {
        let cmd = CanvasCommand::ClearItems;
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("clear_items"));

        let cmd2: CanvasCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, cmd2);
    }

    #[test]
    fn test_mouse_down_defaults() {
        let cmd: CanvasCommand =
            decode_line(r#"{"type": "mouse_down", "x": 10, "y": 20}"#).unwrap();
        assert_eq!(
            cmd,
            CanvasCommand::MouseDown {
                x: 10,
                y: 20,
                buttons: MouseButtons::LEFT,
                modifiers: Modifiers::empty(),
            }
        );
    }

    #[test]
    fn test_item_spec_defaults() {
        let cmd: CanvasCommand = decode_line(
            r#"{"type": "add_item", "item": {"address": {"kind": "cell", "col": 2, "row": 1}}}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            CanvasCommand::AddItem {
                item: ItemSpec::cell(2, 1)
            }
        );
    }

    #[test]
    fn test_item_spec_fixed_and_spring_extents() {
        let spec: ItemSpec = decode_line(
            r#"{"address": {"kind": "free", "x": 5, "y": 6}, "width": {"fixed": 40}, "height": "spring", "enabled": false}"#,
        )
        .unwrap();
        assert_eq!(spec.width, Extent::Fixed(40));
        assert_eq!(spec.height, Extent::Spring);
        assert!(!spec.is_enabled());
        assert!(spec.is_visible());
    }

    #[test]
    fn test_set_extent_command() {
        let cmd: CanvasCommand =
            decode_line(r#"{"type": "set_extent", "axis": "horizontal", "extent": {"fixed": 2000}}"#)
                .unwrap();
        assert_eq!(
            cmd,
            CanvasCommand::SetExtent {
                axis: Axis::Horizontal,
                extent: AxisExtent::Fixed(2000)
            }
        );
    }

    #[test]
    fn test_click_event_conversion() {
        let event = InteractionEvent::Click {
            item: ItemId(4),
            buttons: MouseButtons::LEFT,
            modifiers: Modifiers::CTRL,
            position: Point::new(1, 2),
        };
        let resp = CanvasResponse::events([&event]);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""status":"events""#));
        assert!(json.contains(r#""event":"click""#));
        assert!(json.contains(r#""id":4"#));
    }

    #[test]
    fn test_error_response() {
        let resp = CanvasResponse::error("Something went wrong");
        if let CanvasResponse::Error { message } = resp {
            assert_eq!(message, "Something went wrong");
        } else {
            panic!("Expected Error response");
        }
    }

    #[test]
    fn test_line_delimited_protocol() {
        let resp = CanvasResponse::Scrolled {
            changed: true,
            offset: Point::new(0, 160),
        };
        let line = encode_line(&resp).unwrap();
        assert!(line.ends_with('\n'));

        let parsed: CanvasResponse = decode_line(&line).unwrap();
        assert_eq!(resp, parsed);
    }

    #[test]
    fn test_redraw_result_mapping() {
        use vcanvas_core::Deferral;
        assert_eq!(
            RedrawResult::from(RedrawOutcome::Deferred(Deferral::Suppressed)),
            RedrawResult::DeferredSuppressed
        );
        let json = serde_json::to_string(&CanvasResponse::Redraw {
            outcome: RedrawResult::Dropped,
        })
        .unwrap();
        assert!(json.contains("dropped"));
    }

    #[test]
    fn test_invalid_json_handling() {
        assert!(matches!(
            decode_line::<CanvasCommand>("not valid json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(decode_line::<CanvasCommand>(r#"{"type": "unknown_command"}"#).is_err());
        assert!(decode_line::<CanvasResponse>(r#"{"status": "invalid"}"#).is_err());
        assert!(matches!(
            decode_line::<CanvasCommand>("   \n"),
            Err(ProtocolError::Empty)
        ));
    }

    #[test]
    fn test_oversized_line_rejected() {
        let line = format!(
            r#"{{"type": "add_item", "item": {{"address": {{"kind": "unplaced"}}, "label": "{}"}}}}"#,
            "x".repeat(MAX_MESSAGE_SIZE)
        );
        assert!(matches!(
            decode_line::<CanvasCommand>(&line),
            Err(ProtocolError::MessageTooLarge { .. })
        ));
    }
}
