//! Drives a full canvas with the headless collaborators.

use std::time::Instant;
use vcanvas_core::{
    Axis, AxisExtent, CanvasConfig, CanvasError, CanvasItem, InteractionEvent, ItemAddress,
    ItemSize, Modifiers, MouseButtons, Point, Rect, Size, VirtualCanvas,
};
use vcanvas_surface::{MemorySurface, RecordingPainter, ScrollbarModel};

#[derive(Debug, Clone)]
struct Card {
    col: i32,
    row: i32,
    enabled: bool,
}

impl CanvasItem for Card {
    fn address(&self) -> ItemAddress {
        ItemAddress::Cell {
            col: self.col,
            row: self.row,
        }
    }

    fn size(&self) -> ItemSize {
        ItemSize::default()
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

fn card(col: i32, row: i32) -> Card {
    Card {
        col,
        row,
        enabled: true,
    }
}

type Canvas = VirtualCanvas<Card, MemorySurface, RecordingPainter>;

fn canvas() -> Canvas {
    let mut canvas = VirtualCanvas::new(
        CanvasConfig::default(),
        MemorySurface::new(),
        RecordingPainter::new(),
    );
    canvas.attach().unwrap();
    canvas.resize(Size::new(400, 300)).unwrap();
    canvas
}

#[test]
fn test_grid_items_are_presented_in_z_order() {
    let mut c = canvas();
    let ids = c
        .batch_update(|c| {
            (0..3)
                .map(|col| c.add_item(card(col, 0)).unwrap())
                .collect::<Vec<_>>()
        })
        .unwrap();

    let presented = c.surface().presented().cloned().unwrap();
    assert_eq!(presented.ids(), ids);
    // Default descriptor: 96x64 cells, 8 px spacing and padding.
    assert_eq!(presented.items[1].bounds, Rect::new(112, 8, 96, 64));
}

#[test]
fn test_echoing_scrollbar_does_not_feed_back() {
    let mut c = canvas();
    let vertical = ScrollbarModel::echoing();
    c.set_scrollbar_widget(Axis::Vertical, Box::new(vertical.clone()));

    c.batch_update(|c| {
        for row in 0..20 {
            c.add_item(card(0, row)).unwrap();
        }
    })
    .unwrap();
    assert!(vertical.state().visible);

    c.scroll_lines(Axis::Vertical, 5).unwrap();
    assert_eq!(vertical.state().value, 80);
    assert_eq!(c.offset().y, 80);

    // The user drags the thumb; the widget reports the new value.
    let value = vertical.drag_to(400);
    assert!(c.on_scrollbar_value_changed(Axis::Vertical, value).unwrap());
    assert_eq!(c.offset().y, 400);
}

#[test]
fn test_hover_state_reaches_the_painter() {
    let mut c = canvas();
    let id = c.add_item(card(0, 0)).unwrap();

    let events = c.mouse_move(Point::new(20, 20)).unwrap();
    assert_eq!(events, vec![InteractionEvent::ItemEnter(id)]);

    let presented = c.surface().presented().unwrap();
    assert!(presented.find(id).unwrap().hover);
}

#[test]
fn test_disabled_card_swallows_click() {
    let mut c = canvas();
    let id = c
        .add_item(Card {
            enabled: false,
            ..card(0, 0)
        })
        .unwrap();

    let at = Point::new(20, 20);
    c.mouse_down(at, MouseButtons::LEFT, Modifiers::empty(), Instant::now())
        .unwrap();
    let events = c.mouse_up(at, Modifiers::empty()).unwrap();

    assert_eq!(c.hovered(), Some(id));
    assert!(!events
        .iter()
        .any(|e| matches!(e, InteractionEvent::Click { .. })));
    assert!(c.selection().is_empty());
}

#[test]
fn test_detach_invalidates_last_frame() {
    let mut c = canvas();
    c.add_item(card(0, 0)).unwrap();
    let painted = c.stats().frames_painted;

    c.detach();
    assert!(matches!(c.present_last_frame(), Err(CanvasError::NoValidFrame)));
    c.add_item(card(1, 0)).unwrap();
    assert!(c.attach().unwrap());
    assert_eq!(c.stats().frames_painted, painted + 1);
    assert!(c.present_last_frame().is_ok());
}

#[test]
fn test_fixed_extent_overrides_content() {
    let mut c = canvas();
    c.set_extent_mode(Axis::Horizontal, AxisExtent::Fixed(5000))
        .unwrap();
    assert!(c.uses_scrollbar(Axis::Horizontal));
    c.set_offset(Axis::Horizontal, 10_000).unwrap();
    assert_eq!(c.offset().x, 4600);
}
