//! Mouse interaction state machine: hover, press, click, drag and selection.
//!
//! Per hover slot the controller moves through
//! `Idle -> Hover -> Pressed -> (Click | DragSource)`.
//!
//! Ordering guarantees:
//! - when the hover target switches, `ItemLeave` is emitted before `ItemEnter`;
//! - `Click` follows the `Press` on the same item and precedes the selection
//!   update of that release.
//!
//! Click payloads come from the press snapshot. At release time no buttons
//! are held any more, so the release event cannot say which button clicked.

use crate::geometry::Point;
use crate::input::{Modifiers, MouseButtons};
use crate::registry::{CanvasItem, ItemId, ItemRegistry};
use indexmap::IndexSet;
use std::time::{Duration, Instant};

/// Thresholds for drag and double-click detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionConfig {
    /// Pointer travel (pixels, per axis) while pressed before a drag starts.
    pub drag_threshold: i32,
    /// Maximum time between two presses of a double-click.
    pub double_click_time: Duration,
    /// Maximum pointer travel (pixels, per axis) between two presses of a double-click.
    pub double_click_distance: i32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            drag_threshold: 4,
            double_click_time: Duration::from_millis(500),
            double_click_distance: 4,
        }
    }
}

/// Interaction state of a single item, as shown to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseState {
    #[default]
    None,
    Hover,
    Down,
}

/// Drag-and-drop hook state. Payloads are the caller's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    None,
    /// A drag started from one of our items.
    ActiveSource,
    /// An external drag is over the surface.
    ActiveTarget,
}

/// Everything remembered about a button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressSnapshot {
    pub item: Option<ItemId>,
    pub buttons: MouseButtons,
    pub modifiers: Modifiers,
    /// Virtual position of the press.
    pub position: Point,
    pub time: Instant,
}

/// Notifications produced by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionEvent {
    ItemEnter(ItemId),
    ItemLeave(ItemId),
    Press {
        item: ItemId,
        buttons: MouseButtons,
        modifiers: Modifiers,
        position: Point,
    },
    Click {
        item: ItemId,
        buttons: MouseButtons,
        modifiers: Modifiers,
        position: Point,
    },
    DoubleClick {
        item: ItemId,
        buttons: MouseButtons,
        modifiers: Modifiers,
        position: Point,
    },
    DragStart {
        item: ItemId,
        origin: Point,
    },
    DragMove {
        item: ItemId,
        position: Point,
    },
    DragEnd {
        item: ItemId,
        position: Point,
        /// Topmost item under the pointer other than the source.
        target: Option<ItemId>,
    },
    SelectionChanged {
        selected: Vec<ItemId>,
    },
}

/// Insertion-ordered set of selected items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    items: IndexSet<ItemId>,
}

impl SelectionSet {
    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<ItemId> {
        self.items.iter().copied().collect()
    }

    /// Select exactly `id`. Returns whether anything changed.
    pub fn select_only(&mut self, id: ItemId) -> bool {
        if self.items.len() == 1 && self.items.contains(&id) {
            return false;
        }
        self.items.clear();
        self.items.insert(id);
        true
    }

    /// Flip membership of `id` without touching the others.
    pub fn toggle(&mut self, id: ItemId) -> bool {
        if !self.items.shift_remove(&id) {
            self.items.insert(id);
        }
        true
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.items.is_empty();
        self.items.clear();
        changed
    }

    pub fn remove(&mut self, id: ItemId) -> bool {
        self.items.shift_remove(&id)
    }
}

/// The pointer state machine of one surface.
#[derive(Debug, Clone, Default)]
pub struct InteractionController {
    config: InteractionConfig,
    hover: Option<ItemId>,
    press: Option<PressSnapshot>,
    last_down: Option<PressSnapshot>,
    on_surface: bool,
    drag: DragState,
    /// Position of the last `DragMove` of the active source drag.
    drag_position: Option<Point>,
    selection: SelectionSet,
}

impl InteractionController {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    pub fn hover(&self) -> Option<ItemId> {
        self.hover
    }

    pub fn pressed(&self) -> Option<ItemId> {
        self.press.and_then(|p| p.item)
    }

    pub fn press_snapshot(&self) -> Option<&PressSnapshot> {
        self.press.as_ref()
    }

    pub fn is_on_surface(&self) -> bool {
        self.on_surface
    }

    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Render state of an item.
    pub fn mouse_state(&self, id: ItemId) -> MouseState {
        if self.pressed() == Some(id) {
            MouseState::Down
        } else if self.hover == Some(id) {
            MouseState::Hover
        } else {
            MouseState::None
        }
    }

    /// Pointer moved. `at` is the virtual position, or `None` when the
    /// pointer is on the control but outside the item area.
    pub fn pointer_move<T: CanvasItem>(
        &mut self,
        registry: &ItemRegistry<T>,
        at: Option<Point>,
    ) -> Vec<InteractionEvent> {
        self.on_surface = true;
        let mut events = Vec::new();

        let Some(press) = self.press else {
            self.update_hover(registry, at, &mut events);
            return events;
        };

        // Pressed: hover is captured by the pressed item until release.
        let (Some(item), Some(position)) = (press.item, at) else {
            return events;
        };
        match self.drag {
            DragState::None => {
                if position.max_axis_distance(press.position) > self.config.drag_threshold {
                    self.drag = DragState::ActiveSource;
                    self.drag_position = Some(position);
                    tracing::debug!(%item, "drag started");
                    events.push(InteractionEvent::DragStart {
                        item,
                        origin: press.position,
                    });
                    events.push(InteractionEvent::DragMove { item, position });
                }
            }
            DragState::ActiveSource => {
                self.drag_position = Some(position);
                events.push(InteractionEvent::DragMove { item, position });
            }
            DragState::ActiveTarget => {}
        }
        events
    }

    /// Button pressed.
    pub fn pointer_down<T: CanvasItem>(
        &mut self,
        registry: &ItemRegistry<T>,
        at: Option<Point>,
        buttons: MouseButtons,
        modifiers: Modifiers,
        now: Instant,
    ) -> Vec<InteractionEvent> {
        self.on_surface = true;
        let mut events = Vec::new();

        if let Some(press) = self.press.as_mut() {
            // Chorded press: remember the extra button, keep the original target.
            press.buttons |= buttons;
            return events;
        }

        self.update_hover(registry, at, &mut events);
        let Some(position) = at else {
            return events;
        };

        let snapshot = PressSnapshot {
            item: self.hover,
            buttons,
            modifiers,
            position,
            time: now,
        };
        self.press = Some(snapshot);

        if let Some(item) = snapshot.item {
            events.push(InteractionEvent::Press {
                item,
                buttons,
                modifiers,
                position,
            });
            if self.is_double_click(&snapshot) && is_enabled(registry, item) {
                events.push(InteractionEvent::DoubleClick {
                    item,
                    buttons,
                    modifiers,
                    position,
                });
                // A third press starts a new sequence.
                self.last_down = None;
                return events;
            }
        }
        self.last_down = Some(snapshot);
        events
    }

    fn is_double_click(&self, snapshot: &PressSnapshot) -> bool {
        let Some(last) = self.last_down else {
            return false;
        };
        last.item == snapshot.item
            && last.buttons == snapshot.buttons
            && snapshot.time.saturating_duration_since(last.time) <= self.config.double_click_time
            && snapshot.position.max_axis_distance(last.position)
                <= self.config.double_click_distance
    }

    /// Button released. `modifiers` are those held at release time and
    /// decide between replacing and toggling the selection.
    pub fn pointer_up<T: CanvasItem>(
        &mut self,
        registry: &ItemRegistry<T>,
        at: Option<Point>,
        modifiers: Modifiers,
    ) -> Vec<InteractionEvent> {
        let mut events = Vec::new();
        let Some(press) = self.press.take() else {
            self.update_hover(registry, at, &mut events);
            return events;
        };

        if self.drag == DragState::ActiveSource {
            // Outside the item area there is no drop target.
            let target = match (press.item, at) {
                (Some(item), Some(position)) => registry
                    .candidates_at(position)
                    .into_iter()
                    .find(|&id| id != item),
                _ => None,
            };
            events.extend(self.end_drag(&press, at, target));
        } else {
            let released_on = at.and_then(|p| registry.hit_test(p, press.item));
            if let Some(item) = released_on.filter(|&id| Some(id) == press.item) {
                if is_enabled(registry, item) {
                    events.push(InteractionEvent::Click {
                        item,
                        buttons: press.buttons,
                        modifiers: press.modifiers,
                        position: press.position,
                    });
                }
            }
            self.apply_selection(registry, released_on, modifiers, &mut events);
        }

        self.update_hover(registry, at, &mut events);
        events
    }

    /// Pointer left the control. Everything returns to idle.
    pub fn pointer_leave(&mut self) -> Vec<InteractionEvent> {
        let mut events = Vec::new();
        self.on_surface = false;

        if let Some(press) = self.press.take() {
            events.extend(self.end_drag(&press, None, None));
        }
        if self.drag == DragState::ActiveSource {
            self.drag = DragState::None;
            self.drag_position = None;
        }
        if let Some(old) = self.hover.take() {
            events.push(InteractionEvent::ItemLeave(old));
        }
        events
    }

    /// Finish an active source drag. Without a release position the drag
    /// ends where it was last reported, or where it was pressed.
    fn end_drag(
        &mut self,
        press: &PressSnapshot,
        position: Option<Point>,
        target: Option<ItemId>,
    ) -> Option<InteractionEvent> {
        if self.drag != DragState::ActiveSource {
            return None;
        }
        self.drag = DragState::None;
        let last = self.drag_position.take();
        let item = press.item?;
        tracing::debug!(%item, ?target, "drag finished");
        Some(InteractionEvent::DragEnd {
            item,
            position: position.or(last).unwrap_or(press.position),
            target,
        })
    }

    /// An external drag entered the surface.
    pub fn drag_enter(&mut self) -> bool {
        if self.drag == DragState::None {
            self.drag = DragState::ActiveTarget;
            return true;
        }
        false
    }

    /// An external drag left the surface or was dropped.
    pub fn drag_leave(&mut self) -> bool {
        if self.drag == DragState::ActiveTarget {
            self.drag = DragState::None;
            return true;
        }
        false
    }

    /// Replace the selection programmatically.
    pub fn select_only(&mut self, id: ItemId) -> Option<InteractionEvent> {
        self.selection.select_only(id).then(|| self.selection_event())
    }

    pub fn clear_selection(&mut self) -> Option<InteractionEvent> {
        self.selection.clear().then(|| self.selection_event())
    }

    /// Drop every reference to an item that left the registry, ending a
    /// drag it was the source of and leaving it if hovered.
    pub fn forget(&mut self, id: ItemId) -> Vec<InteractionEvent> {
        let mut events = Vec::new();
        if let Some(press) = self.press {
            if press.item == Some(id) {
                events.extend(self.end_drag(&press, None, None));
                if let Some(press) = self.press.as_mut() {
                    press.item = None;
                }
            }
        }
        if self.hover == Some(id) {
            self.hover = None;
            events.push(InteractionEvent::ItemLeave(id));
        }
        if self.last_down.is_some_and(|d| d.item == Some(id)) {
            self.last_down = None;
        }
        if self.selection.remove(id) {
            events.push(self.selection_event());
        }
        events
    }

    /// Drop every item reference at once (registry cleared).
    pub fn forget_all(&mut self) -> Vec<InteractionEvent> {
        let mut events = Vec::new();
        if let Some(press) = self.press.take() {
            events.extend(self.end_drag(&press, None, None));
        }
        if let Some(old) = self.hover.take() {
            events.push(InteractionEvent::ItemLeave(old));
        }
        self.last_down = None;
        if self.selection.clear() {
            events.push(self.selection_event());
        }
        events
    }

    /// Recompute hover after geometry changed under a stationary pointer.
    pub fn refresh_hover<T: CanvasItem>(
        &mut self,
        registry: &ItemRegistry<T>,
        at: Option<Point>,
    ) -> Vec<InteractionEvent> {
        let mut events = Vec::new();
        if self.on_surface && self.press.is_none() {
            self.update_hover(registry, at, &mut events);
        }
        events
    }

    fn update_hover<T: CanvasItem>(
        &mut self,
        registry: &ItemRegistry<T>,
        at: Option<Point>,
        events: &mut Vec<InteractionEvent>,
    ) {
        let next = at.and_then(|p| registry.hit_test(p, self.hover));
        if next == self.hover {
            return;
        }
        if let Some(old) = self.hover {
            events.push(InteractionEvent::ItemLeave(old));
        }
        if let Some(new) = next {
            events.push(InteractionEvent::ItemEnter(new));
        }
        self.hover = next;
    }

    fn apply_selection<T: CanvasItem>(
        &mut self,
        registry: &ItemRegistry<T>,
        released_on: Option<ItemId>,
        modifiers: Modifiers,
        events: &mut Vec<InteractionEvent>,
    ) {
        let changed = match released_on {
            Some(id) if !is_enabled(registry, id) => false,
            Some(id) if modifiers.is_multi_select() => self.selection.toggle(id),
            Some(id) => self.selection.select_only(id),
            None if modifiers.is_multi_select() => false,
            None => self.selection.clear(),
        };
        if changed {
            events.push(self.selection_event());
        }
    }

    fn selection_event(&self) -> InteractionEvent {
        InteractionEvent::SelectionChanged {
            selected: self.selection.to_vec(),
        }
    }
}

fn is_enabled<T: CanvasItem>(registry: &ItemRegistry<T>, id: ItemId) -> bool {
    registry.get(id).is_some_and(|item| item.is_enabled())
}
