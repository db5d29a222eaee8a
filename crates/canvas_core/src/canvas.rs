//! The [`VirtualCanvas`] facade.
//!
//! Wires the registry, layout, scroll negotiation, interaction and redraw
//! gating together. Every entry point that changes what is shown funnels
//! into [`VirtualCanvas::request_redraw`].

use crate::backend::{
    Frame, ItemVisualState, PaintItem, Painter, ScrollbarWidget, SurfaceProvider,
};
use crate::geometry::{Point, Rect, Size};
use crate::input::{Modifiers, MouseButtons};
use crate::interaction::{
    DragState, InteractionConfig, InteractionController, InteractionEvent, MouseState,
    SelectionSet,
};
use crate::layout::{LayoutDescriptor, LayoutEngine};
use crate::mapper::CoordinateMapper;
use crate::redraw::{Admission, RedrawGate, RedrawOutcome, RedrawStats};
use crate::registry::{CanvasItem, ItemId, ItemRegistry, RegistryChange, SurfaceId};
use crate::scroll::{Axis, AxisExtent, Negotiation, ScrollbarState, Scrollbars};
use crate::CanvasError;
use std::fmt;
use std::time::Instant;

/// Construction parameters of a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasConfig {
    pub surface: SurfaceId,
    pub scrollbar_thickness: i32,
    pub small_step: i32,
    pub horizontal: AxisExtent,
    pub vertical: AxisExtent,
    pub layout: LayoutDescriptor,
    pub interaction: InteractionConfig,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            surface: SurfaceId(1),
            scrollbar_thickness: 17,
            small_step: 16,
            horizontal: AxisExtent::Content,
            vertical: AxisExtent::Content,
            layout: LayoutDescriptor::default(),
            interaction: InteractionConfig::default(),
        }
    }
}

/// Model side of the canvas: everything except the gate and the presenter.
struct Scene<T> {
    registry: ItemRegistry<T>,
    layout: LayoutEngine,
    scrollbars: Scrollbars,
    horizontal_extent: AxisExtent,
    vertical_extent: AxisExtent,
    horizontal_widget: Option<Box<dyn ScrollbarWidget>>,
    vertical_widget: Option<Box<dyn ScrollbarWidget>>,
    controller: InteractionController,
    /// Last physical pointer position while on the surface.
    pointer: Option<Point>,
    /// Client size, extent mode or thickness changed since the last negotiation.
    geometry_dirty: bool,
    events: Vec<InteractionEvent>,
}

impl<T: CanvasItem> Scene<T> {
    fn new(config: &CanvasConfig) -> Self {
        Self {
            registry: ItemRegistry::new(config.surface),
            layout: LayoutEngine::new(config.layout),
            scrollbars: Scrollbars::new(config.scrollbar_thickness, config.small_step),
            horizontal_extent: config.horizontal,
            vertical_extent: config.vertical,
            horizontal_widget: None,
            vertical_widget: None,
            controller: InteractionController::new(config.interaction),
            pointer: None,
            geometry_dirty: true,
            events: Vec::new(),
        }
    }

    fn extent_mode(&self, axis: Axis) -> AxisExtent {
        match axis {
            Axis::Horizontal => self.horizontal_extent,
            Axis::Vertical => self.vertical_extent,
        }
    }

    fn resolve_extent(&self, axis: Axis, content: Size) -> Option<i32> {
        match self.extent_mode(axis) {
            AxisExtent::Native => None,
            AxisExtent::Content => Some(axis.of_size(content)),
            AxisExtent::Fixed(extent) => Some(extent),
        }
    }

    fn widget_mut(&mut self, axis: Axis) -> Option<&mut (dyn ScrollbarWidget + 'static)> {
        match axis {
            Axis::Horizontal => self.horizontal_widget.as_deref_mut(),
            Axis::Vertical => self.vertical_widget.as_deref_mut(),
        }
    }

    /// Lay out if stale, renegotiate scrollbars and re-hit-test a stationary
    /// pointer. `None` if nothing was stale.
    fn ensure_layout(&mut self) -> Option<Negotiation> {
        if !self.geometry_dirty && !self.layout.is_dirty(&self.registry) {
            return None;
        }
        let content = self.layout.ensure(&mut self.registry);
        let horizontal = self.resolve_extent(Axis::Horizontal, content);
        let vertical = self.resolve_extent(Axis::Vertical, content);
        self.scrollbars.set_extents(horizontal, vertical);

        let negotiation = self.scrollbars.negotiate();
        self.geometry_dirty = false;
        tracing::debug!(
            horizontal = negotiation.horizontal,
            vertical = negotiation.vertical,
            offset_changed = negotiation.offset_changed,
            "viewport updated"
        );
        self.sync_scrollbars();
        self.refresh_hover();
        Some(negotiation)
    }

    /// Push current values to the widgets with the sync guard held.
    fn sync_scrollbars(&mut self) {
        self.scrollbars.set_syncing(true);
        for axis in [Axis::Horizontal, Axis::Vertical] {
            let state = self.scrollbars.axis(axis).scrollbar_state();
            let notified = self.widget_mut(axis).and_then(|widget| widget.push(state));
            if let Some(value) = notified {
                self.scrollbar_value_changed(axis, value);
            }
        }
        self.scrollbars.set_syncing(false);
    }

    fn scrollbar_value_changed(&mut self, axis: Axis, value: i32) -> bool {
        if self.scrollbars.is_syncing() {
            tracing::trace!(?axis, value, "scrollbar notification during sync ignored");
            return false;
        }
        self.scrollbars.axis_mut(axis).set_offset(value)
    }

    fn mapper(&self) -> CoordinateMapper {
        CoordinateMapper::new(self.scrollbars.offset(), self.scrollbars.item_area().size())
    }

    /// Virtual position under a physical point, or `None` outside the item area.
    fn virtual_at(&self, physical: Point) -> Option<Point> {
        self.scrollbars
            .item_area()
            .contains(physical)
            .then(|| self.mapper().to_virtual(physical))
    }

    fn refresh_hover(&mut self) {
        if let Some(physical) = self.pointer {
            let at = self.virtual_at(physical);
            let events = self.controller.refresh_hover(&self.registry, at);
            self.events.extend(events);
        }
    }

    fn frame(&self) -> Frame<'_, T> {
        let item_area = self.scrollbars.item_area();
        let mapper = self.mapper();
        let selection = self.controller.selection();

        let items = self
            .registry
            .iter_z()
            .filter(|(_, item, _)| item.is_visible())
            .filter_map(|(id, item, bounds)| {
                let (physical, visible) = mapper.bounds_to_physical(bounds?);
                if !visible {
                    return None;
                }
                let clip = physical.intersection(&item_area)?;
                Some(PaintItem {
                    id,
                    item,
                    bounds: physical,
                    clip,
                    state: ItemVisualState {
                        mouse: self.controller.mouse_state(id),
                        selected: selection.contains(id),
                        enabled: item.is_enabled(),
                    },
                })
            })
            .collect();

        Frame {
            client: self.scrollbars.client(),
            item_area,
            offset: mapper.offset(),
            items,
        }
    }
}

struct BackBuffer<H> {
    handle: H,
    size: Size,
    /// Holds a completely painted frame.
    valid: bool,
}

/// Owns the surface provider, the painter and the back buffer.
struct Presenter<S: SurfaceProvider, P> {
    surface: S,
    painter: P,
    back: Option<BackBuffer<S::Handle>>,
}

fn surface_error(err: impl fmt::Display) -> CanvasError {
    CanvasError::Surface(err.to_string())
}

impl<S: SurfaceProvider, P> Presenter<S, P> {
    /// Paint a frame into the back buffer and blit it. Returns `false` when
    /// the client area is empty and nothing was drawn.
    fn present<T>(&mut self, frame: &Frame<'_, T>) -> Result<bool, CanvasError>
    where
        P: Painter<T, S::Handle>,
    {
        if frame.client.is_empty() {
            return Ok(false);
        }
        let back = match self.back.take() {
            Some(back) if back.size == frame.client => back,
            stale => {
                if let Some(old) = stale {
                    self.surface.dispose(old.handle);
                }
                let handle = self
                    .surface
                    .acquire_drawable(frame.client)
                    .map_err(surface_error)?;
                BackBuffer {
                    handle,
                    size: frame.client,
                    valid: false,
                }
            }
        };
        let back = self.back.insert(back);
        back.valid = false;
        self.painter.paint(&mut back.handle, frame);
        self.surface.blit(&back.handle).map_err(surface_error)?;
        back.valid = true;
        Ok(true)
    }

    fn present_last(&mut self, client: Size) -> Result<(), CanvasError> {
        match self.back.as_ref() {
            Some(back) if back.valid && back.size == client => {
                self.surface.blit(&back.handle).map_err(surface_error)
            }
            _ => Err(CanvasError::NoValidFrame),
        }
    }

    fn release(&mut self) {
        if let Some(back) = self.back.take() {
            self.surface.dispose(back.handle);
        }
    }
}

/// A scrollable virtual canvas over a collection of items.
pub struct VirtualCanvas<T, S: SurfaceProvider, P> {
    gate: RedrawGate,
    scene: Scene<T>,
    presenter: Presenter<S, P>,
}

impl<T, S, P> VirtualCanvas<T, S, P>
where
    T: CanvasItem,
    S: SurfaceProvider,
    P: Painter<T, S::Handle>,
{
    /// Create a detached canvas with an empty client area.
    pub fn new(config: CanvasConfig, surface: S, painter: P) -> Self {
        Self {
            gate: RedrawGate::new(),
            scene: Scene::new(&config),
            presenter: Presenter {
                surface,
                painter,
                back: None,
            },
        }
    }

    /// Connect a scrollbar widget to an axis and push its current values.
    pub fn set_scrollbar_widget(&mut self, axis: Axis, widget: Box<dyn ScrollbarWidget>) {
        match axis {
            Axis::Horizontal => self.scene.horizontal_widget = Some(widget),
            Axis::Vertical => self.scene.vertical_widget = Some(widget),
        }
        self.scene.sync_scrollbars();
    }

    // ---- State --------------------------------------------------------

    pub fn registry(&self) -> &ItemRegistry<T> {
        &self.scene.registry
    }

    pub fn get(&self, id: ItemId) -> Option<&T> {
        self.scene.registry.get(id)
    }

    /// Virtual bounds from the last layout pass.
    pub fn item_bounds(&self, id: ItemId) -> Option<Rect> {
        self.scene.registry.bounds(id)
    }

    pub fn client_size(&self) -> Size {
        self.scene.scrollbars.client()
    }

    /// Client area minus active scrollbar strips, in physical pixels.
    pub fn item_area(&self) -> Rect {
        self.scene.scrollbars.item_area()
    }

    /// Per-axis virtual begin.
    pub fn offset(&self) -> Point {
        self.scene.scrollbars.offset()
    }

    pub fn mapper(&self) -> CoordinateMapper {
        self.scene.mapper()
    }

    pub fn content_size(&self) -> Option<Size> {
        self.scene.layout.content_size()
    }

    pub fn layout_passes(&self) -> u64 {
        self.scene.layout.passes()
    }

    pub fn layout_descriptor(&self) -> &LayoutDescriptor {
        self.scene.layout.descriptor()
    }

    pub fn uses_scrollbar(&self, axis: Axis) -> bool {
        self.scene.scrollbars.axis(axis).uses_scrollbar()
    }

    pub fn scrollbar_state(&self, axis: Axis) -> ScrollbarState {
        self.scene.scrollbars.axis(axis).scrollbar_state()
    }

    pub fn selection(&self) -> &SelectionSet {
        self.scene.controller.selection()
    }

    pub fn hovered(&self) -> Option<ItemId> {
        self.scene.controller.hover()
    }

    pub fn mouse_state(&self, id: ItemId) -> MouseState {
        self.scene.controller.mouse_state(id)
    }

    pub fn drag_state(&self) -> DragState {
        self.scene.controller.drag_state()
    }

    pub fn stats(&self) -> RedrawStats {
        self.gate.stats()
    }

    pub fn is_attached(&self) -> bool {
        self.gate.is_attached()
    }

    pub fn is_suppressed(&self) -> bool {
        self.gate.is_suppressed()
    }

    pub fn surface(&self) -> &S {
        &self.presenter.surface
    }

    pub fn painter(&self) -> &P {
        &self.presenter.painter
    }

    /// Drain interaction events queued by operations that do not return them
    /// directly (scrolling under a stationary pointer, item changes).
    /// Pending layout runs first so hover reflects the current items.
    pub fn take_events(&mut self) -> Vec<InteractionEvent> {
        self.scene.ensure_layout();
        std::mem::take(&mut self.scene.events)
    }

    // ---- Host attachment ----------------------------------------------

    /// Attach a host. Returns `true` if an owed redraw was painted.
    pub fn attach(&mut self) -> Result<bool, CanvasError> {
        if self.gate.attach() {
            self.request_redraw()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Detach the host and release the back buffer.
    pub fn detach(&mut self) {
        self.gate.detach();
        self.presenter.release();
    }

    // ---- Viewport -----------------------------------------------------

    /// New client size from the host. Renegotiates scrollbars, re-clamps
    /// offsets and re-acquires the back buffer on the next paint.
    pub fn resize(&mut self, client: Size) -> Result<Negotiation, CanvasError> {
        self.scene.scrollbars.set_client(client);
        self.scene.geometry_dirty = true;
        self.presenter.release();
        let negotiation = self.scene.ensure_layout().unwrap_or_default();
        tracing::debug!(width = client.width, height = client.height, "resized");
        self.request_redraw()?;
        Ok(negotiation)
    }

    pub fn set_extent_mode(&mut self, axis: Axis, mode: AxisExtent) -> Result<(), CanvasError> {
        match axis {
            Axis::Horizontal => self.scene.horizontal_extent = mode,
            Axis::Vertical => self.scene.vertical_extent = mode,
        }
        self.scene.geometry_dirty = true;
        self.request_redraw().map(|_| ())
    }

    pub fn set_scrollbar_thickness(&mut self, thickness: i32) -> Result<(), CanvasError> {
        self.scene.scrollbars.set_thickness(thickness);
        self.scene.geometry_dirty = true;
        self.request_redraw().map(|_| ())
    }

    pub fn set_layout_descriptor(&mut self, descriptor: LayoutDescriptor) -> Result<(), CanvasError> {
        if self.scene.layout.set_descriptor(descriptor) {
            self.request_redraw()?;
        }
        Ok(())
    }

    /// Bring layout and scrollbars up to date without painting.
    /// Returns whether anything was stale.
    pub fn ensure_layout(&mut self) -> bool {
        self.scene.ensure_layout().is_some()
    }

    /// Set one axis's offset, clamped. Returns whether it changed.
    pub fn set_offset(&mut self, axis: Axis, offset: i32) -> Result<bool, CanvasError> {
        self.scene.ensure_layout();
        let changed = self.scene.scrollbars.axis_mut(axis).set_offset(offset);
        self.after_scroll(changed)
    }

    pub fn scroll_by(&mut self, axis: Axis, delta: i32) -> Result<bool, CanvasError> {
        self.scene.ensure_layout();
        let changed = self.scene.scrollbars.axis_mut(axis).scroll_by(delta);
        self.after_scroll(changed)
    }

    pub fn scroll_lines(&mut self, axis: Axis, lines: i32) -> Result<bool, CanvasError> {
        self.scene.ensure_layout();
        let changed = self.scene.scrollbars.axis_mut(axis).scroll_lines(lines);
        self.after_scroll(changed)
    }

    pub fn scroll_pages(&mut self, axis: Axis, pages: i32) -> Result<bool, CanvasError> {
        self.scene.ensure_layout();
        let changed = self.scene.scrollbars.axis_mut(axis).scroll_pages(pages);
        self.after_scroll(changed)
    }

    /// Mouse wheel. Positive deltas scroll towards larger offsets; Shift
    /// scrolls horizontally.
    pub fn wheel(&mut self, delta_lines: i32, modifiers: Modifiers) -> Result<bool, CanvasError> {
        let axis = if modifiers.contains(Modifiers::SHIFT) {
            Axis::Horizontal
        } else {
            Axis::Vertical
        };
        self.scroll_lines(axis, delta_lines)
    }

    /// Smallest offset change that shows the item's bounds.
    pub fn scroll_into_view(&mut self, id: ItemId) -> Result<bool, CanvasError> {
        if !self.scene.registry.contains(id) {
            return Err(CanvasError::ItemNotFound(id));
        }
        self.scene.ensure_layout();
        let Some(bounds) = self.scene.registry.bounds(id) else {
            return Ok(false);
        };
        let mut changed = false;
        for axis in [Axis::Horizontal, Axis::Vertical] {
            let (start, len) = axis.span_of(bounds);
            changed |= self.scene.scrollbars.axis_mut(axis).reveal(start, len);
        }
        self.after_scroll(changed)
    }

    /// Value-changed notification from a scrollbar widget. Ignored while the
    /// canvas itself is pushing values to the widgets.
    pub fn on_scrollbar_value_changed(&mut self, axis: Axis, value: i32) -> Result<bool, CanvasError> {
        self.scene.ensure_layout();
        let changed = self.scene.scrollbar_value_changed(axis, value);
        self.after_scroll(changed)
    }

    fn after_scroll(&mut self, changed: bool) -> Result<bool, CanvasError> {
        if changed {
            self.scene.sync_scrollbars();
            self.scene.refresh_hover();
            self.request_redraw()?;
        }
        Ok(changed)
    }

    // ---- Items --------------------------------------------------------

    /// Register a listener for structural registry changes.
    pub fn subscribe(&mut self, listener: impl FnMut(&RegistryChange) + 'static) {
        self.scene.registry.subscribe(listener);
    }

    pub fn add_item(&mut self, item: T) -> Result<ItemId, CanvasError> {
        let id = self.scene.registry.insert(item);
        self.request_redraw()?;
        Ok(id)
    }

    /// Remove an item. Hover, press and selection references are dropped
    /// and the matching leave, drag end and selection events queued.
    pub fn remove_item(&mut self, id: ItemId) -> Result<T, CanvasError> {
        let item = self
            .scene
            .registry
            .remove(id)
            .ok_or(CanvasError::ItemNotFound(id))?;
        let events = self.scene.controller.forget(id);
        self.scene.events.extend(events);
        self.request_redraw()?;
        Ok(item)
    }

    pub fn modify_item<R>(&mut self, id: ItemId, f: impl FnOnce(&mut T) -> R) -> Result<R, CanvasError> {
        let result = self
            .scene
            .registry
            .modify(id, f)
            .ok_or(CanvasError::ItemNotFound(id))?;
        self.request_redraw()?;
        Ok(result)
    }

    pub fn clear_items(&mut self) -> Result<Vec<T>, CanvasError> {
        let items = self.scene.registry.clear();
        let events = self.scene.controller.forget_all();
        self.scene.events.extend(events);
        self.request_redraw()?;
        Ok(items)
    }

    pub fn bring_to_front(&mut self, id: ItemId) -> Result<(), CanvasError> {
        if !self.scene.registry.bring_to_front(id) {
            return Err(CanvasError::ItemNotFound(id));
        }
        self.request_redraw().map(|_| ())
    }

    pub fn send_to_back(&mut self, id: ItemId) -> Result<(), CanvasError> {
        if !self.scene.registry.send_to_back(id) {
            return Err(CanvasError::ItemNotFound(id));
        }
        self.request_redraw().map(|_| ())
    }

    // ---- Pointer ------------------------------------------------------

    /// Item under a physical point, honouring hover stickiness.
    pub fn hit_test(&mut self, physical: Point) -> Option<ItemId> {
        self.scene.ensure_layout();
        let at = self.scene.virtual_at(physical)?;
        self.scene
            .registry
            .hit_test(at, self.scene.controller.hover())
    }

    pub fn mouse_move(&mut self, physical: Point) -> Result<Vec<InteractionEvent>, CanvasError> {
        self.scene.ensure_layout();
        self.scene.pointer = Some(physical);
        let at = self.scene.virtual_at(physical);
        let events = self.scene.controller.pointer_move(&self.scene.registry, at);
        self.dispatch(events)
    }

    pub fn mouse_down(
        &mut self,
        physical: Point,
        buttons: MouseButtons,
        modifiers: Modifiers,
        now: Instant,
    ) -> Result<Vec<InteractionEvent>, CanvasError> {
        self.scene.ensure_layout();
        self.scene.pointer = Some(physical);
        let at = self.scene.virtual_at(physical);
        let events = self.scene.controller.pointer_down(
            &self.scene.registry,
            at,
            buttons,
            modifiers,
            now,
        );
        self.dispatch(events)
    }

    pub fn mouse_up(
        &mut self,
        physical: Point,
        modifiers: Modifiers,
    ) -> Result<Vec<InteractionEvent>, CanvasError> {
        self.scene.ensure_layout();
        self.scene.pointer = Some(physical);
        let at = self.scene.virtual_at(physical);
        let events = self
            .scene
            .controller
            .pointer_up(&self.scene.registry, at, modifiers);
        self.dispatch(events)
    }

    pub fn mouse_leave(&mut self) -> Result<Vec<InteractionEvent>, CanvasError> {
        self.scene.pointer = None;
        let events = self.scene.controller.pointer_leave();
        self.dispatch(events)
    }

    /// An external drag entered the surface.
    pub fn drag_enter(&mut self) -> bool {
        self.scene.controller.drag_enter()
    }

    pub fn drag_leave(&mut self) -> bool {
        self.scene.controller.drag_leave()
    }

    fn dispatch(&mut self, events: Vec<InteractionEvent>) -> Result<Vec<InteractionEvent>, CanvasError> {
        if !events.is_empty() {
            self.scene.events.extend(events);
            self.request_redraw()?;
        }
        Ok(self.take_events())
    }

    pub fn select_only(&mut self, id: ItemId) -> Result<(), CanvasError> {
        if !self.scene.registry.contains(id) {
            return Err(CanvasError::ItemNotFound(id));
        }
        if let Some(event) = self.scene.controller.select_only(id) {
            self.scene.events.push(event);
            self.request_redraw()?;
        }
        Ok(())
    }

    pub fn clear_selection(&mut self) -> Result<(), CanvasError> {
        if let Some(event) = self.scene.controller.clear_selection() {
            self.scene.events.push(event);
            self.request_redraw()?;
        }
        Ok(())
    }

    // ---- Redraw -------------------------------------------------------

    /// Paint now unless detached, suppressed or already painting.
    pub fn request_redraw(&mut self) -> Result<RedrawOutcome, CanvasError> {
        let guard = match self.gate.admit() {
            Admission::Paint(guard) => guard,
            Admission::Skip(outcome) => return Ok(outcome),
        };
        self.scene.ensure_layout();
        let frame = self.scene.frame();
        let drawn = self.presenter.present(&frame)?;
        guard.finish();
        tracing::trace!(items = frame.items.len(), drawn, "frame painted");
        Ok(RedrawOutcome::Painted)
    }

    pub fn suppress_push(&self) {
        self.gate.suppress_push();
    }

    /// End a suppression scope. The outermost one redraws once.
    pub fn suppress_pop(&mut self) -> Result<(), CanvasError> {
        if self.gate.suppress_pop() {
            self.request_redraw()?;
        }
        Ok(())
    }

    /// Drop all suppression scopes and redraw.
    pub fn force_clear(&mut self) -> Result<RedrawOutcome, CanvasError> {
        self.gate.force_clear();
        self.request_redraw()
    }

    /// Run `f` with redraws suppressed, then redraw once.
    pub fn batch_update<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> Result<R, CanvasError> {
        self.suppress_push();
        let result = f(self);
        self.suppress_pop()?;
        Ok(result)
    }

    /// Blit the back buffer again without repainting.
    pub fn present_last_frame(&mut self) -> Result<(), CanvasError> {
        let client = self.scene.scrollbars.client();
        self.presenter.present_last(client)
    }
}

impl<T, S: SurfaceProvider, P> fmt::Debug for VirtualCanvas<T, S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualCanvas")
            .field("registry", &self.scene.registry)
            .field("client", &self.scene.scrollbars.client())
            .field("offset", &self.scene.scrollbars.offset())
            .field("gate", &self.gate)
            .finish()
    }
}
