//! Headless scrollbar widget.

use std::cell::Cell;
use std::rc::Rc;
use vcanvas_core::backend::ScrollbarWidget;
use vcanvas_core::ScrollbarState;

#[derive(Debug, Clone, Copy, Default)]
struct ModelState {
    state: ScrollbarState,
    pushes: u64,
    echo: bool,
}

/// A scrollbar model. Clones share state, so one clone can be handed to the
/// canvas while the host keeps another to observe it.
#[derive(Debug, Clone, Default)]
pub struct ScrollbarModel {
    inner: Rc<Cell<ModelState>>,
}

impl ScrollbarModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A model that raises a value-changed notification whenever a push
    /// moves its value, the way native scrollbar controls do.
    pub fn echoing() -> Self {
        let model = Self::default();
        model.update(|m| m.echo = true);
        model
    }

    fn update(&self, f: impl FnOnce(&mut ModelState)) {
        let mut m = self.inner.get();
        f(&mut m);
        self.inner.set(m);
    }

    pub fn state(&self) -> ScrollbarState {
        self.inner.get().state
    }

    /// Number of pushes received.
    pub fn pushes(&self) -> u64 {
        self.inner.get().pushes
    }

    /// Simulate the user dragging the thumb. Returns the value the widget
    /// reports, clamped to its own range.
    pub fn drag_to(&self, value: i32) -> i32 {
        let state = self.state();
        let max = (state.maximum - state.large_change).max(state.minimum);
        let value = value.clamp(state.minimum, max);
        self.update(|m| m.state.value = value);
        value
    }
}

impl ScrollbarWidget for ScrollbarModel {
    fn push(&mut self, state: ScrollbarState) -> Option<i32> {
        let previous = self.state();
        let echo = self.inner.get().echo;
        self.update(|m| {
            m.state = state;
            m.pushes += 1;
        });
        (echo && previous.value != state.value).then_some(state.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(value: i32) -> ScrollbarState {
        ScrollbarState {
            minimum: 0,
            maximum: 2000,
            value,
            large_change: 400,
            small_change: 16,
            visible: true,
        }
    }

    #[test]
    fn test_clones_share_state() {
        let model = ScrollbarModel::new();
        let mut widget = model.clone();
        assert_eq!(widget.push(active(100)), None);
        assert_eq!(model.state().value, 100);
        assert_eq!(model.pushes(), 1);
    }

    #[test]
    fn test_echoing_model_notifies_on_value_change() {
        let mut widget = ScrollbarModel::echoing();
        assert_eq!(widget.push(active(100)), Some(100));
        assert_eq!(widget.push(active(100)), None);
    }

    #[test]
    fn test_drag_is_clamped_to_range() {
        let mut widget = ScrollbarModel::new();
        widget.push(active(0));
        assert_eq!(widget.drag_to(5000), 1600);
        assert_eq!(widget.drag_to(-3), 0);
    }
}
