//! Redraw gating: suppression counter, reentrancy guard and attachment.
//!
//! The gate is `Cell` based so it can be consulted through a shared
//! reference while a paint is in flight. This also makes it `!Sync`: one
//! gate belongs to the single thread that owns the canvas.

use std::cell::Cell;

/// Why a redraw request did not paint right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferral {
    /// No host is attached. Painted on reattach.
    Detached,
    /// Suppressed by a batch. Painted when the last batch ends.
    Suppressed,
}

/// What happened to a redraw request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawOutcome {
    Painted,
    Deferred(Deferral),
    /// A paint was already running; the request is dropped, not retried.
    Dropped,
}

/// Diagnostics counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RedrawStats {
    pub frames_painted: u64,
    pub requests_deferred: u64,
    pub requests_dropped: u64,
}

/// Result of asking the gate for permission to paint.
#[derive(Debug)]
pub enum Admission<'a> {
    Paint(PaintGuard<'a>),
    Skip(RedrawOutcome),
}

/// Held for the duration of one paint. Dropping it clears the painting flag.
#[derive(Debug)]
pub struct PaintGuard<'a> {
    gate: &'a RedrawGate,
}

impl PaintGuard<'_> {
    /// Mark the frame as successfully painted.
    pub fn finish(self) {
        let gate = self.gate;
        gate.owed.set(false);
        gate.frames_painted.set(gate.frames_painted.get() + 1);
    }
}

impl Drop for PaintGuard<'_> {
    fn drop(&mut self) {
        self.gate.painting.set(false);
    }
}

/// Decides whether a redraw request may paint now.
#[derive(Debug, Default)]
pub struct RedrawGate {
    suppress_depth: Cell<u32>,
    painting: Cell<bool>,
    owed: Cell<bool>,
    attached: Cell<bool>,
    frames_painted: Cell<u64>,
    requests_deferred: Cell<u64>,
    requests_dropped: Cell<u64>,
}

impl RedrawGate {
    /// A detached gate. Nothing paints until [`attach`](Self::attach).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.attached.get()
    }

    pub fn is_painting(&self) -> bool {
        self.painting.get()
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppress_depth.get() > 0
    }

    pub fn suppress_depth(&self) -> u32 {
        self.suppress_depth.get()
    }

    /// Whether a request was deferred and has not been painted since.
    pub fn is_owed(&self) -> bool {
        self.owed.get()
    }

    pub fn stats(&self) -> RedrawStats {
        RedrawStats {
            frames_painted: self.frames_painted.get(),
            requests_deferred: self.requests_deferred.get(),
            requests_dropped: self.requests_dropped.get(),
        }
    }

    /// Ask to paint. On [`Admission::Paint`] the caller paints and then
    /// calls [`PaintGuard::finish`].
    pub fn admit(&self) -> Admission<'_> {
        if self.painting.get() {
            self.requests_dropped.set(self.requests_dropped.get() + 1);
            tracing::debug!("redraw requested while painting, dropped");
            return Admission::Skip(RedrawOutcome::Dropped);
        }
        let deferral = if !self.attached.get() {
            Some(Deferral::Detached)
        } else if self.is_suppressed() {
            Some(Deferral::Suppressed)
        } else {
            None
        };
        if let Some(reason) = deferral {
            self.owed.set(true);
            self.requests_deferred.set(self.requests_deferred.get() + 1);
            return Admission::Skip(RedrawOutcome::Deferred(reason));
        }
        self.painting.set(true);
        Admission::Paint(PaintGuard { gate: self })
    }

    /// Enter a suppression scope.
    pub fn suppress_push(&self) {
        self.suppress_depth.set(self.suppress_depth.get() + 1);
    }

    /// Leave a suppression scope. Returns `true` when the depth reached zero
    /// and the caller must redraw once.
    pub fn suppress_pop(&self) -> bool {
        match self.suppress_depth.get() {
            0 => {
                tracing::warn!("suppress_pop without matching suppress_push, ignored");
                false
            }
            depth => {
                self.suppress_depth.set(depth - 1);
                depth == 1
            }
        }
    }

    /// Reset the suppression depth to zero. The caller redraws unconditionally.
    pub fn force_clear(&self) {
        let depth = self.suppress_depth.replace(0);
        if depth > 0 {
            tracing::debug!(depth, "suppression force-cleared");
        }
    }

    /// Mark a host as attached. Returns `true` if a redraw is owed.
    pub fn attach(&self) -> bool {
        self.attached.set(true);
        self.owed.get()
    }

    pub fn detach(&self) {
        self.attached.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attached() -> RedrawGate {
        let gate = RedrawGate::new();
        gate.attach();
        gate
    }

    fn paint(gate: &RedrawGate) -> RedrawOutcome {
        match gate.admit() {
            Admission::Paint(guard) => {
                guard.finish();
                RedrawOutcome::Painted
            }
            Admission::Skip(outcome) => outcome,
        }
    }

    #[test]
    fn test_detached_gate_owes_redraw() {
        let gate = RedrawGate::new();
        assert_eq!(paint(&gate), RedrawOutcome::Deferred(Deferral::Detached));
        assert!(gate.is_owed());
        assert!(gate.attach());
        assert_eq!(paint(&gate), RedrawOutcome::Painted);
        assert!(!gate.is_owed());
    }

    #[test]
    fn test_reattach_without_owed_redraw() {
        let gate = attached();
        gate.detach();
        assert!(!gate.attach());
    }

    #[test]
    fn test_nested_suppression_paints_once_at_zero() {
        let gate = attached();
        gate.suppress_push();
        gate.suppress_push();
        assert_eq!(paint(&gate), RedrawOutcome::Deferred(Deferral::Suppressed));
        assert!(!gate.suppress_pop());
        assert!(gate.is_suppressed());
        assert!(gate.suppress_pop());
        assert!(!gate.is_suppressed());
        assert_eq!(paint(&gate), RedrawOutcome::Painted);
        assert_eq!(gate.stats().frames_painted, 1);
    }

    #[test]
    fn test_unbalanced_pop_is_ignored() {
        let gate = attached();
        assert!(!gate.suppress_pop());
        assert_eq!(gate.suppress_depth(), 0);
    }

    #[test]
    fn test_force_clear_resets_depth() {
        let gate = attached();
        gate.suppress_push();
        gate.suppress_push();
        gate.force_clear();
        assert_eq!(gate.suppress_depth(), 0);
        assert_eq!(paint(&gate), RedrawOutcome::Painted);
    }

    #[test]
    fn test_request_during_paint_is_dropped() {
        let gate = attached();
        let Admission::Paint(guard) = gate.admit() else {
            panic!("expected to paint");
        };
        assert!(gate.is_painting());
        assert_eq!(paint(&gate), RedrawOutcome::Dropped);
        guard.finish();

        assert!(!gate.is_painting());
        assert_eq!(
            gate.stats(),
            RedrawStats {
                frames_painted: 1,
                requests_deferred: 0,
                requests_dropped: 1,
            }
        );
    }

    #[test]
    fn test_guard_drop_without_finish_clears_painting() {
        let gate = attached();
        if let Admission::Paint(guard) = gate.admit() {
            drop(guard);
        }
        assert!(!gate.is_painting());
        assert_eq!(gate.stats().frames_painted, 0);
    }
}
