//! Quiet-period debounce.
//!
//! Every [`poke`](Debouncer::poke) pushes the deadline out; the debouncer
//! fires once after the last poke when the quiet period has elapsed. Time
//! is passed in so hosts can drive it from any clock.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debouncer {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Record activity, restarting the quiet period.
    pub fn poke(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` exactly once per burst, when the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_after_quiet_period() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(250));
        d.poke(start);

        assert!(!d.poll(start + Duration::from_millis(100)));
        assert!(d.poll(start + Duration::from_millis(250)));
        assert!(!d.poll(start + Duration::from_millis(500)));
        assert!(!d.is_pending());
    }

    #[test]
    fn test_poke_restarts_period() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(250));
        d.poke(start);
        d.poke(start + Duration::from_millis(200));

        assert!(!d.poll(start + Duration::from_millis(300)));
        assert!(d.poll(start + Duration::from_millis(450)));
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(10));
        d.poke(start);
        d.cancel();
        assert!(!d.poll(start + Duration::from_secs(1)));
    }
}
