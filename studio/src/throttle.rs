use std::time::{Duration, Instant};

/// Minimum spacing between preview recomputes (~15 Hz).
pub const PREVIEW_THROTTLE: Duration = Duration::from_millis(66);

/// Wall-clock gate. An event arriving inside the window is dropped, never
/// queued; the next event after the window fires immediately.
#[derive(Debug, Clone)]
pub struct Throttle {
    min_interval: Duration,
    last_fire: Option<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_fire: None,
        }
    }

    /// True when the caller may act now; firing is recorded.
    pub fn try_fire(&mut self, now: Instant) -> bool {
        let open = match self.last_fire {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        };
        if open {
            self.last_fire = Some(now);
        }
        open
    }

    pub fn reset(&mut self) {
        self.last_fire = None;
    }
}
