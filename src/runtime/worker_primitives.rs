use crate::config::Settings;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollDelays {
    /// Delay after a pass that found nothing to do.
    pub idle: Duration,
    /// Delay after a pass that handled at least one item.
    pub busy: Duration,
}

impl PollDelays {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            idle: Duration::from_millis(settings.idle_poll_ms),
            busy: Duration::from_millis(settings.busy_poll_ms),
        }
    }

    pub fn after_pass(&self, handled: usize) -> Duration {
        if handled == 0 {
            self.idle
        } else {
            self.busy
        }
    }
}

/// Sleeps in short steps so a stop request is noticed promptly. Returns false once
/// stop has been requested.
pub fn sleep_with_stop(stop: &AtomicBool, total: Duration) -> bool {
    let mut remaining = total;
    while remaining > Duration::from_millis(0) {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let step = remaining.min(Duration::from_millis(200));
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    !stop.load(Ordering::Relaxed)
}
