use std::time::Duration;

use tokio::time::Instant;

/// Rate-limits a side effect to at most once per `min_interval`.
///
/// The caller passes `now` so the check and the timestamp update happen in one
/// step on the session's control path.
#[derive(Debug, Clone)]
pub struct DebouncedNotifier {
    min_interval: Duration,
    enabled: bool,
    last_fired: Option<Instant>,
}

impl DebouncedNotifier {
    pub fn new(min_interval: Duration, enabled: bool) -> Self {
        Self {
            min_interval,
            enabled,
            last_fired: None,
        }
    }

    /// Returns true if the notification should fire now, recording `now` as the
    /// last fire time. Always false when disabled.
    pub fn try_fire(&mut self, now: Instant) -> bool {
        if !self.enabled {
            return false;
        }
        let due = match self.last_fired {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        };
        if due {
            self.last_fired = Some(now);
        }
        due
    }

    pub fn last_fired(&self) -> Option<Instant> {
        self.last_fired
    }
}
