//! Production clock.
//!
//! Rate-limit windows are measured on the monotonic clock so wall-clock
//! adjustments never reopen or extend a window. Log timestamps come from the
//! wall clock. Tests use `MockClock` from `crate::infrastructure::mocks`
//! (feature `test-helpers`).

use crate::application::ports::Clock;
use chrono::{DateTime, Utc};
use std::time::Instant;

/// Reads `Instant::now()` for windows and `Utc::now()` for log timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_windows_and_timestamps_advance() {
        let clock = SystemClock::new();
        let (t1, w1) = (clock.now(), clock.wall_clock());
        std::thread::sleep(Duration::from_millis(10));
        let (t2, w2) = (clock.now(), clock.wall_clock());

        assert!(t2 > t1);
        assert!(w2 >= w1);
        assert!(w1.timestamp() > 0);
    }
}
