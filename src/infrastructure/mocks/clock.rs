//! Mock clock for testing.

use crate::application::ports::Clock;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Mock clock for testing.
///
/// Allows tests to control time progression explicitly, enabling deterministic
/// testing of rate-limit windows and log timestamps.
///
/// # Examples
///
/// ```
/// use error_pipeline::infrastructure::mocks::MockClock;
/// use error_pipeline::application::ports::Clock;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let clock = MockClock::new(start);
///
/// // Time starts at the specified instant
/// assert_eq!(clock.now(), start);
///
/// // Advance time explicitly
/// clock.advance(Duration::from_secs(10));
/// assert_eq!(clock.now(), start + Duration::from_secs(10));
///
/// // Wall-clock time moves with it
/// let wall = clock.wall_clock();
/// clock.advance(Duration::from_millis(1500));
/// assert_eq!((clock.wall_clock() - wall).num_milliseconds(), 1500);
/// ```
///
/// # Thread Safety
///
/// `MockClock` is thread-safe and can be cloned to share across threads.
/// All clones share the same underlying time value, so advancing time in
/// one clone affects all clones.
#[derive(Debug, Clone)]
pub struct MockClock {
    state: Arc<Mutex<State>>,
}

#[derive(Debug)]
struct State {
    start: Instant,
    current: Instant,
    wall_start: DateTime<Utc>,
}

impl MockClock {
    /// Create a mock clock starting at a specific instant.
    ///
    /// Wall-clock time starts at 2024-01-01T00:00:00Z.
    pub fn new(start: Instant) -> Self {
        let wall_start = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH);
        Self::with_wall_clock(start, wall_start)
    }

    /// Create a mock clock whose wall-clock time starts at `wall_start`.
    pub fn with_wall_clock(start: Instant, wall_start: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                start,
                current: start,
                wall_start,
            })),
        }
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        self.lock().current += duration;
    }

    /// Set the clock to a specific instant.
    pub fn set(&self, instant: Instant) {
        self.lock().current = instant;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.lock().current
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        let state = self.lock();
        let elapsed = state.current.saturating_duration_since(state.start);
        let elapsed = chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        state.wall_start + elapsed
    }
}
