//! Fixed-window rate limiting for repeated errors.
//!
//! A window opens on the first occurrence of a key. Up to `max_per_window`
//! occurrences inside the window are allowed; later ones are suppressed.
//! The first occurrence at or after `window_start + window` opens a new
//! window and is allowed.

use crate::domain::dedup::RateLimitEntry;
use std::time::{Duration, Instant};

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(60_000);

/// Default number of occurrences allowed per window.
pub const DEFAULT_MAX_PER_WINDOW: usize = 10;

/// Decision made by a rate limiting policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Forward the occurrence
    Allow,
    /// Drop the occurrence
    Suppress,
}

impl PolicyDecision {
    /// Whether the occurrence is forwarded.
    pub fn is_allow(&self) -> bool {
        matches!(self, PolicyDecision::Allow)
    }

    /// Whether the occurrence is dropped.
    pub fn is_suppress(&self) -> bool {
        matches!(self, PolicyDecision::Suppress)
    }
}

/// Fixed-window policy applied to a [`RateLimitEntry`].
///
/// # Example
/// ```
/// use error_pipeline::{RateLimitEntry, WindowPolicy};
/// use std::time::{Duration, Instant};
///
/// let policy = WindowPolicy::new(2, Duration::from_secs(60));
/// let now = Instant::now();
/// let mut entry = RateLimitEntry::new(now);
///
/// assert!(policy.register(&mut entry, now).is_allow());
/// assert!(policy.register(&mut entry, now).is_allow());
/// assert!(policy.register(&mut entry, now).is_suppress());
///
/// // A new window opens once the old one has elapsed
/// assert!(policy
///     .register(&mut entry, now + Duration::from_secs(60))
///     .is_allow());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    max_per_window: usize,
    window: Duration,
}

impl WindowPolicy {
    /// Create a policy.
    pub fn new(max_per_window: usize, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
        }
    }

    /// Occurrences allowed per window.
    pub fn max_per_window(&self) -> usize {
        self.max_per_window
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count one occurrence at `now` and decide whether it is forwarded.
    pub fn register(&self, entry: &mut RateLimitEntry, now: Instant) -> PolicyDecision {
        if now.saturating_duration_since(entry.window_start) >= self.window {
            entry.reset(now);
            return self.decide(entry.count);
        }
        entry.count = entry.count.saturating_add(1);
        self.decide(entry.count)
    }

    fn decide(&self, count: usize) -> PolicyDecision {
        if count <= self.max_per_window {
            PolicyDecision::Allow
        } else {
            PolicyDecision::Suppress
        }
    }
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PER_WINDOW, DEFAULT_WINDOW)
    }
}
