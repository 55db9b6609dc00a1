//! Dedup keys and per-key rate-limit state.

use crate::domain::canonical::CanonicalError;
use std::fmt;
use std::time::Instant;

/// Composite `statusCode:message` key identifying repeated errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey(String);

impl DedupKey {
    /// Build the key for a status and message.
    pub fn new(status_code: u16, message: &str) -> Self {
        Self(format!("{}:{}", status_code, message))
    }

    /// Key of a canonical error.
    pub fn for_error(error: &CanonicalError) -> Self {
        Self::new(error.status_code(), error.message())
    }

    /// The key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Occurrence count of one key within its current window.
///
/// Created lazily when a key is first seen, with no occurrences counted; the
/// policy then registers that first occurrence. Reset to `count = 1` when an
/// occurrence arrives after the window has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Occurrences in the current window, including suppressed ones
    pub count: usize,
    /// First occurrence of the current window
    pub window_start: Instant,
}

impl RateLimitEntry {
    /// Empty entry whose window opens at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    /// Start a new window at `now`.
    pub fn reset(&mut self, now: Instant) {
        self.count = 1;
        self.window_start = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        assert_eq!(DedupKey::new(404, "Book not found").as_str(), "404:Book not found");
        assert_ne!(DedupKey::new(404, "x"), DedupKey::new(500, "x"));
    }

    #[test]
    fn test_key_for_error() {
        let error = crate::domain::factory::ErrorFactory::new()
            .with_backtrace_capture(false)
            .create("boom", Some(503), None, None, Default::default());
        assert_eq!(DedupKey::for_error(&error).to_string(), "503:boom");
    }

    #[test]
    fn test_entry_reset() {
        let start = Instant::now();
        let mut entry = RateLimitEntry::new(start);
        entry.count = 7;
        let later = start + std::time::Duration::from_secs(61);
        entry.reset(later);
        assert_eq!(entry.count, 1);
        assert_eq!(entry.window_start, later);
    }
}
