//! Recording log transport for tests.

use crate::application::entry::LogEntry;
use crate::application::ports::{LogTransport, TransportError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Log transport that records every entry it accepts.
///
/// Clones share the same record, so a test can keep one handle while the sink
/// owns another.
///
/// ```
/// use error_pipeline::infrastructure::mocks::MockTransport;
///
/// let transport = MockTransport::new();
/// transport.fail_writes(true);
/// assert!(transport.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    entries: Arc<Mutex<Vec<LogEntry>>>,
    failing: Arc<AtomicBool>,
    panicking: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every write with `TransportError::Rejected` while `fail` is set.
    pub fn fail_writes(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }

    /// Panic inside `write_entry` while `panic` is set.
    pub fn panic_writes(&self, panic: bool) {
        self.panicking.store(panic, Ordering::SeqCst);
    }

    /// Copy of the recorded entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
        self.entries
            .lock()
            .expect("MockTransport mutex poisoned - a test thread panicked while holding the lock")
    }
}

impl LogTransport for MockTransport {
    fn write_entry(&self, entry: &LogEntry) -> Result<(), TransportError> {
        if self.panicking.load(Ordering::SeqCst) {
            panic!("mock transport panicked");
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("mock transport failure".to_string()));
        }
        self.lock().push(entry.clone());
        Ok(())
    }
}
