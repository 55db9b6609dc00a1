//! Response writer double.

use crate::application::ports::{ResponseWriter, WriteError};
use serde_json::Value;

/// Captures the response written by the error handler.
///
/// Can simulate a response that has already started (`with_headers_sent`) or a
/// connection that fails on write (`failing`).
#[derive(Debug, Clone, Default)]
pub struct MockResponseWriter {
    headers_sent: bool,
    failing: bool,
    status: Option<u16>,
    body: Option<Value>,
    writes: usize,
}

impl MockResponseWriter {
    /// Create a writer for a response that has not started.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer whose response bytes were already sent.
    pub fn with_headers_sent() -> Self {
        Self {
            headers_sent: true,
            ..Self::default()
        }
    }

    /// Create a writer whose first write fails with `WriteError::Io`.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Status of the written response.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Body of the written response.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Number of successful writes.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl ResponseWriter for MockResponseWriter {
    fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    fn write_json(&mut self, status: u16, body: &Value) -> Result<(), WriteError> {
        if self.headers_sent {
            return Err(WriteError::AlreadySent);
        }
        if self.failing {
            // The failed attempt leaves nothing on the wire
            self.failing = false;
            return Err(WriteError::Io("connection reset".to_string()));
        }
        self.headers_sent = true;
        self.status = Some(status);
        self.body = Some(body.clone());
        self.writes += 1;
        Ok(())
    }
}
