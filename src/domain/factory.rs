//! Construction of canonical errors.
//!
//! The factory substitutes defaults, filters stacks before storing them and
//! snapshots the original error as plain data.

use crate::domain::canonical::{CanonicalError, OriginalError};
use crate::domain::taxonomy::{category_for_status, status, Category, ErrorCode};
use serde_json::Value;
use std::backtrace::{Backtrace, BacktraceStatus};

/// Markers identifying frames from dependencies or the runtime.
pub const DEFAULT_STACK_MARKERS: &[&str] = &[
    "/.cargo/registry/",
    "/.cargo/git/",
    "/rustc/",
    "std::rt::",
    "std::panicking",
    "std::sys",
    "core::ops::function",
    "tokio::runtime",
    "__rust_begin_short_backtrace",
    "__rust_try",
];

/// Removes dependency and runtime frames from backtrace text.
///
/// A frame is a numbered header line (`  3: my_crate::handler`) followed by
/// any `at path:line` continuation lines. A frame is dropped as a whole when
/// any of its lines contains a marker.
#[derive(Debug, Clone)]
pub struct StackFilter {
    markers: Vec<String>,
}

impl StackFilter {
    /// Filter using [`DEFAULT_STACK_MARKERS`].
    pub fn new() -> Self {
        Self::with_markers(DEFAULT_STACK_MARKERS.iter().map(|m| m.to_string()))
    }

    /// Filter using custom markers.
    pub fn with_markers(markers: impl IntoIterator<Item = String>) -> Self {
        Self {
            markers: markers.into_iter().filter(|m| !m.is_empty()).collect(),
        }
    }

    /// Filter a stack. Returns `None` when nothing but filtered frames remain.
    pub fn filter(&self, stack: &str) -> Option<String> {
        let mut kept: Vec<&str> = Vec::new();
        let mut frame: Vec<&str> = Vec::new();
        let mut in_frame = false;

        for line in stack.lines() {
            if is_frame_header(line) {
                self.flush(&mut frame, &mut kept);
                in_frame = true;
                frame.push(line);
            } else if in_frame && line.trim_start().starts_with("at ") {
                frame.push(line);
            } else {
                self.flush(&mut frame, &mut kept);
                in_frame = false;
                if !self.is_filtered(line) {
                    kept.push(line);
                }
            }
        }
        self.flush(&mut frame, &mut kept);

        let joined = kept.join("\n");
        if joined.trim().is_empty() {
            None
        } else {
            Some(joined)
        }
    }

    fn flush<'a>(&self, frame: &mut Vec<&'a str>, kept: &mut Vec<&'a str>) {
        if frame.is_empty() {
            return;
        }
        if !frame.iter().any(|line| self.is_filtered(line)) {
            kept.extend(frame.iter());
        }
        frame.clear();
    }

    fn is_filtered(&self, line: &str) -> bool {
        self.markers.iter().any(|m| line.contains(m.as_str()))
    }
}

impl Default for StackFilter {
    fn default() -> Self {
        Self::new()
    }
}

fn is_frame_header(line: &str) -> bool {
    let trimmed = line.trim_start();
    match trimmed.split_once(':') {
        Some((index, _)) => !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Optional inputs to [`ErrorFactory::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Category override; when absent it is derived from the status code
    pub category: Option<Category>,
    /// Stack to store; when absent a backtrace is captured if enabled
    pub stack: Option<String>,
    /// Source error to snapshot
    pub original_error: Option<OriginalError>,
    /// Correlation id of the failing request
    pub request_id: Option<String>,
}

impl CreateOptions {
    /// Set the category override.
    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Set the stack.
    pub fn stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Set the source error to snapshot.
    pub fn original(mut self, message: impl Into<String>, stack: Option<String>) -> Self {
        self.original_error = Some(OriginalError::new(message, stack));
        self
    }

    /// Set the request id.
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Builds [`CanonicalError`] values.
#[derive(Debug, Clone)]
pub struct ErrorFactory {
    stack_filter: StackFilter,
    capture_backtraces: bool,
}

impl ErrorFactory {
    /// Factory with default stack markers and backtrace capture enabled.
    pub fn new() -> Self {
        Self {
            stack_filter: StackFilter::new(),
            capture_backtraces: true,
        }
    }

    /// Replace the stack filter.
    pub fn with_stack_filter(mut self, filter: StackFilter) -> Self {
        self.stack_filter = filter;
        self
    }

    /// Enable or disable capturing a backtrace when no stack is supplied.
    pub fn with_backtrace_capture(mut self, enabled: bool) -> Self {
        self.capture_backtraces = enabled;
        self
    }

    /// Whether a backtrace is captured when no stack is supplied.
    pub fn captures_backtraces(&self) -> bool {
        self.capture_backtraces
    }

    /// The stack filter in use.
    pub fn stack_filter(&self) -> &StackFilter {
        &self.stack_filter
    }

    /// Create a canonical error.
    ///
    /// Defaults: status 500 and code `UNKNOWN_ERROR`. The category comes from
    /// `options.category`, else from the status lookup when a status was
    /// given, else it is `ServerError.Unknown`. A status outside 100..=599 is
    /// replaced by 500.
    pub fn create(
        &self,
        message: impl Into<String>,
        status_code: Option<u16>,
        error_code: Option<ErrorCode>,
        details: Option<Value>,
        options: CreateOptions,
    ) -> CanonicalError {
        let valid_status = status_code.filter(|code| status::is_valid(*code));
        let category = options.category.unwrap_or_else(|| {
            valid_status
                .map(category_for_status)
                .unwrap_or(Category::Unknown)
        });
        let status_code = valid_status.unwrap_or(status::INTERNAL_SERVER_ERROR);

        let stack = match options.stack {
            Some(stack) => self.stack_filter.filter(&stack),
            None => self.captured_stack(),
        };

        let original_error = options.original_error.map(|original| {
            OriginalError::new(
                original.message,
                original
                    .stack
                    .as_deref()
                    .and_then(|s| self.stack_filter.filter(s)),
            )
        });

        CanonicalError {
            message: message.into(),
            status_code,
            error_code: error_code.unwrap_or_default(),
            category,
            details,
            request_id: options.request_id,
            original_error,
            stack,
        }
    }

    /// Fallback for source errors no classification rule recognizes.
    ///
    /// Always produces a 500 `UNKNOWN_ERROR` in `ServerError.Unknown`, keeping
    /// a snapshot of the source message and stack.
    pub fn create_unknown(
        &self,
        message: &str,
        stack: Option<&str>,
        request_id: Option<&str>,
    ) -> CanonicalError {
        let message = if message.trim().is_empty() {
            "An unexpected error occurred"
        } else {
            message
        };
        let mut options = CreateOptions::default()
            .category(Category::Unknown)
            .original(message, stack.map(str::to_string));
        options.stack = stack.map(str::to_string);
        options.request_id = request_id.map(str::to_string);

        self.create(
            message,
            Some(status::INTERNAL_SERVER_ERROR),
            Some(ErrorCode::UnknownError),
            None,
            options,
        )
    }

    fn captured_stack(&self) -> Option<String> {
        if !self.capture_backtraces {
            return None;
        }
        let backtrace = Backtrace::capture();
        if backtrace.status() != BacktraceStatus::Captured {
            return None;
        }
        self.stack_filter.filter(&backtrace.to_string())
    }
}

impl Default for ErrorFactory {
    fn default() -> Self {
        Self::new()
    }
}
