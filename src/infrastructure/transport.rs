//! Log transport adapters.
//!
//! - [`TracingTransport`] emits each entry as a `tracing` event.
//! - [`ChannelTransport`] (feature `async`) queues entries for a background
//!   task that ships them with a user-supplied async writer.

use crate::application::entry::LogEntry;
use crate::application::ports::{LogTransport, TransportError};
use tracing::Level;

/// Target of the events emitted by [`TracingTransport`].
pub const LOG_TARGET: &str = "error_pipeline::log";

/// Emits log entries as `tracing` events under [`LOG_TARGET`].
///
/// The event level follows the entry severity (CRITICAL and ERROR at
/// `ERROR`, WARNING at `WARN`, NOTICE and INFO at `INFO`). The serialized
/// entry is attached as the `entry` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTransport;

impl TracingTransport {
    /// Create a new tracing transport.
    pub fn new() -> Self {
        Self
    }
}

impl LogTransport for TracingTransport {
    fn write_entry(&self, entry: &LogEntry) -> Result<(), TransportError> {
        let payload =
            serde_json::to_string(entry).map_err(|e| TransportError::Rejected(e.to_string()))?;
        let severity = entry.severity.as_str();
        let message = entry.message.as_str();

        match entry.severity.tracing_level() {
            Level::ERROR => {
                tracing::error!(target: LOG_TARGET, severity, entry = %payload, "{}", message)
            }
            Level::WARN => {
                tracing::warn!(target: LOG_TARGET, severity, entry = %payload, "{}", message)
            }
            _ => tracing::info!(target: LOG_TARGET, severity, entry = %payload, "{}", message),
        }
        Ok(())
    }
}

#[cfg(feature = "async")]
pub use channel::{ChannelTransport, ShutdownError, TransportHandle};

#[cfg(feature = "async")]
mod channel {
    use super::*;
    use std::future::Future;
    use tokio::sync::{mpsc, oneshot};
    use tokio::task::JoinHandle;

    /// Error returned when shutting down the background writer fails.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ShutdownError {
        /// The writer task panicked
        TaskPanicked,
        /// The writer task was cancelled
        TaskCancelled,
    }

    impl std::fmt::Display for ShutdownError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                ShutdownError::TaskPanicked => write!(f, "log writer task panicked"),
                ShutdownError::TaskCancelled => write!(f, "log writer task was cancelled"),
            }
        }
    }

    impl std::error::Error for ShutdownError {}

    /// Non-blocking transport backed by an unbounded queue.
    ///
    /// `write_entry` only enqueues. A background task drains the queue and
    /// calls the writer for each entry; writer failures are reported with
    /// `tracing::warn!` and dropped.
    #[derive(Debug, Clone)]
    pub struct ChannelTransport {
        sender: mpsc::UnboundedSender<LogEntry>,
    }

    impl ChannelTransport {
        /// Spawn the background writer on the current tokio runtime.
        ///
        /// Must be called from within a runtime.
        pub fn spawn<F, Fut>(mut writer: F) -> (Self, TransportHandle)
        where
            F: FnMut(LogEntry) -> Fut + Send + 'static,
            Fut: Future<Output = Result<(), TransportError>> + Send + 'static,
        {
            let (sender, mut receiver) = mpsc::unbounded_channel::<LogEntry>();
            let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

            let task = tokio::spawn(async move {
                let mut listening = true;
                loop {
                    tokio::select! {
                        biased;
                        signal = &mut shutdown_rx, if listening => {
                            if signal.is_err() {
                                // Handle dropped without shutdown; keep serving
                                listening = false;
                                continue;
                            }
                            receiver.close();
                            while let Some(entry) = receiver.recv().await {
                                write(&mut writer, entry).await;
                            }
                            break;
                        }
                        entry = receiver.recv() => match entry {
                            Some(entry) => write(&mut writer, entry).await,
                            None => break,
                        },
                    }
                }
            });

            (
                Self { sender },
                TransportHandle {
                    shutdown_tx: Some(shutdown_tx),
                    task,
                },
            )
        }
    }

    async fn write<F, Fut>(writer: &mut F, entry: LogEntry)
    where
        F: FnMut(LogEntry) -> Fut,
        Fut: Future<Output = Result<(), TransportError>>,
    {
        if let Err(e) = writer(entry).await {
            tracing::warn!(error = %e, "log transport write failed");
        }
    }

    impl LogTransport for ChannelTransport {
        fn write_entry(&self, entry: &LogEntry) -> Result<(), TransportError> {
            self.sender
                .send(entry.clone())
                .map_err(|_| TransportError::Closed)
        }
    }

    /// Handle controlling the background writer.
    #[derive(Debug)]
    pub struct TransportHandle {
        shutdown_tx: Option<oneshot::Sender<()>>,
        task: JoinHandle<()>,
    }

    impl TransportHandle {
        /// Drain queued entries, then stop the writer.
        ///
        /// Entries enqueued after this call are rejected with
        /// `TransportError::Closed`.
        pub async fn shutdown(mut self) -> Result<(), ShutdownError> {
            if let Some(tx) = self.shutdown_tx.take() {
                // The task may already have exited if every sender was dropped
                let _ = tx.send(());
            }
            match (&mut self.task).await {
                Ok(()) => Ok(()),
                Err(e) if e.is_panic() => Err(ShutdownError::TaskPanicked),
                Err(_) => Err(ShutdownError::TaskCancelled),
            }
        }

        /// Whether the writer task has exited.
        pub fn is_finished(&self) -> bool {
            self.task.is_finished()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::entry::{Environment, RequestContext};
    use crate::domain::factory::ErrorFactory;

    fn entry(message: &str) -> LogEntry {
        let error = ErrorFactory::new()
            .with_backtrace_capture(false)
            .create(message, Some(503), None, None, Default::default());
        LogEntry::for_error(
            &error,
            &RequestContext::new("GET", "/"),
            Environment::Test,
            chrono::Utc::now(),
        )
    }

    #[test]
    fn test_tracing_transport_accepts_entries() {
        assert!(TracingTransport::new().write_entry(&entry("down")).is_ok());
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_channel_transport_drains_on_shutdown() {
        use std::sync::{Arc, Mutex};

        let written = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&written);
        let (transport, handle) = ChannelTransport::spawn(move |entry: LogEntry| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(entry.message);
                Ok(())
            }
        });

        for i in 0..5 {
            transport.write_entry(&entry(&format!("e{}", i))).unwrap();
        }
        handle.shutdown().await.unwrap();

        assert_eq!(written.lock().unwrap().len(), 5);
        assert_eq!(
            transport.write_entry(&entry("late")),
            Err(TransportError::Closed)
        );
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_channel_transport_absorbs_writer_errors() {
        let (transport, handle) = ChannelTransport::spawn(|_entry: LogEntry| async {
            Err(TransportError::Rejected("quota".into()))
        });

        assert!(transport.write_entry(&entry("x")).is_ok());
        assert!(handle.shutdown().await.is_ok());
    }
}
