//! Progress relay for long-running waits.
//!
//! The wait loop reports `(percent, message)` pairs through a
//! [`ProgressSink`]. A sink that fails to deliver returns an error; the
//! caller logs it and keeps waiting.

use serde::Serialize;
use tokio::sync::mpsc;

/// A single progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    /// Completion estimate, 0-100.
    pub progress: u8,
    pub message: String,
}

/// Failure to deliver a progress update upstream.
#[derive(Debug, thiserror::Error)]
#[error("Failed to send progress update: {0}")]
pub struct ProgressError(pub String);

/// Receives progress notifications from a wait loop.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: u8, message: &str) -> Result<(), ProgressError>;
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: u8, _message: &str) -> Result<(), ProgressError> {
        Ok(())
    }
}

impl ProgressSink for mpsc::UnboundedSender<ProgressUpdate> {
    fn report(&self, progress: u8, message: &str) -> Result<(), ProgressError> {
        self.send(ProgressUpdate {
            progress,
            message: message.to_string(),
        })
        .map_err(|_| ProgressError("receiver dropped".to_string()))
    }
}

/// Rescales `0..=100` from an inner stage into `start..=start + span` of an
/// outer presentation range, e.g. execution progress into 10-90% of a job.
pub struct ScaledProgress<'a> {
    inner: &'a dyn ProgressSink,
    start: u8,
    span: u8,
}

impl<'a> ScaledProgress<'a> {
    pub fn new(inner: &'a dyn ProgressSink, start: u8, span: u8) -> Self {
        Self { inner, start, span }
    }

    /// Map an inner percentage into the outer range.
    pub fn scale(&self, progress: u8) -> u8 {
        let inner = u32::from(progress.min(100));
        let scaled = u32::from(self.start) + inner * u32::from(self.span) / 100;
        scaled.min(100) as u8
    }
}

impl ProgressSink for ScaledProgress<'_> {
    fn report(&self, progress: u8, message: &str) -> Result<(), ProgressError> {
        self.inner.report(self.scale(progress), message)
    }
}
