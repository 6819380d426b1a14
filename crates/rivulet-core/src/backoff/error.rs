//! Errors raised by backoff strategies and the handlers that own them.

use std::time::Duration;

/// Failure to schedule (or reset) a retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackoffError {
    /// A constructor argument was out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The strategy (or the handler owning it) was disposed.
    #[error("{0} has been disposed")]
    Disposed(&'static str),
    /// The next delay would reach the configured ceiling; the caller should give up.
    #[error("retry delay {delay:?} reached the maximum of {max_delay:?}, giving up")]
    Exhausted { delay: Duration, max_delay: Duration },
    /// `retry` was called outside a tokio runtime, so no timer can be armed.
    #[error("no tokio runtime available to schedule a retry")]
    NoRuntime,
}

impl BackoffError {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, BackoffError::Exhausted { .. })
    }
}
