use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::BackoffError;

/// Boxed, sendable future. Used wherever an operation is stored and run later.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Operation run once when a scheduled retry fires.
pub type RetryOperation = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Paces retry attempts.
///
/// Implementations keep at most one retry scheduled: calling [`retry`] while a
/// previous schedule is pending cancels that schedule first, so only the most
/// recent operation ever runs. Every method except [`dispose`] and
/// [`is_disposed`] fails with [`BackoffError::Disposed`] after disposal.
///
/// [`retry`]: BackoffStrategy::retry
/// [`dispose`]: BackoffStrategy::dispose
/// [`is_disposed`]: BackoffStrategy::is_disposed
pub trait BackoffStrategy: Send + Sync {
    /// Schedule `operation` to run once after the next delay. Returns that delay.
    ///
    /// Fails with [`BackoffError::Exhausted`] (and schedules nothing) when the
    /// strategy has run out of patience.
    fn retry(&self, operation: RetryOperation) -> Result<Duration, BackoffError>;

    /// Cancel any pending schedule without running it and restart pacing from zero.
    fn reset(&self) -> Result<(), BackoffError>;

    /// True while a scheduled retry has neither fired nor been cancelled.
    fn is_pending(&self) -> bool;

    /// Cancel any pending schedule and refuse further use. Idempotent.
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}
