//! Test doubles shared by unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::backoff::{BackoffError, BackoffStrategy, BoxFuture, RetryOperation};
use crate::handler::Reconnect;
use crate::lock;

#[derive(Default)]
struct Recorded {
    retries: usize,
    resets: usize,
    disposed: bool,
    exhausted: bool,
    pending: Option<RetryOperation>,
}

/// Backoff that records calls and keeps the last operation until `fire`.
#[derive(Clone, Default)]
pub struct RecordingBackoff {
    state: Arc<Mutex<Recorded>>,
}

impl RecordingBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `retry` fails with `Exhausted`.
    pub fn exhausted() -> Self {
        let backoff = Self::new();
        lock(&backoff.state).exhausted = true;
        backoff
    }

    pub fn retries(&self) -> usize {
        lock(&self.state).retries
    }

    pub fn resets(&self) -> usize {
        lock(&self.state).resets
    }

    /// Take the pending operation without running it.
    pub fn take_pending(&self) -> Option<RetryOperation> {
        lock(&self.state).pending.take()
    }

    /// Run the pending operation now. Returns false if none was pending.
    pub async fn fire(&self) -> bool {
        match self.take_pending() {
            Some(op) => {
                op().await;
                true
            }
            None => false,
        }
    }
}

impl BackoffStrategy for RecordingBackoff {
    fn retry(&self, operation: RetryOperation) -> Result<Duration, BackoffError> {
        let mut state = lock(&self.state);
        if state.disposed {
            return Err(BackoffError::Disposed("recording backoff"));
        }
        if state.exhausted {
            state.pending = None;
            return Err(BackoffError::Exhausted {
                delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(10),
            });
        }
        state.retries += 1;
        state.pending = Some(operation);
        Ok(Duration::from_millis(1))
    }

    fn reset(&self) -> Result<(), BackoffError> {
        let mut state = lock(&self.state);
        if state.disposed {
            return Err(BackoffError::Disposed("recording backoff"));
        }
        state.resets += 1;
        state.pending = None;
        Ok(())
    }

    fn is_pending(&self) -> bool {
        lock(&self.state).pending.is_some()
    }

    fn dispose(&self) {
        let mut state = lock(&self.state);
        state.disposed = true;
        state.pending = None;
    }

    fn is_disposed(&self) -> bool {
        lock(&self.state).disposed
    }
}

pub fn noop_reconnect() -> Reconnect {
    Arc::new(|| -> BoxFuture<'static, ()> { Box::pin(async {}) })
}
