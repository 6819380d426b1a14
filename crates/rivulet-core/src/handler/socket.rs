use std::time::Duration;

use super::{schedule, ExceptionHandler, Reconnect};
use crate::backoff::{BackoffError, BackoffStrategy};
use crate::connection::StreamError;
use crate::transport::TransportError;

/// Retries low-level connection failures: resets, refused connects, DNS
/// failures and timeouts.
///
/// Looks at the error and, failing that, its direct cause. Deeper causes are
/// ignored.
pub struct SocketExceptionHandler {
    backoff: Box<dyn BackoffStrategy>,
}

impl SocketExceptionHandler {
    pub fn new(backoff: impl BackoffStrategy + 'static) -> Self {
        Self {
            backoff: Box::new(backoff),
        }
    }
}

fn is_socket_failure(error: &TransportError) -> bool {
    error.kind().is_socket_level() || error.cause().is_some_and(|c| c.kind().is_socket_level())
}

impl ExceptionHandler for SocketExceptionHandler {
    fn name(&self) -> &'static str {
        "socket"
    }

    fn try_handle(
        &self,
        error: &StreamError,
        reconnect: &Reconnect,
    ) -> Result<Option<Duration>, BackoffError> {
        if self.backoff.is_disposed() {
            return Err(BackoffError::Disposed("socket exception handler"));
        }
        if !error.transport().is_some_and(is_socket_failure) {
            return Ok(None);
        }
        schedule(self.backoff.as_ref(), reconnect).map(Some)
    }

    fn clear(&self) -> Result<(), BackoffError> {
        self.backoff.reset()
    }

    fn dispose(&self) {
        self.backoff.dispose();
    }
}
