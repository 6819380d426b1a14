//! Failure classification.
//!
//! An [`ExceptionHandler`] looks at a failed connect/read and decides whether
//! it is transient. If so it asks its own backoff strategy to run the
//! reconnect later and reports the failure as handled. A [`HandlerChain`]
//! tries several handlers in priority order.

mod http;
mod socket;

pub use http::HttpExceptionHandler;
pub use socket::SocketExceptionHandler;

use std::sync::Arc;
use std::time::Duration;

use crate::backoff::{BackoffError, BackoffStrategy, BoxFuture, LinearTimeoutBackoff};
use crate::config::RivuletConfig;
use crate::connection::StreamError;

/// Re-establishes the stream. May be invoked once per handled failure.
pub type Reconnect = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Classifies failures and paces reconnects for the ones it recognizes.
pub trait ExceptionHandler: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// If `error` is recoverable, schedule `reconnect` and return the delay.
    ///
    /// `Ok(None)` means "not mine", with no side effects. Errors from the
    /// backoff (including [`BackoffError::Exhausted`]) are returned as-is.
    fn try_handle(
        &self,
        error: &StreamError,
        reconnect: &Reconnect,
    ) -> Result<Option<Duration>, BackoffError>;

    /// Reset pacing; called after a successful reconnect.
    fn clear(&self) -> Result<(), BackoffError>;

    /// Dispose the owned backoff strategy. Idempotent.
    fn dispose(&self);
}

/// Hand a clone of `reconnect` to `backoff` as a one-shot retry.
fn schedule(
    backoff: &dyn BackoffStrategy,
    reconnect: &Reconnect,
) -> Result<Duration, BackoffError> {
    let reconnect = Arc::clone(reconnect);
    backoff.retry(Box::new(move || reconnect()))
}

/// Winner of a [`HandlerChain::try_handle`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handled {
    pub handler: &'static str,
    pub delay: Duration,
}

/// Exception handlers in fixed priority order; the first to claim a failure wins.
#[derive(Default)]
pub struct HandlerChain {
    handlers: Vec<Box<dyn ExceptionHandler>>,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler with lower priority than those already added.
    pub fn push(&mut self, handler: impl ExceptionHandler + 'static) {
        self.handlers.push(Box::new(handler));
    }

    pub fn with(mut self, handler: impl ExceptionHandler + 'static) -> Self {
        self.push(handler);
        self
    }

    /// HTTP status handler first, then the socket handler, each with its own
    /// linear backoff from `cfg`.
    pub fn from_config(cfg: &RivuletConfig) -> Result<Self, BackoffError> {
        let http = HttpExceptionHandler::new(
            LinearTimeoutBackoff::from_config(&cfg.http_backoff())?,
            cfg.recoverable_status_codes.iter().copied(),
        );
        let socket =
            SocketExceptionHandler::new(LinearTimeoutBackoff::from_config(&cfg.socket_backoff())?);
        Ok(Self::new().with(http).with(socket))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn try_handle(
        &self,
        error: &StreamError,
        reconnect: &Reconnect,
    ) -> Result<Option<Handled>, BackoffError> {
        for handler in &self.handlers {
            if let Some(delay) = handler.try_handle(error, reconnect)? {
                return Ok(Some(Handled {
                    handler: handler.name(),
                    delay,
                }));
            }
        }
        Ok(None)
    }

    /// Clear every handler, reporting the first failure after trying all of them.
    pub fn clear(&self) -> Result<(), BackoffError> {
        let mut first_err = None;
        for handler in &self.handlers {
            if let Err(e) = handler.clear() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    pub fn dispose(&self) {
        for handler in &self.handlers {
            handler.dispose();
        }
    }
}
