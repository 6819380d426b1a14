use std::collections::BTreeSet;
use std::time::Duration;

use super::{schedule, ExceptionHandler, Reconnect};
use crate::backoff::{BackoffError, BackoffStrategy};
use crate::connection::StreamError;

/// Retries responses whose HTTP status is in a fixed recoverable set.
///
/// Failures without an HTTP response (DNS, resets, parse errors) are never
/// claimed here.
pub struct HttpExceptionHandler {
    backoff: Box<dyn BackoffStrategy>,
    recoverable: BTreeSet<u16>,
}

impl HttpExceptionHandler {
    pub fn new(
        backoff: impl BackoffStrategy + 'static,
        recoverable: impl IntoIterator<Item = u16>,
    ) -> Self {
        Self {
            backoff: Box::new(backoff),
            recoverable: recoverable.into_iter().collect(),
        }
    }

    pub fn recoverable_codes(&self) -> &BTreeSet<u16> {
        &self.recoverable
    }

    fn recognizes(&self, error: &StreamError) -> bool {
        error
            .transport()
            .and_then(|e| e.status())
            .is_some_and(|code| self.recoverable.contains(&code))
    }
}

impl ExceptionHandler for HttpExceptionHandler {
    fn name(&self) -> &'static str {
        "http"
    }

    fn try_handle(
        &self,
        error: &StreamError,
        reconnect: &Reconnect,
    ) -> Result<Option<Duration>, BackoffError> {
        if self.backoff.is_disposed() {
            return Err(BackoffError::Disposed("http exception handler"));
        }
        if !self.recognizes(error) {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::ParseError;
    use crate::testing::{noop_reconnect, RecordingBackoff};
    use crate::transport::{TransportError, TransportErrorKind};

    fn handler(backoff: &RecordingBackoff) -> HttpExceptionHandler {
        HttpExceptionHandler::new(backoff.clone(), [502, 503, 504])
    }

    #[tokio::test]
    async fn recoverable_status_schedules_one_retry() {
        let backoff = RecordingBackoff::new();
        let h = handler(&backoff);
        let err = TransportError::http_status(503).into();
        assert!(h.try_handle(&err, &noop_reconnect()).unwrap().is_some());
        assert_eq!(backoff.retries(), 1);
    }

    #[tokio::test]
    async fn other_status_is_not_claimed() {
        let backoff = RecordingBackoff::new();
        let h = handler(&backoff);
        let err = TransportError::http_status(404).into();
        assert_eq!(h.try_handle(&err, &noop_reconnect()), Ok(None));
        assert_eq!(backoff.retries(), 0);
    }

    #[tokio::test]
    async fn errors_without_response_are_not_claimed() {
        let backoff = RecordingBackoff::new();
        let h = handler(&backoff);
        let resolve: StreamError =
            TransportError::new(TransportErrorKind::Resolve, "no such host").into();
        let parse: StreamError = ParseError::new("bad", "{").into();
        assert_eq!(h.try_handle(&resolve, &noop_reconnect()), Ok(None));
        assert_eq!(h.try_handle(&parse, &noop_reconnect()), Ok(None));
        assert_eq!(backoff.retries(), 0);
    }

    #[tokio::test]
    async fn status_behind_a_wrapper_is_not_claimed() {
        let backoff = RecordingBackoff::new();
        let h = handler(&backoff);
        let err: StreamError = TransportError::new(TransportErrorKind::Other, "interrupted")
            .with_cause(TransportError::http_status(503))
            .into();
        assert_eq!(h.try_handle(&err, &noop_reconnect()), Ok(None));
    }

    #[test]
    fn clear_resets_backoff() {
        let backoff = RecordingBackoff::new();
        handler(&backoff).clear().unwrap();
        assert_eq!(backoff.resets(), 1);
    }

    #[test]
    fn disposed_handler_rejects_calls() {
        let backoff = RecordingBackoff::new();
        let h = handler(&backoff);
        h.dispose();
        h.dispose();
        let err = TransportError::http_status(404).into();
        assert_eq!(
            h.try_handle(&err, &noop_reconnect()),
            Err(BackoffError::Disposed("http exception handler"))
        );
        assert!(h.clear().is_err());
    }

    #[test]
    fn codes_are_deduplicated() {
        let h = HttpExceptionHandler::new(RecordingBackoff::new(), [503, 503, 502]);
        assert_eq!(h.recoverable_codes().len(), 2);
    }
}
