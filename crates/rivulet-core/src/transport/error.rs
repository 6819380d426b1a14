//! Tagged transport failures.
//!
//! Transports report every failure as a [`TransportError`] whose [`kind`]
//! is one of a small closed set, so classification is a plain `match`.
//! An error may wrap one underlying cause (e.g. "stream interrupted" caused by
//! a connection reset).
//!
//! [`kind`]: TransportError::kind

use std::fmt;

/// What went wrong at the transport level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Connect or read timed out (including stalled streams).
    Timeout,
    /// Connection dropped mid-transfer (reset, recv/send failure, truncated body).
    ConnectionReset,
    /// Nobody accepted the TCP connection.
    ConnectionRefused,
    /// Host or proxy name did not resolve.
    Resolve,
    /// The server answered with a non-2xx status.
    HttpStatus(u16),
    /// The request could not be built (bad URL, bad header).
    InvalidRequest,
    /// The transfer was cancelled locally.
    Cancelled,
    /// Anything else.
    Other,
}

impl TransportErrorKind {
    /// Failures below HTTP: the socket could not be opened or kept alive.
    pub fn is_socket_level(self) -> bool {
        matches!(
            self,
            TransportErrorKind::Timeout
                | TransportErrorKind::ConnectionReset
                | TransportErrorKind::ConnectionRefused
                | TransportErrorKind::Resolve
        )
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Timeout => write!(f, "timed out"),
            TransportErrorKind::ConnectionReset => write!(f, "connection reset"),
            TransportErrorKind::ConnectionRefused => write!(f, "connection refused"),
            TransportErrorKind::Resolve => write!(f, "name resolution failed"),
            TransportErrorKind::HttpStatus(code) => write!(f, "HTTP {}", code),
            TransportErrorKind::InvalidRequest => write!(f, "invalid request"),
            TransportErrorKind::Cancelled => write!(f, "cancelled"),
            TransportErrorKind::Other => write!(f, "transport error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    cause: Option<Box<TransportError>>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn http_status(code: u16) -> Self {
        Self::new(
            TransportErrorKind::HttpStatus(code),
            format!("server responded with status {}", code),
        )
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::InvalidRequest, message)
    }

    /// Attach the error this one was caused by.
    pub fn with_cause(mut self, cause: TransportError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The directly wrapped error, if any.
    pub fn cause(&self) -> Option<&TransportError> {
        self.cause.as_deref()
    }

    /// Status code when the server answered with a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        match self.kind {
            TransportErrorKind::HttpStatus(code) => Some(code),
            _ => None,
        }
    }
}
