use super::ConnectionState;
use crate::backoff::BackoffError;
use crate::parse::ParseError;
use crate::transport::TransportError;

/// Errors surfaced by a [`StreamingConnection`](super::StreamingConnection),
/// either to the caller of `connect` or to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Sending the request or reading the body failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A body line could not be turned into a token.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// A handler recognized `cause` but could not schedule the reconnect
    /// (typically because the backoff gave up).
    #[error("cannot retry after \"{cause}\": {source}")]
    Retry {
        source: BackoffError,
        cause: Box<StreamError>,
    },
    /// `connect` called while a read loop is active or after the stream ended.
    #[error("cannot connect while {0}")]
    InvalidState(ConnectionState),
    #[error("streaming connection has been disposed")]
    Disposed,
    /// An observer was attached outside a tokio runtime.
    #[error("no tokio runtime to drive the observer")]
    NoRuntime,
}

impl StreamError {
    /// The transport failure behind this error, if any.
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            StreamError::Transport(e) => Some(e),
            _ => None,
        }
    }

    /// True when reconnecting was abandoned because the backoff reached its ceiling.
    pub fn is_backoff_exhausted(&self) -> bool {
        matches!(self, StreamError::Retry { source, .. } if source.is_exhausted())
    }
}
