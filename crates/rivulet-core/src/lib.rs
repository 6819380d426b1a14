pub mod config;
pub mod logging;

pub mod backoff;
pub mod connection;
pub mod handler;
pub mod parse;
pub mod transport;

#[cfg(test)]
mod testing;

pub use backoff::{BackoffError, BackoffStrategy, LinearTimeoutBackoff};
pub use connection::{
    ConnectionState, Observer, ObserverHandle, StreamError, StreamEvent, StreamingConnection,
    StreamingConnectionBuilder, Subscription,
};
pub use handler::{
    ExceptionHandler, HandlerChain, HttpExceptionHandler, Reconnect, SocketExceptionHandler,
};
pub use parse::{JsonLinesParser, LineParser, Parsed, TokenParser};
pub use transport::{CurlTransport, ResponseBody, StreamRequest, Transport, TransportError};

/// Lock a mutex, recovering the data if a previous holder panicked.
/// None of the guarded state here can be left half-updated by a panic.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
