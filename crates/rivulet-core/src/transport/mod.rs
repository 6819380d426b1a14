//! Transport boundary: send a request, get back an incrementally readable body.
//!
//! The streaming connection only talks to a [`Transport`]. [`CurlTransport`]
//! is the production implementation; tests script their own.

mod body;
mod classify;
mod curl_transport;
mod error;
mod request;

pub use body::{BodySender, Chunk, ResponseBody, DEFAULT_BUFFER_CHUNKS, DEFAULT_MAX_LINE_BYTES};
pub use classify::classify_curl_error;
pub use curl_transport::{CurlOptions, CurlTransport};
pub use error::{TransportError, TransportErrorKind};
pub use request::{Method, StreamRequest};

use crate::backoff::BoxFuture;

/// Something that can open a long-lived HTTP response.
pub trait Transport: Send + Sync {
    /// Send `request` and resolve once the response headers arrived.
    ///
    /// A non-2xx status resolves to an error of kind
    /// [`TransportErrorKind::HttpStatus`]; the body is then never exposed.
    fn send<'a>(
        &'a self,
        request: &'a StreamRequest,
    ) -> BoxFuture<'a, Result<ResponseBody, TransportError>>;

    /// Abort every send and body transfer currently in flight.
    fn cancel_pending(&self) {}
}
