//! Map curl errors and HTTP status lines onto transport error kinds.

use super::{TransportError, TransportErrorKind};

/// Classify a curl error.
pub fn classify_curl_error(e: &curl::Error) -> TransportErrorKind {
    if e.is_operation_timedout() {
        return TransportErrorKind::Timeout;
    }
    if e.is_couldnt_resolve_host() || e.is_couldnt_resolve_proxy() {
        return TransportErrorKind::Resolve;
    }
    if e.is_couldnt_connect() {
        return TransportErrorKind::ConnectionRefused;
    }
    if e.is_recv_error()
        || e.is_send_error()
        || e.is_read_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return TransportErrorKind::ConnectionReset;
    }
    if e.is_aborted_by_callback() {
        return TransportErrorKind::Cancelled;
    }
    if e.is_url_malformed() || e.is_unsupported_protocol() {
        return TransportErrorKind::InvalidRequest;
    }
    TransportErrorKind::Other
}

impl From<curl::Error> for TransportError {
    fn from(e: curl::Error) -> Self {
        TransportError::new(classify_curl_error(&e), e.to_string())
    }
}

/// Status code from an HTTP status line such as `HTTP/1.1 503 Service Unavailable`.
pub(crate) fn parse_status_line(line: &str) -> Option<u16> {
    let mut parts = line.split_whitespace();
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}
