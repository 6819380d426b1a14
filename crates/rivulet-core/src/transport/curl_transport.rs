//! libcurl-backed streaming transport.
//!
//! Each transfer runs `Easy::perform` on its own thread. The header callback
//! reports the final status as soon as the header block ends, so `send`
//! resolves without waiting for the (endless) body; body chunks are pushed
//! into the response's channel from the write callback.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use super::body::{BodySender, ResponseBody, DEFAULT_BUFFER_CHUNKS, DEFAULT_MAX_LINE_BYTES};
use super::classify::parse_status_line;
use super::{StreamRequest, Transport, TransportError, TransportErrorKind};
use crate::backoff::BoxFuture;
use crate::config::RivuletConfig;

/// Curl knobs applied to every transfer.
#[derive(Debug, Clone)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// Abort when throughput stays below `low_speed_limit` bytes/s for this long.
    pub stall_timeout: Duration,
    pub low_speed_limit: u32,
    pub max_redirections: u32,
    pub buffer_chunks: usize,
    pub max_line_bytes: usize,
    pub user_agent: String,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            stall_timeout: Duration::from_secs(90),
            low_speed_limit: 1,
            max_redirections: 10,
            buffer_chunks: DEFAULT_BUFFER_CHUNKS,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            user_agent: format!("rivulet/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl CurlOptions {
    pub fn from_config(cfg: &RivuletConfig) -> Self {
        Self {
            connect_timeout: cfg.connect_timeout(),
            stall_timeout: cfg.stall_timeout(),
            buffer_chunks: cfg.body_buffer_chunks.unwrap_or(DEFAULT_BUFFER_CHUNKS),
            max_line_bytes: cfg.max_line_bytes.unwrap_or(DEFAULT_MAX_LINE_BYTES),
            ..Self::default()
        }
    }
}

/// Transport that streams responses with libcurl.
pub struct CurlTransport {
    options: CurlOptions,
    /// Bumped by `cancel_pending`; transfers started under an older epoch abort.
    epoch: Arc<AtomicU64>,
}

impl CurlTransport {
    pub fn new(options: CurlOptions) -> Self {
        Self {
            options,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_config(cfg: &RivuletConfig) -> Self {
        Self::new(CurlOptions::from_config(cfg))
    }

    pub fn options(&self) -> &CurlOptions {
        &self.options
    }
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self::new(CurlOptions::default())
    }
}

impl Transport for CurlTransport {
    fn send<'a>(
        &'a self,
        request: &'a StreamRequest,
    ) -> BoxFuture<'a, Result<ResponseBody, TransportError>> {
        Box::pin(async move {
            let (head_tx, head_rx) = oneshot::channel();
            let (body_tx, body) = ResponseBody::channel(self.options.buffer_chunks);
            let body_dropped = Arc::new(AtomicBool::new(false));
            // Dropping the body, or this future before headers arrive, aborts the transfer.
            let body = body
                .with_max_line_bytes(self.options.max_line_bytes)
                .abort_on_drop(Arc::clone(&body_dropped));
            let abort = AbortSignal {
                body_dropped,
                epoch: Arc::clone(&self.epoch),
                started: self.epoch.load(Ordering::Acquire),
            };

            let owned = request.clone();
            let options = self.options.clone();
            std::thread::Builder::new()
                .name("rivulet-transfer".to_string())
                .spawn(move || run_transfer(&owned, &options, head_tx, body_tx, &abort))
                .map_err(|e| {
                    TransportError::new(
                        TransportErrorKind::Other,
                        format!("spawning transfer thread: {}", e),
                    )
                })?;

            match head_rx.await {
                Ok(Ok(status)) => {
                    tracing::debug!(url = %request.url(), status, "response headers received");
                    Ok(body)
                }
                Ok(Err(e)) => Err(e),
                Err(_) => Err(TransportError::new(
                    TransportErrorKind::Other,
                    "transfer ended before response headers",
                )),
            }
        })
    }

    fn cancel_pending(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}

/// Checked from curl callbacks: stop when the reader is gone or the
/// transport cancelled everything started before now.
struct AbortSignal {
    body_dropped: Arc<AtomicBool>,
    epoch: Arc<AtomicU64>,
    started: u64,
}

impl AbortSignal {
    fn is_set(&self) -> bool {
        self.body_dropped.load(Ordering::Acquire) || self.epoch.load(Ordering::Acquire) != self.started
    }
}

type HeadResult = Result<u16, TransportError>;

/// Tracks header blocks until the final one, then reports its status once.
struct HeadState {
    tx: Option<oneshot::Sender<HeadResult>>,
    status: Option<u16>,
    has_location: bool,
    rejected: bool,
}

impl HeadState {
    fn new(tx: oneshot::Sender<HeadResult>) -> Self {
        Self {
            tx: Some(tx),
            status: None,
            has_location: false,
            rejected: false,
        }
    }

    fn on_header_line(&mut self, line: &str) {
        if let Some(code) = parse_status_line(line) {
            self.status = Some(code);
            self.has_location = false;
            return;
        }
        if line.is_empty() {
            self.end_of_block();
            return;
        }
        if let Some((name, _)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("location") {
                self.has_location = true;
            }
        }
    }

    fn end_of_block(&mut self) {
        let Some(code) = self.status else { return };
        // Interim responses and followed redirects are not the final answer.
        if (100..200).contains(&code) || ((300..400).contains(&code) && self.has_location) {
            return;
        }
        self.report(code);
    }

    fn report(&mut self, code: u16) {
        let Some(tx) = self.tx.take() else { return };
        if (200..300).contains(&code) {
            let _ = tx.send(Ok(code));
        } else {
            self.rejected = true;
            let _ = tx.send(Err(TransportError::http_status(code)));
        }
    }

    /// Hand `err` to the waiting `send` if headers were never reported;
    /// otherwise give it back.
    fn fail(&mut self, err: TransportError) -> Option<TransportError> {
        match self.tx.take() {
            Some(tx) => {
                let _ = tx.send(Err(err));
                None
            }
            None => Some(err),
        }
    }
}

fn run_transfer(
    request: &StreamRequest,
    options: &CurlOptions,
    head_tx: oneshot::Sender<HeadResult>,
    body_tx: BodySender,
    abort: &AbortSignal,
) {
    tracing::debug!(url = %request.url(), method = %request.method(), "transfer starting");
    let head = RefCell::new(HeadState::new(head_tx));
    let result = perform(request, options, &head, &body_tx, abort);
    let mut head = head.into_inner();
    match result {
        Ok(code) => {
            head.report(code);
            tracing::debug!(url = %request.url(), "transfer finished");
        }
        Err(err) => {
            let Some(err) = head.fail(err) else { return };
            if head.rejected || abort.is_set() {
                return;
            }
            tracing::debug!(url = %request.url(), error = %err, "transfer interrupted");
            let interrupted =
                TransportError::new(TransportErrorKind::Other, "response stream interrupted")
                    .with_cause(err);
            let _ = body_tx.blocking_send(Err(interrupted));
        }
    }
}

fn perform(
    request: &StreamRequest,
    options: &CurlOptions,
    head: &RefCell<HeadState>,
    body_tx: &BodySender,
    abort: &AbortSignal,
) -> Result<u16, TransportError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(request.url().as_str())?;
    easy.follow_location(true)?;
    easy.max_redirections(options.max_redirections)?;
    easy.useragent(&options.user_agent)?;
    easy.connect_timeout(options.connect_timeout)?;
    // Streams never end on their own, so no total timeout: only a stall check.
    easy.low_speed_limit(options.low_speed_limit)?;
    easy.low_speed_time(options.stall_timeout)?;
    easy.progress(true)?;
    if let Some(body) = request.body() {
        easy.post(true)?;
        easy.post_fields_copy(body)?;
    }

    let mut list = curl::easy::List::new();
    for (k, v) in request.header_pairs() {
        list.append(&format!("{}: {}", k, v))?;
    }
    if !request.header_pairs().is_empty() {
        easy.http_headers(list)?;
    }

    let performed = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            let line = String::from_utf8_lossy(data);
            head.borrow_mut().on_header_line(line.trim_end());
            true
        })?;
        transfer.write_function(|data| {
            if abort.is_set() || head.borrow().rejected {
                return Ok(0); // abort transfer
            }
            if body_tx.blocking_send(Ok(data.to_vec())) {
                Ok(data.len())
            } else {
                Ok(0)
            }
        })?;
        transfer.progress_function(|_, _, _, _| !abort.is_set())?;
        transfer.perform()
    };

    match performed {
        Ok(()) => {
            let code = easy.response_code()?;
            Ok(u16::try_from(code).unwrap_or(0))
        }
        Err(_) if abort.is_set() => Err(TransportError::new(
            TransportErrorKind::Cancelled,
            "transfer cancelled",
        )),
        Err(e) => Err(e.into()),
    }
}
