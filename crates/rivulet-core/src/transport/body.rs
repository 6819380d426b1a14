//! Incremental newline-delimited response body.
//!
//! The transport pushes raw chunks into a bounded channel as they arrive; the
//! read loop pulls complete lines out. Nothing buffers the whole body.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::{TransportError, TransportErrorKind};

/// One piece of body data, or the failure that ended the body.
pub type Chunk = Result<Vec<u8>, TransportError>;

/// Default capacity of the chunk channel.
pub const DEFAULT_BUFFER_CHUNKS: usize = 64;

/// Longest line accepted by default, terminator excluded.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1 << 20;

/// Producer half of a [`ResponseBody`]. Dropping it ends the body cleanly.
#[derive(Debug, Clone)]
pub struct BodySender {
    tx: mpsc::Sender<Chunk>,
}

impl BodySender {
    /// Push bytes; returns false once the body has been dropped.
    pub async fn send(&self, bytes: impl Into<Vec<u8>>) -> bool {
        self.tx.send(Ok(bytes.into())).await.is_ok()
    }

    /// Push one line, appending the newline.
    pub async fn send_line(&self, line: &str) -> bool {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.send(bytes).await
    }

    /// End the body with an error.
    pub async fn fail(self, error: TransportError) {
        let _ = self.tx.send(Err(error)).await;
    }

    /// Blocking push for transfer threads outside the runtime.
    pub(crate) fn blocking_send(&self, chunk: Chunk) -> bool {
        self.tx.blocking_send(chunk).is_ok()
    }
}

/// Streaming body of a response whose headers have already been received.
#[derive(Debug)]
pub struct ResponseBody {
    rx: mpsc::Receiver<Chunk>,
    buf: Vec<u8>,
    /// Prefix of `buf` already known to hold no newline.
    scanned: usize,
    max_line: usize,
    eof: bool,
    abort: Option<Arc<AtomicBool>>,
}

impl ResponseBody {
    /// A body fed by the returned sender.
    pub fn channel(capacity: usize) -> (BodySender, ResponseBody) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let body = ResponseBody {
            rx,
            buf: Vec::new(),
            scanned: 0,
            max_line: DEFAULT_MAX_LINE_BYTES,
            eof: false,
            abort: None,
        };
        (BodySender { tx }, body)
    }

    /// Fail `next_line` once a line grows past `max` bytes.
    pub fn with_max_line_bytes(mut self, max: usize) -> Self {
        self.max_line = max.max(1);
        self
    }

    /// Set `flag` when this body is dropped, so the producer can stop early.
    pub(crate) fn abort_on_drop(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort = Some(flag);
        self
    }

    /// Next line without its terminator (`\n` or `\r\n`).
    ///
    /// Returns `Ok(None)` once the producer finished and every line was read;
    /// a trailing line without terminator is returned before that. Invalid
    /// UTF-8 is replaced rather than rejected. A line longer than the limit
    /// fails the body.
    pub async fn next_line(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            if let Some(offset) = self.buf[self.scanned..].iter().position(|&b| b == b'\n') {
                let pos = self.scanned + offset;
                self.scanned = 0;
                let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }
            self.scanned = self.buf.len();
            if self.buf.len() > self.max_line {
                self.buf = Vec::new();
                self.scanned = 0;
                return Err(TransportError::new(
                    TransportErrorKind::Other,
                    format!("line longer than {} bytes", self.max_line),
                ));
            }
            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let rest = std::mem::take(&mut self.buf);
                self.scanned = 0;
                return Ok(Some(String::from_utf8_lossy(&rest).into_owned()));
            }
            match self.rx.recv().await {
                Some(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(e),
                None => self.eof = true,
            }
        }
    }
}

impl Drop for ResponseBody {
    fn drop(&mut self) {
        if let Some(flag) = &self.abort {
            flag.store(true, Ordering::Release);
        }
    }
}
