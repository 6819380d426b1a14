//! The streaming connection: connect, read tokens, recover, fan out.
//!
//! `connect` sends the request and runs the read loop until the stream ends,
//! fails, or is disposed. Failures are offered to the [`HandlerChain`]; a
//! handler that claims one schedules a reconnect through its backoff, and the
//! reconnect re-enters `connect` from a timer task. Disposal may race with any
//! of this, so every asynchronous path checks the disposed flag first.

mod error;
mod state;
mod subscribers;


pub use error::StreamError;
pub use state::ConnectionState;
pub use subscribers::{Observer, ObserverHandle, StreamEvent, Subscription};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use subscribers::SubscriberSet;

use crate::backoff::BoxFuture;
use crate::handler::{ExceptionHandler, HandlerChain, Reconnect};
use crate::lock;
use crate::parse::{Parsed, TokenParser};
use crate::transport::{StreamRequest, Transport};

type ConnectedHook = Box<dyn Fn() + Send + Sync>;

/// Long-lived HTTP stream that reconnects on transient failures and hands
/// parsed tokens to its subscribers.
///
/// Dropping the connection disposes it.
pub struct StreamingConnection<P: TokenParser> {
    inner: Arc<Inner<P>>,
}

/// Builder for [`StreamingConnection`].
pub struct StreamingConnectionBuilder<P: TokenParser> {
    transport: Arc<dyn Transport>,
    parser: P,
    handlers: HandlerChain,
    on_connected: Option<ConnectedHook>,
}

impl<P: TokenParser> StreamingConnectionBuilder<P> {
    /// Add a handler with lower priority than those already added.
    pub fn handler(mut self, handler: impl ExceptionHandler + 'static) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Replace the handler chain.
    pub fn handlers(mut self, handlers: HandlerChain) -> Self {
        self.handlers = handlers;
        self
    }

    /// Called after every successful connect, once handler pacing was reset.
    pub fn on_connected(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connected = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> StreamingConnection<P> {
        let (shutdown, _) = watch::channel(false);
        StreamingConnection {
            inner: Arc::new(Inner {
                transport: Mutex::new(Some(self.transport)),
                parser: self.parser,
                handlers: self.handlers,
                subscribers: SubscriberSet::new(),
                state: Mutex::new(ConnectionState::Idle),
                disposed: AtomicBool::new(false),
                shutdown,
                on_connected: self.on_connected,
            }),
        }
    }
}

impl<P: TokenParser> StreamingConnection<P> {
    pub fn new(transport: impl Transport + 'static, parser: P, handlers: HandlerChain) -> Self {
        Self::builder(transport, parser).handlers(handlers).build()
    }

    pub fn builder(transport: impl Transport + 'static, parser: P) -> StreamingConnectionBuilder<P> {
        StreamingConnectionBuilder {
            transport: Arc::new(transport),
            parser,
            handlers: HandlerChain::new(),
            on_connected: None,
        }
    }

    /// Connect and stream until the response ends, fails for good, is
    /// handed over to a scheduled reconnect, or the connection is disposed.
    ///
    /// Returns `Ok(())` when the stream completed or a handler took over the
    /// failure. An error that no handler claims (or that the backoff refused
    /// to retry) is delivered to subscribers and also returned here.
    pub async fn connect(&self, request: StreamRequest) -> Result<(), StreamError> {
        Arc::clone(&self.inner).connect(request).await
    }

    /// Spawn [`connect`](Self::connect) on the current tokio runtime.
    pub fn start(&self, request: StreamRequest) -> JoinHandle<Result<(), StreamError>> {
        tokio::spawn(Arc::clone(&self.inner).connect(request))
    }

    pub fn subscribe(&self) -> Result<Subscription<P::Token>, StreamError> {
        self.inner.subscribers.subscribe()
    }

    /// Attach a callback-style observer. Fails with
    /// [`StreamError::NoRuntime`] outside a tokio runtime.
    pub fn observe(&self, observer: impl Observer<P::Token>) -> Result<ObserverHandle, StreamError> {
        self.inner.subscribers.observe(observer)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    pub fn state(&self) -> ConnectionState {
        *lock(&self.inner.state)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Stop reading, cancel pending reconnects and in-flight sends, complete
    /// all subscribers and release the transport. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl<P: TokenParser> Drop for StreamingConnection<P> {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

struct Inner<P: TokenParser> {
    transport: Mutex<Option<Arc<dyn Transport>>>,
    parser: P,
    handlers: HandlerChain,
    subscribers: SubscriberSet<P::Token>,
    state: Mutex<ConnectionState>,
    disposed: AtomicBool,
    /// Flipped to true on dispose; wakes the read loop out of pending I/O.
    shutdown: watch::Sender<bool>,
    on_connected: Option<ConnectedHook>,
}

/// Resolves once the connection is disposed.
async fn wait_disposed(mut rx: watch::Receiver<bool>) {
    loop {
        let disposed = *rx.borrow_and_update();
        if disposed {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl<P: TokenParser> Inner<P> {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = lock(&self.state);
        if *state != ConnectionState::Disposed {
            *state = next;
        }
    }

    fn connect(self: Arc<Self>, request: StreamRequest) -> BoxFuture<'static, Result<(), StreamError>> {
        Box::pin(async move {
            self.begin_connect()?;
            tracing::debug!(url = %request.url(), "connecting");
            let reconnect = self.reconnect_op(&request);
            match self.stream(&request).await {
                Ok(()) => Ok(()),
                Err(err) => self.recover(err, &reconnect),
            }
        })
    }

    fn begin_connect(&self) -> Result<(), StreamError> {
        let mut state = lock(&self.state);
        match *state {
            _ if self.is_disposed() => Err(StreamError::Disposed),
            ConnectionState::Idle | ConnectionState::Retrying => {
                *state = ConnectionState::Connecting;
                Ok(())
            }
            ConnectionState::Disposed => Err(StreamError::Disposed),
            other => Err(StreamError::InvalidState(other)),
        }
    }

    /// The operation a handler schedules: connect again with the same request,
    /// unless the connection was disposed or dropped in the meantime.
    fn reconnect_op(self: &Arc<Self>, request: &StreamRequest) -> Reconnect {
        let weak = Arc::downgrade(self);
        let request = request.clone();
        Arc::new(move || -> BoxFuture<'static, ()> {
            let weak = weak.clone();
            let request = request.clone();
            Box::pin(async move {
                let Some(inner) = weak.upgrade() else { return };
                if inner.is_disposed() {
                    tracing::debug!("connection disposed, reconnect skipped");
                    return;
                }
                tracing::info!(url = %request.url(), "reconnecting");
                if let Err(e) = inner.connect(request).await {
                    tracing::debug!(error = %e, "reconnect attempt ended");
                }
            })
        })
    }

    /// Send the request and run the read loop. `Ok` means the stream ended
    /// cleanly or the connection was disposed.
    async fn stream(&self, request: &StreamRequest) -> Result<(), StreamError> {
        let transport = lock(&self.transport).clone();
        let Some(transport) = transport else {
            return Err(StreamError::Disposed);
        };
        let disposed = wait_disposed(self.shutdown.subscribe());
        tokio::pin!(disposed);

        let mut body = tokio::select! {
            biased;
            _ = &mut disposed => return Ok(()),
            sent = transport.send(request) => sent?,
        };
        self.connected();

        loop {
            let line = tokio::select! {
                biased;
                _ = &mut disposed => return Ok(()),
                line = body.next_line() => line?,
            };
            let Some(line) = line else {
                tracing::debug!("response body ended");
                self.complete();
                return Ok(());
            };
            match self.parser.parse(&line)? {
                Parsed::Token(token) => {
                    self.subscribers.emit(token);
                }
                Parsed::Skip => {}
                Parsed::End => {
                    tracing::debug!("end of stream marker");
                    self.complete();
                    return Ok(());
                }
            }
        }
    }

    fn connected(&self) {
        if let Err(e) = self.handlers.clear() {
            tracing::debug!(error = %e, "could not reset retry pacing");
        }
        if let Some(hook) = &self.on_connected {
            hook();
        }
        self.set_state(ConnectionState::Streaming);
        tracing::info!("stream connected");
    }

    fn complete(&self) {
        if self.subscribers.complete() {
            self.set_state(ConnectionState::Completed);
            tracing::info!("stream completed");
        }
    }

    fn fail(&self, error: StreamError) -> Result<(), StreamError> {
        if self.subscribers.fail(error.clone()) {
            self.set_state(ConnectionState::Failed);
        }
        Err(error)
    }

    fn recover(&self, error: StreamError, reconnect: &Reconnect) -> Result<(), StreamError> {
        if self.is_disposed() {
            tracing::debug!(error = %error, "ignoring failure after dispose");
            return Ok(());
        }
        // The state lock is held while handlers classify: a concurrent
        // connect waits, and the reconnect timer finds `Retrying` when it fires.
        let outcome = {
            let mut state = lock(&self.state);
            let outcome = self.handlers.try_handle(&error, reconnect);
            if matches!(outcome, Ok(Some(_))) && *state != ConnectionState::Disposed {
                *state = ConnectionState::Retrying;
            }
            outcome
        };
        match outcome {
            Ok(Some(handled)) => {
                tracing::info!(
                    handler = handled.handler,
                    delay = ?handled.delay,
                    error = %error,
                    "recoverable failure, reconnect scheduled"
                );
                Ok(())
            }
            Ok(None) => {
                tracing::warn!(error = %error, "unrecoverable stream failure");
                self.fail(error)
            }
            Err(_) if self.is_disposed() => Ok(()),
            Err(source) => {
                let err = StreamError::Retry {
                    source,
                    cause: Box::new(error),
                };
                tracing::error!(error = %err, "giving up on stream");
                self.fail(err)
            }
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.send_replace(true);
        if let Some(transport) = lock(&self.transport).take() {
            transport.cancel_pending();
        }
        self.handlers.dispose();
        self.subscribers.complete_and_close();
        *lock(&self.state) = ConnectionState::Disposed;
        tracing::debug!("streaming connection disposed");
    }
}
