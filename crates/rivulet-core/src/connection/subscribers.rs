//! Fan-out of stream events to any number of subscribers.
//!
//! Each subscriber owns an unbounded channel. Emission only pushes into those
//! channels under the list lock, so subscriber code never runs while the lock
//! is held and a slow subscriber cannot stall the read loop or the others.

use std::sync::{Arc, Mutex, Weak};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::StreamError;
use crate::lock;

/// One notification delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent<T> {
    Token(T),
    /// The stream failed and will not recover. Always the last event.
    Error(StreamError),
    /// The stream ended or the connection was disposed. Always the last event.
    Completed,
}

impl<T> StreamEvent<T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Token(_))
    }
}

#[derive(Debug, Clone)]
enum Terminal {
    Error(StreamError),
    Completed,
}

impl Terminal {
    fn event<T>(&self) -> StreamEvent<T> {
        match self {
            Terminal::Error(e) => StreamEvent::Error(e.clone()),
            Terminal::Completed => StreamEvent::Completed,
        }
    }
}

type Sender<T> = mpsc::UnboundedSender<StreamEvent<T>>;

struct Shared<T> {
    entries: Vec<(u64, Sender<T>)>,
    next_id: u64,
    /// Recorded so late subscribers can be told how the stream ended.
    terminal: Option<Terminal>,
    /// Set by dispose; nothing is delivered or accepted afterwards.
    closed: bool,
}

fn detach<T>(shared: &Weak<Mutex<Shared<T>>>, id: u64) {
    if let Some(shared) = shared.upgrade() {
        lock(&shared).entries.retain(|(entry, _)| *entry != id);
    }
}

/// Insertion-ordered subscriber list owned by a streaming connection.
pub(crate) struct SubscriberSet<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T: Clone + Send + 'static> SubscriberSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                entries: Vec::new(),
                next_id: 0,
                terminal: None,
                closed: false,
            })),
        }
    }

    pub(crate) fn subscribe(&self) -> Result<Subscription<T>, StreamError> {
        let mut guard = lock(&self.shared);
        let shared = &mut *guard;
        if shared.closed {
            return Err(StreamError::Disposed);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        shared.next_id += 1;
        let id = shared.next_id;
        match &shared.terminal {
            // The sender is dropped right away: the terminal event, then end.
            Some(terminal) => {
                let _ = tx.send(terminal.event());
            }
            None => shared.entries.push((id, tx)),
        }
        Ok(Subscription {
            id,
            rx,
            set: Arc::downgrade(&self.shared),
        })
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.shared).entries.len()
    }

    /// Deliver a token to every current subscriber. False once the stream
    /// has ended or the set was closed.
    pub(crate) fn emit(&self, token: T) -> bool {
        let shared = lock(&self.shared);
        if shared.closed || shared.terminal.is_some() {
            return false;
        }
        for (_, tx) in &shared.entries {
            let _ = tx.send(StreamEvent::Token(token.clone()));
        }
        true
    }

    pub(crate) fn complete(&self) -> bool {
        self.finish(Terminal::Completed)
    }

    pub(crate) fn fail(&self, error: StreamError) -> bool {
        self.finish(Terminal::Error(error))
    }

    /// Deliver the terminal event once and detach everyone.
    fn finish(&self, terminal: Terminal) -> bool {
        let mut shared = lock(&self.shared);
        if shared.closed || shared.terminal.is_some() {
            return false;
        }
        for (_, tx) in shared.entries.drain(..) {
            let _ = tx.send(terminal.event());
        }
        shared.terminal = Some(terminal);
        true
    }

    /// Complete whoever is still attached and refuse new subscribers. Idempotent.
    pub(crate) fn complete_and_close(&self) {
        let mut shared = lock(&self.shared);
        if shared.closed {
            return;
        }
        shared.closed = true;
        for (_, tx) in shared.entries.drain(..) {
            let _ = tx.send(StreamEvent::Completed);
        }
    }

    /// Drive `observer` from a spawned task until the stream ends or the
    /// returned handle is dropped. Fails with `NoRuntime` outside tokio.
    pub(crate) fn observe(
        &self,
        mut observer: impl Observer<T>,
    ) -> Result<ObserverHandle, StreamError> {
        let runtime = Handle::try_current().map_err(|_| StreamError::NoRuntime)?;
        let mut subscription = self.subscribe()?;
        let id = subscription.id;
        let set = Arc::downgrade(&self.shared);
        let task = runtime.spawn(async move {
            while let Some(event) = subscription.next().await {
                match event {
                    StreamEvent::Token(token) => observer.on_next(token),
                    StreamEvent::Error(e) => return observer.on_error(e),
                    StreamEvent::Completed => return observer.on_completed(),
                }
            }
        });
        Ok(ObserverHandle {
            task,
            detach: Some(Box::new(move || detach(&set, id))),
        })
    }
}

/// Receiving end of one subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription<T> {
    id: u64,
    rx: mpsc::UnboundedReceiver<StreamEvent<T>>,
    set: Weak<Mutex<Shared<T>>>,
}

impl<T> Subscription<T> {
    /// Next event in delivery order; `None` after the terminal event.
    pub async fn next(&mut self) -> Option<StreamEvent<T>> {
        self.rx.recv().await
    }

    /// Next already-delivered event, without waiting.
    pub fn try_next(&mut self) -> Option<StreamEvent<T>> {
        self.rx.try_recv().ok()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop delivery to this subscriber only.
    pub fn unsubscribe(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        detach(&self.set, self.id);
    }
}

/// Callback-style consumer, driven by [`StreamingConnection::observe`].
///
/// At most one of `on_error` / `on_completed` is called, and nothing after it.
///
/// [`StreamingConnection::observe`]: super::StreamingConnection::observe
pub trait Observer<T>: Send + 'static {
    fn on_next(&mut self, value: T);
    fn on_error(&mut self, error: StreamError);
    fn on_completed(&mut self);
}

/// Keeps an [`Observer`] attached. Dropping it detaches the observer.
pub struct ObserverHandle {
    task: JoinHandle<()>,
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl ObserverHandle {
    /// True once the observer saw a terminal event or was detached.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn unsubscribe(self) {}
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
        self.task.abort();
    }
}
