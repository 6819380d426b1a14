//! Timer-backed backoff: one cancellable tokio task per scheduled retry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::{BackoffError, BackoffStrategy, RetryOperation};
use crate::lock;

/// Delay growth for a [`TimeoutBackoff`].
pub trait DelayPolicy: Send {
    /// Advance the pacing state and return the delay for the next retry.
    fn next_delay(&mut self) -> Result<Duration, BackoffError>;

    /// Return to the initial pacing state.
    fn reset(&mut self);
}

/// The single outstanding retry, if any.
#[derive(Default)]
struct Slot {
    next_id: u64,
    scheduled: Option<Scheduled>,
}

struct Scheduled {
    id: u64,
    task: JoinHandle<()>,
}

impl Slot {
    /// Abort the pending timer, if any. The operation is dropped unrun.
    fn cancel(&mut self) {
        if let Some(scheduled) = self.scheduled.take() {
            scheduled.task.abort();
        }
    }

    /// Called by the timer task when it fires. Returns false if the schedule
    /// was replaced or cancelled in the meantime.
    fn release(&mut self, id: u64) -> bool {
        match &self.scheduled {
            Some(scheduled) if scheduled.id == id => {
                self.scheduled = None;
                true
            }
            _ => false,
        }
    }
}

/// Backoff strategy that arms a tokio timer per retry and asks a
/// [`DelayPolicy`] how long to wait.
///
/// The timer task clears the schedule before running the operation, so the
/// operation is free to call [`retry`](BackoffStrategy::retry) again (that is
/// how a failed reconnect schedules the next one).
pub struct TimeoutBackoff<P> {
    name: &'static str,
    pub(super) policy: Mutex<P>,
    slot: Arc<Mutex<Slot>>,
    disposed: AtomicBool,
}

impl<P: DelayPolicy> TimeoutBackoff<P> {
    pub fn new(policy: P) -> Self {
        Self::with_name("timeout backoff", policy)
    }

    /// Like `new`, with a name used in logs and disposed errors.
    pub fn with_name(name: &'static str, policy: P) -> Self {
        Self {
            name,
            policy: Mutex::new(policy),
            slot: Arc::new(Mutex::new(Slot::default())),
            disposed: AtomicBool::new(false),
        }
    }

    fn check_disposed(&self) -> Result<(), BackoffError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(BackoffError::Disposed(self.name));
        }
        Ok(())
    }
}

impl<P: DelayPolicy> BackoffStrategy for TimeoutBackoff<P> {
    fn retry(&self, operation: RetryOperation) -> Result<Duration, BackoffError> {
        self.check_disposed()?;
        let runtime = Handle::try_current().map_err(|_| BackoffError::NoRuntime)?;

        // Held until the new schedule is stored so the timer cannot fire
        // against a slot that does not know about it yet.
        let mut slot = lock(&self.slot);
        // Dispose may have cancelled between the check above and this lock.
        self.check_disposed()?;
        slot.cancel();
        let delay = lock(&self.policy).next_delay()?;

        slot.next_id += 1;
        let id = slot.next_id;
        let slot_cb = Arc::clone(&self.slot);
        let name = self.name;
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if !lock(&slot_cb).release(id) {
                return;
            }
            tracing::debug!(backoff = name, ?delay, "retry timer fired");
            operation().await;
        });
        slot.scheduled = Some(Scheduled { id, task });
        tracing::debug!(backoff = name, ?delay, "retry scheduled");
        Ok(delay)
    }

    fn reset(&self) -> Result<(), BackoffError> {
        self.check_disposed()?;
        lock(&self.slot).cancel();
        lock(&self.policy).reset();
        Ok(())
    }

    fn is_pending(&self) -> bool {
        lock(&self.slot).scheduled.is_some()
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        lock(&self.slot).cancel();
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl<P> Drop for TimeoutBackoff<P> {
    fn drop(&mut self) {
        lock(&self.slot).cancel();
    }
}
