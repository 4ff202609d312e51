//! One-shot outcome channel between a guard worker and its caller.

use crate::error::GuardError;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

pub type Outcome<T> = Result<T, GuardError>;

/// Create a linked resolver/future pair.
pub fn completion<T>() -> (Resolver<T>, Guarded<T>) {
    let (tx, rx) = oneshot::channel();
    (
        Resolver {
            tx: Mutex::new(Some(tx)),
        },
        Guarded { rx },
    )
}

/// Write side of a [`Guarded`]. Dropping it unresolved yields `Abandoned`.
pub struct Resolver<T> {
    tx: Mutex<Option<oneshot::Sender<Outcome<T>>>>,
}

impl<T> Resolver<T> {
    /// Store `outcome` if nothing has been stored yet. Returns whether it took.
    pub fn try_resolve(&self, outcome: Outcome<T>) -> bool {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        match tx {
            Some(tx) => {
                // A dropped receiver still counts as the one resolution.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Pending outcome of a deferred guarded run.
#[must_use = "a guarded run reports allocations only through its result"]
#[derive(Debug)]
pub struct Guarded<T> {
    rx: oneshot::Receiver<Outcome<T>>,
}

impl<T> Guarded<T> {
    /// Block the current thread until the worker resolves.
    ///
    /// Must not be called from inside an async runtime; await the future there.
    pub fn wait(self) -> Outcome<T> {
        self.rx.blocking_recv().unwrap_or(Err(GuardError::Abandoned))
    }

    /// Block for at most `timeout`. `None` means the worker is still running.
    ///
    /// Once this returns `Some`, the outcome is spent: do not wait or poll again.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Outcome<T>> {
        let deadline = Instant::now() + timeout;
        let waker = Waker::from(Arc::new(Unparker(thread::current())));
        let mut cx = Context::from_waker(&waker);
        loop {
            if let Poll::Ready(outcome) = Pin::new(&mut *self).poll(&mut cx) {
                return Some(outcome);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            if remaining.is_zero() {
                return None;
            }
            thread::park_timeout(remaining);
        }
    }
}

impl<T> Future for Guarded<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(GuardError::Abandoned)))
    }
}

struct Unparker(Thread);

impl Wake for Unparker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }
}
