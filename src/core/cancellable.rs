//! One-shot cancellation token shared between a caller and a blocking call.
//!
//! A [`Cancellable`] can be cloned freely; every clone observes the same
//! state. Callbacks connected with [`Cancellable::connect`] run exactly once,
//! on the thread that calls [`Cancellable::cancel`], or immediately on the
//! connecting thread if the token has already fired.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::error::AdmissionError;
use super::signal::{HandlerId, HandlerList};

type CancelCallback = dyn Fn() + Send + Sync;

struct Inner {
    cancelled: AtomicBool,
    handlers: Mutex<HandlerList<CancelCallback>>,
}

/// Thread-safe cancellation token.
#[derive(Clone)]
pub struct Cancellable {
    inner: Arc<Inner>,
}

impl Cancellable {
    /// Create a token that has not fired.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                handlers: Mutex::new(HandlerList::new()),
            }),
        }
    }

    /// Fire the token. Later calls are no-ops.
    pub fn cancel(&self) {
        let handlers = {
            let handlers = self.inner.handlers.lock();
            if self.inner.cancelled.swap(true, Ordering::AcqRel) {
                return;
            }
            handlers.snapshot()
        };
        tracing::debug!(callbacks = handlers.len(), "cancellable fired");
        for handler in handlers {
            handler();
        }
    }

    /// Whether the token has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Return [`AdmissionError::Cancelled`] if the token has fired.
    ///
    /// # Errors
    ///
    /// Returns `AdmissionError::Cancelled` once [`cancel`](Self::cancel) has been called.
    pub fn error_if_cancelled(&self) -> Result<(), AdmissionError> {
        if self.is_cancelled() {
            Err(AdmissionError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run `callback` when the token fires.
    ///
    /// If the token has already fired the callback runs before this returns;
    /// the returned id is then already inert.
    pub fn connect<F>(&self, callback: F) -> HandlerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let callback: Arc<CancelCallback> = Arc::new(callback);
        let mut handlers = self.inner.handlers.lock();
        let id = handlers.connect(Arc::clone(&callback));
        if self.inner.cancelled.load(Ordering::Acquire) {
            handlers.disconnect(id);
            drop(handlers);
            callback();
        }
        id
    }

    /// Disconnect a callback. Unknown or already-fired ids are ignored.
    pub fn disconnect(&self, id: HandlerId) {
        self.inner.handlers.lock().disconnect(id);
    }

    /// Number of callbacks still waiting for the token to fire.
    #[must_use]
    pub fn connected_callbacks(&self) -> usize {
        if self.is_cancelled() {
            return 0;
        }
        self.inner.handlers.lock().len()
    }
}

impl Default for Cancellable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cancellable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellable")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
