//! Callback bookkeeping shared by cancellation tokens and schedule entries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier returned when a callback is connected; pass it back to disconnect.
///
/// Ids are unique across the process, so an owner with several lists can
/// disconnect by trying each of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    /// Raw numeric value, useful for logging.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Ordered list of connected callbacks.
///
/// Not synchronized itself; owners keep it behind their own lock and call
/// the snapshot outside that lock so callbacks never run with it held.
pub struct HandlerList<F: ?Sized> {
    handlers: Vec<(HandlerId, Arc<F>)>,
    registrations: usize,
}

impl<F: ?Sized> HandlerList<F> {
    /// Create an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handlers: Vec::new(),
            registrations: 0,
        }
    }

    /// Add a callback and return its id.
    pub fn connect(&mut self, handler: Arc<F>) -> HandlerId {
        let id = HandlerId(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed));
        self.registrations += 1;
        self.handlers.push((id, handler));
        id
    }

    /// Remove a callback. Returns `false` if the id was not connected.
    pub fn disconnect(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    /// Clone out the currently connected callbacks, in connection order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<F>> {
        self.handlers.iter().map(|(_, h)| Arc::clone(h)).collect()
    }

    /// Number of currently connected callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no callbacks are connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Total number of `connect` calls over the list's lifetime.
    #[must_use]
    pub const fn registrations(&self) -> usize {
        self.registrations
    }
}

impl<F: ?Sized> Default for HandlerList<F> {
    fn default() -> Self {
        Self::new()
    }
}
