//! Handles to granted schedule entries and their release.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use super::authority::ScheduleEntry;
use super::cancellable::Cancellable;
use super::error::AdmissionError;

struct HandleInner {
    entry: Arc<dyn ScheduleEntry>,
    consumed: AtomicBool,
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        if !self.consumed.load(Ordering::Acquire) {
            warn!(
                entry = self.entry.id(),
                "schedule entry handle dropped without release; entry leaks on the authority"
            );
        }
    }
}

/// Opaque, single-use token for a granted schedule entry.
///
/// An empty handle means no entry was created. Clones share the same
/// consumed state, so the entry is removed at most once however many clones
/// are released.
#[derive(Clone, Default)]
pub struct ScheduleEntryHandle {
    inner: Option<Arc<HandleInner>>,
}

impl ScheduleEntryHandle {
    /// A handle that refers to no entry.
    #[must_use]
    pub const fn empty() -> Self {
        Self { inner: None }
    }

    /// Take ownership of a granted entry.
    #[must_use]
    pub fn new(entry: Arc<dyn ScheduleEntry>) -> Self {
        Self {
            inner: Some(Arc::new(HandleInner {
                entry,
                consumed: AtomicBool::new(false),
            })),
        }
    }

    /// Whether the handle refers to no entry.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Whether the handle has already been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.consumed.load(Ordering::Acquire))
    }

    /// Remove the entry from the authority's schedule.
    ///
    /// Empty or already released handles succeed without contacting the
    /// authority. The handle is consumed even when removal fails; do not
    /// retry.
    ///
    /// # Errors
    ///
    /// `AdmissionError::Removal` if the authority failed to remove the entry.
    pub fn release(&self, cancellable: Option<&Cancellable>) -> Result<(), AdmissionError> {
        let Some(inner) = &self.inner else {
            debug!("releasing empty schedule entry handle");
            return Ok(());
        };

        if inner.consumed.swap(true, Ordering::AcqRel) {
            debug!(entry = inner.entry.id(), "schedule entry handle already released");
            return Ok(());
        }

        debug!(entry = inner.entry.id(), "removing schedule entry");
        inner.entry.remove(cancellable)
    }
}

impl fmt::Debug for ScheduleEntryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            None => f.write_str("ScheduleEntryHandle(empty)"),
            Some(inner) => f
                .debug_struct("ScheduleEntryHandle")
                .field("entry", &inner.entry.id())
                .field("released", &inner.consumed.load(Ordering::Acquire))
                .finish(),
        }
    }
}
