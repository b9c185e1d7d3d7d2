//! Async wrappers that run blocking admission calls on tokio's blocking pool.
//!
//! Dropping a pending [`request_admission_async`] future cancels the blocked
//! request. If the entry was granted anyway, the handle never reaches the
//! dropped future and is released on the blocking pool instead, so the
//! entry does not leak on the authority.

use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinError;
use tracing::warn;

use crate::core::{
    AdmissionError, Cancellable, DownloadAdmission, HandlerId, ScheduleEntryHandle,
    ScheduleParameters,
};

enum Delivery {
    Waiting,
    Ready(ScheduleEntryHandle),
    Abandoned,
}

/// Slot the blocking task hands a granted handle through.
struct Handoff {
    slot: Mutex<Delivery>,
}

impl Handoff {
    const fn new() -> Self {
        Self {
            slot: Mutex::new(Delivery::Waiting),
        }
    }

    /// Store `handle` for the awaiting future; gives it back if the future is gone.
    fn offer(&self, handle: ScheduleEntryHandle) -> Option<ScheduleEntryHandle> {
        let mut slot = self.slot.lock();
        if matches!(*slot, Delivery::Abandoned) {
            Some(handle)
        } else {
            *slot = Delivery::Ready(handle);
            None
        }
    }

    fn take(&self) -> Option<ScheduleEntryHandle> {
        let mut slot = self.slot.lock();
        match mem::replace(&mut *slot, Delivery::Waiting) {
            Delivery::Ready(handle) => Some(handle),
            other => {
                *slot = other;
                None
            }
        }
    }

    /// Mark the future as gone and return any handle already delivered.
    fn abandon(&self) -> Option<ScheduleEntryHandle> {
        match mem::replace(&mut *self.slot.lock(), Delivery::Abandoned) {
            Delivery::Ready(handle) => Some(handle),
            Delivery::Waiting | Delivery::Abandoned => None,
        }
    }
}

fn release_abandoned(handle: &ScheduleEntryHandle) {
    if let Err(error) = handle.release(None) {
        warn!(error = %error, "failed to release admission abandoned by its caller");
    }
}

/// Cancels the inner token and reclaims any undelivered handle when dropped
/// unless disarmed.
struct CancelOnDrop {
    token: Cancellable,
    handoff: Arc<Handoff>,
    caller: Option<(Cancellable, HandlerId)>,
    armed: bool,
}

impl CancelOnDrop {
    fn link(caller: Option<Cancellable>) -> Self {
        let token = Cancellable::new();
        let caller = caller.map(|caller| {
            let inner = token.clone();
            let id = caller.connect(move || inner.cancel());
            (caller, id)
        });
        Self {
            token,
            handoff: Arc::new(Handoff::new()),
            caller,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some((caller, id)) = self.caller.take() {
            caller.disconnect(id);
        }
        if !self.armed {
            return;
        }
        if let Some(handle) = self.handoff.abandon() {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn_blocking(move || release_abandoned(&handle));
                }
                Err(_) => release_abandoned(&handle),
            }
        }
        self.token.cancel();
    }
}

fn join_error(error: JoinError) -> AdmissionError {
    if error.is_panic() {
        std::panic::resume_unwind(error.into_panic());
    }
    AdmissionError::Cancelled
}

/// Async form of [`DownloadAdmission::request_admission`].
///
/// The caller's token behaves as in the blocking call; only dropping the
/// future discards a grant.
///
/// # Errors
///
/// Same as [`DownloadAdmission::request_admission`].
pub async fn request_admission_async(
    admission: Arc<dyn DownloadAdmission>,
    parameters: ScheduleParameters,
    cancellable: Option<Cancellable>,
) -> Result<ScheduleEntryHandle, AdmissionError> {
    let mut guard = CancelOnDrop::link(cancellable);
    let token = guard.token.clone();
    let handoff = Arc::clone(&guard.handoff);

    tokio::task::spawn_blocking(move || {
        let handle = admission.request_admission(&parameters, Some(&token))?;
        match handoff.offer(handle) {
            None => Ok(()),
            Some(handle) => {
                release_abandoned(&handle);
                Err(AdmissionError::Cancelled)
            }
        }
    })
    .await
    .map_err(join_error)??;

    guard.disarm();
    guard.handoff.take().ok_or(AdmissionError::Cancelled)
}

/// Async form of [`DownloadAdmission::request_admission_for_item`].
///
/// # Errors
///
/// Same as [`DownloadAdmission::request_admission`].
pub async fn request_admission_for_item_async(
    admission: Arc<dyn DownloadAdmission>,
    size: Option<u64>,
    cancellable: Option<Cancellable>,
) -> Result<ScheduleEntryHandle, AdmissionError> {
    request_admission_async(admission, crate::core::build_single(size), cancellable).await
}

/// Async form of [`DownloadAdmission::release_admission`].
///
/// # Errors
///
/// `AdmissionError::Removal`; the handle is consumed regardless.
pub async fn release_admission_async(
    admission: Arc<dyn DownloadAdmission>,
    handle: ScheduleEntryHandle,
    cancellable: Option<Cancellable>,
) -> Result<(), AdmissionError> {
    tokio::task::spawn_blocking(move || admission.release_admission(&handle, cancellable.as_ref()))
        .await
        .map_err(join_error)?
}
