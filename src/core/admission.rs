//! Admission strategies: a real scheduling authority, or always-grant.

use std::sync::Arc;

use tracing::debug;

use super::authority::Authority;
use super::cancellable::Cancellable;
use super::error::AdmissionError;
use super::handle::ScheduleEntryHandle;
use super::parameters::{build_collection, build_single, ScheduleParameters};
use super::waiter::AdmissionWaiter;

/// Entry point for code that must be admitted before a large download.
///
/// All methods block the calling thread; they need no event loop on it.
/// Implementations are chosen once at configuration time, see
/// [`crate::builders::build_admission`].
pub trait DownloadAdmission: Send + Sync {
    /// Create a schedule entry for `parameters` and block until the download
    /// may start.
    ///
    /// The returned handle must be passed to
    /// [`release_admission`](Self::release_admission) once the download is
    /// done.
    ///
    /// # Errors
    ///
    /// `Connection`, `Scheduling`, `Invalidated` or `Cancelled`; no handle is
    /// produced in any error case.
    fn request_admission(
        &self,
        parameters: &ScheduleParameters,
        cancellable: Option<&Cancellable>,
    ) -> Result<ScheduleEntryHandle, AdmissionError>;

    /// [`request_admission`](Self::request_admission) for a single item of
    /// the given download size.
    ///
    /// # Errors
    ///
    /// Same as [`request_admission`](Self::request_admission).
    fn request_admission_for_item(
        &self,
        size: Option<u64>,
        cancellable: Option<&Cancellable>,
    ) -> Result<ScheduleEntryHandle, AdmissionError> {
        self.request_admission(&build_single(size), cancellable)
    }

    /// [`request_admission`](Self::request_admission) for a batch of items
    /// sharing one schedule entry.
    ///
    /// # Errors
    ///
    /// Same as [`request_admission`](Self::request_admission).
    fn request_admission_for_collection(
        &self,
        sizes: &[Option<u64>],
        cancellable: Option<&Cancellable>,
    ) -> Result<ScheduleEntryHandle, AdmissionError> {
        self.request_admission(&build_collection(sizes), cancellable)
    }

    /// Release a handle returned by one of the request methods.
    ///
    /// # Errors
    ///
    /// `AdmissionError::Removal`; the handle is consumed regardless.
    fn release_admission(
        &self,
        handle: &ScheduleEntryHandle,
        cancellable: Option<&Cancellable>,
    ) -> Result<(), AdmissionError> {
        handle.release(cancellable)
    }
}

/// Admission gated by a scheduling authority.
///
/// Every request opens its own session and entry.
#[derive(Clone)]
pub struct AuthorityAdmission {
    authority: Arc<dyn Authority>,
}

impl AuthorityAdmission {
    /// Gate admission on `authority`.
    #[must_use]
    pub fn new(authority: Arc<dyn Authority>) -> Self {
        Self { authority }
    }
}

impl DownloadAdmission for AuthorityAdmission {
    fn request_admission(
        &self,
        parameters: &ScheduleParameters,
        cancellable: Option<&Cancellable>,
    ) -> Result<ScheduleEntryHandle, AdmissionError> {
        debug!(parameters = %parameters, "waiting for download admission");

        let scheduler = self.authority.connect(cancellable)?;
        let entry = scheduler.schedule(parameters, cancellable)?;

        AdmissionWaiter::new(&*entry, cancellable).admit()?;

        debug!(entry = entry.id(), "allowed to download");
        Ok(ScheduleEntryHandle::new(entry))
    }
}

/// Admission for deployments without a scheduling authority.
///
/// Every request is granted immediately with an empty handle and every
/// release is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysGrant;

impl DownloadAdmission for AlwaysGrant {
    fn request_admission(
        &self,
        parameters: &ScheduleParameters,
        _cancellable: Option<&Cancellable>,
    ) -> Result<ScheduleEntryHandle, AdmissionError> {
        debug!(
            parameters = %parameters,
            "allowed to download (no scheduling authority configured)"
        );
        Ok(ScheduleEntryHandle::empty())
    }
}
