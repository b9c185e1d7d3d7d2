//! Abstractions over the external download scheduling authority.
//!
//! An [`Authority`] hands out one [`Scheduler`] session per admission
//! request; the session creates [`ScheduleEntry`] records which report
//! permission changes and invalidation through connected callbacks.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::cancellable::Cancellable;
use super::error::{AdmissionError, InvalidationError};
use super::parameters::ScheduleParameters;
use super::signal::HandlerId;

/// Lifecycle state of a schedule entry on the authority side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Waiting for permission.
    Pending,
    /// Permission to download was granted.
    Granted,
    /// The authority revoked the entry.
    Invalidated,
    /// The entry was removed from the schedule.
    Removed,
}

/// Callback invoked with the new value of the entry's download permission.
pub type DownloadNowCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Callback invoked when the authority invalidates the entry.
pub type InvalidatedCallback = Box<dyn Fn(&InvalidationError) + Send + Sync>;

/// A connection to the scheduling authority.
pub trait Authority: Send + Sync {
    /// Open a new session.
    ///
    /// # Errors
    ///
    /// `AdmissionError::Connection` if the authority is unreachable,
    /// `AdmissionError::Cancelled` if `cancellable` fired.
    fn connect(&self, cancellable: Option<&Cancellable>)
        -> Result<Box<dyn Scheduler>, AdmissionError>;
}

/// A session with the scheduling authority.
pub trait Scheduler: Send {
    /// Ask the authority for a schedule entry.
    ///
    /// The returned entry may already report permission to download.
    ///
    /// # Errors
    ///
    /// `AdmissionError::Scheduling` if the authority rejects the request,
    /// `AdmissionError::Cancelled` if `cancellable` fired.
    fn schedule(
        &self,
        parameters: &ScheduleParameters,
        cancellable: Option<&Cancellable>,
    ) -> Result<Arc<dyn ScheduleEntry>, AdmissionError>;
}

/// One pending or active transfer request held by the authority.
pub trait ScheduleEntry: Send + Sync + fmt::Debug {
    /// Opaque identifier assigned by the authority.
    fn id(&self) -> &str;

    /// Whether the download may proceed now.
    fn download_now(&self) -> bool;

    /// The invalidation error, if the authority has already revoked the entry.
    fn invalidation(&self) -> Option<InvalidationError>;

    /// Observe changes of [`download_now`](Self::download_now).
    fn connect_download_now(&self, callback: DownloadNowCallback) -> HandlerId;

    /// Observe invalidation of the entry.
    fn connect_invalidated(&self, callback: InvalidatedCallback) -> HandlerId;

    /// Disconnect an observer previously connected on this entry.
    fn disconnect(&self, id: HandlerId);

    /// Remove the entry from the schedule.
    ///
    /// Implementations are not required to be idempotent.
    ///
    /// # Errors
    ///
    /// `AdmissionError::Removal` if the authority refuses or fails the removal.
    fn remove(&self, cancellable: Option<&Cancellable>) -> Result<(), AdmissionError>;
}
