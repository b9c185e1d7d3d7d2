//! Core admission abstractions: parameters, authority traits, the blocking
//! waiter and entry handles.

pub mod admission;
pub mod authority;
pub mod cancellable;
pub mod error;
pub mod handle;
pub mod parameters;
pub mod signal;
pub mod waiter;

pub use admission::{AlwaysGrant, AuthorityAdmission, DownloadAdmission};
pub use authority::{
    Authority, DownloadNowCallback, EntryState, InvalidatedCallback, ScheduleEntry, Scheduler,
};
pub use cancellable::Cancellable;
pub use error::{AdmissionError, AppResult, InvalidationError};
pub use handle::ScheduleEntryHandle;
pub use parameters::{build_collection, build_single, is_known_size, ScheduleParameters, SIZE_UNKNOWABLE};
pub use signal::{HandlerId, HandlerList};
pub use waiter::{AdmissionWaiter, WaitOutcome, WaitReport};
