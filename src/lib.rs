//! # Metered Admission
//!
//! Blocking admission control for large downloads.
//!
//! Code that is about to start a large transfer asks a scheduling authority
//! for permission and blocks until the authority grants it, revokes the
//! request, or the caller cancels. The call works from any thread: it does
//! not need an event loop, and it never leaves a reservation behind on the
//! authority.
//!
//! ## Core Problem Solved
//!
//! Scheduling authorities report progress through asynchronous callbacks
//! (permission changed, entry invalidated) while download workers are plain
//! blocking threads. This crate turns that three-way race (grant,
//! invalidation, cancellation) into one deterministic blocking call:
//!
//! - **No spinning**: each call blocks on its own channel fed by the
//!   authority's observers and the cancellation token
//! - **Deterministic**: invalidation beats grant beats cancellation
//! - **No leaks**: observers are disconnected on every exit path, cancelled
//!   entries are removed, and handles release at most once
//! - **Runtime-selected backend**: without an authority every request is
//!   granted immediately with an empty handle
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use metered_admission::core::{AuthorityAdmission, DownloadAdmission};
//! use metered_admission::infra::InMemoryAuthority;
//!
//! let authority = InMemoryAuthority::default();
//! let admission = AuthorityAdmission::new(Arc::new(authority.clone()));
//!
//! // Blocks until the authority allows a 5 MB download.
//! let handle = admission.request_admission_for_item(Some(5_000_000), None)?;
//!
//! // ... perform the download ...
//!
//! admission.release_admission(&handle, None)?;
//! assert_eq!(authority.active_count(), 0);
//! # Ok::<(), metered_admission::core::AdmissionError>(())
//! ```
//!
//! Strategies are normally built from configuration:
//!
//! ```rust
//! use metered_admission::builders::build_builtin_admission;
//! use metered_admission::config::AdmissionConfig;
//!
//! let admission = build_builtin_admission(&AdmissionConfig::default())?;
//! let handle = admission.request_admission_for_collection(&[Some(10), None], None)?;
//! assert!(handle.is_empty());
//! # Ok::<(), metered_admission::core::AdmissionError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core admission abstractions and the blocking waiter.
pub mod core;
/// Configuration models for admission backends.
pub mod config;
/// Builders to construct admission strategies from configuration.
pub mod builders;
/// Infrastructure adapters for scheduling authorities.
pub mod infra;
/// Runtime adapters for async callers.
#[cfg(feature = "tokio-runtime")]
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::core::{
    AdmissionError, Cancellable, DownloadAdmission, ScheduleEntryHandle, ScheduleParameters,
};
