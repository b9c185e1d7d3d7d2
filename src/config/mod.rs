//! Configuration models for admission control.

pub mod admission;

pub use admission::{AdmissionConfig, AuthorityBackendConfig};
