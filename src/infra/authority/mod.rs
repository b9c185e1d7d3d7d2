//! Scheduling authority backends.

pub mod memory;

pub use memory::{AuthorityPolicy, InMemoryAuthority, InMemoryEntry};
