//! Infrastructure adapters for scheduling authorities.

pub mod authority;
pub use authority::{AuthorityPolicy, InMemoryAuthority, InMemoryEntry};
