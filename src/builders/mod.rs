//! Builders to construct admission strategies from configuration.

pub mod admission_builder;

pub use admission_builder::{build_admission, build_builtin_admission};
