//! Unit tests for individual components

mod builders_test;
mod config_test;
mod error_test;
mod handle_test;
mod parameters_test;
mod runtime_test;
