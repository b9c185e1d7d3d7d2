//! Runtime adapters for calling the blocking admission API from async code.

pub mod tokio_bridge;

pub use tokio_bridge::{
    release_admission_async, request_admission_async, request_admission_for_item_async,
};
