//! Schedule parameters and the builders that derive them from download sizes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel meaning the download size cannot be determined ahead of time.
pub const SIZE_UNKNOWABLE: u64 = u64::MAX;

/// Parameters sent to the scheduling authority when creating an entry.
///
/// Serializes with the authority's key names; absent bounds are omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleParameters {
    /// Whether the transfer can be resumed after interruption.
    pub resumable: bool,
    /// Lower bound on the transfer size in bytes.
    #[serde(rename = "size-minimum", default, skip_serializing_if = "Option::is_none")]
    pub size_minimum: Option<u64>,
    /// Upper bound on the transfer size in bytes.
    #[serde(rename = "size-maximum", default, skip_serializing_if = "Option::is_none")]
    pub size_maximum: Option<u64>,
}

impl fmt::Display for ScheduleParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}

/// Whether `size` describes a known, finite download size.
///
/// Zero is how callers report a size they have not looked up yet.
#[must_use]
pub const fn is_known_size(size: Option<u64>) -> bool {
    matches!(size, Some(s) if s != 0 && s != SIZE_UNKNOWABLE)
}

/// Build parameters for a single download.
///
/// Known sizes pin both bounds to the exact size.
#[must_use]
pub const fn build_single(size: Option<u64>) -> ScheduleParameters {
    // No transfer backend can resume yet.
    let mut parameters = ScheduleParameters {
        resumable: false,
        size_minimum: None,
        size_maximum: None,
    };
    if is_known_size(size) {
        parameters.size_minimum = size;
        parameters.size_maximum = size;
    }
    parameters
}

/// Build parameters for a batch of downloads sharing one schedule entry.
///
/// Sizes are not aggregated: a single entry covers the whole batch and the
/// authority is given no bounds. `sizes` is intentionally unused beyond its
/// length, since per-item schedule entries are not supported.
#[must_use]
pub fn build_collection(sizes: &[Option<u64>]) -> ScheduleParameters {
    tracing::trace!(items = sizes.len(), "building parameters for download batch");
    ScheduleParameters {
        resumable: false,
        size_minimum: None,
        size_maximum: None,
    }
}
