//! Tests for error types

use std::error::Error as _;

use metered_admission::core::{AdmissionError, InvalidationError};

#[test]
fn test_connection_error() {
    let err = AdmissionError::Connection("no bus".to_string());
    assert_eq!(format!("{}", err), "scheduling authority unreachable: no bus");
}

#[test]
fn test_scheduling_error() {
    let err = AdmissionError::Scheduling("quota".to_string());
    assert_eq!(format!("{}", err), "schedule entry rejected: quota");
}

#[test]
fn test_invalidated_error_keeps_source() {
    let err = AdmissionError::Invalidated(InvalidationError::new("daemon restarted"));
    assert_eq!(format!("{}", err), "schedule entry invalidated: daemon restarted");
    let source = err.source().expect("invalidation carries its cause");
    assert_eq!(source.to_string(), "daemon restarted");
}

#[test]
fn test_cancelled_error() {
    assert_eq!(format!("{}", AdmissionError::Cancelled), "operation was cancelled");
}

#[test]
fn test_removal_error() {
    let err = AdmissionError::Removal("not scheduled".to_string());
    assert_eq!(format!("{}", err), "failed to remove schedule entry: not scheduled");
}
