//! Tests for schedule entry handles

use std::sync::Arc;

use metered_admission::core::{Authority, ScheduleEntryHandle, ScheduleParameters, Scheduler};
use metered_admission::infra::InMemoryAuthority;

#[test]
fn test_empty_handle() {
    let handle = ScheduleEntryHandle::default();
    assert!(handle.is_empty());
    assert!(!handle.is_released());
    assert!(handle.release(None).is_ok());
    assert!(handle.release(None).is_ok());
    assert_eq!(format!("{handle:?}"), "ScheduleEntryHandle(empty)");
}

#[test]
fn test_release_through_any_clone_removes_once() {
    let authority = InMemoryAuthority::default();
    let scheduled = authority.scheduled();
    let scheduler: Box<dyn Scheduler> = authority.connect(None).unwrap();
    let entry = scheduler
        .schedule(&ScheduleParameters::default(), None)
        .unwrap();

    let handle = ScheduleEntryHandle::new(Arc::clone(&entry));
    let clones: Vec<_> = (0..4).map(|_| handle.clone()).collect();
    for clone in &clones {
        clone.release(None).unwrap();
    }
    handle.release(None).unwrap();

    assert!(handle.is_released());
    assert_eq!(scheduled.try_recv().unwrap().remove_calls(), 1);
    assert!(authority.entries().is_empty());
}
