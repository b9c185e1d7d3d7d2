//! Tests for the async runtime bridge

#![cfg(feature = "tokio-runtime")]

use std::sync::Arc;
use std::time::Duration;

use metered_admission::core::{
    AdmissionError, Authority, AuthorityAdmission, Cancellable, DownloadAdmission, EntryState,
    ScheduleEntry, ScheduleParameters, Scheduler,
};
use metered_admission::infra::{AuthorityPolicy, InMemoryAuthority};
use metered_admission::runtime::{
    release_admission_async, request_admission_async, request_admission_for_item_async,
};

/// Delegates to an in-memory authority after a fixed delay in `schedule`.
struct SlowAuthority {
    inner: InMemoryAuthority,
    delay: Duration,
}

struct SlowScheduler {
    inner: Box<dyn Scheduler>,
    delay: Duration,
}

impl Authority for SlowAuthority {
    fn connect(
        &self,
        cancellable: Option<&Cancellable>,
    ) -> Result<Box<dyn Scheduler>, AdmissionError> {
        Ok(Box::new(SlowScheduler {
            inner: self.inner.connect(cancellable)?,
            delay: self.delay,
        }))
    }
}

impl Scheduler for SlowScheduler {
    fn schedule(
        &self,
        parameters: &ScheduleParameters,
        cancellable: Option<&Cancellable>,
    ) -> Result<Arc<dyn ScheduleEntry>, AdmissionError> {
        std::thread::sleep(self.delay);
        self.inner.schedule(parameters, cancellable)
    }
}

fn metered() -> InMemoryAuthority {
    InMemoryAuthority::new(AuthorityPolicy {
        allow_downloads: false,
        max_active: None,
    })
}

#[tokio::test]
async fn test_async_request_and_release() {
    let authority = InMemoryAuthority::default();
    let admission: Arc<dyn DownloadAdmission> =
        Arc::new(AuthorityAdmission::new(Arc::new(authority.clone())));
    let scheduled = authority.scheduled();

    let handle = request_admission_for_item_async(Arc::clone(&admission), Some(64), None)
        .await
        .unwrap();
    let entry = scheduled.try_recv().unwrap();
    release_admission_async(admission, handle, None).await.unwrap();
    assert_eq!(entry.state(), EntryState::Removed);
    assert!(authority.entries().is_empty());
}

#[tokio::test]
async fn test_async_caller_token_cancels_request() {
    let authority = metered();
    let admission: Arc<dyn DownloadAdmission> =
        Arc::new(AuthorityAdmission::new(Arc::new(authority.clone())));
    let token = Cancellable::new();
    let scheduled = authority.scheduled();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let result = request_admission_async(admission, Default::default(), Some(token)).await;
    assert!(matches!(result, Err(AdmissionError::Cancelled)));
    assert_eq!(scheduled.try_recv().unwrap().remove_calls(), 1);
}

#[tokio::test]
async fn test_dropped_future_removes_entry() {
    let authority = metered();
    let admission: Arc<dyn DownloadAdmission> =
        Arc::new(AuthorityAdmission::new(Arc::new(authority.clone())));
    let scheduled = authority.scheduled();

    let result = tokio::time::timeout(
        Duration::from_millis(100),
        request_admission_async(admission, Default::default(), None),
    )
    .await;
    assert!(result.is_err());

    let entry = tokio::task::spawn_blocking(move || scheduled.recv_timeout(Duration::from_secs(5)))
        .await
        .unwrap()
        .unwrap();
    for _ in 0..100 {
        if entry.remove_calls() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(entry.remove_calls(), 1);
    assert_eq!(entry.state(), EntryState::Removed);
}

#[tokio::test]
async fn test_grant_after_dropped_future_is_released() {
    // Downloads are allowed, so the entry comes back already granted, but
    // only after the awaiting future has been dropped.
    let authority = InMemoryAuthority::default();
    let slow = SlowAuthority {
        inner: authority.clone(),
        delay: Duration::from_millis(200),
    };
    let admission: Arc<dyn DownloadAdmission> =
        Arc::new(AuthorityAdmission::new(Arc::new(slow)));
    let scheduled = authority.scheduled();

    let result = tokio::time::timeout(
        Duration::from_millis(50),
        request_admission_async(admission, Default::default(), None),
    )
    .await;
    assert!(result.is_err());

    tokio::time::sleep(Duration::from_millis(500)).await;

    let entry = scheduled.try_recv().unwrap();
    for _ in 0..100 {
        if entry.remove_calls() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(entry.remove_calls(), 1);
    assert_eq!(entry.state(), EntryState::Removed);
    assert_eq!(authority.active_count(), 0);
}

#[tokio::test]
async fn test_caller_cancel_after_grant_keeps_handle() {
    let authority = InMemoryAuthority::default();
    let admission: Arc<dyn DownloadAdmission> =
        Arc::new(AuthorityAdmission::new(Arc::new(authority.clone())));
    let token = Cancellable::new();

    let handle = request_admission_async(Arc::clone(&admission), Default::default(), Some(token.clone()))
        .await
        .unwrap();
    token.cancel();
    assert!(!handle.is_released());
    assert_eq!(authority.active_count(), 1);

    release_admission_async(admission, handle, None).await.unwrap();
    assert_eq!(authority.active_count(), 0);
}
