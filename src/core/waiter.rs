//! Blocking wait for a schedule entry to be granted.
//!
//! Each wait owns a private dispatch context: a `crossbeam_channel` fed by
//! three producers (the entry's permission-change observer, its invalidation
//! observer and the caller's cancellation token). The calling thread blocks
//! on that channel only, so no ambient event loop is required, and nothing
//! outside the call can deliver work into it.
//!
//! # Resolution order
//!
//! Every wake-up drains all queued notifications, re-reads the entry's
//! latched state and then checks, in order:
//!
//! 1. invalidation
//! 2. permission granted
//! 3. cancellation
//!
//! so an invalidation observed together with a grant wins, and a cancellation
//! arriving after a grant or invalidation has latched is ignored.

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use super::authority::ScheduleEntry;
use super::cancellable::Cancellable;
use super::error::{AdmissionError, InvalidationError};
use super::signal::HandlerId;

/// Terminal outcome of waiting on a schedule entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Permission to download was granted.
    Granted,
    /// The authority invalidated the entry.
    Invalidated(InvalidationError),
    /// The caller's token fired before any other outcome.
    CancelledOut,
}

/// Outcome of a wait together with how it was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitReport {
    /// Terminal outcome.
    pub outcome: WaitOutcome,
    /// Number of times the calling thread blocked on the dispatch context.
    pub iterations: usize,
    /// Whether observers were registered on the entry.
    pub observed: bool,
}

#[derive(Debug)]
enum Notification {
    DownloadNow(bool),
    Invalidated(InvalidationError),
    Cancelled,
}

#[derive(Debug, Default)]
struct WaitState {
    download_now: bool,
    invalidated: Option<InvalidationError>,
    cancelled: bool,
}

impl WaitState {
    fn apply(&mut self, notification: Notification) {
        match notification {
            Notification::DownloadNow(download_now) => self.download_now = download_now,
            Notification::Invalidated(error) => {
                if self.invalidated.is_none() {
                    self.invalidated = Some(error);
                }
            }
            Notification::Cancelled => self.cancelled = true,
        }
    }

    /// Fold in whatever the entry already reports, including changes whose
    /// notifications have not been delivered yet.
    fn sync(&mut self, entry: &dyn ScheduleEntry) {
        if self.invalidated.is_none() {
            self.invalidated = entry.invalidation();
        }
        self.download_now = self.download_now || entry.download_now();
    }

    fn outcome(&self) -> Option<WaitOutcome> {
        if let Some(error) = &self.invalidated {
            Some(WaitOutcome::Invalidated(error.clone()))
        } else if self.download_now {
            Some(WaitOutcome::Granted)
        } else if self.cancelled {
            Some(WaitOutcome::CancelledOut)
        } else {
            None
        }
    }
}

/// Call-scoped replacement for an event loop.
struct DispatchContext {
    sender: Sender<Notification>,
    receiver: Receiver<Notification>,
    iterations: usize,
}

impl DispatchContext {
    fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            sender,
            receiver,
            iterations: 0,
        }
    }

    fn sender(&self) -> Sender<Notification> {
        self.sender.clone()
    }

    /// Apply every queued notification without blocking.
    fn dispatch_pending(&self, state: &mut WaitState) {
        for notification in self.receiver.try_iter() {
            state.apply(notification);
        }
    }

    /// Block for one notification, then apply everything else already queued.
    fn iterate(&mut self, state: &mut WaitState) {
        self.iterations += 1;
        // `self.sender` keeps the channel connected, so recv cannot fail here.
        if let Ok(notification) = self.receiver.recv() {
            state.apply(notification);
        }
        self.dispatch_pending(state);
    }
}

/// Observers registered for one wait; disconnected when dropped.
struct ObserverGuard<'a> {
    entry: &'a dyn ScheduleEntry,
    download_now_id: HandlerId,
    invalidated_id: HandlerId,
    cancellable: Option<(&'a Cancellable, HandlerId)>,
}

impl<'a> ObserverGuard<'a> {
    fn register(
        entry: &'a dyn ScheduleEntry,
        cancellable: Option<&'a Cancellable>,
        context: &DispatchContext,
    ) -> Self {
        let tx = context.sender();
        let download_now_id = entry.connect_download_now(Box::new(move |download_now: bool| {
            let _ = tx.send(Notification::DownloadNow(download_now));
        }));

        let tx = context.sender();
        let invalidated_id = entry.connect_invalidated(Box::new(move |error: &InvalidationError| {
            let _ = tx.send(Notification::Invalidated(error.clone()));
        }));

        let cancellable = cancellable.map(|token| {
            let tx = context.sender();
            let id = token.connect(move || {
                let _ = tx.send(Notification::Cancelled);
            });
            (token, id)
        });

        Self {
            entry,
            download_now_id,
            invalidated_id,
            cancellable,
        }
    }
}

impl Drop for ObserverGuard<'_> {
    fn drop(&mut self) {
        self.entry.disconnect(self.invalidated_id);
        self.entry.disconnect(self.download_now_id);
        if let Some((token, id)) = self.cancellable {
            token.disconnect(id);
        }
    }
}

/// Waits on a single schedule entry until it is granted, invalidated or cancelled.
pub struct AdmissionWaiter<'a> {
    entry: &'a dyn ScheduleEntry,
    cancellable: Option<&'a Cancellable>,
}

impl<'a> AdmissionWaiter<'a> {
    /// Prepare a wait on `entry`, abandoned if `cancellable` fires.
    #[must_use]
    pub const fn new(entry: &'a dyn ScheduleEntry, cancellable: Option<&'a Cancellable>) -> Self {
        Self { entry, cancellable }
    }

    /// Block until the entry reaches a terminal outcome.
    ///
    /// Performs no cleanup on the entry itself; see [`admit`](Self::admit).
    #[must_use]
    pub fn wait(self) -> WaitReport {
        if self.entry.download_now() && self.entry.invalidation().is_none() {
            debug!(entry = self.entry.id(), "schedule entry granted on creation");
            return WaitReport {
                outcome: WaitOutcome::Granted,
                iterations: 0,
                observed: false,
            };
        }

        let mut context = DispatchContext::new();
        let observers = ObserverGuard::register(self.entry, self.cancellable, &context);

        // Anything that changed before the observers were connected.
        let mut state = WaitState {
            cancelled: self.cancellable.is_some_and(Cancellable::is_cancelled),
            ..WaitState::default()
        };
        context.dispatch_pending(&mut state);
        state.sync(self.entry);

        let outcome = loop {
            if let Some(outcome) = state.outcome() {
                break outcome;
            }
            context.iterate(&mut state);
            state.sync(self.entry);
        };
        drop(observers);

        debug!(
            entry = self.entry.id(),
            iterations = context.iterations,
            outcome = ?outcome,
            "finished waiting on schedule entry"
        );

        WaitReport {
            outcome,
            iterations: context.iterations,
            observed: true,
        }
    }

    /// Block until the download may proceed.
    ///
    /// On cancellation the entry is removed on a best-effort basis; a failed
    /// removal is logged and the caller still sees `Cancelled`.
    ///
    /// # Errors
    ///
    /// `AdmissionError::Invalidated` if the authority revoked the entry,
    /// `AdmissionError::Cancelled` if `cancellable` fired first.
    pub fn admit(self) -> Result<(), AdmissionError> {
        let entry = self.entry;
        match self.wait().outcome {
            WaitOutcome::Granted => Ok(()),
            WaitOutcome::Invalidated(error) => {
                // Already gone on the authority side; nothing to remove.
                debug!(entry = entry.id(), error = %error, "schedule entry invalidated");
                Err(AdmissionError::Invalidated(error))
            }
            WaitOutcome::CancelledOut => {
                if let Err(error) = entry.remove(None) {
                    warn!(
                        entry = entry.id(),
                        error = %error,
                        "failed to remove cancelled schedule entry"
                    );
                }
                Err(AdmissionError::Cancelled)
            }
        }
    }
}
