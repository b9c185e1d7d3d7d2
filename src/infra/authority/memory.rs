//! In-process scheduling authority.
//!
//! Implements the parking-lot pattern for downloads: entries queue while
//! downloads are disallowed (for example on a metered connection) or while
//! `max_active` granted entries are outstanding, and are granted in FIFO
//! order as capacity frees up. Used for development, tests and benchmarks.
//!
//! The authority only holds entries that are still queued or granted;
//! removed and invalidated entries are dropped from its state.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::{
    AdmissionError, Authority, Cancellable, DownloadNowCallback, EntryState, HandlerId,
    HandlerList, InvalidatedCallback, InvalidationError, ScheduleEntry, ScheduleParameters,
    Scheduler,
};

/// Scheduling policy of an [`InMemoryAuthority`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityPolicy {
    /// Whether any download may currently be granted.
    pub allow_downloads: bool,
    /// Maximum number of granted entries outstanding at once.
    pub max_active: Option<usize>,
}

impl Default for AuthorityPolicy {
    fn default() -> Self {
        Self {
            allow_downloads: true,
            max_active: None,
        }
    }
}

struct AuthorityState {
    policy: AuthorityPolicy,
    reachable: bool,
    rejection: Option<String>,
    removal_failure: Option<String>,
    connections: usize,
    pending: VecDeque<Arc<InMemoryEntry>>,
    active: Vec<Arc<InMemoryEntry>>,
    subscribers: Vec<Sender<Arc<InMemoryEntry>>>,
}

impl AuthorityState {
    /// Move queued entries into the active set while policy permits.
    /// The caller grants the returned entries after dropping the lock.
    fn admit_pending(&mut self) -> Vec<Arc<InMemoryEntry>> {
        let mut admitted = Vec::new();
        if !self.policy.allow_downloads {
            return admitted;
        }
        while self
            .policy
            .max_active
            .is_none_or(|max| self.active.len() < max)
        {
            let Some(entry) = self.pending.pop_front() else {
                break;
            };
            self.active.push(Arc::clone(&entry));
            admitted.push(entry);
        }
        admitted
    }

    fn forget(&mut self, id: &str) {
        self.pending.retain(|entry| entry.id != id);
        self.active.retain(|entry| entry.id != id);
    }

    /// Hand `entry` to every live subscriber, pruning the ones whose
    /// receiver has been dropped.
    fn publish(&mut self, entry: &Arc<InMemoryEntry>) {
        self.subscribers
            .retain(|subscriber| subscriber.send(Arc::clone(entry)).is_ok());
    }
}

struct Shared {
    state: Mutex<AuthorityState>,
}

/// In-process download scheduler implementing [`Authority`].
#[derive(Clone)]
pub struct InMemoryAuthority {
    shared: Arc<Shared>,
}

impl InMemoryAuthority {
    /// Create an authority with the given policy.
    #[must_use]
    pub fn new(policy: AuthorityPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(AuthorityState {
                    policy,
                    reachable: true,
                    rejection: None,
                    removal_failure: None,
                    connections: 0,
                    pending: VecDeque::new(),
                    active: Vec::new(),
                    subscribers: Vec::new(),
                }),
            }),
        }
    }

    /// Current policy.
    #[must_use]
    pub fn policy(&self) -> AuthorityPolicy {
        self.shared.state.lock().policy
    }

    /// Allow or disallow downloads; allowing grants queued entries.
    pub fn set_allow_downloads(&self, allow: bool) {
        let admitted = {
            let mut state = self.shared.state.lock();
            state.policy.allow_downloads = allow;
            state.admit_pending()
        };
        info!(allow, admitted = admitted.len(), "download policy changed");
        grant_all(&admitted);
    }

    /// Make new connections fail (or succeed again).
    pub fn set_reachable(&self, reachable: bool) {
        self.shared.state.lock().reachable = reachable;
    }

    /// Reject every new schedule request with `reason`; `None` accepts again.
    pub fn reject_with(&self, reason: Option<String>) {
        self.shared.state.lock().rejection = reason;
    }

    /// Fail every removal with `reason`; `None` lets removals succeed again.
    pub fn fail_removals_with(&self, reason: Option<String>) {
        self.shared.state.lock().removal_failure = reason;
    }

    /// Invalidate every entry still waiting for permission.
    ///
    /// Returns how many entries were invalidated.
    pub fn invalidate_all(&self, message: &str) -> usize {
        let pending: Vec<_> = self.shared.state.lock().pending.drain(..).collect();
        pending
            .iter()
            .filter(|entry| entry.invalidate(message))
            .count()
    }

    /// Number of sessions opened so far.
    #[must_use]
    pub fn connections(&self) -> usize {
        self.shared.state.lock().connections
    }

    /// Entries still tracked: granted ones first, then queued ones in FIFO
    /// order. Removed and invalidated entries are not included.
    #[must_use]
    pub fn entries(&self) -> Vec<Arc<InMemoryEntry>> {
        let state = self.shared.state.lock();
        state
            .active
            .iter()
            .chain(state.pending.iter())
            .cloned()
            .collect()
    }

    /// Number of granted entries not yet removed.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.shared.state.lock().active.len()
    }

    /// Subscribe to entries created from now on.
    ///
    /// Lets a test or supervisor act on an entry while the requesting thread
    /// is blocked waiting on it. Each subscriber receives every new entry;
    /// dropping the receiver ends the subscription.
    #[must_use]
    pub fn scheduled(&self) -> Receiver<Arc<InMemoryEntry>> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.shared.state.lock().subscribers.push(tx);
        rx
    }

    /// Number of subscriptions held. Dropped receivers are pruned the next
    /// time an entry is published.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.state.lock().subscribers.len()
    }
}

impl Default for InMemoryAuthority {
    fn default() -> Self {
        Self::new(AuthorityPolicy::default())
    }
}

impl fmt::Debug for InMemoryAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("InMemoryAuthority")
            .field("policy", &state.policy)
            .field("pending", &state.pending.len())
            .field("active", &state.active.len())
            .finish_non_exhaustive()
    }
}

impl Authority for InMemoryAuthority {
    fn connect(
        &self,
        cancellable: Option<&Cancellable>,
    ) -> Result<Box<dyn Scheduler>, AdmissionError> {
        cancellable.map_or(Ok(()), Cancellable::error_if_cancelled)?;

        let mut state = self.shared.state.lock();
        if !state.reachable {
            return Err(AdmissionError::Connection(
                "in-memory authority is unreachable".into(),
            ));
        }
        state.connections += 1;
        debug!(connections = state.connections, "opened scheduler session");

        Ok(Box::new(InMemoryScheduler {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct InMemoryScheduler {
    shared: Arc<Shared>,
}

impl Scheduler for InMemoryScheduler {
    fn schedule(
        &self,
        parameters: &ScheduleParameters,
        cancellable: Option<&Cancellable>,
    ) -> Result<Arc<dyn ScheduleEntry>, AdmissionError> {
        cancellable.map_or(Ok(()), Cancellable::error_if_cancelled)?;

        let entry = Arc::new(InMemoryEntry::new(*parameters, Arc::downgrade(&self.shared)));
        let admitted = {
            let mut state = self.shared.state.lock();
            if let Some(reason) = &state.rejection {
                return Err(AdmissionError::Scheduling(reason.clone()));
            }
            state.pending.push_back(Arc::clone(&entry));
            state.admit_pending()
        };
        debug!(entry = %entry.id, parameters = %parameters, "created schedule entry");
        grant_all(&admitted);

        self.shared.state.lock().publish(&entry);
        Ok(entry)
    }
}

fn grant_all(entries: &[Arc<InMemoryEntry>]) {
    for entry in entries {
        entry.grant();
    }
}

struct EntryStatus {
    state: EntryState,
    invalidation: Option<InvalidationError>,
}

type DownloadNowHandler = dyn Fn(bool) + Send + Sync;
type InvalidatedHandler = dyn Fn(&InvalidationError) + Send + Sync;

/// Schedule entry created by an [`InMemoryAuthority`].
pub struct InMemoryEntry {
    id: String,
    parameters: ScheduleParameters,
    status: Mutex<EntryStatus>,
    download_now_handlers: Mutex<HandlerList<DownloadNowHandler>>,
    invalidated_handlers: Mutex<HandlerList<InvalidatedHandler>>,
    remove_calls: AtomicUsize,
    authority: Weak<Shared>,
}

impl InMemoryEntry {
    fn new(parameters: ScheduleParameters, authority: Weak<Shared>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parameters,
            status: Mutex::new(EntryStatus {
                state: EntryState::Pending,
                invalidation: None,
            }),
            download_now_handlers: Mutex::new(HandlerList::new()),
            invalidated_handlers: Mutex::new(HandlerList::new()),
            remove_calls: AtomicUsize::new(0),
            authority,
        }
    }

    /// Parameters the entry was created with.
    #[must_use]
    pub const fn parameters(&self) -> &ScheduleParameters {
        &self.parameters
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EntryState {
        self.status.lock().state
    }

    /// Number of removal requests received, successful or not.
    #[must_use]
    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    /// Number of observers currently connected.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.download_now_handlers.lock().len() + self.invalidated_handlers.lock().len()
    }

    /// Number of observers ever connected.
    #[must_use]
    pub fn observer_registrations(&self) -> usize {
        self.download_now_handlers.lock().registrations()
            + self.invalidated_handlers.lock().registrations()
    }

    /// Revoke a pending entry. Returns `false` if the entry was not pending.
    pub fn invalidate(&self, message: &str) -> bool {
        let error = InvalidationError::new(message);
        {
            let mut status = self.status.lock();
            if status.state != EntryState::Pending {
                return false;
            }
            status.state = EntryState::Invalidated;
            status.invalidation = Some(error.clone());
        }
        if let Some(shared) = self.authority.upgrade() {
            shared.state.lock().forget(&self.id);
        }
        debug!(entry = %self.id, error = %error, "schedule entry invalidated");

        let handlers = self.invalidated_handlers.lock().snapshot();
        for handler in handlers {
            handler(&error);
        }
        true
    }

    fn grant(&self) -> bool {
        {
            let mut status = self.status.lock();
            if status.state != EntryState::Pending {
                return false;
            }
            status.state = EntryState::Granted;
        }
        debug!(entry = %self.id, "schedule entry granted");

        let handlers = self.download_now_handlers.lock().snapshot();
        for handler in handlers {
            handler(true);
        }
        true
    }
}

impl fmt::Debug for InMemoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryEntry")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl ScheduleEntry for InMemoryEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn download_now(&self) -> bool {
        self.state() == EntryState::Granted
    }

    fn invalidation(&self) -> Option<InvalidationError> {
        self.status.lock().invalidation.clone()
    }

    fn connect_download_now(&self, callback: DownloadNowCallback) -> HandlerId {
        self.download_now_handlers.lock().connect(Arc::from(callback))
    }

    fn connect_invalidated(&self, callback: InvalidatedCallback) -> HandlerId {
        self.invalidated_handlers.lock().connect(Arc::from(callback))
    }

    fn disconnect(&self, id: HandlerId) {
        if !self.download_now_handlers.lock().disconnect(id) {
            self.invalidated_handlers.lock().disconnect(id);
        }
    }

    fn remove(&self, _cancellable: Option<&Cancellable>) -> Result<(), AdmissionError> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);

        let Some(shared) = self.authority.upgrade() else {
            return Err(AdmissionError::Removal(
                "scheduling authority has gone away".into(),
            ));
        };

        let admitted = {
            let mut state = shared.state.lock();
            if let Some(reason) = &state.removal_failure {
                return Err(AdmissionError::Removal(reason.clone()));
            }
            {
                let mut status = self.status.lock();
                if status.state == EntryState::Removed {
                    return Err(AdmissionError::Removal(format!(
                        "entry {} is not scheduled",
                        self.id
                    )));
                }
                status.state = EntryState::Removed;
            }
            state.forget(&self.id);
            state.admit_pending()
        };
        debug!(entry = %self.id, admitted = admitted.len(), "schedule entry removed");
        grant_all(&admitted);
        Ok(())
    }
}
