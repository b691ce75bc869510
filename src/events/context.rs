//! The event store shared by every screen.
//!
//! One [`EventContext`] is created by the app root and handed to consumers by
//! cloning (it is a bundle of `Rc`s). It holds the latest transformed payload
//! per event kind ("slots") plus the connection status. Only the registry
//! writes slots; consumers read through typed accessors and subscribe to the
//! narrow set of slots they render.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::{Rc, Weak};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::payloads::{
    EventPayload, GenerationCompleted, GenerationFailed, GenerationProgress, GenerationStarted,
    QueueSnapshot,
};
use super::registry::{DispatchOutcome, EventRegistry};
use crate::constants::{EVENT_LOG_CAPACITY, FINISHED_GENERATION_CAPACITY, GENERIC_CONNECTION_ERROR};
use crate::network::event_types::{EventKind, GenerationKind, GenerationPhase};

/// Status of the shared stream connection.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ConnectionState {
    pub is_connected: bool,
    pub connection_error: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
}

/// One dispatch, kept for the developer tools screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventLogEntry {
    pub name: String,
    pub received_at: DateTime<Utc>,
    pub outcome: DispatchOutcome,
}

/// Raw store contents. Versions are taken from a single revision counter so
/// any two writes can be ordered.
#[derive(Debug, Default)]
pub struct StoreState {
    connection: ConnectionState,
    connection_version: u64,
    slots: HashMap<EventKind, EventPayload>,
    versions: HashMap<EventKind, u64>,
    revision: u64,
    event_log: VecDeque<EventLogEntry>,
    finished: VecDeque<(GenerationKind, String)>,
}

impl StoreState {
    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    /// Bumped when `is_connected` or `connection_error` change. Activity
    /// timestamps alone do not bump it.
    pub fn connection_version(&self) -> u64 {
        self.connection_version
    }

    pub fn slot(&self, kind: EventKind) -> Option<&EventPayload> {
        self.slots.get(&kind)
    }

    /// Revision at which `kind` was last written, 0 if never.
    pub fn slot_version(&self, kind: EventKind) -> u64 {
        self.versions.get(&kind).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn started(&self, kind: GenerationKind) -> Option<&GenerationStarted> {
        match self.slot(EventKind::Generation(kind, GenerationPhase::Started)) {
            Some(EventPayload::Started(p)) => Some(p),
            _ => None,
        }
    }

    pub fn progress(&self, kind: GenerationKind) -> Option<&GenerationProgress> {
        match self.slot(EventKind::Generation(kind, GenerationPhase::Update)) {
            Some(EventPayload::Progress(p)) => Some(p),
            _ => None,
        }
    }

    pub fn completed(&self, kind: GenerationKind) -> Option<&GenerationCompleted> {
        match self.slot(EventKind::Generation(kind, GenerationPhase::Completed)) {
            Some(EventPayload::Completed(p)) => Some(p),
            _ => None,
        }
    }

    pub fn failed(&self, kind: GenerationKind) -> Option<&GenerationFailed> {
        match self.slot(EventKind::Generation(kind, GenerationPhase::Failed)) {
            Some(EventPayload::Failed(p)) => Some(p),
            _ => None,
        }
    }

    pub fn queue(&self, kind: GenerationKind) -> Option<&QueueSnapshot> {
        match self.slot(EventKind::QueueUpdate(kind)) {
            Some(EventPayload::Queue(p)) => Some(p),
            _ => None,
        }
    }

    /// Whether a `completed` or `failed` event was seen for `generation_id`.
    /// Only the most recent ids are remembered.
    pub fn is_finished(&self, kind: GenerationKind, generation_id: &str) -> bool {
        self.finished
            .iter()
            .any(|(k, id)| *k == kind && id == generation_id)
    }

    /// Most recent dispatches, oldest first.
    pub fn event_log(&self) -> impl Iterator<Item = &EventLogEntry> {
        self.event_log.iter()
    }

    pub(crate) fn replace_slot(&mut self, payload: EventPayload) {
        let kind = payload.kind();
        self.revision += 1;
        self.slots.insert(kind, payload);
        self.versions.insert(kind, self.revision);
    }

    pub(crate) fn mark_finished(&mut self, kind: GenerationKind, generation_id: &str) {
        if self.is_finished(kind, generation_id) {
            return;
        }
        if self.finished.len() == FINISHED_GENERATION_CAPACITY {
            self.finished.pop_front();
        }
        self.finished.push_back((kind, generation_id.to_string()));
    }

    pub(crate) fn mark_connected(&mut self) {
        self.set_connection(true, None);
    }

    pub(crate) fn mark_disconnected(&mut self, error: Option<String>) {
        self.set_connection(false, error);
    }

    pub(crate) fn reset_connection(&mut self) {
        self.set_connection(false, None);
        self.connection.last_activity = None;
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        self.connection.last_activity = Some(at);
    }

    fn set_connection(&mut self, is_connected: bool, error: Option<String>) {
        if self.connection.is_connected == is_connected && self.connection.connection_error == error {
            return;
        }
        self.connection.is_connected = is_connected;
        self.connection.connection_error = error;
        self.revision += 1;
        self.connection_version = self.revision;
    }

    fn record(&mut self, entry: EventLogEntry) {
        if self.event_log.len() == EVENT_LOG_CAPACITY {
            self.event_log.pop_front();
        }
        self.event_log.push_back(entry);
    }
}

/// What changed in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Slot(EventKind),
    Connection,
}

/// The set of changes a subscriber wants to hear about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interest {
    kinds: HashSet<EventKind>,
    connection: bool,
}

impl Interest {
    pub fn slots(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            connection: false,
        }
    }

    pub fn connection() -> Self {
        Self {
            kinds: HashSet::new(),
            connection: true,
        }
    }

    pub fn with_connection(mut self) -> Self {
        self.connection = true;
        self
    }

    pub fn matches(&self, change: Change) -> bool {
        match change {
            Change::Slot(kind) => self.kinds.contains(&kind),
            Change::Connection => self.connection,
        }
    }
}

type Listener = Rc<RefCell<dyn FnMut(Change)>>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Interest, Listener)>,
}

/// Keeps a subscription alive. Dropping it unsubscribes.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    id: u64,
    listeners: Weak<RefCell<Listeners>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            if let Ok(mut listeners) = listeners.try_borrow_mut() {
                listeners.entries.retain(|(id, _, _)| *id != self.id);
            }
        }
    }
}

/// Shared handle to the event store.
#[derive(Clone)]
pub struct EventContext {
    state: Rc<RefCell<StoreState>>,
    registry: Rc<EventRegistry>,
    listeners: Rc<RefCell<Listeners>>,
}

impl Default for EventContext {
    fn default() -> Self {
        Self::new(EventRegistry::standard())
    }
}

impl EventContext {
    pub fn new(registry: EventRegistry) -> Self {
        Self {
            state: Rc::new(RefCell::new(StoreState::default())),
            registry: Rc::new(registry),
            listeners: Rc::new(RefCell::new(Listeners::default())),
        }
    }

    /// Feed one raw stream message through the registry.
    pub fn handle_message(&self, name: &str, data: &str) -> DispatchOutcome {
        let now = Utc::now();
        let (outcome, connection_changed) = {
            let mut state = self.state.borrow_mut();
            let connection_before = state.connection_version;
            state.touch(now);
            let outcome = self.registry.dispatch(&mut state, name, data);
            state.record(EventLogEntry {
                name: name.to_string(),
                received_at: now,
                outcome: outcome.clone(),
            });
            (outcome, state.connection_version != connection_before)
        };

        if let DispatchOutcome::Applied(kind) = outcome {
            self.notify(Change::Slot(kind));
        }
        if connection_changed {
            self.notify(Change::Connection);
        }
        outcome
    }

    /// Transport opened.
    pub fn connection_opened(&self) {
        self.update_connection(|state| {
            state.mark_connected();
            state.touch(Utc::now());
        });
    }

    /// Transport failed; `error` falls back to a generic message.
    pub fn connection_lost(&self, error: Option<&str>) {
        let message = error.unwrap_or(GENERIC_CONNECTION_ERROR).to_string();
        self.update_connection(|state| state.mark_disconnected(Some(message)));
    }

    /// Transport closed on purpose (unmount); no error is recorded.
    pub fn connection_closed(&self) {
        self.update_connection(|state| state.mark_disconnected(None));
    }

    /// Back to the initial connection state, used by manual reconnects.
    pub fn reset_connection(&self) {
        self.update_connection(StoreState::reset_connection);
    }

    pub fn connection(&self) -> ConnectionState {
        self.state.borrow().connection.clone()
    }

    pub fn slot(&self, kind: EventKind) -> Option<EventPayload> {
        self.state.borrow().slot(kind).cloned()
    }

    /// Run `f` against the store. Do not dispatch from inside `f`.
    pub fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.state.borrow())
    }

    pub fn event_log(&self) -> Vec<EventLogEntry> {
        self.state.borrow().event_log.iter().cloned().collect()
    }

    /// Register `callback` for changes matching `interest`.
    ///
    /// Callbacks run after the store borrow is released, so they may read the
    /// context, dispatch, or subscribe further.
    pub fn subscribe<F>(&self, interest: Interest, callback: F) -> Subscription
    where
        F: FnMut(Change) + 'static,
    {
        let mut listeners = self.listeners.borrow_mut();
        listeners.next_id += 1;
        let id = listeners.next_id;
        let listener: Listener = Rc::new(RefCell::new(callback));
        listeners.entries.push((id, interest, listener));
        Subscription {
            id,
            listeners: Rc::downgrade(&self.listeners),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }

    fn update_connection(&self, f: impl FnOnce(&mut StoreState)) {
        let changed = {
            let mut state = self.state.borrow_mut();
            let before = state.connection_version;
            f(&mut state);
            state.connection_version != before
        };
        if changed {
            self.notify(Change::Connection);
        }
    }

    fn notify(&self, change: Change) {
        // Snapshot matching listeners so none of the RefCells are borrowed
        // while user callbacks run.
        let targets: Vec<(u64, Listener)> = self
            .listeners
            .borrow()
            .entries
            .iter()
            .filter(|(_, interest, _)| interest.matches(change))
            .map(|(id, _, listener)| (*id, listener.clone()))
            .collect();

        for (id, listener) in targets {
            // An earlier callback in this round may have unsubscribed it
            let live = self
                .listeners
                .borrow()
                .entries
                .iter()
                .any(|(entry_id, _, _)| *entry_id == id);
            if !live {
                continue;
            }
            match listener.try_borrow_mut() {
                Ok(mut callback) => callback(change),
                Err(_) => crate::warn_log!("Skipping re-entrant notification for {:?}", change),
            }
        }
    }
}
