//! End-to-end checks of the stream synchronisation layer through the public
//! API, with an in-memory transport standing in for `EventSource`.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;

use sanctuary_frontend::events::{
    Change, DispatchOutcome, EventContext, Interest, MountMode, StreamProvider,
};
use sanctuary_frontend::network::{
    EventKind, EventTransport, GenerationKind, GenerationPhase, TransportError,
};
use sanctuary_frontend::status::{
    Activity, ActivityHook, GenerationTracker, QueueStatus, QueueStatusHook, TrackerPhase,
};

#[derive(Default)]
struct FakeStream {
    open: bool,
    on_open: Option<Box<dyn FnMut()>>,
    on_event: Option<Box<dyn FnMut(&str, &str)>>,
    on_error: Option<Box<dyn FnMut(Option<String>)>>,
}

impl EventTransport for FakeStream {
    fn connect(&mut self) -> Result<(), TransportError> {
        self.open = true;
        if let Some(on_open) = self.on_open.as_mut() {
            on_open();
        }
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn set_on_open(&mut self, callback: Box<dyn FnMut()>) {
        self.on_open = Some(callback);
    }

    fn set_on_event(&mut self, callback: Box<dyn FnMut(&str, &str)>) {
        self.on_event = Some(callback);
    }

    fn set_on_error(&mut self, callback: Box<dyn FnMut(Option<String>)>) {
        self.on_error = Some(callback);
    }
}

struct Harness {
    provider: StreamProvider,
    stream: Rc<RefCell<FakeStream>>,
}

impl Harness {
    fn mounted() -> Self {
        let stream = Rc::new(RefCell::new(FakeStream::default()));
        let transport: Rc<RefCell<dyn EventTransport>> = stream.clone();
        let provider = StreamProvider::new(transport, EventContext::default());
        provider.mount(MountMode::Immediate);
        Self { provider, stream }
    }

    fn context(&self) -> &EventContext {
        self.provider.context()
    }

    fn send(&self, name: &str, payload: serde_json::Value) {
        self.send_raw(name, &payload.to_string());
    }

    fn send_raw(&self, name: &str, data: &str) {
        let mut stream = self.stream.borrow_mut();
        if let Some(on_event) = stream.on_event.as_mut() {
            on_event(name, data);
        }
    }

    fn drop_connection(&self) {
        let mut stream = self.stream.borrow_mut();
        stream.open = false;
        if let Some(on_error) = stream.on_error.as_mut() {
            on_error(None);
        }
    }
}

#[test]
fn queue_update_yields_grouped_counts() {
    let harness = Harness::mounted();
    let mut hook = QueueStatusHook::new(harness.context().clone(), GenerationKind::Text);
    assert_eq!(hook.current(), QueueStatus::default());

    harness.send(
        "llm.queue.update",
        json!({"all_items": [{"status": "pending"}, {"status": "completed"}, {"status": "pending"}]}),
    );
    assert_eq!(
        hook.current(),
        QueueStatus {
            total: 3,
            pending: 2,
            processing: 0,
            completed: 1,
            failed: 0
        }
    );
}

#[test]
fn tracker_ignores_updates_for_other_generations() {
    let harness = Harness::mounted();
    let tracker = Rc::new(RefCell::new(GenerationTracker::for_generation(
        GenerationKind::Text,
        "g1",
    )));
    let _subscription = GenerationTracker::attach(tracker.clone(), harness.context(), |_| {});

    harness.send("llm.generation.started", json!({"generationId": "g1"}));
    harness.send(
        "llm.generation.update",
        json!({"generationId": "g1", "partial_text": "Hello"}),
    );
    harness.send(
        "llm.generation.update",
        json!({"generationId": "g2", "partial_text": "STALE"}),
    );

    assert_eq!(tracker.borrow().text(), "Hello");
    assert_eq!(tracker.borrow().phase(), TrackerPhase::Generating);
}

#[test]
fn activity_stays_settled_after_terminal_event() {
    let harness = Harness::mounted();
    let mut activity = ActivityHook::new(harness.context().clone());
    assert_eq!(activity.current(), Activity::Idle);

    harness.send("llm.generation.started", json!({"generation_id": "g1"}));
    assert_eq!(activity.current().progress(), Some("initializing"));

    harness.send(
        "llm.generation.update",
        json!({"generation_id": "g1", "partial_text": "Hi", "tokens_so_far": 12}),
    );
    assert_eq!(activity.current().progress(), Some("12 tokens"));

    harness.send(
        "llm.generation.completed",
        json!({"generation_id": "g1", "result": {"text": "Hi there"}}),
    );
    assert_eq!(activity.current(), Activity::Idle);

    harness.send(
        "llm.generation.update",
        json!({"generation_id": "g1", "partial_text": "late", "tokens_so_far": 13}),
    );
    assert_eq!(activity.current(), Activity::Idle);
}

#[test]
fn malformed_message_leaves_store_untouched() {
    let harness = Harness::mounted();
    harness.send("image.queue.update", json!({"all_items": [{"status": "processing"}]}));
    let before = harness.context().slot(EventKind::QueueUpdate(GenerationKind::Image));

    let outcome = harness.context().handle_message("image.queue.update", "{not json");
    assert!(matches!(outcome, DispatchOutcome::Malformed(_)));
    harness.send_raw("llm.generation.update", "<<garbage>>");

    assert!(harness.context().connection().is_connected);
    assert_eq!(
        harness.context().slot(EventKind::QueueUpdate(GenerationKind::Image)),
        before
    );
    assert!(harness
        .context()
        .slot(EventKind::Generation(
            GenerationKind::Text,
            GenerationPhase::Update
        ))
        .is_none());
}

#[test]
fn unknown_events_are_ignored_and_logged() {
    let harness = Harness::mounted();
    harness.send("dungeon.door.opened", json!({"door": 2}));
    let log = harness.context().event_log();
    let last = log.last().unwrap();
    assert_eq!(last.name, "dungeon.door.opened");
    assert_eq!(last.outcome, DispatchOutcome::Ignored);
}

#[test]
fn subscribers_only_hear_their_own_slots() {
    let harness = Harness::mounted();
    let connection_changes = Rc::new(RefCell::new(0));
    let queue_changes = Rc::new(RefCell::new(0));

    let counter = connection_changes.clone();
    let _connection = harness
        .context()
        .subscribe(Interest::connection(), move |change| {
            assert_eq!(change, Change::Connection);
            *counter.borrow_mut() += 1;
        });
    let counter = queue_changes.clone();
    let _queue = harness.context().subscribe(
        Interest::slots([EventKind::QueueUpdate(GenerationKind::Text)]),
        move |_| *counter.borrow_mut() += 1,
    );

    harness.send("ping", json!({"timestamp": "2024-01-01T00:00:00Z"}));
    harness.send("llm.queue.update", json!({"all_items": []}));
    harness.send("image.queue.update", json!({"all_items": []}));
    assert_eq!(*connection_changes.borrow(), 0);
    assert_eq!(*queue_changes.borrow(), 1);

    harness.drop_connection();
    assert_eq!(*connection_changes.borrow(), 1);
    assert_eq!(*queue_changes.borrow(), 1);
}

#[test]
fn dropped_subscription_stops_callbacks() {
    let harness = Harness::mounted();
    let calls = Rc::new(RefCell::new(0));
    let counter = calls.clone();
    let subscription = harness.context().subscribe(
        Interest::slots([EventKind::QueueUpdate(GenerationKind::Text)]),
        move |_| *counter.borrow_mut() += 1,
    );
    harness.send("llm.queue.update", json!({"all_items": []}));
    drop(subscription);
    harness.send("llm.queue.update", json!({"all_items": []}));
    assert_eq!(*calls.borrow(), 1);
    assert_eq!(harness.context().subscriber_count(), 0);
}

#[test]
fn manual_reconnect_recovers_from_lost_connection() {
    let harness = Harness::mounted();
    harness.drop_connection();
    assert!(!harness.context().connection().is_connected);
    let mut activity = ActivityHook::new(harness.context().clone());
    assert_eq!(activity.current(), Activity::Disconnected);

    harness.provider.reconnect();
    let connection = harness.context().connection();
    assert!(connection.is_connected);
    assert!(connection.connection_error.is_none());
    assert!(harness.stream.borrow().open);

    harness.provider.unmount();
    assert!(!harness.stream.borrow().open);
    assert!(!harness.context().connection().is_connected);
}
