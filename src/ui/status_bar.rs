//! Bottom status bar: connection, current activity, queue counts and a
//! preview of the text being streamed.
//!
//! Each element gets its own narrow subscription so, for example, queue
//! traffic never re-renders the connection indicator. Elements that are not
//! in the page are skipped.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use web_sys::{Document, Element};

use crate::constants::ACTIVITY_PREVIEW_GRAPHEMES;
use crate::events::{ConnectionState, EventContext, Interest, Subscription};
use crate::network::{EventKind, GenerationKind};
use crate::status::{queue_status, Activity, ActivityHook, GenerationTracker, QueueStatus, TrackerPhase};
use crate::utils::{format_since, preview_tail};

pub const CONNECTION_ID: &str = "stream-connection";
pub const ERROR_ID: &str = "stream-error";
pub const ACTIVITY_ID: &str = "stream-activity";
pub const QUEUE_ID: &str = "stream-queue";
pub const PREVIEW_ID: &str = "stream-preview";

const STATUS_CLASSES: [&str; 3] = ["green", "yellow", "red"];

/// Indicator text and colour class for the connection.
pub fn connection_text(connection: &ConnectionState) -> (&'static str, &'static str) {
    match (connection.is_connected, &connection.connection_error) {
        (true, _) => ("Connected", "green"),
        (false, Some(_)) => ("Reconnecting", "red"),
        (false, None) => ("Connecting", "yellow"),
    }
}

/// Tooltip for the connection indicator.
pub fn last_event_text(connection: &ConnectionState, now: DateTime<Utc>) -> String {
    match connection.last_activity {
        Some(at) => format!("Last event {}", format_since(at, now)),
        None => "No events received yet".to_string(),
    }
}

pub fn activity_text(activity: &Activity) -> String {
    match activity.progress() {
        Some(progress) => format!("{} ({})", activity.label(), progress),
        None => activity.label().to_string(),
    }
}

pub fn queue_text(status: &QueueStatus) -> String {
    if status.total == 0 {
        return "Queue empty".to_string();
    }
    let mut parts = Vec::new();
    if status.pending > 0 {
        parts.push(format!("{} pending", status.pending));
    }
    if status.processing > 0 {
        parts.push(format!("{} processing", status.processing));
    }
    if status.failed > 0 {
        parts.push(format!("{} failed", status.failed));
    }
    if parts.is_empty() {
        format!("Queue: {} done", status.completed)
    } else {
        format!("Queue: {}", parts.join(", "))
    }
}

/// Combined counts over both generation queues.
pub fn combined_queue_status(context: &EventContext) -> QueueStatus {
    context.read(|state| {
        GenerationKind::ALL
            .iter()
            .map(|kind| queue_status(state.queue(*kind)))
            .fold(QueueStatus::default(), QueueStatus::combine)
    })
}

pub fn preview_text(tracker: &GenerationTracker) -> String {
    match tracker.phase() {
        TrackerPhase::Waiting => String::new(),
        TrackerPhase::Failed => tracker.error().unwrap_or("Generation failed").to_string(),
        _ => preview_tail(tracker.text(), ACTIVITY_PREVIEW_GRAPHEMES),
    }
}

fn set_status_class(el: &Element, class: &str) {
    let class_list = el.class_list();
    for c in STATUS_CLASSES {
        let _ = class_list.remove_1(c);
    }
    let _ = class_list.add_1(class);
}

fn render_connection(connection_el: Option<&Element>, error_el: Option<&Element>, connection: &ConnectionState) {
    if let Some(el) = connection_el {
        let (text, class) = connection_text(connection);
        set_status_class(el, class);
        el.set_text_content(Some(text));
        let _ = el.set_attribute("title", &last_event_text(connection, Utc::now()));
    }
    if let Some(el) = error_el {
        el.set_text_content(connection.connection_error.as_deref());
        let _ = el
            .class_list()
            .toggle_with_force("hidden", connection.connection_error.is_none());
    }
}

/// Mounted status bar. Dropping it ends all of its subscriptions.
pub struct StatusBar {
    _subscriptions: Vec<Subscription>,
}

impl StatusBar {
    pub fn mount(document: &Document, context: &EventContext) -> Self {
        let mut subscriptions = Vec::new();

        let connection_el = document.get_element_by_id(CONNECTION_ID);
        let error_el = document.get_element_by_id(ERROR_ID);
        if connection_el.is_some() || error_el.is_some() {
            render_connection(connection_el.as_ref(), error_el.as_ref(), &context.connection());
            let ctx = context.clone();
            subscriptions.push(context.subscribe(Interest::connection(), move |_| {
                render_connection(connection_el.as_ref(), error_el.as_ref(), &ctx.connection());
            }));
        }

        if let Some(el) = document.get_element_by_id(ACTIVITY_ID) {
            let mut hook = ActivityHook::new(context.clone());
            let mut shown = hook.current();
            el.set_text_content(Some(&activity_text(&shown)));
            subscriptions.push(context.subscribe(ActivityHook::interest(), move |_| {
                let activity = hook.current();
                if activity != shown {
                    el.set_text_content(Some(&activity_text(&activity)));
                    shown = activity;
                }
            }));
        }

        if let Some(el) = document.get_element_by_id(QUEUE_ID) {
            el.set_text_content(Some(&queue_text(&combined_queue_status(context))));
            let ctx = context.clone();
            let interest = Interest::slots(GenerationKind::ALL.map(EventKind::QueueUpdate));
            subscriptions.push(context.subscribe(interest, move |_| {
                el.set_text_content(Some(&queue_text(&combined_queue_status(&ctx))));
            }));
        }

        if let Some(el) = document.get_element_by_id(PREVIEW_ID) {
            let tracker = Rc::new(RefCell::new(GenerationTracker::follow(GenerationKind::Text)));
            subscriptions.push(GenerationTracker::attach(tracker, context, move |tracker| {
                el.set_text_content(Some(&preview_text(tracker)));
            }));
        }

        crate::debug_log!("Status bar mounted with {} subscriptions", subscriptions.len());
        Self {
            _subscriptions: subscriptions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::GenerationPhase;
    use serde_json::json;

    #[test]
    fn connection_indicator_states() {
        let mut connection = ConnectionState::default();
        assert_eq!(connection_text(&connection), ("Connecting", "yellow"));
        connection.connection_error = Some("lost".into());
        assert_eq!(connection_text(&connection), ("Reconnecting", "red"));
        connection.is_connected = true;
        connection.connection_error = None;
        assert_eq!(connection_text(&connection), ("Connected", "green"));
    }

    #[test]
    fn last_event_tooltip() {
        let now = Utc::now();
        let mut connection = ConnectionState::default();
        assert_eq!(last_event_text(&connection, now), "No events received yet");
        connection.last_activity = Some(now - chrono::Duration::seconds(12));
        assert_eq!(last_event_text(&connection, now), "Last event 12 s ago");
    }

    #[test]
    fn activity_text_includes_progress() {
        assert_eq!(activity_text(&Activity::Idle), "Idle");
        let generating = Activity::Generating {
            kind: GenerationKind::Text,
            generation_id: "g1".into(),
            label: "Generating text".into(),
            progress: "12 tokens".into(),
        };
        assert_eq!(activity_text(&generating), "Generating text (12 tokens)");
    }

    #[test]
    fn queue_text_summarises_counts() {
        assert_eq!(queue_text(&QueueStatus::default()), "Queue empty");
        let status = QueueStatus {
            total: 4,
            pending: 2,
            processing: 1,
            completed: 1,
            failed: 0,
        };
        assert_eq!(queue_text(&status), "Queue: 2 pending, 1 processing");
        let done = QueueStatus {
            total: 2,
            completed: 2,
            ..QueueStatus::default()
        };
        assert_eq!(queue_text(&done), "Queue: 2 done");
    }

    #[test]
    fn combined_queue_sums_both_kinds() {
        let ctx = EventContext::default();
        ctx.handle_message(
            "llm.queue.update",
            &json!({"all_items": [{"status": "pending"}, {"status": "completed"}]}).to_string(),
        );
        ctx.handle_message(
            "image.queue.update",
            &json!({"all_items": [{"status": "processing"}]}).to_string(),
        );
        let status = combined_queue_status(&ctx);
        assert_eq!(status.total, 3);
        assert_eq!(status.active(), 2);
    }

    #[test]
    fn preview_shows_tail_of_stream_or_error() {
        let ctx = EventContext::default();
        let mut tracker = GenerationTracker::follow(GenerationKind::Text);
        assert_eq!(preview_text(&tracker), "");

        ctx.handle_message("llm.generation.started", &json!({"generation_id": "g1"}).to_string());
        ctx.handle_message(
            "llm.generation.update",
            &json!({"generation_id": "g1", "partial_text": "Once upon a time"}).to_string(),
        );
        for kind in [
            EventKind::Generation(GenerationKind::Text, GenerationPhase::Started),
            EventKind::Generation(GenerationKind::Text, GenerationPhase::Update),
        ] {
            if let Some(payload) = ctx.slot(kind) {
                tracker.observe(&payload);
            }
        }
        assert_eq!(preview_text(&tracker), "Once upon a time");
    }
}
