//! Internal (post-transform) event payloads.
//!
//! These are the only shapes the rest of the crate sees. Wire field names,
//! legacy aliases and missing-field defaults are resolved in
//! [`crate::events::registry`].

use serde::Serialize;
use serde_json::Value;

use crate::network::event_types::{EventKind, GenerationKind, GenerationPhase};

/// Status of a single queued unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    /// Any status string this client does not know about
    Other(String),
}

impl QueueItemStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" => QueueItemStatus::Pending,
            "processing" | "generating" | "running" => QueueItemStatus::Processing,
            "completed" | "complete" | "done" => QueueItemStatus::Completed,
            "failed" | "error" => QueueItemStatus::Failed,
            _ => QueueItemStatus::Other(raw.to_string()),
        }
    }
}

impl Default for QueueItemStatus {
    fn default() -> Self {
        QueueItemStatus::Pending
    }
}

/// Queue-item descriptor carried on every generation lifecycle event.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QueueItem {
    pub id: Option<String>,
    pub status: QueueItemStatus,
    pub generation_type: Option<String>,
    pub prompt_type: Option<String>,
    pub monster_id: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ConnectedInfo {
    pub client_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Heartbeat {
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationStarted {
    pub kind: GenerationKind,
    pub generation_id: String,
    pub item: Option<QueueItem>,
    pub queue_size: Option<u32>,
}

/// Incremental progress. Text generations carry the whole partial text so
/// far plus a running token count; image generations carry elapsed seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationProgress {
    pub kind: GenerationKind,
    pub generation_id: String,
    pub item: Option<QueueItem>,
    pub partial_text: Option<String>,
    pub tokens_so_far: Option<u64>,
    pub elapsed_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationCompleted {
    pub kind: GenerationKind,
    pub generation_id: String,
    pub item: Option<QueueItem>,
    pub result: Value,
}

impl GenerationCompleted {
    /// Generated text, when the result object carries one.
    pub fn text(&self) -> Option<&str> {
        ["text", "generated_text", "content"]
            .iter()
            .find_map(|key| self.result.get(*key).and_then(Value::as_str))
    }

    /// Generated image location, when the result object carries one.
    pub fn image_url(&self) -> Option<&str> {
        ["image_url", "imageUrl", "image_path", "url"]
            .iter()
            .find_map(|key| self.result.get(*key).and_then(Value::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationFailed {
    pub kind: GenerationKind,
    pub generation_id: String,
    pub item: Option<QueueItem>,
    pub error: String,
}

/// Full list of queued and in-flight items, replaced wholesale on each update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueSnapshot {
    pub kind: GenerationKind,
    pub items: Vec<QueueItem>,
    pub queue_size: Option<u32>,
}

/// Transformed payload held in an event slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum EventPayload {
    Connected(ConnectedInfo),
    Ping(Heartbeat),
    Started(GenerationStarted),
    Progress(GenerationProgress),
    Completed(GenerationCompleted),
    Failed(GenerationFailed),
    Queue(QueueSnapshot),
}

impl EventPayload {
    /// The event kind whose slot this payload belongs in.
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Connected(_) => EventKind::Connected,
            EventPayload::Ping(_) => EventKind::Ping,
            EventPayload::Started(p) => EventKind::Generation(p.kind, GenerationPhase::Started),
            EventPayload::Progress(p) => EventKind::Generation(p.kind, GenerationPhase::Update),
            EventPayload::Completed(p) => EventKind::Generation(p.kind, GenerationPhase::Completed),
            EventPayload::Failed(p) => EventKind::Generation(p.kind, GenerationPhase::Failed),
            EventPayload::Queue(p) => EventKind::QueueUpdate(p.kind),
        }
    }

    /// Correlation id for generation lifecycle payloads.
    pub fn generation_id(&self) -> Option<&str> {
        match self {
            EventPayload::Started(p) => Some(&p.generation_id),
            EventPayload::Progress(p) => Some(&p.generation_id),
            EventPayload::Completed(p) => Some(&p.generation_id),
            EventPayload::Failed(p) => Some(&p.generation_id),
            EventPayload::Connected(_) | EventPayload::Ping(_) | EventPayload::Queue(_) => None,
        }
    }
}
