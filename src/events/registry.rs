//! Event registry: the fixed table that maps each known event name to a
//! payload transform and a store update.
//!
//! All wire-format knowledge lives in the `transform_*` functions below. The
//! backend has shipped both snake_case and camelCase spellings over time
//! (`tokens_so_far` / `tokensSoFar`), so both are accepted; nested fields
//! that are missing or `null` collapse to `None` instead of failing the event.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::context::StoreState;
use super::payloads::{
    ConnectedInfo, EventPayload, GenerationCompleted, GenerationFailed, GenerationProgress,
    GenerationStarted, Heartbeat, QueueItem, QueueItemStatus, QueueSnapshot,
};
use crate::network::event_types::{EventKind, GenerationKind, GenerationPhase};

const FALLBACK_FAILURE_MESSAGE: &str = "Generation failed";

/// Converts a parsed wire payload into its internal shape.
pub type TransformFn = fn(EventKind, &Value) -> Result<EventPayload, TransformError>;
/// Folds a transformed payload into the store.
pub type UpdateFn = fn(&mut StoreState, EventPayload);

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("payload for {0} is not a JSON object")]
    NotAnObject(EventKind),
    #[error("payload for {0} carries no generation id")]
    MissingGenerationId(EventKind),
    #[error("payload for {kind} has unexpected shape: {source}")]
    Shape {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },
}

/// Result of handing one raw message to the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The slot for this kind was replaced
    Applied(EventKind),
    /// No handler is registered for the event name
    Ignored,
    /// The payload could not be parsed or transformed; nothing changed
    Malformed(String),
}

#[derive(Clone, Copy)]
pub struct EventHandler {
    pub transform: TransformFn,
    pub update: UpdateFn,
}

/// Event-name keyed dispatch table.
pub struct EventRegistry {
    handlers: HashMap<EventKind, EventHandler>,
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl EventRegistry {
    /// A registry with no handlers; every event is ignored.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The handler table for every event the backend emits.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(
            EventKind::Connected,
            EventHandler {
                transform: transform_connected,
                update: update_connected,
            },
        );
        registry.register(
            EventKind::Ping,
            EventHandler {
                transform: transform_ping,
                update: replace_slot,
            },
        );
        for kind in GenerationKind::ALL {
            let lifecycle: [(GenerationPhase, TransformFn); 4] = [
                (GenerationPhase::Started, transform_started),
                (GenerationPhase::Update, transform_progress),
                (GenerationPhase::Completed, transform_completed),
                (GenerationPhase::Failed, transform_failed),
            ];
            for (phase, transform) in lifecycle {
                let update: UpdateFn = if phase.is_terminal() {
                    update_terminal
                } else {
                    replace_slot
                };
                registry.register(
                    EventKind::Generation(kind, phase),
                    EventHandler {
                        transform,
                        update,
                    },
                );
            }
            registry.register(
                EventKind::QueueUpdate(kind),
                EventHandler {
                    transform: transform_queue,
                    update: replace_slot,
                },
            );
        }
        registry
    }

    /// Install (or replace) the handler for `kind`.
    pub fn register(&mut self, kind: EventKind, handler: EventHandler) {
        self.handlers.insert(kind, handler);
    }

    pub fn handler(&self, kind: EventKind) -> Option<&EventHandler> {
        self.handlers.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Parse, look up, transform and apply one raw stream message.
    ///
    /// Never fails: malformed input and unknown names are reported through
    /// the returned outcome and leave `state` untouched.
    pub fn dispatch(&self, state: &mut StoreState, name: &str, raw: &str) -> DispatchOutcome {
        let parsed: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                crate::error_log!("Dropping malformed '{}' event: {}", name, e);
                return DispatchOutcome::Malformed(format!("invalid JSON: {}", e));
            }
        };

        let Some((kind, handler)) = EventKind::from_name(name)
            .and_then(|kind| self.handlers.get(&kind).map(|handler| (kind, *handler)))
        else {
            crate::debug_log!("Ignoring unhandled event type: {}", name);
            return DispatchOutcome::Ignored;
        };

        match (handler.transform)(kind, &parsed) {
            Ok(payload) => {
                (handler.update)(state, payload);
                DispatchOutcome::Applied(kind)
            }
            Err(e) => {
                crate::error_log!("Dropping '{}' event: {}", name, e);
                DispatchOutcome::Malformed(e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Update functions
// ---------------------------------------------------------------------------

fn replace_slot(state: &mut StoreState, payload: EventPayload) {
    state.replace_slot(payload);
}

/// Terminal events also retire their generation id for good.
fn update_terminal(state: &mut StoreState, payload: EventPayload) {
    let finished = match &payload {
        EventPayload::Completed(done) => Some((done.kind, done.generation_id.clone())),
        EventPayload::Failed(failed) => Some((failed.kind, failed.generation_id.clone())),
        _ => None,
    };
    if let Some((kind, generation_id)) = finished {
        state.mark_finished(kind, &generation_id);
    }
    state.replace_slot(payload);
}

/// The server greeting also confirms the connection is live.
fn update_connected(state: &mut StoreState, payload: EventPayload) {
    state.replace_slot(payload);
    state.mark_connected();
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireQueueItem {
    #[serde(alias = "queue_id", alias = "queueId")]
    id: Option<Value>,
    status: Option<String>,
    #[serde(alias = "generationType", alias = "type")]
    generation_type: Option<String>,
    #[serde(alias = "promptType")]
    prompt_type: Option<String>,
    #[serde(alias = "monsterId")]
    monster_id: Option<Value>,
    #[serde(alias = "createdAt")]
    created_at: Option<String>,
}

impl From<WireQueueItem> for QueueItem {
    fn from(wire: WireQueueItem) -> Self {
        QueueItem {
            id: wire.id.as_ref().and_then(id_string),
            status: wire
                .status
                .as_deref()
                .map(QueueItemStatus::parse)
                .unwrap_or_default(),
            generation_type: wire.generation_type,
            prompt_type: wire.prompt_type,
            monster_id: wire.monster_id.as_ref().and_then(id_string),
            created_at: wire.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireGenerationEvent {
    #[serde(alias = "generationId")]
    generation_id: Option<Value>,
    item: Option<WireQueueItem>,
    #[serde(alias = "queueSize")]
    queue_size: Option<Value>,
    #[serde(alias = "partialText")]
    partial_text: Option<String>,
    #[serde(alias = "tokensSoFar")]
    tokens_so_far: Option<Value>,
    #[serde(alias = "elapsedSeconds", alias = "elapsed_time")]
    elapsed_seconds: Option<Value>,
    result: Option<Value>,
    error: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireQueueUpdate {
    #[serde(alias = "allItems", alias = "items")]
    all_items: Option<Vec<WireQueueItem>>,
    #[serde(alias = "queueSize")]
    queue_size: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireConnected {
    #[serde(alias = "clientId")]
    client_id: Option<Value>,
    message: Option<String>,
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

fn transform_connected(kind: EventKind, raw: &Value) -> Result<EventPayload, TransformError> {
    let wire: WireConnected = if raw.is_object() {
        decode(kind, raw)?
    } else {
        WireConnected::default()
    };
    Ok(EventPayload::Connected(ConnectedInfo {
        client_id: wire.client_id.as_ref().and_then(id_string),
        message: wire.message,
    }))
}

fn transform_ping(_kind: EventKind, raw: &Value) -> Result<EventPayload, TransformError> {
    let timestamp = match raw {
        Value::Object(map) => map.get("timestamp").and_then(scalar_string),
        other => scalar_string(other),
    };
    Ok(EventPayload::Ping(Heartbeat { timestamp }))
}

fn transform_started(kind: EventKind, raw: &Value) -> Result<EventPayload, TransformError> {
    let (generation_kind, wire) = generation_event(kind, raw)?;
    let generation_id = correlation_id(kind, &wire)?;
    Ok(EventPayload::Started(GenerationStarted {
        kind: generation_kind,
        generation_id,
        queue_size: wire.queue_size.as_ref().and_then(as_u64).map(clamp_u32),
        item: wire.item.map(QueueItem::from),
    }))
}

fn transform_progress(kind: EventKind, raw: &Value) -> Result<EventPayload, TransformError> {
    let (generation_kind, wire) = generation_event(kind, raw)?;
    let generation_id = correlation_id(kind, &wire)?;
    Ok(EventPayload::Progress(GenerationProgress {
        kind: generation_kind,
        generation_id,
        item: wire.item.map(QueueItem::from),
        partial_text: wire.partial_text,
        tokens_so_far: wire.tokens_so_far.as_ref().and_then(as_u64),
        elapsed_seconds: wire.elapsed_seconds.as_ref().and_then(Value::as_f64),
    }))
}

fn transform_completed(kind: EventKind, raw: &Value) -> Result<EventPayload, TransformError> {
    let (generation_kind, wire) = generation_event(kind, raw)?;
    let generation_id = correlation_id(kind, &wire)?;
    Ok(EventPayload::Completed(GenerationCompleted {
        kind: generation_kind,
        generation_id,
        item: wire.item.map(QueueItem::from),
        result: wire.result.unwrap_or(Value::Null),
    }))
}

fn transform_failed(kind: EventKind, raw: &Value) -> Result<EventPayload, TransformError> {
    let (generation_kind, wire) = generation_event(kind, raw)?;
    let generation_id = correlation_id(kind, &wire)?;
    Ok(EventPayload::Failed(GenerationFailed {
        kind: generation_kind,
        generation_id,
        item: wire.item.map(QueueItem::from),
        error: wire
            .error
            .as_ref()
            .and_then(error_text)
            .unwrap_or_else(|| FALLBACK_FAILURE_MESSAGE.to_string()),
    }))
}

fn transform_queue(kind: EventKind, raw: &Value) -> Result<EventPayload, TransformError> {
    let generation_kind = kind
        .generation_kind()
        .unwrap_or(GenerationKind::Text);
    if !raw.is_object() {
        return Err(TransformError::NotAnObject(kind));
    }
    let wire: WireQueueUpdate = decode(kind, raw)?;
    Ok(EventPayload::Queue(QueueSnapshot {
        kind: generation_kind,
        items: wire
            .all_items
            .unwrap_or_default()
            .into_iter()
            .map(QueueItem::from)
            .collect(),
        queue_size: wire.queue_size.as_ref().and_then(as_u64).map(clamp_u32),
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn decode<T: for<'de> Deserialize<'de>>(kind: EventKind, raw: &Value) -> Result<T, TransformError> {
    T::deserialize(raw).map_err(|source| TransformError::Shape { kind, source })
}

fn generation_event(
    kind: EventKind,
    raw: &Value,
) -> Result<(GenerationKind, WireGenerationEvent), TransformError> {
    if !raw.is_object() {
        return Err(TransformError::NotAnObject(kind));
    }
    let generation_kind = kind
        .generation_kind()
        .ok_or(TransformError::NotAnObject(kind))?;
    Ok((generation_kind, decode(kind, raw)?))
}

/// The correlation id, falling back to the queue item's id when the
/// top-level field is absent.
fn correlation_id(kind: EventKind, wire: &WireGenerationEvent) -> Result<String, TransformError> {
    wire.generation_id
        .as_ref()
        .and_then(id_string)
        .or_else(|| {
            wire.item
                .as_ref()
                .and_then(|item| item.id.as_ref())
                .and_then(id_string)
        })
        .ok_or(TransformError::MissingGenerationId(kind))
}

/// Ids arrive as either strings or integers.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn error_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(map) => ["message", "detail", "error"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}
