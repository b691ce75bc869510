use serde::{Deserialize, Serialize};
use std::fmt;

/// The two kinds of AI generation the backend runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    Text,
    Image,
}

impl GenerationKind {
    pub const ALL: [GenerationKind; 2] = [GenerationKind::Text, GenerationKind::Image];

    /// Prefix used on the wire (`llm.generation.*`, `image.generation.*`)
    pub fn wire_prefix(self) -> &'static str {
        match self {
            GenerationKind::Text => "llm",
            GenerationKind::Image => "image",
        }
    }

    pub fn human_label(self) -> &'static str {
        match self {
            GenerationKind::Text => "Generating text",
            GenerationKind::Image => "Generating image",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationKind::Text => write!(f, "text"),
            GenerationKind::Image => write!(f, "image"),
        }
    }
}

/// Lifecycle position of a generation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    Started,
    Update,
    Completed,
    Failed,
}

impl GenerationPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, GenerationPhase::Completed | GenerationPhase::Failed)
    }
}

/// Every event name the stream is known to emit.
///
/// Names outside this set are ignored by the registry so the backend can add
/// events without breaking older clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Connected,
    Ping,
    Generation(GenerationKind, GenerationPhase),
    QueueUpdate(GenerationKind),
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::Connected,
        EventKind::Ping,
        EventKind::Generation(GenerationKind::Text, GenerationPhase::Started),
        EventKind::Generation(GenerationKind::Text, GenerationPhase::Update),
        EventKind::Generation(GenerationKind::Text, GenerationPhase::Completed),
        EventKind::Generation(GenerationKind::Text, GenerationPhase::Failed),
        EventKind::Generation(GenerationKind::Image, GenerationPhase::Started),
        EventKind::Generation(GenerationKind::Image, GenerationPhase::Update),
        EventKind::Generation(GenerationKind::Image, GenerationPhase::Completed),
        EventKind::Generation(GenerationKind::Image, GenerationPhase::Failed),
        EventKind::QueueUpdate(GenerationKind::Text),
        EventKind::QueueUpdate(GenerationKind::Image),
    ];

    /// Wire name of the event, e.g. `llm.generation.update`.
    pub fn name(self) -> &'static str {
        use GenerationKind::*;
        use GenerationPhase::*;
        match self {
            EventKind::Connected => "connected",
            EventKind::Ping => "ping",
            EventKind::Generation(Text, Started) => "llm.generation.started",
            EventKind::Generation(Text, Update) => "llm.generation.update",
            EventKind::Generation(Text, Completed) => "llm.generation.completed",
            EventKind::Generation(Text, Failed) => "llm.generation.failed",
            EventKind::Generation(Image, Started) => "image.generation.started",
            EventKind::Generation(Image, Update) => "image.generation.update",
            EventKind::Generation(Image, Completed) => "image.generation.completed",
            EventKind::Generation(Image, Failed) => "image.generation.failed",
            EventKind::QueueUpdate(Text) => "llm.queue.update",
            EventKind::QueueUpdate(Image) => "image.queue.update",
        }
    }

    /// Parse a wire name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<EventKind> {
        EventKind::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    pub fn generation(kind: GenerationKind, phase: GenerationPhase) -> EventKind {
        EventKind::Generation(kind, phase)
    }

    pub fn generation_kind(self) -> Option<GenerationKind> {
        match self {
            EventKind::Generation(kind, _) | EventKind::QueueUpdate(kind) => Some(kind),
            EventKind::Connected | EventKind::Ping => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
