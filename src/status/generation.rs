//! Follows a single generation by correlation id and accumulates its output.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;

use crate::events::context::{Change, EventContext, Interest, Subscription};
use crate::events::payloads::EventPayload;
use crate::network::event_types::{EventKind, GenerationKind, GenerationPhase};
use crate::debug_log;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerPhase {
    /// No generation id yet
    Waiting,
    Started,
    Generating,
    Completed,
    Failed,
}

impl TrackerPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, TrackerPhase::Completed | TrackerPhase::Failed)
    }
}

/// Streaming display state for one generation.
///
/// Events carrying any other generation id are ignored, which protects the
/// display from late updates of a superseded run. Once a terminal event is
/// seen the state is frozen.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationTracker {
    kind: GenerationKind,
    generation_id: Option<String>,
    /// Adopt the next `started` event instead of waiting for an explicit id
    follow: bool,
    phase: TrackerPhase,
    text: String,
    tokens: Option<u64>,
    elapsed_seconds: Option<f64>,
    result: Option<Value>,
    error: Option<String>,
}

impl GenerationTracker {
    /// Tracker that adopts whichever generation of `kind` starts next.
    pub fn follow(kind: GenerationKind) -> Self {
        Self {
            kind,
            generation_id: None,
            follow: true,
            phase: TrackerPhase::Waiting,
            text: String::new(),
            tokens: None,
            elapsed_seconds: None,
            result: None,
            error: None,
        }
    }

    /// Tracker pinned to a known id, e.g. from a mutation ticket.
    pub fn for_generation(kind: GenerationKind, generation_id: impl Into<String>) -> Self {
        let mut tracker = Self::follow(kind);
        tracker.track(generation_id);
        tracker.follow = false;
        tracker
    }

    /// Start tracking `generation_id`, discarding previous output.
    pub fn track(&mut self, generation_id: impl Into<String>) {
        let follow = self.follow;
        *self = Self::follow(self.kind);
        self.follow = follow;
        self.generation_id = Some(generation_id.into());
        self.phase = TrackerPhase::Started;
    }

    pub fn kind(&self) -> GenerationKind {
        self.kind
    }

    pub fn generation_id(&self) -> Option<&str> {
        self.generation_id.as_deref()
    }

    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> Option<u64> {
        self.tokens
    }

    pub fn elapsed_seconds(&self) -> Option<f64> {
        self.elapsed_seconds
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn owns(&self, generation_id: &str) -> bool {
        self.generation_id.as_deref() == Some(generation_id)
    }

    /// Fold one payload into the tracker. Returns whether anything changed.
    pub fn observe(&mut self, payload: &EventPayload) -> bool {
        match payload {
            EventPayload::Started(started) if started.kind == self.kind => {
                // The newest generation wins, finished or not
                let adopt = self.follow && !self.owns(&started.generation_id);
                if adopt {
                    self.track(started.generation_id.clone());
                    return true;
                }
                false
            }
            EventPayload::Progress(progress) if progress.kind == self.kind => {
                if !self.owns(&progress.generation_id) || self.phase.is_terminal() {
                    debug_log!("Tracker ignoring update for {}", progress.generation_id);
                    return false;
                }
                // partial_text is the whole text so far, not a delta
                if let Some(text) = &progress.partial_text {
                    self.text = text.clone();
                }
                if progress.tokens_so_far.is_some() {
                    self.tokens = progress.tokens_so_far;
                }
                if progress.elapsed_seconds.is_some() {
                    self.elapsed_seconds = progress.elapsed_seconds;
                }
                self.phase = TrackerPhase::Generating;
                true
            }
            EventPayload::Completed(done) if done.kind == self.kind => {
                if !self.owns(&done.generation_id) || self.phase.is_terminal() {
                    return false;
                }
                if let Some(text) = done.text() {
                    self.text = text.to_string();
                }
                self.result = Some(done.result.clone());
                self.phase = TrackerPhase::Completed;
                true
            }
            EventPayload::Failed(failed) if failed.kind == self.kind => {
                if !self.owns(&failed.generation_id) || self.phase.is_terminal() {
                    return false;
                }
                self.error = Some(failed.error.clone());
                self.phase = TrackerPhase::Failed;
                true
            }
            _ => false,
        }
    }

    /// Lifecycle slots a tracker of `kind` consumes.
    pub fn interest(kind: GenerationKind) -> Interest {
        Interest::slots(
            [
                GenerationPhase::Started,
                GenerationPhase::Update,
                GenerationPhase::Completed,
                GenerationPhase::Failed,
            ]
            .map(|phase| EventKind::Generation(kind, phase)),
        )
    }

    /// Feed `tracker` from `context` until the returned subscription drops.
    /// `on_change` runs after each payload that changed the tracker.
    pub fn attach(
        tracker: Rc<RefCell<GenerationTracker>>,
        context: &EventContext,
        mut on_change: impl FnMut(&GenerationTracker) + 'static,
    ) -> Subscription {
        let kind = tracker.borrow().kind;
        let ctx = context.clone();
        context.subscribe(Self::interest(kind), move |change| {
            let Change::Slot(slot) = change else {
                return;
            };
            let Some(payload) = ctx.slot(slot) else {
                return;
            };
            let changed = tracker.borrow_mut().observe(&payload);
            if changed {
                on_change(&tracker.borrow());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn send(ctx: &EventContext, name: &str, payload: serde_json::Value) {
        ctx.handle_message(name, &payload.to_string());
    }

    fn attached(ctx: &EventContext, tracker: GenerationTracker) -> (Rc<RefCell<GenerationTracker>>, Subscription) {
        let tracker = Rc::new(RefCell::new(tracker));
        let sub = GenerationTracker::attach(tracker.clone(), ctx, |_| {});
        (tracker, sub)
    }

    #[test]
    fn stale_updates_from_another_generation_are_ignored() {
        let ctx = EventContext::default();
        let (tracker, _sub) = attached(&ctx, GenerationTracker::follow(GenerationKind::Text));

        send(&ctx, "llm.generation.started", json!({"generationId": "g1"}));
        send(&ctx, "llm.generation.update", json!({"generationId": "g1", "partial_text": "Hello"}));
        send(&ctx, "llm.generation.update", json!({"generationId": "g2", "partial_text": "STALE"}));

        let tracker = tracker.borrow();
        assert_eq!(tracker.generation_id(), Some("g1"));
        assert_eq!(tracker.text(), "Hello");
        assert_eq!(tracker.phase(), TrackerPhase::Generating);
    }

    #[test]
    fn terminal_state_is_frozen() {
        let ctx = EventContext::default();
        let (tracker, _sub) = attached(&ctx, GenerationTracker::for_generation(GenerationKind::Text, "g1"));

        send(&ctx, "llm.generation.update", json!({"generation_id": "g1", "partial_text": "Once", "tokens_so_far": 1}));
        send(&ctx, "llm.generation.completed", json!({"generation_id": "g1", "result": {"text": "Once upon"}}));
        send(&ctx, "llm.generation.update", json!({"generation_id": "g1", "partial_text": "Once upon a", "tokens_so_far": 3}));

        let tracker = tracker.borrow();
        assert_eq!(tracker.phase(), TrackerPhase::Completed);
        assert_eq!(tracker.text(), "Once upon");
        assert_eq!(tracker.tokens(), Some(1));
    }

    #[test]
    fn pinned_tracker_does_not_adopt_other_starts() {
        let mut tracker = GenerationTracker::for_generation(GenerationKind::Image, "i1");
        let other = EventPayload::Started(crate::events::payloads::GenerationStarted {
            kind: GenerationKind::Image,
            generation_id: "i2".into(),
            item: None,
            queue_size: None,
        });
        assert!(!tracker.observe(&other));
        assert_eq!(tracker.generation_id(), Some("i1"));
    }

    #[test]
    fn follow_mode_moves_on_after_terminal() {
        let ctx = EventContext::default();
        let (tracker, _sub) = attached(&ctx, GenerationTracker::follow(GenerationKind::Image));

        send(&ctx, "image.generation.started", json!({"generation_id": "i1"}));
        send(&ctx, "image.generation.failed", json!({"generation_id": "i1", "error": "GPU busy"}));
        assert_eq!(tracker.borrow().error(), Some("GPU busy"));

        send(&ctx, "image.generation.started", json!({"generation_id": "i2"}));
        send(&ctx, "image.generation.update", json!({"generation_id": "i2", "elapsed_seconds": 4.5}));
        let tracker = tracker.borrow();
        assert_eq!(tracker.generation_id(), Some("i2"));
        assert_eq!(tracker.error(), None);
        assert_eq!(tracker.elapsed_seconds(), Some(4.5));
    }

    #[test]
    fn follow_mode_switches_to_newer_unfinished_generation() {
        let ctx = EventContext::default();
        let (tracker, _sub) = attached(&ctx, GenerationTracker::follow(GenerationKind::Text));

        send(&ctx, "llm.generation.started", json!({"generation_id": "g1"}));
        send(&ctx, "llm.generation.update", json!({"generation_id": "g1", "partial_text": "old"}));
        send(&ctx, "llm.generation.started", json!({"generation_id": "g2"}));
        send(&ctx, "llm.generation.update", json!({"generation_id": "g2", "partial_text": "new"}));
        send(&ctx, "llm.generation.update", json!({"generation_id": "g1", "partial_text": "old and late"}));

        let tracker = tracker.borrow();
        assert_eq!(tracker.generation_id(), Some("g2"));
        assert_eq!(tracker.text(), "new");
    }

    #[test]
    fn repeated_start_for_tracked_id_keeps_output() {
        let mut tracker = GenerationTracker::follow(GenerationKind::Text);
        let started = EventPayload::Started(crate::events::payloads::GenerationStarted {
            kind: GenerationKind::Text,
            generation_id: "g1".into(),
            item: None,
            queue_size: None,
        });
        assert!(tracker.observe(&started));
        assert!(!tracker.observe(&started));
        assert_eq!(tracker.phase(), TrackerPhase::Started);
    }

    #[test]
    fn other_kinds_are_ignored() {
        let ctx = EventContext::default();
        let (tracker, _sub) = attached(&ctx, GenerationTracker::follow(GenerationKind::Text));
        send(&ctx, "image.generation.started", json!({"generation_id": "i1"}));
        assert_eq!(tracker.borrow().phase(), TrackerPhase::Waiting);
    }

    #[test]
    fn on_change_fires_only_for_owned_events() {
        let ctx = EventContext::default();
        let tracker = Rc::new(RefCell::new(GenerationTracker::for_generation(GenerationKind::Text, "g1")));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _sub = GenerationTracker::attach(tracker, &ctx, move |t| sink.borrow_mut().push(t.text().to_string()));

        send(&ctx, "llm.generation.update", json!({"generation_id": "g0", "partial_text": "old"}));
        send(&ctx, "llm.generation.update", json!({"generation_id": "g1", "partial_text": "new"}));
        assert_eq!(*seen.borrow(), vec!["new".to_string()]);
    }
}
