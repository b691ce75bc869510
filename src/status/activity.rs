//! "What is the backend doing right now" view model.

use serde::Serialize;

use super::memo::Memo;
use crate::events::context::{EventContext, Interest, StoreState};
use crate::network::event_types::{EventKind, GenerationKind, GenerationPhase};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Activity {
    Disconnected,
    Idle,
    Generating {
        kind: GenerationKind,
        generation_id: String,
        label: String,
        progress: String,
    },
}

impl Activity {
    pub fn label(&self) -> &str {
        match self {
            Activity::Disconnected => "Disconnected",
            Activity::Idle => "Idle",
            Activity::Generating { label, .. } => label,
        }
    }

    pub fn progress(&self) -> Option<&str> {
        match self {
            Activity::Generating { progress, .. } => Some(progress),
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Activity::Generating { .. })
    }
}

/// Derive the current activity from the store. Text generation is reported
/// ahead of image generation when both are in flight.
pub fn current_activity(state: &StoreState) -> Activity {
    if !state.connection().is_connected {
        return Activity::Disconnected;
    }
    GenerationKind::ALL
        .iter()
        .find_map(|kind| in_flight(state, *kind))
        .unwrap_or(Activity::Idle)
}

fn in_flight(state: &StoreState, kind: GenerationKind) -> Option<Activity> {
    // The latest `started` defines the current generation. Progress is only
    // consulted on its own when no start was seen (e.g. joined mid-run).
    let generation_id = match state.started(kind) {
        Some(started) => started.generation_id.clone(),
        None => state.progress(kind)?.generation_id.clone(),
    };

    if state.is_finished(kind, &generation_id) {
        return None;
    }

    let progress = state
        .progress(kind)
        .filter(|p| p.generation_id == generation_id);

    let description = match (kind, progress) {
        (GenerationKind::Text, Some(p)) if p.tokens_so_far.is_some() => {
            format!("{} tokens", p.tokens_so_far.unwrap_or_default())
        }
        (GenerationKind::Image, Some(p)) if p.elapsed_seconds.is_some() => {
            format!("elapsed {}s", p.elapsed_seconds.unwrap_or_default().max(0.0).floor() as u64)
        }
        _ => "initializing".to_string(),
    };

    Some(Activity::Generating {
        kind,
        generation_id,
        label: kind.human_label().to_string(),
        progress: description,
    })
}

/// Every slot `current_activity` reads.
fn inputs() -> Vec<EventKind> {
    GenerationKind::ALL
        .iter()
        .flat_map(|kind| {
            [
                GenerationPhase::Started,
                GenerationPhase::Update,
                GenerationPhase::Completed,
                GenerationPhase::Failed,
            ]
            .map(|phase| EventKind::Generation(*kind, phase))
        })
        .collect()
}

/// Memoised `current_activity` bound to a context.
pub struct ActivityHook {
    context: EventContext,
    inputs: Vec<EventKind>,
    memo: Memo<(u64, Vec<u64>), Activity>,
}

impl ActivityHook {
    pub fn new(context: EventContext) -> Self {
        Self {
            context,
            inputs: inputs(),
            memo: Memo::new(),
        }
    }

    /// Subscription interest matching the slots this hook reads.
    pub fn interest() -> Interest {
        Interest::slots(inputs()).with_connection()
    }

    pub fn current(&mut self) -> Activity {
        let inputs = &self.inputs;
        let memo = &mut self.memo;
        self.context.read(|state| {
            let key = (
                state.connection_version(),
                inputs.iter().map(|kind| state.slot_version(*kind)).collect(),
            );
            memo.get_or_compute(key, || current_activity(state))
        })
    }

    pub fn computations(&self) -> u64 {
        self.memo.computations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn connected() -> EventContext {
        let ctx = EventContext::default();
        ctx.connection_opened();
        ctx
    }

    fn send(ctx: &EventContext, name: &str, payload: serde_json::Value) {
        ctx.handle_message(name, &payload.to_string());
    }

    fn activity(ctx: &EventContext) -> Activity {
        ctx.read(current_activity)
    }

    #[test]
    fn disconnected_wins_over_everything() {
        let ctx = EventContext::default();
        send(&ctx, "llm.generation.started", json!({"generation_id": "g1"}));
        assert_eq!(activity(&ctx), Activity::Disconnected);
        assert_eq!(activity(&ctx).label(), "Disconnected");
    }

    #[test]
    fn idle_before_any_generation() {
        assert_eq!(activity(&connected()), Activity::Idle);
    }

    #[test]
    fn text_generation_reports_tokens() {
        let ctx = connected();
        send(&ctx, "llm.generation.started", json!({"generation_id": "g1"}));
        assert_eq!(activity(&ctx).progress(), Some("initializing"));
        assert_eq!(activity(&ctx).label(), "Generating text");

        send(
            &ctx,
            "llm.generation.update",
            json!({"generation_id": "g1", "partial_text": "Hi", "tokens_so_far": 12}),
        );
        assert_eq!(activity(&ctx).progress(), Some("12 tokens"));
    }

    #[test]
    fn image_generation_reports_elapsed_seconds() {
        let ctx = connected();
        send(&ctx, "image.generation.started", json!({"generation_id": "i1"}));
        send(&ctx, "image.generation.update", json!({"generation_id": "i1", "elapsed_seconds": 7.8}));
        let current = activity(&ctx);
        assert_eq!(current.label(), "Generating image");
        assert_eq!(current.progress(), Some("elapsed 7s"));
    }

    #[test]
    fn updates_after_terminal_do_not_resume_generating() {
        let ctx = connected();
        send(&ctx, "llm.generation.started", json!({"generation_id": "g1"}));
        send(&ctx, "llm.generation.completed", json!({"generation_id": "g1", "result": {"text": "done"}}));
        assert_eq!(activity(&ctx), Activity::Idle);

        send(&ctx, "llm.generation.update", json!({"generation_id": "g1", "tokens_so_far": 99}));
        assert_eq!(activity(&ctx), Activity::Idle);

        send(&ctx, "image.generation.started", json!({"generation_id": "i1"}));
        send(&ctx, "image.generation.failed", json!({"generation_id": "i1", "error": "boom"}));
        send(&ctx, "image.generation.update", json!({"generation_id": "i1", "elapsed_seconds": 3}));
        assert_eq!(activity(&ctx), Activity::Idle);
    }

    #[test]
    fn progress_for_another_generation_is_not_attributed() {
        let ctx = connected();
        send(&ctx, "llm.generation.started", json!({"generation_id": "g2"}));
        send(&ctx, "llm.generation.update", json!({"generation_id": "g1", "tokens_so_far": 40}));
        match activity(&ctx) {
            Activity::Generating { generation_id, progress, .. } => {
                assert_eq!(generation_id, "g2");
                assert_eq!(progress, "initializing");
            }
            other => panic!("expected generating, got {:?}", other),
        }
    }

    #[test]
    fn late_terminal_event_for_superseded_generation_keeps_idle() {
        let ctx = connected();
        send(&ctx, "llm.generation.started", json!({"generation_id": "g1"}));
        send(&ctx, "llm.generation.started", json!({"generation_id": "g2"}));
        send(&ctx, "llm.generation.completed", json!({"generation_id": "g2", "result": {}}));
        assert_eq!(activity(&ctx), Activity::Idle);

        send(&ctx, "llm.generation.completed", json!({"generation_id": "g1", "result": {}}));
        assert_eq!(activity(&ctx), Activity::Idle);
        send(&ctx, "llm.generation.failed", json!({"generation_id": "g0", "error": "late"}));
        assert_eq!(activity(&ctx), Activity::Idle);
    }

    #[test]
    fn joined_mid_generation_uses_progress_alone() {
        let ctx = connected();
        send(&ctx, "llm.generation.update", json!({"generation_id": "g5", "tokens_so_far": 4}));
        assert_eq!(activity(&ctx).progress(), Some("4 tokens"));
    }

    #[test]
    fn hook_recomputes_only_when_inputs_change() {
        let ctx = connected();
        let mut hook = ActivityHook::new(ctx.clone());
        assert_eq!(hook.current(), Activity::Idle);
        send(&ctx, "ping", json!({}));
        send(&ctx, "llm.queue.update", json!({"all_items": []}));
        assert_eq!(hook.current(), Activity::Idle);
        assert_eq!(hook.computations(), 1);

        send(&ctx, "llm.generation.started", json!({"generation_id": "g1"}));
        assert!(hook.current().is_busy());
        assert_eq!(hook.computations(), 2);

        ctx.connection_lost(None);
        assert_eq!(hook.current(), Activity::Disconnected);
        assert_eq!(hook.computations(), 3);
    }

    #[test]
    fn interest_covers_connection_and_lifecycle_slots() {
        let interest = ActivityHook::interest();
        assert!(interest.matches(crate::events::Change::Connection));
        assert!(interest.matches(crate::events::Change::Slot(EventKind::Generation(
            GenerationKind::Image,
            GenerationPhase::Failed
        ))));
        assert!(!interest.matches(crate::events::Change::Slot(EventKind::Ping)));
    }
}
