//! Derived view models computed from the event store.

pub mod activity;
pub mod generation;
pub mod memo;
pub mod queue;

pub use activity::{current_activity, Activity, ActivityHook};
pub use generation::{GenerationTracker, TrackerPhase};
pub use memo::Memo;
pub use queue::{queue_status, QueueStatus, QueueStatusHook};
