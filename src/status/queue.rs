use serde::Serialize;

use super::memo::Memo;
use crate::events::context::{EventContext, Interest};
use crate::events::payloads::{QueueItemStatus, QueueSnapshot};
use crate::network::event_types::{EventKind, GenerationKind};

/// Counts of the latest queue snapshot grouped by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QueueStatus {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueStatus {
    /// Items still waiting or running.
    pub fn active(&self) -> usize {
        self.pending + self.processing
    }

    pub fn combine(self, other: QueueStatus) -> QueueStatus {
        QueueStatus {
            total: self.total + other.total,
            pending: self.pending + other.pending,
            processing: self.processing + other.processing,
            completed: self.completed + other.completed,
            failed: self.failed + other.failed,
        }
    }
}

/// All zeros until the first snapshot arrives. Items with an unknown status
/// only count toward `total`.
pub fn queue_status(snapshot: Option<&QueueSnapshot>) -> QueueStatus {
    let Some(snapshot) = snapshot else {
        return QueueStatus::default();
    };
    snapshot
        .items
        .iter()
        .fold(
            QueueStatus {
                total: snapshot.items.len(),
                ..QueueStatus::default()
            },
            |mut status, item| {
                match item.status {
                    QueueItemStatus::Pending => status.pending += 1,
                    QueueItemStatus::Processing => status.processing += 1,
                    QueueItemStatus::Completed => status.completed += 1,
                    QueueItemStatus::Failed => status.failed += 1,
                    QueueItemStatus::Other(_) => {}
                }
                status
            },
        )
}

/// Memoised `queue_status` for one generation kind.
pub struct QueueStatusHook {
    context: EventContext,
    kind: GenerationKind,
    memo: Memo<u64, QueueStatus>,
}

impl QueueStatusHook {
    pub fn new(context: EventContext, kind: GenerationKind) -> Self {
        Self {
            context,
            kind,
            memo: Memo::new(),
        }
    }

    pub fn interest(kind: GenerationKind) -> Interest {
        Interest::slots([EventKind::QueueUpdate(kind)])
    }

    pub fn current(&mut self) -> QueueStatus {
        let kind = self.kind;
        let memo = &mut self.memo;
        self.context.read(|state| {
            memo.get_or_compute(state.slot_version(EventKind::QueueUpdate(kind)), || {
                queue_status(state.queue(kind))
            })
        })
    }
}
