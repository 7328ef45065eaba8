//! Write scheduler: adaptive batching of optimistic writes.
//!
//! DESIGN
//! ======
//! The scheduler is a pure state machine; it never touches the store or a
//! timer. Callers feed it writes with the current time and act on the
//! returned [`ScheduleOutcome`]; the owner of the event loop arms a timer for
//! [`WriteScheduler::deadline_ms`] and calls [`WriteScheduler::take_due_at`]
//! when it fires.
//!
//! ```text
//!            burst write                    deadline / explicit flush
//!   Idle ─────────────────▶ Batching ──────────────────────────────▶ Flushing
//!    ▲                        ▲  │ burst write (absorbed)               │
//!    │                        │  └──────────┘                          │
//!    │                        └──── burst write during flush ──────────┤
//!    └───────────────────────── finish_flush ──────────────────────────┘
//! ```
//!
//! Cadence: a non-immediate write arriving less than `cadence_ms` after the
//! previous one is part of a burst (an active drag or resize) and is parked
//! in the per-id pending map. A write after a longer gap goes straight
//! through, and so does the very first write: an isolated edit never waits
//! for a batch.
//!
//! EDGE: while a batch is pending every non-immediate write joins it, even
//! after a long gap; writing it through would let the older pending value
//! for the same id land after it when the batch flushes.

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod scheduler_test;

use std::collections::BTreeMap;

use crate::model::{CanvasObject, ObjectId};

/// Scheduler state.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerState {
    /// Nothing pending.
    Idle,
    /// A burst is being coalesced; flush at `deadline_ms`.
    Batching {
        pending: BTreeMap<ObjectId, CanvasObject>,
        deadline_ms: i64,
    },
    /// A batch commit is in flight.
    Flushing,
}

/// What the caller must do with a scheduled write.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleOutcome {
    /// Send this object now.
    WriteThrough(CanvasObject),
    /// Parked; a flush is due at `flush_at_ms`.
    Batched { flush_at_ms: i64 },
}

#[derive(Debug)]
pub struct WriteScheduler {
    state: SchedulerState,
    last_enqueue_at_ms: Option<i64>,
    cadence_ms: i64,
    batch_delay_ms: i64,
}

impl WriteScheduler {
    #[must_use]
    pub fn new(cadence_ms: i64, batch_delay_ms: i64) -> Self {
        Self { state: SchedulerState::Idle, last_enqueue_at_ms: None, cadence_ms, batch_delay_ms }
    }

    /// Schedule a write of `object`.
    pub fn schedule_at(&mut self, object: CanvasObject, immediate: bool, now_ms: i64) -> ScheduleOutcome {
        if immediate {
            self.discard_pending(&object.id);
            return ScheduleOutcome::WriteThrough(object);
        }

        let in_burst = self.last_enqueue_at_ms.is_some_and(|last| now_ms - last < self.cadence_ms);
        self.last_enqueue_at_ms = Some(now_ms);

        match &mut self.state {
            SchedulerState::Batching { pending, deadline_ms } => {
                pending.insert(object.id.clone(), object);
                ScheduleOutcome::Batched { flush_at_ms: *deadline_ms }
            }
            SchedulerState::Idle | SchedulerState::Flushing if in_burst => {
                let deadline_ms = now_ms + self.batch_delay_ms;
                let mut pending = BTreeMap::new();
                pending.insert(object.id.clone(), object);
                self.state = SchedulerState::Batching { pending, deadline_ms };
                ScheduleOutcome::Batched { flush_at_ms: deadline_ms }
            }
            SchedulerState::Idle | SchedulerState::Flushing => ScheduleOutcome::WriteThrough(object),
        }
    }

    /// Drop any parked write for `id` (it is being written or deleted directly).
    pub fn cancel(&mut self, id: &str) {
        self.discard_pending(id);
    }

    /// When the pending batch is due, if one is armed.
    #[must_use]
    pub fn deadline_ms(&self) -> Option<i64> {
        match self.state {
            SchedulerState::Batching { deadline_ms, .. } => Some(deadline_ms),
            _ => None,
        }
    }

    /// Take the pending batch if its deadline has passed.
    pub fn take_due_at(&mut self, now_ms: i64) -> Option<Vec<CanvasObject>> {
        match self.deadline_ms() {
            Some(deadline) if now_ms >= deadline => {
                let batch = self.take_all();
                (!batch.is_empty()).then_some(batch)
            }
            _ => None,
        }
    }

    /// Take the pending batch now, cancelling its timer.
    pub fn take_all(&mut self) -> Vec<CanvasObject> {
        match std::mem::replace(&mut self.state, SchedulerState::Flushing) {
            SchedulerState::Batching { pending, .. } => pending.into_values().collect(),
            other => {
                self.state = other;
                Vec::new()
            }
        }
    }

    /// The in-flight batch commit finished (either way).
    pub fn finish_flush(&mut self) {
        if self.state == SchedulerState::Flushing {
            self.state = SchedulerState::Idle;
        }
    }

    #[must_use]
    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Number of objects waiting in the current batch.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        match &self.state {
            SchedulerState::Batching { pending, .. } => pending.len(),
            _ => 0,
        }
    }

    // EDGE: an immediate write supersedes the parked value for the same id.
    fn discard_pending(&mut self, id: &str) {
        if let SchedulerState::Batching { pending, .. } = &mut self.state {
            pending.remove(id);
            if pending.is_empty() {
                self.state = SchedulerState::Idle;
            }
        }
    }
}
