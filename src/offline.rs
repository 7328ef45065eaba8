//! Offline queue: bounded-lifetime retry buffer for failed writes.
//!
//! DESIGN
//! ======
//! Entries are retained while `now - enqueued_at_ms < retention_ms`. Every
//! enqueue prunes expired entries, so an outage cannot grow the queue
//! without bound; the price is that edits older than the retention window
//! are dropped undelivered.
//!
//! A drain takes every live entry (deduplicated by document id, last op
//! wins) as one batch. If that batch fails it comes back at the front of
//! the queue with a fresh timestamp and a bumped attempt count, so writes
//! that failed while it was in flight still win the next dedup. Once the
//! attempt ceiling is reached the entries are abandoned.
//!
//! A successful or pending direct write for an id makes any queued write
//! for it stale; the owner calls [`OfflineQueue::discard`] for those ids.

#[cfg(test)]
#[path = "offline_test.rs"]
mod offline_test;

use std::collections::{HashMap, VecDeque};

use tracing::warn;

use crate::store::WriteOp;

/// One queued write.
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineEntry {
    pub op: WriteOp,
    pub enqueued_at_ms: i64,
    /// Failed send attempts so far.
    pub attempts: u32,
}

/// A batch taken from the queue for one resend attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Drained {
    pub ops: Vec<WriteOp>,
    /// Attempt number this resend represents (1 = first retry).
    pub attempt: u32,
}

#[derive(Debug)]
pub struct OfflineQueue {
    entries: VecDeque<OfflineEntry>,
    retention_ms: i64,
    max_attempts: u32,
}

impl OfflineQueue {
    #[must_use]
    pub fn new(retention_ms: i64, max_attempts: u32) -> Self {
        Self { entries: VecDeque::new(), retention_ms, max_attempts }
    }

    /// Append a failed write, then discard everything past retention.
    pub fn enqueue_at(&mut self, op: WriteOp, now_ms: i64) {
        self.entries.push_back(OfflineEntry { op, enqueued_at_ms: now_ms, attempts: 0 });
        self.prune(now_ms);
    }

    /// Take every live entry as one batch. Returns `None` when nothing is queued.
    pub fn drain_at(&mut self, now_ms: i64) -> Option<Drained> {
        self.prune(now_ms);
        if self.entries.is_empty() {
            return None;
        }

        let mut ops: Vec<WriteOp> = Vec::with_capacity(self.entries.len());
        let mut slot: HashMap<String, usize> = HashMap::new();
        let mut attempts = 0;
        for entry in self.entries.drain(..) {
            attempts = attempts.max(entry.attempts);
            if let Some(&i) = slot.get(entry.op.id()) {
                ops[i] = entry.op;
            } else {
                slot.insert(entry.op.id().to_owned(), ops.len());
                ops.push(entry.op);
            }
        }
        Some(Drained { ops, attempt: attempts + 1 })
    }

    /// Put a failed resend back, ahead of anything queued since, with a
    /// fresh timestamp.
    ///
    /// Entries that have used up their attempts are dropped and logged.
    pub fn requeue_failed_at(&mut self, ops: Vec<WriteOp>, attempt: u32, now_ms: i64) {
        if attempt >= self.max_attempts {
            warn!(count = ops.len(), attempt, "offline retry ceiling reached; dropping writes");
            return;
        }
        for op in ops.into_iter().rev() {
            self.entries.push_front(OfflineEntry { op, enqueued_at_ms: now_ms, attempts: attempt });
        }
        self.prune(now_ms);
    }

    /// Forget every queued write for `id`; a newer write supersedes them.
    pub fn discard(&mut self, id: &str) {
        self.entries.retain(|e| e.op.id() != id);
    }

    /// Live (non-expired) queued ops as of `now_ms`. Does not mutate.
    #[must_use]
    pub fn contents_at(&self, now_ms: i64) -> Vec<&WriteOp> {
        self.entries
            .iter()
            .filter(|e| self.is_live(e, now_ms))
            .map(|e| &e.op)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_live(&self, entry: &OfflineEntry, now_ms: i64) -> bool {
        now_ms - entry.enqueued_at_ms < self.retention_ms
    }

    fn prune(&mut self, now_ms: i64) {
        let before = self.entries.len();
        let retention_ms = self.retention_ms;
        self.entries.retain(|e| now_ms - e.enqueued_at_ms < retention_ms);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            warn!(dropped, retention_ms, "offline writes expired undelivered");
        }
    }
}
