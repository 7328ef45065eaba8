use super::*;
use crate::model::{CanvasObject, ObjectPatch, ShapeKind, new_object};

fn put(id: &str, x: f64) -> WriteOp {
    let patch = ObjectPatch { color: Some("#91c9f9".into()), ..ObjectPatch::position(x, 0.0) };
    let mut obj: CanvasObject = new_object(ShapeKind::Rectangle, &patch, 0);
    obj.id = id.to_owned();
    WriteOp::Put(obj)
}

fn queue() -> OfflineQueue {
    OfflineQueue::new(60_000, 3)
}

// =============================================================================
// retention
// =============================================================================

#[test]
fn entry_is_absent_after_retention_window() {
    let t0 = 1_000_000;
    let mut q = queue();
    q.enqueue_at(put("a", 1.0), t0);
    assert_eq!(q.contents_at(t0 + 59_000).len(), 1);
    assert!(q.contents_at(t0 + 61_000).is_empty());
}

#[test]
fn enqueue_prunes_expired_entries() {
    let mut q = queue();
    q.enqueue_at(put("a", 1.0), 0);
    q.enqueue_at(put("b", 1.0), 60_000);
    assert_eq!(q.len(), 1);
    assert_eq!(q.contents_at(60_000)[0].id(), "b");
}

#[test]
fn drain_skips_expired_entries() {
    let mut q = queue();
    q.enqueue_at(put("a", 1.0), 0);
    assert!(q.drain_at(70_000).is_none());
    assert!(q.is_empty());
}

// =============================================================================
// drain
// =============================================================================

#[test]
fn drain_deduplicates_by_id_keeping_last_op() {
    let mut q = queue();
    q.enqueue_at(put("a", 1.0), 0);
    q.enqueue_at(put("b", 2.0), 10);
    q.enqueue_at(put("a", 3.0), 20);
    q.enqueue_at(WriteOp::Delete("b".into()), 30);

    let drained = q.drain_at(40).unwrap();
    assert_eq!(drained.attempt, 1);
    assert_eq!(drained.ops.len(), 2);
    assert_eq!(drained.ops[0], put("a", 3.0));
    assert_eq!(drained.ops[1], WriteOp::Delete("b".into()));
    assert!(q.is_empty());
}

#[test]
fn failed_resend_is_requeued_with_fresh_timestamp() {
    let mut q = queue();
    q.enqueue_at(put("a", 1.0), 0);
    let drained = q.drain_at(50_000).unwrap();
    q.requeue_failed_at(drained.ops, drained.attempt, 55_000);

    // Original timestamp would have expired at 60s.
    assert_eq!(q.contents_at(100_000).len(), 1);
    assert_eq!(q.drain_at(100_000).unwrap().attempt, 2);
}

#[test]
fn resend_is_abandoned_at_attempt_ceiling() {
    let mut q = queue();
    q.enqueue_at(put("a", 1.0), 0);
    for now in [1, 2, 3] {
        if let Some(drained) = q.drain_at(now) {
            q.requeue_failed_at(drained.ops, drained.attempt, now);
        }
    }
    assert!(q.is_empty());
}

#[test]
fn requeued_retry_does_not_beat_newer_failed_write() {
    let mut q = queue();
    q.enqueue_at(put("a", 100.0), 0);
    let drained = q.drain_at(10).unwrap();

    // A newer edit fails while the retry is still in flight.
    q.enqueue_at(put("a", 200.0), 20);
    q.requeue_failed_at(drained.ops, drained.attempt, 30);

    let next = q.drain_at(40).unwrap();
    assert_eq!(next.ops, vec![put("a", 200.0)]);
    assert_eq!(next.attempt, 2);
}

#[test]
fn requeue_keeps_batch_order_at_front() {
    let mut q = queue();
    q.enqueue_at(put("c", 3.0), 0);
    q.requeue_failed_at(vec![put("a", 1.0), put("b", 2.0)], 1, 0);
    let ids: Vec<&str> = q.contents_at(0).into_iter().map(WriteOp::id).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

// =============================================================================
// discard
// =============================================================================

#[test]
fn discard_removes_every_entry_for_id() {
    let mut q = queue();
    q.enqueue_at(put("a", 1.0), 0);
    q.enqueue_at(put("b", 1.0), 0);
    q.enqueue_at(WriteOp::Delete("a".into()), 5);
    q.discard("a");
    assert_eq!(q.len(), 1);
    assert_eq!(q.contents_at(10)[0].id(), "b");
    q.discard("missing");
    assert_eq!(q.len(), 1);
}
