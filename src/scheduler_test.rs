use super::*;
use crate::model::{ObjectPatch, ShapeKind, new_object};

fn obj(id: &str, x: f64) -> CanvasObject {
    let patch = ObjectPatch { color: Some("#fde68a".into()), ..ObjectPatch::position(x, 0.0) };
    let mut obj = new_object(ShapeKind::Rectangle, &patch, 0);
    obj.id = id.to_owned();
    obj
}

fn scheduler() -> WriteScheduler {
    WriteScheduler::new(50, 100)
}

/// A scheduler that has just written `lead` through at t=0, so writes
/// within the cadence after it count as a burst.
fn primed() -> WriteScheduler {
    let mut s = scheduler();
    assert!(matches!(s.schedule_at(obj("lead", 0.0), false, 0), ScheduleOutcome::WriteThrough(_)));
    s
}

// =============================================================================
// batching
// =============================================================================

#[test]
fn ten_rapid_writes_become_lead_write_and_one_batch() {
    let mut s = scheduler();
    let mut writes = Vec::new();
    for i in 0..10 {
        let now = i * 10;
        #[allow(clippy::cast_precision_loss)]
        let x = i as f64;
        if let ScheduleOutcome::WriteThrough(o) = s.schedule_at(obj("a", x), false, now) {
            writes.push(vec![o]);
        }
        if let Some(batch) = s.take_due_at(now) {
            writes.push(batch);
        }
    }
    assert_eq!(writes.len(), 1, "only the first write of the burst goes straight out");

    let batch = s.take_due_at(110).unwrap();
    writes.push(batch);
    assert_eq!(writes.len(), 2);
    assert!(writes[0][0].x.abs() < f64::EPSILON);
    assert_eq!(writes[1].len(), 1);
    assert!((writes[1][0].x - 9.0).abs() < f64::EPSILON);
}

#[test]
fn deadline_is_fixed_at_burst_start() {
    let mut s = primed();
    assert_eq!(s.schedule_at(obj("a", 0.0), false, 10), ScheduleOutcome::Batched { flush_at_ms: 110 });
    assert_eq!(s.schedule_at(obj("a", 1.0), false, 50), ScheduleOutcome::Batched { flush_at_ms: 110 });
    assert!(s.take_due_at(109).is_none());
    assert!(s.take_due_at(110).is_some());
    assert_eq!(s.state(), &SchedulerState::Flushing);
}

#[test]
fn pending_map_keeps_one_entry_per_id() {
    let mut s = primed();
    s.schedule_at(obj("a", 0.0), false, 10);
    s.schedule_at(obj("b", 0.0), false, 20);
    s.schedule_at(obj("a", 5.0), false, 30);
    assert_eq!(s.pending_len(), 2);
}

#[test]
fn pending_batch_absorbs_slow_write() {
    let mut s = primed();
    s.schedule_at(obj("a", 0.0), false, 10);
    // 80ms gap exceeds cadence but the batch has not flushed yet.
    assert_eq!(s.schedule_at(obj("a", 7.0), false, 90), ScheduleOutcome::Batched { flush_at_ms: 110 });
    let batch = s.take_due_at(110).unwrap();
    assert!((batch[0].x - 7.0).abs() < f64::EPSILON);
}

// =============================================================================
// write-through
// =============================================================================

#[test]
fn first_write_goes_straight_through() {
    let mut s = scheduler();
    let outcome = s.schedule_at(obj("a", 1.0), false, 5_000);
    assert!(matches!(outcome, ScheduleOutcome::WriteThrough(ref o) if o.id == "a"));
    assert_eq!(s.state(), &SchedulerState::Idle);
    assert!(s.deadline_ms().is_none());
}

#[test]
fn isolated_write_goes_straight_through() {
    let mut s = primed();
    s.schedule_at(obj("a", 0.0), false, 10);
    s.take_due_at(110);
    s.finish_flush();

    let outcome = s.schedule_at(obj("a", 1.0), false, 1_000);
    assert!(matches!(outcome, ScheduleOutcome::WriteThrough(_)));
    assert_eq!(s.state(), &SchedulerState::Idle);
}

#[test]
fn immediate_write_discards_parked_value() {
    let mut s = primed();
    s.schedule_at(obj("a", 0.0), false, 10);
    s.schedule_at(obj("b", 0.0), false, 20);
    let outcome = s.schedule_at(obj("a", 3.0), true, 30);
    assert!(matches!(outcome, ScheduleOutcome::WriteThrough(ref o) if o.id == "a"));
    assert_eq!(s.pending_len(), 1);

    s.schedule_at(obj("b", 3.0), true, 40);
    assert_eq!(s.state(), &SchedulerState::Idle);
    assert!(s.deadline_ms().is_none());
}

// =============================================================================
// explicit flush
// =============================================================================

#[test]
fn take_all_cancels_timer() {
    let mut s = primed();
    s.schedule_at(obj("a", 0.0), false, 10);
    assert_eq!(s.take_all().len(), 1);
    assert!(s.deadline_ms().is_none());
    assert!(s.take_due_at(500).is_none());
}

#[test]
fn take_all_when_idle_is_empty() {
    let mut s = scheduler();
    assert!(s.take_all().is_empty());
    assert_eq!(s.state(), &SchedulerState::Idle);
}

#[test]
fn burst_during_flush_starts_new_batch() {
    let mut s = primed();
    s.schedule_at(obj("a", 0.0), false, 10);
    s.schedule_at(obj("a", 0.5), false, 90);
    s.take_due_at(110);
    assert_eq!(s.state(), &SchedulerState::Flushing);

    s.schedule_at(obj("a", 1.0), false, 120);
    assert_eq!(s.deadline_ms(), Some(220));
    s.finish_flush();
    assert_eq!(s.pending_len(), 1);
}
