use super::*;
use crate::layout::{Axis, Edge, Rect};

const T0: i64 = 1_700_000_000_000;

fn session() -> CanvasSession {
    CanvasSession::new(SyncConfig::default(), "me")
}

fn rect_at(x: f64, y: f64, w: f64, h: f64) -> ObjectPatch {
    ObjectPatch { width: Some(w), height: Some(h), color: Some("#91c9f9".into()), ..ObjectPatch::position(x, y) }
}

fn puts(dispatch: &Dispatch) -> Vec<&CanvasObject> {
    dispatch
        .ops
        .iter()
        .filter_map(|op| match op {
            WriteOp::Put(obj) => Some(obj),
            WriteOp::Delete(_) => None,
        })
        .collect()
}

fn remote_copy(s: &CanvasSession) -> Vec<CanvasObject> {
    s.objects().iter().map(|o| CanvasObject::clone(o)).collect()
}

// =============================================================================
// creation & direct edits
// =============================================================================

#[test]
fn add_shape_writes_immediately_and_selects() {
    let mut s = session();
    let id = s.add_shape(ShapeKind::Rectangle, &ObjectPatch::default(), T0);

    let outbox = s.take_outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].source, WriteSource::Immediate);
    let written = puts(&outbox[0]);
    assert_eq!(written[0].id, id);
    assert_eq!(written[0].last_edited_by.as_deref(), Some("me"));
    assert_eq!(written[0].last_edited_at_ms, Some(T0));
    assert_eq!(s.selection().primary.as_deref(), Some(id.as_str()));
    assert_eq!(s.history().depth(), 1);
}

#[test]
fn unpositioned_shapes_cascade() {
    let mut s = session();
    let a = s.add_shape(ShapeKind::Rectangle, &ObjectPatch::default(), T0);
    let b = s.add_shape(ShapeKind::Rectangle, &ObjectPatch::default(), T0 + 1);
    let (a, b) = (s.object(&a).unwrap(), s.object(&b).unwrap());
    assert!((b.x - a.x - 24.0).abs() < f64::EPSILON);
    assert!(b.order > a.order);
}

#[test]
fn update_of_missing_object_is_noop() {
    let mut s = session();
    assert!(!s.update_object("ghost", &ObjectPatch::position(1.0, 1.0), true, T0));
    assert!(s.take_outbox().is_empty());
    assert!(!s.history().can_undo());
}

#[test]
fn delete_selected_is_one_entry_and_one_write() {
    let mut s = session();
    let a = s.add_shape(ShapeKind::Rectangle, &rect_at(0.0, 0.0, 10.0, 10.0), T0);
    let b = s.add_shape(ShapeKind::Circle, &rect_at(50.0, 0.0, 10.0, 10.0), T0);
    s.take_outbox();
    s.select_many([a.as_str(), b.as_str()]);

    assert!(s.delete_selected(T0 + 10));
    let outbox = s.take_outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].ops.len(), 2);
    assert!(s.objects().is_empty());
    assert!(s.selection().is_empty());

    assert!(s.undo(T0 + 20));
    assert_eq!(s.objects().len(), 2);
}

#[test]
fn copy_selected_offsets_and_selects_copies() {
    let mut s = session();
    let a = s.add_shape(ShapeKind::Rectangle, &rect_at(10.0, 10.0, 50.0, 50.0), T0);
    s.take_outbox();

    assert!(s.copy_selected(T0 + 5));
    assert_eq!(s.objects().len(), 2);
    let copy_id = s.selection().primary.clone().unwrap();
    assert_ne!(copy_id, a);
    let copy = s.object(&copy_id).unwrap();
    assert!((copy.x - 34.0).abs() < f64::EPSILON);
    assert!((copy.y - 34.0).abs() < f64::EPSILON);
    assert_eq!(s.take_outbox().len(), 1);
}

// =============================================================================
// gestures & batching
// =============================================================================

#[test]
fn single_drag_sends_lead_write_then_one_batch() {
    let mut s = session();
    let id = s.add_shape(ShapeKind::Rectangle, &rect_at(0.0, 0.0, 50.0, 50.0), T0);
    s.take_outbox();

    let start = T0 + 1_000;
    s.begin_gesture(std::slice::from_ref(&id));
    for i in 0..10_i32 {
        let now = start + i64::from(i) * 10;
        s.apply_gesture(&[(id.clone(), ObjectPatch::position(f64::from(i), 0.0))], now);
        s.on_batch_deadline(now);
    }
    assert!(s.commit_gesture(start + 90));
    let lead = s.take_outbox();
    assert_eq!(lead.len(), 1);
    assert_eq!(lead[0].source, WriteSource::Immediate);
    assert!(puts(&lead[0])[0].x.abs() < f64::EPSILON);

    s.on_batch_deadline(start + 110);
    let outbox = s.take_outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].source, WriteSource::Batch);
    assert!((puts(&outbox[0])[0].x - 9.0).abs() < f64::EPSILON);
    assert_eq!(s.history().depth(), 2);
}

#[test]
fn group_drag_commit_writes_immediately() {
    let mut s = session();
    let a = s.add_shape(ShapeKind::Rectangle, &rect_at(0.0, 0.0, 50.0, 50.0), T0);
    let b = s.add_shape(ShapeKind::Rectangle, &rect_at(100.0, 0.0, 50.0, 50.0), T0);
    s.take_outbox();

    s.begin_gesture(&[a.clone(), b.clone()]);
    s.apply_gesture(&[(a.clone(), ObjectPatch::position(5.0, 5.0)), (b.clone(), ObjectPatch::position(105.0, 5.0))], T0 + 2_000);
    assert!(s.commit_gesture(T0 + 2_010));

    let outbox = s.take_outbox();
    assert!(outbox.iter().all(|d| d.source == WriteSource::Immediate));
    let commit = outbox.last().unwrap();
    assert_eq!(commit.ops.len(), 2);
    assert_eq!(s.scheduler().pending_len(), 0);
    assert!(s.batch_deadline_ms().is_none());

    // One undo reverts both.
    assert!(s.undo(T0 + 3_000));
    assert!(s.object(&a).unwrap().x.abs() < f64::EPSILON);
    assert!((s.object(&b).unwrap().x - 100.0).abs() < f64::EPSILON);
}

#[test]
fn gesture_without_movement_records_nothing() {
    let mut s = session();
    let a = s.add_shape(ShapeKind::Rectangle, &rect_at(0.0, 0.0, 50.0, 50.0), T0);
    s.begin_gesture(&[a]);
    assert!(!s.commit_gesture(T0 + 10));
    assert_eq!(s.history().depth(), 1);
}

#[test]
fn flush_pending_cancels_timer_and_sends_batch() {
    let mut s = session();
    let a = s.add_shape(ShapeKind::Rectangle, &rect_at(0.0, 0.0, 50.0, 50.0), T0);
    s.take_outbox();
    s.apply_gesture(&[(a.clone(), ObjectPatch::position(3.0, 3.0))], T0 + 1_000);
    s.apply_gesture(&[(a, ObjectPatch::position(4.0, 4.0))], T0 + 1_010);
    assert!(s.batch_deadline_ms().is_some());

    s.flush_pending(T0 + 1_020);
    assert!(s.batch_deadline_ms().is_none());
    let outbox = s.take_outbox();
    assert_eq!(outbox.len(), 2);
    assert_eq!(outbox[1].source, WriteSource::Batch);
    assert!((puts(&outbox[1])[0].x - 4.0).abs() < f64::EPSILON);
}

#[test]
fn isolated_update_writes_through() {
    let mut s = session();
    let a = s.add_shape(ShapeKind::Rectangle, &rect_at(0.0, 0.0, 50.0, 50.0), T0);
    s.take_outbox();

    assert!(s.update_object(&a, &ObjectPatch::position(30.0, 0.0), false, T0 + 1_000));
    let outbox = s.take_outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].source, WriteSource::Immediate);
    assert!(s.batch_deadline_ms().is_none());
}

// =============================================================================
// remote snapshots
// =============================================================================

#[test]
fn stale_echo_does_not_rubber_band() {
    let mut s = session();
    let a = s.add_shape(ShapeKind::Rectangle, &rect_at(10.0, 0.0, 50.0, 50.0), T0);
    let mut echo = remote_copy(&s);
    echo[0].x = 999.0;

    s.apply_remote_snapshot(&echo, T0 + 50);
    assert!((s.object(&a).unwrap().x - 10.0).abs() < f64::EPSILON);

    s.apply_remote_snapshot(&echo, T0 + 600);
    assert!((s.object(&a).unwrap().x - 999.0).abs() < f64::EPSILON);
}

#[test]
fn remote_merge_prunes_selection_without_history() {
    let mut s = session();
    let a = s.add_shape(ShapeKind::Rectangle, &rect_at(10.0, 0.0, 50.0, 50.0), T0);
    let depth = s.history().depth();

    s.apply_remote_snapshot(&[], T0 + 10_000);
    assert!(s.object(&a).is_none());
    assert!(s.selection().is_empty());
    assert_eq!(s.history().depth(), depth);
}

#[test]
fn deleted_object_is_not_resurrected_by_late_echo() {
    let mut s = session();
    let a = s.add_shape(ShapeKind::Rectangle, &rect_at(10.0, 0.0, 50.0, 50.0), T0);
    let before_delete = remote_copy(&s);
    s.delete_objects(std::slice::from_ref(&a), T0 + 1_000);

    s.apply_remote_snapshot(&before_delete, T0 + 1_100);
    assert!(s.object(&a).is_none());
}

#[test]
fn peer_edit_flashes() {
    let mut s = session();
    s.set_peers(vec![Peer { uid: "ann".into(), name: "Ann".into(), color: "#abcdef".into() }]);
    let a = s.add_shape(ShapeKind::Rectangle, &rect_at(10.0, 0.0, 50.0, 50.0), T0);
    let mut remote = remote_copy(&s);
    remote[0].x = 40.0;
    remote[0].last_edited_by = Some("ann".into());
    remote[0].last_edited_at_ms = Some(T0 + 5_000);

    s.apply_remote_snapshot(&remote, T0 + 5_000);
    let flash = s.object(&a).unwrap().flash.clone().unwrap();
    assert_eq!(flash.editor_name, "Ann");
    assert_eq!(flash.until_ms, T0 + 6_500);
}

// =============================================================================
// undo / redo
// =============================================================================

#[test]
fn undo_create_deletes_remotely_and_redo_restores() {
    let mut s = session();
    let a = s.add_shape(ShapeKind::Rectangle, &rect_at(10.0, 0.0, 50.0, 50.0), T0);
    let created = CanvasObject::clone(s.object(&a).unwrap());
    s.take_outbox();

    assert!(s.undo(T0 + 10));
    let outbox = s.take_outbox();
    assert_eq!(outbox[0].ops, vec![WriteOp::Delete(a.clone())]);

    assert!(s.redo(T0 + 20));
    let outbox = s.take_outbox();
    assert_eq!(puts(&outbox[0]), vec![&created]);
    assert_eq!(**s.object(&a).unwrap(), created);
}

#[test]
fn undo_then_redo_restores_update_field_for_field() {
    let mut s = session();
    let a = s.add_shape(ShapeKind::Rectangle, &rect_at(10.0, 0.0, 50.0, 50.0), T0);
    let original = CanvasObject::clone(s.object(&a).unwrap());
    assert!(s.update_object(&a, &ObjectPatch::position(200.0, 0.0), true, T0 + 10));
    let edited = CanvasObject::clone(s.object(&a).unwrap());
    s.take_outbox();

    assert!(s.undo(T0 + 20));
    assert_eq!(**s.object(&a).unwrap(), original);
    assert_eq!(puts(&s.take_outbox()[0]), vec![&original]);

    assert!(s.redo(T0 + 30));
    assert_eq!(**s.object(&a).unwrap(), edited);
    assert_eq!(s.object(&a).unwrap().last_edited_at_ms, Some(T0 + 10));
}

#[test]
fn undo_with_empty_history_is_noop() {
    let mut s = session();
    assert!(!s.undo(T0));
    assert!(!s.redo(T0));
    assert!(s.take_outbox().is_empty());
}

#[test]
fn undo_after_remote_merge_stays_consistent() {
    let mut s = session();
    let a = s.add_shape(ShapeKind::Rectangle, &rect_at(10.0, 0.0, 50.0, 50.0), T0);
    assert!(s.update_object(&a, &ObjectPatch::position(200.0, 0.0), true, T0 + 10));

    // Echo arrives after suppression expired; no history is pushed by it.
    let echo = remote_copy(&s);
    s.apply_remote_snapshot(&echo, T0 + 5_000);
    assert_eq!(s.history().depth(), 2);

    assert!(s.undo(T0 + 6_000));
    assert!((s.object(&a).unwrap().x - 10.0).abs() < f64::EPSILON);
}

// =============================================================================
// offline
// =============================================================================

#[test]
fn failed_write_is_queued_and_resent_on_reconnect() {
    let mut s = session();
    s.add_shape(ShapeKind::Rectangle, &rect_at(10.0, 0.0, 50.0, 50.0), T0);
    let dispatch = s.take_outbox().remove(0);

    s.set_online(false, T0 + 1);
    s.on_write_result(dispatch, Err(StoreError::Offline), T0 + 2);
    assert_eq!(s.offline_queue().len(), 1);

    s.on_retry_interval(T0 + 5_000);
    assert!(s.take_outbox().is_empty());

    s.set_online(true, T0 + 6_000);
    let outbox = s.take_outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].source, WriteSource::OfflineRetry { attempt: 1 });
    assert!(s.offline_queue().is_empty());
}

#[test]
fn failed_retry_is_requeued() {
    let mut s = session();
    s.add_shape(ShapeKind::Rectangle, &rect_at(10.0, 0.0, 50.0, 50.0), T0);
    let dispatch = s.take_outbox().remove(0);
    s.on_write_result(dispatch, Err(StoreError::Offline), T0);

    s.on_retry_interval(T0 + 5_000);
    let retry = s.take_outbox().remove(0);
    s.on_write_result(retry, Err(StoreError::Offline), T0 + 5_001);
    assert_eq!(s.offline_queue().len(), 1);

    s.on_retry_interval(T0 + 10_000);
    let retry = s.take_outbox().remove(0);
    assert_eq!(retry.source, WriteSource::OfflineRetry { attempt: 2 });
    s.on_write_result(retry, Ok(()), T0 + 10_001);
    assert!(s.offline_queue().is_empty());
}

#[test]
fn newer_write_drops_stale_queued_write() {
    let mut s = session();
    let a = s.add_shape(ShapeKind::Rectangle, &rect_at(10.0, 0.0, 50.0, 50.0), T0);
    s.take_outbox();

    assert!(s.update_object(&a, &ObjectPatch::position(100.0, 0.0), true, T0 + 10));
    let failed = s.take_outbox().remove(0);
    s.on_write_result(failed, Err(StoreError::Offline), T0 + 11);
    assert_eq!(s.offline_queue().len(), 1);

    assert!(s.update_object(&a, &ObjectPatch::position(200.0, 0.0), true, T0 + 20));
    assert!(s.offline_queue().is_empty());
    let sent = s.take_outbox().remove(0);
    s.on_write_result(sent, Ok(()), T0 + 21);

    s.on_retry_interval(T0 + 5_000);
    assert!(s.take_outbox().is_empty(), "x=100 must not be resent over x=200");
    assert!((s.object(&a).unwrap().x - 200.0).abs() < f64::EPSILON);
}

#[test]
fn batched_write_drops_stale_queued_write() {
    let mut s = session();
    let a = s.add_shape(ShapeKind::Rectangle, &rect_at(10.0, 0.0, 50.0, 50.0), T0);
    let failed = s.take_outbox().remove(0);
    s.on_write_result(failed, Err(StoreError::Offline), T0 + 1);
    assert_eq!(s.offline_queue().len(), 1);

    s.begin_gesture(std::slice::from_ref(&a));
    s.apply_gesture(&[(a.clone(), ObjectPatch::position(20.0, 0.0))], T0 + 100);
    s.apply_gesture(&[(a.clone(), ObjectPatch::position(30.0, 0.0))], T0 + 110);
    assert!(s.offline_queue().is_empty());
    assert!(s.commit_gesture(T0 + 120));
    s.on_batch_deadline(T0 + 210);

    let outbox = s.take_outbox();
    assert!(outbox.iter().all(|d| !matches!(d.source, WriteSource::OfflineRetry { .. })));
    assert!((puts(outbox.last().unwrap())[0].x - 30.0).abs() < f64::EPSILON);
}

#[test]
fn queued_write_expires_after_retention() {
    let mut s = session();
    s.add_shape(ShapeKind::Rectangle, &rect_at(10.0, 0.0, 50.0, 50.0), T0);
    let dispatch = s.take_outbox().remove(0);
    s.on_write_result(dispatch, Err(StoreError::Offline), T0);

    assert!(s.offline_queue().contents_at(T0 + 61_000).is_empty());
    s.on_retry_interval(T0 + 61_000);
    assert!(s.take_outbox().is_empty());
}

// =============================================================================
// commands
// =============================================================================

#[test]
fn create_many_is_one_entry_and_one_commit() {
    let mut s = session();
    assert!(s.execute_tool_call("createMany", r#"{"type":"rectangle","count":12,"padding":16,"gap":12}"#, T0));

    let outbox = s.take_outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].ops.len(), 12);
    assert_eq!(s.history().depth(), 1);
    assert_eq!(s.selection().ids.len(), 12);

    let bounds = Rect::new(16.0, 16.0, 768.0, 568.0);
    let rects: Vec<Rect> = s.objects().iter().map(|o| Rect::new(o.x, o.y, o.width, o.height)).collect();
    for (i, r) in rects.iter().enumerate() {
        assert!(bounds.contains(r), "{r:?} escapes the padded canvas");
        for other in &rects[i + 1..] {
            assert!(!r.overlaps(other));
        }
    }
}

#[test]
fn align_right_then_undo() {
    let mut s = session();
    let a = s.add_shape(ShapeKind::Rectangle, &rect_at(10.0, 10.0, 100.0, 50.0), T0);
    assert!(s.execute(&Command::AlignSelected { position: Edge::Right }, T0 + 10));
    assert!((s.object(&a).unwrap().x - 700.0).abs() < f64::EPSILON);

    assert!(s.undo(T0 + 20));
    assert!((s.object(&a).unwrap().x - 10.0).abs() < f64::EPSILON);
}

#[test]
fn distribute_three_objects_evenly() {
    let mut s = session();
    let ids: Vec<ObjectId> = [0.0, 300.0, 600.0]
        .into_iter()
        .map(|x| s.add_shape(ShapeKind::Rectangle, &rect_at(x, 10.0, 100.0, 100.0), T0))
        .collect();
    s.select_many(ids.iter().map(String::as_str));

    assert!(s.execute(&Command::DistributeObjects { axis: Axis::Horizontal }, T0 + 10));
    let xs: Vec<f64> = ids.iter().map(|id| s.object(id).unwrap().x).collect();
    assert_eq!(xs, vec![125.0, 350.0, 575.0]);
}

#[test]
fn selection_commands_without_selection_do_nothing() {
    let mut s = session();
    s.add_shape(ShapeKind::Rectangle, &rect_at(10.0, 10.0, 100.0, 50.0), T0);
    s.select(None);
    s.take_outbox();

    assert!(!s.execute(&Command::MoveSelected { x: 5.0, y: 5.0 }, T0 + 1));
    assert!(!s.execute_tool_call("setColorSelected", r#"{"color":"red"}"#, T0 + 2));
    assert!(!s.execute_tool_call("nonsense", "{}", T0 + 3));
    assert!(s.take_outbox().is_empty());
}

// =============================================================================
// component library
// =============================================================================

#[test]
fn save_and_insert_component() {
    let mut s = session();
    s.add_shape(ShapeKind::Rectangle, &rect_at(10.0, 10.0, 100.0, 50.0), T0);
    assert!(s.save_component("card"));
    s.take_outbox();

    assert!(s.insert_component("card", T0 + 10));
    assert_eq!(s.objects().len(), 2);
    let inserted = s.object(s.selection().primary.as_deref().unwrap()).unwrap();
    assert!((inserted.x - 30.0).abs() < f64::EPSILON);
    assert_eq!(s.take_outbox().len(), 1);
    assert!(!s.insert_component("missing", T0 + 20));
}
