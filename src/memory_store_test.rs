use super::*;
use crate::clock::Clock;
use crate::model::{ObjectPatch, ShapeKind, new_object};
use crate::store::send_ops;

struct FixedClock(i64);

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

fn store() -> MemoryStore {
    MemoryStore::new(Arc::new(FixedClock(1_000)))
}

fn rect(id: &str) -> CanvasObject {
    let mut obj = new_object(ShapeKind::Rectangle, &ObjectPatch::position(10.0, 20.0), 0);
    obj.id = id.to_owned();
    obj
}

// =============================================================================
// writes
// =============================================================================

#[tokio::test]
async fn put_stamps_store_write_time() {
    let store = store();
    store.put(&rect("a")).await.unwrap();
    let objects = store.objects();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].updated_at_ms, Some(1_000));
}

#[tokio::test]
async fn stored_document_has_no_null_fields() {
    let store = store();
    store.put(&rect("a")).await.unwrap();
    let doc = store.document("a").unwrap();
    assert!(doc.values().all(|v| !v.is_null()));
    assert!(!doc.contains_key("text"));
    assert_eq!(doc.get("type"), Some(&Value::from("rectangle")));
}

#[tokio::test]
async fn delete_missing_document_succeeds() {
    let store = store();
    store.delete("ghost").await.unwrap();
    assert!(store.objects().is_empty());
}

#[tokio::test]
async fn offline_store_rejects_writes_but_counts_them() {
    let store = store();
    store.set_online(false);
    let err = store.put(&rect("a")).await.unwrap_err();
    assert!(matches!(err, StoreError::Offline));
    assert_eq!(store.write_calls(), 1);
    assert!(store.objects().is_empty());
    assert!(store.write_log().is_empty());
}

#[tokio::test]
async fn commit_applies_all_ops_in_one_call() {
    let store = store();
    store.put(&rect("old")).await.unwrap();
    let ops = vec![WriteOp::Put(rect("a")), WriteOp::Put(rect("b")), WriteOp::Delete("old".into())];
    store.commit(&ops).await.unwrap();

    let ids: Vec<String> = store.objects().into_iter().map(|o| o.id).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(store.write_log().last(), Some(&ops));
}

// =============================================================================
// send_ops
// =============================================================================

#[tokio::test]
async fn send_ops_uses_one_call_per_batch() {
    let store = store();
    send_ops(&store, &[]).await.unwrap();
    assert_eq!(store.write_calls(), 0);

    send_ops(&store, &[WriteOp::Put(rect("a"))]).await.unwrap();
    send_ops(&store, &[WriteOp::Put(rect("b")), WriteOp::Put(rect("c"))]).await.unwrap();
    assert_eq!(store.write_calls(), 2);
    assert_eq!(store.objects().len(), 3);
}

// =============================================================================
// subscriptions
// =============================================================================

#[tokio::test]
async fn subscription_yields_current_then_changes() {
    let store = store();
    store.put(&rect("a")).await.unwrap();

    let mut sub = store.subscribe().unwrap();
    let first = sub.next().await.unwrap();
    assert_eq!(first.len(), 1);

    store.put(&rect("b")).await.unwrap();
    let second = sub.next().await.unwrap();
    assert_eq!(second.len(), 2);
}

#[tokio::test]
async fn denied_subscription_reports_permission_error() {
    let store = store();
    store.deny_subscriptions();
    assert!(matches!(store.subscribe(), Err(StoreError::PermissionDenied(_))));
}
