//! In-memory document store implementing the store facade.
//!
//! DESIGN
//! ======
//! Documents are kept as JSON maps exactly as a remote document service
//! would hold them, so the encode/decode boundary is exercised. Every
//! accepted write publishes a fresh snapshot (ordered by store write time)
//! to all subscribers through a `watch` channel.
//!
//! The store can be switched offline to simulate connectivity loss, and it
//! counts write calls so batching behaviour is observable in tests.

#[cfg(test)]
#[path = "memory_store_test.rs"]
mod memory_store_test;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::warn;

use crate::clock::Clock;
use crate::model::{CanvasObject, ObjectId, from_document, to_document};
use crate::store::{DocumentStore, StoreError, Subscription, WriteOp};

/// Shared fake store. Clones observe the same documents.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    tx: Arc<watch::Sender<Vec<CanvasObject>>>,
    clock: Arc<dyn Clock>,
}

struct Inner {
    docs: BTreeMap<ObjectId, Map<String, Value>>,
    online: bool,
    deny_subscribe: bool,
    write_calls: usize,
    /// Every accepted write call, in arrival order.
    log: Vec<Vec<WriteOp>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Mutex::new(Inner {
                docs: BTreeMap::new(),
                online: true,
                deny_subscribe: false,
                write_calls: 0,
                log: Vec::new(),
            })),
            tx: Arc::new(tx),
            clock,
        }
    }

    /// Simulate connectivity loss or recovery. Offline writes fail.
    pub fn set_online(&self, online: bool) {
        self.lock().online = online;
    }

    /// Make future `subscribe` calls fail with a permission error.
    pub fn deny_subscriptions(&self) {
        self.lock().deny_subscribe = true;
    }

    /// Number of write calls (put, delete or commit) made, accepted or not.
    #[must_use]
    pub fn write_calls(&self) -> usize {
        self.lock().write_calls
    }

    /// Accepted write calls, in arrival order.
    #[must_use]
    pub fn write_log(&self) -> Vec<Vec<WriteOp>> {
        self.lock().log.clone()
    }

    /// Current decoded contents, ordered by store write time.
    #[must_use]
    pub fn objects(&self) -> Vec<CanvasObject> {
        snapshot(&self.lock().docs)
    }

    /// Raw stored document for `id`.
    #[must_use]
    pub fn document(&self, id: &str) -> Option<Map<String, Value>> {
        self.lock().docs.get(id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, ops: &[WriteOp]) -> Result<(), StoreError> {
        let now = self.clock.now_ms();
        let mut inner = self.lock();
        inner.write_calls += 1;
        if !inner.online {
            return Err(StoreError::Offline);
        }

        // PHASE: ENCODE EVERYTHING FIRST
        // WHY: a commit is atomic, so one bad document rejects the whole call.
        let mut encoded = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                WriteOp::Put(obj) => {
                    let mut doc = to_document(obj)?;
                    doc.insert("updatedAtMs".into(), Value::from(now));
                    encoded.push((obj.id.clone(), Some(doc)));
                }
                WriteOp::Delete(id) => encoded.push((id.clone(), None)),
            }
        }

        for (id, doc) in encoded {
            match doc {
                Some(doc) => {
                    inner.docs.insert(id, doc);
                }
                None => {
                    inner.docs.remove(&id);
                }
            }
        }
        inner.log.push(ops.to_vec());
        let objects = snapshot(&inner.docs);
        drop(inner);
        self.tx.send_replace(objects);
        Ok(())
    }
}

fn snapshot(docs: &BTreeMap<ObjectId, Map<String, Value>>) -> Vec<CanvasObject> {
    let mut objects: Vec<CanvasObject> = docs
        .iter()
        .filter_map(|(id, doc)| match from_document(doc) {
            Ok(obj) => Some(obj),
            Err(e) => {
                warn!(%id, error = %e, "skipping undecodable document");
                None
            }
        })
        .collect();
    objects.sort_by(|a, b| a.updated_at_ms.cmp(&b.updated_at_ms).then_with(|| a.id.cmp(&b.id)));
    objects
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn subscribe(&self) -> Result<Subscription, StoreError> {
        if self.lock().deny_subscribe {
            return Err(StoreError::PermissionDenied("canvasObjects".into()));
        }
        Ok(Subscription::new(self.tx.subscribe()))
    }

    async fn put(&self, object: &CanvasObject) -> Result<(), StoreError> {
        self.apply(&[WriteOp::Put(object.clone())])
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.apply(&[WriteOp::Delete(id.to_owned())])
    }

    async fn commit(&self, ops: &[WriteOp]) -> Result<(), StoreError> {
        self.apply(ops)
    }
}
