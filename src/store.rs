//! Object store facade: the contract consumed from the document store.
//!
//! DESIGN
//! ======
//! The persistent store is an external collaborator reachable through three
//! primitives: subscribe to full snapshots, write (single document or one
//! atomic multi-document commit), and delete. It is injected as a trait
//! object so the engine runs unchanged against a real backend or the
//! in-memory fake.
//!
//! Snapshots are modelled as a restartable sequence of collection states
//! (`Subscription`), not as nested callbacks. Dropping or unsubscribing the
//! handle ends delivery.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::model::{CanvasObject, ObjectId};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unreachable (offline)")]
    Offline,
    #[error("write rejected: {0}")]
    Rejected(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("document encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("store connection closed")]
    Closed,
}

/// One document-level write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Whole-document overwrite (last writer wins).
    Put(CanvasObject),
    /// Document removal.
    Delete(ObjectId),
}

impl WriteOp {
    /// Id of the document this op targets.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Put(obj) => &obj.id,
            Self::Delete(id) => id,
        }
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Consumer end of a snapshot stream.
///
/// The first call to [`Subscription::next`] yields the current snapshot;
/// later calls wait for the next change. Intermediate snapshots may be
/// skipped: only the latest state of the collection matters.
pub struct Subscription {
    rx: watch::Receiver<Vec<CanvasObject>>,
    primed: bool,
}

impl Subscription {
    #[must_use]
    pub fn new(rx: watch::Receiver<Vec<CanvasObject>>) -> Self {
        Self { rx, primed: false }
    }

    /// Wait for the next snapshot. Returns `None` once the producer is gone.
    pub async fn next(&mut self) -> Option<Vec<CanvasObject>> {
        if !self.primed {
            self.primed = true;
            return Some(self.rx.borrow_and_update().clone());
        }
        if self.rx.changed().await.is_err() {
            return None;
        }
        Some(self.rx.borrow_and_update().clone())
    }

    /// Stop receiving snapshots.
    pub fn unsubscribe(self) {}
}

// =============================================================================
// STORE CONTRACT
// =============================================================================

/// The persistent document store as seen by the sync engine.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Open a snapshot stream over the whole object collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PermissionDenied`] when the caller may not read
    /// the collection. Re-subscribing is the caller's decision.
    fn subscribe(&self) -> Result<Subscription, StoreError>;

    /// Overwrite one document. The store stamps its write time.
    async fn put(&self, object: &CanvasObject) -> Result<(), StoreError>;

    /// Remove one document. Removing a missing document succeeds.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Apply several writes atomically: all land or none do.
    async fn commit(&self, ops: &[WriteOp]) -> Result<(), StoreError>;
}

/// Send `ops` with the narrowest primitive: a single put or delete goes
/// through its own call, anything larger is one atomic commit.
///
/// # Errors
///
/// Propagates the store's error; the caller decides whether to queue.
pub async fn send_ops(store: &dyn DocumentStore, ops: &[WriteOp]) -> Result<(), StoreError> {
    match ops {
        [] => Ok(()),
        [WriteOp::Put(obj)] => store.put(obj).await,
        [WriteOp::Delete(id)] => store.delete(id).await,
        _ => store.commit(ops).await,
    }
}
