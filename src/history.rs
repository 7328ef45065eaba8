//! Linear undo/redo log of invertible edits over the whole collection.
//!
//! DESIGN
//! ======
//! An entry is a reversible transformation of the collection, not a field
//! diff: `Create` and `Delete` carry the full objects, `Update` carries the
//! before and after copies of every touched object. Multi-object edits (group
//! drag, multi-delete, multi-copy, batch creation) are one entry so a single
//! undo reverts the whole group.
//!
//! Only locally initiated edits are pushed. Remote merges never touch this
//! log; if they did, undo would fight the remote stream.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{CanvasObject, Collection, sort_for_stacking};

/// A reversible edit. `revert` followed by `apply` reproduces the forward result.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEntry {
    /// Objects that were added.
    Create(Vec<Arc<CanvasObject>>),
    /// Objects that were removed, as they were just before removal.
    Delete(Vec<Arc<CanvasObject>>),
    /// Objects that were modified, paired by id.
    Update {
        before: Vec<Arc<CanvasObject>>,
        after: Vec<Arc<CanvasObject>>,
    },
}

impl HistoryEntry {
    /// Apply the forward transformation.
    #[must_use]
    pub fn apply(&self, objects: &[Arc<CanvasObject>]) -> Collection {
        match self {
            Self::Create(created) => upsert(objects, created),
            Self::Delete(deleted) => remove(objects, deleted),
            Self::Update { after, .. } => replace_existing(objects, after),
        }
    }

    /// Apply the inverse transformation.
    #[must_use]
    pub fn revert(&self, objects: &[Arc<CanvasObject>]) -> Collection {
        match self {
            Self::Create(created) => remove(objects, created),
            Self::Delete(deleted) => upsert(objects, deleted),
            Self::Update { before, .. } => replace_existing(objects, before),
        }
    }

    /// Number of objects this entry touches.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Create(objs) | Self::Delete(objs) => objs.len(),
            Self::Update { after, .. } => after.len(),
        }
    }

    /// Returns `true` if the entry touches no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn upsert(objects: &[Arc<CanvasObject>], incoming: &[Arc<CanvasObject>]) -> Collection {
    let by_id: HashMap<&str, &Arc<CanvasObject>> = incoming.iter().map(|o| (o.id.as_str(), o)).collect();
    let mut next: Collection = objects.iter().filter(|o| !by_id.contains_key(o.id.as_str())).cloned().collect();
    next.extend(incoming.iter().cloned());
    sort_for_stacking(&mut next);
    next
}

fn remove(objects: &[Arc<CanvasObject>], removed: &[Arc<CanvasObject>]) -> Collection {
    objects
        .iter()
        .filter(|o| !removed.iter().any(|r| r.id == o.id))
        .cloned()
        .collect()
}

// EDGE: an object deleted remotely since the edit stays deleted.
fn replace_existing(objects: &[Arc<CanvasObject>], replacements: &[Arc<CanvasObject>]) -> Collection {
    let by_id: HashMap<&str, &Arc<CanvasObject>> = replacements.iter().map(|o| (o.id.as_str(), o)).collect();
    let mut next: Collection = objects
        .iter()
        .map(|o| by_id.get(o.id.as_str()).map_or_else(|| Arc::clone(o), |r| Arc::clone(r)))
        .collect();
    sort_for_stacking(&mut next);
    next
}

/// Two-stack undo/redo log with a depth cap.
#[derive(Debug)]
pub struct History {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    /// Maximum undo depth (0 = unlimited).
    limit: usize,
}

impl History {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { undo_stack: Vec::new(), redo_stack: Vec::new(), limit }
    }

    /// Record a local edit. Discards the redo branch.
    pub fn push(&mut self, entry: HistoryEntry) {
        if entry.is_empty() {
            return;
        }
        self.undo_stack.push(entry);
        if self.limit > 0 && self.undo_stack.len() > self.limit {
            let excess = self.undo_stack.len() - self.limit;
            self.undo_stack.drain(..excess);
        }
        self.redo_stack.clear();
    }

    /// Revert the most recent entry. Returns `None` when there is nothing to undo.
    pub fn undo(&mut self, objects: &[Arc<CanvasObject>]) -> Option<Collection> {
        let entry = self.undo_stack.pop()?;
        let next = entry.revert(objects);
        self.redo_stack.push(entry);
        Some(next)
    }

    /// Re-apply the most recently undone entry. Returns `None` when there is nothing to redo.
    pub fn redo(&mut self, objects: &[Arc<CanvasObject>]) -> Option<Collection> {
        let entry = self.redo_stack.pop()?;
        let next = entry.apply(objects);
        self.undo_stack.push(entry);
        Some(next)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of undoable entries.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.undo_stack.len()
    }
}
