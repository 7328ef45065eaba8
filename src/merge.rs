//! Remote merge engine: folds an authoritative snapshot into local state.
//!
//! DESIGN
//! ======
//! The remote snapshot is authoritative except where a local optimistic
//! write is still inside its suppression window. For a suppressed id the
//! local copy wins, including the absence of a local copy (a delete that the
//! store has not echoed yet stays deleted).
//!
//! Objects whose merged value is identical to the prior local value keep the
//! prior `Arc`, so a renderer comparing pointers redraws only what changed.
//! The comparison includes the edit highlight; an object is never rebuilt
//! just because the same snapshot arrived twice.
//!
//! Remote merges never touch history; the caller prunes its selection
//! against the merged collection.

#[cfg(test)]
#[path = "merge_test.rs"]
mod merge_test;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::color::color_for_id;
use crate::model::{CanvasObject, Collection, EditFlash, ObjectId, sort_for_stacking, visually_equal};

/// Per-id suppression expiry (epoch ms).
pub type SuppressionMap = HashMap<ObjectId, i64>;

/// A connected collaborator, as published by the presence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub uid: String,
    pub name: String,
    pub color: String,
}

/// Everything the merge needs besides the two collections.
#[derive(Debug, Clone, Copy)]
pub struct MergeContext<'a> {
    pub suppress: &'a SuppressionMap,
    pub self_id: &'a str,
    pub peers: &'a [Peer],
    pub now_ms: i64,
    pub flash_ms: i64,
}

/// Whether `id` is inside its suppression window at `now_ms`.
#[must_use]
pub fn is_suppressed(suppress: &SuppressionMap, id: &str, now_ms: i64) -> bool {
    suppress.get(id).is_some_and(|&until| now_ms < until)
}

/// Drop suppression entries that have already expired.
pub fn expire_suppressions(suppress: &mut SuppressionMap, now_ms: i64) {
    suppress.retain(|_, until| now_ms < *until);
}

/// Merge `remote` into `local`.
///
/// Duplicate ids in the snapshot resolve to the last occurrence. The result
/// is sorted by `(order, id)`.
#[must_use]
pub fn merge(local: &[Arc<CanvasObject>], remote: &[CanvasObject], ctx: &MergeContext<'_>) -> Collection {
    let local_by_id: HashMap<&str, &Arc<CanvasObject>> = local.iter().map(|o| (o.id.as_str(), o)).collect();
    let remote_by_id: HashMap<&str, &CanvasObject> = remote.iter().map(|o| (o.id.as_str(), o)).collect();

    let mut merged: Collection = Vec::with_capacity(remote_by_id.len());

    // PHASE: REMOTE OBJECTS
    for (&id, &incoming) in &remote_by_id {
        let prior = local_by_id.get(id).copied();
        if is_suppressed(ctx.suppress, id, ctx.now_ms) {
            if let Some(prior) = prior {
                merged.push(Arc::clone(prior));
            }
            continue;
        }

        let mut candidate = incoming.clone();
        candidate.flash = prior.and_then(|p| flash_for(p, incoming, ctx));
        // EDGE: store metadata (`updatedAtMs`, edit stamps) alone never reallocates.
        match prior {
            Some(p) if visually_equal(p, &candidate) && p.flash == candidate.flash => merged.push(Arc::clone(p)),
            _ => merged.push(Arc::new(candidate)),
        }
    }

    // PHASE: LOCAL-ONLY OBJECTS
    // WHY: unacknowledged optimistic creations survive only while suppressed.
    for obj in local {
        if !remote_by_id.contains_key(obj.id.as_str()) && is_suppressed(ctx.suppress, &obj.id, ctx.now_ms) {
            merged.push(Arc::clone(obj));
        }
    }

    sort_for_stacking(&mut merged);
    merged
}

/// Edit highlight for `incoming` given the prior local copy.
///
/// A new highlight starts when someone else's edit timestamp arrives; an
/// unexpired prior highlight is carried forward otherwise.
fn flash_for(prior: &CanvasObject, incoming: &CanvasObject, ctx: &MergeContext<'_>) -> Option<EditFlash> {
    let edited_elsewhere = prior.last_edited_at_ms != incoming.last_edited_at_ms
        && incoming.last_edited_by.as_deref() != Some(ctx.self_id);

    if edited_elsewhere {
        let editor = incoming.last_edited_by.as_deref().unwrap_or(&incoming.id);
        let (color, editor_name) = match ctx.peers.iter().find(|p| p.uid == editor) {
            Some(peer) => (peer.color.clone(), peer.name.clone()),
            None => (color_for_id(editor).to_owned(), "Someone".to_owned()),
        };
        return Some(EditFlash { until_ms: ctx.now_ms + ctx.flash_ms, color, editor_name });
    }

    prior.flash.clone().filter(|f| ctx.now_ms < f.until_ms)
}
