//! Canvas session: the single state-update entry point for one client.
//!
//! DESIGN
//! ======
//! The session owns the in-memory collection and everything that must
//! change with it atomically: the selection, the history log, the
//! suppression map, the write scheduler and the offline queue. Local edits,
//! command execution and remote snapshots all go through its methods, so a
//! history push and the state change it records can never be separated.
//!
//! The session performs no I/O. Store writes it decides on are appended to
//! an outbox as [`Dispatch`]es; the runtime sends them and reports each
//! result back through [`CanvasSession::on_write_result`]. Every method takes
//! the current time explicitly.
//!
//! LOCAL WRITE PATH
//! ================
//! 1. Apply the edit to the collection and stamp `last_edited_by` /
//!    `last_edited_at_ms`.
//! 2. Push one history entry (unless this is an in-progress gesture step).
//! 3. Open the suppression window for every touched id.
//! 4. Hand the objects to the scheduler (immediate or cadence-batched).
//!
//! Failed sends land in the offline queue; nothing is surfaced to callers.
//! Any newer write for an id drops its queued entries, so a retry can never
//! resend a value the user has since replaced.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::command::Command;
use crate::config::SyncConfig;
use crate::consts::NEW_SHAPE_CASCADE;
use crate::executor::{self, ExecContext, Plan};
use crate::history::{History, HistoryEntry};
use crate::library::ComponentLibrary;
use crate::merge::{self, MergeContext, Peer, SuppressionMap};
use crate::model::{
    CanvasObject, Collection, ObjectId, ObjectPatch, ShapeKind, apply_patch, new_object, next_order,
    sort_for_stacking, visually_equal,
};
use crate::offline::OfflineQueue;
use crate::scheduler::{ScheduleOutcome, WriteScheduler};
use crate::store::{StoreError, WriteOp};

// =============================================================================
// SELECTION
// =============================================================================

/// Transient selection state. `primary`, when set, is always a member of `ids`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub primary: Option<ObjectId>,
    pub ids: BTreeSet<ObjectId>,
}

impl Selection {
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.primary = None;
        self.ids.clear();
    }

    /// Replace the selection; the first id becomes primary.
    pub fn set<I: IntoIterator<Item = ObjectId>>(&mut self, ids: I) {
        self.clear();
        for id in ids {
            if self.primary.is_none() {
                self.primary = Some(id.clone());
            }
            self.ids.insert(id);
        }
    }

    /// Drop ids that are not in `objects`.
    pub fn retain_existing(&mut self, objects: &[Arc<CanvasObject>]) {
        self.ids.retain(|id| objects.iter().any(|o| &o.id == id));
        if self.primary.as_ref().is_some_and(|p| !self.ids.contains(p)) {
            self.primary = self.ids.iter().next().cloned();
        }
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Why a dispatch was sent; decides where a failure goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteSource {
    /// Write-through of an immediate or isolated edit.
    Immediate,
    /// A flushed batch of coalesced edits.
    Batch,
    /// A resend of offline-queued writes.
    OfflineRetry { attempt: u32 },
}

/// One store call the runtime must make.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub ops: Vec<WriteOp>,
    pub source: WriteSource,
}

// =============================================================================
// SESSION
// =============================================================================

pub struct CanvasSession {
    config: SyncConfig,
    self_id: String,
    objects: Collection,
    selection: Selection,
    history: History,
    suppress: SuppressionMap,
    scheduler: WriteScheduler,
    offline: OfflineQueue,
    outbox: Vec<Dispatch>,
    peers: Vec<Peer>,
    library: ComponentLibrary,
    online: bool,
    /// Objects created without an explicit position; drives the cascade.
    created: usize,
    /// Pre-gesture copies of the objects being dragged, resized or rotated.
    gesture: Option<Vec<Arc<CanvasObject>>>,
}

impl CanvasSession {
    #[must_use]
    pub fn new(config: SyncConfig, self_id: impl Into<String>) -> Self {
        Self {
            history: History::new(config.history_limit),
            scheduler: WriteScheduler::new(config.cadence_ms, config.batch_delay_ms),
            offline: OfflineQueue::new(config.offline_retention_ms, config.offline_max_attempts),
            config,
            self_id: self_id.into(),
            objects: Vec::new(),
            selection: Selection::default(),
            suppress: SuppressionMap::new(),
            outbox: Vec::new(),
            peers: Vec::new(),
            library: ComponentLibrary::new(),
            online: true,
            created: 0,
            gesture: None,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn objects(&self) -> &[Arc<CanvasObject>] {
        &self.objects
    }

    #[must_use]
    pub fn object(&self, id: &str) -> Option<&Arc<CanvasObject>> {
        self.objects.iter().find(|o| o.id == id)
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online
    }

    #[must_use]
    pub fn library(&self) -> &ComponentLibrary {
        &self.library
    }

    #[must_use]
    pub fn offline_queue(&self) -> &OfflineQueue {
        &self.offline
    }

    #[must_use]
    pub fn scheduler(&self) -> &WriteScheduler {
        &self.scheduler
    }

    /// When the pending batch must be flushed, if one is pending.
    #[must_use]
    pub fn batch_deadline_ms(&self) -> Option<i64> {
        self.scheduler.deadline_ms()
    }

    /// Store calls decided since the last take.
    pub fn take_outbox(&mut self) -> Vec<Dispatch> {
        std::mem::take(&mut self.outbox)
    }

    // -------------------------------------------------------------------------
    // Selection & presence
    // -------------------------------------------------------------------------

    /// Select one object (or clear with `None`). Unknown ids clear the selection.
    pub fn select(&mut self, id: Option<&str>) {
        match id {
            Some(id) if self.object(id).is_some() => self.selection.set([id.to_owned()]),
            _ => self.selection.clear(),
        }
    }

    /// Select several objects; unknown ids are ignored.
    pub fn select_many<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        let known: Vec<ObjectId> =
            ids.into_iter().filter(|id| self.object(id).is_some()).map(str::to_owned).collect();
        self.selection.set(known);
    }

    /// Replace the presence list used to attribute remote edits.
    pub fn set_peers(&mut self, peers: Vec<Peer>) {
        self.peers = peers;
    }

    // -------------------------------------------------------------------------
    // Local edits
    // -------------------------------------------------------------------------

    /// Create an object with type defaults, select it, and write it immediately.
    pub fn add_shape(&mut self, kind: ShapeKind, initial: &ObjectPatch, now_ms: i64) -> ObjectId {
        let mut obj = new_object(kind, initial, self.next_cascade(initial));
        obj.order = initial.order.unwrap_or_else(|| next_order(&self.objects));
        let id = obj.id.clone();
        self.create(vec![obj], now_ms);
        id
    }

    /// Patch one object and record it as one history entry.
    ///
    /// Returns `false` when the id is unknown or the patch changes nothing.
    pub fn update_object(&mut self, id: &str, patch: &ObjectPatch, immediate: bool, now_ms: i64) -> bool {
        let Some(before) = self.object(id).cloned() else {
            debug!(%id, "update for missing object ignored");
            return false;
        };
        let after = Arc::new(self.stamp(apply_patch(&before, patch), now_ms));
        if visually_equal(&before, &after) {
            return false;
        }
        self.replace(&[Arc::clone(&after)]);
        self.history.push(HistoryEntry::Update { before: vec![before], after: vec![Arc::clone(&after)] });
        self.schedule(&after, immediate, now_ms);
        true
    }

    /// Delete the selected objects as one history entry.
    pub fn delete_selected(&mut self, now_ms: i64) -> bool {
        let ids: Vec<ObjectId> = self.selection.ids.iter().cloned().collect();
        self.delete_objects(&ids, now_ms)
    }

    /// Delete objects by id as one history entry. Unknown ids are skipped.
    pub fn delete_objects(&mut self, ids: &[ObjectId], now_ms: i64) -> bool {
        let removed: Vec<Arc<CanvasObject>> =
            self.objects.iter().filter(|o| ids.contains(&o.id)).cloned().collect();
        if removed.is_empty() {
            return false;
        }
        self.objects.retain(|o| !ids.contains(&o.id));
        self.selection.retain_existing(&self.objects);
        let ops = removed.iter().map(|o| WriteOp::Delete(o.id.clone())).collect();
        self.history.push(HistoryEntry::Delete(removed));
        self.send_now(ops, now_ms);
        true
    }

    /// Duplicate the selection (offset by one cascade step) and select the copies.
    pub fn copy_selected(&mut self, now_ms: i64) -> bool {
        let mut order = next_order(&self.objects);
        let copies: Vec<CanvasObject> = self
            .objects
            .iter()
            .filter(|o| self.selection.contains(&o.id))
            .map(|o| {
                let copy = CanvasObject {
                    id: uuid::Uuid::new_v4().to_string(),
                    x: o.x + NEW_SHAPE_CASCADE,
                    y: o.y + NEW_SHAPE_CASCADE,
                    order,
                    flash: None,
                    ..CanvasObject::clone(o)
                };
                order += 1;
                copy
            })
            .collect();
        if copies.is_empty() {
            return false;
        }
        self.create(copies, now_ms);
        true
    }

    // -------------------------------------------------------------------------
    // Gestures
    // -------------------------------------------------------------------------

    /// Start a drag/resize/rotate over `ids`, remembering their current state.
    pub fn begin_gesture(&mut self, ids: &[ObjectId]) {
        let seeds: Vec<Arc<CanvasObject>> =
            self.objects.iter().filter(|o| ids.contains(&o.id)).cloned().collect();
        self.gesture = (!seeds.is_empty()).then_some(seeds);
    }

    /// Apply one pointer step: optimistic, cadence-batched, no history.
    pub fn apply_gesture(&mut self, patches: &[(ObjectId, ObjectPatch)], now_ms: i64) {
        let mut changed = Vec::with_capacity(patches.len());
        for (id, patch) in patches {
            if let Some(current) = self.object(id) {
                changed.push(Arc::new(self.stamp(apply_patch(current, patch), now_ms)));
            }
        }
        self.replace(&changed);
        for obj in &changed {
            self.schedule(obj, false, now_ms);
        }
    }

    /// Finish the gesture: one history entry for everything that moved.
    ///
    /// A group commit is written immediately as one commit; a single object
    /// goes through the cadence path like its intermediate steps.
    pub fn commit_gesture(&mut self, now_ms: i64) -> bool {
        let Some(seeds) = self.gesture.take() else {
            return false;
        };
        let (before, after): (Vec<_>, Vec<_>) = seeds
            .into_iter()
            .filter_map(|seed| {
                let current = self.object(&seed.id)?;
                (!visually_equal(&seed, current)).then(|| (seed, Arc::clone(current)))
            })
            .unzip();
        if after.is_empty() {
            return false;
        }

        self.history.push(HistoryEntry::Update { before, after: after.clone() });
        if let [single] = after.as_slice() {
            self.schedule(single, false, now_ms);
        } else {
            self.send_now(after.iter().map(|o| WriteOp::Put(CanvasObject::clone(o))).collect(), now_ms);
        }
        true
    }

    /// Whether a gesture is in progress.
    #[must_use]
    pub fn in_gesture(&self) -> bool {
        self.gesture.is_some()
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Run a structured command. Returns `false` when it had no effect.
    pub fn execute(&mut self, cmd: &Command, now_ms: i64) -> bool {
        let ctx = ExecContext {
            objects: &self.objects,
            selection: &self.selection,
            config: &self.config,
            cascade_index: self.created,
        };
        match executor::plan(cmd, &ctx) {
            Plan::Create(objects) => {
                if matches!(cmd, Command::CreateShape(_) | Command::CreateText(_)) {
                    self.created += 1;
                }
                self.create(objects, now_ms);
                true
            }
            Plan::Update(patches) => self.update_many(&patches, now_ms),
            Plan::Noop => {
                debug!(?cmd, "command had nothing to act on");
                false
            }
        }
    }

    /// Decode and run an agent function call. Unknown or malformed calls are ignored.
    pub fn execute_tool_call(&mut self, name: &str, arguments: &str, now_ms: i64) -> bool {
        Command::from_tool_call(name, arguments).is_some_and(|cmd| self.execute(&cmd, now_ms))
    }

    // -------------------------------------------------------------------------
    // Component library
    // -------------------------------------------------------------------------

    /// Save the selection as a named component.
    pub fn save_component(&mut self, name: &str) -> bool {
        let selected = self.objects.iter().filter(|o| self.selection.contains(&o.id)).map(Arc::as_ref);
        self.library.save(name, selected)
    }

    /// Insert a saved component as new objects.
    pub fn insert_component(&mut self, name: &str, now_ms: i64) -> bool {
        match self.library.instantiate(name, next_order(&self.objects)) {
            Some(objects) if !objects.is_empty() => {
                self.create(objects, now_ms);
                true
            }
            _ => false,
        }
    }

    // -------------------------------------------------------------------------
    // Undo / redo
    // -------------------------------------------------------------------------

    pub fn undo(&mut self, now_ms: i64) -> bool {
        match self.history.undo(&self.objects) {
            Some(next) => {
                self.persist_transition(next, now_ms);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self, now_ms: i64) -> bool {
        match self.history.redo(&self.objects) {
            Some(next) => {
                self.persist_transition(next, now_ms);
                true
            }
            None => false,
        }
    }

    // -------------------------------------------------------------------------
    // Remote stream
    // -------------------------------------------------------------------------

    /// Fold an authoritative snapshot into local state. Never touches history.
    pub fn apply_remote_snapshot(&mut self, remote: &[CanvasObject], now_ms: i64) {
        merge::expire_suppressions(&mut self.suppress, now_ms);
        let ctx = MergeContext {
            suppress: &self.suppress,
            self_id: &self.self_id,
            peers: &self.peers,
            now_ms,
            flash_ms: self.config.flash_ms,
        };
        self.objects = merge::merge(&self.objects, remote, &ctx);
        self.selection.retain_existing(&self.objects);
        if let Some(seeds) = &mut self.gesture {
            seeds.retain(|s| self.objects.iter().any(|o| o.id == s.id));
            if seeds.is_empty() {
                self.gesture = None;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Timers & lifecycle
    // -------------------------------------------------------------------------

    /// The batch timer fired.
    pub fn on_batch_deadline(&mut self, now_ms: i64) {
        if let Some(batch) = self.scheduler.take_due_at(now_ms) {
            self.push_batch(batch);
        }
    }

    /// Page hidden or unloading: flush the pending batch and the offline queue now.
    pub fn flush_pending(&mut self, now_ms: i64) {
        let batch = self.scheduler.take_all();
        if !batch.is_empty() {
            self.push_batch(batch);
        }
        self.flush_offline(now_ms);
    }

    /// Periodic offline retry; only runs while online.
    pub fn on_retry_interval(&mut self, now_ms: i64) {
        if self.online {
            self.flush_offline(now_ms);
        }
    }

    /// Connectivity changed. Reconnecting flushes the offline queue once.
    pub fn set_online(&mut self, online: bool, now_ms: i64) {
        let reconnected = online && !self.online;
        self.online = online;
        if reconnected {
            info!(queued = self.offline.len(), "connectivity restored");
            self.flush_offline(now_ms);
        } else if !online {
            info!("connectivity lost");
        }
    }

    /// Outcome of a dispatch sent by the runtime.
    pub fn on_write_result(&mut self, dispatch: Dispatch, result: Result<(), StoreError>, now_ms: i64) {
        if dispatch.source == WriteSource::Batch {
            self.scheduler.finish_flush();
        }
        let Err(e) = result else {
            return;
        };
        warn!(error = %e, count = dispatch.ops.len(), source = ?dispatch.source, "write failed; queued offline");
        match dispatch.source {
            WriteSource::OfflineRetry { attempt } => self.offline.requeue_failed_at(dispatch.ops, attempt, now_ms),
            WriteSource::Immediate | WriteSource::Batch => {
                for op in dispatch.ops {
                    self.offline.enqueue_at(op, now_ms);
                }
            }
        }
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn next_cascade(&mut self, initial: &ObjectPatch) -> usize {
        if initial.x.is_some() || initial.y.is_some() {
            return 0;
        }
        let index = self.created;
        self.created += 1;
        index
    }

    fn stamp(&self, mut obj: CanvasObject, now_ms: i64) -> CanvasObject {
        obj.last_edited_by = Some(self.self_id.clone());
        obj.last_edited_at_ms = Some(now_ms);
        obj
    }

    fn suppress(&mut self, id: &str, now_ms: i64) {
        self.suppress.insert(id.to_owned(), now_ms + self.config.suppress_ms);
    }

    /// Swap in new versions of existing objects, keeping stacking order.
    fn replace(&mut self, changed: &[Arc<CanvasObject>]) {
        if changed.is_empty() {
            return;
        }
        let by_id: HashMap<&str, &Arc<CanvasObject>> = changed.iter().map(|o| (o.id.as_str(), o)).collect();
        for slot in &mut self.objects {
            if let Some(next) = by_id.get(slot.id.as_str()) {
                *slot = Arc::clone(next);
            }
        }
        sort_for_stacking(&mut self.objects);
    }

    /// Add new objects: one history entry, one immediate write, selection moves to them.
    fn create(&mut self, objects: Vec<CanvasObject>, now_ms: i64) {
        let created: Vec<Arc<CanvasObject>> =
            objects.into_iter().map(|o| Arc::new(self.stamp(o, now_ms))).collect();
        self.objects.extend(created.iter().cloned());
        sort_for_stacking(&mut self.objects);
        self.selection.set(created.iter().map(|o| o.id.clone()));
        let ops = created.iter().map(|o| WriteOp::Put(CanvasObject::clone(o))).collect();
        self.history.push(HistoryEntry::Create(created));
        self.send_now(ops, now_ms);
    }

    /// Patch several objects as one history entry and one immediate commit.
    fn update_many(&mut self, patches: &[(ObjectId, ObjectPatch)], now_ms: i64) -> bool {
        let mut before = Vec::with_capacity(patches.len());
        let mut after = Vec::with_capacity(patches.len());
        for (id, patch) in patches {
            let Some(current) = self.object(id) else {
                continue;
            };
            let next = apply_patch(current, patch);
            if visually_equal(current, &next) {
                continue;
            }
            before.push(Arc::clone(current));
            after.push(Arc::new(self.stamp(next, now_ms)));
        }
        if after.is_empty() {
            return false;
        }
        self.replace(&after);
        let ops = after.iter().map(|o| WriteOp::Put(CanvasObject::clone(o))).collect();
        self.history.push(HistoryEntry::Update { before, after });
        self.send_now(ops, now_ms);
        true
    }

    /// Install the result of an undo/redo and write the difference immediately.
    ///
    /// Restored objects keep the edit stamps recorded in history, so undo
    /// then redo restores an object field for field.
    fn persist_transition(&mut self, next: Collection, now_ms: i64) {
        let previous = std::mem::take(&mut self.objects);
        let mut ops = Vec::new();
        for obj in &next {
            if !previous.iter().any(|p| Arc::ptr_eq(p, obj)) {
                ops.push(WriteOp::Put(CanvasObject::clone(obj)));
            }
        }
        self.objects = next;
        for gone in previous.iter().filter(|p| !self.objects.iter().any(|o| o.id == p.id)) {
            ops.push(WriteOp::Delete(gone.id.clone()));
        }
        self.selection.retain_existing(&self.objects);
        self.send_now(ops, now_ms);
    }

    /// Route one object through the scheduler.
    fn schedule(&mut self, obj: &Arc<CanvasObject>, immediate: bool, now_ms: i64) {
        self.suppress(&obj.id, now_ms);
        self.offline.discard(&obj.id);
        if let ScheduleOutcome::WriteThrough(obj) = self.scheduler.schedule_at(CanvasObject::clone(obj), immediate, now_ms)
        {
            self.outbox.push(Dispatch { ops: vec![WriteOp::Put(obj)], source: WriteSource::Immediate });
        }
    }

    /// Send `ops` immediately as one store call.
    fn send_now(&mut self, ops: Vec<WriteOp>, now_ms: i64) {
        if ops.is_empty() {
            return;
        }
        for op in &ops {
            let id = op.id().to_owned();
            self.scheduler.cancel(&id);
            self.offline.discard(&id);
            self.suppress(&id, now_ms);
        }
        self.outbox.push(Dispatch { ops, source: WriteSource::Immediate });
    }

    fn push_batch(&mut self, batch: Vec<CanvasObject>) {
        debug!(count = batch.len(), "flushing write batch");
        for obj in &batch {
            self.offline.discard(&obj.id);
        }
        let ops = batch.into_iter().map(WriteOp::Put).collect();
        self.outbox.push(Dispatch { ops, source: WriteSource::Batch });
    }

    fn flush_offline(&mut self, now_ms: i64) {
        if let Some(drained) = self.offline.drain_at(now_ms) {
            debug!(count = drained.ops.len(), attempt = drained.attempt, "resending offline writes");
            self.outbox.push(Dispatch { ops: drained.ops, source: WriteSource::OfflineRetry { attempt: drained.attempt } });
        }
    }
}
