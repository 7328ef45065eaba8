//! Session runtime: drives a [`CanvasSession`] against a live store.
//!
//! DESIGN
//! ======
//! One spawned task owns the session. Everything that can change it
//! (caller events, remote snapshots, write results, the batch deadline and
//! the offline retry interval) is multiplexed in a single `select!` loop,
//! so session state is never shared and never locked.
//!
//! After every wake the task drains the session outbox into a single writer
//! task. The writer makes one store call per dispatch, strictly in the order
//! the session decided them, so an older value for an id can never land
//! after a newer one. Results come back on an internal channel and are fed
//! to [`CanvasSession::on_write_result`]. A read-only [`SessionView`] is
//! published on a watch channel after each wake.
//!
//! ERROR HANDLING
//! ==============
//! A failed subscription is logged and the session keeps running on local
//! state only. Write failures are handled by the session (offline queue).
//! Dropping every handle (or calling [`SessionHandle::shutdown`]) flushes
//! the pending batch and waits for in-flight writes before the task exits.

#[cfg(test)]
#[path = "runtime_test.rs"]
mod runtime_test;

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::merge::Peer;
use crate::model::{CanvasObject, Collection, ObjectId, ObjectPatch, ShapeKind};
use crate::session::{CanvasSession, Dispatch, Selection};
use crate::store::{DocumentStore, StoreError, Subscription, send_ops};

const EVENT_QUEUE_CAPACITY: usize = 256;

// =============================================================================
// TYPES
// =============================================================================

/// Caller-originated input to a running session.
#[derive(Debug, Clone)]
pub enum Event {
    /// Agent function call (`name` plus JSON `arguments`).
    ToolCall { name: String, arguments: String },
    AddShape { kind: ShapeKind, initial: ObjectPatch },
    Update { id: ObjectId, patch: ObjectPatch, immediate: bool },
    Select(Option<ObjectId>),
    SelectMany(Vec<ObjectId>),
    DeleteSelected,
    CopySelected,
    BeginGesture(Vec<ObjectId>),
    GestureStep(Vec<(ObjectId, ObjectPatch)>),
    CommitGesture,
    Undo,
    Redo,
    SaveComponent(String),
    InsertComponent(String),
    SetPeers(Vec<Peer>),
    SetOnline(bool),
    /// Page hidden or unloading.
    Flush,
}

/// Snapshot of session state for rendering.
#[derive(Debug, Clone, Default)]
pub struct SessionView {
    pub objects: Collection,
    pub selection: Selection,
    pub can_undo: bool,
    pub can_redo: bool,
    pub online: bool,
    /// Writes waiting in the offline queue.
    pub queued_offline: usize,
}

impl SessionView {
    fn of(session: &CanvasSession) -> Self {
        Self {
            objects: session.objects().to_vec(),
            selection: session.selection().clone(),
            can_undo: session.history().can_undo(),
            can_redo: session.history().can_redo(),
            online: session.is_online(),
            queued_offline: session.offline_queue().len(),
        }
    }

    #[must_use]
    pub fn object(&self, id: &str) -> Option<&Arc<CanvasObject>> {
        self.objects.iter().find(|o| o.id == id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("session task has stopped")]
    Stopped,
}

type WriteResult = (Dispatch, Result<(), StoreError>);

// =============================================================================
// HANDLE
// =============================================================================

/// Owner-side handle to a spawned session task.
pub struct SessionHandle {
    tx: mpsc::Sender<Event>,
    view: watch::Receiver<SessionView>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Queue an event for the session task.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Stopped`] if the task has exited.
    pub async fn send(&self, event: Event) -> Result<(), RuntimeError> {
        self.tx.send(event).await.map_err(|_| RuntimeError::Stopped)
    }

    /// Queue an agent function call.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Stopped`] if the task has exited.
    pub async fn tool_call(&self, name: &str, arguments: &str) -> Result<(), RuntimeError> {
        self.send(Event::ToolCall { name: name.to_owned(), arguments: arguments.to_owned() }).await
    }

    /// Latest published view.
    #[must_use]
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// A receiver that observes every published view.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Flush pending writes, wait for them, and stop the task.
    pub async fn shutdown(self) {
        let Self { tx, task, .. } = self;
        drop(tx);
        if let Err(e) = task.await {
            error!(error = %e, "session task failed");
        }
    }
}

/// Spawn a session task for `self_id` against `store`.
pub fn spawn_session(
    store: Arc<dyn DocumentStore>,
    config: SyncConfig,
    self_id: impl Into<String>,
    clock: Arc<dyn Clock>,
) -> SessionHandle {
    let session = CanvasSession::new(config, self_id);
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let (view_tx, view) = watch::channel(SessionView::of(&session));
    info!(
        self_id = session.self_id(),
        cadence_ms = session.config().cadence_ms,
        batch_delay_ms = session.config().batch_delay_ms,
        suppress_ms = session.config().suppress_ms,
        "canvas session started"
    );
    let worker = Worker::new(session, store, clock, view_tx);
    let task = tokio::spawn(worker.run(rx));
    SessionHandle { tx, view, task }
}

// =============================================================================
// WORKER
// =============================================================================

/// What woke the loop.
enum Wake {
    Event(Event),
    EventsClosed,
    Snapshot(Vec<CanvasObject>),
    SubscriptionClosed,
    WriteFinished(WriteResult),
    BatchDue,
    RetryTick,
}

struct Worker {
    session: CanvasSession,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    view: watch::Sender<SessionView>,
    writes: mpsc::UnboundedSender<Dispatch>,
    done_rx: mpsc::UnboundedReceiver<WriteResult>,
    in_flight: usize,
}

impl Worker {
    fn new(
        session: CanvasSession,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        view: watch::Sender<SessionView>,
    ) -> Self {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let writes = spawn_writer(Arc::clone(&store), done_tx);
        Self { session, store, clock, view, writes, done_rx, in_flight: 0 }
    }

    async fn run(mut self, mut events: mpsc::Receiver<Event>) {
        let mut subscription = match self.store.subscribe() {
            Ok(sub) => Some(sub),
            Err(e) => {
                error!(error = %e, "snapshot subscription failed; continuing on local state");
                None
            }
        };
        let mut retry = tokio::time::interval(Duration::from_millis(self.session.config().offline_retry_ms));
        retry.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let batch_wait = self.batch_wait();
            let wake = tokio::select! {
                event = events.recv() => event.map_or(Wake::EventsClosed, Wake::Event),
                snapshot = next_snapshot(&mut subscription) => {
                    snapshot.map_or(Wake::SubscriptionClosed, Wake::Snapshot)
                }
                Some(done) = self.done_rx.recv() => Wake::WriteFinished(done),
                () = sleep_or_park(batch_wait) => Wake::BatchDue,
                _ = retry.tick() => Wake::RetryTick,
            };

            let now = self.clock.now_ms();
            match wake {
                Wake::Event(event) => self.handle_event(event, now),
                Wake::EventsClosed => break,
                Wake::Snapshot(remote) => self.session.apply_remote_snapshot(&remote, now),
                Wake::SubscriptionClosed => {
                    warn!("snapshot stream ended");
                    subscription = None;
                }
                Wake::WriteFinished((dispatch, result)) => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    self.session.on_write_result(dispatch, result, now);
                }
                Wake::BatchDue => self.session.on_batch_deadline(now),
                Wake::RetryTick => self.session.on_retry_interval(now),
            }
            self.dispatch_outbox();
            self.publish();
        }

        // PHASE: DRAIN
        // WHY: a closing page must not lose the batch it was still coalescing.
        self.session.flush_pending(self.clock.now_ms());
        self.dispatch_outbox();
        while self.in_flight > 0 {
            let Some((dispatch, result)) = self.done_rx.recv().await else {
                break;
            };
            self.in_flight -= 1;
            if let Err(e) = &result {
                warn!(error = %e, count = dispatch.ops.len(), "write failed during shutdown");
            }
            self.session.on_write_result(dispatch, result, self.clock.now_ms());
        }
        self.publish();
        info!(self_id = self.session.self_id(), "canvas session stopped");
    }

    fn handle_event(&mut self, event: Event, now: i64) {
        let s = &mut self.session;
        match event {
            Event::ToolCall { name, arguments } => {
                if !s.execute_tool_call(&name, &arguments, now) {
                    debug!(%name, "tool call had no effect");
                }
            }
            Event::AddShape { kind, initial } => {
                let id = s.add_shape(kind, &initial, now);
                debug!(%id, ?kind, "shape added");
            }
            Event::Update { id, patch, immediate } => {
                s.update_object(&id, &patch, immediate, now);
            }
            Event::Select(id) => s.select(id.as_deref()),
            Event::SelectMany(ids) => s.select_many(ids.iter().map(String::as_str)),
            Event::DeleteSelected => {
                s.delete_selected(now);
            }
            Event::CopySelected => {
                s.copy_selected(now);
            }
            Event::BeginGesture(ids) => s.begin_gesture(&ids),
            Event::GestureStep(patches) => s.apply_gesture(&patches, now),
            Event::CommitGesture => {
                s.commit_gesture(now);
            }
            Event::Undo => {
                s.undo(now);
            }
            Event::Redo => {
                s.redo(now);
            }
            Event::SaveComponent(name) => {
                if !s.save_component(&name) {
                    debug!(%name, "nothing selected to save");
                }
            }
            Event::InsertComponent(name) => {
                if !s.insert_component(&name, now) {
                    debug!(%name, "unknown component");
                }
            }
            Event::SetPeers(peers) => s.set_peers(peers),
            Event::SetOnline(online) => s.set_online(online, now),
            Event::Flush => s.flush_pending(now),
        }
    }

    /// Hand every queued dispatch to the writer, in decision order.
    fn dispatch_outbox(&mut self) {
        for dispatch in self.session.take_outbox() {
            match self.writes.send(dispatch) {
                Ok(()) => self.in_flight += 1,
                Err(mpsc::error::SendError(dispatch)) => {
                    error!(count = dispatch.ops.len(), "store writer stopped; write queued offline");
                    self.session.on_write_result(dispatch, Err(StoreError::Closed), self.clock.now_ms());
                }
            }
        }
    }

    fn publish(&self) {
        self.view.send_replace(SessionView::of(&self.session));
    }

    /// Time left until the pending batch is due.
    fn batch_wait(&self) -> Option<Duration> {
        let deadline = self.session.batch_deadline_ms()?;
        let left = u64::try_from(deadline - self.clock.now_ms()).unwrap_or(0);
        Some(Duration::from_millis(left))
    }
}

/// Spawn the writer: one store call at a time, FIFO, each result reported
/// back on `done_tx`. Ends when the worker drops its sender.
fn spawn_writer(
    store: Arc<dyn DocumentStore>,
    done_tx: mpsc::UnboundedSender<WriteResult>,
) -> mpsc::UnboundedSender<Dispatch> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Dispatch>();
    tokio::spawn(async move {
        while let Some(dispatch) = rx.recv().await {
            let result = send_ops(store.as_ref(), &dispatch.ops).await;
            if done_tx.send((dispatch, result)).is_err() {
                debug!("session gone before write finished");
                break;
            }
        }
    });
    tx
}

async fn next_snapshot(subscription: &mut Option<Subscription>) -> Option<Vec<CanvasObject>> {
    match subscription {
        Some(sub) => sub.next().await,
        None => pending().await,
    }
}

async fn sleep_or_park(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => pending().await,
    }
}
