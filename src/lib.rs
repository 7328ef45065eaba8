//! Client-side sync engine for a shared, real-time 2D canvas.
//!
//! Every participant holds an optimistic in-memory copy of the canvas
//! objects, applies local edits immediately, writes them to a shared
//! document store, and folds the store's authoritative snapshots back in
//! without rubber-banding recent local edits. The engine coalesces
//! high-frequency writes, queues writes while offline, keeps a bounded
//! undo/redo log, highlights objects edited by peers, and executes
//! structured layout and creation commands.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`model`] | Canvas object, patches, bounds and document encoding |
//! | [`color`] | Shape palette and per-user colours |
//! | [`scheduler`] | Adaptive write batching state machine |
//! | [`offline`] | Time-bounded offline write queue |
//! | [`merge`] | Remote snapshot merge, suppression and edit highlights |
//! | [`history`] | Undo/redo log |
//! | [`store`] | Document store contract consumed by the engine |
//! | [`memory_store`] | In-memory store for tests and the demo |
//! | [`layout`] | Pure layout arithmetic |
//! | [`command`] | Structured commands and tool-call decoding |
//! | [`executor`] | Command planning (creation, alignment, layouts) |
//! | [`library`] | Saved component groups |
//! | [`session`] | Single state-update entry point for one client |
//! | [`runtime`] | Tokio task that drives a session against a store |
//! | [`config`] | Environment-driven tunables |
//! | [`clock`] | Wall-clock sources |
//! | [`consts`] | Shared numeric constants |

pub mod clock;
pub mod color;
pub mod command;
pub mod config;
pub mod consts;
pub mod executor;
pub mod history;
pub mod layout;
pub mod library;
pub mod memory_store;
pub mod merge;
pub mod model;
pub mod offline;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod store;

pub use command::Command;
pub use config::SyncConfig;
pub use model::{CanvasObject, ObjectPatch, ShapeKind};
pub use runtime::{Event, SessionHandle, SessionView, spawn_session};
pub use session::CanvasSession;
pub use store::{DocumentStore, StoreError, WriteOp};
