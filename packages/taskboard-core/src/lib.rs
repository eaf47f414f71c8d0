//! In-memory state core for a collaborative task board.
//!
//! Columns hold ordered task references; every structural edit is a pure
//! transition over immutable snapshots, local edits are undoable, and remote
//! change-feed events are reconciled into the same state.

pub mod clock;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod ids;
pub mod reconcile;
pub mod reminders;
pub mod session;
pub mod types;

pub use command::Command;
pub use error::{BoardError, ErrorKind};
pub use history::History;
pub use reconcile::events::{OutboundRequest, RemoteEvent};
pub use session::{BoardSession, SessionChannels, SessionError, SessionHandle};
pub use types::{Board, Column, NewColumn, NewTask, Task, TaskPatch};
