//! Reconciler: folds remote change-feed events into the board.
//!
//! Each event becomes at most one engine command, applied through
//! `History::apply_remote` so it never lands on the undo stack. Inserts and
//! deletes are idempotent; updates are last-writer-wins by arrival order.

pub mod events;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::command::Command;
use crate::history::History;
use crate::types::{Board, NewColumn, NewTask, TaskPatch};
use events::{RemoteEvent, RemoteTask};

/// What happened to one remote event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied,
    /// The command ran but the board already matched.
    Unchanged,
    Ignored(String),
}

/// Map a remote event onto the command that brings `board` in line with it.
/// `None` means the event carries nothing this core acts on.
pub fn translate(board: &Board, event: &RemoteEvent) -> Option<Command> {
    match event {
        RemoteEvent::TaskInserted(row) if board.task(&row.id).is_some() => {
            Some(Command::UpdateTask {
                task_id: row.id.clone(),
                patch: insert_as_patch(row),
            })
        }
        RemoteEvent::TaskInserted(row) => Some(Command::CreateTask {
            column_id: row.column_id.clone(),
            task: NewTask {
                id: row.id.clone(),
                title: row.title.clone(),
                description: row.description.clone(),
                comments: row.comments.clone().unwrap_or_default(),
                due_date: row.due_date,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        }),
        RemoteEvent::TaskUpdated(patch) => Some(Command::UpdateTask {
            task_id: patch.id.clone(),
            patch: TaskPatch {
                title: usable_title(patch.title.as_deref()),
                description: patch.description.clone(),
                comments: patch.comments.clone(),
                due_date: patch.due_date,
            },
        }),
        RemoteEvent::TaskDeleted(task) => {
            let column_id = task
                .column_id
                .clone()
                .or_else(|| board.column_of(&task.id).map(str::to_owned))
                .unwrap_or_default();
            Some(Command::DeleteTask {
                column_id,
                task_id: task.id.clone(),
            })
        }
        RemoteEvent::ColumnInserted(col) if board.column(&col.id).is_some() => {
            Some(Command::UpdateColumn {
                column_id: col.id.clone(),
                title: col.title.clone(),
            })
        }
        RemoteEvent::ColumnInserted(col) => Some(Command::CreateColumn {
            column: NewColumn::new(col.id.clone(), col.title.clone()),
        }),
        RemoteEvent::ColumnUpdated(col) => Some(Command::UpdateColumn {
            column_id: col.id.clone(),
            title: col.title.clone(),
        }),
        RemoteEvent::ColumnDeleted(col) => Some(Command::DeleteColumn {
            column_id: col.id.clone(),
        }),
        RemoteEvent::Unknown { .. } => None,
    }
}

/// A duplicate insert only refreshes the row's content fields; the task
/// stays where it is.
fn insert_as_patch(row: &RemoteTask) -> TaskPatch {
    TaskPatch {
        title: usable_title(Some(&row.title)),
        description: row.description.clone(),
        comments: row.comments.clone(),
        due_date: row.due_date.map(Some),
    }
}

/// Remote rows may carry a blank title; it is dropped so the rest of the
/// patch still applies.
fn usable_title(title: Option<&str>) -> Option<String> {
    title
        .filter(|t| !t.trim().is_empty())
        .map(str::to_owned)
}

/// Apply one remote event to `history`. Rejections are logged and reported
/// as `Ignored`, never returned as errors.
pub fn reconcile(history: &mut History, event: &RemoteEvent, now: DateTime<Utc>) -> ReconcileOutcome {
    let label = event.label();
    let Some(command) = translate(history.present(), event) else {
        log::warn!("[taskboard.reconcile.{}] Ignoring unhandled event", label);
        return ReconcileOutcome::Ignored(format!("unhandled event {}", label));
    };

    let before = Arc::clone(history.present());
    match history.apply_remote(&command, now) {
        Ok(after) if Arc::ptr_eq(&before, after) => {
            log::debug!("[taskboard.reconcile.{}] Already up to date", label);
            ReconcileOutcome::Unchanged
        }
        Ok(_) => {
            log::debug!("[taskboard.reconcile.{}] Applied {}", label, command.name());
            ReconcileOutcome::Applied
        }
        Err(e) => {
            log::warn!("[taskboard.reconcile.{}] Dropped: {}", label, e);
            ReconcileOutcome::Ignored(e.to_string())
        }
    }
}
