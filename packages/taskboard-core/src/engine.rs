/// Mutation engine: one pure transition per command kind.
///
/// Each handler takes the current snapshot and returns either a new
/// snapshot or a `BoardError`, never touching the input. "Now" is passed in
/// so the transitions stay deterministic. A command that changes nothing
/// hands back the same `Arc<Board>`.
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::command::Command;
use crate::error::BoardError;
use crate::types::{Board, Column, NewColumn, NewTask, Task, TaskPatch};

/// Apply a single command to `board`.
pub fn apply(
    board: &Arc<Board>,
    command: &Command,
    now: DateTime<Utc>,
) -> Result<Arc<Board>, BoardError> {
    match command {
        Command::CreateTask { column_id, task } => create_task(board, column_id, task, now),
        Command::UpdateTask { task_id, patch } => update_task(board, task_id, patch, now),
        Command::AddComment { task_id, text } => add_comment(board, task_id, text, now),
        Command::DeleteTask { column_id, task_id } => delete_task(board, column_id, task_id),
        Command::CreateColumn { column } => create_column(board, column),
        Command::UpdateColumn { column_id, title } => update_column(board, column_id, title),
        Command::DeleteColumn { column_id } => delete_column(board, column_id),
        Command::MoveTask {
            source_column_id,
            dest_column_id,
            source_index,
            dest_index,
        } => move_task(
            board,
            source_column_id,
            dest_column_id,
            *source_index,
            *dest_index,
        ),
        Command::ReorderColumns {
            source_index,
            dest_index,
        } => reorder_columns(board, *source_index, *dest_index),
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn finish(next: Board) -> Arc<Board> {
    debug_assert_eq!(next.check_invariants(), Ok(()));
    Arc::new(next)
}

fn require_text(value: &str, what: &str) -> Result<String, BoardError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BoardError::InvalidInput(format!("{} must not be blank", what)));
    }
    Ok(trimmed.to_string())
}

/// Copy-on-write access to one column of a board under construction.
fn column_mut<'a>(board: &'a mut Board, column_id: &str) -> Option<&'a mut Column> {
    board.columns.get_mut(column_id).map(Arc::make_mut)
}

/// Bounds for a lift-then-drop move inside one sequence of length `len`.
/// `to` is read against the sequence after the item has been lifted out.
/// Returns `false` when the move is an identity.
fn check_reorder(len: usize, from: usize, to: usize) -> Result<bool, BoardError> {
    if from >= len {
        return Err(BoardError::IndexOutOfRange { index: from, len });
    }
    if to > len - 1 {
        return Err(BoardError::IndexOutOfRange { index: to, len: len - 1 });
    }
    Ok(from != to)
}

fn splice_move(seq: &mut Vec<String>, from: usize, to: usize) {
    let item = seq.remove(from);
    seq.insert(to, item);
}

// ── Tasks ───────────────────────────────────────────────────────────────────

pub fn create_task(
    board: &Arc<Board>,
    column_id: &str,
    task: &NewTask,
    now: DateTime<Utc>,
) -> Result<Arc<Board>, BoardError> {
    board.require_column(column_id)?;
    if task.id.trim().is_empty() {
        return Err(BoardError::InvalidInput("task id must not be blank".into()));
    }
    if board.tasks.contains_key(&task.id) {
        return Err(BoardError::DuplicateTask(task.id.clone()));
    }
    let title = require_text(&task.title, "task title")?;
    let created_at = task.created_at.unwrap_or(now);
    let updated_at = task.updated_at.unwrap_or(now).max(created_at);

    let mut next = Board::clone(board);
    next.tasks.insert(
        task.id.clone(),
        Arc::new(Task {
            id: task.id.clone(),
            title,
            description: task.description.clone(),
            comments: task.comments.clone(),
            due_date: task.due_date,
            created_at,
            updated_at,
        }),
    );
    if let Some(col) = column_mut(&mut next, column_id) {
        col.task_ids.push(task.id.clone());
    }
    Ok(finish(next))
}

pub fn update_task(
    board: &Arc<Board>,
    task_id: &str,
    patch: &TaskPatch,
    now: DateTime<Utc>,
) -> Result<Arc<Board>, BoardError> {
    let Some(current) = board.tasks.get(task_id) else {
        log::debug!("[taskboard.engine.update_task] Task {} absent, nothing to update", task_id);
        return Ok(Arc::clone(board));
    };
    if patch.is_empty() {
        return Ok(Arc::clone(board));
    }
    let title = patch
        .title
        .as_deref()
        .map(|t| require_text(t, "task title"))
        .transpose()?;

    let mut task = Task::clone(current);
    if let Some(title) = title {
        task.title = title;
    }
    if let Some(description) = &patch.description {
        task.description = Some(description.clone());
    }
    if let Some(comments) = &patch.comments {
        task.comments = comments.clone();
    }
    if let Some(due_date) = patch.due_date {
        task.due_date = due_date;
    }
    task.updated_at = now.max(current.updated_at);

    let mut next = Board::clone(board);
    next.tasks.insert(task_id.to_string(), Arc::new(task));
    Ok(finish(next))
}

pub fn add_comment(
    board: &Arc<Board>,
    task_id: &str,
    text: &str,
    now: DateTime<Utc>,
) -> Result<Arc<Board>, BoardError> {
    let current = board.require_task(task_id)?;
    let text = require_text(text, "comment")?;

    let mut task = current.clone();
    task.comments.push(text);
    task.updated_at = now.max(current.updated_at);

    let mut next = Board::clone(board);
    next.tasks.insert(task_id.to_string(), Arc::new(task));
    Ok(finish(next))
}

/// Remove a task. The id is taken out of whichever column actually holds
/// it, so a stale `column_id` cannot leave a dangling reference behind.
pub fn delete_task(
    board: &Arc<Board>,
    column_id: &str,
    task_id: &str,
) -> Result<Arc<Board>, BoardError> {
    let owner = board.column_of(task_id).map(str::to_owned);
    if owner.is_none() && !board.tasks.contains_key(task_id) {
        log::debug!("[taskboard.engine.delete_task] Task {} already gone", task_id);
        return Ok(Arc::clone(board));
    }

    let mut next = Board::clone(board);
    next.tasks.remove(task_id);
    if let Some(owner) = owner {
        if owner != column_id {
            log::debug!(
                "[taskboard.engine.delete_task] Task {} lives in {}, not {}",
                task_id,
                owner,
                column_id
            );
        }
        if let Some(col) = column_mut(&mut next, &owner) {
            col.task_ids.retain(|id| id != task_id);
        }
    }
    Ok(finish(next))
}

pub fn move_task(
    board: &Arc<Board>,
    source_column_id: &str,
    dest_column_id: &str,
    source_index: usize,
    dest_index: usize,
) -> Result<Arc<Board>, BoardError> {
    let source = board.require_column(source_column_id)?;
    let dest = board.require_column(dest_column_id)?;

    if source_column_id == dest_column_id {
        if !check_reorder(source.task_ids.len(), source_index, dest_index)? {
            return Ok(Arc::clone(board));
        }
        let mut next = Board::clone(board);
        if let Some(col) = column_mut(&mut next, source_column_id) {
            splice_move(&mut col.task_ids, source_index, dest_index);
        }
        return Ok(finish(next));
    }

    if source_index >= source.task_ids.len() {
        return Err(BoardError::IndexOutOfRange {
            index: source_index,
            len: source.task_ids.len(),
        });
    }
    if dest_index > dest.task_ids.len() {
        return Err(BoardError::IndexOutOfRange {
            index: dest_index,
            len: dest.task_ids.len(),
        });
    }

    let mut next = Board::clone(board);
    let moved = match column_mut(&mut next, source_column_id) {
        Some(col) => col.task_ids.remove(source_index),
        None => return Err(BoardError::ColumnNotFound(source_column_id.to_string())),
    };
    if let Some(col) = column_mut(&mut next, dest_column_id) {
        col.task_ids.insert(dest_index, moved);
    }
    Ok(finish(next))
}

// ── Columns ─────────────────────────────────────────────────────────────────

pub fn create_column(board: &Arc<Board>, column: &NewColumn) -> Result<Arc<Board>, BoardError> {
    if column.id.trim().is_empty() {
        return Err(BoardError::InvalidInput("column id must not be blank".into()));
    }
    if board.columns.contains_key(&column.id) {
        return Err(BoardError::DuplicateColumn(column.id.clone()));
    }
    let title = require_text(&column.title, "column title")?;

    let mut next = Board::clone(board);
    next.columns.insert(
        column.id.clone(),
        Arc::new(Column {
            id: column.id.clone(),
            title,
            task_ids: Vec::new(),
        }),
    );
    next.column_order.push(column.id.clone());
    Ok(finish(next))
}

pub fn update_column(
    board: &Arc<Board>,
    column_id: &str,
    title: &str,
) -> Result<Arc<Board>, BoardError> {
    let current = board.require_column(column_id)?;
    let title = require_text(title, "column title")?;
    if current.title == title {
        return Ok(Arc::clone(board));
    }

    let mut next = Board::clone(board);
    if let Some(col) = column_mut(&mut next, column_id) {
        col.title = title;
    }
    Ok(finish(next))
}

/// Remove a column together with every task it references.
pub fn delete_column(board: &Arc<Board>, column_id: &str) -> Result<Arc<Board>, BoardError> {
    let Some(column) = board.columns.get(column_id) else {
        log::debug!("[taskboard.engine.delete_column] Column {} already gone", column_id);
        return Ok(Arc::clone(board));
    };

    let mut next = Board::clone(board);
    for task_id in &column.task_ids {
        next.tasks.remove(task_id);
    }
    next.column_order.retain(|id| id != column_id);
    next.columns.remove(column_id);
    Ok(finish(next))
}

pub fn reorder_columns(
    board: &Arc<Board>,
    source_index: usize,
    dest_index: usize,
) -> Result<Arc<Board>, BoardError> {
    if !check_reorder(board.column_order.len(), source_index, dest_index)? {
        return Ok(Arc::clone(board));
    }
    let mut next = Board::clone(board);
    splice_move(&mut next.column_order, source_index, dest_index);
    Ok(finish(next))
}
