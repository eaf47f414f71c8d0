/// Undo/redo over board snapshots.
///
/// `past` holds prior snapshots oldest first, `future` holds undone
/// snapshots nearest first. Local commands are recorded; remote commands
/// replace `present` without touching either stack.
use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::command::Command;
use crate::engine;
use crate::error::BoardError;
use crate::types::Board;

pub const DEFAULT_UNDO_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct History {
    past: Vec<Arc<Board>>,
    present: Arc<Board>,
    future: VecDeque<Arc<Board>>,
    /// Maximum length of `past`. `None` keeps everything.
    limit: Option<usize>,
}

impl History {
    pub fn new(initial: Board) -> Self {
        Self::with_limit(initial, Some(DEFAULT_UNDO_LIMIT))
    }

    pub fn with_limit(initial: Board, limit: Option<usize>) -> Self {
        Self {
            past: Vec::new(),
            present: Arc::new(initial),
            future: VecDeque::new(),
            limit,
        }
    }

    pub fn present(&self) -> &Arc<Board> {
        &self.present
    }

    /// Apply a locally originated command and record it for undo.
    ///
    /// Failed commands and commands that leave the board unchanged are not
    /// recorded, and the redo stack survives them.
    pub fn apply_local(
        &mut self,
        command: &Command,
        now: DateTime<Utc>,
    ) -> Result<&Arc<Board>, BoardError> {
        let next = engine::apply(&self.present, command, now).map_err(|e| {
            log::warn!("[taskboard.history] Rejected {}: {}", command.name(), e);
            e
        })?;
        if Arc::ptr_eq(&next, &self.present) {
            return Ok(&self.present);
        }

        let prev = std::mem::replace(&mut self.present, next);
        self.past.push(prev);
        if let Some(limit) = self.limit {
            if self.past.len() > limit {
                let excess = self.past.len() - limit;
                self.past.drain(0..excess);
            }
        }
        self.future.clear();
        Ok(&self.present)
    }

    /// Apply a remotely originated command. Not undoable, and the pending
    /// redo stack is left alone.
    pub fn apply_remote(
        &mut self,
        command: &Command,
        now: DateTime<Utc>,
    ) -> Result<&Arc<Board>, BoardError> {
        self.present = engine::apply(&self.present, command, now)?;
        Ok(&self.present)
    }

    /// Step back one snapshot. Returns `false` if there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(prev) = self.past.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, prev);
        self.future.push_front(current);
        log::debug!(
            "[taskboard.history] Undo (past {}, future {})",
            self.past.len(),
            self.future.len()
        );
        true
    }

    /// Step forward one snapshot. Returns `false` if there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(next) = self.future.pop_front() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, next);
        self.past.push(current);
        log::debug!(
            "[taskboard.history] Redo (past {}, future {})",
            self.past.len(),
            self.future.len()
        );
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.past.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.future.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NewColumn, NewTask, TaskPatch};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn create_task(column_id: &str, id: &str) -> Command {
        Command::CreateTask {
            column_id: column_id.into(),
            task: NewTask::new(id, id),
        }
    }

    #[test]
    fn test_undo_restores_prior_board_and_redo_reapplies() {
        let mut history = History::new(Board::starter(t0()));
        let before = Arc::clone(history.present());

        history.apply_local(&create_task("column-1", "t4"), t0()).unwrap();
        let after = Arc::clone(history.present());
        assert_ne!(*before, *after);

        assert!(history.undo());
        assert_eq!(**history.present(), *before);
        assert!(history.redo());
        assert_eq!(**history.present(), *after);
    }

    #[test]
    fn test_n_commands_then_n_undos_returns_to_start() {
        let mut history = History::new(Board::starter(t0()));
        let start = Arc::clone(history.present());
        let commands = vec![
            create_task("column-1", "t4"),
            Command::MoveTask {
                source_column_id: "column-1".into(),
                dest_column_id: "column-2".into(),
                source_index: 0,
                dest_index: 1,
            },
            Command::CreateColumn {
                column: NewColumn::new("column-3", "Done"),
            },
            Command::ReorderColumns {
                source_index: 2,
                dest_index: 0,
            },
            Command::DeleteColumn {
                column_id: "column-2".into(),
            },
        ];
        for (i, cmd) in commands.iter().enumerate() {
            history
                .apply_local(cmd, t0() + Duration::minutes(i as i64))
                .unwrap();
            assert!(history.present().check_invariants().is_ok());
        }
        assert_eq!(history.undo_depth(), commands.len());
        for _ in 0..commands.len() {
            assert!(history.undo());
        }
        assert!(!history.undo());
        assert_eq!(**history.present(), *start);
        assert_eq!(history.redo_depth(), commands.len());
    }

    #[test]
    fn test_new_local_command_clears_future() {
        let mut history = History::new(Board::starter(t0()));
        history.apply_local(&create_task("column-1", "t4"), t0()).unwrap();
        history.undo();
        assert!(history.can_redo());
        history.apply_local(&create_task("column-2", "t5"), t0()).unwrap();
        assert!(!history.can_redo());
    }

    #[test]
    fn test_failed_and_noop_commands_are_not_recorded() {
        let mut history = History::new(Board::starter(t0()));
        history.apply_local(&create_task("column-1", "t4"), t0()).unwrap();
        history.undo();

        let err = history.apply_local(&create_task("ghost", "t5"), t0());
        assert_eq!(err.unwrap_err(), BoardError::ColumnNotFound("ghost".into()));

        let noop = Command::DeleteColumn {
            column_id: "ghost".into(),
        };
        history.apply_local(&noop, t0()).unwrap();

        assert_eq!(history.undo_depth(), 0);
        assert_eq!(history.redo_depth(), 1);
    }

    #[test]
    fn test_remote_update_keeps_redo_stack() {
        let mut history = History::new(Board::starter(t0()));
        history.apply_local(&create_task("column-1", "t4"), t0()).unwrap();
        history.undo();

        let patch = Command::UpdateTask {
            task_id: "task-2".into(),
            patch: TaskPatch::title("Patched remotely"),
        };
        history.apply_remote(&patch, t0() + Duration::minutes(1)).unwrap();

        assert_eq!(history.present().task("task-2").unwrap().title, "Patched remotely");
        assert_eq!(history.undo_depth(), 0);
        assert_eq!(history.redo_depth(), 1);
    }

    #[test]
    fn test_undo_limit_drops_oldest() {
        let mut history = History::with_limit(Board::starter(t0()), Some(2));
        for id in ["a", "b", "c"] {
            history.apply_local(&create_task("column-1", id), t0()).unwrap();
        }
        assert_eq!(history.undo_depth(), 2);
        assert!(history.undo());
        assert!(history.undo());
        assert!(!history.undo());
        // the first create survives because its snapshot was dropped
        assert!(history.present().task("a").is_some());
        assert!(history.present().task("b").is_none());
    }

    #[test]
    fn test_redo_on_empty_future() {
        let mut history = History::new(Board::new());
        assert!(!history.redo());
        assert!(!history.can_undo());
    }
}
