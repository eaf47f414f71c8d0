//! Error types for the board state core.
//!
//! Every failure here is local and non-fatal: the board the command was
//! applied to is left untouched and the caller decides what to surface.

/// Coarse failure classes shared by every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    OutOfRange,
    Duplicate,
    InvalidInput,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Column already exists: {0}")]
    DuplicateColumn(String),

    #[error("Task already exists: {0}")]
    DuplicateTask(String),

    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl BoardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BoardError::ColumnNotFound(_) | BoardError::TaskNotFound(_) => ErrorKind::NotFound,
            BoardError::DuplicateColumn(_) | BoardError::DuplicateTask(_) => ErrorKind::Duplicate,
            BoardError::IndexOutOfRange { .. } => ErrorKind::OutOfRange,
            BoardError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }
}

/// A broken structural invariant found by `Board::check_invariants`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("Column {0} listed in column order but missing from columns")]
    DanglingColumn(String),

    #[error("Column {0} listed more than once in column order")]
    RepeatedColumn(String),

    #[error("Column {0} exists but is missing from column order")]
    UnorderedColumn(String),

    #[error("Task {task_id} referenced by column {column_id} does not exist")]
    DanglingTask { column_id: String, task_id: String },

    #[error("Task {0} is referenced more than once")]
    SharedTask(String),

    #[error("Task {0} is not referenced by any column")]
    OrphanedTask(String),

    #[error("Task {0} was updated before it was created")]
    TimestampOrder(String),
}
