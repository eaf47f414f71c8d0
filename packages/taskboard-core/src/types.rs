/// Board model: the entity store (tasks and columns keyed by id) and the
/// order index (column order plus per-column task order).
///
/// A `Board` is an immutable snapshot. Entities sit behind `Arc` so that a
/// transition only copies the entries it touches; everything else is shared
/// with the previous snapshot.
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{BoardError, InvariantViolation};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Display order is insertion order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub title: String,
    pub task_ids: Vec<String>,
}

/// Input for creating a task. Timestamps left as `None` default to the
/// time the command is applied.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial task update. Only `Some` fields are merged.
///
/// `due_date: Some(None)` clears the due date.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_or_null"
    )]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

/// Reads a field that is present (possibly `null`) as `Some(_)`. Paired with
/// `#[serde(default)]` so an absent field stays `None`.
pub(crate) fn present_or_null<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

impl TaskPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.comments.is_none()
            && self.due_date.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewColumn {
    pub id: String,
    pub title: String,
}

impl NewColumn {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub(crate) tasks: BTreeMap<String, Arc<Task>>,
    pub(crate) columns: BTreeMap<String, Arc<Column>>,
    pub(crate) column_order: Vec<String>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// The two-column board a fresh session starts from.
    pub fn starter(now: DateTime<Utc>) -> Self {
        let task = |id: &str, title: &str| Task {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            comments: Vec::new(),
            due_date: None,
            created_at: now,
            updated_at: now,
        };
        let column = |id: &str, title: &str, task_ids: &[&str]| Column {
            id: id.to_string(),
            title: title.to_string(),
            task_ids: task_ids.iter().map(|t| t.to_string()).collect(),
        };

        let mut board = Board::new();
        for t in [
            task("task-1", "Task One"),
            task("task-2", "Task Two"),
            task("task-3", "Task Three"),
        ] {
            board.tasks.insert(t.id.clone(), Arc::new(t));
        }
        for c in [
            column("column-1", "To Do", &["task-1", "task-2"]),
            column("column-2", "In Progress", &["task-3"]),
        ] {
            board.column_order.push(c.id.clone());
            board.columns.insert(c.id.clone(), Arc::new(c));
        }
        board
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id).map(Arc::as_ref)
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.get(id).map(Arc::as_ref)
    }

    pub fn require_task(&self, id: &str) -> Result<&Task, BoardError> {
        self.task(id)
            .ok_or_else(|| BoardError::TaskNotFound(id.to_string()))
    }

    pub fn require_column(&self, id: &str) -> Result<&Column, BoardError> {
        self.column(id)
            .ok_or_else(|| BoardError::ColumnNotFound(id.to_string()))
    }

    pub fn column_order(&self) -> &[String] {
        &self.column_order
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values().map(Arc::as_ref)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Columns in display order.
    pub fn ordered_columns(&self) -> Vec<&Column> {
        self.column_order
            .iter()
            .filter_map(|id| self.column(id))
            .collect()
    }

    /// Tasks of a column in display order. Empty for an unknown column.
    pub fn column_tasks(&self, column_id: &str) -> Vec<&Task> {
        self.column(column_id)
            .map(|col| col.task_ids.iter().filter_map(|id| self.task(id)).collect())
            .unwrap_or_default()
    }

    /// Id of the column whose sequence holds `task_id`.
    pub fn column_of(&self, task_id: &str) -> Option<&str> {
        self.columns
            .values()
            .find(|col| col.task_ids.iter().any(|id| id == task_id))
            .map(|col| col.id.as_str())
    }

    /// Verify the structural invariants: column order is a permutation of
    /// the column keys, every task is referenced by exactly one column, and
    /// no task was updated before it was created.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut seen_columns = HashSet::new();
        for id in &self.column_order {
            if !self.columns.contains_key(id) {
                return Err(InvariantViolation::DanglingColumn(id.clone()));
            }
            if !seen_columns.insert(id.as_str()) {
                return Err(InvariantViolation::RepeatedColumn(id.clone()));
            }
        }
        if let Some(id) = self.columns.keys().find(|id| !seen_columns.contains(id.as_str())) {
            return Err(InvariantViolation::UnorderedColumn(id.clone()));
        }

        let mut seen_tasks = HashSet::new();
        for col in self.columns.values() {
            for task_id in &col.task_ids {
                if !self.tasks.contains_key(task_id) {
                    return Err(InvariantViolation::DanglingTask {
                        column_id: col.id.clone(),
                        task_id: task_id.clone(),
                    });
                }
                if !seen_tasks.insert(task_id.as_str()) {
                    return Err(InvariantViolation::SharedTask(task_id.clone()));
                }
            }
        }

        for task in self.tasks.values() {
            if !seen_tasks.contains(task.id.as_str()) {
                return Err(InvariantViolation::OrphanedTask(task.id.clone()));
            }
            if task.updated_at < task.created_at {
                return Err(InvariantViolation::TimestampOrder(task.id.clone()));
            }
        }
        Ok(())
    }
}
