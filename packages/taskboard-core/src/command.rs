/// Typed board transitions. Local UI intents and reconciled remote events
/// both end up as one of these.
use serde::{Deserialize, Serialize};

use crate::types::{NewColumn, NewTask, TaskPatch};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    CreateTask { column_id: String, task: NewTask },
    #[serde(rename_all = "camelCase")]
    UpdateTask { task_id: String, patch: TaskPatch },
    #[serde(rename_all = "camelCase")]
    AddComment { task_id: String, text: String },
    #[serde(rename_all = "camelCase")]
    DeleteTask { column_id: String, task_id: String },
    CreateColumn { column: NewColumn },
    #[serde(rename_all = "camelCase")]
    UpdateColumn { column_id: String, title: String },
    #[serde(rename_all = "camelCase")]
    DeleteColumn { column_id: String },
    #[serde(rename_all = "camelCase")]
    MoveTask {
        source_column_id: String,
        dest_column_id: String,
        source_index: usize,
        dest_index: usize,
    },
    #[serde(rename_all = "camelCase")]
    ReorderColumns { source_index: usize, dest_index: usize },
}

impl Command {
    /// Short name used in log tags.
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateTask { .. } => "create_task",
            Command::UpdateTask { .. } => "update_task",
            Command::AddComment { .. } => "add_comment",
            Command::DeleteTask { .. } => "delete_task",
            Command::CreateColumn { .. } => "create_column",
            Command::UpdateColumn { .. } => "update_column",
            Command::DeleteColumn { .. } => "delete_column",
            Command::MoveTask { .. } => "move_task",
            Command::ReorderColumns { .. } => "reorder_columns",
        }
    }
}
