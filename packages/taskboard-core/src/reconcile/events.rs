/// Wire format of the remote change feed.
///
/// Frames look like `{"kind": "insert", "entity": "task", "payload": {...}}`.
/// Payloads mirror the remote table rows, so their fields are snake_case.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed event frame: {0}")]
    Frame(#[source] serde_json::Error),

    #[error("Bad {entity} {kind} payload: {source}")]
    Payload {
        kind: String,
        entity: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct Envelope {
    kind: String,
    entity: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// A task row as delivered by an insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTask {
    pub id: String,
    pub column_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub comments: Option<Vec<String>>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The fields present in a task update. Absent fields are left alone;
/// `"due_date": null` clears the due date.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoteTaskPatch {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub comments: Option<Vec<String>>,
    #[serde(default, deserialize_with = "crate::types::present_or_null")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTaskRef {
    pub id: String,
    #[serde(default)]
    pub column_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteColumn {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteColumnRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    TaskInserted(RemoteTask),
    TaskUpdated(RemoteTaskPatch),
    TaskDeleted(RemoteTaskRef),
    ColumnInserted(RemoteColumn),
    ColumnUpdated(RemoteColumn),
    ColumnDeleted(RemoteColumnRef),
    /// A kind/entity pair this core does not handle.
    Unknown { kind: String, entity: String },
}

impl RemoteEvent {
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        let value = serde_json::from_str(frame).map_err(DecodeError::Frame)?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, DecodeError> {
        let env: Envelope = serde_json::from_value(value).map_err(DecodeError::Frame)?;
        let kind = env.kind.to_ascii_lowercase();
        let entity = env.entity.to_ascii_lowercase();

        let payload_err = |source| DecodeError::Payload {
            kind: kind.clone(),
            entity: entity.clone(),
            source,
        };
        let payload = env.payload;
        let event = match (kind.as_str(), entity.as_str()) {
            ("insert", "task") => {
                RemoteEvent::TaskInserted(serde_json::from_value(payload).map_err(payload_err)?)
            }
            ("update", "task") => {
                RemoteEvent::TaskUpdated(serde_json::from_value(payload).map_err(payload_err)?)
            }
            ("delete", "task") => {
                RemoteEvent::TaskDeleted(serde_json::from_value(payload).map_err(payload_err)?)
            }
            ("insert", "column") => {
                RemoteEvent::ColumnInserted(serde_json::from_value(payload).map_err(payload_err)?)
            }
            ("update", "column") => {
                RemoteEvent::ColumnUpdated(serde_json::from_value(payload).map_err(payload_err)?)
            }
            ("delete", "column") => {
                RemoteEvent::ColumnDeleted(serde_json::from_value(payload).map_err(payload_err)?)
            }
            _ => RemoteEvent::Unknown {
                kind: env.kind,
                entity: env.entity,
            },
        };
        Ok(event)
    }

    /// Label used in log tags, e.g. `task.insert`.
    pub fn label(&self) -> String {
        match self {
            RemoteEvent::TaskInserted(_) => "task.insert".into(),
            RemoteEvent::TaskUpdated(_) => "task.update".into(),
            RemoteEvent::TaskDeleted(_) => "task.delete".into(),
            RemoteEvent::ColumnInserted(_) => "column.insert".into(),
            RemoteEvent::ColumnUpdated(_) => "column.update".into(),
            RemoteEvent::ColumnDeleted(_) => "column.delete".into(),
            RemoteEvent::Unknown { kind, entity } => format!("{}.{}", entity, kind),
        }
    }
}

/// Requests sent to the remote store. Local state only changes once the
/// matching insert comes back through the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundRequest {
    CreateColumn { title: String, position: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_task_insert() {
        let frame = r#"{"kind":"insert","entity":"task","payload":{
            "id":"t1","column_id":"c1","title":"Ship it",
            "created_at":"2025-03-01T09:00:00Z","updated_at":"2025-03-01T09:05:00Z"}}"#;
        let RemoteEvent::TaskInserted(task) = RemoteEvent::decode(frame).unwrap() else {
            panic!("expected task insert");
        };
        assert_eq!(task.column_id, "c1");
        assert_eq!(task.title, "Ship it");
        assert!(task.created_at.unwrap() < task.updated_at.unwrap());
        assert!(task.due_date.is_none());
    }

    #[test]
    fn test_decode_patch_distinguishes_absent_and_null() {
        let absent = RemoteEvent::from_value(json!({
            "kind": "update", "entity": "task", "payload": {"id": "t1", "title": "x"}
        }))
        .unwrap();
        let RemoteEvent::TaskUpdated(patch) = absent else {
            panic!("expected task update");
        };
        assert_eq!(patch.due_date, None);

        let cleared = RemoteEvent::from_value(json!({
            "kind": "update", "entity": "task", "payload": {"id": "t1", "due_date": null}
        }))
        .unwrap();
        let RemoteEvent::TaskUpdated(patch) = cleared else {
            panic!("expected task update");
        };
        assert_eq!(patch.due_date, Some(None));
        assert_eq!(patch.title, None);
    }

    #[test]
    fn test_unknown_kind_is_not_an_error() {
        let event = RemoteEvent::from_value(json!({
            "kind": "truncate", "entity": "task", "payload": {}
        }))
        .unwrap();
        assert_eq!(
            event,
            RemoteEvent::Unknown {
                kind: "truncate".into(),
                entity: "task".into()
            }
        );
        assert_eq!(event.label(), "task.truncate");
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(RemoteEvent::decode("not json"), Err(DecodeError::Frame(_))));
        let err = RemoteEvent::from_value(json!({
            "kind": "insert", "entity": "column", "payload": {"id": "c1"}
        }))
        .unwrap_err();
        assert!(matches!(err, DecodeError::Payload { .. }));
    }

    #[test]
    fn test_outbound_shape() {
        let req = OutboundRequest::CreateColumn {
            title: "Done".into(),
            position: 2,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"type": "create_column", "title": "Done", "position": 2})
        );
    }
}
