/// Session configuration, read from a JSON file.
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::history::DEFAULT_UNDO_LIMIT;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Snapshots kept for undo. `null` keeps every snapshot.
    #[serde(default = "default_undo_limit")]
    pub undo_limit: Option<usize>,
    /// Capacity of the inbound command queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Seconds before a due date at which the reminder fires.
    #[serde(default)]
    pub reminder_lead_secs: u64,
}

fn default_undo_limit() -> Option<usize> {
    Some(DEFAULT_UNDO_LIMIT)
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            undo_limit: default_undo_limit(),
            queue_capacity: default_queue_capacity(),
            reminder_lead_secs: 0,
        }
    }
}

/// Load config from path. Returns defaults if the file doesn't exist or
/// can't be parsed.
pub fn load_config(path: &Path) -> SessionConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("[taskboard.config] Failed to parse {}: {}", path.display(), e);
            SessionConfig::default()
        }),
        Err(_) => {
            log::info!("[taskboard.config] No config at {}, using defaults", path.display());
            SessionConfig::default()
        }
    }
}
