//! Identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a background task.
///
/// Format: `task-<12 hex chars>`
/// Example: `task-3f9a0c1b7d2e`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        TaskId(format!("task-{}", &uuid[..12]))
    }

    /// Parse an existing task ID string.
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.strip_prefix("task-")?;
        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(TaskId(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
