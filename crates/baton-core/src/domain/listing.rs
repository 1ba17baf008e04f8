//! Views over an owner's agent index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskKey;

/// What the claim store says about one agent index entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum TaskStatus {
    /// A lease is present for the task.
    Claimed { claimed_at: DateTime<Utc> },

    /// The index still lists the task but no lease exists.
    Orphaned,
}

/// One row of `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedTask {
    pub task_id: TaskKey,
    #[serde(flatten)]
    pub status: TaskStatus,
}

impl ListedTask {
    pub fn is_orphaned(&self) -> bool {
        matches!(self.status, TaskStatus::Orphaned)
    }
}
