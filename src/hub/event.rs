use serde::{Deserialize, Serialize};

use crate::persistence::{Task, TaskId, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskUpdated,
    TaskDeleted,
}

/// Snapshot of a task change pushed to board subscribers.
///
/// Encodes as `{"event":"task_updated","task_id":"…","title":"…","status":"done"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskChangeEvent {
    pub event: EventKind,
    pub task_id: TaskId,
    pub title: String,
    pub status: TaskStatus,
}

impl TaskChangeEvent {
    /// A task was created or changed.
    pub fn updated(task: &Task) -> Self {
        Self::from_task(EventKind::TaskUpdated, task)
    }

    pub fn deleted(task: &Task) -> Self {
        Self::from_task(EventKind::TaskDeleted, task)
    }

    fn from_task(event: EventKind, task: &Task) -> Self {
        Self {
            event,
            task_id: task.id,
            title: task.title.clone(),
            status: task.status,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
