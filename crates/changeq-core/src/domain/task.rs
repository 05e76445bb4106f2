use serde::{Deserialize, Serialize};

use super::{BoardChange, OwnerId, TargetId, TaskId, TaskKind};

/// A unit of deferred work: one board mutation.
///
/// Immutable except for `attempt`. A retry is a new value produced by
/// [`Task::next_attempt`]; id, owner, target and change are carried over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    owner_id: OwnerId,
    target_id: TargetId,
    change: BoardChange,
    attempt: u32,
}

impl Task {
    pub fn new(owner_id: OwnerId, target_id: TargetId, change: BoardChange) -> Self {
        Self {
            id: TaskId::generate(),
            owner_id,
            target_id,
            change,
            attempt: 0,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> TaskKind {
        self.change.kind()
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    pub fn target_id(&self) -> &TargetId {
        &self.target_id
    }

    pub fn change(&self) -> &BoardChange {
        &self.change
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Copy of this task for the next attempt.
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt.saturating_add(1),
            ..self.clone()
        }
    }

    /// Structured fields for log payloads.
    pub(crate) fn log_fields(&self) -> serde_json::Value {
        serde_json::json!({
            "task_id": self.id.to_string(),
            "kind": self.kind(),
            "owner_id": self.owner_id,
            "target_id": self.target_id,
            "attempt": self.attempt,
        })
    }
}
