//! ChangeHandler port - the call that actually mutates the board.

use async_trait::async_trait;

use crate::domain::{CreateItem, OwnerId, TargetId, Task, UpdateItem};
use crate::error::HandlerError;

/// Who and what a change applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeContext {
    pub owner_id: OwnerId,
    pub target_id: TargetId,
    /// 0 for the first run, +1 per retry.
    pub attempt: u32,
}

impl From<&Task> for ChangeContext {
    fn from(task: &Task) -> Self {
        Self {
            owner_id: task.owner_id().clone(),
            target_id: task.target_id().clone(),
            attempt: task.attempt(),
        }
    }
}

/// Platform integration layer (e.g. the board REST client).
///
/// Any `Err` is retried with backoff; the queue never inspects the cause.
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    async fn create(&self, ctx: &ChangeContext, item: &CreateItem) -> Result<(), HandlerError>;

    async fn update(&self, ctx: &ChangeContext, item: &UpdateItem) -> Result<(), HandlerError>;

    async fn delete(&self, ctx: &ChangeContext) -> Result<(), HandlerError>;
}
