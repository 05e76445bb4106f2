use std::sync::Arc;

use crate::domain::{BoardChange, Task};
use crate::error::HandlerError;
use crate::ports::{ChangeContext, ChangeHandler};

/// Runtime executes a `Task` by dispatching its change to the handler.
pub struct Runtime {
    handler: Arc<dyn ChangeHandler>,
}

impl Runtime {
    pub fn new(handler: Arc<dyn ChangeHandler>) -> Self {
        Self { handler }
    }

    /// Execute one task.
    pub async fn execute(&self, task: &Task) -> Result<(), HandlerError> {
        let ctx = ChangeContext::from(task);
        match task.change() {
            BoardChange::Create(item) => self.handler.create(&ctx, item).await,
            BoardChange::Update(item) => self.handler.update(&ctx, item).await,
            BoardChange::Delete => self.handler.delete(&ctx).await,
        }
    }
}
