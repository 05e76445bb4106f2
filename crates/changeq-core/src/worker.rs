use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::app::engine::Engine;
use crate::domain::Task;
use crate::error::HandlerError;

/// Worker group handle.
/// - Workers stop on their own once the engine's lifecycle says so.
/// - `join()` waits for every worker to exit.
pub struct WorkerPool {
    joins: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `n` workers. Must be called inside a Tokio runtime.
    pub(crate) fn spawn(n: usize, engine: Arc<Engine>) -> Self {
        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let engine = Arc::clone(&engine);
            let join = tokio::spawn(async move {
                worker_loop(worker_id, engine).await;
            });
            joins.push(join);
        }

        Self { joins }
    }

    /// Wait for all workers. In-flight handler calls are never cancelled.
    pub async fn join(self) {
        for j in self.joins {
            if let Err(e) = j.await {
                tracing::error!(error = %e, "worker task ended abnormally");
            }
        }
    }
}

async fn worker_loop(worker_id: usize, engine: Arc<Engine>) {
    tracing::debug!(worker_id, "worker started");

    // next_task() は lifecycle が終了を指示したら None を返す
    while let Some(task) = engine.next_task().await {
        match execute_isolated(&engine, &task).await {
            Ok(()) => engine.complete(&task),
            Err(err) => engine.fail(task, err),
        }
    }

    tracing::debug!(worker_id, "worker exited");
}

/// Run the handler on its own task; a panic comes back as `HandlerError::Panicked`.
async fn execute_isolated(engine: &Arc<Engine>, task: &Task) -> Result<(), HandlerError> {
    let call = {
        let engine = Arc::clone(engine);
        let task = task.clone();
        tokio::spawn(async move { engine.runtime().execute(&task).await })
    };
    match call.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(task_id = %task.id(), error = %e, "change handler panicked");
            Err(HandlerError::Panicked(e.to_string()))
        }
    }
}
