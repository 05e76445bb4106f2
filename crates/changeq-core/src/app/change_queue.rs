//! ChangeQueue - the public handle.

use std::sync::Arc;

use super::builder::ChangeQueueBuilder;
use super::engine::Engine;
use super::lifecycle::{StopOptions, StopReport};
use crate::config::{ConfigPatch, QueueConfig};
use crate::domain::Task;
use crate::observability::QueueCounts;
use crate::ports::QueueLogger;

/// Throttled, retrying queue of outbound board changes.
///
/// Cheap to clone; every clone drives the same engine. Build exactly one per
/// process in the composition root and hand clones to the routing layer.
///
/// # 使用例
/// ```ignore
/// let queue = ChangeQueue::builder().handler(client).build()?;
/// queue.start(None);
/// queue.enqueue(Task::new(owner, target, BoardChange::Delete));
/// let report = queue.stop(StopOptions::default()).await;
/// ```
#[derive(Clone)]
pub struct ChangeQueue {
    engine: Arc<Engine>,
}

impl ChangeQueue {
    pub fn builder() -> ChangeQueueBuilder {
        ChangeQueueBuilder::new()
    }

    pub(crate) fn from_engine(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Admit a task. Fire-and-forget: after `stop` it is logged as rejected and dropped.
    pub fn enqueue(&self, task: Task) {
        self.engine.enqueue(task);
    }

    /// Merge `patch` into the configuration; returns the clamped result.
    pub fn configure(&self, patch: ConfigPatch) -> QueueConfig {
        self.engine.configure(&patch)
    }

    pub fn config(&self) -> QueueConfig {
        self.engine.config()
    }

    pub fn set_logger(&self, logger: Arc<dyn QueueLogger>) {
        self.engine.set_logger(logger);
    }

    /// Launch the worker pool (`concurrency` overrides the configured size).
    ///
    /// No-op when already running. Must be called inside a Tokio runtime.
    pub fn start(&self, concurrency: Option<usize>) {
        self.engine.start(concurrency);
    }

    /// Stop admissions and wait for the queue to wind down.
    pub async fn stop(&self, options: StopOptions) -> StopReport {
        self.engine.stop(options).await
    }

    /// Tasks waiting for a worker.
    pub fn size(&self) -> usize {
        self.engine.size()
    }

    /// Tasks currently executing.
    pub fn in_flight(&self) -> usize {
        self.engine.in_flight()
    }

    pub fn counts(&self) -> QueueCounts {
        self.engine.counts()
    }
}
