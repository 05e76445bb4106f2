use serde::{Deserialize, Serialize};

use crate::app::lifecycle::Phase;

/// Structured event names written to the [`QueueLogger`](crate::ports::QueueLogger).
pub mod events {
    pub const QUEUE_DEPTH: &str = "queue.depth";
    pub const QUEUE_BACKPRESSURE: &str = "queue.backpressure";
    pub const QUEUE_BACKPRESSURE_RECOVERED: &str = "queue.backpressure.recovered";
    pub const QUEUE_ENQUEUE_REJECTED: &str = "queue.enqueue.rejected";
    pub const QUEUE_STARTED: &str = "queue.started";
    pub const QUEUE_START_REJECTED: &str = "queue.start.rejected";
    pub const QUEUE_STOP_TIMEOUT: &str = "queue.stop.timeout";
    pub const QUEUE_STOPPED: &str = "queue.stopped";
    pub const TASK_PROCESSED: &str = "task.processed";
    pub const TASK_RETRY: &str = "task.retry";
    pub const TASK_RETRY_DISCARDED: &str = "task.retry.discarded";
    pub const TASK_FAILED: &str = "task.failed";
}

/// Point-in-time view of the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub queued: usize,
    pub in_flight: usize,
    pub scheduled_retries: usize,
    pub phase: Phase,
    pub backpressure: bool,
}
