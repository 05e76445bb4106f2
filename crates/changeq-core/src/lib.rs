//! changeq-core
//!
//! Asynchronous change queue for outbound board mutations: bounded
//! concurrency, exponential backoff with jitter, backpressure telemetry
//! and drain-on-shutdown.
//!
//! # モジュール構成
//! - **domain**: Task, BoardChange, ids
//! - **config**: QueueConfig / ConfigPatch (clamped)
//! - **queue**: pending store, retry policy, backpressure monitor
//! - **ports**: ChangeHandler, QueueLogger
//! - **runtime**: BoardChange -> ChangeHandler dispatch
//! - **worker**: worker pool
//! - **app**: ChangeQueue, builder, lifecycle
//! - **observability**: event names, QueueCounts

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod runtime;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{ChangeQueue, ChangeQueueBuilder, Phase, StopOptions, StopReport};
pub use config::{ConfigPatch, QueueConfig};
pub use domain::{BoardChange, CreateItem, ItemType, OwnerId, TargetId, Task, TaskKind, UpdateItem};
pub use error::{BuildError, HandlerError};
pub use ports::{ChangeContext, ChangeHandler, QueueLogger};
