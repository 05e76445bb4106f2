//! ChangeQueueBuilder - wiring for the composition root.
//!
//! Fail-fast: a queue without a handler cannot be built.

use std::sync::Arc;

use super::change_queue::ChangeQueue;
use super::engine::Engine;
use crate::config::QueueConfig;
use crate::error::BuildError;
use crate::ports::{ChangeHandler, QueueLogger, TracingLogger};
use crate::queue::Jitter;
use crate::runtime::Runtime;

/// Builds a [`ChangeQueue`].
///
/// # 使用例
/// ```ignore
/// let queue = ChangeQueueBuilder::new()
///     .handler(Arc::new(BoardClient::new(token)))
///     .config(QueueConfig::from_env())
///     .build()?;
/// ```
pub struct ChangeQueueBuilder {
    handler: Option<Arc<dyn ChangeHandler>>,
    logger: Arc<dyn QueueLogger>,
    config: QueueConfig,
    jitter: Jitter,
}

impl ChangeQueueBuilder {
    pub fn new() -> Self {
        Self {
            handler: None,
            logger: Arc::new(TracingLogger),
            config: QueueConfig::default(),
            jitter: Jitter::DEFAULT,
        }
    }

    /// Required.
    pub fn handler(mut self, handler: Arc<dyn ChangeHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Defaults to [`TracingLogger`].
    pub fn logger(mut self, logger: Arc<dyn QueueLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Clamped on build.
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn build(self) -> Result<ChangeQueue, BuildError> {
        let handler = self.handler.ok_or(BuildError::MissingHandler)?;
        let engine = Engine::new(
            self.config,
            self.logger,
            Runtime::new(handler),
            self.jitter,
        );
        Ok(ChangeQueue::from_engine(engine))
    }
}

impl Default for ChangeQueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}
