use thiserror::Error;

/// Failure reported by a [`ChangeHandler`](crate::ports::ChangeHandler).
///
/// The queue never looks inside: every variant is treated as transient and
/// retried until the retry budget is spent.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("platform rejected change (status={status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Other(String),

    /// The handler panicked; the worker survives and the task is retried.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Errors raised while wiring a queue together.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no change handler configured")]
    MissingHandler,
}
