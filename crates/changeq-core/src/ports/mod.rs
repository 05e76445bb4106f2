//! Ports - boundaries to the outside world.
//!
//! - `ChangeHandler`: performs the board mutation (platform REST call).
//! - `QueueLogger`: receives structured queue events.

pub mod handler;
pub mod logger;

pub use self::handler::{ChangeContext, ChangeHandler};
pub use self::logger::{LogLevel, LogRecord, MemoryLogger, NoopLogger, QueueLogger, TracingLogger};
