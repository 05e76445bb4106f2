//! Domain model: task identity, board changes, tasks.

pub mod change;
pub mod ids;
pub mod task;

pub use change::{BoardChange, CreateItem, ItemType, TaskKind, UpdateItem};
pub use ids::{OwnerId, TargetId, TaskId};
pub use task::Task;
