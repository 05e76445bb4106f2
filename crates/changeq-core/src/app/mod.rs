//! App - composes the queue, worker pool and lifecycle into `ChangeQueue`.
//!
//! # 主要コンポーネント
//! - **ChangeQueueBuilder**: 構築とワイヤリング
//! - **ChangeQueue**: public handle (enqueue / configure / start / stop)
//! - **Engine**: 共有状態と worker から呼ばれる操作
//! - **Lifecycle**: Accepting -> Draining -> Stopped

pub mod builder;
pub mod change_queue;
pub(crate) mod engine;
pub mod lifecycle;

pub use self::builder::ChangeQueueBuilder;
pub use self::change_queue::ChangeQueue;
pub use self::lifecycle::{Phase, StopOptions, StopReport};
