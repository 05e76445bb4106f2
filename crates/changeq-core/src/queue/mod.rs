//! Queue module: pending-task store, retry policy, backpressure sampling.

mod backpressure;
mod retry;
mod store;

pub use backpressure::{BackpressureMonitor, DepthSample, DepthTrigger, Transition};
pub use retry::{Jitter, RetryDecision, RetryPolicy};
pub use store::QueueStore;
