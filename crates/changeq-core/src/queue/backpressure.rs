//! Backpressure: depth sampling with a single warn / recover transition.
//!
//! State transitions:
//! - Normal -> Warning when `queued >= threshold`
//! - Warning -> Normal when `queued < threshold`
//!
//! While warnings are disabled (threshold `None`) the state is frozen.

use serde::{Deserialize, Serialize};

/// What caused a depth sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthTrigger {
    Enqueue,
    Dequeue,
}

/// A threshold crossing detected by a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Warning { threshold: usize },
    Recovered { threshold: usize },
}

/// Result of one depth sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthSample {
    pub queued: usize,
    pub trigger: DepthTrigger,
    pub transition: Option<Transition>,
}

#[derive(Debug, Default)]
pub struct BackpressureMonitor {
    warning_active: bool,
}

impl BackpressureMonitor {
    pub fn new() -> Self {
        Self {
            warning_active: false,
        }
    }

    pub fn is_warning(&self) -> bool {
        self.warning_active
    }

    pub fn sample(
        &mut self,
        queued: usize,
        threshold: Option<usize>,
        trigger: DepthTrigger,
    ) -> DepthSample {
        let transition = match threshold {
            Some(threshold) if !self.warning_active && queued >= threshold => {
                self.warning_active = true;
                Some(Transition::Warning { threshold })
            }
            Some(threshold) if self.warning_active && queued < threshold => {
                self.warning_active = false;
                Some(Transition::Recovered { threshold })
            }
            _ => None,
        };
        DepthSample {
            queued,
            trigger,
            transition,
        }
    }
}
