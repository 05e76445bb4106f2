//! Lifecycle - admission and shutdown state.
//!
//! State transitions:
//! - Accepting -> Draining (stop called)
//! - Draining -> Stopped (drain finished, or timeout)
//!
//! Stopped is terminal.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Accepting,
    Draining,
    Stopped,
}

/// Options for `ChangeQueue::stop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopOptions {
    /// Process pending tasks before stopping (default) instead of discarding them.
    pub drain: bool,
    /// Force-resolve after this long. `None` waits as long as it takes.
    pub timeout_ms: Option<u64>,
}

impl Default for StopOptions {
    fn default() -> Self {
        Self {
            drain: true,
            timeout_ms: None,
        }
    }
}

impl StopOptions {
    pub fn drain() -> Self {
        Self::default()
    }

    pub fn discard() -> Self {
        Self {
            drain: false,
            timeout_ms: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// What a shutdown did. Every `stop` caller sees the same report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopReport {
    /// All pending work was executed before stopping.
    pub drained: bool,
    /// Pending tasks and scheduled retries dropped without execution.
    pub discarded: usize,
    /// The timeout elapsed before the queue went idle.
    pub timed_out: bool,
}

pub(crate) type ShutdownRx = watch::Receiver<Option<StopReport>>;

#[derive(Debug)]
pub(crate) struct Lifecycle {
    phase: Phase,
    running: bool,
    drain: bool,
    shutdown: Option<ShutdownRx>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            phase: Phase::Accepting,
            running: false,
            drain: true,
            shutdown: None,
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.phase == Phase::Accepting
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn set_running(&mut self) {
        self.running = true;
    }

    pub(crate) fn is_draining(&self) -> bool {
        self.phase == Phase::Draining
    }

    /// Whether pending work should still be executed.
    pub(crate) fn executes_pending(&self) -> bool {
        match self.phase {
            Phase::Accepting => true,
            Phase::Draining => self.drain,
            Phase::Stopped => false,
        }
    }

    pub(crate) fn shutdown(&self) -> Option<ShutdownRx> {
        self.shutdown.clone()
    }

    /// Leave `Accepting`. Only the first call has an effect.
    pub(crate) fn begin_stop(&mut self, drain: bool, shutdown: ShutdownRx) {
        if self.phase != Phase::Accepting {
            return;
        }
        self.phase = Phase::Draining;
        self.drain = drain;
        self.shutdown = Some(shutdown);
    }

    pub(crate) fn finish_stop(&mut self) {
        self.phase = Phase::Stopped;
        self.running = false;
    }
}
