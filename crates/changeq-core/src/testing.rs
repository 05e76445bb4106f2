//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::domain::{
    BoardChange, CreateItem, ItemType, OwnerId, TargetId, Task, TaskKind, UpdateItem,
};
use crate::error::HandlerError;
use crate::ports::{ChangeContext, ChangeHandler};

pub(crate) fn create_task(target: &str) -> Task {
    Task::new(
        OwnerId::new("user-1"),
        TargetId::new(target),
        BoardChange::Create(CreateItem {
            item_type: ItemType::Shape,
            data: serde_json::json!({"content": target}),
        }),
    )
}

pub(crate) fn update_task(target: &str) -> Task {
    Task::new(
        OwnerId::new("user-1"),
        TargetId::new(target),
        BoardChange::Update(UpdateItem {
            item_type: ItemType::Shape,
            data: serde_json::json!({"style": {"fillColor": "#ffffff"}}),
        }),
    )
}

pub(crate) fn delete_task(target: &str) -> Task {
    Task::new(OwnerId::new("user-1"), TargetId::new(target), BoardChange::Delete)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub kind: TaskKind,
    pub target_id: TargetId,
    pub attempt: u32,
}

/// Handler that fails its first `fail_first` calls, optionally taking
/// `delay` per call, and records everything it sees.
pub(crate) struct ScriptedHandler {
    fail_first: usize,
    delay: Duration,
    calls: Mutex<Vec<Call>>,
    running: AtomicUsize,
    max_parallel: AtomicUsize,
    pub started: Notify,
}

impl ScriptedHandler {
    pub fn new(fail_first: usize, delay: Duration) -> Self {
        Self {
            fail_first,
            delay,
            calls: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            max_parallel: AtomicUsize::new(0),
            started: Notify::new(),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn always_failing() -> Self {
        Self::new(usize::MAX, Duration::ZERO)
    }

    pub fn slow(delay: Duration) -> Self {
        Self::new(0, delay)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel.load(Ordering::SeqCst)
    }

    async fn run(&self, kind: TaskKind, ctx: &ChangeContext) -> Result<(), HandlerError> {
        self.started.notify_one();
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_parallel.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        let n = {
            let mut calls = self.calls.lock();
            calls.push(Call {
                kind,
                target_id: ctx.target_id.clone(),
                attempt: ctx.attempt,
            });
            calls.len()
        };
        if n <= self.fail_first {
            Err(HandlerError::other("scripted failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChangeHandler for ScriptedHandler {
    async fn create(&self, ctx: &ChangeContext, _item: &CreateItem) -> Result<(), HandlerError> {
        self.run(TaskKind::Create, ctx).await
    }

    async fn update(&self, ctx: &ChangeContext, _item: &UpdateItem) -> Result<(), HandlerError> {
        self.run(TaskKind::Update, ctx).await
    }

    async fn delete(&self, ctx: &ChangeContext) -> Result<(), HandlerError> {
        self.run(TaskKind::Delete, ctx).await
    }
}

/// Handler whose behaviour is chosen per target id: fail N times, sleep, or panic.
#[derive(Default)]
pub(crate) struct TargetHandler {
    failures: Mutex<HashMap<String, usize>>,
    delays: HashMap<String, Duration>,
    panics: Vec<String>,
    calls: Mutex<Vec<Call>>,
}

impl TargetHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(self, target: &str, times: usize) -> Self {
        self.failures.lock().insert(target.to_string(), times);
        self
    }

    pub fn delay(mut self, target: &str, delay: Duration) -> Self {
        self.delays.insert(target.to_string(), delay);
        self
    }

    pub fn panic_on(mut self, target: &str) -> Self {
        self.panics.push(target.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    async fn run(&self, kind: TaskKind, ctx: &ChangeContext) -> Result<(), HandlerError> {
        let target = ctx.target_id.as_str();
        self.calls.lock().push(Call {
            kind,
            target_id: ctx.target_id.clone(),
            attempt: ctx.attempt,
        });
        if let Some(delay) = self.delays.get(target) {
            tokio::time::sleep(*delay).await;
        }
        if self.panics.iter().any(|p| p == target) {
            panic!("handler blew up on {target}");
        }
        let mut failures = self.failures.lock();
        match failures.get_mut(target) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Err(HandlerError::other("scripted failure"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ChangeHandler for TargetHandler {
    async fn create(&self, ctx: &ChangeContext, _item: &CreateItem) -> Result<(), HandlerError> {
        self.run(TaskKind::Create, ctx).await
    }

    async fn update(&self, ctx: &ChangeContext, _item: &UpdateItem) -> Result<(), HandlerError> {
        self.run(TaskKind::Update, ctx).await
    }

    async fn delete(&self, ctx: &ChangeContext) -> Result<(), HandlerError> {
        self.run(TaskKind::Delete, ctx).await
    }
}
