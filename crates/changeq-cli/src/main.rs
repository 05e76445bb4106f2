use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use changeq_core::{
    BoardChange, ChangeContext, ChangeHandler, ChangeQueue, CreateItem, HandlerError, ItemType,
    OwnerId, QueueConfig, StopOptions, TargetId, Task, UpdateItem, config,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Stand-in for the board REST client: rejects the first `failures` calls
/// with a 429 the way the rate-limited platform does.
struct SimulatedBoard {
    remaining_failures: AtomicU32,
    latency: Duration,
}

impl SimulatedBoard {
    fn new(failures: u32, latency: Duration) -> Self {
        Self {
            remaining_failures: AtomicU32::new(failures),
            latency,
        }
    }

    async fn call(&self, op: &str, ctx: &ChangeContext) -> Result<(), HandlerError> {
        tokio::time::sleep(self.latency).await;

        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(HandlerError::Rejected {
                status: 429,
                message: format!("rate limited (left={left})"),
            });
        }

        tracing::info!(
            op,
            owner = %ctx.owner_id,
            target = %ctx.target_id,
            attempt = ctx.attempt,
            "board updated"
        );
        Ok(())
    }
}

#[async_trait]
impl ChangeHandler for SimulatedBoard {
    async fn create(&self, ctx: &ChangeContext, _item: &CreateItem) -> Result<(), HandlerError> {
        self.call("create", ctx).await
    }

    async fn update(&self, ctx: &ChangeContext, _item: &UpdateItem) -> Result<(), HandlerError> {
        self.call("update", ctx).await
    }

    async fn delete(&self, ctx: &ChangeContext) -> Result<(), HandlerError> {
        self.call("delete", ctx).await
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    config::env_value(key).unwrap_or(default)
}

/// A small graph import: one node per item, a couple of edits, one removal.
fn demo_changes(owner: &OwnerId, nodes: usize) -> Vec<Task> {
    let mut tasks = Vec::with_capacity(nodes + 2);
    for i in 0..nodes {
        tasks.push(Task::new(
            owner.clone(),
            TargetId::new(format!("node-{i}")),
            BoardChange::Create(CreateItem {
                item_type: ItemType::Shape,
                data: serde_json::json!({
                    "content": format!("Node {i}"),
                    "shape": "round_rectangle",
                    "position": { "x": (i % 5) * 200, "y": (i / 5) * 120 },
                }),
            }),
        ));
    }
    tasks.push(Task::new(
        owner.clone(),
        TargetId::new("node-0"),
        BoardChange::Update(UpdateItem {
            item_type: ItemType::Shape,
            data: serde_json::json!({ "style": { "fillColor": "#ffd02f" } }),
        }),
    ));
    tasks.push(Task::new(
        owner.clone(),
        TargetId::new("node-1"),
        BoardChange::Delete,
    ));
    tasks
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env は任意
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "changeq=info,changeq_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = QueueConfig::from_env();
    tracing::info!(?config, "queue configuration loaded");

    let board = Arc::new(SimulatedBoard::new(
        env_or("CHANGEQ_DEMO_FAILURES", 3),
        Duration::from_millis(env_or("CHANGEQ_DEMO_LATENCY_MS", 50)),
    ));
    let queue = ChangeQueue::builder()
        .handler(board)
        .config(config)
        .build()?;

    queue.start(None);

    let owner = OwnerId::new("demo-user");
    for task in demo_changes(&owner, env_or("CHANGEQ_DEMO_NODES", 12)) {
        queue.enqueue(task);
    }
    tracing::info!(queued = queue.size(), "demo changes enqueued");

    let timeout = Duration::from_millis(env_or("CHANGEQ_STOP_TIMEOUT_MS", 30_000));
    let report = tokio::select! {
        report = queue.stop(StopOptions::drain().with_timeout(timeout)) => report,
        _ = tokio::signal::ctrl_c() => {
            // shutdown は既に走っている。二回目の stop は同じ結果を待つだけ
            tracing::warn!("interrupted, waiting for the running shutdown");
            queue.stop(StopOptions::discard()).await
        }
    };

    tracing::info!(
        drained = report.drained,
        discarded = report.discarded,
        timed_out = report.timed_out,
        "shutdown complete"
    );
    Ok(())
}
