//! Engine - shared state behind every `ChangeQueue` handle.
//!
//! All mutable state (pending store, retry schedule, in-flight counter,
//! backpressure flag, lifecycle) sits behind one mutex. The lock is never
//! held across an `.await`; log entries are collected under the lock and
//! emitted after it is released.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use tokio::sync::{Notify, watch};
use tokio::time::Instant;

use super::lifecycle::{Lifecycle, StopOptions, StopReport};
use crate::config::{ConfigPatch, QueueConfig};
use crate::domain::Task;
use crate::error::HandlerError;
use crate::observability::{QueueCounts, events};
use crate::ports::{LogLevel, LogRecord, QueueLogger};
use crate::queue::{
    BackpressureMonitor, DepthTrigger, Jitter, QueueStore, RetryDecision, RetryPolicy, Transition,
};
use crate::runtime::Runtime;
use crate::worker::WorkerPool;

/// A failed task waiting for its backoff to elapse.
///
/// Reverse ordering so BinaryHeap acts as a min-heap (earliest first, then FIFO).
struct ScheduledRetry {
    ready_at: Instant,
    seq: u64,
    delay: Duration,
    task: Task,
}

impl PartialEq for ScheduledRetry {
    fn eq(&self, other: &Self) -> bool {
        self.ready_at == other.ready_at && self.seq == other.seq
    }
}

impl Eq for ScheduledRetry {}

impl PartialOrd for ScheduledRetry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledRetry {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.ready_at, other.seq).cmp(&(self.ready_at, self.seq))
    }
}

/// What a worker should do next.
enum Step {
    Run(Task),
    Wait,
    Exit,
}

struct QueueState {
    config: QueueConfig,
    store: QueueStore,
    scheduled: BinaryHeap<ScheduledRetry>,
    next_seq: u64,
    in_flight: usize,
    backpressure: BackpressureMonitor,
    lifecycle: Lifecycle,
    workers: Option<WorkerPool>,
}

impl QueueState {
    fn new(config: QueueConfig) -> Self {
        Self {
            config,
            store: QueueStore::new(),
            scheduled: BinaryHeap::new(),
            next_seq: 0,
            in_flight: 0,
            backpressure: BackpressureMonitor::new(),
            lifecycle: Lifecycle::new(),
            workers: None,
        }
    }

    fn sample_depth(&mut self, trigger: DepthTrigger, out: &mut Vec<LogRecord>) {
        let sample =
            self.backpressure
                .sample(self.store.len(), self.config.warn_threshold(), trigger);
        out.push(record(
            LogLevel::Info,
            json!({
                "event": events::QUEUE_DEPTH,
                "queued": sample.queued,
                "trigger": trigger,
            }),
            "queue depth",
        ));
        match sample.transition {
            Some(Transition::Warning { threshold }) => out.push(record(
                LogLevel::Warn,
                json!({
                    "event": events::QUEUE_BACKPRESSURE,
                    "queued": sample.queued,
                    "threshold": threshold,
                    "trigger": trigger,
                }),
                "queue depth reached backpressure threshold",
            )),
            Some(Transition::Recovered { threshold }) => out.push(record(
                LogLevel::Info,
                json!({
                    "event": events::QUEUE_BACKPRESSURE_RECOVERED,
                    "queued": sample.queued,
                    "threshold": threshold,
                    "trigger": trigger,
                }),
                "queue depth back below backpressure threshold",
            )),
            None => {}
        }
    }

    fn schedule_retry(&mut self, task: Task, delay: Duration) -> Instant {
        let seq = self.next_seq;
        self.next_seq += 1;
        let ready_at = Instant::now() + delay;
        self.scheduled.push(ScheduledRetry {
            ready_at,
            seq,
            delay,
            task,
        });
        ready_at
    }

    /// Move retries whose backoff has elapsed to the back of the store.
    fn promote_due(&mut self, now: Instant, out: &mut Vec<LogRecord>) -> usize {
        let mut promoted = 0;
        while self.scheduled.peek().is_some_and(|e| e.ready_at <= now) {
            let Some(entry) = self.scheduled.pop() else {
                break;
            };
            out.push(record(
                LogLevel::Warn,
                task_event(
                    events::TASK_RETRY,
                    &entry.task,
                    json!({ "delay_ms": duration_ms(entry.delay) }),
                ),
                "retrying failed task",
            ));
            self.store.push(entry.task);
            self.sample_depth(DepthTrigger::Enqueue, out);
            promoted += 1;
        }
        promoted
    }

    fn next_step(&mut self, out: &mut Vec<LogRecord>) -> Step {
        if !self.lifecycle.executes_pending() {
            return Step::Exit;
        }
        if let Some(task) = self.store.shift() {
            self.in_flight += 1;
            self.sample_depth(DepthTrigger::Dequeue, out);
            return Step::Run(task);
        }
        if self.lifecycle.is_draining() && self.scheduled.is_empty() && self.in_flight == 0 {
            return Step::Exit;
        }
        Step::Wait
    }

    fn is_idle(&self) -> bool {
        self.in_flight == 0 && self.store.is_empty() && self.scheduled.is_empty()
    }

    /// Drop pending tasks and scheduled retries.
    fn discard_pending(&mut self) -> usize {
        let n = self.store.clear() + self.scheduled.len();
        self.scheduled.clear();
        n
    }
}

pub(crate) struct Engine {
    state: Mutex<QueueState>,
    logger: RwLock<Arc<dyn QueueLogger>>,
    runtime: Runtime,
    jitter: Jitter,
    /// Wakes workers waiting for a task.
    work: Notify,
    /// Wakes drain waiters when in-flight work finishes.
    idle: Notify,
}

impl Engine {
    pub(crate) fn new(
        mut config: QueueConfig,
        logger: Arc<dyn QueueLogger>,
        runtime: Runtime,
        jitter: Jitter,
    ) -> Self {
        config.clamp();
        Self {
            state: Mutex::new(QueueState::new(config)),
            logger: RwLock::new(logger),
            runtime,
            jitter,
            work: Notify::new(),
            idle: Notify::new(),
        }
    }

    pub(crate) fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub(crate) fn set_logger(&self, logger: Arc<dyn QueueLogger>) {
        *self.logger.write() = logger;
    }

    fn emit(&self, records: Vec<LogRecord>) {
        if records.is_empty() {
            return;
        }
        let logger = Arc::clone(&*self.logger.read());
        for r in records {
            match r.level {
                LogLevel::Info => logger.info(r.payload, &r.message),
                LogLevel::Warn => logger.warn(r.payload, &r.message),
                LogLevel::Error => logger.error(r.payload, &r.message),
            }
        }
    }

    pub(crate) fn configure(&self, patch: &ConfigPatch) -> QueueConfig {
        let mut st = self.state.lock();
        st.config.apply(patch);
        st.config.clone()
    }

    pub(crate) fn config(&self) -> QueueConfig {
        self.state.lock().config.clone()
    }

    pub(crate) fn size(&self) -> usize {
        self.state.lock().store.len()
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    pub(crate) fn counts(&self) -> QueueCounts {
        let st = self.state.lock();
        QueueCounts {
            queued: st.store.len(),
            in_flight: st.in_flight,
            scheduled_retries: st.scheduled.len(),
            phase: st.lifecycle.phase(),
            backpressure: st.backpressure.is_warning(),
        }
    }

    pub(crate) fn enqueue(&self, task: Task) {
        let mut out = Vec::new();
        let accepted = {
            let mut st = self.state.lock();
            if st.lifecycle.is_accepting() {
                st.store.push(task);
                st.sample_depth(DepthTrigger::Enqueue, &mut out);
                true
            } else {
                out.push(record(
                    LogLevel::Warn,
                    task_event(
                        events::QUEUE_ENQUEUE_REJECTED,
                        &task,
                        json!({ "phase": st.lifecycle.phase() }),
                    ),
                    "enqueue rejected: queue is shutting down",
                ));
                false
            }
        };
        if accepted {
            self.work.notify_one();
        }
        self.emit(out);
    }

    pub(crate) fn start(self: &Arc<Self>, concurrency: Option<usize>) {
        let mut st = self.state.lock();
        if !st.lifecycle.is_accepting() {
            let phase = st.lifecycle.phase();
            drop(st);
            self.emit(vec![record(
                LogLevel::Warn,
                json!({ "event": events::QUEUE_START_REJECTED, "phase": phase }),
                "start rejected: queue is shutting down",
            )]);
            return;
        }
        if st.lifecycle.is_running() {
            return;
        }
        if let Some(c) = concurrency {
            st.config.apply(&ConfigPatch {
                concurrency: Some(c),
                ..ConfigPatch::default()
            });
        }
        st.lifecycle.set_running();
        let n = st.config.concurrency;
        drop(st);

        let pool = WorkerPool::spawn(n, Arc::clone(self));
        self.state.lock().workers = Some(pool);
        self.emit(vec![record(
            LogLevel::Info,
            json!({ "event": events::QUEUE_STARTED, "concurrency": n }),
            "queue started",
        )]);
    }

    /// Wait for the next task to run. `None` tells the worker to exit.
    pub(crate) async fn next_task(&self) -> Option<Task> {
        loop {
            let notified = self.work.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let mut out = Vec::new();
            let step = self.state.lock().next_step(&mut out);
            self.emit(out);

            match step {
                Step::Run(task) => return Some(task),
                Step::Exit => return None,
                // 新しい task / retry の promote / shutdown で起こされる
                Step::Wait => notified.await,
            }
        }
    }

    /// Backoff timer for one scheduled retry. Runs independently of the
    /// workers so the retry re-enters the store as soon as it is due.
    fn arm_retry_timer(self: &Arc<Self>, ready_at: Instant) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep_until(ready_at).await;
            engine.promote_ready();
        });
    }

    /// Push every due retry onto the store and wake one worker per task.
    fn promote_ready(&self) {
        let mut out = Vec::new();
        let promoted = {
            let mut st = self.state.lock();
            if st.lifecycle.executes_pending() {
                st.promote_due(Instant::now(), &mut out)
            } else {
                0
            }
        };
        self.emit(out);
        for _ in 0..promoted {
            self.work.notify_one();
        }
    }

    /// Record a successful execution.
    pub(crate) fn complete(&self, task: &Task) {
        // processed は in_flight を減らす前に出す (stop 解決前に必ず記録される)
        self.emit(vec![record(
            LogLevel::Info,
            task_event(events::TASK_PROCESSED, task, json!({})),
            "task processed",
        )]);
        let draining = {
            let mut st = self.state.lock();
            st.in_flight = st.in_flight.saturating_sub(1);
            !st.lifecycle.is_accepting()
        };
        self.idle.notify_waiters();
        if draining {
            self.work.notify_waiters();
        }
    }

    /// Record a failed execution and hand the task to the retry policy.
    pub(crate) fn fail(self: &Arc<Self>, task: Task, error: HandlerError) {
        let mut out = Vec::new();
        let mut retry_at = None;
        let draining = {
            let mut st = self.state.lock();
            st.in_flight = st.in_flight.saturating_sub(1);
            if st.lifecycle.executes_pending() {
                let policy = RetryPolicy::from_config(&st.config, self.jitter);
                match policy.decide(task.attempt()) {
                    RetryDecision::Retry {
                        delay,
                        next_attempt,
                    } => {
                        tracing::debug!(
                            task_id = %task.id(),
                            next_attempt,
                            delay_ms = duration_ms(delay),
                            error = %error,
                            "retry scheduled"
                        );
                        retry_at = Some(st.schedule_retry(task.next_attempt(), delay));
                    }
                    RetryDecision::GiveUp => out.push(record(
                        LogLevel::Error,
                        task_event(
                            events::TASK_FAILED,
                            &task,
                            json!({
                                "error": error.to_string(),
                                "max_retries": policy.max_retries,
                            }),
                        ),
                        "task dropped after exhausting retries",
                    )),
                }
            } else {
                out.push(record(
                    LogLevel::Warn,
                    task_event(
                        events::TASK_RETRY_DISCARDED,
                        &task,
                        json!({ "error": error.to_string() }),
                    ),
                    "failed task not retried: queue is shutting down",
                ));
            }
            !st.lifecycle.is_accepting()
        };
        self.emit(out);
        if let Some(ready_at) = retry_at {
            self.arm_retry_timer(ready_at);
        }
        self.idle.notify_waiters();
        if draining {
            self.work.notify_waiters();
        }
    }

    /// Stop admissions and resolve once the queue is done (see `StopOptions`).
    ///
    /// Only the first call starts a shutdown; later calls wait for the same report.
    pub(crate) async fn stop(self: &Arc<Self>, options: StopOptions) -> StopReport {
        let mut rx = {
            let mut st = self.state.lock();
            match st.lifecycle.shutdown() {
                Some(rx) => rx,
                None => {
                    let (tx, rx) = watch::channel(None);
                    st.lifecycle.begin_stop(options.drain, rx.clone());
                    // ワーカーがいなければ drain できないので捨てる
                    let discarded = if options.drain && st.lifecycle.is_running() {
                        0
                    } else {
                        st.discard_pending()
                    };
                    tokio::spawn(Arc::clone(self).shutdown(options, discarded, tx));
                    rx
                }
            }
        };
        self.work.notify_waiters();
        self.idle.notify_waiters();

        match rx.wait_for(Option::is_some).await {
            Ok(report) => (*report).clone().unwrap_or_default(),
            // shutdown task が報告前に消えた
            Err(_) => StopReport::default(),
        }
    }

    async fn shutdown(
        self: Arc<Self>,
        options: StopOptions,
        discarded: usize,
        tx: watch::Sender<Option<StopReport>>,
    ) {
        let finished = match options.timeout() {
            Some(timeout) => tokio::time::timeout(timeout, self.wait_idle())
                .await
                .is_ok(),
            None => {
                self.wait_idle().await;
                true
            }
        };

        let (leftover, in_flight, workers) = {
            let mut st = self.state.lock();
            st.lifecycle.finish_stop();
            let leftover = st.discard_pending();
            (leftover, st.in_flight, st.workers.take())
        };
        self.work.notify_waiters();

        if !finished {
            self.emit(vec![record(
                LogLevel::Warn,
                json!({
                    "event": events::QUEUE_STOP_TIMEOUT,
                    "timeout_ms": options.timeout_ms,
                    "discarded": leftover,
                    "in_flight": in_flight,
                }),
                "stop timed out: pending work discarded, in-flight calls left to finish",
            )]);
        } else if let Some(workers) = workers {
            workers.join().await;
        }

        let report = StopReport {
            drained: options.drain && finished && discarded == 0,
            discarded: discarded + leftover,
            timed_out: !finished,
        };
        self.emit(vec![record(
            LogLevel::Info,
            json!({
                "event": events::QUEUE_STOPPED,
                "drained": report.drained,
                "discarded": report.discarded,
                "timed_out": report.timed_out,
            }),
            "queue stopped",
        )]);
        // receiver が全部 drop 済みでも問題ない
        let _ = tx.send(Some(report));
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let idle = self.state.lock().is_idle();
            if idle {
                return;
            }
            notified.await;
        }
    }
}

fn record(level: LogLevel, payload: Value, message: &str) -> LogRecord {
    LogRecord {
        level,
        payload,
        message: message.to_string(),
    }
}

/// Task fields plus the event name and any extra fields.
fn task_event(event: &str, task: &Task, extra: Value) -> Value {
    let mut payload = task.log_fields();
    if let Value::Object(map) = &mut payload {
        map.insert("event".to_string(), Value::from(event));
        if let Value::Object(extra) = extra {
            map.extend(extra);
        }
    }
    payload
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
