// src/plugins/pool.rs
//! Auto-scaling task pool owned by a long-running plugin.
//!
//! Submission pushes onto a shared queue and returns at once. Workers are tokio
//! tasks spawned on demand: one whenever the pool has none, and another each
//! time the backlog reaches `scale_threshold` while fewer than `worker_count`
//! are alive. A worker drains the queue and retires when it finds it empty.
//! Every task runs under a panic guard, so a faulting task costs nothing but
//! itself.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::plugins::isolation::{catch_panic, PanicReport};
use crate::utils::metrics::{PoolMetrics, PoolSnapshot, TaskOutcome};

pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type PanicHandler = Arc<dyn Fn(&TaskContext, &PanicReport) + Send + Sync>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("no tokio runtime available to run pool workers")]
    NoRuntime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound on concurrently live workers.
    pub worker_count: usize,
    /// Backlog size at which an extra worker is started.
    pub scale_threshold: usize,
    /// Opt-in per-task deadline; `None` lets tasks run unbounded.
    pub task_timeout: Option<Duration>,
}

impl PoolConfig {
    pub fn new(worker_count: usize, scale_threshold: usize) -> Self {
        Self {
            worker_count,
            scale_threshold,
            task_timeout: None,
        }
    }

    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    fn validate(&self) -> Result<(), PoolError> {
        if self.worker_count == 0 {
            return Err(PoolError::InvalidConfig("worker_count must be greater than 0".into()));
        }
        if self.scale_threshold == 0 {
            return Err(PoolError::InvalidConfig("scale_threshold must be greater than 0".into()));
        }
        if self.task_timeout == Some(Duration::ZERO) {
            return Err(PoolError::InvalidConfig("task_timeout must be non-zero".into()));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(20, 100)
    }
}

/// Passed to the panic handler alongside the panic report.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Name of the owning plugin, which is also the pool name.
    pub plugin: Arc<str>,
    pub version: Arc<str>,
    pub task_id: u64,
    pub submitted_at: DateTime<Utc>,
}

struct Job {
    context: TaskContext,
    task: Task,
}

struct PoolState {
    jobs: VecDeque<Job>,
    workers: usize,
}

struct Shared {
    name: Arc<str>,
    version: Arc<str>,
    config: PoolConfig,
    state: Mutex<PoolState>,
    panic_handler: RwLock<PanicHandler>,
    metrics: PoolMetrics,
    next_id: AtomicU64,
    idle: Notify,
}

#[derive(Clone)]
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Creates the pool owned by plugin `name` at `version`.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        config: PoolConfig,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        let name: Arc<str> = Arc::from(name.into());
        let version: Arc<str> = Arc::from(version.into());

        debug!(
            plugin = %name,
            version = %version,
            worker_count = config.worker_count,
            scale_threshold = config.scale_threshold,
            "worker pool created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                name,
                version,
                config,
                state: Mutex::new(PoolState {
                    jobs: VecDeque::new(),
                    workers: 0,
                }),
                panic_handler: RwLock::new(Arc::new(log_panic) as PanicHandler),
                metrics: PoolMetrics::new(),
                next_id: AtomicU64::new(0),
                idle: Notify::new(),
            }),
        })
    }

    pub fn set_panic_handler<F>(&self, handler: F)
    where
        F: Fn(&TaskContext, &PanicReport) + Send + Sync + 'static,
    {
        *self.shared.panic_handler.write() = Arc::new(handler);
    }

    /// Queues `task` and returns its id without waiting for it to run.
    pub fn submit<F>(&self, task: F) -> Result<u64, PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;
        let shared = &self.shared;

        let task_id = shared.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let context = TaskContext {
            plugin: shared.name.clone(),
            version: shared.version.clone(),
            task_id,
            submitted_at: Utc::now(),
        };
        shared.metrics.record_submit();

        let spawn_worker = {
            let mut state = shared.state.lock();
            state.jobs.push_back(Job {
                context,
                task: Box::pin(task),
            });
            let backlogged = state.jobs.len() >= shared.config.scale_threshold
                && state.workers < shared.config.worker_count;
            let spawn = state.workers == 0 || backlogged;
            if spawn {
                state.workers += 1;
            }
            spawn
        };

        if spawn_worker {
            // The slot is claimed above; the guard hands it back even if the
            // runtime drops the worker before or while it runs.
            runtime.spawn(run_worker(WorkerSlot::new(shared.clone())));
        }

        Ok(task_id)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    pub fn workers(&self) -> usize {
        self.shared.state.lock().workers
    }

    pub fn queued(&self) -> usize {
        self.shared.state.lock().jobs.len()
    }

    pub fn metrics(&self) -> PoolSnapshot {
        let (queued, workers) = {
            let state = self.shared.state.lock();
            (state.jobs.len(), state.workers)
        };
        self.shared.metrics.snapshot(queued, workers)
    }

    pub fn average_task_time(&self) -> Duration {
        self.shared.metrics.average_task_time()
    }

    pub fn uptime(&self) -> Duration {
        self.shared.metrics.uptime()
    }

    /// Resolves once the queue is empty and every worker has retired.
    pub async fn wait_idle(&self) {
        loop {
            // Registered before the check so a retirement in between is not missed.
            let notified = self.shared.idle.notified();
            {
                let state = self.shared.state.lock();
                if state.jobs.is_empty() && state.workers == 0 {
                    return;
                }
            }
            notified.await;
        }
    }
}

/// One live worker's claim on `PoolState::workers`.
struct WorkerSlot {
    shared: Arc<Shared>,
    retired: bool,
}

impl WorkerSlot {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            retired: false,
        }
    }

    /// Next job, or `None` after retiring. Retirement happens under the same
    /// lock submit uses, so no job is stranded.
    fn next_job(&mut self) -> Option<Job> {
        let mut state = self.shared.state.lock();
        match state.jobs.pop_front() {
            Some(job) => Some(job),
            None => {
                release(&self.shared, &mut state);
                self.retired = true;
                None
            }
        }
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        if self.retired {
            return;
        }
        let queued = {
            let mut state = self.shared.state.lock();
            release(&self.shared, &mut state);
            state.jobs.len()
        };
        warn!(
            plugin = %self.shared.name,
            version = %self.shared.version,
            queued,
            "worker dropped before retiring, slot released"
        );
    }
}

fn release(shared: &Shared, state: &mut PoolState) {
    state.workers = state.workers.saturating_sub(1);
    if state.workers == 0 {
        shared.idle.notify_waiters();
    }
}

async fn run_worker(mut slot: WorkerSlot) {
    debug!(
        plugin = %slot.shared.name,
        version = %slot.shared.version,
        "worker started"
    );

    while let Some(job) = slot.next_job() {
        run_job(&slot.shared, job).await;
    }

    debug!(
        plugin = %slot.shared.name,
        version = %slot.shared.version,
        "worker retired"
    );
}

async fn run_job(shared: &Shared, job: Job) {
    let Job { context, task } = job;
    let started = Instant::now();

    let guarded = catch_panic(task);
    let result = match shared.config.task_timeout {
        Some(limit) => tokio::time::timeout(limit, guarded).await.map_err(|_| limit),
        None => Ok(guarded.await),
    };

    let outcome = match result {
        Ok(Ok(())) => TaskOutcome::Completed,
        Ok(Err(report)) => {
            let handler = shared.panic_handler.read().clone();
            if std::panic::catch_unwind(AssertUnwindSafe(|| handler(&context, &report))).is_err() {
                error!(
                    plugin = %context.plugin,
                    version = %context.version,
                    task_id = context.task_id,
                    "panic handler itself panicked"
                );
            }
            TaskOutcome::Panicked
        }
        Err(limit) => {
            warn!(
                plugin = %context.plugin,
                version = %context.version,
                task_id = context.task_id,
                timeout_ms = limit.as_millis() as u64,
                "task exceeded its deadline and was dropped"
            );
            TaskOutcome::TimedOut
        }
    };

    shared.metrics.record_finish(started.elapsed(), outcome);
}

fn log_panic(context: &TaskContext, report: &PanicReport) {
    error!(
        plugin = %context.plugin,
        version = %context.version,
        task_id = context.task_id,
        submitted_at = %context.submitted_at,
        panic_reason = %report.message,
        stack_trace = %report.backtrace,
        "task panic recovered"
    );
}
