// src/utils/metrics.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// Per-pool task counters.
pub struct PoolMetrics {
    start_time: Instant,
    submitted: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
    timed_out: AtomicU64,
    busy_micros: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub panicked: u64,
    pub timed_out: u64,
    pub queued: usize,
    pub workers: usize,
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            busy_micros: AtomicU64::new(0),
        }
    }

    pub fn record_submit(&self) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_finish(&self, duration: Duration, outcome: TaskOutcome) {
        self.busy_micros
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
        let counter = match outcome {
            TaskOutcome::Completed => &self.completed,
            TaskOutcome::Panicked => &self.panicked,
            TaskOutcome::TimedOut => &self.timed_out,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self, queued: usize, workers: usize) -> PoolSnapshot {
        PoolSnapshot {
            submitted: self.submitted.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            panicked: self.panicked.load(Ordering::SeqCst),
            timed_out: self.timed_out.load(Ordering::SeqCst),
            queued,
            workers,
        }
    }

    /// Mean wall time of finished tasks.
    pub fn average_task_time(&self) -> Duration {
        let finished = self.completed.load(Ordering::SeqCst)
            + self.panicked.load(Ordering::SeqCst)
            + self.timed_out.load(Ordering::SeqCst);
        if finished == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.busy_micros.load(Ordering::SeqCst) / finished)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for PoolMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Panicked,
    TimedOut,
}

impl PoolSnapshot {
    pub fn finished(&self) -> u64 {
        self.completed + self.panicked + self.timed_out
    }
}
