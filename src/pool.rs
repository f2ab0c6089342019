//! # Bounded worker pool
//!
//! Runs independent registration tasks with at most `size` in flight. Each
//! task is awaited in submission order for at most the per-task timeout,
//! and never past the pool's overall deadline. A task that misses its
//! timeout keeps running detached; its outcome is simply not waited for.

use anyhow::Context;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, Instrument};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureKind {
    TimedOut,
    Failed(String),
    Panicked(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskFailure {
    pub index: usize,
    #[serde(flatten)]
    pub kind: FailureKind,
}

/// Outcome of one pool run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolReport {
    pub submitted: usize,
    pub completed: usize,
    pub failures: Vec<TaskFailure>,
}

impl PoolReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn timed_out(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.kind == FailureKind::TimedOut)
            .count()
    }

    /// Indexes of failed tasks in submission order
    pub fn failed_indexes(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }
}

pub struct WorkerPool {
    size: usize,
    permits: Arc<Semaphore>,
    task_timeout: Duration,
    deadline: Duration,
    pending: Vec<(usize, JoinHandle<anyhow::Result<()>>)>,
}

impl WorkerPool {
    pub fn new(size: usize, task_timeout: Duration, deadline: Duration) -> Self {
        let size = size.max(1);
        Self {
            size,
            permits: Arc::new(Semaphore::new(size)),
            task_timeout,
            deadline,
            pending: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue `task`; it starts once a worker slot is free
    pub fn submit<F>(&mut self, index: usize, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let handle = tokio::spawn(
            async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .context("worker pool closed")?;
                task.await
            }
            .in_current_span(),
        );
        self.pending.push((index, handle));
    }

    /// Wait for every submitted task and release the pool
    pub async fn join(self) -> PoolReport {
        let deadline = Instant::now() + self.deadline;
        let mut report = PoolReport {
            submitted: self.pending.len(),
            ..PoolReport::default()
        };

        for (index, mut handle) in self.pending {
            let wait_until = (Instant::now() + self.task_timeout).min(deadline);
            let kind = match timeout_at(wait_until, &mut handle).await {
                Ok(Ok(Ok(()))) => {
                    report.completed += 1;
                    continue;
                }
                Ok(Ok(Err(e))) => {
                    error!(index, error = ?e, "registration task failed");
                    FailureKind::Failed(format!("{e:#}"))
                }
                Ok(Err(join_err)) => {
                    error!(index, error = ?join_err, "registration task panicked");
                    FailureKind::Panicked(join_err.to_string())
                }
                Err(_) => {
                    error!(index, timeout = ?self.task_timeout, "registration task timed out");
                    FailureKind::TimedOut
                }
            };
            report.failures.push(TaskFailure { index, kind });
        }

        debug!(
            pool_size = self.size,
            submitted = report.submitted,
            completed = report.completed,
            failed = report.failures.len(),
            "worker pool drained"
        );
        report
    }
}
