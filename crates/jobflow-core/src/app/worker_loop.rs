//! WorkerLoop - ジョブ実行ループ
//!
//! # フロー（1 サイクル）
//! 1. QueueChannel::blocking_pop() で JobId 取得（待ち時間は有限）
//! 2. JobStore::get() でレコード取得
//! 3. QUEUED → RUNNING を保存
//! 4. ExecutorRegistry で実行（execution_timeout で打ち切り）
//! 5. Lifecycle::settle() で結果を反映（完了 / リトライ / DLQ）
//!
//! サイクルは一定間隔で起動し、同じ worker の中では重ならない。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::lifecycle::{CycleOutcome, Lifecycle};
use super::reaper_loop::ReaperLoop;
use super::registry::ExecutorRegistry;
use crate::domain::{ExecutionError, JobStatus, Outcome};
use crate::error::JobflowError;
use crate::ports::ExecutionContext;

pub struct WorkerLoop {
    worker_id: usize,
    lifecycle: Arc<Lifecycle>,
    registry: Arc<ExecutorRegistry>,
}

impl WorkerLoop {
    pub fn new(worker_id: usize, lifecycle: Arc<Lifecycle>, registry: Arc<ExecutorRegistry>) -> Self {
        Self {
            worker_id,
            lifecycle,
            registry,
        }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Pop at most one job and run one attempt of it.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, JobflowError> {
        let config = self.lifecycle.config();

        let Some(id) = self
            .lifecycle
            .queue()
            .blocking_pop(&config.queue_name, config.pop_timeout)
            .await?
        else {
            return Ok(CycleOutcome::Idle);
        };

        let Some(mut job) = self.lifecycle.store().get(id).await? else {
            tracing::warn!(worker = self.worker_id, job_id = %id, "popped job has no record, dropping");
            return Ok(CycleOutcome::MissingRecord(id));
        };

        if job.status != JobStatus::Queued {
            tracing::warn!(
                worker = self.worker_id,
                job_id = %id,
                status = %job.status,
                "popped job is not queued, skipping"
            );
            return Ok(CycleOutcome::Skipped {
                id,
                status: job.status,
            });
        }

        self.lifecycle.begin(&mut job).await?;

        let timeout = config.execution_timeout;
        let ctx = ExecutionContext::for_job(&job, deadline_after(job.started_at, timeout), timeout);
        let result = match tokio::time::timeout(timeout, self.registry.dispatch(&ctx)).await {
            Ok(result) => result,
            Err(_) => Err(ExecutionError::new(format!(
                "execution timed out after {timeout:?}"
            ))),
        };

        self.lifecycle.settle(job, Outcome::from(result)).await
    }

    /// Run cycles on `poll_interval` until `shutdown` flips to `true`.
    ///
    /// An in-flight cycle is always allowed to finish. Errors are logged and
    /// the next tick tries again.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.lifecycle.config().poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(worker = self.worker_id, "worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    // sender が drop された場合も停止
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            match self.run_cycle().await {
                Ok(CycleOutcome::Idle) => {}
                Ok(outcome) => {
                    tracing::debug!(worker = self.worker_id, ?outcome, "cycle finished");
                }
                Err(e) => {
                    tracing::error!(worker = self.worker_id, error = %e, "cycle aborted");
                }
            }
        }

        tracing::info!(worker = self.worker_id, "worker stopped");
    }
}

fn deadline_after(started_at: Option<DateTime<Utc>>, timeout: Duration) -> DateTime<Utc> {
    let start = started_at.unwrap_or_else(Utc::now);
    TimeDelta::from_std(timeout)
        .ok()
        .and_then(|delta| start.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Worker group handle.
/// - `request_shutdown()` で全ワーカーが次のサイクルを取らなくなる
/// - `shutdown_and_join()` で実行中のサイクルの終了を待てる
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers competing for the same main queue.
    pub fn spawn(n: usize, lifecycle: Arc<Lifecycle>, registry: Arc<ExecutorRegistry>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let worker = WorkerLoop::new(worker_id, Arc::clone(&lifecycle), Arc::clone(&registry));
            joins.push(tokio::spawn(worker.run(shutdown_rx.clone())));
        }

        Self { shutdown_tx, joins }
    }

    /// Run a reaper alongside the workers, stopped by the same signal.
    pub fn with_reaper(mut self, reaper: ReaperLoop) -> Self {
        let rx = self.shutdown_tx.subscribe();
        self.joins.push(tokio::spawn(reaper.run(rx)));
        self
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Ask every task to stop after its in-flight cycle.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all tasks.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                tracing::error!(error = %e, "worker task panicked");
            }
        }
    }
}
