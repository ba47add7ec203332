//! Built-in executors.
//!
//! They simulate work with a sleep, so the whole pipeline can be exercised
//! without real side effects. The sleep never outlives the attempt deadline.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ExecutionError;
use crate::ports::{ExecutionContext, Executor};

pub const EMAIL: &str = "email";
pub const REPORT: &str = "report";
pub const DATA_PROCESSING: &str = "data-processing";
pub const FAIL: &str = "fail";

/// How long each simulated job type takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedDurations {
    pub email: Duration,
    pub report: Duration,
    pub data_processing: Duration,
    pub default: Duration,
}

impl SimulatedDurations {
    /// No sleeping at all (tests, demo).
    pub fn instant() -> Self {
        Self {
            email: Duration::ZERO,
            report: Duration::ZERO,
            data_processing: Duration::ZERO,
            default: Duration::ZERO,
        }
    }
}

impl Default for SimulatedDurations {
    fn default() -> Self {
        Self {
            email: Duration::from_secs(3),
            report: Duration::from_secs(5),
            data_processing: Duration::from_secs(4),
            default: Duration::from_secs(2),
        }
    }
}

/// Pretends to work for a fixed duration, then succeeds.
#[derive(Debug, Clone)]
pub struct SimulatedWork {
    label: &'static str,
    duration: Duration,
}

impl SimulatedWork {
    pub fn new(label: &'static str, duration: Duration) -> Self {
        Self { label, duration }
    }
}

#[async_trait]
impl Executor for SimulatedWork {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), ExecutionError> {
        if self.duration > ctx.time_budget {
            tokio::time::sleep(ctx.time_budget).await;
            return Err(ExecutionError::new(format!(
                "{} did not finish before its deadline",
                self.label
            )));
        }

        tracing::debug!(job_id = %ctx.job_id, attempt = ctx.attempt, work = self.label, "simulating work");
        tokio::time::sleep(self.duration).await;
        tracing::info!(job_id = %ctx.job_id, work = self.label, "simulated work finished");
        Ok(())
    }
}

/// Always fails. Handy for exercising the retry and dead-letter paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFail;

#[async_trait]
impl Executor for AlwaysFail {
    async fn execute(&self, _ctx: &ExecutionContext) -> Result<(), ExecutionError> {
        Err(ExecutionError::new("Simulated failure"))
    }
}
