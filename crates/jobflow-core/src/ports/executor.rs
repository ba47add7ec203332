//! Executor port - job_type ごとの実処理
//!
//! Executor は job の payload を解釈する唯一の場所です。orchestrator は中身を見ません。
//! リトライで同じ payload が何度も渡されるので、副作用は冪等に寄せてください。

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ExecutionError, JobId, JobRecord};

/// What an executor gets to see for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub job_id: JobId,
    pub job_type: String,
    pub payload: String,

    /// 1-based attempt number.
    pub attempt: u32,

    /// When the attempt is abandoned, on the orchestrator's clock. Good for
    /// logs and for handing on to downstream systems.
    pub deadline: DateTime<Utc>,

    /// How long the attempt may run, measured from the start of `execute`.
    /// Long-running executors should bound their work by this rather than
    /// compare `deadline` with the wall clock, which may disagree with the
    /// orchestrator's clock.
    pub time_budget: Duration,
}

impl ExecutionContext {
    pub fn for_job(job: &JobRecord, deadline: DateTime<Utc>, time_budget: Duration) -> Self {
        Self {
            job_id: job.id,
            job_type: job.job_type.clone(),
            payload: job.payload.clone(),
            attempt: job.attempt(),
            deadline,
            time_budget,
        }
    }
}

#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), ExecutionError>;
}
