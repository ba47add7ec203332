//! ExecutorRegistry - job_type から Executor への対応表
//!
//! # 設計
//! - 起動時に構築（mutable）
//! - 実行時は読み取りのみ（immutable、Arc で共有）
//!
//! ロック不要でシンプルに保つため、登録は worker 起動前に済ませます。

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::ExecutionError;
use crate::impls::executors::{self, AlwaysFail, SimulatedDurations, SimulatedWork};
use crate::ports::{ExecutionContext, Executor};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("executor for job type '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// Registry of executors (job_type -> executor) plus a fallback for
/// unregistered types.
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn Executor>>,
    fallback: Arc<dyn Executor>,
}

impl ExecutorRegistry {
    pub fn new(fallback: Arc<dyn Executor>) -> Self {
        Self {
            executors: HashMap::new(),
            fallback,
        }
    }

    /// The simulated executors: `email`, `report`, `data-processing`,
    /// `fail`, and a simulated default for everything else.
    pub fn with_builtins(durations: SimulatedDurations) -> Self {
        let mut registry = Self::new(Arc::new(SimulatedWork::new("default", durations.default)));
        let builtins: [(&str, Arc<dyn Executor>); 4] = [
            (executors::EMAIL, Arc::new(SimulatedWork::new("email", durations.email))),
            (executors::REPORT, Arc::new(SimulatedWork::new("report", durations.report))),
            (
                executors::DATA_PROCESSING,
                Arc::new(SimulatedWork::new("data-processing", durations.data_processing)),
            ),
            (executors::FAIL, Arc::new(AlwaysFail)),
        ];
        for (job_type, executor) in builtins {
            registry.executors.insert(job_type.to_string(), executor);
        }
        registry
    }

    /// Register an executor for a job type. Registering a type twice is an
    /// error rather than "last wins".
    pub fn register(
        &mut self,
        job_type: impl Into<String>,
        executor: Arc<dyn Executor>,
    ) -> Result<(), RegistryError> {
        let job_type = job_type.into();
        if self.executors.contains_key(&job_type) {
            return Err(RegistryError::AlreadyRegistered(job_type));
        }
        self.executors.insert(job_type, executor);
        Ok(())
    }

    pub fn get(&self, job_type: &str) -> Option<&Arc<dyn Executor>> {
        self.executors.get(job_type)
    }

    pub fn is_registered(&self, job_type: &str) -> bool {
        self.executors.contains_key(job_type)
    }

    /// Registered job types, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.executors.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }

    /// Run the executor for `ctx.job_type`, or the fallback.
    pub async fn dispatch(&self, ctx: &ExecutionContext) -> Result<(), ExecutionError> {
        let executor = match self.get(&ctx.job_type) {
            Some(executor) => executor,
            None => {
                tracing::debug!(job_id = %ctx.job_id, job_type = %ctx.job_type, "no executor registered, using fallback");
                &self.fallback
            }
        };
        executor.execute(ctx).await
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::with_builtins(SimulatedDurations::default())
    }
}
