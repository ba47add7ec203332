//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 未指定の port はインメモリ実装で埋める（開発・テストがすぐ動く）

use std::sync::Arc;

use super::lifecycle::Lifecycle;
use super::reaper_loop::ReaperLoop;
use super::registry::{ExecutorRegistry, RegistryError};
use super::status::Stats;
use super::submission::Submitter;
use super::worker_loop::{WorkerGroup, WorkerLoop};
use crate::config::JobflowConfig;
use crate::domain::{Decider, DefaultDecider};
use crate::impls::{InMemoryJobStore, InMemoryQueueChannel};
use crate::ports::{Clock, Executor, JobStore, QueueChannel, SystemClock, UlidGenerator};

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new()
///     .config(config)
///     .register("sms", Arc::new(SmsExecutor))?
///     .expect_executors(&["sms", "email"])
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - expect_executors() で必須の job_type を宣言
/// - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
/// - 不足があれば BuildError を返す（未登録の型は fallback で静かに成功してしまうため）
pub struct AppBuilder {
    config: JobflowConfig,
    registry: ExecutorRegistry,
    store: Option<Arc<dyn JobStore>>,
    queue: Option<Arc<dyn QueueChannel>>,
    clock: Option<Arc<dyn Clock>>,
    decider: Option<Arc<dyn Decider>>,
    expected_executors: Option<Vec<String>>,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing executors: {0:?}. These job types were expected but not registered.")]
    MissingExecutors(Vec<String>),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl AppBuilder {
    /// Defaults: built-in simulated executors, in-memory store and queue,
    /// wall clock, [`DefaultDecider`].
    pub fn new() -> Self {
        Self {
            config: JobflowConfig::default(),
            registry: ExecutorRegistry::default(),
            store: None,
            queue: None,
            clock: None,
            decider: None,
            expected_executors: None,
        }
    }

    pub fn config(mut self, config: JobflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the whole registry (including its fallback).
    pub fn registry(mut self, registry: ExecutorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Executor を追加登録
    pub fn register(
        mut self,
        job_type: impl Into<String>,
        executor: Arc<dyn Executor>,
    ) -> Result<Self, RegistryError> {
        self.registry.register(job_type, executor)?;
        Ok(self)
    }

    pub fn store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn queue(mut self, queue: Arc<dyn QueueChannel>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    /// 必須の job_type のリストを設定
    pub fn expect_executors(mut self, job_types: &[&str]) -> Self {
        self.expected_executors = Some(job_types.iter().map(|t| t.to_string()).collect());
        self
    }

    /// AppBuilder を構築して App を生成
    ///
    /// # 検証
    /// - expect_executors() で設定された job_type が全て登録されているかチェック
    /// - 不足があれば BuildError::MissingExecutors を返す
    /// - lease_timeout が execution_timeout 以下なら BuildError::InvalidConfig
    ///   （reaper がまだ動いている試行を回収してしまうため）
    pub fn build(self) -> Result<App, BuildError> {
        if self.config.lease_timeout <= self.config.execution_timeout {
            return Err(BuildError::InvalidConfig(format!(
                "lease_timeout ({:?}) must be longer than execution_timeout ({:?})",
                self.config.lease_timeout, self.config.execution_timeout
            )));
        }

        if let Some(expected) = &self.expected_executors {
            let missing: Vec<String> = expected
                .iter()
                .filter(|t| !self.registry.is_registered(t))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingExecutors(missing));
            }
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = self.store.unwrap_or_else(|| {
            Arc::new(InMemoryJobStore::new(Arc::new(UlidGenerator::new(
                clock.clone(),
            ))))
        });
        let queue = self
            .queue
            .unwrap_or_else(|| Arc::new(InMemoryQueueChannel::new()));
        let decider = self.decider.unwrap_or_else(|| Arc::new(DefaultDecider));
        let config = Arc::new(self.config);

        tracing::debug!(
            executors = ?self.registry.registered_types(),
            queue = %config.queue_name,
            dlq = %config.dlq_name,
            "app built"
        );

        Ok(App {
            lifecycle: Arc::new(Lifecycle::new(store, queue, decider, clock, config.clone())),
            registry: Arc::new(self.registry),
            config,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// App はアプリケーションのランタイム
///
/// clone は安価（中身は Arc）なので、HTTP ハンドラと worker で共有できます。
#[derive(Clone)]
pub struct App {
    lifecycle: Arc<Lifecycle>,
    registry: Arc<ExecutorRegistry>,
    config: Arc<JobflowConfig>,
}

impl App {
    pub fn config(&self) -> &JobflowConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        self.lifecycle.store()
    }

    pub fn queue(&self) -> &Arc<dyn QueueChannel> {
        self.lifecycle.queue()
    }

    pub fn submitter(&self) -> Submitter {
        Submitter::new(
            self.lifecycle.store().clone(),
            self.lifecycle.queue().clone(),
            self.lifecycle.clock().clone(),
            self.config.clone(),
        )
    }

    pub fn stats(&self) -> Stats {
        Stats::new(
            self.lifecycle.store().clone(),
            self.lifecycle.queue().clone(),
            self.config.clone(),
        )
    }

    pub fn worker(&self, worker_id: usize) -> WorkerLoop {
        WorkerLoop::new(worker_id, self.lifecycle.clone(), self.registry.clone())
    }

    pub fn worker_group(&self, n: usize) -> WorkerGroup {
        WorkerGroup::spawn(n, self.lifecycle.clone(), self.registry.clone())
    }

    pub fn reaper(&self) -> ReaperLoop {
        ReaperLoop::new(self.lifecycle.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::CycleOutcome;
    use crate::domain::JobSpec;
    use crate::impls::{AlwaysFail, SimulatedDurations};
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    #[test]
    fn test_build_success() {
        let app = AppBuilder::new()
            .expect_executors(&["email", "report", "fail"])
            .build();
        assert!(app.is_ok());
    }

    #[test]
    fn test_build_missing_executors() {
        let app = AppBuilder::new()
            .register("sms", Arc::new(AlwaysFail))
            .unwrap()
            .expect_executors(&["sms", "fax"])
            .build();
        assert!(matches!(
            app,
            Err(BuildError::MissingExecutors(missing)) if missing == vec!["fax".to_string()]
        ));
    }

    #[test]
    fn test_build_rejects_lease_not_longer_than_execution_timeout() {
        for lease in [Duration::from_secs(10), Duration::from_secs(30)] {
            let app = AppBuilder::new()
                .config(JobflowConfig {
                    execution_timeout: Duration::from_secs(30),
                    lease_timeout: lease,
                    ..JobflowConfig::default()
                })
                .build();
            assert!(matches!(app, Err(BuildError::InvalidConfig(_))), "lease {lease:?}");
        }
    }

    #[tokio::test]
    async fn test_simulated_work_ignores_how_far_the_clock_is_from_wall_time() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let durations = SimulatedDurations {
            email: Duration::from_millis(10),
            ..SimulatedDurations::instant()
        };
        let app = AppBuilder::new()
            .config(JobflowConfig {
                pop_timeout: Duration::from_millis(10),
                ..JobflowConfig::default()
            })
            .registry(ExecutorRegistry::with_builtins(durations))
            .clock(clock)
            .build()
            .unwrap();

        let job = app.submitter().submit(JobSpec::new("email")).await.unwrap();
        assert_eq!(
            app.worker(0).run_cycle().await.unwrap(),
            CycleOutcome::Completed(job.id)
        );
    }

    #[test]
    fn test_register_duplicate() {
        let result = AppBuilder::new().register("email", Arc::new(AlwaysFail));
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(t)) if t == "email"));
    }

    #[tokio::test]
    async fn test_wired_components_share_state() {
        let config = JobflowConfig {
            pop_timeout: std::time::Duration::from_millis(10),
            ..JobflowConfig::default()
        };
        let app = AppBuilder::new()
            .config(config)
            .registry(ExecutorRegistry::with_builtins(
                crate::impls::SimulatedDurations::instant(),
            ))
            .build()
            .unwrap();

        let job = app.submitter().submit(JobSpec::new("email")).await.unwrap();
        assert_eq!(app.stats().snapshot().await.unwrap().queue_size, 1);

        let outcome = app.worker(0).run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Completed(job.id));

        let stats = app.stats().snapshot().await.unwrap();
        assert_eq!(stats.queue_size, 0);
        assert_eq!(stats.completed_jobs, 1);
    }
}
