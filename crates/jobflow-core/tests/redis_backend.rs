//! Processes sharing one Redis: submitted by one App, executed by another.
//!
//! Needs a running server:
//! `JOBFLOW_TEST_REDIS_URL=redis://localhost:6379 cargo test --features redis-backend -- --ignored`

#![cfg(feature = "redis-backend")]

use std::sync::Arc;
use std::time::Duration;

use jobflow_core::JobflowConfig;
use jobflow_core::app::{App, AppBuilder, CycleOutcome, ExecutorRegistry};
use jobflow_core::domain::{JobSpec, JobStatus};
use jobflow_core::impls::{RedisJobStore, RedisQueueChannel, SimulatedDurations};
use jobflow_core::ports::{SystemClock, UlidGenerator};

fn redis_url() -> String {
    std::env::var("JOBFLOW_TEST_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

/// One "process": its own connections, same keys as every other one.
async fn process(prefix: &str) -> App {
    let url = redis_url();
    let store = RedisJobStore::connect(
        &url,
        prefix,
        Arc::new(UlidGenerator::new(Arc::new(SystemClock))),
    )
    .await
    .unwrap();
    let queue = RedisQueueChannel::connect(&url).await.unwrap();

    AppBuilder::new()
        .config(JobflowConfig {
            queue_name: format!("{prefix}:queue"),
            dlq_name: format!("{prefix}:dlq"),
            pop_timeout: Duration::from_secs(1),
            ..JobflowConfig::default()
        })
        .registry(ExecutorRegistry::with_builtins(SimulatedDurations::instant()))
        .store(Arc::new(store))
        .queue(Arc::new(queue))
        .build()
        .unwrap()
}

#[tokio::test]
#[ignore = "needs a Redis server"]
async fn worker_process_runs_job_submitted_by_api_process() {
    let prefix = format!("jobflow-test-{}", ulid::Ulid::new());
    let api = process(&prefix).await;
    let worker = process(&prefix).await;

    let job = api.submitter().submit(JobSpec::new("email")).await.unwrap();
    assert_eq!(
        worker.worker(0).run_cycle().await.unwrap(),
        CycleOutcome::Completed(job.id)
    );

    let seen_by_api = api.submitter().get(job.id).await.unwrap().unwrap();
    assert_eq!(seen_by_api.status, JobStatus::Completed);
    assert_eq!(api.stats().snapshot().await.unwrap().completed_jobs, 1);
}

#[tokio::test]
#[ignore = "needs a Redis server"]
async fn dead_letters_are_visible_to_every_process() {
    let prefix = format!("jobflow-test-{}", ulid::Ulid::new());
    let api = process(&prefix).await;
    let worker = process(&prefix).await;

    let job = api
        .submitter()
        .submit(JobSpec::new("fail").with_max_retries(1))
        .await
        .unwrap();
    assert_eq!(
        worker.worker(0).run_cycle().await.unwrap(),
        CycleOutcome::DeadLettered { id: job.id, retry_count: 1 }
    );

    let stats = api.stats().snapshot().await.unwrap();
    assert_eq!(stats.failed_jobs, 1);
    assert_eq!(stats.dlq_size, 1);
    let failed = api.submitter().list_by_status(JobStatus::Failed).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, job.id);
}
