//! Runtime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DEFAULT_MAX_RETRIES;

/// Where a retried job goes on the main queue.
///
/// This changes observable ordering:
/// - `Front`: the retry is popped before anything already queued
///   (most-recently-failed-first, favors recency over fairness).
/// - `Back`: the retry waits behind everything already queued (strict FIFO).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPlacement {
    #[default]
    Front,
    Back,
}

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct JobflowConfig {
    /// Name of the main queue.
    pub queue_name: String,
    /// Name of the dead-letter queue.
    pub dlq_name: String,
    /// `max_retries` for submissions that do not set one.
    pub default_max_retries: u32,
    /// Period between worker cycles.
    pub poll_interval: Duration,
    /// How long one cycle waits for an id to arrive.
    pub pop_timeout: Duration,
    /// Upper bound on a single executor call.
    pub execution_timeout: Duration,
    pub retry_placement: RetryPlacement,
    /// How long a job may stay Running before the reaper fails the attempt.
    /// Keep it well above `execution_timeout`.
    pub lease_timeout: Duration,
    /// Period between reaper sweeps.
    pub reaper_interval: Duration,
    /// Browser origins allowed to call the HTTP API. Empty disables CORS.
    pub cors_origins: Vec<String>,
}

impl Default for JobflowConfig {
    fn default() -> Self {
        Self {
            queue_name: "job:queue".to_string(),
            dlq_name: "job:dlq".to_string(),
            default_max_retries: DEFAULT_MAX_RETRIES,
            poll_interval: Duration::from_secs(2),
            pop_timeout: Duration::from_secs(1),
            execution_timeout: Duration::from_secs(30),
            retry_placement: RetryPlacement::Front,
            lease_timeout: Duration::from_secs(300), // 5 minutes
            reaper_interval: Duration::from_secs(30),
            cors_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}
