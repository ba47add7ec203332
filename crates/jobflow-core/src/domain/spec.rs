//! Submission input.
//!
//! Every field is optional on the wire; defaults are applied once, in
//! [`JobSpec::resolve`], before anything is persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_JOB_TYPE: &str = "default";
pub const DEFAULT_PAYLOAD: &str = "{}";
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// What a client asks for when submitting a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    #[serde(default)]
    pub job_type: Option<String>,

    /// Opaque to the orchestrator.
    #[serde(default)]
    pub payload: Option<String>,

    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl JobSpec {
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            job_type: Some(job_type.into()),
            ..Self::default()
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Apply defaults. `default_max_retries` comes from configuration.
    pub fn resolve(self, default_max_retries: u32, created_at: DateTime<Utc>) -> NewJob {
        NewJob {
            job_type: self
                .job_type
                .unwrap_or_else(|| DEFAULT_JOB_TYPE.to_string()),
            payload: self.payload.unwrap_or_else(|| DEFAULT_PAYLOAD.to_string()),
            max_retries: self.max_retries.unwrap_or(default_max_retries),
            created_at,
        }
    }
}

/// A fully-defaulted job, ready to be created by the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub job_type: String,
    pub payload: String,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
}
