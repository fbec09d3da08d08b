use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobPriority;

/// Job message - immutable submission data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    /// Job type identifier for dispatch
    pub job_type: String,

    /// JSON-encoded job payload
    pub payload: serde_json::Value,

    /// Target queue name
    pub queue: String,

    pub priority: JobPriority,

    /// Attempts allowed before the job fails for good
    pub max_attempts: u32,

    pub enqueued_at: DateTime<Utc>,

    /// Optional idempotency key (scoped by tenant/queue/job_type)
    pub idempotency_key: Option<String>,
}

impl JobMessage {
    pub fn new(job_type: impl Into<String>, payload: serde_json::Value, queue: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
            payload,
            queue: queue.into(),
            priority: JobPriority::default(),
            max_attempts: 3,
            enqueued_at: Utc::now(),
            idempotency_key: None,
        }
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}
