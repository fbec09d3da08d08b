use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobId, JobMessage, LeaseToken};

/// Job status lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued and waiting for a worker
    Enqueued,

    /// Held by a worker
    Processing { started_at: DateTime<Utc> },

    /// Failed, waiting to be retried
    Retrying { retry_at: DateTime<Utc> },

    Completed { completed_at: DateTime<Utc> },

    /// Failed for good (attempts exhausted or permanent error)
    Failed { failed_at: DateTime<Utc>, error: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::Enqueued => true,
            Self::Retrying { retry_at } => *retry_at <= now,
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Enqueued => "enqueued",
            Self::Processing { .. } => "processing",
            Self::Retrying { .. } => "retrying",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Job record - mutable runtime state stored by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub tenant_id: String,
    pub message: JobMessage,
    pub status: JobStatus,

    /// Attempts started so far
    pub attempt: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_error: Option<String>,

    /// JSON result of the last successful execution
    pub result: Option<serde_json::Value>,

    #[serde(skip)]
    pub lease_token: Option<LeaseToken>,
}

impl JobRecord {
    pub fn new(job_id: JobId, tenant_id: String, message: JobMessage) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            tenant_id,
            message,
            status: JobStatus::Enqueued,
            attempt: 0,
            created_at: now,
            updated_at: now,
            last_error: None,
            result: None,
            lease_token: None,
        }
    }

    pub fn attempts_left(&self) -> bool {
        self.attempt < self.message.max_attempts
    }

    pub fn start_processing(&mut self, lease_token: LeaseToken) {
        let now = Utc::now();
        self.attempt += 1;
        self.status = JobStatus::Processing { started_at: now };
        self.lease_token = Some(lease_token);
        self.updated_at = now;
    }

    pub fn complete(&mut self, result: Option<serde_json::Value>) {
        let now = Utc::now();
        self.status = JobStatus::Completed { completed_at: now };
        self.result = result;
        self.lease_token = None;
        self.updated_at = now;
    }

    pub fn fail(&mut self, error: String) {
        let now = Utc::now();
        self.status = JobStatus::Failed {
            failed_at: now,
            error: error.clone(),
        };
        self.last_error = Some(error);
        self.lease_token = None;
        self.updated_at = now;
    }

    pub fn schedule_retry(&mut self, retry_at: DateTime<Utc>, error: String) {
        self.status = JobStatus::Retrying { retry_at };
        self.last_error = Some(error);
        self.lease_token = None;
        self.updated_at = Utc::now();
    }
}

/// A job that has been leased for processing
#[derive(Debug, Clone)]
pub struct LeasedJob {
    pub record: JobRecord,
    pub lease_token: LeaseToken,
}

impl LeasedJob {
    pub fn job_id(&self) -> &JobId {
        &self.record.job_id
    }

    pub fn message(&self) -> &JobMessage {
        &self.record.message
    }
}
