use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobId;

/// Lifecycle events broadcast by a backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobEvent {
    Enqueued {
        job_id: JobId,
        tenant_id: String,
        queue: String,
        job_type: String,
        at: DateTime<Utc>,
    },

    Leased {
        job_id: JobId,
        tenant_id: String,
        attempt: u32,
        at: DateTime<Utc>,
    },

    Retrying {
        job_id: JobId,
        tenant_id: String,
        retry_at: DateTime<Utc>,
        error: String,
        at: DateTime<Utc>,
    },

    Completed {
        job_id: JobId,
        tenant_id: String,
        at: DateTime<Utc>,
    },

    Failed {
        job_id: JobId,
        tenant_id: String,
        error: String,
        at: DateTime<Utc>,
    },
}

impl JobEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Enqueued { .. } => "enqueued",
            Self::Leased { .. } => "leased",
            Self::Retrying { .. } => "retrying",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn job_id(&self) -> &JobId {
        match self {
            Self::Enqueued { job_id, .. }
            | Self::Leased { job_id, .. }
            | Self::Retrying { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. } => job_id,
        }
    }

    pub fn tenant_id(&self) -> &str {
        match self {
            Self::Enqueued { tenant_id, .. }
            | Self::Leased { tenant_id, .. }
            | Self::Retrying { tenant_id, .. }
            | Self::Completed { tenant_id, .. }
            | Self::Failed { tenant_id, .. } => tenant_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}
