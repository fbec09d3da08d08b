use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

/// Why the queue could not accept, hand out or settle a job.
#[derive(Error, Debug, Clone)]
pub enum QueueError {
    /// Unknown id, or an id another tenant owns
    #[error("Job {0} not found")]
    JobNotFound(String),

    /// The worker's lease was superseded or the job already settled
    #[error("Job {job_id} is no longer leased to this worker")]
    LeaseLost { job_id: String },

    #[error("No handler registered for job type {0}")]
    UnknownJobType(String),

    #[error("Job type {0} is registered twice")]
    DuplicateJobType(String),

    #[error("Job payload could not be encoded: {0}")]
    Payload(String),

    #[error("Worker stopped abnormally: {0}")]
    Worker(String),
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::Payload(err.to_string())
    }
}

/// How a job run ended when it did not succeed. Only `Retryable` failures
/// are leased again, and only while attempts remain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("{0} (retryable)")]
    Retryable(String),

    #[error("{0}")]
    Permanent(String),
}

impl JobError {
    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    /// The bare message, as stored on the job record
    pub fn message(&self) -> &str {
        match self {
            Self::Retryable(msg) | Self::Permanent(msg) => msg,
        }
    }
}
