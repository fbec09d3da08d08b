pub mod registry;

pub use registry::{JobHandler, JobRegistry};

use crate::{JobError, JobPriority};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// A unit of work that can be dispatched to the worker pool.
///
/// The payload is the job value itself, serialized as JSON; the context is
/// whatever shared state the worker pool was started with.
#[async_trait]
pub trait Job: Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Context type passed to job execution
    type Context: Send + Sync + Clone + 'static;

    /// Result type returned by job execution
    type Result: Send + Sync + Serialize + 'static;

    /// Job type identifier for dispatch
    const JOB_TYPE: &'static str;

    const PRIORITY: JobPriority = JobPriority::Normal;

    /// Attempts before the job fails for good
    const MAX_ATTEMPTS: u32 = 3;

    async fn execute(&self, ctx: Self::Context) -> Result<Self::Result, JobError>;

    fn job_type(&self) -> &'static str {
        Self::JOB_TYPE
    }

    fn priority(&self) -> JobPriority {
        Self::PRIORITY
    }

    fn max_attempts(&self) -> u32 {
        Self::MAX_ATTEMPTS
    }

    /// Jobs sharing a key within a tenant collapse while one is live
    fn idempotency_key(&self) -> Option<String> {
        None
    }
}
