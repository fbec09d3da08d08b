pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_core::Stream;
use std::pin::Pin;

use crate::{JobEvent, JobId, JobMessage, JobRecord, JobStatus, LeaseToken, LeasedJob, QueueCtx, QueueResult};

/// Type alias for boxed streams
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send + 'static>>;

/// Storage primitives for dispatched jobs.
///
/// The backend doubles as the status store: every record stays queryable
/// after it settles, scoped to the tenant that enqueued it.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Enqueue a job with tenant-scoped idempotency
    async fn enqueue(&self, ctx: QueueCtx, message: JobMessage) -> QueueResult<JobId>;

    /// Lease the next eligible job from any tenant on the given queues
    async fn dequeue(&self, queues: &[&str]) -> QueueResult<Option<LeasedJob>>;

    async fn ack_complete(
        &self,
        ctx: QueueCtx,
        job_id: JobId,
        lease_token: LeaseToken,
        result: Option<serde_json::Value>,
    ) -> QueueResult<()>;

    /// Record a failure. `retry_at` is computed by the adapter; `None` fails the job for good.
    async fn ack_fail(
        &self,
        ctx: QueueCtx,
        job_id: JobId,
        lease_token: LeaseToken,
        error: String,
        retry_at: Option<DateTime<Utc>>,
    ) -> QueueResult<()>;

    async fn get_status(&self, ctx: QueueCtx, job_id: JobId) -> QueueResult<JobStatus>;

    async fn get_record(&self, ctx: QueueCtx, job_id: JobId) -> QueueResult<JobRecord>;

    /// All records of one tenant, oldest first
    async fn list_records(&self, ctx: QueueCtx) -> QueueResult<Vec<JobRecord>>;

    fn event_stream(&self) -> BoxStream<JobEvent>;
}
