use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::backend::{BoxStream, QueueBackend};
use crate::{
    JobEvent, JobId, JobMessage, JobPriority, JobRecord, JobStatus, LeaseToken, LeasedJob, QueueCtx,
    QueueError, QueueResult,
};

type IdempotencyMap = HashMap<(String, String, String, String), JobId>;

/// How long settled records stay readable by default.
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

/// In-memory backend. Settled records are dropped once they are older than
/// the retention window; live ones are kept for as long as they run.
pub struct MemoryBackend {
    jobs: Arc<RwLock<HashMap<JobId, JobRecord>>>,

    /// queue name -> job ids, priority ordered
    queues: Arc<RwLock<HashMap<String, VecDeque<JobId>>>>,

    /// (tenant_id, queue, job_type, key) -> job_id
    idempotency: Arc<RwLock<IdempotencyMap>>,

    retention: Duration,

    event_broadcaster: broadcast::Sender<JobEvent>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_retention(Duration::hours(DEFAULT_RETENTION_HOURS))
    }

    pub fn with_retention(retention: Duration) -> Self {
        let (event_broadcaster, _) = broadcast::channel(1000);

        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            queues: Arc::new(RwLock::new(HashMap::new())),
            idempotency: Arc::new(RwLock::new(HashMap::new())),
            retention,
            event_broadcaster,
        }
    }

    fn emit(&self, event: JobEvent) {
        let _ = self.event_broadcaster.send(event);
    }

    /// Drop settled records past the retention window along with their
    /// idempotency entries. Returns how many went.
    pub fn prune_settled(&self) -> usize {
        let mut idempotency = self.idempotency.write();
        let mut jobs = self.jobs.write();
        prune(&mut jobs, &mut idempotency, Utc::now() - self.retention)
    }

    /// Look up a record the caller's tenant owns. Foreign ids look missing.
    fn with_owned_record<T>(
        &self,
        ctx: &QueueCtx,
        job_id: &JobId,
        f: impl FnOnce(&mut JobRecord) -> QueueResult<T>,
    ) -> QueueResult<T> {
        let mut jobs = self.jobs.write();
        let record = jobs
            .get_mut(job_id)
            .filter(|r| r.tenant_id == ctx.tenant_id)
            .ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;
        f(record)
    }

    fn check_lease(record: &JobRecord, lease_token: &LeaseToken) -> QueueResult<()> {
        if record.status.is_terminal() || record.lease_token.as_ref() != Some(lease_token) {
            return Err(QueueError::LeaseLost {
                job_id: record.job_id.to_string(),
            });
        }
        Ok(())
    }

    fn requeue(&self, job_id: JobId, message: &JobMessage) {
        let jobs = self.jobs.read();
        let mut queues = self.queues.write();
        let queue = queues.entry(message.queue.clone()).or_default();
        insert_ordered(queue, &jobs, job_id, message.priority);
    }
}

/// Higher priority first, FIFO within a priority.
fn insert_ordered(
    queue: &mut VecDeque<JobId>,
    jobs: &HashMap<JobId, JobRecord>,
    job_id: JobId,
    priority: JobPriority,
) {
    let insert_pos = queue
        .iter()
        .position(|existing| {
            jobs.get(existing)
                .map(|r| priority > r.message.priority)
                .unwrap_or(true)
        })
        .unwrap_or(queue.len());

    queue.insert(insert_pos, job_id);
}

fn prune(
    jobs: &mut HashMap<JobId, JobRecord>,
    idempotency: &mut IdempotencyMap,
    settled_before: DateTime<Utc>,
) -> usize {
    let before = jobs.len();
    jobs.retain(|_, r| !(r.status.is_terminal() && r.updated_at < settled_before));
    idempotency.retain(|_, id| jobs.contains_key(id));
    before - jobs.len()
}

#[async_trait]
impl QueueBackend for MemoryBackend {
    async fn enqueue(&self, ctx: QueueCtx, message: JobMessage) -> QueueResult<JobId> {
        let scope = message.idempotency_key.as_ref().map(|key| {
            (
                ctx.tenant_id.clone(),
                message.queue.clone(),
                message.job_type.clone(),
                key.clone(),
            )
        });

        // Check and insert under the same locks so racing duplicates collapse.
        let job_id = {
            let mut idempotency = self.idempotency.write();
            let mut jobs = self.jobs.write();
            prune(&mut jobs, &mut idempotency, Utc::now() - self.retention);

            let live = scope
                .as_ref()
                .and_then(|scope| idempotency.get(scope))
                .filter(|existing| {
                    jobs.get(*existing)
                        .map(|r| !r.status.is_terminal())
                        .unwrap_or(false)
                })
                .cloned();
            if let Some(existing) = live {
                return Ok(existing);
            }

            let job_id = JobId::generate();
            jobs.insert(
                job_id.clone(),
                JobRecord::new(job_id.clone(), ctx.tenant_id.clone(), message.clone()),
            );
            {
                let mut queues = self.queues.write();
                let queue = queues.entry(message.queue.clone()).or_default();
                insert_ordered(queue, &jobs, job_id.clone(), message.priority);
            }
            if let Some(scope) = scope {
                idempotency.insert(scope, job_id.clone());
            }
            job_id
        };

        self.emit(JobEvent::Enqueued {
            job_id: job_id.clone(),
            tenant_id: ctx.tenant_id,
            queue: message.queue,
            job_type: message.job_type,
            at: Utc::now(),
        });

        Ok(job_id)
    }

    async fn dequeue(&self, queues: &[&str]) -> QueueResult<Option<LeasedJob>> {
        let now = Utc::now();
        let mut jobs = self.jobs.write();
        let mut queues_lock = self.queues.write();

        for queue_name in queues {
            let Some(queue) = queues_lock.get_mut(*queue_name) else {
                continue;
            };

            // Settled ids linger only until the next scan.
            queue.retain(|id| jobs.get(id).map(|r| !r.status.is_terminal()).unwrap_or(false));

            let position = queue
                .iter()
                .position(|id| jobs.get(id).map(|r| r.status.is_eligible(now)).unwrap_or(false));

            let Some(index) = position else {
                continue;
            };
            let Some(job_id) = queue.remove(index) else {
                continue;
            };
            let Some(record) = jobs.get_mut(&job_id) else {
                continue;
            };

            let lease_token = LeaseToken::issue();
            record.start_processing(lease_token.clone());

            self.emit(JobEvent::Leased {
                job_id: job_id.clone(),
                tenant_id: record.tenant_id.clone(),
                attempt: record.attempt,
                at: now,
            });

            return Ok(Some(LeasedJob {
                record: record.clone(),
                lease_token,
            }));
        }

        Ok(None)
    }

    async fn ack_complete(
        &self,
        ctx: QueueCtx,
        job_id: JobId,
        lease_token: LeaseToken,
        result: Option<serde_json::Value>,
    ) -> QueueResult<()> {
        self.with_owned_record(&ctx, &job_id, |record| {
            Self::check_lease(record, &lease_token)?;
            record.complete(result);
            Ok(())
        })?;

        self.emit(JobEvent::Completed {
            job_id,
            tenant_id: ctx.tenant_id,
            at: Utc::now(),
        });
        Ok(())
    }

    async fn ack_fail(
        &self,
        ctx: QueueCtx,
        job_id: JobId,
        lease_token: LeaseToken,
        error: String,
        retry_at: Option<DateTime<Utc>>,
    ) -> QueueResult<()> {
        let now = Utc::now();
        let retry = self.with_owned_record(&ctx, &job_id, |record| {
            Self::check_lease(record, &lease_token)?;
            match retry_at {
                Some(at) if record.attempts_left() => {
                    record.schedule_retry(at, error.clone());
                    Ok(Some((at, record.message.clone())))
                }
                _ => {
                    record.fail(error.clone());
                    Ok(None)
                }
            }
        })?;

        match retry {
            Some((at, message)) => {
                self.requeue(job_id.clone(), &message);
                self.emit(JobEvent::Retrying {
                    job_id,
                    tenant_id: ctx.tenant_id,
                    retry_at: at,
                    error,
                    at: now,
                });
            }
            None => self.emit(JobEvent::Failed {
                job_id,
                tenant_id: ctx.tenant_id,
                error,
                at: now,
            }),
        }

        Ok(())
    }

    async fn get_status(&self, ctx: QueueCtx, job_id: JobId) -> QueueResult<JobStatus> {
        self.get_record(ctx, job_id).await.map(|r| r.status)
    }

    async fn get_record(&self, ctx: QueueCtx, job_id: JobId) -> QueueResult<JobRecord> {
        let jobs = self.jobs.read();
        jobs.get(&job_id)
            .filter(|r| r.tenant_id == ctx.tenant_id)
            .cloned()
            .ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))
    }

    async fn list_records(&self, ctx: QueueCtx) -> QueueResult<Vec<JobRecord>> {
        let jobs = self.jobs.read();
        let mut records: Vec<JobRecord> = jobs
            .values()
            .filter(|r| r.tenant_id == ctx.tenant_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    fn event_stream(&self) -> BoxStream<JobEvent> {
        use tokio_stream::{wrappers::BroadcastStream, StreamExt};

        let receiver = self.event_broadcaster.subscribe();
        Box::pin(BroadcastStream::new(receiver).filter_map(|result| result.ok()))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> JobMessage {
        JobMessage::new("provision", serde_json::json!({"tenant": "acme"}), "saga")
    }

    #[tokio::test]
    async fn dequeue_spans_tenants() {
        let backend = MemoryBackend::new();
        let a = backend.enqueue(QueueCtx::new("acme"), message()).await.unwrap();
        let b = backend.enqueue(QueueCtx::new("globex"), message()).await.unwrap();

        let first = backend.dequeue(&["saga"]).await.unwrap().unwrap();
        let second = backend.dequeue(&["saga"]).await.unwrap().unwrap();
        assert_eq!(first.record.job_id, a);
        assert_eq!(second.record.job_id, b);
        assert_eq!(second.record.tenant_id, "globex");
        assert!(backend.dequeue(&["saga"]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn higher_priority_jumps_the_line() {
        let backend = MemoryBackend::new();
        let ctx = QueueCtx::new("acme");
        backend.enqueue(ctx.clone(), message()).await.unwrap();
        let urgent = backend
            .enqueue(ctx, message().with_priority(JobPriority::High))
            .await
            .unwrap();

        let leased = backend.dequeue(&["saga"]).await.unwrap().unwrap();
        assert_eq!(leased.record.job_id, urgent);
    }

    #[tokio::test]
    async fn idempotent_while_live_then_new_after_settle() {
        let backend = MemoryBackend::new();
        let ctx = QueueCtx::new("acme");
        let keyed = message().with_idempotency_key("provision:acme");

        let first = backend.enqueue(ctx.clone(), keyed.clone()).await.unwrap();
        let again = backend.enqueue(ctx.clone(), keyed.clone()).await.unwrap();
        assert_eq!(first, again);

        let leased = backend.dequeue(&["saga"]).await.unwrap().unwrap();
        backend
            .ack_complete(ctx.clone(), first.clone(), leased.lease_token, None)
            .await
            .unwrap();

        let fresh = backend.enqueue(ctx, keyed).await.unwrap();
        assert_ne!(first, fresh);
    }

    #[tokio::test]
    async fn other_tenants_cannot_see_or_settle() {
        let backend = MemoryBackend::new();
        let owner = QueueCtx::new("acme");
        let job_id = backend.enqueue(owner.clone(), message()).await.unwrap();
        let leased = backend.dequeue(&["saga"]).await.unwrap().unwrap();

        let intruder = QueueCtx::new("globex");
        assert!(matches!(
            backend.get_status(intruder.clone(), job_id.clone()).await,
            Err(QueueError::JobNotFound(_))
        ));
        assert!(backend
            .ack_complete(intruder, job_id.clone(), leased.lease_token.clone(), None)
            .await
            .is_err());

        backend
            .ack_complete(owner.clone(), job_id.clone(), leased.lease_token, None)
            .await
            .unwrap();
        assert!(backend.get_status(owner, job_id).await.unwrap().is_terminal());
    }

    #[tokio::test]
    async fn stale_lease_is_rejected() {
        let backend = MemoryBackend::new();
        let ctx = QueueCtx::new("acme");
        let job_id = backend.enqueue(ctx.clone(), message()).await.unwrap();
        backend.dequeue(&["saga"]).await.unwrap().unwrap();

        let result = backend
            .ack_complete(ctx, job_id, LeaseToken::issue(), None)
            .await;
        assert!(matches!(result, Err(QueueError::LeaseLost { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_duplicates_collapse_to_one_job() {
        let backend = Arc::new(MemoryBackend::new());
        let keyed = message().with_idempotency_key("provision_stack:acme");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let backend = backend.clone();
                let keyed = keyed.clone();
                tokio::spawn(async move { backend.enqueue(QueueCtx::new("acme"), keyed).await.unwrap() })
            })
            .collect();
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }

        ids.dedup();
        assert_eq!(ids.len(), 1, "{ids:?}");
        assert_eq!(backend.list_records(QueueCtx::new("acme")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn settled_records_expire_live_ones_stay() {
        let backend = MemoryBackend::with_retention(Duration::zero());
        let ctx = QueueCtx::new("acme");
        let settled = backend
            .enqueue(ctx.clone(), message().with_idempotency_key("provision:acme"))
            .await
            .unwrap();
        let leased = backend.dequeue(&["saga"]).await.unwrap().unwrap();
        backend
            .ack_complete(ctx.clone(), settled.clone(), leased.lease_token, None)
            .await
            .unwrap();
        let live = backend.enqueue(ctx.clone(), message()).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        backend.prune_settled();

        assert!(matches!(
            backend.get_record(ctx.clone(), settled).await,
            Err(QueueError::JobNotFound(_))
        ));
        assert!(backend.get_record(ctx.clone(), live).await.is_ok());
        assert!(backend.idempotency.read().is_empty());
    }
}
