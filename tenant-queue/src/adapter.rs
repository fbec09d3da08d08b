use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::backend::QueueBackend;
use crate::job::JobRegistry;
use crate::{Job, JobId, JobMessage, JobRecord, QueueCtx, QueueError, QueueResult};

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Number of workers started by `start_workers`
    pub max_workers: usize,
    /// Sleep between polls of an empty queue
    pub poll_interval: Duration,
    pub max_retry_backoff: Duration,
    pub base_retry_backoff: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            poll_interval: Duration::from_millis(100),
            max_retry_backoff: Duration::from_secs(3600),
            base_retry_backoff: Duration::from_secs(1),
        }
    }
}

/// Handle on a running worker pool
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Stop leasing new jobs and wait for every worker to exit. A job that is
    /// already executing runs to completion and is acked first.
    pub async fn shutdown(self) -> QueueResult<()> {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            handle
                .await
                .map_err(|e| QueueError::Worker(e.to_string()))?;
        }
        Ok(())
    }
}

/// Dispatch front-end: typed enqueue on one side, a worker pool on the other.
pub struct QueueAdapter<B: QueueBackend> {
    backend: Arc<B>,
    job_registry: Arc<RwLock<JobRegistry>>,
    config: QueueConfig,
}

impl<B: QueueBackend + 'static> QueueAdapter<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, QueueConfig::default())
    }

    pub fn with_config(backend: B, config: QueueConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            job_registry: Arc::new(RwLock::new(JobRegistry::new())),
            config,
        }
    }

    pub async fn register_job<J: Job>(&self) -> QueueResult<()> {
        let mut registry = self.job_registry.write().await;
        registry.register::<J>()?;
        info!("Registered job type: {}", J::JOB_TYPE);
        Ok(())
    }

    #[instrument(skip(self, ctx, job), fields(job_type = J::JOB_TYPE, tenant_id = %ctx.tenant_id))]
    pub async fn enqueue<J: Job>(&self, ctx: QueueCtx, queue: &str, job: J) -> QueueResult<JobId> {
        if !self.job_registry.read().await.is_registered(J::JOB_TYPE) {
            return Err(QueueError::UnknownJobType(J::JOB_TYPE.to_string()));
        }

        let message = encode_job(&job, queue)?;
        let job_id = self.backend.enqueue(ctx, message).await?;

        info!("Enqueued job {} of type {}", job_id, J::JOB_TYPE);
        Ok(job_id)
    }

    /// Spawn `max_workers` workers sharing one context
    pub fn start_workers<C>(&self, context: C, queues: Vec<String>) -> WorkerPool
    where
        C: Clone + Send + Sync + 'static,
    {
        self.start_workers_for(context, queues, self.config.max_workers)
    }

    /// Spawn a pool of `workers` workers (at least one) over `queues`
    pub fn start_workers_for<C>(&self, context: C, queues: Vec<String>, workers: usize) -> WorkerPool
    where
        C: Clone + Send + Sync + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let context: Arc<dyn Any + Send + Sync> = Arc::new(context);
        let backend: Arc<dyn QueueBackend> = self.backend.clone();

        let handles = (0..workers.max(1))
            .map(|index| {
                let worker = Worker {
                    index,
                    backend: backend.clone(),
                    job_registry: self.job_registry.clone(),
                    config: self.config.clone(),
                    context: context.clone(),
                    queues: queues.clone(),
                    shutdown_rx: shutdown_rx.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect::<Vec<_>>();

        info!("Started {} workers for queues {:?}", handles.len(), queues);

        WorkerPool {
            shutdown_tx,
            handles,
        }
    }

    pub async fn get_record(&self, ctx: QueueCtx, job_id: JobId) -> QueueResult<JobRecord> {
        self.backend.get_record(ctx, job_id).await
    }

    pub async fn list_records(&self, ctx: QueueCtx) -> QueueResult<Vec<JobRecord>> {
        self.backend.list_records(ctx).await
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }
}

impl<B: QueueBackend> Clone for QueueAdapter<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            job_registry: self.job_registry.clone(),
            config: self.config.clone(),
        }
    }
}

fn encode_job<J: Job>(job: &J, queue: &str) -> QueueResult<JobMessage> {
    let payload = serde_json::to_value(job)?;
    let mut message = JobMessage::new(J::JOB_TYPE, payload, queue)
        .with_priority(job.priority())
        .with_max_attempts(job.max_attempts());
    if let Some(key) = job.idempotency_key() {
        message = message.with_idempotency_key(key);
    }
    Ok(message)
}

struct Worker {
    index: usize,
    backend: Arc<dyn QueueBackend>,
    job_registry: Arc<RwLock<JobRegistry>>,
    config: QueueConfig,
    context: Arc<dyn Any + Send + Sync>,
    queues: Vec<String>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Worker {
    async fn run(self) {
        let mut shutdown_rx = self.shutdown_rx.clone();
        let queue_refs: Vec<&str> = self.queues.iter().map(|s| s.as_str()).collect();

        debug!("Worker {} started", self.index);

        loop {
            if *shutdown_rx.borrow() {
                debug!("Worker {} shutdown requested", self.index);
                break;
            }

            // Shutdown is only observed between jobs; a leased job is never dropped.
            let idle = match self.process_next_job(&queue_refs).await {
                Ok(true) => continue,
                Ok(false) => self.config.poll_interval,
                Err(e) => {
                    error!("Error processing job: {}", e);
                    Duration::from_secs(1)
                }
            };

            let pool_dropped = tokio::select! {
                changed = shutdown_rx.changed() => changed.is_err(),
                _ = tokio::time::sleep(idle) => false,
            };
            if pool_dropped {
                break;
            }
        }

        debug!("Worker {} stopped", self.index);
    }

    async fn process_next_job(&self, queues: &[&str]) -> QueueResult<bool> {
        let leased = match self.backend.dequeue(queues).await? {
            Some(job) => job,
            None => return Ok(false),
        };

        let job_id = leased.record.job_id.clone();
        let job_type = leased.record.message.job_type.clone();
        let ctx = QueueCtx::new(leased.record.tenant_id.clone());

        debug!(tenant_id = %ctx.tenant_id, "Processing job {} of type {}", job_id, job_type);

        let result = {
            let registry = self.job_registry.read().await;
            registry
                .execute_job(&leased.record.message, self.context.clone())
                .await
        };

        match result {
            Ok(value) => {
                self.backend
                    .ack_complete(ctx.clone(), job_id.clone(), leased.lease_token, value)
                    .await?;
                info!(tenant_id = %ctx.tenant_id, "Job {} ({}) completed", job_id, job_type);
            }
            Err(job_error) => {
                let retry_at = if job_error.is_retryable() && leased.record.attempts_left() {
                    Some(self.retry_time(leased.record.attempt))
                } else {
                    None
                };

                self.backend
                    .ack_fail(
                        ctx.clone(),
                        job_id.clone(),
                        leased.lease_token,
                        job_error.message().to_string(),
                        retry_at,
                    )
                    .await?;

                if retry_at.is_some() {
                    warn!(tenant_id = %ctx.tenant_id, "Job {} ({}) failed, will retry: {}", job_id, job_type, job_error);
                } else {
                    error!(tenant_id = %ctx.tenant_id, "Job {} ({}) failed: {}", job_id, job_type, job_error);
                }
            }
        }

        Ok(true)
    }

    /// Exponential backoff capped at `max_retry_backoff`
    fn retry_time(&self, attempt: u32) -> chrono::DateTime<chrono::Utc> {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        let backoff = std::cmp::min(
            self.config.base_retry_backoff.as_millis() as u64 * factor,
            self.config.max_retry_backoff.as_millis() as u64,
        );

        chrono::Utc::now() + chrono::Duration::milliseconds(backoff as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::JobError;
    use async_trait::async_trait;

    #[derive(Clone)]
    struct Greeting(String);

    #[derive(serde::Serialize, serde::Deserialize)]
    struct GreetJob {
        name: String,
    }

    #[async_trait]
    impl Job for GreetJob {
        type Context = Greeting;
        type Result = String;

        const JOB_TYPE: &'static str = "greet";

        async fn execute(&self, ctx: Self::Context) -> Result<Self::Result, JobError> {
            Ok(format!("{} {}", ctx.0, self.name))
        }
    }

    #[tokio::test]
    async fn enqueue_requires_registration() {
        let adapter = QueueAdapter::new(MemoryBackend::new());
        let err = adapter
            .enqueue(QueueCtx::new("acme"), "saga", GreetJob { name: "x".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::UnknownJobType(_)));
    }

    #[tokio::test]
    async fn pool_size_follows_config() {
        let config = QueueConfig {
            max_workers: 3,
            ..QueueConfig::default()
        };
        let adapter = QueueAdapter::with_config(MemoryBackend::new(), config);
        let pool = adapter.start_workers(Greeting("hi".into()), vec!["saga".into()]);
        assert_eq!(pool.size(), 3);
        pool.shutdown().await.unwrap();
    }

    #[test]
    fn encodes_job_settings() {
        let message = encode_job(&GreetJob { name: "acme".into() }, "saga").unwrap();
        assert_eq!(message.job_type, "greet");
        assert_eq!(message.queue, "saga");
        assert_eq!(message.max_attempts, 3);
        assert_eq!(message.payload["name"], "acme");
        assert!(message.idempotency_key.is_none());
    }
}
