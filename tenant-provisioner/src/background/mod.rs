//! Fire-and-forget dispatch of saga steps.
//!
//! Steps the coordinator does not wait for become typed jobs on the
//! `tenant-queue` adapter. Job records double as the step status store:
//! every dispatched step can be looked up by tenant and job id.

pub mod jobs;

use std::sync::Arc;

use futures::StreamExt;
use tenant_core::{TenantError, TenantId, TenantResult};
use tenant_queue::{
    Job, JobEvent, JobId, JobRecord, MemoryBackend, QueueAdapter, QueueBackend, QueueConfig, QueueCtx,
    QueueError, WorkerPool,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::SagaConfig;
use crate::steps::Steps;

pub use jobs::{AdminBootstrapJob, ProvisionDatabaseJob, ProvisionRecordStoreJob, ProvisionStackJob};

pub const SAGA_QUEUE: &str = "saga";

/// Admin tasks wait on stack readiness for as long as a stack takes to
/// settle, so they drain on their own workers.
pub const ADMIN_QUEUE: &str = "admin";

fn queue_for(job_type: &str) -> &'static str {
    if job_type == AdminBootstrapJob::JOB_TYPE {
        ADMIN_QUEUE
    } else {
        SAGA_QUEUE
    }
}

/// Shared state every job executes against.
#[derive(Clone)]
pub struct JobContext {
    pub steps: Arc<Steps>,
    pub config: Arc<SagaConfig>,
    pub dispatcher: Dispatcher,
}

fn queue_error(err: QueueError) -> TenantError {
    match err {
        QueueError::JobNotFound(id) => TenantError::JobNotFound(id),
        other => TenantError::Internal(anyhow::anyhow!("queue: {other}")),
    }
}

/// Both worker pools of a running dispatcher.
pub struct DispatchWorkers {
    saga: WorkerPool,
    admin: WorkerPool,
}

impl DispatchWorkers {
    /// Stop taking new steps and wait for the running ones to finish.
    pub async fn shutdown(self) -> TenantResult<()> {
        let (saga, admin) = tokio::join!(self.saga.shutdown(), self.admin.shutdown());
        saga.map_err(queue_error)?;
        admin.map_err(queue_error)
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    adapter: QueueAdapter<MemoryBackend>,
    admin_workers: usize,
}

impl Dispatcher {
    /// Build the adapter and register every saga job type. `config.max_workers`
    /// sizes the saga pool; admin tasks get `admin_workers` of their own.
    pub async fn new(config: QueueConfig, admin_workers: usize) -> TenantResult<Self> {
        let adapter = QueueAdapter::with_config(MemoryBackend::new(), config);
        adapter.register_job::<ProvisionDatabaseJob>().await.map_err(queue_error)?;
        adapter.register_job::<ProvisionRecordStoreJob>().await.map_err(queue_error)?;
        adapter.register_job::<ProvisionStackJob>().await.map_err(queue_error)?;
        adapter.register_job::<AdminBootstrapJob>().await.map_err(queue_error)?;
        Ok(Self {
            adapter,
            admin_workers,
        })
    }

    pub async fn dispatch<J: Job>(&self, tenant: &TenantId, job: J) -> TenantResult<JobId> {
        let job_id = self
            .adapter
            .enqueue(QueueCtx::new(tenant.as_str()), queue_for(J::JOB_TYPE), job)
            .await
            .map_err(queue_error)?;
        info!(tenant_id = %tenant, job_type = J::JOB_TYPE, job_id = %job_id, "step dispatched");
        Ok(job_id)
    }

    pub async fn job(&self, tenant: &TenantId, job_id: &str) -> TenantResult<JobRecord> {
        self.adapter
            .get_record(QueueCtx::new(tenant.as_str()), JobId::from(job_id))
            .await
            .map_err(queue_error)
    }

    pub async fn jobs(&self, tenant: &TenantId) -> TenantResult<Vec<JobRecord>> {
        self.adapter
            .list_records(QueueCtx::new(tenant.as_str()))
            .await
            .map_err(queue_error)
    }

    pub fn start(&self, context: JobContext) -> DispatchWorkers {
        let saga = self
            .adapter
            .start_workers(context.clone(), vec![SAGA_QUEUE.to_string()]);
        let admin = self.adapter.start_workers_for(
            context,
            vec![ADMIN_QUEUE.to_string()],
            self.admin_workers,
        );
        DispatchWorkers { saga, admin }
    }

    /// Mirror every job lifecycle event into the log.
    pub fn spawn_event_log(&self) -> JoinHandle<()> {
        let mut events = self.adapter.backend().event_stream();
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match &event {
                    JobEvent::Failed { error, .. } => warn!(
                        tenant_id = event.tenant_id(),
                        job_id = %event.job_id(),
                        error = %error,
                        "step failed"
                    ),
                    _ => info!(
                        tenant_id = event.tenant_id(),
                        job_id = %event.job_id(),
                        event = event.event_name(),
                        "step event"
                    ),
                }
            }
        })
    }
}
