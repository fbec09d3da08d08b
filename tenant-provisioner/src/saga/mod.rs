//! The saga coordinator.
//!
//! CREATE, UPDATE and DELETE check their preconditions synchronously, then
//! either hand work to the dispatcher (create, update) or run a best-effort
//! cleanup in-line (delete). Nothing is rolled back automatically.

mod create;
mod delete;
pub mod request;
mod status;
mod update;

use std::sync::Arc;

use dashmap::DashMap;
use tenant_core::naming::version_prefix;
use tenant_core::{TenantError, TenantId, TenantResult};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::background::{Dispatcher, JobContext};
use crate::clients::{Collaborators, ObjectStore};
use crate::config::SagaConfig;
use crate::steps::Steps;

pub use create::{CreateOutcome, DispatchedJobs};
pub use delete::{DeleteReport, DeleteStep};
pub use request::{CreateTenantRequest, NewTenant, UpdateTenantRequest};
pub use status::{TenantStatus, TenantSummary};
pub use update::UpdateReport;

/// One async mutex per tenant id, created on first use.
#[derive(Default)]
pub struct TenantLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TenantLocks {
    pub async fn acquire(&self, tenant: &TenantId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(tenant.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

pub struct Saga {
    config: Arc<SagaConfig>,
    steps: Arc<Steps>,
    objects: Arc<dyn ObjectStore>,
    dispatcher: Dispatcher,
    locks: TenantLocks,
}

impl Saga {
    pub fn new(config: Arc<SagaConfig>, collaborators: &Collaborators, dispatcher: Dispatcher) -> Self {
        let steps = Arc::new(Steps::new(collaborators, &config));
        Self {
            config,
            steps,
            objects: collaborators.objects.clone(),
            dispatcher,
            locks: TenantLocks::default(),
        }
    }

    /// What the worker pool runs jobs against.
    pub fn job_context(&self) -> JobContext {
        JobContext {
            steps: self.steps.clone(),
            config: self.config.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    async fn require_version(&self, version: &str) -> TenantResult<()> {
        let known = self
            .objects
            .has_prefix(&version_prefix(version))
            .await
            .map_err(|e| TenantError::provision("versions", e))?;
        if known {
            Ok(())
        } else {
            Err(TenantError::UnknownVersion(version.to_string()))
        }
    }

    async fn require_base_stack(&self) -> TenantResult<()> {
        match self.steps.stack.describe(&self.config.base_stack).await? {
            Some(_) => Ok(()),
            None => Err(TenantError::BaseStackMissing(self.config.base_stack.clone())),
        }
    }
}
