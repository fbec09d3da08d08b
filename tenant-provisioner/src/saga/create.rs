use serde::Serialize;
use tenant_core::{TenantError, TenantResult};
use tenant_queue::JobId;
use tracing::{info, instrument};

use super::{CreateTenantRequest, Saga};
use crate::background::{ProvisionDatabaseJob, ProvisionRecordStoreJob, ProvisionStackJob};

#[derive(Debug, Clone, Serialize)]
pub struct DispatchedJobs {
    pub provision_database: JobId,
    pub provision_record_store: JobId,
    pub provision_stack: JobId,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateOutcome {
    pub status: &'static str,
    pub message: String,
    pub tenant: String,
    pub jobs: DispatchedJobs,
}

impl Saga {
    /// Validate, check preconditions, register secrets, fan out.
    ///
    /// Returns once the three provisioning steps are dispatched; their
    /// progress is visible through the job records.
    #[instrument(skip(self, request), fields(tenant_id = %request.tenant))]
    pub async fn create(&self, request: CreateTenantRequest) -> TenantResult<CreateOutcome> {
        let new = request.into_new_tenant()?;
        let tenant = &new.tenant;
        let _guard = self.locks.acquire(tenant).await;

        self.require_version(&new.version).await?;
        if self.steps.stack.exists(tenant).await? {
            return Err(TenantError::TenantExists(tenant.to_string()));
        }
        self.require_base_stack().await?;

        let secrets = self
            .steps
            .credentials
            .provision_all(tenant, new.smtp_password.as_deref())
            .await?;

        let provision_database = self
            .dispatcher
            .dispatch(
                tenant,
                ProvisionDatabaseJob {
                    tenant: tenant.clone(),
                    brand: new.brand.clone(),
                    version: new.version.clone(),
                },
            )
            .await?;
        let provision_record_store = self
            .dispatcher
            .dispatch(
                tenant,
                ProvisionRecordStoreJob {
                    tenant: tenant.clone(),
                    email: new.email.clone(),
                },
            )
            .await?;
        let provision_stack = self
            .dispatcher
            .dispatch(
                tenant,
                ProvisionStackJob {
                    tenant: tenant.clone(),
                    version: new.version.clone(),
                    brand: new.brand.clone(),
                    email: new.email.clone(),
                    full_name: new.full_name.clone(),
                    smtp: new.smtp.clone(),
                    secrets,
                },
            )
            .await?;

        info!(version = %new.version, "tenant creation dispatched");
        Ok(CreateOutcome {
            status: "provisioning",
            message: format!("Tenant {tenant} is being created"),
            tenant: tenant.to_string(),
            jobs: DispatchedJobs {
                provision_database,
                provision_record_store,
                provision_stack,
            },
        })
    }
}
