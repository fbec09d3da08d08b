use serde::Serialize;
use tenant_core::naming::template_url;
use tenant_core::{TenantError, TenantId, TenantResult};
use tenant_queue::JobId;
use tracing::{info, instrument};

use super::{Saga, UpdateTenantRequest};
use crate::background::AdminBootstrapJob;
use crate::clients::UpdateOutcome;
use crate::steps::AdminCommand;

#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    /// `updating`, or `unchanged` when the stack had nothing to apply
    pub status: &'static str,
    pub tenant: String,
    pub version: String,
    pub admin_job: JobId,
}

impl Saga {
    /// Move a tenant to another version, optionally changing SMTP settings.
    ///
    /// The tenant's configuration is exported before the stack changes; the
    /// deploy task is dispatched and runs once the update settles.
    #[instrument(skip(self, request), fields(tenant_id = %tenant, version = %request.version))]
    pub async fn update(&self, tenant: &str, request: UpdateTenantRequest) -> TenantResult<UpdateReport> {
        let tenant = TenantId::parse(tenant)?;
        request.check()?;
        let _guard = self.locks.acquire(&tenant).await;

        self.require_version(&request.version).await?;
        if !self.steps.stack.exists(&tenant).await? {
            return Err(TenantError::TenantNotFound(tenant.to_string()));
        }
        let network = self.steps.stack.network(&self.config.base_stack).await?;

        self.steps.admin.export_config(&tenant, &network).await?;

        let mut overrides = request.smtp_overrides();
        overrides.insert("TENANT".to_string(), tenant.to_string());
        overrides.insert("VERSION".to_string(), request.version.clone());

        let outcome = self
            .steps
            .stack
            .update(
                &tenant,
                &template_url(&self.config.content_bucket, &request.version),
                &overrides,
            )
            .await?;

        let admin_job = self
            .dispatcher
            .dispatch(
                &tenant,
                AdminBootstrapJob {
                    tenant: tenant.clone(),
                    command: AdminCommand::Deploy,
                    expect_create: false,
                },
            )
            .await?;

        let status = match outcome {
            UpdateOutcome::Updating => "updating",
            UpdateOutcome::NoChanges => "unchanged",
        };
        info!(status, "tenant update dispatched");

        Ok(UpdateReport {
            status,
            tenant: tenant.to_string(),
            version: request.version,
            admin_job,
        })
    }
}
