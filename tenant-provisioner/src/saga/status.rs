use serde::Serialize;
use tenant_core::naming::stack_name;
use tenant_core::{TenantError, TenantId, TenantResult};
use tenant_queue::JobRecord;

use super::Saga;
use crate::clients::StackDescription;
use crate::steps::stack::TENANT_TAG;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantStatus {
    pub name: String,
    pub status: String,
    pub version: Option<String>,
}

impl From<StackDescription> for TenantStatus {
    fn from(stack: StackDescription) -> Self {
        Self {
            version: stack.parameters.get("VERSION").cloned(),
            name: stack.name,
            status: stack.status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantSummary {
    pub tenants: Vec<TenantStatus>,
}

impl Saga {
    pub async fn tenant(&self, tenant: &str) -> TenantResult<TenantStatus> {
        let tenant = TenantId::parse(tenant)?;
        self.steps
            .stack
            .describe(&stack_name(&tenant))
            .await?
            .map(TenantStatus::from)
            .ok_or_else(|| TenantError::TenantNotFound(tenant.to_string()))
    }

    /// Stacks tagged as tenants; the base stack never counts.
    pub async fn tenants(&self) -> TenantResult<TenantSummary> {
        let tenants = self
            .steps
            .stack
            .list()
            .await?
            .into_iter()
            .filter(|s| s.tags.contains_key(TENANT_TAG) && s.name != self.config.base_stack)
            .map(TenantStatus::from)
            .collect();
        Ok(TenantSummary { tenants })
    }

    pub async fn versions(&self) -> TenantResult<Vec<String>> {
        self.objects
            .list_prefixes()
            .await
            .map_err(|e| TenantError::provision("versions", e))
    }

    pub async fn job(&self, tenant: &str, job_id: &str) -> TenantResult<JobRecord> {
        let tenant = TenantId::parse(tenant)?;
        self.dispatcher.job(&tenant, job_id).await
    }

    pub async fn jobs(&self, tenant: &str) -> TenantResult<Vec<JobRecord>> {
        let tenant = TenantId::parse(tenant)?;
        self.dispatcher.jobs(&tenant).await
    }
}
