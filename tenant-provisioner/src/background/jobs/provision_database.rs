use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tenant_core::{SecretPurpose, TenantId};
use tenant_queue::prelude::*;

use super::{idempotency_key, step_failed};
use crate::background::JobContext;
use crate::steps::SchemaReport;

/// Create the tenant's database and user, then replay the version's schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionDatabaseJob {
    pub tenant: TenantId,
    pub brand: String,
    pub version: String,
}

#[async_trait]
impl Job for ProvisionDatabaseJob {
    type Context = JobContext;
    type Result = SchemaReport;

    const JOB_TYPE: &'static str = "provision_database";
    const MAX_ATTEMPTS: u32 = 1;

    async fn execute(&self, ctx: Self::Context) -> Result<Self::Result, JobError> {
        let steps = &ctx.steps;
        let db_password = steps
            .credentials
            .read(&self.tenant, SecretPurpose::DbPassword)
            .await
            .map_err(step_failed)?;

        steps
            .database
            .provision(&self.tenant, &self.brand, &db_password)
            .await
            .map_err(step_failed)?;

        steps
            .database
            .load_schema(&self.tenant, &self.brand, &self.version)
            .await
            .map_err(step_failed)
    }

    fn idempotency_key(&self) -> Option<String> {
        Some(idempotency_key(Self::JOB_TYPE, &self.tenant))
    }
}
