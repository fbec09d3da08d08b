use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tenant_core::{SecretPurpose, TenantId};
use tenant_queue::prelude::*;

use super::{idempotency_key, step_failed};
use crate::background::JobContext;
use crate::steps::RecordStoreOutcome;

/// Record-store user, endpoint and access key for the tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRecordStoreJob {
    pub tenant: TenantId,
    pub email: String,
}

#[async_trait]
impl Job for ProvisionRecordStoreJob {
    type Context = JobContext;
    type Result = RecordStoreOutcome;

    const JOB_TYPE: &'static str = "provision_record_store";
    const MAX_ATTEMPTS: u32 = 1;

    async fn execute(&self, ctx: Self::Context) -> Result<Self::Result, JobError> {
        let credentials = &ctx.steps.credentials;
        let user_password = credentials
            .read(&self.tenant, SecretPurpose::UserPassword)
            .await
            .map_err(step_failed)?;
        let key_password = credentials
            .read(&self.tenant, SecretPurpose::LrsKeyPassword)
            .await
            .map_err(step_failed)?;

        ctx.steps
            .record_store
            .provision(&self.tenant, &self.email, &user_password, &key_password)
            .await
            .map_err(step_failed)
    }

    fn idempotency_key(&self) -> Option<String> {
        Some(idempotency_key(Self::JOB_TYPE, &self.tenant))
    }
}
