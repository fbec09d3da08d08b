use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tenant_core::naming::{record_store_host, routing_address, template_url};
use tenant_core::TenantId;
use tenant_queue::prelude::*;
use tracing::info;

use super::{idempotency_key, step_failed, AdminBootstrapJob};
use crate::background::JobContext;
use crate::steps::{AdminCommand, SmtpSettings, StackSettings, TenantSecrets};

/// Content, routing priority and the tenant stack, then the admin
/// bootstrap once the stack is on its way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionStackJob {
    pub tenant: TenantId,
    pub version: String,
    pub brand: String,
    pub email: String,
    pub full_name: String,
    pub smtp: SmtpSettings,
    /// Names and ARNs only
    pub secrets: TenantSecrets,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackProvisioned {
    pub priority: u32,
    pub admin_job: JobId,
}

#[async_trait]
impl Job for ProvisionStackJob {
    type Context = JobContext;
    type Result = StackProvisioned;

    const JOB_TYPE: &'static str = "provision_stack";
    const PRIORITY: JobPriority = JobPriority::High;
    const MAX_ATTEMPTS: u32 = 1;

    async fn execute(&self, ctx: Self::Context) -> Result<Self::Result, JobError> {
        let steps = &ctx.steps;
        let config = &ctx.config;

        steps
            .content
            .bootstrap(&self.tenant, &self.version)
            .await
            .map_err(step_failed)?;

        // Fails early when the base network is gone, before a priority is burnt.
        steps.stack.network(&config.base_stack).await.map_err(step_failed)?;
        let listener = steps
            .stack
            .listener_arn(&config.base_stack, &config.listener_logical_id)
            .await
            .map_err(step_failed)?;
        let priority = steps
            .allocator
            .next_priority(&listener)
            .await
            .map_err(step_failed)?;

        let settings = StackSettings {
            tenant: self.tenant.to_string(),
            version: self.version.clone(),
            db_password_arn: self.secrets.db_password.arn.clone(),
            smtp_password_arn: self.secrets.smtp_password.arn.clone(),
            priority,
            lrs_host: record_store_host(&config.lrs_base_url, &self.tenant),
            lrs_password_arn: self.secrets.lrs_key_password.arn.clone(),
            smtp_username: self.smtp.username.clone(),
            smtp_host: self.smtp.host.clone(),
            smtp_from: self.smtp.from.clone(),
            smtp_protocol: self.smtp.protocol.clone(),
            smtp_port: self.smtp.port,
            base_stack: config.base_stack.clone(),
            sns_topic: config.sns_topic.clone(),
            project: config.project.clone(),
            brand: self.brand.clone(),
            address: routing_address(&self.tenant, &config.tenant_domain),
            firebase_key: config.firebase_key.clone(),
            firebase_id: config.firebase_id.clone(),
        };
        steps
            .stack
            .create(
                &self.tenant,
                &template_url(&config.content_bucket, &self.version),
                settings.parameters(),
            )
            .await
            .map_err(step_failed)?;

        let admin_job = ctx
            .dispatcher
            .dispatch(
                &self.tenant,
                AdminBootstrapJob {
                    tenant: self.tenant.clone(),
                    command: AdminCommand::Initialize {
                        email: self.email.clone(),
                        full_name: self.full_name.clone(),
                    },
                    expect_create: true,
                },
            )
            .await
            .map_err(step_failed)?;

        info!(tenant_id = %self.tenant, priority, "tenant stack requested");
        Ok(StackProvisioned { priority, admin_job })
    }

    fn idempotency_key(&self) -> Option<String> {
        Some(idempotency_key(Self::JOB_TYPE, &self.tenant))
    }
}
