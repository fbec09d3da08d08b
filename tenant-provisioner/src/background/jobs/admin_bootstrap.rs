use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tenant_core::naming::stack_name;
use tenant_core::{SecretPurpose, TenantId};
use tenant_queue::prelude::*;

use super::{idempotency_key, step_failed};
use crate::background::JobContext;
use crate::steps::AdminCommand;

/// Wait for the tenant stack to settle, then start the one-shot admin task.
/// The task itself is not awaited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminBootstrapJob {
    pub tenant: TenantId,
    pub command: AdminCommand,
    /// Wait for creation rather than update
    pub expect_create: bool,
}

#[async_trait]
impl Job for AdminBootstrapJob {
    type Context = JobContext;
    /// ARN of the started task
    type Result = String;

    const JOB_TYPE: &'static str = "admin_bootstrap";
    const MAX_ATTEMPTS: u32 = 1;

    async fn execute(&self, ctx: Self::Context) -> Result<Self::Result, JobError> {
        let steps = &ctx.steps;

        steps
            .stack
            .await_ready(&stack_name(&self.tenant), self.expect_create)
            .await
            .map_err(step_failed)?;

        let network = steps
            .stack
            .network(&ctx.config.base_stack)
            .await
            .map_err(step_failed)?;

        let cron_key = match self.command {
            AdminCommand::Initialize { .. } => Some(
                steps
                    .credentials
                    .read(&self.tenant, SecretPurpose::CronKey)
                    .await
                    .map_err(step_failed)?,
            ),
            _ => None,
        };

        steps
            .admin
            .run(&self.tenant, &network, &self.command, cron_key.as_deref())
            .await
            .map_err(step_failed)
    }

    /// Initialize and deploy for one tenant are separate steps and must not
    /// collapse into each other.
    fn idempotency_key(&self) -> Option<String> {
        let step = format!("{}:{}", Self::JOB_TYPE, self.command.name());
        Some(idempotency_key(&step, &self.tenant))
    }
}
