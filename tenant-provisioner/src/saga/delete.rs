use serde::Serialize;
use tenant_core::naming::stack_name;
use tenant_core::{TenantError, TenantId, TenantResult};
use tracing::{info, instrument, warn};

use super::Saga;
use crate::steps::StepOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteStep {
    pub step: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Every cleanup action attempted by a delete, in order.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub status: &'static str,
    pub tenant: String,
    pub steps: Vec<DeleteStep>,
}

impl DeleteReport {
    fn new(tenant: &TenantId) -> Self {
        Self {
            status: "deleted",
            tenant: tenant.to_string(),
            steps: Vec::new(),
        }
    }

    fn record(&mut self, step: impl Into<String>, outcome: StepOutcome) {
        let step = step.into();
        if let StepOutcome::Failed(error) = &outcome {
            warn!(step = %step, error = %error, "cleanup step failed");
            self.status = "partial";
        }
        self.steps.push(DeleteStep { step, outcome });
    }

    fn record_all(&mut self, outcomes: Vec<(String, StepOutcome)>) {
        for (step, outcome) in outcomes {
            self.record(step, outcome);
        }
    }

    fn record_result(&mut self, step: &str, result: TenantResult<bool>) {
        let outcome = match result {
            Ok(true) => StepOutcome::Done,
            Ok(false) => StepOutcome::Skipped,
            Err(e) => StepOutcome::Failed(e.to_string()),
        };
        self.record(step, outcome);
    }

    pub fn is_complete(&self) -> bool {
        !self.steps.iter().any(|s| s.outcome.is_failed())
    }
}

impl Saga {
    /// Tear a tenant down, attempting every step regardless of earlier
    /// failures. Externally visible pieces go first.
    #[instrument(skip(self), fields(tenant_id = %tenant))]
    pub async fn delete(&self, tenant: &str) -> TenantResult<DeleteReport> {
        let tenant = TenantId::parse(tenant)?;
        let _guard = self.locks.acquire(&tenant).await;

        let stack = self
            .steps
            .stack
            .describe(&stack_name(&tenant))
            .await?
            .ok_or_else(|| TenantError::TenantNotFound(tenant.to_string()))?;

        let mut report = DeleteReport::new(&tenant);

        report.record_result("record_store", self.steps.record_store.remove(&tenant).await);
        report.record_all(self.steps.credentials.delete_all(&tenant).await);
        report.record_result("content", self.steps.content.remove(&tenant).await);

        let brand = stack.parameters.get("BRAND").cloned();
        report.record_result("stack", self.steps.stack.delete(&tenant).await.map(|()| true));
        report.record_all(self.steps.database.drop_tenant(&tenant, brand.as_deref()).await);

        info!(status = report.status, "tenant delete finished");
        Ok(report)
    }
}
