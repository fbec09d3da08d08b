use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tenant_core::naming::{admin_container, admin_task_definition, admin_username};
use tenant_core::{TenantError, TenantId, TenantResult};
use tokio::time::Instant;
use tracing::{info, instrument};

use super::stack::NetworkOutputs;
use crate::clients::{TaskRequest, TaskRunner, TaskState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AdminCommand {
    /// First boot of a freshly created tenant
    Initialize { email: String, full_name: String },
    Deploy,
    ExportConfig,
}

impl AdminCommand {
    pub fn name(&self) -> &'static str {
        match self {
            AdminCommand::Initialize { .. } => "initialize",
            AdminCommand::Deploy => "deploy",
            AdminCommand::ExportConfig => "export_config",
        }
    }
}

fn task_error(e: impl ToString) -> TenantError {
    TenantError::provision("admin_task", e)
}

pub struct AdminBootstrapper {
    tasks: Arc<dyn TaskRunner>,
    platform_version: String,
    init_script: String,
    poll_interval: Duration,
    export_timeout: Duration,
}

impl AdminBootstrapper {
    pub fn new(
        tasks: Arc<dyn TaskRunner>,
        platform_version: String,
        init_script: String,
        poll_interval: Duration,
        export_timeout: Duration,
    ) -> Self {
        Self {
            tasks,
            platform_version,
            init_script,
            poll_interval,
            export_timeout,
        }
    }

    /// Container command override. The cron key is only needed to initialize.
    pub fn command_for(&self, tenant: &TenantId, command: &AdminCommand, cron_key: Option<&str>) -> Vec<String> {
        match command {
            AdminCommand::Initialize { email, full_name } => vec![
                "sh".into(),
                self.init_script.clone(),
                "-u".into(),
                admin_username(tenant),
                "-e".into(),
                email.clone(),
                "-n".into(),
                full_name.clone(),
                "-c".into(),
                cron_key.unwrap_or_default().to_string(),
            ],
            AdminCommand::Deploy => vec!["drush".into(), "deploy".into()],
            AdminCommand::ExportConfig => vec!["drush".into(), "config:export".into(), "-y".into()],
        }
    }

    /// Start the task and return its ARN without waiting for it.
    #[instrument(skip(self, network, cron_key), fields(tenant_id = %tenant, mode = command.name()))]
    pub async fn run(
        &self,
        tenant: &TenantId,
        network: &NetworkOutputs,
        command: &AdminCommand,
        cron_key: Option<&str>,
    ) -> TenantResult<String> {
        let request = TaskRequest {
            cluster: network.cluster.clone(),
            task_definition: admin_task_definition(tenant),
            container: admin_container(tenant),
            command: self.command_for(tenant, command, cron_key),
            subnets: network.subnets.clone(),
            security_groups: vec![network.security_group.clone()],
            platform_version: self.platform_version.clone(),
        };
        let arn = self.tasks.run_task(request).await.map_err(task_error)?;
        info!(task = %arn, "admin task started");
        Ok(arn)
    }

    /// Wait for a task to stop; anything but exit code 0 is a failure.
    pub async fn wait_for_stop(&self, cluster: &str, task_arn: &str) -> TenantResult<TaskState> {
        let started = Instant::now();
        loop {
            let state = self.tasks.describe_task(cluster, task_arn).await.map_err(task_error)?;
            if state.is_stopped() {
                return match state.exit_code {
                    Some(0) => Ok(state),
                    code => Err(task_error(format!(
                        "task {task_arn} stopped with exit code {:?}: {}",
                        code,
                        state.stopped_reason.as_deref().unwrap_or("no reason given")
                    ))),
                };
            }
            if started.elapsed() >= self.export_timeout {
                return Err(TenantError::ReadinessTimeout {
                    stack: task_arn.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Snapshot tenant configuration and wait for it to finish.
    pub async fn export_config(&self, tenant: &TenantId, network: &NetworkOutputs) -> TenantResult<()> {
        let arn = self.run(tenant, network, &AdminCommand::ExportConfig, None).await?;
        self.wait_for_stop(&network.cluster, &arn).await?;
        info!(tenant_id = %tenant, "configuration exported");
        Ok(())
    }
}
