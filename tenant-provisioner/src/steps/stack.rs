//! Tenant infrastructure stacks: the precondition gate for every workflow,
//! create/update/delete, and polling until a stack settles.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tenant_core::naming::stack_name;
use tenant_core::{TenantError, TenantId, TenantResult};
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::clients::{StackDescription, StackParameter, StackRequest, StackService, UpdateOutcome};

pub const STACK_CAPABILITY: &str = "CAPABILITY_NAMED_IAM";

/// Tag marking a stack as belonging to a tenant.
pub const TENANT_TAG: &str = "Tenant";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Pending,
    Failed,
}

/// Where a stack status leaves a waiter. An update wait also accepts a
/// stack that never left its settled create state ("no changes"), and a
/// create wait accepts a stack that was updated after it was created.
pub fn classify(status: &str, expect_create: bool) -> Readiness {
    if status.ends_with("_IN_PROGRESS") {
        return Readiness::Pending;
    }
    if status.contains("ROLLBACK") || status.ends_with("_FAILED") || status.starts_with("DELETE") {
        return Readiness::Failed;
    }
    match (status, expect_create) {
        ("CREATE_COMPLETE", _) | ("UPDATE_COMPLETE", _) => Readiness::Ready,
        ("IMPORT_COMPLETE", false) => Readiness::Ready,
        _ => Readiness::Failed,
    }
}

/// Network identifiers exported by the shared base stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkOutputs {
    pub subnets: Vec<String>,
    pub cluster: String,
    pub security_group: String,
}

impl NetworkOutputs {
    pub fn from_outputs(outputs: &BTreeMap<String, String>) -> Option<Self> {
        let find = |needle: &str| {
            outputs
                .iter()
                .find(|(key, _)| key.contains(needle))
                .map(|(_, value)| value.clone())
        };
        let subnets: Vec<String> = outputs
            .iter()
            .filter(|(key, _)| key.contains("PrivateSubnet"))
            .map(|(_, value)| value.clone())
            .collect();

        if subnets.is_empty() {
            return None;
        }
        Some(Self {
            subnets,
            cluster: find("ECSCluster")?,
            security_group: find("SGECS")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub username: String,
    pub host: String,
    pub from: String,
    pub port: u16,
    pub protocol: String,
}

/// The full parameter set a new tenant stack is created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSettings {
    pub tenant: String,
    pub version: String,
    pub db_password_arn: String,
    pub smtp_password_arn: String,
    pub priority: u32,
    pub lrs_host: String,
    pub lrs_password_arn: String,
    pub smtp_username: String,
    pub smtp_host: String,
    pub smtp_from: String,
    pub smtp_protocol: String,
    pub smtp_port: u16,
    pub base_stack: String,
    pub sns_topic: String,
    pub project: String,
    pub brand: String,
    pub address: String,
    pub firebase_key: String,
    pub firebase_id: String,
}

impl StackSettings {
    pub fn parameters(&self) -> Vec<StackParameter> {
        vec![
            StackParameter::value("TENANT", &self.tenant),
            StackParameter::value("VERSION", &self.version),
            StackParameter::value("DBPASSWORDARN", &self.db_password_arn),
            StackParameter::value("SMTPPASSWORDARN", &self.smtp_password_arn),
            StackParameter::value("PRIORITY", self.priority.to_string()),
            StackParameter::value("LRSHOST", &self.lrs_host),
            StackParameter::value("LRSPASSWORDARN", &self.lrs_password_arn),
            StackParameter::value("SMTPUSERNAME", &self.smtp_username),
            StackParameter::value("SMTPHOST", &self.smtp_host),
            StackParameter::value("SMTPFROM", &self.smtp_from),
            StackParameter::value("SMTPPROTOCOL", &self.smtp_protocol),
            StackParameter::value("SMTPPORT", self.smtp_port.to_string()),
            StackParameter::value("BaseStack", &self.base_stack),
            StackParameter::value("SNSTopic", &self.sns_topic),
            StackParameter::value("Project", &self.project),
            StackParameter::value("BRAND", &self.brand),
            StackParameter::value("ADDRESS", &self.address),
            StackParameter::value("FIREBASEKEY", &self.firebase_key),
            StackParameter::value("FIREBASEID", &self.firebase_id),
        ]
    }
}

/// Every current key kept as-is unless overridden; overrides for keys the
/// stack does not have yet are appended.
pub fn update_parameters(
    current: &BTreeMap<String, String>,
    overrides: &BTreeMap<String, String>,
) -> Vec<StackParameter> {
    let mut parameters: Vec<StackParameter> = current
        .keys()
        .map(|key| match overrides.get(key) {
            Some(value) => StackParameter::value(key, value),
            None => StackParameter::keep(key),
        })
        .collect();
    parameters.extend(
        overrides
            .iter()
            .filter(|(key, _)| !current.contains_key(*key))
            .map(|(key, value)| StackParameter::value(key, value)),
    );
    parameters
}

fn stack_error(e: impl ToString) -> TenantError {
    TenantError::provision("stack", e)
}

pub struct StackProvisioner {
    stacks: Arc<dyn StackService>,
    poll_interval: Duration,
    ready_timeout: Duration,
}

impl StackProvisioner {
    pub fn new(stacks: Arc<dyn StackService>, poll_interval: Duration, ready_timeout: Duration) -> Self {
        Self {
            stacks,
            poll_interval,
            ready_timeout,
        }
    }

    pub async fn describe(&self, name: &str) -> TenantResult<Option<StackDescription>> {
        self.stacks.describe_stack(name).await.map_err(stack_error)
    }

    pub async fn exists(&self, tenant: &TenantId) -> TenantResult<bool> {
        Ok(self.describe(&stack_name(tenant)).await?.is_some())
    }

    pub async fn list(&self) -> TenantResult<Vec<StackDescription>> {
        self.stacks.list_stacks().await.map_err(stack_error)
    }

    /// Poll until the stack settles, bounded by the configured timeout.
    #[instrument(skip(self))]
    pub async fn await_ready(&self, name: &str, expect_create: bool) -> TenantResult<StackDescription> {
        let started = Instant::now();
        loop {
            let stack = self
                .describe(name)
                .await?
                .ok_or_else(|| TenantError::provision("stack", format!("stack {name} disappeared")))?;

            match classify(&stack.status, expect_create) {
                Readiness::Ready => {
                    info!(status = %stack.status, "stack ready");
                    return Ok(stack);
                }
                Readiness::Failed => {
                    return Err(TenantError::provision(
                        "stack",
                        format!("stack {name} ended in {}", stack.status),
                    ));
                }
                Readiness::Pending => debug!(status = %stack.status, "stack not ready yet"),
            }

            if started.elapsed() >= self.ready_timeout {
                return Err(TenantError::ReadinessTimeout {
                    stack: name.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    #[instrument(skip(self, template_url, parameters), fields(tenant_id = %tenant))]
    pub async fn create(
        &self,
        tenant: &TenantId,
        template_url: &str,
        parameters: Vec<StackParameter>,
    ) -> TenantResult<()> {
        let request = StackRequest {
            name: stack_name(tenant),
            template_url: template_url.to_string(),
            parameters,
            capabilities: vec![STACK_CAPABILITY.to_string()],
            tags: vec![(TENANT_TAG.to_string(), tenant.to_string())],
        };
        self.stacks.create_stack(request).await.map_err(stack_error)?;
        info!("stack creation started");
        Ok(())
    }

    /// Apply `overrides`, keeping every other current parameter.
    #[instrument(skip(self, template_url, overrides), fields(tenant_id = %tenant))]
    pub async fn update(
        &self,
        tenant: &TenantId,
        template_url: &str,
        overrides: &BTreeMap<String, String>,
    ) -> TenantResult<UpdateOutcome> {
        let name = stack_name(tenant);
        let current = self.read_parameters(&name).await?;

        let request = StackRequest {
            name,
            template_url: template_url.to_string(),
            parameters: update_parameters(&current, overrides),
            capabilities: vec![STACK_CAPABILITY.to_string()],
            tags: vec![(TENANT_TAG.to_string(), tenant.to_string())],
        };
        let outcome = self.stacks.update_stack(request).await.map_err(stack_error)?;
        info!(?outcome, "stack update submitted");
        Ok(outcome)
    }

    pub async fn delete(&self, tenant: &TenantId) -> TenantResult<()> {
        self.stacks
            .delete_stack(&stack_name(tenant))
            .await
            .map_err(stack_error)
    }

    pub async fn read_parameters(&self, name: &str) -> TenantResult<BTreeMap<String, String>> {
        self.describe(name)
            .await?
            .map(|s| s.parameters)
            .ok_or_else(|| stack_error(format!("stack {name} does not exist")))
    }

    /// Network of the shared base stack; missing base stack is fatal.
    pub async fn network(&self, base_stack: &str) -> TenantResult<NetworkOutputs> {
        let base = self
            .describe(base_stack)
            .await?
            .ok_or_else(|| TenantError::BaseStackMissing(base_stack.to_string()))?;
        NetworkOutputs::from_outputs(&base.outputs).ok_or_else(|| {
            stack_error(format!("base stack {base_stack} lacks subnet, cluster or security group outputs"))
        })
    }

    pub async fn listener_arn(&self, base_stack: &str, logical_id: &str) -> TenantResult<String> {
        self.stacks
            .physical_resource_id(base_stack, logical_id)
            .await
            .map_err(stack_error)?
            .ok_or_else(|| stack_error(format!("{logical_id} not found in {base_stack}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::memory::{CallLog, MemoryStacks};

    #[test]
    fn readiness_by_status() {
        assert_eq!(classify("CREATE_IN_PROGRESS", true), Readiness::Pending);
        assert_eq!(classify("CREATE_COMPLETE", true), Readiness::Ready);
        assert_eq!(classify("ROLLBACK_COMPLETE", true), Readiness::Failed);
        assert_eq!(classify("UPDATE_COMPLETE_CLEANUP_IN_PROGRESS", false), Readiness::Pending);
        assert_eq!(classify("UPDATE_COMPLETE", false), Readiness::Ready);
        assert_eq!(classify("CREATE_COMPLETE", false), Readiness::Ready);
        assert_eq!(classify("UPDATE_ROLLBACK_COMPLETE", false), Readiness::Failed);
        assert_eq!(classify("UPDATE_COMPLETE", true), Readiness::Ready);
        assert_eq!(classify("IMPORT_COMPLETE", true), Readiness::Failed);
    }

    #[test]
    fn network_from_base_outputs() {
        let outputs: BTreeMap<String, String> = [
            ("PrivateSubnet1", "subnet-a"),
            ("PrivateSubnet2", "subnet-b"),
            ("PublicSubnet1", "subnet-p"),
            ("ECSClusterName", "cluster"),
            ("SGECSTasks", "sg-1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let network = NetworkOutputs::from_outputs(&outputs).unwrap();
        assert_eq!(network.subnets, vec!["subnet-a", "subnet-b"]);
        assert_eq!(network.cluster, "cluster");
        assert_eq!(network.security_group, "sg-1");
    }

    #[test]
    fn update_keeps_unmentioned_keys() {
        let current: BTreeMap<String, String> = [("BRAND", "perls"), ("VERSION", "1.0"), ("ALTHost", "x")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let overrides = BTreeMap::from([
            ("VERSION".to_string(), "1.1".to_string()),
            ("SMTPHOST".to_string(), "mail".to_string()),
        ]);

        let params = update_parameters(&current, &overrides);
        assert!(params.contains(&StackParameter::keep("BRAND")));
        assert!(params.contains(&StackParameter::keep("ALTHost")));
        assert!(params.contains(&StackParameter::value("VERSION", "1.1")));
        assert!(params.contains(&StackParameter::value("SMTPHOST", "mail")));
        assert_eq!(params.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn await_ready_times_out() {
        let stacks = Arc::new(MemoryStacks::new(CallLog::default()));
        stacks.insert(StackDescription {
            name: "acme".into(),
            status: "CREATE_IN_PROGRESS".into(),
            ..Default::default()
        });
        let provisioner = StackProvisioner::new(stacks, Duration::from_secs(15), Duration::from_secs(60));

        let err = provisioner.await_ready("acme", true).await.unwrap_err();
        assert!(matches!(err, TenantError::ReadinessTimeout { ref stack, .. } if stack == "acme"));
    }
}
