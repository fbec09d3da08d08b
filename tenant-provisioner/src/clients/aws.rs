//! AWS-backed collaborators: CloudFormation stacks, Secrets Manager, ECS
//! tasks, ELBv2 listener rules and S3 content versions.

use std::collections::BTreeMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudformation::types::{Capability, Parameter, Stack, Tag};
use aws_sdk_ecs::types::{
    AssignPublicIp, AwsVpcConfiguration, ContainerOverride, LaunchType, NetworkConfiguration,
    TaskOverride,
};
use tracing::debug;

use super::{
    ClientError, ClientResult, ObjectStore, RoutingTable, SecretStore, StackDescription,
    StackParameter, StackRequest, StackService, TaskRequest, TaskRunner, TaskState, UpdateOutcome,
};

fn sdk_error(service: &'static str, err: impl std::error::Error) -> ClientError {
    ClientError::backend(service, DisplayErrorContext(err))
}

/// Shared SDK configuration, resolved from the environment once.
pub async fn load_sdk_config() -> aws_config::SdkConfig {
    aws_config::defaults(BehaviorVersion::latest()).load().await
}

// ---- CloudFormation ----

#[derive(Clone)]
pub struct CloudFormationStacks {
    client: aws_sdk_cloudformation::Client,
}

impl CloudFormationStacks {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_cloudformation::Client::new(config),
        }
    }

    fn describe(stack: &Stack) -> StackDescription {
        StackDescription {
            name: stack.stack_name().unwrap_or_default().to_string(),
            status: stack
                .stack_status()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            parameters: stack
                .parameters()
                .iter()
                .filter_map(|p| {
                    Some((
                        p.parameter_key()?.to_string(),
                        p.parameter_value().unwrap_or_default().to_string(),
                    ))
                })
                .collect(),
            outputs: stack
                .outputs()
                .iter()
                .filter_map(|o| Some((o.output_key()?.to_string(), o.output_value()?.to_string())))
                .collect(),
            tags: stack
                .tags()
                .iter()
                .map(|t| (t.key().unwrap_or_default().to_string(), t.value().unwrap_or_default().to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn parameters(params: &[StackParameter]) -> Vec<Parameter> {
        params
            .iter()
            .map(|p| match p {
                StackParameter::Value { key, value } => Parameter::builder()
                    .parameter_key(key)
                    .parameter_value(value)
                    .build(),
                StackParameter::UsePrevious { key } => Parameter::builder()
                    .parameter_key(key)
                    .use_previous_value(true)
                    .build(),
            })
            .collect()
    }

    fn tags(tags: &[(String, String)]) -> ClientResult<Vec<Tag>> {
        tags.iter()
            .map(|(k, v)| {
                Ok(Tag::builder().key(k).value(v).build())
            })
            .collect()
    }
}

#[async_trait]
impl StackService for CloudFormationStacks {
    async fn describe_stack(&self, name: &str) -> ClientResult<Option<StackDescription>> {
        match self.client.describe_stacks().stack_name(name).send().await {
            Ok(out) => Ok(out.stacks().first().map(Self::describe)),
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .and_then(|e| e.message())
                    .map(|m| m.contains("does not exist"))
                    .unwrap_or(false);
                if missing {
                    Ok(None)
                } else {
                    Err(sdk_error("cloudformation", err))
                }
            }
        }
    }

    async fn list_stacks(&self) -> ClientResult<Vec<StackDescription>> {
        let stacks = self
            .client
            .describe_stacks()
            .into_paginator()
            .items()
            .send()
            .collect::<Result<Vec<_>, _>>()
            .await
            .map_err(|e| sdk_error("cloudformation", e))?;
        Ok(stacks.iter().map(Self::describe).collect())
    }

    async fn create_stack(&self, request: StackRequest) -> ClientResult<()> {
        self.client
            .create_stack()
            .stack_name(&request.name)
            .template_url(&request.template_url)
            .set_parameters(Some(Self::parameters(&request.parameters)))
            .set_capabilities(Some(
                request.capabilities.iter().map(|c| Capability::from(c.as_str())).collect(),
            ))
            .set_tags(Some(Self::tags(&request.tags)?))
            .send()
            .await
            .map_err(|e| sdk_error("cloudformation", e))?;
        debug!(stack = %request.name, "create_stack accepted");
        Ok(())
    }

    async fn update_stack(&self, request: StackRequest) -> ClientResult<UpdateOutcome> {
        let result = self
            .client
            .update_stack()
            .stack_name(&request.name)
            .template_url(&request.template_url)
            .set_parameters(Some(Self::parameters(&request.parameters)))
            .set_capabilities(Some(
                request.capabilities.iter().map(|c| Capability::from(c.as_str())).collect(),
            ))
            .set_tags(Some(Self::tags(&request.tags)?))
            .send()
            .await;

        match result {
            Ok(_) => Ok(UpdateOutcome::Updating),
            Err(err) => {
                let no_changes = err
                    .as_service_error()
                    .and_then(|e| e.message())
                    .map(|m| m.contains("No updates are to be performed"))
                    .unwrap_or(false);
                if no_changes {
                    Ok(UpdateOutcome::NoChanges)
                } else {
                    Err(sdk_error("cloudformation", err))
                }
            }
        }
    }

    async fn delete_stack(&self, name: &str) -> ClientResult<()> {
        self.client
            .delete_stack()
            .stack_name(name)
            .send()
            .await
            .map_err(|e| sdk_error("cloudformation", e))?;
        Ok(())
    }

    async fn physical_resource_id(&self, stack: &str, logical_id: &str) -> ClientResult<Option<String>> {
        match self
            .client
            .describe_stack_resource()
            .stack_name(stack)
            .logical_resource_id(logical_id)
            .send()
            .await
        {
            Ok(out) => Ok(out
                .stack_resource_detail()
                .and_then(|d| d.physical_resource_id())
                .map(String::from)),
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .and_then(|e| e.message())
                    .map(|m| m.contains("does not exist"))
                    .unwrap_or(false);
                if missing {
                    Ok(None)
                } else {
                    Err(sdk_error("cloudformation", err))
                }
            }
        }
    }
}

// ---- Secrets Manager ----

#[derive(Clone)]
pub struct SecretsManagerStore {
    client: aws_sdk_secretsmanager::Client,
}

impl SecretsManagerStore {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_secretsmanager::Client::new(config),
        }
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn create_secret(&self, name: &str, value: &str) -> ClientResult<String> {
        match self
            .client
            .create_secret()
            .name(name)
            .secret_string(value)
            .send()
            .await
        {
            Ok(out) => Ok(out.arn().unwrap_or(name).to_string()),
            Err(err) => match err.as_service_error().and_then(|e| e.code()) {
                Some("ResourceExistsException") => Err(ClientError::AlreadyExists(name.to_string())),
                _ => Err(sdk_error("secretsmanager", err)),
            },
        }
    }

    async fn get_secret(&self, name: &str) -> ClientResult<String> {
        match self.client.get_secret_value().secret_id(name).send().await {
            Ok(out) => out
                .secret_string()
                .map(String::from)
                .ok_or_else(|| ClientError::backend("secretsmanager", format!("{name} has no string value"))),
            Err(err) => match err.as_service_error().and_then(|e| e.code()) {
                Some("ResourceNotFoundException") => Err(ClientError::NotFound(name.to_string())),
                _ => Err(sdk_error("secretsmanager", err)),
            },
        }
    }

    async fn delete_secret(&self, name: &str) -> ClientResult<()> {
        match self
            .client
            .delete_secret()
            .secret_id(name)
            .force_delete_without_recovery(true)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => match err.as_service_error().and_then(|e| e.code()) {
                Some("ResourceNotFoundException") => Err(ClientError::NotFound(name.to_string())),
                _ => Err(sdk_error("secretsmanager", err)),
            },
        }
    }
}

// ---- ECS ----

#[derive(Clone)]
pub struct EcsTasks {
    client: aws_sdk_ecs::Client,
}

impl EcsTasks {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_ecs::Client::new(config),
        }
    }
}

#[async_trait]
impl TaskRunner for EcsTasks {
    async fn run_task(&self, request: TaskRequest) -> ClientResult<String> {
        let vpc = AwsVpcConfiguration::builder()
            .set_subnets(Some(request.subnets.clone()))
            .set_security_groups(Some(request.security_groups.clone()))
            .assign_public_ip(AssignPublicIp::Enabled)
            .build()
            .map_err(|e| ClientError::backend("ecs", e))?;

        let overrides = TaskOverride::builder()
            .container_overrides(
                ContainerOverride::builder()
                    .name(&request.container)
                    .set_command(Some(request.command.clone()))
                    .build(),
            )
            .build();

        let out = self
            .client
            .run_task()
            .cluster(&request.cluster)
            .launch_type(LaunchType::Fargate)
            .task_definition(&request.task_definition)
            .count(1)
            .platform_version(&request.platform_version)
            .network_configuration(NetworkConfiguration::builder().awsvpc_configuration(vpc).build())
            .overrides(overrides)
            .send()
            .await
            .map_err(|e| sdk_error("ecs", e))?;

        if let Some(failure) = out.failures().first() {
            return Err(ClientError::backend(
                "ecs",
                failure.reason().unwrap_or("run_task reported a failure"),
            ));
        }

        out.tasks()
            .first()
            .and_then(|t| t.task_arn())
            .map(String::from)
            .ok_or_else(|| ClientError::backend("ecs", "run_task returned no task"))
    }

    async fn describe_task(&self, cluster: &str, task_arn: &str) -> ClientResult<TaskState> {
        let out = self
            .client
            .describe_tasks()
            .cluster(cluster)
            .tasks(task_arn)
            .send()
            .await
            .map_err(|e| sdk_error("ecs", e))?;

        let task = out
            .tasks()
            .first()
            .ok_or_else(|| ClientError::NotFound(task_arn.to_string()))?;

        Ok(TaskState {
            last_status: task.last_status().unwrap_or_default().to_string(),
            exit_code: task.containers().first().and_then(|c| c.exit_code()),
            stopped_reason: task.stopped_reason().map(String::from),
        })
    }
}

// ---- ELBv2 ----

#[derive(Clone)]
pub struct ListenerRules {
    client: aws_sdk_elasticloadbalancingv2::Client,
}

impl ListenerRules {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_elasticloadbalancingv2::Client::new(config),
        }
    }
}

#[async_trait]
impl RoutingTable for ListenerRules {
    async fn rule_priorities(&self, listener_arn: &str) -> ClientResult<Vec<String>> {
        let mut priorities = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let out = self
                .client
                .describe_rules()
                .listener_arn(listener_arn)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| sdk_error("elbv2", e))?;

            priorities.extend(out.rules().iter().filter_map(|r| r.priority().map(String::from)));

            match out.next_marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(priorities)
    }
}

// ---- S3 ----

#[derive(Clone)]
pub struct S3Versions {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Versions {
    pub fn new(config: &aws_config::SdkConfig, bucket: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Versions {
    async fn has_prefix(&self, prefix: &str) -> ClientResult<bool> {
        let out = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| sdk_error("s3", e))?;
        Ok(out.key_count().unwrap_or(0) > 0)
    }

    async fn list_prefixes(&self) -> ClientResult<Vec<String>> {
        let out = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .delimiter("/")
            .send()
            .await
            .map_err(|e| sdk_error("s3", e))?;

        Ok(out
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix())
            .map(|p| p.trim_end_matches('/').to_string())
            .collect())
    }
}
