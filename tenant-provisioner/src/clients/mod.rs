//! Capability clients.
//!
//! One trait per external collaborator, shaped to what the lifecycle steps
//! need and nothing more. Production adapters live beside the traits; the
//! in-memory doubles in [`memory`] back the test suite.

pub mod aws;
pub mod fs;
pub mod memory;
pub mod mysql;
pub mod record_store;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{service}: {message}")]
    Backend { service: &'static str, message: String },
}

impl ClientError {
    pub fn backend(service: &'static str, err: impl ToString) -> Self {
        ClientError::Backend {
            service,
            message: err.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

// ---- Infrastructure stacks ----

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescription {
    pub name: String,
    pub status: String,
    pub parameters: BTreeMap<String, String>,
    pub outputs: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackParameter {
    Value { key: String, value: String },
    /// Keep whatever the stack currently holds
    UsePrevious { key: String },
}

impl StackParameter {
    pub fn value(key: impl Into<String>, value: impl Into<String>) -> Self {
        StackParameter::Value {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn keep(key: impl Into<String>) -> Self {
        StackParameter::UsePrevious { key: key.into() }
    }

    pub fn key(&self) -> &str {
        match self {
            StackParameter::Value { key, .. } | StackParameter::UsePrevious { key } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackRequest {
    pub name: String,
    pub template_url: String,
    pub parameters: Vec<StackParameter>,
    pub capabilities: Vec<String>,
    pub tags: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updating,
    NoChanges,
}

#[async_trait]
pub trait StackService: Send + Sync {
    /// `None` when no stack carries that name
    async fn describe_stack(&self, name: &str) -> ClientResult<Option<StackDescription>>;

    async fn list_stacks(&self) -> ClientResult<Vec<StackDescription>>;

    async fn create_stack(&self, request: StackRequest) -> ClientResult<()>;

    /// "No updates are to be performed" comes back as `NoChanges`
    async fn update_stack(&self, request: StackRequest) -> ClientResult<UpdateOutcome>;

    async fn delete_stack(&self, name: &str) -> ClientResult<()>;

    async fn physical_resource_id(&self, stack: &str, logical_id: &str) -> ClientResult<Option<String>>;
}

// ---- Secrets ----

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the secret's ARN. `AlreadyExists` if the name is taken.
    async fn create_secret(&self, name: &str, value: &str) -> ClientResult<String>;

    async fn get_secret(&self, name: &str) -> ClientResult<String>;

    async fn delete_secret(&self, name: &str) -> ClientResult<()>;
}

// ---- Container tasks ----

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRequest {
    pub cluster: String,
    pub task_definition: String,
    pub container: String,
    pub command: Vec<String>,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub platform_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskState {
    pub last_status: String,
    pub exit_code: Option<i32>,
    pub stopped_reason: Option<String>,
}

impl TaskState {
    pub fn is_stopped(&self) -> bool {
        self.last_status == "STOPPED"
    }
}

#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Returns the task ARN
    async fn run_task(&self, request: TaskRequest) -> ClientResult<String>;

    async fn describe_task(&self, cluster: &str, task_arn: &str) -> ClientResult<TaskState>;
}

// ---- Relational database ----

#[async_trait]
pub trait DatabaseAdmin: Send + Sync {
    async fn create_user(&self, user: &str, host: &str, password: &str) -> ClientResult<()>;

    async fn create_database(&self, name: &str) -> ClientResult<()>;

    async fn grant(&self, privileges: &[&str], database: &str, user: &str, host: &str) -> ClientResult<()>;

    async fn flush_privileges(&self) -> ClientResult<()>;

    /// No-op when the database is already gone
    async fn drop_database(&self, name: &str) -> ClientResult<()>;

    /// No-op when the user is already gone
    async fn drop_user(&self, user: &str, host: &str) -> ClientResult<()>;

    /// One transaction against `database`, committed explicitly
    async fn open_session(&self, database: &str) -> ClientResult<Box<dyn ScriptSession>>;
}

#[async_trait]
pub trait ScriptSession: Send {
    async fn execute(&mut self, statement: &str) -> ClientResult<()>;

    async fn commit(self: Box<Self>) -> ClientResult<()>;
}

// ---- Object storage ----

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// True when at least one object lives under `prefix`
    async fn has_prefix(&self, prefix: &str) -> ClientResult<bool>;

    /// Top-level prefixes, without the trailing delimiter
    async fn list_prefixes(&self) -> ClientResult<Vec<String>>;
}

// ---- Record store ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStoreUser {
    pub uuid: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecordStoreUser {
    pub username: String,
    pub email: String,
    pub public_account: bool,
    pub password: String,
    #[serde(rename = "acceptsTOS")]
    pub accepts_tos: String,
    pub verified_email: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStoreEndpoint {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "lrsName")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecordStoreEndpoint {
    pub owner: String,
    pub lrs_name: String,
    pub active: bool,
    pub strict: bool,
    pub compatibility_level: u8,
    pub verbose_logs: bool,
    pub permissions: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStoreAccessKey {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecordStoreAccessKey {
    pub name: String,
    pub read: bool,
    pub write: bool,
    pub jwt: bool,
    pub enabled: bool,
    pub advanced_queries: bool,
    pub limited_read: bool,
    pub username: String,
    pub password: String,
}

#[async_trait]
pub trait RecordStoreApi: Send + Sync {
    async fn find_users_by_email(&self, email: &str) -> ClientResult<Vec<RecordStoreUser>>;

    async fn create_user(&self, user: &NewRecordStoreUser) -> ClientResult<RecordStoreUser>;

    async fn list_endpoints(&self) -> ClientResult<Vec<RecordStoreEndpoint>>;

    async fn create_endpoint(&self, endpoint: &NewRecordStoreEndpoint) -> ClientResult<RecordStoreEndpoint>;

    async fn delete_endpoint(&self, id: &str) -> ClientResult<()>;

    async fn list_access_keys(&self, endpoint_name: &str) -> ClientResult<Vec<RecordStoreAccessKey>>;

    async fn create_access_key(&self, endpoint_name: &str, key: &NewRecordStoreAccessKey) -> ClientResult<()>;
}

// ---- Load balancer rules ----

#[async_trait]
pub trait RoutingTable: Send + Sync {
    /// Raw priority of every rule on the listener, `"default"` included
    async fn rule_priorities(&self, listener_arn: &str) -> ClientResult<Vec<String>>;
}

// ---- Tenant content filesystem ----

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// `AlreadyExists` if the directory is already there
    async fn create_dir(&self, path: &Path) -> ClientResult<()>;

    async fn copy_tree(&self, from: &Path, to: &Path) -> ClientResult<()>;

    /// Unpack a gzipped tarball into `into`
    async fn extract_archive(&self, archive: &Path, into: &Path) -> ClientResult<()>;

    /// `NotFound` if there is nothing to remove
    async fn remove_tree(&self, path: &Path) -> ClientResult<()>;

    async fn read_to_string(&self, path: &Path) -> ClientResult<String>;
}

/// Every collaborator the lifecycle needs, injected at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub stacks: Arc<dyn StackService>,
    pub secrets: Arc<dyn SecretStore>,
    pub tasks: Arc<dyn TaskRunner>,
    pub database: Arc<dyn DatabaseAdmin>,
    pub objects: Arc<dyn ObjectStore>,
    pub record_store: Arc<dyn RecordStoreApi>,
    pub routing: Arc<dyn RoutingTable>,
    pub content: Arc<dyn ContentStore>,
}
