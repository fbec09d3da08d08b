//! The leaf components the saga is built from.
//!
//! Each step wraps one or two capability clients and turns their errors into
//! the tenant error taxonomy. None of them knows about the others; ordering
//! is the coordinator's business.

pub mod admin;
pub mod allocator;
pub mod content;
pub mod credentials;
pub mod database;
pub mod record_store;
pub mod stack;

use serde::{Deserialize, Serialize};

use crate::clients::{ClientResult, Collaborators};
use crate::config::SagaConfig;

pub use admin::{AdminBootstrapper, AdminCommand};
pub use allocator::PriorityAllocator;
pub use content::ContentBootstrapper;
pub use credentials::{CredentialGenerator, SecretRef, TenantSecrets};
pub use database::{DatabaseProvisioner, SchemaReport};
pub use record_store::{RecordStoreOutcome, RecordStoreProvisioner};
pub use stack::{NetworkOutputs, SmtpSettings, StackProvisioner, StackSettings};

/// Result of one best-effort cleanup action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum StepOutcome {
    Done,
    /// Nothing to do, the resource was already gone
    Skipped,
    Failed(String),
}

impl StepOutcome {
    pub fn from_result(result: ClientResult<()>) -> Self {
        match result {
            Ok(()) => StepOutcome::Done,
            Err(e) if e.is_not_found() => StepOutcome::Skipped,
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

/// Every step, wired to its collaborators.
pub struct Steps {
    pub credentials: CredentialGenerator,
    pub allocator: PriorityAllocator,
    pub database: DatabaseProvisioner,
    pub record_store: RecordStoreProvisioner,
    pub content: ContentBootstrapper,
    pub stack: StackProvisioner,
    pub admin: AdminBootstrapper,
}

impl Steps {
    pub fn new(collaborators: &Collaborators, config: &SagaConfig) -> Self {
        Self {
            credentials: CredentialGenerator::new(collaborators.secrets.clone()),
            allocator: PriorityAllocator::new(collaborators.routing.clone()),
            database: DatabaseProvisioner::new(
                collaborators.database.clone(),
                collaborators.content.clone(),
                config.content_root.clone(),
                config.db_access_host.clone(),
            ),
            record_store: RecordStoreProvisioner::new(
                collaborators.record_store.clone(),
                config.lrs_admin_uuid.clone(),
            ),
            content: ContentBootstrapper::new(collaborators.content.clone(), config.content_root.clone()),
            stack: StackProvisioner::new(
                collaborators.stacks.clone(),
                config.stack_poll_interval,
                config.stack_ready_timeout,
            ),
            admin: AdminBootstrapper::new(
                collaborators.tasks.clone(),
                config.admin_platform_version.clone(),
                config.admin_init_script.clone(),
                config.admin_poll_interval,
                config.admin_export_timeout,
            ),
        }
    }
}
