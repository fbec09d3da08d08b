mod admin_bootstrap;
mod provision_database;
mod provision_record_store;
mod provision_stack;

pub use admin_bootstrap::AdminBootstrapJob;
pub use provision_database::ProvisionDatabaseJob;
pub use provision_record_store::ProvisionRecordStoreJob;
pub use provision_stack::ProvisionStackJob;

use tenant_core::{TenantError, TenantId};
use tenant_queue::JobError;

/// Saga steps never retry on their own; a failed step stays failed until an
/// operator re-runs it.
pub(crate) fn step_failed(err: TenantError) -> JobError {
    JobError::permanent(err.to_string())
}

pub(crate) fn idempotency_key(step: &str, tenant: &TenantId) -> String {
    format!("{step}:{tenant}")
}
