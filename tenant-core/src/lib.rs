//! tenant-core: framework-agnostic core for tenant lifecycle orchestration.

pub mod config;
pub mod errors;
pub mod naming;
pub mod tenant;

pub use config::{ConfigSnapshot, ConfigStore};
pub use errors::{ErrorKind, TenantError, TenantResult};
pub use naming::{SecretPurpose, StarterPaths, TenantPaths};
pub use tenant::{validate_brand, validate_email, TenantId};
