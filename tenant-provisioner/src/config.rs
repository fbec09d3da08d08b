use std::path::PathBuf;
use std::time::Duration;

use tenant_core::{ConfigSnapshot, ConfigStore, TenantResult};

/// Environment prefix: `TENANT__SAGA__BASE_STACK` lands on `saga.base_stack`.
pub const ENV_PREFIX: &str = "TENANT__";

/// Register every default the application relies on.
pub fn configure_defaults(store: &mut ConfigStore) {
    // Infrastructure
    store.set_default("saga.listener_logical_id", "AppLBListener443");
    store.set_default("saga.stack_ready_timeout_secs", "3600");
    store.set_default("saga.stack_poll_interval_secs", "15");

    // Database
    store.set_default("db.admin_secret", "rds_admin_login");
    store.set_default("db.access_hosts", "10.0.0.0/255.255.0.0");

    // Record store
    store.set_default("lrs.api_key_header", "x-veracity-api-key");
    store.set_default("lrs.timeout_secs", "30");

    // Content and admin tasks
    store.set_default("content.root", "/mnt/efs");
    store.set_default("admin.platform_version", "1.4.0");
    store.set_default("admin.init_script", "/var/www/html/admin_api/create_cms.sh");
    store.set_default("admin.export_timeout_secs", "900");
    store.set_default("admin.poll_interval_secs", "10");

    // Runtime
    store.set_default("queue.max_workers", "4");
    store.set_default("queue.admin_workers", "2");
    store.set_default("http.host", "127.0.0.1");
    store.set_default("http.port", "3030");
}

/// Everything the saga needs to know about its surroundings, resolved once
/// at startup and injected from there on.
#[derive(Debug, Clone)]
pub struct SagaConfig {
    pub base_stack: String,
    pub content_bucket: String,
    pub project: String,
    pub sns_topic: String,
    pub tenant_domain: String,
    pub firebase_key: String,
    pub firebase_id: String,
    pub listener_logical_id: String,
    pub stack_ready_timeout: Duration,
    pub stack_poll_interval: Duration,

    pub db_admin_secret: String,
    pub db_access_host: String,

    pub lrs_base_url: String,
    pub lrs_api_key: String,
    pub lrs_admin_uuid: String,
    pub lrs_api_key_header: String,
    pub lrs_timeout: Duration,

    pub content_root: PathBuf,

    pub admin_platform_version: String,
    pub admin_init_script: String,
    pub admin_export_timeout: Duration,
    pub admin_poll_interval: Duration,

    pub queue_max_workers: usize,
    /// Workers reserved for admin tasks and their stack waits
    pub queue_admin_workers: usize,
    pub http_host: String,
    pub http_port: u16,
}

impl SagaConfig {
    pub fn from_snapshot(snap: &ConfigSnapshot) -> TenantResult<Self> {
        let secs = |key: &str, default: u64| snap.parse_or(key, default).map(Duration::from_secs);

        Ok(Self {
            base_stack: snap.require("saga.base_stack")?,
            content_bucket: snap.require("saga.content_bucket")?,
            project: snap.require("saga.project")?,
            sns_topic: snap.require("saga.sns_topic")?,
            tenant_domain: snap.require("saga.tenant_domain")?,
            firebase_key: snap.require("saga.firebase_key")?,
            firebase_id: snap.require("saga.firebase_id")?,
            listener_logical_id: snap.require("saga.listener_logical_id")?,
            stack_ready_timeout: secs("saga.stack_ready_timeout_secs", 3600)?,
            stack_poll_interval: secs("saga.stack_poll_interval_secs", 15)?,

            db_admin_secret: snap.require("db.admin_secret")?,
            db_access_host: snap.require("db.access_hosts")?,

            lrs_base_url: snap.require("lrs.base_url")?,
            lrs_api_key: snap.require("lrs.api_key")?,
            lrs_admin_uuid: snap.require("lrs.admin_uuid")?,
            lrs_api_key_header: snap.require("lrs.api_key_header")?,
            lrs_timeout: secs("lrs.timeout_secs", 30)?,

            content_root: PathBuf::from(snap.require("content.root")?),

            admin_platform_version: snap.require("admin.platform_version")?,
            admin_init_script: snap.require("admin.init_script")?,
            admin_export_timeout: secs("admin.export_timeout_secs", 900)?,
            admin_poll_interval: secs("admin.poll_interval_secs", 10)?,

            queue_max_workers: snap.parse_or("queue.max_workers", 4)?,
            queue_admin_workers: snap.parse_or("queue.admin_workers", 2)?,
            http_host: snap.require("http.host")?,
            http_port: snap.parse_or("http.port", 3030)?,
        })
    }

    /// Environment first, defaults underneath.
    pub fn from_env() -> TenantResult<Self> {
        let mut store = ConfigStore::new();
        store.load_env(ENV_PREFIX);
        configure_defaults(&mut store);
        Self::from_snapshot(&store.snapshot())
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenant_core::TenantError;

    fn required(store: &mut ConfigStore) {
        for (key, value) in [
            ("saga.base_stack", "perls-base"),
            ("saga.content_bucket", "perls-content"),
            ("saga.project", "perls"),
            ("saga.sns_topic", "arn:aws:sns:us-east-1:1:alerts"),
            ("saga.tenant_domain", "perls.example.com"),
            ("saga.firebase_key", "fk"),
            ("saga.firebase_id", "fid"),
            ("lrs.base_url", "https://lrs.example.com/"),
            ("lrs.api_key", "key"),
            ("lrs.admin_uuid", "admin-uuid"),
        ] {
            store.set(key, value);
        }
    }

    #[test]
    fn defaults_fill_optional_keys() {
        let mut store = ConfigStore::new();
        required(&mut store);
        configure_defaults(&mut store);

        let config = SagaConfig::from_snapshot(&store.snapshot()).unwrap();
        assert_eq!(config.listener_logical_id, "AppLBListener443");
        assert_eq!(config.stack_ready_timeout, Duration::from_secs(3600));
        assert_eq!(config.db_access_host, "10.0.0.0/255.255.0.0");
        assert_eq!(config.content_root, PathBuf::from("/mnt/efs"));
        assert_eq!(config.http_addr(), "127.0.0.1:3030");
    }

    #[test]
    fn missing_key_names_the_key() {
        let mut store = ConfigStore::new();
        configure_defaults(&mut store);
        match SagaConfig::from_snapshot(&store.snapshot()) {
            Err(TenantError::Validation(msg)) => assert!(msg.contains("saga.base_stack")),
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn bad_number_is_rejected() {
        let mut store = ConfigStore::new();
        required(&mut store);
        store.set("http.port", "eighty");
        configure_defaults(&mut store);
        assert!(SagaConfig::from_snapshot(&store.snapshot()).is_err());
    }
}
