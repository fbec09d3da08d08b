//! Resource naming.
//!
//! Every external resource a tenant owns is found by name, never by a
//! stored id. All of those names are derived here so that provisioning,
//! status and teardown agree on them. The formats are shared with tenants
//! that already exist in the field and must not drift.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::tenant::TenantId;

/// The five secrets each tenant owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretPurpose {
    DbPassword,
    UserPassword,
    LrsKeyPassword,
    CronKey,
    SmtpPassword,
}

impl SecretPurpose {
    pub const ALL: [SecretPurpose; 5] = [
        SecretPurpose::DbPassword,
        SecretPurpose::UserPassword,
        SecretPurpose::LrsKeyPassword,
        SecretPurpose::CronKey,
        SecretPurpose::SmtpPassword,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SecretPurpose::DbPassword => "db_password",
            SecretPurpose::UserPassword => "user_password",
            SecretPurpose::LrsKeyPassword => "lrs_key_password",
            SecretPurpose::CronKey => "cron_key",
            SecretPurpose::SmtpPassword => "smtp_password",
        }
    }
}

impl fmt::Display for SecretPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn stack_name(tenant: &TenantId) -> String {
    tenant.as_str().to_string()
}

pub fn database_name(tenant: &TenantId, brand: &str) -> String {
    format!("{tenant}_{brand}")
}

pub fn database_user(tenant: &TenantId) -> String {
    tenant.as_str().to_string()
}

pub fn secret_name(tenant: &TenantId, purpose: SecretPurpose) -> String {
    format!("{tenant}_{purpose}")
}

pub fn admin_username(tenant: &TenantId) -> String {
    format!("{tenant}_admin")
}

pub fn admin_task_definition(tenant: &TenantId) -> String {
    format!("{tenant}-php-admin-task")
}

pub fn admin_container(tenant: &TenantId) -> String {
    format!("{tenant}-php")
}

/// Name of the record-store endpoint (LRS) and of its access key.
pub fn record_store_name(tenant: &TenantId) -> String {
    tenant.as_str().to_string()
}

/// `{lrs_base_url}{tenant}/xapi/`
pub fn record_store_host(lrs_base_url: &str, tenant: &TenantId) -> String {
    format!("{lrs_base_url}{tenant}/xapi/")
}

/// Public hostname routed to the tenant.
pub fn routing_address(tenant: &TenantId, tenant_domain: &str) -> String {
    format!("{tenant}.{tenant_domain}")
}

pub fn template_url(bucket: &str, version: &str) -> String {
    format!("https://{bucket}.s3.amazonaws.com/{version}/code/scripts/tenant.yml")
}

/// Object-storage prefix that must be non-empty for a version to exist.
pub fn version_prefix(version: &str) -> String {
    format!("{version}/")
}

/// Versioned starter content, relative to the content root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarterPaths {
    pub public: PathBuf,
    pub schema_script: PathBuf,
    pub search_archive: PathBuf,
}

impl StarterPaths {
    pub fn new(root: &Path, version: &str) -> Self {
        let base = root.join("version").join(version).join("starter");
        Self {
            public: base.join("public"),
            schema_script: base.join("CMS-Database.sql"),
            search_archive: base.join("solr.tar.gz"),
        }
    }
}

/// A tenant's content area, relative to the content root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantPaths {
    pub root: PathBuf,
    pub public: PathBuf,
    pub private: PathBuf,
    pub search: PathBuf,
}

impl TenantPaths {
    pub fn new(root: &Path, tenant: &TenantId) -> Self {
        let base = root.join(tenant.as_str());
        Self {
            public: base.join("public"),
            private: base.join("private"),
            search: base.join("solr"),
            root: base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> TenantId {
        TenantId::parse("Acme").unwrap()
    }

    #[test]
    fn names_derive_from_tenant_id() {
        let t = acme();
        assert_eq!(stack_name(&t), "acme");
        assert_eq!(database_name(&t, "perls"), "acme_perls");
        assert_eq!(database_user(&t), "acme");
        assert_eq!(admin_username(&t), "acme_admin");
        assert_eq!(admin_task_definition(&t), "acme-php-admin-task");
        assert_eq!(admin_container(&t), "acme-php");
    }

    #[test]
    fn secret_names() {
        let t = acme();
        let names: Vec<_> = SecretPurpose::ALL.iter().map(|p| secret_name(&t, *p)).collect();
        assert_eq!(
            names,
            vec![
                "acme_db_password",
                "acme_user_password",
                "acme_lrs_key_password",
                "acme_cron_key",
                "acme_smtp_password",
            ]
        );
    }

    #[test]
    fn urls_and_hosts() {
        let t = acme();
        assert_eq!(
            template_url("content-bucket", "2.4.1"),
            "https://content-bucket.s3.amazonaws.com/2.4.1/code/scripts/tenant.yml"
        );
        assert_eq!(
            record_store_host("https://lrs.example.com/", &t),
            "https://lrs.example.com/acme/xapi/"
        );
        assert_eq!(routing_address(&t, "perls.example.com"), "acme.perls.example.com");
        assert_eq!(version_prefix("2.4.1"), "2.4.1/");
    }

    #[test]
    fn content_paths() {
        let root = Path::new("/mnt/efs");
        let starter = StarterPaths::new(root, "2.4.1");
        assert_eq!(starter.public, Path::new("/mnt/efs/version/2.4.1/starter/public"));
        assert_eq!(
            starter.schema_script,
            Path::new("/mnt/efs/version/2.4.1/starter/CMS-Database.sql")
        );
        assert_eq!(
            starter.search_archive,
            Path::new("/mnt/efs/version/2.4.1/starter/solr.tar.gz")
        );

        let tenant = TenantPaths::new(root, &acme());
        assert_eq!(tenant.root, Path::new("/mnt/efs/acme"));
        assert_eq!(tenant.public, Path::new("/mnt/efs/acme/public"));
        assert_eq!(tenant.private, Path::new("/mnt/efs/acme/private"));
        assert_eq!(tenant.search, Path::new("/mnt/efs/acme/solr"));
    }
}
