use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tenant_core::naming::{database_name, database_user};
use tenant_core::{StarterPaths, TenantError, TenantId, TenantResult};
use tracing::{info, instrument, warn};

use super::StepOutcome;
use crate::clients::{ClientError, ContentStore, DatabaseAdmin};

pub const GRANTED_PRIVILEGES: [&str; 9] = [
    "SELECT",
    "INSERT",
    "UPDATE",
    "DELETE",
    "CREATE",
    "DROP",
    "INDEX",
    "ALTER",
    "CREATE TEMPORARY TABLES",
];

/// Break a schema script into statements.
///
/// Lines starting with `--` are dropped. Lines accumulate until one ends in
/// `;`. Anything left unterminated at the end of the script is discarded.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in script.lines() {
        if line.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if line.trim_end().ends_with(';') {
            let statement = current.trim();
            if statement != ";" {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    if !current.trim().is_empty() {
        warn!("discarding unterminated statement at end of schema script");
    }
    statements
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaReport {
    pub executed: usize,
    pub failed: usize,
}

pub struct DatabaseProvisioner {
    admin: Arc<dyn DatabaseAdmin>,
    content: Arc<dyn ContentStore>,
    content_root: PathBuf,
    access_host: String,
}

impl DatabaseProvisioner {
    pub fn new(
        admin: Arc<dyn DatabaseAdmin>,
        content: Arc<dyn ContentStore>,
        content_root: PathBuf,
        access_host: String,
    ) -> Self {
        Self {
            admin,
            content,
            content_root,
            access_host,
        }
    }

    /// User, database and grants. Any failure aborts.
    #[instrument(skip(self, db_password), fields(tenant_id = %tenant))]
    pub async fn provision(&self, tenant: &TenantId, brand: &str, db_password: &str) -> TenantResult<()> {
        let user = database_user(tenant);
        let database = database_name(tenant, brand);
        let fail = |e: ClientError| TenantError::provision("database", e);

        self.admin
            .create_user(&user, &self.access_host, db_password)
            .await
            .map_err(fail)?;
        self.admin.create_database(&database).await.map_err(fail)?;
        self.admin
            .grant(&GRANTED_PRIVILEGES, &database, &user, &self.access_host)
            .await
            .map_err(fail)?;
        self.admin.flush_privileges().await.map_err(fail)?;

        info!(database = %database, "database provisioned");
        Ok(())
    }

    /// Replay the version's schema script. Statement failures are logged
    /// and skipped; the session commits once at the end.
    #[instrument(skip(self), fields(tenant_id = %tenant))]
    pub async fn load_schema(&self, tenant: &TenantId, brand: &str, version: &str) -> TenantResult<SchemaReport> {
        let script_path = StarterPaths::new(&self.content_root, version).schema_script;
        let script = self
            .content
            .read_to_string(&script_path)
            .await
            .map_err(|e| TenantError::provision("schema", e))?;

        let database = database_name(tenant, brand);
        let mut session = self
            .admin
            .open_session(&database)
            .await
            .map_err(|e| TenantError::provision("schema", e))?;

        let mut report = SchemaReport::default();
        for statement in split_statements(&script) {
            match session.execute(&statement).await {
                Ok(()) => report.executed += 1,
                Err(e) => {
                    warn!(error = %e, "schema statement failed, continuing");
                    report.failed += 1;
                }
            }
        }

        session
            .commit()
            .await
            .map_err(|e| TenantError::provision("schema", e))?;

        info!(executed = report.executed, failed = report.failed, "schema loaded");
        Ok(report)
    }

    /// The database name needs the brand; without it only the user goes.
    #[instrument(skip(self), fields(tenant_id = %tenant))]
    pub async fn drop_tenant(&self, tenant: &TenantId, brand: Option<&str>) -> Vec<(String, StepOutcome)> {
        let user = database_user(tenant);
        let mut outcomes = Vec::with_capacity(2);

        match brand {
            Some(brand) => {
                let database = database_name(tenant, brand);
                let dropped = self.admin.drop_database(&database).await;
                outcomes.push((format!("database:{database}"), StepOutcome::from_result(dropped)));
            }
            None => outcomes.push((
                "database".to_string(),
                StepOutcome::Failed("stack carries no BRAND parameter".to_string()),
            )),
        }

        let dropped = self.admin.drop_user(&user, &self.access_host).await;
        outcomes.push((format!("database_user:{user}"), StepOutcome::from_result(dropped)));
        outcomes
    }
}
