use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tenant_core::naming::record_store_name;
use tenant_core::{TenantError, TenantId, TenantResult};
use tracing::{error, info, instrument};

use crate::clients::{
    ClientError, NewRecordStoreAccessKey, NewRecordStoreEndpoint, NewRecordStoreUser, RecordStoreApi,
};

pub const ENDPOINT_PERMISSIONS: [&str; 4] = ["lrs.edit", "lrs.**.edit", "lrs.view", "lrs.**.view"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStoreOutcome {
    pub user_uuid: String,
    pub endpoint_id: String,
    pub user_created: bool,
    pub endpoint_created: bool,
    pub key_created: bool,
}

pub struct RecordStoreProvisioner {
    api: Arc<dyn RecordStoreApi>,
    admin_uuid: String,
}

impl RecordStoreProvisioner {
    pub fn new(api: Arc<dyn RecordStoreApi>, admin_uuid: String) -> Self {
        Self { api, admin_uuid }
    }

    /// Ensure user, endpoint and access key exist. Each piece is looked up
    /// before it is created, so a re-run converges instead of duplicating.
    #[instrument(skip(self, user_password, key_password), fields(tenant_id = %tenant))]
    pub async fn provision(
        &self,
        tenant: &TenantId,
        email: &str,
        user_password: &str,
        key_password: &str,
    ) -> TenantResult<RecordStoreOutcome> {
        self.try_provision(tenant, email, user_password, key_password)
            .await
            .map_err(|e| {
                error!(error = %e, "record store provisioning failed");
                TenantError::provision("record_store", e)
            })
    }

    async fn try_provision(
        &self,
        tenant: &TenantId,
        email: &str,
        user_password: &str,
        key_password: &str,
    ) -> Result<RecordStoreOutcome, ClientError> {
        let name = record_store_name(tenant);

        let existing = self.api.find_users_by_email(email).await?;
        let (user_uuid, user_created) = match existing.into_iter().next() {
            Some(user) => (user.uuid, false),
            None => {
                let user = self
                    .api
                    .create_user(&NewRecordStoreUser {
                        username: email.to_string(),
                        email: email.to_string(),
                        public_account: true,
                        password: user_password.to_string(),
                        accepts_tos: Utc::now().format("%m/%d/%y").to_string(),
                        verified_email: true,
                    })
                    .await?;
                info!(user = %user.uuid, "record store user created");
                (user.uuid, true)
            }
        };

        let endpoints = self.api.list_endpoints().await?;
        let (endpoint_id, endpoint_created) = match endpoints.into_iter().find(|e| e.name == name) {
            Some(endpoint) => (endpoint.id, false),
            None => {
                let permissions: BTreeMap<String, Vec<String>> = BTreeMap::from([(
                    user_uuid.clone(),
                    ENDPOINT_PERMISSIONS.iter().map(|p| p.to_string()).collect(),
                )]);
                let endpoint = self
                    .api
                    .create_endpoint(&NewRecordStoreEndpoint {
                        owner: self.admin_uuid.clone(),
                        lrs_name: name.clone(),
                        active: true,
                        strict: false,
                        compatibility_level: 0,
                        verbose_logs: true,
                        permissions,
                    })
                    .await?;
                info!(endpoint = %endpoint.id, "record store endpoint created");
                (endpoint.id, true)
            }
        };

        let keys = self.api.list_access_keys(&name).await?;
        let key_created = if keys.iter().any(|k| k.name == name) {
            false
        } else {
            self.api
                .create_access_key(
                    &name,
                    &NewRecordStoreAccessKey {
                        name: name.clone(),
                        read: true,
                        write: true,
                        jwt: false,
                        enabled: true,
                        advanced_queries: true,
                        limited_read: false,
                        username: tenant.to_string(),
                        password: key_password.to_string(),
                    },
                )
                .await?;
            true
        };

        Ok(RecordStoreOutcome {
            user_uuid,
            endpoint_id,
            user_created,
            endpoint_created,
            key_created,
        })
    }

    /// Delete the tenant's endpoint. `Ok(false)` when there was none.
    #[instrument(skip(self), fields(tenant_id = %tenant))]
    pub async fn remove(&self, tenant: &TenantId) -> TenantResult<bool> {
        let name = record_store_name(tenant);
        let endpoints = self
            .api
            .list_endpoints()
            .await
            .map_err(|e| TenantError::provision("record_store", e))?;

        let Some(endpoint) = endpoints.into_iter().find(|e| e.name == name) else {
            return Ok(false);
        };

        match self.api.delete_endpoint(&endpoint.id).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(TenantError::provision("record_store", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::memory::{CallLog, MemoryRecordStore};

    fn provisioner(api: Arc<MemoryRecordStore>) -> RecordStoreProvisioner {
        RecordStoreProvisioner::new(api, "admin-uuid".into())
    }

    #[tokio::test]
    async fn reuses_existing_user() {
        let api = Arc::new(MemoryRecordStore::new(CallLog::default()));
        let uuid = api.add_user("ops@acme.com");
        let tenant = TenantId::parse("acme").unwrap();

        let outcome = provisioner(api.clone())
            .provision(&tenant, "ops@acme.com", "pw", "kpw")
            .await
            .unwrap();

        assert_eq!(outcome.user_uuid, uuid);
        assert!(!outcome.user_created);
        assert!(outcome.endpoint_created);
        assert_eq!(api.users().len(), 1);

        let endpoint = &api.endpoints()[0];
        assert_eq!(endpoint.owner, "admin-uuid");
        assert_eq!(endpoint.permissions[&uuid].len(), 4);
    }

    #[tokio::test]
    async fn second_run_creates_nothing() {
        let api = Arc::new(MemoryRecordStore::new(CallLog::default()));
        let tenant = TenantId::parse("acme").unwrap();
        let step = provisioner(api.clone());

        let first = step.provision(&tenant, "ops@acme.com", "pw", "kpw").await.unwrap();
        assert!(first.user_created && first.endpoint_created && first.key_created);

        let second = step.provision(&tenant, "ops@acme.com", "pw", "kpw").await.unwrap();
        assert!(!second.user_created && !second.endpoint_created && !second.key_created);
        assert_eq!(second.endpoint_id, first.endpoint_id);
        assert_eq!(api.endpoints().len(), 1);
        assert_eq!(api.access_keys("acme").len(), 1);
        assert_eq!(api.access_keys("acme")[0].password, "kpw");
    }

    #[tokio::test]
    async fn remove_missing_endpoint_is_not_an_error() {
        let api = Arc::new(MemoryRecordStore::new(CallLog::default()));
        api.add_endpoint("globex");
        let removed = provisioner(api.clone())
            .remove(&TenantId::parse("acme").unwrap())
            .await
            .unwrap();
        assert!(!removed);
        assert_eq!(api.endpoints().len(), 1);
    }
}
