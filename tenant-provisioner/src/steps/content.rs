use std::path::PathBuf;
use std::sync::Arc;

use tenant_core::{StarterPaths, TenantError, TenantId, TenantPaths, TenantResult};
use tracing::{info, instrument};

use crate::clients::{ClientError, ContentStore};

pub struct ContentBootstrapper {
    store: Arc<dyn ContentStore>,
    root: PathBuf,
}

impl ContentBootstrapper {
    pub fn new(store: Arc<dyn ContentStore>, root: PathBuf) -> Self {
        Self { store, root }
    }

    /// Private dir, public template copy, search index. Not retried; an
    /// existing private dir means a previous run got here first.
    #[instrument(skip(self), fields(tenant_id = %tenant))]
    pub async fn bootstrap(&self, tenant: &TenantId, version: &str) -> TenantResult<()> {
        let starter = StarterPaths::new(&self.root, version);
        let paths = TenantPaths::new(&self.root, tenant);
        let fail = |e: ClientError| TenantError::provision("content", e);

        self.store.create_dir(&paths.private).await.map_err(fail)?;
        self.store
            .copy_tree(&starter.public, &paths.public)
            .await
            .map_err(fail)?;
        self.store
            .extract_archive(&starter.search_archive, &paths.search)
            .await
            .map_err(fail)?;

        info!(path = %paths.root.display(), "content bootstrapped");
        Ok(())
    }

    /// Remove the tenant's whole content area. `Ok(false)` when absent.
    #[instrument(skip(self), fields(tenant_id = %tenant))]
    pub async fn remove(&self, tenant: &TenantId) -> TenantResult<bool> {
        let paths = TenantPaths::new(&self.root, tenant);
        if tenant.as_str().trim().is_empty() || paths.root == self.root {
            return Err(TenantError::validation("refusing to remove the content root"));
        }

        match self.store.remove_tree(&paths.root).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(TenantError::provision("content", e)),
        }
    }
}
