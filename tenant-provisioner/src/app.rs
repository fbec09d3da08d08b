use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tenant_core::TenantResult;
use tenant_queue::QueueConfig;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::task::JoinHandle;
use tracing::info;

use crate::background::{DispatchWorkers, Dispatcher};
use crate::clients::aws::{
    load_sdk_config, CloudFormationStacks, EcsTasks, ListenerRules, S3Versions, SecretsManagerStore,
};
use crate::clients::fs::LocalContentStore;
use crate::clients::mysql::{AdminLogin, MySqlAdmin};
use crate::clients::record_store::HttpRecordStore;
use crate::clients::{Collaborators, SecretStore};
use crate::config::SagaConfig;
use crate::http;
use crate::saga::Saga;

const DB_ADMIN_CONNECTIONS: u32 = 5;

/// A running provisioner: the saga, its router and the workers draining
/// dispatched steps.
pub struct ProvisionerApp {
    pub saga: Arc<Saga>,
    pub router: Router,
    workers: DispatchWorkers,
    event_log: JoinHandle<()>,
}

impl ProvisionerApp {
    pub async fn build(config: SagaConfig, collaborators: Collaborators) -> TenantResult<Self> {
        let queue = QueueConfig {
            max_workers: config.queue_max_workers,
            ..QueueConfig::default()
        };
        let dispatcher = Dispatcher::new(queue, config.queue_admin_workers).await?;
        let saga = Arc::new(Saga::new(Arc::new(config), &collaborators, dispatcher));

        let workers = saga.dispatcher().start(saga.job_context());
        let event_log = saga.dispatcher().spawn_event_log();
        let router = http::router(saga.clone());

        Ok(Self {
            saga,
            router,
            workers,
            event_log,
        })
    }

    /// Serve until ctrl-c, then let in-flight steps run to completion.
    pub async fn listen<A: ToSocketAddrs>(self, addr: A) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "tenant provisioner listening");

        axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;

        self.shutdown().await?;
        Ok(())
    }

    /// Running steps are never cancelled; this returns once they settle.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.workers.shutdown().await?;
        self.event_log.abort();
        Ok(())
    }
}

/// Wire the real cloud, database, record-store and filesystem clients.
pub async fn production_collaborators(config: &SagaConfig) -> anyhow::Result<Collaborators> {
    let sdk = load_sdk_config().await;
    let secrets = Arc::new(SecretsManagerStore::new(&sdk));

    let raw_login = secrets
        .get_secret(&config.db_admin_secret)
        .await
        .with_context(|| format!("reading {}", config.db_admin_secret))?;
    let login: AdminLogin = serde_json::from_str(&raw_login).context("parsing database admin login")?;

    let record_store = HttpRecordStore::new(
        &config.lrs_base_url,
        &config.lrs_api_key_header,
        &config.lrs_api_key,
        config.lrs_timeout,
    )?;

    Ok(Collaborators {
        stacks: Arc::new(CloudFormationStacks::new(&sdk)),
        secrets,
        tasks: Arc::new(EcsTasks::new(&sdk)),
        database: Arc::new(MySqlAdmin::connect_lazy(&login, DB_ADMIN_CONNECTIONS)),
        objects: Arc::new(S3Versions::new(&sdk, &config.content_bucket)),
        record_store: Arc::new(record_store),
        routing: Arc::new(ListenerRules::new(&sdk)),
        content: Arc::new(LocalContentStore::new()),
    })
}
