use anyhow::Result;
use tenant_provisioner::{production_collaborators, ProvisionerApp, SagaConfig};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    let filter = EnvFilter::from_default_env();

    if std::env::var("TENANT_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = SagaConfig::from_env()?;
    let addr = config.http_addr();

    let collaborators = production_collaborators(&config).await?;
    let app = ProvisionerApp::build(config, collaborators).await?;

    app.listen(addr).await
}
