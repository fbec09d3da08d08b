#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{json, Value};
use tenant_provisioner::clients::memory::MemoryWorld;
use tenant_provisioner::clients::StackDescription;
use tenant_provisioner::saga::CreateTenantRequest;
use tenant_provisioner::{ProvisionerApp, Saga, SagaConfig};
use tenant_queue::{JobRecord, JobStatus};

pub const BASE_STACK: &str = "perls-base";
pub const VERSION: &str = "2.4.1";
pub const NEXT_VERSION: &str = "2.5.0";
pub const LISTENER_ARN: &str = "arn:aws:elasticloadbalancing:memory:listener/app/443";
pub const ACCESS_HOST: &str = "10.0.0.0/255.255.0.0";

pub const SCHEMA: &str = "-- starter schema\n\
CREATE TABLE node (id INT);\n\
INSERT INTO missing_table VALUES (1);\n\
INSERT INTO node VALUES (1);\n";

pub fn config() -> SagaConfig {
    SagaConfig {
        base_stack: BASE_STACK.into(),
        content_bucket: "perls-content".into(),
        project: "perls".into(),
        sns_topic: "arn:aws:sns:memory:alerts".into(),
        tenant_domain: "perls.example.com".into(),
        firebase_key: "fb-key".into(),
        firebase_id: "fb-id".into(),
        listener_logical_id: "AppLBListener443".into(),
        stack_ready_timeout: Duration::from_secs(2),
        stack_poll_interval: Duration::from_millis(10),
        db_admin_secret: "rds_admin_login".into(),
        db_access_host: ACCESS_HOST.into(),
        lrs_base_url: "https://lrs.example.com/".into(),
        lrs_api_key: "lrs-key".into(),
        lrs_admin_uuid: "admin-uuid".into(),
        lrs_api_key_header: "x-veracity-api-key".into(),
        lrs_timeout: Duration::from_secs(5),
        content_root: PathBuf::from("/mnt/efs"),
        admin_platform_version: "1.4.0".into(),
        admin_init_script: "/var/www/html/admin_api/create_cms.sh".into(),
        admin_export_timeout: Duration::from_secs(2),
        admin_poll_interval: Duration::from_millis(10),
        queue_max_workers: 4,
        queue_admin_workers: 2,
        http_host: "127.0.0.1".into(),
        http_port: 0,
    }
}

/// A world with the base stack, two published versions, starter content and
/// a couple of existing routing rules. The call log starts empty.
pub fn seeded_world() -> MemoryWorld {
    let world = MemoryWorld::new();

    world.stacks.insert(StackDescription {
        name: BASE_STACK.into(),
        status: "UPDATE_COMPLETE".into(),
        outputs: [
            ("PrivateSubnet1", "subnet-a"),
            ("PrivateSubnet2", "subnet-b"),
            ("ECSCluster", "perls-cluster"),
            ("SGECSTasks", "sg-tasks"),
            ("VpcId", "vpc-1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
        ..Default::default()
    });
    world.stacks.insert_resource(BASE_STACK, "AppLBListener443", LISTENER_ARN);

    for version in [VERSION, NEXT_VERSION] {
        world.objects.put(&format!("{version}/code/scripts/tenant.yml"));
        let starter = format!("/mnt/efs/version/{version}/starter");
        world.content.put_file(format!("{starter}/public/index.html"), "<html/>");
        world.content.put_file(format!("{starter}/CMS-Database.sql"), SCHEMA);
        world.content.put_file(format!("{starter}/solr.tar.gz"), "gz");
    }

    world.routing.add_rule("3");
    world.routing.add_rule("7");
    world.database.fail_statements_containing("missing_table");

    world.log.clear();
    world
}

pub async fn start(world: &MemoryWorld) -> ProvisionerApp {
    ProvisionerApp::build(config(), world.collaborators())
        .await
        .expect("app builds")
}

pub fn create_body(tenant: &str) -> Value {
    json!({
        "tenant": tenant,
        "version": VERSION,
        "brand": "perls",
        "email": "owner@example.com",
        "full_name": "Olive Owner",
        "smtp_username": "mailer",
        "smtp_host": "smtp.example.com",
        "smtp_from": "noreply@example.com",
        "smtp_port": "587"
    })
}

pub fn create_request(tenant: &str) -> CreateTenantRequest {
    serde_json::from_value(create_body(tenant)).expect("valid request body")
}

/// Poll until `expected` jobs exist for the tenant and all of them settled.
pub async fn settled_jobs(saga: &Saga, tenant: &str, expected: usize) -> Vec<JobRecord> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let jobs = saga.jobs(tenant).await.expect("jobs listed");
            if jobs.len() >= expected && jobs.iter().all(|j| j.status.is_terminal()) {
                return jobs;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("jobs settle in time")
}

pub fn assert_all_completed(jobs: &[JobRecord]) {
    for job in jobs {
        assert!(
            matches!(job.status, JobStatus::Completed { .. }),
            "{} ended as {:?}",
            job.message.job_type,
            job.status
        );
    }
}

/// Create a tenant and wait for every provisioning step, admin task included.
pub async fn provisioned(app: &ProvisionerApp, tenant: &str) {
    app.saga.create(create_request(tenant)).await.expect("create accepted");
    let jobs = settled_jobs(&app.saga, tenant, 4).await;
    assert_all_completed(&jobs);
}
