use std::path::PathBuf;
use std::sync::Arc;

use tenant_core::TenantId;
use tenant_provisioner::clients::memory::{CallLog, MemoryContent, MemoryDatabase};
use tenant_provisioner::steps::{DatabaseProvisioner, SchemaReport};

const SCRIPT: &str = "-- generated by the starter export\n\
CREATE TABLE users (\n  uid INT NOT NULL\n);\n\
INSERT INTO does_not_exist VALUES (1);\n\
INSERT INTO users VALUES (1);\n";

fn fixture() -> (Arc<MemoryDatabase>, DatabaseProvisioner) {
    let log = CallLog::default();
    let database = Arc::new(MemoryDatabase::new(log.clone()));
    let content = Arc::new(MemoryContent::new(log));
    content.put_file("/efs/version/3.0/starter/CMS-Database.sql", SCRIPT);
    database.fail_statements_containing("does_not_exist");

    let provisioner = DatabaseProvisioner::new(
        database.clone(),
        content,
        PathBuf::from("/efs"),
        "10.0.0.0/255.255.0.0".into(),
    );
    (database, provisioner)
}

#[tokio::test]
async fn failing_statement_does_not_abort_the_load() {
    let (database, provisioner) = fixture();
    let tenant = TenantId::parse("acme").unwrap();

    provisioner.provision(&tenant, "perls", "pw").await.unwrap();
    let report = provisioner.load_schema(&tenant, "perls", "3.0").await.unwrap();

    assert_eq!(report, SchemaReport { executed: 2, failed: 1 });
    assert_eq!(
        database.executed(),
        vec![
            "CREATE TABLE users (\n  uid INT NOT NULL\n);".to_string(),
            "INSERT INTO users VALUES (1);".to_string(),
        ]
    );
    assert_eq!(database.commits(), 1);
    assert_eq!(database.grants().len(), 1);
    assert!(database.grants()[0].contains("ON acme_perls.* TO acme@10.0.0.0/255.255.0.0"));
}

#[tokio::test]
async fn schema_needs_the_database() {
    let (_, provisioner) = fixture();
    let tenant = TenantId::parse("acme").unwrap();

    let err = provisioner.load_schema(&tenant, "perls", "3.0").await.unwrap_err();
    assert!(err.to_string().starts_with("schema failed"));
}

#[tokio::test]
async fn second_provision_fails_fast() {
    let (database, provisioner) = fixture();
    let tenant = TenantId::parse("acme").unwrap();

    provisioner.provision(&tenant, "perls", "pw").await.unwrap();
    let err = provisioner.provision(&tenant, "perls", "pw").await.unwrap_err();

    assert!(err.to_string().starts_with("database failed"));
    assert!(database.grants().len() == 1);
}
