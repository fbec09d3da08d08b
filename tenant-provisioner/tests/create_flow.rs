mod common;

use std::path::Path;

use common::*;
use tenant_core::TenantError;
use tenant_provisioner::clients::memory::MemorySecrets;
use tenant_provisioner::clients::StackDescription;
use tenant_queue::JobStatus;

#[tokio::test]
async fn create_provisions_every_resource() {
    let world = seeded_world();
    let app = start(&world).await;

    let outcome = app.saga.create(create_request("Acme")).await.unwrap();
    assert_eq!(outcome.status, "provisioning");
    assert_eq!(outcome.tenant, "acme");

    let jobs = settled_jobs(&app.saga, "acme", 4).await;
    assert_all_completed(&jobs);
    let mut types: Vec<_> = jobs.iter().map(|j| j.message.job_type.as_str()).collect();
    types.sort();
    assert_eq!(
        types,
        vec!["admin_bootstrap", "provision_database", "provision_record_store", "provision_stack"]
    );

    // Secrets
    assert_eq!(
        world.secrets.names(),
        vec![
            "acme_cron_key",
            "acme_db_password",
            "acme_lrs_key_password",
            "acme_smtp_password",
            "acme_user_password",
        ]
    );

    // Stack
    let stack = world.stacks.get("acme").unwrap();
    assert_eq!(stack.tags["Tenant"], "acme");
    assert_eq!(stack.parameters.len(), 19);
    assert_eq!(stack.parameters["VERSION"], VERSION);
    assert_eq!(stack.parameters["BRAND"], "perls");
    assert_eq!(stack.parameters["PRIORITY"], "8");
    assert_eq!(stack.parameters["SMTPPORT"], "587");
    assert_eq!(stack.parameters["SMTPPROTOCOL"], "tls");
    assert_eq!(stack.parameters["ADDRESS"], "acme.perls.example.com");
    assert_eq!(stack.parameters["LRSHOST"], "https://lrs.example.com/acme/xapi/");
    assert_eq!(stack.parameters["DBPASSWORDARN"], MemorySecrets::arn("acme_db_password"));
    let request = &world.stacks.requests()[0];
    assert_eq!(
        request.template_url,
        "https://perls-content.s3.amazonaws.com/2.4.1/code/scripts/tenant.yml"
    );
    assert_eq!(request.capabilities, vec!["CAPABILITY_NAMED_IAM".to_string()]);

    // Database
    assert!(world.database.has_user("acme", ACCESS_HOST));
    assert!(world.database.has_database("acme_perls"));
    assert_eq!(world.database.executed().len(), 2);
    assert_eq!(world.database.commits(), 1);

    // Record store
    let endpoints = world.record_store.endpoints();
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0].lrs_name, "acme");
    assert_eq!(endpoints[0].owner, "admin-uuid");
    let keys = world.record_store.access_keys("acme");
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].username, "acme");
    assert_eq!(Some(keys[0].password.clone()), world.secrets.value("acme_lrs_key_password"));

    // Content
    assert_eq!(
        world.content.file(Path::new("/mnt/efs/acme/public/index.html")).as_deref(),
        Some("<html/>")
    );
    assert!(world.content.has_path(Path::new("/mnt/efs/acme/private")));
    assert!(world.content.has_path(Path::new("/mnt/efs/acme/solr")));

    // Admin task
    let runs = world.tasks.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].task_definition, "acme-php-admin-task");
    assert_eq!(runs[0].cluster, "perls-cluster");
    assert_eq!(runs[0].subnets, vec!["subnet-a".to_string(), "subnet-b".to_string()]);
    let cron_key = world.secrets.value("acme_cron_key").unwrap();
    assert_eq!(
        runs[0].command,
        vec![
            "sh",
            "/var/www/html/admin_api/create_cms.sh",
            "-u",
            "acme_admin",
            "-e",
            "owner@example.com",
            "-n",
            "Olive Owner",
            "-c",
            cron_key.as_str(),
        ]
    );

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn supplied_smtp_password_is_stored_verbatim() {
    let world = seeded_world();
    let app = start(&world).await;

    let mut request = create_request("acme");
    request.smtp_password = Some("hunter2hunter2".into());
    app.saga.create(request).await.unwrap();

    assert_eq!(world.secrets.value("acme_smtp_password").as_deref(), Some("hunter2hunter2"));
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn existing_tenant_is_rejected_without_mutation() {
    let world = seeded_world();
    world.stacks.insert(StackDescription {
        name: "acme".into(),
        status: "CREATE_COMPLETE".into(),
        ..Default::default()
    });
    world.secrets.insert("acme_db_password", "original");
    let app = start(&world).await;

    let err = app.saga.create(create_request("acme")).await.unwrap_err();
    assert!(matches!(err, TenantError::TenantExists(ref t) if t == "acme"));

    assert!(world.log.mutations().is_empty(), "{:?}", world.log.mutations());
    assert_eq!(world.secrets.value("acme_db_password").as_deref(), Some("original"));
    assert!(app.saga.jobs("acme").await.unwrap().is_empty());
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_version_touches_nothing_else() {
    let world = seeded_world();
    let app = start(&world).await;

    let mut request = create_request("acme");
    request.version = "9.9.9".into();
    let err = app.saga.create(request).await.unwrap_err();

    assert!(matches!(err, TenantError::UnknownVersion(ref v) if v == "9.9.9"));
    assert_eq!(world.log.entries(), vec!["objects.has_prefix 9.9.9/".to_string()]);
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn invalid_input_is_rejected_before_any_call() {
    let world = seeded_world();
    let app = start(&world).await;

    let bad_inputs = [
        ("tenant", "acme-corp"),
        ("tenant", ""),
        ("email", "not-an-email"),
        ("brand", "perls; DROP DATABASE x"),
        ("full_name", ""),
    ];
    for (field, value) in bad_inputs {
        let mut body = create_body("acme");
        body[field] = value.into();
        let request = serde_json::from_value(body).unwrap();
        let err = app.saga.create(request).await.unwrap_err();
        assert!(matches!(err, TenantError::Validation(_)), "{field}={value:?} gave {err:?}");
    }

    let mut body = create_body("acme");
    body["email"] = format!("{}@example.com", "a".repeat(70)).into();
    let err = app.saga.create(serde_json::from_value(body).unwrap()).await.unwrap_err();
    assert!(matches!(err, TenantError::Validation(_)));

    assert!(world.log.entries().is_empty());
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_base_stack_is_fatal() {
    let world = seeded_world();
    let app = start(&world).await;
    let mut config = config();
    config.base_stack = "gone".into();
    let saga = tenant_provisioner::Saga::new(
        std::sync::Arc::new(config),
        &world.collaborators(),
        app.saga.dispatcher().clone(),
    );

    let err = saga.create(create_request("acme")).await.unwrap_err();
    assert!(matches!(err, TenantError::BaseStackMissing(ref b) if b == "gone"));
    assert!(world.secrets.names().is_empty());
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn failed_step_is_visible_in_job_records() {
    let world = seeded_world();
    // A base stack without network outputs.
    world.stacks.insert(StackDescription {
        name: BASE_STACK.into(),
        status: "UPDATE_COMPLETE".into(),
        ..Default::default()
    });
    let app = start(&world).await;

    let outcome = app.saga.create(create_request("acme")).await.unwrap();
    let jobs = settled_jobs(&app.saga, "acme", 3).await;

    let stack_job = app
        .saga
        .job("acme", &outcome.jobs.provision_stack.to_string())
        .await
        .unwrap();
    assert!(matches!(stack_job.status, JobStatus::Failed { .. }));
    assert!(stack_job.last_error.unwrap().contains("base stack"));
    assert!(world.stacks.get("acme").is_none());

    // The other steps are independent and still complete.
    assert_eq!(
        jobs.iter()
            .filter(|j| matches!(j.status, JobStatus::Completed { .. }))
            .count(),
        2
    );
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn slow_stack_does_not_hold_up_other_steps() {
    let world = seeded_world();
    world.stacks.create_as("CREATE_IN_PROGRESS");
    let mut config = config();
    config.queue_max_workers = 1;
    config.queue_admin_workers = 1;
    let app = tenant_provisioner::ProvisionerApp::build(config, world.collaborators())
        .await
        .unwrap();

    app.saga.create(create_request("acme")).await.unwrap();

    // Database and record store settle while the admin task still waits on the stack.
    let jobs = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        loop {
            let jobs = app.saga.jobs("acme").await.unwrap();
            let done = |job_type: &str| {
                jobs.iter().any(|j| {
                    j.message.job_type == job_type && matches!(j.status, JobStatus::Completed { .. })
                })
            };
            let admin_dispatched = jobs.iter().any(|j| j.message.job_type == "admin_bootstrap");
            if admin_dispatched && done("provision_database") && done("provision_record_store") {
                return jobs;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("independent steps settle");
    let admin = jobs
        .iter()
        .find(|j| j.message.job_type == "admin_bootstrap")
        .expect("admin task dispatched");
    assert!(!admin.status.is_terminal());
    assert!(world.tasks.runs().is_empty());

    world.stacks.set_status("acme", "CREATE_COMPLETE");
    let jobs = settled_jobs(&app.saga, "acme", 4).await;
    assert_all_completed(&jobs);
    assert_eq!(world.tasks.runs().len(), 1);

    app.shutdown().await.unwrap();
}
