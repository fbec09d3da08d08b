mod common;

use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use common::*;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tenant_provisioner::clients::StackDescription;
use tower::ServiceExt;

async fn json_body(res: Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    router.clone().oneshot(request).await.unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let world = seeded_world();
    let app = start(&world).await;

    let res = send(&app.router, "GET", "/health", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn create_is_accepted_with_job_ids() {
    let world = seeded_world();
    let app = start(&world).await;

    let res = send(&app.router, "POST", "/tenants", Some(create_body("acme"))).await;
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    assert!(res.headers().get("x-request-id").is_some());

    let body = json_body(res).await;
    assert_eq!(body["status"], "provisioning");
    assert_eq!(body["tenant"], "acme");
    let stack_job = body["jobs"]["provision_stack"].as_str().unwrap().to_string();

    let res = send(&app.router, "GET", &format!("/tenants/acme/jobs/{stack_job}"), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let job = json_body(res).await;
    assert_eq!(job["message"]["job_type"], "provision_stack");

    let res = send(&app.router, "GET", &format!("/tenants/globex/jobs/{stack_job}"), None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(res).await["name"], "JobNotFoundError");

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn job_payloads_never_carry_secret_values() {
    let world = seeded_world();
    let app = start(&world).await;
    provisioned(&app, "acme").await;

    let res = send(&app.router, "GET", "/tenants/acme/jobs", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let text = json_body(res).await.to_string();
    for name in world.secrets.names() {
        let value = world.secrets.value(&name).unwrap();
        assert!(!text.contains(&value), "{name} leaked");
    }
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let world = seeded_world();
    let app = start(&world).await;

    let res = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tenants")
                .header("content-type", "application/json")
                .body(Body::from("{\"tenant\":\"acme\""))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = json_body(res).await;
    assert_eq!(body["name"], "ValidationError");
    assert_eq!(body["code"], 400);
    assert_eq!(body["className"], "bad-request");
    assert!(world.log.entries().is_empty());
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn port_zero_is_rejected() {
    let world = seeded_world();
    let app = start(&world).await;

    let mut body = create_body("acme");
    body["smtp_port"] = json!(0);
    let res = send(&app.router, "POST", "/tenants", Some(body)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn taxonomy_maps_to_status_codes() {
    let world = seeded_world();
    let app = start(&world).await;
    provisioned(&app, "acme").await;

    let res = send(&app.router, "POST", "/tenants", Some(create_body("acme"))).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(res).await["name"], "TenantExistsError");

    let mut body = create_body("globex");
    body["version"] = json!("0.0.1");
    let res = send(&app.router, "POST", "/tenants", Some(body)).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(res).await["name"], "UnknownVersionError");

    let res = send(&app.router, "GET", "/tenants/ghost", None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body = json_body(res).await;
    assert_eq!(body["name"], "TenantNotFoundError");
    assert_eq!(body["className"], "not-found");

    let res = send(&app.router, "PUT", "/tenants/ghost", Some(json!({"version": VERSION}))).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn read_side_endpoints() {
    let world = seeded_world();
    let app = start(&world).await;
    provisioned(&app, "acme").await;

    let res = send(&app.router, "GET", "/versions", None).await;
    assert_eq!(json_body(res).await, json!({"versions": [VERSION, NEXT_VERSION]}));

    let res = send(&app.router, "GET", "/tenants/acme", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        json_body(res).await,
        json!({"name": "acme", "status": "CREATE_COMPLETE", "version": VERSION})
    );

    let res = send(&app.router, "GET", "/tenants", None).await;
    let body = json_body(res).await;
    let names: Vec<_> = body["tenants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["acme"]);

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn update_over_http() {
    let world = seeded_world();
    let app = start(&world).await;
    provisioned(&app, "acme").await;

    let res = send(
        &app.router,
        "PUT",
        "/tenants/acme",
        Some(json!({"version": NEXT_VERSION, "smtp_port": "2525"})),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["status"], "updating");
    assert!(body["admin_job"].is_string());

    let parameters = world.stacks.get("acme").unwrap().parameters;
    assert_eq!(parameters["VERSION"], NEXT_VERSION);
    assert_eq!(parameters["SMTPPORT"], "2525");
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn delete_reports_deleted_or_partial() {
    let world = seeded_world();
    let app = start(&world).await;
    provisioned(&app, "acme").await;

    let res = send(&app.router, "DELETE", "/tenants/acme", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["status"], "deleted");
    assert_eq!(body["steps"][0], json!({"step": "record_store", "outcome": "done"}));

    world.stacks.insert(StackDescription {
        name: "globex".into(),
        status: "CREATE_COMPLETE".into(),
        ..Default::default()
    });
    let res = send(&app.router, "DELETE", "/tenants/globex", None).await;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(res).await;
    assert_eq!(body["status"], "partial");
    let failed: Vec<_> = body["steps"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["outcome"] == "failed")
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["step"], "database");
    assert!(failed[0]["error"].is_string());

    let res = send(&app.router, "DELETE", "/tenants/acme", None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn request_id_is_preserved_when_provided() {
    let world = seeded_world();
    let app = start(&world).await;

    let provided = HeaderValue::from_static("req-test-123");
    let res = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", provided.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.headers().get("x-request-id"), Some(&provided));
    app.shutdown().await.unwrap();
}
