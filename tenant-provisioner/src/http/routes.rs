use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tenant_queue::JobRecord;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use super::ApiResult;
use crate::saga::{
    CreateOutcome, CreateTenantRequest, Saga, TenantStatus, TenantSummary, UpdateReport, UpdateTenantRequest,
};

type SagaState = State<Arc<Saga>>;

/// Every route, with request ids generated when absent and echoed back.
pub fn router(saga: Arc<Saga>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/versions", get(versions))
        .route("/tenants", get(list_tenants).post(create_tenant))
        .route(
            "/tenants/{tenant}",
            get(get_tenant).put(update_tenant).delete(delete_tenant),
        )
        .route("/tenants/{tenant}/jobs", get(list_jobs))
        .route("/tenants/{tenant}/jobs/{job_id}", get(get_job))
        .with_state(saga)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

async fn health() -> &'static str {
    "ok"
}

async fn versions(State(saga): SagaState) -> ApiResult<Json<Value>> {
    let versions = saga.versions().await?;
    Ok(Json(json!({ "versions": versions })))
}

async fn list_tenants(State(saga): SagaState) -> ApiResult<Json<TenantSummary>> {
    Ok(Json(saga.tenants().await?))
}

async fn create_tenant(
    State(saga): SagaState,
    body: Result<Json<CreateTenantRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateOutcome>)> {
    let Json(request) = body?;
    let outcome = saga.create(request).await?;
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

async fn get_tenant(State(saga): SagaState, Path(tenant): Path<String>) -> ApiResult<Json<TenantStatus>> {
    Ok(Json(saga.tenant(&tenant).await?))
}

async fn update_tenant(
    State(saga): SagaState,
    Path(tenant): Path<String>,
    body: Result<Json<UpdateTenantRequest>, JsonRejection>,
) -> ApiResult<Json<UpdateReport>> {
    let Json(request) = body?;
    Ok(Json(saga.update(&tenant, request).await?))
}

async fn delete_tenant(State(saga): SagaState, Path(tenant): Path<String>) -> ApiResult<Response> {
    let report = saga.delete(&tenant).await?;
    let status = if report.is_complete() {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    Ok((status, Json(report)).into_response())
}

async fn list_jobs(State(saga): SagaState, Path(tenant): Path<String>) -> ApiResult<Json<Vec<JobRecord>>> {
    Ok(Json(saga.jobs(&tenant).await?))
}

async fn get_job(
    State(saga): SagaState,
    Path((tenant, job_id)): Path<(String, String)>,
) -> ApiResult<Json<JobRecord>> {
    Ok(Json(saga.job(&tenant, &job_id).await?))
}
