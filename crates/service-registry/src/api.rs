use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::{Metadata, RegistryError, ServiceRecord, ServiceRegistry, ServiceStatus, Store};

pub type AppState<S> = Arc<ServiceRegistry<S>>;

type ApiError = (StatusCode, String);

pub const DEFAULT_HEALTHY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STALE_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub service: ServiceRecord,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceIdRequest {
    pub service_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateHealthRequest {
    pub service_id: String,
    pub status: ServiceStatus,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListQuery {
    pub service_type: Option<String>,
    pub status: Option<ServiceStatus>,
}

fn default_healthy_timeout() -> u64 {
    DEFAULT_HEALTHY_TIMEOUT_SECS
}

fn default_stale_timeout() -> u64 {
    DEFAULT_STALE_TIMEOUT_SECS
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthyQuery {
    pub service_type: Option<String>,
    #[serde(default = "default_healthy_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupRequest {
    #[serde(default = "default_stale_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountQuery {
    pub service_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearQuery {
    #[serde(default)]
    pub confirm: bool,
}

/// Build the HTTP router for a registry.
pub fn router<S: Store>(registry: AppState<S>) -> Router {
    Router::new()
        .route("/api/registry/register", post(register::<S>))
        .route("/api/registry/deregister", post(deregister::<S>))
        .route("/api/registry/heartbeat", post(heartbeat::<S>))
        .route("/api/registry/health", post(update_health::<S>))
        .route("/api/registry/services", get(list_services::<S>))
        .route("/api/registry/services/{id}", get(get_service::<S>))
        .route("/api/registry/healthy", get(list_healthy::<S>))
        .route("/api/registry/cleanup", post(cleanup::<S>))
        .route("/api/registry/count", get(count::<S>))
        .route("/api/registry/types", get(types::<S>))
        .route("/api/registry", delete(clear::<S>))
        .route("/health", get(|| async { "OK" }))
        .with_state(registry)
        .layer(TraceLayer::new_for_http())
}

pub fn status_for(error: &RegistryError) -> StatusCode {
    match error {
        RegistryError::Validation(_) => StatusCode::BAD_REQUEST,
        RegistryError::ServiceNotFound(_) => StatusCode::NOT_FOUND,
        e if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(action: &str, error: RegistryError) -> ApiError {
    let status = status_for(&error);
    if status.is_server_error() {
        tracing::error!("Failed to {}: {}", action, error);
    } else {
        tracing::debug!("Rejected {}: {}", action, error);
    }
    (status, error.to_string())
}

pub async fn register<S: Store>(
    State(registry): State<AppState<S>>,
    Json(req): Json<RegisterRequest>,
) -> Result<StatusCode, ApiError> {
    registry
        .register(&req.service)
        .await
        .map_err(|e| failure("register service", e))?;

    tracing::info!("Registered service: {}", req.service.service_id);
    Ok(StatusCode::OK)
}

pub async fn deregister<S: Store>(
    State(registry): State<AppState<S>>,
    Json(req): Json<ServiceIdRequest>,
) -> Result<StatusCode, ApiError> {
    registry
        .deregister(&req.service_id)
        .await
        .map_err(|e| failure("deregister service", e))?;
    Ok(StatusCode::OK)
}

pub async fn heartbeat<S: Store>(
    State(registry): State<AppState<S>>,
    Json(req): Json<ServiceIdRequest>,
) -> Result<StatusCode, ApiError> {
    registry
        .heartbeat(&req.service_id)
        .await
        .map_err(|e| failure("record heartbeat", e))?;
    Ok(StatusCode::OK)
}

pub async fn update_health<S: Store>(
    State(registry): State<AppState<S>>,
    Json(req): Json<UpdateHealthRequest>,
) -> Result<StatusCode, ApiError> {
    registry
        .update_health(&req.service_id, req.status, req.metadata)
        .await
        .map_err(|e| failure("update health", e))?;
    Ok(StatusCode::OK)
}

pub async fn list_services<S: Store>(
    State(registry): State<AppState<S>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ServiceRecord>>, ApiError> {
    let services = registry
        .list(query.service_type.as_deref(), query.status)
        .await
        .map_err(|e| failure("list services", e))?;
    Ok(Json(services))
}

pub async fn get_service<S: Store>(
    State(registry): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<ServiceRecord>, ApiError> {
    let service = registry
        .get(&id)
        .await
        .map_err(|e| failure("get service", e))?;
    Ok(Json(service))
}

pub async fn list_healthy<S: Store>(
    State(registry): State<AppState<S>>,
    Query(query): Query<HealthyQuery>,
) -> Result<Json<Vec<ServiceRecord>>, ApiError> {
    let services = registry
        .list_healthy(
            query.service_type.as_deref(),
            Duration::from_secs(query.timeout_seconds),
        )
        .await
        .map_err(|e| failure("list healthy services", e))?;
    Ok(Json(services))
}

pub async fn cleanup<S: Store>(
    State(registry): State<AppState<S>>,
    Json(req): Json<CleanupRequest>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let removed = registry
        .cleanup_stale(Duration::from_secs(req.timeout_seconds))
        .await
        .map_err(|e| failure("clean up stale services", e))?;
    Ok(Json(CleanupResponse { removed }))
}

pub async fn count<S: Store>(
    State(registry): State<AppState<S>>,
    Query(query): Query<CountQuery>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = registry
        .count(query.service_type.as_deref())
        .await
        .map_err(|e| failure("count services", e))?;
    Ok(Json(CountResponse { count }))
}

pub async fn types<S: Store>(
    State(registry): State<AppState<S>>,
) -> Result<Json<Vec<String>>, ApiError> {
    let types = registry
        .types()
        .await
        .map_err(|e| failure("list service types", e))?;
    Ok(Json(types.into_iter().collect()))
}

pub async fn clear<S: Store>(
    State(registry): State<AppState<S>>,
    Query(query): Query<ClearQuery>,
) -> Result<StatusCode, ApiError> {
    if !query.confirm {
        return Err((
            StatusCode::BAD_REQUEST,
            "clearing the registry requires confirm=true".to_string(),
        ));
    }
    registry
        .clear_all()
        .await
        .map_err(|e| failure("clear registry", e))?;
    Ok(StatusCode::OK)
}
