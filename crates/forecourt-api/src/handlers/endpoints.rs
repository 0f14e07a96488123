//! Polled endpoint catalog handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use forecourt_aggregate::health;
use forecourt_core::models::{
    AuthConfig, DataCategory, EndpointHealth, EndpointSummary, FieldMapping, HttpMethod,
    PolledEndpoint,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthListResponse {
    pub count: usize,
    pub items: Vec<EndpointHealth>,
}

/// Request to register an endpoint for polling
#[derive(Debug, Deserialize)]
pub struct RegisterEndpointRequest {
    pub name: String,
    pub source_system: String,
    pub category: DataCategory,
    pub base_url: String,
    pub path: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default = "default_method")]
    pub method: HttpMethod,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub mappings: Vec<FieldMapping>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default = "default_enabled")]
    pub polling_enabled: bool,
}

fn default_method() -> HttpMethod {
    HttpMethod::Get
}

fn default_enabled() -> bool {
    true
}

/// GET /api/endpoints/health
pub async fn endpoint_health(
    State(state): State<AppState>,
) -> Result<Json<HealthListResponse>, ApiError> {
    let endpoints = state.catalog.list_endpoints().await?;
    let items = health::endpoint_health(&endpoints);
    Ok(Json(HealthListResponse {
        count: items.len(),
        items,
    }))
}

/// GET /api/endpoints/summary
pub async fn endpoint_summary(
    State(state): State<AppState>,
) -> Result<Json<EndpointSummary>, ApiError> {
    let endpoints = state.catalog.list_endpoints().await?;
    Ok(Json(health::endpoint_summary(&endpoints)))
}

/// POST /api/endpoints
pub async fn register_endpoint(
    State(state): State<AppState>,
    Json(request): Json<RegisterEndpointRequest>,
) -> Result<(StatusCode, Json<PolledEndpoint>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }

    let mut endpoint = PolledEndpoint::new(
        request.name,
        request.source_system,
        request.category,
        request.base_url,
        request.path,
        request.method,
        request
            .poll_interval_secs
            .unwrap_or(state.polling.default_interval_secs),
    );
    endpoint.description = request.description;
    endpoint.site_id = request.site_id;
    endpoint.auth = request.auth;
    endpoint.mappings = request.mappings;
    endpoint.polling_enabled = request.polling_enabled;

    state.poller.register_endpoint(endpoint.clone()).await?;
    Ok((StatusCode::CREATED, Json(endpoint)))
}

/// DELETE /api/endpoints/{endpoint_id}
pub async fn unregister_endpoint(
    State(state): State<AppState>,
    Path(endpoint_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.poller.unregister_endpoint(&endpoint_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/endpoints/{endpoint_id}/refresh
///
/// Forces one immediate poll tick outside the schedule and returns the
/// endpoint's refreshed health state.
pub async fn refresh_endpoint(
    State(state): State<AppState>,
    Path(endpoint_id): Path<String>,
) -> Result<Json<PolledEndpoint>, ApiError> {
    state.poller.refresh_endpoint(&endpoint_id).await?;
    state
        .catalog
        .endpoint(&endpoint_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Endpoint not found: {endpoint_id}")))
}
