//! Discovery pipeline and catalog accessor handlers

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use forecourt_core::models::{
    ApiSpec, DiscoveredService, DiscoveryStatus, IntegrationEndpoint, ScanResult,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ServiceListResponse {
    pub count: usize,
    pub items: Vec<DiscoveredService>,
}

#[derive(Debug, Serialize)]
pub struct EndpointListResponse {
    pub count: usize,
    pub items: Vec<IntegrationEndpoint>,
}

#[derive(Debug, Serialize)]
pub struct FullDiscoveryResponse {
    pub scan: ScanResult,
    pub specs: HashMap<String, ApiSpec>,
    pub endpoints: HashMap<String, Vec<IntegrationEndpoint>>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

/// POST /api/discovery/scan
pub async fn scan(State(state): State<AppState>) -> Json<ScanResult> {
    Json(state.discovery.scan_environment().await)
}

/// POST /api/discovery/discover
pub async fn discover(State(state): State<AppState>) -> Json<HashMap<String, ApiSpec>> {
    Json(state.discovery.discover_apis().await)
}

/// POST /api/discovery/map
pub async fn map(
    State(state): State<AppState>,
) -> Json<HashMap<String, Vec<IntegrationEndpoint>>> {
    Json(state.discovery.map_endpoints().await)
}

/// POST /api/discovery/full
pub async fn full(State(state): State<AppState>) -> Json<FullDiscoveryResponse> {
    let result = state.discovery.full_discovery().await;
    Json(FullDiscoveryResponse {
        scan: result.scan,
        specs: result.specs,
        endpoints: result.endpoints,
    })
}

/// GET /api/discovery/services
pub async fn list_services(State(state): State<AppState>) -> Json<ServiceListResponse> {
    let items = state.discovery.services().await;
    Json(ServiceListResponse {
        count: items.len(),
        items,
    })
}

/// GET /api/discovery/services/{service_id}
pub async fn get_service(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
) -> Result<Json<DiscoveredService>, ApiError> {
    Ok(Json(state.discovery.service(&service_id).await?))
}

/// GET /api/discovery/services/{service_id}/endpoints
pub async fn endpoints_by_service(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
) -> Result<Json<EndpointListResponse>, ApiError> {
    let items = state.discovery.endpoints_by_service(&service_id).await?;
    Ok(Json(EndpointListResponse {
        count: items.len(),
        items,
    }))
}

/// GET /api/discovery/endpoints
pub async fn list_endpoints(State(state): State<AppState>) -> Json<EndpointListResponse> {
    let items = state.discovery.all_endpoints().await;
    Json(EndpointListResponse {
        count: items.len(),
        items,
    })
}

/// GET /api/discovery/endpoints/search?q=
pub async fn search_endpoints(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<EndpointListResponse> {
    let items = state.discovery.search_endpoints(&query.q).await;
    Json(EndpointListResponse {
        count: items.len(),
        items,
    })
}

/// GET /api/discovery/endpoints/{endpoint_id}
pub async fn get_endpoint(
    State(state): State<AppState>,
    Path(endpoint_id): Path<String>,
) -> Result<Json<IntegrationEndpoint>, ApiError> {
    Ok(Json(state.discovery.endpoint(&endpoint_id).await?))
}

/// GET /api/discovery/status
pub async fn status(State(state): State<AppState>) -> Json<DiscoveryStatus> {
    Json(state.discovery.status().await)
}

/// GET /api/discovery/last-scan
pub async fn last_scan(State(state): State<AppState>) -> Result<Json<ScanResult>, ApiError> {
    state
        .discovery
        .last_scan()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No scan has completed yet".to_string()))
}
