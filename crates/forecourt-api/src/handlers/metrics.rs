//! Metrics and trend handlers

use axum::extract::{Query, State};
use axum::Json;
use forecourt_core::models::{AutoTrendPoint, EnterpriseMetrics, FuelTrendPoint, Period};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    #[serde(default)]
    pub period: Option<Period>,
}

#[derive(Debug, Deserialize)]
pub struct FuelTrendQuery {
    pub site_id: String,
    #[serde(default = "default_days")]
    pub days: u32,
}

#[derive(Debug, Deserialize)]
pub struct AutoTrendQuery {
    pub shop_id: String,
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    30
}

/// GET /api/metrics/enterprise?period=
pub async fn enterprise(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<EnterpriseMetrics>, ApiError> {
    let period = query.period.unwrap_or(Period::Daily);
    Ok(Json(state.metrics.enterprise_metrics(period).await?))
}

/// GET /api/metrics/fuel-trends?site_id=&days=
pub async fn fuel_trends(
    State(state): State<AppState>,
    Query(query): Query<FuelTrendQuery>,
) -> Result<Json<Vec<FuelTrendPoint>>, ApiError> {
    Ok(Json(
        state.metrics.fuel_trends(&query.site_id, query.days).await?,
    ))
}

/// GET /api/metrics/auto-trends?shop_id=&days=
pub async fn auto_trends(
    State(state): State<AppState>,
    Query(query): Query<AutoTrendQuery>,
) -> Result<Json<Vec<AutoTrendPoint>>, ApiError> {
    Ok(Json(
        state.metrics.auto_trends(&query.shop_id, query.days).await?,
    ))
}
