//! Normalized endpoint catalog produced by spec mapping, plus scan results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::service::{DiscoveredService, ServiceKind, ServiceStatus};

/// HTTP methods the mapper recognizes
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

/// Where an endpoint parameter is carried; `body` marks pseudo-parameters
/// derived from a declared request body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
    Body,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointParameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    #[serde(default)]
    pub schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointRequestBody {
    pub required: bool,
    /// First content type the spec declares for the body
    pub content_type: String,
    #[serde(default)]
    pub schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointResponse {
    pub status: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

/// One callable operation from a discovered spec, normalized for invocation
///
/// Rebuilt wholesale on every mapping pass. Ids are regenerated
/// deterministically from service + operation, but the content behind an id
/// may shift between scans, so holders should re-resolve rather than cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationEndpoint {
    /// `{service_id}_{operation_id}`
    pub id: String,
    pub service_id: String,
    pub service_name: String,
    pub service_kind: ServiceKind,
    pub path: String,
    pub method: HttpMethod,
    pub operation_id: String,
    pub summary: String,
    pub description: String,
    pub tags: Vec<String>,
    pub parameters: Vec<EndpointParameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<EndpointRequestBody>,
    pub responses: Vec<EndpointResponse>,
    /// Base URL and path concatenated verbatim; path parameters are
    /// substituted by the caller at invocation time
    pub full_url: String,
    pub registered_at: DateTime<Utc>,
}

/// Per-service failure captured during a scan
///
/// Probing swallows network failures into an offline status, so an entry
/// here means the orchestration itself failed unexpectedly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanError {
    pub service: String,
    pub port: u16,
    pub error: String,
}

/// Point-in-time result of one environment scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub success: bool,
    pub scan_started: DateTime<Utc>,
    pub scan_completed: DateTime<Utc>,
    pub duration_ms: i64,
    pub services_scanned: usize,
    pub services_online: usize,
    pub services_offline: usize,
    pub total_endpoints: usize,
    pub services: Vec<DiscoveredService>,
    pub errors: Vec<ScanError>,
}

/// Aggregate discovery status exposed to the API layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scan: Option<DateTime<Utc>>,
    pub services_online: usize,
    pub services_offline: usize,
    pub total_endpoints: usize,
    pub services: Vec<ServiceEndpointCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpointCount {
    pub id: String,
    pub name: String,
    pub status: ServiceStatus,
    pub endpoints: usize,
}
