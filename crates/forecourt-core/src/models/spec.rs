//! Tolerant OpenAPI-style interface description
//!
//! Only the subset the mapper consumes is modeled; unknown fields are
//! ignored and schemas are carried as raw JSON. Maps preserve declaration
//! order so "first declared" rules (e.g. the primary request-body content
//! type) hold.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A machine-readable interface description fetched from a service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSpec {
    /// OpenAPI 3.x version marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openapi: Option<String>,
    /// Swagger 2.x version marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swagger: Option<String>,
    pub info: SpecInfo,
    pub paths: IndexMap<String, PathItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Operations declared under one path, plus path-level shared parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<SpecOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<SpecOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<SpecOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<SpecOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<SpecOperation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<SpecParameter>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecOperation {
    #[serde(default, rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<SpecParameter>,
    #[serde(default, rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<SpecRequestBody>,
    #[serde(default)]
    pub responses: IndexMap<String, SpecResponse>,
}

/// Where an OpenAPI parameter is carried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecParameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: SpecParameterLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecRequestBody {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub content: IndexMap<String, SpecMediaType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecMediaType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecResponse {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<IndexMap<String, SpecMediaType>>,
}
