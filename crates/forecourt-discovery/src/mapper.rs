//! Spec-to-catalog endpoint mapping
//!
//! A pure function of the service identity and its spec: no network I/O,
//! deterministic output for the same inputs.

use chrono::{DateTime, Utc};
use forecourt_core::models::{
    ApiSpec, DiscoveredService, EndpointParameter, EndpointRequestBody, EndpointResponse,
    HttpMethod, IntegrationEndpoint, ParameterLocation, SpecOperation, SpecParameter,
    SpecParameterLocation,
};
use serde_json::Value;

/// Produce the full endpoint list for a service from its validated spec.
///
/// One endpoint per (path, method) pair, for every method present under the
/// path.
pub fn map_endpoints(service: &DiscoveredService, spec: &ApiSpec) -> Vec<IntegrationEndpoint> {
    let registered_at = Utc::now();
    let mut endpoints = Vec::new();

    for (path, item) in &spec.paths {
        let operations: [(HttpMethod, &Option<SpecOperation>); 5] = [
            (HttpMethod::Get, &item.get),
            (HttpMethod::Post, &item.post),
            (HttpMethod::Put, &item.put),
            (HttpMethod::Delete, &item.delete),
            (HttpMethod::Patch, &item.patch),
        ];

        for (method, operation) in operations {
            let Some(operation) = operation else { continue };
            endpoints.push(endpoint_from_operation(
                service,
                path,
                method,
                operation,
                &item.parameters,
                registered_at,
            ));
        }
    }

    endpoints
}

fn endpoint_from_operation(
    service: &DiscoveredService,
    path: &str,
    method: HttpMethod,
    operation: &SpecOperation,
    path_params: &[SpecParameter],
    registered_at: DateTime<Utc>,
) -> IntegrationEndpoint {
    // Path-level parameters first, operation-level after: a same-named
    // operation parameter overwrites the path-level one.
    let mut parameters: Vec<EndpointParameter> = Vec::new();
    for param in path_params.iter().chain(operation.parameters.iter()) {
        let mapped = EndpointParameter {
            name: param.name.clone(),
            location: convert_location(param.location),
            required: param.required,
            schema: param.schema.clone().unwrap_or_else(empty_schema),
            description: param.description.clone(),
        };
        match parameters.iter_mut().find(|p| p.name == mapped.name) {
            Some(existing) => *existing = mapped,
            None => parameters.push(mapped),
        }
    }

    let request_body = operation.request_body.as_ref().map(|body| {
        let (content_type, media) = body
            .content
            .first()
            .map(|(ct, media)| (ct.clone(), media.schema.clone()))
            .unwrap_or_else(|| ("application/json".to_string(), None));
        EndpointRequestBody {
            required: body.required,
            content_type,
            schema: media.unwrap_or_else(empty_schema),
        }
    });

    let responses = operation
        .responses
        .iter()
        .map(|(status, response)| EndpointResponse {
            status: status.clone(),
            description: response.description.clone(),
            schema: response
                .content
                .as_ref()
                .and_then(|content| content.get("application/json"))
                .and_then(|media| media.schema.clone()),
        })
        .collect();

    let operation_id = operation
        .operation_id
        .clone()
        .unwrap_or_else(|| derive_operation_id(method, path));

    IntegrationEndpoint {
        id: format!("{}_{}", service.id, operation_id),
        service_id: service.id.clone(),
        service_name: service.name.clone(),
        service_kind: service.kind,
        path: path.to_string(),
        method,
        operation_id,
        summary: operation.summary.clone().unwrap_or_else(|| path.to_string()),
        description: operation.description.clone().unwrap_or_default(),
        tags: if operation.tags.is_empty() {
            vec![service.kind.to_string()]
        } else {
            operation.tags.clone()
        },
        parameters,
        request_body,
        responses,
        full_url: format!("{}{}", service.base_url, path),
        registered_at,
    }
}

/// `lower(method)` plus the path with every non-alphanumeric character
/// replaced by an underscore, for specs that omit operation ids
fn derive_operation_id(method: HttpMethod, path: &str) -> String {
    let sanitized: String = path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_{}", method.to_string().to_lowercase(), sanitized)
}

fn convert_location(location: SpecParameterLocation) -> ParameterLocation {
    match location {
        SpecParameterLocation::Path => ParameterLocation::Path,
        SpecParameterLocation::Query => ParameterLocation::Query,
        SpecParameterLocation::Header => ParameterLocation::Header,
        SpecParameterLocation::Cookie => ParameterLocation::Cookie,
    }
}

fn empty_schema() -> Value {
    Value::Object(serde_json::Map::new())
}
