//! Service reachability probing
//!
//! Probing failures are data, not faults: every outcome is folded into the
//! returned [`DiscoveredService`] and nothing propagates to the caller.

use std::time::Duration;

use chrono::Utc;
use forecourt_core::config::{CandidateService, DiscoveryConfig};
use forecourt_core::models::{slugify, DiscoveredService, ServiceStatus};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, trace};

/// Check whether a configured candidate is reachable and alive.
///
/// Health paths are tried in order, each bounded by the short health-check
/// timeout; the first 2xx wins. If none answer, a bare request to the base
/// address counts as liveness for any status below 500 - a server rejecting
/// the request with a 4xx is still reachable.
pub async fn probe_service(
    client: &Client,
    candidate: &CandidateService,
    tuning: &DiscoveryConfig,
) -> DiscoveredService {
    let base_url = candidate.base_url();
    let now = Utc::now();
    let mut service = DiscoveredService {
        id: slugify(&candidate.name),
        name: candidate.name.clone(),
        port: candidate.port,
        kind: candidate.kind,
        base_url: base_url.clone(),
        status: ServiceStatus::Offline,
        version: None,
        health_endpoint: None,
        spec_url: None,
        discovered_at: now,
        last_checked: now,
        error_message: None,
    };

    let health_timeout = Duration::from_millis(tuning.health_timeout_ms);

    for path in &candidate.health_paths {
        let url = format!("{}{}", base_url, path);
        match client.get(&url).timeout(health_timeout).send().await {
            Ok(response) if response.status().is_success() => {
                service.status = ServiceStatus::Online;
                service.health_endpoint = Some(path.clone());
                if let Ok(body) = response.json::<Value>().await {
                    service.version = extract_version(&body);
                }
                break;
            }
            Ok(response) => {
                trace!(%url, status = %response.status(), "health path rejected");
            }
            Err(err) => {
                trace!(%url, error = %err, "health path unreachable");
            }
        }
    }

    if service.status != ServiceStatus::Online {
        match client.get(&base_url).timeout(health_timeout).send().await {
            Ok(response) if response.status().as_u16() < 500 => {
                service.status = ServiceStatus::Online;
            }
            Ok(response) => {
                service.error_message = Some(format!("base address returned {}", response.status()));
            }
            Err(err) => {
                debug!(service = %candidate.name, error = %err, "service offline");
                service.error_message = Some(err.to_string());
            }
        }
    }

    service
}

fn extract_version(body: &Value) -> Option<String> {
    body.get("version")
        .or_else(|| body.get("app_version"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_read_from_either_key() {
        let v = serde_json::json!({"status": "healthy", "version": "2.3.1"});
        assert_eq!(extract_version(&v), Some("2.3.1".to_string()));
        let v = serde_json::json!({"app_version": "1.0.0"});
        assert_eq!(extract_version(&v), Some("1.0.0".to_string()));
        let v = serde_json::json!({"status": "healthy"});
        assert_eq!(extract_version(&v), None);
    }
}
