//! Interface-description fetching with bounded retries
//!
//! 404 and 403 are definitive answers for a path and skip its remaining
//! retries; network errors and 5xx are retried with a linearly growing
//! delay before moving to the next candidate path.

use std::time::Duration;

use forecourt_core::config::{CandidateService, DiscoveryConfig};
use forecourt_core::models::{ApiSpec, DiscoveredService};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

/// Fetch the first valid interface description for an online service.
///
/// Returns the parsed spec and the candidate path that produced it, or
/// `None` when every path is exhausted.
pub async fn fetch_spec(
    client: &Client,
    service: &DiscoveredService,
    candidate: &CandidateService,
    tuning: &DiscoveryConfig,
) -> Option<(ApiSpec, String)> {
    for path in &candidate.spec_paths {
        let url = format!("{}{}", service.base_url, path);
        let Some(payload) = fetch_json_with_retry(client, &url, tuning).await else {
            continue;
        };

        if !is_valid_spec(&payload) {
            warn!(%url, "payload is not a valid interface description, trying next path");
            continue;
        }

        match serde_json::from_value::<ApiSpec>(payload) {
            Ok(spec) => return Some((spec, path.clone())),
            Err(err) => {
                warn!(%url, error = %err, "interface description failed to parse, trying next path");
            }
        }
    }

    warn!(service = %service.name, "no valid interface description found");
    None
}

/// GET a JSON document with up to `max_retries` attempts; attempt N sleeps
/// N x the base delay before the next try.
async fn fetch_json_with_retry(
    client: &Client,
    url: &str,
    tuning: &DiscoveryConfig,
) -> Option<Value> {
    let mut last_error = String::new();

    for attempt in 1..=tuning.max_retries.max(1) {
        match client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    match response.json::<Value>().await {
                        Ok(value) => return Some(value),
                        Err(err) => last_error = err.to_string(),
                    }
                } else if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
                    // Definitive: this path will not start answering on retry.
                    return None;
                } else {
                    last_error = format!("HTTP {}", status);
                }
            }
            Err(err) => last_error = err.to_string(),
        }

        if attempt < tuning.max_retries {
            debug!(attempt, max = tuning.max_retries, %url, "retrying spec fetch");
            tokio::time::sleep(Duration::from_millis(
                tuning.retry_base_delay_ms * attempt as u64,
            ))
            .await;
        }
    }

    debug!(%url, %last_error, "spec fetch attempts exhausted");
    None
}

/// An object counts as a spec only if it carries an `openapi` or `swagger`
/// version marker plus `info` and `paths` objects.
pub fn is_valid_spec(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    let has_marker = obj.contains_key("openapi") || obj.contains_key("swagger");
    has_marker
        && obj.get("info").map(Value::is_object).unwrap_or(false)
        && obj.get("paths").map(Value::is_object).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spec_validation_requires_marker_info_and_paths() {
        assert!(is_valid_spec(&json!({
            "openapi": "3.0.0",
            "info": {"title": "t", "version": "1"},
            "paths": {}
        })));
        assert!(is_valid_spec(&json!({
            "swagger": "2.0",
            "info": {},
            "paths": {}
        })));
        assert!(!is_valid_spec(&json!({"info": {}, "paths": {}})));
        assert!(!is_valid_spec(&json!({"openapi": "3.0.0", "paths": {}})));
        assert!(!is_valid_spec(&json!({"openapi": "3.0.0", "info": {}, "paths": []})));
        assert!(!is_valid_spec(&json!("not an object")));
    }
}
