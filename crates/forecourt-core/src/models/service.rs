//! Discovered service models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Business domain a backend service belongs to
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceKind {
    Fuel,
    Auto,
    Pricing,
    Analytics,
    Scanning,
}

/// Reachability of a probed service
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceStatus {
    Online,
    Offline,
    Error,
}

/// A backend service found (or not) during an environment scan
///
/// Created fresh by every probe; a scan replaces the stored record wholesale
/// rather than patching it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredService {
    /// Stable identifier derived from the configured name (see [`slugify`])
    pub id: String,
    pub name: String,
    pub port: u16,
    pub kind: ServiceKind,
    pub base_url: String,
    pub status: ServiceStatus,
    /// Version reported by the health endpoint, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Health path that answered 2xx
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_endpoint: Option<String>,
    /// Interface-description path that yielded a valid spec
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_url: Option<String>,
    pub discovered_at: DateTime<Utc>,
    pub last_checked: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Derive a service id from its configured name: lowercase, with runs of
/// non-alphanumeric characters collapsed into single dashes.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}
