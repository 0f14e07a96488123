//! Persisted, polling-oriented endpoint catalog
//!
//! Distinct from [`IntegrationEndpoint`](super::endpoint::IntegrationEndpoint):
//! a [`PolledEndpoint`] is a durable record carrying polling configuration,
//! authentication, field mappings, and rolling health counters. Entries are
//! retired by marking them deprecated, never hard-deleted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::endpoint::HttpMethod;

/// Lifecycle state of a catalog entry
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EndpointStatus {
    Discovered,
    Validated,
    Active,
    Degraded,
    Offline,
    Error,
    Deprecated,
}

/// What kind of operational data an endpoint yields; drives converter choice
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataCategory {
    FuelTransactions,
    FuelInventory,
    FuelDelivery,
    FuelPricing,
    AutoWorkOrders,
    AutoInventory,
    CustomerData,
    Reporting,
    Other,
}

/// Authentication material applied to poll requests
///
/// Header precedence when building a request: API key first, then bearer
/// token, then custom headers merged last.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_headers: BTreeMap<String, String>,
}

/// Declarative transformation applied to one mapped field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    #[default]
    None,
    Uppercase,
    Lowercase,
    Trim,
    ParseDate,
    ParseNumber,
}

/// Declarative (source path, target field, transform) mapping rule
///
/// `source_field` is dot-delimited for nested lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source_field: String,
    pub target_field: String,
    #[serde(default)]
    pub transform: Transform,
}

/// A durable catalog entry the poller drives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolledEndpoint {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Upstream system this endpoint belongs to, recorded as provenance on
    /// every canonical record it produces
    pub source_system: String,
    /// Default site/shop attributed to records that carry none of their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    pub category: DataCategory,
    pub base_url: String,
    pub path: String,
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mappings: Vec<FieldMapping>,
    pub poll_interval_secs: u64,
    pub polling_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_poll_at: Option<DateTime<Utc>>,
    pub status: EndpointStatus,
    pub consecutive_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_response_time_ms: Option<i64>,
    pub uptime_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub records_processed: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PolledEndpoint {
    /// Create a new catalog entry with fresh counters, awaiting validation
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        source_system: impl Into<String>,
        category: DataCategory,
        base_url: impl Into<String>,
        path: impl Into<String>,
        method: HttpMethod,
        poll_interval_secs: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            source_system: source_system.into(),
            site_id: None,
            category,
            base_url: base_url.into(),
            path: path.into(),
            method,
            auth: None,
            mappings: Vec::new(),
            poll_interval_secs,
            polling_enabled: true,
            next_poll_at: None,
            status: EndpointStatus::Discovered,
            consecutive_failures: 0,
            last_response_time_ms: None,
            uptime_percent: 0.0,
            last_error: None,
            last_success_at: None,
            last_checked_at: None,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            records_processed: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Base URL and path joined with exactly one slash between them
    pub fn full_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.path.is_empty() {
            return format!("{}/", base);
        }
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{}{}", base, path)
    }

    /// Share of requests that succeeded, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.successful_requests as f64 / self.total_requests as f64 * 100.0
    }

    /// Apply a successful poll: failures reset, latency and counters update,
    /// and the entry returns to (or stays in) the active state.
    pub fn note_success(&mut self, response_time_ms: i64, now: DateTime<Utc>) {
        self.consecutive_failures = 0;
        self.status = EndpointStatus::Active;
        self.last_response_time_ms = Some(response_time_ms);
        self.last_error = None;
        self.last_success_at = Some(now);
        self.last_checked_at = Some(now);
        self.total_requests += 1;
        self.successful_requests += 1;
        self.uptime_percent = self.success_rate();
        self.next_poll_at = Some(now + chrono::Duration::seconds(self.poll_interval_secs as i64));
        self.updated_at = now;
    }

    /// Apply a failed poll: the failure streak grows and the entry degrades,
    /// hardening to `Error` at three consecutive failures.
    pub fn note_failure(&mut self, error: &str, now: DateTime<Utc>) {
        self.consecutive_failures += 1;
        self.status = if self.consecutive_failures >= 3 {
            EndpointStatus::Error
        } else {
            EndpointStatus::Degraded
        };
        self.last_error = Some(error.to_string());
        self.last_checked_at = Some(now);
        self.total_requests += 1;
        self.failed_requests += 1;
        self.uptime_percent = self.success_rate();
        self.next_poll_at = Some(now + chrono::Duration::seconds(self.poll_interval_secs as i64));
        self.updated_at = now;
    }

    /// Whether this entry should be scheduled by the poller
    pub fn is_pollable(&self) -> bool {
        self.polling_enabled
            && self.poll_interval_secs > 0
            && matches!(
                self.status,
                EndpointStatus::Discovered
                    | EndpointStatus::Validated
                    | EndpointStatus::Active
                    | EndpointStatus::Degraded
            )
    }
}
