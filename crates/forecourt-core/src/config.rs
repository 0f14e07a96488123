//! Daemon configuration
//!
//! Typed configuration loaded from a TOML file, with per-field defaults so a
//! partial (or absent) file still yields a runnable setup. The default
//! candidate list covers the five sample backend apps on ports 8001-8005.

use serde::{Deserialize, Serialize};

use crate::models::ServiceKind;

/// Top-level configuration for forecourtd
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecourtConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub discovery: DiscoveryConfig,
    pub polling: PollingConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "forecourt.db".to_string(),
        }
    }
}

/// A statically configured service the orchestrator attempts to discover
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateService {
    pub name: String,
    pub port: u16,
    pub kind: ServiceKind,
    /// Interface-description paths to try, in order
    #[serde(default = "default_spec_paths")]
    pub spec_paths: Vec<String>,
    /// Health-check paths to try, in order
    #[serde(default = "default_health_paths")]
    pub health_paths: Vec<String>,
}

impl CandidateService {
    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

fn default_spec_paths() -> Vec<String> {
    vec![
        "/swagger.json".to_string(),
        "/api/openapi.json".to_string(),
        "/openapi.json".to_string(),
    ]
}

fn default_health_paths() -> Vec<String> {
    vec![
        "/health".to_string(),
        "/api/health".to_string(),
        "/healthz".to_string(),
        "/".to_string(),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// General request timeout for spec fetches, in milliseconds
    pub request_timeout_ms: u64,
    /// Shorter per-attempt timeout for health probes, in milliseconds
    pub health_timeout_ms: u64,
    /// Attempts per spec path before moving on
    pub max_retries: u32,
    /// Base retry delay; attempt N waits N x this value
    pub retry_base_delay_ms: u64,
    pub services: Vec<CandidateService>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
            health_timeout_ms: 2_000,
            max_retries: 3,
            retry_base_delay_ms: 1_000,
            services: default_candidates(),
        }
    }
}

fn candidate(name: &str, port: u16, kind: ServiceKind, extra_spec_path: Option<&str>) -> CandidateService {
    let mut spec_paths = default_spec_paths();
    if let Some(extra) = extra_spec_path {
        spec_paths.push(extra.to_string());
    }
    CandidateService {
        name: name.to_string(),
        port,
        kind,
        spec_paths,
        health_paths: default_health_paths(),
    }
}

/// The five sample backend apps scanned out of the box
pub fn default_candidates() -> Vec<CandidateService> {
    vec![
        candidate("JRD Fuel", 8001, ServiceKind::Fuel, Some("/.well-known/openapi.json")),
        candidate("JRD Auto", 8002, ServiceKind::Auto, Some("/.well-known/openapi.json")),
        candidate("Price-O-Tron", 8003, ServiceKind::Pricing, Some("/pricing/openapi.json")),
        candidate("Jumbotron", 8004, ServiceKind::Analytics, Some("/analytics/openapi.json")),
        candidate("Scanotron", 8005, ServiceKind::Scanning, Some("/scan/openapi.json")),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Interval applied to endpoints registered without one, in seconds
    pub default_interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            default_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// How often the heartbeat sweep runs, in seconds
    pub heartbeat_secs: u64,
    /// Subscribers silent longer than this are disconnected, in seconds
    pub idle_cutoff_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: 30,
            idle_cutoff_secs: 60,
        }
    }
}
