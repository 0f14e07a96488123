//! Discovery orchestrator
//!
//! One explicit context object owns the candidate configuration, the HTTP
//! client, and the in-memory discovery state (services, specs, endpoint
//! catalog keyed by service id). Constructed once at startup and shared
//! behind an `Arc` by whatever exposes the accessor API.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use forecourt_core::config::DiscoveryConfig;
use forecourt_core::models::{
    ApiSpec, DiscoveredService, DiscoveryStatus, IntegrationEndpoint, ScanError, ScanResult,
    ServiceEndpointCount, ServiceStatus,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::{fetch, mapper, probe};

const USER_AGENT: &str = concat!("forecourt-discovery/", env!("CARGO_PKG_VERSION"));

/// Result of the full scan -> discover -> map pipeline
#[derive(Debug, Clone)]
pub struct FullDiscovery {
    pub scan: ScanResult,
    pub specs: HashMap<String, ApiSpec>,
    pub endpoints: HashMap<String, Vec<IntegrationEndpoint>>,
}

/// Coordinates probing, spec fetching, and endpoint mapping across all
/// configured candidate services
pub struct DiscoveryService {
    config: DiscoveryConfig,
    client: Client,
    services: RwLock<HashMap<String, DiscoveredService>>,
    specs: RwLock<HashMap<String, ApiSpec>>,
    endpoints: RwLock<HashMap<String, Vec<IntegrationEndpoint>>>,
    last_scan: RwLock<Option<ScanResult>>,
}

impl DiscoveryService {
    pub fn new(config: DiscoveryConfig) -> DiscoveryResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            config,
            client,
            services: RwLock::new(HashMap::new()),
            specs: RwLock::new(HashMap::new()),
            endpoints: RwLock::new(HashMap::new()),
            last_scan: RwLock::new(None),
        })
    }

    // =========================================================================
    // Pipeline stages
    // =========================================================================

    /// Probe every configured candidate concurrently and record the result.
    ///
    /// Each scan re-verifies reachability from scratch; there is no sticky
    /// online state. Only online probes replace the stored service record,
    /// so the last-known-good state of a service that went offline survives
    /// until its next successful probe.
    pub async fn scan_environment(&self) -> ScanResult {
        let scan_started = Utc::now();
        info!("starting environment scan");

        let handles: Vec<_> = self
            .config
            .services
            .iter()
            .map(|candidate| {
                let client = self.client.clone();
                let candidate = candidate.clone();
                let tuning = self.config.clone();
                tokio::spawn(
                    async move { probe::probe_service(&client, &candidate, &tuning).await },
                )
            })
            .collect();

        let mut services = Vec::new();
        let mut errors = Vec::new();
        let mut services_online = 0;
        let mut services_offline = 0;

        for (candidate, handle) in self.config.services.iter().zip(handles) {
            match handle.await {
                Ok(service) => {
                    if service.status == ServiceStatus::Online {
                        services_online += 1;
                        info!(service = %service.name, port = service.port, "service online");
                        self.services
                            .write()
                            .await
                            .insert(service.id.clone(), service.clone());
                    } else {
                        services_offline += 1;
                        warn!(service = %service.name, port = service.port, "service offline");
                    }
                    services.push(service);
                }
                Err(err) => {
                    // The prober swallows network failures, so landing here
                    // means the probe task itself blew up.
                    services_offline += 1;
                    error!(service = %candidate.name, error = %err, "probe task failed");
                    errors.push(ScanError {
                        service: candidate.name.clone(),
                        port: candidate.port,
                        error: err.to_string(),
                    });
                }
            }
        }

        let scan_completed = Utc::now();
        let result = ScanResult {
            success: errors.is_empty(),
            scan_started,
            scan_completed,
            duration_ms: (scan_completed - scan_started).num_milliseconds(),
            services_scanned: self.config.services.len(),
            services_online,
            services_offline,
            total_endpoints: self.total_endpoint_count().await,
            services,
            errors,
        };

        info!(
            online = services_online,
            scanned = result.services_scanned,
            duration_ms = result.duration_ms,
            "scan complete"
        );

        *self.last_scan.write().await = Some(result.clone());
        result
    }

    /// Fetch interface descriptions from every online service concurrently.
    ///
    /// Fetch failures are logged and simply absent from the returned map;
    /// partial success is the expected steady state.
    pub async fn discover_apis(&self) -> HashMap<String, ApiSpec> {
        info!("discovering apis from online services");

        let online: Vec<DiscoveredService> = self
            .services
            .read()
            .await
            .values()
            .filter(|s| s.status == ServiceStatus::Online)
            .cloned()
            .collect();

        let fetches = online.into_iter().filter_map(|service| {
            let candidate = self
                .config
                .services
                .iter()
                .find(|c| c.port == service.port)?
                .clone();
            let client = self.client.clone();
            let tuning = self.config.clone();
            Some(async move {
                let outcome = fetch::fetch_spec(&client, &service, &candidate, &tuning).await;
                (service.id.clone(), outcome)
            })
        });

        for (service_id, outcome) in futures::future::join_all(fetches).await {
            let Some((spec, path)) = outcome else { continue };
            info!(
                service = %service_id,
                title = %spec.info.title,
                version = %spec.info.version,
                "discovered api spec"
            );
            self.specs.write().await.insert(service_id.clone(), spec);
            if let Some(service) = self.services.write().await.get_mut(&service_id) {
                service.spec_url = Some(path);
            }
        }

        let specs = self.specs.read().await.clone();
        info!(count = specs.len(), "api discovery complete");
        specs
    }

    /// Rebuild the endpoint catalog from every stored spec.
    ///
    /// Each service's endpoint list is replaced wholesale, dropping stale
    /// endpoints from a previous spec version.
    pub async fn map_endpoints(&self) -> HashMap<String, Vec<IntegrationEndpoint>> {
        info!("mapping endpoints from discovered apis");

        let specs = self.specs.read().await.clone();
        let mut rebuilt = HashMap::new();
        let mut total = 0;
        {
            let services = self.services.read().await;
            for (service_id, spec) in &specs {
                let Some(service) = services.get(service_id) else {
                    continue;
                };
                let endpoints = mapper::map_endpoints(service, spec);
                info!(service = %service.name, count = endpoints.len(), "mapped endpoints");
                total += endpoints.len();
                rebuilt.insert(service_id.clone(), endpoints);
            }
        }

        *self.endpoints.write().await = rebuilt.clone();
        info!(total, "endpoint mapping complete");
        rebuilt
    }

    /// Convenience pipeline: scan -> discover -> map
    pub async fn full_discovery(&self) -> FullDiscovery {
        let scan = self.scan_environment().await;
        let specs = self.discover_apis().await;
        let endpoints = self.map_endpoints().await;
        FullDiscovery {
            scan,
            specs,
            endpoints,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub async fn services(&self) -> Vec<DiscoveredService> {
        let mut all: Vec<_> = self.services.read().await.values().cloned().collect();
        all.sort_by_key(|s| s.port);
        all
    }

    pub async fn service(&self, service_id: &str) -> DiscoveryResult<DiscoveredService> {
        self.services
            .read()
            .await
            .get(service_id)
            .cloned()
            .ok_or_else(|| DiscoveryError::ServiceNotFound(service_id.to_string()))
    }

    pub async fn all_endpoints(&self) -> Vec<IntegrationEndpoint> {
        let endpoints = self.endpoints.read().await;
        let mut all: Vec<_> = endpoints.values().flatten().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub async fn endpoints_by_service(
        &self,
        service_id: &str,
    ) -> DiscoveryResult<Vec<IntegrationEndpoint>> {
        if !self.services.read().await.contains_key(service_id) {
            return Err(DiscoveryError::ServiceNotFound(service_id.to_string()));
        }
        Ok(self
            .endpoints
            .read()
            .await
            .get(service_id)
            .cloned()
            .unwrap_or_default())
    }

    /// Case-insensitive substring search over path, operation id, summary,
    /// service name, and tags
    pub async fn search_endpoints(&self, query: &str) -> Vec<IntegrationEndpoint> {
        let needle = query.to_lowercase();
        self.all_endpoints()
            .await
            .into_iter()
            .filter(|ep| {
                ep.path.to_lowercase().contains(&needle)
                    || ep.operation_id.to_lowercase().contains(&needle)
                    || ep.summary.to_lowercase().contains(&needle)
                    || ep.service_name.to_lowercase().contains(&needle)
                    || ep.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            })
            .collect()
    }

    pub async fn endpoint(&self, endpoint_id: &str) -> DiscoveryResult<IntegrationEndpoint> {
        self.endpoints
            .read()
            .await
            .values()
            .flatten()
            .find(|ep| ep.id == endpoint_id)
            .cloned()
            .ok_or_else(|| DiscoveryError::EndpointNotFound(endpoint_id.to_string()))
    }

    pub async fn spec_for(&self, service_id: &str) -> Option<ApiSpec> {
        self.specs.read().await.get(service_id).cloned()
    }

    pub async fn last_scan(&self) -> Option<ScanResult> {
        self.last_scan.read().await.clone()
    }

    pub async fn total_endpoint_count(&self) -> usize {
        self.endpoints.read().await.values().map(Vec::len).sum()
    }

    pub async fn status(&self) -> DiscoveryStatus {
        let services = self.services.read().await;
        let endpoints = self.endpoints.read().await;

        let mut summaries: Vec<ServiceEndpointCount> = services
            .values()
            .map(|s| ServiceEndpointCount {
                id: s.id.clone(),
                name: s.name.clone(),
                status: s.status,
                endpoints: endpoints.get(&s.id).map(Vec::len).unwrap_or(0),
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));

        DiscoveryStatus {
            last_scan: self.last_scan.read().await.as_ref().map(|s| s.scan_completed),
            services_online: summaries
                .iter()
                .filter(|s| s.status == ServiceStatus::Online)
                .count(),
            services_offline: summaries
                .iter()
                .filter(|s| s.status != ServiceStatus::Online)
                .count(),
            total_endpoints: endpoints.values().map(Vec::len).sum(),
            services: summaries,
        }
    }
}
