//! Application state for the forecourt API

use std::sync::Arc;

use forecourt_aggregate::{MetricsService, Poller};
use forecourt_core::config::PollingConfig;
use forecourt_discovery::DiscoveryService;
use forecourt_store::EndpointCatalog;
use forecourt_stream::StreamHub;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub discovery: Arc<DiscoveryService>,
    pub poller: Poller,
    pub metrics: Arc<MetricsService>,
    pub hub: StreamHub,
    pub catalog: Arc<dyn EndpointCatalog>,
    pub polling: PollingConfig,
}

impl AppState {
    pub fn new(
        discovery: Arc<DiscoveryService>,
        poller: Poller,
        metrics: Arc<MetricsService>,
        hub: StreamHub,
        catalog: Arc<dyn EndpointCatalog>,
        polling: PollingConfig,
    ) -> Self {
        Self {
            discovery,
            poller,
            metrics,
            hub,
            catalog,
            polling,
        }
    }
}
