//! Scheduled endpoint polling
//!
//! One timer task per pollable catalog entry. Ticks are isolated: a failing
//! endpoint never affects its siblings or its own future ticks, and a tick
//! that would overlap a still-running one is skipped with a warning rather
//! than queued.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use forecourt_core::models::{
    DataCategory, EndpointStatus, EventKind, PolledEndpoint, StreamEvent,
};
use forecourt_store::{EndpointCatalog, RecordStore, StoreError, StoreResult};
use forecourt_stream::StreamHub;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::convert;
use crate::error::PollError;

struct PollTask {
    handle: JoinHandle<()>,
    in_flight: Arc<AtomicBool>,
}

struct PollerInner {
    client: Client,
    catalog: Arc<dyn EndpointCatalog>,
    records: Arc<dyn RecordStore>,
    hub: StreamHub,
    tasks: parking_lot::Mutex<HashMap<String, PollTask>>,
}

/// Drives periodic fetches for every registered, polling-enabled endpoint
#[derive(Clone)]
pub struct Poller {
    inner: Arc<PollerInner>,
}

impl Poller {
    pub fn new(
        catalog: Arc<dyn EndpointCatalog>,
        records: Arc<dyn RecordStore>,
        hub: StreamHub,
        request_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            inner: Arc::new(PollerInner {
                client,
                catalog,
                records,
                hub,
                tasks: parking_lot::Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Load every pollable catalog entry and schedule it. Returns how many
    /// endpoints are being watched.
    pub async fn start(&self) -> StoreResult<usize> {
        let endpoints = self.inner.catalog.pollable_endpoints().await?;
        let count = endpoints.len();
        for endpoint in &endpoints {
            self.watch(endpoint);
        }
        info!(count, "poller started");
        Ok(count)
    }

    /// Schedule one endpoint. Re-registering an endpoint already being
    /// polled is a no-op.
    fn watch(&self, endpoint: &PolledEndpoint) {
        let mut tasks = self.inner.tasks.lock();
        if tasks.contains_key(&endpoint.id) {
            return;
        }

        let in_flight = Arc::new(AtomicBool::new(false));
        let guard = in_flight.clone();
        let inner = self.inner.clone();
        let id = endpoint.id.clone();
        let interval_secs = endpoint.poll_interval_secs.max(1);

        info!(
            endpoint = %endpoint.name,
            interval_secs,
            "started polling"
        );

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately; consume it so the first
            // real poll lands one interval after registration.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                run_tick(&inner, &id, &guard).await;
            }
        });

        tasks.insert(endpoint.id.clone(), PollTask { handle, in_flight });
    }

    fn stop_watch(&self, id: &str) {
        if let Some(task) = self.inner.tasks.lock().remove(id) {
            task.handle.abort();
            debug!(endpoint = id, "stopped polling");
        }
    }

    /// Persist a new catalog entry and start polling it when eligible
    pub async fn register_endpoint(&self, endpoint: PolledEndpoint) -> StoreResult<()> {
        self.inner.catalog.insert_endpoint(&endpoint).await?;
        if endpoint.is_pollable() {
            self.watch(&endpoint);
        }
        Ok(())
    }

    /// Stop polling and retire the entry (deprecated, never deleted)
    pub async fn unregister_endpoint(&self, id: &str) -> StoreResult<()> {
        self.stop_watch(id);
        self.inner
            .catalog
            .set_endpoint_status(id, EndpointStatus::Deprecated)
            .await
    }

    /// Run one immediate poll tick outside the schedule
    pub async fn refresh_endpoint(&self, id: &str) -> StoreResult<()> {
        if self.inner.catalog.endpoint(id).await?.is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let guard = self
            .inner
            .tasks
            .lock()
            .get(id)
            .map(|task| task.in_flight.clone())
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
        run_tick(&self.inner, id, &guard).await;
        Ok(())
    }

    /// Number of endpoints currently scheduled
    pub fn watched_count(&self) -> usize {
        self.inner.tasks.lock().len()
    }

    /// Abort every scheduled poll task. In-flight requests finish on their
    /// own; their results are discarded.
    pub fn shutdown(&self) {
        let mut tasks = self.inner.tasks.lock();
        for (_, task) in tasks.drain() {
            task.handle.abort();
        }
        info!("poller stopped");
    }
}

/// One guarded tick: skip if the previous tick for this endpoint is still
/// running, otherwise poll and record the outcome.
async fn run_tick(inner: &PollerInner, id: &str, in_flight: &AtomicBool) {
    if in_flight.swap(true, Ordering::SeqCst) {
        warn!(endpoint = id, "poll overrun, skipping tick");
        return;
    }
    let outcome = poll_once(inner, id).await;
    in_flight.store(false, Ordering::SeqCst);
    if let Err(err) = outcome {
        warn!(endpoint = id, error = %err, "poll tick could not be recorded");
    }
}

async fn poll_once(inner: &PollerInner, id: &str) -> StoreResult<()> {
    let Some(endpoint) = inner.catalog.endpoint(id).await? else {
        warn!(endpoint = id, "endpoint missing from catalog, skipping");
        return Ok(());
    };

    let started = Instant::now();
    match fetch_payload(&inner.client, &endpoint).await {
        Ok(payload) => {
            let latency_ms = started.elapsed().as_millis() as i64;
            // Health update strictly precedes data processing.
            let refreshed = inner.catalog.record_poll_success(id, latency_ms).await?;
            let processed = process_payload(inner, &refreshed, &payload).await?;
            if processed > 0 {
                inner.catalog.add_processed_records(id, processed).await?;
            }
            debug!(endpoint = %refreshed.name, latency_ms, processed, "poll succeeded");
        }
        Err(err) => {
            let refreshed = inner.catalog.record_poll_failure(id, &err.to_string()).await?;
            warn!(
                endpoint = %refreshed.name,
                consecutive_failures = refreshed.consecutive_failures,
                error = %err,
                "poll failed"
            );
            inner.hub.broadcast(&StreamEvent::new(
                EventKind::EndpointStatus,
                refreshed.site_id.clone(),
                json!({
                    "endpoint_id": refreshed.id,
                    "name": refreshed.name,
                    "status": refreshed.status,
                    "consecutive_failures": refreshed.consecutive_failures,
                    "error": err.to_string(),
                }),
            ));
        }
    }

    Ok(())
}

/// Issue the endpoint's configured request; non-2xx responses are typed
/// failures carrying the status code.
async fn fetch_payload(client: &Client, endpoint: &PolledEndpoint) -> Result<Value, PollError> {
    let method = request_method(endpoint);
    let response = client
        .request(method, endpoint.full_url())
        .headers(request_headers(endpoint))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(PollError::Status {
            status: status.as_u16(),
            message: status.canonical_reason().unwrap_or("unknown status").to_string(),
        });
    }

    Ok(response.json().await?)
}

fn request_method(endpoint: &PolledEndpoint) -> Method {
    match endpoint.method {
        forecourt_core::models::HttpMethod::Get => Method::GET,
        forecourt_core::models::HttpMethod::Post => Method::POST,
        forecourt_core::models::HttpMethod::Put => Method::PUT,
        forecourt_core::models::HttpMethod::Delete => Method::DELETE,
        forecourt_core::models::HttpMethod::Patch => Method::PATCH,
    }
}

/// Build request headers from stored authentication configuration.
///
/// Precedence: API key header, then bearer token, then custom headers
/// merged last (custom wins on collisions).
pub fn request_headers(endpoint: &PolledEndpoint) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let Some(auth) = &endpoint.auth else {
        return headers;
    };

    if let (Some(name), Some(value)) = (&auth.api_key_header, &auth.api_key_value) {
        insert_header(&mut headers, name, value);
    }
    if let Some(token) = &auth.access_token {
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
            }
            Err(err) => warn!(error = %err, "skipping unusable bearer token"),
        }
    }
    for (name, value) in &auth.custom_headers {
        insert_header(&mut headers, name, value);
    }

    headers
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => warn!(header = name, "skipping unusable auth header"),
    }
}

/// Route a successful payload to the converter for the endpoint's declared
/// data category; returns how many canonical records were persisted.
async fn process_payload(
    inner: &PollerInner,
    endpoint: &PolledEndpoint,
    payload: &Value,
) -> StoreResult<u64> {
    match endpoint.category {
        DataCategory::FuelTransactions => {
            let mut processed = 0;
            for tx in convert::fuel_transactions_from_payload(endpoint, payload) {
                if inner.records.insert_fuel_transaction(&tx).await? {
                    processed += 1;
                    inner.hub.broadcast(&StreamEvent::new(
                        EventKind::FuelTransaction,
                        Some(tx.site_id.clone()),
                        serde_json::to_value(&tx).unwrap_or_default(),
                    ));
                } else {
                    debug!(transaction = %tx.transaction_id, "duplicate transaction dropped");
                }
            }
            Ok(processed)
        }
        DataCategory::AutoWorkOrders => {
            let mut processed = 0;
            for order in convert::work_orders_from_payload(endpoint, payload) {
                inner.records.upsert_work_order(&order).await?;
                processed += 1;
                // Work orders have a mutable lifecycle, so updates are
                // broadcast too, not just first sightings.
                inner.hub.broadcast(&StreamEvent::new(
                    EventKind::AutoWorkOrder,
                    Some(order.shop_id.clone()),
                    serde_json::to_value(&order).unwrap_or_default(),
                ));
            }
            Ok(processed)
        }
        DataCategory::FuelInventory => {
            let count = convert::normalize_records(payload).len();
            info!(endpoint = %endpoint.name, count, "fuel inventory snapshot received");
            Ok(0)
        }
        other => {
            warn!(endpoint = %endpoint.name, category = %other, "unhandled data category");
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecourt_core::models::{AuthConfig, HttpMethod};
    use pretty_assertions::assert_eq;

    fn endpoint_with_auth(auth: AuthConfig) -> PolledEndpoint {
        let mut ep = PolledEndpoint::new(
            "feed",
            "jrd-fuel",
            DataCategory::FuelTransactions,
            "http://localhost:8001",
            "/api/feed",
            HttpMethod::Get,
            60,
        );
        ep.auth = Some(auth);
        ep
    }

    #[test]
    fn auth_headers_follow_precedence_order() {
        let mut custom = std::collections::BTreeMap::new();
        custom.insert("X-Api-Key".to_string(), "custom-wins".to_string());
        custom.insert("X-Trace".to_string(), "abc".to_string());

        let ep = endpoint_with_auth(AuthConfig {
            api_key_header: Some("X-Api-Key".to_string()),
            api_key_value: Some("from-api-key".to_string()),
            access_token: Some("tok123".to_string()),
            custom_headers: custom,
        });

        let headers = request_headers(&ep);
        assert_eq!(headers.get("X-Api-Key").unwrap(), "custom-wins");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer tok123");
        assert_eq!(headers.get("X-Trace").unwrap(), "abc");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn endpoints_without_auth_still_send_content_type() {
        let mut ep = endpoint_with_auth(AuthConfig::default());
        ep.auth = None;
        let headers = request_headers(&ep);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn unusable_header_names_are_skipped() {
        let ep = endpoint_with_auth(AuthConfig {
            api_key_header: Some("bad header name\n".to_string()),
            api_key_value: Some("v".to_string()),
            ..AuthConfig::default()
        });
        let headers = request_headers(&ep);
        assert_eq!(headers.len(), 1);
    }
}
