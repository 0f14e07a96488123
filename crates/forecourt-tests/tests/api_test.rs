//! REST surface and WebSocket feed tests
//!
//! Run with: cargo test -p forecourt-tests --test api_test

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use forecourt_aggregate::{MetricsService, Poller};
use forecourt_api::{create_router, AppState};
use forecourt_core::config::{DiscoveryConfig, PollingConfig, StreamConfig};
use forecourt_core::models::{
    EventKind, FuelTransaction, FuelType, StreamEvent, TransactionType,
};
use forecourt_discovery::DiscoveryService;
use forecourt_store::{EndpointCatalog, MemoryStore, RecordStore};
use forecourt_stream::StreamHub;
use forecourt_tests::StubService;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

struct Harness {
    server: StubService,
    store: Arc<MemoryStore>,
    hub: StreamHub,
    client: reqwest::Client,
}

impl Harness {
    async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let catalog: Arc<dyn EndpointCatalog> = store.clone();
        let records: Arc<dyn RecordStore> = store.clone();

        let discovery = Arc::new(
            DiscoveryService::new(DiscoveryConfig {
                services: Vec::new(),
                ..Default::default()
            })
            .unwrap(),
        );
        let hub = StreamHub::new(&StreamConfig::default());
        let metrics = Arc::new(MetricsService::new(records.clone()));
        let poller = Poller::new(
            catalog.clone(),
            records,
            hub.clone(),
            Duration::from_secs(2),
        )
        .unwrap();

        let state = AppState::new(
            discovery,
            poller,
            metrics,
            hub.clone(),
            catalog,
            PollingConfig::default(),
        );
        let server = StubService::start(create_router(state)).await;

        Self {
            server,
            store,
            hub,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.server.addr, path)
    }
}

fn sale_now(natural_id: &str) -> FuelTransaction {
    let now = Utc::now();
    FuelTransaction {
        id: Uuid::new_v4(),
        site_id: "site-1".to_string(),
        transaction_id: natural_id.to_string(),
        transaction_type: TransactionType::Sale,
        transaction_at: now,
        fuel_type: FuelType::Regular,
        gallons: 10.0,
        price_per_gallon: 3.0,
        cost_per_gallon: Some(2.0),
        total_amount: 30.0,
        total_cost: Some(20.0),
        gross_margin: Some(10.0),
        source_system: "jrd-fuel".to_string(),
        source_endpoint_id: "ep-1".to_string(),
        raw: json!({}),
        created_at: now,
    }
}

#[tokio::test]
async fn health_and_empty_discovery_state() {
    let harness = Harness::new().await;

    let health: Value = harness
        .client
        .get(harness.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");

    let services: Value = harness
        .client
        .get(harness.url("/api/discovery/services"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(services["count"], 0);

    let last_scan = harness
        .client
        .get(harness.url("/api/discovery/last-scan"))
        .send()
        .await
        .unwrap();
    assert_eq!(last_scan.status(), 404);

    let missing = harness
        .client
        .get(harness.url("/api/discovery/services/ghost"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn endpoint_registration_lifecycle_over_http() {
    let harness = Harness::new().await;

    let created = harness
        .client
        .post(harness.url("/api/endpoints"))
        .json(&json!({
            "name": "pump sales",
            "source_system": "jrd-fuel",
            "category": "fuel_transactions",
            "base_url": "http://localhost:8001",
            "path": "/api/transactions",
            "site_id": "site-1"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);
    let endpoint: Value = created.json().await.unwrap();
    let id = endpoint["id"].as_str().unwrap().to_string();
    assert_eq!(endpoint["poll_interval_secs"], 60);
    assert_eq!(endpoint["status"], "discovered");

    let summary: Value = harness
        .client
        .get(harness.url("/api/endpoints/summary"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["total"], 1);

    let health: Value = harness
        .client
        .get(harness.url("/api/endpoints/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["count"], 1);
    assert_eq!(health["items"][0]["name"], "pump sales");

    let deleted = harness
        .client
        .delete(harness.url(&format!("/api/endpoints/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 204);

    let summary: Value = harness
        .client
        .get(harness.url("/api/endpoints/summary"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["by_status"]["deprecated"], 1);

    let missing = harness
        .client
        .delete(harness.url("/api/endpoints/ghost"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn metrics_routes_serve_rollups_and_trends() {
    let harness = Harness::new().await;
    harness
        .store
        .insert_fuel_transaction(&sale_now("T-1"))
        .await
        .unwrap();

    let metrics: Value = harness
        .client
        .get(harness.url("/api/metrics/enterprise?period=daily"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metrics["period"], "daily");
    assert_eq!(metrics["fuel"]["total_gallons"], 10.0);
    assert_eq!(metrics["fuel"]["gross_margin"], 10.0);
    assert_eq!(metrics["combined"]["total_revenue"], 30.0);

    let trends: Value = harness
        .client
        .get(harness.url("/api/metrics/fuel-trends?site_id=site-1&days=7"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(trends.as_array().unwrap().len(), 1);
    assert_eq!(trends[0]["gallons"], 10.0);

    let bogus = harness
        .client
        .get(harness.url("/api/metrics/enterprise?period=hourly"))
        .send()
        .await
        .unwrap();
    assert_eq!(bogus.status(), 400);
}

/// Read frames until a text frame arrives or the timeout lapses
async fn next_text(
    ws: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin),
    wait: Duration,
) -> Option<Value> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return None;
        }
        match tokio::time::timeout(remaining, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                return serde_json::from_str(text.as_str()).ok();
            }
            Ok(Some(Ok(_))) => continue,
            _ => return None,
        }
    }
}

#[tokio::test]
async fn websocket_feed_applies_channel_and_site_filters() {
    let harness = Harness::new().await;

    let (mut ws, _) = connect_async(format!("ws://{}/ws", harness.server.addr))
        .await
        .expect("ws connect");

    let welcome = next_text(&mut ws, Duration::from_secs(1)).await.unwrap();
    assert_eq!(welcome["type"], "connected");

    ws.send(Message::Text(
        json!({"action": "unsubscribe", "channels": ["all"]}).to_string().into(),
    ))
    .await
    .unwrap();
    ws.send(Message::Text(
        json!({
            "action": "subscribe",
            "channels": ["fuel_transaction"],
            "site_ids": ["site-1"]
        })
        .to_string()
        .into(),
    ))
    .await
    .unwrap();
    // Let the server apply the control messages before broadcasting.
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Wrong channel, then wrong site, then a match.
    harness.hub.broadcast(&StreamEvent::new(
        EventKind::AutoWorkOrder,
        Some("site-1".to_string()),
        json!({"n": 1}),
    ));
    harness.hub.broadcast(&StreamEvent::new(
        EventKind::FuelTransaction,
        Some("site-2".to_string()),
        json!({"n": 2}),
    ));
    harness.hub.broadcast(&StreamEvent::new(
        EventKind::FuelTransaction,
        Some("site-1".to_string()),
        json!({"n": 3}),
    ));

    let event = next_text(&mut ws, Duration::from_secs(1)).await.unwrap();
    assert_eq!(event["type"], "fuel_transaction");
    assert_eq!(event["site_id"], "site-1");
    assert_eq!(event["data"]["n"], 3);

    // Nothing else was let through.
    assert!(next_text(&mut ws, Duration::from_millis(200)).await.is_none());
}

#[tokio::test]
async fn websocket_serves_metrics_on_request() {
    let harness = Harness::new().await;
    harness
        .store
        .insert_fuel_transaction(&sale_now("T-9"))
        .await
        .unwrap();

    let (mut ws, _) = connect_async(format!("ws://{}/ws", harness.server.addr))
        .await
        .expect("ws connect");
    let _welcome = next_text(&mut ws, Duration::from_secs(1)).await.unwrap();

    ws.send(Message::Text(
        json!({"action": "request_metrics", "period": "daily"}).to_string().into(),
    ))
    .await
    .unwrap();

    let event = next_text(&mut ws, Duration::from_secs(1)).await.unwrap();
    assert_eq!(event["type"], "metrics_update");
    assert_eq!(event["data"]["fuel"]["total_gallons"], 10.0);
}
