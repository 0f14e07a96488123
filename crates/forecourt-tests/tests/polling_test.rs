//! Poll-tick tests: payload conversion, dedup/upsert, health, and events
//!
//! Run with: cargo test -p forecourt-tests --test polling_test

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use forecourt_aggregate::Poller;
use forecourt_core::config::StreamConfig;
use forecourt_core::models::{
    DataCategory, EndpointStatus, EventKind, FieldMapping, HttpMethod, PolledEndpoint, Transform,
    WorkOrderStatus,
};
use forecourt_store::{EndpointCatalog, MemoryStore, RecordStore};
use forecourt_stream::{OutboundMessage, StreamHub};
use forecourt_tests::{free_port, StubService};
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

fn harness(store: &Arc<MemoryStore>) -> (Poller, StreamHub) {
    let hub = StreamHub::new(&StreamConfig::default());
    let catalog: Arc<dyn EndpointCatalog> = store.clone();
    let records: Arc<dyn RecordStore> = store.clone();
    let poller = Poller::new(catalog, records, hub.clone(), Duration::from_secs(2)).unwrap();
    (poller, hub)
}

fn endpoint(port: u16, path: &str, category: DataCategory) -> PolledEndpoint {
    let mut ep = PolledEndpoint::new(
        "stub feed",
        "stub-system",
        category,
        format!("http://localhost:{port}"),
        path,
        HttpMethod::Get,
        3600,
    );
    ep.site_id = Some("site-1".to_string());
    ep
}

/// Collect events currently queued for a hub subscriber
async fn drain_events(rx: &mut UnboundedReceiver<OutboundMessage>) -> Vec<EventKind> {
    let mut kinds = Vec::new();
    // Events pass through an in-process channel; yield briefly first.
    tokio::time::sleep(Duration::from_millis(50)).await;
    while let Ok(frame) = rx.try_recv() {
        if let OutboundMessage::Event(event) = frame {
            kinds.push(event.kind);
        }
    }
    kinds
}

#[tokio::test]
async fn poll_stores_canonical_records_and_broadcasts() {
    let router = Router::new().route(
        "/transactions",
        get(|| async {
            Json(json!([
                {"transaction_id": "T-1", "gallons": 10.0, "total_amount": 35.0,
                 "fuel_type": "diesel", "site_id": "site-1"},
                {"transaction_id": "T-2", "gallons": 8.0, "total_amount": 28.0}
            ]))
        }),
    );
    let stub = StubService::start(router).await;

    let store = Arc::new(MemoryStore::new());
    let (poller, hub) = harness(&store);
    let (_sub, mut rx) = hub.connect();

    let ep = endpoint(stub.port(), "/transactions", DataCategory::FuelTransactions);
    poller.register_endpoint(ep.clone()).await.unwrap();
    poller.refresh_endpoint(&ep.id).await.unwrap();

    let stored_a = store
        .fuel_transaction_by_natural_id("T-1")
        .await
        .unwrap()
        .expect("T-1 stored");
    assert_eq!(stored_a.gallons, 10.0);
    assert_eq!(stored_a.source_endpoint_id, ep.id);
    // Missing site falls back to the endpoint's configured site.
    let stored_b = store
        .fuel_transaction_by_natural_id("T-2")
        .await
        .unwrap()
        .expect("T-2 stored");
    assert_eq!(stored_b.site_id, "site-1");

    let events = drain_events(&mut rx).await;
    assert_eq!(
        events
            .iter()
            .filter(|k| **k == EventKind::FuelTransaction)
            .count(),
        2
    );

    // Health reflects the successful tick.
    let refreshed = store.endpoint(&ep.id).await.unwrap().unwrap();
    assert_eq!(refreshed.status, EndpointStatus::Active);
    assert_eq!(refreshed.successful_requests, 1);
    assert_eq!(refreshed.records_processed, 2);
    assert!(refreshed.last_response_time_ms.is_some());
}

#[tokio::test]
async fn repeated_polls_drop_duplicate_transactions() {
    let router = Router::new().route(
        "/transactions",
        get(|| async { Json(json!([{"transaction_id": "T-1", "gallons": 5.0}])) }),
    );
    let stub = StubService::start(router).await;

    let store = Arc::new(MemoryStore::new());
    let (poller, hub) = harness(&store);
    let (_sub, mut rx) = hub.connect();

    let ep = endpoint(stub.port(), "/transactions", DataCategory::FuelTransactions);
    poller.register_endpoint(ep.clone()).await.unwrap();

    poller.refresh_endpoint(&ep.id).await.unwrap();
    poller.refresh_endpoint(&ep.id).await.unwrap();

    let sales = store
        .fuel_sales_between(
            chrono::Utc::now() - chrono::Duration::hours(1),
            chrono::Utc::now() + chrono::Duration::hours(1),
        )
        .await
        .unwrap();
    assert_eq!(sales.len(), 1, "second sighting of T-1 must be dropped");

    // Only the first sighting broadcasts a data event.
    let events = drain_events(&mut rx).await;
    assert_eq!(
        events
            .iter()
            .filter(|k| **k == EventKind::FuelTransaction)
            .count(),
        1
    );

    let refreshed = store.endpoint(&ep.id).await.unwrap().unwrap();
    assert_eq!(refreshed.successful_requests, 2);
    assert_eq!(refreshed.records_processed, 1);
}

#[tokio::test]
async fn work_orders_upsert_by_number_across_polls() {
    let calls = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/orders",
            get(|State(calls): State<Arc<AtomicUsize>>| async move {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                let status = if call == 0 { "pending" } else { "completed" };
                Json(json!([{
                    "order": {"number": "WO-42"},
                    "status": status,
                    "total_amount": 150.0,
                    "labor_total": 90.0,
                    "parts_retail": 60.0,
                    "parts_cost": 25.0
                }]))
            }),
        )
        .with_state(calls);
    let stub = StubService::start(router).await;

    let store = Arc::new(MemoryStore::new());
    let (poller, hub) = harness(&store);
    let (_sub, mut rx) = hub.connect();

    let mut ep = endpoint(stub.port(), "/orders", DataCategory::AutoWorkOrders);
    ep.mappings = vec![FieldMapping {
        source_field: "order.number".to_string(),
        target_field: "work_order_number".to_string(),
        transform: Transform::None,
    }];
    poller.register_endpoint(ep.clone()).await.unwrap();

    poller.refresh_endpoint(&ep.id).await.unwrap();
    let first = store.work_order_by_number("WO-42").await.unwrap().unwrap();
    assert_eq!(first.status, WorkOrderStatus::Pending);

    poller.refresh_endpoint(&ep.id).await.unwrap();
    let second = store.work_order_by_number("WO-42").await.unwrap().unwrap();
    assert_eq!(second.status, WorkOrderStatus::Completed);
    // One row, updated in place.
    assert_eq!(second.id, first.id);

    // Work orders broadcast on update too, since their lifecycle mutates.
    let events = drain_events(&mut rx).await;
    assert_eq!(
        events
            .iter()
            .filter(|k| **k == EventKind::AutoWorkOrder)
            .count(),
        2
    );
}

#[tokio::test]
async fn failures_degrade_then_error_and_emit_status_events() {
    let dead_port = free_port().await;

    let store = Arc::new(MemoryStore::new());
    let (poller, hub) = harness(&store);
    let (_sub, mut rx) = hub.connect();

    let ep = endpoint(dead_port, "/transactions", DataCategory::FuelTransactions);
    poller.register_endpoint(ep.clone()).await.unwrap();

    for _ in 0..2 {
        poller.refresh_endpoint(&ep.id).await.unwrap();
    }
    let degraded = store.endpoint(&ep.id).await.unwrap().unwrap();
    assert_eq!(degraded.status, EndpointStatus::Degraded);

    poller.refresh_endpoint(&ep.id).await.unwrap();
    let errored = store.endpoint(&ep.id).await.unwrap().unwrap();
    assert_eq!(errored.status, EndpointStatus::Error);
    assert_eq!(errored.consecutive_failures, 3);
    assert!(errored.last_error.is_some());

    let events = drain_events(&mut rx).await;
    assert_eq!(
        events
            .iter()
            .filter(|k| **k == EventKind::EndpointStatus)
            .count(),
        3
    );

    // One failing endpoint does not corrupt the record store.
    assert!(store
        .fuel_sales_between(
            chrono::Utc::now() - chrono::Duration::hours(1),
            chrono::Utc::now()
        )
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn non_2xx_responses_count_as_failures() {
    let router = Router::new().route(
        "/transactions",
        get(|| async { (axum::http::StatusCode::BAD_GATEWAY, "upstream broke") }),
    );
    let stub = StubService::start(router).await;

    let store = Arc::new(MemoryStore::new());
    let (poller, _hub) = harness(&store);

    let ep = endpoint(stub.port(), "/transactions", DataCategory::FuelTransactions);
    poller.register_endpoint(ep.clone()).await.unwrap();
    poller.refresh_endpoint(&ep.id).await.unwrap();

    let refreshed = store.endpoint(&ep.id).await.unwrap().unwrap();
    assert_eq!(refreshed.status, EndpointStatus::Degraded);
    assert!(refreshed.last_error.as_deref().unwrap().contains("502"));
}

#[tokio::test]
async fn unregister_retires_the_endpoint() {
    let store = Arc::new(MemoryStore::new());
    let (poller, _hub) = harness(&store);

    let ep = endpoint(free_port().await, "/feed", DataCategory::FuelTransactions);
    poller.register_endpoint(ep.clone()).await.unwrap();
    assert_eq!(poller.watched_count(), 1);

    poller.unregister_endpoint(&ep.id).await.unwrap();
    assert_eq!(poller.watched_count(), 0);

    let retired = store.endpoint(&ep.id).await.unwrap().unwrap();
    assert_eq!(retired.status, EndpointStatus::Deprecated);

    // Registration is idempotent: watching again after retirement is a
    // catalog decision, not a scheduling accident.
    assert!(store.pollable_endpoints().await.unwrap().is_empty());
}

#[tokio::test]
async fn refreshing_unknown_endpoint_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let (poller, _hub) = harness(&store);
    assert!(poller.refresh_endpoint("ghost").await.is_err());
}
