//! Discovery pipeline tests against stub upstream services
//!
//! Run with: cargo test -p forecourt-tests --test discovery_test

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use forecourt_core::config::{CandidateService, DiscoveryConfig};
use forecourt_core::models::{HttpMethod, ServiceKind, ServiceStatus};
use forecourt_discovery::{fetch, probe, DiscoveryService};
use forecourt_tests::{free_port, widget_spec, StubService};
use serde_json::json;

fn candidate(name: &str, port: u16) -> CandidateService {
    CandidateService {
        name: name.to_string(),
        port,
        kind: ServiceKind::Fuel,
        spec_paths: vec!["/openapi.json".to_string()],
        health_paths: vec!["/health".to_string()],
    }
}

fn tuning(services: Vec<CandidateService>) -> DiscoveryConfig {
    DiscoveryConfig {
        request_timeout_ms: 2_000,
        health_timeout_ms: 500,
        max_retries: 3,
        retry_base_delay_ms: 20,
        services,
    }
}

fn healthy_router(spec: serde_json::Value) -> Router {
    Router::new()
        .route(
            "/health",
            get(|| async { Json(json!({"status": "healthy", "version": "1.2.3"})) }),
        )
        .route("/openapi.json", get(move || async move { Json(spec) }))
}

#[tokio::test]
async fn scan_reports_every_candidate_regardless_of_reachability() {
    let live = StubService::start(healthy_router(widget_spec())).await;
    let dead_port = free_port().await;

    let config = tuning(vec![
        candidate("Live App", live.port()),
        candidate("Dead App", dead_port),
    ]);
    let discovery = DiscoveryService::new(config).unwrap();

    let scan = discovery.scan_environment().await;

    assert_eq!(scan.services_scanned, 2);
    assert_eq!(scan.services.len(), 2);
    assert_eq!(scan.services_online, 1);
    assert_eq!(scan.services_offline, 1);
    assert!(scan.errors.is_empty(), "probe failures are data, not errors");
    assert!(scan.success);

    let live_entry = scan.services.iter().find(|s| s.id == "live-app").unwrap();
    assert_eq!(live_entry.status, ServiceStatus::Online);
    assert_eq!(live_entry.version.as_deref(), Some("1.2.3"));

    // Offline probes are reported but not retained as the service record.
    assert_eq!(discovery.services().await.len(), 1);
}

#[tokio::test]
async fn probe_records_the_health_path_that_answered() {
    // /health does not exist on this stub; /api/health does.
    let router = Router::new().route(
        "/api/health",
        get(|| async { Json(json!({"status": "ok"})) }),
    );
    let stub = StubService::start(router).await;

    let mut config = candidate("Picky App", stub.port());
    config.health_paths = vec![
        "/health".to_string(),
        "/api/health".to_string(),
        "/healthz".to_string(),
    ];
    let tuning = tuning(vec![config.clone()]);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let service = probe::probe_service(&client, &config, &tuning).await;
    assert_eq!(service.status, ServiceStatus::Online);
    assert_eq!(service.health_endpoint.as_deref(), Some("/api/health"));
}

#[tokio::test]
async fn probe_accepts_4xx_from_base_address_as_liveness() {
    // No health paths answer, but the base address responds 404, which
    // still proves something is listening.
    let router = Router::new();
    let stub = StubService::start(router).await;

    let config = candidate("Grumpy App", stub.port());
    let tuning = tuning(vec![config.clone()]);
    let client = reqwest::Client::new();

    let service = probe::probe_service(&client, &config, &tuning).await;
    assert_eq!(service.status, ServiceStatus::Online);
    assert_eq!(service.health_endpoint, None);
}

async fn counted_spec_stub<F>(responses: F) -> (StubService, Arc<AtomicUsize>)
where
    F: Fn(usize) -> (StatusCode, serde_json::Value) + Clone + Send + Sync + 'static,
{
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    let router = Router::new()
        .route(
            "/health",
            get(|| async { Json(json!({"status": "healthy"})) }),
        )
        .route(
            "/openapi.json",
            get(move |State(counter): State<Arc<AtomicUsize>>| {
                let responses = responses.clone();
                async move {
                    let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    let (status, body) = responses(attempt);
                    (status, Json(body)).into_response()
                }
            }),
        )
        .with_state(counter);

    (StubService::start(router).await, hits)
}

#[tokio::test]
async fn definitive_404_skips_retries_for_that_path() {
    let (stub, hits) =
        counted_spec_stub(|_| (StatusCode::NOT_FOUND, json!({"error": "nope"}))).await;

    let config = candidate("No Spec App", stub.port());
    let tuning = tuning(vec![config.clone()]);
    let client = reqwest::Client::new();
    let service = probe::probe_service(&client, &config, &tuning).await;

    let started = std::time::Instant::now();
    let outcome = fetch::fetch_spec(&client, &service, &config, &tuning).await;

    assert!(outcome.is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 1, "404 must not be retried");
    // No retry-induced delay either.
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn transient_errors_are_retried_until_success() {
    let (stub, hits) = counted_spec_stub(|attempt| {
        if attempt < 3 {
            (StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "flaky"}))
        } else {
            (StatusCode::OK, forecourt_tests::widget_spec())
        }
    })
    .await;

    let config = candidate("Flaky App", stub.port());
    let tuning = tuning(vec![config.clone()]);
    let client = reqwest::Client::new();
    let service = probe::probe_service(&client, &config, &tuning).await;

    let outcome = fetch::fetch_spec(&client, &service, &config, &tuning).await;

    let (spec, path) = outcome.expect("third attempt should succeed");
    assert_eq!(spec.info.title, "Widget Service");
    assert_eq!(path, "/openapi.json");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn invalid_spec_payloads_are_rejected_silently() {
    let router = Router::new()
        .route(
            "/health",
            get(|| async { Json(json!({"status": "healthy"})) }),
        )
        .route(
            "/openapi.json",
            get(|| async { Json(json!({"this_is": "not a spec"})) }),
        );
    let stub = StubService::start(router).await;

    let config = candidate("Junk App", stub.port());
    let tuning = tuning(vec![config.clone()]);
    let client = reqwest::Client::new();
    let service = probe::probe_service(&client, &config, &tuning).await;

    assert!(fetch::fetch_spec(&client, &service, &config, &tuning)
        .await
        .is_none());
}

#[tokio::test]
async fn full_pipeline_maps_the_widget_endpoint() {
    let stub = StubService::start(healthy_router(widget_spec())).await;
    let port = stub.port();

    let discovery = DiscoveryService::new(tuning(vec![candidate("Widget App", port)])).unwrap();
    let result = discovery.full_discovery().await;

    assert_eq!(result.scan.services_online, 1);
    assert_eq!(result.specs.len(), 1);

    let endpoints = &result.endpoints["widget-app"];
    assert_eq!(endpoints.len(), 1);
    let ep = &endpoints[0];
    assert_eq!(ep.path, "/widgets");
    assert_eq!(ep.method, HttpMethod::Get);
    assert_eq!(ep.full_url, format!("http://localhost:{port}/widgets"));
    assert_eq!(ep.operation_id, "listWidgets");

    // The service record now carries the spec path that worked.
    let service = discovery.service("widget-app").await.unwrap();
    assert_eq!(service.spec_url.as_deref(), Some("/openapi.json"));

    // Status summary sees one online service with one endpoint.
    let status = discovery.status().await;
    assert_eq!(status.services_online, 1);
    assert_eq!(status.total_endpoints, 1);
    assert_eq!(status.services[0].endpoints, 1);
}

#[tokio::test]
async fn rescan_overwrites_endpoints_wholesale() {
    let stub = StubService::start(healthy_router(widget_spec())).await;
    let port = stub.port();

    let discovery = DiscoveryService::new(tuning(vec![candidate("Widget App", port)])).unwrap();
    discovery.full_discovery().await;
    assert_eq!(discovery.total_endpoint_count().await, 1);

    // Same spec again: catalog is rebuilt, not accumulated.
    discovery.full_discovery().await;
    assert_eq!(discovery.total_endpoint_count().await, 1);
}
