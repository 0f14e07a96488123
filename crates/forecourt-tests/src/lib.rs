//! Integration tests for the forecourt hub
//!
//! End-to-end tests exercise the full pipeline against stub upstream
//! services bound to ephemeral localhost ports:
//!
//! - `discovery_test.rs` - probe/fetch/map pipeline against stub apps
//! - `polling_test.rs` - poll ticks, dedup/upsert, and stream events
//! - `api_test.rs` - REST surface and the WebSocket feed
//!
//! Run with: cargo test -p forecourt-tests

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// A stub upstream service that shuts down when dropped
pub struct StubService {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl StubService {
    /// Serve an axum router on an ephemeral localhost port
    pub async fn start(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(10)).await;

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl Drop for StubService {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Reserve a port that nothing is listening on
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind probe");
    listener.local_addr().expect("probe addr").port()
}

/// Minimal valid spec exposing `GET /widgets`
pub fn widget_spec() -> Value {
    json!({
        "openapi": "3.0.0",
        "info": {"title": "Widget Service", "version": "1.0.0"},
        "paths": {
            "/widgets": {
                "get": {
                    "operationId": "listWidgets",
                    "summary": "List widgets",
                    "responses": {"200": {"description": "ok"}}
                }
            }
        }
    })
}
