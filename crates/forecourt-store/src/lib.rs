//! forecourt-store - Durable storage for canonical records and the endpoint catalog
//!
//! The poller and the metrics aggregator talk to storage exclusively through
//! the [`RecordStore`] and [`EndpointCatalog`] traits, so the backing store
//! is swappable: [`SqliteStore`] is the durable default, [`MemoryStore`]
//! backs tests and ephemeral setups.

pub mod error;
pub mod memory;
pub mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forecourt_core::models::{
    AutoTrendPoint, EndpointStatus, FuelTransaction, FuelTrendPoint, PolledEndpoint, WorkOrder,
    WorkOrderStatus,
};

/// Whether an upsert created a new row or replaced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Repository over the canonical operational records
///
/// Fuel transactions are create-once by natural transaction id; work orders
/// are upserted by work-order number.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a fuel transaction unless one with the same natural id exists.
    /// Returns `false` when the record was a duplicate and dropped.
    async fn insert_fuel_transaction(&self, tx: &FuelTransaction) -> StoreResult<bool>;

    async fn fuel_transaction_by_natural_id(
        &self,
        transaction_id: &str,
    ) -> StoreResult<Option<FuelTransaction>>;

    /// Sale-type transactions in the [start, end) window
    async fn fuel_sales_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<FuelTransaction>>;

    /// Per-day fuel rollup for one site since a cutoff (sales only)
    async fn fuel_daily_totals(
        &self,
        site_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<FuelTrendPoint>>;

    /// Insert or update by work-order number, preserving the original row
    /// identity and creation time on update
    async fn upsert_work_order(&self, order: &WorkOrder) -> StoreResult<UpsertOutcome>;

    async fn work_order_by_number(&self, number: &str) -> StoreResult<Option<WorkOrder>>;

    /// Work orders in one of `statuses` within the [start, end) window
    async fn work_orders_between(
        &self,
        statuses: &[WorkOrderStatus],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<WorkOrder>>;

    /// Per-day service-shop rollup for one shop since a cutoff
    async fn auto_daily_totals(
        &self,
        shop_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<AutoTrendPoint>>;
}

/// Repository over the persisted, polling-oriented endpoint catalog
#[async_trait]
pub trait EndpointCatalog: Send + Sync {
    async fn insert_endpoint(&self, endpoint: &PolledEndpoint) -> StoreResult<()>;

    /// Replace the stored entry wholesale (configuration changes)
    async fn update_endpoint(&self, endpoint: &PolledEndpoint) -> StoreResult<()>;

    async fn endpoint(&self, id: &str) -> StoreResult<Option<PolledEndpoint>>;

    async fn list_endpoints(&self) -> StoreResult<Vec<PolledEndpoint>>;

    /// Entries the poller should schedule (enabled, positive interval, not
    /// retired or offline)
    async fn pollable_endpoints(&self) -> StoreResult<Vec<PolledEndpoint>>;

    async fn set_endpoint_status(&self, id: &str, status: EndpointStatus) -> StoreResult<()>;

    /// Apply a successful poll to the stored health counters and return the
    /// updated entry
    async fn record_poll_success(
        &self,
        id: &str,
        response_time_ms: i64,
    ) -> StoreResult<PolledEndpoint>;

    /// Apply a failed poll to the stored health counters and return the
    /// updated entry
    async fn record_poll_failure(&self, id: &str, error: &str) -> StoreResult<PolledEndpoint>;

    /// Bump the lifetime records-processed counter after data was persisted
    async fn add_processed_records(&self, id: &str, count: u64) -> StoreResult<()>;
}
