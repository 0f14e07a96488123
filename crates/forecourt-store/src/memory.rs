//! In-memory storage backend
//!
//! Backs unit and integration tests, and ephemeral dev setups where
//! durability does not matter. Also counts record-level read queries so
//! cache short-circuit behavior can be asserted in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use forecourt_core::models::{
    AutoTrendPoint, EndpointStatus, FuelTransaction, FuelTrendPoint, PolledEndpoint,
    TransactionType, WorkOrder, WorkOrderStatus,
};
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::{EndpointCatalog, RecordStore, UpsertOutcome};

#[derive(Default)]
struct Inner {
    fuel: HashMap<String, FuelTransaction>,
    orders: HashMap<String, WorkOrder>,
    endpoints: HashMap<String, PolledEndpoint>,
}

/// Storage backend keeping everything in process memory
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    read_queries: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of record-level read queries served so far
    pub fn read_query_count(&self) -> u64 {
        self.read_queries.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_fuel_transaction(&self, tx: &FuelTransaction) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        if inner.fuel.contains_key(&tx.transaction_id) {
            return Ok(false);
        }
        inner.fuel.insert(tx.transaction_id.clone(), tx.clone());
        Ok(true)
    }

    async fn fuel_transaction_by_natural_id(
        &self,
        transaction_id: &str,
    ) -> StoreResult<Option<FuelTransaction>> {
        Ok(self.inner.read().await.fuel.get(transaction_id).cloned())
    }

    async fn fuel_sales_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<FuelTransaction>> {
        self.read_queries.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.read().await;
        Ok(inner
            .fuel
            .values()
            .filter(|tx| {
                tx.transaction_type == TransactionType::Sale
                    && tx.transaction_at >= start
                    && tx.transaction_at < end
            })
            .cloned()
            .collect())
    }

    async fn fuel_daily_totals(
        &self,
        site_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<FuelTrendPoint>> {
        self.read_queries.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.read().await;

        struct Acc {
            gallons: f64,
            revenue: f64,
            margin: f64,
            price_sum: f64,
            count: u64,
        }
        let mut days: BTreeMap<NaiveDate, Acc> = BTreeMap::new();
        for tx in inner.fuel.values() {
            if tx.site_id != site_id
                || tx.transaction_type != TransactionType::Sale
                || tx.transaction_at < since
            {
                continue;
            }
            let acc = days.entry(tx.transaction_at.date_naive()).or_insert(Acc {
                gallons: 0.0,
                revenue: 0.0,
                margin: 0.0,
                price_sum: 0.0,
                count: 0,
            });
            acc.gallons += tx.gallons;
            acc.revenue += tx.total_amount;
            acc.margin += tx.gross_margin.unwrap_or(0.0);
            acc.price_sum += tx.price_per_gallon;
            acc.count += 1;
        }

        Ok(days
            .into_iter()
            .map(|(date, acc)| FuelTrendPoint {
                date,
                gallons: acc.gallons,
                revenue: acc.revenue,
                margin: acc.margin,
                average_price: acc.price_sum / acc.count as f64,
                transaction_count: acc.count,
            })
            .collect())
    }

    async fn upsert_work_order(&self, order: &WorkOrder) -> StoreResult<UpsertOutcome> {
        let mut inner = self.inner.write().await;
        match inner.orders.get_mut(&order.work_order_number) {
            Some(existing) => {
                let id = existing.id;
                let created_at = existing.created_at;
                *existing = order.clone();
                existing.id = id;
                existing.created_at = created_at;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                inner
                    .orders
                    .insert(order.work_order_number.clone(), order.clone());
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn work_order_by_number(&self, number: &str) -> StoreResult<Option<WorkOrder>> {
        Ok(self.inner.read().await.orders.get(number).cloned())
    }

    async fn work_orders_between(
        &self,
        statuses: &[WorkOrderStatus],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<WorkOrder>> {
        self.read_queries.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.read().await;
        Ok(inner
            .orders
            .values()
            .filter(|wo| {
                statuses.contains(&wo.status)
                    && wo.service_date >= start
                    && wo.service_date < end
            })
            .cloned()
            .collect())
    }

    async fn auto_daily_totals(
        &self,
        shop_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<AutoTrendPoint>> {
        self.read_queries.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.read().await;

        struct Acc {
            work_orders: u64,
            revenue: f64,
            labor_revenue: f64,
            parts_revenue: f64,
            profit: f64,
            labor_hours: f64,
        }
        let mut days: BTreeMap<NaiveDate, Acc> = BTreeMap::new();
        for wo in inner.orders.values() {
            if wo.shop_id != shop_id || wo.service_date < since {
                continue;
            }
            let acc = days.entry(wo.service_date.date_naive()).or_insert(Acc {
                work_orders: 0,
                revenue: 0.0,
                labor_revenue: 0.0,
                parts_revenue: 0.0,
                profit: 0.0,
                labor_hours: 0.0,
            });
            acc.work_orders += 1;
            acc.revenue += wo.total_amount;
            acc.labor_revenue += wo.labor_total;
            acc.parts_revenue += wo.parts_retail;
            acc.profit += wo.gross_profit;
            acc.labor_hours += wo.labor_hours;
        }

        Ok(days
            .into_iter()
            .map(|(date, acc)| AutoTrendPoint {
                date,
                work_orders: acc.work_orders,
                revenue: acc.revenue,
                labor_revenue: acc.labor_revenue,
                parts_revenue: acc.parts_revenue,
                profit: acc.profit,
                labor_hours: acc.labor_hours,
                average_ticket: acc.revenue / acc.work_orders as f64,
            })
            .collect())
    }
}

#[async_trait]
impl EndpointCatalog for MemoryStore {
    async fn insert_endpoint(&self, endpoint: &PolledEndpoint) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .endpoints
            .insert(endpoint.id.clone(), endpoint.clone());
        Ok(())
    }

    async fn update_endpoint(&self, endpoint: &PolledEndpoint) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.endpoints.contains_key(&endpoint.id) {
            return Err(StoreError::NotFound(endpoint.id.clone()));
        }
        inner.endpoints.insert(endpoint.id.clone(), endpoint.clone());
        Ok(())
    }

    async fn endpoint(&self, id: &str) -> StoreResult<Option<PolledEndpoint>> {
        Ok(self.inner.read().await.endpoints.get(id).cloned())
    }

    async fn list_endpoints(&self) -> StoreResult<Vec<PolledEndpoint>> {
        let inner = self.inner.read().await;
        let mut all: Vec<_> = inner.endpoints.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    async fn pollable_endpoints(&self) -> StoreResult<Vec<PolledEndpoint>> {
        Ok(self
            .list_endpoints()
            .await?
            .into_iter()
            .filter(|ep| ep.is_pollable())
            .collect())
    }

    async fn set_endpoint_status(&self, id: &str, status: EndpointStatus) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let ep = inner
            .endpoints
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        ep.status = status;
        ep.updated_at = Utc::now();
        Ok(())
    }

    async fn record_poll_success(
        &self,
        id: &str,
        response_time_ms: i64,
    ) -> StoreResult<PolledEndpoint> {
        let mut inner = self.inner.write().await;
        let ep = inner
            .endpoints
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        ep.note_success(response_time_ms, Utc::now());
        Ok(ep.clone())
    }

    async fn record_poll_failure(&self, id: &str, error: &str) -> StoreResult<PolledEndpoint> {
        let mut inner = self.inner.write().await;
        let ep = inner
            .endpoints
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        ep.note_failure(error, Utc::now());
        Ok(ep.clone())
    }

    async fn add_processed_records(&self, id: &str, count: u64) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let ep = inner
            .endpoints
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        ep.records_processed += count;
        Ok(())
    }
}
