//! SQLite storage backend
//!
//! The durable default. WAL mode is enabled so poll-driven writes and
//! metric reads can proceed concurrently; the schema lives in embedded
//! migrations and is applied on connect.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use forecourt_core::models::{
    AuthConfig, AutoTrendPoint, EndpointStatus, FieldMapping, FuelTransaction, FuelTrendPoint,
    PolledEndpoint, TransactionType, WorkOrder, WorkOrderStatus,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::{EndpointCatalog, RecordStore, UpsertOutcome};

/// Storage backend over a SQLite database file
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and apply migrations
    pub async fn connect(path: impl AsRef<Path>) -> StoreResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(path = %path.as_ref().display(), "sqlite store ready");

        Ok(Self { pool })
    }

    /// An in-memory database, for tests and throwaway runs
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);

        // A pooled :memory: connection is a distinct database, so the pool
        // must stay at a single connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn parse_enum<T: FromStr>(raw: &str, what: &str) -> Result<T, StoreError> {
    raw.parse::<T>()
        .map_err(|_| StoreError::Decode(format!("invalid {what}: {raw}")))
}

fn parse_uuid(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Decode(format!("invalid uuid: {e}")))
}

fn parse_day(raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| StoreError::Decode(format!("invalid day {raw}: {e}")))
}

fn fuel_from_row(row: &SqliteRow) -> Result<FuelTransaction, StoreError> {
    Ok(FuelTransaction {
        id: parse_uuid(row.try_get::<&str, _>("id")?)?,
        site_id: row.try_get("site_id")?,
        transaction_id: row.try_get("transaction_id")?,
        transaction_type: parse_enum(row.try_get::<&str, _>("transaction_type")?, "transaction_type")?,
        transaction_at: row.try_get("transaction_at")?,
        fuel_type: parse_enum(row.try_get::<&str, _>("fuel_type")?, "fuel_type")?,
        gallons: row.try_get("gallons")?,
        price_per_gallon: row.try_get("price_per_gallon")?,
        cost_per_gallon: row.try_get("cost_per_gallon")?,
        total_amount: row.try_get("total_amount")?,
        total_cost: row.try_get("total_cost")?,
        gross_margin: row.try_get("gross_margin")?,
        source_system: row.try_get("source_system")?,
        source_endpoint_id: row.try_get("source_endpoint_id")?,
        raw: serde_json::from_str(row.try_get::<&str, _>("raw")?)?,
        created_at: row.try_get("created_at")?,
    })
}

fn order_from_row(row: &SqliteRow) -> Result<WorkOrder, StoreError> {
    Ok(WorkOrder {
        id: parse_uuid(row.try_get::<&str, _>("id")?)?,
        shop_id: row.try_get("shop_id")?,
        work_order_number: row.try_get("work_order_number")?,
        status: parse_enum(row.try_get::<&str, _>("status")?, "status")?,
        service_date: row.try_get("service_date")?,
        customer_name: row.try_get("customer_name")?,
        service_category: parse_enum(row.try_get::<&str, _>("service_category")?, "service_category")?,
        labor_hours: row.try_get("labor_hours")?,
        labor_total: row.try_get("labor_total")?,
        parts_cost: row.try_get("parts_cost")?,
        parts_retail: row.try_get("parts_retail")?,
        total_amount: row.try_get("total_amount")?,
        gross_profit: row.try_get("gross_profit")?,
        source_system: row.try_get("source_system")?,
        source_endpoint_id: row.try_get("source_endpoint_id")?,
        raw: serde_json::from_str(row.try_get::<&str, _>("raw")?)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn endpoint_from_row(row: &SqliteRow) -> Result<PolledEndpoint, StoreError> {
    let auth: Option<AuthConfig> = row
        .try_get::<Option<&str>, _>("auth")?
        .map(serde_json::from_str)
        .transpose()?;
    let mappings: Vec<FieldMapping> = serde_json::from_str(row.try_get::<&str, _>("mappings")?)?;

    Ok(PolledEndpoint {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        source_system: row.try_get("source_system")?,
        site_id: row.try_get("site_id")?,
        category: parse_enum(row.try_get::<&str, _>("category")?, "category")?,
        base_url: row.try_get("base_url")?,
        path: row.try_get("path")?,
        method: parse_enum(row.try_get::<&str, _>("method")?, "method")?,
        auth,
        mappings,
        poll_interval_secs: row.try_get::<i64, _>("poll_interval_secs")? as u64,
        polling_enabled: row.try_get("polling_enabled")?,
        next_poll_at: row.try_get("next_poll_at")?,
        status: parse_enum(row.try_get::<&str, _>("status")?, "status")?,
        consecutive_failures: row.try_get::<i64, _>("consecutive_failures")? as u32,
        last_response_time_ms: row.try_get("last_response_time_ms")?,
        uptime_percent: row.try_get("uptime_percent")?,
        last_error: row.try_get("last_error")?,
        last_success_at: row.try_get("last_success_at")?,
        last_checked_at: row.try_get("last_checked_at")?,
        total_requests: row.try_get::<i64, _>("total_requests")? as u64,
        successful_requests: row.try_get::<i64, _>("successful_requests")? as u64,
        failed_requests: row.try_get::<i64, _>("failed_requests")? as u64,
        records_processed: row.try_get::<i64, _>("records_processed")? as u64,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert_fuel_transaction(&self, tx: &FuelTransaction) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO fuel_transactions \
             (id, site_id, transaction_id, transaction_type, transaction_at, fuel_type, \
              gallons, price_per_gallon, cost_per_gallon, total_amount, total_cost, \
              gross_margin, source_system, source_endpoint_id, raw, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(tx.id.to_string())
        .bind(&tx.site_id)
        .bind(&tx.transaction_id)
        .bind(tx.transaction_type.to_string())
        .bind(tx.transaction_at)
        .bind(tx.fuel_type.to_string())
        .bind(tx.gallons)
        .bind(tx.price_per_gallon)
        .bind(tx.cost_per_gallon)
        .bind(tx.total_amount)
        .bind(tx.total_cost)
        .bind(tx.gross_margin)
        .bind(&tx.source_system)
        .bind(&tx.source_endpoint_id)
        .bind(serde_json::to_string(&tx.raw)?)
        .bind(tx.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn fuel_transaction_by_natural_id(
        &self,
        transaction_id: &str,
    ) -> StoreResult<Option<FuelTransaction>> {
        let row = sqlx::query("SELECT * FROM fuel_transactions WHERE transaction_id = ?")
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(fuel_from_row).transpose()
    }

    async fn fuel_sales_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<FuelTransaction>> {
        let rows = sqlx::query(
            "SELECT * FROM fuel_transactions \
             WHERE transaction_type = ? AND transaction_at >= ? AND transaction_at < ? \
             ORDER BY transaction_at ASC",
        )
        .bind(TransactionType::Sale.to_string())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(fuel_from_row).collect()
    }

    async fn fuel_daily_totals(
        &self,
        site_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<FuelTrendPoint>> {
        let rows = sqlx::query(
            "SELECT date(transaction_at) AS day, \
                    SUM(gallons) AS gallons, \
                    SUM(total_amount) AS revenue, \
                    SUM(COALESCE(gross_margin, 0)) AS margin, \
                    AVG(price_per_gallon) AS average_price, \
                    COUNT(*) AS transaction_count \
             FROM fuel_transactions \
             WHERE site_id = ? AND transaction_type = ? AND transaction_at >= ? \
             GROUP BY date(transaction_at) \
             ORDER BY day ASC",
        )
        .bind(site_id)
        .bind(TransactionType::Sale.to_string())
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(FuelTrendPoint {
                    date: parse_day(row.try_get::<&str, _>("day")?)?,
                    gallons: row.try_get("gallons")?,
                    revenue: row.try_get("revenue")?,
                    margin: row.try_get("margin")?,
                    average_price: row.try_get("average_price")?,
                    transaction_count: row.try_get::<i64, _>("transaction_count")? as u64,
                })
            })
            .collect()
    }

    async fn upsert_work_order(&self, order: &WorkOrder) -> StoreResult<UpsertOutcome> {
        let existing = self.work_order_by_number(&order.work_order_number).await?;

        match existing {
            Some(current) => {
                sqlx::query(
                    "UPDATE work_orders SET \
                     shop_id = ?, status = ?, service_date = ?, customer_name = ?, \
                     service_category = ?, labor_hours = ?, labor_total = ?, parts_cost = ?, \
                     parts_retail = ?, total_amount = ?, gross_profit = ?, source_system = ?, \
                     source_endpoint_id = ?, raw = ?, updated_at = ? \
                     WHERE work_order_number = ?",
                )
                .bind(&order.shop_id)
                .bind(order.status.to_string())
                .bind(order.service_date)
                .bind(&order.customer_name)
                .bind(order.service_category.to_string())
                .bind(order.labor_hours)
                .bind(order.labor_total)
                .bind(order.parts_cost)
                .bind(order.parts_retail)
                .bind(order.total_amount)
                .bind(order.gross_profit)
                .bind(&order.source_system)
                .bind(&order.source_endpoint_id)
                .bind(serde_json::to_string(&order.raw)?)
                .bind(order.updated_at)
                .bind(&current.work_order_number)
                .execute(&self.pool)
                .await?;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                sqlx::query(
                    "INSERT INTO work_orders \
                     (id, shop_id, work_order_number, status, service_date, customer_name, \
                      service_category, labor_hours, labor_total, parts_cost, parts_retail, \
                      total_amount, gross_profit, source_system, source_endpoint_id, raw, \
                      created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(order.id.to_string())
                .bind(&order.shop_id)
                .bind(&order.work_order_number)
                .bind(order.status.to_string())
                .bind(order.service_date)
                .bind(&order.customer_name)
                .bind(order.service_category.to_string())
                .bind(order.labor_hours)
                .bind(order.labor_total)
                .bind(order.parts_cost)
                .bind(order.parts_retail)
                .bind(order.total_amount)
                .bind(order.gross_profit)
                .bind(&order.source_system)
                .bind(&order.source_endpoint_id)
                .bind(serde_json::to_string(&order.raw)?)
                .bind(order.created_at)
                .bind(order.updated_at)
                .execute(&self.pool)
                .await?;
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn work_order_by_number(&self, number: &str) -> StoreResult<Option<WorkOrder>> {
        let row = sqlx::query("SELECT * FROM work_orders WHERE work_order_number = ?")
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn work_orders_between(
        &self,
        statuses: &[WorkOrderStatus],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<WorkOrder>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            "SELECT * FROM work_orders \
             WHERE status IN ({placeholders}) AND service_date >= ? AND service_date < ? \
             ORDER BY service_date ASC"
        );

        let mut query = sqlx::query(&sql);
        for status in statuses {
            query = query.bind(status.to_string());
        }
        let rows = query.bind(start).bind(end).fetch_all(&self.pool).await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn auto_daily_totals(
        &self,
        shop_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<AutoTrendPoint>> {
        let rows = sqlx::query(
            "SELECT date(service_date) AS day, \
                    COUNT(*) AS work_orders, \
                    SUM(total_amount) AS revenue, \
                    SUM(labor_total) AS labor_revenue, \
                    SUM(parts_retail) AS parts_revenue, \
                    SUM(gross_profit) AS profit, \
                    SUM(labor_hours) AS labor_hours \
             FROM work_orders \
             WHERE shop_id = ? AND service_date >= ? \
             GROUP BY date(service_date) \
             ORDER BY day ASC",
        )
        .bind(shop_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let work_orders = row.try_get::<i64, _>("work_orders")? as u64;
                let revenue: f64 = row.try_get("revenue")?;
                Ok(AutoTrendPoint {
                    date: parse_day(row.try_get::<&str, _>("day")?)?,
                    work_orders,
                    revenue,
                    labor_revenue: row.try_get("labor_revenue")?,
                    parts_revenue: row.try_get("parts_revenue")?,
                    profit: row.try_get("profit")?,
                    labor_hours: row.try_get("labor_hours")?,
                    average_ticket: if work_orders > 0 {
                        revenue / work_orders as f64
                    } else {
                        0.0
                    },
                })
            })
            .collect()
    }
}

#[async_trait]
impl EndpointCatalog for SqliteStore {
    async fn insert_endpoint(&self, endpoint: &PolledEndpoint) -> StoreResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO polled_endpoints \
             (id, name, description, source_system, site_id, category, base_url, path, method, \
              auth, mappings, poll_interval_secs, polling_enabled, next_poll_at, status, \
              consecutive_failures, last_response_time_ms, uptime_percent, last_error, \
              last_success_at, last_checked_at, total_requests, successful_requests, \
              failed_requests, records_processed, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&endpoint.id)
        .bind(&endpoint.name)
        .bind(&endpoint.description)
        .bind(&endpoint.source_system)
        .bind(&endpoint.site_id)
        .bind(endpoint.category.to_string())
        .bind(&endpoint.base_url)
        .bind(&endpoint.path)
        .bind(endpoint.method.to_string())
        .bind(
            endpoint
                .auth
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(serde_json::to_string(&endpoint.mappings)?)
        .bind(endpoint.poll_interval_secs as i64)
        .bind(endpoint.polling_enabled)
        .bind(endpoint.next_poll_at)
        .bind(endpoint.status.to_string())
        .bind(endpoint.consecutive_failures as i64)
        .bind(endpoint.last_response_time_ms)
        .bind(endpoint.uptime_percent)
        .bind(&endpoint.last_error)
        .bind(endpoint.last_success_at)
        .bind(endpoint.last_checked_at)
        .bind(endpoint.total_requests as i64)
        .bind(endpoint.successful_requests as i64)
        .bind(endpoint.failed_requests as i64)
        .bind(endpoint.records_processed as i64)
        .bind(endpoint.created_at)
        .bind(endpoint.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_endpoint(&self, endpoint: &PolledEndpoint) -> StoreResult<()> {
        if self.endpoint(&endpoint.id).await?.is_none() {
            return Err(StoreError::NotFound(endpoint.id.clone()));
        }
        self.insert_endpoint(endpoint).await
    }

    async fn endpoint(&self, id: &str) -> StoreResult<Option<PolledEndpoint>> {
        let row = sqlx::query("SELECT * FROM polled_endpoints WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(endpoint_from_row).transpose()
    }

    async fn list_endpoints(&self) -> StoreResult<Vec<PolledEndpoint>> {
        let rows = sqlx::query("SELECT * FROM polled_endpoints ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(endpoint_from_row).collect()
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
        let result = sqlx::query(
            "UPDATE polled_endpoints SET status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.to_string())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn record_poll_success(
        &self,
        id: &str,
        response_time_ms: i64,
    ) -> StoreResult<PolledEndpoint> {
        let mut ep = self
            .endpoint(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        ep.note_success(response_time_ms, Utc::now());
        self.update_endpoint(&ep).await?;
        Ok(ep)
    }

    async fn record_poll_failure(&self, id: &str, error: &str) -> StoreResult<PolledEndpoint> {
        let mut ep = self
            .endpoint(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        ep.note_failure(error, Utc::now());
        self.update_endpoint(&ep).await?;
        Ok(ep)
    }

    async fn add_processed_records(&self, id: &str, count: u64) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE polled_endpoints \
             SET records_processed = records_processed + ?, updated_at = ? WHERE id = ?",
        )
        .bind(count as i64)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
