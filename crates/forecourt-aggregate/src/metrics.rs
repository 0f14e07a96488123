//! Enterprise metric rollups with a time-expiring cache
//!
//! Rollups are recomputed from the record store on demand and cached per
//! period granularity; a cache hit short-circuits both computation and
//! repository access. Only recognized-complete records count toward
//! revenue: sale-type fuel transactions and completed/invoiced/paid work
//! orders.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use forecourt_core::models::{
    AutoRollup, AutoTrendPoint, CombinedRollup, EnterpriseMetrics, FuelRollup, FuelTransaction,
    FuelTrendPoint, Period, TrendSummary, WorkOrder, WorkOrderStatus,
};
use forecourt_store::{RecordStore, StoreResult};
use parking_lot::Mutex;
use tracing::debug;

const DAILY_CACHE: Duration = Duration::minutes(5);
const COARSE_CACHE: Duration = Duration::minutes(15);

struct CacheEntry {
    expires_at: DateTime<Utc>,
    metrics: EnterpriseMetrics,
}

/// Computes period-bucketed business metrics from the canonical records
pub struct MetricsService {
    records: Arc<dyn RecordStore>,
    cache: Mutex<HashMap<Period, CacheEntry>>,
}

impl MetricsService {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self {
            records,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Enterprise-wide rollup for the current calendar period, with trend
    /// deltas against the immediately preceding period
    pub async fn enterprise_metrics(&self, period: Period) -> StoreResult<EnterpriseMetrics> {
        self.enterprise_metrics_at(period, Utc::now()).await
    }

    /// Same as [`enterprise_metrics`](Self::enterprise_metrics) with an
    /// explicit clock, which keeps window math deterministic under test
    pub async fn enterprise_metrics_at(
        &self,
        period: Period,
        now: DateTime<Utc>,
    ) -> StoreResult<EnterpriseMetrics> {
        if let Some(entry) = self.cache.lock().get(&period) {
            if entry.expires_at > now {
                debug!(?period, "metrics cache hit");
                return Ok(entry.metrics.clone());
            }
        }

        let window = period.window_at(now);

        let current_fuel = fuel_rollup(
            &self
                .records
                .fuel_sales_between(window.start, window.end)
                .await?,
        );
        let previous_fuel = fuel_rollup(
            &self
                .records
                .fuel_sales_between(window.prev_start, window.start)
                .await?,
        );
        let current_auto = auto_rollup(
            &self
                .records
                .work_orders_between(&WorkOrderStatus::REVENUE_SET, window.start, window.end)
                .await?,
        );
        let previous_auto = auto_rollup(
            &self
                .records
                .work_orders_between(&WorkOrderStatus::REVENUE_SET, window.prev_start, window.start)
                .await?,
        );

        let current_revenue = current_fuel.total_revenue + current_auto.total_revenue;
        let previous_revenue = previous_fuel.total_revenue + previous_auto.total_revenue;
        let current_margin = current_fuel.gross_margin + current_auto.gross_profit;
        let previous_margin = previous_fuel.gross_margin + previous_auto.gross_profit;

        let metrics = EnterpriseMetrics {
            timestamp: now,
            period,
            combined: CombinedRollup {
                total_revenue: current_revenue,
                total_cost: current_fuel.total_cost
                    + (current_auto.total_revenue - current_auto.gross_profit),
                gross_profit: current_margin,
                profit_margin: ratio_percent(current_margin, current_revenue),
            },
            trends: TrendSummary {
                revenue_change: percent_change(current_revenue, previous_revenue),
                margin_change: percent_change(current_margin, previous_margin),
                volume_change: percent_change(
                    current_fuel.total_gallons,
                    previous_fuel.total_gallons,
                ),
            },
            fuel: current_fuel,
            auto: current_auto,
        };

        let ttl = match period {
            Period::Daily => DAILY_CACHE,
            _ => COARSE_CACHE,
        };
        self.cache.lock().insert(
            period,
            CacheEntry {
                expires_at: now + ttl,
                metrics: metrics.clone(),
            },
        );

        Ok(metrics)
    }

    /// Per-day fuel activity for one site over the trailing `days`
    pub async fn fuel_trends(&self, site_id: &str, days: u32) -> StoreResult<Vec<FuelTrendPoint>> {
        let since = Utc::now() - Duration::days(days as i64);
        self.records.fuel_daily_totals(site_id, since).await
    }

    /// Per-day service-shop activity for one shop over the trailing `days`
    pub async fn auto_trends(&self, shop_id: &str, days: u32) -> StoreResult<Vec<AutoTrendPoint>> {
        let since = Utc::now() - Duration::days(days as i64);
        self.records.auto_daily_totals(shop_id, since).await
    }
}

/// Never divides by zero: a trend against an empty prior period reports 0
fn percent_change(current: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}

fn ratio_percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

/// Fold sale transactions into a fuel rollup; unknown costs count as zero
pub fn fuel_rollup(transactions: &[FuelTransaction]) -> FuelRollup {
    let mut rollup = FuelRollup::default();

    for tx in transactions {
        let cost = tx.total_cost.unwrap_or(0.0);
        rollup.total_gallons += tx.gallons;
        rollup.total_revenue += tx.total_amount;
        rollup.total_cost += cost;
        rollup.transaction_count += 1;

        let entry = rollup.by_fuel_type.entry(tx.fuel_type).or_default();
        entry.gallons += tx.gallons;
        entry.revenue += tx.total_amount;
        entry.margin += tx.total_amount - cost;
    }

    rollup.gross_margin = rollup.total_revenue - rollup.total_cost;
    rollup.average_margin_per_gallon = if rollup.total_gallons > 0.0 {
        rollup.gross_margin / rollup.total_gallons
    } else {
        0.0
    };
    rollup
}

/// Fold revenue-recognized work orders into a service-shop rollup
pub fn auto_rollup(orders: &[WorkOrder]) -> AutoRollup {
    let mut rollup = AutoRollup::default();

    for order in orders {
        rollup.work_order_count += 1;
        rollup.total_revenue += order.total_amount;
        rollup.labor_revenue += order.labor_total;
        rollup.parts_revenue += order.parts_retail;
        rollup.gross_profit += order.gross_profit;
        rollup.labor_hours += order.labor_hours;

        let entry = rollup.by_service_type.entry(order.service_category).or_default();
        entry.count += 1;
        entry.revenue += order.total_amount;
    }

    rollup.profit_margin = ratio_percent(rollup.gross_profit, rollup.total_revenue);
    rollup.average_ticket = if rollup.work_order_count > 0 {
        rollup.total_revenue / rollup.work_order_count as f64
    } else {
        0.0
    };
    rollup
}
