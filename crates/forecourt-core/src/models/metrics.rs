//! Metric rollups, calendar period windows, and endpoint health DTOs

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::{DataCategory, EndpointStatus};
use super::record::{FuelType, ServiceCategory};

/// Granularity of a metrics request
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// Calendar-aligned [start, end) window plus the immediately preceding
/// window of the same granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub prev_start: DateTime<Utc>,
    pub prev_end: DateTime<Utc>,
}

fn midnight(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_hms_opt(0, 0, 0).expect("valid time").and_utc()
}

fn first_of_month(at: DateTime<Utc>) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(at.year(), at.month(), 1)
        .expect("valid date")
        .and_hms_opt(0, 0, 0)
        .expect("valid time")
        .and_utc()
}

fn first_of_year(at: DateTime<Utc>) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(at.year(), 1, 1)
        .expect("valid date")
        .and_hms_opt(0, 0, 0)
        .expect("valid time")
        .and_utc()
}

impl Period {
    /// Resolve the current window at `now`. The previous window ends exactly
    /// 1ms before the current window starts and spans the calendar-equivalent
    /// prior period (weeks run Sunday-to-Saturday).
    pub fn window_at(self, now: DateTime<Utc>) -> PeriodWindow {
        let start = match self {
            Period::Daily => midnight(now),
            Period::Weekly => {
                let back = now.weekday().num_days_from_sunday() as i64;
                midnight(now - Duration::days(back))
            }
            Period::Monthly => first_of_month(now),
            Period::Yearly => first_of_year(now),
        };
        let prev_end = start - Duration::milliseconds(1);
        let prev_start = match self {
            Period::Daily => midnight(prev_end),
            Period::Weekly => midnight(prev_end - Duration::days(6)),
            Period::Monthly => first_of_month(prev_end),
            Period::Yearly => first_of_year(prev_end),
        };
        PeriodWindow {
            start,
            end: now,
            prev_start,
            prev_end,
        }
    }
}

/// Fuel rollup for one window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuelRollup {
    pub total_gallons: f64,
    pub total_revenue: f64,
    pub total_cost: f64,
    pub gross_margin: f64,
    pub average_margin_per_gallon: f64,
    pub transaction_count: u64,
    pub by_fuel_type: BTreeMap<FuelType, FuelTypeRollup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuelTypeRollup {
    pub gallons: f64,
    pub revenue: f64,
    pub margin: f64,
}

/// Service-shop rollup for one window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoRollup {
    pub work_order_count: u64,
    pub total_revenue: f64,
    pub labor_revenue: f64,
    pub parts_revenue: f64,
    pub gross_profit: f64,
    pub profit_margin: f64,
    pub average_ticket: f64,
    pub labor_hours: f64,
    pub by_service_type: BTreeMap<ServiceCategory, ServiceTypeRollup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceTypeRollup {
    pub count: u64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombinedRollup {
    pub total_revenue: f64,
    pub total_cost: f64,
    pub gross_profit: f64,
    pub profit_margin: f64,
}

/// Percentage change versus the prior period; 0 when the prior period had
/// no volume (a trend is never infinite or undefined)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub revenue_change: f64,
    pub margin_change: f64,
    pub volume_change: f64,
}

/// On-demand snapshot of enterprise-wide metrics for one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnterpriseMetrics {
    pub timestamp: DateTime<Utc>,
    pub period: Period,
    pub fuel: FuelRollup,
    pub auto: AutoRollup,
    pub combined: CombinedRollup,
    pub trends: TrendSummary,
}

/// One day of fuel activity for a site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelTrendPoint {
    pub date: NaiveDate,
    pub gallons: f64,
    pub revenue: f64,
    pub margin: f64,
    pub average_price: f64,
    pub transaction_count: u64,
}

/// One day of service-shop activity for a shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoTrendPoint {
    pub date: NaiveDate,
    pub work_orders: u64,
    pub revenue: f64,
    pub labor_revenue: f64,
    pub parts_revenue: f64,
    pub profit: f64,
    pub labor_hours: f64,
    pub average_ticket: f64,
}

/// Health snapshot for one catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointHealth {
    pub endpoint_id: String,
    pub name: String,
    pub status: EndpointStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<i64>,
    pub uptime: f64,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Catalog-wide health summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointSummary {
    pub total: usize,
    pub by_status: BTreeMap<EndpointStatus, usize>,
    pub by_category: BTreeMap<DataCategory, usize>,
    pub healthy_percent: f64,
    pub average_response_time_ms: f64,
}
