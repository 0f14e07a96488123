//! Canonical operational records
//!
//! Two variants land in the durable store after field mapping: fuel
//! transactions (create-once by transaction id) and service-shop work orders
//! (upserted by work-order number, since a work order has a mutable
//! lifecycle while a point-in-time sale does not).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FuelType {
    Regular,
    Midgrade,
    Premium,
    Diesel,
    E85,
}

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
pub enum TransactionType {
    Sale,
    Delivery,
    Adjustment,
    Return,
}

/// A normalized fuel transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuelTransaction {
    pub id: Uuid,
    pub site_id: String,
    /// Natural key from the source system; unique, create-once
    pub transaction_id: String,
    pub transaction_type: TransactionType,
    pub transaction_at: DateTime<Utc>,
    pub fuel_type: FuelType,
    pub gallons: f64,
    pub price_per_gallon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_per_gallon: Option<f64>,
    pub total_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    /// Revenue minus cost, when the cost side is known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gross_margin: Option<f64>,
    pub source_system: String,
    pub source_endpoint_id: String,
    /// Original upstream record, retained verbatim for audit
    pub raw: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceCategory {
    OilChange,
    BrakeService,
    TireService,
    Alignment,
    Inspection,
    Diagnostic,
    EngineRepair,
    Transmission,
    Electrical,
    GeneralMaintenance,
    Other,
}

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
pub enum WorkOrderStatus {
    Estimate,
    Pending,
    InProgress,
    WaitingParts,
    Completed,
    Invoiced,
    Paid,
    Cancelled,
}

impl WorkOrderStatus {
    /// Statuses that count toward revenue rollups
    pub const REVENUE_SET: [WorkOrderStatus; 3] = [
        WorkOrderStatus::Completed,
        WorkOrderStatus::Invoiced,
        WorkOrderStatus::Paid,
    ];
}

/// A normalized service-shop work order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: Uuid,
    pub shop_id: String,
    /// Natural key from the source system; unique, upsert target
    pub work_order_number: String,
    pub status: WorkOrderStatus,
    pub service_date: DateTime<Utc>,
    pub customer_name: String,
    pub service_category: ServiceCategory,
    pub labor_hours: f64,
    pub labor_total: f64,
    pub parts_cost: f64,
    pub parts_retail: f64,
    pub total_amount: f64,
    pub gross_profit: f64,
    pub source_system: String,
    pub source_endpoint_id: String,
    /// Original upstream record, retained verbatim for audit
    pub raw: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
