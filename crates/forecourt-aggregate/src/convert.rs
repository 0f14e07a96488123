//! Domain converters from mapped payloads to canonical records
//!
//! Each converter normalizes a payload (single object or array) through the
//! field mapping engine, then builds records with explicit defaulting:
//! missing site falls back to the endpoint's configured site, missing
//! enums to their defined defaults, missing numerics to zero, and a missing
//! timestamp to now. The original upstream record is always retained in the
//! raw field, however mapping went.

use chrono::{DateTime, Utc};
use forecourt_core::models::{
    FuelTransaction, FuelType, PolledEndpoint, ServiceCategory, TransactionType, WorkOrder,
    WorkOrderStatus,
};
use serde_json::Value;
use uuid::Uuid;

use crate::mapping::{apply_mappings, parse_date};

const UNKNOWN_SITE: &str = "unknown";

/// A payload may be one record or a batch; either way we process a list
pub fn normalize_records(payload: &Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

pub fn fuel_transactions_from_payload(
    endpoint: &PolledEndpoint,
    payload: &Value,
) -> Vec<FuelTransaction> {
    let now = Utc::now();
    normalize_records(payload)
        .iter()
        .map(|record| {
            let mapped = apply_mappings(&endpoint.mappings, record);

            let gallons = f64_field(&mapped, "gallons").unwrap_or(0.0);
            let cost_per_gallon = f64_field(&mapped, "cost_per_gallon");
            let total_amount = f64_field(&mapped, "total_amount").unwrap_or(0.0);
            let total_cost = f64_field(&mapped, "total_cost")
                .or_else(|| cost_per_gallon.map(|cost| cost * gallons));

            FuelTransaction {
                id: Uuid::new_v4(),
                site_id: str_field(&mapped, "site_id")
                    .or_else(|| endpoint.site_id.clone())
                    .unwrap_or_else(|| UNKNOWN_SITE.to_string()),
                transaction_id: str_field(&mapped, "transaction_id")
                    .unwrap_or_else(|| format!("{}-{}", endpoint.id, Uuid::new_v4())),
                transaction_type: enum_field(&mapped, "transaction_type")
                    .unwrap_or(TransactionType::Sale),
                transaction_at: datetime_field(&mapped, "transaction_at").unwrap_or(now),
                fuel_type: enum_field(&mapped, "fuel_type").unwrap_or(FuelType::Regular),
                gallons,
                price_per_gallon: f64_field(&mapped, "price_per_gallon").unwrap_or(0.0),
                cost_per_gallon,
                total_amount,
                total_cost,
                gross_margin: total_cost.map(|cost| total_amount - cost),
                source_system: endpoint.source_system.clone(),
                source_endpoint_id: endpoint.id.clone(),
                raw: record.clone(),
                created_at: now,
            }
        })
        .collect()
}

pub fn work_orders_from_payload(endpoint: &PolledEndpoint, payload: &Value) -> Vec<WorkOrder> {
    let now = Utc::now();
    normalize_records(payload)
        .iter()
        .map(|record| {
            let mapped = apply_mappings(&endpoint.mappings, record);

            let labor_total = f64_field(&mapped, "labor_total").unwrap_or(0.0);
            let parts_cost = f64_field(&mapped, "parts_cost").unwrap_or(0.0);
            let parts_retail = f64_field(&mapped, "parts_retail").unwrap_or(0.0);

            WorkOrder {
                id: Uuid::new_v4(),
                shop_id: str_field(&mapped, "shop_id")
                    .or_else(|| endpoint.site_id.clone())
                    .unwrap_or_else(|| UNKNOWN_SITE.to_string()),
                work_order_number: str_field(&mapped, "work_order_number")
                    .unwrap_or_else(|| format!("WO-{}", Uuid::new_v4())),
                status: enum_field(&mapped, "status").unwrap_or(WorkOrderStatus::Pending),
                service_date: datetime_field(&mapped, "service_date").unwrap_or(now),
                customer_name: str_field(&mapped, "customer_name")
                    .unwrap_or_else(|| "Unknown".to_string()),
                service_category: enum_field(&mapped, "service_category")
                    .unwrap_or(ServiceCategory::Other),
                labor_hours: f64_field(&mapped, "labor_hours").unwrap_or(0.0),
                labor_total,
                parts_cost,
                parts_retail,
                total_amount: f64_field(&mapped, "total_amount").unwrap_or(0.0),
                gross_profit: f64_field(&mapped, "gross_profit")
                    .unwrap_or(labor_total + parts_retail - parts_cost),
                source_system: endpoint.source_system.clone(),
                source_endpoint_id: endpoint.id.clone(),
                raw: record.clone(),
                created_at: now,
                updated_at: now,
            }
        })
        .collect()
}

/// Strings come back as-is; numeric identifiers are stringified
fn str_field(mapped: &Value, key: &str) -> Option<String> {
    match mapped.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn f64_field(mapped: &Value, key: &str) -> Option<f64> {
    match mapped.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn datetime_field(mapped: &Value, key: &str) -> Option<DateTime<Utc>> {
    parse_date(mapped.get(key)?.as_str()?)
}

fn enum_field<T: std::str::FromStr>(mapped: &Value, key: &str) -> Option<T> {
    mapped.get(key)?.as_str()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecourt_core::models::{DataCategory, FieldMapping, HttpMethod, Transform};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn endpoint(category: DataCategory, mappings: Vec<FieldMapping>) -> PolledEndpoint {
        let mut ep = PolledEndpoint::new(
            "feed",
            "jrd-fuel",
            category,
            "http://localhost:8001",
            "/api/feed",
            HttpMethod::Get,
            60,
        );
        ep.site_id = Some("site-9".to_string());
        ep.mappings = mappings;
        ep
    }

    fn rule(source: &str, target: &str) -> FieldMapping {
        FieldMapping {
            source_field: source.to_string(),
            target_field: target.to_string(),
            transform: Transform::None,
        }
    }

    #[test]
    fn fuel_conversion_maps_nested_fields_and_computes_margin() {
        let ep = endpoint(
            DataCategory::FuelTransactions,
            vec![
                rule("txn.id", "transaction_id"),
                rule("txn.volume", "gallons"),
                rule("txn.amount", "total_amount"),
                rule("txn.cost", "total_cost"),
                rule("txn.grade", "fuel_type"),
            ],
        );
        let payload = json!([{
            "txn": {"id": "T-77", "volume": 12.5, "amount": 50.0, "cost": 35.0, "grade": "diesel"}
        }]);

        let txs = fuel_transactions_from_payload(&ep, &payload);
        assert_eq!(txs.len(), 1);
        let tx = &txs[0];
        assert_eq!(tx.transaction_id, "T-77");
        assert_eq!(tx.gallons, 12.5);
        assert_eq!(tx.fuel_type, FuelType::Diesel);
        assert_eq!(tx.gross_margin, Some(15.0));
        // Endpoint site fills in when the record carries none.
        assert_eq!(tx.site_id, "site-9");
        assert_eq!(tx.source_endpoint_id, ep.id);
        assert_eq!(tx.raw["txn"]["id"], "T-77");
    }

    #[test]
    fn fuel_conversion_defaults_cover_sparse_records() {
        let ep = endpoint(DataCategory::FuelTransactions, Vec::new());
        let txs = fuel_transactions_from_payload(&ep, &json!({"whatever": 1}));
        assert_eq!(txs.len(), 1);
        let tx = &txs[0];
        assert_eq!(tx.transaction_type, TransactionType::Sale);
        assert_eq!(tx.fuel_type, FuelType::Regular);
        assert_eq!(tx.gallons, 0.0);
        assert!(tx.transaction_id.starts_with(&ep.id));
        assert_eq!(tx.gross_margin, None);
        assert_eq!(tx.raw, json!({"whatever": 1}));
    }

    #[test]
    fn unknown_enum_strings_fall_back_to_defaults() {
        let ep = endpoint(DataCategory::FuelTransactions, Vec::new());
        let txs = fuel_transactions_from_payload(
            &ep,
            &json!({"fuel_type": "rocket_fuel", "transaction_type": "barter"}),
        );
        assert_eq!(txs[0].fuel_type, FuelType::Regular);
        assert_eq!(txs[0].transaction_type, TransactionType::Sale);
    }

    #[test]
    fn work_order_conversion_computes_profit_when_absent() {
        let ep = endpoint(
            DataCategory::AutoWorkOrders,
            vec![rule("order.number", "work_order_number")],
        );
        let payload = json!({
            "order": {"number": "WO-3"},
            "status": "completed",
            "labor_total": 100.0,
            "parts_cost": 30.0,
            "parts_retail": 55.0,
            "total_amount": 155.0,
            "service_date": "2026-03-15T10:00:00Z"
        });

        let orders = work_orders_from_payload(&ep, &payload);
        assert_eq!(orders.len(), 1);
        let wo = &orders[0];
        assert_eq!(wo.work_order_number, "WO-3");
        assert_eq!(wo.status, WorkOrderStatus::Completed);
        assert_eq!(wo.gross_profit, 125.0);
        assert_eq!(wo.shop_id, "site-9");
        assert_eq!(
            wo.service_date,
            "2026-03-15T10:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn numeric_natural_ids_are_stringified() {
        let ep = endpoint(DataCategory::FuelTransactions, Vec::new());
        let txs = fuel_transactions_from_payload(&ep, &json!({"transaction_id": 90210}));
        assert_eq!(txs[0].transaction_id, "90210");
    }
}
