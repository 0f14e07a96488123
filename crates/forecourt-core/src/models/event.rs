//! Realtime event shapes pushed to stream subscribers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Channel a subscriber can select; wire names double as channel names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    FuelTransaction,
    AutoWorkOrder,
    EndpointStatus,
    MetricsUpdate,
    Alert,
}

impl EventKind {
    /// Channel name used in subscription sets
    pub fn channel(&self) -> &'static str {
        match self {
            EventKind::FuelTransaction => "fuel_transaction",
            EventKind::AutoWorkOrder => "auto_work_order",
            EventKind::EndpointStatus => "endpoint_status",
            EventKind::MetricsUpdate => "metrics_update",
            EventKind::Alert => "alert",
        }
    }
}

/// One event on the realtime feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    pub data: Value,
}

impl StreamEvent {
    pub fn new(kind: EventKind, site_id: Option<String>, data: Value) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            site_id,
            data,
        }
    }
}

/// Severity attached to an alert definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// Trigger condition for an alert definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCondition {
    Threshold,
    Change,
    Absence,
}

/// Declarative alert definition carried by the stream hub
///
/// Definitions are registered and listed alongside subscriptions; the
/// evaluation loop that fires them is a separate concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub id: String,
    pub name: String,
    pub condition: AlertCondition,
    pub metric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absence_minutes: Option<u32>,
    pub severity: AlertSeverity,
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_serializes_to_channel_name() {
        for kind in [
            EventKind::FuelTransaction,
            EventKind::AutoWorkOrder,
            EventKind::EndpointStatus,
            EventKind::MetricsUpdate,
            EventKind::Alert,
        ] {
            let wire = serde_json::to_value(kind).unwrap();
            assert_eq!(wire, serde_json::Value::String(kind.channel().to_string()));
        }
    }
}
