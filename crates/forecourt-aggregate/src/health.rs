//! Catalog-derived health views

use forecourt_core::models::{EndpointHealth, EndpointStatus, EndpointSummary, PolledEndpoint};

/// Per-endpoint health snapshots, most recently checked first
pub fn endpoint_health(endpoints: &[PolledEndpoint]) -> Vec<EndpointHealth> {
    let mut health: Vec<EndpointHealth> = endpoints
        .iter()
        .map(|ep| EndpointHealth {
            endpoint_id: ep.id.clone(),
            name: ep.name.clone(),
            status: ep.status,
            last_check: ep.last_checked_at,
            response_time_ms: ep.last_response_time_ms,
            uptime: ep.uptime_percent,
            consecutive_failures: ep.consecutive_failures,
            last_error: ep.last_error.clone(),
        })
        .collect();
    health.sort_by(|a, b| b.last_check.cmp(&a.last_check));
    health
}

/// Roll the whole catalog up into counts and averages
pub fn endpoint_summary(endpoints: &[PolledEndpoint]) -> EndpointSummary {
    let mut summary = EndpointSummary {
        total: endpoints.len(),
        ..EndpointSummary::default()
    };

    let mut healthy = 0usize;
    let mut response_time_sum = 0i64;
    let mut response_time_count = 0usize;

    for ep in endpoints {
        *summary.by_status.entry(ep.status).or_insert(0) += 1;
        *summary.by_category.entry(ep.category).or_insert(0) += 1;

        if ep.status == EndpointStatus::Active {
            healthy += 1;
        }
        if let Some(ms) = ep.last_response_time_ms {
            response_time_sum += ms;
            response_time_count += 1;
        }
    }

    summary.healthy_percent = if endpoints.is_empty() {
        0.0
    } else {
        healthy as f64 / endpoints.len() as f64 * 100.0
    };
    summary.average_response_time_ms = if response_time_count > 0 {
        response_time_sum as f64 / response_time_count as f64
    } else {
        0.0
    };

    summary
}
