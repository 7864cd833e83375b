//! Route assembly from DataMall `BusServices` and `BusRoutes` rows.

use std::collections::HashSet;

use serde_json::Value;
use tracing::warn;

use super::fields;
use crate::models::{Direction, RouteStop, ServiceRouteView};

/// Operators in first-seen order, blanks and repeats dropped
pub fn operators(services: &Value) -> Vec<String> {
    let mut seen = HashSet::new();
    fields::array(services, &["value"])
        .iter()
        .filter_map(|row| fields::text(row, &["Operator"]))
        .filter(|op| seen.insert(op.clone()))
        .collect()
}

/// Stops of one direction, sorted by sequence.
///
/// Rows declaring a different direction, rows without a stop code or
/// sequence, and repeated sequence numbers are dropped.
pub fn route_stops(service_no: &str, direction: Direction, rows: &Value) -> Vec<RouteStop> {
    let rows = fields::array(rows, &["value"]);
    let mut stops: Vec<RouteStop> = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;

    for row in rows {
        let declared = fields::first(row, &["Direction"]).and_then(fields::as_i64);
        if declared.is_some_and(|d| d != i64::from(direction.number())) {
            dropped += 1;
            continue;
        }

        let stop_code = fields::text(row, &["BusStopCode"]);
        let sequence = fields::first(row, &["StopSequence"]).and_then(fields::as_i64);
        let (Some(stop_code), Some(sequence)) = (stop_code, sequence) else {
            dropped += 1;
            continue;
        };

        stops.push(RouteStop {
            stop_code,
            sequence,
            direction,
            distance_km: fields::first(row, &["Distance"]).and_then(fields::as_f64),
        });
    }

    // Upstream is asked for ascending order but that is not relied on
    stops.sort_by_key(|s| s.sequence);
    let before = stops.len();
    stops.dedup_by_key(|s| s.sequence);
    dropped += before - stops.len();

    if dropped > 0 {
        warn!(
            service = %service_no,
            direction = direction.number(),
            dropped,
            "Dropped inconsistent route rows"
        );
    }

    stops
}

/// Combine service metadata and both direction payloads into one view
pub fn assemble(
    service_no: &str,
    services: &Value,
    route_dir1: &Value,
    route_dir2: &Value,
) -> ServiceRouteView {
    ServiceRouteView::new(
        service_no.to_string(),
        operators(services),
        route_stops(service_no, Direction::Outbound, route_dir1),
        route_stops(service_no, Direction::Inbound, route_dir2),
    )
}
