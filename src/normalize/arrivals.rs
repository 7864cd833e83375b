//! Arrivals normalization.
//!
//! A payload is first decoded into exactly one [`UpstreamArrivals`] variant,
//! each with its own key names, and only then mapped onto the canonical
//! [`ArrivalsView`]. Nothing downstream looks at upstream key names.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::fields;
use crate::models::{ArrivalEstimate, ArrivalsView, Deck, Load, ServiceArrivals};

const MISSING_SERVICE_NO: &str = "?";

/// One "next bus" slot as reported upstream, before derivation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSlot {
    pub estimated_arrival: Option<DateTime<Utc>>,
    /// Relative countdown, only reported by the community API
    pub duration_ms: Option<i64>,
    pub load: Option<String>,
    pub feature: Option<String>,
    pub vehicle_type: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub origin_code: Option<String>,
    pub dest_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawService {
    pub service_no: Option<String>,
    pub operator: Option<String>,
    pub slots: [Option<RawSlot>; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamArrivals {
    /// LTA DataMall `v3/BusArrival`
    Datamall {
        stop_code: Option<String>,
        services: Vec<RawService>,
    },
    /// arrivelah, including its legacy key names
    Community {
        stop_name: Option<String>,
        services: Vec<RawService>,
    },
}

impl UpstreamArrivals {
    /// Pick the variant from the top-level keys and decode it
    pub fn decode(raw: &Value) -> Self {
        if raw.get("Services").is_some() || raw.get("BusStopCode").is_some() {
            Self::decode_datamall(raw)
        } else {
            Self::decode_community(raw)
        }
    }

    fn decode_datamall(raw: &Value) -> Self {
        let services = fields::array(raw, &["Services"])
            .iter()
            .filter(|s| s.is_object())
            .map(|s| RawService {
                service_no: fields::text(s, &["ServiceNo"]),
                operator: fields::text(s, &["Operator"]),
                slots: [
                    datamall_slot(s.get("NextBus")),
                    datamall_slot(s.get("NextBus2")),
                    datamall_slot(s.get("NextBus3")),
                ],
            })
            .collect();

        UpstreamArrivals::Datamall {
            stop_code: fields::text(raw, &["BusStopCode"]),
            services,
        }
    }

    fn decode_community(raw: &Value) -> Self {
        let services = fields::array(raw, &["services"])
            .iter()
            .filter(|s| s.is_object())
            .map(|s| RawService {
                service_no: fields::text(s, &["no", "service_no", "ServiceNo"]),
                operator: fields::text(s, &["operator"]),
                slots: [
                    community_slot(fields::first(s, &["next", "next_bus"])),
                    community_slot(fields::first(s, &["subsequent", "subsequent_bus", "next2"])),
                    community_slot(fields::first(s, &["subsequent2", "subsequent_bus2", "next3"])),
                ],
            })
            .collect();

        UpstreamArrivals::Community {
            stop_name: fields::text(raw, &["stop_name"]),
            services,
        }
    }

    pub fn services(&self) -> &[RawService] {
        match self {
            UpstreamArrivals::Datamall { services, .. }
            | UpstreamArrivals::Community { services, .. } => services,
        }
    }
}

fn datamall_slot(slot: Option<&Value>) -> Option<RawSlot> {
    let slot = slot.filter(|s| s.is_object())?;
    Some(RawSlot {
        estimated_arrival: fields::text(slot, &["EstimatedArrival"]).and_then(|t| parse_timestamp(&t)),
        duration_ms: None,
        load: fields::text(slot, &["Load"]),
        feature: fields::text(slot, &["Feature"]),
        vehicle_type: fields::text(slot, &["Type"]),
        lat: fields::coordinate(slot, &["Latitude"]),
        lng: fields::coordinate(slot, &["Longitude"]),
        origin_code: fields::text(slot, &["OriginCode"]),
        dest_code: fields::text(slot, &["DestinationCode"]),
    })
}

fn community_slot(slot: Option<&Value>) -> Option<RawSlot> {
    let slot = slot.filter(|s| s.is_object())?;
    Some(RawSlot {
        estimated_arrival: fields::text(slot, &["time"]).and_then(|t| parse_timestamp(&t)),
        duration_ms: fields::first(slot, &["duration_ms"]).and_then(fields::as_i64),
        load: fields::text(slot, &["load"]),
        feature: fields::text(slot, &["feature"]),
        vehicle_type: fields::text(slot, &["type"]),
        lat: fields::coordinate(slot, &["lat"]),
        lng: fields::coordinate(slot, &["lng"]),
        origin_code: fields::text(slot, &["origin_code"]),
        dest_code: fields::text(slot, &["destination_code"]),
    })
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            debug!(timestamp = %s, error = %e, "Ignoring unparseable arrival timestamp");
            None
        }
    }
}

/// Milliseconds until `arrival`, clamped at zero
pub fn eta_millis(arrival: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    arrival.map(|ts| ts.signed_duration_since(now).num_milliseconds().max(0))
}

fn estimate(slot: RawSlot, now: DateTime<Utc>) -> ArrivalEstimate {
    let eta = eta_millis(slot.estimated_arrival, now).or(slot.duration_ms);
    ArrivalEstimate::new(
        eta,
        Load::from_code(slot.load.as_deref()),
        slot.feature.as_deref() == Some("WAB"),
        Deck::from_code(slot.vehicle_type.as_deref()),
        slot.lat,
        slot.lng,
        slot.origin_code,
        slot.dest_code,
    )
}

fn service(raw: RawService, now: DateTime<Utc>) -> ServiceArrivals {
    let [a, b, c] = raw.slots;
    ServiceArrivals {
        service_no: raw
            .service_no
            .unwrap_or_else(|| MISSING_SERVICE_NO.to_string()),
        operator: raw.operator,
        estimates: [
            a.map(|s| estimate(s, now)),
            b.map(|s| estimate(s, now)),
            c.map(|s| estimate(s, now)),
        ],
    }
}

/// Map a decoded payload onto the canonical view; `requested_stop` is used
/// when the payload does not echo its stop code
pub fn to_view(upstream: UpstreamArrivals, requested_stop: &str, now: DateTime<Utc>) -> ArrivalsView {
    let (stop_code, stop_name, services) = match upstream {
        UpstreamArrivals::Datamall {
            stop_code,
            services,
        } => (stop_code, None, services),
        UpstreamArrivals::Community {
            stop_name,
            services,
        } => (None, stop_name, services),
    };

    ArrivalsView {
        stop_code: stop_code.unwrap_or_else(|| requested_stop.to_string()),
        stop_name,
        services: services.into_iter().map(|s| service(s, now)).collect(),
    }
}

/// Decode and normalize a raw arrivals payload against an injected clock
pub fn normalize(raw: &Value, requested_stop: &str, now: DateTime<Utc>) -> ArrivalsView {
    let upstream = UpstreamArrivals::decode(raw);
    debug!(
        stop = %requested_stop,
        services = upstream.services().len(),
        datamall = matches!(upstream, UpstreamArrivals::Datamall { .. }),
        "Decoded arrivals payload"
    );
    to_view(upstream, requested_stop, now)
}
