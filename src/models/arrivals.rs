use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Crowding level reported for an approaching bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Load {
    /// Seats available
    Sea,
    /// Standing available
    Sda,
    /// Limited standing
    Lsd,
    #[serde(other)]
    Unknown,
}

impl Load {
    /// Maps an upstream load code; anything unrecognised is `Unknown`
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(|c| c.trim().to_ascii_uppercase()).as_deref() {
            Some("SEA") => Load::Sea,
            Some("SDA") => Load::Sda,
            Some("LSD") => Load::Lsd,
            _ => Load::Unknown,
        }
    }

    /// Presentation class used by every renderer of a load badge
    pub fn css_class(&self) -> &'static str {
        match self {
            Load::Sea => "load-ok",
            Load::Sda => "load-warn",
            Load::Lsd => "load-busy",
            Load::Unknown => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Deck {
    Single,
    Double,
}

impl Deck {
    /// `DD` is a double decker; `SD`, `BD` (bendy) and missing are single
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(str::trim) {
            Some(c) if c.eq_ignore_ascii_case("DD") => Deck::Double,
            _ => Deck::Single,
        }
    }
}

/// One "next bus" slot for a service at a stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalEstimate {
    /// Milliseconds until arrival, never negative
    pub eta_millis: Option<i64>,
    /// Countdown text derived from `eta_millis`
    pub eta_text: String,
    pub load: Load,
    pub load_class: String,
    pub wheelchair_accessible: bool,
    pub deck: Deck,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// True when either coordinate is missing
    pub approximate_position: bool,
    pub origin_code: Option<String>,
    pub dest_code: Option<String>,
}

impl ArrivalEstimate {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        eta_millis: Option<i64>,
        load: Load,
        wheelchair_accessible: bool,
        deck: Deck,
        lat: Option<f64>,
        lng: Option<f64>,
        origin_code: Option<String>,
        dest_code: Option<String>,
    ) -> Self {
        let eta_millis = eta_millis.map(|ms| ms.max(0));
        Self {
            eta_millis,
            eta_text: format_eta(eta_millis),
            load,
            load_class: load.css_class().to_string(),
            wheelchair_accessible,
            deck,
            lat,
            lng,
            approximate_position: lat.is_none() || lng.is_none(),
            origin_code,
            dest_code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceArrivals {
    pub service_no: String,
    pub operator: Option<String>,
    /// Next, second and third bus; a missing slot is null, never omitted
    #[schema(value_type = Vec<Option<ArrivalEstimate>>)]
    pub estimates: [Option<ArrivalEstimate>; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalsView {
    #[serde(rename = "busStopCode")]
    pub stop_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_name: Option<String>,
    /// Services in upstream order
    pub services: Vec<ServiceArrivals>,
}

impl ArrivalsView {
    /// Use `name` (from the stop index) over whatever upstream reported
    pub fn prefer_stop_name(&mut self, name: Option<&str>) {
        if let Some(name) = name {
            self.stop_name = Some(name.to_string());
        }
    }

    /// Keep only the given service number (case-insensitive)
    pub fn retain_service(&mut self, service_no: &str) {
        self.services
            .retain(|s| s.service_no.eq_ignore_ascii_case(service_no));
    }
}

/// Countdown text: "—" without an estimate, "45s" under a minute,
/// otherwise "1 min", "3 mins" or "3 mins 5s"
pub fn format_eta(eta_millis: Option<i64>) -> String {
    let Some(ms) = eta_millis else {
        return "—".to_string();
    };
    let secs = ((ms.max(0) as f64) / 1000.0).round() as i64;
    let (mins, secs) = (secs / 60, secs % 60);
    if mins == 0 {
        return format!("{}s", secs);
    }
    let plural = if mins > 1 { "s" } else { "" };
    if secs > 0 {
        format!("{} min{} {}s", mins, plural, secs)
    } else {
        format!("{} min{}", mins, plural)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_code() {
        assert_eq!(Load::from_code(Some("SEA")), Load::Sea);
        assert_eq!(Load::from_code(Some("sda")), Load::Sda);
        assert_eq!(Load::from_code(Some("LSD")), Load::Lsd);
        assert_eq!(Load::from_code(Some("XYZ")), Load::Unknown);
        assert_eq!(Load::from_code(Some("")), Load::Unknown);
        assert_eq!(Load::from_code(None), Load::Unknown);
    }

    #[test]
    fn test_load_class() {
        assert_eq!(Load::Sea.css_class(), "load-ok");
        assert_eq!(Load::Sda.css_class(), "load-warn");
        assert_eq!(Load::Lsd.css_class(), "load-busy");
        assert_eq!(Load::Unknown.css_class(), "");
    }

    #[test]
    fn test_deck_mapping_is_total() {
        assert_eq!(Deck::from_code(Some("DD")), Deck::Double);
        assert_eq!(Deck::from_code(Some("SD")), Deck::Single);
        assert_eq!(Deck::from_code(Some("BD")), Deck::Single);
        assert_eq!(Deck::from_code(None), Deck::Single);
    }

    #[test]
    fn test_estimate_clamps_and_flags_position() {
        let est = ArrivalEstimate::new(
            Some(-500),
            Load::Sea,
            true,
            Deck::Double,
            Some(1.3),
            None,
            None,
            None,
        );
        assert_eq!(est.eta_millis, Some(0));
        assert!(est.approximate_position);
        assert_eq!(est.load_class, "load-ok");
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(None), "—");
        assert_eq!(format_eta(Some(0)), "0s");
        assert_eq!(format_eta(Some(45_200)), "45s");
        assert_eq!(format_eta(Some(60_000)), "1 min");
        assert_eq!(format_eta(Some(65_000)), "1 min 5s");
        assert_eq!(format_eta(Some(185_000)), "3 mins 5s");
        assert_eq!(format_eta(Some(240_000)), "4 mins");
    }

    #[test]
    fn test_serialized_shape() {
        let view = ArrivalsView {
            stop_code: "83139".to_string(),
            stop_name: None,
            services: vec![ServiceArrivals {
                service_no: "15".to_string(),
                operator: Some("SBS".to_string()),
                estimates: [None, None, None],
            }],
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["busStopCode"], "83139");
        assert!(json.get("stopName").is_none());
        assert_eq!(json["services"][0]["serviceNo"], "15");
        assert_eq!(json["services"][0]["estimates"].as_array().unwrap().len(), 3);
    }
}
