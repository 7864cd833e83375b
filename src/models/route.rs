use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Route traversal order. Serialized as the upstream number 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    pub fn number(self) -> u8 {
        match self {
            Direction::Outbound => 1,
            Direction::Inbound => 2,
        }
    }
}

impl From<Direction> for u8 {
    fn from(direction: Direction) -> Self {
        direction.number()
    }
}

impl TryFrom<u8> for Direction {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Direction::Outbound),
            2 => Ok(Direction::Inbound),
            other => Err(format!("invalid direction: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteStop {
    pub stop_code: String,
    pub sequence: i64,
    #[schema(value_type = u8)]
    pub direction: Direction,
    /// Cumulative distance from the first stop, as reported upstream
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Terminals {
    pub first: Option<String>,
    pub last: Option<String>,
}

impl Terminals {
    /// First and last stop of an already sorted route
    pub fn of(route: &[RouteStop]) -> Self {
        Self {
            first: route.first().map(|s| s.stop_code.clone()),
            last: route.last().map(|s| s.stop_code.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TerminalsByDirection {
    pub dir1: Terminals,
    pub dir2: Terminals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRouteView {
    pub service_no: String,
    /// Distinct operators in first-seen order
    pub operators: Vec<String>,
    pub route1: Vec<RouteStop>,
    pub route2: Vec<RouteStop>,
    pub terminals: TerminalsByDirection,
}

impl ServiceRouteView {
    /// Builds the view from sorted routes; terminals are always derived here
    pub fn new(
        service_no: String,
        operators: Vec<String>,
        route1: Vec<RouteStop>,
        route2: Vec<RouteStop>,
    ) -> Self {
        let terminals = TerminalsByDirection {
            dir1: Terminals::of(&route1),
            dir2: Terminals::of(&route2),
        };
        Self {
            service_no,
            operators,
            route1,
            route2,
            terminals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(code: &str, sequence: i64) -> RouteStop {
        RouteStop {
            stop_code: code.to_string(),
            sequence,
            direction: Direction::Outbound,
            distance_km: None,
        }
    }

    #[test]
    fn test_direction_serializes_as_number() {
        assert_eq!(serde_json::to_value(Direction::Inbound).unwrap(), 2);
        let parsed: Direction = serde_json::from_value(serde_json::json!(1)).unwrap();
        assert_eq!(parsed, Direction::Outbound);
        assert!(serde_json::from_value::<Direction>(serde_json::json!(3)).is_err());
    }

    #[test]
    fn test_terminals_derived_from_route() {
        let view = ServiceRouteView::new(
            "15".to_string(),
            vec!["SBS".to_string()],
            vec![stop("A", 1), stop("B", 2), stop("C", 3)],
            Vec::new(),
        );
        assert_eq!(view.terminals.dir1.first.as_deref(), Some("A"));
        assert_eq!(view.terminals.dir1.last.as_deref(), Some("C"));
        assert_eq!(view.terminals.dir2, Terminals::default());
        assert!(view.route2.is_empty());
    }

    #[test]
    fn test_single_stop_route_is_both_terminals() {
        let terminals = Terminals::of(&[stop("X", 7)]);
        assert_eq!(terminals.first.as_deref(), Some("X"));
        assert_eq!(terminals.last.as_deref(), Some("X"));
    }
}
