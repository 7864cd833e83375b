//! Canonical view models shared by the normalizers, the board and the API.

pub mod arrivals;
pub mod route;
pub mod stop;

pub use arrivals::{ArrivalEstimate, ArrivalsView, Deck, Load, ServiceArrivals};
pub use route::{Direction, RouteStop, ServiceRouteView};
pub use stop::{StopRecord, is_stop_code};
