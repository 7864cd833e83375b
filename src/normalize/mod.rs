//! Shaping of raw upstream payloads into the canonical view models.

pub mod arrivals;
pub mod fields;
pub mod route;
