use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A physical bus stop from the bulk stop dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StopRecord {
    /// 5-digit stop code
    pub code: String,
    pub name: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// True for exactly five ASCII digits
pub fn is_stop_code(s: &str) -> bool {
    s.len() == 5 && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_stop_code() {
        assert!(is_stop_code("83139"));
        assert!(is_stop_code("01012"));
        assert!(!is_stop_code("8313"));
        assert!(!is_stop_code("831390"));
        assert!(!is_stop_code("8313a"));
        assert!(!is_stop_code(""));
        assert!(!is_stop_code("８３１３９"));
    }
}
