//! Lenient field accessors over upstream JSON.
//!
//! Upstream payloads mix numbers and numeric strings and use empty strings
//! for "no value". These helpers turn every such case into `None` so that a
//! bad field never aborts the surrounding record.

use serde_json::Value;

/// First of `keys` present on `obj` with a non-null value
pub fn first<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(key))
        .find(|value| !value.is_null())
}

/// Trimmed non-empty string; numbers are rendered as text
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn text(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| obj.get(key))
        .find_map(as_text)
}

/// Finite number, accepting numeric strings
pub fn as_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Integer, accepting numeric strings and integral floats
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Latitude/longitude; zero is the upstream placeholder for "unknown"
pub fn as_coordinate(value: &Value) -> Option<f64> {
    as_f64(value).filter(|c| *c != 0.0)
}

pub fn coordinate(obj: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| obj.get(key))
        .find_map(as_coordinate)
}

/// Array under the first present key; anything else reads as empty
pub fn array<'a>(obj: &'a Value, keys: &[&str]) -> &'a [Value] {
    first(obj, keys)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_accessors() {
        let obj = json!({"a": "  x ", "b": "", "c": 15, "d": null, "e": true});
        assert_eq!(text(&obj, &["a"]).as_deref(), Some("x"));
        assert_eq!(text(&obj, &["b"]), None);
        assert_eq!(text(&obj, &["b", "c"]).as_deref(), Some("15"));
        assert_eq!(text(&obj, &["d", "e"]), None);
        assert_eq!(text(&obj, &["missing"]), None);
    }

    #[test]
    fn test_numeric_accessors() {
        assert_eq!(as_f64(&json!("1.25")), Some(1.25));
        assert_eq!(as_f64(&json!(2)), Some(2.0));
        assert_eq!(as_f64(&json!("abc")), None);
        assert_eq!(as_i64(&json!("7")), Some(7));
        assert_eq!(as_i64(&json!(7.0)), Some(7));
        assert_eq!(as_i64(&json!(7.5)), None);
        assert_eq!(as_i64(&json!(null)), None);
    }

    #[test]
    fn test_coordinate_treats_zero_as_missing() {
        assert_eq!(as_coordinate(&json!("0.0")), None);
        assert_eq!(as_coordinate(&json!(0)), None);
        assert_eq!(as_coordinate(&json!("")), None);
        assert_eq!(as_coordinate(&json!("1.3154")), Some(1.3154));
    }

    #[test]
    fn test_first_skips_null() {
        let obj = json!({"next": null, "next_bus": {"load": "SEA"}});
        let slot = first(&obj, &["next", "next_bus"]).unwrap();
        assert_eq!(slot["load"], "SEA");
        assert!(array(&obj, &["services"]).is_empty());
    }
}
