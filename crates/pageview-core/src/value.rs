//! Coercions over untyped record values.
//!
//! All functions are total: a value that does not coerce yields `None`.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Stringify a value. `null` yields `None`.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Numeric coercion. Accepts JSON numbers and numeric strings; never yields
/// NaN or infinity.
pub fn value_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Boolean coercion. Accepts booleans and the strings `"true"`/`"false"`.
pub fn value_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parse an ISO-8601 date or date-time string.
///
/// Offsets are kept as wall-clock time. A bare date is midnight.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for pattern in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Date-time coercion. Strings are parsed as ISO-8601, integers are epoch
/// milliseconds.
pub fn value_datetime(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_datetime(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.naive_utc()),
        _ => None,
    }
}

/// Calendar date coercion.
pub fn value_date(value: &Value) -> Option<NaiveDate> {
    value_datetime(value).map(|dt| dt.date())
}

/// Total order over non-null values used for sorting.
///
/// Numbers compare numerically, strings case-insensitively (raw order breaks
/// ties), booleans false before true. Mixed kinds order by kind.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x
            .to_lowercase()
            .cmp(&y.to_lowercase())
            .then_with(|| x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => kind_rank(a)
            .cmp(&kind_rank(b))
            .then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Number(_) => 0,
        Value::String(_) => 1,
        Value::Bool(_) => 2,
        Value::Array(_) => 3,
        Value::Object(_) => 4,
        Value::Null => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&json!(null)), None);
        assert_eq!(value_text(&json!("a")), Some("a".to_string()));
        assert_eq!(value_text(&json!(true)), Some("true".to_string()));
        assert_eq!(value_text(&json!(3)), Some("3".to_string()));
    }

    #[test]
    fn test_value_number_rejects_non_numeric() {
        assert_eq!(value_number(&json!(1.5)), Some(1.5));
        assert_eq!(value_number(&json!(" 42 ")), Some(42.0));
        assert_eq!(value_number(&json!("abc")), None);
        assert_eq!(value_number(&json!("NaN")), None);
        assert_eq!(value_number(&json!("inf")), None);
        assert_eq!(value_number(&json!(true)), None);
        assert_eq!(value_number(&json!(null)), None);
    }

    #[test]
    fn test_parse_datetime_variants() {
        let date = parse_datetime("2024-03-05").unwrap();
        assert_eq!(date.to_string(), "2024-03-05 00:00:00");

        let naive = parse_datetime("2024-03-05T14:30:00").unwrap();
        assert_eq!(naive.to_string(), "2024-03-05 14:30:00");

        let offset = parse_datetime("2024-03-05T14:30:00+02:00").unwrap();
        assert_eq!(offset.to_string(), "2024-03-05 14:30:00");

        assert!(parse_datetime("next tuesday").is_none());
    }

    #[test]
    fn test_value_datetime_epoch_millis() {
        let dt = value_datetime(&json!(0)).unwrap();
        assert_eq!(dt.to_string(), "1970-01-01 00:00:00");
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!("apple"), &json!("Banana")), Ordering::Less);
        assert_eq!(compare_values(&json!("a"), &json!("a")), Ordering::Equal);
        assert_eq!(compare_values(&json!(1), &json!("1")), Ordering::Less);
    }
}
