//! Tolerant readers for the bulk game and schedule JSON
//!
//! The upstream exporters write numbers as strings in some places, `null` for
//! counters they could not compute, and booleans as either JSON booleans or
//! "True"/"False" text.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Numeric value of a JSON scalar; anything unreadable imputes to 0
pub fn value_to_f32(value: &Value) -> f32 {
    match value {
        Value::Number(n) => n.as_f64().map(|v| v as f32).unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f32>().unwrap_or(0.0),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Boolean value of a JSON scalar; absent or unreadable is false
pub fn value_to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        _ => false,
    }
}

/// Text value of a JSON scalar; `null` is empty
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `f32` that tolerates strings and `null`
pub fn f32_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_f32(&value))
}

/// Optional `f32`; `null`, empty strings and garbage are `None`
pub fn optional_f32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f32>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().map(|v| v as f32),
        Value::String(s) => s.trim().parse::<f32>().ok(),
        _ => None,
    })
}

/// Season numbers arrive as `2019` or `"2019"`; anything else is an error
pub fn season<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    let value = Value::deserialize(deserializer)?;
    integer(&value)
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| D::Error::custom(format!("invalid season: {}", value)))
}

/// Week numbers arrive as `7` or `"7"`
pub fn week<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = Value::deserialize(deserializer)?;
    integer(&value)
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| D::Error::custom(format!("invalid week: {}", value)))
}

/// Identifier written as either a string or a number
pub fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_string(&value))
}

/// Optional non-negative count such as a win total; `""` and `null` are `None`
pub fn optional_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(integer(&value).and_then(|v| u32::try_from(v).ok()))
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_readers() {
        assert_eq!(value_to_f32(&json!(2.5)), 2.5);
        assert_eq!(value_to_f32(&json!("3.25")), 3.25);
        assert_eq!(value_to_f32(&json!(null)), 0.0);
        assert_eq!(value_to_f32(&json!("n/a")), 0.0);

        assert!(value_to_bool(&json!(true)));
        assert!(value_to_bool(&json!("True")));
        assert!(!value_to_bool(&json!("False")));
        assert!(!value_to_bool(&json!(null)));
    }

    #[derive(Deserialize)]
    struct Row {
        #[serde(deserialize_with = "season")]
        season: u16,
        #[serde(deserialize_with = "week")]
        week: u8,
    }

    #[test]
    fn test_season_and_week_accept_text() {
        let row: Row = serde_json::from_value(json!({"season": "2019", "week": 7})).unwrap();
        assert_eq!(row.season, 2019);
        assert_eq!(row.week, 7);

        let bad: std::result::Result<Row, _> =
            serde_json::from_value(json!({"season": "spring", "week": 1}));
        assert!(bad.is_err());
    }

    #[derive(Deserialize)]
    struct Record {
        #[serde(default, deserialize_with = "optional_count")]
        wins: Option<u32>,
    }

    #[test]
    fn test_optional_count() {
        let r: Record = serde_json::from_value(json!({"wins": "7"})).unwrap();
        assert_eq!(r.wins, Some(7));
        let r: Record = serde_json::from_value(json!({"wins": ""})).unwrap();
        assert_eq!(r.wins, None);
        let r: Record = serde_json::from_value(json!({})).unwrap();
        assert_eq!(r.wins, None);
    }
}
