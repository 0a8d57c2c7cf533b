// Boundary schema for the untrusted graph_data payload
use super::error::FeedError;
use super::time_basis::TimeBasis;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    kw_ts: Option<Value>,
    #[serde(default)]
    kw_values: Option<Value>,
    #[serde(default)]
    kvah_values: Option<Value>,
}

/// Index-aligned raw arrays. Entries are still untyped; see
/// [`coerce_timestamp`] and [`coerce_power`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTelemetryResponse {
    pub kw_ts: Vec<Value>,
    pub kw_values: Vec<Value>,
    /// Reactive power, despite the name.
    pub kvah_values: Vec<Value>,
}

impl RawTelemetryResponse {
    /// Accepts any JSON object. Absent or null fields become empty arrays;
    /// present non-array fields become empty arrays and are reported.
    pub fn from_value(body: Value) -> Result<(Self, Vec<FeedError>), FeedError> {
        if !body.is_object() {
            return Err(FeedError::InvalidResponseShape(format!(
                "expected a JSON object, got {}",
                json_kind(&body)
            )));
        }

        let envelope: Envelope = serde_json::from_value(body)
            .map_err(|e| FeedError::InvalidResponseShape(e.to_string()))?;

        let mut issues = Vec::new();
        let raw = Self {
            kw_ts: into_array("kw_ts", envelope.kw_ts, &mut issues),
            kw_values: into_array("kw_values", envelope.kw_values, &mut issues),
            kvah_values: into_array("kvah_values", envelope.kvah_values, &mut issues),
        };

        Ok((raw, issues))
    }
}

fn into_array(
    field: &'static str,
    value: Option<Value>,
    issues: &mut Vec<FeedError>,
) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            issues.push(FeedError::malformed(
                field,
                format!("expected an array, got {}", json_kind(&other)),
            ));
            Vec::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// RFC 3339, naive date-times in `basis`, bare dates as UTC midnight,
/// or integer epoch milliseconds.
pub fn coerce_timestamp(value: &Value, basis: &TimeBasis) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s.trim(), basis),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn parse_timestamp(s: &str, basis: &TimeBasis) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return basis.interpret_naive(naive);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Finite JSON numbers, or strings holding one.
pub fn coerce_power(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_rejects_non_objects() {
        for body in [json!(null), json!([1, 2]), json!("nope"), json!(42)] {
            let err = RawTelemetryResponse::from_value(body).unwrap_err();
            assert!(matches!(err, FeedError::InvalidResponseShape(_)));
        }
    }

    #[test]
    fn test_empty_object_is_empty_response() {
        let (raw, issues) = RawTelemetryResponse::from_value(json!({})).unwrap();
        assert_eq!(raw, RawTelemetryResponse::default());
        assert!(issues.is_empty());
    }

    #[test]
    fn test_non_array_field_is_reported_and_emptied() {
        let body = json!({ "kw_values": "12,13", "kvah_values": [1.0], "kw_ts": null });
        let (raw, issues) = RawTelemetryResponse::from_value(body).unwrap();

        assert!(raw.kw_values.is_empty());
        assert_eq!(raw.kvah_values, vec![json!(1.0)]);
        assert_eq!(
            issues,
            vec![FeedError::malformed("kw_values", "expected an array, got a string")]
        );
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let body = json!({ "kw_values": [1], "meter": "MDB-1" });
        let (raw, issues) = RawTelemetryResponse::from_value(body).unwrap();
        assert_eq!(raw.kw_values.len(), 1);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_coerce_timestamp_variants() {
        let basis = TimeBasis::from_offset_minutes(Some(7 * 60)).unwrap();

        assert_eq!(
            coerce_timestamp(&json!("2024-05-01T08:00:00+07:00"), &basis),
            Some(utc("2024-05-01T01:00:00Z"))
        );
        assert_eq!(
            coerce_timestamp(&json!("2024-05-01T08:00:00.250"), &basis),
            Some(utc("2024-05-01T01:00:00.250Z"))
        );
        assert_eq!(
            coerce_timestamp(&json!("2024-05-01 08:00:00"), &basis),
            Some(utc("2024-05-01T01:00:00Z"))
        );
        assert_eq!(
            coerce_timestamp(&json!("2024-05-01"), &basis),
            Some(utc("2024-05-01T00:00:00Z"))
        );
        assert_eq!(
            coerce_timestamp(&json!(1714521600000i64), &basis),
            Some(utc("2024-05-01T00:00:00Z"))
        );
        assert_eq!(coerce_timestamp(&json!("yesterday"), &basis), None);
        assert_eq!(coerce_timestamp(&json!(null), &basis), None);
        assert_eq!(coerce_timestamp(&json!(true), &basis), None);
    }

    #[test]
    fn test_coerce_power_variants() {
        assert_eq!(coerce_power(&json!(12.5)), Some(12.5));
        assert_eq!(coerce_power(&json!(7)), Some(7.0));
        assert_eq!(coerce_power(&json!(" 3.25 ")), Some(3.25));
        assert_eq!(coerce_power(&json!("NaN")), None);
        assert_eq!(coerce_power(&json!("n/a")), None);
        assert_eq!(coerce_power(&json!(null)), None);
        assert_eq!(coerce_power(&json!([1])), None);
    }
}
