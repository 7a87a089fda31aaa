//! Record normalization
//!
//! This module turns heterogeneous export documents into `HH:mm` keyed
//! intraday points for a single calendar day.
//! - Array documents carry a combined `dateTime` or separate `date`/`time`
//! - Object documents expose an already date-scoped `dataset` array
//! - Values may be scalars or objects carrying `bpm`/`heartRate`/`value`

use crate::types::IntradayPoint;
use chrono::NaiveTime;
use serde_json::Value;

/// Keys that may hold a dataset, in lookup order
const DATASET_CONTAINERS: [&str; 3] = [
    "activities-steps-intraday",
    "activities-heart-intraday",
    "intraday",
];

/// Nested value fields, in priority order
const VALUE_FIELDS: [&str; 3] = ["bpm", "heartRate", "value"];

/// Normalizer for converting export documents to intraday points
pub struct RecordNormalizer;

impl RecordNormalizer {
    /// Extract the points of `target_date` (YYYY-MM-DD) from one document.
    ///
    /// Output is sorted by time; points sharing a minute keep their
    /// document order.
    pub fn extract(document: &Value, target_date: &str) -> Vec<IntradayPoint> {
        let mut points = match document {
            Value::Array(entries) => entries
                .iter()
                .filter_map(|entry| extract_entry(entry, target_date))
                .collect::<Vec<_>>(),
            _ => find_dataset(document)
                .map(|dataset| {
                    dataset
                        .iter()
                        .filter_map(|p| {
                            let time = p.get("time")?.as_str()?;
                            make_point(time, p.get("value"))
                        })
                        .collect()
                })
                .unwrap_or_default(),
        };

        points.sort_by(|a, b| a.time.cmp(&b.time));
        points
    }
}

fn extract_entry(entry: &Value, target_date: &str) -> Option<IntradayPoint> {
    if let Some(date_time) = entry.get("dateTime").and_then(Value::as_str) {
        let (date, time) = split_date_time(date_time)?;
        if normalize_date(date) != target_date {
            return None;
        }
        return make_point(time, entry.get("value"));
    }

    // Some exports carry separate date and time fields
    let date = entry.get("date")?.as_str()?;
    let time = entry.get("time")?.as_str()?;
    if normalize_date(date) != target_date {
        return None;
    }
    make_point(time, entry.get("value"))
}

fn find_dataset(document: &Value) -> Option<&Vec<Value>> {
    if let Some(dataset) = document.get("dataset").and_then(Value::as_array) {
        return Some(dataset);
    }
    DATASET_CONTAINERS.iter().find_map(|key| {
        document
            .get(*key)
            .and_then(|container| container.get("dataset"))
            .and_then(Value::as_array)
    })
}

fn make_point(time: &str, value: Option<&Value>) -> Option<IntradayPoint> {
    let time = minute_key(time)?;
    let value = entry_value(value?)?;
    Some(IntradayPoint { time, value })
}

/// Split `"08/13/25 06:31:19"` or `"2025-08-13T06:31:19"` into date and time.
fn split_date_time(raw: &str) -> Option<(&str, &str)> {
    let (date, rest) = raw.split_once(&['T', ' '][..])?;
    let time = rest.split(' ').next()?;
    if date.is_empty() || time.is_empty() {
        return None;
    }
    Some((date, time))
}

/// Normalize a date string to `YYYY-MM-DD`.
///
/// `MM/DD/YY` is read as `20YY`. Strings in neither form are returned
/// unchanged.
pub fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    if is_iso_date(raw) {
        return raw.to_string();
    }

    if raw.contains('/') {
        let mut parts = raw.split('/');
        if let (Some(mm), Some(dd), Some(yy)) = (parts.next(), parts.next(), parts.next()) {
            if !mm.is_empty() && !dd.is_empty() && !yy.is_empty() {
                let year = if yy.len() >= 4 {
                    yy.to_string()
                } else {
                    format!("20{:0>2}", yy)
                };
                return format!("{}-{:0>2}-{:0>2}", year, mm, dd);
            }
        }
    }

    raw.to_string()
}

fn is_iso_date(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit())
}

/// Reduce a time string (`HH:mm`, `HH:mm:ss`, `H:mm:ss.fffZ`) to `HH:mm`.
pub fn minute_key(raw: &str) -> Option<String> {
    let mut parts = raw.trim().split(':');
    let hour: u32 = parts.next()?.parse().ok()?;
    let minute_part = parts.next()?;
    let minute: u32 = minute_part.get(..2)?.parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0).map(|t| t.format("%H:%M").to_string())
}

/// Numeric value of a scalar entry, or of the first present field of an
/// object entry (`bpm`, then `heartRate`, then `value`).
pub fn entry_value(value: &Value) -> Option<f64> {
    match value {
        Value::Object(map) => VALUE_FIELDS
            .iter()
            .find_map(|key| map.get(*key).filter(|v| !v.is_null()))
            .and_then(numeric_value),
        other => numeric_value(other),
    }
}

/// Finite number from a JSON number or numeric string.
pub fn numeric_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };
    number.is_finite().then_some(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_normalize_date_formats() {
        assert_eq!(normalize_date("08/13/25"), "2025-08-13");
        assert_eq!(normalize_date("2025-08-13"), "2025-08-13");
        assert_eq!(normalize_date("8/3/25"), "2025-08-03");
        assert_eq!(normalize_date("08/13/2025"), "2025-08-13");
        assert_eq!(normalize_date("yesterday"), "yesterday");
    }

    #[test]
    fn test_minute_key() {
        assert_eq!(minute_key("06:31:19").as_deref(), Some("06:31"));
        assert_eq!(minute_key("6:31").as_deref(), Some("06:31"));
        assert_eq!(minute_key("23:59:59.000Z").as_deref(), Some("23:59"));
        assert_eq!(minute_key("24:00:00"), None);
        assert_eq!(minute_key("06"), None);
        assert_eq!(minute_key("ab:cd"), None);
    }

    #[test]
    fn test_value_priority() {
        assert_eq!(entry_value(&json!({ "bpm": 70, "heartRate": 80 })), Some(70.0));
        assert_eq!(entry_value(&json!({ "heartRate": 80, "value": 5 })), Some(80.0));
        assert_eq!(entry_value(&json!({ "bpm": null, "value": 5 })), Some(5.0));
        assert_eq!(entry_value(&json!("12")), Some(12.0));
        assert_eq!(entry_value(&json!({ "confidence": 2 })), None);
        // A present but non-numeric bpm wins the lookup and drops the entry.
        assert_eq!(entry_value(&json!({ "bpm": "n/a", "value": 5 })), None);
    }

    #[test]
    fn test_non_finite_and_missing_dropped() {
        assert_eq!(numeric_value(&json!(null)), None);
        assert_eq!(numeric_value(&json!("")), None);
        assert_eq!(numeric_value(&json!("NaN")), None);
        assert_eq!(numeric_value(&json!("inf")), None);
        assert_eq!(numeric_value(&json!(true)), None);
    }

    #[test]
    fn test_extract_date_time_array() {
        let doc = json!([
            { "dateTime": "08/13/25 06:32:00", "value": "3" },
            { "dateTime": "08/13/25 06:31:00", "value": "0" },
            { "dateTime": "08/14/25 06:31:00", "value": "9" },
            { "dateTime": "2025-08-13T07:00:00", "value": 12 },
            { "dateTime": "08/13/25", "value": 1 },
            { "value": 1 }
        ]);
        let points = RecordNormalizer::extract(&doc, "2025-08-13");
        assert_eq!(
            points,
            vec![
                IntradayPoint::new("06:31", 0.0),
                IntradayPoint::new("06:32", 3.0),
                IntradayPoint::new("07:00", 12.0),
            ]
        );
    }

    #[test]
    fn test_extract_separate_date_time() {
        let doc = json!([
            { "date": "2025-08-13", "time": "10:15:00", "value": { "bpm": 64 } },
            { "date": "2025-08-12", "time": "10:15:00", "value": { "bpm": 99 } }
        ]);
        let points = RecordNormalizer::extract(&doc, "2025-08-13");
        assert_eq!(points, vec![IntradayPoint::new("10:15", 64.0)]);
    }

    #[test]
    fn test_extract_dataset_shapes() {
        let direct = json!({ "dataset": [{ "time": "08:31:00", "value": 12 }] });
        let steps = json!({
            "activities-steps-intraday": {
                "dataset": [{ "time": "08:32:00", "value": 7 }, { "time": "08:31:00", "value": 4 }]
            }
        });
        let nested = json!({ "intraday": { "dataset": [{ "time": "09:00:00", "value": null }] } });

        assert_eq!(
            RecordNormalizer::extract(&direct, "1999-01-01"),
            vec![IntradayPoint::new("08:31", 12.0)]
        );
        assert_eq!(
            RecordNormalizer::extract(&steps, "2025-08-13"),
            vec![IntradayPoint::new("08:31", 4.0), IntradayPoint::new("08:32", 7.0)]
        );
        assert!(RecordNormalizer::extract(&nested, "2025-08-13").is_empty());
    }

    #[test]
    fn test_same_minute_keeps_document_order() {
        let doc = json!([
            { "dateTime": "08/13/25 06:31:19", "value": { "bpm": 70, "confidence": 2 } },
            { "dateTime": "08/13/25 06:31:45", "value": { "bpm": 75, "confidence": 3 } }
        ]);
        let points = RecordNormalizer::extract(&doc, "2025-08-13");
        assert_eq!(
            points,
            vec![IntradayPoint::new("06:31", 70.0), IntradayPoint::new("06:31", 75.0)]
        );
    }

    #[test]
    fn test_unrelated_documents_yield_nothing() {
        assert!(RecordNormalizer::extract(&json!({ "foo": 1 }), "2025-08-13").is_empty());
        assert!(RecordNormalizer::extract(&json!(42), "2025-08-13").is_empty());
    }
}
