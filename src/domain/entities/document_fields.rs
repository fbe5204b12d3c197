//! Serde helpers for fields read back from stored documents.
//!
//! Documents may have been written by other tools (seed scripts, older
//! clients), so reads are lenient: a wrongly typed or `null` field falls back
//! to its default instead of rejecting the whole record.

use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};

/// Reads `null` as the type's default.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reads any JSON number as is. Other values read as `None`.
pub fn lenient_number<'de, D>(deserializer: D) -> Result<Option<Number>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => Ok(Some(n)),
        _ => Ok(None),
    }
}

/// Timestamps are written as fixed-width RFC 3339 UTC strings with
/// millisecond precision, so string order equals chronological order.
///
/// Accepted on read: RFC 3339 strings, bare `YYYY-MM-DD` dates,
/// `{seconds, nanoseconds}` objects and epoch milliseconds. Anything else
/// reads as `None`.
pub mod timestamp {
    use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&format(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.as_ref().and_then(parse))
    }

    pub fn format(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn now() -> Value {
        Value::String(format(&Utc::now()))
    }

    pub fn parse(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                        .map(|naive| naive.and_utc())
                }),
            Value::Object(map) => {
                let seconds = map
                    .get("seconds")
                    .or_else(|| map.get("_seconds"))
                    .and_then(Value::as_i64)?;
                let nanos = map
                    .get("nanoseconds")
                    .or_else(|| map.get("_nanoseconds"))
                    .and_then(Value::as_u64)
                    .and_then(|n| u32::try_from(n).ok())
                    .unwrap_or(0);
                DateTime::from_timestamp(seconds, nanos)
            }
            Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::timestamp;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn formats_fixed_width() {
        let early = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 1).unwrap();
        assert_eq!(timestamp::format(&early), "2023-01-01T00:00:00.000Z");
        assert!(timestamp::format(&early) < timestamp::format(&later));
    }

    #[test]
    fn parses_lenient_inputs() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        assert_eq!(timestamp::parse(&json!("2024-03-05")), Some(expected));
        assert_eq!(timestamp::parse(&json!("2024-03-05T00:00:00Z")), Some(expected));
        assert_eq!(
            timestamp::parse(&json!({"seconds": expected.timestamp(), "nanoseconds": 0})),
            Some(expected)
        );
        assert_eq!(timestamp::parse(&json!("last tuesday")), None);
        assert_eq!(timestamp::parse(&json!(true)), None);
    }
}
