// traffic-insight/src/record.rs
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Placeholder for any field that is missing from a record.
pub const NOT_AVAILABLE: &str = "N/A";

/// Aggregation label for anomalies the service did not name.
pub const UNKNOWN_ANOMALY: &str = "Unknown";

const LOCALE_DATETIME_FORMAT: &str = "%d.%m.%Y, %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Prediction {
    Normal,
    Anomaly,
}

impl Prediction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Prediction::Normal => "Normal",
            Prediction::Anomaly => "Anomaly",
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One packet as classified by the analysis service.
///
/// Decoding never fails on a JSON object: every field that is missing, null,
/// empty or of the wrong type is normalized to "absent" here, so the
/// aggregator, filter and exporter only ever see clean values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireRecord")]
pub struct ClassifiedPacketRecord {
    pub timestamp: Option<NaiveDateTime>,
    pub source_address: Option<String>,
    pub destination_address: Option<String>,
    pub protocol: Option<String>,
    pub byte_count: u64,
    pub ttl: Option<i64>,
    pub prediction: Option<Prediction>,
    pub anomaly_detail: Option<String>,
    pub confidence: f64,
}

impl ClassifiedPacketRecord {
    pub fn is_anomaly(&self) -> bool {
        self.prediction == Some(Prediction::Anomaly)
    }

    pub fn prediction_label(&self) -> &str {
        self.prediction.as_ref().map_or(NOT_AVAILABLE, Prediction::as_str)
    }

    /// Label this record contributes to the anomaly-type breakdown.
    pub fn anomaly_type(&self) -> &str {
        self.anomaly_detail.as_deref().unwrap_or(UNKNOWN_ANOMALY)
    }

    pub fn protocol_label(&self) -> &str {
        self.protocol.as_deref().unwrap_or(NOT_AVAILABLE)
    }

    /// Confidence as a whole-number percentage.
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence * 100.0).round().max(0.0) as u32
    }

    /// Timestamp in the day-first regional format, `"N/A"` when unknown.
    pub fn formatted_timestamp(&self) -> String {
        format_locale_datetime(self.timestamp)
    }
}

pub fn format_locale_datetime(timestamp: Option<NaiveDateTime>) -> String {
    match timestamp {
        Some(ts) => ts.format(LOCALE_DATETIME_FORMAT).to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Decode a classification service body into records.
///
/// Anything other than a JSON array yields an empty collection. Array
/// elements that are not objects are dropped.
pub fn parse_records(body: &str) -> Vec<ClassifiedPacketRecord> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            warn!("Discarding unparseable record payload: {}", e);
            return Vec::new();
        }
    };

    records_from_value(value)
}

pub fn records_from_value(value: Value) -> Vec<ClassifiedPacketRecord> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            warn!("Expected an array of records, got {}", json_kind(&other));
            return Vec::new();
        }
    };

    let total = items.len();
    let mut records = Vec::with_capacity(total);
    for (position, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            warn!("Skipping record #{}: {} is not an object", position, json_kind(&item));
            continue;
        }
        match serde_json::from_value::<ClassifiedPacketRecord>(item) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping record #{}: {}", position, e),
        }
    }

    if records.len() != total {
        warn!("Kept {} of {} records", records.len(), total);
    }
    records
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

// Shape produced by the classification service.
#[derive(Debug, Default, Deserialize)]
struct WireRecord {
    #[serde(default, deserialize_with = "lenient")]
    timestamp: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    src_ip: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    dst_ip: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    protocol: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    prediction: Option<Prediction>,
    #[serde(default, deserialize_with = "lenient")]
    confidence: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    anomaly_details: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    details: Option<WireDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct WireDetails {
    #[serde(default, deserialize_with = "lenient")]
    bytes: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    ttl: Option<i64>,
}

impl From<WireRecord> for ClassifiedPacketRecord {
    fn from(wire: WireRecord) -> Self {
        let details = wire.details.unwrap_or_default();
        ClassifiedPacketRecord {
            timestamp: wire.timestamp.as_ref().and_then(parse_timestamp),
            source_address: non_empty(wire.src_ip),
            destination_address: non_empty(wire.dst_ip),
            protocol: non_empty(wire.protocol),
            byte_count: details.bytes.unwrap_or(0),
            ttl: details.ttl,
            prediction: wire.prediction,
            anomaly_detail: non_empty(wire.anomaly_details),
            confidence: wire.confidence.filter(|c| c.is_finite()).unwrap_or(0.0),
        }
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Accepts RFC 3339, naive ISO 8601 and epoch milliseconds.
fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
        }
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        // Keep the wall-clock time of the stated offset
        return Some(dt.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_service_record() {
        let body = r#"[{
            "timestamp": "2024-03-05T14:07:09.123456",
            "src_ip": "10.0.0.1", "dst_ip": "10.0.0.2",
            "protocol": "https", "prediction": "Anomaly",
            "confidence": 0.82, "anomaly_details": "Port Scan",
            "details": {"bytes": 1514, "ttl": 64}
        }]"#;

        let records = parse_records(body);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.source_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(record.destination_address.as_deref(), Some("10.0.0.2"));
        assert_eq!(record.protocol.as_deref(), Some("https"));
        assert_eq!(record.prediction, Some(Prediction::Anomaly));
        assert_eq!(record.anomaly_detail.as_deref(), Some("Port Scan"));
        assert_eq!(record.byte_count, 1514);
        assert_eq!(record.ttl, Some(64));
        assert_eq!(record.confidence_percent(), 82);
        assert_eq!(record.formatted_timestamp(), "05.03.2024, 14:07:09");
    }

    #[test]
    fn test_malformed_fields_degrade_to_absent() {
        let value = json!([{
            "timestamp": "yesterday",
            "src_ip": 42,
            "dst_ip": null,
            "protocol": "",
            "prediction": "Suspicious",
            "confidence": "high",
            "anomaly_details": "",
            "details": {"bytes": -3, "ttl": "x"}
        }]);

        let records = records_from_value(value);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.timestamp, None);
        assert_eq!(record.source_address, None);
        assert_eq!(record.destination_address, None);
        assert_eq!(record.protocol, None);
        assert_eq!(record.prediction, None);
        assert_eq!(record.anomaly_detail, None);
        assert_eq!(record.byte_count, 0);
        assert_eq!(record.ttl, None);
        assert_eq!(record.confidence, 0.0);
        assert_eq!(record.prediction_label(), NOT_AVAILABLE);
        assert_eq!(record.anomaly_type(), UNKNOWN_ANOMALY);
        assert_eq!(record.formatted_timestamp(), NOT_AVAILABLE);
    }

    #[test]
    fn test_non_array_payloads_yield_nothing() {
        assert!(parse_records(r#"{"error": "Внутренняя ошибка"}"#).is_empty());
        assert!(parse_records("not json").is_empty());
        assert!(parse_records("null").is_empty());
    }

    #[test]
    fn test_non_object_elements_are_skipped() {
        let records = parse_records(r#"[null, 7, {"protocol": "tcp"}, "x"]"#);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].protocol_label(), "tcp");
    }

    #[test]
    fn test_timestamp_variants() {
        let rfc = parse_timestamp(&json!("2024-03-05T14:07:09+03:00")).unwrap();
        assert_eq!(format_locale_datetime(Some(rfc)), "05.03.2024, 14:07:09");

        let millis = parse_timestamp(&json!(0)).unwrap();
        assert_eq!(format_locale_datetime(Some(millis)), "01.01.1970, 00:00:00");

        let spaced = parse_timestamp(&json!("2024-12-31 23:59:58")).unwrap();
        assert_eq!(format_locale_datetime(Some(spaced)), "31.12.2024, 23:59:58");

        assert!(parse_timestamp(&json!(true)).is_none());
    }

    #[test]
    fn test_confidence_percent_rounding() {
        let mut record = ClassifiedPacketRecord::default();
        assert_eq!(record.confidence_percent(), 0);
        record.confidence = 0.555;
        assert_eq!(record.confidence_percent(), 56);
        record.confidence = 1.0;
        assert_eq!(record.confidence_percent(), 100);
    }
}
