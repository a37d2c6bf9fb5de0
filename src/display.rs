// traffic-insight/src/display.rs
//! Packet-table conventions shared by every front end.

use crate::record::{ClassifiedPacketRecord, NOT_AVAILABLE};
use crate::stats::DatasetSummary;
use serde::Serialize;

/// Shown for anomalies the service did not name. Never fed back into statistics.
pub const FALLBACK_ANOMALY_LABEL: &str = "SYN Flood";

const HIGH_CONFIDENCE: f64 = 0.7;
const SHORT_LABEL_MAX: usize = 10;
const SHORT_LABEL_KEEP: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolBucket {
    Tcp,
    Udp,
    Other,
}

impl ProtocolBucket {
    pub fn of(protocol: &str) -> Self {
        let lowered = protocol.to_lowercase();
        if lowered.contains("tcp") {
            ProtocolBucket::Tcp
        } else if lowered.contains("udp") {
            ProtocolBucket::Udp
        } else {
            ProtocolBucket::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTone {
    Success,
    Warning,
    Error,
}

impl StatusTone {
    pub fn of(record: &ClassifiedPacketRecord) -> Self {
        if !record.is_anomaly() {
            StatusTone::Success
        } else if record.confidence > HIGH_CONFIDENCE {
            StatusTone::Error
        } else {
            StatusTone::Warning
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub time: String,
    pub source: String,
    pub destination: String,
    pub protocol: String,
    pub protocol_bucket: ProtocolBucket,
    pub bytes: u64,
    pub status: String,
    pub tone: StatusTone,
    /// Only set for anomalies.
    pub anomaly_label: Option<String>,
    pub confidence_percent: u32,
}

impl TableRow {
    pub fn from_record(record: &ClassifiedPacketRecord) -> Self {
        let protocol = record.protocol_label().to_string();
        TableRow {
            time: record
                .timestamp
                .map_or_else(|| NOT_AVAILABLE.to_string(), |ts| ts.format("%H:%M:%S").to_string()),
            source: record.source_address.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            destination: record
                .destination_address
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            protocol_bucket: ProtocolBucket::of(&protocol),
            protocol,
            bytes: record.byte_count,
            status: record.prediction_label().to_string(),
            tone: StatusTone::of(record),
            anomaly_label: display_anomaly_label(record).map(str::to_string),
            confidence_percent: record.confidence_percent().min(100),
        }
    }

    /// Anomaly label cut down for narrow columns, `-` for normal traffic.
    pub fn short_anomaly_label(&self) -> String {
        match &self.anomaly_label {
            Some(label) => shorten(label),
            None => "-".to_string(),
        }
    }
}

pub fn display_anomaly_label(record: &ClassifiedPacketRecord) -> Option<&str> {
    if !record.is_anomaly() {
        return None;
    }
    Some(record.anomaly_detail.as_deref().unwrap_or(FALLBACK_ANOMALY_LABEL))
}

fn shorten(label: &str) -> String {
    if label.chars().count() > SHORT_LABEL_MAX {
        let kept: String = label.chars().take(SHORT_LABEL_KEEP).collect();
        format!("{}...", kept)
    } else {
        label.to_string()
    }
}

/// Rows for the packet table, capped at `limit`.
pub fn table_rows<'a, I>(view: I, limit: usize) -> Vec<TableRow>
where
    I: IntoIterator<Item = &'a ClassifiedPacketRecord>,
{
    view.into_iter().take(limit).map(TableRow::from_record).collect()
}

pub fn headline(visible: usize, summary: &DatasetSummary) -> String {
    if summary.anomaly_count > 0 {
        format!("{} packets ({} anomalies)", visible, summary.anomaly_count)
    } else {
        format!("{} packets", visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Prediction;
    use chrono::NaiveDate;

    fn anomaly(detail: Option<&str>, confidence: f64) -> ClassifiedPacketRecord {
        ClassifiedPacketRecord {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 5).and_then(|d| d.and_hms_opt(8, 5, 3)),
            source_address: Some("10.0.0.1".to_string()),
            destination_address: Some("10.0.0.2".to_string()),
            protocol: Some("TCP".to_string()),
            byte_count: 60,
            prediction: Some(Prediction::Anomaly),
            anomaly_detail: detail.map(str::to_string),
            confidence,
            ..Default::default()
        }
    }

    #[test]
    fn test_fallback_label_only_for_anomalies() {
        let row = TableRow::from_record(&anomaly(None, 0.9));
        assert_eq!(row.anomaly_label.as_deref(), Some(FALLBACK_ANOMALY_LABEL));

        let mut normal = anomaly(None, 0.9);
        normal.prediction = Some(Prediction::Normal);
        let row = TableRow::from_record(&normal);
        assert_eq!(row.anomaly_label, None);
        assert_eq!(row.short_anomaly_label(), "-");
    }

    #[test]
    fn test_status_tone() {
        assert_eq!(StatusTone::of(&anomaly(None, 0.95)), StatusTone::Error);
        assert_eq!(StatusTone::of(&anomaly(None, 0.7)), StatusTone::Warning);
        assert_eq!(StatusTone::of(&ClassifiedPacketRecord::default()), StatusTone::Success);
    }

    #[test]
    fn test_protocol_bucket() {
        assert_eq!(ProtocolBucket::of("TCP"), ProtocolBucket::Tcp);
        assert_eq!(ProtocolBucket::of("udp"), ProtocolBucket::Udp);
        assert_eq!(ProtocolBucket::of("https"), ProtocolBucket::Other);
    }

    #[test]
    fn test_row_formatting() {
        let row = TableRow::from_record(&anomaly(Some("Oversized Packet"), 1.2));
        assert_eq!(row.time, "08:05:03");
        assert_eq!(row.confidence_percent, 100);
        assert_eq!(row.short_anomaly_label(), "Oversize...");
        assert_eq!(TableRow::from_record(&anomaly(Some("Port Scan"), 0.5)).short_anomaly_label(), "Port Scan");
    }

    #[test]
    fn test_table_rows_respect_limit() {
        let records: Vec<_> = (0..5).map(|_| anomaly(None, 0.5)).collect();
        assert_eq!(table_rows(&records, 3).len(), 3);
        assert_eq!(table_rows(&records, 1000).len(), 5);
    }

    #[test]
    fn test_headline() {
        let mut summary = DatasetSummary::default();
        assert_eq!(headline(4, &summary), "4 packets");
        summary.anomaly_count = 2;
        assert_eq!(headline(4, &summary), "4 packets (2 anomalies)");
    }
}
