// traffic-insight/src/stats.rs
use crate::record::ClassifiedPacketRecord;
use log::debug;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Percentage held in hundredths so displayed and exported values agree exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Percent {
    hundredths: u64,
}

impl Percent {
    /// `part / whole * 100`, rounded half away from zero to two decimals.
    /// `None` when `whole` is zero.
    pub fn of(part: u64, whole: u64) -> Option<Self> {
        if whole == 0 {
            return None;
        }
        let part = part as u128;
        let whole = whole as u128;
        let hundredths = (part * 20_000 + whole) / (whole * 2);
        Some(Percent { hundredths: hundredths as u64 })
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{}.{:02}", self.hundredths / 100, self.hundredths % 100))
    }
}

impl Serialize for Percent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolShare {
    pub protocol: String,
    pub count: u64,
    pub ratio_percent: Percent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    pub total_packets: u64,
    pub anomaly_count: u64,
    pub anomaly_type_breakdown: HashMap<String, u64>,
    pub protocol_breakdown: Vec<ProtocolShare>,
    pub total_traffic_bytes: u64,
}

impl DatasetSummary {
    pub fn is_empty(&self) -> bool {
        self.total_packets == 0
    }

    /// Anomaly types ordered for charting: most frequent first, then by label.
    pub fn anomaly_types_by_count(&self) -> Vec<(&str, u64)> {
        let mut types: Vec<(&str, u64)> = self
            .anomaly_type_breakdown
            .iter()
            .map(|(label, count)| (label.as_str(), *count))
            .collect();
        types.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        types
    }
}

/// Reduce a record collection into summary statistics.
///
/// Protocol shares keep the order in which protocols were first seen. Records
/// without a protocol are grouped under `"N/A"`.
pub fn summarize(records: &[ClassifiedPacketRecord]) -> DatasetSummary {
    let total_packets = records.len() as u64;
    let mut anomaly_count = 0u64;
    let mut anomaly_types: HashMap<String, u64> = HashMap::new();
    let mut protocol_counts: Vec<(String, u64)> = Vec::new();
    let mut protocol_slots: HashMap<&str, usize> = HashMap::new();
    let mut total_traffic_bytes = 0u64;

    for record in records {
        if record.is_anomaly() {
            anomaly_count += 1;
            *anomaly_types.entry(record.anomaly_type().to_string()).or_insert(0) += 1;
        }

        let protocol = record.protocol_label();
        match protocol_slots.get(protocol) {
            Some(&slot) => protocol_counts[slot].1 += 1,
            None => {
                protocol_slots.insert(protocol, protocol_counts.len());
                protocol_counts.push((protocol.to_string(), 1));
            }
        }

        total_traffic_bytes = total_traffic_bytes.saturating_add(record.byte_count);
    }

    let protocol_breakdown = protocol_counts
        .into_iter()
        .filter_map(|(protocol, count)| {
            Percent::of(count, total_packets).map(|ratio_percent| ProtocolShare {
                protocol,
                count,
                ratio_percent,
            })
        })
        .collect();

    debug!(
        "Summarized {} records: {} anomalies, {} bytes",
        total_packets, anomaly_count, total_traffic_bytes
    );

    DatasetSummary {
        total_packets,
        anomaly_count,
        anomaly_type_breakdown: anomaly_types,
        protocol_breakdown,
        total_traffic_bytes,
    }
}
