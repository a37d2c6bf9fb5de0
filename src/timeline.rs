// traffic-insight/src/timeline.rs
use crate::record::ClassifiedPacketRecord;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelinePoint {
    pub time: String,
    pub count: u64,
}

/// Anomalies per minute of day (`HH:MM`), ascending.
///
/// Records without a usable timestamp are left out.
pub fn anomaly_timeline<'a, I>(records: I) -> Vec<TimelinePoint>
where
    I: IntoIterator<Item = &'a ClassifiedPacketRecord>,
{
    let mut buckets: BTreeMap<String, u64> = BTreeMap::new();
    for record in records {
        if !record.is_anomaly() {
            continue;
        }
        if let Some(ts) = record.timestamp {
            *buckets.entry(ts.format("%H:%M").to_string()).or_insert(0) += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(time, count)| TimelinePoint { time, count })
        .collect()
}
