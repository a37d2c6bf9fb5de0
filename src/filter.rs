// traffic-insight/src/filter.rs
use crate::error::Error;
use crate::record::{ClassifiedPacketRecord, Prediction};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Normal,
    Anomaly,
}

impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Normal => "normal",
            StatusFilter::Anomaly => "anomaly",
        }
    }

    pub fn admits(&self, record: &ClassifiedPacketRecord) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Normal => record.prediction == Some(Prediction::Normal),
            StatusFilter::Anomaly => record.prediction == Some(Prediction::Anomaly),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "normal" => Ok(StatusFilter::Normal),
            "anomaly" => Ok(StatusFilter::Anomaly),
            other => Err(Error::InvalidStatusFilter(other.to_string())),
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Positions of the records that pass the active predicates, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredView {
    indices: Vec<usize>,
}

impl FilteredView {
    pub fn build(records: &[ClassifiedPacketRecord], status: StatusFilter, search_term: &str) -> Self {
        FilteredView { indices: filter_indices(records, status, search_term) }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Resolve against the collection the view was built from.
    pub fn records<'a>(&'a self, records: &'a [ClassifiedPacketRecord]) -> impl Iterator<Item = &'a ClassifiedPacketRecord> + 'a {
        self.indices.iter().filter_map(move |&i| records.get(i))
    }
}

pub fn filter_indices(records: &[ClassifiedPacketRecord], status: StatusFilter, search_term: &str) -> Vec<usize> {
    let needle = search_term.to_lowercase();
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| status.admits(record) && matches_search(record, &needle))
        .map(|(i, _)| i)
        .collect()
}

/// Order-preserving subsequence of `records` passing both predicates.
pub fn filter<'a>(
    records: &'a [ClassifiedPacketRecord],
    status: StatusFilter,
    search_term: &str,
) -> Vec<&'a ClassifiedPacketRecord> {
    filter_indices(records, status, search_term)
        .into_iter()
        .map(|i| &records[i])
        .collect()
}

// `needle` must already be lowercase
fn matches_search(record: &ClassifiedPacketRecord, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    [
        record.source_address.as_deref(),
        record.destination_address.as_deref(),
        record.protocol.as_deref(),
        record.anomaly_detail.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(src: &str, protocol: &str, prediction: Prediction, detail: Option<&str>) -> ClassifiedPacketRecord {
        ClassifiedPacketRecord {
            source_address: Some(src.to_string()),
            destination_address: Some("192.168.1.1".to_string()),
            protocol: Some(protocol.to_string()),
            prediction: Some(prediction),
            anomaly_detail: detail.map(str::to_string),
            ..Default::default()
        }
    }

    fn sample() -> Vec<ClassifiedPacketRecord> {
        vec![
            record("10.0.0.1", "TCP", Prediction::Normal, None),
            record("10.0.0.2", "udp", Prediction::Anomaly, Some("Oversized Packet")),
            record("10.0.0.3", "https", Prediction::Normal, None),
            record("172.16.0.9", "tcp", Prediction::Anomaly, Some("SYN Flood")),
            ClassifiedPacketRecord::default(),
        ]
    }

    #[test]
    fn test_all_with_empty_search_is_identity() {
        let records = sample();
        let filtered = filter(&records, StatusFilter::All, "");
        assert_eq!(filtered.len(), records.len());
        for (kept, original) in filtered.iter().zip(records.iter()) {
            assert_eq!(*kept, original);
        }
    }

    #[test]
    fn test_status_filters_preserve_order() {
        let records = sample();
        assert_eq!(filter_indices(&records, StatusFilter::Anomaly, ""), vec![1, 3]);
        assert_eq!(filter_indices(&records, StatusFilter::Normal, ""), vec![0, 2]);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let records = sample();
        let upper = filter_indices(&records, StatusFilter::All, "TCP");
        let lower = filter_indices(&records, StatusFilter::All, "tcp");
        assert_eq!(upper, lower);
        assert_eq!(upper, vec![0, 3]);
    }

    #[test]
    fn test_search_covers_addresses_and_anomaly_detail() {
        let records = sample();
        assert_eq!(filter_indices(&records, StatusFilter::All, "172.16"), vec![3]);
        assert_eq!(filter_indices(&records, StatusFilter::All, "192.168"), vec![0, 1, 2, 3]);
        assert_eq!(filter_indices(&records, StatusFilter::All, "oversized"), vec![1]);
        assert_eq!(filter_indices(&records, StatusFilter::Anomaly, "flood"), vec![3]);
        assert!(filter_indices(&records, StatusFilter::All, "nothing-matches").is_empty());
    }

    #[test]
    fn test_filter_is_idempotent() {
        let records = sample();
        let first = FilteredView::build(&records, StatusFilter::Anomaly, "0.0");
        let second = FilteredView::build(&records, StatusFilter::Anomaly, "0.0");
        assert_eq!(first, second);
        let resolved: Vec<_> = first.records(&records).collect();
        assert_eq!(resolved, vec![&records[1]]);
    }

    #[test]
    fn test_status_filter_parsing() {
        assert_eq!("Anomaly".parse::<StatusFilter>().unwrap(), StatusFilter::Anomaly);
        assert_eq!("all".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert!("broken".parse::<StatusFilter>().is_err());
    }
}
