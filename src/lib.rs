// traffic-insight/src/lib.rs
use std::path::Path;

mod error;
pub use error::{Error, Result};

pub mod client;
pub mod config;
pub mod display;
pub mod export;
pub mod filter;
pub mod record;
pub mod session;
pub mod stats;
pub mod timeline;

pub use client::ClassificationClient;
pub use config::Config;
pub use export::{to_export_rows, ExportBatch, ExportRow};
pub use filter::{filter, FilteredView, StatusFilter};
pub use record::{parse_records, ClassifiedPacketRecord, Prediction};
pub use session::{Session, SessionSnapshot, UploadOutcome, UploadTicket};
pub use stats::{summarize, DatasetSummary, Percent, ProtocolShare};

/// Read a JSON file of classified records as saved from the service
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<ClassifiedPacketRecord>> {
    let body = std::fs::read_to_string(path)?;
    Ok(parse_records(&body))
}

/// Summarize a raw service response in one step
pub fn summarize_json(body: &str) -> DatasetSummary {
    summarize(&parse_records(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SERVICE_BODY: &str = r#"[
        {"timestamp": "2024-03-05T14:07:09", "src_ip": "192.168.1.10", "dst_ip": "8.8.8.8",
         "protocol": "dns", "prediction": "Normal", "confidence": 0.97,
         "anomaly_details": "", "details": {"bytes": 74, "ttl": 64}},
        {"timestamp": "2024-03-05T14:07:10", "src_ip": "10.0.0.66", "dst_ip": "192.168.1.10",
         "protocol": "tcp", "prediction": "Anomaly", "confidence": 1.0,
         "anomaly_details": "SYN Flood", "details": {"bytes": 60, "ttl": 51}},
        {"timestamp": "2024-03-05T14:08:00", "src_ip": "10.0.0.66", "dst_ip": "192.168.1.10",
         "protocol": "tcp", "prediction": "Anomaly", "confidence": 0.64,
         "anomaly_details": "Exploits", "details": {"bytes": 1600, "ttl": 51}}
    ]"#;

    #[test]
    fn test_load_records_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SERVICE_BODY.as_bytes()).unwrap();

        let records = load_records(file.path()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].anomaly_detail, None);
    }

    #[test]
    fn test_load_records_missing_file() {
        let result = load_records("nonexistent.json");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_summarize_json() {
        let summary = summarize_json(SERVICE_BODY);
        assert_eq!(summary.total_packets, 3);
        assert_eq!(summary.anomaly_count, 2);
        assert_eq!(summary.total_traffic_bytes, 1734);
        assert_eq!(summary.protocol_breakdown[0].protocol, "dns");
        assert_eq!(summary.protocol_breakdown[0].ratio_percent.to_string(), "33.33");
        assert_eq!(summary.protocol_breakdown[1].ratio_percent.to_string(), "66.67");

        assert_eq!(summarize_json("{\"error\": \"boom\"}"), DatasetSummary::default());
    }

    #[test]
    fn test_end_to_end_session() {
        let mut session = Session::new();
        let ticket = session.begin_upload("office.pcap");
        let records = client::parse_response(200, SERVICE_BODY).unwrap();
        assert_eq!(session.complete_upload(ticket, records), UploadOutcome::Applied);

        session.set_status_filter(StatusFilter::Anomaly);
        session.set_search_term("EXPLOIT");
        let snapshot = session.snapshot();
        assert_eq!(snapshot.view().len(), 1);

        let today = chrono::NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        let batch = snapshot.export_rows(today).unwrap();
        assert_eq!(batch.suggested_file_name, "traffic_analysis_office.csv");
        assert_eq!(batch.rows[0].timestamp, "05.03.2024, 14:08:00");
        assert_eq!(batch.rows[0].ttl, "51");
        assert_eq!(batch.rows[0].confidence_percent, 64);
    }

    #[test]
    fn test_json_serialization() {
        let summary = summarize_json(SERVICE_BODY);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["anomaly_count"], 2);
        assert_eq!(json["protocol_breakdown"][1]["ratio_percent"], "66.67");
    }
}
