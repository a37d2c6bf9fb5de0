// traffic-insight/src/export.rs
use crate::error::{Error, Result};
use crate::record::{ClassifiedPacketRecord, NOT_AVAILABLE};
use chrono::NaiveDate;
use log::info;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const EXPORT_PREFIX: &str = "traffic_analysis_";
pub const EXPORT_EXTENSION: &str = "csv";

/// Header labels, in `ExportRow` field order.
pub const COLUMNS: [&str; 10] = [
    "#",
    "Время",
    "Источник IP",
    "Назначение IP",
    "Протокол",
    "Размер (байт)",
    "Статус",
    "Тип аномалии",
    "Уверенность (%)",
    "TTL",
];

/// One flattened, display-formatted record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub index: usize,
    pub timestamp: String,
    pub source_address: String,
    pub destination_address: String,
    pub protocol: String,
    pub byte_count: u64,
    pub status: String,
    pub anomaly_detail: String,
    pub confidence_percent: u32,
    pub ttl: String,
}

impl ExportRow {
    fn from_record(index: usize, record: &ClassifiedPacketRecord) -> Self {
        ExportRow {
            index,
            timestamp: record.formatted_timestamp(),
            source_address: or_not_available(record.source_address.as_deref()),
            destination_address: or_not_available(record.destination_address.as_deref()),
            protocol: or_not_available(record.protocol.as_deref()),
            byte_count: record.byte_count,
            status: record.prediction_label().to_string(),
            anomaly_detail: or_not_available(record.anomaly_detail.as_deref()),
            confidence_percent: record.confidence_percent(),
            ttl: record.ttl.map_or_else(|| NOT_AVAILABLE.to_string(), |ttl| ttl.to_string()),
        }
    }
}

fn or_not_available(value: Option<&str>) -> String {
    value.unwrap_or(NOT_AVAILABLE).to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportBatch {
    pub rows: Vec<ExportRow>,
    pub suggested_file_name: String,
}

impl ExportBatch {
    /// Serialize as CSV with the column labels as header.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
        wtr.write_record(COLUMNS)?;
        for row in &self.rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write into `dir` under the suggested file name and return the path.
    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        // Serialize fully before touching the disk so a failure leaves no partial file
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        let path = dir.as_ref().join(&self.suggested_file_name);
        fs::write(&path, buffer)?;
        info!("Exported {} rows to {}", self.rows.len(), path.display());
        Ok(path)
    }
}

/// Flatten the view the user is looking at into export rows.
///
/// Refuses to run on an empty view instead of producing an empty file.
pub fn to_export_rows<'a, I>(view: I, base_name: Option<&str>, today: NaiveDate) -> Result<ExportBatch>
where
    I: IntoIterator<Item = &'a ClassifiedPacketRecord>,
{
    let rows: Vec<ExportRow> = view
        .into_iter()
        .enumerate()
        .map(|(i, record)| ExportRow::from_record(i + 1, record))
        .collect();

    if rows.is_empty() {
        return Err(Error::NothingToExport);
    }

    Ok(ExportBatch {
        rows,
        suggested_file_name: suggested_file_name(base_name, today),
    })
}

/// `traffic_analysis_<stem>.csv`, falling back to the ISO date when the
/// source name leaves no stem.
pub fn suggested_file_name(base_name: Option<&str>, today: NaiveDate) -> String {
    let stem = base_name
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .map(strip_extension)
        .filter(|s| !s.is_empty());
    let stem = match stem {
        Some(stem) => stem.to_string(),
        None => today.format("%Y-%m-%d").to_string(),
    };
    format!("{}{}.{}", EXPORT_PREFIX, stem, EXPORT_EXTENSION)
}

// Drops the last extension only
fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos + 1 < name.len() => &name[..pos],
        _ => name,
    }
}
