// traffic-insight/src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no data to export")]
    NothingToExport,

    #[error("an export is already running")]
    ExportInProgress,

    #[error("unsupported capture format: {0} (expected .pcap or .pcapng)")]
    UnsupportedFormat(String),

    #[error("capture file too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("classification service returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid status filter: {0}")]
    InvalidStatusFilter(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("export serialization failed: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Conditions shown to the user as a notice rather than a failure.
    pub fn is_notice(&self) -> bool {
        matches!(self, Error::NothingToExport | Error::ExportInProgress)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
