// traffic-insight/src/config.rs
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ANALYZER_URL: &str = "http://localhost:5000/api/analyze";

/// Runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Endpoint of the classification service
    pub analyzer_url: String,

    /// Request timeout for one analysis
    pub analyzer_timeout: Duration,

    /// Largest capture file accepted for upload, in bytes
    pub max_upload_bytes: u64,

    /// Rows shown in the packet table
    pub table_row_limit: usize,

    /// Where exports are written
    pub export_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparseable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            analyzer_url: lookup("ANALYZER_URL").unwrap_or_else(|| DEFAULT_ANALYZER_URL.to_string()),

            analyzer_timeout: Duration::from_secs(
                lookup("ANALYZER_TIMEOUT_SECS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(300),
            ),

            max_upload_bytes: lookup("MAX_UPLOAD_MB")
                .and_then(|v| v.parse::<u64>().ok())
                .and_then(|mb| mb.checked_mul(1024 * 1024))
                .unwrap_or(100 * 1024 * 1024),

            table_row_limit: lookup("TABLE_ROW_LIMIT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),

            export_dir: lookup("EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}
