// traffic-insight/src/client.rs
use crate::config::Config;
use crate::error::{Error, Result};
use crate::record::{parse_records, ClassifiedPacketRecord};
use log::{debug, info};
use reqwest::blocking::multipart::Form;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const CAPTURE_EXTENSIONS: [&str; 2] = ["pcap", "pcapng"];

#[derive(Debug, Deserialize)]
struct ServiceError {
    error: String,
}

/// Blocking client for the packet classification service.
pub struct ClassificationClient {
    http: Client,
    endpoint: String,
    max_upload_bytes: u64,
}

impl ClassificationClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration, max_upload_bytes: u64) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(ClassificationClient {
            http,
            endpoint: endpoint.into(),
            max_upload_bytes,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.analyzer_url, config.analyzer_timeout, config.max_upload_bytes)
    }

    /// Upload a capture file and return the classified records.
    pub fn analyze<P: AsRef<Path>>(&self, capture: P) -> Result<Vec<ClassifiedPacketRecord>> {
        let capture = capture.as_ref();
        validate_capture(capture, self.max_upload_bytes)?;

        info!("Sending {} to {}", capture.display(), self.endpoint);
        let form = Form::new().file("file", capture)?;
        let response = self.http.post(&self.endpoint).multipart(form).send()?;

        let status = response.status().as_u16();
        let body = response.text()?;
        debug!("Classification service answered {} ({} bytes)", status, body.len());
        parse_response(status, &body)
    }
}

/// Reject files the service would refuse before uploading them.
pub fn validate_capture(path: &Path, max_upload_bytes: u64) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !CAPTURE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(Error::UnsupportedFormat(path.display().to_string()));
    }

    let size = path.metadata()?.len();
    if size > max_upload_bytes {
        return Err(Error::FileTooLarge { size, limit: max_upload_bytes });
    }
    Ok(())
}

/// Map a service reply to records. Non-success statuses become errors; a
/// successful reply that is not a record array is an empty dataset.
pub fn parse_response(status: u16, body: &str) -> Result<Vec<ClassifiedPacketRecord>> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ServiceError>(body)
            .map(|e| e.error)
            .unwrap_or_else(|_| body.trim().to_string());
        return Err(Error::Service { status, message });
    }
    Ok(parse_records(body))
}
