// traffic-insight/src/session.rs
use crate::error::{Error, Result};
use crate::export::{to_export_rows, ExportBatch};
use crate::filter::{FilteredView, StatusFilter};
use crate::record::ClassifiedPacketRecord;
use crate::stats::{summarize, DatasetSummary};
use crate::timeline::{anomaly_timeline, TimelinePoint};
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A loaded record collection together with its summary. Never mutated.
#[derive(Debug, Default)]
pub struct Dataset {
    source_name: Option<String>,
    records: Vec<ClassifiedPacketRecord>,
    summary: DatasetSummary,
}

impl Dataset {
    pub fn new(source_name: Option<String>, records: Vec<ClassifiedPacketRecord>) -> Self {
        let summary = summarize(&records);
        Dataset { source_name, records, summary }
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    pub fn records(&self) -> &[ClassifiedPacketRecord] {
        &self.records
    }

    pub fn summary(&self) -> &DatasetSummary {
        &self.summary
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewParams {
    pub status: StatusFilter,
    pub search_term: String,
}

/// Everything a front end renders, consistent as a whole.
#[derive(Debug, Default)]
pub struct SessionSnapshot {
    dataset: Arc<Dataset>,
    params: ViewParams,
    view: FilteredView,
}

impl SessionSnapshot {
    fn derive(dataset: Arc<Dataset>, params: ViewParams) -> Self {
        let view = FilteredView::build(dataset.records(), params.status, &params.search_term);
        debug!(
            "Filtered view: {} of {} records (status={}, search={:?})",
            view.len(),
            dataset.records().len(),
            params.status,
            params.search_term
        );
        SessionSnapshot { dataset, params, view }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn summary(&self) -> &DatasetSummary {
        self.dataset.summary()
    }

    pub fn params(&self) -> &ViewParams {
        &self.params
    }

    pub fn view(&self) -> &FilteredView {
        &self.view
    }

    pub fn filtered_records(&self) -> Vec<&ClassifiedPacketRecord> {
        self.view.records(self.dataset.records()).collect()
    }

    pub fn timeline(&self) -> Vec<TimelinePoint> {
        anomaly_timeline(self.view.records(self.dataset.records()))
    }

    pub fn export_rows(&self, today: NaiveDate) -> Result<ExportBatch> {
        to_export_rows(
            self.view.records(self.dataset.records()),
            self.dataset.source_name(),
            today,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTicket {
    id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Applied,
    /// A newer upload was started after this one.
    Discarded,
}

#[derive(Debug)]
struct PendingUpload {
    ticket: UploadTicket,
    source_name: String,
}

/// Holds the active dataset and view parameters.
///
/// Every transition swaps in a fresh `SessionSnapshot`; readers holding an
/// older snapshot keep a consistent dataset/summary/view triple.
#[derive(Debug, Default)]
pub struct Session {
    current: Arc<SessionSnapshot>,
    pending: Option<PendingUpload>,
    next_ticket: u64,
    last_error: Option<String>,
    exporting: AtomicBool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        Arc::clone(&self.current)
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Message of the last failed upload, cleared by the next upload.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Start an upload. Any upload still outstanding is superseded.
    pub fn begin_upload(&mut self, source_name: impl Into<String>) -> UploadTicket {
        self.next_ticket += 1;
        let ticket = UploadTicket { id: self.next_ticket };
        let source_name = source_name.into();
        if let Some(previous) = self.pending.take() {
            info!("Upload of {} superseded by {}", previous.source_name, source_name);
        }
        self.pending = Some(PendingUpload { ticket, source_name });
        self.last_error = None;
        ticket
    }

    pub fn complete_upload(&mut self, ticket: UploadTicket, records: Vec<ClassifiedPacketRecord>) -> UploadOutcome {
        let pending = match self.take_pending(ticket) {
            Some(pending) => pending,
            None => return UploadOutcome::Discarded,
        };
        self.replace_dataset(Some(pending.source_name), records);
        UploadOutcome::Applied
    }

    /// Record a failed upload. The current dataset stays as it is.
    pub fn fail_upload(&mut self, ticket: UploadTicket, error: &Error) -> UploadOutcome {
        let pending = match self.take_pending(ticket) {
            Some(pending) => pending,
            None => return UploadOutcome::Discarded,
        };
        warn!("Upload of {} failed: {}", pending.source_name, error);
        self.last_error = Some(error.to_string());
        UploadOutcome::Applied
    }

    /// Replace the dataset directly, cancelling any outstanding upload.
    pub fn load(&mut self, source_name: Option<String>, records: Vec<ClassifiedPacketRecord>) {
        self.pending = None;
        self.replace_dataset(source_name, records);
    }

    pub fn set_status_filter(&mut self, status: StatusFilter) {
        if self.current.params.status == status {
            return;
        }
        let params = ViewParams { status, ..self.current.params.clone() };
        self.rederive(params);
    }

    pub fn set_search_term(&mut self, search_term: impl Into<String>) {
        let search_term = search_term.into();
        if self.current.params.search_term == search_term {
            return;
        }
        let params = ViewParams { search_term, ..self.current.params.clone() };
        self.rederive(params);
    }

    /// Claim the export slot for the current view.
    pub fn begin_export(&self) -> Result<ExportJob<'_>> {
        if self
            .exporting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::ExportInProgress);
        }
        Ok(ExportJob {
            flag: &self.exporting,
            snapshot: self.snapshot(),
        })
    }

    pub fn export_to_dir<P: AsRef<Path>>(&self, dir: P, today: NaiveDate) -> Result<PathBuf> {
        self.begin_export()?.write_to_dir(dir, today)
    }

    fn take_pending(&mut self, ticket: UploadTicket) -> Option<PendingUpload> {
        if self.pending.as_ref().map(|p| p.ticket) == Some(ticket) {
            return self.pending.take();
        }
        debug!("Dropping stale upload result (ticket {})", ticket.id);
        None
    }

    fn replace_dataset(&mut self, source_name: Option<String>, records: Vec<ClassifiedPacketRecord>) {
        let dataset = Arc::new(Dataset::new(source_name, records));
        info!(
            "Loaded {} records from {} ({} anomalies)",
            dataset.summary().total_packets,
            dataset.source_name().unwrap_or("<unnamed>"),
            dataset.summary().anomaly_count
        );
        let params = self.current.params.clone();
        self.current = Arc::new(SessionSnapshot::derive(dataset, params));
    }

    fn rederive(&mut self, params: ViewParams) {
        let dataset = Arc::clone(&self.current.dataset);
        self.current = Arc::new(SessionSnapshot::derive(dataset, params));
    }
}

/// Exclusive export of one snapshot. Releases the slot when dropped.
#[derive(Debug)]
pub struct ExportJob<'a> {
    flag: &'a AtomicBool,
    snapshot: Arc<SessionSnapshot>,
}

impl ExportJob<'_> {
    pub fn batch(&self, today: NaiveDate) -> Result<ExportBatch> {
        self.snapshot.export_rows(today)
    }

    pub fn write_to_dir<P: AsRef<Path>>(self, dir: P, today: NaiveDate) -> Result<PathBuf> {
        self.batch(today)?.write_to_dir(dir)
    }
}

impl Drop for ExportJob<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
