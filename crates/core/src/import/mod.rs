//! Catalog import: validate an uploaded document, hand it to the extraction
//! capability, turn the returned rows into options and merge them.

pub mod extractor;
pub mod rows;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::config::ExtractionConfig;
use crate::cpq::catalog::CatalogStore;
use crate::domain::catalog::{CategoryId, MATERIAL_CATEGORY, OPENING_CATEGORY};

pub use extractor::{
    parse_extraction_text, response_schema, CatalogExtractor, ExtractionError,
    ExtractionErrorKind, ExtractionRequest, ExtractionResponse, EXTRACTION_PROMPT,
};
pub use rows::{classify, option_slug, ClassifiedRows, ImportRow, RowRejection, RowType};

pub const PDF_MIME_TYPE: &str = "application/pdf";
const PDF_MAGIC: &[u8] = b"%PDF-";
const BYTES_PER_MB: u64 = 1024 * 1024;

/// Frames are offered as materials, sashes as opening types.
pub const FRAME_TARGET_CATEGORY: &str = MATERIAL_CATEGORY;
pub const SASH_TARGET_CATEGORY: &str = OPENING_CATEGORY;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ImportInputError {
    #[error("expected a PDF document, got `{mime}`")]
    NotPdf { mime: String },
    #[error("file is {size_bytes} bytes, the limit is {limit_bytes} bytes")]
    TooLarge { size_bytes: u64, limit_bytes: u64 },
    #[error("file is empty")]
    Empty,
    #[error("could not read `{path}`: {reason}")]
    Unreadable { path: String, reason: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error(transparent)]
    Input(#[from] ImportInputError),
    #[error("another catalog import is still running")]
    Busy,
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// `Success` and `Error` report the last finished run and are idle states:
/// they hold until the next run starts. A run that is cancelled mid-flight
/// falls back to `Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    #[default]
    Idle,
    Reading,
    Analyzing,
    Success,
    Error,
}

impl ImportStatus {
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Reading | Self::Analyzing)
    }

    pub fn is_idle(self) -> bool {
        !self.is_in_flight()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportSettings {
    pub max_file_bytes: u64,
    pub timeout: Duration,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

impl ImportSettings {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            max_file_bytes: config.max_file_mb.saturating_mul(BYTES_PER_MB),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportPayload {
    pub file_name: String,
    /// Declared content type; inferred from the extension when absent.
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImportPayload {
    pub fn new(file_name: impl Into<String>, mime_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self { file_name: file_name.into(), mime_type, bytes }
    }

    /// Checks the declared type and the on-disk size before reading, so an
    /// oversized file is rejected without being loaded.
    pub fn from_path(
        path: &Path,
        mime_type: Option<String>,
        limit_bytes: u64,
    ) -> Result<Self, ImportInputError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut payload = Self { file_name, mime_type, bytes: Vec::new() };

        let mime = payload.effective_mime();
        if mime != PDF_MIME_TYPE {
            return Err(ImportInputError::NotPdf { mime });
        }

        let unreadable = |error: std::io::Error| ImportInputError::Unreadable {
            path: path.display().to_string(),
            reason: error.to_string(),
        };
        let size_bytes = std::fs::metadata(path).map_err(unreadable)?.len();
        if size_bytes > limit_bytes {
            return Err(ImportInputError::TooLarge { size_bytes, limit_bytes });
        }

        payload.bytes = std::fs::read(path).map_err(unreadable)?;
        Ok(payload)
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn effective_mime(&self) -> String {
        if let Some(mime) = &self.mime_type {
            return mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        }
        let is_pdf = Path::new(&self.file_name)
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"));
        if is_pdf {
            PDF_MIME_TYPE.to_string()
        } else {
            "application/octet-stream".to_string()
        }
    }

    /// Blake3 hex digest of the raw bytes.
    pub fn digest(&self) -> String {
        blake3::hash(&self.bytes).to_hex().to_string()
    }

    fn validate(&self, limit_bytes: u64) -> Result<(), ImportInputError> {
        let mime = self.effective_mime();
        if mime != PDF_MIME_TYPE {
            return Err(ImportInputError::NotPdf { mime });
        }
        let size_bytes = self.size_bytes();
        if size_bytes > limit_bytes {
            return Err(ImportInputError::TooLarge { size_bytes, limit_bytes });
        }
        if self.bytes.is_empty() {
            return Err(ImportInputError::Empty);
        }
        if !self.bytes.starts_with(PDF_MAGIC) {
            return Err(ImportInputError::NotPdf { mime: format!("{mime} without %PDF header") });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeFailure {
    pub category: CategoryId,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub file_name: String,
    pub digest: String,
    pub rows_received: usize,
    pub frames_merged: usize,
    pub sashes_merged: usize,
    pub rows_dropped: usize,
    pub rows_rejected: usize,
    pub merge_failures: Vec<MergeFailure>,
}

impl ImportReport {
    pub fn merged_total(&self) -> usize {
        self.frames_merged + self.sashes_merged
    }

    pub fn is_partial(&self) -> bool {
        !self.merge_failures.is_empty()
    }
}

/// Clears the busy flag on every exit path, including a dropped future.
/// A status still in flight at that point goes back to `Idle`.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
    status: &'a watch::Sender<ImportStatus>,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool, status: &'a watch::Sender<ImportStatus>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag, status })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.status.send_if_modified(|status| {
            let abandoned = status.is_in_flight();
            if abandoned {
                *status = ImportStatus::Idle;
            }
            abandoned
        });
        self.flag.store(false, Ordering::Release);
    }
}

/// One pipeline per session. At most one import runs at a time.
pub struct ImportPipeline<E> {
    extractor: E,
    settings: ImportSettings,
    busy: AtomicBool,
    status: watch::Sender<ImportStatus>,
}

impl<E> ImportPipeline<E>
where
    E: CatalogExtractor,
{
    pub fn new(extractor: E, settings: ImportSettings) -> Self {
        let (status, _) = watch::channel(ImportStatus::Idle);
        Self { extractor, settings, busy: AtomicBool::new(false), status }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn status(&self) -> ImportStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ImportStatus> {
        self.status.subscribe()
    }

    fn set_status(&self, status: ImportStatus) {
        self.status.send_replace(status);
        info!(event_name = "import.status_changed", status = ?status, "import status changed");
    }

    /// Runs one import against `catalog`. Input errors never reach the
    /// extractor; extraction errors leave the catalog untouched.
    pub async fn import(
        &self,
        catalog: &mut CatalogStore,
        payload: ImportPayload,
    ) -> Result<ImportReport, ImportError> {
        let Some(_guard) = BusyGuard::acquire(&self.busy, &self.status) else {
            warn!(event_name = "import.rejected_busy", file = %payload.file_name, "import already running");
            return Err(ImportError::Busy);
        };

        self.set_status(ImportStatus::Reading);
        let result = self.run(catalog, &payload).await;
        match &result {
            Ok(report) => {
                self.set_status(ImportStatus::Success);
                info!(
                    event_name = "import.completed",
                    file = %report.file_name,
                    digest = %report.digest,
                    frames = report.frames_merged,
                    sashes = report.sashes_merged,
                    dropped = report.rows_dropped,
                    rejected = report.rows_rejected,
                    merge_failures = report.merge_failures.len(),
                    "catalog import completed"
                );
            }
            Err(error) => {
                self.set_status(ImportStatus::Error);
                warn!(event_name = "import.failed", file = %payload.file_name, error = %error, "catalog import failed");
            }
        }
        result
    }

    async fn run(
        &self,
        catalog: &mut CatalogStore,
        payload: &ImportPayload,
    ) -> Result<ImportReport, ImportError> {
        payload.validate(self.settings.max_file_bytes)?;

        let request = ExtractionRequest {
            mime_type: PDF_MIME_TYPE.to_string(),
            payload_base64: STANDARD.encode(&payload.bytes),
        };

        self.set_status(ImportStatus::Analyzing);
        let response = tokio::time::timeout(self.settings.timeout, self.extractor.extract(&request))
            .await
            .map_err(|_| {
                ExtractionError::new(
                    ExtractionErrorKind::Timeout,
                    format!("no answer within {}s", self.settings.timeout.as_secs()),
                )
            })??;

        if response.items.is_empty() {
            return Err(ExtractionError::no_data("extraction returned no items").into());
        }

        let classified = classify(&response.items);
        for rejection in &classified.rejected {
            warn!(event_name = "import.row_rejected", reason = %rejection, "import row rejected");
        }
        if classified.valid_rows() == 0 {
            return Err(ExtractionError::no_data(format!(
                "none of the {} extracted rows passed validation",
                response.items.len()
            ))
            .into());
        }

        let mut report = ImportReport {
            file_name: payload.file_name.clone(),
            digest: payload.digest(),
            rows_received: response.items.len(),
            frames_merged: 0,
            sashes_merged: 0,
            rows_dropped: classified.dropped,
            rows_rejected: classified.rejected.len(),
            merge_failures: Vec::new(),
        };

        // The two merges are independent; one failing does not undo the other.
        let ClassifiedRows { frames, sashes, .. } = classified;
        if !frames.is_empty() {
            match catalog.merge_import(FRAME_TARGET_CATEGORY, frames) {
                Ok(added) => report.frames_merged = added,
                Err(error) => report.merge_failures.push(MergeFailure {
                    category: CategoryId::new(FRAME_TARGET_CATEGORY),
                    message: error.to_string(),
                }),
            }
        }
        if !sashes.is_empty() {
            match catalog.merge_import(SASH_TARGET_CATEGORY, sashes) {
                Ok(added) => report.sashes_merged = added,
                Err(error) => report.merge_failures.push(MergeFailure {
                    category: CategoryId::new(SASH_TARGET_CATEGORY),
                    message: error.to_string(),
                }),
            }
        }

        Ok(report)
    }

    pub async fn import_with_audit<S>(
        &self,
        catalog: &mut CatalogStore,
        payload: ImportPayload,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<ImportReport, ImportError>
    where
        S: AuditSink,
    {
        let file_name = payload.file_name.clone();
        let digest = payload.digest();
        let result = self.import(catalog, payload).await;

        let outcome = match &result {
            Ok(report) if report.is_partial() => AuditOutcome::Failed,
            Ok(_) => AuditOutcome::Success,
            Err(ImportError::Input(_) | ImportError::Busy) => AuditOutcome::Rejected,
            Err(ImportError::Extraction(_)) => AuditOutcome::Failed,
        };
        let mut event = AuditEvent::new(
            audit.session_id.clone(),
            audit.correlation_id.clone(),
            "import.completed",
            AuditCategory::Import,
            audit.actor.clone(),
            outcome,
        )
        .with_metadata("file", file_name)
        .with_metadata("digest", digest);
        event = match &result {
            Ok(report) => event
                .with_metadata("frames_merged", report.frames_merged.to_string())
                .with_metadata("sashes_merged", report.sashes_merged.to_string())
                .with_metadata("merge_failures", report.merge_failures.len().to_string()),
            Err(error) => event.with_metadata("error", error.to_string()),
        };
        sink.emit(event);

        result
    }
}
