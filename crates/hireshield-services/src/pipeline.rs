//! Upload ingestion pipeline
//!
//! size checks → content validation → malware scan → verdict
//!
//! The pipeline is stateless between calls. The validator and the scanner
//! are built once at startup and shared across concurrent uploads.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hireshield_core::{IngestConfig, LogLevel, RejectionReason, UploadCandidate, UploadConfig};
use hireshield_processing::{ContentValidator, ValidationError, ValidationPolicy};
use serde::Serialize;

use crate::scanner::{ScanError, ScanResult, Scanner};

/// Why an upload was refused, with the audit detail kept apart from what
/// the end user is shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub reason: RejectionReason,
    /// Threat name, transport error or validation detail. Audit log only.
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanner: Option<String>,
}

impl Rejection {
    fn validation(reason: RejectionReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
            scanner: None,
        }
    }

    /// Generic message safe to show the uploader.
    pub fn client_message(&self) -> &'static str {
        self.reason.client_message()
    }
}

/// Binary accept/reject decision for one upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum IngestionVerdict {
    Accepted {
        extension: String,
        detected_mime: String,
        scanner: String,
    },
    Rejected(Rejection),
}

impl IngestionVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, IngestionVerdict::Accepted { .. })
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            IngestionVerdict::Accepted { .. } => None,
            IngestionVerdict::Rejected(rejection) => Some(rejection),
        }
    }

    pub fn reason(&self) -> Option<RejectionReason> {
        self.rejection().map(|r| r.reason)
    }
}

/// Validates and scans uploads.
#[derive(Clone)]
pub struct IngestionPipeline {
    validator: ContentValidator,
    scanner: Arc<dyn Scanner>,
    max_file_size: usize,
    /// Outer bound on the scan call, on top of the scanner's own timeout
    scan_deadline: Option<Duration>,
}

impl IngestionPipeline {
    pub fn new(validator: ContentValidator, scanner: Arc<dyn Scanner>) -> Self {
        Self {
            validator,
            scanner,
            max_file_size: UploadConfig::default().max_file_size_bytes,
            scan_deadline: None,
        }
    }

    /// Build from configuration with an already selected scanner.
    pub fn from_config(config: &IngestConfig, scanner: Arc<dyn Scanner>) -> Self {
        let validator = ContentValidator::new(ValidationPolicy::from_config(&config.upload));
        Self::new(validator, scanner).with_max_file_size(config.upload.max_file_size_bytes)
    }

    pub fn with_max_file_size(mut self, max_file_size: usize) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Bound the scan call. Exceeding the deadline drops the in-flight
    /// connection and rejects the upload as a transport failure.
    pub fn with_scan_deadline(mut self, deadline: Duration) -> Self {
        self.scan_deadline = Some(deadline);
        self
    }

    pub fn scanner(&self) -> &Arc<dyn Scanner> {
        &self.scanner
    }

    /// Cheap filename check before the upload body has been read.
    pub fn precheck(&self, filename: &str) -> Result<String, ValidationError> {
        self.validator.validate_extension_only(filename)
    }

    /// Produce the verdict for one upload.
    ///
    /// The scanner is only invoked for content that passed every validation
    /// layer, so unvalidated or oversized bytes are never sent to the daemon.
    pub async fn ingest(&self, candidate: &UploadCandidate) -> IngestionVerdict {
        let start = Instant::now();
        let verdict = self.evaluate(candidate).await;

        match &verdict {
            IngestionVerdict::Accepted {
                extension, scanner, ..
            } => {
                tracing::info!(
                    filename = %candidate.filename,
                    bytes = candidate.size(),
                    extension = %extension,
                    scanner = %scanner,
                    duration_ms = start.elapsed().as_millis(),
                    "Upload accepted"
                );
            }
            IngestionVerdict::Rejected(rejection) => {
                log_rejection(candidate, rejection, start.elapsed());
            }
        }

        verdict
    }

    async fn evaluate(&self, candidate: &UploadCandidate) -> IngestionVerdict {
        let size = candidate.size();
        if size == 0 {
            return IngestionVerdict::Rejected(Rejection::validation(
                RejectionReason::EmptyFile,
                "empty file",
            ));
        }
        if size > self.max_file_size {
            return IngestionVerdict::Rejected(Rejection::validation(
                RejectionReason::FileTooLarge,
                format!("{} bytes exceeds limit of {} bytes", size, self.max_file_size),
            ));
        }

        let validation =
            self.validator
                .validate(&candidate.filename, &candidate.content, &candidate.mime_type);
        if let Some(reason) = validation.reason {
            return IngestionVerdict::Rejected(Rejection::validation(
                reason,
                format!(
                    "extension={:?} mime={:?}",
                    validation.extension, validation.detected_mime
                ),
            ));
        }

        let result = self.run_scan(candidate).await;
        match result.rejection_reason() {
            None => IngestionVerdict::Accepted {
                extension: validation.extension,
                detected_mime: validation.detected_mime,
                scanner: result.scanner_name().to_string(),
            },
            Some(reason) => IngestionVerdict::Rejected(Rejection {
                reason,
                detail: result.detail().unwrap_or_else(|| "unknown".to_string()),
                scanner: Some(result.scanner_name().to_string()),
            }),
        }
    }

    async fn run_scan(&self, candidate: &UploadCandidate) -> ScanResult {
        let scan = self.scanner.scan(&candidate.filename, &candidate.content);
        match self.scan_deadline {
            None => scan.await,
            Some(deadline) => match tokio::time::timeout(deadline, scan).await {
                Ok(result) => result,
                // The scan future is dropped here, closing its connection
                Err(_) => ScanResult::failed(self.scanner.name(), ScanError::Timeout(deadline)),
            },
        }
    }
}

fn log_rejection(candidate: &UploadCandidate, rejection: &Rejection, elapsed: Duration) {
    let code = rejection.reason.error_code();
    let scanner = rejection.scanner.as_deref().unwrap_or("-");
    let duration_ms = elapsed.as_millis();
    let stage = if rejection.reason.is_validation_failure() {
        "validation"
    } else {
        "scan"
    };
    match rejection.reason.log_level() {
        LogLevel::Debug => tracing::debug!(
            filename = %candidate.filename,
            reason = code,
            stage,
            detail = %rejection.detail,
            duration_ms,
            "Upload rejected"
        ),
        LogLevel::Warn => tracing::warn!(
            filename = %candidate.filename,
            reason = code,
            stage,
            detail = %rejection.detail,
            scanner,
            duration_ms,
            "Upload rejected"
        ),
        LogLevel::Error => tracing::error!(
            filename = %candidate.filename,
            reason = code,
            stage,
            detail = %rejection.detail,
            scanner,
            duration_ms,
            "Upload rejected"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PNG_BYTES: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];
    const PDF_BYTES: &[u8] = b"%PDF-1.4\n";

    enum Behaviour {
        Clean,
        Infected(&'static str),
        Fail,
        Hang,
    }

    struct RecordingScanner {
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl RecordingScanner {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Scanner for RecordingScanner {
        fn name(&self) -> &str {
            "recording"
        }

        async fn available(&self) -> bool {
            true
        }

        async fn scan(&self, _filename: &str, _content: &[u8]) -> ScanResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Clean => ScanResult::clean("recording"),
                Behaviour::Infected(threat) => ScanResult::infected("recording", threat),
                Behaviour::Fail => ScanResult::failed(
                    "recording",
                    ScanError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe)),
                ),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    ScanResult::clean("recording")
                }
            }
        }
    }

    fn pipeline(scanner: &Arc<RecordingScanner>) -> IngestionPipeline {
        IngestionPipeline::new(ContentValidator::default(), scanner.clone())
    }

    fn upload(filename: &str, mime: &str, content: &[u8]) -> UploadCandidate {
        UploadCandidate::new(filename, mime, content.to_vec())
    }

    #[tokio::test]
    async fn test_clean_upload_is_accepted() {
        let scanner = RecordingScanner::new(Behaviour::Clean);
        let verdict = pipeline(&scanner)
            .ingest(&upload("Resume.PDF", "application/pdf", PDF_BYTES))
            .await;

        assert_eq!(
            verdict,
            IngestionVerdict::Accepted {
                extension: "pdf".to_string(),
                detected_mime: "application/pdf".to_string(),
                scanner: "recording".to_string(),
            }
        );
        assert_eq!(scanner.calls(), 1);
    }

    #[tokio::test]
    async fn test_validation_failure_never_reaches_scanner() {
        let scanner = RecordingScanner::new(Behaviour::Clean);
        let p = pipeline(&scanner);

        let cases = [
            (upload("resume", "application/pdf", PDF_BYTES), RejectionReason::NoExtension),
            (upload("run.exe", "application/pdf", PDF_BYTES), RejectionReason::ExtensionNotAllowed),
            (upload("cv.pdf", "application/pdf", PNG_BYTES), RejectionReason::ContentMismatch),
            (upload("a.txt", "application/octet-stream", b"hi"), RejectionReason::MimeNotAllowed),
        ];

        for (candidate, expected) in cases {
            let verdict = p.ingest(&candidate).await;
            assert_eq!(verdict.reason(), Some(expected), "{}", candidate.filename);
            assert!(!verdict.is_accepted());
        }
        assert_eq!(scanner.calls(), 0);
    }

    #[tokio::test]
    async fn test_size_limits_checked_before_scan() {
        let scanner = RecordingScanner::new(Behaviour::Clean);
        let p = pipeline(&scanner).with_max_file_size(8);

        let verdict = p.ingest(&upload("a.txt", "text/plain", b"")).await;
        assert_eq!(verdict.reason(), Some(RejectionReason::EmptyFile));

        let verdict = p.ingest(&upload("a.pdf", "application/pdf", PDF_BYTES)).await;
        assert_eq!(verdict.reason(), Some(RejectionReason::FileTooLarge));

        assert_eq!(scanner.calls(), 0);
    }

    #[tokio::test]
    async fn test_infected_upload_is_rejected_with_threat_in_detail_only() {
        let scanner = RecordingScanner::new(Behaviour::Infected("Eicar-Signature"));
        let verdict = pipeline(&scanner)
            .ingest(&upload("photo.png", "image/png", PNG_BYTES))
            .await;

        let rejection = verdict.rejection().unwrap();
        assert_eq!(rejection.reason, RejectionReason::Infected);
        assert_eq!(rejection.detail, "Eicar-Signature");
        assert_eq!(rejection.scanner.as_deref(), Some("recording"));
        assert!(!rejection.client_message().contains("Eicar"));
    }

    #[tokio::test]
    async fn test_scanner_failure_fails_closed() {
        let scanner = RecordingScanner::new(Behaviour::Fail);
        let verdict = pipeline(&scanner)
            .ingest(&upload("photo.png", "image/png", PNG_BYTES))
            .await;

        assert!(!verdict.is_accepted());
        assert_eq!(verdict.reason(), Some(RejectionReason::ScanTransportFailure));
        assert!(verdict.rejection().unwrap().reason.is_recoverable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_deadline_fails_closed() {
        let scanner = RecordingScanner::new(Behaviour::Hang);
        let verdict = pipeline(&scanner)
            .with_scan_deadline(Duration::from_secs(5))
            .ingest(&upload("photo.png", "image/png", PNG_BYTES))
            .await;

        assert_eq!(verdict.reason(), Some(RejectionReason::ScanTransportFailure));
        assert_eq!(scanner.calls(), 1);
    }

    #[test]
    fn test_default_size_limit_follows_upload_config() {
        let scanner = RecordingScanner::new(Behaviour::Clean);
        let p = pipeline(&scanner);
        assert_eq!(p.max_file_size, UploadConfig::default().max_file_size_bytes);
        assert_eq!(p.scanner().name(), "recording");
    }

    #[tokio::test]
    async fn test_from_config_applies_limits_and_overrides() {
        let mut config = IngestConfig::default();
        config.upload.max_file_size_bytes = 1024;
        config.upload.allowed_extensions = Some(vec!["pdf".to_string()]);

        let scanner = RecordingScanner::new(Behaviour::Clean);
        let p = IngestionPipeline::from_config(&config, scanner.clone());

        assert!(p.precheck("cv.pdf").is_ok());
        assert!(p.precheck("photo.png").is_err());

        let verdict = p
            .ingest(&upload("photo.png", "image/png", PNG_BYTES))
            .await;
        assert_eq!(verdict.reason(), Some(RejectionReason::ExtensionNotAllowed));

        let mut big = b"%PDF".to_vec();
        big.extend_from_slice(&[b'x'; 2048]);
        let verdict = p.ingest(&upload("cv.pdf", "application/pdf", &big)).await;
        assert_eq!(verdict.reason(), Some(RejectionReason::FileTooLarge));
    }

    #[test]
    fn test_verdict_serialization() {
        let verdict = IngestionVerdict::Rejected(Rejection {
            reason: RejectionReason::Infected,
            detail: "Eicar-Signature".to_string(),
            scanner: Some("clamav".to_string()),
        });
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["decision"], "rejected");
        assert_eq!(json["reason"], "INFECTED");
        assert_eq!(json["scanner"], "clamav");

        let accepted = IngestionVerdict::Accepted {
            extension: "pdf".to_string(),
            detected_mime: "application/pdf".to_string(),
            scanner: "noop".to_string(),
        };
        let json = serde_json::to_value(&accepted).unwrap();
        assert_eq!(json["decision"], "accepted");
        assert_eq!(json["extension"], "pdf");
    }
}
