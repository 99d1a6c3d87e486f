//! Error types module
//!
//! This module provides the rejection taxonomy shared by the validator, the
//! scanners and the ingestion pipeline, together with the configuration error
//! type. Rejection reasons self-describe how the (external) upload handler
//! should present them: status code, machine code, a generic client message
//! and the level at which the rejection should be logged.

use serde::Serialize;

/// Log level for rejection reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected rejections like a wrong extension
    Debug,
    /// Warning level - for spoofing signals and detected malware
    Warn,
    /// Error level - for scanner failures
    Error,
}

/// Why an upload was rejected.
///
/// Validation reasons are terminal: they indicate a malformed or malicious
/// upload (or a client bug) and retrying the same bytes cannot succeed.
/// Scanner reasons distinguish a genuine detection from an infrastructure
/// failure so the caller can decide whether to retry the whole pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    EmptyFile,
    FileTooLarge,
    NoExtension,
    ExtensionNotAllowed,
    /// Leading bytes do not match the claimed extension (spoofing signal).
    ContentMismatch,
    MimeNotAllowed,
    ScanTransportFailure,
    ScanProtocolError,
    Infected,
    NoScannerAvailable,
}

/// Static metadata for each variant: (http_status, error_code, recoverable, log_level).
fn rejection_static_metadata(reason: RejectionReason) -> (u16, &'static str, bool, LogLevel) {
    match reason {
        RejectionReason::EmptyFile => (400, "EMPTY_FILE", false, LogLevel::Debug),
        RejectionReason::FileTooLarge => (413, "FILE_TOO_LARGE", false, LogLevel::Debug),
        RejectionReason::NoExtension => (400, "NO_EXTENSION", false, LogLevel::Debug),
        RejectionReason::ExtensionNotAllowed => {
            (400, "EXTENSION_NOT_ALLOWED", false, LogLevel::Debug)
        }
        RejectionReason::ContentMismatch => (400, "CONTENT_MISMATCH", false, LogLevel::Warn),
        RejectionReason::MimeNotAllowed => (400, "MIME_NOT_ALLOWED", false, LogLevel::Debug),
        RejectionReason::ScanTransportFailure => {
            (503, "SCAN_TRANSPORT_FAILURE", true, LogLevel::Error)
        }
        RejectionReason::ScanProtocolError => (503, "SCAN_PROTOCOL_ERROR", false, LogLevel::Error),
        RejectionReason::Infected => (422, "INFECTED", false, LogLevel::Warn),
        RejectionReason::NoScannerAvailable => (503, "NO_SCANNER_AVAILABLE", true, LogLevel::Error),
    }
}

impl RejectionReason {
    /// HTTP status code the upload handler should answer with
    pub fn http_status_code(&self) -> u16 {
        rejection_static_metadata(*self).0
    }

    /// Machine-readable code (e.g. "CONTENT_MISMATCH")
    pub fn error_code(&self) -> &'static str {
        rejection_static_metadata(*self).1
    }

    /// Whether re-running the whole pipeline on a fresh connection may succeed
    pub fn is_recoverable(&self) -> bool {
        rejection_static_metadata(*self).2
    }

    pub fn log_level(&self) -> LogLevel {
        rejection_static_metadata(*self).3
    }

    /// True for reasons produced by the content validator rather than a scanner
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            RejectionReason::EmptyFile
                | RejectionReason::FileTooLarge
                | RejectionReason::NoExtension
                | RejectionReason::ExtensionNotAllowed
                | RejectionReason::ContentMismatch
                | RejectionReason::MimeNotAllowed
        )
    }

    /// Client-facing message.
    ///
    /// Never carries daemon output or threat names; those belong in the audit log.
    pub fn client_message(&self) -> &'static str {
        match self {
            RejectionReason::EmptyFile => "The uploaded file is empty",
            RejectionReason::FileTooLarge => "The uploaded file exceeds the maximum allowed size",
            RejectionReason::NoExtension => "The file name must have an extension",
            RejectionReason::ExtensionNotAllowed => "This file type is not allowed",
            RejectionReason::ContentMismatch => "File content does not match extension",
            RejectionReason::MimeNotAllowed => "This file type is not allowed",
            RejectionReason::Infected => "The file was rejected by the security scan",
            RejectionReason::ScanTransportFailure
            | RejectionReason::ScanProtocolError
            | RejectionReason::NoScannerAvailable => {
                "The file could not be verified right now, please try again later"
            }
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.error_code())
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Invalid scanner address: {0:?}")]
    InvalidAddress(String),

    #[error(
        "No malware scanner configured in production; set CLAMAV_ENABLED=true or ALLOW_NOOP_SCANNER=true"
    )]
    NoOpScannerForbidden,
}
