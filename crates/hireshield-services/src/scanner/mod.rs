//! Malware scanner abstraction
//!
//! Every backend implements [`Scanner`]. Implementations never return a
//! bare error: a scan that cannot be completed is reported as an infected
//! [`ScanResult`] carrying the [`ScanError`], so callers that only look at
//! `is_infected()` still fail closed.

pub mod chain;
pub mod clamav;
pub mod noop;

pub use chain::ChainScanner;
pub use clamav::{ClamdAddress, ClamdScanner};
pub use noop::NoOpScanner;

use async_trait::async_trait;
use hireshield_core::RejectionReason;
use std::io;
use std::time::Duration;

/// Scanner backend errors
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Failed to connect to scanner at {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Scanner I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Scan timed out after {0:?}")]
    Timeout(Duration),

    /// The daemon answered with an `ERROR` line (raw response preserved)
    #[error("Scanner reported an error: {0}")]
    Protocol(String),

    #[error("Unexpected scanner response: {0:?}")]
    UnexpectedResponse(String),

    #[error("Content of {0} bytes exceeds the stream length limit")]
    PayloadTooLarge(usize),

    #[error("Unsupported scanner transport: {0}")]
    UnsupportedTransport(String),

    #[error("No scanner backend available")]
    NoBackendAvailable,
}

impl ScanError {
    pub fn reason(&self) -> RejectionReason {
        match self {
            ScanError::Connect { .. }
            | ScanError::Io(_)
            | ScanError::Timeout(_)
            | ScanError::UnsupportedTransport(_) => RejectionReason::ScanTransportFailure,
            ScanError::Protocol(_)
            | ScanError::UnexpectedResponse(_)
            | ScanError::PayloadTooLarge(_) => RejectionReason::ScanProtocolError,
            ScanError::NoBackendAvailable => RejectionReason::NoScannerAvailable,
        }
    }
}

/// Outcome of one scan.
///
/// Whenever `error()` is `Some`, `is_infected()` is true. The fields are
/// private so that no caller can build a "clean with error" result.
#[derive(Debug)]
pub struct ScanResult {
    infected: bool,
    threat_name: Option<String>,
    scanner_name: String,
    error: Option<ScanError>,
}

impl ScanResult {
    pub fn clean(scanner_name: impl Into<String>) -> Self {
        Self {
            infected: false,
            threat_name: None,
            scanner_name: scanner_name.into(),
            error: None,
        }
    }

    pub fn infected(scanner_name: impl Into<String>, threat_name: impl Into<String>) -> Self {
        Self {
            infected: true,
            threat_name: Some(threat_name.into()),
            scanner_name: scanner_name.into(),
            error: None,
        }
    }

    /// A scan that could not be completed. Always reported as infected.
    pub fn failed(scanner_name: impl Into<String>, error: ScanError) -> Self {
        Self {
            infected: true,
            threat_name: None,
            scanner_name: scanner_name.into(),
            error: Some(error),
        }
    }

    pub fn is_infected(&self) -> bool {
        self.infected
    }

    pub fn threat_name(&self) -> Option<&str> {
        self.threat_name.as_deref()
    }

    pub fn scanner_name(&self) -> &str {
        &self.scanner_name
    }

    pub fn error(&self) -> Option<&ScanError> {
        self.error.as_ref()
    }

    /// `None` for a clean result, otherwise why the upload must be rejected.
    pub fn rejection_reason(&self) -> Option<RejectionReason> {
        if !self.infected {
            return None;
        }
        Some(
            self.error
                .as_ref()
                .map(ScanError::reason)
                .unwrap_or(RejectionReason::Infected),
        )
    }

    /// Audit detail: the error text or the threat name. Not for end users.
    pub fn detail(&self) -> Option<String> {
        match (&self.error, &self.threat_name) {
            (Some(e), _) => Some(e.to_string()),
            (None, Some(threat)) => Some(threat.clone()),
            (None, None) if self.infected => Some("unknown".to_string()),
            (None, None) => None,
        }
    }
}

/// Malware scanning capability.
///
/// Implementations must be `Send + Sync` so one instance can serve
/// concurrent uploads; they hold only immutable configuration.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Stable identifier such as "clamav" or "noop"
    fn name(&self) -> &str;

    /// Lightweight liveness probe with its own short deadline
    async fn available(&self) -> bool;

    /// Scan `content`. Never reports clean unless the backend said so.
    async fn scan(&self, filename: &str, content: &[u8]) -> ScanResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_is_infected() {
        let result = ScanResult::failed("clamav", ScanError::Timeout(Duration::from_secs(30)));
        assert!(result.is_infected());
        assert!(result.error().is_some());
        assert_eq!(result.threat_name(), None);
        assert_eq!(
            result.rejection_reason(),
            Some(RejectionReason::ScanTransportFailure)
        );
        assert_eq!(result.detail().as_deref(), Some("Scan timed out after 30s"));
    }

    #[test]
    fn test_clean_and_infected_results() {
        let clean = ScanResult::clean("noop");
        assert!(!clean.is_infected());
        assert_eq!(clean.rejection_reason(), None);
        assert_eq!(clean.detail(), None);

        let infected = ScanResult::infected("clamav", "Eicar-Signature");
        assert!(infected.is_infected());
        assert_eq!(infected.threat_name(), Some("Eicar-Signature"));
        assert_eq!(infected.rejection_reason(), Some(RejectionReason::Infected));
        assert_eq!(infected.detail().as_deref(), Some("Eicar-Signature"));
        assert_eq!(infected.scanner_name(), "clamav");
    }

    #[test]
    fn test_error_reasons() {
        let refused = ScanError::Connect {
            address: "localhost:3310".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(refused.reason(), RejectionReason::ScanTransportFailure);
        assert_eq!(
            ScanError::Protocol("stream: Size limit exceeded ERROR".to_string()).reason(),
            RejectionReason::ScanProtocolError
        );
        assert_eq!(
            ScanError::UnexpectedResponse("garbage".to_string()).reason(),
            RejectionReason::ScanProtocolError
        );
        assert_eq!(
            ScanError::NoBackendAvailable.reason(),
            RejectionReason::NoScannerAvailable
        );
    }
}
