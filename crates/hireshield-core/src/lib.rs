//! Hireshield Core Library
//!
//! This crate provides the domain types, rejection taxonomy and configuration
//! shared by the upload ingestion components: the content validator, the
//! malware scanners and the pipeline that ties them together.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{ClamAvConfig, IngestConfig, UploadConfig};
pub use error::{ConfigError, LogLevel, RejectionReason};
pub use models::{UploadCandidate, ValidationVerdict};
