//! Hireshield Services Layer
//!
//! This crate hosts the malware scanner backends and the ingestion pipeline
//! that runs content validation followed by a scan for each upload. The
//! upload handler that receives files and the storage that persists them
//! live outside this crate; they only see [`IngestionPipeline`] and its
//! [`IngestionVerdict`].

pub mod factory;
pub mod pipeline;
pub mod scanner;

pub use factory::{clamd_scanners, scanner_from_config};
pub use hireshield_processing::{ContentValidator, ValidationPolicy};
pub use pipeline::{IngestionPipeline, IngestionVerdict, Rejection};
pub use scanner::{
    ChainScanner, ClamdAddress, ClamdScanner, NoOpScanner, ScanError, ScanResult, Scanner,
};
