//! Hireshield CLI: run the upload pipeline against local files.
//!
//! Configuration comes from the environment (and `.env`), see `IngestConfig`.

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use hireshield_cli::{init_tracing, read_candidate};
use hireshield_core::{IngestConfig, RejectionReason};
use hireshield_processing::{ContentValidator, ValidationPolicy};
use hireshield_services::{clamd_scanners, scanner_from_config, IngestionPipeline, Scanner};
use serde::Serialize;

/// Exit status for a negative answer (rejected upload, no daemon reachable)
const EXIT_REJECTED: u8 = 2;

#[derive(Parser)]
#[command(name = "hireshield", about = "Upload validation and malware scanning")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and scan a file as if it had been uploaded
    Check {
        /// Path to the file
        file: std::path::PathBuf,
        /// Declared content type; sniffed from the bytes when omitted
        #[arg(long)]
        mime: Option<String>,
    },
    /// Probe each configured ClamAV daemon
    Ping,
    /// Check a filename against the extension whitelist only
    Precheck {
        /// Untrusted client filename
        filename: String,
    },
}

#[derive(Serialize)]
struct PingReport {
    scanner: String,
    address: String,
    available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

#[derive(Serialize)]
struct PrecheckReport {
    filename: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<RejectionReason>,
    /// Whitelist in effect, reported on rejection
    #[serde(skip_serializing_if = "Vec::is_empty")]
    allowed_extensions: Vec<String>,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

fn exit_status(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_REJECTED)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = IngestConfig::from_env().context("Invalid configuration")?;

    match cli.command {
        Commands::Check { file, mime } => {
            let scanner = scanner_from_config(&config).context("Failed to set up scanner")?;
            let pipeline = IngestionPipeline::from_config(&config, scanner);

            tracing::debug!(scanner = %pipeline.scanner().name(), "Scanner selected");

            let candidate = read_candidate(&file, mime).await?;
            let verdict = pipeline.ingest(&candidate).await;
            print_json(&verdict)?;
            Ok(exit_status(verdict.is_accepted()))
        }
        Commands::Ping => {
            let scanners =
                clamd_scanners(&config.clamav).context("Invalid CLAMAV_ADDRESS")?;

            let mut reports = Vec::with_capacity(scanners.len());
            for scanner in &scanners {
                let available = scanner.available().await;
                let version = if available {
                    scanner.version().await.ok()
                } else {
                    None
                };
                reports.push(PingReport {
                    scanner: scanner.name().to_string(),
                    address: scanner.address().to_string(),
                    available,
                    version,
                });
            }

            print_json(&reports)?;
            Ok(exit_status(reports.iter().any(|r| r.available)))
        }
        Commands::Precheck { filename } => {
            let validator =
                ContentValidator::new(ValidationPolicy::from_config(&config.upload));
            let report = match validator.validate_extension_only(&filename) {
                Ok(extension) => PrecheckReport {
                    filename,
                    valid: true,
                    extension: Some(extension),
                    reason: None,
                    allowed_extensions: Vec::new(),
                },
                Err(e) => PrecheckReport {
                    filename,
                    valid: false,
                    extension: None,
                    reason: Some(e.reason()),
                    allowed_extensions: validator.policy().allowed_extensions().to_vec(),
                },
            };

            print_json(&report)?;
            Ok(exit_status(report.valid))
        }
    }
}
