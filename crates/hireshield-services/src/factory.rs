//! Build the scanner backend selected by configuration.

use std::sync::Arc;

use hireshield_core::{ClamAvConfig, ConfigError, IngestConfig};

use crate::scanner::{ChainScanner, ClamdScanner, NoOpScanner, Scanner};

/// One network scanner per configured daemon address, in priority order.
pub fn clamd_scanners(config: &ClamAvConfig) -> Result<Vec<ClamdScanner>, ConfigError> {
    let multiple = config.addresses.len() > 1;
    config
        .addresses
        .iter()
        .map(|raw| {
            let scanner = ClamdScanner::from_config(raw, config)?;
            if multiple {
                let name = format!("clamav[{}]", scanner.address());
                Ok(scanner.with_name(name))
            } else {
                Ok(scanner)
            }
        })
        .collect()
}

/// Select the scanner for this process.
///
/// - ClamAV enabled with one address: that daemon.
/// - ClamAV enabled with several: a [`ChainScanner`] over them, first available wins.
/// - ClamAV disabled: the [`NoOpScanner`], refused in production unless
///   `ALLOW_NOOP_SCANNER` was set.
pub fn scanner_from_config(config: &IngestConfig) -> Result<Arc<dyn Scanner>, ConfigError> {
    if config.clamav.enabled {
        let mut scanners = clamd_scanners(&config.clamav)?;
        tracing::info!(
            addresses = ?config.clamav.addresses,
            timeout_secs = config.clamav.timeout_secs,
            "ClamAV scanning enabled"
        );

        if scanners.len() == 1 {
            if let Some(scanner) = scanners.pop() {
                return Ok(Arc::new(scanner));
            }
        }

        let members = scanners
            .into_iter()
            .map(|scanner| Arc::new(scanner) as Arc<dyn Scanner>)
            .collect();
        return Ok(Arc::new(ChainScanner::new(members)));
    }

    if config.is_production() && !config.allow_noop_scanner {
        return Err(ConfigError::NoOpScannerForbidden);
    }

    tracing::warn!(
        environment = %config.environment,
        allow_noop_scanner = config.allow_noop_scanner,
        "ClamAV scanning disabled, uploads will not be scanned for malware"
    );
    Ok(Arc::new(NoOpScanner::new()))
}
