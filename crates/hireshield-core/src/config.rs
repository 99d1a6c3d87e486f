//! Configuration module
//!
//! Environment-driven settings for the scanner backends and the upload
//! whitelists. Binaries load an optional `.env` with dotenvy first; this
//! module only reads variables.

use std::env;
use std::time::Duration;

use crate::error::ConfigError;

// Common constants
const CLAMAV_DEFAULT_ADDRESS: &str = "localhost:3310";
const CLAMAV_TIMEOUT_SECS: u64 = 30;
const CLAMAV_PING_TIMEOUT_MS: u64 = 2_000;
const MAX_FILE_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// ClamAV daemon settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClamAvConfig {
    pub enabled: bool,
    /// Raw daemon addresses in priority order (`host:port`, `/path` or `unix:/path`)
    pub addresses: Vec<String>,
    pub timeout_secs: u64,
    pub ping_timeout_ms: u64,
}

impl ClamAvConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

impl Default for ClamAvConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addresses: vec![CLAMAV_DEFAULT_ADDRESS.to_string()],
            timeout_secs: CLAMAV_TIMEOUT_SECS,
            ping_timeout_ms: CLAMAV_PING_TIMEOUT_MS,
        }
    }
}

/// Upload limits and whitelist overrides
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadConfig {
    pub max_file_size_bytes: usize,
    /// Replaces the built-in extension whitelist when set
    pub allowed_extensions: Option<Vec<String>>,
    /// Replaces the built-in MIME whitelist when set
    pub allowed_content_types: Option<Vec<String>>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
            allowed_extensions: None,
            allowed_content_types: None,
        }
    }
}

/// Top-level ingestion configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestConfig {
    pub environment: String,
    /// Explicit, auditable opt-in to run without a malware scanner in production
    pub allow_noop_scanner: bool,
    pub clamav: ClamAvConfig,
    pub upload: UploadConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            allow_noop_scanner: false,
            clamav: ClamAvConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let environment = lookup("ENVIRONMENT")
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.environment);

        let addresses = match lookup("CLAMAV_ADDRESS") {
            Some(raw) => {
                let list = parse_list(&raw);
                if list.is_empty() {
                    return Err(ConfigError::Invalid {
                        key: "CLAMAV_ADDRESS",
                        value: raw,
                    });
                }
                list
            }
            None => defaults.clamav.addresses,
        };

        let clamav = ClamAvConfig {
            enabled: parse_bool(&lookup, "CLAMAV_ENABLED", defaults.clamav.enabled)?,
            addresses,
            timeout_secs: parse_number(&lookup, "CLAMAV_TIMEOUT_SECS", defaults.clamav.timeout_secs)?,
            ping_timeout_ms: parse_number(
                &lookup,
                "CLAMAV_PING_TIMEOUT_MS",
                defaults.clamav.ping_timeout_ms,
            )?,
        };

        let upload = UploadConfig {
            max_file_size_bytes: parse_number(
                &lookup,
                "UPLOAD_MAX_FILE_SIZE_BYTES",
                defaults.upload.max_file_size_bytes,
            )?,
            allowed_extensions: lookup("UPLOAD_ALLOWED_EXTENSIONS")
                .map(|v| parse_list(&v).into_iter().map(|e| e.to_lowercase()).collect()),
            allowed_content_types: lookup("UPLOAD_ALLOWED_CONTENT_TYPES")
                .map(|v| parse_list(&v).into_iter().map(|e| e.to_lowercase()).collect()),
        };

        Ok(Self {
            environment,
            allow_noop_scanner: parse_bool(&lookup, "ALLOW_NOOP_SCANNER", false)?,
            clamav,
            upload,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn parse_bool<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value }),
        },
    }
}

fn parse_number<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
