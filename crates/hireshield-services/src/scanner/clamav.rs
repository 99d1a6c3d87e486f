//! ClamAV daemon client speaking the `INSTREAM` protocol.
//!
//! One scan is one connection:
//! 1. send `zINSTREAM\0`
//! 2. send the content as a single chunk: 4-byte big-endian length, then the bytes
//! 3. send a zero length (`00 00 00 00`) to end the stream
//! 4. read the reply: `stream: OK`, `stream: <name> FOUND` or `... ERROR`
//!
//! Connections are never pooled. Each scan and each liveness probe opens its
//! own socket under its own deadline, and the socket is dropped on every
//! exit path.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hireshield_core::{ClamAvConfig, ConfigError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{ScanError, ScanResult, Scanner};

pub const INSTREAM_COMMAND: &[u8] = b"zINSTREAM\0";
pub const VERSION_COMMAND: &[u8] = b"zVERSION\0";
pub const PING_COMMAND: &[u8] = b"PING\n";
pub const STREAM_TERMINATOR: [u8; 4] = [0, 0, 0, 0];
const PONG_PREFIX: &str = "PONG";
const CLEAN_RESPONSE: &str = "stream: OK";
const FOUND_SUFFIX: &str = " FOUND";
const ERROR_SUFFIX: &str = " ERROR";
const MAX_RESPONSE_LEN: usize = 1024;

const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Where the daemon listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClamdAddress {
    /// `host:port`
    Tcp(String),
    /// Local domain socket path
    Unix(PathBuf),
}

impl ClamdAddress {
    /// Parse `host:port`, `/path/to/clamd.sock` or `unix:/path/to/clamd.sock`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();

        if let Some(path) = raw.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(ConfigError::InvalidAddress(raw.to_string()));
            }
            return Ok(ClamdAddress::Unix(PathBuf::from(path)));
        }
        if raw.starts_with('/') {
            return Ok(ClamdAddress::Unix(PathBuf::from(raw)));
        }

        match raw.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(ClamdAddress::Tcp(raw.to_string()))
            }
            _ => Err(ConfigError::InvalidAddress(raw.to_string())),
        }
    }
}

impl fmt::Display for ClamdAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClamdAddress::Tcp(addr) => f.write_str(addr),
            ClamdAddress::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

/// Network malware scanner backed by a clamd daemon
#[derive(Debug, Clone)]
pub struct ClamdScanner {
    name: String,
    address: ClamdAddress,
    /// Deadline for the whole scan exchange (connect through reply)
    timeout: Duration,
    /// Deadline for liveness probes, independent of `timeout`
    ping_timeout: Duration,
}

impl ClamdScanner {
    pub fn new(address: ClamdAddress) -> Self {
        Self::with_timeout(address, DEFAULT_SCAN_TIMEOUT)
    }

    /// Create with a custom scan timeout (for large files or slow ClamAV instances).
    pub fn with_timeout(address: ClamdAddress, timeout: Duration) -> Self {
        Self {
            name: "clamav".to_string(),
            address,
            timeout,
            ping_timeout: DEFAULT_PING_TIMEOUT,
        }
    }

    pub fn from_config(raw_address: &str, config: &ClamAvConfig) -> Result<Self, ConfigError> {
        let address = ClamdAddress::parse(raw_address)?;
        Ok(Self::with_timeout(address, config.scan_timeout())
            .with_ping_timeout(config.ping_timeout()))
    }

    pub fn with_ping_timeout(mut self, ping_timeout: Duration) -> Self {
        self.ping_timeout = ping_timeout;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn address(&self) -> &ClamdAddress {
        &self.address
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Daemon version string, e.g. `ClamAV 1.3.1/27310/...`.
    pub async fn version(&self) -> Result<String, ScanError> {
        self.request(&[VERSION_COMMAND], self.ping_timeout).await
    }

    /// Open a connection, write `segments` in order and read the reply, all
    /// under a single deadline.
    async fn request(&self, segments: &[&[u8]], deadline: Duration) -> Result<String, ScanError> {
        let exchange = async {
            match &self.address {
                ClamdAddress::Tcp(addr) => {
                    let stream = TcpStream::connect(addr.as_str()).await.map_err(|source| {
                        ScanError::Connect {
                            address: self.address.to_string(),
                            source,
                        }
                    })?;
                    roundtrip(stream, segments).await
                }
                #[cfg(unix)]
                ClamdAddress::Unix(path) => {
                    let stream = tokio::net::UnixStream::connect(path).await.map_err(|source| {
                        ScanError::Connect {
                            address: self.address.to_string(),
                            source,
                        }
                    })?;
                    roundtrip(stream, segments).await
                }
                #[cfg(not(unix))]
                ClamdAddress::Unix(_) => {
                    Err(ScanError::UnsupportedTransport(self.address.to_string()))
                }
            }
        };

        match tokio::time::timeout(deadline, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ScanError::Timeout(deadline)),
        }
    }
}

#[async_trait]
impl Scanner for ClamdScanner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn available(&self) -> bool {
        match self.request(&[PING_COMMAND], self.ping_timeout).await {
            Ok(response) if response.starts_with(PONG_PREFIX) => true,
            Ok(response) => {
                tracing::debug!(
                    address = %self.address,
                    response = %response,
                    "ClamAV liveness probe got unexpected reply"
                );
                false
            }
            Err(e) => {
                tracing::debug!(address = %self.address, error = %e, "ClamAV liveness probe failed");
                false
            }
        }
    }

    async fn scan(&self, filename: &str, content: &[u8]) -> ScanResult {
        let start = Instant::now();
        tracing::debug!(
            scanner = %self.name,
            address = %self.address,
            filename = %filename,
            bytes = content.len(),
            "Starting ClamAV scan"
        );

        let outcome = match chunk_header(content.len()) {
            Ok(header) => {
                // Order matters: command, length prefix, payload, terminator
                let frame: [&[u8]; 4] = [INSTREAM_COMMAND, &header, content, &STREAM_TERMINATOR];
                self.request(&frame, self.timeout)
                    .await
                    .and_then(|response| parse_response(&response))
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(None) => {
                tracing::info!(
                    scanner = %self.name,
                    duration_ms = start.elapsed().as_millis(),
                    "File scan completed: clean"
                );
                ScanResult::clean(&self.name)
            }
            Ok(Some(threat)) => {
                tracing::warn!(
                    scanner = %self.name,
                    filename = %filename,
                    duration_ms = start.elapsed().as_millis(),
                    threat = %threat,
                    "File scan detected malware"
                );
                ScanResult::infected(&self.name, threat)
            }
            Err(e) => {
                tracing::error!(
                    scanner = %self.name,
                    address = %self.address,
                    duration_ms = start.elapsed().as_millis(),
                    error = %e,
                    "ClamAV scan failed"
                );
                ScanResult::failed(&self.name, e)
            }
        }
    }
}

/// Big-endian chunk length prefix. Content that does not fit in a u32
/// cannot be framed and is refused before any connection is made.
pub fn chunk_header(len: usize) -> Result<[u8; 4], ScanError> {
    u32::try_from(len)
        .map(u32::to_be_bytes)
        .map_err(|_| ScanError::PayloadTooLarge(len))
}

/// Classify a trimmed daemon reply.
///
/// `Ok(None)` is clean, `Ok(Some(name))` is a detection. Anything that is
/// neither the exact clean reply nor a detection is an error.
pub fn parse_response(response: &str) -> Result<Option<String>, ScanError> {
    if let Some(body) = response.strip_suffix(FOUND_SUFFIX) {
        let label = body.split_once(':').map(|(_, rest)| rest).unwrap_or(body);
        let threat = label.trim();
        let threat = if threat.is_empty() { "unknown" } else { threat };
        return Ok(Some(threat.to_string()));
    }

    if response.ends_with(ERROR_SUFFIX) {
        return Err(ScanError::Protocol(response.to_string()));
    }

    if response == CLEAN_RESPONSE {
        return Ok(None);
    }

    Err(ScanError::UnexpectedResponse(response.to_string()))
}

async fn roundtrip<S>(mut stream: S, segments: &[&[u8]]) -> Result<String, ScanError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = write_segments(&mut stream, segments).await {
        // clamd answers and hangs up mid-stream when StreamMaxLength is
        // exceeded; its reply is still readable after the failed write.
        return match read_response(&mut stream).await {
            Ok(reply) if is_final_reply(&reply) => Ok(reply),
            _ => Err(ScanError::Io(e)),
        };
    }

    read_response(&mut stream).await
}

async fn write_segments<S>(stream: &mut S, segments: &[&[u8]]) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    for segment in segments {
        stream.write_all(segment).await?;
    }
    stream.flush().await
}

/// A reply that settles the scan on its own. A clean reply does not qualify
/// when the stream was cut short.
fn is_final_reply(reply: &str) -> bool {
    reply.ends_with(FOUND_SUFFIX) || reply.ends_with(ERROR_SUFFIX)
}

/// Read at most [`MAX_RESPONSE_LEN`] bytes, stopping early at EOF or at the
/// first NUL/newline terminator.
async fn read_response<S>(stream: &mut S) -> Result<String, ScanError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; MAX_RESPONSE_LEN];
    let mut filled = 0;

    while filled < MAX_RESPONSE_LEN {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        let terminated = buf[filled..filled + n]
            .iter()
            .any(|b| *b == b'\0' || *b == b'\n');
        filled += n;
        if terminated {
            break;
        }
    }
    buf.truncate(filled);

    Ok(String::from_utf8_lossy(&buf)
        .trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .to_string())
}
