use std::path::Path;

use anyhow::Context;
use hireshield_core::UploadCandidate;

const TEXT_PLAIN: &str = "text/plain";
const OCTET_STREAM: &str = "application/octet-stream";

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Guess the content type from the leading bytes, the way an upload
/// handler's sniffer would. Unrecognised UTF-8 is plain text.
pub fn sniff_mime(content: &[u8]) -> String {
    match infer::get(content) {
        Some(kind) => kind.mime_type().to_string(),
        None if std::str::from_utf8(content).is_ok() => TEXT_PLAIN.to_string(),
        None => OCTET_STREAM.to_string(),
    }
}

/// Load a local file as an upload. `mime` overrides sniffing.
pub async fn read_candidate(path: &Path, mime: Option<String>) -> anyhow::Result<UploadCandidate> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("Not a file path: {}", path.display()))?;

    let mime_type = mime.unwrap_or_else(|| sniff_mime(&content));
    tracing::debug!(filename = %filename, mime = %mime_type, bytes = content.len(), "Loaded upload");

    Ok(UploadCandidate::new(filename, mime_type, content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_known_signatures() {
        assert_eq!(sniff_mime(b"%PDF-1.7\n"), "application/pdf");
        assert_eq!(
            sniff_mime(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            "image/png"
        );
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]), "image/jpeg");
    }

    #[test]
    fn sniff_falls_back_on_text_or_binary() {
        assert_eq!(sniff_mime(b"Jane Doe\nSenior Engineer\n"), "text/plain");
        assert_eq!(sniff_mime(b""), "text/plain");
        assert_eq!(sniff_mime(&[0x00, 0xC3, 0x28, 0x00]), "application/octet-stream");
    }

    #[tokio::test]
    async fn read_candidate_uses_file_name_and_sniffs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover-letter.pdf");
        std::fs::write(&path, b"%PDF-1.4\n").unwrap();

        let candidate = read_candidate(&path, None).await.unwrap();
        assert_eq!(candidate.filename, "cover-letter.pdf");
        assert_eq!(candidate.mime_type, "application/pdf");
        assert_eq!(candidate.size(), 9);

        let candidate = read_candidate(&path, Some("text/plain".to_string()))
            .await
            .unwrap();
        assert_eq!(candidate.mime_type, "text/plain");
    }

    #[tokio::test]
    async fn read_candidate_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_candidate(&dir.path().join("nope.pdf"), None).await.is_err());
    }
}
