//! Static magic-byte table for every extension the platform accepts.

/// Expected leading bytes for one allowed extension.
///
/// An empty `signatures` slice means the format has no binary signature to
/// verify (plain text).
#[derive(Debug, Clone, Copy)]
pub struct SignatureEntry {
    pub extension: &'static str,
    pub signatures: &'static [&'static [u8]],
}

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const GIF87A: &[u8] = b"GIF87a";
const GIF89A: &[u8] = b"GIF89a";
const RIFF: &[u8] = b"RIFF";
const PDF: &[u8] = b"%PDF";
// OLE2 compound document (legacy .doc)
const OLE2: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
// ZIP local file header (OOXML .docx)
const ZIP: &[u8] = &[0x50, 0x4B, 0x03, 0x04];

pub static SIGNATURE_TABLE: &[SignatureEntry] = &[
    SignatureEntry {
        extension: "jpg",
        signatures: &[JPEG],
    },
    SignatureEntry {
        extension: "jpeg",
        signatures: &[JPEG],
    },
    SignatureEntry {
        extension: "png",
        signatures: &[PNG],
    },
    SignatureEntry {
        extension: "gif",
        signatures: &[GIF87A, GIF89A],
    },
    SignatureEntry {
        extension: "webp",
        signatures: &[RIFF],
    },
    SignatureEntry {
        extension: "pdf",
        signatures: &[PDF],
    },
    SignatureEntry {
        extension: "doc",
        signatures: &[OLE2],
    },
    SignatureEntry {
        extension: "docx",
        signatures: &[ZIP],
    },
    SignatureEntry {
        extension: "txt",
        signatures: &[],
    },
];

pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "pdf", "doc", "docx", "txt",
];

pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    // DOCX is a ZIP container and is often sniffed as such
    "application/zip",
];

/// The sniffer's "unknown binary" answer.
pub const GENERIC_BINARY_MIME: &str = "application/octet-stream";

/// Extensions whose magic bytes are verified but that sniffers routinely
/// report as generic binary.
pub const GENERIC_BINARY_EXEMPT_EXTENSIONS: &[&str] = &["doc", "docx"];

/// Minimum content length before any signature is compared.
pub const MIN_SIGNATURE_LEN: usize = 4;

/// Registered signatures for `extension` (lower-case), or `None` when the
/// table does not know the extension at all.
pub fn signatures_for(extension: &str) -> Option<&'static [&'static [u8]]> {
    SIGNATURE_TABLE
        .iter()
        .find(|entry| entry.extension == extension)
        .map(|entry| entry.signatures)
}

pub fn is_known_extension(extension: &str) -> bool {
    signatures_for(extension).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_allowed_extension_has_an_entry() {
        for ext in ALLOWED_EXTENSIONS {
            assert!(is_known_extension(ext), "missing signature entry for {}", ext);
        }
        assert_eq!(SIGNATURE_TABLE.len(), ALLOWED_EXTENSIONS.len());
    }

    #[test]
    fn test_only_txt_has_no_signature() {
        for entry in SIGNATURE_TABLE {
            if entry.extension == "txt" {
                assert!(entry.signatures.is_empty());
            } else {
                assert!(!entry.signatures.is_empty(), "{}", entry.extension);
            }
        }
    }

    #[test]
    fn test_unknown_extension() {
        assert!(signatures_for("exe").is_none());
        assert!(signatures_for("PDF").is_none());
    }
}
