use bytes::Bytes;
use serde::Serialize;

use crate::error::RejectionReason;

/// A single upload awaiting a verdict.
///
/// All three fields come from the caller and none of them is trusted on its
/// own: the filename is client supplied, the MIME type is whatever the
/// caller's sniffer produced and the content is arbitrary bytes.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    pub filename: String,
    pub mime_type: String,
    pub content: Bytes,
}

impl UploadCandidate {
    pub fn new(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            content: content.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// Outcome of the content validator.
///
/// `extension` and `detected_mime` are filled in as far as validation got,
/// so a rejection still records what was inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    pub valid: bool,
    pub extension: String,
    pub detected_mime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectionReason>,
}

impl ValidationVerdict {
    pub fn accepted(extension: impl Into<String>, detected_mime: impl Into<String>) -> Self {
        Self {
            valid: true,
            extension: extension.into(),
            detected_mime: detected_mime.into(),
            reason: None,
        }
    }

    pub fn rejected(
        reason: RejectionReason,
        extension: impl Into<String>,
        detected_mime: impl Into<String>,
    ) -> Self {
        Self {
            valid: false,
            extension: extension.into(),
            detected_mime: detected_mime.into(),
            reason: Some(reason),
        }
    }
}
