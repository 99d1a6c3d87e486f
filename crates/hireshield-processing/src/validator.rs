use hireshield_core::{RejectionReason, UploadConfig, ValidationVerdict};

use crate::signatures::{
    is_known_extension, signatures_for, ALLOWED_EXTENSIONS, ALLOWED_MIME_TYPES,
    GENERIC_BINARY_EXEMPT_EXTENSIONS, GENERIC_BINARY_MIME, MIN_SIGNATURE_LEN,
};

/// Content validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("File has no extension: {0}")]
    NoExtension(String),

    #[error("Invalid file extension: {extension} (allowed: {allowed:?})")]
    ExtensionNotAllowed {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("File content does not match extension: {0}")]
    ContentMismatch(String),

    #[error("Invalid content type: {0}")]
    MimeNotAllowed(String),
}

impl ValidationError {
    pub fn reason(&self) -> RejectionReason {
        match self {
            ValidationError::NoExtension(_) => RejectionReason::NoExtension,
            ValidationError::ExtensionNotAllowed { .. } => RejectionReason::ExtensionNotAllowed,
            ValidationError::ContentMismatch(_) => RejectionReason::ContentMismatch,
            ValidationError::MimeNotAllowed(_) => RejectionReason::MimeNotAllowed,
        }
    }
}

/// Extension and MIME whitelists applied by [`ContentValidator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    allowed_extensions: Vec<String>,
    allowed_mime_types: Vec<String>,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            allowed_extensions: ALLOWED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            allowed_mime_types: ALLOWED_MIME_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ValidationPolicy {
    /// Replace the built-in whitelists.
    ///
    /// Extensions the signature table does not know are dropped: an
    /// extension without a table entry would have no magic bytes to check.
    pub fn with_overrides(
        extensions: Option<&[String]>,
        mime_types: Option<&[String]>,
    ) -> Self {
        let mut policy = Self::default();

        if let Some(extensions) = extensions {
            policy.allowed_extensions = extensions
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .filter(|e| {
                    let known = is_known_extension(e);
                    if !known {
                        tracing::warn!(
                            extension = %e,
                            "Ignoring allowed extension override without a magic-byte signature"
                        );
                    }
                    known
                })
                .collect();
        }

        if let Some(mime_types) = mime_types {
            policy.allowed_mime_types = mime_types
                .iter()
                .map(|m| normalize_mime_type(m))
                .filter(|m| !m.is_empty())
                .collect();
        }

        policy
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::with_overrides(
            config.allowed_extensions.as_deref(),
            config.allowed_content_types.as_deref(),
        )
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    pub fn allowed_mime_types(&self) -> &[String] {
        &self.allowed_mime_types
    }
}

/// Three-layer upload validator: extension whitelist, magic bytes, MIME whitelist.
///
/// None of the inputs is trusted on its own. A renamed file fails the
/// magic-byte layer, a correct signature under a disallowed sniffed type
/// fails the MIME layer. The validator holds no mutable state, so a verdict
/// depends only on the inputs and the policy.
#[derive(Debug, Clone, Default)]
pub struct ContentValidator {
    policy: ValidationPolicy,
}

impl ContentValidator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Run all three layers, stopping at the first failure.
    pub fn validate(
        &self,
        filename: &str,
        content: &[u8],
        detected_mime: &str,
    ) -> ValidationVerdict {
        let mime = normalize_mime_type(detected_mime);

        let extension = match self.validate_extension_only(filename) {
            Ok(extension) => extension,
            Err(e) => {
                let extension = extract_extension(filename).unwrap_or_default();
                return ValidationVerdict::rejected(e.reason(), extension, mime);
            }
        };

        let result = self
            .validate_magic_bytes(&extension, content)
            .and_then(|_| self.validate_mime_type(&extension, &mime));

        match result {
            Ok(()) => ValidationVerdict::accepted(extension, mime),
            Err(e) => {
                tracing::debug!(
                    filename = %filename,
                    extension = %extension,
                    mime = %mime,
                    error = %e,
                    "Upload failed content validation"
                );
                ValidationVerdict::rejected(e.reason(), extension, mime)
            }
        }
    }

    /// Extension extraction and whitelist only; cheap enough to run before
    /// the upload body has been read.
    pub fn validate_extension_only(&self, filename: &str) -> Result<String, ValidationError> {
        let extension = extract_extension(filename)
            .ok_or_else(|| ValidationError::NoExtension(filename.to_string()))?;

        if !self.policy.allowed_extensions.contains(&extension) {
            return Err(ValidationError::ExtensionNotAllowed {
                extension,
                allowed: self.policy.allowed_extensions.clone(),
            });
        }

        Ok(extension)
    }

    /// Compare the leading bytes against the extension's registered signatures.
    fn validate_magic_bytes(&self, extension: &str, content: &[u8]) -> Result<(), ValidationError> {
        let signatures = match signatures_for(extension) {
            Some(signatures) => signatures,
            None => return Err(ValidationError::ContentMismatch(extension.to_string())),
        };

        // Plain text has nothing to compare
        if signatures.is_empty() {
            return Ok(());
        }

        if content.len() < MIN_SIGNATURE_LEN
            || !signatures.iter().any(|sig| content.starts_with(sig))
        {
            return Err(ValidationError::ContentMismatch(extension.to_string()));
        }

        Ok(())
    }

    fn validate_mime_type(&self, extension: &str, mime: &str) -> Result<(), ValidationError> {
        if mime == GENERIC_BINARY_MIME {
            // Office formats are often sniffed as generic binary; their
            // signature has already been verified above.
            if GENERIC_BINARY_EXEMPT_EXTENSIONS.contains(&extension) {
                return Ok(());
            }
            return Err(ValidationError::MimeNotAllowed(mime.to_string()));
        }

        if !self.policy.allowed_mime_types.iter().any(|m| m == mime) {
            return Err(ValidationError::MimeNotAllowed(mime.to_string()));
        }

        Ok(())
    }
}

/// Lower-cased extension of the final path component.
///
/// Returns `None` when there is no dot, when the dot is the last character,
/// or when the name is a bare dotfile such as `.pdf`.
///
/// The dotfile case is deliberately stricter than a plain "text after the
/// last dot" rule, which would read `.pdf` as a PDF with an empty stem.
pub fn extract_extension(filename: &str) -> Option<String> {
    let name = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);
    let (stem, extension) = name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_lowercase())
}

/// Normalize MIME type by stripping parameters (e.g. "text/plain; charset=utf-8" -> "text/plain").
pub fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_lowercase()
}
