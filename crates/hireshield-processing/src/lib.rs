//! Hireshield content validation
//!
//! Pure, synchronous checks that decide whether an upload's name, leading
//! bytes and sniffed MIME type agree with each other and with the whitelists.
//! Nothing here performs I/O, so every check can run before the upload is
//! handed to a malware scanner.

pub mod signatures;
pub mod validator;

pub use signatures::{SignatureEntry, ALLOWED_EXTENSIONS, ALLOWED_MIME_TYPES, GENERIC_BINARY_MIME};
pub use validator::{
    extract_extension, normalize_mime_type, ContentValidator, ValidationError, ValidationPolicy,
};
