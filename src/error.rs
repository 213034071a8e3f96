//! Error types for the tr-relay library.
//!
//! Three layers of failure, each handled at a different boundary:
//!
//! * [`RelayError`]: **Fatal**: the relay cannot be constructed at all
//!   (invalid configuration, OCR provider not configured, HTTP client could
//!   not be built). Returned only from setup functions.
//!
//! * [`TranslateError`]: **Per request**: the user asked for a language we
//!   do not know ([`UnknownLanguageError`]) or the translation backend failed
//!   ([`BackendError`]). Caught at the pipeline-mode boundary and turned into
//!   a plain-text reply; never propagated to the host process.
//!
//! * [`ImageError`]: **Per image**: one attachment of an image command failed
//!   (download, staging, OCR, translation). Stored inside
//!   [`crate::output::ImageOutcome`] so the remaining images of the batch
//!   still produce their sections.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal setup errors.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The vision provider used for OCR is not initialised (missing API key etc.).
    #[error("OCR provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The staging directory could not be created.
    #[error("Failed to prepare staging directory '{path}': {source}")]
    StagingDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which side of a translation an unknown language token was supplied for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LanguageRole {
    Source,
    Destination,
}

impl fmt::Display for LanguageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageRole::Source => f.write_str("source"),
            LanguageRole::Destination => f.write_str("destination"),
        }
    }
}

/// The user supplied a language token that is not in the supported table.
///
/// Always recoverable; surfaced to the user as
/// [`UnknownLanguageError::user_message`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {role} language '{token}'")]
pub struct UnknownLanguageError {
    pub token: String,
    pub role: LanguageRole,
}

impl UnknownLanguageError {
    pub fn new(token: impl Into<String>, role: LanguageRole) -> Self {
        Self {
            token: token.into(),
            role,
        }
    }

    /// Reply text shown to the requester.
    pub fn user_message(&self) -> &'static str {
        match self.role {
            LanguageRole::Source => "Source language invalid. Check typos.",
            LanguageRole::Destination => "Destination language invalid. Check typos.",
        }
    }
}

/// Translation backend failures.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Backend could not be reached (DNS, TLS, connection reset …).
    #[error("translation backend unavailable: {0}")]
    Unavailable(String),

    /// Backend answered with a non-success HTTP status.
    #[error("translation backend returned HTTP {status}")]
    HttpStatus { status: u16 },

    /// Backend answered but the body could not be understood.
    #[error("malformed translation response: {0}")]
    Malformed(String),

    /// Nothing to translate.
    #[error("refusing to translate empty text")]
    EmptyInput,

    /// No answer within the configured bound.
    #[error("translation backend did not answer within {secs}s")]
    Timeout { secs: u64 },
}

/// Error returned by [`crate::client::TranslationClient::translate`].
#[derive(Debug, Clone, Error)]
pub enum TranslateError {
    #[error(transparent)]
    UnknownLanguage(#[from] UnknownLanguageError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl TranslateError {
    /// Plain-text reply for the requester; never leaks internal detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            TranslateError::UnknownLanguage(e) => e.user_message(),
            TranslateError::Backend(BackendError::EmptyInput) => {
                "There is no text to translate in that message."
            }
            TranslateError::Backend(BackendError::Timeout { .. }) => {
                "The translation service took too long to answer. Try again later."
            }
            TranslateError::Backend(_) => {
                "The translation service is unavailable right now. Try again later."
            }
        }
    }
}

/// A non-fatal error for a single image of an image command.
///
/// Stored alongside [`crate::output::ImageOutcome`] when an image fails.
/// The batch continues with the next attachment.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum ImageError {
    /// Attachment bytes could not be retrieved.
    #[error("Image {image}: download failed: {detail}")]
    Download { image: usize, detail: String },

    /// Writing the staging file failed.
    #[error("Image {image}: staging failed: {detail}")]
    Staging { image: usize, detail: String },

    /// The OCR engine failed on this image.
    #[error("Image {image}: OCR failed: {detail}")]
    Ocr { image: usize, detail: String },

    /// OCR did not finish within the configured bound.
    #[error("Image {image}: OCR timed out after {secs}s")]
    Timeout { image: usize, secs: u64 },

    /// Recognised text could not be translated.
    #[error("Image {image}: translation failed: {detail}")]
    Translation { image: usize, detail: String },
}

impl ImageError {
    /// 1-based index of the image this error belongs to.
    pub fn image(&self) -> usize {
        match self {
            ImageError::Download { image, .. }
            | ImageError::Staging { image, .. }
            | ImageError::Ocr { image, .. }
            | ImageError::Timeout { image, .. }
            | ImageError::Translation { image, .. } => *image,
        }
    }

    /// Short placeholder rendered in the failed image's section.
    pub fn user_message(&self) -> &'static str {
        match self {
            ImageError::Download { .. } => "Could not download this image.",
            ImageError::Staging { .. } => "Could not prepare this image for text recognition.",
            ImageError::Ocr { .. } | ImageError::Timeout { .. } => {
                "Text recognition failed for this image."
            }
            ImageError::Translation { .. } => "Translation failed for this image.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_destination_user_message() {
        let e = UnknownLanguageError::new("klingon", LanguageRole::Destination);
        assert_eq!(e.user_message(), "Destination language invalid. Check typos.");
        assert!(e.to_string().contains("klingon"));
        assert!(e.to_string().contains("destination"));
    }

    #[test]
    fn unknown_source_user_message() {
        let e = UnknownLanguageError::new("elvish", LanguageRole::Source);
        assert_eq!(e.user_message(), "Source language invalid. Check typos.");
    }

    #[test]
    fn backend_message_does_not_leak_detail() {
        let e = TranslateError::from(BackendError::Unavailable("tcp reset by 10.0.0.3".into()));
        assert!(!e.user_message().contains("10.0.0.3"));
    }

    #[test]
    fn timeout_display() {
        let e = BackendError::Timeout { secs: 15 };
        assert!(e.to_string().contains("15s"));
    }

    #[test]
    fn image_error_carries_index() {
        let e = ImageError::Ocr {
            image: 2,
            detail: "model crashed".into(),
        };
        assert_eq!(e.image(), 2);
        assert!(e.to_string().starts_with("Image 2"));
        assert_eq!(e.user_message(), "Text recognition failed for this image.");
    }
}
