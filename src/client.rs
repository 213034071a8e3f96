//! TranslationClient: defaulting, validation and bounded waits around a
//! pluggable [`TranslationBackend`].
//!
//! The backend only speaks canonical [`LanguageCode`]s. The client is where
//! user tokens are resolved, where the destination defaults to English, and
//! where every outbound call is wrapped in a timeout so an unresponsive
//! backend cannot stall the handling task forever.

use crate::error::{BackendError, LanguageRole, TranslateError};
use crate::language::{self, LanguageCode};
use crate::output::{TranslationRequest, TranslationResult};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// What a backend returns for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTranslation {
    pub text: String,
    /// Language the backend used or detected.
    pub source: LanguageCode,
}

/// A translation service.
///
/// `source = None` asks the backend to auto-detect. Implementations must be
/// cheap to share (`Arc<dyn TranslationBackend>`).
pub trait TranslationBackend: Send + Sync {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        source: Option<&'a LanguageCode>,
        dest: &'a LanguageCode,
    ) -> BoxFuture<'a, Result<BackendTranslation, BackendError>>;
}

/// Injected translation service used by every pipeline mode.
#[derive(Clone)]
pub struct TranslationClient {
    backend: Arc<dyn TranslationBackend>,
    timeout: Duration,
}

impl std::fmt::Debug for TranslationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationClient")
            .field("backend", &"<dyn TranslationBackend>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TranslationClient {
    pub fn new(backend: Arc<dyn TranslationBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Translate `text` from `source` (auto when `None`) to `dest`
    /// (English when `None`).
    ///
    /// Language tokens may be names or codes in any casing.
    ///
    /// # Errors
    /// * [`TranslateError::UnknownLanguage`] for an unrecognised token; the
    ///   backend is not called.
    /// * [`TranslateError::Backend`] for empty text, backend failure or
    ///   timeout.
    pub async fn translate(
        &self,
        text: &str,
        source: Option<&str>,
        dest: Option<&str>,
    ) -> Result<TranslationResult, TranslateError> {
        let request = build_request(text, source, dest, 0)?;
        self.translate_request(&request).await
    }

    /// Translate a request whose languages are already resolved.
    pub async fn translate_request(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationResult, TranslateError> {
        if request.text.trim().is_empty() {
            return Err(BackendError::EmptyInput.into());
        }

        debug!(
            "Translating {} chars {} → {}",
            request.text.len(),
            request
                .source_language
                .as_ref()
                .map(LanguageCode::as_str)
                .unwrap_or("auto"),
            request.dest_language
        );

        let call = self.backend.translate(
            &request.text,
            request.source_language.as_ref(),
            &request.dest_language,
        );
        let translated = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| BackendError::Timeout {
                secs: self.timeout.as_secs(),
            })??;

        Ok(TranslationResult {
            original_text: request.text.clone(),
            translated_text: translated.text,
            detected_source_language: translated.source,
        })
    }
}

/// Resolve user tokens into a [`TranslationRequest`].
///
/// The destination defaults to English; the source stays `None` for
/// auto-detection.
pub fn build_request(
    text: &str,
    source: Option<&str>,
    dest: Option<&str>,
    requester: u64,
) -> Result<TranslationRequest, TranslateError> {
    let source_language = source
        .map(|s| language::resolve(s, LanguageRole::Source))
        .transpose()?;
    let dest_language = match dest {
        Some(d) => language::resolve(d, LanguageRole::Destination)?,
        None => LanguageCode::english(),
    };
    Ok(TranslationRequest {
        text: text.to_string(),
        source_language,
        dest_language,
        requester,
    })
}
