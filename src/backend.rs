//! HTTP translation backend speaking the public Google Translate `gtx`
//! endpoint.
//!
//! Response shape (only the parts we read):
//!
//! ```text
//! [
//!   [ ["Hello ", "Hallo ", …], ["world", "Welt", …] ],   // segments
//!   null,
//!   "de",                                                 // detected source
//!   …
//! ]
//! ```
//!
//! Long inputs are split by the service into several segments; the translated
//! text is the concatenation of every segment's first element.

use crate::client::{BackendTranslation, TranslationBackend};
use crate::error::{BackendError, RelayError};
use crate::language::LanguageCode;
use futures::future::BoxFuture;
use std::time::Duration;
use tracing::{debug, warn};

/// Default public endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Google Translate over HTTPS.
#[derive(Debug, Clone)]
pub struct GoogleBackend {
    client: reqwest::Client,
    endpoint: String,
    request_timeout: Duration,
}

impl GoogleBackend {
    /// Build a backend for `endpoint`.
    ///
    /// `request_timeout` bounds the HTTP exchange itself; the
    /// [`crate::client::TranslationClient`] applies its own overall bound on top.
    pub fn new(
        endpoint: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RelayError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            request_timeout,
        })
    }

    /// Classify a transport failure; an expired request bound is a timeout.
    fn transport_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout {
                secs: self.request_timeout.as_secs(),
            }
        } else {
            BackendError::Unavailable(e.to_string())
        }
    }

    async fn call(
        &self,
        text: &str,
        source: Option<&LanguageCode>,
        dest: &LanguageCode,
    ) -> Result<BackendTranslation, BackendError> {
        let sl = source.map(LanguageCode::as_str).unwrap_or("auto");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", sl),
                ("tl", dest.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Translation backend answered HTTP {}", status);
            return Err(BackendError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;
        let translated = parse_response(&body)?;
        debug!(
            "Backend translated {} chars from {}",
            text.len(),
            translated.source
        );
        Ok(translated)
    }
}

impl TranslationBackend for GoogleBackend {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        source: Option<&'a LanguageCode>,
        dest: &'a LanguageCode,
    ) -> BoxFuture<'a, Result<BackendTranslation, BackendError>> {
        Box::pin(self.call(text, source, dest))
    }
}

/// Extract translated text and detected source from a `gtx` response body.
pub fn parse_response(body: &str) -> Result<BackendTranslation, BackendError> {
    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|e| BackendError::Malformed(e.to_string()))?;

    let segments = json
        .get(0)
        .and_then(|v| v.as_array())
        .ok_or_else(|| BackendError::Malformed("missing segment array at index 0".into()))?;

    let text: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(|v| v.as_str()))
        .collect();

    let source = json
        .get(2)
        .and_then(|v| v.as_str())
        .ok_or_else(|| BackendError::Malformed("missing detected language at index 2".into()))?;

    Ok(BackendTranslation {
        text,
        source: LanguageCode::from_backend(source),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multi_segment_response() {
        let body = r#"[[["Hello ","Hallo ",null,null,10],["world","Welt",null,null,10]],null,"de",null,null,null,1]"#;
        let t = parse_response(body).unwrap();
        assert_eq!(t.text, "Hello world");
        assert_eq!(t.source.as_str(), "de");
    }

    #[test]
    fn detected_code_is_canonicalised() {
        let body = r#"[[["Hello","你好",null,null,1]],null,"zh-CN"]"#;
        assert_eq!(parse_response(body).unwrap().source.as_str(), "zh-cn");
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            parse_response("<html>rate limited</html>"),
            Err(BackendError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_missing_segments() {
        assert!(matches!(
            parse_response(r#"[null,null,"de"]"#),
            Err(BackendError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_missing_source() {
        assert!(matches!(
            parse_response(r#"[[["Hi","Hoi"]]]"#),
            Err(BackendError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn silent_server_maps_to_timeout() {
        // Bound but never accepted: the handshake completes, no answer follows.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/translate_a/single", listener.local_addr().unwrap());
        let backend = GoogleBackend::new(endpoint, Duration::from_secs(1)).unwrap();

        let err = backend
            .translate("hallo", None, &LanguageCode::english())
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Timeout { secs: 1 }), "got {err:?}");
        drop(listener);
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let backend =
            GoogleBackend::new(format!("http://{addr}/"), Duration::from_secs(5)).unwrap();

        let err = backend
            .translate("hallo", None, &LanguageCode::english())
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Unavailable(_)), "got {err:?}");
    }
}
