//! Configuration for the translation relay.
//!
//! All process-wide settings live in [`RelayConfig`], built once at startup
//! via [`RelayConfigBuilder`] and shared read-only by every invocation.

use crate::error::RelayError;
use crate::progress::ProgressCallback;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

/// Relay configuration.
///
/// # Example
/// ```rust
/// use tr_relay::RelayConfig;
///
/// let config = RelayConfig::builder()
///     .staging_dir("/var/tmp/tr-relay")
///     .ignore_channel(1_024)
///     .translate_timeout_secs(10)
///     .build()
///     .unwrap();
/// assert!(config.is_ignored_channel(1_024));
/// ```
#[derive(Clone)]
pub struct RelayConfig {
    /// Directory where image attachments are staged for OCR. Default:
    /// `<system temp>/tr-relay`. Created on demand; files in it never outlive
    /// one image's processing.
    pub staging_dir: PathBuf,

    /// Channels where inline triggers are ignored.
    pub ignored_channels: HashSet<u64>,

    /// The relay's own user id; its messages are never processed.
    pub bot_user_id: Option<u64>,

    /// Command prefix shown in usage messages. Default: `"!"`.
    pub command_prefix: String,

    /// Upper bound for one translation backend call, in seconds. Default: 15.
    pub translate_timeout_secs: u64,

    /// Upper bound for OCR on one image, in seconds. Default: 120.
    ///
    /// Vision models on large screenshots regularly need 20–40 s; two minutes
    /// leaves room for the engine's own retries.
    pub ocr_timeout_secs: u64,

    /// Timeout for downloading a URL attachment, in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Translation backend endpoint. Default: [`crate::backend::DEFAULT_ENDPOINT`].
    pub backend_endpoint: String,

    /// Vision provider used for OCR (e.g. "openai", "ollama").
    /// If None, auto-detected from the environment.
    pub ocr_provider_name: Option<String>,

    /// Vision model used for OCR. If None, uses the provider default.
    pub ocr_model: Option<String>,

    /// Retries per image on a transient OCR failure. Default: 2.
    pub max_retries: u32,

    /// Initial OCR retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Sampling temperature for OCR transcription. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the vision model may return per image. Default: 2048.
    pub max_tokens: usize,

    /// Custom OCR system prompt. If None, uses [`crate::prompts::OCR_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Per-image progress events for image commands.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            staging_dir: std::env::temp_dir().join("tr-relay"),
            ignored_channels: HashSet::new(),
            bot_user_id: None,
            command_prefix: "!".to_string(),
            translate_timeout_secs: 15,
            ocr_timeout_secs: 120,
            download_timeout_secs: 60,
            backend_endpoint: crate::backend::DEFAULT_ENDPOINT.to_string(),
            ocr_provider_name: None,
            ocr_model: None,
            max_retries: 2,
            retry_backoff_ms: 500,
            temperature: 0.0,
            max_tokens: 2048,
            system_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("staging_dir", &self.staging_dir)
            .field("ignored_channels", &self.ignored_channels)
            .field("bot_user_id", &self.bot_user_id)
            .field("command_prefix", &self.command_prefix)
            .field("translate_timeout_secs", &self.translate_timeout_secs)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("backend_endpoint", &self.backend_endpoint)
            .field("ocr_provider_name", &self.ocr_provider_name)
            .field("ocr_model", &self.ocr_model)
            .field("max_retries", &self.max_retries)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ImageProgressCallback>"),
            )
            .finish()
    }
}

impl RelayConfig {
    /// Create a new builder for `RelayConfig`.
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn is_ignored_channel(&self, channel_id: u64) -> bool {
        self.ignored_channels.contains(&channel_id)
    }

    pub fn is_self(&self, user_id: u64) -> bool {
        self.bot_user_id == Some(user_id)
    }
}

/// Builder for [`RelayConfig`].
#[derive(Debug)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = dir.into();
        self
    }

    pub fn ignore_channel(mut self, channel_id: u64) -> Self {
        self.config.ignored_channels.insert(channel_id);
        self
    }

    pub fn ignored_channels(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.config.ignored_channels.extend(ids);
        self
    }

    pub fn bot_user_id(mut self, id: u64) -> Self {
        self.config.bot_user_id = Some(id);
        self
    }

    pub fn command_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.command_prefix = prefix.into();
        self
    }

    pub fn translate_timeout_secs(mut self, secs: u64) -> Self {
        self.config.translate_timeout_secs = secs;
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn backend_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.backend_endpoint = url.into();
        self
    }

    pub fn ocr_provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.ocr_provider_name = Some(name.into());
        self
    }

    pub fn ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.ocr_model = Some(model.into());
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RelayConfig, RelayError> {
        let c = &self.config;
        if c.translate_timeout_secs == 0 {
            return Err(RelayError::InvalidConfig(
                "Translation timeout must be ≥ 1s".into(),
            ));
        }
        if c.ocr_timeout_secs == 0 {
            return Err(RelayError::InvalidConfig("OCR timeout must be ≥ 1s".into()));
        }
        if c.command_prefix.trim().is_empty() {
            return Err(RelayError::InvalidConfig(
                "Command prefix must not be empty".into(),
            ));
        }
        if !c.backend_endpoint.starts_with("http://") && !c.backend_endpoint.starts_with("https://")
        {
            return Err(RelayError::InvalidConfig(format!(
                "Backend endpoint must be an HTTP(S) URL, got '{}'",
                c.backend_endpoint
            )));
        }
        Ok(self.config)
    }
}

/// Parse a comma-separated channel id list such as `"123, 456"`.
///
/// Empty entries are ignored.
pub fn parse_channel_list(s: &str) -> Result<HashSet<u64>, RelayError> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>().map_err(|_| {
                RelayError::InvalidConfig(format!("Invalid channel id '{part}'"))
            })
        })
        .collect()
}
