//! OCR: recognise the text lines on a staged image.
//!
//! [`OcrExtractor`] is what the relay talks to. It bounds every engine call by
//! the configured timeout and maps failures into per-image
//! [`ImageError`]s. The engine itself sits behind the [`OcrEngine`] trait;
//! the production engine is [`VisionOcrEngine`], which asks a vision LLM to
//! transcribe the image.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 from vision APIs are transient. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`) with a 500 ms base and 2 retries waits
//! 500 ms → 1 s before giving up on an image.

use crate::config::RelayConfig;
use crate::error::{ImageError, RelayError};
use crate::output::{ImageTextBlock, RecognizedLine};
use crate::pipeline::{encode, postprocess};
use crate::prompts::OCR_SYSTEM_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Default vision model when a provider is named without a model.
pub const DEFAULT_OCR_MODEL: &str = "gpt-4.1-nano";

/// Something that can read the text off an image file.
///
/// Lines come back top-to-bottom. An image without text yields an empty
/// vector, not an error.
pub trait OcrEngine: Send + Sync {
    fn recognize<'a>(
        &'a self,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<RecognizedLine>, String>>;
}

// ── Vision LLM engine ────────────────────────────────────────────────────────

/// OCR backed by a vision-capable LLM provider.
pub struct VisionOcrEngine {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl VisionOcrEngine {
    /// Wrap an already configured provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &RelayConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| OCR_SYSTEM_PROMPT.to_string()),
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Resolve the provider from the configuration and the environment.
    ///
    /// 1. `ocr_provider_name` (+ `ocr_model`, default [`DEFAULT_OCR_MODEL`])
    /// 2. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
    /// 3. `OPENAI_API_KEY` present → OpenAI
    /// 4. Whatever [`ProviderFactory::from_env`] detects
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    async fn transcribe(&self, path: &Path) -> Result<Vec<RecognizedLine>, String> {
        let start = Instant::now();

        let owned: PathBuf = path.to_path_buf();
        let image_data = tokio::task::spawn_blocking(move || encode::encode_file(&owned))
            .await
            .map_err(|e| format!("encoder task panicked: {e}"))?
            .map_err(|e| format!("cannot decode image: {e}"))?;

        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user_with_images("", vec![image_data]),
        ];

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "OCR {}: retry {}/{} after {}ms",
                    path.display(),
                    attempt,
                    self.max_retries,
                    backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&self.options)).await {
                Ok(response) => {
                    debug!(
                        "OCR {}: {} input tokens, {} output tokens, {:?}",
                        path.display(),
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(postprocess::clean_ocr_output(&response.content)
                        .into_iter()
                        .map(RecognizedLine::new)
                        .collect());
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    warn!("OCR {}: attempt {} failed: {}", path.display(), attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| "Unknown error".to_string()))
    }
}

impl OcrEngine for VisionOcrEngine {
    fn recognize<'a>(
        &'a self,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<RecognizedLine>, String>> {
        Box::pin(self.transcribe(path))
    }
}

fn build_options(config: &RelayConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, RelayError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        RelayError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn resolve_provider(config: &RelayConfig) -> Result<Arc<dyn LLMProvider>, RelayError> {
    if let Some(ref name) = config.ocr_provider_name {
        let model = config.ocr_model.as_deref().unwrap_or(DEFAULT_OCR_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.ocr_model.as_deref().unwrap_or(DEFAULT_OCR_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| RelayError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

// ── Extractor ────────────────────────────────────────────────────────────────

/// Bounded OCR over staged image files.
#[derive(Clone)]
pub struct OcrExtractor {
    engine: Arc<dyn OcrEngine>,
    timeout: Duration,
}

impl OcrExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>, timeout_secs: u64) -> Self {
        Self {
            engine,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Recognise the text of image number `image` (1-based) at `path`.
    pub async fn extract_one(
        &self,
        image: usize,
        path: &Path,
    ) -> Result<ImageTextBlock, ImageError> {
        match timeout(self.timeout, self.engine.recognize(path)).await {
            Ok(Ok(lines)) => {
                debug!("Image {}: recognised {} lines", image, lines.len());
                Ok(ImageTextBlock::from_recognized(lines))
            }
            Ok(Err(detail)) => Err(ImageError::Ocr { image, detail }),
            Err(_) => Err(ImageError::Timeout {
                image,
                secs: self.timeout.as_secs(),
            }),
        }
    }

    /// Recognise several images in order, one result per path.
    ///
    /// A failure on one path never prevents the others from being read.
    pub async fn extract(&self, paths: &[PathBuf]) -> Vec<Result<ImageTextBlock, ImageError>> {
        let mut results = Vec::with_capacity(paths.len());
        for (idx, path) in paths.iter().enumerate() {
            results.push(self.extract_one(idx + 1, path).await);
        }
        results
    }
}
