//! TranslationPipeline: the relay's entry points.
//!
//! One [`Event`] in, at most one [`Reply`] out. Each event is handled as an
//! independent invocation; the only state shared between invocations is the
//! read-only [`RelayConfig`] and the injected services.
//!
//! ## Modes
//!
//! | Event | Input text | Reply goes to |
//! |-------|-----------|---------------|
//! | inline trigger (`translate X to Y`) | parsed from the message | the message |
//! | `tr [src]` | referenced message | the referenced message |
//! | context menu | target message | the invoker only |
//! | `trimg [src]` | OCR of the referenced message's images | the referenced message |
//! | structured `translate` | command argument | the interaction |
//!
//! Every failure is turned into a plain-text reply plus a log line here; no
//! error leaves this module.

use crate::backend::GoogleBackend;
use crate::client::TranslationClient;
use crate::config::RelayConfig;
use crate::error::{BackendError, ImageError, LanguageRole, RelayError, TranslateError};
use crate::event::{Attachment, ChatMessage, Command, Event, Reply, Responder, UserRef};
use crate::language::{self, LanguageCode, SupportedLanguage};
use crate::output::{
    ImageBatchOutput, ImageBatchStats, ImageOutcome, ImageTranslationResult, TranslationRequest,
};
use crate::pipeline::input;
use crate::pipeline::ocr::{OcrExtractor, VisionOcrEngine};
use crate::trigger::{self, TriggerMatch};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Reply sent when `trimg` finds nothing to read.
pub const NO_IMAGES_MESSAGE: &str = "No images found on the referenced message.";

/// Orchestrates trigger parsing, OCR and translation for every entry mode.
#[derive(Clone)]
pub struct TranslationPipeline {
    config: RelayConfig,
    client: TranslationClient,
    ocr: OcrExtractor,
}

impl TranslationPipeline {
    pub fn new(config: RelayConfig, client: TranslationClient, ocr: OcrExtractor) -> Self {
        Self {
            config,
            client,
            ocr,
        }
    }

    /// Build the production pipeline: HTTP translation backend plus vision
    /// OCR resolved from the configuration and environment.
    ///
    /// The staging directory is created here so an unusable path fails at
    /// setup with [`RelayError::StagingDir`].
    pub fn from_config(config: RelayConfig) -> Result<Self, RelayError> {
        input::prepare_staging_dir(&config.staging_dir)?;
        let translate_timeout = Duration::from_secs(config.translate_timeout_secs);
        let backend = GoogleBackend::new(config.backend_endpoint.clone(), translate_timeout)?;
        let client = TranslationClient::new(Arc::new(backend), translate_timeout);
        let engine = VisionOcrEngine::from_config(&config)?;
        let ocr = OcrExtractor::new(Arc::new(engine), config.ocr_timeout_secs);
        Ok(Self::new(config, client, ocr))
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Turn a raw chat message into a command event when it starts with the
    /// command prefix, otherwise into a plain message event.
    pub fn classify(&self, message: ChatMessage) -> Event {
        match Command::parse(&message.content, &self.config.command_prefix) {
            Some(command) => Event::Command {
                invocation: message,
                command,
            },
            None => Event::Message(message),
        }
    }

    /// Handle one event and send the reply, if any, through `responder`.
    ///
    /// Delivery failures are logged and swallowed.
    pub async fn dispatch(&self, event: Event, responder: &dyn Responder) {
        if let Some(reply) = self.handle(event).await {
            if let Err(e) = responder.send(&reply).await {
                warn!("Failed to deliver reply: {}", e);
            }
        }
    }

    /// Handle one event and return the reply to send.
    ///
    /// `None` means the event is silently ignored.
    pub async fn handle(&self, event: Event) -> Option<Reply> {
        match event {
            Event::Message(message) => self.on_message(&message).await,
            Event::Command {
                invocation,
                command,
            } => {
                if self.config.is_self(invocation.author.id) {
                    return None;
                }
                debug!("{} invoked by {}", command.name(), invocation.author.name);
                Some(match command {
                    Command::Tr { source } => self.on_tr(&invocation, source.as_deref()).await,
                    Command::TrImg { source } => {
                        self.on_trimg(&invocation, source.as_deref()).await
                    }
                })
            }
            Event::ContextMenu { invoker, target } => {
                Some(self.on_context_menu(&invoker, &target).await)
            }
            Event::Translate {
                invoker,
                text,
                src,
                dst,
            } => Some(self.on_translate(&invoker, &text, src, dst).await),
        }
    }

    // ── Inline trigger ───────────────────────────────────────────────────

    /// Inline "translate X to Y" trigger. Non-matching messages, the relay's
    /// own messages and ignored channels produce no reply and no log.
    pub async fn on_message(&self, message: &ChatMessage) -> Option<Reply> {
        if self.config.is_self(message.author.id)
            || self.config.is_ignored_channel(message.channel_id)
        {
            return None;
        }

        let (text, lang) = match trigger::parse(&message.content) {
            TriggerMatch::Matched { text, language } => (text, language),
            TriggerMatch::NoMatch => return None,
        };

        let name = &message.author.name;
        match self.client.translate(&text, None, Some(&lang)).await {
            Ok(result) => {
                info!("Translated text for {}", name);
                Some(Reply::to_invocation(result.translated_text))
            }
            Err(TranslateError::UnknownLanguage(e)) => {
                error!("Failed to translate \"{}\" to {} for {}", text, lang, name);
                debug!("{}", e);
                Some(Reply::to_invocation(e.user_message()))
            }
            Err(e) => {
                log_translate_failure(&e, &text, name);
                Some(Reply::to_invocation(e.user_message()))
            }
        }
    }

    // ── Reply command ────────────────────────────────────────────────────

    /// `tr [source]`: translate the referenced message into English and reply
    /// to that message.
    pub async fn on_tr(&self, invocation: &ChatMessage, source: Option<&str>) -> Reply {
        let Some(referenced) = invocation.reference.as_deref() else {
            return self.usage("tr");
        };

        let name = &invocation.author.name;
        match self
            .client
            .translate(&referenced.content, source, None)
            .await
        {
            Ok(result) => {
                info!("Sent translation to {}", name);
                Reply::to_referenced(format!(
                    "Translated from ({}): {}",
                    result.source_display_name(),
                    result.translated_text
                ))
            }
            Err(e) => {
                log_translate_failure(&e, &referenced.content, name);
                Reply::to_invocation(e.user_message())
            }
        }
    }

    // ── Context menu ─────────────────────────────────────────────────────

    /// "Translate Message" action: private reply with original text, detected
    /// language and translation.
    pub async fn on_context_menu(&self, invoker: &UserRef, target: &ChatMessage) -> Reply {
        match self.client.translate(&target.content, None, None).await {
            Ok(result) => {
                info!(
                    "Sent translation to {} for message \"{}\" by {}",
                    invoker.name, target.content, target.author.name
                );
                Reply::ephemeral(format!(
                    "Translation for \"{}\" from ({}):\n\n{}",
                    target.content,
                    result.source_display_name(),
                    result.translated_text
                ))
            }
            Err(e) => {
                log_translate_failure(&e, &target.content, &invoker.name);
                Reply::ephemeral(e.user_message())
            }
        }
    }

    // ── Structured command ───────────────────────────────────────────────

    /// Structured `translate(text, src, dst)` with fixed language choices.
    pub async fn on_translate(
        &self,
        invoker: &UserRef,
        text: &str,
        src: SupportedLanguage,
        dst: SupportedLanguage,
    ) -> Reply {
        let request = TranslationRequest {
            text: text.to_string(),
            source_language: Some(src.code()),
            dest_language: dst.code(),
            requester: invoker.id,
        };
        match self.client.translate_request(&request).await {
            Ok(result) => {
                info!("Translated text for {}", invoker.name);
                Reply::to_invocation(format!(
                    "Translation of _\"{}\"_ from _{}_ to _{}_: {}",
                    text,
                    src.name(),
                    dst.name(),
                    result.translated_text
                ))
            }
            Err(e) => {
                log_translate_failure(&e, text, &invoker.name);
                Reply::to_invocation(e.user_message())
            }
        }
    }

    // ── Image command ────────────────────────────────────────────────────

    /// `trimg [source]`: OCR every image on the referenced message, translate
    /// each into English and reply with one section per image.
    pub async fn on_trimg(&self, invocation: &ChatMessage, source: Option<&str>) -> Reply {
        let Some(referenced) = invocation.reference.as_deref() else {
            return self.usage("trimg");
        };

        let source = match source
            .map(|s| language::resolve(s, LanguageRole::Source))
            .transpose()
        {
            Ok(source) => source,
            Err(e) => {
                warn!("{} for {}", e, invocation.author.name);
                return Reply::to_invocation(e.user_message());
            }
        };

        let output = self
            .translate_images(&referenced.attachments, source.as_ref(), &invocation.author)
            .await;

        if output.images.is_empty() {
            debug!(
                "No image attachments among {} on message {}",
                output.stats.total_attachments, referenced.id
            );
            return Reply::to_invocation(NO_IMAGES_MESSAGE);
        }

        info!(
            "Sent image translation to {} ({} translated, {} failed, {}ms)",
            invocation.author.name,
            output.stats.translated_images,
            output.stats.failed_images,
            output.stats.duration_ms
        );
        Reply::to_referenced(output.render())
    }

    /// Run every image attachment through fetch → stage → OCR → translate,
    /// strictly in attachment order.
    ///
    /// Non-image attachments are skipped. Each image yields exactly one
    /// [`ImageOutcome`]; a failure on one image never stops the others.
    pub async fn translate_images(
        &self,
        attachments: &[Attachment],
        source: Option<&LanguageCode>,
        requester: &UserRef,
    ) -> ImageBatchOutput {
        let start = Instant::now();
        let images: Vec<&Attachment> = attachments.iter().filter(|a| a.is_image()).collect();
        let total = images.len();
        let cb = self.config.progress_callback.as_ref();

        if let Some(cb) = cb {
            cb.on_batch_start(total);
        }

        let mut outcomes = Vec::with_capacity(total);
        for (idx, attachment) in images.into_iter().enumerate() {
            let image = idx + 1;
            if let Some(cb) = cb {
                cb.on_image_start(image, total);
            }

            let outcome = match self.process_image(image, attachment, source, requester).await {
                Ok((result, recognized)) => {
                    if let Some(cb) = cb {
                        cb.on_image_complete(image, total, recognized);
                    }
                    ImageOutcome::Translated(result)
                }
                Err(e) => {
                    warn!("{}", e);
                    if let Some(cb) = cb {
                        cb.on_image_error(image, total, &e.to_string());
                    }
                    ImageOutcome::Failed(e)
                }
            };
            outcomes.push(outcome);
        }

        let translated_images = outcomes.iter().filter(|o| o.is_ok()).count();
        if let Some(cb) = cb {
            cb.on_batch_complete(total, translated_images);
        }

        let stats = ImageBatchStats {
            total_attachments: attachments.len(),
            skipped_attachments: attachments.len() - total,
            translated_images,
            failed_images: total - translated_images,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        ImageBatchOutput {
            images: outcomes,
            stats,
        }
    }

    /// Returns the translated image together with the number of lines OCR
    /// recognised on it.
    async fn process_image(
        &self,
        image: usize,
        attachment: &Attachment,
        source: Option<&LanguageCode>,
        requester: &UserRef,
    ) -> Result<(ImageTranslationResult, usize), ImageError> {
        let bytes = input::fetch_attachment(attachment, self.config.download_timeout_secs)
            .await
            .map_err(|detail| ImageError::Download { image, detail })?;

        let staged = input::stage(&bytes, &attachment.filename, &self.config.staging_dir)
            .await
            .map_err(|e| ImageError::Staging {
                image,
                detail: e.to_string(),
            })?;
        drop(bytes);

        let block = self.ocr.extract_one(image, staged.path()).await;
        if let Err(e) = staged.close() {
            warn!("Image {}: could not delete staged file: {}", image, e);
        }
        let block = block?;
        let recognized = block.lines.len();

        if block.is_empty() {
            let result = ImageTranslationResult {
                image_index: image,
                source_language: source.cloned(),
                translated_lines: Vec::new(),
            };
            return Ok((result, recognized));
        }

        let request = TranslationRequest {
            text: block.quoted_text(),
            source_language: source.cloned(),
            dest_language: LanguageCode::english(),
            requester: requester.id,
        };
        let result = self.client.translate_request(&request).await.map_err(|e| {
            log_translate_failure(&e, &request.text, &requester.name);
            ImageError::Translation {
                image,
                detail: e.to_string(),
            }
        })?;

        let result = ImageTranslationResult {
            image_index: image,
            source_language: Some(result.detected_source_language),
            translated_lines: result.translated_text.lines().map(str::to_string).collect(),
        };
        Ok((result, recognized))
    }

    fn usage(&self, command: &str) -> Reply {
        Reply::to_invocation(format!(
            "\"{}{}\" can only be used as a reply to another message",
            self.config.command_prefix, command
        ))
    }
}

/// Log a failed translation at the level its cause deserves.
fn log_translate_failure(err: &TranslateError, text: &str, requester: &str) {
    match err {
        TranslateError::UnknownLanguage(e) => warn!("{} for {}", e, requester),
        TranslateError::Backend(BackendError::EmptyInput) => {
            debug!("Nothing to translate for {}", requester)
        }
        TranslateError::Backend(e) => {
            error!("Failed to translate \"{}\" for {}: {}", text, requester, e)
        }
    }
}

/// Normalise paragraph separators for single-line renderers: paragraphs
/// become `---` separated blocks and single line breaks become spaces.
pub fn cleanup(text: &str) -> String {
    text.replace("\n\n", "\n---\n")
        .replace('\n', " ")
        .replace("---", "\n---\n")
}
