//! # tr-relay
//!
//! Message-triggered translation relay for chat platforms.
//!
//! The relay watches chat events, pulls a source text out of them (typed
//! inline, quoted from a referenced message, or read off images with a
//! vision model) and replies with the translation annotated with the
//! detected source language.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Event
//!  │
//!  ├─ inline "translate X to Y" ─▶ TriggerParser ─┐
//!  ├─ tr / context menu / translate ──────────────┼─▶ TranslationClient ─▶ Reply
//!  └─ trimg ─▶ fetch ─▶ stage ─▶ OCR ─▶ quote ────┘      (per image, in order)
//! ```
//!
//! The chat platform itself stays outside: an adapter converts its objects
//! into [`Event`]s and sends the returned [`Reply`] through a [`Responder`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tr_relay::{ChatMessage, Event, RelayConfig, TranslationPipeline, UserRef};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // OCR provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = RelayConfig::builder().ignore_channel(42).build()?;
//!     let relay = TranslationPipeline::from_config(config)?;
//!
//!     let msg = ChatMessage::new(1, UserRef::new(7, "ana"), 1, "translate goedemorgen to english");
//!     if let Some(reply) = relay.handle(Event::Message(msg)).await {
//!         println!("{}", reply.content);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `tr-relay` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when embedding the relay in a bot:
//! ```toml
//! tr-relay = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod language;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod relay;
pub mod trigger;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::GoogleBackend;
pub use client::{BackendTranslation, TranslationBackend, TranslationClient};
pub use config::{RelayConfig, RelayConfigBuilder};
pub use error::{
    BackendError, ImageError, LanguageRole, RelayError, TranslateError, UnknownLanguageError,
};
pub use event::{
    Attachment, AttachmentSource, ChatMessage, Command, Event, Reply, ReplyTarget, Responder,
    UserRef,
};
pub use language::{display_name, resolve, LanguageCode, SupportedLanguage};
pub use output::{
    ImageBatchOutput, ImageBatchStats, ImageOutcome, ImageTextBlock, ImageTranslationResult,
    RecognizedLine, TranslationRequest, TranslationResult,
};
pub use pipeline::ocr::{OcrEngine, OcrExtractor, VisionOcrEngine};
pub use progress::{ImageProgressCallback, NoopProgressCallback, ProgressCallback};
pub use relay::TranslationPipeline;
pub use trigger::TriggerMatch;
