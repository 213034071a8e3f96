//! Result types produced by the relay.
//!
//! Everything here is transient: created inside one pipeline invocation and
//! dropped once the reply has been handed to the platform.

use crate::error::ImageError;
use crate::language::{display_name, LanguageCode};
use serde::{Deserialize, Serialize};

/// One translation to perform. `text` is never empty once validated by
/// [`crate::client::TranslationClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    /// `None` lets the backend auto-detect.
    pub source_language: Option<LanguageCode>,
    pub dest_language: LanguageCode,
    pub requester: u64,
}

/// Output of a single backend call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub original_text: String,
    pub translated_text: String,
    /// What the backend actually used, even when the caller named a source.
    pub detected_source_language: LanguageCode,
}

impl TranslationResult {
    /// Capitalised name of the detected source language.
    pub fn source_display_name(&self) -> String {
        display_name(&self.detected_source_language)
    }
}

/// A single line recognised by the OCR engine.
///
/// `confidence` and `bbox` are engine metadata; nothing downstream reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedLine {
    pub text: String,
    pub confidence: Option<f32>,
    /// `[x_min, y_min, x_max, y_max]` in pixels.
    pub bbox: Option<[f32; 4]>,
}

impl RecognizedLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
            bbox: None,
        }
    }
}

/// Quoting marker prefixed to every recognised line.
pub const QUOTE_MARKER: &str = "> ";

/// Ordered text lines recognised on one image, top-to-bottom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageTextBlock {
    pub lines: Vec<String>,
}

impl ImageTextBlock {
    /// Keep only the recognised text, in engine order.
    pub fn from_recognized(lines: Vec<RecognizedLine>) -> Self {
        Self {
            lines: lines.into_iter().map(|l| l.text).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines prefixed with [`QUOTE_MARKER`] and joined with newlines; this is
    /// the text sent to the translation backend.
    pub fn quoted_text(&self) -> String {
        self.lines
            .iter()
            .map(|line| format!("{QUOTE_MARKER}{line}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Translation of one image's recognised text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageTranslationResult {
    /// 1-based position among the qualifying attachments.
    pub image_index: usize,
    /// `None` when nothing was recognised and no explicit source was given.
    pub source_language: Option<LanguageCode>,
    pub translated_lines: Vec<String>,
}

/// Per-image result: either a translation or the error that stopped it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ImageOutcome {
    Translated(ImageTranslationResult),
    Failed(ImageError),
}

impl ImageOutcome {
    pub fn image_index(&self) -> usize {
        match self {
            ImageOutcome::Translated(r) => r.image_index,
            ImageOutcome::Failed(e) => e.image(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ImageOutcome::Translated(_))
    }

    /// Render this image's section of the aggregated reply.
    pub fn render(&self) -> String {
        match self {
            ImageOutcome::Translated(r) => {
                let source = r
                    .source_language
                    .as_ref()
                    .map(display_name)
                    .unwrap_or_else(|| "Unknown".to_string());
                format!(
                    "**Image {} (translated from {})**\n\n{}\n\n",
                    r.image_index,
                    source,
                    r.translated_lines.join("\n")
                )
            }
            ImageOutcome::Failed(e) => format!(
                "**Image {} (failed)**\n\n_{}_\n\n",
                e.image(),
                e.user_message()
            ),
        }
    }
}

/// Counters for one image command, used for logging and the CLI summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBatchStats {
    /// Attachments on the referenced message.
    pub total_attachments: usize,
    /// Attachments skipped because their content type is not an image.
    pub skipped_attachments: usize,
    pub translated_images: usize,
    pub failed_images: usize,
    pub duration_ms: u64,
}

/// Aggregated image command output, sections in attachment order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageBatchOutput {
    pub images: Vec<ImageOutcome>,
    pub stats: ImageBatchStats,
}

impl ImageBatchOutput {
    /// Concatenate every section into one reply body.
    pub fn render(&self) -> String {
        self.images.iter().map(ImageOutcome::render).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_text_prefixes_every_line() {
        let block = ImageTextBlock {
            lines: vec!["Guten Tag".into(), "Ausgang".into()],
        };
        assert_eq!(block.quoted_text(), "> Guten Tag\n> Ausgang");
        assert_eq!(ImageTextBlock::default().quoted_text(), "");
    }

    #[test]
    fn recognised_metadata_is_discarded() {
        let block = ImageTextBlock::from_recognized(vec![RecognizedLine {
            text: "EXIT".into(),
            confidence: Some(0.98),
            bbox: Some([0.0, 0.0, 10.0, 4.0]),
        }]);
        assert_eq!(block.lines, vec!["EXIT".to_string()]);
    }

    #[test]
    fn translated_section_format() {
        let outcome = ImageOutcome::Translated(ImageTranslationResult {
            image_index: 3,
            source_language: Some(LanguageCode::from_backend("de")),
            translated_lines: vec!["> Good day".into(), "> Exit".into()],
        });
        assert_eq!(
            outcome.render(),
            "**Image 3 (translated from German)**\n\n> Good day\n> Exit\n\n"
        );
    }

    #[test]
    fn empty_section_format() {
        let outcome = ImageOutcome::Translated(ImageTranslationResult {
            image_index: 2,
            source_language: None,
            translated_lines: vec![],
        });
        assert_eq!(outcome.render(), "**Image 2 (translated from Unknown)**\n\n\n\n");
    }

    #[test]
    fn failed_section_format() {
        let outcome = ImageOutcome::Failed(ImageError::Download {
            image: 1,
            detail: "HTTP 404".into(),
        });
        assert_eq!(outcome.image_index(), 1);
        assert!(!outcome.is_ok());
        let text = outcome.render();
        assert!(text.starts_with("**Image 1 (failed)**"));
        assert!(!text.contains("404"));
    }
}
