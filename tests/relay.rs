//! Integration tests for the relay's entry modes.
//!
//! The translation backend and the OCR engine are replaced by in-process
//! doubles, so these tests need no network and no API keys.

use futures::future::BoxFuture;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tr_relay::{
    Attachment, AttachmentSource, BackendError, BackendTranslation, ChatMessage, Command, Event,
    ImageOutcome, ImageProgressCallback, LanguageCode, OcrEngine, OcrExtractor, RecognizedLine,
    RelayConfig, RelayConfigBuilder, RelayError, Reply, ReplyTarget, Responder, SupportedLanguage,
    TranslationBackend, TranslationClient, TranslationPipeline, UserRef,
};
use tracing::field::{Field, Visit};
use tracing::Level;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

const BOT_ID: u64 = 999;
const IGNORED_CHANNEL: u64 = 13;
const CHANNEL: u64 = 7;

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Appends " [en]" to every line; reports German unless told the source.
/// Text containing "Speisekarte" comes back as a single line.
#[derive(Default)]
struct FakeBackend {
    calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl TranslationBackend for FakeBackend {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        source: Option<&'a LanguageCode>,
        _dest: &'a LanguageCode,
    ) -> BoxFuture<'a, Result<BackendTranslation, BackendError>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(text.to_string());
            if text.contains("explode") {
                return Err(BackendError::Unavailable("connection reset".into()));
            }
            if text.contains("stall") {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            let separator = if text.contains("Speisekarte") { " / " } else { "\n" };
            let translated = text
                .lines()
                .map(|l| format!("{l} [en]"))
                .collect::<Vec<_>>()
                .join(separator);
            Ok(BackendTranslation {
                text: translated,
                source: source
                    .cloned()
                    .unwrap_or_else(|| LanguageCode::from_backend("de")),
            })
        })
    }
}

/// Picks its answer from the staged file name and remembers every path.
#[derive(Default)]
struct FakeOcr {
    seen: Mutex<Vec<PathBuf>>,
}

impl OcrEngine for FakeOcr {
    fn recognize<'a>(
        &'a self,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<RecognizedLine>, String>> {
        Box::pin(async move {
            assert!(path.exists(), "staged file must exist during OCR");
            self.seen.lock().unwrap().push(path.to_path_buf());
            let name = path.to_string_lossy().into_owned();
            if name.ends_with("blank.png") {
                Ok(vec![])
            } else if name.ends_with("broken.png") {
                Err("model returned garbage".into())
            } else if name.ends_with("explode.png") {
                Ok(vec![RecognizedLine::new("explode")])
            } else if name.ends_with("speisekarte.png") {
                Ok(["Speisekarte", "Suppe", "Brot"]
                    .into_iter()
                    .map(RecognizedLine::new)
                    .collect())
            } else {
                Ok(vec![
                    RecognizedLine {
                        text: "Ausgang".into(),
                        confidence: Some(0.97),
                        bbox: Some([0.0, 0.0, 40.0, 10.0]),
                    },
                    RecognizedLine::new("Kasse"),
                ])
            }
        })
    }
}

#[derive(Default)]
struct RecordingResponder {
    sent: Mutex<Vec<Reply>>,
}

impl Responder for RecordingResponder {
    fn send<'a>(&'a self, reply: &'a Reply) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(reply.clone());
            Ok(())
        })
    }
}

#[derive(Default)]
struct CountingProgress {
    started: AtomicUsize,
    completed: AtomicUsize,
    errors: AtomicUsize,
    batch_total: AtomicUsize,
    line_counts: Mutex<Vec<usize>>,
}

impl ImageProgressCallback for CountingProgress {
    fn on_batch_start(&self, total_images: usize) {
        self.batch_total.store(total_images, Ordering::SeqCst);
    }
    fn on_image_start(&self, _image: usize, _total: usize) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_image_complete(&self, _image: usize, _total: usize, line_count: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.line_counts.lock().unwrap().push(line_count);
    }
    fn on_image_error(&self, _image: usize, _total: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Log capture ──────────────────────────────────────────────────────────────

type Captured = Arc<Mutex<Vec<(Level, String)>>>;

struct CaptureLayer(Captured);

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: tracing::Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.0
            .lock()
            .unwrap()
            .push((*event.metadata().level(), visitor.0));
    }
}

fn capture_logs() -> (Captured, tracing::subscriber::DefaultGuard) {
    let captured: Captured = Arc::default();
    let subscriber = tracing_subscriber::registry().with(CaptureLayer(Arc::clone(&captured)));
    let guard = tracing::subscriber::set_default(subscriber);
    (captured, guard)
}

fn errors_in(captured: &Captured) -> Vec<String> {
    captured
        .lock()
        .unwrap()
        .iter()
        .filter(|(level, _)| *level == Level::ERROR)
        .map(|(_, msg)| msg.clone())
        .collect()
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

struct Harness {
    relay: TranslationPipeline,
    backend: Arc<FakeBackend>,
    ocr: Arc<FakeOcr>,
    staging: TempDir,
}

fn harness_with(configure: impl FnOnce(RelayConfigBuilder) -> RelayConfigBuilder) -> Harness {
    let staging = TempDir::new().unwrap();
    let builder = RelayConfig::builder()
        .staging_dir(staging.path())
        .ignore_channel(IGNORED_CHANNEL)
        .bot_user_id(BOT_ID);
    let config = configure(builder).build().unwrap();

    let backend = Arc::new(FakeBackend::default());
    let ocr = Arc::new(FakeOcr::default());
    let client = TranslationClient::new(backend.clone(), Duration::from_secs(15));
    let extractor = OcrExtractor::new(ocr.clone(), 120);
    Harness {
        relay: TranslationPipeline::new(config, client, extractor),
        backend,
        ocr,
        staging,
    }
}

fn harness() -> Harness {
    harness_with(|b| b)
}

fn ana() -> UserRef {
    UserRef::new(1, "ana")
}

fn message(content: &str) -> ChatMessage {
    ChatMessage::new(100, ana(), CHANNEL, content)
}

fn image(filename: &str) -> Attachment {
    Attachment {
        filename: filename.into(),
        content_type: Some("image/png".into()),
        source: AttachmentSource::Bytes(b"not decoded by the fake engine".to_vec()),
    }
}

fn command(content: &str, command: Command, referenced: Option<ChatMessage>) -> Event {
    let mut invocation = ChatMessage::new(200, UserRef::new(2, "bram"), CHANNEL, content);
    if let Some(referenced) = referenced {
        invocation = invocation.replying_to(referenced);
    }
    Event::Command {
        invocation,
        command,
    }
}

fn trimg(referenced: Option<ChatMessage>, source: Option<&str>) -> Event {
    command(
        "!trimg",
        Command::TrImg {
            source: source.map(str::to_string),
        },
        referenced,
    )
}

fn staging_entries(h: &Harness) -> usize {
    std::fs::read_dir(h.staging.path()).map(|d| d.count()).unwrap_or(0)
}

// ── Inline trigger ───────────────────────────────────────────────────────────

#[tokio::test]
async fn inline_trigger_replies_with_translation_only() {
    let h = harness();
    let reply = h
        .relay
        .handle(Event::Message(message("Translate Hallo Welt to English")))
        .await
        .expect("trigger should reply");
    assert_eq!(reply, Reply::to_invocation("Hallo Welt [en]"));
    assert_eq!(h.backend.call_count(), 1);
}

#[tokio::test]
async fn inline_unknown_language_logs_one_error_naming_requester() {
    let h = harness();
    let (captured, _guard) = capture_logs();

    let reply = h
        .relay
        .handle(Event::Message(message("translate hello to klingon")))
        .await
        .expect("invalid language still replies");

    assert_eq!(reply.content, "Destination language invalid. Check typos.");
    assert_eq!(h.backend.call_count(), 0);
    let errors = errors_in(&captured);
    assert_eq!(errors.len(), 1, "errors: {errors:?}");
    assert!(errors[0].contains("ana"));
    assert!(errors[0].contains("klingon"));
}

#[tokio::test]
async fn inline_backend_failure_is_reported_generically() {
    let h = harness();
    let (captured, _guard) = capture_logs();

    let reply = h
        .relay
        .handle(Event::Message(message("tr please explode to german")))
        .await
        .unwrap();

    assert_eq!(
        reply.content,
        "The translation service is unavailable right now. Try again later."
    );
    assert!(!reply.content.contains("connection reset"));
    let errors = errors_in(&captured);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("please explode"));
    assert!(errors[0].contains("ana"));
}

#[tokio::test]
async fn ignored_sources_and_plain_chat_are_dropped_silently() {
    let h = harness();
    let (captured, _guard) = capture_logs();

    let mut in_ignored = message("translate hallo to english");
    in_ignored.channel_id = IGNORED_CHANNEL;
    assert!(h.relay.handle(Event::Message(in_ignored)).await.is_none());

    let own = ChatMessage::new(1, UserRef::new(BOT_ID, "relay"), CHANNEL, "tr hallo to english");
    assert!(h.relay.handle(Event::Message(own)).await.is_none());

    assert!(h
        .relay
        .handle(Event::Message(message("going to the shop")))
        .await
        .is_none());

    assert_eq!(h.backend.call_count(), 0);
    assert!(captured.lock().unwrap().is_empty());
}

// ── Reply command ────────────────────────────────────────────────────────────

#[tokio::test]
async fn tr_without_reference_sends_usage_and_never_translates() {
    let h = harness();
    let reply = h
        .relay
        .handle(command("!tr", Command::Tr { source: None }, None))
        .await
        .unwrap();
    assert_eq!(
        reply,
        Reply::to_invocation("\"!tr\" can only be used as a reply to another message")
    );
    assert_eq!(h.backend.call_count(), 0);
}

#[tokio::test]
async fn tr_replies_to_the_referenced_message() {
    let h = harness();
    let reply = h
        .relay
        .handle(command(
            "!tr",
            Command::Tr { source: None },
            Some(message("Guten Morgen")),
        ))
        .await
        .unwrap();
    assert_eq!(reply.target, ReplyTarget::Referenced);
    assert_eq!(reply.content, "Translated from (German): Guten Morgen [en]");
}

#[tokio::test]
async fn tr_with_explicit_source_reports_it() {
    let h = harness();
    let reply = h
        .relay
        .handle(command(
            "!tr nl",
            Command::Tr {
                source: Some("nl".into()),
            },
            Some(message("goedemorgen")),
        ))
        .await
        .unwrap();
    assert_eq!(reply.content, "Translated from (Dutch): goedemorgen [en]");
}

#[tokio::test]
async fn tr_with_unknown_source_language() {
    let h = harness();
    let reply = h
        .relay
        .handle(command(
            "!tr klingon",
            Command::Tr {
                source: Some("klingon".into()),
            },
            Some(message("nuqneH")),
        ))
        .await
        .unwrap();
    assert_eq!(reply.target, ReplyTarget::Invocation);
    assert_eq!(reply.content, "Source language invalid. Check typos.");
    assert_eq!(h.backend.call_count(), 0);
}

#[tokio::test]
async fn usage_message_follows_configured_prefix() {
    let h = harness_with(|b| b.command_prefix("?"));
    let reply = h.relay.handle(trimg(None, None)).await.unwrap();
    assert_eq!(
        reply.content,
        "\"?trimg\" can only be used as a reply to another message"
    );
}

// ── Context menu and structured command ─────────────────────────────────────

#[tokio::test]
async fn context_menu_reply_is_private_and_three_part() {
    let h = harness();
    let reply = h
        .relay
        .handle(Event::ContextMenu {
            invoker: UserRef::new(3, "cas"),
            target: message("Guten Tag"),
        })
        .await
        .unwrap();
    assert!(reply.ephemeral);
    assert_eq!(
        reply.content,
        "Translation for \"Guten Tag\" from (German):\n\nGuten Tag [en]"
    );
}

#[tokio::test]
async fn structured_translate_command() {
    let h = harness();
    let reply = h
        .relay
        .handle(Event::Translate {
            invoker: ana(),
            text: "hallo".into(),
            src: SupportedLanguage::Dutch,
            dst: SupportedLanguage::English,
        })
        .await
        .unwrap();
    assert_eq!(
        reply.content,
        "Translation of _\"hallo\"_ from _Dutch_ to _English_: hallo [en]"
    );
}

#[tokio::test(start_paused = true)]
async fn stalled_backend_times_out_with_user_message() {
    let h = harness();
    let reply = h
        .relay
        .handle(Event::ContextMenu {
            invoker: ana(),
            target: message("please stall"),
        })
        .await
        .unwrap();
    assert_eq!(
        reply.content,
        "The translation service took too long to answer. Try again later."
    );
}

// ── Image command ────────────────────────────────────────────────────────────

#[tokio::test]
async fn trimg_three_images_with_blank_second() {
    let h = harness();
    let referenced = message("")
        .with_attachment(image("menu.png"))
        .with_attachment(image("blank.png"))
        .with_attachment(image("sign.png"));

    let reply = h.relay.handle(trimg(Some(referenced), None)).await.unwrap();

    assert_eq!(reply.target, ReplyTarget::Referenced);
    let section = "> Ausgang [en]\n> Kasse [en]";
    assert_eq!(
        reply.content,
        format!(
            "**Image 1 (translated from German)**\n\n{section}\n\n\
             **Image 2 (translated from Unknown)**\n\n\n\n\
             **Image 3 (translated from German)**\n\n{section}\n\n"
        )
    );

    // The blank image never reaches the backend.
    assert_eq!(h.backend.call_count(), 2);

    let seen = h.ocr.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|p| !p.exists()));
    assert_eq!(staging_entries(&h), 0);
}

#[tokio::test]
async fn trimg_isolates_a_failing_image() {
    let h = harness();
    let referenced = message("")
        .with_attachment(image("menu.png"))
        .with_attachment(image("broken.png"))
        .with_attachment(image("sign.png"));

    let reply = h.relay.handle(trimg(Some(referenced), None)).await.unwrap();

    let sections: Vec<&str> = reply.content.split("**Image ").skip(1).collect();
    assert_eq!(sections.len(), 3);
    assert!(sections[0].starts_with("1 (translated from German)"));
    assert_eq!(
        sections[1],
        "2 (failed)**\n\n_Text recognition failed for this image._\n\n"
    );
    assert!(sections[2].starts_with("3 (translated from German)"));
    assert_eq!(staging_entries(&h), 0);
}

#[tokio::test]
async fn trimg_backend_failure_only_affects_that_image() {
    let h = harness();
    let attachments = vec![image("menu.png"), image("explode.png")];

    let output = h.relay.translate_images(&attachments, None, &ana()).await;

    assert_eq!(output.stats.translated_images, 1);
    assert_eq!(output.stats.failed_images, 1);
    assert!(output.images[0].is_ok());
    match &output.images[1] {
        ImageOutcome::Failed(e) => {
            assert_eq!(e.image(), 2);
            assert_eq!(e.user_message(), "Translation failed for this image.");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(staging_entries(&h), 0);
}

#[tokio::test]
async fn trimg_skips_non_images_and_reports_zero_images() {
    let h = harness();
    let pdf = Attachment {
        filename: "doc.pdf".into(),
        content_type: Some("application/pdf".into()),
        source: AttachmentSource::Bytes(vec![1]),
    };
    let unknown = Attachment {
        content_type: None,
        ..pdf.clone()
    };
    let referenced = message("look").with_attachment(pdf).with_attachment(unknown);

    let reply = h.relay.handle(trimg(Some(referenced), None)).await.unwrap();

    assert_eq!(reply.target, ReplyTarget::Invocation);
    assert_eq!(reply.content, "No images found on the referenced message.");
    assert!(h.ocr.seen.lock().unwrap().is_empty());
    assert_eq!(h.backend.call_count(), 0);
}

#[tokio::test]
async fn trimg_mixed_attachments_keep_image_numbering() {
    let h = harness();
    let referenced = message("")
        .with_attachment(Attachment {
            filename: "notes.txt".into(),
            content_type: Some("text/plain".into()),
            source: AttachmentSource::Bytes(vec![]),
        })
        .with_attachment(image("sign.png"));

    let output = h
        .relay
        .translate_images(&referenced.attachments, None, &ana())
        .await;
    assert_eq!(output.images.len(), 1);
    assert_eq!(output.images[0].image_index(), 1);
    assert_eq!(output.stats.total_attachments, 2);
    assert_eq!(output.stats.skipped_attachments, 1);
}

#[tokio::test]
async fn trimg_explicit_source_names_blank_images() {
    let h = harness();
    let referenced = message("").with_attachment(image("blank.png"));
    let reply = h
        .relay
        .handle(trimg(Some(referenced), Some("japanese")))
        .await
        .unwrap();
    assert_eq!(
        reply.content,
        "**Image 1 (translated from Japanese)**\n\n\n\n"
    );
}

#[tokio::test]
async fn trimg_download_failure_is_per_image() {
    let h = harness();
    let missing = Attachment {
        filename: "gone.png".into(),
        content_type: Some("image/png".into()),
        source: AttachmentSource::File(h.staging.path().join("does-not-exist.png")),
    };
    let referenced = message("")
        .with_attachment(missing)
        .with_attachment(image("sign.png"));

    let reply = h.relay.handle(trimg(Some(referenced), None)).await.unwrap();
    assert!(reply
        .content
        .starts_with("**Image 1 (failed)**\n\n_Could not download this image._\n\n"));
    assert!(reply.content.contains("**Image 2 (translated from German)**"));
}

#[tokio::test]
async fn trimg_reports_progress() {
    let progress = Arc::new(CountingProgress::default());
    let cb = progress.clone();
    let h = harness_with(move |b| b.progress_callback(cb));
    let referenced = message("")
        .with_attachment(image("menu.png"))
        .with_attachment(image("broken.png"));

    h.relay.handle(trimg(Some(referenced), None)).await;

    assert_eq!(progress.batch_total.load(Ordering::SeqCst), 2);
    assert_eq!(progress.started.load(Ordering::SeqCst), 2);
    assert_eq!(progress.completed.load(Ordering::SeqCst), 1);
    assert_eq!(progress.errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn progress_reports_recognised_line_counts() {
    let progress = Arc::new(CountingProgress::default());
    let cb = progress.clone();
    let h = harness_with(move |b| b.progress_callback(cb));
    let referenced = message("")
        .with_attachment(image("speisekarte.png"))
        .with_attachment(image("blank.png"));

    let reply = h.relay.handle(trimg(Some(referenced), None)).await.unwrap();

    assert!(reply
        .content
        .contains("> Speisekarte [en] / > Suppe [en] / > Brot [en]"));
    assert_eq!(*progress.line_counts.lock().unwrap(), vec![3, 0]);
}

// ── Dispatch ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn dispatch_sends_through_responder() {
    let h = harness();
    let responder = RecordingResponder::default();

    let raw = message("!tr").replying_to(message("Guten Abend"));
    let event = h.relay.classify(raw);
    assert!(matches!(event, Event::Command { .. }));
    h.relay.dispatch(event, &responder).await;

    h.relay
        .dispatch(Event::Message(message("nothing here")), &responder)
        .await;

    let sent = responder.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].content, "Translated from (German): Guten Abend [en]");
}

// ── Setup ────────────────────────────────────────────────────────────────────

#[test]
fn unusable_staging_dir_fails_setup() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();
    let staging = blocker.join("staging");
    let config = RelayConfig::builder().staging_dir(&staging).build().unwrap();

    match TranslationPipeline::from_config(config) {
        Err(RelayError::StagingDir { path, .. }) => assert_eq!(path, staging),
        Err(other) => panic!("expected StagingDir, got {other}"),
        Ok(_) => panic!("setup should fail on an unusable staging dir"),
    }
}
