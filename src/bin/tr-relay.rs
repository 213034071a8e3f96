//! CLI binary for tr-relay.
//!
//! A thin shim over the library crate: one-shot translation, trigger parsing,
//! image translation of local files, and a line-oriented console that plays
//! the role of a chat channel.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tr_relay::{
    resolve, trigger, Attachment, AttachmentSource, ChatMessage, Event, GoogleBackend,
    ImageProgressCallback, LanguageRole, ProgressCallback, RelayConfig, Reply, ReplyTarget,
    Responder, SupportedLanguage, TranslationClient, TranslationPipeline, UserRef,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a bar over the image batch plus one log line
/// per image.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Reading");

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .unwrap()
            .take()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ImageProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_images: usize) {
        self.bar.set_length(total_images as u64);
        self.bar.enable_steady_tick(Duration::from_millis(80));
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Translating {total_images} images…"))
        ));
    }

    fn on_image_start(&self, image: usize, _total: usize) {
        *self.started.lock().unwrap() = Some(Instant::now());
        self.bar.set_message(format!("image {image}"));
    }

    fn on_image_complete(&self, image: usize, total: usize, line_count: usize) {
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {:<9}  {}",
            green("✓"),
            image,
            total,
            dim(&format!("{line_count:>3} lines")),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, image: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}  {}",
            red("✗"),
            image,
            total,
            red(&msg),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_images: usize, success_count: usize) {
        let failed = total_images.saturating_sub(success_count);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} images translated",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} images translated  ({} failed)",
                if failed == total_images {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_images,
                red(&failed.to_string()),
            );
        }
    }
}

// ── Console responder ────────────────────────────────────────────────────────

/// Prints replies to stdout, marked with where they would be posted.
struct ConsoleResponder;

impl Responder for ConsoleResponder {
    fn send<'a>(
        &'a self,
        reply: &'a Reply,
    ) -> futures::future::BoxFuture<'a, std::result::Result<(), String>> {
        Box::pin(async move {
            let marker = match (reply.target, reply.ephemeral) {
                (_, true) => dim("(only you) ↳"),
                (ReplyTarget::Referenced, false) => cyan("↳ re:"),
                (ReplyTarget::Invocation, false) => cyan("↳"),
            };
            println!("{} {}", marker, reply.content);
            Ok(())
        })
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One-shot translation (source auto-detected, English by default)
  tr-relay translate "goedemorgen allemaal"
  tr-relay translate --src german --dst spanish "Guten Morgen"

  # Check how a chat message would be parsed (no network)
  tr-relay parse "translate hello world to dutch"

  # Read and translate the text on local images
  tr-relay ocr menu.jpg sign.png --src japanese

  # Local chat simulation
  tr-relay console
    > translate good morning to german
    > Bonjour tout le monde
    > !tr
    > !ctx
    > !attach menu.jpg sign.png
    > !trimg
    > !translate dutch english goedenavond

ENVIRONMENT VARIABLES:
  TR_RELAY_ENDPOINT         Translation backend endpoint
  TR_RELAY_STAGING_DIR      Directory for staged images
  TR_RELAY_IGNORE_CHANNELS  Comma-separated channel ids without inline triggers
  TR_RELAY_PREFIX           Command prefix (default "!")
  EDGEQUAKE_LLM_PROVIDER    OCR vision provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL           OCR vision model
  OPENAI_API_KEY            OpenAI API key
  RUST_LOG                  Overrides the log filter
"#;

/// Translate chat messages, replies and image text.
#[derive(Parser, Debug)]
#[command(
    name = "tr-relay",
    version,
    about = "Message-triggered translation relay",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Translation backend endpoint.
    #[arg(long, global = true, env = "TR_RELAY_ENDPOINT")]
    endpoint: Option<String>,

    /// Directory where image attachments are staged for OCR.
    #[arg(long, global = true, env = "TR_RELAY_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// Channel ids where inline triggers are ignored (comma-separated).
    #[arg(long, global = true, env = "TR_RELAY_IGNORE_CHANNELS", default_value = "")]
    ignore_channels: String,

    /// Command prefix.
    #[arg(long, global = true, env = "TR_RELAY_PREFIX", default_value = "!")]
    prefix: String,

    /// Translation call timeout in seconds.
    #[arg(long, global = true, env = "TR_RELAY_TRANSLATE_TIMEOUT", default_value_t = 15)]
    translate_timeout: u64,

    /// OCR timeout per image in seconds.
    #[arg(long, global = true, env = "TR_RELAY_OCR_TIMEOUT", default_value_t = 120)]
    ocr_timeout: u64,

    /// Attachment download timeout in seconds.
    #[arg(long, global = true, env = "TR_RELAY_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// OCR vision provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// OCR vision model (e.g. gpt-4.1-nano, gpt-4.1-mini).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Retries per image on OCR failure.
    #[arg(long, global = true, env = "TR_RELAY_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Path to a text file containing a custom OCR system prompt.
    #[arg(long, global = true, env = "TR_RELAY_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "TR_RELAY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "TR_RELAY_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Translate a text once.
    Translate {
        text: String,
        /// Source language name or code (auto-detected if omitted).
        #[arg(long)]
        src: Option<String>,
        /// Destination language name or code.
        #[arg(long, default_value = "english")]
        dst: String,
        /// Print the TranslationResult as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show how a chat message is parsed as an inline trigger.
    Parse { message: String },
    /// Read and translate the text on local image files.
    Ocr {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Source language of the image text.
        #[arg(long)]
        src: Option<String>,
        /// Print the ImageBatchOutput as JSON.
        #[arg(long)]
        json: bool,
        /// Disable progress bar.
        #[arg(long)]
        no_progress: bool,
    },
    /// Simulate a chat channel on stdin.
    Console,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Cmd::Translate {
            text,
            src,
            dst,
            json,
        } => run_translate(&cli, text, src.as_deref(), dst, *json).await,
        Cmd::Parse { message } => run_parse(message),
        Cmd::Ocr {
            images,
            src,
            json,
            no_progress,
        } => {
            let show_progress = !cli.quiet && !*no_progress && !*json;
            run_ocr(&cli, images, src.as_deref(), *json, show_progress).await
        }
        Cmd::Console => run_console(&cli).await,
    }
}

/// Map CLI args to `RelayConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RelayConfig> {
    let mut builder = RelayConfig::builder()
        .ignored_channels(tr_relay::config::parse_channel_list(&cli.ignore_channels)?)
        .command_prefix(cli.prefix.clone())
        .translate_timeout_secs(cli.translate_timeout)
        .ocr_timeout_secs(cli.ocr_timeout)
        .download_timeout_secs(cli.download_timeout)
        .max_retries(cli.max_retries)
        .bot_user_id(0);

    if let Some(ref endpoint) = cli.endpoint {
        builder = builder.backend_endpoint(endpoint.clone());
    }
    if let Some(ref dir) = cli.staging_dir {
        builder = builder.staging_dir(dir.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.ocr_provider_name(provider.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.ocr_model(model.clone());
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn build_client(config: &RelayConfig) -> Result<TranslationClient> {
    let timeout = Duration::from_secs(config.translate_timeout_secs);
    let backend = GoogleBackend::new(config.backend_endpoint.clone(), timeout)
        .context("Failed to build translation backend")?;
    Ok(TranslationClient::new(Arc::new(backend), timeout))
}

async fn run_translate(
    cli: &Cli,
    text: &str,
    src: Option<&str>,
    dst: &str,
    json: bool,
) -> Result<()> {
    let config = build_config(cli, None).await?;
    let client = build_client(&config)?;

    match client.translate(text, src, Some(dst)).await {
        Ok(result) if json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("Failed to serialise result")?
            );
            Ok(())
        }
        Ok(result) => {
            println!("{}", result.translated_text);
            if !cli.quiet {
                eprintln!(
                    "{}",
                    dim(&format!("translated from {}", result.source_display_name()))
                );
            }
            Ok(())
        }
        Err(e) => anyhow::bail!("{}", e.user_message()),
    }
}

fn run_parse(message: &str) -> Result<()> {
    let parsed = trigger::parse(message);
    println!(
        "{}",
        serde_json::to_string_pretty(&parsed).context("Failed to serialise match")?
    );
    Ok(())
}

async fn run_ocr(
    cli: &Cli,
    images: &[PathBuf],
    src: Option<&str>,
    json: bool,
    show_progress: bool,
) -> Result<()> {
    let source = src
        .map(|s| resolve(s, LanguageRole::Source))
        .transpose()
        .context("Invalid --src")?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ImageProgressCallback>)
    } else {
        None
    };
    let config = build_config(cli, progress_cb).await?;
    let relay = TranslationPipeline::from_config(config).context("Failed to set up the relay")?;

    let attachments: Vec<Attachment> = images
        .iter()
        .map(|p| file_attachment(p.as_path()))
        .collect();
    let output = relay
        .translate_images(&attachments, source.as_ref(), &console_user())
        .await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
    } else {
        print!("{}", output.render());
        if !cli.quiet && !show_progress {
            eprintln!(
                "Translated {}/{} images in {}ms",
                output.stats.translated_images,
                output.images.len(),
                output.stats.duration_ms
            );
            if output.stats.skipped_attachments > 0 {
                eprintln!("  {} files skipped (not images)", output.stats.skipped_attachments);
            }
        }
    }
    Ok(())
}

// ── Console ──────────────────────────────────────────────────────────────────

const CONSOLE_CHANNEL: u64 = 1;

async fn run_console(cli: &Cli) -> Result<()> {
    let config = build_config(cli, None).await?;
    let prefix = config.command_prefix.clone();
    let relay = TranslationPipeline::from_config(config).context("Failed to set up the relay")?;
    let responder = ConsoleResponder;
    let user = console_user();

    if !cli.quiet {
        eprintln!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Console ready. {p}tr, {p}trimg and {p}ctx act on the previous message; \
                 {p}attach <paths> posts images.",
                p = prefix
            ))
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut previous: Option<ChatMessage> = None;
    let mut next_id: u64 = 1;

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim_end().to_string();
        if line.is_empty() {
            continue;
        }
        let id = next_id;
        next_id += 1;

        let rest = line.strip_prefix(prefix.as_str());
        let mut words = rest.map(|r| r.split_whitespace()).into_iter().flatten();
        let keyword = words.next().map(str::to_ascii_lowercase);

        let event = match keyword.as_deref() {
            Some("attach") => {
                let mut message = ChatMessage::new(id, user.clone(), CONSOLE_CHANNEL, "");
                for path in words {
                    message = message.with_attachment(file_attachment(Path::new(path)));
                }
                println!("{}", dim(&format!("posted {} attachments", message.attachments.len())));
                previous = Some(message);
                continue;
            }
            Some("ctx") => match previous.clone() {
                Some(target) => Event::ContextMenu {
                    invoker: user.clone(),
                    target,
                },
                None => {
                    println!("{}", red("nothing to translate yet"));
                    continue;
                }
            },
            Some("translate") => match structured_args(words) {
                Some((src, dst, text)) => Event::Translate {
                    invoker: user.clone(),
                    text,
                    src,
                    dst,
                },
                None => {
                    println!(
                        "{}",
                        red(&format!("usage: {prefix}translate <src> <dst> <text>"))
                    );
                    continue;
                }
            },
            _ => {
                let mut message = ChatMessage::new(id, user.clone(), CONSOLE_CHANNEL, line.clone());
                let event = relay.classify(message.clone());
                if let Event::Command { .. } = event {
                    if let Some(prev) = previous.clone() {
                        message = message.replying_to(prev);
                    }
                    relay.classify(message)
                } else {
                    previous = Some(message);
                    event
                }
            }
        };

        relay.dispatch(event, &responder).await;
    }

    Ok(())
}

fn structured_args<'a>(
    mut words: impl Iterator<Item = &'a str>,
) -> Option<(SupportedLanguage, SupportedLanguage, String)> {
    let src = words.next()?.parse().ok()?;
    let dst = words.next()?.parse().ok()?;
    let text = words.collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }
    Some((src, dst, text))
}

fn console_user() -> UserRef {
    let name = std::env::var("USER").unwrap_or_else(|_| "console".to_string());
    UserRef::new(1, name)
}

fn file_attachment(path: &Path) -> Attachment {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let content_type = match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    };
    Attachment {
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string()),
        content_type: Some(content_type.to_string()),
        source: AttachmentSource::File(path.to_path_buf()),
    }
}
