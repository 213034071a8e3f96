//! Platform-neutral event and reply types.
//!
//! The chat platform adapter converts its own message objects into
//! [`ChatMessage`] / [`Event`] and hands the relay a [`Responder`] to send
//! replies through. The relay never builds rich rendering; replies are plain
//! text plus a "visible only to the invoker" flag.

use crate::language::SupportedLanguage;
use futures::future::BoxFuture;
use std::path::PathBuf;

/// Author or invoker identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: u64,
    pub name: String,
}

impl UserRef {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Where the bytes of an attachment can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    /// CDN URL; downloaded over HTTP(S).
    Url(String),
    /// Local file (console adapter, tests).
    File(PathBuf),
    /// Bytes already in memory.
    Bytes(Vec<u8>),
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    /// MIME type declared by the platform, e.g. `image/png`.
    pub content_type: Option<String>,
    pub source: AttachmentSource,
}

impl Attachment {
    /// Whether the declared content type marks this attachment as an image.
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("image"))
    }
}

/// Read-only view of a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: u64,
    pub author: UserRef,
    pub channel_id: u64,
    pub content: String,
    pub attachments: Vec<Attachment>,
    /// The message this one replies to, if any.
    pub reference: Option<Box<ChatMessage>>,
}

impl ChatMessage {
    pub fn new(id: u64, author: UserRef, channel_id: u64, content: impl Into<String>) -> Self {
        Self {
            id,
            author,
            channel_id,
            content: content.into(),
            attachments: Vec::new(),
            reference: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn replying_to(mut self, referenced: ChatMessage) -> Self {
        self.reference = Some(Box::new(referenced));
        self
    }
}

/// Prefix commands understood by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `tr [source]`: translate the referenced message.
    Tr { source: Option<String> },
    /// `trimg [source]`: OCR and translate the referenced message's images.
    TrImg { source: Option<String> },
}

impl Command {
    /// Parse `"<prefix>tr dutch"`-style text. Returns `None` for anything
    /// that is not one of the relay's commands.
    pub fn parse(content: &str, prefix: &str) -> Option<Self> {
        let rest = content.trim_start().strip_prefix(prefix)?;
        let mut words = rest.split_whitespace();
        let name = words.next()?.to_ascii_lowercase();
        let source = words.next().map(str::to_string);
        match name.as_str() {
            "tr" => Some(Command::Tr { source }),
            "trimg" => Some(Command::TrImg { source }),
            _ => None,
        }
    }

    /// Command word without the prefix.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Tr { .. } => "tr",
            Command::TrImg { .. } => "trimg",
        }
    }
}

/// One inbound platform event.
#[derive(Debug, Clone)]
pub enum Event {
    /// Ordinary message; checked for an inline trigger.
    Message(ChatMessage),
    /// Prefix command; `invocation` is the message carrying it.
    Command {
        invocation: ChatMessage,
        command: Command,
    },
    /// "Translate Message" context-menu action on `target`.
    ContextMenu { invoker: UserRef, target: ChatMessage },
    /// Structured `translate(text, src, dst)` command.
    Translate {
        invoker: UserRef,
        text: String,
        src: SupportedLanguage,
        dst: SupportedLanguage,
    },
}

/// Which message a reply is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyTarget {
    /// The message or interaction that triggered the relay.
    Invocation,
    /// The message the invocation replied to.
    Referenced,
}

/// Plain-text response produced by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub target: ReplyTarget,
    pub content: String,
    /// Visible only to the invoker.
    pub ephemeral: bool,
}

impl Reply {
    pub fn to_invocation(content: impl Into<String>) -> Self {
        Self {
            target: ReplyTarget::Invocation,
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn to_referenced(content: impl Into<String>) -> Self {
        Self {
            target: ReplyTarget::Referenced,
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            target: ReplyTarget::Invocation,
            content: content.into(),
            ephemeral: true,
        }
    }
}

/// Outbound reply capability supplied by the platform adapter.
pub trait Responder: Send + Sync {
    /// Deliver `reply`. Errors are reported as text and only logged.
    fn send<'a>(&'a self, reply: &'a Reply) -> BoxFuture<'a, Result<(), String>>;
}
