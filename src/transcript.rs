//! Read-only snapshots of host chat messages
//!
//! The host renders each message as a `.mes` element inside `#chat`, carrying
//! a numeric `mesid`, an `is_user` flag, the sender in `ch_name`, the message
//! body in `.mes_text` and the avatar in `.avatar img`. Chat logs can also be
//! read directly from the host's line-delimited JSON format. Either way the
//! pipeline only ever sees immutable [`MessageElement`] values.

use crate::{Error, Result};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File base name used when the chat has no display name.
pub const FALLBACK_CHAT_NAME: &str = "chat";

/// One rendered chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageElement {
    /// Host message id (`mesid`)
    pub id: u64,
    /// Whether the message was written by the user
    pub is_user: bool,
    /// Inner markup of the message text
    pub html: String,
    /// Avatar image source, if any
    pub avatar_url: Option<String>,
    /// Sender display name, if known
    pub name: Option<String>,
}

impl MessageElement {
    pub fn new(id: u64, is_user: bool, html: impl Into<String>) -> Self {
        Self {
            id,
            is_user,
            html: html.into(),
            avatar_url: None,
            name: None,
        }
    }

    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Query surface of the host message list.
pub trait MessageSource {
    /// Currently rendered messages, in display order.
    fn messages(&self) -> &[MessageElement];

    /// Display name of the active chat.
    fn chat_name(&self) -> Option<&str>;

    /// Base URL against which relative avatar sources resolve.
    fn base_url(&self) -> Option<&str> {
        None
    }

    /// Name used for output files.
    fn file_base_name(&self) -> String {
        self.chat_name()
            .map(sanitize_file_name)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| FALLBACK_CHAT_NAME.to_string())
    }
}

/// An owned snapshot of a transcript.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub messages: Vec<MessageElement>,
    pub chat_name: Option<String>,
    pub base_url: Option<String>,
}

impl MessageSource for Transcript {
    fn messages(&self) -> &[MessageElement] {
        &self.messages
    }

    fn chat_name(&self) -> Option<&str> {
        self.chat_name.as_deref()
    }

    fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }
}

impl Transcript {
    pub fn new(messages: Vec<MessageElement>) -> Self {
        let chat_name = messages.first().and_then(|m| m.name.clone());
        Self {
            messages,
            chat_name,
            base_url: None,
        }
    }

    /// Load a transcript file: `.jsonl` chat logs or saved host pages.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::TranscriptError(format!("{}: {}", path.display(), e)))?;
        let is_jsonl = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("jsonl"))
            .unwrap_or(false);
        let mut transcript = if is_jsonl {
            Self::from_jsonl(&text)?
        } else {
            Self::from_html(&text)?
        };
        if transcript.base_url.is_none() {
            if let Some(dir) = path.parent() {
                transcript.base_url = Some(dir.to_string_lossy().into_owned());
            }
        }
        Ok(transcript)
    }

    /// Snapshot the messages rendered in a host page.
    pub fn from_html(html: &str) -> Result<Self> {
        let document = Html::parse_document(html);
        let mes_sel = Selector::parse("#chat .mes").unwrap();
        let text_sel = Selector::parse(".mes_text").unwrap();
        let avatar_sel = Selector::parse(".avatar img").unwrap();
        let name_sel = Selector::parse(".name_text").unwrap();
        let base_sel = Selector::parse("base[href]").unwrap();

        let mut messages = Vec::new();
        for (index, node) in document.select(&mes_sel).enumerate() {
            let el = node.value();
            let id = match el.attr("mesid").and_then(|v| v.trim().parse::<u64>().ok()) {
                Some(id) => id,
                None => {
                    log::warn!("message #{} has no numeric mesid; using its position", index);
                    index as u64
                }
            };
            let is_user = el.attr("is_user") == Some("true");
            let html = node
                .select(&text_sel)
                .next()
                .map(|t| t.inner_html())
                .unwrap_or_default();
            let avatar_url = node
                .select(&avatar_sel)
                .next()
                .and_then(|img| img.value().attr("src"))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            let name = el
                .attr("ch_name")
                .map(|s| s.to_string())
                .or_else(|| {
                    node.select(&name_sel)
                        .next()
                        .map(|n| n.text().collect::<String>().trim().to_string())
                })
                .filter(|s| !s.is_empty());
            messages.push(MessageElement {
                id,
                is_user,
                html,
                avatar_url,
                name,
            });
        }

        let base_url = document
            .select(&base_sel)
            .next()
            .and_then(|b| b.value().attr("href"))
            .map(|s| s.to_string());

        log::debug!("parsed {} messages from host markup", messages.len());
        let mut transcript = Self::new(messages);
        transcript.base_url = base_url;
        Ok(transcript)
    }

    /// Parse a line-delimited JSON chat log.
    ///
    /// Lines without a `mes` field (the metadata header) are skipped; message
    /// ids are positions in the chat, matching the host's `mesid`.
    pub fn from_jsonl(text: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Line {
            #[serde(default)]
            name: Option<String>,
            #[serde(default)]
            is_user: bool,
            mes: Option<String>,
            #[serde(default)]
            force_avatar: Option<String>,
        }

        let mut messages = Vec::new();
        for (lineno, raw) in text.lines().enumerate() {
            if raw.trim().is_empty() {
                continue;
            }
            let line: Line = serde_json::from_str(raw).map_err(|e| {
                Error::TranscriptError(format!("line {}: {}", lineno + 1, e))
            })?;
            let Some(mes) = line.mes else { continue };
            let id = messages.len() as u64;
            messages.push(MessageElement {
                id,
                is_user: line.is_user,
                html: markdown_to_html(&mes),
                avatar_url: line.force_avatar.filter(|s| !s.is_empty()),
                name: line.name.filter(|s| !s.is_empty()),
            });
        }
        log::debug!("parsed {} messages from chat log", messages.len());
        Ok(Self::new(messages))
    }
}

fn markdown_to_html(text: &str) -> String {
    let parser = pulldown_cmark::Parser::new(text);
    let mut out = String::new();
    pulldown_cmark::html::push_html(&mut out, parser);
    out
}

/// Replace characters that are not allowed in file names.
pub fn sanitize_file_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
