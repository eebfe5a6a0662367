//! HTML <-> Markdown conversion
//!
//! Message markup is pushed through Markdown and back to drop host-specific
//! styling while keeping structure (emphasis, headings, lists).

use crate::block::{self, Node};
use crate::{Error, Result};
use pulldown_cmark::{html, Options, Parser};

/// Elements whose text the Markdown side emits verbatim.
const LITERAL_TAGS: &[&str] = &["code", "pre"];

/// Elements that start a new Markdown line.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "blockquote", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "td",
    "th", "tr", "table", "dd", "dt", "hr",
];

/// Characters that carry inline Markdown meaning anywhere in a line.
const INLINE_SPECIALS: &[char] = &['\\', '*', '_', '`', '[', ']', '<', '&', '~', '|'];

/// Characters that open a block construct at the start of a line.
const LINE_START_SPECIALS: &[char] = &['#', '>', '-', '+', '='];

/// Bidirectional text conversion used to normalize message markup.
pub trait TextConverter {
    fn html_to_markdown(&self, html: &str) -> Result<String>;

    fn markdown_to_html(&self, markdown: &str) -> Result<String>;

    /// HTML -> Markdown -> HTML.
    fn round_trip(&self, html: &str) -> Result<String> {
        let markdown = self.html_to_markdown(html)?;
        self.markdown_to_html(&markdown)
    }
}

/// Default converter: `html2text` for HTML -> Markdown (ATX `#` headings,
/// `*`/`**` emphasis) and `pulldown-cmark` for Markdown -> HTML.
#[derive(Debug, Clone)]
pub struct MarkdownRoundTrip {
    /// Column at which the Markdown side wraps. Kept wide so paragraphs
    /// stay on one source line.
    pub wrap_width: usize,
}

impl Default for MarkdownRoundTrip {
    fn default() -> Self {
        Self { wrap_width: 4096 }
    }
}

impl TextConverter for MarkdownRoundTrip {
    fn html_to_markdown(&self, html: &str) -> Result<String> {
        if html.trim().is_empty() {
            return Ok(String::new());
        }
        let escaped = block::to_html(&escape_markdown(block::parse_fragment(html)));
        html2text::from_read(escaped.as_bytes(), self.wrap_width)
            .map_err(|e| Error::ConversionError(format!("html to markdown: {}", e)))
    }

    fn markdown_to_html(&self, markdown: &str) -> Result<String> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        let parser = Parser::new_ext(markdown, options);
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        Ok(out)
    }
}

/// Backslash-escape text so the Markdown side reads it literally, and mark
/// `<br>` followed by more content as a hard break (a backslash before the newline).
fn escape_markdown(nodes: Vec<Node>) -> Vec<Node> {
    let mut line_start = true;
    escape_nodes(nodes, &mut line_start)
}

fn escape_nodes(nodes: Vec<Node>, line_start: &mut bool) -> Vec<Node> {
    let last_content = nodes
        .iter()
        .rposition(|n| !matches!(n, Node::Text(t) if t.trim().is_empty()));
    let mut out = Vec::with_capacity(nodes.len());
    for (i, node) in nodes.into_iter().enumerate() {
        match node {
            Node::Text(t) if t.trim().is_empty() => out.push(Node::Text(t)),
            Node::Text(t) => {
                out.push(Node::Text(escape_text(&t, *line_start)));
                *line_start = false;
            }
            Node::Element(e) if e.is(&["br"]) => {
                if last_content.map_or(false, |last| i < last) {
                    out.push(Node::text("\\"));
                }
                out.push(Node::Element(e));
                *line_start = true;
            }
            Node::Element(e) if e.is(LITERAL_TAGS) => {
                *line_start = e.is(BLOCK_TAGS);
                out.push(Node::Element(e));
            }
            Node::Element(mut e) => {
                let is_block = e.is(BLOCK_TAGS);
                if is_block {
                    *line_start = true;
                }
                e.children = escape_nodes(std::mem::take(&mut e.children), line_start);
                if is_block {
                    *line_start = true;
                }
                out.push(Node::Element(e));
            }
            other => {
                *line_start = false;
                out.push(other);
            }
        }
    }
    out
}

fn escape_text(text: &str, line_start: bool) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let body = if line_start {
        let trimmed = text.trim_start();
        out.push_str(&text[..text.len() - trimmed.len()]);
        let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
        let after = trimmed[digits..].chars().next();
        if digits > 0 && matches!(after, Some('.') | Some(')')) {
            // ordered list marker: escape the delimiter
            out.push_str(&trimmed[..digits]);
            out.push('\\');
            &trimmed[digits..]
        } else {
            if trimmed.starts_with(LINE_START_SPECIALS) {
                out.push('\\');
            }
            trimmed
        }
    } else {
        text
    };
    for c in body.chars() {
        if INLINE_SPECIALS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Converter that passes markup through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl TextConverter for Passthrough {
    fn html_to_markdown(&self, html: &str) -> Result<String> {
        Ok(html.to_string())
    }

    fn markdown_to_html(&self, markdown: &str) -> Result<String> {
        Ok(markdown.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{parse_fragment, text_content};

    #[test]
    fn plain_paragraph_round_trips() {
        let conv = MarkdownRoundTrip::default();
        let out = conv.round_trip("<p>Hello world</p>").unwrap();
        assert_eq!(text_content(&parse_fragment(&out)).trim(), "Hello world");
        assert!(out.contains("<p>"));
    }

    #[test]
    fn emphasis_survives_round_trip() {
        let conv = MarkdownRoundTrip::default();
        let out = conv.round_trip("<p>a <em>b</em> c</p>").unwrap();
        assert!(out.contains("<em>b</em>"), "got {}", out);
    }

    #[test]
    fn markdown_to_html_renders_headings_and_lists() {
        let conv = MarkdownRoundTrip::default();
        let out = conv.markdown_to_html("# Title\n\n* one\n* two\n").unwrap();
        assert!(out.contains("<h1>Title</h1>"));
        assert!(out.contains("<li>one</li>"));
    }

    #[test]
    fn literal_markdown_characters_survive_round_trip() {
        let conv = MarkdownRoundTrip::default();
        for text in [
            "# 1 priority",
            "- not a list",
            "+ not a list either",
            "> not a quote",
            "1. not ordered",
            "I *really* mean it",
            "snake_case and `ticks` [brackets] a & b <3",
        ] {
            let out = conv.round_trip(&format!("<p>{}</p>", text.replace('&', "&amp;").replace('<', "&lt;"))).unwrap();
            assert_eq!(text_content(&parse_fragment(&out)).trim(), text, "got {}", out);
        }
    }

    #[test]
    fn line_breaks_become_hard_breaks() {
        let conv = MarkdownRoundTrip::default();
        let markdown = conv.html_to_markdown("<p>line one<br>line two</p>").unwrap();
        assert!(markdown.contains("line one\\\n"), "got {:?}", markdown);
        let out = conv.markdown_to_html(&markdown).unwrap();
        assert!(out.contains("<br"), "got {}", out);
    }

    #[test]
    fn escaping_skips_code_and_trailing_breaks() {
        let nodes = escape_markdown(parse_fragment("<p>a_b <code>x_y</code><br></p>"));
        assert_eq!(
            crate::block::to_html(&nodes),
            "<p>a\\_b <code>x_y</code><br></p>"
        );
    }

    #[test]
    fn empty_input_is_empty() {
        let conv = MarkdownRoundTrip::default();
        assert_eq!(conv.round_trip("  ").unwrap(), "");
    }

    #[test]
    fn passthrough_is_identity() {
        assert_eq!(Passthrough.round_trip("<p>x</p>").unwrap(), "<p>x</p>");
    }
}
