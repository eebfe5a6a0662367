//! Quotation highlighting
//!
//! Text leaves are scanned for `「...」`, `“...”` and `"..."` runs. Each match
//! becomes a [`QuoteSpan`] colored with the bracket color (corner brackets) or
//! the quote color (everything else). Matching is non-greedy and never nests;
//! a quote character without a partner is left as plain text.

use crate::block::{Node, QuoteSpan, QuoteStyle};
use crate::config::SnapConfig;
use regex::Regex;
use std::sync::OnceLock;

fn quote_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"「[^」]*」|“[^”]*”|"[^"]*""#).unwrap())
}

/// Colors applied to highlighted quotations.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteColors {
    pub quote: String,
    pub bracket: String,
}

impl QuoteColors {
    pub fn from_config(cfg: &SnapConfig) -> Self {
        Self {
            quote: cfg.quote_color.clone(),
            bracket: cfg.bracket_color.clone(),
        }
    }
}

/// Highlight every quotation in `nodes`.
///
/// Only text leaves are rewritten; existing quote spans are kept as they are,
/// so running the highlighter twice gives the same tree.
pub fn highlight(nodes: Vec<Node>, colors: &QuoteColors) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Text(text) => split_text(text, colors, &mut out),
            Node::Element(mut e) => {
                e.children = highlight(std::mem::take(&mut e.children), colors);
                out.push(Node::Element(e));
            }
            quote @ Node::Quote(_) => out.push(quote),
        }
    }
    out
}

fn split_text(text: String, colors: &QuoteColors, out: &mut Vec<Node>) {
    let re = quote_pattern();
    if text.is_empty() || !re.is_match(&text) {
        out.push(Node::Text(text));
        return;
    }

    let mut idx = 0;
    for m in re.find_iter(&text) {
        if m.start() > idx {
            out.push(Node::Text(text[idx..m.start()].to_string()));
        }
        let matched = m.as_str();
        let style = classify(matched);
        let color = match style {
            QuoteStyle::CornerBracket => colors.bracket.clone(),
            QuoteStyle::Curly | QuoteStyle::Straight => colors.quote.clone(),
        };
        out.push(Node::Quote(QuoteSpan {
            text: matched.to_string(),
            color,
            style,
        }));
        idx = m.end();
    }
    if idx < text.len() {
        out.push(Node::Text(text[idx..].to_string()));
    }
}

fn classify(matched: &str) -> QuoteStyle {
    if matched.starts_with('「') {
        QuoteStyle::CornerBracket
    } else if matched.starts_with('“') {
        QuoteStyle::Curly
    } else {
        QuoteStyle::Straight
    }
}
