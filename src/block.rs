//! Typed tree for normalized message blocks
//!
//! Blocks are built directly as values instead of being patched in place: the
//! normalizer parses clean markup into [`Node`]s, the highlighter replaces
//! text leaves with [`QuoteSpan`]s, and the layout engine walks the result.

use scraper::{ElementRef, Html};
use std::fmt::Write as _;

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Which quotation marks delimit a highlighted span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// `「...」`
    CornerBracket,
    /// `“...”`
    Curly,
    /// `"..."`
    Straight,
}

/// A highlighted quotation.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteSpan {
    pub text: String,
    pub color: String,
    pub style: QuoteStyle,
}

/// An element with its inline style kept as ordered declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub style: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>, children: Vec<Node>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attrs: Vec::new(),
            style: Vec::new(),
            children,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn style(&self, property: &str) -> Option<&str> {
        self.style
            .iter()
            .find(|(k, _)| k == property)
            .map(|(_, v)| v.as_str())
    }

    /// Set an inline style declaration, replacing an earlier one.
    pub fn set_style(&mut self, property: &str, value: impl Into<String>) {
        let value = value.into();
        match self.style.iter_mut().find(|(k, _)| k == property) {
            Some(decl) => decl.1 = value,
            None => self.style.push((property.to_string(), value)),
        }
    }

    pub fn is(&self, tags: &[&str]) -> bool {
        tags.iter().any(|t| *t == self.tag)
    }
}

/// A node of block content.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Quote(QuoteSpan),
    Element(Element),
}

impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Node::Text(s.into())
    }

    pub fn element(tag: &str, children: Vec<Node>) -> Self {
        Node::Element(Element::new(tag, children))
    }
}

/// Avatar sub-block.
#[derive(Debug, Clone, PartialEq)]
pub struct Avatar {
    pub src: String,
    /// Side length in layout pixels
    pub side: f32,
}

/// One message, styled and detached from the host.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBlock {
    pub id: u64,
    pub is_user: bool,
    pub background: String,
    pub avatar: Option<Avatar>,
    pub body: Vec<Node>,
}

impl NormalizedBlock {
    /// Concatenated text content of the body.
    pub fn visible_text(&self) -> String {
        text_content(&self.body)
    }

    /// Serialize the block as standalone markup with inline styles.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "<div data-mesid=\"{}\" style=\"background:{};padding:12px;border-radius:10px;display:flex;align-items:flex-start;gap:12px\">",
            self.id,
            escape_attr(&self.background)
        );
        if let Some(avatar) = &self.avatar {
            let _ = write!(
                out,
                "<div style=\"width:{s}px;height:{s}px;border-radius:8px;overflow:hidden;flex:0 0 {s}px;background:#666\"><img src=\"{src}\" style=\"width:100%;height:auto;display:block\"></div>",
                s = avatar.side,
                src = escape_attr(&avatar.src)
            );
        }
        out.push_str("<div>");
        out.push_str(&to_html(&self.body));
        out.push_str("</div></div>");
        out
    }
}

/// Text content of a node list, like the DOM's `textContent`.
pub fn text_content(nodes: &[Node]) -> String {
    let mut out = String::new();
    collect_text(nodes, &mut out);
    out
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Quote(q) => out.push_str(&q.text),
            Node::Element(e) => collect_text(&e.children, out),
        }
    }
}

/// Parse a markup fragment into nodes.
///
/// Whitespace-only text between top-level nodes is dropped; comments are
/// ignored.
pub fn parse_fragment(html: &str) -> Vec<Node> {
    let fragment = Html::parse_fragment(html);
    let root = fragment.root_element();
    convert_children(root)
        .into_iter()
        .filter(|n| !matches!(n, Node::Text(t) if t.trim().is_empty()))
        .collect()
}

fn convert_children(el: ElementRef<'_>) -> Vec<Node> {
    let mut out = Vec::new();
    for child in el.children() {
        match child.value() {
            scraper::Node::Text(t) => {
                let s: &str = t;
                if !s.is_empty() {
                    out.push(Node::Text(s.to_string()));
                }
            }
            scraper::Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    out.push(Node::Element(convert_element(child_el)));
                }
            }
            _ => {}
        }
    }
    out
}

fn convert_element(el: ElementRef<'_>) -> Element {
    let value = el.value();
    let mut element = Element::new(value.name(), convert_children(el));
    for (k, v) in value.attrs() {
        if k == "style" {
            element.style = parse_style(v);
        } else {
            element.attrs.push((k.to_string(), v.to_string()));
        }
    }
    element
}

fn parse_style(s: &str) -> Vec<(String, String)> {
    s.split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let k = k.trim().to_ascii_lowercase();
            let v = v.trim();
            if k.is_empty() || v.is_empty() {
                None
            } else {
                Some((k, v.to_string()))
            }
        })
        .collect()
}

/// Replace every element named in `tags` by its children.
pub fn unwrap_elements(nodes: Vec<Node>, tags: &[&str]) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Element(mut e) => {
                let children = unwrap_elements(std::mem::take(&mut e.children), tags);
                if e.is(tags) {
                    out.extend(children);
                } else {
                    e.children = children;
                    out.push(Node::Element(e));
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Visit every element in document order.
pub fn for_each_element_mut(nodes: &mut [Node], f: &mut dyn FnMut(&mut Element)) {
    for node in nodes {
        if let Node::Element(e) = node {
            f(e);
            for_each_element_mut(&mut e.children, f);
        }
    }
}

/// Serialize nodes back to markup.
pub fn to_html(nodes: &[Node]) -> String {
    let mut out = String::new();
    write_nodes(nodes, &mut out);
    out
}

fn write_nodes(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(&escape_text(t)),
            Node::Quote(q) => {
                let _ = write!(
                    out,
                    "<span style=\"color:{}\">{}</span>",
                    escape_attr(&q.color),
                    escape_text(&q.text)
                );
            }
            Node::Element(e) => {
                out.push('<');
                out.push_str(&e.tag);
                for (k, v) in &e.attrs {
                    let _ = write!(out, " {}=\"{}\"", k, escape_attr(v));
                }
                if !e.style.is_empty() {
                    let decls: Vec<String> =
                        e.style.iter().map(|(k, v)| format!("{}:{}", k, v)).collect();
                    let _ = write!(out, " style=\"{}\"", escape_attr(&decls.join(";")));
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&e.tag.as_str()) {
                    continue;
                }
                write_nodes(&e.children, out);
                let _ = write!(out, "</{}>", e.tag);
            }
        }
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}
