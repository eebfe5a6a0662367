/// Block layout in layout pixels
///
/// A normalized block is flattened into paragraphs of styled inline text,
/// wrapped greedily at the available width and positioned inside the block's
/// padding box, beside the avatar when there is one. Margins between
/// paragraphs collapse the way CSS block margins do.

use crate::block::{Element, Node, NormalizedBlock};
use crate::rendering::paint::Rgba;
use crate::rendering::Container;
use std::collections::VecDeque;

pub const BLOCK_PADDING: f32 = 12.0;
pub const AVATAR_GAP: f32 = 12.0;
pub const BLOCK_RADIUS: f32 = 10.0;
pub const AVATAR_RADIUS: f32 = 8.0;
/// Left indent of list items and blockquotes.
const INDENT: f32 = 40.0;

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre", "li", "section",
    "article", "header", "footer", "figure", "table", "thead", "tbody", "tr", "dl", "dt", "dd",
    "details", "summary",
];
const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];
const BOLD_TAGS: &[&str] = &["strong", "b", "h1", "h2", "h3", "h4", "h5", "h6", "th", "dt"];
const ITALIC_TAGS: &[&str] = &["em", "i", "cite", "var"];
const MONO_TAGS: &[&str] = &["code", "pre", "kbd", "samp", "tt"];
const SKIPPED_TAGS: &[&str] = &["script", "style", "head", "title", "template"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub color: Rgba,
    pub bold: bool,
    pub italic: bool,
    pub monospace: bool,
}

impl TextStyle {
    pub fn plain(color: Rgba) -> Self {
        Self {
            color,
            bold: false,
            italic: false,
            monospace: false,
        }
    }
}

/// Horizontal text metrics used for wrapping.
pub trait TextMetrics {
    fn advance(&self, ch: char, font_size: f32, style: &TextStyle) -> f32;

    fn ascent(&self, font_size: f32) -> f32 {
        font_size * 0.8
    }

    fn descent(&self, font_size: f32) -> f32 {
        font_size * 0.2
    }
}

/// Metrics without a font: narrow glyphs take 0.55em, wide ones a full em.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatedMetrics;

impl TextMetrics for EstimatedMetrics {
    fn advance(&self, ch: char, font_size: f32, style: &TextStyle) -> f32 {
        estimate_advance(ch, font_size, style)
    }
}

pub fn estimate_advance(ch: char, font_size: f32, style: &TextStyle) -> f32 {
    let em = if ch.is_whitespace() {
        0.3
    } else if is_wide(ch) {
        1.0
    } else if style.monospace {
        0.6
    } else {
        0.55
    };
    let bold = if style.bold { 1.05 } else { 1.0 };
    em * font_size * bold
}

/// East Asian wide and fullwidth characters, plus emoji. Lines may break
/// between any two of these.
pub fn is_wide(ch: char) -> bool {
    matches!(ch as u32,
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA000..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x1F300..=0x1F64F
        | 0x1F900..=0x1F9FF
        | 0x20000..=0x3FFFD)
}

/// A run of same-styled text placed inside a block.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f32,
    pub baseline: f32,
    pub width: f32,
    pub text: String,
    pub style: TextStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AvatarBox {
    pub rect: Rect,
    pub src: String,
}

/// Layout of one block. Coordinates are relative to the block's top-left
/// corner.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockLayout {
    pub id: u64,
    pub width: f32,
    pub height: f32,
    pub background: Rgba,
    pub avatar: Option<AvatarBox>,
    pub runs: Vec<TextRun>,
    pub rules: Vec<(Rect, Rgba)>,
    pub line_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedBlock {
    pub x: f32,
    pub y: f32,
    pub layout: BlockLayout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerLayout {
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
    pub blocks: Vec<PlacedBlock>,
}

/// Stack the container's blocks in a column separated by the container gap.
pub fn layout_container(container: &Container, metrics: &dyn TextMetrics) -> ContainerLayout {
    let mut y = container.padding;
    let mut blocks = Vec::with_capacity(container.blocks().len());
    for (i, block) in container.blocks().iter().enumerate() {
        if i > 0 {
            y += container.gap;
        }
        let layout = layout_block(block, container, metrics);
        let height = layout.height;
        blocks.push(PlacedBlock {
            x: container.padding,
            y,
            layout,
        });
        y += height;
    }
    ContainerLayout {
        width: container.outer_width(),
        height: y + container.padding,
        font_size: container.font_size,
        blocks,
    }
}

/// Lay out one block at the container's content width.
pub fn layout_block(
    block: &NormalizedBlock,
    container: &Container,
    metrics: &dyn TextMetrics,
) -> BlockLayout {
    let avatar = block.avatar.as_ref().map(|a| AvatarBox {
        rect: Rect::new(BLOCK_PADDING, BLOCK_PADDING, a.side, a.side),
        src: a.src.clone(),
    });
    let text_x = BLOCK_PADDING + avatar.as_ref().map_or(0.0, |a| a.rect.width + AVATAR_GAP);
    let avail = (container.width - text_x - BLOCK_PADDING).max(container.font_size);

    let mut flow = FlowBuilder::new(container);
    let base = TextStyle::plain(container.text_color);
    let ctx = Context::default();
    flow.walk(&block.body, base, ctx);
    flow.flush(ctx);

    let mut text = TextPlacer {
        container,
        metrics,
        origin_x: text_x,
        origin_y: BLOCK_PADDING,
        avail,
        runs: Vec::new(),
        rules: Vec::new(),
        line_count: 0,
    };
    let text_height = text.place(&flow.paragraphs);

    let avatar_height = avatar.as_ref().map_or(0.0, |a| a.rect.height);
    BlockLayout {
        id: block.id,
        width: container.width,
        height: text_height.max(avatar_height) + 2.0 * BLOCK_PADDING,
        background: Rgba::parse(&block.background).unwrap_or(container.background),
        avatar,
        runs: text.runs,
        rules: text.rules,
        line_count: text.line_count,
    }
}

#[derive(Debug, Clone)]
enum Inline {
    Text(String, TextStyle),
    Break,
}

#[derive(Debug)]
struct Paragraph {
    inlines: Vec<Inline>,
    indent: f32,
    margin_top: f32,
    margin_bottom: f32,
    pre: bool,
    rule: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct Context {
    indent: f32,
    pre: bool,
    list_depth: usize,
}

struct FlowBuilder<'c> {
    container: &'c Container,
    paragraphs: Vec<Paragraph>,
    current: Vec<Inline>,
    marker: Option<Inline>,
}

impl<'c> FlowBuilder<'c> {
    fn new(container: &'c Container) -> Self {
        Self {
            container,
            paragraphs: Vec::new(),
            current: Vec::new(),
            marker: None,
        }
    }

    /// Close the pending inline content into a paragraph. Whitespace-only
    /// content is dropped and a pending list marker waits for real text.
    fn flush(&mut self, ctx: Context) {
        let mut inlines = std::mem::take(&mut self.current);
        let has_content = inlines.iter().any(|i| match i {
            Inline::Text(t, _) => {
                if ctx.pre {
                    !t.is_empty()
                } else {
                    !t.trim().is_empty()
                }
            }
            Inline::Break => true,
        });
        if !has_content {
            return;
        }
        if let Some(marker) = self.marker.take() {
            inlines.insert(0, marker);
        }
        self.paragraphs.push(Paragraph {
            inlines,
            indent: ctx.indent,
            margin_top: 0.0,
            margin_bottom: 0.0,
            pre: ctx.pre,
            rule: false,
        });
    }

    fn walk(&mut self, nodes: &[Node], style: TextStyle, ctx: Context) {
        for node in nodes {
            match node {
                Node::Text(t) => self.current.push(Inline::Text(t.clone(), style)),
                Node::Quote(q) => {
                    let color = Rgba::parse(&q.color).unwrap_or(style.color);
                    self.current
                        .push(Inline::Text(q.text.clone(), TextStyle { color, ..style }));
                }
                Node::Element(e) => self.element(e, style, ctx),
            }
        }
    }

    fn element(&mut self, e: &Element, style: TextStyle, ctx: Context) {
        let style = self.style_for(e, style);
        match e.tag.as_str() {
            "br" => self.current.push(Inline::Break),
            "img" => {
                if let Some(alt) = e.attr("alt").filter(|a| !a.trim().is_empty()) {
                    self.current.push(Inline::Text(alt.to_string(), style));
                }
            }
            "hr" => {
                self.flush(ctx);
                let half = self.container.font_size / 2.0;
                self.paragraphs.push(Paragraph {
                    inlines: Vec::new(),
                    indent: ctx.indent,
                    margin_top: half,
                    margin_bottom: half,
                    pre: false,
                    rule: true,
                });
            }
            "ul" | "ol" => self.list(e, style, ctx),
            tag if SKIPPED_TAGS.contains(&tag) => {}
            tag if BLOCK_TAGS.contains(&tag) => {
                self.flush(ctx);
                let inner = Context {
                    indent: ctx.indent + if tag == "blockquote" { INDENT } else { 0.0 },
                    pre: ctx.pre || tag == "pre",
                    ..ctx
                };
                let first = self.paragraphs.len();
                self.walk(&e.children, style, inner);
                self.flush(inner);
                let (top, bottom) = self.margins(e, ctx);
                self.apply_margins(first, top, bottom);
            }
            _ => self.walk(&e.children, style, ctx),
        }
    }

    fn list(&mut self, e: &Element, style: TextStyle, ctx: Context) {
        self.flush(ctx);
        let first = self.paragraphs.len();
        let inner = Context {
            indent: ctx.indent + INDENT,
            list_depth: ctx.list_depth + 1,
            ..ctx
        };
        let ordered = e.tag == "ol";
        let mut n: usize = e.attr("start").and_then(|s| s.parse().ok()).unwrap_or(1);

        for child in &e.children {
            match child {
                Node::Element(li) if li.tag == "li" => {
                    let marker = if ordered {
                        format!("{}. ", n)
                    } else {
                        "• ".to_string()
                    };
                    n += 1;
                    self.flush(inner);
                    self.marker = Some(Inline::Text(marker, style));
                    let li_style = self.style_for(li, style);
                    self.walk(&li.children, li_style, inner);
                    self.flush(inner);
                    self.marker = None;
                }
                other => self.walk(std::slice::from_ref(other), style, inner),
            }
        }
        self.flush(inner);
        let (top, bottom) = self.margins(e, ctx);
        self.apply_margins(first, top, bottom);
    }

    fn style_for(&self, e: &Element, mut style: TextStyle) -> TextStyle {
        if e.is(BOLD_TAGS) {
            style.bold = true;
        }
        if e.is(ITALIC_TAGS) {
            style.italic = true;
            style.color = self.container.italic_color;
        }
        if e.is(MONO_TAGS) {
            style.monospace = true;
        }
        if let Some(color) = e.style("color").and_then(Rgba::parse) {
            style.color = color;
        }
        if let Some(weight) = e.style("font-weight") {
            style.bold = matches!(weight.trim(), "bold" | "bolder")
                || weight.trim().parse::<u32>().map_or(false, |w| w >= 600);
        }
        if let Some(font_style) = e.style("font-style") {
            style.italic = matches!(font_style.trim(), "italic" | "oblique");
        }
        style
    }

    /// Default and inline vertical margins of a block-level element.
    fn margins(&self, e: &Element, ctx: Context) -> (f32, f32) {
        let fs = self.container.font_size;
        let (mut top, mut bottom) = match e.tag.as_str() {
            "p" | "blockquote" | "pre" | "dl" | "figure" => (fs, fs),
            "ul" | "ol" if ctx.list_depth == 0 => (fs, fs),
            tag if HEADING_TAGS.contains(&tag) => (fs * 0.67, fs * 0.67),
            _ => (0.0, 0.0),
        };
        if let Some((t, b)) = e.style("margin").and_then(|m| parse_margin(m, fs)) {
            top = t;
            bottom = b;
        }
        if let Some(t) = e.style("margin-top").and_then(|v| parse_length(v, fs)) {
            top = t;
        }
        if let Some(b) = e.style("margin-bottom").and_then(|v| parse_length(v, fs)) {
            bottom = b;
        }
        (top, bottom)
    }

    fn apply_margins(&mut self, first: usize, top: f32, bottom: f32) {
        let len = self.paragraphs.len();
        if first >= len {
            return;
        }
        let head = &mut self.paragraphs[first];
        head.margin_top = head.margin_top.max(top);
        let tail = &mut self.paragraphs[len - 1];
        tail.margin_bottom = tail.margin_bottom.max(bottom);
    }
}

/// `px`, `em` or unitless zero.
fn parse_length(value: &str, font_size: f32) -> Option<f32> {
    let v = value.trim();
    if let Some(px) = v.strip_suffix("px") {
        return px.trim().parse().ok();
    }
    if let Some(em) = v.strip_suffix("em") {
        return em.trim().parse::<f32>().ok().map(|e| e * font_size);
    }
    v.parse::<f32>().ok().filter(|n| *n == 0.0)
}

/// Top and bottom from a 1 to 4 value `margin` shorthand.
fn parse_margin(value: &str, font_size: f32) -> Option<(f32, f32)> {
    let parts: Vec<f32> = value
        .split_whitespace()
        .map(|p| parse_length(p, font_size))
        .collect::<Option<_>>()?;
    match parts.len() {
        1 | 2 => Some((parts[0], parts[0])),
        3 | 4 => Some((parts[0], parts[2])),
        _ => None,
    }
}

#[derive(Debug, Clone)]
enum Token {
    Word(String, TextStyle, f32),
    Space(TextStyle, f32),
    Break,
}

struct TextPlacer<'a> {
    container: &'a Container,
    metrics: &'a dyn TextMetrics,
    origin_x: f32,
    origin_y: f32,
    avail: f32,
    runs: Vec<TextRun>,
    rules: Vec<(Rect, Rgba)>,
    line_count: usize,
}

impl<'a> TextPlacer<'a> {
    /// Place every paragraph and return the total text height, margins
    /// included.
    fn place(&mut self, paragraphs: &[Paragraph]) -> f32 {
        let lh = self.container.line_height;
        let mut y = 0.0;
        let mut prev_bottom: Option<f32> = None;

        for p in paragraphs {
            y += match prev_bottom {
                None => p.margin_top,
                Some(bottom) => bottom.max(p.margin_top),
            };
            let width = (self.avail - p.indent).max(self.container.font_size);
            if p.rule {
                let color = Rgba {
                    a: 96,
                    ..self.container.text_color
                };
                let rect = Rect::new(self.origin_x + p.indent, self.origin_y + y, width, 1.0);
                self.rules.push((rect, color));
                y += 1.0;
            } else {
                let tokens = self.tokenize(&p.inlines, p.pre);
                let lines = self.break_lines(tokens, width, p.pre);
                for (i, line) in lines.iter().enumerate() {
                    self.emit_line(line, p.indent, y + i as f32 * lh);
                }
                self.line_count += lines.len();
                y += lines.len() as f32 * lh;
            }
            prev_bottom = Some(p.margin_bottom);
        }
        y + prev_bottom.unwrap_or(0.0)
    }

    fn width_of(&self, text: &str, style: &TextStyle) -> f32 {
        let fs = self.container.font_size;
        text.chars().map(|c| self.metrics.advance(c, fs, style)).sum()
    }

    fn tokenize(&self, inlines: &[Inline], pre: bool) -> Vec<Token> {
        let fs = self.container.font_size;
        let mut tokens = Vec::new();
        for inline in inlines {
            let (text, style) = match inline {
                Inline::Break => {
                    tokens.push(Token::Break);
                    continue;
                }
                Inline::Text(text, style) => (text, *style),
            };
            let mut word = String::new();
            let flush = |word: &mut String, tokens: &mut Vec<Token>| {
                if !word.is_empty() {
                    let w = self.width_of(word, &style);
                    tokens.push(Token::Word(std::mem::take(word), style, w));
                }
            };
            for ch in text.chars() {
                if ch == '\n' && pre {
                    flush(&mut word, &mut tokens);
                    tokens.push(Token::Break);
                } else if ch.is_whitespace() {
                    flush(&mut word, &mut tokens);
                    if pre || !matches!(tokens.last(), Some(Token::Space(..))) {
                        tokens.push(Token::Space(style, self.metrics.advance(' ', fs, &style)));
                    }
                } else if is_wide(ch) {
                    flush(&mut word, &mut tokens);
                    let w = self.metrics.advance(ch, fs, &style);
                    tokens.push(Token::Word(ch.to_string(), style, w));
                } else {
                    word.push(ch);
                }
            }
            flush(&mut word, &mut tokens);
        }
        tokens
    }

    fn break_lines(&self, tokens: Vec<Token>, avail: f32, pre: bool) -> Vec<Vec<Token>> {
        let mut lines = Vec::new();
        let mut line: Vec<Token> = Vec::new();
        let mut x = 0.0f32;
        let mut queue: VecDeque<Token> = tokens.into();

        while let Some(tok) = queue.pop_front() {
            match tok {
                Token::Break => {
                    trim_trailing_spaces(&mut line);
                    lines.push(std::mem::take(&mut line));
                    x = 0.0;
                }
                Token::Space(_, w) => {
                    if line.is_empty() && !pre {
                        continue;
                    }
                    line.push(tok);
                    x += w;
                }
                Token::Word(ref text, style, w) => {
                    let blank = line.iter().all(|t| matches!(t, Token::Space(..)));
                    if x + w > avail && !blank {
                        trim_trailing_spaces(&mut line);
                        lines.push(std::mem::take(&mut line));
                        x = 0.0;
                        queue.push_front(tok);
                        continue;
                    }
                    if x + w > avail && text.chars().count() > 1 {
                        let (head, tail) = self.split_to_fit(text, &style, avail - x);
                        let (hw, tw) = (self.width_of(&head, &style), self.width_of(&tail, &style));
                        queue.push_front(Token::Word(tail, style, tw));
                        queue.push_front(Token::Word(head, style, hw));
                        continue;
                    }
                    x += w;
                    line.push(tok);
                }
            }
        }
        trim_trailing_spaces(&mut line);
        if !line.is_empty() || lines.is_empty() {
            lines.push(line);
        }
        lines
    }

    /// Longest prefix that fits in `room`, at least one character.
    fn split_to_fit(&self, text: &str, style: &TextStyle, room: f32) -> (String, String) {
        let fs = self.container.font_size;
        let mut used = 0.0;
        let mut cut = 0;
        for (i, ch) in text.char_indices() {
            let w = self.metrics.advance(ch, fs, style);
            if i > 0 && used + w > room {
                break;
            }
            used += w;
            cut = i + ch.len_utf8();
        }
        (text[..cut].to_string(), text[cut..].to_string())
    }

    fn emit_line(&mut self, line: &[Token], indent: f32, top: f32) {
        let fs = self.container.font_size;
        let lh = self.container.line_height;
        let ascent = self.metrics.ascent(fs);
        let content = ascent + self.metrics.descent(fs);
        let baseline = self.origin_y + top + (lh - content) / 2.0 + ascent;
        let mut x = self.origin_x + indent;

        for tok in line {
            let (text, style, w) = match tok {
                Token::Word(text, style, w) => (text.as_str(), *style, *w),
                Token::Space(style, w) => (" ", *style, *w),
                Token::Break => continue,
            };
            match self.runs.last_mut() {
                Some(run) if run.style == style && run.baseline == baseline => {
                    run.text.push_str(text);
                    run.width += w;
                }
                _ => self.runs.push(TextRun {
                    x,
                    baseline,
                    width: w,
                    text: text.to_string(),
                    style,
                }),
            }
            x += w;
        }
    }
}

fn trim_trailing_spaces(line: &mut Vec<Token>) {
    while matches!(line.last(), Some(Token::Space(..))) {
        line.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{parse_fragment, Avatar};
    use crate::config::SnapConfig;

    fn container() -> Container {
        Container::from_config(&SnapConfig::default()).unwrap()
    }

    fn block(html: &str, avatar: bool) -> NormalizedBlock {
        NormalizedBlock {
            id: 1,
            is_user: false,
            background: "#202020".into(),
            avatar: avatar.then(|| Avatar {
                src: "a.png".into(),
                side: 50.0,
            }),
            body: parse_fragment(html),
        }
    }

    fn lines(layout: &BlockLayout) -> Vec<String> {
        let mut out: Vec<(f32, String)> = Vec::new();
        for run in &layout.runs {
            match out.last_mut() {
                Some((b, text)) if *b == run.baseline => text.push_str(&run.text),
                _ => out.push((run.baseline, run.text.clone())),
            }
        }
        out.into_iter().map(|(_, t)| t).collect()
    }

    #[test]
    fn single_line_paragraph_height() {
        let c = container();
        let layout = layout_block(&block("<p style=\"margin:0 0 8px 0\">hello</p>", false), &c, &EstimatedMetrics);
        assert_eq!(layout.line_count, 1);
        // 12.8 line + 8 margin + 2 * 12 padding
        assert!((layout.height - 44.8).abs() < 0.01, "{}", layout.height);
        assert_eq!(lines(&layout), vec!["hello"]);
    }

    #[test]
    fn avatar_sets_minimum_height_and_shifts_text() {
        let c = container();
        let layout = layout_block(&block("<p>hi</p>", true), &c, &EstimatedMetrics);
        assert_eq!(layout.height, 50.0 + 24.0);
        assert_eq!(layout.runs[0].x, BLOCK_PADDING + 50.0 + AVATAR_GAP);
        let avatar = layout.avatar.unwrap();
        assert_eq!(avatar.rect, Rect::new(12.0, 12.0, 50.0, 50.0));
    }

    #[test]
    fn long_text_wraps_within_width() {
        let c = container();
        let text = "word ".repeat(200);
        let layout = layout_block(&block(&format!("<p>{}</p>", text), false), &c, &EstimatedMetrics);
        assert!(layout.line_count > 5);
        let right = c.width - BLOCK_PADDING;
        for run in &layout.runs {
            assert!(run.x + run.width <= right + 0.01, "{:?}", run);
            assert!(!run.text.starts_with(' '));
        }
    }

    #[test]
    fn cjk_breaks_between_characters() {
        let c = container();
        let text = "漢".repeat(100);
        let layout = layout_block(&block(&format!("<p>{}</p>", text), false), &c, &EstimatedMetrics);
        let per_line = ((c.width - 2.0 * BLOCK_PADDING) / c.font_size).floor() as usize;
        let got = lines(&layout);
        assert_eq!(got[0].chars().count(), per_line);
        assert_eq!(got.concat(), text);
    }

    #[test]
    fn unbreakable_word_is_split() {
        let c = container();
        let text = "x".repeat(300);
        let layout = layout_block(&block(&format!("<p>{}</p>", text), false), &c, &EstimatedMetrics);
        assert!(layout.line_count > 1);
        assert_eq!(lines(&layout).concat(), text);
    }

    #[test]
    fn margins_collapse_between_paragraphs() {
        let c = container();
        let lh = c.line_height;
        let one = layout_block(&block("<p style=\"margin:0 0 8px 0\">a</p>", false), &c, &EstimatedMetrics);
        let two = layout_block(
            &block("<p style=\"margin:0 0 8px 0\">a</p><p style=\"margin:0 0 8px 0\">b</p>", false),
            &c,
            &EstimatedMetrics,
        );
        assert!((two.height - one.height - (lh + 8.0)).abs() < 0.01);
    }

    #[test]
    fn lists_get_markers_and_indent() {
        let c = container();
        let layout = layout_block(
            &block("<ul><li>one</li><li>two</li></ul><ol start=\"3\"><li>three</li></ol>", false),
            &c,
            &EstimatedMetrics,
        );
        assert_eq!(lines(&layout), vec!["• one", "• two", "3. three"]);
        assert_eq!(layout.runs[0].x, BLOCK_PADDING + INDENT);
    }

    #[test]
    fn styles_follow_elements_and_quotes() {
        let c = container();
        let mut b = block("<p>a <strong>b</strong> <em>c</em></p>", false);
        b.body = crate::highlight::highlight(
            b.body,
            &crate::highlight::QuoteColors {
                quote: "#ff0000".into(),
                bracket: "#00ff00".into(),
            },
        );
        let layout = layout_block(&b, &c, &EstimatedMetrics);
        let bold = layout.runs.iter().find(|r| r.text == "b").unwrap();
        assert!(bold.style.bold);
        let em = layout.runs.iter().find(|r| r.text == "c").unwrap();
        assert!(em.style.italic);
        assert_eq!(em.style.color, c.italic_color);

        let q = layout_block(&{
            let mut b = block("<p>say \"hi\"</p>", false);
            b.body = crate::highlight::highlight(
                b.body,
                &crate::highlight::QuoteColors {
                    quote: "#ff0000".into(),
                    bracket: "#00ff00".into(),
                },
            );
            b
        }, &c, &EstimatedMetrics);
        let quoted = q.runs.iter().find(|r| r.text == "\"hi\"").unwrap();
        assert_eq!(quoted.style.color, Rgba::opaque(255, 0, 0));
    }

    #[test]
    fn br_and_pre_force_breaks() {
        let c = container();
        let layout = layout_block(&block("<p>a<br>b</p><pre><code>x\ny\n</code></pre>", false), &c, &EstimatedMetrics);
        assert_eq!(lines(&layout), vec!["a", "b", "x", "y"]);
    }

    #[test]
    fn empty_body_is_padding_only() {
        let c = container();
        let layout = layout_block(&block("", false), &c, &EstimatedMetrics);
        assert_eq!(layout.height, 2.0 * BLOCK_PADDING);
        assert!(layout.runs.is_empty());
    }

    #[test]
    fn container_stacks_blocks_with_gap() {
        let mut c = container();
        c.attach(vec![block("<p>a</p>", true), block("<p>b</p>", true)]);
        let layout = layout_container(&c, &EstimatedMetrics);
        assert_eq!(layout.blocks.len(), 2);
        assert_eq!(layout.blocks[0].y, c.padding);
        assert_eq!(layout.blocks[1].y, c.padding + 74.0 + c.gap);
        assert_eq!(layout.height, c.padding * 2.0 + 74.0 * 2.0 + c.gap);
        assert_eq!(layout.width, c.width + 2.0 * c.padding);
    }

    #[test]
    fn margin_shorthand_parsing() {
        assert_eq!(parse_margin("0 0 8px 0", 8.0), Some((0.0, 8.0)));
        assert_eq!(parse_margin("1em", 8.0), Some((8.0, 8.0)));
        assert_eq!(parse_margin("auto", 8.0), None);
        assert_eq!(parse_length("3", 8.0), None);
    }
}
