//! Message normalization
//!
//! Turns one host message into a [`NormalizedBlock`]: spans are flattened so
//! host styles cannot bleed through, the markup is round-tripped through
//! Markdown, quotations are highlighted, emphasis is recolored and paragraph
//! spacing is pinned.

use crate::block::{self, Avatar, Node, NormalizedBlock};
use crate::config::SnapConfig;
use crate::convert::TextConverter;
use crate::highlight::{self, QuoteColors};
use crate::transcript::MessageElement;
use crate::Result;

/// Inline grouping elements that are unwrapped before conversion.
const FLATTENED_TAGS: &[&str] = &["span"];

/// Bottom-only paragraph margin applied to every `p`.
pub const PARAGRAPH_MARGIN: &str = "0 0 8px 0";

pub struct Normalizer<'a, C: TextConverter + ?Sized> {
    config: &'a SnapConfig,
    converter: &'a C,
    colors: QuoteColors,
}

impl<'a, C: TextConverter + ?Sized> Normalizer<'a, C> {
    pub fn new(config: &'a SnapConfig, converter: &'a C) -> Self {
        Self {
            config,
            converter,
            colors: QuoteColors::from_config(config),
        }
    }

    /// Build the styled block for `message`. The message itself is not touched.
    pub fn normalize(&self, message: &MessageElement) -> Result<NormalizedBlock> {
        let flattened = block::unwrap_elements(block::parse_fragment(&message.html), FLATTENED_TAGS);
        let clean = self.converter.round_trip(&block::to_html(&flattened))?;

        let mut body = highlight::highlight(block::parse_fragment(&clean), &self.colors);
        self.apply_text_styles(&mut body);

        let avatar = match (&message.avatar_url, self.config.show_avatar) {
            (Some(src), true) => Some(Avatar {
                src: src.clone(),
                side: self.config.layout_avatar_side(),
            }),
            _ => None,
        };

        Ok(NormalizedBlock {
            id: message.id,
            is_user: message.is_user,
            background: self.config.block_background(message.is_user).to_string(),
            avatar,
            body,
        })
    }

    fn apply_text_styles(&self, body: &mut [Node]) {
        let italic = self.config.italic_color.as_str();
        block::for_each_element_mut(body, &mut |e: &mut block::Element| {
            if e.is(&["em", "i"]) {
                e.set_style("color", italic);
            } else if e.tag == "p" {
                e.set_style("margin", PARAGRAPH_MARGIN);
            }
        });
    }
}
