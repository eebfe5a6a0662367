/// Colors and the paint command set produced from a container layout

use crate::rendering::layout::{ContainerLayout, Rect, TextStyle, AVATAR_RADIUS, BLOCK_RADIUS};

/// Straight (non-premultiplied) RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);
    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);
    /// Avatar holder background.
    pub const AVATAR_HOLDER: Rgba = Rgba::opaque(0x66, 0x66, 0x66);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse a CSS color: `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb()`, `rgba()`
    /// or a handful of named colors.
    pub fn parse(s: &str) -> Option<Rgba> {
        let s = s.trim().to_ascii_lowercase();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        if let Some(args) = s
            .strip_prefix("rgba(")
            .or_else(|| s.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let parts: Vec<&str> = args.split(',').map(|p| p.trim()).collect();
            if parts.len() != 3 && parts.len() != 4 {
                return None;
            }
            let channel = |p: &str| p.parse::<f32>().ok().map(|v| v.clamp(0.0, 255.0).round() as u8);
            let a = match parts.get(3) {
                Some(p) => (p.parse::<f32>().ok()?.clamp(0.0, 1.0) * 255.0).round() as u8,
                None => 255,
            };
            return Some(Rgba {
                r: channel(parts[0])?,
                g: channel(parts[1])?,
                b: channel(parts[2])?,
                a,
            });
        }
        match s.as_str() {
            "black" => Some(Rgba::BLACK),
            "white" => Some(Rgba::WHITE),
            "red" => Some(Rgba::opaque(255, 0, 0)),
            "green" => Some(Rgba::opaque(0, 128, 0)),
            "blue" => Some(Rgba::opaque(0, 0, 255)),
            "gray" | "grey" => Some(Rgba::opaque(128, 128, 128)),
            "orange" => Some(Rgba::opaque(255, 165, 0)),
            "transparent" => Some(Rgba { r: 0, g: 0, b: 0, a: 0 }),
            _ => None,
        }
    }

    pub fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    let digit = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
    let pair = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        3 => Some(Rgba::opaque(digit(0)? * 17, digit(1)? * 17, digit(2)? * 17)),
        6 => Some(Rgba::opaque(pair(0)?, pair(2)?, pair(4)?)),
        8 => Some(Rgba {
            r: pair(0)?,
            g: pair(2)?,
            b: pair(4)?,
            a: pair(6)?,
        }),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        rect: Rect,
        radius: f32,
        rgba: Rgba,
    },
    Image {
        /// Holder box the image is clipped to
        rect: Rect,
        radius: f32,
        src: String,
    },
    Text {
        x: f32,
        baseline: f32,
        font_size: f32,
        text: String,
        style: TextStyle,
    },
}

/// Flatten a container layout into paint commands, back to front, in layout
/// pixels. The canvas background is not part of the list; the rasterizer
/// fills it from its explicit background option.
pub fn display_list(layout: &ContainerLayout) -> Vec<PaintCommand> {
    let mut cmds = Vec::new();
    for placed in &layout.blocks {
        let (ox, oy) = (placed.x, placed.y);
        let block = &placed.layout;
        cmds.push(PaintCommand::SolidRect {
            rect: Rect::new(ox, oy, block.width, block.height),
            radius: BLOCK_RADIUS,
            rgba: block.background,
        });
        if let Some(avatar) = &block.avatar {
            let rect = avatar.rect.offset(ox, oy);
            cmds.push(PaintCommand::SolidRect {
                rect,
                radius: AVATAR_RADIUS,
                rgba: Rgba::AVATAR_HOLDER,
            });
            cmds.push(PaintCommand::Image {
                rect,
                radius: AVATAR_RADIUS,
                src: avatar.src.clone(),
            });
        }
        for (rect, rgba) in &block.rules {
            cmds.push(PaintCommand::SolidRect {
                rect: rect.offset(ox, oy),
                radius: 0.0,
                rgba: *rgba,
            });
        }
        for run in &block.runs {
            cmds.push(PaintCommand::Text {
                x: ox + run.x,
                baseline: oy + run.baseline,
                font_size: layout.font_size,
                text: run.text.clone(),
                style: run.style,
            });
        }
    }
    cmds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_css_colors() {
        assert_eq!(Rgba::parse("#fff"), Some(Rgba::WHITE));
        assert_eq!(Rgba::parse("#313131"), Some(Rgba::opaque(0x31, 0x31, 0x31)));
        assert_eq!(Rgba::parse("#E18A24"), Some(Rgba::opaque(0xe1, 0x8a, 0x24)));
        assert_eq!(
            Rgba::parse("#00000080"),
            Some(Rgba { r: 0, g: 0, b: 0, a: 0x80 })
        );
        assert_eq!(Rgba::parse("rgb(1, 2, 3)"), Some(Rgba::opaque(1, 2, 3)));
        assert_eq!(
            Rgba::parse("rgba(0,0,0,.5)"),
            Some(Rgba { r: 0, g: 0, b: 0, a: 128 })
        );
        assert_eq!(Rgba::parse("Black"), Some(Rgba::BLACK));
        assert_eq!(Rgba::parse("#12345"), None);
        assert_eq!(Rgba::parse("nope"), None);
    }

    #[test]
    fn avatar_is_painted_over_holder_before_text() {
        use crate::block::{parse_fragment, Avatar, NormalizedBlock};
        use crate::rendering::layout::{layout_container, EstimatedMetrics};
        use crate::rendering::Container;
        use crate::SnapConfig;

        let mut c = Container::from_config(&SnapConfig::default()).unwrap();
        c.attach(vec![NormalizedBlock {
            id: 0,
            is_user: false,
            background: "#202020".into(),
            avatar: Some(Avatar {
                src: "coco.png".into(),
                side: 50.0,
            }),
            body: parse_fragment("<p>hi there</p>"),
        }]);
        let layout = layout_container(&c, &EstimatedMetrics);
        let cmds = display_list(&layout);
        let placed = &layout.blocks[0];

        match &cmds[0] {
            PaintCommand::SolidRect { rect, rgba, radius } => {
                assert_eq!(rect.x, placed.x);
                assert_eq!(rect.y, placed.y);
                assert_eq!(*rgba, Rgba::opaque(0x20, 0x20, 0x20));
                assert_eq!(*radius, BLOCK_RADIUS);
            }
            other => panic!("expected block background, got {:?}", other),
        }
        let holder = match &cmds[1] {
            PaintCommand::SolidRect { rect, rgba, radius } => {
                assert_eq!(*rgba, Rgba::AVATAR_HOLDER);
                assert_eq!(*radius, AVATAR_RADIUS);
                *rect
            }
            other => panic!("expected avatar holder, got {:?}", other),
        };
        match &cmds[2] {
            PaintCommand::Image { rect, src, .. } => {
                assert_eq!(src, "coco.png");
                assert_eq!(*rect, holder);
                assert!(rect.x >= placed.x && rect.y >= placed.y);
            }
            other => panic!("expected avatar image, got {:?}", other),
        }
        assert!(cmds.len() > 3);
        assert!(cmds[3..]
            .iter()
            .all(|c| matches!(c, PaintCommand::Text { .. })));
        let text: Vec<&str> = cmds[3..]
            .iter()
            .filter_map(|c| match c {
                PaintCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text.join(" ").split_whitespace().collect::<Vec<_>>(), ["hi", "there"]);
    }
}
