/// Built-in raster backend: layout, display list, tiny-skia canvas

use crate::block::NormalizedBlock;
use crate::config::SnapConfig;
use crate::rendering::avatar::AvatarLoader;
use crate::rendering::font::{FontFace, FontMetrics};
use crate::rendering::layout::{layout_block, layout_container, Rect, TextMetrics, TextStyle};
use crate::rendering::paint::{display_list, PaintCommand, Rgba};
use crate::rendering::{Container, RasterBackend, RenderOptions};
use crate::{Error, Result};
use image::imageops::FilterType;
use image::RgbaImage;
use std::path::Path;
use tiny_skia::{
    FillRule, Mask, Paint, Path as SkPath, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform,
};

/// Cubic approximation constant for quarter circles.
const KAPPA: f32 = 0.552_284_8;

/// Paints blocks with tiny-skia. Text uses glyph outlines when a font is
/// available and placeholder ink boxes otherwise.
#[derive(Debug, Default)]
pub struct BlockPainter {
    font: Option<FontFace>,
    avatars: AvatarLoader,
}

impl BlockPainter {
    pub fn new(font: Option<FontFace>, avatars: AvatarLoader) -> Self {
        Self { font, avatars }
    }

    /// Painter for `cfg`. A configured `fontFile` must load; otherwise the
    /// family list is looked up in the system font directories.
    pub fn from_config(cfg: &SnapConfig, avatar_base: Option<String>) -> Result<Self> {
        let font = match &cfg.font_file {
            Some(path) => Some(FontFace::from_file(Path::new(path))?),
            None => {
                let found = FontFace::find_system(&cfg.f_family);
                if found.is_none() {
                    log::warn!(
                        "no usable font for {:?}; text is drawn as placeholder boxes",
                        cfg.f_family
                    );
                }
                found
            }
        };
        if let Some(f) = &font {
            log::debug!("painting text with {}", f.source());
        }
        Ok(Self::new(font, AvatarLoader::new(avatar_base)))
    }

    pub fn font(&self) -> Option<&FontFace> {
        self.font.as_ref()
    }

    fn metrics(&self) -> FontMetrics<'_> {
        FontMetrics {
            font: self.font.as_ref(),
        }
    }

    fn execute(&self, pixmap: &mut Pixmap, cmd: &PaintCommand, scale: f32) {
        match cmd {
            PaintCommand::SolidRect { rect, radius, rgba } => {
                if let Some(path) = rounded_rect(scaled(rect, scale), radius * scale) {
                    pixmap.fill_path(
                        &path,
                        &fill_paint(*rgba),
                        FillRule::Winding,
                        Transform::identity(),
                        None,
                    );
                }
            }
            PaintCommand::Image { rect, radius, src } => {
                // The holder is already painted; a missing image leaves it bare.
                if let Some(img) = self.avatars.load(src) {
                    draw_image(pixmap, &img, scaled(rect, scale), radius * scale);
                }
            }
            PaintCommand::Text {
                x,
                baseline,
                font_size,
                text,
                style,
            } => self.draw_text(pixmap, *x, *baseline, *font_size, text, style, scale),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_text(
        &self,
        pixmap: &mut Pixmap,
        x: f32,
        baseline: f32,
        font_size: f32,
        text: &str,
        style: &TextStyle,
        scale: f32,
    ) {
        let metrics = self.metrics();
        let paint = fill_paint(style.color);
        let px_size = font_size * scale;
        let base_y = baseline * scale;
        let mut pen = x * scale;

        for ch in text.chars() {
            let advance = metrics.advance(ch, font_size, style) * scale;
            if !ch.is_whitespace() {
                let glyph = self
                    .font
                    .as_ref()
                    .and_then(|f| f.glyph_path(ch, pen, base_y, px_size, style.italic));
                match glyph {
                    Some(path) => {
                        pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
                        if style.bold {
                            let stroke = Stroke {
                                width: px_size * 0.04,
                                ..Stroke::default()
                            };
                            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
                        }
                    }
                    None => {
                        let ink = Rect::new(pen + advance * 0.1, base_y - px_size * 0.7, advance * 0.8, px_size * 0.7);
                        if let Some(path) = rounded_rect(ink, 0.0) {
                            pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
                        }
                    }
                }
            }
            pen += advance;
        }
    }
}

impl RasterBackend for BlockPainter {
    fn measure(&self, container: &Container, block: &NormalizedBlock) -> Result<f32> {
        Ok(layout_block(block, container, &self.metrics()).height)
    }

    fn rasterize(&self, container: &Container, options: &RenderOptions) -> Result<Pixmap> {
        let layout = layout_container(container, &self.metrics());
        let width = (layout.width * options.scale).ceil().max(1.0) as u32;
        let height = (layout.height * options.scale).ceil().max(1.0) as u32;
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            Error::RenderError(format!("cannot allocate a {}x{} canvas", width, height))
        })?;
        pixmap.fill(options.background.to_skia());

        let commands = display_list(&layout);
        log::debug!(
            "painting {} command(s) onto {}x{} at scale {}",
            commands.len(),
            width,
            height,
            options.scale
        );
        for cmd in &commands {
            self.execute(&mut pixmap, cmd, options.scale);
        }
        Ok(pixmap)
    }
}

fn scaled(rect: &Rect, scale: f32) -> Rect {
    Rect::new(rect.x * scale, rect.y * scale, rect.width * scale, rect.height * scale)
}

fn fill_paint(rgba: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(rgba.to_skia());
    paint.anti_alias = true;
    paint
}

fn rounded_rect(rect: Rect, radius: f32) -> Option<SkPath> {
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return None;
    }
    let r = radius.min(rect.width / 2.0).min(rect.height / 2.0);
    if r <= 0.0 {
        let sk = tiny_skia::Rect::from_xywh(rect.x, rect.y, rect.width, rect.height)?;
        return Some(PathBuilder::from_rect(sk));
    }
    let (x, y, w, h) = (rect.x, rect.y, rect.width, rect.height);
    let k = KAPPA * r;
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.cubic_to(x + w - r + k, y, x + w, y + r - k, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.cubic_to(x + w, y + h - r + k, x + w - r + k, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.cubic_to(x + r - k, y + h, x, y + h - r + k, x, y + h - r);
    pb.line_to(x, y + r);
    pb.cubic_to(x, y + r - k, x + r - k, y, x + r, y);
    pb.close();
    pb.finish()
}

/// Draw `img` at the holder's width, keeping its aspect ratio, clipped to the
/// rounded holder.
fn draw_image(pixmap: &mut Pixmap, img: &RgbaImage, holder: Rect, radius: f32) {
    let (iw, ih) = img.dimensions();
    if iw == 0 || ih == 0 {
        return;
    }
    let tw = holder.width.round().max(1.0) as u32;
    let th = (tw as f32 * ih as f32 / iw as f32).round().max(1.0) as u32;
    let resized = image::imageops::resize(img, tw, th, FilterType::Triangle);
    let Some(src) = to_pixmap(&resized) else {
        return;
    };
    let Some(clip) = rounded_rect(holder, radius) else {
        return;
    };
    let Some(mut mask) = Mask::new(pixmap.width(), pixmap.height()) else {
        return;
    };
    mask.fill_path(&clip, FillRule::Winding, true, Transform::identity());
    pixmap.draw_pixmap(
        holder.x.round() as i32,
        holder.y.round() as i32,
        src.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        Some(&mask),
    );
}

fn to_pixmap(rgba: &RgbaImage) -> Option<Pixmap> {
    let (width, height) = rgba.dimensions();
    let mut pixmap = Pixmap::new(width, height)?;
    for (src, dst) in rgba
        .as_raw()
        .chunks_exact(4)
        .zip(pixmap.data_mut().chunks_exact_mut(4))
    {
        let a = src[3];
        dst[0] = premul_u8(src[0], a);
        dst[1] = premul_u8(src[1], a);
        dst[2] = premul_u8(src[2], a);
        dst[3] = a;
    }
    Some(pixmap)
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}
