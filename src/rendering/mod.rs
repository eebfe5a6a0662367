//! Off-screen rendering of normalized blocks
//!
//! Blocks are attached to a [`Container`] that mirrors the capture layout
//! (fixed width, padding, column gap), measured or rasterized by a
//! [`RasterBackend`], and encoded to PNG by [`SegmentRasterizer`].

pub mod avatar;
pub mod font;
pub mod layout;
pub mod paint;
pub mod raster;

pub use raster::BlockPainter;

use crate::block::NormalizedBlock;
use crate::capture::CancelToken;
use crate::config::{SnapConfig, SCALE};
use crate::paginate::{Measured, BLOCK_SPACING};
use crate::platform::DeviceMetrics;
use crate::{Error, Result};
use paint::Rgba;
use std::time::Duration;
use tiny_skia::Pixmap;

/// Container padding in layout pixels.
pub const CONTAINER_PADDING: f32 = 20.0;
/// Gap between stacked blocks in layout pixels.
pub const CONTAINER_GAP: f32 = 20.0;
/// Wait between attaching a segment and rasterizing it.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(80);

#[derive(Debug, Clone)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub png_data: Vec<u8>,
}

/// Off-screen column the blocks of one segment are attached to.
#[derive(Debug, Clone)]
pub struct Container {
    /// Content width in layout pixels
    pub width: f32,
    pub padding: f32,
    pub gap: f32,
    pub font_size: f32,
    pub line_height: f32,
    pub font_family: String,
    pub text_color: Rgba,
    pub italic_color: Rgba,
    pub background: Rgba,
    blocks: Vec<NormalizedBlock>,
}

impl Container {
    pub fn from_config(cfg: &SnapConfig) -> Result<Self> {
        let color = |key: &str, value: &str| {
            Rgba::parse(value)
                .ok_or_else(|| Error::ConfigError(format!("{} is not a color: {:?}", key, value)))
        };
        Ok(Self {
            width: cfg.layout_width(),
            padding: CONTAINER_PADDING,
            gap: CONTAINER_GAP,
            font_size: cfg.layout_font_size(),
            line_height: cfg.layout_line_height(),
            font_family: cfg.f_family.clone(),
            text_color: color("txt", &cfg.txt)?,
            italic_color: color("italicColor", &cfg.italic_color)?,
            background: color("bg", &cfg.bg)?,
            blocks: Vec::new(),
        })
    }

    /// Width including padding.
    pub fn outer_width(&self) -> f32 {
        self.width + 2.0 * self.padding
    }

    pub fn attach(&mut self, blocks: Vec<NormalizedBlock>) {
        log::debug!("attaching {} block(s) off-screen", blocks.len());
        self.blocks = blocks;
    }

    pub fn detach(&mut self) -> Vec<NormalizedBlock> {
        std::mem::take(&mut self.blocks)
    }

    pub fn blocks(&self) -> &[NormalizedBlock] {
        &self.blocks
    }

    pub fn is_attached(&self) -> bool {
        !self.blocks.is_empty()
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if self.is_attached() {
            log::debug!("detaching {} block(s)", self.blocks.len());
            self.blocks.clear();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Device pixels per layout pixel
    pub scale: f32,
    /// Canvas fill, always passed explicitly
    pub background: Rgba,
}

/// DOM-to-raster collaborator.
pub trait RasterBackend {
    /// Rendered height of `block` inside `container`, in layout pixels.
    fn measure(&self, container: &Container, block: &NormalizedBlock) -> Result<f32>;

    /// Rasterize every block attached to `container`.
    fn rasterize(&self, container: &Container, options: &RenderOptions) -> Result<Pixmap>;
}

impl<B: RasterBackend + ?Sized> RasterBackend for &B {
    fn measure(&self, container: &Container, block: &NormalizedBlock) -> Result<f32> {
        (**self).measure(container, block)
    }

    fn rasterize(&self, container: &Container, options: &RenderOptions) -> Result<Pixmap> {
        (**self).rasterize(container, options)
    }
}

/// Measures blocks and turns segments into PNG screenshots, one at a time.
pub struct SegmentRasterizer<'a, B: RasterBackend + ?Sized> {
    backend: &'a B,
    template: Container,
    scale: f32,
    settle: Duration,
}

impl<'a, B: RasterBackend + ?Sized> SegmentRasterizer<'a, B> {
    pub fn new(backend: &'a B, cfg: &SnapConfig, device: &DeviceMetrics) -> Result<Self> {
        Ok(Self {
            backend,
            template: Container::from_config(cfg)?,
            scale: SCALE * device.raster_dpr(),
            settle: DEFAULT_SETTLE_DELAY,
        })
    }

    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Measured height of every block, spacing included, in order.
    pub fn measure(
        &self,
        blocks: Vec<NormalizedBlock>,
        cancel: &CancelToken,
    ) -> Result<Vec<Measured<NormalizedBlock>>> {
        let mut out = Vec::with_capacity(blocks.len());
        for block in blocks {
            cancel.check()?;
            let height = self.backend.measure(&self.template, &block)?;
            log::debug!("block {} measures {:.1}px", block.id, height);
            out.push(Measured::new(block, height + BLOCK_SPACING));
        }
        Ok(out)
    }

    pub async fn rasterize(
        &self,
        blocks: Vec<NormalizedBlock>,
        cancel: &CancelToken,
    ) -> Result<Screenshot> {
        cancel.check()?;
        let mut container = self.template.clone();
        container.attach(blocks);
        cancel.check()?;
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
        cancel.check()?;

        let options = RenderOptions {
            scale: self.scale,
            background: container.background,
        };
        let pixmap = self.backend.rasterize(&container, &options)?;
        container.detach();

        let png_data = pixmap
            .encode_png()
            .map_err(|e| Error::RenderError(format!("PNG encoding failed: {}", e)))?;
        Ok(Screenshot {
            width: pixmap.width(),
            height: pixmap.height(),
            png_data,
        })
    }
}
