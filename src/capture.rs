//! The capture run
//!
//! One run selects messages, normalizes them into blocks, measures and
//! paginates the blocks, asks before splitting, rasterizes segment by segment
//! and hands the packaged result to the output surface. A [`CancelToken`] is
//! checked at every step; a cancelled run delivers nothing. Failures are
//! logged and reported to the user, and the wait indicator is always
//! dismissed.

use crate::convert::{MarkdownRoundTrip, TextConverter};
use crate::normalize::Normalizer;
use crate::package::{self, DeliveryOutcome, Packager};
use crate::paginate::paginate;
use crate::platform::{DeviceMetrics, Interaction, OutputSurface};
use crate::range::{self, RangeRequest, Selection};
use crate::rendering::{RasterBackend, SegmentRasterizer, DEFAULT_SETTLE_DELAY};
use crate::transcript::MessageSource;
use crate::{Error, Result, SnapConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const PROGRESS_MESSAGE: &str = "Capturing, please wait...";
pub const NO_MESSAGES_NOTICE: &str = "No messages found!";

static DEFAULT_CONVERTER: MarkdownRoundTrip = MarkdownRoundTrip { wrap_width: 4096 };

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Error::Cancelled)` once cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug)]
pub struct CaptureReport {
    pub artifact: String,
    pub mime: &'static str,
    pub blocks: usize,
    pub segments: usize,
    pub delivery: DeliveryOutcome,
}

#[derive(Debug)]
pub enum CaptureOutcome {
    Saved(CaptureReport),
    /// The range matched nothing; the user was told
    NoMessages,
    /// The user declined splitting into several images
    Declined,
    Cancelled,
    /// Reported to the user as "capture failed: ..."
    Failed(String),
}

impl CaptureOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, CaptureOutcome::Saved(_))
    }
}

/// Hides the wait indicator when dropped.
struct ProgressGuard<'a>(&'a dyn Interaction);

impl<'a> ProgressGuard<'a> {
    fn show(interaction: &'a dyn Interaction, message: &str) -> Self {
        interaction.show_progress(message);
        Self(interaction)
    }
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.hide_progress();
    }
}

/// Collaborators and settings for capture runs.
pub struct Capture<'a> {
    config: &'a SnapConfig,
    backend: &'a dyn RasterBackend,
    converter: &'a dyn TextConverter,
    interaction: &'a dyn Interaction,
    surface: &'a dyn OutputSurface,
    device: DeviceMetrics,
    settle: Duration,
}

impl<'a> Capture<'a> {
    pub fn new(
        config: &'a SnapConfig,
        backend: &'a dyn RasterBackend,
        interaction: &'a dyn Interaction,
        surface: &'a dyn OutputSurface,
    ) -> Self {
        Self {
            config,
            backend,
            converter: &DEFAULT_CONVERTER,
            interaction,
            surface,
            device: DeviceMetrics::default(),
            settle: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_converter(mut self, converter: &'a dyn TextConverter) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_device(mut self, device: DeviceMetrics) -> Self {
        self.device = device;
        self
    }

    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Run one capture. Never fails: every error ends up in the outcome.
    pub async fn run(
        &self,
        source: &dyn MessageSource,
        request: &RangeRequest,
        cancel: &CancelToken,
    ) -> CaptureOutcome {
        let _progress = ProgressGuard::show(self.interaction, PROGRESS_MESSAGE);
        match self.execute(source, request, cancel).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => {
                log::info!("capture cancelled");
                CaptureOutcome::Cancelled
            }
            Err(e) => {
                log::error!("capture failed: {}", e);
                self.interaction.notify(&format!("capture failed: {}", e));
                CaptureOutcome::Failed(e.to_string())
            }
        }
    }

    async fn execute(
        &self,
        source: &dyn MessageSource,
        request: &RangeRequest,
        cancel: &CancelToken,
    ) -> Result<CaptureOutcome> {
        self.config.validate()?;

        let messages = match range::select(source.messages(), request) {
            Selection::Empty => {
                log::info!("no messages matched {:?}", request);
                self.interaction.notify(NO_MESSAGES_NOTICE);
                return Ok(CaptureOutcome::NoMessages);
            }
            Selection::Messages(messages) => messages,
        };
        log::debug!("selected {} message(s)", messages.len());

        let normalizer = Normalizer::new(self.config, self.converter);
        let rasterizer = SegmentRasterizer::new(self.backend, self.config, &self.device)?
            .with_settle_delay(self.settle);

        let mut blocks = Vec::with_capacity(messages.len());
        for message in messages {
            cancel.check()?;
            blocks.push(normalizer.normalize(message)?);
            tokio::task::yield_now().await;
        }
        let block_count = blocks.len();

        let measured = rasterizer.measure(blocks, cancel)?;
        let threshold = self.config.max_segment_height;
        let segments = paginate(measured, threshold as f32);
        log::debug!(
            "{} block(s) paginated into {} segment(s) at {}px",
            block_count,
            segments.len(),
            threshold
        );

        if !package::confirm_segments(self.interaction, threshold, segments.len()) {
            log::info!("user declined splitting into {} images", segments.len());
            return Ok(CaptureOutcome::Declined);
        }

        let segment_count = segments.len();
        let mut packager = Packager::new(source.file_base_name(), segment_count);
        for (i, segment) in segments.into_iter().enumerate() {
            cancel.check()?;
            let shot = rasterizer.rasterize(segment.items, cancel).await?;
            log::debug!(
                "segment {}/{} rasterized at {}x{}",
                i + 1,
                segment_count,
                shot.width,
                shot.height
            );
            packager.add(shot)?;
            tokio::task::yield_now().await;
        }
        cancel.check()?;

        let artifact = packager.finish()?;
        let delivery = package::deliver(&artifact, self.surface, &self.device)?;
        Ok(CaptureOutcome::Saved(CaptureReport {
            artifact: artifact.name().to_string(),
            mime: artifact.mime(),
            blocks: block_count,
            segments: segment_count,
            delivery,
        }))
    }
}
