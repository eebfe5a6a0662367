//! Packaging and delivery of rendered segments
//!
//! One segment becomes `<chat>.png`. Several segments need the user's
//! go-ahead and are collected into `<chat>.zip` holding `<chat>-1.png`,
//! `<chat>-2.png`, ... in segment order.

use crate::platform::{DeliveryKind, DeviceMetrics, Interaction, OutputSurface, PreviewHandle};
use crate::rendering::Screenshot;
use crate::{Error, Result};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const PNG_MIME: &str = "image/png";
pub const ZIP_MIME: &str = "application/zip";

/// A finished capture result.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Image { name: String, bytes: Vec<u8> },
    Archive { name: String, bytes: Vec<u8> },
}

impl Artifact {
    pub fn name(&self) -> &str {
        match self {
            Artifact::Image { name, .. } | Artifact::Archive { name, .. } => name,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Artifact::Image { bytes, .. } | Artifact::Archive { bytes, .. } => bytes,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Artifact::Image { .. } => PNG_MIME,
            Artifact::Archive { .. } => ZIP_MIME,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Artifact::Image { .. })
    }
}

/// Text of the question asked before splitting into an archive.
pub fn confirmation_message(threshold: u32, segments: usize) -> String {
    format!(
        "The content is taller than {}px and will be split into {} images saved as a zip archive. Continue?",
        threshold, segments
    )
}

/// Ask before producing an archive. A single segment needs no confirmation.
pub fn confirm_segments(interaction: &dyn Interaction, threshold: u32, segments: usize) -> bool {
    segments <= 1 || interaction.confirm(&confirmation_message(threshold, segments))
}

enum Sink {
    Single(Option<Vec<u8>>),
    Archive(ZipWriter<Cursor<Vec<u8>>>),
}

/// Collects rendered segments into an [`Artifact`].
pub struct Packager {
    chat: String,
    expected: usize,
    added: usize,
    sink: Sink,
}

impl Packager {
    /// `chat` is the sanitized base file name; `segments` the number of
    /// screenshots that will be added.
    pub fn new(chat: impl Into<String>, segments: usize) -> Self {
        let sink = if segments > 1 {
            Sink::Archive(ZipWriter::new(Cursor::new(Vec::new())))
        } else {
            Sink::Single(None)
        };
        Self {
            chat: chat.into(),
            expected: segments,
            added: 0,
            sink,
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(self.sink, Sink::Archive(_))
    }

    /// Entry name of the `index`-th (0-based) segment inside the archive.
    pub fn entry_name(&self, index: usize) -> String {
        format!("{}-{}.png", self.chat, index + 1)
    }

    /// Add the next segment's screenshot.
    pub fn add(&mut self, shot: Screenshot) -> Result<()> {
        if self.added >= self.expected {
            return Err(Error::ArchiveError(format!(
                "expected {} segment(s), got more",
                self.expected
            )));
        }
        let entry = self.entry_name(self.added);
        match &mut self.sink {
            Sink::Single(slot) => *slot = Some(shot.png_data),
            Sink::Archive(zip) => {
                let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
                zip.start_file(entry.as_str(), options)?;
                zip.write_all(&shot.png_data)?;
                log::debug!("added {} ({} bytes)", entry, shot.png_data.len());
            }
        }
        self.added += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<Artifact> {
        if self.added != self.expected {
            return Err(Error::ArchiveError(format!(
                "expected {} segment(s), got {}",
                self.expected, self.added
            )));
        }
        match self.sink {
            Sink::Single(Some(bytes)) => Ok(Artifact::Image {
                name: format!("{}.png", self.chat),
                bytes,
            }),
            Sink::Single(None) => Err(Error::ArchiveError("nothing to package".into())),
            Sink::Archive(mut zip) => {
                let bytes = zip.finish()?.into_inner();
                Ok(Artifact::Archive {
                    name: format!("{}.zip", self.chat),
                    bytes,
                })
            }
        }
    }
}

/// How an artifact ended up with the user.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Shared,
    Previewed(PreviewHandle),
    Downloaded(PathBuf),
}

impl DeliveryOutcome {
    pub fn kind(&self) -> DeliveryKind {
        match self {
            DeliveryOutcome::Shared => DeliveryKind::Shared,
            DeliveryOutcome::Previewed(_) => DeliveryKind::Previewed,
            DeliveryOutcome::Downloaded(_) => DeliveryKind::Downloaded,
        }
    }
}

/// Share when the surface can take the artifact's type, preview images on
/// constrained viewports, download everything else.
pub fn deliver(
    artifact: &Artifact,
    surface: &dyn OutputSurface,
    device: &DeviceMetrics,
) -> Result<DeliveryOutcome> {
    if surface.share_capabilities().accepts(artifact.mime()) {
        surface.share(artifact)?;
        log::info!("shared {}", artifact.name());
        return Ok(DeliveryOutcome::Shared);
    }
    if artifact.is_image() && device.is_constrained() {
        let handle = surface.preview(artifact)?;
        log::info!("previewing {}", artifact.name());
        return Ok(DeliveryOutcome::Previewed(handle));
    }
    let path = surface.download(artifact)?;
    log::info!("saved {} to {}", artifact.name(), path.display());
    Ok(DeliveryOutcome::Downloaded(path))
}
