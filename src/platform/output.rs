/// Output surfaces: where finished artifacts go

use crate::package::Artifact;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// File sharing support of a surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareCapabilities {
    pub can_share_files: bool,
    /// Accepted MIME types; `*/*` and `type/*` wildcards are honored
    pub mime_types: Vec<String>,
}

impl ShareCapabilities {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn files(mime_types: &[&str]) -> Self {
        Self {
            can_share_files: true,
            mime_types: mime_types.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn accepts(&self, mime: &str) -> bool {
        self.can_share_files
            && self.mime_types.iter().any(|m| {
                m == mime
                    || m == "*/*"
                    || m
                        .strip_suffix("/*")
                        .map_or(false, |major| mime.split('/').next() == Some(major))
            })
    }
}

/// A shown preview. Releasing it (explicitly or by dropping it) frees the
/// resources behind it.
pub struct PreviewHandle {
    name: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl PreviewHandle {
    pub fn new(name: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            name: name.into(),
            release: Some(Box::new(release)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            log::debug!("releasing preview of {}", self.name);
            release();
        }
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("name", &self.name)
            .field("released", &self.release.is_none())
            .finish()
    }
}

/// Delivery target for capture artifacts.
pub trait OutputSurface {
    fn share_capabilities(&self) -> ShareCapabilities;

    fn share(&self, artifact: &Artifact) -> Result<()>;

    fn preview(&self, artifact: &Artifact) -> Result<PreviewHandle>;

    /// Save the artifact; returns where it went.
    fn download(&self, artifact: &Artifact) -> Result<PathBuf>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind {
    Shared,
    Previewed,
    Downloaded,
}

/// An artifact as handed to a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub kind: DeliveryKind,
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Writes downloads and previews into a directory. Sharing is unsupported.
#[derive(Debug, Clone)]
pub struct DirectorySurface {
    dir: PathBuf,
}

impl DirectorySurface {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write(&self, artifact: &Artifact) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::DeliveryError(format!("cannot create {}: {}", self.dir.display(), e))
        })?;
        let path = self.dir.join(artifact.name());
        std::fs::write(&path, artifact.bytes())
            .map_err(|e| Error::DeliveryError(format!("cannot write {}: {}", path.display(), e)))?;
        Ok(path)
    }
}

impl OutputSurface for DirectorySurface {
    fn share_capabilities(&self) -> ShareCapabilities {
        ShareCapabilities::none()
    }

    fn share(&self, artifact: &Artifact) -> Result<()> {
        Err(Error::DeliveryError(format!(
            "sharing is not available for {}",
            artifact.name()
        )))
    }

    fn preview(&self, artifact: &Artifact) -> Result<PreviewHandle> {
        let path = self.write(artifact)?;
        log::info!("preview written to {}", path.display());
        Ok(PreviewHandle::new(artifact.name(), || {}))
    }

    fn download(&self, artifact: &Artifact) -> Result<PathBuf> {
        self.write(artifact)
    }
}

/// Keeps deliveries in memory; capabilities are configurable.
#[derive(Debug, Default)]
pub struct MemorySurface {
    capabilities: ShareCapabilities,
    deliveries: Mutex<Vec<Delivery>>,
    released: Arc<Mutex<Vec<String>>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_share(capabilities: ShareCapabilities) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Names of previews that have been released.
    pub fn released_previews(&self) -> Vec<String> {
        self.released.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn record(&self, kind: DeliveryKind, artifact: &Artifact) {
        if let Ok(mut d) = self.deliveries.lock() {
            d.push(Delivery {
                kind,
                name: artifact.name().to_string(),
                mime: artifact.mime().to_string(),
                bytes: artifact.bytes().to_vec(),
            });
        }
    }
}

impl OutputSurface for MemorySurface {
    fn share_capabilities(&self) -> ShareCapabilities {
        self.capabilities.clone()
    }

    fn share(&self, artifact: &Artifact) -> Result<()> {
        self.record(DeliveryKind::Shared, artifact);
        Ok(())
    }

    fn preview(&self, artifact: &Artifact) -> Result<PreviewHandle> {
        self.record(DeliveryKind::Previewed, artifact);
        let released = Arc::clone(&self.released);
        let name = artifact.name().to_string();
        Ok(PreviewHandle::new(artifact.name(), move || {
            if let Ok(mut r) = released.lock() {
                r.push(name);
            }
        }))
    }

    fn download(&self, artifact: &Artifact) -> Result<PathBuf> {
        self.record(DeliveryKind::Downloaded, artifact);
        Ok(PathBuf::from(artifact.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_capabilities_match_wildcards() {
        let caps = ShareCapabilities::files(&["image/*"]);
        assert!(caps.accepts("image/png"));
        assert!(!caps.accepts("application/zip"));
        assert!(ShareCapabilities::files(&["*/*"]).accepts("application/zip"));
        assert!(!ShareCapabilities::none().accepts("image/png"));
        let disabled = ShareCapabilities {
            can_share_files: false,
            mime_types: vec!["image/png".into()],
        };
        assert!(!disabled.accepts("image/png"));
    }

    #[test]
    fn preview_handle_releases_once() {
        let count = Arc::new(Mutex::new(0));
        let c = Arc::clone(&count);
        let handle = PreviewHandle::new("x.png", move || *c.lock().unwrap() += 1);
        assert_eq!(handle.name(), "x.png");
        handle.release();
        assert_eq!(*count.lock().unwrap(), 1);

        let c = Arc::clone(&count);
        drop(PreviewHandle::new("y.png", move || *c.lock().unwrap() += 1));
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn directory_surface_writes_downloads() {
        let dir = std::env::temp_dir().join(format!("chatsnap-out-{}", std::process::id()));
        let surface = DirectorySurface::new(&dir);
        let artifact = Artifact::Image {
            name: "chat.png".into(),
            bytes: vec![1, 2, 3],
        };
        let path = surface.download(&artifact).unwrap();
        assert_eq!(path, dir.join("chat.png"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
        assert!(surface.share(&artifact).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
