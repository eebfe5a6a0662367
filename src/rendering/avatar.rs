/// Avatar image loading
///
/// Sources are `data:` URIs, local paths (absolute, `file://`, or relative to
/// the transcript's base), and `http(s)` URLs when the `remote-avatars`
/// feature is enabled. A failed load is logged and cached so the painter
/// falls back to the empty holder once per source.

use crate::{Error, Result};
use base64::Engine as _;
use image::RgbaImage;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Timeout for fetching a remote avatar.
pub const REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Data,
    Remote(String),
    File(PathBuf),
}

#[derive(Debug, Default)]
pub struct AvatarLoader {
    base: Option<String>,
    cache: Mutex<HashMap<String, Option<Arc<RgbaImage>>>>,
}

impl AvatarLoader {
    /// `base` is a URL or directory that relative sources resolve against.
    pub fn new(base: Option<String>) -> Self {
        Self {
            base,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Decoded image for `src`, or `None` when it cannot be loaded.
    pub fn load(&self, src: &str) -> Option<Arc<RgbaImage>> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(entry) = cache.get(src) {
                return entry.clone();
            }
        }

        let loaded = match self.fetch(src).and_then(|bytes| decode(&bytes)) {
            Ok(img) => Some(Arc::new(img)),
            Err(e) => {
                log::warn!("avatar {} unavailable, drawing placeholder: {}", abbreviate(src), e);
                None
            }
        };
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(src.to_string(), loaded.clone());
        }
        loaded
    }

    fn fetch(&self, src: &str) -> Result<Vec<u8>> {
        match locate(self.base.as_deref(), src) {
            Location::Data => parse_data_uri(src)
                .map(|(_, bytes)| bytes)
                .ok_or_else(|| Error::RenderError("malformed data URI".into())),
            Location::Remote(url) => fetch_remote(&url),
            Location::File(path) => std::fs::read(&path)
                .map_err(|e| Error::RenderError(format!("{}: {}", path.display(), e))),
        }
    }
}

fn is_remote(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn locate(base: Option<&str>, src: &str) -> Location {
    if src.starts_with("data:") {
        return Location::Data;
    }
    if is_remote(src) {
        return Location::Remote(src.to_string());
    }
    if let Some(path) = src.strip_prefix("file://") {
        return Location::File(PathBuf::from(path));
    }
    let path = PathBuf::from(src);
    if path.is_absolute() {
        return Location::File(path);
    }
    match base {
        Some(base) if is_remote(base) => Location::Remote(join_url(base, src)),
        Some(base) => {
            let dir = base.strip_prefix("file://").unwrap_or(base);
            Location::File(PathBuf::from(dir).join(src))
        }
        None => Location::File(path),
    }
}

#[cfg(feature = "remote-avatars")]
fn join_url(base: &str, src: &str) -> String {
    url::Url::parse(base)
        .and_then(|b| b.join(src))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| src.to_string())
}

#[cfg(not(feature = "remote-avatars"))]
fn join_url(base: &str, src: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), src.trim_start_matches('/'))
}

/// Blocking GET on a dedicated thread so it is safe to call from inside the
/// async capture run.
#[cfg(feature = "remote-avatars")]
fn fetch_remote(url: &str) -> Result<Vec<u8>> {
    let url = url.to_string();
    std::thread::spawn(move || -> Result<Vec<u8>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REMOTE_TIMEOUT)
            .build()
            .map_err(|e| Error::RenderError(format!("Failed to build HTTP client: {}", e)))?;
        let res = client
            .get(&url)
            .send()
            .map_err(|e| Error::RenderError(format!("HTTP GET {} failed: {}", url, e)))?;
        if !res.status().is_success() {
            return Err(Error::RenderError(format!("HTTP GET {} returned {}", url, res.status())));
        }
        let body = res
            .bytes()
            .map_err(|e| Error::RenderError(format!("Failed to read {}: {}", url, e)))?;
        Ok(body.to_vec())
    })
    .join()
    .map_err(|_| Error::RenderError("avatar fetch thread panicked".into()))?
}

#[cfg(not(feature = "remote-avatars"))]
fn fetch_remote(url: &str) -> Result<Vec<u8>> {
    Err(Error::RenderError(format!(
        "remote avatars are disabled in this build: {}",
        url
    )))
}

fn decode(bytes: &[u8]) -> Result<RgbaImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| Error::RenderError(format!("cannot decode image: {}", e)))
}

/// `(mime, payload)` of a `data:` URI.
pub fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|v| !v.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some((mime, data))
}

fn abbreviate(src: &str) -> String {
    if src.len() > 64 {
        let cut = (0..=64).rev().find(|i| src.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &src[..cut])
    } else {
        src.to_string()
    }
}
