/// Font loading for the built-in painter
///
/// A face is loaded from the configured `fontFile`, or looked up by family in
/// the platform font directories. Glyph outlines become tiny-skia paths in
/// device pixels.

use crate::rendering::layout::{estimate_advance, TextMetrics, TextStyle};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tiny_skia::{Path as SkPath, PathBuilder};
use ttf_parser::OutlineBuilder;

/// Extra font directories, separated like `PATH`.
pub const FONT_DIR_ENV: &str = "CHATSNAP_FONT_DIR";

/// Horizontal shear used to fake italics.
const ITALIC_SKEW: f32 = 0.2;

#[derive(Clone)]
pub struct FontFace {
    data: Arc<Vec<u8>>,
    units_per_em: f32,
    ascender: f32,
    descender: f32,
    source: String,
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("source", &self.source)
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl FontFace {
    pub fn from_bytes(data: Vec<u8>, source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let (units_per_em, ascender, descender) = {
            let face = ttf_parser::Face::parse(&data, 0).map_err(|e| {
                Error::InitializationError(format!("unusable font {}: {}", source, e))
            })?;
            (
                face.units_per_em() as f32,
                face.ascender() as f32,
                face.descender() as f32,
            )
        };
        Ok(Self {
            data: Arc::new(data),
            units_per_em: units_per_em.max(1.0),
            ascender,
            descender,
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| {
            Error::InitializationError(format!("cannot read font {}: {}", path.display(), e))
        })?;
        Self::from_bytes(data, path.display().to_string())
    }

    /// First face found for a CSS family list such as `"Noto Sans TC, sans-serif"`.
    pub fn find_system(families: &str) -> Option<Self> {
        for family in families.split(',') {
            let family = family.trim().trim_matches(|c| c == '"' || c == '\'');
            if family.is_empty() {
                continue;
            }
            for path in find_family_files(family) {
                match Self::from_file(&path) {
                    Ok(face) => {
                        log::debug!("font family {:?} resolved to {}", family, path.display());
                        return Some(face);
                    }
                    Err(e) => log::debug!("skipping {}: {}", path.display(), e),
                }
            }
        }
        None
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn face(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.data, 0).ok()
    }

    /// Advance width in pixels, `None` when the font has no glyph for `ch`.
    pub fn advance(&self, ch: char, font_size: f32) -> Option<f32> {
        let face = self.face()?;
        let id = face.glyph_index(ch)?;
        let adv = face.glyph_hor_advance(id)? as f32;
        Some(adv * font_size / self.units_per_em)
    }

    pub fn ascent(&self, font_size: f32) -> f32 {
        self.ascender * font_size / self.units_per_em
    }

    pub fn descent(&self, font_size: f32) -> f32 {
        -self.descender * font_size / self.units_per_em
    }

    /// Outline of `ch` with its origin on the baseline at `(x, baseline)`,
    /// all in device pixels.
    pub fn glyph_path(
        &self,
        ch: char,
        x: f32,
        baseline: f32,
        font_size: f32,
        italic: bool,
    ) -> Option<SkPath> {
        let face = self.face()?;
        let id = face.glyph_index(ch)?;
        let mut builder = GlyphPathBuilder {
            builder: PathBuilder::new(),
            origin_x: x,
            origin_y: baseline,
            scale: font_size / self.units_per_em,
            skew: if italic { ITALIC_SKEW } else { 0.0 },
        };
        face.outline_glyph(id, &mut builder)?;
        builder.builder.finish()
    }
}

/// Text metrics backed by a font, falling back to estimates for missing
/// glyphs or when no font is loaded.
#[derive(Debug, Clone, Copy)]
pub struct FontMetrics<'a> {
    pub font: Option<&'a FontFace>,
}

impl TextMetrics for FontMetrics<'_> {
    fn advance(&self, ch: char, font_size: f32, style: &TextStyle) -> f32 {
        match self.font.and_then(|f| f.advance(ch, font_size)) {
            Some(adv) if style.bold => adv * 1.05,
            Some(adv) => adv,
            None => estimate_advance(ch, font_size, style),
        }
    }

    fn ascent(&self, font_size: f32) -> f32 {
        match self.font {
            Some(f) => f.ascent(font_size),
            None => font_size * 0.8,
        }
    }

    fn descent(&self, font_size: f32) -> f32 {
        match self.font {
            Some(f) => f.descent(font_size),
            None => font_size * 0.2,
        }
    }
}

/// Outline sink that flips the y axis onto the baseline and applies the
/// italic shear.
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
    skew: f32,
}

impl GlyphPathBuilder {
    fn point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.origin_x + (x + y * self.skew) * self.scale,
            self.origin_y - y * self.scale,
        )
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.point(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.point(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.point(x1, y1);
        let (x, y) = self.point(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.point(x1, y1);
        let (x2, y2) = self.point(x2, y2);
        let (x, y) = self.point(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(&home).join(".fonts"));
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    if let Ok(extra) = std::env::var(FONT_DIR_ENV) {
        for path in std::env::split_paths(&extra) {
            if !path.as_os_str().is_empty() {
                dirs.push(path);
            }
        }
    }
    dirs
}

/// Every font file below the system font directories, scanned once.
fn system_font_index() -> &'static [PathBuf] {
    static INDEX: OnceLock<Vec<PathBuf>> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut files = Vec::new();
        for dir in system_font_dirs() {
            collect_font_files(&dir, 0, &mut files);
        }
        files
    })
}

fn collect_font_files(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
    if depth > 4 {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_font_files(&path, depth + 1, out);
        } else if matches!(
            path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
            Some("ttf" | "otf" | "ttc")
        ) {
            out.push(path);
        }
    }
}

fn normalize_family(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Candidate file stems, best first.
fn family_file_stems(family: &str) -> Vec<String> {
    let generic: &[&str] = match normalize_family(family).as_str() {
        "sansserif" | "systemui" | "uisansserif" => &[
            "DejaVuSans",
            "NotoSans-Regular",
            "LiberationSans-Regular",
            "arial",
            "segoeui",
            "Helvetica",
        ],
        "serif" | "uiserif" => &[
            "DejaVuSerif",
            "NotoSerif-Regular",
            "LiberationSerif-Regular",
            "times",
        ],
        "monospace" | "uimonospace" => &[
            "DejaVuSansMono",
            "NotoSansMono-Regular",
            "LiberationMono-Regular",
            "consola",
        ],
        _ => &[],
    };
    if !generic.is_empty() {
        return generic.iter().map(|s| normalize_family(s)).collect();
    }
    let base = normalize_family(family);
    vec![format!("{}regular", base), base]
}

fn find_family_files(family: &str) -> Vec<PathBuf> {
    let index = system_font_index();
    let mut found = Vec::new();
    for stem in family_file_stems(family) {
        for path in index {
            let file_stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(normalize_family)
                .unwrap_or_default();
            if file_stem == stem && !found.contains(path) {
                found.push(path.clone());
            }
        }
    }
    found
}
