//! Rendering configuration
//!
//! `SnapConfig` is the flat record of user-tunable options. It is stored by a
//! [`SettingsStore`](crate::settings::SettingsStore) as a JSON object whose key
//! names (`userBg`, `fSize`, `MAX`, ...) are shared with the host application,
//! so the serde names are part of the persisted format.
//!
//! # Examples
//!
//! ```
//! let cfg = chatsnap::SnapConfig::default();
//! assert_eq!(cfg.max_segment_height, 4096);
//! assert!(cfg.show_avatar);
//! ```

use crate::rendering::paint::Rgba;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Base rasterization multiplier. Layout happens at `1 / SCALE` of the
/// configured pixel sizes and is scaled back up when rasterizing.
pub const SCALE: f32 = 2.0;

/// Configuration for one capture run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapConfig {
    /// Background of blocks written by the user
    pub user_bg: String,
    /// Background of blocks written by any other role
    pub ai_bg: String,
    /// Color for `"..."` and `“...”` quotations
    pub quote_color: String,
    /// Color for `「...」` quotations
    pub bracket_color: String,
    /// Color forced onto emphasis
    pub italic_color: String,
    /// Canvas background, also passed explicitly to the rasterizer
    pub bg: String,
    /// Default text color
    pub txt: String,
    /// Output width in pixels
    pub width: u32,
    /// Font size in output pixels
    pub f_size: f32,
    /// Line height as a multiple of the font size
    pub line_r: f32,
    /// Font family list, CSS style
    pub f_family: String,
    /// Avatar side length in output pixels
    pub avatar_w: u32,
    pub show_avatar: bool,
    /// Pagination threshold in layout pixels
    #[serde(rename = "MAX")]
    pub max_segment_height: u32,
    /// Explicit font file for the built-in painter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_file: Option<String>,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            user_bg: "#313131".to_string(),
            ai_bg: "#202020".to_string(),
            quote_color: "#e18a24".to_string(),
            bracket_color: "#e18a24".to_string(),
            italic_color: "#888888".to_string(),
            bg: "#000000".to_string(),
            txt: "#ffffff".to_string(),
            width: 800,
            f_size: 16.0,
            line_r: 1.6,
            f_family: "Noto Sans TC, sans-serif".to_string(),
            avatar_w: 100,
            show_avatar: true,
            max_segment_height: 4096,
            font_file: None,
        }
    }
}

impl SnapConfig {
    /// Merge a stored record over the defaults.
    ///
    /// Keys missing from `stored` are filled from the defaults; every key that
    /// is present (including keys this version does not know about) is kept.
    /// Returns the typed configuration and the merged record to persist.
    pub fn merge_stored(stored: Option<&Value>) -> Result<(SnapConfig, Value)> {
        let defaults = serde_json::to_value(SnapConfig::default())?;
        let mut merged = match defaults {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        match stored {
            None | Some(Value::Null) => {}
            Some(Value::Object(user)) => {
                for (k, v) in user {
                    merged.insert(k.clone(), v.clone());
                }
            }
            Some(other) => {
                return Err(Error::ConfigError(format!(
                    "stored settings must be an object, found {}",
                    other
                )))
            }
        }

        let merged = Value::Object(merged);
        let cfg: SnapConfig = serde_json::from_value(merged.clone())
            .map_err(|e| Error::ConfigError(format!("stored settings are malformed: {}", e)))?;
        Ok((cfg, merged))
    }

    /// Check the values the pipeline depends on.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 {
            return Err(Error::ConfigError("width must be greater than zero".into()));
        }
        if !(self.f_size > 0.0) {
            return Err(Error::ConfigError("fSize must be greater than zero".into()));
        }
        if !(self.line_r > 0.0) {
            return Err(Error::ConfigError("lineR must be greater than zero".into()));
        }
        if self.max_segment_height == 0 {
            return Err(Error::ConfigError("MAX must be greater than zero".into()));
        }
        for (key, value) in [
            ("userBg", &self.user_bg),
            ("aiBg", &self.ai_bg),
            ("quoteColor", &self.quote_color),
            ("bracketColor", &self.bracket_color),
            ("italicColor", &self.italic_color),
            ("bg", &self.bg),
            ("txt", &self.txt),
        ] {
            if Rgba::parse(value).is_none() {
                return Err(Error::ConfigError(format!("{} is not a color: {:?}", key, value)));
            }
        }
        Ok(())
    }

    /// Role-matched block background.
    pub fn block_background(&self, is_user: bool) -> &str {
        if is_user {
            &self.user_bg
        } else {
            &self.ai_bg
        }
    }

    /// Container width in layout pixels.
    pub fn layout_width(&self) -> f32 {
        self.width as f32 / SCALE
    }

    /// Font size in layout pixels.
    pub fn layout_font_size(&self) -> f32 {
        self.f_size / SCALE
    }

    /// Line height in layout pixels.
    pub fn layout_line_height(&self) -> f32 {
        self.f_size * self.line_r / SCALE
    }

    /// Avatar side length in layout pixels.
    pub fn layout_avatar_side(&self) -> f32 {
        self.avatar_w as f32 / SCALE
    }
}

/// A set of edits coming from a settings form. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct SettingsEdit {
    pub user_bg: Option<String>,
    pub ai_bg: Option<String>,
    pub txt: Option<String>,
    /// Applies to both quote styles
    pub quote_color: Option<String>,
    pub italic_color: Option<String>,
    pub f_size: Option<f32>,
    pub f_family: Option<String>,
    pub width: Option<u32>,
    pub bg: Option<String>,
    pub avatar_w: Option<u32>,
    pub show_avatar: Option<bool>,
    pub max_segment_height: Option<u32>,
    pub font_file: Option<String>,
}

impl SettingsEdit {
    pub fn is_empty(&self) -> bool {
        self.user_bg.is_none()
            && self.ai_bg.is_none()
            && self.txt.is_none()
            && self.quote_color.is_none()
            && self.italic_color.is_none()
            && self.f_size.is_none()
            && self.f_family.is_none()
            && self.width.is_none()
            && self.bg.is_none()
            && self.avatar_w.is_none()
            && self.show_avatar.is_none()
            && self.max_segment_height.is_none()
            && self.font_file.is_none()
    }

    /// Apply the edits to a copy of `cfg`, validating the result.
    pub fn apply(&self, cfg: &SnapConfig) -> Result<SnapConfig> {
        let mut next = cfg.clone();
        if let Some(v) = &self.user_bg {
            next.user_bg = v.clone();
        }
        if let Some(v) = &self.ai_bg {
            next.ai_bg = v.clone();
        }
        if let Some(v) = &self.txt {
            next.txt = v.clone();
        }
        if let Some(v) = &self.quote_color {
            next.quote_color = v.clone();
            next.bracket_color = v.clone();
        }
        if let Some(v) = &self.italic_color {
            next.italic_color = v.clone();
        }
        if let Some(v) = self.f_size {
            next.f_size = v;
        }
        if let Some(v) = &self.f_family {
            next.f_family = v.clone();
        }
        if let Some(v) = self.width {
            next.width = v;
        }
        if let Some(v) = &self.bg {
            next.bg = v.clone();
        }
        if let Some(v) = self.avatar_w {
            next.avatar_w = v;
        }
        if let Some(v) = self.show_avatar {
            next.show_avatar = v;
        }
        if let Some(v) = self.max_segment_height {
            next.max_segment_height = v;
        }
        if let Some(v) = &self.font_file {
            next.font_file = if v.is_empty() { None } else { Some(v.clone()) };
        }
        next.validate()?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_config_matches_host_defaults() {
        let cfg = SnapConfig::default();
        assert_eq!(cfg.width, 800);
        assert_eq!(cfg.max_segment_height, 4096);
        assert_eq!(cfg.layout_width(), 400.0);
        assert_eq!(cfg.layout_font_size(), 8.0);
        assert!((cfg.layout_line_height() - 12.8).abs() < 1e-4);
        cfg.validate().unwrap();
    }

    #[test]
    fn serialized_keys_use_host_names() {
        let v = serde_json::to_value(SnapConfig::default()).unwrap();
        for key in ["userBg", "aiBg", "fSize", "lineR", "fFamily", "avatarW", "showAvatar", "MAX"] {
            assert!(v.get(key).is_some(), "missing key {}", key);
        }
        assert!(v.get("fontFile").is_none());
    }

    #[test]
    fn merge_fills_missing_keys_and_keeps_user_values() {
        let stored = json!({ "userBg": "#123456", "MAX": 2000, "legacyKey": 7 });
        let (cfg, merged) = SnapConfig::merge_stored(Some(&stored)).unwrap();
        assert_eq!(cfg.user_bg, "#123456");
        assert_eq!(cfg.max_segment_height, 2000);
        assert_eq!(cfg.ai_bg, "#202020");
        assert_eq!(merged["legacyKey"], json!(7));
        assert_eq!(merged["userBg"], json!("#123456"));
        assert_eq!(merged["fSize"], json!(16.0));
    }

    #[test]
    fn merge_without_record_yields_defaults() {
        let (cfg, _) = SnapConfig::merge_stored(None).unwrap();
        assert_eq!(cfg, SnapConfig::default());
    }

    #[test]
    fn merge_rejects_non_object_record() {
        assert!(SnapConfig::merge_stored(Some(&json!([1, 2]))).is_err());
    }

    #[test]
    fn quote_color_edit_sets_both_quote_styles() {
        let edit = SettingsEdit {
            quote_color: Some("#00ff00".into()),
            ..Default::default()
        };
        let next = edit.apply(&SnapConfig::default()).unwrap();
        assert_eq!(next.quote_color, "#00ff00");
        assert_eq!(next.bracket_color, "#00ff00");
    }

    #[test]
    fn invalid_edit_is_rejected() {
        let edit = SettingsEdit {
            width: Some(0),
            ..Default::default()
        };
        assert!(edit.apply(&SnapConfig::default()).is_err());
        let edit = SettingsEdit {
            bg: Some("not-a-color".into()),
            ..Default::default()
        };
        assert!(edit.apply(&SnapConfig::default()).is_err());
    }
}
