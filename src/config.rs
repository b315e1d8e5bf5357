//! Renderer configuration and thumbnail size presets.
//!
//! ```json
//! {
//!     "font_path": "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
//!     "http_timeout_secs": 5,
//!     "defaults": { "width": 600, "height": 848, "format": "image/png" }
//! }
//! ```
//!
//! Every field is optional.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::canvas::FontBook;
use crate::error::ThumbnailError;
use crate::render::ThumbnailOptions;

/// Settings shared by every render of a rasterizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// TrueType font for all text. Built-in bitmap fonts when unset.
    pub font_path: Option<PathBuf>,
    /// TrueType font for bold text; synthesized from `font_path` when unset.
    pub bold_font_path: Option<PathBuf>,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    /// Decoded images kept in memory; 0 disables the cache.
    pub image_cache_capacity: usize,
    /// Options used when a caller does not pass its own.
    pub defaults: ThumbnailOptions,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            bold_font_path: None,
            user_agent: concat!("docthumb/", env!("CARGO_PKG_VERSION")).to_string(),
            http_timeout_secs: 10,
            image_cache_capacity: 64,
            defaults: ThumbnailOptions::default(),
        }
    }
}

impl RendererConfig {
    /// Parse a JSON config document.
    pub fn from_json(json: &str) -> Result<Self, ThumbnailError> {
        serde_json::from_str(json).map_err(|e| ThumbnailError::Config(format!("Invalid config: {}", e)))
    }

    /// Read a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ThumbnailError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ThumbnailError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Fonts described by this config.
    pub fn font_book(&self) -> Result<FontBook, ThumbnailError> {
        FontBook::from_files(self.font_path.as_deref(), self.bold_font_path.as_deref())
    }
}

/// Named thumbnail sizes used across the template gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailPreset {
    /// Gallery card, A4 ratio.
    Card,
    Small,
    Large,
}

impl ThumbnailPreset {
    pub const ALL: [ThumbnailPreset; 3] = [
        ThumbnailPreset::Card,
        ThumbnailPreset::Small,
        ThumbnailPreset::Large,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ThumbnailPreset::Card => "card",
            ThumbnailPreset::Small => "small",
            ThumbnailPreset::Large => "large",
        }
    }

    /// `(width, height, quality)`
    pub fn dimensions(self) -> (u32, u32, f32) {
        match self {
            ThumbnailPreset::Card => (300, 424, 0.8),
            ThumbnailPreset::Small => (150, 212, 0.7),
            ThumbnailPreset::Large => (600, 848, 0.9),
        }
    }

    /// Apply this preset's size and quality on top of `base`.
    pub fn apply(self, base: ThumbnailOptions) -> ThumbnailOptions {
        let (width, height, quality) = self.dimensions();
        ThumbnailOptions {
            width,
            height,
            quality,
            ..base
        }
    }

    pub fn options(self) -> ThumbnailOptions {
        self.apply(ThumbnailOptions::default())
    }
}

impl FromStr for ThumbnailPreset {
    type Err = ThumbnailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ThumbnailPreset::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ThumbnailError::InvalidOptions(format!("Unknown preset: {}", s)))
    }
}
