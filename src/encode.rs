//! Output formats and the encoded thumbnail blob.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ThumbnailError;
use crate::render::RenderIssue;

/// Encoded image format of a thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ThumbnailFormat {
    #[default]
    Jpeg,
    Png,
    WebP,
}

impl ThumbnailFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ThumbnailFormat::Jpeg => "image/jpeg",
            ThumbnailFormat::Png => "image/png",
            ThumbnailFormat::WebP => "image/webp",
        }
    }

    /// Conventional file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ThumbnailFormat::Jpeg => "jpg",
            ThumbnailFormat::Png => "png",
            ThumbnailFormat::WebP => "webp",
        }
    }

    /// Largest width or height the format can store.
    pub fn max_dimension(self) -> u32 {
        match self {
            ThumbnailFormat::Jpeg => u16::MAX as u32,
            ThumbnailFormat::Png => i32::MAX as u32,
            ThumbnailFormat::WebP => 16_383,
        }
    }

    /// Guess a format from a file name's extension.
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl fmt::Display for ThumbnailFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

impl FromStr for ThumbnailFormat {
    type Err = ThumbnailError;

    /// Accepts MIME types (`image/png`) and short names (`png`, `jpg`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("image/").unwrap_or(&lower);
        match name {
            "jpeg" | "jpg" => Ok(ThumbnailFormat::Jpeg),
            "png" => Ok(ThumbnailFormat::Png),
            "webp" => Ok(ThumbnailFormat::WebP),
            _ => Err(ThumbnailError::InvalidOptions(format!(
                "Unsupported image format: {}",
                s
            ))),
        }
    }
}

impl TryFrom<String> for ThumbnailFormat {
    type Error = ThumbnailError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ThumbnailFormat> for String {
    fn from(format: ThumbnailFormat) -> Self {
        format.mime_type().to_string()
    }
}

/// A rendered, encoded thumbnail.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub bytes: Vec<u8>,
    pub format: ThumbnailFormat,
    pub width: u32,
    pub height: u32,
    /// True when the whole-template placeholder was rendered instead of the
    /// template's elements.
    pub fallback: bool,
    /// Contained failures (missing images, unknown shapes, ...).
    pub issues: Vec<RenderIssue>,
}

impl Thumbnail {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Encode an RGBA buffer.
///
/// `quality` (0..1) applies to JPEG only. JPEG has no alpha, so pixels are
/// flattened onto white first. WebP is written lossless.
pub fn encode(
    image: &RgbaImage,
    format: ThumbnailFormat,
    quality: f32,
) -> Result<Vec<u8>, ThumbnailError> {
    let (width, height) = image.dimensions();
    let mut bytes = Vec::new();
    let result = match format {
        ThumbnailFormat::Jpeg => {
            let q = jpeg_quality(quality);
            JpegEncoder::new_with_quality(&mut bytes, q).write_image(
                &flatten_onto_white(image),
                width,
                height,
                ExtendedColorType::Rgb8,
            )
        }
        ThumbnailFormat::Png => PngEncoder::new(&mut bytes).write_image(
            image.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
        ThumbnailFormat::WebP => WebPEncoder::new_lossless(&mut bytes).write_image(
            image.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
    };
    result.map_err(|e: image::ImageError| ThumbnailError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Map 0..1 quality onto the encoder's 1..100 scale.
fn jpeg_quality(quality: f32) -> u8 {
    let q = if quality.is_finite() { quality } else { 0.8 };
    (q.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

fn flatten_onto_white(image: &RgbaImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(image.width() as usize * image.height() as usize * 3);
    for p in image.pixels() {
        let a = p[3] as u32;
        for c in 0..3 {
            let v = (p[c] as u32 * a + 255 * (255 - a) + 127) / 255;
            rgb.push(v as u8);
        }
    }
    rgb
}
