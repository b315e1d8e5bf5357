//! Glyph sources for canvas text.
//!
//! Two kinds of fonts back the canvas:
//!
//! - **Spleen bitmap fonts** (6x12, 8x16, 12x24) compiled into the binary.
//!   Always available; the face closest to the requested size is
//!   supersampled to the target pixel height.
//! - **TrueType fonts** loaded at runtime via ab_glyph (e.g. a corporate
//!   typeface configured in `RendererConfig::font_path`). Rendered with
//!   anti-aliased outlines.
//!
//! Bold and italic are synthesized when no dedicated face is loaded: bold
//! widens strokes horizontally, italic shears rows around the baseline.

use ab_glyph::{Font, FontArc, GlyphId, ScaleFont};
use spleen_font::{FONT_6X12, FONT_8X16, FONT_12X24, PSF2Font};
use std::collections::HashMap;
use std::path::Path;

use crate::error::ThumbnailError;

/// Horizontal shear applied to synthesized italics (x offset per pixel above
/// the baseline).
const ITALIC_SHEAR: f32 = 0.2;

/// Baseline position of the Spleen faces, as a fraction of the cell height.
const BITMAP_ASCENT: f32 = 0.8;

/// Font selection for a text draw, like a canvas `font` string.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FontSpec {
    pub family: String,
    /// Em height in device pixels.
    pub size_px: f32,
    pub bold: bool,
    pub italic: bool,
}

impl Default for FontSpec {
    /// The canvas default, `10px sans-serif`.
    fn default() -> Self {
        Self {
            family: "sans-serif".into(),
            size_px: 10.0,
            bold: false,
            italic: false,
        }
    }
}

impl FontSpec {
    pub fn new(family: impl Into<String>, size_px: f32) -> Self {
        Self {
            family: family.into(),
            size_px,
            ..Default::default()
        }
    }

    pub fn bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    pub fn italic(mut self, italic: bool) -> Self {
        self.italic = italic;
        self
    }
}

/// A rasterized line of text.
///
/// `data` is `width * height` coverage values (0 = no ink, 1 = full ink).
/// The baseline sits `ascent` pixels below the top row; `advance` is the
/// logical width used for alignment.
#[derive(Debug, Clone)]
pub struct GlyphRun {
    pub width: usize,
    pub height: usize,
    pub ascent: f32,
    pub advance: f32,
    pub data: Vec<f32>,
}

impl GlyphRun {
    fn blank(width: usize, height: usize, ascent: f32, advance: f32) -> Self {
        Self {
            width,
            height,
            ascent,
            advance,
            data: vec![0.0; width * height],
        }
    }
}

/// Spleen faces available as built-in fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BitmapFace {
    Small,
    Medium,
    Large,
}

impl BitmapFace {
    /// Pick the smallest face that is at least as tall as the target, so
    /// glyphs are downsampled rather than blown up.
    fn for_size(size_px: f32) -> Self {
        if size_px <= 12.0 {
            BitmapFace::Small
        } else if size_px <= 16.0 {
            BitmapFace::Medium
        } else {
            BitmapFace::Large
        }
    }

    fn cell(self) -> (usize, usize) {
        match self {
            BitmapFace::Small => (6, 12),
            BitmapFace::Medium => (8, 16),
            BitmapFace::Large => (12, 24),
        }
    }

    fn data(self) -> &'static [u8] {
        match self {
            BitmapFace::Small => FONT_6X12,
            BitmapFace::Medium => FONT_8X16,
            BitmapFace::Large => FONT_12X24,
        }
    }
}

/// Font registry and glyph cache owned by a drawing surface.
pub struct FontBook {
    regular: Option<FontArc>,
    bold: Option<FontArc>,
    bitmap_glyphs: HashMap<(BitmapFace, char), Vec<bool>>,
}

impl Default for FontBook {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FontBook {
    /// Only the compiled-in bitmap fonts.
    pub fn builtin() -> Self {
        Self {
            regular: None,
            bold: None,
            bitmap_glyphs: HashMap::new(),
        }
    }

    /// Use TrueType font data for all text; `bold` is optional.
    pub fn with_truetype(regular: Vec<u8>, bold: Option<Vec<u8>>) -> Result<Self, ThumbnailError> {
        let regular = FontArc::try_from_vec(regular)
            .map_err(|e| ThumbnailError::Config(format!("Invalid font data: {}", e)))?;
        let bold = bold
            .map(|b| {
                FontArc::try_from_vec(b)
                    .map_err(|e| ThumbnailError::Config(format!("Invalid bold font data: {}", e)))
            })
            .transpose()?;
        Ok(Self {
            regular: Some(regular),
            bold,
            bitmap_glyphs: HashMap::new(),
        })
    }

    /// Load TrueType files from disk. With no regular font, the built-in
    /// bitmap fonts are used.
    pub fn from_files(regular: Option<&Path>, bold: Option<&Path>) -> Result<Self, ThumbnailError> {
        let Some(regular) = regular else {
            return Ok(Self::builtin());
        };
        let read = |p: &Path| {
            std::fs::read(p).map_err(|e| {
                ThumbnailError::Config(format!("Failed to read font {}: {}", p.display(), e))
            })
        };
        let regular_data = read(regular)?;
        let bold_data = bold.map(read).transpose()?;
        Self::with_truetype(regular_data, bold_data)
    }

    pub fn has_truetype(&self) -> bool {
        self.regular.is_some()
    }

    /// Logical width of `text` in device pixels, from metrics alone.
    pub fn measure(&self, text: &str, spec: &FontSpec) -> f32 {
        let size = layout_size(spec);
        match &self.regular {
            Some(regular) => {
                let font = match (spec.bold, &self.bold) {
                    (true, Some(b)) => b,
                    _ => regular,
                };
                truetype_positions(font, text, size).1
            }
            None => bitmap_advance(text, size),
        }
    }

    /// Rasterize a single line of text.
    pub fn layout(&mut self, text: &str, spec: &FontSpec) -> GlyphRun {
        let size = layout_size(spec);
        match self.regular.clone() {
            Some(regular) => {
                let (font, synth_bold) = match (spec.bold, &self.bold) {
                    (true, Some(b)) => (b.clone(), false),
                    (true, None) => (regular, true),
                    (false, _) => (regular, false),
                };
                layout_truetype(&font, text, size, spec.italic, synth_bold)
            }
            None => self.layout_bitmap(text, size, spec.bold, spec.italic),
        }
    }

    fn bitmap_glyph(&mut self, face: BitmapFace, ch: char) -> &[bool] {
        self.bitmap_glyphs
            .entry((face, ch))
            .or_insert_with(|| load_bitmap_glyph(face, ch))
    }

    fn layout_bitmap(&mut self, text: &str, size: f32, bold: bool, italic: bool) -> GlyphRun {
        let face = BitmapFace::for_size(size);
        let (cell_w, cell_h) = face.cell();
        let scale = size / cell_h as f32;
        let advance_per_char = cell_w as f32 * scale;

        let chars: Vec<char> = text.chars().collect();
        let advance = bitmap_advance(text, size);
        let ascent = size * BITMAP_ASCENT;
        let bold_px = if bold { (size / 12.0).round().max(1.0) as usize } else { 0 };
        let italic_px = if italic { ascent * ITALIC_SHEAR } else { 0.0 };

        let width = ((advance + italic_px).ceil() as usize + bold_px).max(1);
        let height = (size.ceil() as usize).max(1);
        let mut run = GlyphRun::blank(width, height, ascent, advance);

        let weight = 1.0 / 16.0;
        for (i, &ch) in chars.iter().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let bits = self.bitmap_glyph(face, ch).to_vec();
            let origin = i as f32 * advance_per_char;
            let px_start = origin.floor().max(0.0) as usize;
            let px_end = ((origin + advance_per_char + italic_px).ceil() as usize).min(width);

            for py in 0..height {
                for px in px_start..px_end {
                    let mut hits = 0;
                    for sy in 0..4 {
                        let y = py as f32 + (sy as f32 + 0.5) / 4.0;
                        let shear = if italic { (ascent - y) * ITALIC_SHEAR } else { 0.0 };
                        let gy = (y / scale) as usize;
                        if gy >= cell_h {
                            continue;
                        }
                        for sx in 0..4 {
                            let x = px as f32 + (sx as f32 + 0.5) / 4.0 - origin - shear;
                            if x < 0.0 {
                                continue;
                            }
                            let gx = (x / scale) as usize;
                            if gx < cell_w && bits[gy * cell_w + gx] {
                                hits += 1;
                            }
                        }
                    }
                    if hits > 0 {
                        let idx = py * width + px;
                        run.data[idx] = (run.data[idx] + hits as f32 * weight).min(1.0);
                    }
                }
            }
        }

        if bold_px > 0 {
            embolden(&mut run, bold_px);
        }
        run
    }
}

/// Read one glyph from a Spleen face; unknown characters become a box.
fn load_bitmap_glyph(face: BitmapFace, ch: char) -> Vec<bool> {
    let (cell_w, cell_h) = face.cell();
    let mut glyph = vec![false; cell_w * cell_h];

    let found = match PSF2Font::new(face.data()) {
        Ok(mut spleen) => {
            let utf8_bytes = ch.to_string();
            if let Some(spleen_glyph) = spleen.glyph_for_utf8(utf8_bytes.as_bytes()) {
                for (row_y, row) in spleen_glyph.enumerate() {
                    for (col_x, on) in row.enumerate() {
                        let idx = row_y * cell_w + col_x;
                        if col_x < cell_w && idx < glyph.len() {
                            glyph[idx] = on;
                        }
                    }
                }
                true
            } else {
                false
            }
        }
        Err(_) => false,
    };

    if !found {
        draw_box(&mut glyph, cell_w, cell_h);
    }
    glyph
}

/// Box outline for characters the font does not cover.
fn draw_box(glyph: &mut [bool], width: usize, height: usize) {
    let (x0, x1) = (1, width.saturating_sub(2));
    let (y0, y1) = (height / 6, height - height / 6 - 1);
    for x in x0..=x1 {
        glyph[y0 * width + x] = true;
        glyph[y1 * width + x] = true;
    }
    for y in y0..=y1 {
        glyph[y * width + x0] = true;
        glyph[y * width + x1] = true;
    }
}

fn layout_size(spec: &FontSpec) -> f32 {
    if spec.size_px.is_finite() {
        spec.size_px.max(1.0)
    } else {
        10.0
    }
}

fn bitmap_advance(text: &str, size: f32) -> f32 {
    let (cell_w, cell_h) = BitmapFace::for_size(size).cell();
    cell_w as f32 * (size / cell_h as f32) * text.chars().count() as f32
}

/// Pen position of each glyph plus the total advance, kerning applied.
fn truetype_positions(font: &FontArc, text: &str, size: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(size);
    let mut glyphs = Vec::new();
    let mut caret_x = 0.0f32;
    let mut previous = None;
    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = previous {
            caret_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, caret_x));
        caret_x += scaled.h_advance(glyph_id);
        previous = Some(glyph_id);
    }
    (glyphs, caret_x)
}

/// Widen every stroke to the right by `px` pixels.
fn embolden(run: &mut GlyphRun, px: usize) {
    let src = run.data.clone();
    for y in 0..run.height {
        let row = &src[y * run.width..(y + 1) * run.width];
        for x in 0..run.width {
            let lo = x.saturating_sub(px);
            let v = row[lo..=x].iter().copied().fold(0.0f32, f32::max);
            run.data[y * run.width + x] = v;
        }
    }
}

fn layout_truetype(font: &FontArc, text: &str, size: f32, italic: bool, synth_bold: bool) -> GlyphRun {
    let scaled = font.as_scaled(size);
    let (glyphs, caret_x) = truetype_positions(font, text, size);

    let ascent = scaled.ascent();
    let descent = scaled.descent();
    let bold_px = if synth_bold { (size / 12.0).round().max(1.0) as usize } else { 0 };
    let italic_px = if italic { ascent * ITALIC_SHEAR } else { 0.0 };

    let width = ((caret_x + italic_px).ceil() as usize + bold_px).max(1);
    let height = ((ascent - descent).ceil() as usize).max(1);
    let mut run = GlyphRun::blank(width, height, ascent, caret_x);

    for &(glyph_id, glyph_x) in &glyphs {
        let glyph = glyph_id.with_scale_and_position(size, ab_glyph::point(glyph_x, ascent));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|px, py, coverage| {
                let y = py as i32 + bounds.min.y as i32;
                let shear = if italic {
                    ((ascent - y as f32) * ITALIC_SHEAR).round() as i32
                } else {
                    0
                };
                let x = px as i32 + bounds.min.x as i32 + shear;
                if x >= 0 && x < width as i32 && y >= 0 && y < height as i32 {
                    let idx = y as usize * width + x as usize;
                    run.data[idx] = (run.data[idx] + coverage).min(1.0);
                }
            });
        }
    }

    if bold_px > 0 {
        embolden(&mut run, bold_px);
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_face_selection() {
        assert_eq!(BitmapFace::for_size(8.0), BitmapFace::Small);
        assert_eq!(BitmapFace::for_size(14.4), BitmapFace::Medium);
        assert_eq!(BitmapFace::for_size(40.0), BitmapFace::Large);
    }

    #[test]
    fn test_bitmap_layout_has_ink() {
        let mut book = FontBook::builtin();
        let run = book.layout("Hello", &FontSpec::new("Arial", 24.0));
        assert_eq!(run.height, 24);
        assert_eq!(run.data.len(), run.width * run.height);
        assert!(run.data.iter().any(|&v| v > 0.5));
        // 12x24 face at 24px: 12px per character
        assert!((run.advance - 60.0).abs() < 1e-4);
    }

    #[test]
    fn test_bitmap_downsampling_is_antialiased() {
        let mut book = FontBook::builtin();
        let run = book.layout("Smooth", &FontSpec::new("Arial", 18.0));
        assert!(run.data.iter().any(|&v| v > 0.01 && v < 0.99));
    }

    #[test]
    fn test_whitespace_has_no_ink() {
        let mut book = FontBook::builtin();
        let run = book.layout("   ", &FontSpec::new("Arial", 12.0));
        assert!(run.data.iter().all(|&v| v == 0.0));
        assert!(run.advance > 0.0);
    }

    #[test]
    fn test_bold_adds_ink() {
        let mut book = FontBook::builtin();
        let regular: f32 = book.layout("Bold", &FontSpec::new("Arial", 24.0)).data.iter().sum();
        let bold: f32 = book
            .layout("Bold", &FontSpec::new("Arial", 24.0).bold(true))
            .data
            .iter()
            .sum();
        assert!(bold > regular);
    }

    #[test]
    fn test_italic_widens_run_but_not_advance() {
        let mut book = FontBook::builtin();
        let upright = book.layout("Tilt", &FontSpec::new("Arial", 24.0));
        let italic = book.layout("Tilt", &FontSpec::new("Arial", 24.0).italic(true));
        assert!(italic.width > upright.width);
        assert_eq!(italic.advance, upright.advance);
    }

    #[test]
    fn test_measure_scales_with_size() {
        let book = FontBook::builtin();
        let small = book.measure("IMG", &FontSpec::new("Arial", 12.0));
        let large = book.measure("IMG", &FontSpec::new("Arial", 24.0));
        assert!((large - 2.0 * small).abs() < 1e-3);
    }

    #[test]
    fn test_measure_agrees_with_layout() {
        let mut book = FontBook::builtin();
        let spec = FontSpec::new("Arial", 18.0).bold(true);
        let run = book.layout("Warranty", &spec);
        assert_eq!(book.measure("Warranty", &spec), run.advance);
    }

    #[test]
    fn test_measure_of_huge_size_does_not_rasterize() {
        let book = FontBook::builtin();
        // 12x24 face: half the size per character
        let width = book.measure("Warranty", &FontSpec::new("Arial", 1.0e6));
        assert!((width / 4.0e6 - 1.0).abs() < 1e-4, "got {}", width);
    }

    #[test]
    fn test_invalid_truetype_is_config_error() {
        let err = FontBook::with_truetype(vec![0, 1, 2, 3], None).err().unwrap();
        assert!(matches!(err, ThumbnailError::Config(_)));
    }

    #[test]
    fn test_missing_font_file_is_config_error() {
        let err = FontBook::from_files(Some(Path::new("/nonexistent/font.ttf")), None)
            .err()
            .unwrap();
        assert!(matches!(err, ThumbnailError::Config(_)));
        assert!(!FontBook::from_files(None, None).unwrap().has_truetype());
    }
}
