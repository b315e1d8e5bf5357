//! # Drawing Surfaces
//!
//! A small 2D drawing API modeled on the HTML canvas context the editor
//! previews with. Element draw routines are written against the [`Canvas`]
//! trait so the same code paints pixels or records operations.
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Surface`] | Software rasterizer over an RGBA buffer |
//! | [`Recorder`] | Records [`DrawOp`]s instead of painting |
//! | [`Path`] | Flattened path builder (lines, arcs) |
//! | [`Affine`] | Current transform |
//!
//! ## State
//!
//! Every setter changes the current drawing state; [`Canvas::save`] pushes a
//! copy and [`Canvas::restore`] pops it, exactly like `ctx.save()` and
//! `ctx.restore()`. Transforms post-multiply, so
//! `translate(cx, cy); rotate(a); translate(-cx, -cy)` rotates about
//! `(cx, cy)`.

pub mod font;
pub mod geometry;
pub mod raster;
mod record;
mod surface;

pub use font::{FontBook, FontSpec};
pub use geometry::{Affine, Path, Point, deg_to_rad};
pub use record::{DrawOp, Recorder};
pub use surface::Surface;

use image::RgbaImage;
use serde::Serialize;

use crate::color::Rgba;

/// Horizontal text anchor relative to the `x` passed to `fill_text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    /// `left` / `start`
    #[default]
    Left,
    Center,
    /// `right` / `end`
    Right,
}

/// Vertical text anchor relative to the `y` passed to `fill_text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextBaseline {
    #[default]
    Alphabetic,
    Top,
    Middle,
    Bottom,
}

/// Drop shadow painted beneath fills, strokes and text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Shadow {
    pub color: Rgba,
    /// Blur radius in device pixels.
    pub blur: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Shadow {
    /// A canvas only paints shadows that are non-transparent and either
    /// blurred or offset.
    pub fn is_visible(&self) -> bool {
        !self.color.is_transparent()
            && (self.blur > 0.0 || self.offset_x != 0.0 || self.offset_y != 0.0)
    }
}

/// Canvas drawing state, saved and restored as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawState {
    pub transform: Affine,
    pub fill: Rgba,
    pub stroke: Rgba,
    pub line_width: f32,
    pub line_dash: Vec<f32>,
    pub font: FontSpec,
    pub text_align: TextAlign,
    pub text_baseline: TextBaseline,
    pub global_alpha: f32,
    pub shadow: Option<Shadow>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            fill: Rgba::BLACK,
            stroke: Rgba::BLACK,
            line_width: 1.0,
            line_dash: Vec::new(),
            font: FontSpec::default(),
            text_align: TextAlign::default(),
            text_baseline: TextBaseline::default(),
            global_alpha: 1.0,
            shadow: None,
        }
    }
}

impl DrawState {
    /// Canvas ignores non-positive or non-finite line widths.
    pub fn set_line_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.line_width = width;
        }
    }

    /// Canvas ignores dash lists with negative or non-finite entries and
    /// repeats odd-length lists.
    pub fn set_line_dash(&mut self, pattern: &[f32]) {
        if pattern.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return;
        }
        let mut dash = pattern.to_vec();
        if dash.len() % 2 == 1 {
            dash.extend_from_slice(pattern);
        }
        self.line_dash = dash;
    }

    pub fn set_global_alpha(&mut self, alpha: f32) {
        if alpha.is_finite() && (0.0..=1.0).contains(&alpha) {
            self.global_alpha = alpha;
        }
    }
}

/// The 2D drawing API element routines paint through.
pub trait Canvas {
    /// Width in device pixels.
    fn width(&self) -> u32;

    /// Height in device pixels.
    fn height(&self) -> u32;

    /// Resize to `width` x `height`, clear to transparent and reset the
    /// drawing state, like assigning `canvas.width`.
    fn reset(&mut self, width: u32, height: u32);

    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, dx: f32, dy: f32);
    /// Rotate clockwise by `radians`.
    fn rotate(&mut self, radians: f32);

    fn set_fill_color(&mut self, color: Rgba);
    fn set_stroke_color(&mut self, color: Rgba);
    fn set_line_width(&mut self, width: f32);
    fn set_line_dash(&mut self, pattern: &[f32]);
    fn set_font(&mut self, font: FontSpec);
    fn set_text_align(&mut self, align: TextAlign);
    fn set_text_baseline(&mut self, baseline: TextBaseline);
    fn set_global_alpha(&mut self, alpha: f32);
    fn set_shadow(&mut self, shadow: Option<Shadow>);

    /// Fill every subpath (closed implicitly) with the fill color.
    fn fill_path(&mut self, path: &Path);

    /// Stroke the path with the stroke color, line width and dash.
    fn stroke_path(&mut self, path: &Path);

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.fill_path(&Path::rect(x, y, width, height));
    }

    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.stroke_path(&Path::rect(x, y, width, height));
    }

    /// Draw one line of text anchored at `(x, y)` per the align and
    /// baseline settings.
    fn fill_text(&mut self, text: &str, x: f32, y: f32);

    /// Advance width of `text` in user units with the current font.
    fn measure_text(&mut self, text: &str) -> f32;

    /// Draw `image` scaled into the rectangle.
    fn draw_image(&mut self, image: &RgbaImage, x: f32, y: f32, width: f32, height: f32);
}
