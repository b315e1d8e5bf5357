//! A canvas that records draw calls instead of painting them.
//!
//! Each recorded operation carries the state it was drawn with (transform,
//! colors, font), so a recording can be compared structurally: two renders
//! that produce the same op list paint the same pixels. The CLI serializes
//! recordings with `--dump-ops`.

use image::RgbaImage;
use serde::Serialize;

use super::font::FontSpec;
use super::geometry::{Affine, Path};
use super::{Canvas, DrawState, Shadow, TextAlign, TextBaseline};
use crate::color::Rgba;

/// State that affects how a recorded operation looks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paint {
    pub color: Rgba,
    pub transform: Affine,
    pub global_alpha: f32,
    pub shadow: Option<Shadow>,
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    Reset {
        width: u32,
        height: u32,
    },
    FillRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        paint: Paint,
    },
    StrokeRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        line_width: f32,
        dash: Vec<f32>,
        paint: Paint,
    },
    FillPath {
        path: Path,
        paint: Paint,
    },
    StrokePath {
        path: Path,
        line_width: f32,
        dash: Vec<f32>,
        paint: Paint,
    },
    FillText {
        text: String,
        x: f32,
        y: f32,
        font: FontSpec,
        align: TextAlign,
        baseline: TextBaseline,
        paint: Paint,
    },
    DrawImage {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        source_width: u32,
        source_height: u32,
        paint: Paint,
    },
}

impl DrawOp {
    /// The paint state of a drawing op (`None` for `Reset`).
    pub fn paint(&self) -> Option<&Paint> {
        match self {
            DrawOp::Reset { .. } => None,
            DrawOp::FillRect { paint, .. }
            | DrawOp::StrokeRect { paint, .. }
            | DrawOp::FillPath { paint, .. }
            | DrawOp::StrokePath { paint, .. }
            | DrawOp::FillText { paint, .. }
            | DrawOp::DrawImage { paint, .. } => Some(paint),
        }
    }

    /// Text of a `FillText` op.
    pub fn text(&self) -> Option<&str> {
        match self {
            DrawOp::FillText { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Recording canvas.
#[derive(Debug, Default)]
pub struct Recorder {
    width: u32,
    height: u32,
    state: DrawState,
    stack: Vec<DrawState>,
    ops: Vec<DrawOp>,
}

impl Recorder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<DrawOp> {
        self.ops
    }

    /// Depth of the save stack; zero after balanced save/restore pairs.
    pub fn save_depth(&self) -> usize {
        self.stack.len()
    }

    fn paint(&self, color: Rgba) -> Paint {
        Paint {
            color,
            transform: self.state.transform,
            global_alpha: self.state.global_alpha,
            shadow: self.state.shadow.filter(Shadow::is_visible),
        }
    }
}

impl Canvas for Recorder {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn reset(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.state = DrawState::default();
        self.stack.clear();
        self.ops.clear();
        self.ops.push(DrawOp::Reset { width, height });
    }

    fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.state.transform = self.state.transform.translate(dx, dy);
    }

    fn rotate(&mut self, radians: f32) {
        self.state.transform = self.state.transform.rotate(radians);
    }

    fn set_fill_color(&mut self, color: Rgba) {
        self.state.fill = color;
    }

    fn set_stroke_color(&mut self, color: Rgba) {
        self.state.stroke = color;
    }

    fn set_line_width(&mut self, width: f32) {
        self.state.set_line_width(width);
    }

    fn set_line_dash(&mut self, pattern: &[f32]) {
        self.state.set_line_dash(pattern);
    }

    fn set_font(&mut self, font: FontSpec) {
        self.state.font = font;
    }

    fn set_text_align(&mut self, align: TextAlign) {
        self.state.text_align = align;
    }

    fn set_text_baseline(&mut self, baseline: TextBaseline) {
        self.state.text_baseline = baseline;
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.state.set_global_alpha(alpha);
    }

    fn set_shadow(&mut self, shadow: Option<Shadow>) {
        self.state.shadow = shadow;
    }

    fn fill_path(&mut self, path: &Path) {
        self.ops.push(DrawOp::FillPath {
            path: path.clone(),
            paint: self.paint(self.state.fill),
        });
    }

    fn stroke_path(&mut self, path: &Path) {
        self.ops.push(DrawOp::StrokePath {
            path: path.clone(),
            line_width: self.state.line_width,
            dash: self.state.line_dash.clone(),
            paint: self.paint(self.state.stroke),
        });
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.ops.push(DrawOp::FillRect {
            x,
            y,
            width,
            height,
            paint: self.paint(self.state.fill),
        });
    }

    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.ops.push(DrawOp::StrokeRect {
            x,
            y,
            width,
            height,
            line_width: self.state.line_width,
            dash: self.state.line_dash.clone(),
            paint: self.paint(self.state.stroke),
        });
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32) {
        self.ops.push(DrawOp::FillText {
            text: text.to_string(),
            x,
            y,
            font: self.state.font.clone(),
            align: self.state.text_align,
            baseline: self.state.text_baseline,
            paint: self.paint(self.state.fill),
        });
    }

    /// Fixed-pitch estimate: 0.6 em per character.
    fn measure_text(&mut self, text: &str) -> f32 {
        text.chars().count() as f32 * self.state.font.size_px * 0.6
    }

    fn draw_image(&mut self, image: &RgbaImage, x: f32, y: f32, width: f32, height: f32) {
        self.ops.push(DrawOp::DrawImage {
            x,
            y,
            width,
            height,
            source_width: image.width(),
            source_height: image.height(),
            paint: self.paint(Rgba::WHITE),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_state_with_each_op() {
        let mut rec = Recorder::new(100, 100);
        rec.set_fill_color(Rgba::rgb(1, 2, 3));
        rec.save();
        rec.translate(5.0, 5.0);
        rec.fill_rect(0.0, 0.0, 10.0, 10.0);
        rec.restore();
        rec.fill_rect(0.0, 0.0, 10.0, 10.0);

        let ops = rec.ops();
        assert_eq!(ops.len(), 2);
        let first = ops[0].paint().unwrap();
        assert_eq!(first.color, Rgba::rgb(1, 2, 3));
        assert_eq!(first.transform, Affine::IDENTITY.translate(5.0, 5.0));
        assert!(ops[1].paint().unwrap().transform.is_identity());
        assert_eq!(rec.save_depth(), 0);
    }

    #[test]
    fn test_reset_starts_new_recording() {
        let mut rec = Recorder::new(10, 10);
        rec.fill_rect(0.0, 0.0, 1.0, 1.0);
        rec.reset(20, 30);
        assert_eq!(
            rec.ops(),
            &[DrawOp::Reset {
                width: 20,
                height: 30
            }]
        );
        assert_eq!((rec.width(), rec.height()), (20, 30));
    }

    #[test]
    fn test_invisible_shadow_is_not_recorded() {
        let mut rec = Recorder::new(10, 10);
        rec.set_shadow(Some(Shadow {
            color: Rgba::BLACK,
            blur: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }));
        rec.fill_rect(0.0, 0.0, 1.0, 1.0);
        assert_eq!(rec.ops()[0].paint().unwrap().shadow, None);
    }

    #[test]
    fn test_ops_serialize_with_tag() {
        let mut rec = Recorder::new(10, 10);
        rec.fill_text("Hello", 1.0, 2.0);
        let json = serde_json::to_value(rec.ops()).unwrap();
        assert_eq!(json[0]["op"], "fill_text");
        assert_eq!(json[0]["text"], "Hello");
        assert_eq!(json[0]["font"]["size_px"], 10.0);
    }
}
