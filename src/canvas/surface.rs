//! Software canvas over an RGBA pixel buffer.
//!
//! Geometry is converted to coverage masks by [`super::raster`] and
//! composited source-over with straight alpha. Text and images are drawn by
//! inverse-mapping each device pixel into glyph or image space, so rotated
//! elements render without a separate code path.

use image::imageops::FilterType;
use image::RgbaImage;
use rayon::prelude::*;

use super::font::{FontBook, FontSpec, GlyphRun};
use super::geometry::{Affine, Path, Point};
use super::raster::{self, Coverage};
use super::{Canvas, DrawState, Shadow, TextAlign, TextBaseline};
use crate::color::Rgba;

/// Largest glyph run rasterized, as a multiple of the surface area.
const GLYPH_RUN_BUDGET: f32 = 4.0;

/// Floor for the glyph run budget on tiny surfaces.
const MIN_GLYPH_RUN_PIXELS: f32 = 65_536.0;

/// A raster drawing surface.
pub struct Surface {
    pixels: RgbaImage,
    state: DrawState,
    stack: Vec<DrawState>,
    fonts: FontBook,
}

impl Surface {
    /// Transparent surface with the built-in fonts.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_fonts(width, height, FontBook::builtin())
    }

    pub fn with_fonts(width: u32, height: u32, fonts: FontBook) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
            state: DrawState::default(),
            stack: Vec::new(),
            fonts,
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Color at a device pixel; transparent outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        match self.pixels.get_pixel_checked(x, y) {
            Some(p) => Rgba::new(p[0], p[1], p[2], p[3]),
            None => Rgba::TRANSPARENT,
        }
    }

    /// Current drawing state.
    pub fn state(&self) -> &DrawState {
        &self.state
    }

    /// Paint a coverage mask with `color`, shadow first.
    fn paint_coverage(&mut self, cov: Coverage, color: Rgba) {
        if cov.is_empty() {
            return;
        }
        if let Some(shadow) = self.state.shadow.filter(Shadow::is_visible) {
            let shadow_cov = self.shadow_mask(&cov, &shadow);
            self.composite(&shadow_cov, shadow.color);
        }
        self.composite(&cov, color);
    }

    /// Source-over a solid color through a coverage mask.
    fn composite(&mut self, cov: &Coverage, color: Rgba) {
        let alpha = color.alpha() * self.state.global_alpha;
        if alpha <= 0.0 || cov.is_empty() || self.pixels.width() == 0 {
            return;
        }
        let width = self.pixels.width() as i32;
        let row_bytes = self.pixels.width() as usize * 4;
        let src = [color.r as f32, color.g as f32, color.b as f32];

        let buf: &mut [u8] = &mut self.pixels;
        buf.par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, row)| {
                let ly = y as i32 - cov.y0;
                if ly < 0 || ly >= cov.height as i32 {
                    return;
                }
                let mask = &cov.data[ly as usize * cov.width..(ly as usize + 1) * cov.width];
                for (lx, &c) in mask.iter().enumerate() {
                    let x = cov.x0 + lx as i32;
                    if c <= 0.0 || x < 0 || x >= width {
                        continue;
                    }
                    let i = x as usize * 4;
                    blend_pixel(&mut row[i..i + 4], src, alpha * c);
                }
            });
    }

    /// Source-over a patch of straight-alpha colors placed at `(x0, y0)`.
    fn composite_patch(&mut self, x0: i32, y0: i32, patch_w: usize, patch: &[[f32; 4]]) {
        let global = self.state.global_alpha;
        if patch_w == 0 || global <= 0.0 || self.pixels.width() == 0 {
            return;
        }
        let patch_h = patch.len() / patch_w;
        let width = self.pixels.width() as i32;
        let row_bytes = self.pixels.width() as usize * 4;

        let buf: &mut [u8] = &mut self.pixels;
        buf.par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, row)| {
                let ly = y as i32 - y0;
                if ly < 0 || ly >= patch_h as i32 {
                    return;
                }
                let src_row = &patch[ly as usize * patch_w..(ly as usize + 1) * patch_w];
                for (lx, px) in src_row.iter().enumerate() {
                    let x = x0 + lx as i32;
                    if px[3] <= 0.0 || x < 0 || x >= width {
                        continue;
                    }
                    let i = x as usize * 4;
                    blend_pixel(&mut row[i..i + 4], [px[0], px[1], px[2]], px[3] * global);
                }
            });
    }

    /// Offset and blur a mask for the current shadow.
    fn shadow_mask(&self, cov: &Coverage, shadow: &Shadow) -> Coverage {
        let shifted = cov
            .clone()
            .offset(shadow.offset_x.round() as i32, shadow.offset_y.round() as i32);
        raster::blur(
            &shifted,
            shadow.blur / 2.0,
            self.pixels.width(),
            self.pixels.height(),
        )
    }

    /// Device pixel bounds of a transformed `w` x `h` rectangle, clipped.
    fn device_bounds(&self, m: &Affine, w: f32, h: f32) -> Option<(i32, i32, usize, usize)> {
        let corners = [
            m.apply(Point::new(0.0, 0.0)),
            m.apply(Point::new(w, 0.0)),
            m.apply(Point::new(0.0, h)),
            m.apply(Point::new(w, h)),
        ];
        let min_x = corners.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
        let min_y = corners.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
        let max_y = corners.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
        if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
            return None;
        }
        let x0 = (min_x.floor() as i64).max(0);
        let y0 = (min_y.floor() as i64).max(0);
        let x1 = (max_x.ceil() as i64).min(self.pixels.width() as i64);
        let y1 = (max_y.ceil() as i64).min(self.pixels.height() as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as i32, y0 as i32, (x1 - x0) as usize, (y1 - y0) as usize))
    }

    /// Resample a glyph run through `m` (run pixels to device pixels).
    fn glyph_coverage(&self, run: &GlyphRun, m: &Affine) -> Coverage {
        let Some(inv) = m.invert() else {
            return Coverage::empty();
        };
        let Some((bx, by, bw, bh)) = self.device_bounds(m, run.width as f32, run.height as f32)
        else {
            return Coverage::empty();
        };
        let mut cov = Coverage::new(bx, by, bw, bh);
        cov.data
            .par_chunks_mut(bw)
            .enumerate()
            .for_each(|(row, out)| {
                for (lx, v) in out.iter_mut().enumerate() {
                    let p = Point::new(bx as f32 + lx as f32 + 0.5, by as f32 + row as f32 + 0.5);
                    let q = inv.apply(p);
                    *v = sample_mask(&run.data, run.width, run.height, q.x - 0.5, q.y - 0.5);
                }
            });
        cov
    }
}

/// Straight-alpha source-over of one pixel.
#[inline]
fn blend_pixel(dst: &mut [u8], src: [f32; 3], src_a: f32) {
    let sa = src_a.clamp(0.0, 1.0);
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let d = dst[c] as f32;
        let v = (src[c] * sa + d * da * (1.0 - sa)) / out_a;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Bilinear sample of a coverage grid; zero outside.
fn sample_mask(data: &[f32], w: usize, h: usize, x: f32, y: f32) -> f32 {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let at = |xi: f32, yi: f32| -> f32 {
        if xi < 0.0 || yi < 0.0 || xi >= w as f32 || yi >= h as f32 {
            0.0
        } else {
            data[yi as usize * w + xi as usize]
        }
    };
    let top = at(x0, y0) * (1.0 - fx) + at(x0 + 1.0, y0) * fx;
    let bottom = at(x0, y0 + 1.0) * (1.0 - fx) + at(x0 + 1.0, y0 + 1.0) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Bilinear sample of an image with edge clamping, returned as straight
/// `[r, g, b, a]` where color is 0..255 and alpha 0..1.
fn sample_image(img: &RgbaImage, x: f32, y: f32) -> [f32; 4] {
    let max_x = img.width() as f32 - 1.0;
    let max_y = img.height() as f32 - 1.0;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor();
    let y0 = y.floor();
    let x1 = (x0 + 1.0).min(max_x);
    let y1 = (y0 + 1.0).min(max_y);
    let fx = x - x0;
    let fy = y - y0;

    // Interpolate premultiplied so transparent texels do not bleed color
    let mut acc = [0.0f32; 4];
    for (sx, sy, w) in [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x1, y0, fx * (1.0 - fy)),
        (x0, y1, (1.0 - fx) * fy),
        (x1, y1, fx * fy),
    ] {
        let p = img.get_pixel(sx as u32, sy as u32);
        let a = p[3] as f32 / 255.0;
        acc[0] += p[0] as f32 * a * w;
        acc[1] += p[1] as f32 * a * w;
        acc[2] += p[2] as f32 * a * w;
        acc[3] += a * w;
    }
    if acc[3] <= 0.0 {
        return [0.0; 4];
    }
    [acc[0] / acc[3], acc[1] / acc[3], acc[2] / acc[3], acc[3]]
}

/// Snap the translation of an axis-aligned, unscaled mapping to whole
/// pixels so glyphs stay crisp.
fn snap(mut m: Affine) -> Affine {
    if m.is_axis_aligned() && (m.a - 1.0).abs() < 1e-4 && (m.d - 1.0).abs() < 1e-4 {
        m.e = m.e.round();
        m.f = m.f.round();
    }
    m
}

impl Canvas for Surface {
    fn width(&self) -> u32 {
        self.pixels.width()
    }

    fn height(&self) -> u32 {
        self.pixels.height()
    }

    fn reset(&mut self, width: u32, height: u32) {
        if self.pixels.width() == width && self.pixels.height() == height {
            self.pixels.fill(0);
        } else {
            self.pixels = RgbaImage::new(width, height);
        }
        self.state = DrawState::default();
        self.stack.clear();
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
        let device = path.transformed(&self.state.transform);
        let polygons: Vec<Vec<Point>> = device
            .subpaths
            .into_iter()
            .filter(|sp| sp.points.len() >= 3)
            .map(|sp| sp.points)
            .collect();
        if polygons.is_empty() {
            return;
        }
        let cov = raster::fill_polygons(&polygons, self.pixels.width(), self.pixels.height());
        self.paint_coverage(cov, self.state.fill);
    }

    fn stroke_path(&mut self, path: &Path) {
        let transform = self.state.transform;
        // Dash lengths are in user units, so dash before transforming
        let segments: Vec<(Point, Point)> = path
            .dashed_segments(&self.state.line_dash)
            .into_iter()
            .map(|(a, b)| (transform.apply(a), transform.apply(b)))
            .collect();
        let half_width = self.state.line_width * transform.scale_factor() / 2.0;
        let cov = raster::stroke_segments(
            &segments,
            half_width,
            self.pixels.width(),
            self.pixels.height(),
        );
        self.paint_coverage(cov, self.state.stroke);
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32) {
        if text.is_empty() {
            return;
        }
        let transform = self.state.transform;
        let sf = transform.scale_factor();
        if sf <= 0.0 || !sf.is_finite() {
            return;
        }

        // Rasterize at device resolution, then place in user space. Runs far
        // larger than the surface are rasterized coarser and scaled up.
        let mut device_font = self.state.font.clone();
        device_font.size_px *= sf;
        let mut rs = sf;
        let size = device_font.size_px;
        if size.is_finite() && size > 1.0 {
            let area = (self.fonts.measure(text, &device_font) + size) * size * 1.5;
            let budget = (self.pixels.width() as f32 * self.pixels.height() as f32
                * GLYPH_RUN_BUDGET)
                .max(MIN_GLYPH_RUN_PIXELS);
            if area > budget {
                let k = (budget / area).sqrt();
                device_font.size_px *= k;
                rs *= k;
            }
        }
        let run = self.fonts.layout(text, &device_font);

        let advance = run.advance / rs;
        let left = match self.state.text_align {
            TextAlign::Left => x,
            TextAlign::Center => x - advance / 2.0,
            TextAlign::Right => x - advance,
        };
        let ascent = run.ascent / rs;
        let em = run.height as f32 / rs;
        let top = match self.state.text_baseline {
            TextBaseline::Alphabetic => y - ascent,
            TextBaseline::Top => y,
            TextBaseline::Middle => y - em / 2.0,
            TextBaseline::Bottom => y - em,
        };

        let m = snap(transform.translate(left, top).scale(1.0 / rs, 1.0 / rs));
        let cov = self.glyph_coverage(&run, &m);
        self.paint_coverage(cov, self.state.fill);
    }

    fn measure_text(&mut self, text: &str) -> f32 {
        self.fonts.measure(text, &self.state.font)
    }

    fn draw_image(&mut self, image: &RgbaImage, x: f32, y: f32, width: f32, height: f32) {
        if image.width() == 0 || image.height() == 0 || width == 0.0 || height == 0.0 {
            return;
        }
        let transform = self.state.transform;
        let sf = transform.scale_factor();

        // Downscale large sources first; bilinear alone aliases past 2x
        let target_w = (width.abs() * sf).round().max(1.0) as u32;
        let target_h = (height.abs() * sf).round().max(1.0) as u32;
        let resized;
        let src = if image.width() > target_w * 2 || image.height() > target_h * 2 {
            resized = image::imageops::resize(image, target_w, target_h, FilterType::Triangle);
            &resized
        } else {
            image
        };

        let m = transform.translate(x, y).scale(
            width / src.width() as f32,
            height / src.height() as f32,
        );
        let Some(inv) = m.invert() else {
            return;
        };
        let Some((bx, by, bw, bh)) = self.device_bounds(&m, src.width() as f32, src.height() as f32)
        else {
            return;
        };

        let (sw, sh) = (src.width() as f32, src.height() as f32);
        let mut patch = vec![[0.0f32; 4]; bw * bh];
        patch
            .par_chunks_mut(bw)
            .enumerate()
            .for_each(|(row, out)| {
                for (lx, px) in out.iter_mut().enumerate() {
                    let p = Point::new(bx as f32 + lx as f32 + 0.5, by as f32 + row as f32 + 0.5);
                    let q = inv.apply(p);
                    if q.x < 0.0 || q.y < 0.0 || q.x >= sw || q.y >= sh {
                        continue;
                    }
                    *px = sample_image(src, q.x - 0.5, q.y - 0.5);
                }
            });

        if let Some(shadow) = self.state.shadow.filter(Shadow::is_visible) {
            let mut mask = Coverage::new(bx, by, bw, bh);
            for (v, px) in mask.data.iter_mut().zip(&patch) {
                *v = px[3];
            }
            let shadow_cov = self.shadow_mask(&mask, &shadow);
            self.composite(&shadow_cov, shadow.color);
        }
        self.composite_patch(bx, by, bw, &patch);
    }
}
