//! Coverage rasterization: turns device-space geometry into per-pixel
//! coverage masks that the surface composites with a paint color.
//!
//! - Fills use nonzero winding with 4x4 supersampling per pixel.
//! - Strokes use distance-to-segment with a one pixel anti-aliased edge.
//! - Shadows blur a mask with three box passes (≈ gaussian).
//!
//! Rows are independent, so each pass runs row-parallel with rayon.

use rayon::prelude::*;

use super::geometry::{Point, aa_edge, dist_to_segment};

const SUBSAMPLES: usize = 4;

/// A rectangular coverage mask positioned in device space.
///
/// `data` holds `width * height` values in 0..1, row-major, where
/// `(x0, y0)` is the device position of the first value.
#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    pub x0: i32,
    pub y0: i32,
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl Coverage {
    pub fn new(x0: i32, y0: i32, width: usize, height: usize) -> Self {
        Self {
            x0,
            y0,
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn empty() -> Self {
        Self::new(0, 0, 0, 0)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Coverage at a device pixel (0 outside the mask).
    pub fn at(&self, x: i32, y: i32) -> f32 {
        let lx = x - self.x0;
        let ly = y - self.y0;
        if lx < 0 || ly < 0 || lx >= self.width as i32 || ly >= self.height as i32 {
            return 0.0;
        }
        self.data[ly as usize * self.width + lx as usize]
    }

    /// Same mask shifted by whole device pixels.
    pub fn offset(mut self, dx: i32, dy: i32) -> Self {
        self.x0 = self.x0.saturating_add(dx);
        self.y0 = self.y0.saturating_add(dy);
        self
    }

    /// Sum of all coverage values (ink amount).
    pub fn total(&self) -> f32 {
        self.data.iter().sum()
    }
}

/// Pixel-aligned bounding box clipped to the surface, or `None` if empty.
fn clipped_bounds(
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
    clip_w: u32,
    clip_h: u32,
) -> Option<(i32, i32, usize, usize)> {
    if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
        return None;
    }
    let x0 = (min_x.floor() as i64).max(0);
    let y0 = (min_y.floor() as i64).max(0);
    let x1 = (max_x.ceil() as i64).min(clip_w as i64);
    let y1 = (max_y.ceil() as i64).min(clip_h as i64);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0 as i32, y0 as i32, (x1 - x0) as usize, (y1 - y0) as usize))
}

/// Non-horizontal polygon edge with its winding direction.
struct Edge {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    dir: i32,
}

/// Fill closed polygons (device space) with the nonzero winding rule.
pub fn fill_polygons(polygons: &[Vec<Point>], clip_w: u32, clip_h: u32) -> Coverage {
    let mut edges = Vec::new();
    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);

    for poly in polygons {
        if poly.len() < 3 {
            continue;
        }
        for (i, a) in poly.iter().enumerate() {
            let b = poly[(i + 1) % poly.len()];
            min_x = min_x.min(a.x);
            min_y = min_y.min(a.y);
            max_x = max_x.max(a.x);
            max_y = max_y.max(a.y);
            if a.y == b.y {
                continue;
            }
            let (top, bottom, dir) = if a.y < b.y { (*a, b, 1) } else { (b, *a, -1) };
            edges.push(Edge {
                x0: top.x,
                y0: top.y,
                x1: bottom.x,
                y1: bottom.y,
                dir,
            });
        }
    }

    let Some((bx, by, bw, bh)) = clipped_bounds(min_x, min_y, max_x, max_y, clip_w, clip_h)
    else {
        return Coverage::empty();
    };

    let mut cov = Coverage::new(bx, by, bw, bh);
    let weight = 1.0 / (SUBSAMPLES * SUBSAMPLES) as f32;

    cov.data
        .par_chunks_mut(bw)
        .enumerate()
        .for_each(|(row, out)| {
            let py = by as f32 + row as f32;
            let mut crossings: Vec<(f32, i32)> = Vec::new();
            for s in 0..SUBSAMPLES {
                let sy = py + (s as f32 + 0.5) / SUBSAMPLES as f32;
                crossings.clear();
                for e in &edges {
                    if sy >= e.y0 && sy < e.y1 {
                        let t = (sy - e.y0) / (e.y1 - e.y0);
                        crossings.push((e.x0 + (e.x1 - e.x0) * t, e.dir));
                    }
                }
                crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut winding = 0;
                for pair in crossings.windows(2) {
                    winding += pair[0].1;
                    if winding == 0 {
                        continue;
                    }
                    let (xa, xb) = (pair[0].0, pair[1].0);
                    let start = ((xa.floor() as i32) - bx).max(0);
                    let end = ((xb.ceil() as i32) - bx).min(bw as i32);
                    for lx in start..end {
                        let px = (bx + lx) as f32;
                        let hits = (0..SUBSAMPLES)
                            .filter(|k| {
                                let sx = px + (*k as f32 + 0.5) / SUBSAMPLES as f32;
                                sx >= xa && sx < xb
                            })
                            .count();
                        out[lx as usize] += hits as f32 * weight;
                    }
                }
            }
            for v in out.iter_mut() {
                *v = v.min(1.0);
            }
        });

    cov
}

/// Stroke device-space segments with the given half line width.
///
/// Overlapping segments take the maximum coverage, so joins do not darken.
/// Lines thinner than one pixel are drawn one pixel wide at reduced
/// intensity.
pub fn stroke_segments(
    segments: &[(Point, Point)],
    half_width: f32,
    clip_w: u32,
    clip_h: u32,
) -> Coverage {
    if segments.is_empty() || half_width <= 0.0 || !half_width.is_finite() {
        return Coverage::empty();
    }

    let intensity = (half_width * 2.0).min(1.0);
    let hw = half_width.max(0.5);
    let pad = hw + 1.0;

    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for (a, b) in segments {
        min_x = min_x.min(a.x.min(b.x));
        min_y = min_y.min(a.y.min(b.y));
        max_x = max_x.max(a.x.max(b.x));
        max_y = max_y.max(a.y.max(b.y));
    }

    let Some((bx, by, bw, bh)) = clipped_bounds(
        min_x - pad,
        min_y - pad,
        max_x + pad,
        max_y + pad,
        clip_w,
        clip_h,
    ) else {
        return Coverage::empty();
    };

    let mut cov = Coverage::new(bx, by, bw, bh);
    cov.data
        .par_chunks_mut(bw)
        .enumerate()
        .for_each(|(row, out)| {
            let cy = by as f32 + row as f32 + 0.5;
            // Only segments whose padded y-range touches this row
            let near: Vec<&(Point, Point)> = segments
                .iter()
                .filter(|(a, b)| cy >= a.y.min(b.y) - pad && cy <= a.y.max(b.y) + pad)
                .collect();
            if near.is_empty() {
                return;
            }
            for (lx, v) in out.iter_mut().enumerate() {
                let p = Point::new(bx as f32 + lx as f32 + 0.5, cy);
                let d = near
                    .iter()
                    .map(|(a, b)| dist_to_segment(p, *a, *b))
                    .fold(f32::INFINITY, f32::min);
                *v = aa_edge(d, hw - 0.5, 1.0) * intensity;
            }
        });

    cov
}

/// Box blur with `radius` pixels, three passes per axis.
///
/// The result is grown by the blur extent so soft edges are not clipped.
/// The radius is capped at the larger surface side, and source outside the
/// surface grown by the blur extent is dropped since it cannot reach it.
pub fn blur(cov: &Coverage, radius: f32, clip_w: u32, clip_h: u32) -> Coverage {
    let limit = clip_w.max(clip_h) as f32;
    let r = if radius.is_finite() {
        radius.round().clamp(0.0, limit) as usize
    } else {
        0
    };
    if r == 0 || cov.is_empty() {
        return cov.clone();
    }

    let margin = 3 * r as i64;
    let x0 = (cov.x0 as i64 - margin).max(-margin);
    let y0 = (cov.y0 as i64 - margin).max(-margin);
    let x1 = (cov.x0 as i64 + cov.width as i64 + margin).min(clip_w as i64 + margin);
    let y1 = (cov.y0 as i64 + cov.height as i64 + margin).min(clip_h as i64 + margin);
    if x1 <= x0 || y1 <= y0 {
        return Coverage::empty();
    }

    let width = (x1 - x0) as usize;
    let height = (y1 - y0) as usize;
    let mut buf = vec![0.0f32; width * height];
    for y in 0..cov.height {
        let dy = cov.y0 as i64 + y as i64 - y0;
        if dy < 0 || dy >= height as i64 {
            continue;
        }
        let src = &cov.data[y * cov.width..(y + 1) * cov.width];
        let dst = &mut buf[dy as usize * width..(dy as usize + 1) * width];
        for (x, &v) in src.iter().enumerate() {
            let dx = cov.x0 as i64 + x as i64 - x0;
            if dx >= 0 && dx < width as i64 {
                dst[dx as usize] = v;
            }
        }
    }

    for _ in 0..3 {
        buf = box_pass_horizontal(&buf, width, r);
        buf = box_pass_vertical(&buf, width, height, r);
    }

    Coverage {
        x0: x0 as i32,
        y0: y0 as i32,
        width,
        height,
        data: buf,
    }
}

fn box_pass_horizontal(src: &[f32], width: usize, r: usize) -> Vec<f32> {
    let norm = 1.0 / (2 * r + 1) as f32;
    let mut out = vec![0.0f32; src.len()];
    out.par_chunks_mut(width)
        .zip(src.par_chunks(width))
        .for_each(|(dst, row)| {
            let mut acc: f32 = row.iter().take(r + 1).sum();
            for x in 0..width {
                dst[x] = acc * norm;
                if x + r + 1 < width {
                    acc += row[x + r + 1];
                }
                if x >= r {
                    acc -= row[x - r];
                }
            }
        });
    out
}

/// Vertical pass as a horizontal pass over the transposed buffer, so each
/// column is a running sum too.
fn box_pass_vertical(src: &[f32], width: usize, height: usize, r: usize) -> Vec<f32> {
    let columns = box_pass_horizontal(&transpose(src, width, height), height, r);
    transpose(&columns, height, width)
}

fn transpose(src: &[f32], width: usize, height: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; src.len()];
    out.par_chunks_mut(height).enumerate().for_each(|(x, col)| {
        for (y, v) in col.iter_mut().enumerate() {
            *v = src[y * width + x];
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f32, y: f32, s: f32) -> Vec<Point> {
        vec![
            Point::new(x, y),
            Point::new(x + s, y),
            Point::new(x + s, y + s),
            Point::new(x, y + s),
        ]
    }

    #[test]
    fn test_fill_pixel_aligned_square() {
        let cov = fill_polygons(&[square(2.0, 3.0, 4.0)], 20, 20);
        assert_eq!((cov.x0, cov.y0, cov.width, cov.height), (2, 3, 4, 4));
        assert!(cov.data.iter().all(|&v| (v - 1.0).abs() < 1e-6));
        assert!((cov.total() - 16.0).abs() < 1e-4);
    }

    #[test]
    fn test_fill_half_pixel_edge_is_antialiased() {
        let cov = fill_polygons(&[square(0.5, 0.0, 2.0)], 10, 10);
        // Column 0 is half covered, column 1 fully, column 2 half
        assert!((cov.at(0, 0) - 0.5).abs() < 1e-6);
        assert!((cov.at(1, 0) - 1.0).abs() < 1e-6);
        assert!((cov.at(2, 0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_fill_is_clipped_to_surface() {
        let cov = fill_polygons(&[square(-5.0, -5.0, 10.0)], 3, 3);
        assert_eq!((cov.x0, cov.y0, cov.width, cov.height), (0, 0, 3, 3));
    }

    #[test]
    fn test_fill_outside_surface_is_empty() {
        let cov = fill_polygons(&[square(50.0, 50.0, 5.0)], 10, 10);
        assert!(cov.is_empty());
    }

    #[test]
    fn test_nonzero_winding_keeps_overlap_filled() {
        // Two overlapping squares with the same orientation: overlap stays 1.0
        let cov = fill_polygons(&[square(0.0, 0.0, 4.0), square(2.0, 2.0, 4.0)], 10, 10);
        assert!((cov.at(3, 3) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_stroke_horizontal_one_pixel_line() {
        // A line along y = 5.5 covers row 5 fully
        let cov = stroke_segments(
            &[(Point::new(1.0, 5.5), Point::new(9.0, 5.5))],
            0.5,
            20,
            20,
        );
        assert!((cov.at(4, 5) - 1.0).abs() < 1e-6);
        assert_eq!(cov.at(4, 7), 0.0);
    }

    #[test]
    fn test_stroke_on_pixel_boundary_splits_between_rows() {
        let cov = stroke_segments(
            &[(Point::new(0.0, 5.0), Point::new(10.0, 5.0))],
            0.5,
            20,
            20,
        );
        assert!((cov.at(4, 4) - 0.5).abs() < 1e-6);
        assert!((cov.at(4, 5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_zero_width_stroke_is_empty() {
        let cov = stroke_segments(&[(Point::new(0.0, 0.0), Point::new(5.0, 5.0))], 0.0, 10, 10);
        assert!(cov.is_empty());
    }

    #[test]
    fn test_blur_spreads_and_preserves_ink() {
        let cov = fill_polygons(&[square(10.0, 10.0, 4.0)], 40, 40);
        let blurred = blur(&cov, 2.0, 40, 40);
        assert!(blurred.width > cov.width);
        // Energy is preserved by normalized box passes (margin is large enough)
        assert!((blurred.total() - cov.total()).abs() < 1e-2);
        // Ink now reaches outside the original square
        assert!(blurred.at(9, 12) > 0.0);
    }

    #[test]
    fn test_blur_is_symmetric_and_keeps_ink() {
        // One lit pixel spreads into a symmetric bump peaking at the source
        let mut cov = Coverage::new(10, 10, 1, 1);
        cov.data[0] = 1.0;
        let blurred = blur(&cov, 1.0, 30, 30);
        assert!((blurred.at(11, 10) - blurred.at(9, 10)).abs() < 1e-6);
        assert!((blurred.at(10, 11) - blurred.at(10, 9)).abs() < 1e-6);
        assert!(blurred.at(10, 10) > blurred.at(11, 10));
        assert!((blurred.total() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_huge_blur_radius_stays_bounded() {
        let cov = fill_polygons(&[square(5.0, 5.0, 10.0)], 30, 40);
        let blurred = blur(&cov, 1.0e9, 30, 40);
        // Radius capped at 40, buffer cropped to the surface plus 3 * 40
        assert!(blurred.width <= 30 + 2 * 120);
        assert!(blurred.height <= 40 + 2 * 120);
        assert!(blurred.at(10, 10) > 0.0);
    }

    #[test]
    fn test_blur_of_mask_far_off_surface_is_empty() {
        let cov = fill_polygons(&[square(0.0, 0.0, 4.0)], 10, 10).offset(100_000, 0);
        assert!(blur(&cov, 3.0, 10, 10).is_empty());
    }
}
