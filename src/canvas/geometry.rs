//! Points, affine transforms, paths and the distance helpers used by the
//! rasterizer.

use serde::Serialize;
use std::f32::consts::PI;

/// A point in user or device space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// 2D affine transform in canvas order: `x' = a*x + c*y + e`,
/// `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// Post-multiply by a translation (the translation applies first).
    pub fn translate(self, dx: f32, dy: f32) -> Self {
        Self {
            e: self.a * dx + self.c * dy + self.e,
            f: self.b * dx + self.d * dy + self.f,
            ..self
        }
    }

    /// Post-multiply by a rotation of `radians` (clockwise on screen).
    pub fn rotate(self, radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self {
            a: self.a * cos + self.c * sin,
            b: self.b * cos + self.d * sin,
            c: self.c * cos - self.a * sin,
            d: self.d * cos - self.b * sin,
            ..self
        }
    }

    /// Post-multiply by a non-uniform scale.
    pub fn scale(self, sx: f32, sy: f32) -> Self {
        Self {
            a: self.a * sx,
            b: self.b * sx,
            c: self.c * sy,
            d: self.d * sy,
            ..self
        }
    }

    /// True when the transform keeps axes aligned (no rotation or skew).
    pub fn is_axis_aligned(&self) -> bool {
        self.b == 0.0 && self.c == 0.0
    }

    pub fn apply(&self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.c * p.y + self.e,
            y: self.b * p.x + self.d * p.y + self.f,
        }
    }

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    /// Inverse transform, or `None` for a degenerate matrix.
    pub fn invert(&self) -> Option<Affine> {
        let det = self.determinant();
        if det.abs() < 1e-12 || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        Some(Affine {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            e: (self.c * self.f - self.d * self.e) * inv,
            f: (self.b * self.e - self.a * self.f) * inv,
        })
    }

    /// Average linear scale, used to convert line widths to device pixels.
    pub fn scale_factor(&self) -> f32 {
        self.determinant().abs().sqrt()
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

/// Convert degrees to radians.
#[inline]
pub fn deg_to_rad(degrees: f32) -> f32 {
    degrees * PI / 180.0
}

// ============================================================================
// PATHS
// ============================================================================

/// A connected run of points; closed subpaths join the last point to the
/// first when stroked.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Subpath {
    pub points: Vec<Point>,
    pub closed: bool,
}

/// A flattened path made of straight segments. Arcs are approximated when
/// they are added.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Path {
    pub subpaths: Vec<Subpath>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closed rectangle path.
    pub fn rect(x: f32, y: f32, w: f32, h: f32) -> Self {
        let mut path = Path::new();
        path.move_to(x, y);
        path.line_to(x + w, y);
        path.line_to(x + w, y + h);
        path.line_to(x, y + h);
        path.close();
        path
    }

    /// Single straight segment.
    pub fn line(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        let mut path = Path::new();
        path.move_to(x0, y0);
        path.line_to(x1, y1);
        path
    }

    /// Full circle.
    pub fn circle(cx: f32, cy: f32, radius: f32) -> Self {
        let mut path = Path::new();
        path.arc(cx, cy, radius, 0.0, 2.0 * PI);
        path.close();
        path
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.subpaths.push(Subpath {
            points: vec![Point::new(x, y)],
            closed: false,
        });
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        match self.subpaths.last_mut() {
            Some(sp) if !sp.closed => sp.points.push(Point::new(x, y)),
            _ => self.move_to(x, y),
        }
    }

    /// Close the current subpath.
    pub fn close(&mut self) {
        if let Some(sp) = self.subpaths.last_mut() {
            sp.closed = true;
        }
    }

    /// Clockwise arc from `start` to `end` radians around `(cx, cy)`.
    ///
    /// Like a canvas arc, the first arc point is connected to the current
    /// point with a straight segment.
    pub fn arc(&mut self, cx: f32, cy: f32, radius: f32, start: f32, end: f32) {
        let sweep = end - start;
        // Keep chord error under ~0.25px
        let steps = ((sweep.abs() * radius.abs() / 2.0).ceil() as usize).clamp(8, 256);
        for i in 0..=steps {
            let t = start + sweep * i as f32 / steps as f32;
            let (sin, cos) = t.sin_cos();
            self.line_to(cx + radius * cos, cy + radius * sin);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subpaths.iter().all(|sp| sp.points.len() < 2)
    }

    /// Copy of this path with every point mapped through `transform`.
    pub fn transformed(&self, transform: &Affine) -> Path {
        Path {
            subpaths: self
                .subpaths
                .iter()
                .map(|sp| Subpath {
                    points: sp.points.iter().map(|p| transform.apply(*p)).collect(),
                    closed: sp.closed,
                })
                .collect(),
        }
    }

    /// All stroke segments of the path, including closing segments.
    pub fn segments(&self) -> Vec<(Point, Point)> {
        let mut segs = Vec::new();
        for sp in &self.subpaths {
            for pair in sp.points.windows(2) {
                segs.push((pair[0], pair[1]));
            }
            if sp.closed && sp.points.len() > 2 {
                if let (Some(first), Some(last)) = (sp.points.first(), sp.points.last()) {
                    segs.push((*last, *first));
                }
            }
        }
        segs
    }

    /// Stroke segments after applying a dash pattern (lengths in path units).
    ///
    /// The pattern restarts at each subpath. An empty or all-zero pattern
    /// yields the solid segments.
    pub fn dashed_segments(&self, pattern: &[f32]) -> Vec<(Point, Point)> {
        let total: f32 = pattern.iter().sum();
        if pattern.is_empty() || total <= 0.0 {
            return self.segments();
        }

        let mut out = Vec::new();
        for sp in &self.subpaths {
            let single = Path {
                subpaths: vec![sp.clone()],
            };
            let mut dash_idx = 0usize;
            let mut remaining = pattern[0];
            let mut on = true;

            for (a, b) in single.segments() {
                let len = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
                if len <= 0.0 {
                    continue;
                }
                let mut pos = 0.0f32;
                while pos < len {
                    let step = remaining.min(len - pos);
                    if on && step > 0.0 {
                        let t0 = pos / len;
                        let t1 = (pos + step) / len;
                        out.push((lerp_point(a, b, t0), lerp_point(a, b, t1)));
                    }
                    pos += step;
                    remaining -= step;
                    if remaining <= 1e-6 {
                        dash_idx = (dash_idx + 1) % pattern.len();
                        remaining = pattern[dash_idx];
                        on = !on;
                    }
                }
            }
        }
        out
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` of all points.
    pub fn bounds(&self) -> Option<(f32, f32, f32, f32)> {
        let mut iter = self.subpaths.iter().flat_map(|sp| sp.points.iter());
        let first = iter.next()?;
        let init = (first.x, first.y, first.x, first.y);
        Some(iter.fold(init, |(x0, y0, x1, y1), p| {
            (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y))
        }))
    }
}

#[inline]
fn lerp_point(a: Point, b: Point, t: f32) -> Point {
    Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

// ============================================================================
// DISTANCE
// ============================================================================

/// Distance from `p` to the segment `a`-`b`.
#[inline]
pub fn dist_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    let t = if len_sq > 0.0 {
        (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let dx = p.x - (a.x + abx * t);
    let dy = p.y - (a.y + aby * t);
    (dx * dx + dy * dy).sqrt()
}

/// Anti-aliased edge function.
///
/// - 1.0 if `dist < half_thickness`
/// - linear falloff from 1 to 0 over `aa_width`
/// - 0.0 beyond `half_thickness + aa_width`
#[inline]
pub fn aa_edge(dist: f32, half_thickness: f32, aa_width: f32) -> f32 {
    if dist < half_thickness {
        1.0
    } else if dist < half_thickness + aa_width {
        1.0 - (dist - half_thickness) / aa_width
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-4 && (a.y - b.y).abs() < 1e-4
    }

    #[test]
    fn test_translate_then_apply() {
        let t = Affine::IDENTITY.translate(5.0, -2.0);
        assert!(close(t.apply(Point::new(1.0, 1.0)), Point::new(6.0, -1.0)));
    }

    #[test]
    fn test_rotate_about_center() {
        // Rotate 90° about (10, 10): (20, 10) -> (10, 20)
        let t = Affine::IDENTITY
            .translate(10.0, 10.0)
            .rotate(deg_to_rad(90.0))
            .translate(-10.0, -10.0);
        assert!(close(t.apply(Point::new(20.0, 10.0)), Point::new(10.0, 20.0)));
        assert!(close(t.apply(Point::new(10.0, 10.0)), Point::new(10.0, 10.0)));
    }

    #[test]
    fn test_scale_after_translate() {
        let t = Affine::IDENTITY.translate(10.0, 20.0).scale(2.0, 0.5);
        assert!(close(t.apply(Point::new(3.0, 4.0)), Point::new(16.0, 22.0)));
        assert!(t.is_axis_aligned());
        assert!(!t.rotate(0.3).is_axis_aligned());
    }

    #[test]
    fn test_invert_round_trip() {
        let t = Affine::IDENTITY
            .translate(3.0, 4.0)
            .rotate(0.7)
            .translate(-1.0, 2.0);
        let inv = t.invert().unwrap();
        let p = Point::new(12.5, -3.25);
        assert!(close(inv.apply(t.apply(p)), p));
        assert!((t.scale_factor() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_rect_segments() {
        let path = Path::rect(0.0, 0.0, 10.0, 5.0);
        let segs = path.segments();
        assert_eq!(segs.len(), 4);
        assert_eq!(path.bounds(), Some((0.0, 0.0, 10.0, 5.0)));
    }

    #[test]
    fn test_circle_is_closed_and_round() {
        let path = Path::circle(50.0, 50.0, 20.0);
        assert!(path.subpaths[0].closed);
        for p in &path.subpaths[0].points {
            let r = ((p.x - 50.0).powi(2) + (p.y - 50.0).powi(2)).sqrt();
            assert!((r - 20.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_dash_pattern_five_five() {
        // 40px line with [5, 5] -> dashes at 0-5, 10-15, 20-25, 30-35
        let path = Path::line(0.0, 0.0, 40.0, 0.0);
        let segs = path.dashed_segments(&[5.0, 5.0]);
        assert_eq!(segs.len(), 4);
        assert!(close(segs[1].0, Point::new(10.0, 0.0)));
        assert!(close(segs[1].1, Point::new(15.0, 0.0)));
    }

    #[test]
    fn test_dash_carries_across_corners() {
        // 8px then turn: the first dash spans the corner (5px), gap 5px, ...
        let mut path = Path::new();
        path.move_to(0.0, 0.0);
        path.line_to(3.0, 0.0);
        path.line_to(3.0, 10.0);
        let segs = path.dashed_segments(&[5.0, 5.0]);
        // Dash 1: (0,0)-(3,0) and (3,0)-(3,2); gap to (3,7); dash (3,7)-(3,10)
        assert_eq!(segs.len(), 3);
        assert!(close(segs[1].1, Point::new(3.0, 2.0)));
        assert!(close(segs[2].0, Point::new(3.0, 7.0)));
    }

    #[test]
    fn test_empty_dash_is_solid() {
        let path = Path::rect(0.0, 0.0, 4.0, 4.0);
        assert_eq!(path.dashed_segments(&[]).len(), 4);
        assert_eq!(path.dashed_segments(&[0.0, 0.0]).len(), 4);
    }

    #[test]
    fn test_dist_to_segment() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert_eq!(dist_to_segment(Point::new(5.0, 3.0), a, b), 3.0);
        assert_eq!(dist_to_segment(Point::new(-4.0, 3.0), a, b), 5.0);
    }

    #[test]
    fn test_aa_edge() {
        assert_eq!(aa_edge(0.0, 1.0, 1.0), 1.0);
        assert!((aa_edge(1.5, 1.0, 1.0) - 0.5).abs() < 1e-6);
        assert_eq!(aa_edge(2.5, 1.0, 1.0), 0.0);
    }
}
