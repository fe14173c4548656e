use std::f32::consts::PI;

use crate::geom::Vec2;

use super::path::{FlatPath, Path};

/// Shape drawn where two stroked segments meet.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum LineJoin {
    /// Extend the outer edges until they meet, up to the miter limit.
    #[default]
    Miter,
    Bevel,
    Round,
}

/// Shape drawn at both ends of an open sub-path.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    /// Extends the end by half the width.
    Square,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StrokeOptions {
    pub width: f32,
    pub line_join: LineJoin,
    pub line_cap: LineCap,
    /// Longest miter allowed, as a ratio of the miter length to half the
    /// width. Longer miters fall back to bevels.
    pub miter_limit: f32,
}

impl Default for StrokeOptions {
    fn default() -> Self {
        Self {
            width: 1.0,
            line_join: LineJoin::Miter,
            line_cap: LineCap::Butt,
            miter_limit: 10.0,
        }
    }
}

/// One stroked segment: `a` to `b` with unit direction `dir` and left
/// normal `normal` (`dir` rotated by -90° on screen).
#[derive(Debug, Copy, Clone)]
struct Segment {
    a: Vec2,
    b: Vec2,
    dir: Vec2,
    normal: Vec2,
}

impl Segment {
    fn new(a: Vec2, b: Vec2) -> Option<Self> {
        let dir = (b - a).norm();
        if dir == Vec2::zero() {
            return None;
        }
        Some(Self {
            a,
            b,
            dir,
            normal: Vec2::new(dir.y, -dir.x),
        })
    }
}

impl Path {
    /// Adds the outline of `src` stroked with `options`.
    ///
    /// Every piece winds the same way, so the result is meant for the
    /// non-zero rule. Under even-odd, overlapping pieces cancel out.
    pub fn add_stroke(&mut self, src: &mut Path, options: &StrokeOptions) {
        if options.width.is_nan() || options.width <= 0.0 {
            return;
        }
        let flats = src.ensure_flat_paths().to_vec();
        for flat in &flats {
            self.stroke_flat_path(flat, options);
        }
    }

    /// Appends fan triangles for the stroke of this path. Draw them with a
    /// driver-level non-zero fill rule.
    pub fn append_vertices_and_indices_for_stroke(
        &mut self,
        vertices: &mut Vec<f32>,
        indices: &mut Vec<u32>,
        options: &StrokeOptions,
    ) {
        let mut stroke = Path::new();
        stroke.add_stroke(self, options);
        stroke.append_vertices_and_indices_for_filling(vertices, indices);
    }

    fn stroke_flat_path(&mut self, flat: &FlatPath, options: &StrokeOptions) {
        let mut points = flat.points().to_vec();
        if flat.is_closed() && points.len() > 2 {
            points.push(points[0]);
        }
        let segments: Vec<Segment> =
            points.windows(2).filter_map(|w| Segment::new(w[0], w[1])).collect();
        let Some((first, last)) = segments.first().zip(segments.last()) else {
            return;
        };
        let hw = options.width / 2.0;

        for (i, seg) in segments.iter().enumerate() {
            let n = seg.normal * hw;
            self.add_polygon(&[seg.a + n, seg.b + n, seg.b - n, seg.a - n]);

            let next = match segments.get(i + 1) {
                Some(next) => next,
                None if flat.is_closed() => first,
                None => continue,
            };
            self.add_join(seg, next, hw, options);
        }

        if flat.is_closed() {
            return;
        }
        match options.line_cap {
            LineCap::Butt => {}
            LineCap::Round => {
                self.add_pie(first.a, hw, angle(first.normal), -PI);
                self.add_pie(last.b, hw, angle(last.normal), PI);
            }
            LineCap::Square => {
                let (n, d) = (first.normal * hw, first.dir * hw);
                self.add_polygon(&[first.a + n, first.a + n - d, first.a - n - d, first.a - n]);
                let (n, d) = (last.normal * hw, last.dir * hw);
                self.add_polygon(&[last.b + n, last.b + n + d, last.b - n + d, last.b - n]);
            }
        }
    }

    /// Fills the gap on the outer side of the turn from `seg` into `next`.
    fn add_join(&mut self, seg: &Segment, next: &Segment, hw: f32, options: &StrokeOptions) {
        let c = seg.b;
        let cross = seg.dir.cross(next.dir);
        let dot = seg.dir.dot(next.dir);
        if cross.abs() < 1e-6 && dot > 0.0 {
            return;
        }
        // Turning right on screen puts the outer side on the left normal.
        let side = if cross > 0.0 { 1.0 } else { -1.0 };
        let u0 = seg.normal * side;
        let u1 = next.normal * side;
        let (o0, o1) = (c + u0 * hw, c + u1 * hw);

        match options.line_join {
            LineJoin::Bevel => self.add_polygon(&[c, o0, o1]),
            LineJoin::Miter => {
                // Miter length over half width is 1 / cos(turn / 2).
                let cos_half = ((1.0 + dot) / 2.0).max(0.0).sqrt();
                if cos_half * options.miter_limit < 1.0 {
                    self.add_polygon(&[c, o0, o1]);
                } else {
                    let tip = c + (u0 + u1) * (hw / (1.0 + dot));
                    self.add_polygon(&[c, o0, tip, o1]);
                }
            }
            LineJoin::Round => {
                let sweep = u0.cross(u1).atan2(u0.dot(u1));
                self.add_pie(c, hw, angle(u0), sweep);
            }
        }
    }

    /// Adds a closed polygon wound like the stroke rectangles.
    fn add_polygon(&mut self, points: &[Vec2]) {
        let area: f32 = points
            .iter()
            .zip(points.iter().cycle().skip(1))
            .map(|(p, q)| p.cross(*q))
            .sum();
        if area == 0.0 {
            return;
        }
        let mut ordered = points.to_vec();
        if area < 0.0 {
            ordered.reverse();
        }
        self.move_to(ordered[0].x, ordered[0].y);
        for p in &ordered[1..] {
            self.line_to(p.x, p.y);
        }
        self.close();
    }

    /// Adds a circular sector around `c`, wound like the stroke rectangles
    /// whatever the sign of `sweep`.
    fn add_pie(&mut self, c: Vec2, radius: f32, start: f32, sweep: f32) {
        let (start, sweep) = if sweep < 0.0 { (start + sweep, -sweep) } else { (start, sweep) };
        self.move_to(c.x, c.y);
        self.arc(c.x, c.y, radius, start, start + sweep, super::Direction::Clockwise);
        self.close();
    }
}

fn angle(v: Vec2) -> f32 {
    v.y.atan2(v.x)
}
