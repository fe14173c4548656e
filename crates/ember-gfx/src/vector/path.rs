use std::f32::consts::{FRAC_PI_4, PI, TAU};

use crate::driver::Vertex;
use crate::geom::{IRect, Vec2};

/// Control point closer than this to its chord ends quad subdivision.
const FLATTEN_TOLERANCE: f32 = 0.5;

/// Subdivision depth cap for one quadratic segment.
const MAX_FLATTEN_DEPTH: u32 = 10;

/// Flattened points closer than this to the previous one are dropped.
const MIN_POINT_DISTANCE: f32 = 0.01;

/// Sweep direction of [`Path::arc`] in screen space (y down).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Direction {
    /// Increasing angles.
    #[default]
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) enum Op {
    LineTo(Vec2),
    /// Control point, end point.
    QuadTo(Vec2, Vec2),
}

impl Op {
    pub fn end(self) -> Vec2 {
        match self {
            Op::LineTo(p) | Op::QuadTo(_, p) => p,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SubPath {
    pub start: Vec2,
    pub ops: Vec<Op>,
    pub closed: bool,
}

impl SubPath {
    fn new(start: Vec2) -> Self {
        Self {
            start,
            ops: Vec::new(),
            closed: false,
        }
    }

    /// A sub-path with no segment draws nothing.
    pub fn is_valid(&self) -> bool {
        !self.ops.is_empty()
    }

    fn current(&self) -> Vec2 {
        self.ops.last().map_or(self.start, |op| op.end())
    }
}

/// A sub-path reduced to line segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatPath {
    points: Vec<Vec2>,
    closed: bool,
}

impl FlatPath {
    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn append_point(&mut self, p: Vec2) {
        if let Some(last) = self.points.last() {
            if (last.x - p.x).abs() < MIN_POINT_DISTANCE && (last.y - p.y).abs() < MIN_POINT_DISTANCE {
                return;
            }
        }
        self.points.push(p);
    }

    fn append_quad(&mut self, p0: Vec2, p1: Vec2, p2: Vec2, depth: u32) {
        if depth >= MAX_FLATTEN_DEPTH || is_point_close_to_segment(p1, p0, p2, FLATTEN_TOLERANCE) {
            self.append_point(p2);
            return;
        }
        let p01 = p0.lerp(p1, 0.5);
        let p12 = p1.lerp(p2, 0.5);
        let p012 = p01.lerp(p12, 0.5);
        self.append_quad(p0, p01, p012, depth + 1);
        self.append_quad(p012, p12, p2, depth + 1);
    }
}

/// Whether `p` lies within `allow` of the line through `a` and `b`.
fn is_point_close_to_segment(p: Vec2, a: Vec2, b: Vec2, allow: f32) -> bool {
    // Line a-b as `ux + vy + w = 0`.
    let u = b.y - a.y;
    let v = -(b.x - a.x);
    let w = (b.x - a.x) * a.y - (b.y - a.y) * a.x;
    let d = u * p.x + v * p.y + w;
    allow * allow * (u * u + v * v) > d * d
}

/// A vector path made of line and quadratic segments.
///
/// Cubics and arcs are converted to quadratics as they are added.
/// Coordinates are destination pixels.
#[derive(Debug, Clone, Default)]
pub struct Path {
    sub_paths: Vec<SubPath>,
    /// Flattening cache; cleared by every mutation.
    flat: Option<Vec<FlatPath>>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        !self.sub_paths.iter().any(SubPath::is_valid)
    }

    pub(crate) fn sub_paths(&self) -> &[SubPath] {
        &self.sub_paths
    }

    /// End of the last segment, or the start of the last closed sub-path.
    pub fn current_point(&self) -> Option<Vec2> {
        self.sub_paths.last().map(|s| if s.closed { s.start } else { s.current() })
    }

    /// Sub-path that a segment ending at `end` extends. An empty path only
    /// moves to `end` and yields nothing; after a close, a new sub-path
    /// starts where the closed one did.
    fn open_sub_path(&mut self, end: Vec2) -> Option<&mut SubPath> {
        self.flat = None;
        let restart = match self.sub_paths.last() {
            None => {
                self.sub_paths.push(SubPath::new(end));
                return None;
            }
            Some(s) => s.closed.then_some(s.start),
        };
        if let Some(start) = restart {
            self.sub_paths.push(SubPath::new(start));
        }
        self.sub_paths.last_mut()
    }

    /// Starts a new sub-path at `(x, y)`.
    pub fn move_to(&mut self, x: f32, y: f32) {
        self.flat = None;
        self.sub_paths.push(SubPath::new(Vec2::new(x, y)));
    }

    /// Adds a line to `(x, y)`. On an empty path this only moves.
    pub fn line_to(&mut self, x: f32, y: f32) {
        let p = Vec2::new(x, y);
        if let Some(sub) = self.open_sub_path(p) {
            sub.ops.push(Op::LineTo(p));
        }
    }

    /// Adds a quadratic curve through control point `(cx, cy)` to `(x, y)`.
    pub fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        let p = Vec2::new(x, y);
        if let Some(sub) = self.open_sub_path(p) {
            sub.ops.push(Op::QuadTo(Vec2::new(cx, cy), p));
        }
    }

    /// Adds a cubic curve, approximated by two quadratics split at `t = 0.5`.
    pub fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        let Some(p0) = self.current_point() else {
            self.move_to(x, y);
            return;
        };
        let c1 = Vec2::new(c1x, c1y);
        let c2 = Vec2::new(c2x, c2y);
        let p3 = Vec2::new(x, y);

        let p01 = p0.lerp(c1, 0.5);
        let p12 = c1.lerp(c2, 0.5);
        let p23 = c2.lerp(p3, 0.5);
        let p012 = p01.lerp(p12, 0.5);
        let p123 = p12.lerp(p23, 0.5);
        let mid = p012.lerp(p123, 0.5);

        if let Some(sub) = self.open_sub_path(p3) {
            for (a, b, c, d) in [(p0, p01, p012, mid), (mid, p123, p23, p3)] {
                let ctrl = ((b + c) * 3.0 - a - d) / 4.0;
                sub.ops.push(Op::QuadTo(ctrl, d));
            }
        }
    }

    /// Adds a circular arc around `(cx, cy)` from angle `start` to `end`.
    ///
    /// Connects from the current point with a line, like a canvas arc. A
    /// sweep of at least a full turn draws a full circle.
    pub fn arc(&mut self, cx: f32, cy: f32, radius: f32, start: f32, end: f32, dir: Direction) {
        let sweep = match dir {
            Direction::Clockwise if end - start >= TAU => TAU,
            Direction::Clockwise => (end - start).rem_euclid(TAU),
            Direction::CounterClockwise if start - end >= TAU => -TAU,
            Direction::CounterClockwise => -(start - end).rem_euclid(TAU),
        };
        let center = Vec2::new(cx, cy);
        let from = center + Vec2::new(start.cos(), start.sin()) * radius;
        if self.current_point().is_some() {
            self.line_to(from.x, from.y);
        } else {
            self.move_to(from.x, from.y);
        }
        self.arc_segments(center, radius, start, sweep);
    }

    /// Adds a canvas-style `arcTo`: a line toward `(x1, y1)` rounded into
    /// the direction of `(x2, y2)` with `radius`.
    pub fn arc_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, radius: f32) {
        let p1 = Vec2::new(x1, y1);
        let p2 = Vec2::new(x2, y2);
        let Some(p0) = self.current_point() else {
            self.move_to(x1, y1);
            return;
        };

        let v1 = (p0 - p1).norm();
        let v2 = (p2 - p1).norm();
        let cross = v1.cross(v2);
        if radius <= 0.0 || p0 == p1 || p1 == p2 || cross.abs() < 1e-6 {
            self.line_to(x1, y1);
            return;
        }

        let half = v1.dot(v2).clamp(-1.0, 1.0).acos() / 2.0;
        let tangent = radius / half.tan();
        let t1 = p1 + v1 * tangent;
        let t2 = p1 + v2 * tangent;
        let center = p1 + (v1 + v2).norm() * (radius / half.sin());

        let a0 = (t1.y - center.y).atan2(t1.x - center.x);
        let a1 = (t2.y - center.y).atan2(t2.x - center.x);
        let mut sweep = a1 - a0;
        if sweep > PI {
            sweep -= TAU;
        } else if sweep < -PI {
            sweep += TAU;
        }

        self.line_to(t1.x, t1.y);
        self.arc_segments(center, radius, a0, sweep);
    }

    /// Quadratic segments of at most 45° each.
    fn arc_segments(&mut self, center: Vec2, radius: f32, start: f32, sweep: f32) {
        if sweep == 0.0 || radius <= 0.0 {
            return;
        }
        // Rounding can push an exact multiple of 45° just past it.
        let count = (sweep.abs() / FRAC_PI_4 - 1e-4).ceil().max(1.0) as u32;
        let step = sweep / count as f32;
        let ctrl_radius = radius / (step / 2.0).cos();
        let Some(sub) = self.open_sub_path(center) else {
            return;
        };
        for i in 0..count {
            let a0 = start + step * i as f32;
            let mid = a0 + step / 2.0;
            let a1 = a0 + step;
            let ctrl = center + Vec2::new(mid.cos(), mid.sin()) * ctrl_radius;
            let end = center + Vec2::new(a1.cos(), a1.sin()) * radius;
            sub.ops.push(Op::QuadTo(ctrl, end));
        }
    }

    /// Closes the current sub-path. The next segment starts at its start.
    pub fn close(&mut self) {
        if let Some(last) = self.sub_paths.last_mut() {
            self.flat = None;
            last.closed = true;
        }
    }

    pub fn reset(&mut self) {
        self.sub_paths.clear();
        self.flat = None;
    }

    /// Flattened sub-paths, computed once per path state.
    pub fn ensure_flat_paths(&mut self) -> &[FlatPath] {
        let sub_paths = &self.sub_paths;
        self.flat.get_or_insert_with(|| {
            sub_paths
                .iter()
                .filter(|s| s.is_valid())
                .map(|s| {
                    let mut flat = FlatPath::default();
                    flat.append_point(s.start);
                    let mut cur = s.start;
                    for op in &s.ops {
                        match *op {
                            Op::LineTo(p) => flat.append_point(p),
                            Op::QuadTo(c, p) => flat.append_quad(cur, c, p, 0),
                        }
                        cur = op.end();
                    }
                    flat.closed = s.closed;
                    flat
                })
                .collect()
        })
    }

    /// Integer bounds covering every control point. Empty when the path
    /// has no area.
    pub fn bounds(&self) -> IRect {
        let mut min = Vec2::new(f32::INFINITY, f32::INFINITY);
        let mut max = Vec2::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
        let mut include = |p: Vec2| {
            min = Vec2::new(min.x.min(p.x), min.y.min(p.y));
            max = Vec2::new(max.x.max(p.x), max.y.max(p.y));
        };
        for sub in self.sub_paths.iter().filter(|s| s.is_valid()) {
            include(sub.start);
            for op in &sub.ops {
                match *op {
                    Op::LineTo(p) => include(p),
                    Op::QuadTo(c, p) => {
                        include(c);
                        include(p);
                    }
                }
            }
        }
        if !(min.x < max.x && min.y < max.y) {
            return IRect::default();
        }
        IRect::new(
            min.x.floor() as i32,
            min.y.floor() as i32,
            max.x.ceil() as i32,
            max.y.ceil() as i32,
        )
    }

    /// Appends a triangle fan per flattened sub-path.
    ///
    /// Draw the result with a driver-level non-zero or even-odd fill rule.
    /// Vertices are white with source position zero.
    pub fn append_vertices_and_indices_for_filling(
        &mut self,
        vertices: &mut Vec<f32>,
        indices: &mut Vec<u32>,
    ) {
        let mut base = (vertices.len() / crate::driver::VERTEX_FLOAT_COUNT) as u32;
        for flat in self.ensure_flat_paths() {
            let points = flat.points();
            if points.len() < 3 {
                continue;
            }
            for (i, p) in points.iter().enumerate() {
                Vertex::new([p.x, p.y], [0.0, 0.0], [1.0; 4]).push_to(vertices);
                if i >= 2 {
                    let i = i as u32;
                    indices.extend_from_slice(&[base, base + i - 1, base + i]);
                }
            }
            base += points.len() as u32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::VERTEX_FLOAT_COUNT;

    fn square(x0: f32, y0: f32, x1: f32, y1: f32) -> Path {
        let mut p = Path::new();
        p.move_to(x0, y0);
        p.line_to(x1, y0);
        p.line_to(x1, y1);
        p.line_to(x0, y1);
        p.close();
        p
    }

    // ── building ──────────────────────────────────────────────────────────

    #[test]
    fn line_to_on_empty_path_only_moves() {
        let mut p = Path::new();
        p.line_to(3.0, 4.0);
        assert!(p.is_empty());
        assert_eq!(p.current_point(), Some(Vec2::new(3.0, 4.0)));
        p.line_to(5.0, 4.0);
        assert!(!p.is_empty());
        assert_eq!(p.sub_paths().len(), 1);
        assert_eq!(p.sub_paths()[0].ops, vec![Op::LineTo(Vec2::new(5.0, 4.0))]);
    }

    #[test]
    fn curves_on_empty_path_only_move_to_their_end() {
        let mut q = Path::new();
        q.quad_to(1.0, 1.0, 6.0, 2.0);
        assert!(q.is_empty());
        assert_eq!(q.current_point(), Some(Vec2::new(6.0, 2.0)));

        let mut c = Path::new();
        c.cubic_to(1.0, 1.0, 2.0, 2.0, 7.0, 3.0);
        assert!(c.is_empty());
        assert_eq!(c.current_point(), Some(Vec2::new(7.0, 3.0)));
        assert!(c.bounds().is_empty());
    }

    #[test]
    fn right_angle_arc_needs_two_quads() {
        for (start, end) in [(0.0, PI / 2.0), (0.3, 0.3 + PI / 2.0), (PI, 1.5 * PI)] {
            let mut p = Path::new();
            p.arc(0.0, 0.0, 5.0, start, end, Direction::Clockwise);
            assert_eq!(p.sub_paths()[0].ops.len(), 2, "{start}..{end}");
        }
    }

    #[test]
    fn segment_after_close_starts_at_sub_path_start() {
        let mut p = square(0.0, 0.0, 4.0, 4.0);
        assert_eq!(p.current_point(), Some(Vec2::new(0.0, 0.0)));
        p.line_to(8.0, 8.0);
        assert_eq!(p.sub_paths().len(), 2);
        assert_eq!(p.sub_paths()[1].start, Vec2::new(0.0, 0.0));
    }

    #[test]
    fn reset_clears_everything() {
        let mut p = square(0.0, 0.0, 4.0, 4.0);
        p.reset();
        assert!(p.is_empty());
        assert_eq!(p.current_point(), None);
        assert!(p.ensure_flat_paths().is_empty());
    }

    #[test]
    fn cubic_becomes_two_quads_ending_at_target() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0);
        p.cubic_to(0.0, 10.0, 10.0, 10.0, 10.0, 0.0);
        let ops = &p.sub_paths()[0].ops;
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1].end(), Vec2::new(10.0, 0.0));
        // The split point of a symmetric cubic is its apex.
        assert_eq!(ops[0].end(), Vec2::new(5.0, 7.5));
    }

    #[test]
    fn full_circle_uses_eight_quads() {
        let mut p = Path::new();
        p.arc(8.0, 8.0, 4.0, 0.0, TAU, Direction::Clockwise);
        let sub = &p.sub_paths()[0];
        assert_eq!(sub.start, Vec2::new(12.0, 8.0));
        assert_eq!(sub.ops.len(), 8);
        let end = sub.ops[7].end();
        assert!((end.x - 12.0).abs() < 1e-4 && (end.y - 8.0).abs() < 1e-4);
    }

    #[test]
    fn counter_clockwise_quarter_arc() {
        let mut p = Path::new();
        p.arc(0.0, 0.0, 10.0, 0.0, -PI / 2.0, Direction::CounterClockwise);
        let sub = &p.sub_paths()[0];
        assert_eq!(sub.ops.len(), 2);
        let end = sub.ops[1].end();
        assert!(end.x.abs() < 1e-4 && (end.y + 10.0).abs() < 1e-4);
    }

    #[test]
    fn arc_connects_from_current_point() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0);
        p.arc(10.0, 0.0, 2.0, PI, TAU, Direction::Clockwise);
        let ops = &p.sub_paths()[0].ops;
        let Op::LineTo(joint) = ops[0] else {
            panic!("arc must start with a connecting line");
        };
        assert!((joint.x - 8.0).abs() < 1e-4 && joint.y.abs() < 1e-4);
        assert_eq!(ops.len(), 5);
    }

    #[test]
    fn arc_to_rounds_a_right_angle() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0);
        p.arc_to(10.0, 0.0, 10.0, 10.0, 2.0);
        let ops = &p.sub_paths()[0].ops;
        let Op::LineTo(t1) = ops[0] else {
            panic!("arc_to must start with a line to the first tangent point");
        };
        assert!((t1.x - 8.0).abs() < 1e-4 && t1.y.abs() < 1e-4);
        assert_eq!(ops.len(), 3);
        let end = ops.last().unwrap().end();
        assert!((end.x - 10.0).abs() < 1e-4 && (end.y - 2.0).abs() < 1e-4);
    }

    #[test]
    fn arc_to_collinear_is_a_line() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0);
        p.arc_to(5.0, 0.0, 10.0, 0.0, 3.0);
        assert_eq!(p.sub_paths()[0].ops, vec![Op::LineTo(Vec2::new(5.0, 0.0))]);
    }

    // ── flattening ────────────────────────────────────────────────────────

    #[test]
    fn flat_quad_is_a_single_line() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0);
        p.quad_to(5.0, 0.2, 10.0, 0.0);
        let flat = p.ensure_flat_paths();
        assert_eq!(flat[0].points(), &[Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0)]);
    }

    #[test]
    fn curved_quad_is_subdivided_within_tolerance() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0);
        p.quad_to(50.0, 100.0, 100.0, 0.0);
        let points = p.ensure_flat_paths()[0].points().to_vec();
        assert!(points.len() > 4);
        assert_eq!(*points.last().unwrap(), Vec2::new(100.0, 0.0));
        // Every flattened point lies on the curve's y-range.
        assert!(points.iter().all(|q| q.y >= 0.0 && q.y <= 50.0 + 1e-3));
    }

    #[test]
    fn near_duplicate_points_are_dropped() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0);
        p.line_to(0.005, 0.005);
        p.line_to(4.0, 0.0);
        p.line_to(4.0, 4.0);
        assert_eq!(p.ensure_flat_paths()[0].points().len(), 3);
    }

    #[test]
    fn flattening_is_cached_until_mutation() {
        let mut p = square(0.0, 0.0, 4.0, 4.0);
        assert!(p.ensure_flat_paths()[0].is_closed());
        assert_eq!(p.ensure_flat_paths().len(), 1);
        p.move_to(10.0, 10.0);
        p.line_to(12.0, 10.0);
        assert_eq!(p.ensure_flat_paths().len(), 2);
    }

    // ── bounds ────────────────────────────────────────────────────────────

    #[test]
    fn bounds_round_outwards() {
        let p = square(1.5, 2.25, 7.5, 9.75);
        assert_eq!(p.bounds(), IRect::new(1, 2, 8, 10));
    }

    #[test]
    fn bounds_include_control_points() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0);
        p.quad_to(5.0, 10.0, 10.0, 0.0);
        assert_eq!(p.bounds(), IRect::new(0, 0, 10, 10));
    }

    #[test]
    fn degenerate_path_has_empty_bounds() {
        let mut p = Path::new();
        p.move_to(0.0, 3.0);
        p.line_to(10.0, 3.0);
        assert!(p.bounds().is_empty());
        assert!(Path::new().bounds().is_empty());
    }

    // ── filling ───────────────────────────────────────────────────────────

    #[test]
    fn fill_triangles_form_fans() {
        let mut p = square(0.0, 0.0, 4.0, 4.0);
        let mut vs = vec![0.0; VERTEX_FLOAT_COUNT];
        let mut is = Vec::new();
        p.append_vertices_and_indices_for_filling(&mut vs, &mut is);
        assert_eq!(vs.len(), 5 * VERTEX_FLOAT_COUNT);
        assert_eq!(is, vec![1, 2, 3, 1, 3, 4]);
        let v = Vertex::read(&vs, 3).unwrap();
        assert_eq!(v.dst, [4.0, 4.0]);
        assert_eq!(v.color, [1.0; 4]);
    }

    #[test]
    fn short_sub_paths_are_skipped_when_filling() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0);
        p.line_to(4.0, 0.0);
        let mut vs = Vec::new();
        let mut is = Vec::new();
        p.append_vertices_and_indices_for_filling(&mut vs, &mut is);
        assert!(vs.is_empty() && is.is_empty());
    }
}
