//! Scanline-free triangle rasterizer over pixel centers.

use crate::driver::Vertex;
use crate::geom::IRect;

/// Interpolated inputs of one fragment.
#[derive(Debug, Copy, Clone)]
pub(super) struct Fragment {
    pub src_pos: [f32; 2],
    pub color: [f32; 4],
    pub custom: [f32; 4],
    pub front_facing: bool,
}

/// Calls `visit(x, y, fragment)` for every pixel of `clip` whose center lies
/// inside the triangle.
///
/// Centers exactly on an edge follow the top-left rule, so pixels on an edge
/// shared by two triangles of the same orientation are visited once. A
/// triangle is front-facing when it winds counter-clockwise with +Y up, which
/// in pixel space (+Y down) means a negative signed area.
pub(super) fn rasterize(tri: [Vertex; 3], clip: IRect, mut visit: impl FnMut(i32, i32, &Fragment)) {
    let p = tri.map(|v| [v.dst[0] as f64, v.dst[1] as f64]);
    let area = edge(p[0], p[1], p[2]);
    if area == 0.0 || !area.is_finite() {
        return;
    }
    let front_facing = area < 0.0;
    // Normalize to positive area so the inside test is `e >= 0`.
    let (v, p, area) = if front_facing {
        ([tri[0], tri[2], tri[1]], [p[0], p[2], p[1]], -area)
    } else {
        (tri, p, area)
    };

    let min_x = p.iter().map(|q| q[0]).fold(f64::INFINITY, f64::min).floor() as i32;
    let min_y = p.iter().map(|q| q[1]).fold(f64::INFINITY, f64::min).floor() as i32;
    let max_x = p.iter().map(|q| q[0]).fold(f64::NEG_INFINITY, f64::max).ceil() as i32;
    let max_y = p.iter().map(|q| q[1]).fold(f64::NEG_INFINITY, f64::max).ceil() as i32;
    let bounds = IRect::new(min_x, min_y, max_x, max_y).intersect(clip);
    if bounds.is_empty() {
        return;
    }

    let top_left = [
        is_top_left(p[1], p[2]),
        is_top_left(p[2], p[0]),
        is_top_left(p[0], p[1]),
    ];

    for y in bounds.min_y..bounds.max_y {
        for x in bounds.min_x..bounds.max_x {
            let c = [x as f64 + 0.5, y as f64 + 0.5];
            let w = [edge(p[1], p[2], c), edge(p[2], p[0], c), edge(p[0], p[1], c)];
            let inside = w
                .iter()
                .zip(top_left)
                .all(|(&e, tl)| e > 0.0 || (e == 0.0 && tl));
            if !inside {
                continue;
            }
            let b = w.map(|e| (e / area) as f32);
            let frag = Fragment {
                src_pos: lerp3([v[0].src, v[1].src, v[2].src], b),
                color: lerp3([v[0].color, v[1].color, v[2].color], b),
                custom: lerp3([v[0].custom, v[1].custom, v[2].custom], b),
                front_facing,
            };
            visit(x, y, &frag);
        }
    }
}

/// Twice the signed area of `(a, b, c)`; positive when `c` is clockwise of `a -> b` on screen.
#[inline]
fn edge(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// Top edges run rightwards horizontally; left edges run upwards.
#[inline]
fn is_top_left(a: [f64; 2], b: [f64; 2]) -> bool {
    (a[1] == b[1] && b[0] > a[0]) || b[1] < a[1]
}

#[inline]
fn lerp3<const N: usize>(vals: [[f32; N]; 3], b: [f32; 3]) -> [f32; N] {
    std::array::from_fn(|i| vals[0][i] * b[0] + vals[1][i] * b[1] + vals[2][i] * b[2])
}
