//! Native evaluation of the built-in fragment programs.

use crate::geom::IRect;
use crate::shader::{Address, BuiltinShader, Filter};

use super::raster::Fragment;

/// Read-only view of a source image.
#[derive(Debug, Copy, Clone)]
pub(super) struct Texture<'a> {
    pub width: i32,
    pub height: i32,
    pub pix: &'a [u8],
}

impl Texture<'_> {
    fn texel(&self, x: i32, y: i32) -> [f32; 4] {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return [0.0; 4];
        }
        let i = 4 * (y as usize * self.width as usize + x as usize);
        let p = &self.pix[i..i + 4];
        [p[0], p[1], p[2], p[3]].map(|c| c as f32 / 255.0)
    }
}

/// Per-draw sampling context for source 0.
#[derive(Debug, Copy, Clone)]
pub(super) struct Sampler<'a> {
    pub texture: Option<Texture<'a>>,
    pub region: IRect,
}

impl Sampler<'_> {
    fn fetch(&self, x: i32, y: i32, address: Address) -> [f32; 4] {
        let Some(tex) = self.texture else {
            return [0.0; 4];
        };
        match address {
            Address::Unsafe => tex.texel(x.clamp(0, tex.width - 1), y.clamp(0, tex.height - 1)),
            Address::ClampToZero => {
                if self.region.contains_point(x, y) {
                    tex.texel(x, y)
                } else {
                    [0.0; 4]
                }
            }
            Address::Repeat => {
                let r = self.region;
                let wx = r.min_x + (x - r.min_x).rem_euclid(r.dx().max(1));
                let wy = r.min_y + (y - r.min_y).rem_euclid(r.dy().max(1));
                tex.texel(wx, wy)
            }
        }
    }

    fn sample(&self, p: [f32; 2], filter: Filter, address: Address) -> [f32; 4] {
        match filter {
            Filter::Nearest => self.fetch(p[0].floor() as i32, p[1].floor() as i32, address),
            Filter::Linear => {
                let qx = p[0] - 0.5;
                let qy = p[1] - 0.5;
                let (bx, by) = (qx.floor(), qy.floor());
                let (fx, fy) = (qx - bx, qy - by);
                let (ix, iy) = (bx as i32, by as i32);
                let c00 = self.fetch(ix, iy, address);
                let c10 = self.fetch(ix + 1, iy, address);
                let c01 = self.fetch(ix, iy + 1, address);
                let c11 = self.fetch(ix + 1, iy + 1, address);
                std::array::from_fn(|i| {
                    let top = c00[i] + (c10[i] - c00[i]) * fx;
                    let bottom = c01[i] + (c11[i] - c01[i]) * fx;
                    top + (bottom - top) * fy
                })
            }
        }
    }

    fn load(&self, p: [f32; 2]) -> [f32; 4] {
        self.fetch(p[0].floor() as i32, p[1].floor() as i32, Address::ClampToZero)
    }
}

/// Runs `program` for one fragment. Returns the premultiplied output color.
pub(super) fn shade(program: BuiltinShader, frag: &Fragment, src0: &Sampler<'_>) -> [f32; 4] {
    match program {
        BuiltinShader::Copy { filter, address } => {
            let c = src0.sample(frag.src_pos, filter, address);
            mul4(c, frag.color)
        }
        BuiltinShader::Solid => frag.color,
        BuiltinShader::StencilFill => {
            let v = (if frag.front_facing { 1.0 } else { 16.0 }) / 255.0;
            frag.color.map(|c| c * v)
        }
        BuiltinShader::StencilBezier => {
            let [u, w, ..] = frag.custom;
            let inside = u * u - w < 0.0;
            if !inside {
                return [0.0; 4];
            }
            let v = (if frag.front_facing { 16.0 } else { 1.0 }) / 255.0;
            frag.color.map(|c| c * v)
        }
        BuiltinShader::Resolve {
            even_odd,
            antialias,
        } => {
            let rule = |c: f32| covered(c, even_odd);
            let s0 = src0.load(frag.src_pos);
            let coverage = if antialias {
                let second = [
                    frag.src_pos[0] + frag.custom[0],
                    frag.src_pos[1] + frag.custom[1],
                ];
                let s1 = src0.load(second);
                s0.iter().chain(&s1).map(|&c| rule(c)).sum::<f32>() / 8.0
            } else {
                rule(s0[0])
            };
            frag.color.map(|c| c * coverage)
        }
    }
}

/// Winding magnitude encoded in one stencil channel: `|high nibble - low nibble|`.
pub(super) fn winding(c: f32) -> i32 {
    let n = (c * 255.0).round() as i32;
    ((n >> 4) - (n & 0xF)).abs()
}

fn covered(c: f32, even_odd: bool) -> f32 {
    let w = winding(c);
    let hit = if even_odd { w % 2 == 1 } else { w > 0 };
    if hit { 1.0 } else { 0.0 }
}

fn mul4(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    std::array::from_fn(|i| a[i] * b[i])
}
