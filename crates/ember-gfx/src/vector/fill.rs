use crate::atlas::{DrawTrianglesArgs, Frame, Image};
use crate::driver::{Blend, QUAD_INDICES, VERTEX_FLOAT_COUNT, Vertex};
use crate::error::GfxResult;
use crate::geom::{IRect, Vec2};
use crate::shader::BuiltinShader;

use super::path::{Op, Path};
use super::stencil::StencilAtlas;
use super::stroke::StrokeOptions;

/// Which winding numbers count as inside.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum FillRule {
    /// Covered when the winding number is not zero.
    #[default]
    NonZero,
    /// Covered when the winding number is odd.
    EvenOdd,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FillOptions {
    pub fill_rule: FillRule,
    /// Eight coverage samples per pixel instead of one.
    pub antialias: bool,
}

/// One coverage sample: a sub-pixel offset, the stencil channel it counts
/// into and the region half holding that channel.
#[derive(Debug, Copy, Clone)]
struct Sample {
    offset: [f32; 2],
    channel: usize,
    half: usize,
}

const fn sample(x: i32, y: i32, channel: usize, half: usize) -> Sample {
    Sample {
        offset: [x as f32 / 16.0, y as f32 / 16.0],
        channel,
        half,
    }
}

const SINGLE_SAMPLE: [Sample; 1] = [sample(0, 0, 0, 0)];

/// The D3D11 standard 8x pattern, in 1/16 px.
const AA_SAMPLES: [Sample; 8] = [
    sample(1, -3, 0, 0),
    sample(-1, 3, 1, 0),
    sample(5, 1, 2, 0),
    sample(-3, -5, 3, 0),
    sample(-5, 5, 0, 1),
    sample(-7, -1, 1, 1),
    sample(3, 7, 2, 1),
    sample(7, -7, 3, 1),
];

impl Sample {
    fn color(self) -> [f32; 4] {
        let mut c = [0.0; 4];
        c[self.channel] = 1.0;
        c
    }
}

fn next_index(vertices: &[f32]) -> u32 {
    (vertices.len() / VERTEX_FLOAT_COUNT) as u32
}

/// Pass A geometry: one triangle per segment chord, fanned around the
/// sub-path start. Emitted as `(current, pivot, end)`.
fn append_fan(vertices: &mut Vec<f32>, indices: &mut Vec<u32>, path: &Path, shift: Vec2, color: [f32; 4]) {
    let vertex = |p: Vec2| Vertex::new([p.x + shift.x, p.y + shift.y], [0.0; 2], color);
    for sub in path.sub_paths().iter().filter(|s| s.is_valid()) {
        let pivot = next_index(vertices);
        vertex(sub.start).push_to(vertices);
        let mut cur = sub.start;
        for op in &sub.ops {
            let end = op.end();
            let idx = next_index(vertices);
            vertex(cur).push_to(vertices);
            vertex(end).push_to(vertices);
            indices.extend_from_slice(&[idx, pivot, idx + 1]);
            cur = end;
        }
    }
}

/// Pass B geometry: the `(p0, ctrl, p1)` triangle of every quadratic with
/// Loop-Blinn coordinates in `custom.xy`.
fn append_curves(vertices: &mut Vec<f32>, indices: &mut Vec<u32>, path: &Path, shift: Vec2, color: [f32; 4]) {
    for sub in path.sub_paths().iter().filter(|s| s.is_valid()) {
        let mut cur = sub.start;
        for op in &sub.ops {
            if let Op::QuadTo(ctrl, end) = *op {
                let idx = next_index(vertices);
                for (p, uv) in [(cur, [0.0, 0.0]), (ctrl, [0.5, 0.0]), (end, [1.0, 1.0])] {
                    Vertex::new([p.x + shift.x, p.y + shift.y], [0.0; 2], color)
                        .with_custom([uv[0], uv[1], 0.0, 0.0])
                        .push_to(vertices);
                }
                indices.extend_from_slice(&[idx, idx + 1, idx + 2]);
            }
            cur = op.end();
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Pass {
    Fan,
    Curves,
}

/// Fills paths with solid colors through per-path winding counts.
///
/// Each fill call packs one stencil region per path, accumulates winding
/// counts there (fan triangles, then curve corrections) and resolves the
/// counts into the destination with the requested fill rule. Stencil pages
/// are kept between calls. Not shareable across threads while in use.
#[derive(Debug, Default)]
pub struct StencilRasterizer {
    stencil: StencilAtlas,
    vertices: Vec<f32>,
    indices: Vec<u32>,
}

impl StencilRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills one path with a premultiplied color.
    pub fn fill_path(
        &mut self,
        frame: &mut Frame<'_>,
        dst: &Image,
        path: &Path,
        color: [f32; 4],
        options: &FillOptions,
    ) -> GfxResult<()> {
        self.fill_paths(frame, dst, &[(path, color)], options)
    }

    /// Strokes `path` with a premultiplied color.
    ///
    /// The outline from [`Path::add_stroke`] is always filled under the
    /// non-zero rule.
    pub fn stroke_path(
        &mut self,
        frame: &mut Frame<'_>,
        dst: &Image,
        path: &mut Path,
        color: [f32; 4],
        stroke: &StrokeOptions,
        antialias: bool,
    ) -> GfxResult<()> {
        let mut outline = Path::new();
        outline.add_stroke(path, stroke);
        let options = FillOptions {
            fill_rule: FillRule::NonZero,
            antialias,
        };
        self.fill_path(frame, dst, &outline, color, &options)
    }

    /// Fills every path with its premultiplied color, in order.
    pub fn fill_paths(
        &mut self,
        frame: &mut Frame<'_>,
        dst: &Image,
        paths: &[(&Path, [f32; 4])],
        options: &FillOptions,
    ) -> GfxResult<()> {
        let dst_bounds = dst.bounds();
        let mut renders: Vec<IRect> = paths
            .iter()
            .map(|(path, _)| path.bounds().intersect(dst_bounds))
            .collect();
        let sizes: Vec<(i32, i32)> = renders.iter().map(|r| r.size()).collect();
        let regions = self.stencil.prepare(frame, &sizes, options.antialias)?;
        for (render, region) in renders.iter_mut().zip(&regions) {
            if let Some(region) = region {
                render.max_x = render.min_x + render.dx().min(region.half_width);
                render.max_y = render.min_y + render.dy().min(region.rect.dy());
            }
        }

        let samples: &[Sample] = if options.antialias { &AA_SAMPLES } else { &SINGLE_SAMPLE };
        let halves = if options.antialias { 2 } else { 1 };

        for pass in [Pass::Fan, Pass::Curves] {
            for (i, (path, _)) in paths.iter().enumerate() {
                let Some(region) = regions[i] else { continue };
                for half in 0..halves {
                    let target = region.half(half);
                    let base = Vec2::new(
                        (target.min_x - renders[i].min_x) as f32,
                        (target.min_y - renders[i].min_y) as f32,
                    );
                    self.vertices.clear();
                    self.indices.clear();
                    for s in samples.iter().filter(|s| s.half == half) {
                        let shift = base + Vec2::new(s.offset[0], s.offset[1]);
                        match pass {
                            Pass::Fan => append_fan(&mut self.vertices, &mut self.indices, path, shift, s.color()),
                            Pass::Curves => {
                                append_curves(&mut self.vertices, &mut self.indices, path, shift, s.color())
                            }
                        }
                    }
                    if self.indices.is_empty() {
                        continue;
                    }
                    let shader = match pass {
                        Pass::Fan => BuiltinShader::StencilFill,
                        Pass::Curves => BuiltinShader::StencilBezier,
                    };
                    frame.draw_triangles(
                        self.stencil.page_image(region.page),
                        [None; 4],
                        &DrawTrianglesArgs::new(&self.vertices, &self.indices, target, shader)
                            .with_blend(Blend::LIGHTER),
                    )?;
                }
            }
        }

        let resolve = BuiltinShader::Resolve {
            even_odd: options.fill_rule == FillRule::EvenOdd,
            antialias: options.antialias,
        };
        for (i, (_, color)) in paths.iter().enumerate() {
            let Some(region) = regions[i] else { continue };
            let render = renders[i];
            let src = region.half(0);
            let second_half = if options.antialias { region.half_width as f32 } else { 0.0 };

            self.vertices.clear();
            let (w, h) = render.size();
            for (x, y) in [(0, 0), (w, 0), (0, h), (w, h)] {
                Vertex::new(
                    [(render.min_x + x) as f32, (render.min_y + y) as f32],
                    [(src.min_x + x) as f32, (src.min_y + y) as f32],
                    *color,
                )
                .with_custom([second_half, 0.0, 0.0, 0.0])
                .push_to(&mut self.vertices);
            }
            frame.draw_triangles(
                dst,
                [Some(self.stencil.page_image(region.page)), None, None, None],
                &DrawTrianglesArgs::new(&self.vertices, &QUAD_INDICES, render, resolve)
                    .with_src_region(0, region.rect),
            )?;
        }
        Ok(())
    }
}
