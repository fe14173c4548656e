//! Renders a few reference scenes through the image atlas and the stencil
//! rasterizer and writes them out as PNG files.
//!
//! Usage: `ember-studio [--gpu] [OUT_DIR]`. The software driver is used
//! unless `--gpu` is given.

use std::f32::consts::TAU;
use std::path::{Path as FsPath, PathBuf};

use anyhow::{Context, Result, bail};

use ember_gfx::GfxResult;
use ember_gfx::atlas::{Atlas, DrawTrianglesArgs, Frame, Image, ImageKind};
use ember_gfx::config::AtlasConfig;
use ember_gfx::driver::{GraphicsDriver, QUAD_INDICES, SoftwareDriver, Vertex, WgpuDriver, WgpuInit};
use ember_gfx::logging::{LoggingConfig, init_logging};
use ember_gfx::pixels::unpremultiply;
use ember_gfx::shader::BuiltinShader;
use ember_gfx::vector::{
    Direction, FillOptions, FillRule, LineCap, LineJoin, Path, StencilRasterizer, StrokeOptions,
};

const SIZE: u32 = 128;

const ORANGE: [f32; 4] = [0.95, 0.45, 0.1, 1.0];
const TEAL: [f32; 4] = [0.1, 0.6, 0.6, 1.0];

struct Args {
    gpu: bool,
    out_dir: PathBuf,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        gpu: false,
        out_dir: PathBuf::from("ember-out"),
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--gpu" => args.gpu = true,
            s if s.starts_with('-') => bail!("unknown flag {s}; usage: ember-studio [--gpu] [OUT_DIR]"),
            s => args.out_dir = PathBuf::from(s),
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());
    let args = parse_args()?;
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;

    let mut driver: Box<dyn GraphicsDriver> = if args.gpu {
        Box::new(WgpuDriver::new_blocking(WgpuInit::default()).context("failed to start the wgpu driver")?)
    } else {
        Box::new(SoftwareDriver::default())
    };

    let atlas = Atlas::new(AtlasConfig::default());
    let mut raster = StencilRasterizer::new();
    let scenes: [(&str, Scene); 6] = [
        ("bowtie-nonzero", |f, d, r| bowtie(f, d, r, FillRule::NonZero)),
        ("bowtie-evenodd", |f, d, r| bowtie(f, d, r, FillRule::EvenOdd)),
        ("annulus", annulus),
        ("curves-aa", curves),
        ("strokes", strokes),
        ("atlas-copy", atlas_copy),
    ];

    for (name, scene) in scenes {
        let dst = atlas.new_image(SIZE, SIZE, ImageKind::Regular)?;
        let mut frame = atlas.begin_frame(driver.as_mut())?;
        scene(&mut frame, &dst, &mut raster)?;
        let mut pix = vec![0; dst.bounds().rgba_len()];
        frame.read_pixels(&dst, &mut pix, dst.bounds())?;
        frame.end()?;

        let path = args.out_dir.join(format!("{name}.png"));
        save_png(&path, pix)?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}

type Scene = fn(&mut Frame<'_>, &Image, &mut StencilRasterizer) -> GfxResult<()>;

fn save_png(path: &FsPath, mut pix: Vec<u8>) -> Result<()> {
    unpremultiply(&mut pix);
    let img = image::RgbaImage::from_raw(SIZE, SIZE, pix).context("pixel buffer has the wrong size")?;
    img.save(path).with_context(|| format!("failed to write {}", path.display()))
}

fn polygon(path: &mut Path, points: &[(f32, f32)]) {
    let (x, y) = points[0];
    path.move_to(x, y);
    for &(x, y) in &points[1..] {
        path.line_to(x, y);
    }
    path.close();
}

fn bowtie(
    frame: &mut Frame<'_>,
    dst: &Image,
    raster: &mut StencilRasterizer,
    rule: FillRule,
) -> GfxResult<()> {
    let mut p = Path::new();
    polygon(&mut p, &[(8.0, 8.0), (120.0, 120.0), (120.0, 8.0), (8.0, 120.0)]);
    // A star crosses itself so its center winds twice.
    let mut star = Path::new();
    let (cx, cy, r) = (64.0, 64.0, 30.0);
    let points: Vec<(f32, f32)> = (0..5)
        .map(|i| {
            let a = -TAU / 4.0 + i as f32 * 2.0 * TAU / 5.0;
            (cx + r * a.cos(), cy + r * a.sin())
        })
        .collect();
    polygon(&mut star, &points);

    let options = FillOptions {
        fill_rule: rule,
        antialias: true,
    };
    raster.fill_paths(frame, dst, &[(&p, ORANGE), (&star, TEAL)], &options)
}

fn annulus(frame: &mut Frame<'_>, dst: &Image, raster: &mut StencilRasterizer) -> GfxResult<()> {
    let mut ring = Path::new();
    ring.arc(64.0, 64.0, 56.0, 0.0, TAU, Direction::Clockwise);
    ring.close();
    ring.arc(64.0, 64.0, 28.0, 0.0, TAU, Direction::CounterClockwise);
    ring.close();
    let options = FillOptions {
        fill_rule: FillRule::NonZero,
        antialias: true,
    };
    raster.fill_path(frame, dst, &ring, ORANGE, &options)
}

fn curves(frame: &mut Frame<'_>, dst: &Image, raster: &mut StencilRasterizer) -> GfxResult<()> {
    let mut blob = Path::new();
    blob.move_to(16.0, 96.0);
    blob.cubic_to(16.0, 8.0, 112.0, 8.0, 112.0, 96.0);
    blob.quad_to(64.0, 64.0, 16.0, 96.0);
    blob.close();

    let mut rounded = Path::new();
    rounded.move_to(40.0, 100.0);
    rounded.arc_to(88.0, 100.0, 88.0, 124.0, 10.0);
    rounded.arc_to(88.0, 124.0, 40.0, 124.0, 10.0);
    rounded.arc_to(40.0, 124.0, 40.0, 100.0, 10.0);
    rounded.arc_to(40.0, 100.0, 88.0, 100.0, 10.0);
    rounded.close();

    let options = FillOptions {
        fill_rule: FillRule::NonZero,
        antialias: true,
    };
    raster.fill_paths(frame, dst, &[(&blob, TEAL), (&rounded, ORANGE)], &options)
}

fn strokes(frame: &mut Frame<'_>, dst: &Image, raster: &mut StencilRasterizer) -> GfxResult<()> {
    let joins = [
        (LineJoin::Miter, LineCap::Butt),
        (LineJoin::Round, LineCap::Round),
        (LineJoin::Bevel, LineCap::Square),
    ];
    for (i, (line_join, line_cap)) in joins.into_iter().enumerate() {
        let y = 24.0 + i as f32 * 36.0;
        let mut zigzag = Path::new();
        zigzag.move_to(16.0, y + 16.0);
        zigzag.line_to(48.0, y);
        zigzag.line_to(80.0, y + 16.0);
        zigzag.line_to(112.0, y);
        let options = StrokeOptions {
            width: 8.0,
            line_join,
            line_cap,
            ..Default::default()
        };
        raster.stroke_path(frame, dst, &mut zigzag, TEAL, &options, true)?;
    }
    Ok(())
}

/// Writes a gradient into a packed image and copies it, scaled, into `dst`.
fn atlas_copy(frame: &mut Frame<'_>, dst: &Image, _: &mut StencilRasterizer) -> GfxResult<()> {
    let src = frame.atlas().new_image(32, 32, ImageKind::Regular)?;
    let mut pix = Vec::with_capacity(src.bounds().rgba_len());
    for y in 0..32u8 {
        for x in 0..32u8 {
            pix.extend_from_slice(&[x * 8, y * 8, 128, 255]);
        }
    }
    frame.write_pixels(&src, &pix, src.bounds())?;

    let mut vs = Vec::new();
    let s = SIZE as f32;
    for (x, y) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)] {
        Vertex::new([x * s, y * s], [x * 32.0, y * 32.0], [1.0; 4]).push_to(&mut vs);
    }
    frame.draw_triangles(
        dst,
        [Some(&src), None, None, None],
        &DrawTrianglesArgs::new(&vs, &QUAD_INDICES, dst.bounds(), BuiltinShader::COPY),
    )
}
