//! CPU reference driver.
//!
//! Deterministic and dependency-free at runtime: images are plain RGBA8
//! buffers, triangles are rasterized at pixel centers, and the built-in
//! programs are evaluated natively. Shaders are recognized by the fingerprint
//! of their source, so only built-in programs can be created.

mod program;
mod raster;

use std::collections::HashMap;

use crate::config::SoftwareDriverConfig;
use crate::error::{GfxError, GfxResult};
use crate::geom::IRect;
use crate::shader::{BuiltinShader, SourceHash, fingerprint};

use super::{DrawTrianglesCommand, FillRule, GraphicsDriver, ImageId, ShaderId, Vertex};
use program::{Sampler, Texture, shade};
use raster::rasterize;

#[derive(Debug)]
struct SoftImage {
    width: u32,
    height: u32,
    pix: Vec<u8>,
    screen: bool,
}

impl SoftImage {
    fn bounds(&self) -> IRect {
        IRect::from_size(self.width as i32, self.height as i32)
    }
}

/// CPU implementation of [`GraphicsDriver`].
#[derive(Debug)]
pub struct SoftwareDriver {
    config: SoftwareDriverConfig,
    images: HashMap<ImageId, SoftImage>,
    shaders: HashMap<ShaderId, BuiltinShader>,
    known_programs: HashMap<SourceHash, BuiltinShader>,
    next_image: u32,
    next_shader: u32,
    vertices: Vec<f32>,
    indices: Vec<u32>,
    in_frame: bool,
    draw_calls: u64,
}

impl Default for SoftwareDriver {
    fn default() -> Self {
        Self::new(SoftwareDriverConfig::default())
    }
}

impl SoftwareDriver {
    pub fn new(config: SoftwareDriverConfig) -> Self {
        let known_programs = BuiltinShader::ALL
            .into_iter()
            .map(|s| (s.fingerprint(), s))
            .collect();
        Self {
            config,
            images: HashMap::new(),
            shaders: HashMap::new(),
            known_programs,
            next_image: 1,
            next_shader: 1,
            vertices: Vec::new(),
            indices: Vec::new(),
            in_frame: false,
            draw_calls: 0,
        }
    }

    /// Number of live images.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Number of `draw_triangles` calls executed so far.
    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }

    /// Whole-image pixels, for inspection.
    pub fn pixels(&self, id: ImageId) -> Option<&[u8]> {
        self.images.get(&id).map(|img| img.pix.as_slice())
    }

    /// Simulates a lost GPU context: every image's content becomes transparent.
    pub fn lose_context(&mut self) {
        log::debug!("software driver: context lost ({} images)", self.images.len());
        for img in self.images.values_mut() {
            img.pix.fill(0);
        }
    }

    fn create_image(&mut self, width: u32, height: u32, screen: bool) -> GfxResult<ImageId> {
        if width == 0 || height == 0 {
            return Err(GfxError::invalid_argument(format!(
                "image size {width}x{height} must be positive"
            )));
        }
        let max = self.config.max_image_size;
        if width > max || height > max {
            return Err(GfxError::resource_exceeded(format!(
                "image size {width}x{height} exceeds {max}"
            )));
        }
        let id = ImageId(self.next_image);
        self.next_image += 1;
        self.images.insert(
            id,
            SoftImage {
                width,
                height,
                pix: vec![0; 4 * width as usize * height as usize],
                screen,
            },
        );
        Ok(id)
    }

    fn image(&self, id: ImageId) -> GfxResult<&SoftImage> {
        self.images
            .get(&id)
            .ok_or_else(|| GfxError::driver_failure(format!("unknown image {id:?}")))
    }

    fn triangles(&self, cmd: &DrawTrianglesCommand<'_>) -> GfxResult<Vec<[Vertex; 3]>> {
        let end = cmd
            .index_offset
            .checked_add(cmd.index_len)
            .filter(|&end| end <= self.indices.len())
            .ok_or_else(|| GfxError::invalid_argument("index range outside the index buffer"))?;
        self.indices[cmd.index_offset..end]
            .chunks_exact(3)
            .map(|idx| {
                let read = |k: usize| {
                    Vertex::read(&self.vertices, idx[k] as usize).ok_or_else(|| {
                        GfxError::invalid_argument(format!("vertex index {} out of range", idx[k]))
                    })
                };
                Ok([read(0)?, read(1)?, read(2)?])
            })
            .collect()
    }
}

fn check_region(bounds: IRect, region: IRect, len: usize) -> GfxResult<()> {
    if region.is_empty() || !region.is_in(bounds) {
        return Err(GfxError::invalid_argument(format!(
            "region {region:?} is outside image {bounds:?}"
        )));
    }
    if len != region.rgba_len() {
        return Err(GfxError::invalid_argument(format!(
            "pixel buffer is {len} bytes, region needs {}",
            region.rgba_len()
        )));
    }
    Ok(())
}

fn blend_pixel(pix: &mut [u8], width: u32, x: i32, y: i32, src: [f32; 4], cmd: &DrawTrianglesCommand<'_>) {
    let i = 4 * (y as usize * width as usize + x as usize);
    let px = &mut pix[i..i + 4];
    let dst = [px[0], px[1], px[2], px[3]].map(|c| c as f32 / 255.0);
    let out = cmd.blend.apply(src, dst);
    for (c, v) in px.iter_mut().zip(out) {
        *c = (v * 255.0).round() as u8;
    }
}

impl GraphicsDriver for SoftwareDriver {
    fn begin(&mut self) -> GfxResult<()> {
        self.in_frame = true;
        Ok(())
    }

    fn end(&mut self, _present: bool) -> GfxResult<()> {
        self.in_frame = false;
        Ok(())
    }

    fn max_image_size(&self) -> u32 {
        self.config.max_image_size
    }

    fn new_image(&mut self, width: u32, height: u32) -> GfxResult<ImageId> {
        self.create_image(width, height, false)
    }

    fn new_screen_framebuffer_image(&mut self, width: u32, height: u32) -> GfxResult<ImageId> {
        self.create_image(width, height, true)
    }

    fn dispose_image(&mut self, id: ImageId) {
        if let Some(img) = self.images.remove(&id) {
            if img.screen {
                log::debug!("software driver: screen image {id:?} disposed");
            }
        }
    }

    fn new_shader(&mut self, source: &str) -> GfxResult<ShaderId> {
        let hash = fingerprint(source);
        let program = *self.known_programs.get(&hash).ok_or_else(|| {
            GfxError::driver_failure(format!("no precompiled program for source {hash}"))
        })?;
        let id = ShaderId(self.next_shader);
        self.next_shader += 1;
        self.shaders.insert(id, program);
        Ok(id)
    }

    fn dispose_shader(&mut self, id: ShaderId) {
        self.shaders.remove(&id);
    }

    fn write_pixels(&mut self, id: ImageId, pix: &[u8], region: IRect) -> GfxResult<()> {
        let img = self
            .images
            .get_mut(&id)
            .ok_or_else(|| GfxError::driver_failure(format!("unknown image {id:?}")))?;
        check_region(img.bounds(), region, pix.len())?;
        let row = 4 * region.dx() as usize;
        let stride = 4 * img.width as usize;
        for (j, src) in pix.chunks_exact(row).enumerate() {
            let start = (region.min_y as usize + j) * stride + 4 * region.min_x as usize;
            img.pix[start..start + row].copy_from_slice(src);
        }
        Ok(())
    }

    fn read_pixels(&mut self, id: ImageId, buf: &mut [u8], region: IRect) -> GfxResult<()> {
        let img = self.image(id)?;
        check_region(img.bounds(), region, buf.len())?;
        let row = 4 * region.dx() as usize;
        let stride = 4 * img.width as usize;
        for (j, dst) in buf.chunks_exact_mut(row).enumerate() {
            let start = (region.min_y as usize + j) * stride + 4 * region.min_x as usize;
            dst.copy_from_slice(&img.pix[start..start + row]);
        }
        Ok(())
    }

    fn set_vertices(&mut self, vertices: &[f32], indices: &[u32]) -> GfxResult<()> {
        self.vertices.clear();
        self.vertices.extend_from_slice(vertices);
        self.indices.clear();
        self.indices.extend_from_slice(indices);
        Ok(())
    }

    fn draw_triangles(&mut self, cmd: &DrawTrianglesCommand<'_>) -> GfxResult<()> {
        let program = *self
            .shaders
            .get(&cmd.shader)
            .ok_or_else(|| GfxError::driver_failure(format!("unknown shader {:?}", cmd.shader)))?;
        if cmd.srcs.iter().flatten().any(|&s| s == cmd.dst) {
            return Err(GfxError::invalid_argument("a draw cannot sample its own destination"));
        }
        let tris = self.triangles(cmd)?;
        self.draw_calls += 1;

        let (width, bounds) = {
            let dst = self.image(cmd.dst)?;
            (dst.width, dst.bounds())
        };
        let clip = cmd.dst_region.intersect(bounds);
        if clip.is_empty() || tris.is_empty() {
            return Ok(());
        }
        if let Some(src) = cmd.srcs[0] {
            self.image(src)?;
        }

        // Take the destination out so sources can be borrowed alongside it.
        let mut pix = match self.images.get_mut(&cmd.dst) {
            Some(img) => std::mem::take(&mut img.pix),
            None => return Err(GfxError::driver_failure("destination vanished")),
        };
        let sampler = Sampler {
            texture: cmd.srcs[0].and_then(|id| self.images.get(&id)).map(|img| Texture {
                width: img.width as i32,
                height: img.height as i32,
                pix: &img.pix,
            }),
            region: cmd.src_regions[0],
        };

        match cmd.fill_rule {
            FillRule::FillAll => {
                for tri in &tris {
                    rasterize(*tri, clip, |x, y, frag| {
                        blend_pixel(&mut pix, width, x, y, shade(program, frag, &sampler), cmd);
                    });
                }
            }
            rule => {
                let cw = clip.dx() as usize;
                let at = |x: i32, y: i32| (y - clip.min_y) as usize * cw + (x - clip.min_x) as usize;
                let mut stencil = vec![0i32; cw * clip.dy() as usize];
                for tri in &tris {
                    rasterize(*tri, clip, |x, y, frag| {
                        let s = &mut stencil[at(x, y)];
                        match rule {
                            FillRule::EvenOdd => *s ^= 1,
                            _ => *s += if frag.front_facing { 1 } else { -1 },
                        }
                    });
                }
                for tri in &tris {
                    rasterize(*tri, clip, |x, y, frag| {
                        let s = &mut stencil[at(x, y)];
                        if *s != 0 {
                            *s = 0;
                            blend_pixel(&mut pix, width, x, y, shade(program, frag, &sampler), cmd);
                        }
                    });
                }
            }
        }

        if let Some(img) = self.images.get_mut(&cmd.dst) {
            img.pix = pix;
        }
        Ok(())
    }
}
