use crate::bytes::ManagedBytes;
use crate::driver::{
    Blend, DrawTrianglesCommand, FillRule, GraphicsDriver, ImageId, QUAD_INDICES, ShaderId, Vertex,
};
use crate::error::{GfxError, GfxResult};
use crate::geom::IRect;

use super::PixelsRecords;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RestorableKind {
    Regular,
    /// Cleared at the start of every frame; never saved.
    Volatile,
    /// Backed by the screen framebuffer; never saved.
    Screen,
}

/// Draw parameters for [`RestorableImage::draw_triangles`].
///
/// Source ids must refer to images whose pending records are already applied.
#[derive(Debug, Clone)]
pub struct DrawParams<'a> {
    pub srcs: [Option<ImageId>; 4],
    pub offsets: [[f32; 2]; 3],
    pub vertices: &'a [f32],
    pub indices: &'a [u32],
    pub blend: Blend,
    pub dst_region: IRect,
    pub src_regions: [IRect; 4],
    pub shader: ShaderId,
    pub uniforms: &'a [u32],
    pub fill_rule: FillRule,
}

/// A driver image plus the journal needed to read or rebuild it.
#[derive(Debug)]
pub struct RestorableImage {
    width: u32,
    height: u32,
    kind: RestorableKind,
    image: Option<ImageId>,
    records: PixelsRecords,
    /// Draws have touched the GPU image, so the journal alone no longer
    /// describes its content.
    drawn: bool,
}

fn new_driver_image(
    driver: &mut dyn GraphicsDriver,
    kind: RestorableKind,
    width: u32,
    height: u32,
) -> GfxResult<ImageId> {
    match kind {
        RestorableKind::Screen => driver.new_screen_framebuffer_image(width, height),
        RestorableKind::Regular | RestorableKind::Volatile => driver.new_image(width, height),
    }
}

impl RestorableImage {
    /// Creates a cleared image.
    pub fn new(
        driver: &mut dyn GraphicsDriver,
        width: u32,
        height: u32,
        kind: RestorableKind,
    ) -> GfxResult<Self> {
        let image = new_driver_image(driver, kind, width, height)?;
        Ok(Self {
            width,
            height,
            kind,
            image: Some(image),
            records: PixelsRecords::new(),
            drawn: false,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn kind(&self) -> RestorableKind {
        self.kind
    }

    pub fn bounds(&self) -> IRect {
        IRect::from_size(self.width as i32, self.height as i32)
    }

    /// Driver image id.
    ///
    /// # Panics
    /// If the image was disposed.
    pub fn image_id(&self) -> ImageId {
        self.image.expect("restorable image used after dispose")
    }

    pub fn records(&self) -> &PixelsRecords {
        &self.records
    }

    /// Bytes of GPU memory held by the driver image.
    pub fn memory_bytes(&self) -> u64 {
        4 * self.width as u64 * self.height as u64
    }

    fn check_region(&self, region: IRect, len: Option<usize>) -> GfxResult<()> {
        if !region.is_in(self.bounds()) {
            return Err(GfxError::invalid_argument(format!(
                "region {region:?} is outside the {}x{} image",
                self.width, self.height
            )));
        }
        if let Some(len) = len.filter(|&len| len != region.rgba_len()) {
            return Err(GfxError::invalid_argument(format!(
                "pixel buffer is {len} bytes but region {region:?} needs {}",
                region.rgba_len()
            )));
        }
        Ok(())
    }

    /// Journals a write of `pix` into `region`.
    pub fn write_pixels(&mut self, pix: ManagedBytes, region: IRect) -> GfxResult<()> {
        self.check_region(region, Some(pix.len()))?;
        if region.is_empty() {
            log::warn!("ignoring empty pixel write");
            return Ok(());
        }
        self.records.add_or_replace(pix, region);
        Ok(())
    }

    /// Journals a clear of `region`.
    pub fn clear_pixels(&mut self, region: IRect) -> GfxResult<()> {
        self.check_region(region, None)?;
        self.records.clear(region);
        Ok(())
    }

    /// Clears the whole image, dropping the journal.
    pub fn clear_all(&mut self) {
        self.records.clear_all();
        self.records.clear(self.bounds());
        self.drawn = false;
    }

    /// Reads `region` into `buf`.
    ///
    /// Content produced only by pixel writes is served from the journal.
    pub fn read_pixels(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        buf: &mut [u8],
        region: IRect,
    ) -> GfxResult<()> {
        self.check_region(region, Some(buf.len()))?;
        if region.is_empty() {
            return Ok(());
        }
        if !self.drawn {
            self.records.read_pixels(buf, region);
            return Ok(());
        }
        self.apply(driver)?;
        driver.read_pixels(self.image_id(), buf, region)
    }

    /// Draws into this image. Journaled writes under `dst_region` are dropped.
    pub fn draw_triangles(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        params: &DrawParams<'_>,
    ) -> GfxResult<()> {
        if params.indices.is_empty() {
            return Ok(());
        }
        let dst = self.image_id();
        if params.srcs.iter().flatten().any(|&s| s == dst) {
            panic!("source must be different from the destination");
        }

        // Blending reads the destination, so pending writes go first.
        self.apply(driver)?;
        self.records.remove_intersecting(params.dst_region);
        self.drawn = true;

        driver.set_vertices(params.vertices, params.indices)?;
        driver.draw_triangles(&DrawTrianglesCommand {
            dst,
            srcs: params.srcs,
            offsets: params.offsets,
            shader: params.shader,
            index_offset: 0,
            index_len: params.indices.len(),
            blend: params.blend,
            dst_region: params.dst_region,
            src_regions: params.src_regions,
            uniforms: params.uniforms,
            fill_rule: params.fill_rule,
        })
    }

    /// Flushes pending journal entries to the GPU.
    pub fn apply(&mut self, driver: &mut dyn GraphicsDriver) -> GfxResult<()> {
        if !self.records.has_pending() {
            return Ok(());
        }
        let image = self.image_id();
        self.records.apply(driver, image)
    }

    /// Grows the image to `width x height`, keeping its content at the origin.
    ///
    /// # Panics
    /// If the new size is smaller than the current one on either axis.
    pub fn extend(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        width: u32,
        height: u32,
        copy_shader: ShaderId,
    ) -> GfxResult<()> {
        assert!(
            width >= self.width && height >= self.height,
            "cannot shrink a {}x{} image to {width}x{height}",
            self.width,
            self.height
        );
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }

        let old = self.image_id();
        let new = new_driver_image(driver, self.kind, width, height)?;
        if self.drawn {
            // Applied writes live only on the old image; copy everything over.
            let (w, h) = (self.width as f32, self.height as f32);
            let mut vertices = Vec::with_capacity(4 * crate::driver::VERTEX_FLOAT_COUNT);
            for (x, y) in [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)] {
                Vertex::new([x, y], [x, y], [1.0; 4]).push_to(&mut vertices);
            }
            let old_bounds = self.bounds();
            driver.set_vertices(&vertices, &QUAD_INDICES)?;
            driver.draw_triangles(&DrawTrianglesCommand {
                dst: new,
                srcs: [Some(old), None, None, None],
                offsets: [[0.0; 2]; 3],
                shader: copy_shader,
                index_offset: 0,
                index_len: QUAD_INDICES.len(),
                blend: Blend::COPY,
                dst_region: old_bounds,
                src_regions: [old_bounds, IRect::default(), IRect::default(), IRect::default()],
                uniforms: &[],
                fill_rule: FillRule::FillAll,
            })?;
        } else {
            self.records.mark_pending();
        }
        driver.dispose_image(old);

        log::debug!(
            "extended image {old:?} {}x{} -> {new:?} {width}x{height}",
            self.width,
            self.height
        );
        self.image = Some(new);
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Folds the GPU content into the journal so the image can be restored.
    pub fn save(&mut self, driver: &mut dyn GraphicsDriver) -> GfxResult<()> {
        if self.kind != RestorableKind::Regular || !self.drawn {
            return Ok(());
        }
        self.apply(driver)?;
        let bounds = self.bounds();
        let mut pix = ManagedBytes::get(bounds.rgba_len());
        driver.read_pixels(self.image_id(), &mut pix, bounds)?;
        self.records.replace_with_snapshot(pix, bounds);
        self.drawn = false;
        Ok(())
    }

    /// Recreates the driver image and schedules the journal to be re-applied.
    ///
    /// Screen and volatile images come back cleared.
    pub fn restore(&mut self, driver: &mut dyn GraphicsDriver) -> GfxResult<()> {
        if let Some(old) = self.image.take() {
            driver.dispose_image(old);
        }
        self.image = Some(new_driver_image(driver, self.kind, self.width, self.height)?);
        match self.kind {
            RestorableKind::Regular => self.records.mark_pending(),
            RestorableKind::Volatile | RestorableKind::Screen => self.records.clear_all(),
        }
        self.drawn = false;
        Ok(())
    }

    /// Releases the driver image. Further use panics.
    pub fn dispose(&mut self, driver: &mut dyn GraphicsDriver) {
        if let Some(image) = self.image.take() {
            driver.dispose_image(image);
        }
        self.records.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SoftwareDriver;
    use crate::shader::BuiltinShader;

    fn filled(len: usize, v: u8) -> ManagedBytes {
        let mut pix = ManagedBytes::get(len);
        pix.fill(v);
        pix
    }

    fn solid_quad(driver: &mut SoftwareDriver, img: &mut RestorableImage, r: IRect, color: [f32; 4]) {
        let shader = driver.new_shader(BuiltinShader::Solid.source()).unwrap();
        let mut vertices = Vec::new();
        let (x0, y0, x1, y1) = (r.min_x as f32, r.min_y as f32, r.max_x as f32, r.max_y as f32);
        for (x, y) in [(x0, y0), (x1, y0), (x0, y1), (x1, y1)] {
            Vertex::new([x, y], [0.0, 0.0], color).push_to(&mut vertices);
        }
        img.draw_triangles(
            driver,
            &DrawParams {
                srcs: [None; 4],
                offsets: [[0.0; 2]; 3],
                vertices: &vertices,
                indices: &QUAD_INDICES,
                blend: Blend::SOURCE_OVER,
                dst_region: img.bounds(),
                src_regions: [IRect::default(); 4],
                shader,
                uniforms: &[],
                fill_rule: FillRule::FillAll,
            },
        )
        .unwrap();
    }

    fn read_all(driver: &mut SoftwareDriver, img: &mut RestorableImage) -> Vec<u8> {
        let bounds = img.bounds();
        let mut buf = vec![0; bounds.rgba_len()];
        img.read_pixels(driver, &mut buf, bounds).unwrap();
        buf
    }

    // ── journal reads ─────────────────────────────────────────────────────

    #[test]
    fn write_then_read_without_gpu_traffic() {
        let mut driver = SoftwareDriver::default();
        let mut img = RestorableImage::new(&mut driver, 4, 4, RestorableKind::Regular).unwrap();
        img.write_pixels(filled(64, 0xAB), img.bounds()).unwrap();

        assert!(read_all(&mut driver, &mut img).iter().all(|&b| b == 0xAB));
        // Nothing reached the driver yet.
        assert!(driver.pixels(img.image_id()).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn write_rejects_bad_length_and_region() {
        let mut driver = SoftwareDriver::default();
        let mut img = RestorableImage::new(&mut driver, 4, 4, RestorableKind::Regular).unwrap();
        let err = img.write_pixels(filled(3, 0), IRect::new(0, 0, 1, 1)).unwrap_err();
        assert!(matches!(err, GfxError::InvalidArgument(_)));
        let err = img.write_pixels(filled(4, 0), IRect::new(4, 4, 5, 5)).unwrap_err();
        assert!(matches!(err, GfxError::InvalidArgument(_)));
    }

    // ── draws ─────────────────────────────────────────────────────────────

    #[test]
    fn draw_applies_pending_writes_first() {
        let mut driver = SoftwareDriver::default();
        let mut img = RestorableImage::new(&mut driver, 4, 4, RestorableKind::Regular).unwrap();
        img.write_pixels(filled(16, 0xFF), IRect::new(0, 0, 2, 2)).unwrap();
        solid_quad(&mut driver, &mut img, IRect::new(2, 2, 4, 4), [0.0, 0.0, 1.0, 1.0]);

        let buf = read_all(&mut driver, &mut img);
        assert_eq!(&buf[0..4], &[0xFF; 4]);
        let i = 4 * (3 * 4 + 3);
        assert_eq!(&buf[i..i + 4], &[0, 0, 0xFF, 0xFF]);
    }

    #[test]
    #[should_panic(expected = "source must be different")]
    fn draw_from_self_panics() {
        let mut driver = SoftwareDriver::default();
        let mut img = RestorableImage::new(&mut driver, 4, 4, RestorableKind::Regular).unwrap();
        let id = img.image_id();
        let _ = img.draw_triangles(
            &mut driver,
            &DrawParams {
                srcs: [Some(id), None, None, None],
                offsets: [[0.0; 2]; 3],
                vertices: &[0.0; 12],
                indices: &[0, 0, 0],
                blend: Blend::COPY,
                dst_region: IRect::from_size(4, 4),
                src_regions: [IRect::default(); 4],
                shader: ShaderId(1),
                uniforms: &[],
                fill_rule: FillRule::FillAll,
            },
        );
    }

    // ── extend ────────────────────────────────────────────────────────────

    #[test]
    fn extend_keeps_drawn_content() {
        let mut driver = SoftwareDriver::default();
        let copy = driver.new_shader(BuiltinShader::COPY.source()).unwrap();
        let mut img = RestorableImage::new(&mut driver, 4, 4, RestorableKind::Regular).unwrap();
        solid_quad(&mut driver, &mut img, IRect::new(0, 0, 4, 4), [1.0, 0.0, 0.0, 1.0]);

        img.extend(&mut driver, 8, 8, copy).unwrap();
        assert_eq!((img.width(), img.height()), (8, 8));

        let buf = read_all(&mut driver, &mut img);
        assert_eq!(&buf[0..4], &[0xFF, 0, 0, 0xFF]);
        let outside = 4 * (7 * 8 + 7);
        assert_eq!(&buf[outside..outside + 4], &[0; 4]);
    }

    #[test]
    fn extend_replays_journal_when_not_drawn() {
        let mut driver = SoftwareDriver::default();
        let copy = driver.new_shader(BuiltinShader::COPY.source()).unwrap();
        let mut img = RestorableImage::new(&mut driver, 2, 2, RestorableKind::Regular).unwrap();
        img.write_pixels(filled(16, 0x42), img.bounds()).unwrap();
        img.apply(&mut driver).unwrap();

        img.extend(&mut driver, 4, 4, copy).unwrap();
        assert!(img.records().has_pending());
        img.apply(&mut driver).unwrap();
        assert_eq!(&driver.pixels(img.image_id()).unwrap()[0..4], &[0x42; 4]);
    }

    // ── save / restore ────────────────────────────────────────────────────

    #[test]
    fn save_then_restore_after_context_loss() {
        let mut driver = SoftwareDriver::default();
        let mut img = RestorableImage::new(&mut driver, 4, 4, RestorableKind::Regular).unwrap();
        solid_quad(&mut driver, &mut img, IRect::new(0, 0, 4, 4), [0.0, 1.0, 0.0, 1.0]);

        img.save(&mut driver).unwrap();
        driver.lose_context();
        img.restore(&mut driver).unwrap();

        let buf = read_all(&mut driver, &mut img);
        assert_eq!(&buf[0..4], &[0, 0xFF, 0, 0xFF]);
        img.apply(&mut driver).unwrap();
        assert_eq!(&driver.pixels(img.image_id()).unwrap()[0..4], &[0, 0xFF, 0, 0xFF]);
    }

    #[test]
    fn volatile_restores_cleared() {
        let mut driver = SoftwareDriver::default();
        let mut img = RestorableImage::new(&mut driver, 2, 2, RestorableKind::Volatile).unwrap();
        img.write_pixels(filled(16, 0x11), img.bounds()).unwrap();
        img.save(&mut driver).unwrap();
        img.restore(&mut driver).unwrap();
        assert!(read_all(&mut driver, &mut img).iter().all(|&b| b == 0));
    }
}
