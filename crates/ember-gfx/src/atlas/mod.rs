//! Atlas image layer.
//!
//! Logical [`Image`]s are packed onto a few large GPU backends. Images that
//! are mostly sampled live on *source* backends; images that are drawn into
//! live on *destination* backends or alone. Drawing into an image whose
//! backend is sampled in the same draw moves the image first (isolation), and
//! an image sampled unmodified for long enough moves back onto a source
//! backend (promotion).
//!
//! Threading:
//! - all placement happens inside a [`Frame`], which holds the registry lock
//!   from `begin_frame` to `end`
//! - dropping an [`Image`] or [`Shader`] only enqueues work; the queue is
//!   drained at the next `begin_frame`
//! - `queue_*` methods may be called from any thread, before the first frame
//!   included
//! - [`GpuResourcesState`] has its own lock

mod backend;
mod buffered;
mod deferred;
mod frame;
mod gpu_resources;
mod image;
mod registry;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::bytes::ManagedBytes;
use crate::config::AtlasConfig;
use crate::driver::GraphicsDriver;
use crate::error::{GfxError, GfxResult};
use crate::geom::IRect;

pub use backend::BackendId;
pub use frame::Frame;
pub use gpu_resources::{GpuResourcesPhase, GpuResourcesState};
pub use image::{DrawTrianglesArgs, Image, ImageKey, ImageKind, Shader, ShaderRef};

use buffered::DelayedCommands;
use deferred::{DeferredQueue, FrameOp};
use image::ImageInfo;
use registry::Registry;

/// Owner of every backend and the queues feeding them.
pub struct Atlas {
    registry: Mutex<Registry>,
    deferred: Arc<DeferredQueue>,
    delayed: DelayedCommands,
    gpu_resources: GpuResourcesState,
    next_key: AtomicU64,
}

impl Atlas {
    pub fn new(config: AtlasConfig) -> Self {
        Self {
            registry: Mutex::new(Registry::new(config)),
            deferred: Arc::new(DeferredQueue::default()),
            delayed: DelayedCommands::new(),
            gpu_resources: GpuResourcesState::new(),
            next_key: AtomicU64::new(1),
        }
    }

    /// Creates a logical image. GPU storage is assigned on first use.
    pub fn new_image(&self, width: u32, height: u32, kind: ImageKind) -> GfxResult<Image> {
        if width == 0 || height == 0 {
            return Err(GfxError::invalid_argument(format!(
                "image size {width}x{height} must be positive"
            )));
        }
        let key = ImageKey(self.next_key.fetch_add(1, Ordering::Relaxed));
        let info = ImageInfo {
            key,
            width,
            height,
            kind,
        };
        Ok(Image::new(info, self.deferred.clone()))
    }

    /// Wraps shader source for the driver in use. Compilation happens on the
    /// first draw.
    pub fn new_shader(&self, source: impl Into<String>) -> Shader {
        Shader::new(source.into(), self.deferred.clone())
    }

    /// Opens a frame.
    ///
    /// Runs, in order: first-frame initialization, a requested restore, the
    /// deferred queue, the pre-init queue (once), volatile clears and
    /// promotion.
    ///
    /// # Panics
    /// If another frame is still open.
    pub fn begin_frame<'a>(&'a self, driver: &'a mut dyn GraphicsDriver) -> GfxResult<Frame<'a>> {
        Frame::begin(self, driver)
    }

    pub fn gpu_resources(&self) -> &GpuResourcesState {
        &self.gpu_resources
    }

    /// Snapshot GPU content at the end of the next frame.
    pub fn request_save_gpu_resources(&self) -> bool {
        self.gpu_resources.request_save()
    }

    /// Rebuild GPU content at the start of the next frame.
    pub fn request_restore_gpu_resources(&self) -> bool {
        self.gpu_resources.request_restore()
    }

    fn enqueue(&self, op: FrameOp) {
        if let Err(op) = self.delayed.try_push(op) {
            self.deferred.push(op);
        }
    }

    /// [`Frame::write_pixels`] from outside a frame. `pix` is copied.
    ///
    /// The region is checked here, so a bad request fails at the call and
    /// never reaches the queue.
    pub fn queue_write_pixels(&self, img: &Image, pix: &[u8], region: IRect) -> GfxResult<()> {
        let shared = img.shared();
        Registry::check_region(shared.info, region, pix.len())?;
        let pix = ManagedBytes::copy_from(pix);
        self.enqueue(Box::new(move |registry, driver| {
            if shared.is_disposed() {
                return Ok(());
            }
            registry.write_pixels(driver, shared.info, &pix, region)
        }));
        Ok(())
    }

    /// [`Frame::clear_pixels`] from outside a frame.
    pub fn queue_clear_pixels(&self, img: &Image, region: IRect) -> GfxResult<()> {
        let shared = img.shared();
        Registry::check_region(shared.info, region, region.rgba_len())?;
        self.enqueue(Box::new(move |registry, _| {
            if shared.is_disposed() {
                return Ok(());
            }
            registry.clear_pixels(shared.info, region)
        }));
        Ok(())
    }

    /// [`Frame::draw_triangles`] from outside a frame. Buffers are copied.
    pub fn queue_draw_triangles(
        &self,
        dst: &Image,
        srcs: [Option<&Image>; 4],
        args: &DrawTrianglesArgs<'_>,
    ) -> GfxResult<()> {
        Registry::check_draw_args(args)?;
        let dst = dst.shared();
        let srcs = srcs.map(|s| s.map(Image::shared));
        if srcs.iter().flatten().any(|s| s.info.key == dst.info.key) {
            return Err(GfxError::invalid_argument("source must be different from the destination"));
        }
        let vertices = args.vertices.to_vec();
        let indices = args.indices.to_vec();
        let uniforms = args.uniforms.to_vec();
        let shader = args.shader.into_owned();
        let (blend, dst_region, src_regions, fill_rule) =
            (args.blend, args.dst_region, args.src_regions, args.fill_rule);

        self.enqueue(Box::new(move |registry, driver| {
            let disposed = dst.is_disposed() || srcs.iter().flatten().any(|s| s.is_disposed());
            if disposed {
                log::debug!("dropping a queued draw on a disposed image");
                return Ok(());
            }
            let args = DrawTrianglesArgs {
                vertices: &vertices,
                indices: &indices,
                blend,
                dst_region,
                src_regions,
                shader: shader.as_ref(),
                uniforms: &uniforms,
                fill_rule,
            };
            let src_infos = srcs.each_ref().map(|s| s.as_ref().map(|s| s.info));
            let args = args.with_default_src_regions(src_infos);
            registry.draw_triangles(driver, dst.info, src_infos, &args)
        }));
        Ok(())
    }

    /// [`Frame::deallocate`] from outside a frame.
    pub fn queue_deallocate(&self, img: &Image) {
        let key = img.key();
        self.enqueue(Box::new(move |registry, driver| {
            registry.deallocate(driver, key);
            Ok(())
        }));
    }
}

impl std::fmt::Debug for Atlas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Atlas")
            .field("deferred", &self.deferred)
            .field("delayed", &self.delayed)
            .field("gpu_resources", &self.gpu_resources.phase())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{QUAD_INDICES, SoftwareDriver, Vertex};
    use crate::shader::BuiltinShader;

    fn atlas() -> Atlas {
        Atlas::new(AtlasConfig::for_tests())
    }

    fn solid(v: u8, region: IRect) -> Vec<u8> {
        vec![v; region.rgba_len()]
    }

    fn copy_quad(w: f32, h: f32) -> Vec<f32> {
        let mut vs = Vec::new();
        for (x, y) in [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)] {
            Vertex::new([x, y], [x, y], [1.0; 4]).push_to(&mut vs);
        }
        vs
    }

    fn read(frame: &mut Frame<'_>, img: &Image) -> Vec<u8> {
        let mut buf = vec![0; img.bounds().rgba_len()];
        frame.read_pixels(img, &mut buf, img.bounds()).unwrap();
        buf
    }

    // ── placement ─────────────────────────────────────────────────────────

    #[test]
    fn images_are_placed_lazily() {
        let atlas = atlas();
        let mut driver = SoftwareDriver::default();
        let img = atlas.new_image(8, 8, ImageKind::Regular).unwrap();

        let mut frame = atlas.begin_frame(&mut driver).unwrap();
        assert_eq!(frame.backend_of(&img), None);
        assert_eq!(read(&mut frame, &img), vec![0; 256]);
        assert_eq!(frame.backend_count(), 0);

        frame.write_pixels(&img, &solid(1, img.bounds()), img.bounds()).unwrap();
        assert!(frame.is_on_source_backend(&img));
        assert!(frame.is_on_atlas(&img));
        frame.end().unwrap();
    }

    #[test]
    fn small_images_share_a_backend() {
        let atlas = atlas();
        let mut driver = SoftwareDriver::default();
        let a = atlas.new_image(8, 8, ImageKind::Regular).unwrap();
        let b = atlas.new_image(8, 8, ImageKind::Regular).unwrap();

        let mut frame = atlas.begin_frame(&mut driver).unwrap();
        frame.write_pixels(&a, &solid(1, a.bounds()), a.bounds()).unwrap();
        frame.write_pixels(&b, &solid(2, b.bounds()), b.bounds()).unwrap();
        assert_eq!(frame.backend_of(&a), frame.backend_of(&b));
        assert_eq!(read(&mut frame, &a), solid(1, a.bounds()));
        assert_eq!(read(&mut frame, &b), solid(2, b.bounds()));
        frame.end().unwrap();
    }

    #[test]
    fn unmanaged_and_screen_images_are_dedicated() {
        let atlas = atlas();
        let mut driver = SoftwareDriver::default();
        let u = atlas.new_image(8, 8, ImageKind::Unmanaged).unwrap();
        let s = atlas.new_image(8, 8, ImageKind::Screen).unwrap();

        let mut frame = atlas.begin_frame(&mut driver).unwrap();
        frame.write_pixels(&u, &solid(1, u.bounds()), u.bounds()).unwrap();
        frame.clear_pixels(&s, s.bounds()).unwrap();
        let src = atlas.new_image(4, 4, ImageKind::Regular).unwrap();
        frame.write_pixels(&src, &solid(9, src.bounds()), src.bounds()).unwrap();
        let vs = copy_quad(4.0, 4.0);
        frame
            .draw_triangles(
                &s,
                [Some(&src), None, None, None],
                &DrawTrianglesArgs::new(&vs, &QUAD_INDICES, s.bounds(), BuiltinShader::COPY),
            )
            .unwrap();

        assert!(!frame.is_on_atlas(&u));
        assert!(!frame.is_on_atlas(&s));
        assert!(!frame.is_on_source_backend(&s));
        // Dedicated backends are the image's exact size.
        assert_eq!(
            frame.total_gpu_image_memory_bytes(),
            2 * 4 * 8 * 8 + 4 * 256 * 256
        );
        frame.end().unwrap();
    }

    #[test]
    #[should_panic(expected = "exceeds the maximum size")]
    fn oversized_image_panics() {
        let atlas = atlas();
        let mut driver = SoftwareDriver::default();
        let img = atlas.new_image(5000, 1, ImageKind::Regular).unwrap();
        let mut frame = atlas.begin_frame(&mut driver).unwrap();
        let _ = frame.clear_pixels(&img, img.bounds());
        let _ = frame.write_pixels(&img, &[0; 4], IRect::new(0, 0, 1, 1));
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        let err = atlas().new_image(0, 4, ImageKind::Regular).unwrap_err();
        assert!(matches!(err, GfxError::InvalidArgument(_)));
    }

    // ── padding ───────────────────────────────────────────────────────────

    #[test]
    fn full_write_includes_transparent_border() {
        let atlas = atlas();
        let mut driver = SoftwareDriver::default();
        let img = atlas.new_image(2, 2, ImageKind::Regular).unwrap();

        let mut frame = atlas.begin_frame(&mut driver).unwrap();
        frame.write_pixels(&img, &solid(0x7F, img.bounds()), img.bounds()).unwrap();
        frame.end().unwrap();

        // The first allocation sits at the page origin: border at x/y = 0 and 3.
        let backend = driver.pixels(crate::driver::ImageId(1)).unwrap();
        let stride = 4 * 256;
        assert_eq!(&backend[0..4], &[0; 4]);
        assert_eq!(&backend[stride + 4..stride + 8], &[0x7F; 4]);
        assert_eq!(&backend[stride + 12..stride + 16], &[0; 4]);
    }

    // ── disposal ──────────────────────────────────────────────────────────

    #[test]
    fn dropped_image_releases_its_backend_next_frame() {
        let atlas = atlas();
        let mut driver = SoftwareDriver::default();
        let img = atlas.new_image(8, 8, ImageKind::Unmanaged).unwrap();

        let mut frame = atlas.begin_frame(&mut driver).unwrap();
        frame.write_pixels(&img, &solid(1, img.bounds()), img.bounds()).unwrap();
        drop(img);
        assert_eq!(frame.backend_count(), 1);
        frame.end().unwrap();

        let frame = atlas.begin_frame(&mut driver).unwrap();
        assert_eq!(frame.backend_count(), 0);
        frame.end().unwrap();
        assert_eq!(driver.image_count(), 0);
    }

    #[test]
    fn deallocate_clears_content() {
        let atlas = atlas();
        let mut driver = SoftwareDriver::default();
        let keep = atlas.new_image(4, 4, ImageKind::Regular).unwrap();
        let img = atlas.new_image(4, 4, ImageKind::Regular).unwrap();

        let mut frame = atlas.begin_frame(&mut driver).unwrap();
        frame.write_pixels(&keep, &solid(3, keep.bounds()), keep.bounds()).unwrap();
        frame.write_pixels(&img, &solid(5, img.bounds()), img.bounds()).unwrap();
        frame.deallocate(&img);
        assert_eq!(frame.backend_of(&img), None);
        assert_eq!(read(&mut frame, &img), vec![0; 64]);
        assert_eq!(read(&mut frame, &keep), solid(3, keep.bounds()));
        frame.end().unwrap();
    }

    #[test]
    #[should_panic(expected = "disposed image")]
    fn operations_on_disposed_image_panic() {
        let atlas = atlas();
        let mut driver = SoftwareDriver::default();
        let img = atlas.new_image(4, 4, ImageKind::Regular).unwrap();
        img.mark_disposed();
        let mut frame = atlas.begin_frame(&mut driver).unwrap();
        let _ = frame.clear_pixels(&img, img.bounds());
    }

    // ── queues ────────────────────────────────────────────────────────────

    #[test]
    fn writes_before_first_frame_are_buffered() {
        let atlas = atlas();
        let mut driver = SoftwareDriver::default();
        let img = atlas.new_image(4, 4, ImageKind::Regular).unwrap();
        atlas.queue_write_pixels(&img, &solid(0xAB, img.bounds()), img.bounds()).unwrap();
        assert_eq!(driver.image_count(), 0);

        let mut frame = atlas.begin_frame(&mut driver).unwrap();
        assert_eq!(read(&mut frame, &img), solid(0xAB, img.bounds()));
        frame.end().unwrap();
    }

    #[test]
    fn queued_ops_after_first_frame_run_next_frame() {
        let atlas = atlas();
        let mut driver = SoftwareDriver::default();
        let img = atlas.new_image(4, 4, ImageKind::Regular).unwrap();
        atlas.begin_frame(&mut driver).unwrap().end().unwrap();

        atlas.queue_write_pixels(&img, &solid(7, img.bounds()), img.bounds()).unwrap();
        atlas.queue_clear_pixels(&img, IRect::new(0, 0, 2, 4)).unwrap();

        let mut frame = atlas.begin_frame(&mut driver).unwrap();
        let buf = read(&mut frame, &img);
        assert_eq!(&buf[0..8], &[0; 8]);
        assert_eq!(&buf[8..16], &[7; 8]);
        frame.end().unwrap();
    }

    #[test]
    fn queued_draw_runs_at_next_frame() {
        let atlas = atlas();
        let mut driver = SoftwareDriver::default();
        let src = atlas.new_image(4, 4, ImageKind::Regular).unwrap();
        let dst = atlas.new_image(4, 4, ImageKind::Regular).unwrap();
        atlas.queue_write_pixels(&src, &solid(0x40, src.bounds()), src.bounds()).unwrap();
        let vs = copy_quad(4.0, 4.0);
        atlas.queue_draw_triangles(
            &dst,
            [Some(&src), None, None, None],
            &DrawTrianglesArgs::new(&vs, &QUAD_INDICES, dst.bounds(), BuiltinShader::COPY)
                .with_blend(crate::driver::Blend::COPY),
        )
        .unwrap();

        let mut frame = atlas.begin_frame(&mut driver).unwrap();
        assert_eq!(read(&mut frame, &dst), solid(0x40, dst.bounds()));
        frame.end().unwrap();
    }

    #[test]
    fn queued_requests_are_validated_at_the_call() {
        let atlas = atlas();
        let mut driver = SoftwareDriver::default();
        let img = atlas.new_image(4, 4, ImageKind::Regular).unwrap();
        atlas.begin_frame(&mut driver).unwrap().end().unwrap();

        let outside = IRect::new(2, 2, 6, 6);
        let err = atlas.queue_write_pixels(&img, &solid(1, outside), outside).unwrap_err();
        assert!(matches!(err, GfxError::InvalidArgument(_)));
        let err = atlas.queue_write_pixels(&img, &[0; 3], img.bounds()).unwrap_err();
        assert!(matches!(err, GfxError::InvalidArgument(_)));
        let err = atlas.queue_clear_pixels(&img, outside).unwrap_err();
        assert!(matches!(err, GfxError::InvalidArgument(_)));
        let err = atlas
            .queue_draw_triangles(
                &img,
                [None; 4],
                &DrawTrianglesArgs::new(&[0.0; 5], &[], img.bounds(), BuiltinShader::Solid),
            )
            .unwrap_err();
        assert!(matches!(err, GfxError::InvalidArgument(_)));
        assert_eq!(atlas.deferred.len(), 0);
    }

    #[test]
    fn failing_queued_op_does_not_skip_later_disposals() {
        let atlas = atlas();
        let mut driver = SoftwareDriver::default();
        let img = atlas.new_image(8, 8, ImageKind::Unmanaged).unwrap();

        let mut frame = atlas.begin_frame(&mut driver).unwrap();
        frame.write_pixels(&img, &solid(1, img.bounds()), img.bounds()).unwrap();
        frame.end().unwrap();
        assert_eq!(driver.image_count(), 1);

        atlas
            .deferred
            .push(Box::new(|_, _| Err(GfxError::invalid_argument("rejected"))));
        drop(img);

        let err = atlas.begin_frame(&mut driver).unwrap_err();
        assert!(matches!(err, GfxError::InvalidArgument(_)));
        assert_eq!(atlas.deferred.len(), 0);
        assert_eq!(driver.image_count(), 0);

        let frame = atlas.begin_frame(&mut driver).unwrap();
        assert_eq!(frame.backend_count(), 0);
        frame.end().unwrap();
    }

    #[test]
    #[should_panic(expected = "another frame is in progress")]
    fn nested_frames_panic() {
        let atlas = atlas();
        let mut d1 = SoftwareDriver::default();
        let mut d2 = SoftwareDriver::default();
        let _f = atlas.begin_frame(&mut d1).unwrap();
        let _ = atlas.begin_frame(&mut d2);
    }

    // ── save / restore ────────────────────────────────────────────────────

    #[test]
    fn content_survives_context_loss() {
        let atlas = atlas();
        let mut driver = SoftwareDriver::default();
        let src = atlas.new_image(4, 4, ImageKind::Regular).unwrap();
        let dst = atlas.new_image(4, 4, ImageKind::Regular).unwrap();
        let vs = copy_quad(4.0, 4.0);

        let mut frame = atlas.begin_frame(&mut driver).unwrap();
        frame.write_pixels(&src, &solid(0x22, src.bounds()), src.bounds()).unwrap();
        frame
            .draw_triangles(
                &dst,
                [Some(&src), None, None, None],
                &DrawTrianglesArgs::new(&vs, &QUAD_INDICES, dst.bounds(), BuiltinShader::COPY),
            )
            .unwrap();
        assert!(atlas.request_save_gpu_resources());
        frame.end().unwrap();
        assert!(atlas.gpu_resources().are_saved());

        driver.lose_context();
        assert!(atlas.request_restore_gpu_resources());

        let mut frame = atlas.begin_frame(&mut driver).unwrap();
        assert_eq!(read(&mut frame, &dst), solid(0x22, dst.bounds()));
        assert_eq!(read(&mut frame, &src), solid(0x22, src.bounds()));
        frame.end().unwrap();
        assert_eq!(atlas.gpu_resources().phase(), GpuResourcesPhase::None);
    }

    // ── sampling regions ──────────────────────────────────────────────────

    #[test]
    fn empty_src_region_means_whole_source_at_the_frame_only() {
        let atlas = atlas();
        let mut driver = SoftwareDriver::default();
        let src = atlas.new_image(4, 4, ImageKind::Regular).unwrap();
        let framed = atlas.new_image(4, 4, ImageKind::Regular).unwrap();
        let raw = atlas.new_image(4, 4, ImageKind::Regular).unwrap();
        let vs = copy_quad(4.0, 4.0);
        let clamp = BuiltinShader::Copy {
            filter: crate::shader::Filter::Nearest,
            address: crate::shader::Address::ClampToZero,
        };
        let args = DrawTrianglesArgs::new(&vs, &QUAD_INDICES, IRect::from_size(4, 4), clamp);

        let mut frame = atlas.begin_frame(&mut driver).unwrap();
        frame.write_pixels(&src, &solid(0x60, src.bounds()), src.bounds()).unwrap();
        frame
            .draw_triangles(&framed, [Some(&src), None, None, None], &args)
            .unwrap();
        assert_eq!(read(&mut frame, &framed), solid(0x60, framed.bounds()));
        frame.end().unwrap();

        // Below the frame an empty region is passed on as is, so clamping
        // leaves nothing to sample.
        let mut registry = atlas.registry.lock().unwrap();
        let srcs = [Some(src.live_info()), None, None, None];
        registry
            .draw_triangles(&mut driver, raw.live_info(), srcs, &args)
            .unwrap();
        let mut buf = vec![0xFF; 64];
        registry
            .read_pixels(&mut driver, raw.live_info(), &mut buf, raw.bounds())
            .unwrap();
        assert_eq!(buf, vec![0; 64]);
    }

    // ── frame end ─────────────────────────────────────────────────────────

    /// Software driver whose `end` always fails.
    #[derive(Default)]
    struct FailingEnd(SoftwareDriver);

    impl GraphicsDriver for FailingEnd {
        fn begin(&mut self) -> GfxResult<()> {
            self.0.begin()
        }
        fn end(&mut self, present: bool) -> GfxResult<()> {
            self.0.end(present)?;
            Err(GfxError::driver_failure("present failed"))
        }
        fn max_image_size(&self) -> u32 {
            self.0.max_image_size()
        }
        fn new_image(&mut self, width: u32, height: u32) -> GfxResult<crate::driver::ImageId> {
            self.0.new_image(width, height)
        }
        fn new_screen_framebuffer_image(&mut self, width: u32, height: u32) -> GfxResult<crate::driver::ImageId> {
            self.0.new_screen_framebuffer_image(width, height)
        }
        fn dispose_image(&mut self, id: crate::driver::ImageId) {
            self.0.dispose_image(id)
        }
        fn new_shader(&mut self, source: &str) -> GfxResult<crate::driver::ShaderId> {
            self.0.new_shader(source)
        }
        fn dispose_shader(&mut self, id: crate::driver::ShaderId) {
            self.0.dispose_shader(id)
        }
        fn write_pixels(&mut self, id: crate::driver::ImageId, pix: &[u8], region: IRect) -> GfxResult<()> {
            self.0.write_pixels(id, pix, region)
        }
        fn read_pixels(&mut self, id: crate::driver::ImageId, buf: &mut [u8], region: IRect) -> GfxResult<()> {
            self.0.read_pixels(id, buf, region)
        }
        fn set_vertices(&mut self, vertices: &[f32], indices: &[u32]) -> GfxResult<()> {
            self.0.set_vertices(vertices, indices)
        }
        fn draw_triangles(&mut self, cmd: &crate::driver::DrawTrianglesCommand<'_>) -> GfxResult<()> {
            self.0.draw_triangles(cmd)
        }
    }

    #[test]
    fn failed_driver_end_still_ends_the_registry_frame() {
        let atlas = atlas();
        let mut driver = FailingEnd::default();
        let img = atlas.new_image(8, 8, ImageKind::Regular).unwrap();

        // A whole-image write on a packed backend goes through scratch bytes.
        let mut frame = atlas.begin_frame(&mut driver).unwrap();
        frame.write_pixels(&img, &solid(1, img.bounds()), img.bounds()).unwrap();
        assert!(matches!(frame.end(), Err(GfxError::DriverFailure(_))));
        assert!(atlas.registry.lock().unwrap().temporary_capacity() > 0);

        // Sixty idle frames release the scratch buffer.
        for _ in 0..60 {
            let frame = atlas.begin_frame(&mut driver).unwrap();
            assert!(frame.end().is_err());
        }
        assert_eq!(atlas.registry.lock().unwrap().temporary_capacity(), 0);
    }
}
