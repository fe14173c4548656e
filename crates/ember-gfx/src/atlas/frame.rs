use std::sync::{MutexGuard, TryLockError};

use crate::driver::GraphicsDriver;
use crate::error::GfxResult;
use crate::geom::IRect;

use super::Atlas;
use super::backend::BackendId;
use super::deferred::run_all;
use super::image::{DrawTrianglesArgs, Image};
use super::registry::Registry;

/// An open frame: exclusive access to the atlas registry and the driver.
///
/// Every image mutation happens through a `Frame`. Call [`Frame::end`] to
/// flush pending writes and finish the frame.
pub struct Frame<'a> {
    atlas: &'a Atlas,
    registry: MutexGuard<'a, Registry>,
    driver: &'a mut dyn GraphicsDriver,
    ended: bool,
}

impl<'a> Frame<'a> {
    pub(super) fn begin(atlas: &'a Atlas, driver: &'a mut dyn GraphicsDriver) -> GfxResult<Self> {
        let registry = match atlas.registry.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                panic!("begin_frame called while another frame is in progress")
            }
        };
        let mut frame = Self {
            atlas,
            registry,
            driver,
            ended: false,
        };

        let registry = &mut *frame.registry;
        if !registry.is_initialized() {
            registry.initialize(frame.driver.max_image_size());
        }
        frame.driver.begin()?;

        if atlas.gpu_resources.start_restoring_if_needed() {
            registry.restore_all(frame.driver)?;
        }
        atlas.deferred.drain(registry, frame.driver)?;
        if let Some(commands) = atlas.delayed.take() {
            log::debug!("flushing {} commands queued before the first frame", commands.len());
            run_all(commands, registry, frame.driver)?;
        }
        registry.clear_volatile_images();
        registry.put_images_on_source_backend(frame.driver)?;
        Ok(frame)
    }

    /// Writes `pix` (premultiplied RGBA8) into `region` of `img`.
    ///
    /// # Panics
    /// If `img` was disposed.
    pub fn write_pixels(&mut self, img: &Image, pix: &[u8], region: IRect) -> GfxResult<()> {
        self.registry.write_pixels(self.driver, img.live_info(), pix, region)
    }

    pub fn clear_pixels(&mut self, img: &Image, region: IRect) -> GfxResult<()> {
        self.registry.clear_pixels(img.live_info(), region)
    }

    /// Reads `region` of `img` into `buf`.
    pub fn read_pixels(&mut self, img: &Image, buf: &mut [u8], region: IRect) -> GfxResult<()> {
        self.registry.read_pixels(self.driver, img.live_info(), buf, region)
    }

    /// Draws triangles into `dst`, sampling up to four sources.
    ///
    /// # Panics
    /// If any image was disposed or a source is `dst` itself.
    pub fn draw_triangles(
        &mut self,
        dst: &Image,
        srcs: [Option<&Image>; 4],
        args: &DrawTrianglesArgs<'_>,
    ) -> GfxResult<()> {
        let srcs = srcs.map(|s| s.map(Image::live_info));
        let args = args.with_default_src_regions(srcs);
        self.registry.draw_triangles(self.driver, dst.live_info(), srcs, &args)
    }

    /// Gives the image's storage back; its content becomes transparent.
    pub fn deallocate(&mut self, img: &Image) {
        self.registry.deallocate(self.driver, img.live_info().key);
    }

    pub fn is_on_source_backend(&self, img: &Image) -> bool {
        self.registry.is_on_source_backend(img.key())
    }

    /// Whether the image shares a packed backend.
    pub fn is_on_atlas(&self, img: &Image) -> bool {
        self.registry.is_on_atlas(img.key())
    }

    pub fn backend_of(&self, img: &Image) -> Option<BackendId> {
        self.registry.backend_of(img.key())
    }

    pub fn backend_count(&self) -> usize {
        self.registry.backend_count()
    }

    /// Sum of `4 * w * h` over every backend.
    pub fn total_gpu_image_memory_bytes(&self) -> u64 {
        self.registry.total_gpu_image_memory_bytes()
    }

    /// Largest backend edge.
    pub fn max_image_size(&self) -> u32 {
        self.registry.max_size()
    }

    /// The atlas this frame belongs to, for creating images mid-frame.
    pub fn atlas(&self) -> &'a Atlas {
        self.atlas
    }

    /// Flushes pending writes, takes a requested snapshot and ends the
    /// driver frame.
    pub fn end(mut self) -> GfxResult<()> {
        self.ended = true;
        let atlas = self.atlas;
        let registry = &mut *self.registry;

        let mut result = registry.apply_all(self.driver);
        registry.reset_source_flags();
        if result.is_ok() && atlas.gpu_resources.is_saving_requested() {
            result = registry.save_all(self.driver);
            if result.is_ok() {
                atlas.gpu_resources.finish_save();
            }
        }
        let ended = self.driver.end(true);
        // The frame is over for the registry even when the driver failed.
        registry.end_frame();
        result.and(ended)
    }
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        if !self.ended && !std::thread::panicking() {
            log::warn!("frame dropped without end(); pending writes stay queued");
        }
    }
}

impl std::fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("backends", &self.registry.backend_count())
            .finish()
    }
}
