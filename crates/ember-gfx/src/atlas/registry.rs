use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::bytes::{ManagedBytes, TemporaryBytes};
use crate::config::{AtlasConfig, floor_pow2};
use crate::driver::{
    Blend, FillRule, GraphicsDriver, ImageId, QUAD_INDICES, ShaderId, VERTEX_FLOAT_COUNT, Vertex,
};
use crate::error::{GfxError, GfxResult};
use crate::geom::IRect;
use crate::packing::{NodeId, Page};
use crate::restorable::{DrawParams, RestorableImage, RestorableKind};
use crate::shader::BuiltinShader;

use super::backend::{Backend, BackendId};
use super::image::{DrawTrianglesArgs, ImageInfo, ImageKey, ImageKind, ShaderRef};

/// Frames an unmodified image must be sampled before it moves to a source
/// backend, scaled by `2^min(destination_count, 31)`.
const BASE_COUNT_TO_PUT_ON_SOURCE_BACKEND: u64 = 10;

/// Transparent border around every packed regular image.
const PADDING: u32 = 1;

/// Where an image lives: its backend and, when packed, its page node.
type Placement = (BackendId, Option<NodeId>);

#[derive(Debug)]
struct ImageSlot {
    info: ImageInfo,
    backend: Option<BackendId>,
    node: Option<NodeId>,
    /// Consecutive frames used as a source without being modified.
    used_as_source_count: u64,
    /// Times the image was moved off a source backend to be drawn into.
    destination_count: u32,
}

impl ImageSlot {
    fn new(info: ImageInfo) -> Self {
        Self {
            info,
            backend: None,
            node: None,
            used_as_source_count: 0,
            destination_count: 0,
        }
    }
}

/// Every backend and every placed image. Guarded by the atlas lock for the
/// whole duration of a frame.
#[derive(Debug)]
pub(crate) struct Registry {
    config: AtlasConfig,
    /// Backend edge cap; 0 until the first frame.
    max_size: u32,

    backends: BTreeMap<BackendId, Backend>,
    next_backend: u32,

    slots: HashMap<ImageKey, ImageSlot>,
    images_to_promote: BTreeSet<ImageKey>,

    builtin_shaders: HashMap<BuiltinShader, ShaderId>,
    /// Bumped on restore; driver shaders from older generations are gone.
    shader_generation: u64,

    temp: TemporaryBytes,
}

impl Registry {
    pub fn new(config: AtlasConfig) -> Self {
        Self {
            config,
            max_size: 0,
            backends: BTreeMap::new(),
            next_backend: 0,
            slots: HashMap::new(),
            images_to_promote: BTreeSet::new(),
            builtin_shaders: HashMap::new(),
            shader_generation: 0,
            temp: TemporaryBytes::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.max_size != 0
    }

    /// Resolves the backend size cap from the driver. Runs once.
    pub fn initialize(&mut self, driver_max_image_size: u32) {
        assert!(
            self.backends.is_empty(),
            "no image may be placed before the first frame"
        );
        self.max_size = self
            .config
            .max_size
            .unwrap_or_else(|| floor_pow2(driver_max_image_size));
        log::debug!(
            "atlas initialized: max_size={} min_source={} min_destination={}",
            self.max_size,
            self.config.min_source_size,
            self.config.min_destination_size
        );
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    // ── slots ─────────────────────────────────────────────────────────────

    fn ensure_slot(&mut self, info: ImageInfo) {
        self.slots.entry(info.key).or_insert_with(|| ImageSlot::new(info));
    }

    fn slot(&self, key: ImageKey) -> &ImageSlot {
        self.slots.get(&key).expect("image is not registered")
    }

    fn slot_mut(&mut self, key: ImageKey) -> &mut ImageSlot {
        self.slots.get_mut(&key).expect("image is not registered")
    }

    fn backend(&self, id: BackendId) -> &Backend {
        self.backends.get(&id).expect("backend of a live image is registered")
    }

    fn backend_mut(&mut self, id: BackendId) -> &mut Backend {
        self.backends.get_mut(&id).expect("backend of a live image is registered")
    }

    fn can_be_put_on_atlas(&self, info: ImageInfo) -> bool {
        info.kind == ImageKind::Regular
            && info.width + 2 * PADDING <= self.max_size
            && info.height + 2 * PADDING <= self.max_size
    }

    /// Top-left pixel of the image content on its backend.
    fn placement_origin(&self, (backend, node): Placement) -> (i32, i32) {
        match node {
            Some(node) => {
                let page = self.backend(backend).page.as_ref().expect("packed backend has a page");
                let r = page.region(node);
                (r.min_x + PADDING as i32, r.min_y + PADDING as i32)
            }
            None => (0, 0),
        }
    }

    fn placement(&self, key: ImageKey) -> Option<Placement> {
        let slot = self.slot(key);
        slot.backend.map(|b| (b, slot.node))
    }

    /// Image content rectangle on its backend.
    fn content_rect(&self, key: ImageKey) -> IRect {
        let slot = self.slot(key);
        let placement = (slot.backend.expect("image is placed"), slot.node);
        let (x, y) = self.placement_origin(placement);
        IRect::from_xywh(x, y, slot.info.width as i32, slot.info.height as i32)
    }

    pub fn backend_of(&self, key: ImageKey) -> Option<BackendId> {
        self.slots.get(&key).and_then(|s| s.backend)
    }

    pub fn is_on_source_backend(&self, key: ImageKey) -> bool {
        self.backend_of(key)
            .is_some_and(|b| self.backend(b).source)
    }

    pub fn is_on_atlas(&self, key: ImageKey) -> bool {
        self.slots.get(&key).is_some_and(|s| s.node.is_some())
    }

    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    pub fn total_gpu_image_memory_bytes(&self) -> u64 {
        self.backends.values().map(|b| b.restorable.memory_bytes()).sum()
    }

    fn reset_used_as_source_count(&mut self, key: ImageKey) {
        self.slot_mut(key).used_as_source_count = 0;
        self.images_to_promote.remove(&key);
    }

    fn sources_in_this_frame(&self) -> Vec<BackendId> {
        self.backends
            .iter()
            .filter(|(_, b)| b.source_in_this_frame)
            .map(|(&id, _)| id)
            .collect()
    }

    // ── shaders ───────────────────────────────────────────────────────────

    pub fn shader_id(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        shader: ShaderRef<'_>,
    ) -> GfxResult<ShaderId> {
        match shader {
            ShaderRef::Builtin(builtin) => {
                if let Some(&id) = self.builtin_shaders.get(&builtin) {
                    return Ok(id);
                }
                let id = driver.new_shader(builtin.source())?;
                log::debug!("built-in shader {builtin:?} -> {id:?}");
                self.builtin_shaders.insert(builtin, id);
                Ok(id)
            }
            ShaderRef::Custom(custom) => custom
                .shared()
                .ensure(self.shader_generation, |src| driver.new_shader(src)),
        }
    }

    pub fn dispose_shader(&mut self, generation: u64, id: ShaderId, driver: &mut dyn GraphicsDriver) {
        if generation == self.shader_generation {
            driver.dispose_shader(id);
        }
    }

    // ── placement ─────────────────────────────────────────────────────────

    fn insert_backend(&mut self, backend: Backend) -> BackendId {
        let id = BackendId(self.next_backend);
        self.next_backend += 1;
        log::debug!(
            "backend {id:?} created: {}x{} source={} packed={}",
            backend.restorable.width(),
            backend.restorable.height(),
            backend.source,
            backend.page.is_some()
        );
        self.backends.insert(id, backend);
        id
    }

    /// Finds or creates room for an image without touching its slot.
    ///
    /// # Panics
    /// If the image cannot fit in `max_size`, or a screen image is requested
    /// as a source.
    fn place(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        info: ImageInfo,
        forbidden: &[BackendId],
        as_source: bool,
    ) -> GfxResult<Placement> {
        assert!(self.is_initialized(), "images cannot be placed before the first frame");
        let (w, h) = (info.width, info.height);

        if info.kind == ImageKind::Screen {
            assert!(!as_source, "a screen image cannot be a source");
            let restorable = RestorableImage::new(driver, w, h, RestorableKind::Screen)?;
            return Ok((self.insert_backend(Backend::new(restorable, None, false)), None));
        }

        if !self.can_be_put_on_atlas(info) {
            assert!(
                w <= self.max_size && h <= self.max_size,
                "image {w}x{h} exceeds the maximum size {}",
                self.max_size
            );
            let kind = if info.kind == ImageKind::Volatile {
                RestorableKind::Volatile
            } else {
                RestorableKind::Regular
            };
            let restorable = RestorableImage::new(driver, w, h, kind)?;
            let source = as_source && kind == RestorableKind::Regular;
            return Ok((self.insert_backend(Backend::new(restorable, None, source)), None));
        }

        let (wp, hp) = (w + 2 * PADDING, h + 2 * PADDING);
        let copy = self.shader_id(driver, ShaderRef::Builtin(BuiltinShader::COPY))?;
        let candidates: Vec<BackendId> = self
            .backends
            .iter()
            .filter(|(id, b)| b.source == as_source && !b.is_dedicated() && !forbidden.contains(id))
            .map(|(&id, _)| id)
            .collect();
        for id in candidates {
            if let Some(node) = self.backend_mut(id).try_alloc(driver, wp, hp, copy)? {
                return Ok((id, Some(node)));
            }
        }

        let start = if as_source {
            self.config.min_source_size
        } else {
            self.config.min_destination_size
        };
        let fit = |needed: u32| {
            let mut size = start.min(self.max_size);
            while needed > size {
                assert!(
                    size < self.max_size,
                    "image {w}x{h} exceeds the maximum size {}",
                    self.max_size
                );
                size = (size * 2).min(self.max_size);
            }
            size
        };
        let (pw, ph) = (fit(wp), fit(hp));

        let restorable = RestorableImage::new(driver, pw, ph, RestorableKind::Regular)?;
        let mut page = Page::new(pw, ph, self.max_size);
        let node = page
            .alloc(wp, hp)
            .expect("a fresh page sized for the image must fit it");
        let id = self.insert_backend(Backend::new(restorable, Some(page), as_source));
        Ok((id, Some(node)))
    }

    fn allocate(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        key: ImageKey,
        forbidden: &[BackendId],
        as_source: bool,
    ) -> GfxResult<()> {
        let slot = self.slot(key);
        assert!(slot.backend.is_none(), "image is already allocated");
        let info = slot.info;
        let (backend, node) = self.place(driver, info, forbidden, as_source)?;
        let slot = self.slot_mut(key);
        slot.backend = Some(backend);
        slot.node = node;
        Ok(())
    }

    /// Gives a placement back. A packed region is cleared; an emptied or
    /// dedicated backend is destroyed.
    fn release(&mut self, driver: &mut dyn GraphicsDriver, (id, node): Placement) {
        let backend = self.backend_mut(id);
        if let Some(node) = node {
            let page = backend.page.as_mut().expect("packed backend has a page");
            let region = page.region(node);
            page.free(node);
            if !page.is_empty() {
                if let Err(err) = backend.restorable.clear_pixels(region) {
                    log::warn!("clearing a released region failed: {err}");
                }
                return;
            }
        }
        backend.restorable.dispose(driver);
        self.backends.remove(&id);
        log::debug!("backend {id:?} released");
    }

    /// Copies an image's pixels between placements with a nearest copy.
    fn copy_content(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        info: ImageInfo,
        from: Placement,
        to: Placement,
    ) -> GfxResult<()> {
        let copy = self.shader_id(driver, ShaderRef::Builtin(BuiltinShader::COPY))?;
        let (sx, sy) = self.placement_origin(from);
        let (dx, dy) = self.placement_origin(to);
        let (w, h) = (info.width as i32, info.height as i32);

        let src = &mut self.backend_mut(from.0).restorable;
        src.apply(driver)?;
        let src_id = src.image_id();

        let mut vertices = Vec::with_capacity(4 * VERTEX_FLOAT_COUNT);
        for (x, y) in [(0, 0), (w, 0), (0, h), (w, h)] {
            Vertex::new(
                [(dx + x) as f32, (dy + y) as f32],
                [(sx + x) as f32, (sy + y) as f32],
                [1.0; 4],
            )
            .push_to(&mut vertices);
        }
        let src_region = IRect::from_xywh(sx, sy, w, h);
        self.backend_mut(to.0).restorable.draw_triangles(
            driver,
            &DrawParams {
                srcs: [Some(src_id), None, None, None],
                offsets: [[0.0; 2]; 3],
                vertices: &vertices,
                indices: &QUAD_INDICES,
                blend: Blend::COPY,
                dst_region: IRect::from_xywh(dx, dy, w, h),
                src_regions: [src_region, IRect::default(), IRect::default(), IRect::default()],
                shader: copy,
                uniforms: &[],
                fill_rule: FillRule::FillAll,
            },
        )
    }

    /// Moves an image to a new placement, keeping its pixels.
    fn relocate(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        key: ImageKey,
        forbidden: &[BackendId],
        as_source: bool,
    ) -> GfxResult<()> {
        let info = self.slot(key).info;
        let old = self.placement(key).expect("only placed images are relocated");
        let new = self.place(driver, info, forbidden, as_source)?;
        self.copy_content(driver, info, old, new)?;
        self.release(driver, old);
        let slot = self.slot_mut(key);
        slot.backend = Some(new.0);
        slot.node = new.1;
        Ok(())
    }

    /// Makes `key` safe to draw into while `forbidden` backends are sampled.
    fn ensure_isolated_from_source(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        key: ImageKey,
        forbidden: &[BackendId],
    ) -> GfxResult<()> {
        self.reset_used_as_source_count(key);

        let Some((backend, node)) = self.placement(key) else {
            let sources = self.sources_in_this_frame();
            return self.allocate(driver, key, &sources, false);
        };
        if node.is_none() || !forbidden.contains(&backend) {
            return Ok(());
        }

        let mut avoid = vec![backend];
        avoid.extend(self.sources_in_this_frame());
        self.relocate(driver, key, &avoid, false)?;

        let slot = self.slot_mut(key);
        slot.destination_count = slot.destination_count.saturating_add(1);
        log::debug!(
            "image {key:?} isolated from {backend:?} (destination_count={})",
            slot.destination_count
        );
        Ok(())
    }

    fn put_on_source_backend(&mut self, driver: &mut dyn GraphicsDriver, key: ImageKey) -> GfxResult<()> {
        let Some((backend, _)) = self.placement(key) else {
            return self.allocate(driver, key, &[], true);
        };
        if self.backend(backend).source || !self.can_be_put_on_atlas(self.slot(key).info) {
            return Ok(());
        }
        self.relocate(driver, key, &[], true)?;
        log::debug!("image {key:?} promoted to a source backend");
        Ok(())
    }

    /// Advances the per-image source counters and promotes images that were
    /// sampled long enough without being modified.
    pub fn put_images_on_source_backend(&mut self, driver: &mut dyn GraphicsDriver) -> GfxResult<()> {
        let keys = std::mem::take(&mut self.images_to_promote);
        for key in keys {
            let Some(slot) = self.slots.get_mut(&key) else {
                continue;
            };
            if slot.backend.is_none() {
                slot.used_as_source_count = 0;
                continue;
            }
            slot.used_as_source_count = slot.used_as_source_count.saturating_add(1);
            let threshold = BASE_COUNT_TO_PUT_ON_SOURCE_BACKEND << slot.destination_count.min(31);
            if slot.used_as_source_count >= threshold {
                self.put_on_source_backend(driver, key)?;
                self.slot_mut(key).used_as_source_count = 0;
            }
        }
        Ok(())
    }

    // ── pixel operations ──────────────────────────────────────────────────

    pub fn check_region(info: ImageInfo, region: IRect, len: usize) -> GfxResult<()> {
        let bounds = IRect::from_size(info.width as i32, info.height as i32);
        if !region.is_in(bounds) {
            return Err(GfxError::invalid_argument(format!(
                "region {region:?} is outside the {}x{} image",
                info.width, info.height
            )));
        }
        if len != region.rgba_len() {
            return Err(GfxError::invalid_argument(format!(
                "pixel buffer is {len} bytes but region {region:?} needs {}",
                region.rgba_len()
            )));
        }
        Ok(())
    }

    pub fn check_draw_args(args: &DrawTrianglesArgs<'_>) -> GfxResult<()> {
        if args.vertices.len() % VERTEX_FLOAT_COUNT != 0 {
            return Err(GfxError::invalid_argument(format!(
                "vertex buffer length {} is not a multiple of {VERTEX_FLOAT_COUNT}",
                args.vertices.len()
            )));
        }
        Ok(())
    }

    pub fn write_pixels(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        info: ImageInfo,
        pix: &[u8],
        region: IRect,
    ) -> GfxResult<()> {
        Self::check_region(info, region, pix.len())?;
        if region.is_empty() {
            log::warn!("ignoring empty pixel write on {:?}", info.key);
            return Ok(());
        }
        self.ensure_slot(info);
        self.reset_used_as_source_count(info.key);
        if self.backend_of(info.key).is_none() {
            self.allocate(driver, info.key, &[], true)?;
        }

        let (backend, node) = self.placement(info.key).expect("allocated above");
        let full = IRect::from_size(info.width as i32, info.height as i32);
        if let (Some(node), true) = (node, region == full) {
            // Whole-image write on a packed backend: write the border too so
            // filtering never picks up a previous occupant's pixels.
            let padded = self
                .backend(backend)
                .page
                .as_ref()
                .expect("packed backend has a page")
                .region(node);
            let stride = 4 * padded.dx() as usize;
            let row = 4 * info.width as usize;
            let block = self.temp.alloc(padded.rgba_len());
            for (j, src) in pix.chunks_exact(row).enumerate() {
                let at = (j + PADDING as usize) * stride + 4 * PADDING as usize;
                block[at..at + row].copy_from_slice(src);
            }
            let bytes = ManagedBytes::copy_from(block);
            return self.backend_mut(backend).restorable.write_pixels(bytes, padded);
        }

        let (x, y) = self.placement_origin((backend, node));
        let bytes = ManagedBytes::copy_from(pix);
        self.backend_mut(backend)
            .restorable
            .write_pixels(bytes, region.translate(x, y))
    }

    pub fn clear_pixels(&mut self, info: ImageInfo, region: IRect) -> GfxResult<()> {
        Self::check_region(info, region, region.rgba_len())?;
        self.ensure_slot(info);
        self.reset_used_as_source_count(info.key);
        let Some(placement) = self.placement(info.key) else {
            // Never placed: already transparent.
            return Ok(());
        };
        let (x, y) = self.placement_origin(placement);
        self.backend_mut(placement.0)
            .restorable
            .clear_pixels(region.translate(x, y))
    }

    pub fn read_pixels(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        info: ImageInfo,
        buf: &mut [u8],
        region: IRect,
    ) -> GfxResult<()> {
        Self::check_region(info, region, buf.len())?;
        let Some(placement) = self.slots.get(&info.key).and_then(|_| self.placement(info.key)) else {
            buf.fill(0);
            return Ok(());
        };
        let (x, y) = self.placement_origin(placement);
        self.backend_mut(placement.0)
            .restorable
            .read_pixels(driver, buf, region.translate(x, y))
    }

    pub fn draw_triangles(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        dst: ImageInfo,
        srcs: [Option<ImageInfo>; 4],
        args: &DrawTrianglesArgs<'_>,
    ) -> GfxResult<()> {
        Self::check_draw_args(args)?;
        if srcs.iter().flatten().any(|s| s.key == dst.key) {
            panic!("source must be different from the destination");
        }

        self.ensure_slot(dst);
        let mut src_backends = Vec::with_capacity(srcs.len());
        for src in srcs.iter().flatten() {
            self.ensure_slot(*src);
            if self.backend_of(src.key).is_none() {
                self.allocate(driver, src.key, &[], true)?;
            }
            let b = self.backend_of(src.key).expect("allocated above");
            self.backend_mut(b).source_in_this_frame = true;
            src_backends.push(b);
        }

        self.ensure_isolated_from_source(driver, dst.key, &src_backends)?;
        let dst_backend = self.backend_of(dst.key).expect("isolation places the image");
        assert!(
            !src_backends.contains(&dst_backend),
            "source must be different from the destination"
        );

        let dst_rect = self.content_rect(dst.key);
        let (dx, dy) = (dst_rect.min_x as f32, dst_rect.min_y as f32);
        let src_rects = srcs.map(|s| s.map(|s| self.content_rect(s.key)));
        let (sx, sy) = src_rects[0].map_or((0.0, 0.0), |r| (r.min_x as f32, r.min_y as f32));

        let mut vertices = args.vertices.to_vec();
        for v in vertices.chunks_exact_mut(VERTEX_FLOAT_COUNT) {
            v[0] += dx;
            v[1] += dy;
            v[2] += sx;
            v[3] += sy;
        }

        let mut offsets = [[0.0; 2]; 3];
        for (offset, rect) in offsets.iter_mut().zip(&src_rects[1..]) {
            if let Some(r) = rect {
                *offset = [r.min_x as f32 - sx, r.min_y as f32 - sy];
            }
        }

        let mut src_regions = [IRect::default(); 4];
        for (i, rect) in src_rects.iter().enumerate() {
            let Some(rect) = *rect else { continue };
            let requested = args.src_regions[i];
            // An empty region stays empty.
            if !requested.is_empty() {
                src_regions[i] = requested.translate(rect.min_x, rect.min_y).intersect(rect);
            }
        }

        let mut src_ids: [Option<ImageId>; 4] = [None; 4];
        for (slot, src) in src_ids.iter_mut().zip(&srcs) {
            let Some(src) = src else { continue };
            let b = self.backend_of(src.key).expect("sources are placed");
            let restorable = &mut self.backend_mut(b).restorable;
            restorable.apply(driver)?;
            *slot = Some(restorable.image_id());

            if !self.backend(b).source && self.can_be_put_on_atlas(*src) {
                self.images_to_promote.insert(src.key);
            }
        }

        let shader = self.shader_id(driver, args.shader)?;
        let dst_region = args
            .dst_region
            .translate(dst_rect.min_x, dst_rect.min_y)
            .intersect(dst_rect);

        self.backend_mut(dst_backend).restorable.draw_triangles(
            driver,
            &DrawParams {
                srcs: src_ids,
                offsets,
                vertices: &vertices,
                indices: args.indices,
                blend: args.blend,
                dst_region,
                src_regions,
                shader,
                uniforms: args.uniforms,
                fill_rule: args.fill_rule,
            },
        )
    }

    /// Returns an image to the unplaced state. Its content becomes transparent.
    pub fn deallocate(&mut self, driver: &mut dyn GraphicsDriver, key: ImageKey) {
        let Some(slot) = self.slots.get_mut(&key) else {
            return;
        };
        slot.used_as_source_count = 0;
        slot.destination_count = 0;
        let placement = slot.backend.take().map(|b| (b, slot.node.take()));
        self.images_to_promote.remove(&key);
        if let Some(placement) = placement {
            self.release(driver, placement);
        }
    }

    /// Releases everything an image holds and forgets it.
    pub fn dispose(&mut self, key: ImageKey, driver: &mut dyn GraphicsDriver) {
        self.deallocate(driver, key);
        self.slots.remove(&key);
    }

    // ── frame boundaries ──────────────────────────────────────────────────

    pub fn clear_volatile_images(&mut self) {
        for backend in self.backends.values_mut() {
            if backend.restorable.kind() == RestorableKind::Volatile {
                backend.restorable.clear_all();
            }
        }
    }

    pub fn apply_all(&mut self, driver: &mut dyn GraphicsDriver) -> GfxResult<()> {
        for backend in self.backends.values_mut() {
            backend.restorable.apply(driver)?;
        }
        Ok(())
    }

    pub fn reset_source_flags(&mut self) {
        for backend in self.backends.values_mut() {
            backend.source_in_this_frame = false;
        }
    }

    pub fn save_all(&mut self, driver: &mut dyn GraphicsDriver) -> GfxResult<()> {
        log::debug!("saving {} backends", self.backends.len());
        for backend in self.backends.values_mut() {
            backend.restorable.save(driver)?;
        }
        Ok(())
    }

    pub fn restore_all(&mut self, driver: &mut dyn GraphicsDriver) -> GfxResult<()> {
        log::debug!("restoring {} backends", self.backends.len());
        self.builtin_shaders.clear();
        self.shader_generation += 1;
        for backend in self.backends.values_mut() {
            backend.restorable.restore(driver)?;
        }
        Ok(())
    }

    pub fn end_frame(&mut self) {
        self.temp.end_frame();
    }

    /// Capacity of the per-frame scratch ring.
    pub fn temporary_capacity(&self) -> usize {
        self.temp.capacity()
    }
}
