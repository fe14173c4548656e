use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::driver::{Blend, FillRule, ShaderId};
use crate::geom::IRect;
use crate::shader::BuiltinShader;

use super::deferred::DeferredQueue;

/// How an image is placed on GPU backends.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ImageKind {
    /// May share a packed backend with other images (1 px transparent border).
    Regular,
    /// The screen framebuffer. Always alone; never a source.
    Screen,
    /// Cleared at the start of every frame. Never packed.
    Volatile,
    /// Gets a dedicated backend of its exact size.
    Unmanaged,
}

/// Registry key of an [`Image`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageKey(pub(crate) u64);

/// Immutable description of an image.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct ImageInfo {
    pub key: ImageKey,
    pub width: u32,
    pub height: u32,
    pub kind: ImageKind,
}

pub(crate) struct ImageShared {
    pub info: ImageInfo,
    disposed: AtomicBool,
    deferred: Arc<DeferredQueue>,
}

impl ImageShared {
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn mark_disposed(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let key = self.info.key;
        self.deferred.push(Box::new(move |registry, driver| {
            registry.dispose(key, driver);
            Ok(())
        }));
    }
}

/// Handle to a logical image managed by an [`super::Atlas`].
///
/// The image gets GPU storage lazily, on its first write or draw. Dropping the
/// handle schedules its storage for release at the next frame boundary; no GPU
/// call happens in `drop`.
pub struct Image {
    shared: Arc<ImageShared>,
}

impl Image {
    pub(crate) fn new(info: ImageInfo, deferred: Arc<DeferredQueue>) -> Self {
        Self {
            shared: Arc::new(ImageShared {
                info,
                disposed: AtomicBool::new(false),
                deferred,
            }),
        }
    }

    pub fn width(&self) -> u32 {
        self.shared.info.width
    }

    pub fn height(&self) -> u32 {
        self.shared.info.height
    }

    pub fn kind(&self) -> ImageKind {
        self.shared.info.kind
    }

    pub fn key(&self) -> ImageKey {
        self.shared.info.key
    }

    pub fn bounds(&self) -> IRect {
        IRect::from_size(self.width() as i32, self.height() as i32)
    }

    /// Schedules the image's GPU storage for release. Safe from any thread;
    /// further calls do nothing.
    ///
    /// Any frame operation on a disposed image panics.
    pub fn mark_disposed(&self) {
        self.shared.mark_disposed();
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }

    /// Description of a live image.
    ///
    /// # Panics
    /// If the image was disposed.
    pub(crate) fn live_info(&self) -> ImageInfo {
        assert!(!self.is_disposed(), "operation on a disposed image");
        self.shared.info
    }

    pub(crate) fn shared(&self) -> Arc<ImageShared> {
        self.shared.clone()
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        self.shared.mark_disposed();
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("key", &self.shared.info.key)
            .field("size", &(self.width(), self.height()))
            .field("kind", &self.kind())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ── shaders ─────────────────────────────────────────────────────────────

pub(crate) struct ShaderShared {
    source: String,
    /// Driver shader and the context generation it was built in.
    compiled: Mutex<Option<(u64, ShaderId)>>,
    deferred: Arc<DeferredQueue>,
}

impl ShaderShared {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Driver id for `generation`, building it with `build` if needed.
    pub fn ensure<E>(
        &self,
        generation: u64,
        build: impl FnOnce(&str) -> Result<ShaderId, E>,
    ) -> Result<ShaderId, E> {
        let mut compiled = self.compiled.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((g, id)) = *compiled {
            if g == generation {
                return Ok(id);
            }
        }
        let id = build(&self.source)?;
        *compiled = Some((generation, id));
        Ok(id)
    }
}

impl Drop for ShaderShared {
    fn drop(&mut self) {
        let compiled = self.compiled.get_mut().unwrap_or_else(|e| e.into_inner()).take();
        if let Some((generation, id)) = compiled {
            self.deferred.push(Box::new(move |registry, driver| {
                registry.dispose_shader(generation, id, driver);
                Ok(())
            }));
        }
    }
}

/// Reference-counted custom shader.
///
/// The driver shader is built on first use and released at the frame
/// boundary after the last clone is dropped.
#[derive(Clone)]
pub struct Shader {
    shared: Arc<ShaderShared>,
}

impl Shader {
    pub(crate) fn new(source: String, deferred: Arc<DeferredQueue>) -> Self {
        Self {
            shared: Arc::new(ShaderShared {
                source,
                compiled: Mutex::new(None),
                deferred,
            }),
        }
    }

    pub fn source(&self) -> &str {
        self.shared.source()
    }

    pub(crate) fn shared(&self) -> &ShaderShared {
        &self.shared
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("source_len", &self.shared.source.len())
            .finish()
    }
}

/// Shader selection for a draw.
#[derive(Debug, Copy, Clone)]
pub enum ShaderRef<'a> {
    Builtin(BuiltinShader),
    Custom(&'a Shader),
}

impl<'a> ShaderRef<'a> {
    pub(crate) fn into_owned(self) -> OwnedShader {
        match self {
            ShaderRef::Builtin(b) => OwnedShader::Builtin(b),
            ShaderRef::Custom(s) => OwnedShader::Custom(s.clone()),
        }
    }
}

impl From<BuiltinShader> for ShaderRef<'_> {
    fn from(b: BuiltinShader) -> Self {
        ShaderRef::Builtin(b)
    }
}

impl<'a> From<&'a Shader> for ShaderRef<'a> {
    fn from(s: &'a Shader) -> Self {
        ShaderRef::Custom(s)
    }
}

/// `ShaderRef` that can cross into a queued operation.
#[derive(Debug, Clone)]
pub(crate) enum OwnedShader {
    Builtin(BuiltinShader),
    Custom(Shader),
}

impl OwnedShader {
    pub fn as_ref(&self) -> ShaderRef<'_> {
        match self {
            OwnedShader::Builtin(b) => ShaderRef::Builtin(*b),
            OwnedShader::Custom(s) => ShaderRef::Custom(s),
        }
    }
}

// ── draw arguments ──────────────────────────────────────────────────────

/// Parameters of an atlas-level draw.
///
/// Vertex positions, `dst_region` and `src_regions` are in the logical
/// image's own pixels; the atlas translates them onto backends.
#[derive(Debug, Clone)]
pub struct DrawTrianglesArgs<'a> {
    pub vertices: &'a [f32],
    pub indices: &'a [u32],
    pub blend: Blend,
    pub dst_region: IRect,
    /// Sampling bounds per source. [`super::Frame::draw_triangles`] reads an
    /// empty region as the whole source image.
    pub src_regions: [IRect; 4],
    pub shader: ShaderRef<'a>,
    pub uniforms: &'a [u32],
    pub fill_rule: FillRule,
}

impl<'a> DrawTrianglesArgs<'a> {
    /// Source-over draw with no uniforms and no stencil.
    pub fn new(
        vertices: &'a [f32],
        indices: &'a [u32],
        dst_region: IRect,
        shader: impl Into<ShaderRef<'a>>,
    ) -> Self {
        Self {
            vertices,
            indices,
            blend: Blend::SOURCE_OVER,
            dst_region,
            src_regions: [IRect::default(); 4],
            shader: shader.into(),
            uniforms: &[],
            fill_rule: FillRule::FillAll,
        }
    }

    pub fn with_blend(mut self, blend: Blend) -> Self {
        self.blend = blend;
        self
    }

    pub fn with_src_region(mut self, index: usize, region: IRect) -> Self {
        self.src_regions[index] = region;
        self
    }

    pub fn with_uniforms(mut self, uniforms: &'a [u32]) -> Self {
        self.uniforms = uniforms;
        self
    }

    pub fn with_fill_rule(mut self, fill_rule: FillRule) -> Self {
        self.fill_rule = fill_rule;
        self
    }

    /// Copy with every empty region of a present source widened to that
    /// source's bounds.
    pub(crate) fn with_default_src_regions(&self, srcs: [Option<ImageInfo>; 4]) -> Self {
        let mut args = self.clone();
        for (region, src) in args.src_regions.iter_mut().zip(srcs) {
            if let Some(src) = src {
                if region.is_empty() {
                    *region = IRect::from_size(src.width as i32, src.height as i32);
                }
            }
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(deferred: &Arc<DeferredQueue>) -> Image {
        Image::new(
            ImageInfo {
                key: ImageKey(1),
                width: 4,
                height: 4,
                kind: ImageKind::Regular,
            },
            deferred.clone(),
        )
    }

    #[test]
    fn mark_disposed_enqueues_once() {
        let deferred = Arc::new(DeferredQueue::default());
        let img = image(&deferred);
        img.mark_disposed();
        img.mark_disposed();
        assert!(img.is_disposed());
        assert_eq!(deferred.len(), 1);
        drop(img);
        assert_eq!(deferred.len(), 1);
    }

    #[test]
    fn drop_enqueues_disposal() {
        let deferred = Arc::new(DeferredQueue::default());
        drop(image(&deferred));
        assert_eq!(deferred.len(), 1);
    }

    #[test]
    #[should_panic(expected = "disposed image")]
    fn live_info_panics_after_dispose() {
        let deferred = Arc::new(DeferredQueue::default());
        let img = image(&deferred);
        img.mark_disposed();
        let _ = img.live_info();
    }

    #[test]
    fn uncompiled_shader_drop_is_silent() {
        let deferred = Arc::new(DeferredQueue::default());
        let shader = Shader::new("fn main() {}".into(), deferred.clone());
        let clone = shader.clone();
        drop(shader);
        drop(clone);
        assert_eq!(deferred.len(), 0);
    }

    #[test]
    fn compiled_shader_is_released_after_last_clone() {
        let deferred = Arc::new(DeferredQueue::default());
        let shader = Shader::new("src".into(), deferred.clone());
        let id = shader
            .shared()
            .ensure::<()>(0, |_| Ok(ShaderId(7)))
            .unwrap();
        assert_eq!(id, ShaderId(7));
        // Cached for the same generation.
        assert_eq!(shader.shared().ensure::<()>(0, |_| Err(())), Ok(ShaderId(7)));

        let clone = shader.clone();
        drop(shader);
        assert_eq!(deferred.len(), 0);
        drop(clone);
        assert_eq!(deferred.len(), 1);
    }
}
