use crate::error::GfxResult;
use crate::geom::IRect;

use super::{DrawTrianglesCommand, ImageId, ShaderId};

/// The narrow GPU boundary.
///
/// Pixel data crossing this boundary is RGBA8, premultiplied, tightly packed
/// rows. Regions are in the image's own pixels and must lie inside it.
/// Implementations execute commands in call order.
pub trait GraphicsDriver {
    /// Starts a frame.
    fn begin(&mut self) -> GfxResult<()>;

    /// Ends a frame; `present` flushes the screen image.
    fn end(&mut self, present: bool) -> GfxResult<()>;

    /// Largest supported texture edge.
    fn max_image_size(&self) -> u32;

    fn new_image(&mut self, width: u32, height: u32) -> GfxResult<ImageId>;

    fn new_screen_framebuffer_image(&mut self, width: u32, height: u32) -> GfxResult<ImageId>;

    /// Releases an image. Unknown ids are ignored.
    fn dispose_image(&mut self, id: ImageId);

    fn new_shader(&mut self, source: &str) -> GfxResult<ShaderId>;

    /// Releases a shader. Unknown ids are ignored.
    fn dispose_shader(&mut self, id: ShaderId);

    fn write_pixels(&mut self, id: ImageId, pix: &[u8], region: IRect) -> GfxResult<()>;

    fn read_pixels(&mut self, id: ImageId, buf: &mut [u8], region: IRect) -> GfxResult<()>;

    /// Replaces the current vertex and index buffers.
    fn set_vertices(&mut self, vertices: &[f32], indices: &[u32]) -> GfxResult<()>;

    fn draw_triangles(&mut self, cmd: &DrawTrianglesCommand<'_>) -> GfxResult<()>;
}
