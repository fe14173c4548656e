use crate::geom::IRect;

use super::Blend;

/// Driver-side image handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub u32);

/// Driver-side shader handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub u32);

/// Floats per vertex: dst xy, src xy, rgba, custom0..3.
pub const VERTEX_FLOAT_COUNT: usize = 12;

/// Two triangles over vertices `0 1 2 3` laid out as a quad.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 1, 2, 3];

/// One vertex in the on-wire layout.
///
/// Positions are in pixels of the destination (`dst`) and source (`src`)
/// images. `color` is premultiplied and scales the shader output.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub dst: [f32; 2],
    pub src: [f32; 2],
    pub color: [f32; 4],
    pub custom: [f32; 4],
}

impl Vertex {
    pub const fn new(dst: [f32; 2], src: [f32; 2], color: [f32; 4]) -> Self {
        Self {
            dst,
            src,
            color,
            custom: [0.0; 4],
        }
    }

    pub const fn with_custom(mut self, custom: [f32; 4]) -> Self {
        self.custom = custom;
        self
    }

    /// Reads vertex `index` from a flat float slice.
    pub fn read(vertices: &[f32], index: usize) -> Option<Vertex> {
        let start = index.checked_mul(VERTEX_FLOAT_COUNT)?;
        let v = vertices.get(start..start + VERTEX_FLOAT_COUNT)?;
        Some(Vertex {
            dst: [v[0], v[1]],
            src: [v[2], v[3]],
            color: [v[4], v[5], v[6], v[7]],
            custom: [v[8], v[9], v[10], v[11]],
        })
    }

    /// Appends this vertex to a flat float buffer.
    pub fn push_to(&self, out: &mut Vec<f32>) {
        out.extend_from_slice(bytemuck::cast_slice::<Vertex, f32>(std::slice::from_ref(self)));
    }
}

/// Driver-level stencil mode for a single draw.
///
/// `NonZero` and `EvenOdd` first accumulate the winding of every triangle in
/// the draw into a stencil buffer, then shade each covered pixel once.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum FillRule {
    #[default]
    FillAll,
    NonZero,
    EvenOdd,
}

/// Parameters of [`super::GraphicsDriver::draw_triangles`].
///
/// Indices refer to the buffers passed to the last `set_vertices` call.
#[derive(Debug, Clone)]
pub struct DrawTrianglesCommand<'a> {
    pub dst: ImageId,
    pub srcs: [Option<ImageId>; 4],
    /// Offsets added to the source position when sampling `srcs[1..]`.
    pub offsets: [[f32; 2]; 3],
    pub shader: ShaderId,
    pub index_offset: usize,
    pub index_len: usize,
    pub blend: Blend,
    /// Scissor in destination pixels.
    pub dst_region: IRect,
    /// Sampling bounds per source, in that source's pixels.
    pub src_regions: [IRect; 4],
    pub uniforms: &'a [u32],
    pub fill_rule: FillRule,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_twelve_floats() {
        assert_eq!(std::mem::size_of::<Vertex>(), VERTEX_FLOAT_COUNT * 4);
    }

    #[test]
    fn push_then_read_matches_layout() {
        let v = Vertex::new([1.0, 2.0], [3.0, 4.0], [0.1, 0.2, 0.3, 0.4])
            .with_custom([5.0, 6.0, 7.0, 8.0]);
        let mut buf = vec![9.0; VERTEX_FLOAT_COUNT];
        v.push_to(&mut buf);
        assert_eq!(buf[VERTEX_FLOAT_COUNT + 2], 3.0);
        assert_eq!(Vertex::read(&buf, 1), Some(v));
        assert_eq!(Vertex::read(&buf, 2), None);
    }
}
