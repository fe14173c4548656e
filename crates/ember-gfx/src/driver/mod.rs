//! GPU driver boundary.
//!
//! Everything above this module talks to the GPU through [`GraphicsDriver`].
//! Two implementations ship with the crate:
//! - [`SoftwareDriver`]: deterministic CPU rasterizer, used by tests and as a
//!   reference for the shader semantics
//! - [`WgpuDriver`]: headless wgpu device

mod blend;
mod graphics;
mod types;

pub mod software;
pub mod gpu;

pub use blend::{Blend, BlendFactor, BlendOperation};
pub use graphics::GraphicsDriver;
pub use software::SoftwareDriver;
pub use types::{
    DrawTrianglesCommand, FillRule, ImageId, QUAD_INDICES, ShaderId, VERTEX_FLOAT_COUNT, Vertex,
};
pub use gpu::{WgpuDriver, WgpuInit};
