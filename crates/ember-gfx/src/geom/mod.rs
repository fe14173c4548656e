//! Geometry types shared by the atlas and the path rasterizer.
//!
//! Canonical space:
//! - Pixels, origin top-left
//! - +X right, +Y down
//!
//! Integer rectangles are half-open: `[min, max)`.

mod irect;
mod vec2;

pub use irect::IRect;
pub use vec2::Vec2;
