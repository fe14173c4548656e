//! Vector paths and their stencil-based fill.
//!
//! A [`Path`] keeps lines and quadratic curves as given; cubics and arcs are
//! approximated by quadratics when added. [`StencilRasterizer`] fills paths
//! into atlas images with exact winding counts, so concave and
//! self-intersecting shapes need no tessellation. Strokes are built as
//! outlines with [`Path::add_stroke`] and filled under the non-zero rule.

mod fill;
mod path;
mod stencil;
mod stroke;

pub use fill::{FillOptions, FillRule, StencilRasterizer};
pub use path::{Direction, FlatPath, Path};
pub use stroke::{LineCap, LineJoin, StrokeOptions};
