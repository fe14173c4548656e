//! Ember graphics crate.
//!
//! This crate owns the GPU image-resource layer of the engine: atlas packing,
//! restorable images that journal pixel writes, deferred disposal, and the
//! stencil-based vector path rasterizer. Every GPU command funnels through the
//! [`driver::GraphicsDriver`] boundary.

pub mod error;
pub mod config;
pub mod logging;
pub mod geom;
pub mod pixels;

pub mod driver;
pub mod shader;
pub mod packing;
pub mod bytes;
pub mod restorable;
pub mod atlas;
pub mod vector;

pub use error::{GfxError, GfxResult};
