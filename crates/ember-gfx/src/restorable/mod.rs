//! Images that journal their pixel writes.
//!
//! A [`RestorableImage`] wraps one driver image. Pixel writes are recorded and
//! reach the GPU lazily, so reads of not-yet-drawn content never round-trip
//! through the driver, and the journal can rebuild the image after the GPU
//! context is lost.

mod image;
mod records;

pub use image::{DrawParams, RestorableImage, RestorableKind};
pub use records::PixelsRecords;
