//! Rectangle packing inside a single growable page.
//!
//! The packer is a binary space partition: every allocation splits a free leaf
//! into the requested rectangle and the remainder, choosing the split that
//! keeps the remainder closest to square. Freed siblings are merged back.

mod page;

pub use page::{NodeId, Page};
