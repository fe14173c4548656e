//! Built-in shader programs.
//!
//! Every program variant is assembled from WGSL fragments at compile time and
//! looked up by enum. Drivers identify precompiled programs by the
//! [`fingerprint`] of their source.

mod builtin;
mod fingerprint;

pub use builtin::{Address, BuiltinShader, Filter};
pub use fingerprint::{SourceHash, fingerprint};
