//! Scratch byte buffers for pixel staging.
//!
//! - [`ManagedBytes`]: pooled buffers that return to a process-wide cache when
//!   dropped. Used for pixel records.
//! - [`TemporaryBytes`]: a per-frame linear allocator that releases its
//!   backing storage after a sustained period of low use.

mod pool;
mod temp;

pub use pool::{ManagedBytes, PoolStats, pool_stats};
pub use temp::TemporaryBytes;
