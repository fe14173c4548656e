use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

const MAX_POOLED_BUFFERS: usize = 32;
const MAX_POOLED_BYTES: usize = 1 << 30;

struct BytesPool {
    /// Oldest first.
    entries: VecDeque<Vec<u8>>,
    total_capacity: usize,
}

impl BytesPool {
    const fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            total_capacity: 0,
        }
    }

    /// Takes the smallest pooled buffer whose capacity fits `size`.
    fn take(&mut self, size: usize) -> Option<Vec<u8>> {
        let (idx, _) = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, b)| b.capacity() >= size)
            .min_by_key(|(_, b)| b.capacity())?;
        let buf = self.entries.remove(idx)?;
        self.total_capacity -= buf.capacity();
        Some(buf)
    }

    fn put(&mut self, buf: Vec<u8>) {
        let cap = buf.capacity();
        if cap == 0 || cap > MAX_POOLED_BYTES {
            return;
        }
        self.entries.push_back(buf);
        self.total_capacity += cap;
        while self.entries.len() > MAX_POOLED_BUFFERS || self.total_capacity > MAX_POOLED_BYTES {
            let Some(old) = self.entries.pop_front() else {
                break;
            };
            self.total_capacity -= old.capacity();
        }
    }
}

static POOL: Mutex<BytesPool> = Mutex::new(BytesPool::new());

/// Snapshot of the process-wide pool.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub buffers: usize,
    pub total_capacity: usize,
}

pub fn pool_stats() -> PoolStats {
    let pool = POOL.lock().unwrap_or_else(|e| e.into_inner());
    PoolStats {
        buffers: pool.entries.len(),
        total_capacity: pool.total_capacity,
    }
}

/// A byte buffer borrowed from the process-wide pool.
///
/// Dropping it returns the allocation to the pool. Contents of a freshly
/// obtained buffer are unspecified; callers overwrite every byte they read.
pub struct ManagedBytes {
    buf: Vec<u8>,
}

impl ManagedBytes {
    /// Returns a buffer of exactly `size` bytes.
    pub fn get(size: usize) -> Self {
        let pooled = POOL.lock().unwrap_or_else(|e| e.into_inner()).take(size);
        let buf = match pooled {
            Some(mut buf) => {
                // Capacity already fits; this never reallocates.
                buf.resize(size, 0);
                buf
            }
            None => vec![0; size],
        };
        Self { buf }
    }

    /// Returns a buffer holding a copy of `src`.
    pub fn copy_from(src: &[u8]) -> Self {
        let mut bytes = Self::get(src.len());
        bytes.buf.copy_from_slice(src);
        bytes
    }

    /// Returns a zero-filled buffer of `size` bytes.
    pub fn zeroed(size: usize) -> Self {
        let mut bytes = Self::get(size);
        bytes.buf.fill(0);
        bytes
    }
}

impl Deref for ManagedBytes {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for ManagedBytes {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl std::fmt::Debug for ManagedBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedBytes").field("len", &self.buf.len()).finish()
    }
}

impl Drop for ManagedBytes {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        // Never block or panic in drop: a poisoned pool just keeps working.
        POOL.lock().unwrap_or_else(|e| e.into_inner()).put(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The process-wide pool is shared across test threads, so these tests use
    // local pools for exact accounting.

    #[test]
    fn take_prefers_smallest_fitting() {
        let mut pool = BytesPool::new();
        pool.put(Vec::with_capacity(1024));
        pool.put(Vec::with_capacity(64));
        pool.put(Vec::with_capacity(256));
        let buf = pool.take(100).unwrap();
        assert!(buf.capacity() >= 100 && buf.capacity() < 1024);
        assert_eq!(pool.entries.len(), 2);
    }

    #[test]
    fn take_misses_when_nothing_fits() {
        let mut pool = BytesPool::new();
        pool.put(Vec::with_capacity(16));
        assert!(pool.take(17).is_none());
        assert_eq!(pool.entries.len(), 1);
    }

    #[test]
    fn buffer_count_is_capped_dropping_oldest() {
        let mut pool = BytesPool::new();
        for i in 0..40 {
            pool.put(Vec::with_capacity(8 + i));
        }
        assert_eq!(pool.entries.len(), MAX_POOLED_BUFFERS);
        // The 8 oldest (smallest) went first.
        assert!(pool.entries.iter().all(|b| b.capacity() >= 16));
    }

    #[test]
    fn total_capacity_is_tracked() {
        let mut pool = BytesPool::new();
        pool.put(Vec::with_capacity(100));
        pool.put(Vec::with_capacity(200));
        let cap: usize = pool.entries.iter().map(Vec::capacity).sum();
        assert_eq!(pool.total_capacity, cap);
        let _ = pool.take(150);
        let cap: usize = pool.entries.iter().map(Vec::capacity).sum();
        assert_eq!(pool.total_capacity, cap);
    }

    #[test]
    fn managed_bytes_have_requested_len() {
        let a = ManagedBytes::copy_from(&[1, 2, 3]);
        assert_eq!(&a[..], &[1, 2, 3]);
        drop(a);
        let b = ManagedBytes::zeroed(2);
        assert_eq!(&b[..], &[0, 0]);
        let stats = pool_stats();
        assert!(stats.buffers <= MAX_POOLED_BUFFERS);
        assert!(stats.total_capacity <= MAX_POOLED_BYTES);
    }
}
