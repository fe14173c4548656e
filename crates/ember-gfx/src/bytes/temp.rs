/// Frames of low use tolerated before the backing buffer is released.
const RELEASE_AFTER_FRAMES: u32 = 60;

/// Per-frame linear scratch allocator.
///
/// Allocations are valid until the next [`TemporaryBytes::alloc`] or
/// [`TemporaryBytes::end_frame`]. The backing buffer grows to the largest
/// request seen and is dropped once the per-frame high-water mark stays below
/// half its capacity for [`RELEASE_AFTER_FRAMES`] consecutive frames.
#[derive(Debug, Default)]
pub struct TemporaryBytes {
    buf: Vec<u8>,
    pos: usize,
    high_water: usize,
    low_use_frames: u32,
}

impl TemporaryBytes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `size` zeroed bytes from the ring.
    pub fn alloc(&mut self, size: usize) -> &mut [u8] {
        if self.pos + size > self.buf.len() {
            // Restart at the front: previous slices from this frame are dead by now.
            self.pos = 0;
            if size > self.buf.len() {
                let new_len = size.next_power_of_two().max(16);
                log::debug!("temporary bytes grow: {} -> {new_len}", self.buf.len());
                self.buf = vec![0; new_len];
            }
        }
        let start = self.pos;
        self.pos += size;
        self.high_water = self.high_water.max(self.pos);
        let out = &mut self.buf[start..start + size];
        out.fill(0);
        out
    }

    /// Ends the frame: resets the cursor and applies the release policy.
    pub fn end_frame(&mut self) {
        if !self.buf.is_empty() && self.high_water < self.buf.len() / 2 {
            self.low_use_frames += 1;
            if self.low_use_frames >= RELEASE_AFTER_FRAMES {
                log::debug!("temporary bytes released ({} bytes)", self.buf.len());
                self.buf = Vec::new();
                self.low_use_frames = 0;
            }
        } else {
            self.low_use_frames = 0;
        }
        self.pos = 0;
        self.high_water = 0;
    }

    /// Current backing capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_is_zeroed_and_sized() {
        let mut t = TemporaryBytes::new();
        let a = t.alloc(10);
        assert_eq!(a.len(), 10);
        assert!(a.iter().all(|&b| b == 0));
        a.fill(7);
        let b = t.alloc(4);
        assert!(b.iter().all(|&b| b == 0));
    }

    #[test]
    fn released_after_sustained_low_use() {
        let mut t = TemporaryBytes::new();
        t.alloc(1000);
        t.end_frame();
        let cap = t.capacity();
        assert!(cap >= 1000);

        for _ in 0..RELEASE_AFTER_FRAMES - 1 {
            t.alloc(10);
            t.end_frame();
        }
        assert_eq!(t.capacity(), cap);
        t.alloc(10);
        t.end_frame();
        assert_eq!(t.capacity(), 0);
    }

    #[test]
    fn heavy_frame_resets_low_use_streak() {
        let mut t = TemporaryBytes::new();
        t.alloc(1024);
        t.end_frame();
        for _ in 0..RELEASE_AFTER_FRAMES - 1 {
            t.end_frame();
        }
        t.alloc(1000);
        t.end_frame();
        for _ in 0..RELEASE_AFTER_FRAMES - 1 {
            t.end_frame();
        }
        assert_eq!(t.capacity(), 1024);
    }
}
