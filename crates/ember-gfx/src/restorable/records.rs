use crate::bytes::ManagedBytes;
use crate::driver::{GraphicsDriver, ImageId};
use crate::error::GfxResult;
use crate::geom::IRect;

/// One journaled pixel write. `pix == None` means the rect was cleared.
#[derive(Debug)]
struct PixelsRecord {
    rect: IRect,
    pix: Option<ManagedBytes>,
    /// Already written to the current GPU image.
    applied: bool,
}

impl PixelsRecord {
    /// Copies the overlap of this record with `region` into `dst`, laid out as
    /// `region`-sized rows.
    fn read_into(&self, dst: &mut [u8], region: IRect) {
        let r = self.rect.intersect(region);
        if r.is_empty() {
            return;
        }
        let line = 4 * r.dx() as usize;
        let dst_x = (r.min_x - region.min_x) as usize;
        let dst_y = (r.min_y - region.min_y) as usize;
        let dst_stride = 4 * region.dx() as usize;

        for j in 0..r.dy() as usize {
            let d = (dst_y + j) * dst_stride + 4 * dst_x;
            let out = &mut dst[d..d + line];
            match &self.pix {
                Some(pix) => {
                    let src_x = (r.min_x - self.rect.min_x) as usize;
                    let src_y = (r.min_y - self.rect.min_y) as usize;
                    let s = (src_y + j) * 4 * self.rect.dx() as usize + 4 * src_x;
                    out.copy_from_slice(&pix[s..s + line]);
                }
                None => out.fill(0),
            }
        }
    }

    /// Zeroes the part of this record that overlaps `region`.
    fn zero_overlap(&mut self, region: IRect) {
        let r = self.rect.intersect(region);
        if r.is_empty() {
            return;
        }
        let Some(pix) = self.pix.as_mut() else {
            return;
        };
        let stride = 4 * self.rect.dx() as usize;
        let line = 4 * r.dx() as usize;
        let x = 4 * (r.min_x - self.rect.min_x) as usize;
        for j in (r.min_y - self.rect.min_y) as usize..(r.max_y - self.rect.min_y) as usize {
            let s = j * stride + x;
            pix[s..s + line].fill(0);
        }
    }
}

/// Ordered journal of pixel writes on one image.
///
/// Later records win over earlier ones where they overlap. A record fully
/// covered by a newer write is dropped.
#[derive(Debug, Default)]
pub struct PixelsRecords {
    records: Vec<PixelsRecord>,
}

impl PixelsRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when some record has not reached the GPU yet.
    pub fn has_pending(&self) -> bool {
        self.records.iter().any(|r| !r.applied)
    }

    /// Journals `pix` for `region`, dropping records the new write covers.
    ///
    /// # Panics
    /// If `pix` does not hold exactly `region.rgba_len()` bytes.
    pub fn add_or_replace(&mut self, pix: ManagedBytes, region: IRect) {
        assert_eq!(
            pix.len(),
            region.rgba_len(),
            "pixel record length must match its region {region:?}"
        );
        if region.is_empty() {
            return;
        }
        self.records.retain(|r| !r.rect.is_in(region));
        self.records.push(PixelsRecord {
            rect: region,
            pix: Some(pix),
            applied: false,
        });
    }

    /// Journals a clear of `region`.
    pub fn clear(&mut self, region: IRect) {
        if region.is_empty() {
            return;
        }
        self.records.retain(|r| !r.rect.is_in(region));
        for r in &mut self.records {
            r.zero_overlap(region);
        }
        self.records.push(PixelsRecord {
            rect: region,
            pix: None,
            applied: false,
        });
    }

    /// Drops every record touching `region`. Used when a draw overwrites it.
    pub fn remove_intersecting(&mut self, region: IRect) {
        self.records.retain(|r| !r.rect.overlaps(region));
    }

    /// Fills `dst` with the journaled content of `region` over a transparent
    /// background.
    pub fn read_pixels(&self, dst: &mut [u8], region: IRect) {
        dst.fill(0);
        for r in &self.records {
            r.read_into(dst, region);
        }
    }

    /// Writes every pending record to `image` in journal order.
    pub fn apply(&mut self, driver: &mut dyn GraphicsDriver, image: ImageId) -> GfxResult<()> {
        for r in self.records.iter_mut().filter(|r| !r.applied) {
            match &r.pix {
                Some(pix) => driver.write_pixels(image, pix, r.rect)?,
                None => {
                    let zeros = ManagedBytes::zeroed(r.rect.rgba_len());
                    driver.write_pixels(image, &zeros, r.rect)?;
                }
            }
            r.applied = true;
        }
        Ok(())
    }

    /// Marks every record as not yet written, e.g. after the GPU image was replaced.
    pub fn mark_pending(&mut self) {
        for r in &mut self.records {
            r.applied = false;
        }
    }

    /// Replaces the journal with one already-applied snapshot.
    pub fn replace_with_snapshot(&mut self, pix: ManagedBytes, region: IRect) {
        self.records.clear();
        self.records.push(PixelsRecord {
            rect: region,
            pix: Some(pix),
            applied: true,
        });
    }

    pub fn clear_all(&mut self) {
        self.records.clear();
    }

    pub fn regions(&self) -> impl Iterator<Item = IRect> + '_ {
        self.records.iter().map(|r| r.rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(region: IRect, v: u8) -> ManagedBytes {
        let mut pix = ManagedBytes::get(region.rgba_len());
        pix.fill(v);
        pix
    }

    fn read(records: &PixelsRecords, region: IRect) -> Vec<u8> {
        let mut buf = vec![0xEE; region.rgba_len()];
        records.read_pixels(&mut buf, region);
        buf
    }

    // ── journal ───────────────────────────────────────────────────────────

    #[test]
    fn covered_record_is_replaced() {
        let mut rs = PixelsRecords::new();
        rs.add_or_replace(filled(IRect::new(1, 1, 2, 2), 1), IRect::new(1, 1, 2, 2));
        rs.add_or_replace(filled(IRect::new(0, 0, 4, 4), 2), IRect::new(0, 0, 4, 4));
        assert_eq!(rs.len(), 1);
    }

    #[test]
    fn partial_overlap_keeps_both_and_latest_wins() {
        let mut rs = PixelsRecords::new();
        let a = IRect::new(0, 0, 4, 4);
        let b = IRect::new(1, 1, 3, 3);
        rs.add_or_replace(filled(a, 0x10), a);
        rs.add_or_replace(filled(b, 0x20), b);
        assert_eq!(rs.len(), 2);

        let buf = read(&rs, a);
        for j in 0..4 {
            for i in 0..4 {
                let want = if (1..3).contains(&i) && (1..3).contains(&j) { 0x20 } else { 0x10 };
                assert_eq!(buf[4 * (j * 4 + i)], want, "pixel ({i},{j})");
            }
        }
    }

    #[test]
    #[should_panic(expected = "must match its region")]
    fn length_mismatch_panics() {
        let mut rs = PixelsRecords::new();
        rs.add_or_replace(ManagedBytes::get(3), IRect::new(0, 0, 1, 1));
    }

    // ── clear ─────────────────────────────────────────────────────────────

    #[test]
    fn clear_zeroes_overlap_in_place() {
        let mut rs = PixelsRecords::new();
        let a = IRect::new(0, 0, 4, 1);
        rs.add_or_replace(filled(a, 9), a);
        rs.clear(IRect::new(2, 0, 8, 8));

        let buf = read(&rs, a);
        assert_eq!(&buf[0..8], &[9; 8]);
        assert_eq!(&buf[8..16], &[0; 8]);
    }

    #[test]
    fn clear_drops_contained_records() {
        let mut rs = PixelsRecords::new();
        let a = IRect::new(1, 1, 2, 2);
        rs.add_or_replace(filled(a, 9), a);
        rs.clear(IRect::new(0, 0, 4, 4));
        assert_eq!(rs.len(), 1);
        assert!(read(&rs, a).iter().all(|&b| b == 0));
    }

    // ── reads ─────────────────────────────────────────────────────────────

    #[test]
    fn read_outside_records_is_transparent() {
        let mut rs = PixelsRecords::new();
        let a = IRect::new(0, 0, 2, 2);
        rs.add_or_replace(filled(a, 5), a);
        let buf = read(&rs, IRect::new(4, 4, 6, 6));
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn read_offset_region() {
        let mut rs = PixelsRecords::new();
        let a = IRect::new(2, 2, 4, 4);
        rs.add_or_replace(filled(a, 7), a);
        let region = IRect::new(3, 3, 5, 5);
        let buf = read(&rs, region);
        // Only the top-left pixel of `region` overlaps the record.
        assert_eq!(&buf[0..4], &[7; 4]);
        assert!(buf[4..].iter().all(|&b| b == 0));
    }

    // ── bookkeeping ───────────────────────────────────────────────────────

    #[test]
    fn draw_invalidation_removes_intersecting() {
        let mut rs = PixelsRecords::new();
        let a = IRect::new(0, 0, 2, 2);
        let b = IRect::new(8, 8, 10, 10);
        rs.add_or_replace(filled(a, 1), a);
        rs.add_or_replace(filled(b, 1), b);
        rs.remove_intersecting(IRect::new(1, 1, 3, 3));
        assert_eq!(rs.regions().collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn pending_tracking() {
        let mut rs = PixelsRecords::new();
        assert!(!rs.has_pending());
        let a = IRect::new(0, 0, 1, 1);
        rs.replace_with_snapshot(filled(a, 1), a);
        assert!(!rs.has_pending());
        rs.mark_pending();
        assert!(rs.has_pending());
    }
}
