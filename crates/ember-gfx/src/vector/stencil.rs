use std::cmp::Reverse;

use crate::atlas::{Frame, Image, ImageKind};
use crate::error::GfxResult;
use crate::geom::IRect;
use crate::packing::{NodeId, Page};

/// Regions are rounded up to this many pixels per axis.
const REGION_GRANULARITY: i32 = 16;

/// Page edge cap, below 4096 to leave room for inner padding.
const MAX_PAGE_SIZE: u32 = 4093;

/// Edge of a freshly started page.
const MIN_PAGE_SIZE: u32 = 256;

fn round_up(v: i32) -> i32 {
    (v + REGION_GRANULARITY - 1) / REGION_GRANULARITY * REGION_GRANULARITY
}

/// Where one path's winding counts live.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct StencilRegion {
    pub page: usize,
    /// Whole region on the page image, both halves included.
    pub rect: IRect,
    /// Width of one sample half. Equals `rect.dx()` without anti-aliasing.
    pub half_width: i32,
}

impl StencilRegion {
    /// Sample half `index` of the region.
    pub fn half(&self, index: usize) -> IRect {
        IRect::from_xywh(
            self.rect.min_x + index as i32 * self.half_width,
            self.rect.min_y,
            self.half_width,
            self.rect.dy(),
        )
    }
}

/// Scratch images shared by every path of a fill call.
///
/// Page images survive between calls. A page that is too small is
/// deallocated and replaced by a larger one; otherwise it is cleared.
#[derive(Debug, Default)]
pub(crate) struct StencilAtlas {
    images: Vec<Image>,
    warned_truncated: bool,
}

impl StencilAtlas {
    pub fn page_image(&self, page: usize) -> &Image {
        &self.images[page]
    }

    pub fn page_count(&self) -> usize {
        self.images.len()
    }

    /// Packs a region for every non-empty `(w, h)` in `sizes` and readies
    /// the page images. Regions come back in input order.
    ///
    /// A size larger than a page is truncated; callers clip their drawing
    /// to `half(0)`.
    pub fn prepare(
        &mut self,
        frame: &mut Frame<'_>,
        sizes: &[(i32, i32)],
        antialias: bool,
    ) -> GfxResult<Vec<Option<StencilRegion>>> {
        let cap = MAX_PAGE_SIZE.min(frame.max_image_size());
        let halves = if antialias { 2 } else { 1 };

        let mut dims: Vec<Option<(i32, i32)>> = Vec::with_capacity(sizes.len());
        for &(w, h) in sizes {
            if w <= 0 || h <= 0 {
                dims.push(None);
                continue;
            }
            let half_w = round_up(w).min(cap as i32 / halves);
            let rh = round_up(h).min(cap as i32);
            if (half_w < w || rh < h) && !self.warned_truncated {
                self.warned_truncated = true;
                log::warn!("path bounds {w}x{h} exceed a stencil page; the fill is clipped");
            }
            dims.push(Some((half_w, rh)));
        }

        let mut order: Vec<(usize, i32, i32)> = dims
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.map(|(w, h)| (i, w, h)))
            .collect();
        order.sort_by_key(|&(_, w, h)| (Reverse(h), w));

        let mut pages: Vec<Page> = Vec::new();
        let mut placed: Vec<Option<(usize, NodeId)>> = vec![None; dims.len()];
        for (i, half_w, h) in order {
            let (w, h) = ((half_w * halves) as u32, h as u32);
            let node = pages.last_mut().and_then(|page| alloc_growing(page, w, h));
            placed[i] = Some(match node {
                Some(node) => (pages.len() - 1, node),
                None => {
                    let size = MIN_PAGE_SIZE
                        .max(w.next_power_of_two())
                        .max(h.next_power_of_two())
                        .min(cap);
                    let mut page = Page::new(size, size, cap);
                    let node = page.alloc(w, h).expect("a fresh page fits any clamped region");
                    pages.push(page);
                    (pages.len() - 1, node)
                }
            });
        }

        for (index, page) in pages.iter().enumerate() {
            self.ensure_page_image(frame, index, page.size(), cap)?;
        }

        Ok(placed
            .iter()
            .zip(&dims)
            .map(|(placed, dims)| {
                let (page, node) = (*placed)?;
                let (half_width, _) = (*dims)?;
                Some(StencilRegion {
                    page,
                    rect: pages[page].region(node),
                    half_width,
                })
            })
            .collect())
    }

    fn ensure_page_image(
        &mut self,
        frame: &mut Frame<'_>,
        index: usize,
        (w, h): (u32, u32),
        cap: u32,
    ) -> GfxResult<()> {
        if let Some(img) = self.images.get(index) {
            if img.width() >= w && img.height() >= h {
                let used = IRect::from_size(w as i32, h as i32);
                return frame.clear_pixels(img, used);
            }
        }

        let (mut w, mut h) = (w, h);
        if let Some(old) = self.images.get(index) {
            w = w.max(old.width()).min(cap);
            h = h.max(old.height()).min(cap);
            frame.deallocate(old);
        }
        let img = frame.atlas().new_image(w, h, ImageKind::Unmanaged)?;
        log::debug!("stencil page {index} is now {w}x{h}");
        if index < self.images.len() {
            self.images[index] = img;
        } else {
            self.images.push(img);
        }
        Ok(())
    }
}

/// Allocates on `page`, growing it until the region fits or the page is at
/// its cap.
fn alloc_growing(page: &mut Page, w: u32, h: u32) -> Option<NodeId> {
    loop {
        if let Some(node) = page.alloc(w, h) {
            return Some(node);
        }
        if !page.grow() {
            return None;
        }
    }
}
