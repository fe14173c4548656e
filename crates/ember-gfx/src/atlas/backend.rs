use crate::driver::{GraphicsDriver, ShaderId};
use crate::error::GfxResult;
use crate::packing::{NodeId, Page};
use crate::restorable::RestorableImage;

/// Stable id of a backend within its registry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendId(pub(crate) u32);

/// One GPU image, either packed with many logical images or dedicated to one.
#[derive(Debug)]
pub(crate) struct Backend {
    pub restorable: RestorableImage,
    /// `None` for a dedicated backend.
    pub page: Option<Page>,
    /// Mainly read from. Drawing into an image here forces isolation.
    pub source: bool,
    /// Sampled by a draw in the current frame.
    pub source_in_this_frame: bool,
}

impl Backend {
    pub fn new(restorable: RestorableImage, page: Option<Page>, source: bool) -> Self {
        Self {
            restorable,
            page,
            source,
            source_in_this_frame: false,
        }
    }

    /// Allocates `w x h` on the page, growing the page and its image if
    /// needed. Returns `None` for dedicated backends or when the page is full
    /// at its maximum size.
    pub fn try_alloc(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        w: u32,
        h: u32,
        copy_shader: ShaderId,
    ) -> GfxResult<Option<NodeId>> {
        let Some(page) = self.page.as_mut() else {
            return Ok(None);
        };
        if let Some(node) = page.alloc(w, h) {
            return Ok(Some(node));
        }

        // Grow a scratch copy so a failed attempt leaves the page untouched.
        let mut grown = page.clone();
        let node = loop {
            if !grown.grow() {
                return Ok(None);
            }
            if let Some(node) = grown.alloc(w, h) {
                break node;
            }
        };
        let (pw, ph) = grown.size();
        self.restorable.extend(driver, pw, ph, copy_shader)?;
        *page = grown;
        Ok(Some(node))
    }

    pub fn is_dedicated(&self) -> bool {
        self.page.is_none()
    }
}
