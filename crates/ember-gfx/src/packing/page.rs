use crate::geom::IRect;

/// Handle to an allocated rectangle inside a [`Page`].
///
/// A `NodeId` is only meaningful for the page that returned it and only until
/// it is passed to [`Page::free`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

#[derive(Debug, Clone)]
struct Node {
    rect: IRect,
    used: bool,
    parent: Option<NodeId>,
    children: Option<(NodeId, NodeId)>,
}

/// A BSP rectangle packer.
///
/// Nodes live in an arena; freed slots are recycled. Allocated leaves never
/// overlap, and every allocated leaf lies inside `size()`.
#[derive(Debug, Clone)]
pub struct Page {
    nodes: Vec<Option<Node>>,
    free_slots: Vec<u32>,
    root: NodeId,
    width: i32,
    height: i32,
    max_size: i32,
    allocated: usize,
}

impl Page {
    /// Creates an empty page of `width × height`, growable up to `max_size`.
    ///
    /// # Panics
    /// Panics if a dimension is zero or larger than `max_size`.
    pub fn new(width: u32, height: u32, max_size: u32) -> Self {
        assert!(width > 0 && height > 0, "page dimensions must be positive");
        assert!(
            width <= max_size && height <= max_size,
            "page {width}x{height} exceeds max size {max_size}"
        );
        let mut page = Self {
            nodes: Vec::new(),
            free_slots: Vec::new(),
            root: NodeId(0),
            width: width as i32,
            height: height as i32,
            max_size: max_size as i32,
            allocated: 0,
        };
        page.root = page.insert(Node {
            rect: IRect::from_size(width as i32, height as i32),
            used: false,
            parent: None,
            children: None,
        });
        page
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }

    #[inline]
    pub fn max_size(&self) -> u32 {
        self.max_size as u32
    }

    /// True iff no node is currently allocated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.allocated == 0
    }

    /// Number of live allocations.
    #[inline]
    pub fn allocated_count(&self) -> usize {
        self.allocated
    }

    /// Region covered by an allocated node.
    ///
    /// # Panics
    /// Panics if `id` does not name a live node of this page.
    pub fn region(&self, id: NodeId) -> IRect {
        self.node(id).rect
    }

    /// Allocates a `w × h` rectangle inside the current page.
    ///
    /// Returns `None` when no free leaf is large enough; the page is never
    /// grown implicitly.
    ///
    /// # Panics
    /// Panics if `w` or `h` is zero.
    pub fn alloc(&mut self, w: u32, h: u32) -> Option<NodeId> {
        assert!(w > 0 && h > 0, "allocation dimensions must be positive");
        if w as i32 > self.width || h as i32 > self.height {
            return None;
        }
        let id = self.alloc_in(self.root, w as i32, h as i32)?;
        self.allocated += 1;
        Some(id)
    }

    /// Releases an allocated node and merges free siblings upwards.
    ///
    /// # Panics
    /// Panics if `id` is not an allocated leaf of this page.
    pub fn free(&mut self, id: NodeId) {
        let node = self.node_mut(id);
        assert!(node.used, "freeing a node that is not allocated");
        assert!(node.children.is_none(), "freeing a node with children");
        node.used = false;
        self.allocated -= 1;
        self.merge_upwards(id);
    }

    /// Grows the page to `new_w × new_h`. Existing nodes keep their regions.
    ///
    /// # Panics
    /// Panics if the page would shrink or exceed `max_size`.
    pub fn extend(&mut self, new_w: u32, new_h: u32) {
        let (new_w, new_h) = (new_w as i32, new_h as i32);
        assert!(
            new_w >= self.width && new_h >= self.height,
            "a page cannot shrink"
        );
        assert!(
            new_w <= self.max_size && new_h <= self.max_size,
            "page {new_w}x{new_h} exceeds max size {}",
            self.max_size
        );
        if new_w == self.width && new_h == self.height {
            return;
        }

        let root = self.node(self.root).clone();
        if !root.used && root.children.is_none() {
            self.node_mut(self.root).rect = IRect::from_size(new_w, new_h);
        } else {
            if new_w > self.width {
                self.wrap_root(
                    IRect::from_size(new_w, self.height),
                    IRect::new(self.width, 0, new_w, self.height),
                );
            }
            if new_h > self.height {
                self.wrap_root(
                    IRect::from_size(new_w, new_h),
                    IRect::new(0, self.height, new_w, new_h),
                );
            }
        }
        self.width = new_w;
        self.height = new_h;
    }

    /// Doubles the shorter side (width on ties), clamped to `max_size`.
    ///
    /// Returns `false` when the page is already at `max_size` on both axes.
    pub fn grow(&mut self) -> bool {
        let (w, h) = (self.width, self.height);
        let (new_w, new_h) = if w <= h && w < self.max_size {
            ((w * 2).min(self.max_size), h)
        } else if h < self.max_size {
            (w, (h * 2).min(self.max_size))
        } else if w < self.max_size {
            ((w * 2).min(self.max_size), h)
        } else {
            return false;
        };
        self.extend(new_w as u32, new_h as u32);
        true
    }

    /// Regions of every live allocation, in arena order.
    pub fn allocated_regions(&self) -> Vec<IRect> {
        self.nodes
            .iter()
            .flatten()
            .filter(|n| n.used)
            .map(|n| n.rect)
            .collect()
    }

    // ── tree internals ────────────────────────────────────────────────────

    fn alloc_in(&mut self, id: NodeId, w: i32, h: i32) -> Option<NodeId> {
        let node = self.node(id);
        if node.used || node.rect.dx() < w || node.rect.dy() < h {
            return None;
        }
        if let Some((c0, c1)) = node.children {
            return self.alloc_in(c0, w, h).or_else(|| self.alloc_in(c1, w, h));
        }

        let rect = node.rect;
        if rect.dx() == w && rect.dy() == h {
            self.node_mut(id).used = true;
            return Some(id);
        }

        let (r0, r1) = if square(rect.dx() - w, rect.dy()) >= square(rect.dx(), rect.dy() - h) {
            // vertical cut
            (
                IRect::from_xywh(rect.min_x, rect.min_y, w, rect.dy()),
                IRect::new(rect.min_x + w, rect.min_y, rect.max_x, rect.max_y),
            )
        } else {
            // horizontal cut
            (
                IRect::from_xywh(rect.min_x, rect.min_y, rect.dx(), h),
                IRect::new(rect.min_x, rect.min_y + h, rect.max_x, rect.max_y),
            )
        };
        let c0 = self.insert(Node {
            rect: r0,
            used: false,
            parent: Some(id),
            children: None,
        });
        let c1 = self.insert(Node {
            rect: r1,
            used: false,
            parent: Some(id),
            children: None,
        });
        self.node_mut(id).children = Some((c0, c1));
        self.alloc_in(c0, w, h)
    }

    fn merge_upwards(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };
        let Some((c0, c1)) = self.node(parent).children else {
            unreachable!("parent without children");
        };
        if self.is_free_leaf(c0) && self.is_free_leaf(c1) {
            self.remove(c0);
            self.remove(c1);
            self.node_mut(parent).children = None;
            self.merge_upwards(parent);
        }
    }

    fn is_free_leaf(&self, id: NodeId) -> bool {
        let n = self.node(id);
        !n.used && n.children.is_none()
    }

    /// Puts the current root under a new root of `outer`, next to a free `extra` leaf.
    fn wrap_root(&mut self, outer: IRect, extra: IRect) {
        let old_root = self.root;
        let new_root = self.insert(Node {
            rect: outer,
            used: false,
            parent: None,
            children: None,
        });
        let extra_id = self.insert(Node {
            rect: extra,
            used: false,
            parent: Some(new_root),
            children: None,
        });
        self.node_mut(old_root).parent = Some(new_root);
        self.node_mut(new_root).children = Some((old_root, extra_id));
        self.root = new_root;
    }

    // ── arena ─────────────────────────────────────────────────────────────

    fn insert(&mut self, node: Node) -> NodeId {
        if let Some(slot) = self.free_slots.pop() {
            self.nodes[slot as usize] = Some(node);
            NodeId(slot)
        } else {
            self.nodes.push(Some(node));
            NodeId((self.nodes.len() - 1) as u32)
        }
    }

    fn remove(&mut self, id: NodeId) {
        self.nodes[id.0 as usize] = None;
        self.free_slots.push(id.0);
    }

    fn node(&self, id: NodeId) -> &Node {
        self.nodes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .expect("stale packing node id")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .expect("stale packing node id")
    }
}

/// How close a rectangle is to a square: 1 for squares, in `[0, 1)` otherwise.
fn square(w: i32, h: i32) -> f64 {
    if w == 0 && h == 0 {
        return 0.0;
    }
    if w <= h {
        w as f64 / h as f64
    } else {
        h as f64 / w as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_disjoint(page: &Page) {
        let regions = page.allocated_regions();
        for (i, a) in regions.iter().enumerate() {
            assert!(a.is_in(IRect::from_size(page.width, page.height)));
            for b in &regions[i + 1..] {
                assert!(!a.overlaps(*b), "{a:?} overlaps {b:?}");
            }
        }
    }

    // ── alloc ─────────────────────────────────────────────────────────────

    #[test]
    fn exact_fit_uses_whole_page() {
        let mut page = Page::new(64, 64, 64);
        let n = page.alloc(64, 64).unwrap();
        assert_eq!(page.region(n), IRect::from_size(64, 64));
        assert!(page.alloc(1, 1).is_none());
    }

    #[test]
    fn too_large_returns_none() {
        let mut page = Page::new(32, 32, 1024);
        assert!(page.alloc(33, 1).is_none());
        assert!(page.is_empty());
    }

    #[test]
    fn fills_page_with_quarters() {
        let mut page = Page::new(64, 64, 64);
        let nodes: Vec<_> = (0..4).map(|_| page.alloc(32, 32).unwrap()).collect();
        assert!(page.alloc(1, 1).is_none());
        assert_eq!(page.allocated_count(), 4);
        assert_eq!(nodes.len(), 4);
        assert_disjoint(&page);
    }

    // ── free ──────────────────────────────────────────────────────────────

    #[test]
    fn free_merges_back_to_empty() {
        let mut page = Page::new(64, 64, 64);
        let a = page.alloc(10, 20).unwrap();
        let b = page.alloc(30, 5).unwrap();
        page.free(a);
        assert!(!page.is_empty());
        page.free(b);
        assert!(page.is_empty());
        // Fully merged: the whole page is allocatable again.
        assert!(page.alloc(64, 64).is_some());
    }

    #[test]
    #[should_panic(expected = "not allocated")]
    fn double_free_panics() {
        let mut page = Page::new(64, 64, 64);
        let a = page.alloc(16, 16).unwrap();
        let _b = page.alloc(16, 16).unwrap();
        page.free(a);
        page.free(a);
    }

    // ── extend ────────────────────────────────────────────────────────────

    #[test]
    fn extend_keeps_existing_regions() {
        let mut page = Page::new(32, 32, 128);
        let a = page.alloc(32, 32).unwrap();
        assert!(page.alloc(16, 16).is_none());
        page.extend(64, 64);
        assert_eq!(page.region(a), IRect::from_size(32, 32));
        let b = page.alloc(32, 32).unwrap();
        assert!(!page.region(a).overlaps(page.region(b)));
        assert_disjoint(&page);
    }

    #[test]
    fn grow_doubles_until_max() {
        let mut page = Page::new(16, 16, 64);
        let mut steps = 0;
        while page.grow() {
            steps += 1;
        }
        assert_eq!(page.size(), (64, 64));
        assert_eq!(steps, 4);
    }

    #[test]
    fn extended_page_merges_to_empty() {
        let mut page = Page::new(16, 16, 64);
        let a = page.alloc(16, 16).unwrap();
        page.extend(32, 32);
        let b = page.alloc(16, 16).unwrap();
        page.free(a);
        page.free(b);
        assert!(page.is_empty());
        assert!(page.alloc(32, 32).is_some());
    }
}
