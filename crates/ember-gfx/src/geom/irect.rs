/// Half-open integer rectangle `[min, max)` in pixels.
///
/// A rectangle with `max <= min` on either axis is empty. Empty rectangles
/// compare equal to each other only when their coordinates match; use
/// [`IRect::is_empty`] for emptiness checks.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct IRect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl IRect {
    #[inline]
    pub const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Rectangle at `(x, y)` with the given size.
    #[inline]
    pub const fn from_xywh(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    /// Rectangle at the origin with the given size.
    #[inline]
    pub const fn from_size(w: i32, h: i32) -> Self {
        Self::new(0, 0, w, h)
    }

    #[inline]
    pub const fn dx(self) -> i32 {
        self.max_x - self.min_x
    }

    #[inline]
    pub const fn dy(self) -> i32 {
        self.max_y - self.min_y
    }

    #[inline]
    pub const fn size(self) -> (i32, i32) {
        (self.dx(), self.dy())
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.max_x <= self.min_x || self.max_y <= self.min_y
    }

    /// Largest rectangle contained in both; empty results collapse to `IRect::default()`.
    #[inline]
    pub fn intersect(self, other: IRect) -> IRect {
        let r = IRect::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        );
        if r.is_empty() { IRect::default() } else { r }
    }

    /// Smallest rectangle containing both. Empty operands are ignored.
    #[inline]
    pub fn union(self, other: IRect) -> IRect {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        IRect::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    #[inline]
    pub fn overlaps(self, other: IRect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    /// Whether `self` lies entirely inside `other`. An empty rectangle is inside anything.
    #[inline]
    pub fn is_in(self, other: IRect) -> bool {
        if self.is_empty() {
            return true;
        }
        other.min_x <= self.min_x
            && other.min_y <= self.min_y
            && self.max_x <= other.max_x
            && self.max_y <= other.max_y
    }

    #[inline]
    pub fn contains_point(self, x: i32, y: i32) -> bool {
        self.min_x <= x && x < self.max_x && self.min_y <= y && y < self.max_y
    }

    #[inline]
    pub const fn translate(self, dx: i32, dy: i32) -> IRect {
        IRect::new(self.min_x + dx, self.min_y + dy, self.max_x + dx, self.max_y + dy)
    }

    /// Number of bytes an RGBA8 buffer covering this rectangle needs.
    #[inline]
    pub fn rgba_len(self) -> usize {
        if self.is_empty() {
            return 0;
        }
        4 * self.dx() as usize * self.dy() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x0: i32, y0: i32, x1: i32, y1: i32) -> IRect {
        IRect::new(x0, y0, x1, y1)
    }

    // ── intersect ─────────────────────────────────────────────────────────

    #[test]
    fn intersect_overlapping() {
        assert_eq!(r(0, 0, 10, 10).intersect(r(5, 5, 15, 15)), r(5, 5, 10, 10));
    }

    #[test]
    fn intersect_touching_edge_is_empty() {
        assert!(r(0, 0, 10, 10).intersect(r(10, 0, 20, 10)).is_empty());
    }

    #[test]
    fn intersect_disjoint_collapses_to_default() {
        assert_eq!(r(0, 0, 5, 5).intersect(r(20, 20, 25, 25)), IRect::default());
    }

    // ── containment ───────────────────────────────────────────────────────

    #[test]
    fn is_in_contained() {
        assert!(r(2, 2, 4, 4).is_in(r(0, 0, 10, 10)));
        assert!(!r(8, 8, 12, 12).is_in(r(0, 0, 10, 10)));
    }

    #[test]
    fn empty_is_in_anything() {
        assert!(r(50, 50, 50, 60).is_in(r(0, 0, 1, 1)));
    }

    #[test]
    fn contains_point_is_half_open() {
        let rect = r(0, 0, 4, 4);
        assert!(rect.contains_point(0, 0));
        assert!(rect.contains_point(3, 3));
        assert!(!rect.contains_point(4, 0));
    }

    // ── overlaps / union ──────────────────────────────────────────────────

    #[test]
    fn overlaps_ignores_touching() {
        assert!(r(0, 0, 10, 10).overlaps(r(9, 9, 11, 11)));
        assert!(!r(0, 0, 10, 10).overlaps(r(10, 10, 11, 11)));
    }

    #[test]
    fn union_skips_empty() {
        assert_eq!(r(0, 0, 0, 0).union(r(1, 1, 2, 2)), r(1, 1, 2, 2));
        assert_eq!(r(0, 0, 1, 1).union(r(3, 3, 4, 4)), r(0, 0, 4, 4));
    }

    // ── sizes ─────────────────────────────────────────────────────────────

    #[test]
    fn rgba_len_matches_area() {
        assert_eq!(r(1, 1, 3, 4).rgba_len(), 4 * 2 * 3);
        assert_eq!(r(3, 3, 1, 1).rgba_len(), 0);
    }
}
