//! Shared 2-D geometry: axis-aligned boxes, partition lines and the
//! epsilon constants every other module agrees on.

use glam::DVec2;

/// Smallest distance between two points before being considered equal.
pub const DIST_EPSILON: f64 = 1.0 / 128.0;

/// Minimum length of a line segment post partitioning. Shorter segments
/// make numerically poor partition candidates.
pub const SHORT_SEG_EPSILON: f64 = 4.0;

/*──────────────────────── Aabb ────────────────────────*/

/// Axis-aligned bounding box in map space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: DVec2,
    pub max: DVec2,
}

impl Aabb {
    /// An inverted box that any `expand_point` call will snap onto.
    pub fn empty() -> Aabb {
        Aabb {
            min: DVec2::splat(f64::MAX),
            max: DVec2::splat(f64::MIN),
        }
    }

    pub fn from_point(p: DVec2) -> Aabb {
        Aabb { min: p, max: p }
    }

    pub fn from_points(a: DVec2, b: DVec2) -> Aabb {
        Aabb {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn expand_point(&mut self, p: DVec2) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn expand(&mut self, other: &Aabb) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    /// The box grown outward by `margin` on every side.
    pub fn grown(&self, margin: f64) -> Aabb {
        Aabb {
            min: self.min - DVec2::splat(margin),
            max: self.max + DVec2::splat(margin),
        }
    }

    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        !(self.max.x < other.min.x
            || self.min.x > other.max.x
            || self.max.y < other.min.y
            || self.min.y > other.max.y)
    }

    #[inline]
    pub fn contains_point(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    #[inline]
    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

/*──────────────────────── Partition ────────────────────────*/

/// An infinite splitting line: origin point plus a (non-normalized)
/// direction vector.
#[derive(Clone, Copy, Debug)]
pub struct Partition {
    pub origin: DVec2,
    pub direction: DVec2,
}

impl Partition {
    pub fn new(origin: DVec2, direction: DVec2) -> Partition {
        Partition { origin, direction }
    }

    /// Signed perpendicular distance from `p` to the partition line.
    /// Negative = front (side 0), positive = back (side 1).
    #[inline]
    pub fn perp_distance(&self, p: DVec2) -> f64 {
        let d = p - self.origin;
        self.direction.perp_dot(d) / self.direction.length()
    }

    /// 0 = front of the partition, 1 = back. Points exactly on the line
    /// land on the back side, matching the integer engine convention.
    #[inline]
    pub fn point_on_side(&self, p: DVec2) -> usize {
        let d = p - self.origin;
        if self.direction.perp_dot(d) < 0.0 { 0 } else { 1 }
    }

    /// Which side of the partition does `bounds` lie on wholly, if any?
    /// `Some(0)` front, `Some(1)` back, `None` when the box straddles.
    pub fn box_on_side(&self, bounds: &Aabb) -> Option<usize> {
        let corners = [
            DVec2::new(bounds.min.x, bounds.min.y),
            DVec2::new(bounds.max.x, bounds.min.y),
            DVec2::new(bounds.min.x, bounds.max.y),
            DVec2::new(bounds.max.x, bounds.max.y),
        ];
        let mut front = false;
        let mut back = false;
        for c in corners {
            if self.perp_distance(c) < 0.0 {
                front = true;
            } else {
                back = true;
            }
            if front && back {
                return None;
            }
        }
        Some(if front { 0 } else { 1 })
    }

    /// Fraction along `[from, from+dir]` at which it crosses this
    /// partition. Caller guarantees the lines are not parallel.
    pub fn intersect_fraction(&self, from: DVec2, dir: DVec2) -> f64 {
        let a = self.perp_distance(from);
        let b = self.perp_distance(from + dir);
        a / (a - b)
    }
}

/*──────────────────────── Tests ────────────────────────*/
