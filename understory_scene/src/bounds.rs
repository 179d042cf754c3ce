// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounds values and the lazily validated caches that hold them.

use kurbo::Rect;

use crate::types::{Effect, NodeId};

/// An axis-aligned box in three dimensions.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Box3 {
    /// Minimum corner.
    pub min: [f64; 3],
    /// Maximum corner.
    pub max: [f64; 3],
}

impl Box3 {
    /// A box containing nothing; adding a point yields that point.
    pub const EMPTY: Self = Self {
        min: [f64::INFINITY; 3],
        max: [f64::NEG_INFINITY; 3],
    };

    /// A flat box at `z = 0`.
    pub fn from_rect(r: Rect) -> Self {
        Self {
            min: [r.x0, r.y0, 0.0],
            max: [r.x1, r.y1, 0.0],
        }
    }

    /// Grows the box to contain `p`.
    #[must_use]
    pub fn add_point(self, p: [f64; 3]) -> Self {
        let mut out = self;
        for i in 0..3 {
            out.min[i] = out.min[i].min(p[i]);
            out.max[i] = out.max[i].max(p[i]);
        }
        out
    }

    /// Projection onto the XY plane.
    pub fn to_rect(&self) -> Rect {
        Rect::new(self.min[0], self.min[1], self.max[0], self.max[1])
    }

    fn is_empty(&self) -> bool {
        (0..3).any(|i| self.max[i] < self.min[i])
    }
}

/// Bounds of a node in some coordinate space.
///
/// Zero-sized bounds are not empty; a node with no content at all has
/// [`Bounds::Empty`].
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum Bounds {
    /// No content.
    #[default]
    Empty,
    /// Flat bounds in the XY plane.
    Rect(Rect),
    /// Bounds with depth, produced by 3D transforms.
    Box(Box3),
}

impl Bounds {
    /// Creates flat bounds; a rectangle with negative extent is empty.
    pub fn from_rect(r: Rect) -> Self {
        if r.x1 < r.x0 || r.y1 < r.y0 {
            Self::Empty
        } else {
            Self::Rect(r)
        }
    }

    /// Returns `true` for empty bounds.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Rect(r) => r.x1 < r.x0 || r.y1 < r.y0,
            Self::Box(b) => b.is_empty(),
        }
    }

    /// Projection onto the XY plane, or `None` when empty.
    pub fn rect(&self) -> Option<Rect> {
        if self.is_empty() {
            return None;
        }
        match self {
            Self::Empty => None,
            Self::Rect(r) => Some(*r),
            Self::Box(b) => Some(b.to_rect()),
        }
    }

    /// Projection onto the XY plane, or a zero rectangle when empty.
    pub fn rect_or_zero(&self) -> Rect {
        self.rect().unwrap_or(Rect::ZERO)
    }

    fn to_box(self) -> Option<Box3> {
        if self.is_empty() {
            return None;
        }
        match self {
            Self::Empty => None,
            Self::Rect(r) => Some(Box3::from_rect(r)),
            Self::Box(b) => Some(b),
        }
    }

    /// Smallest bounds containing both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        match (*self, *other) {
            (a, b) if b.is_empty() => a,
            (a, b) if a.is_empty() => b,
            (Self::Rect(a), Self::Rect(b)) => Self::Rect(a.union(b)),
            (a, b) => match (a.to_box(), b.to_box()) {
                (Some(a), Some(b)) => Self::Box(a.add_point(b.min).add_point(b.max)),
                _ => Self::Empty,
            },
        }
    }

    /// Overlap of the XY projections; empty when they do not overlap.
    #[must_use]
    pub fn intersect_rect(&self, clip: Rect) -> Self {
        match *self {
            Self::Empty => Self::Empty,
            Self::Rect(r) => Self::from_rect(r.intersect(clip)).non_degenerate(r, clip),
            Self::Box(mut b) => {
                b.min[0] = b.min[0].max(clip.x0);
                b.min[1] = b.min[1].max(clip.y0);
                b.max[0] = b.max[0].min(clip.x1);
                b.max[1] = b.max[1].min(clip.y1);
                if b.is_empty() {
                    Self::Empty
                } else {
                    Self::Box(b)
                }
            }
        }
    }

    /// `kurbo` clamps non-overlapping intersections to a zero-size rectangle;
    /// treat those as empty.
    fn non_degenerate(self, a: Rect, b: Rect) -> Self {
        if a.x0 > b.x1 || b.x0 > a.x1 || a.y0 > b.y1 || b.y0 > a.y1 {
            Self::Empty
        } else {
            self
        }
    }

    /// Offsets the bounds.
    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64, dz: f64) -> Self {
        match *self {
            Self::Empty => Self::Empty,
            Self::Rect(r) if dz == 0.0 => {
                Self::Rect(Rect::new(r.x0 + dx, r.y0 + dy, r.x1 + dx, r.y1 + dy))
            }
            Self::Rect(r) => Self::Box(Box3::from_rect(r)).translated(dx, dy, dz),
            Self::Box(b) => Self::Box(Box3 {
                min: [b.min[0] + dx, b.min[1] + dy, b.min[2] + dz],
                max: [b.max[0] + dx, b.max[1] + dy, b.max[2] + dz],
            }),
        }
    }

    /// Grows the bounds by the area an effect touches.
    #[must_use]
    pub fn with_effect(&self, effect: &Effect) -> Self {
        match *self {
            Self::Empty => Self::Empty,
            Self::Rect(r) => Self::Rect(effect.bounds(r)),
            Self::Box(b) => {
                let r = effect.bounds(b.to_rect());
                Self::Box(Box3 {
                    min: [r.x0, r.y0, b.min[2]],
                    max: [r.x1, r.y1, b.max[2]],
                })
            }
        }
    }
}

/// A cached value that is either valid or invalid.
#[derive(Clone, Debug, Default)]
pub(crate) struct Lazy<T> {
    value: T,
    valid: bool,
}

impl<T> Lazy<T> {
    /// Marks the value stale. Returns `true` only on the valid-to-invalid
    /// transition.
    pub(crate) fn invalidate(&mut self) -> bool {
        core::mem::replace(&mut self.valid, false)
    }

    pub(crate) fn get(&self) -> Option<&T> {
        self.valid.then_some(&self.value)
    }

    pub(crate) fn set(&mut self, value: T) {
        self.value = value;
        self.valid = true;
    }
}

/// A cached per-node quantity that can be observed for invalidation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CachedQuantity {
    /// Intrinsic bounds of the node's kind.
    GeomBounds,
    /// Bounds used by layout.
    LayoutBounds,
    /// Geometry bounds with effect and clip applied.
    LocalBounds,
    /// Local bounds in the parent's coordinate space.
    BoundsInParent,
    /// Transform from local to parent space.
    LocalToParent,
    /// Transform from local to scene space.
    LocalToScene,
}

impl CachedQuantity {
    pub(crate) const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// A cached quantity went from valid to invalid while observed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Invalidation {
    /// The node owning the quantity.
    pub node: NodeId,
    /// Which quantity.
    pub quantity: CachedQuantity,
}

/// Recomputation counters, per cached quantity.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Geometry bounds computations.
    pub geom_bounds: u64,
    /// Layout bounds computations.
    pub layout_bounds: u64,
    /// Local bounds computations.
    pub local_bounds: u64,
    /// Bounds-in-parent computations.
    pub bounds_in_parent: u64,
    /// Local-to-parent transform computations.
    pub local_to_parent: u64,
    /// Local-to-scene transform computations.
    pub local_to_scene: u64,
    /// Local-to-scene reads that walked the ancestors and found the value
    /// still valid.
    pub local_to_scene_revalidated: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_reports_only_the_first_invalidation() {
        let mut c = Lazy::<u32>::default();
        assert!(!c.invalidate(), "starts invalid");
        c.set(3);
        assert_eq!(c.get(), Some(&3), "valid after set");
        assert!(c.invalidate(), "valid to invalid");
        assert!(!c.invalidate(), "already invalid");
        assert_eq!(c.get(), None, "invalid reads nothing");
    }

    #[test]
    fn union_skips_empty_bounds() {
        let a = Bounds::Rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(a.union(&Bounds::Empty), a, "empty right");
        assert_eq!(Bounds::Empty.union(&a), a, "empty left");
        let b = Bounds::Rect(Rect::new(5.0, 5.0, 20.0, 12.0));
        assert_eq!(a.union(&b), Bounds::Rect(Rect::new(0.0, 0.0, 20.0, 12.0)), "rect union");
    }

    #[test]
    fn disjoint_intersection_is_empty() {
        let a = Bounds::Rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(a.intersect_rect(Rect::new(20.0, 20.0, 30.0, 30.0)).is_empty(), "disjoint");
        assert_eq!(
            a.intersect_rect(Rect::new(5.0, -5.0, 30.0, 5.0)),
            Bounds::Rect(Rect::new(5.0, 0.0, 10.0, 5.0)),
            "overlap"
        );
    }

    #[test]
    fn zero_size_bounds_are_not_empty() {
        let point = Bounds::from_rect(Rect::new(3.0, 3.0, 3.0, 3.0));
        assert!(!point.is_empty(), "a point has bounds");
        assert!(Bounds::from_rect(Rect::new(3.0, 3.0, 2.0, 3.0)).is_empty(), "negative width");
    }
}
