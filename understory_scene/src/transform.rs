// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node transforms.
//!
//! Transforms stay in the lightest representation that can express them:
//! identity, then pure translation, then a 2D [`Affine`], and only then a full
//! [`Transform3d`]. Building a transform from its contributors with the
//! `derive_with_*` methods promotes to 3D only for a non-zero Z translation, a
//! Z scale other than one, or a rotation about an axis other than Z.

use core::ops::Mul;

use kurbo::{Affine, Point, Rect, Vec2};

use crate::bounds::{Bounds, Box3};

/// Axis of a rotation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RotationAxis {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl RotationAxis {
    /// The X axis.
    pub const X: Self = Self::new(1.0, 0.0, 0.0);
    /// The Y axis.
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);
    /// The Z axis, pointing into the screen. Rotations about it stay 2D.
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    /// Creates an axis. It does not need to be normalized.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn is_z(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z != 0.0
    }
}

impl Default for RotationAxis {
    fn default() -> Self {
        Self::Z
    }
}

/// A 3D affine transform stored as the top three rows of a 4x4 matrix,
/// row-major: `[mxx, mxy, mxz, tx, myx, myy, myz, ty, mzx, mzy, mzz, tz]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform3d(pub [f64; 12]);

impl Transform3d {
    /// The identity transform.
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0,
    ]);

    /// A translation.
    pub const fn translation(x: f64, y: f64, z: f64) -> Self {
        Self([
            1.0, 0.0, 0.0, x, //
            0.0, 1.0, 0.0, y, //
            0.0, 0.0, 1.0, z,
        ])
    }

    /// A scale about the origin.
    pub const fn scaling(x: f64, y: f64, z: f64) -> Self {
        Self([
            x, 0.0, 0.0, 0.0, //
            0.0, y, 0.0, 0.0, //
            0.0, 0.0, z, 0.0,
        ])
    }

    /// A rotation of `degrees` about `axis` through the origin.
    ///
    /// A zero-length axis yields the identity.
    pub fn rotation(degrees: f64, axis: RotationAxis) -> Self {
        let len = (axis.x * axis.x + axis.y * axis.y + axis.z * axis.z).sqrt();
        if len == 0.0 {
            return Self::IDENTITY;
        }
        let (ux, uy, uz) = (axis.x / len, axis.y / len, axis.z / len);
        let (s, c) = degrees.to_radians().sin_cos();
        let t = 1.0 - c;
        Self([
            t * ux * ux + c,
            t * ux * uy - s * uz,
            t * ux * uz + s * uy,
            0.0,
            t * ux * uy + s * uz,
            t * uy * uy + c,
            t * uy * uz - s * ux,
            0.0,
            t * ux * uz - s * uy,
            t * uy * uz + s * ux,
            t * uz * uz + c,
            0.0,
        ])
    }

    /// Embeds a 2D affine in the XY plane.
    pub fn from_affine(affine: Affine) -> Self {
        let [a, b, c, d, e, f] = affine.as_coeffs();
        Self([
            a, c, 0.0, e, //
            b, d, 0.0, f, //
            0.0, 0.0, 1.0, 0.0,
        ])
    }

    /// Returns the equivalent 2D affine if this transform leaves Z alone.
    pub fn to_affine(&self) -> Option<Affine> {
        let m = &self.0;
        let flat = m[2] == 0.0
            && m[6] == 0.0
            && m[8] == 0.0
            && m[9] == 0.0
            && m[10] == 1.0
            && m[11] == 0.0;
        flat.then(|| Affine::new([m[0], m[4], m[1], m[5], m[3], m[7]]))
    }

    /// Transforms a point.
    pub fn transform_point(&self, p: [f64; 3]) -> [f64; 3] {
        let m = &self.0;
        [
            m[0] * p[0] + m[1] * p[1] + m[2] * p[2] + m[3],
            m[4] * p[0] + m[5] * p[1] + m[6] * p[2] + m[7],
            m[8] * p[0] + m[9] * p[1] + m[10] * p[2] + m[11],
        ]
    }

    fn transform_box(&self, b: &Box3) -> Box3 {
        let mut out = Box3::EMPTY;
        for x in [b.min[0], b.max[0]] {
            for y in [b.min[1], b.max[1]] {
                for z in [b.min[2], b.max[2]] {
                    out = out.add_point(self.transform_point([x, y, z]));
                }
            }
        }
        out
    }
}

impl Mul for Transform3d {
    type Output = Self;

    /// `self * rhs` applies `rhs` first.
    fn mul(self, rhs: Self) -> Self {
        let a = &self.0;
        let b = &rhs.0;
        let mut out = [0.0; 12];
        for r in 0..3 {
            for c in 0..4 {
                let mut v = a[r * 4] * b[c] + a[r * 4 + 1] * b[4 + c] + a[r * 4 + 2] * b[8 + c];
                if c == 3 {
                    v += a[r * 4 + 3];
                }
                out[r * 4 + c] = v;
            }
        }
        Self(out)
    }
}

/// A node's transform in the lightest representation that fits.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum NodeTransform {
    /// No transformation.
    #[default]
    Identity,
    /// A 2D translation.
    Translate {
        /// X offset.
        x: f64,
        /// Y offset.
        y: f64,
    },
    /// A general 2D affine.
    Affine2D(Affine),
    /// A 3D affine.
    Affine3D(Transform3d),
}

impl NodeTransform {
    /// Returns `true` for identity and pure translations.
    pub fn is_translate_or_identity(&self) -> bool {
        matches!(self, Self::Identity | Self::Translate { .. })
    }

    /// Returns `true` if the transform needs three dimensions.
    pub fn is_3d(&self) -> bool {
        matches!(self, Self::Affine3D(_))
    }

    /// Returns the transform as a 2D affine, if it is one.
    pub fn to_affine(&self) -> Option<Affine> {
        match *self {
            Self::Identity => Some(Affine::IDENTITY),
            Self::Translate { x, y } => Some(Affine::translate(Vec2::new(x, y))),
            Self::Affine2D(a) => Some(a),
            Self::Affine3D(m) => m.to_affine(),
        }
    }

    /// Returns the transform as a 3D matrix.
    pub fn to_transform3d(&self) -> Transform3d {
        match *self {
            Self::Identity => Transform3d::IDENTITY,
            Self::Translate { x, y } => Transform3d::translation(x, y, 0.0),
            Self::Affine2D(a) => Transform3d::from_affine(a),
            Self::Affine3D(m) => m,
        }
    }

    /// Returns `self * rhs`: `rhs` is applied first.
    #[must_use]
    pub fn concat(&self, rhs: &Self) -> Self {
        match (*self, *rhs) {
            (Self::Identity, r) => r,
            (l, Self::Identity) => l,
            (Self::Translate { x: ax, y: ay }, Self::Translate { x: bx, y: by }) => Self::Translate {
                x: ax + bx,
                y: ay + by,
            },
            (Self::Affine3D(_), _) | (_, Self::Affine3D(_)) => {
                Self::Affine3D(self.to_transform3d() * rhs.to_transform3d())
            }
            (l, r) => match (l.to_affine(), r.to_affine()) {
                (Some(a), Some(b)) => Self::Affine2D(a * b),
                _ => Self::Affine3D(l.to_transform3d() * r.to_transform3d()),
            },
        }
    }

    /// Appends a translation.
    #[must_use]
    pub fn derive_with_translation(&self, x: f64, y: f64, z: f64) -> Self {
        if z != 0.0 {
            return self.concat(&Self::Affine3D(Transform3d::translation(x, y, z)));
        }
        if x == 0.0 && y == 0.0 {
            return *self;
        }
        self.concat(&Self::Translate { x, y })
    }

    /// Appends a scale about the origin.
    #[must_use]
    pub fn derive_with_scale(&self, x: f64, y: f64, z: f64) -> Self {
        if z != 1.0 {
            return self.concat(&Self::Affine3D(Transform3d::scaling(x, y, z)));
        }
        if x == 1.0 && y == 1.0 {
            return *self;
        }
        self.concat(&Self::Affine2D(Affine::scale_non_uniform(x, y)))
    }

    /// Appends a rotation of `degrees` about `axis`.
    #[must_use]
    pub fn derive_with_rotation(&self, degrees: f64, axis: RotationAxis) -> Self {
        if degrees == 0.0 {
            return *self;
        }
        if axis.is_z() {
            let radians = degrees.to_radians() * axis.z.signum();
            return self.concat(&Self::Affine2D(Affine::rotate(radians)));
        }
        self.concat(&Self::Affine3D(Transform3d::rotation(degrees, axis)))
    }

    /// Maps bounds through this transform.
    ///
    /// Identity and translations offset the bounds directly, so translated
    /// bounds are exact. Other transforms return the axis-aligned box around
    /// the transformed corners.
    pub fn transform_bounds(&self, bounds: &Bounds) -> Bounds {
        match (*self, *bounds) {
            (_, Bounds::Empty) | (Self::Identity, _) => *bounds,
            (Self::Translate { x, y }, b) => b.translated(x, y, 0.0),
            (Self::Affine2D(a), Bounds::Rect(r)) => Bounds::Rect(transform_rect_bbox(a, r)),
            (t, Bounds::Rect(r)) => Bounds::Box(t.to_transform3d().transform_box(&Box3::from_rect(r))),
            (t, Bounds::Box(b)) => Bounds::Box(t.to_transform3d().transform_box(&b)),
        }
    }

    /// Maps a point in the XY plane, dropping any resulting depth.
    pub fn transform_point(&self, p: Point) -> Point {
        match *self {
            Self::Identity => p,
            Self::Translate { x, y } => Point::new(p.x + x, p.y + y),
            Self::Affine2D(a) => a * p,
            Self::Affine3D(m) => {
                let [x, y, _] = m.transform_point([p.x, p.y, 0.0]);
                Point::new(x, y)
            }
        }
    }
}

/// Transform an axis-aligned `Rect` by an `Affine` and return a conservative
/// axis-aligned bounding box.
pub(crate) fn transform_rect_bbox(affine: Affine, rect: Rect) -> Rect {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    let min_x = (a * rect.x0).min(a * rect.x1) + (c * rect.y0).min(c * rect.y1);
    let max_x = (a * rect.x0).max(a * rect.x1) + (c * rect.y0).max(c * rect.y1);
    let min_y = (b * rect.x0).min(b * rect.x1) + (d * rect.y0).min(d * rect.y1);
    let max_y = (b * rect.x0).max(b * rect.x1) + (d * rect.y0).max(d * rect.y1);
    Rect::new(min_x + e, min_y + f, max_x + e, max_y + f)
}

/// One entry of a node's explicit transform list.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TransformOp {
    /// A translation.
    Translate {
        /// X offset.
        x: f64,
        /// Y offset.
        y: f64,
        /// Z offset.
        z: f64,
    },
    /// A scale about a pivot.
    Scale {
        /// X factor.
        x: f64,
        /// Y factor.
        y: f64,
        /// Z factor.
        z: f64,
        /// Fixed point of the scale.
        pivot: Point,
    },
    /// A rotation about a pivot.
    Rotate {
        /// Angle in degrees, clockwise on screen for the Z axis.
        angle: f64,
        /// Rotation axis.
        axis: RotationAxis,
        /// Fixed point of the rotation.
        pivot: Point,
    },
    /// An arbitrary 2D affine.
    Affine(Affine),
    /// An arbitrary 3D affine.
    Matrix(Transform3d),
}

impl TransformOp {
    /// Returns the transform this operation applies.
    pub fn to_node_transform(&self) -> NodeTransform {
        let id = NodeTransform::Identity;
        match *self {
            Self::Translate { x, y, z } => id.derive_with_translation(x, y, z),
            Self::Scale { x, y, z, pivot } => id
                .derive_with_translation(pivot.x, pivot.y, 0.0)
                .derive_with_scale(x, y, z)
                .derive_with_translation(-pivot.x, -pivot.y, 0.0),
            Self::Rotate { angle, axis, pivot } => id
                .derive_with_translation(pivot.x, pivot.y, 0.0)
                .derive_with_rotation(angle, axis)
                .derive_with_translation(-pivot.x, -pivot.y, 0.0),
            Self::Affine(a) => NodeTransform::Affine2D(a),
            Self::Matrix(m) => NodeTransform::Affine3D(m),
        }
    }
}

/// Validity of a cached local-to-scene transform.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Validity {
    /// Up to date.
    Valid,
    /// Stale; recomputed on the next read.
    Invalid,
    /// Some transform in the scene changed since the value was last checked;
    /// the next read walks the ancestors to find out whether it is stale.
    Unknown,
}

/// Cached local-to-scene transform of one node.
#[derive(Copy, Clone, Debug)]
pub(crate) struct SceneTransform {
    pub(crate) value: NodeTransform,
    pub(crate) valid: bool,
    /// Scene transform epoch at which `value` was last known valid.
    pub(crate) checked_epoch: u64,
    /// Version stamped on `value` when it was computed.
    pub(crate) version: u64,
    /// Version of the parent's value this one was computed from.
    pub(crate) parent_version: u64,
    /// Version of the local-to-parent transform this one was computed from.
    pub(crate) local_version: u64,
}

impl Default for SceneTransform {
    fn default() -> Self {
        Self {
            value: NodeTransform::Identity,
            valid: false,
            checked_epoch: 0,
            version: 0,
            parent_version: 0,
            local_version: 0,
        }
    }
}

impl SceneTransform {
    pub(crate) fn validity(&self, epoch: u64) -> Validity {
        match (self.valid, self.checked_epoch == epoch) {
            (false, _) => Validity::Invalid,
            (true, true) => Validity::Valid,
            (true, false) => Validity::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn contributors_stay_in_the_lightest_form() {
        let t = NodeTransform::Identity.derive_with_translation(5.0, 3.0, 0.0);
        assert_eq!(t, NodeTransform::Translate { x: 5.0, y: 3.0 }, "translation stays a translation");
        let t = t.derive_with_rotation(90.0, RotationAxis::Z);
        assert!(matches!(t, NodeTransform::Affine2D(_)), "Z rotation stays 2D");
        let t = t.derive_with_scale(2.0, 2.0, 1.0);
        assert!(!t.is_3d(), "XY scale stays 2D");
        let t = t.derive_with_translation(0.0, 0.0, 4.0);
        assert!(t.is_3d(), "Z translation promotes");
        let t = NodeTransform::Identity.derive_with_rotation(30.0, RotationAxis::Y);
        assert!(t.is_3d(), "Y rotation promotes");
    }

    #[test]
    fn no_op_contributors_are_skipped() {
        let t = NodeTransform::Identity
            .derive_with_translation(0.0, 0.0, 0.0)
            .derive_with_scale(1.0, 1.0, 1.0)
            .derive_with_rotation(0.0, RotationAxis::X);
        assert_eq!(t, NodeTransform::Identity, "identity survives no-op contributors");
    }

    #[test]
    fn translation_offsets_bounds_exactly() {
        let b = Bounds::Rect(Rect::new(0.1, 0.2, 10.3, 10.7));
        let t = NodeTransform::Translate { x: 5.0, y: 3.0 };
        assert_eq!(
            t.transform_bounds(&b),
            Bounds::Rect(Rect::new(0.1 + 5.0, 0.2 + 3.0, 10.3 + 5.0, 10.7 + 3.0)),
            "plain addition, no matrix"
        );
    }

    #[test]
    fn z_rotation_matches_between_2d_and_3d() {
        let flat = NodeTransform::Identity.derive_with_rotation(90.0, RotationAxis::Z);
        let deep = NodeTransform::Affine3D(Transform3d::rotation(90.0, RotationAxis::Z));
        let p = Point::new(10.0, 0.0);
        assert!(approx(flat.transform_point(p), Point::new(0.0, 10.0)), "2D rotation");
        assert!(approx(deep.transform_point(p), Point::new(0.0, 10.0)), "3D rotation");
    }

    #[test]
    fn pivot_rotation_keeps_the_pivot_fixed() {
        let op = TransformOp::Rotate {
            angle: 180.0,
            axis: RotationAxis::Z,
            pivot: Point::new(5.0, 5.0),
        };
        let t = op.to_node_transform();
        assert!(approx(t.transform_point(Point::new(5.0, 5.0)), Point::new(5.0, 5.0)), "pivot fixed");
        assert!(approx(t.transform_point(Point::new(0.0, 0.0)), Point::new(10.0, 10.0)), "corner flipped");
    }

    #[test]
    fn matrix_product_applies_rhs_first() {
        let t = Transform3d::translation(1.0, 0.0, 0.0) * Transform3d::scaling(2.0, 2.0, 2.0);
        assert_eq!(t.transform_point([1.0, 1.0, 1.0]), [3.0, 2.0, 2.0], "scale then translate");
        assert_eq!(
            Transform3d::from_affine(Affine::translate((2.0, 3.0))).to_affine(),
            Some(Affine::translate((2.0, 3.0))),
            "flat matrices convert back"
        );
    }

    #[test]
    fn three_d_bounds_keep_depth() {
        let t = NodeTransform::Identity.derive_with_translation(0.0, 0.0, 7.0);
        let Bounds::Box(b) = t.transform_bounds(&Bounds::Rect(Rect::new(0.0, 0.0, 1.0, 1.0))) else {
            panic!("expected 3D bounds");
        };
        assert_eq!(b.min[2], 7.0, "depth carried");
    }
}
