#![warn(missing_docs)]

//! Math types for the shapegraph scene converter.
//!
//! Thin wrappers around nalgebra providing the two geometric values the
//! converter moves around: rigid-body poses ([`Transform`]) and axis-aligned
//! boxes ([`BoundingBox`]), plus tolerance constants for comparing them.

mod bbox;

pub use bbox::BoundingBox;

use nalgebra::{Isometry3, Quaternion, Translation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A rigid-body pose: a rotation followed by a translation.
///
/// Composition follows the usual convention: `a.then(&b)` is `a ∘ b`, i.e.
/// `b` is applied first. Every node in a scene tree carries one of these,
/// interpreted relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "TransformRepr", from = "TransformRepr")]
pub struct Transform {
    /// The underlying isometry.
    pub iso: Isometry3<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            iso: Isometry3::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            iso: Isometry3::from_parts(Translation3::new(dx, dy, dz), UnitQuaternion::identity()),
        }
    }

    /// Rotation about the X axis by `angle` radians.
    pub fn rotation_x(angle: f64) -> Self {
        Self::rotation_about_axis(&Vec3::x_axis(), angle)
    }

    /// Rotation about the Y axis by `angle` radians.
    pub fn rotation_y(angle: f64) -> Self {
        Self::rotation_about_axis(&Vec3::y_axis(), angle)
    }

    /// Rotation about the Z axis by `angle` radians.
    pub fn rotation_z(angle: f64) -> Self {
        Self::rotation_about_axis(&Vec3::z_axis(), angle)
    }

    /// Rotation about an arbitrary axis through the origin by `angle` radians.
    pub fn rotation_about_axis(axis: &Dir3, angle: f64) -> Self {
        Self {
            iso: Isometry3::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_axis_angle(axis, angle),
            ),
        }
    }

    /// Rotation by Euler angles in degrees, applied as X, then Y, then Z.
    pub fn from_euler_degrees(rx: f64, ry: f64, rz: f64) -> Self {
        Self {
            iso: Isometry3::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_euler_angles(rx.to_radians(), ry.to_radians(), rz.to_radians()),
            ),
        }
    }

    /// Build from a translation and a quaternion given as `[x, y, z, w]`.
    ///
    /// The quaternion is normalized, so slightly drifted input is accepted.
    pub fn from_tq(t: [f64; 3], q: [f64; 4]) -> Self {
        let rotation = UnitQuaternion::from_quaternion(Quaternion::new(q[3], q[0], q[1], q[2]));
        Self {
            iso: Isometry3::from_parts(Translation3::new(t[0], t[1], t[2]), rotation),
        }
    }

    /// Translation and quaternion (`[x, y, z, w]`) of this pose.
    pub fn to_tq(&self) -> ([f64; 3], [f64; 4]) {
        let t = self.iso.translation.vector;
        let q = self.iso.rotation.quaternion().coords;
        ([t.x, t.y, t.z], [q.x, q.y, q.z, q.w])
    }

    /// Compose: `self ∘ other`, so `other` is applied first.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            iso: self.iso * other.iso,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        self.iso.transform_point(p)
    }

    /// Transform a direction vector (rotation only).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        self.iso.transform_vector(v)
    }

    /// Inverse pose. Always exists for a rigid motion.
    pub fn inverse(&self) -> Self {
        Self {
            iso: self.iso.inverse(),
        }
    }

    /// Translation part as a vector.
    pub fn translation_vector(&self) -> Vec3 {
        self.iso.translation.vector
    }

    /// Whether every component is finite (no NaN or infinity).
    pub fn is_finite(&self) -> bool {
        let (t, q) = self.to_tq();
        t.iter().chain(q.iter()).all(|v| v.is_finite())
    }

    /// Whether this pose is the identity within `tol`.
    pub fn is_identity(&self, tol: &Tolerance) -> bool {
        self.iso.translation.vector.norm() < tol.linear && self.iso.rotation.angle() < tol.angular
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Serialized form of a [`Transform`]: translation plus `[x, y, z, w]` quaternion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct TransformRepr {
    t: [f64; 3],
    q: [f64; 4],
}

impl From<Transform> for TransformRepr {
    fn from(value: Transform) -> Self {
        let (t, q) = value.to_tq();
        Self { t, q }
    }
}

impl From<TransformRepr> for Transform {
    fn from(value: TransformRepr) -> Self {
        Transform::from_tq(value.t, value.q)
    }
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance.
    pub linear: f64,
    /// Angular tolerance in radians.
    pub angular: f64,
}

impl Tolerance {
    /// Default tolerances (1e-9 linear, 1e-9 rad angular).
    pub const DEFAULT: Self = Self {
        linear: 1e-9,
        angular: 1e-9,
    };
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_identity_transform() {
        let t = Transform::identity();
        let p = Point3::new(1.0, 2.0, 3.0);
        let result = t.apply_point(&p);
        assert!((result - p).norm() < 1e-12);
        assert!(t.is_identity(&Tolerance::DEFAULT));
    }

    #[test]
    fn test_translation() {
        let t = Transform::translation(10.0, 20.0, 30.0);
        let result = t.apply_point(&Point3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(result.x, 11.0, epsilon = 1e-12);
        assert_relative_eq!(result.y, 22.0, epsilon = 1e-12);
        assert_relative_eq!(result.z, 33.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_z_90() {
        let t = Transform::rotation_z(PI / 2.0);
        let result = t.apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert!(result.x.abs() < 1e-12);
        assert_relative_eq!(result.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_compose_applies_right_operand_first() {
        let rotate = Transform::rotation_z(PI / 2.0);
        let shift = Transform::translation(1.0, 0.0, 0.0);
        // shift first, then rotate: origin -> (1,0,0) -> (0,1,0)
        let p = rotate.then(&shift).apply_point(&Point3::origin());
        assert!(p.x.abs() < 1e-12);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);
        // rotate first, then shift: origin stays at origin, then -> (1,0,0)
        let q = shift.then(&rotate).apply_point(&Point3::origin());
        assert_relative_eq!(q.x, 1.0, epsilon = 1e-12);
        assert!(q.y.abs() < 1e-12);
    }

    #[test]
    fn test_inverse() {
        let t = Transform::translation(1.0, 2.0, 3.0).then(&Transform::rotation_x(0.3));
        let composed = t.then(&t.inverse());
        let p = Point3::new(5.0, 6.0, 7.0);
        assert!((composed.apply_point(&p) - p).norm() < 1e-12);
        assert!(composed.is_identity(&Tolerance {
            linear: 1e-9,
            angular: 1e-9
        }));
    }

    #[test]
    fn test_rotation_about_axis() {
        let axis = Dir3::new_normalize(Vec3::new(1.0, 1.0, 0.0));
        let t = Transform::rotation_about_axis(&axis, PI);
        let r = t.apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert!(r.x.abs() < 1e-12);
        assert_relative_eq!(r.y, 1.0, epsilon = 1e-12);
        assert!(r.z.abs() < 1e-12);
    }

    #[test]
    fn test_euler_degrees_matches_single_axis_rotation() {
        let a = Transform::from_euler_degrees(0.0, 0.0, 90.0);
        let b = Transform::rotation_z(PI / 2.0);
        let p = Point3::new(2.0, -1.0, 4.0);
        assert!((a.apply_point(&p) - b.apply_point(&p)).norm() < 1e-12);
    }

    #[test]
    fn test_tq_preserves_pose() {
        let t = Transform::translation(3.0, -2.0, 0.5).then(&Transform::rotation_y(0.7));
        let (tr, q) = t.to_tq();
        let back = Transform::from_tq(tr, q);
        let p = Point3::new(1.0, 2.0, 3.0);
        assert!((t.apply_point(&p) - back.apply_point(&p)).norm() < 1e-12);
    }

    #[test]
    fn test_transform_serializes_as_tq() {
        let t = Transform::translation(1.0, 2.0, 3.0);
        let v: serde_json::Value = serde_json::to_value(t).unwrap();
        assert_eq!(v["t"][0], 1.0);
        assert_eq!(v["q"][3], 1.0);
        let back: Transform = serde_json::from_value(v).unwrap();
        assert!((back.translation_vector() - Vec3::new(1.0, 2.0, 3.0)).norm() < 1e-12);
    }

    #[test]
    fn test_is_finite() {
        assert!(Transform::rotation_x(0.4).is_finite());
        assert!(!Transform::translation(f64::NAN, 0.0, 0.0).is_finite());
    }
}
