//! Axis-aligned bounding boxes.
//!
//! An absent box (empty geometry) is modelled as `Option<BoundingBox>` by
//! callers; a `BoundingBox` value itself is always non-empty.

use serde::{Deserialize, Serialize};

use crate::{Point3, Transform, Vec3};

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl BoundingBox {
    /// Create a box from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// A degenerate box containing a single point.
    pub fn from_point(p: Point3) -> Self {
        Self { min: p, max: p }
    }

    /// Smallest box containing all `points`, or `None` if there are none.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point3>,
    {
        let mut iter = points.into_iter();
        let mut bb = Self::from_point(iter.next()?);
        for p in iter {
            bb.include_point(&p);
        }
        Some(bb)
    }

    /// Expand this box to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let mut out = *self;
        out.include_point(&other.min);
        out.include_point(&other.max);
        out
    }

    /// Union over optional boxes; absent boxes are skipped.
    pub fn union_all<'a, I>(boxes: I) -> Option<BoundingBox>
    where
        I: IntoIterator<Item = &'a BoundingBox>,
    {
        boxes.into_iter().fold(None, |acc: Option<BoundingBox>, bb| {
            Some(match acc {
                Some(a) => a.union(bb),
                None => *bb,
            })
        })
    }

    /// The eight corners of the box.
    pub fn corners(&self) -> [Point3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(b.x, b.y, b.z),
            Point3::new(a.x, b.y, b.z),
        ]
    }

    /// Axis-aligned box enclosing this box after applying `t`.
    ///
    /// Conservative under rotation: the result encloses all eight transformed
    /// corners, so it may be larger than the box of the transformed geometry.
    pub fn transformed(&self, t: &Transform) -> BoundingBox {
        let corners = self.corners();
        let mut out = Self::from_point(t.apply_point(&corners[0]));
        for c in &corners[1..] {
            out.include_point(&t.apply_point(c));
        }
        out
    }

    /// Edge lengths along X, Y and Z.
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Center point.
    pub fn center(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    /// Length of the min-to-max diagonal.
    pub fn diagonal(&self) -> f64 {
        self.size().norm()
    }

    /// Whether `other` lies inside this box, allowing `tol` slack per side.
    pub fn contains(&self, other: &BoundingBox, tol: f64) -> bool {
        self.min.x <= other.min.x + tol
            && self.min.y <= other.min.y + tol
            && self.min.z <= other.min.z + tol
            && self.max.x + tol >= other.max.x
            && self.max.y + tol >= other.max.y
            && self.max.z + tol >= other.max.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn unit_box() -> BoundingBox {
        BoundingBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_from_points_empty() {
        assert!(BoundingBox::from_points(Vec::new()).is_none());
    }

    #[test]
    fn test_from_points() {
        let bb = BoundingBox::from_points(vec![
            Point3::new(1.0, -2.0, 0.0),
            Point3::new(-1.0, 3.0, 5.0),
        ])
        .unwrap();
        assert_eq!(bb.min, Point3::new(-1.0, -2.0, 0.0));
        assert_eq!(bb.max, Point3::new(1.0, 3.0, 5.0));
    }

    #[test]
    fn test_union_contains_both() {
        let a = unit_box();
        let b = BoundingBox::new(Point3::new(2.0, 2.0, 2.0), Point3::new(3.0, 3.0, 3.0));
        let u = a.union(&b);
        assert!(u.contains(&a, 0.0));
        assert!(u.contains(&b, 0.0));
        assert_relative_eq!(u.diagonal(), (27.0f64).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_union_all_skips_nothing_and_handles_empty() {
        assert!(BoundingBox::union_all(Vec::<&BoundingBox>::new()).is_none());
        let a = unit_box();
        let b = BoundingBox::from_point(Point3::new(-1.0, 0.0, 0.0));
        let u = BoundingBox::union_all([&a, &b]).unwrap();
        assert_eq!(u.min.x, -1.0);
        assert_eq!(u.max.x, 1.0);
    }

    #[test]
    fn test_transformed_translation() {
        let bb = unit_box().transformed(&Transform::translation(10.0, 0.0, -1.0));
        assert_eq!(bb.min, Point3::new(10.0, 0.0, -1.0));
        assert_eq!(bb.max, Point3::new(11.0, 1.0, 0.0));
    }

    #[test]
    fn test_transformed_rotation_is_conservative() {
        let bb = unit_box().transformed(&Transform::rotation_z(PI / 4.0));
        let half = (0.5f64).sqrt();
        assert_relative_eq!(bb.min.x, -half, epsilon = 1e-12);
        assert_relative_eq!(bb.max.x, half, epsilon = 1e-12);
        assert_relative_eq!(bb.max.y, 2.0 * half, epsilon = 1e-12);
        assert_relative_eq!(bb.max.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_center_and_size() {
        let bb = BoundingBox::new(Point3::new(-2.0, 0.0, 1.0), Point3::new(2.0, 4.0, 3.0));
        assert_eq!(bb.center(), Point3::new(0.0, 2.0, 2.0));
        assert_eq!(bb.size(), Vec3::new(4.0, 4.0, 2.0));
    }
}
