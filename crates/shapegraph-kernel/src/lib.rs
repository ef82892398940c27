#![warn(missing_docs)]

//! Collaborator interface between the shapegraph converter and a geometry
//! kernel.
//!
//! The converter never inspects concrete input types. It asks a
//! [`ShapeClassifier`] for a closed [`VariantTag`] per input object and for
//! the handful of accessors each tag needs, and it asks a [`GeometryKernel`]
//! for topology identity, relocation, rough bounds and meshes.

mod color;
mod mesh;

pub use color::{ColorError, Rgba};
pub use mesh::{Mesh, MeshError};
pub use shapegraph_math;

use serde::{Deserialize, Serialize};
use shapegraph_math::{BoundingBox, Point3, Transform, Vec3};
use std::fmt;
use std::hash::Hash;

/// Classification of an input object or shape.
///
/// Produced once per object by the classifier; the converter dispatches on
/// this value alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantTag {
    /// Non-geometric scalar (number, bool, string, enum). Skipped.
    Scalar,
    /// Anything the classifier does not recognize.
    Unsupported,
    /// Ordered sequence of inputs.
    Sequence,
    /// Keyed mapping of inputs (keys become names).
    Mapping,
    /// Assembly-like container with named sub-parts and its own pose.
    Assembly,
    /// Compound shape; may be homogeneous or mixed.
    Compound,
    /// Solid shape.
    Solid,
    /// Shell (connected faces).
    Shell,
    /// Face.
    Face,
    /// Wire (connected edges).
    Wire,
    /// Edge.
    Edge,
    /// Vertex or point-like value.
    Vertex,
    /// Pose or plane value, shown as a coordinate system.
    Pose,
    /// Axis value.
    Axis,
}

impl VariantTag {
    /// Topological dimension of a simple shape tag.
    ///
    /// `None` for compounds and non-shape tags.
    pub fn dimension(self) -> Option<u8> {
        match self {
            VariantTag::Solid => Some(3),
            VariantTag::Shell | VariantTag::Face => Some(2),
            VariantTag::Wire | VariantTag::Edge => Some(1),
            VariantTag::Vertex => Some(0),
            _ => None,
        }
    }
}

/// A coordinate system: origin plus X and Z directions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordFrame {
    /// Origin.
    pub origin: Point3,
    /// X direction.
    pub x_dir: Vec3,
    /// Z direction (normal).
    pub z_dir: Vec3,
}

impl CoordFrame {
    /// The frame a pose maps the world axes onto.
    pub fn from_transform(t: &Transform) -> Self {
        Self {
            origin: t.apply_point(&Point3::origin()),
            x_dir: t.apply_vec(&Vec3::x()),
            z_dir: t.apply_vec(&Vec3::z()),
        }
    }

    /// The same frame expressed in the parent of `t`.
    pub fn transformed(&self, t: &Transform) -> Self {
        Self {
            origin: t.apply_point(&self.origin),
            x_dir: t.apply_vec(&self.x_dir),
            z_dir: t.apply_vec(&self.z_dir),
        }
    }
}

/// An axis: origin plus direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisFrame {
    /// Origin.
    pub origin: Point3,
    /// Direction.
    pub z_dir: Vec3,
}

impl AxisFrame {
    /// The same axis expressed in the parent of `t`.
    pub fn transformed(&self, t: &Transform) -> Self {
        Self {
            origin: t.apply_point(&self.origin),
            z_dir: t.apply_vec(&self.z_dir),
        }
    }
}

/// One element of a sequence or mapping.
#[derive(Debug)]
pub struct Child<'a, O> {
    /// Mapping key, `None` for sequence elements.
    pub key: Option<String>,
    /// The element.
    pub object: &'a O,
}

/// Everything the converter needs from an assembly-like container.
#[derive(Debug)]
pub struct AssemblyView<'a, O, S> {
    /// Assembly name, if it has one.
    pub name: Option<String>,
    /// Pose of the assembly relative to its parent.
    pub pose: Transform,
    /// Shape owned by the assembly itself, rendered before its parts.
    pub shape: Option<S>,
    /// Sub-parts in order.
    pub parts: Vec<&'a O>,
    /// Named mate frames, in the assembly's frame.
    pub mates: Vec<(String, CoordFrame)>,
}

/// Classifies opaque input objects coming from an upstream modeling layer.
pub trait ShapeClassifier {
    /// Input object type.
    type Object;
    /// Shape type handed to the geometry kernel.
    type Shape;

    /// Classify an object. Must be cheap; called once per object.
    fn classify(&self, obj: &Self::Object) -> VariantTag;

    /// Human-readable type name, used in diagnostics.
    fn type_name(&self, obj: &Self::Object) -> String;

    /// Label or name attached to the object.
    fn label(&self, _obj: &Self::Object) -> Option<String> {
        None
    }

    /// Color attached to the object.
    fn color(&self, _obj: &Self::Object) -> Option<Rgba> {
        None
    }

    /// Shapes the object was derived from, nearest first.
    fn parents(&self, _obj: &Self::Object) -> Vec<Self::Shape> {
        Vec::new()
    }

    /// Elements of a [`VariantTag::Sequence`] or [`VariantTag::Mapping`].
    fn children<'a>(&self, obj: &'a Self::Object) -> Vec<Child<'a, Self::Object>>;

    /// View of a [`VariantTag::Assembly`].
    fn assembly<'a>(&self, obj: &'a Self::Object)
        -> Option<AssemblyView<'a, Self::Object, Self::Shape>>;

    /// Kernel shape of an object classified with a shape tag.
    fn shape(&self, obj: &Self::Object) -> Option<Self::Shape>;

    /// Frame of a [`VariantTag::Pose`] object.
    fn coord_frame(&self, obj: &Self::Object) -> Option<CoordFrame>;

    /// Axis of a [`VariantTag::Axis`] object.
    fn axis_frame(&self, obj: &Self::Object) -> Option<AxisFrame>;
}

/// Geometric operations the converter consumes from a B-rep kernel.
///
/// Implementations must be shareable across the tessellation worker pool.
pub trait GeometryKernel: Sync {
    /// Shape handle. Cloning must be cheap (shared topology).
    type Shape: Clone + Send + Sync;
    /// Topology identity. Equal for wrappers around the same underlying
    /// B-rep data, regardless of wrapper lifetime or applied pose.
    type Key: Eq + Hash + Clone + Send + Sync + fmt::Debug;

    /// Shape tag of `shape` (never a non-shape tag).
    fn shape_tag(&self, shape: &Self::Shape) -> VariantTag;

    /// Direct elements of a compound, with the compound's pose applied.
    /// A non-compound yields itself.
    fn elements_of(&self, shape: &Self::Shape) -> Vec<Self::Shape>;

    /// All solids contained in `shape`.
    fn solids_of(&self, shape: &Self::Shape) -> Vec<Self::Shape>;

    /// All faces contained in `shape`.
    fn faces_of(&self, shape: &Self::Shape) -> Vec<Self::Shape>;

    /// All edges contained in `shape`.
    fn edges_of(&self, shape: &Self::Shape) -> Vec<Self::Shape>;

    /// All vertices contained in `shape`.
    fn vertices_of(&self, shape: &Self::Shape) -> Vec<Self::Shape>;

    /// Topology identity of `shape`.
    fn topology_identity(&self, shape: &Self::Shape) -> Self::Key;

    /// Factor the shape's own pose out: returns the pose-free shape sharing
    /// the same topology, and the pose that was removed.
    fn relocate(&self, shape: &Self::Shape) -> (Self::Shape, Transform);

    /// Cheap, possibly oversized box of `shape`, optionally moved by
    /// `transform`. `None` for empty shapes.
    fn rough_bounding_box(
        &self,
        shape: &Self::Shape,
        transform: Option<&Transform>,
    ) -> Option<BoundingBox>;

    /// Tessellate `shape` at absolute deflection `quality`.
    fn generate_mesh(
        &self,
        shape: &Self::Shape,
        quality: f64,
        angular_tolerance: f64,
        include_edges: bool,
    ) -> Result<Mesh, MeshError>;

    /// Discretize edges into line segments with at most `deflection` error.
    fn discretize_edges(&self, edges: &[Self::Shape], deflection: f64) -> Result<Mesh, MeshError>;

    /// Positions of vertex shapes.
    fn vertex_points(&self, vertices: &[Self::Shape]) -> Vec<Point3>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_dimension() {
        assert_eq!(VariantTag::Solid.dimension(), Some(3));
        assert_eq!(VariantTag::Shell.dimension(), Some(2));
        assert_eq!(VariantTag::Wire.dimension(), Some(1));
        assert_eq!(VariantTag::Vertex.dimension(), Some(0));
        assert_eq!(VariantTag::Compound.dimension(), None);
        assert_eq!(VariantTag::Pose.dimension(), None);
    }

    #[test]
    fn test_coord_frame_from_transform() {
        let t = Transform::translation(1.0, 2.0, 3.0).then(&Transform::rotation_z(PI / 2.0));
        let f = CoordFrame::from_transform(&t);
        assert!((f.origin - Point3::new(1.0, 2.0, 3.0)).norm() < 1e-12);
        assert!((f.x_dir - Vec3::y()).norm() < 1e-12);
        assert!((f.z_dir - Vec3::z()).norm() < 1e-12);
    }

    #[test]
    fn test_axis_transformed() {
        let a = AxisFrame {
            origin: Point3::origin(),
            z_dir: Vec3::x(),
        };
        let moved = a.transformed(&Transform::translation(0.0, 0.0, 5.0));
        assert_eq!(moved.origin.z, 5.0);
        assert_eq!(moved.z_dir, Vec3::x());
    }
}
