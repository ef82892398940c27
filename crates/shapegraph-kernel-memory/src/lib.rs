#![warn(missing_docs)]

//! In-memory reference geometry kernel for shapegraph.
//!
//! Shapes are [`Arc`]-shared topology placed at a [`Transform`]; the `Arc`
//! address is the topology identity, so cloning or moving a shape keeps its
//! identity while building an equal-looking shape from scratch does not.
//! Meshing is a deterministic grid mesher and every call is counted, which
//! makes "tessellated exactly once" observable in tests.

mod mesher;
mod object;
mod shape;

pub use mesher::{divisions, MAX_DIVISIONS};
pub use object::{MemoryAssembly, MemoryObject, ShapeObject};
pub use shape::{MemoryShape, Topo};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use shapegraph_kernel::{
    AssemblyView, AxisFrame, Child, CoordFrame, GeometryKernel, Mesh, MeshError, Rgba,
    ShapeClassifier, VariantTag,
};
use shapegraph_math::{BoundingBox, Point3, Transform};

/// The in-memory kernel. Acts as both classifier and geometry kernel.
#[derive(Debug, Default)]
pub struct MemoryKernel {
    mesh_calls: AtomicUsize,
}

impl MemoryKernel {
    /// Create a kernel with a zeroed mesh-call counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `generate_mesh` calls so far.
    pub fn mesh_calls(&self) -> usize {
        self.mesh_calls.load(Ordering::SeqCst)
    }

    fn collect(shape: &MemoryShape, want: VariantTag, out: &mut Vec<MemoryShape>) {
        let tag = shape.tag();
        if tag == want {
            out.push(shape.clone());
            return;
        }
        match (&*shape.topo, want) {
            (Topo::Cuboid { size }, VariantTag::Face | VariantTag::Edge | VariantTag::Vertex) => {
                for face in shape.cuboid_faces(*size) {
                    Self::collect(&face, want, out);
                }
            }
            (Topo::Plate { width, height }, VariantTag::Edge | VariantTag::Vertex) => {
                let corners = [
                    Point3::origin(),
                    Point3::new(*width, 0.0, 0.0),
                    Point3::new(*width, *height, 0.0),
                    Point3::new(0.0, *height, 0.0),
                ];
                for k in 0..4 {
                    let edge = MemoryShape::segment(corners[k], corners[(k + 1) % 4])
                        .located(shape.location);
                    Self::collect(&edge, want, out);
                }
            }
            (Topo::Segment { start, end }, VariantTag::Vertex) => {
                out.push(MemoryShape::point(*start).located(shape.location));
                out.push(MemoryShape::point(*end).located(shape.location));
            }
            _ => {
                for sub in shape.sub_shapes() {
                    Self::collect(&sub, want, out);
                }
            }
        }
    }

    fn collect_all(shape: &MemoryShape, want: VariantTag) -> Vec<MemoryShape> {
        let mut out = Vec::new();
        Self::collect(shape, want, &mut out);
        out
    }
}

impl GeometryKernel for MemoryKernel {
    type Shape = MemoryShape;
    type Key = usize;

    fn shape_tag(&self, shape: &MemoryShape) -> VariantTag {
        shape.tag()
    }

    fn elements_of(&self, shape: &MemoryShape) -> Vec<MemoryShape> {
        match &*shape.topo {
            Topo::Compound(_) => shape.sub_shapes(),
            _ => vec![shape.clone()],
        }
    }

    fn solids_of(&self, shape: &MemoryShape) -> Vec<MemoryShape> {
        Self::collect_all(shape, VariantTag::Solid)
    }

    fn faces_of(&self, shape: &MemoryShape) -> Vec<MemoryShape> {
        Self::collect_all(shape, VariantTag::Face)
    }

    fn edges_of(&self, shape: &MemoryShape) -> Vec<MemoryShape> {
        Self::collect_all(shape, VariantTag::Edge)
    }

    fn vertices_of(&self, shape: &MemoryShape) -> Vec<MemoryShape> {
        Self::collect_all(shape, VariantTag::Vertex)
    }

    fn topology_identity(&self, shape: &MemoryShape) -> usize {
        Arc::as_ptr(&shape.topo) as usize
    }

    fn relocate(&self, shape: &MemoryShape) -> (MemoryShape, Transform) {
        (shape.located(Transform::identity()), shape.location)
    }

    fn rough_bounding_box(
        &self,
        shape: &MemoryShape,
        transform: Option<&Transform>,
    ) -> Option<BoundingBox> {
        let bb = shape.local_box()?;
        Some(match transform {
            Some(t) => bb.transformed(t),
            None => bb,
        })
    }

    fn generate_mesh(
        &self,
        shape: &MemoryShape,
        quality: f64,
        _angular_tolerance: f64,
        include_edges: bool,
    ) -> Result<Mesh, MeshError> {
        self.mesh_calls.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(quality, include_edges, "memory kernel mesh");
        mesher::mesh_shape(shape, quality, include_edges)
    }

    fn discretize_edges(&self, edges: &[MemoryShape], deflection: f64) -> Result<Mesh, MeshError> {
        if deflection <= 0.0 || !deflection.is_finite() {
            return Err(MeshError::Degenerate(format!("edge deflection {deflection}")));
        }
        let mut segments = Vec::new();
        for edge in edges {
            mesher::append_edges(edge, &mut segments);
        }
        Ok(Mesh {
            edges: Some(segments),
            accuracy: deflection,
            ..Mesh::default()
        })
    }

    fn vertex_points(&self, vertices: &[MemoryShape]) -> Vec<Point3> {
        vertices
            .iter()
            .filter_map(|v| match &*v.topo {
                Topo::Point(p) => Some(v.location.apply_point(p)),
                _ => None,
            })
            .collect()
    }
}

impl ShapeClassifier for MemoryKernel {
    type Object = MemoryObject;
    type Shape = MemoryShape;

    fn classify(&self, obj: &MemoryObject) -> VariantTag {
        match obj {
            MemoryObject::Number(_) | MemoryObject::Flag(_) | MemoryObject::Text(_) => {
                VariantTag::Scalar
            }
            MemoryObject::Foreign(_) => VariantTag::Unsupported,
            MemoryObject::List(_) => VariantTag::Sequence,
            MemoryObject::Map(_) => VariantTag::Mapping,
            MemoryObject::Assembly(_) => VariantTag::Assembly,
            MemoryObject::Shape(s) => s.shape.tag(),
            MemoryObject::Location(_) | MemoryObject::Plane(_) => VariantTag::Pose,
            MemoryObject::Axis(_) => VariantTag::Axis,
        }
    }

    fn type_name(&self, obj: &MemoryObject) -> String {
        match obj {
            MemoryObject::Number(_) => "Number".into(),
            MemoryObject::Flag(_) => "Flag".into(),
            MemoryObject::Text(_) => "Text".into(),
            MemoryObject::Shape(s) => format!("{:?}", s.shape.tag()),
            MemoryObject::List(_) => "List".into(),
            MemoryObject::Map(_) => "Map".into(),
            MemoryObject::Assembly(_) => "Assembly".into(),
            MemoryObject::Location(_) => "Location".into(),
            MemoryObject::Plane(_) => "Plane".into(),
            MemoryObject::Axis(_) => "Axis".into(),
            MemoryObject::Foreign(name) => name.clone(),
        }
    }

    fn label(&self, obj: &MemoryObject) -> Option<String> {
        match obj {
            MemoryObject::Shape(s) => s.label.clone(),
            MemoryObject::Assembly(a) => a.name.clone(),
            _ => None,
        }
    }

    fn color(&self, obj: &MemoryObject) -> Option<Rgba> {
        match obj {
            MemoryObject::Shape(s) => s.color,
            _ => None,
        }
    }

    fn parents(&self, obj: &MemoryObject) -> Vec<MemoryShape> {
        match obj {
            MemoryObject::Shape(s) => s.parents.clone(),
            _ => Vec::new(),
        }
    }

    fn children<'a>(&self, obj: &'a MemoryObject) -> Vec<Child<'a, MemoryObject>> {
        match obj {
            MemoryObject::List(items) => items
                .iter()
                .map(|object| Child { key: None, object })
                .collect(),
            MemoryObject::Map(entries) => entries
                .iter()
                .map(|(key, object)| Child {
                    key: Some(key.clone()),
                    object,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn assembly<'a>(
        &self,
        obj: &'a MemoryObject,
    ) -> Option<AssemblyView<'a, MemoryObject, MemoryShape>> {
        match obj {
            MemoryObject::Assembly(a) => Some(AssemblyView {
                name: a.name.clone(),
                pose: a.location,
                shape: a.shape.clone(),
                parts: a.parts.iter().collect(),
                mates: a.mates.clone(),
            }),
            _ => None,
        }
    }

    fn shape(&self, obj: &MemoryObject) -> Option<MemoryShape> {
        match obj {
            MemoryObject::Shape(s) => Some(s.shape.clone()),
            _ => None,
        }
    }

    fn coord_frame(&self, obj: &MemoryObject) -> Option<CoordFrame> {
        match obj {
            MemoryObject::Location(t) => Some(CoordFrame::from_transform(t)),
            MemoryObject::Plane(f) => Some(*f),
            _ => None,
        }
    }

    fn axis_frame(&self, obj: &MemoryObject) -> Option<AxisFrame> {
        match obj {
            MemoryObject::Axis(a) => Some(*a),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_survives_relocation() {
        let k = MemoryKernel::new();
        let a = MemoryShape::cuboid(1.0, 1.0, 1.0);
        let b = a.moved(&Transform::translation(3.0, 0.0, 0.0));
        let (canon, loc) = k.relocate(&b);
        assert_eq!(k.topology_identity(&a), k.topology_identity(&canon));
        assert!(canon.location.is_identity(&Default::default()));
        assert_relative_eq!(loc.translation_vector().x, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_elements_of_non_compound_is_self() {
        let k = MemoryKernel::new();
        let s = MemoryShape::plate(1.0, 1.0);
        let els = k.elements_of(&s);
        assert_eq!(els.len(), 1);
        assert!(els[0].is_same(&s));
    }

    #[test]
    fn test_decomposition() {
        let k = MemoryKernel::new();
        let cube = MemoryShape::cuboid(1.0, 1.0, 1.0);
        assert_eq!(k.solids_of(&cube).len(), 1);
        assert_eq!(k.faces_of(&cube).len(), 6);
        assert_eq!(k.edges_of(&cube).len(), 24);
        let wire = MemoryShape::wire(vec![
            MemoryShape::segment(Point3::origin(), Point3::new(1.0, 0.0, 0.0)),
            MemoryShape::segment(Point3::new(1.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0)),
        ]);
        assert_eq!(k.edges_of(&wire).len(), 2);
        assert_eq!(k.vertices_of(&wire).len(), 4);
        assert!(k.solids_of(&wire).is_empty());
    }

    #[test]
    fn test_mesh_calls_counted() {
        let k = MemoryKernel::new();
        let cube = MemoryShape::cuboid(1.0, 1.0, 1.0);
        k.generate_mesh(&cube, 0.5, 0.2, false).unwrap();
        assert!(k.generate_mesh(&MemoryShape::faulty("x"), 0.5, 0.2, false).is_err());
        assert_eq!(k.mesh_calls(), 2);
    }

    #[test]
    fn test_rough_box_with_transform() {
        let k = MemoryKernel::new();
        let cube = MemoryShape::cuboid(1.0, 1.0, 1.0);
        let t = Transform::translation(0.0, 0.0, 10.0);
        let bb = k.rough_bounding_box(&cube, Some(&t)).unwrap();
        assert_relative_eq!(bb.min.z, 10.0, epsilon = 1e-12);
        assert!(k.rough_bounding_box(&MemoryShape::compound(vec![]), None).is_none());
    }

    #[test]
    fn test_discretize_edges() {
        let k = MemoryKernel::new();
        let e = MemoryShape::segment(Point3::origin(), Point3::new(0.0, 2.0, 0.0))
            .moved(&Transform::translation(1.0, 0.0, 0.0));
        let mesh = k.discretize_edges(&[e], 0.01).unwrap();
        assert_eq!(mesh.num_edge_segments(), 1);
        assert_eq!(mesh.edges.as_ref().unwrap()[0][1], [1.0, 2.0, 0.0]);
        assert!(k.discretize_edges(&[], 0.0).is_err());
    }

    #[test]
    fn test_classify() {
        let k = MemoryKernel::new();
        assert_eq!(k.classify(&MemoryObject::Number(1.0)), VariantTag::Scalar);
        assert_eq!(k.classify(&MemoryObject::Foreign("Sketch".into())), VariantTag::Unsupported);
        assert_eq!(
            k.classify(&MemoryObject::shape(MemoryShape::wire(vec![]))),
            VariantTag::Wire
        );
        assert_eq!(
            k.classify(&MemoryObject::Location(Transform::identity())),
            VariantTag::Pose
        );
        let map = MemoryObject::Map(vec![("a".into(), MemoryObject::Flag(true))]);
        let children = k.children(&map);
        assert_eq!(children[0].key.as_deref(), Some("a"));
    }

    #[test]
    fn test_parents_nearest_first() {
        let k = MemoryKernel::new();
        let stock = MemoryShape::cuboid(4.0, 4.0, 4.0);
        let cut = MemoryShape::cuboid(4.0, 4.0, 2.0);
        let top = MemoryObject::shape(MemoryShape::plate(4.0, 4.0))
            .with_parent(cut.clone())
            .with_parent(stock.clone());
        let parents = k.parents(&top);
        assert_eq!(parents.len(), 2);
        assert!(parents[0].is_same(&cut));
        assert!(parents[1].is_same(&stock));
        assert!(k.parents(&MemoryObject::List(vec![])).is_empty());
    }
}
