//! The normalized scene tree.
//!
//! Four node kinds only: groups, shape leaves and two visualization
//! helpers. Shape leaves either point into the instance table or own their
//! (cheap) geometry inline. Node types are generic over the kernel's shape
//! handle; raw shapes are never serialized.

use std::sync::Arc;

use serde::Serialize;
use shapegraph_kernel::{AxisFrame, CoordFrame, Mesh, MeshError, Rgba};
use shapegraph_math::{BoundingBox, Transform};

/// Kind of a shape leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ShapeKind {
    /// Solid(s).
    Solid,
    /// Face(s) or shell(s).
    Face,
    /// Edge(s) or wire(s).
    Edge,
    /// Vertex or vertices.
    Vertex,
}

impl ShapeKind {
    /// Display name, singular for one element and plural otherwise.
    pub fn name(self, count: usize) -> &'static str {
        match (self, count == 1) {
            (ShapeKind::Solid, true) => "Solid",
            (ShapeKind::Solid, false) => "Solids",
            (ShapeKind::Face, true) => "Face",
            (ShapeKind::Face, false) => "Faces",
            (ShapeKind::Edge, true) => "Edge",
            (ShapeKind::Edge, false) => "Edges",
            (ShapeKind::Vertex, true) => "Vertex",
            (ShapeKind::Vertex, false) => "Vertices",
        }
    }
}

/// Mesh state of an instance entry or inline leaf.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum MeshSlot {
    /// Not tessellated yet.
    #[default]
    Pending,
    /// Tessellated.
    Ready(Arc<Mesh>),
    /// The kernel failed on this shape.
    Failed(MeshError),
}

impl MeshSlot {
    /// The mesh, if ready.
    pub fn mesh(&self) -> Option<&Mesh> {
        match self {
            MeshSlot::Ready(m) => Some(m),
            _ => None,
        }
    }

    /// Whether tessellation has not run yet.
    pub fn is_pending(&self) -> bool {
        matches!(self, MeshSlot::Pending)
    }

    /// Whether tessellation failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, MeshSlot::Failed(_))
    }
}

impl From<Result<Mesh, MeshError>> for MeshSlot {
    fn from(result: Result<Mesh, MeshError>) -> Self {
        match result {
            Ok(mesh) => MeshSlot::Ready(Arc::new(mesh)),
            Err(e) => MeshSlot::Failed(e),
        }
    }
}

/// Where a shape leaf's geometry comes from.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "source", rename_all = "snake_case", bound = "")]
pub enum ShapeSource<S> {
    /// Shared entry of the instance table.
    Instance {
        /// Index into the instance table.
        instance_ref: usize,
    },
    /// Geometry owned by the node (edges and vertices).
    Inline {
        /// Kernel shapes, discretized during tessellation.
        #[serde(skip)]
        shapes: Vec<S>,
        /// Discretized geometry.
        mesh: MeshSlot,
        /// Build path of the object this leaf came from.
        #[serde(skip)]
        path: String,
    },
    /// Stand-in for an input that produced nothing.
    Placeholder,
}

/// A group of nodes with a common transform.
#[derive(Debug, Clone, Serialize)]
#[serde(bound = "")]
pub struct GroupNode<S> {
    /// Name, unique among siblings.
    pub name: String,
    /// Pose relative to the parent.
    pub transform: Transform,
    /// Children in render order.
    pub children: Vec<Node<S>>,
    /// Box in the parent's frame, filled in by aggregation.
    pub bbox: Option<BoundingBox>,
}

impl<S> GroupNode<S> {
    /// Empty group.
    pub fn new(name: impl Into<String>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            transform,
            children: Vec::new(),
            bbox: None,
        }
    }
}

/// A renderable shape leaf.
#[derive(Debug, Clone, Serialize)]
#[serde(bound = "")]
pub struct ShapeNode<S> {
    /// Solid, face, edge or vertex.
    pub kind: ShapeKind,
    /// Name, unique among siblings.
    pub name: String,
    /// Pose relative to the parent.
    pub transform: Transform,
    /// Display color.
    pub color: Rgba,
    /// Geometry source.
    #[serde(flatten)]
    pub source: ShapeSource<S>,
    /// Line width for edges, point size for vertices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    /// Box in the parent's frame, filled in by aggregation.
    pub bbox: Option<BoundingBox>,
    /// Set when the geometry failed to tessellate.
    pub degraded: bool,
}

/// Coordinate system helper.
#[derive(Debug, Clone, Serialize)]
pub struct CoordSystemNode {
    /// Name, unique among siblings.
    pub name: String,
    /// Frame in the parent's coordinates.
    #[serde(flatten)]
    pub frame: CoordFrame,
    /// Axis length.
    pub size: f64,
}

/// Axis helper.
#[derive(Debug, Clone, Serialize)]
pub struct CoordAxisNode {
    /// Name, unique among siblings.
    pub name: String,
    /// Axis in the parent's coordinates.
    #[serde(flatten)]
    pub axis: AxisFrame,
    /// Arrow length.
    pub size: f64,
}

/// A node of the scene tree.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", bound = "")]
pub enum Node<S> {
    /// Group.
    Group(GroupNode<S>),
    /// Shape leaf.
    Shape(ShapeNode<S>),
    /// Coordinate system helper.
    CoordSystem(CoordSystemNode),
    /// Axis helper.
    CoordAxis(CoordAxisNode),
}

impl<S> Node<S> {
    /// Node name.
    pub fn name(&self) -> &str {
        match self {
            Node::Group(g) => &g.name,
            Node::Shape(s) => &s.name,
            Node::CoordSystem(c) => &c.name,
            Node::CoordAxis(a) => &a.name,
        }
    }

    /// Rename the node.
    pub fn set_name(&mut self, name: String) {
        match self {
            Node::Group(g) => g.name = name,
            Node::Shape(s) => s.name = name,
            Node::CoordSystem(c) => c.name = name,
            Node::CoordAxis(a) => a.name = name,
        }
    }

    /// Pose relative to the parent. Helpers carry their pose in their frame
    /// and report the identity.
    pub fn transform(&self) -> Transform {
        match self {
            Node::Group(g) => g.transform,
            Node::Shape(s) => s.transform,
            Node::CoordSystem(_) | Node::CoordAxis(_) => Transform::identity(),
        }
    }

    /// Move the node into its former parent's parent: `t ∘ transform`.
    pub fn prepend_transform(&mut self, t: &Transform) {
        match self {
            Node::Group(g) => g.transform = t.then(&g.transform),
            Node::Shape(s) => s.transform = t.then(&s.transform),
            Node::CoordSystem(c) => c.frame = c.frame.transformed(t),
            Node::CoordAxis(a) => a.axis = a.axis.transformed(t),
        }
    }

    /// Box in the parent's frame, if aggregated and non-empty.
    pub fn bbox(&self) -> Option<BoundingBox> {
        match self {
            Node::Group(g) => g.bbox,
            Node::Shape(s) => s.bbox,
            Node::CoordSystem(_) | Node::CoordAxis(_) => None,
        }
    }

    /// Visit this node and all descendants in preorder.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Node<S>)) {
        f(self);
        if let Node::Group(g) = self {
            for child in &g.children {
                child.walk(f);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapegraph_math::{Point3, Vec3};

    fn leaf(name: &str) -> Node<()> {
        Node::Shape(ShapeNode {
            kind: ShapeKind::Solid,
            name: name.into(),
            transform: Transform::translation(1.0, 0.0, 0.0),
            color: Rgba::rgb(1.0, 0.0, 0.0),
            source: ShapeSource::Instance { instance_ref: 0 },
            size: None,
            bbox: None,
            degraded: false,
        })
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ShapeKind::Solid.name(1), "Solid");
        assert_eq!(ShapeKind::Solid.name(3), "Solids");
        assert_eq!(ShapeKind::Vertex.name(2), "Vertices");
        assert_eq!(ShapeKind::Edge.name(0), "Edges");
    }

    #[test]
    fn test_prepend_transform() {
        let mut n = leaf("a");
        n.prepend_transform(&Transform::translation(0.0, 2.0, 0.0));
        let t = n.transform().translation_vector();
        assert_eq!((t.x, t.y), (1.0, 2.0));

        let mut c: Node<()> = Node::CoordSystem(CoordSystemNode {
            name: "location".into(),
            frame: CoordFrame {
                origin: Point3::origin(),
                x_dir: Vec3::x(),
                z_dir: Vec3::z(),
            },
            size: 1.0,
        });
        c.prepend_transform(&Transform::translation(0.0, 0.0, 3.0));
        match &c {
            Node::CoordSystem(cs) => assert_eq!(cs.frame.origin.z, 3.0),
            _ => unreachable!(),
        }
        assert!(c.transform().is_identity(&Default::default()));
    }

    #[test]
    fn test_walk_preorder() {
        let mut g: GroupNode<()> = GroupNode::new("root", Transform::identity());
        g.children.push(leaf("a"));
        let mut inner = GroupNode::new("inner", Transform::identity());
        inner.children.push(leaf("b"));
        g.children.push(Node::Group(inner));
        let root = Node::Group(g);
        let mut names = Vec::new();
        root.walk(&mut |n| names.push(n.name().to_string()));
        assert_eq!(names, ["root", "a", "inner", "b"]);
    }

    #[test]
    fn test_serialize_shape_node() {
        let v = serde_json::to_value(leaf("a")).unwrap();
        assert_eq!(v["type"], "Shape");
        assert_eq!(v["source"], "instance");
        assert_eq!(v["instance_ref"], 0);
        assert_eq!(v["kind"], "Solid");
        assert!(v.get("size").is_none());
    }

    #[test]
    fn test_mesh_slot_from_result() {
        let ok: MeshSlot = Ok(Mesh::new()).into();
        assert!(ok.mesh().is_some());
        let failed: MeshSlot = Err(MeshError::Failed("x".into())).into();
        assert!(failed.is_failed());
        assert!(MeshSlot::default().is_pending());
    }
}
