//! Tessellated output produced by a geometry kernel.

use serde::{Deserialize, Serialize};
use shapegraph_math::{BoundingBox, Point3};
use thiserror::Error;

/// Triangle mesh (plus optional edge polylines) for one shape.
///
/// Coordinates are in the frame of the shape that was meshed. For shapes
/// stored in an instance cache that is the canonical, pose-free frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    /// Vertex positions.
    pub vertices: Vec<[f64; 3]>,
    /// Per-vertex normals. Same length as `vertices` when present.
    pub normals: Vec<[f64; 3]>,
    /// Triangles as indices into `vertices`.
    pub triangles: Vec<[u32; 3]>,
    /// Edge line segments, when edges were requested.
    pub edges: Option<Vec<[[f64; 3]; 2]>>,
    /// Absolute deflection the mesh was generated with.
    pub accuracy: f64,
}

impl Mesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// A point cloud mesh: vertices only, no triangles.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Point3>,
    {
        Self {
            vertices: points.into_iter().map(|p| [p.x, p.y, p.z]).collect(),
            ..Self::default()
        }
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edge segments.
    pub fn num_edge_segments(&self) -> usize {
        self.edges.as_ref().map_or(0, Vec::len)
    }

    /// Box around all vertices and edge endpoints, in the mesh's own frame.
    ///
    /// `None` for a mesh without any geometry.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let edge_points = self
            .edges
            .iter()
            .flatten()
            .flat_map(|seg| seg.iter())
            .map(|p| Point3::new(p[0], p[1], p[2]));
        let vertex_points = self.vertices.iter().map(|p| Point3::new(p[0], p[1], p[2]));
        BoundingBox::from_points(vertex_points.chain(edge_points))
    }
}

/// Failure reported by a kernel's mesher for a single shape.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeshError {
    /// The shape has no meshable geometry (zero area, zero length).
    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    /// The kernel cannot mesh this kind of shape.
    #[error("unsupported shape: {0}")]
    Unsupported(String),

    /// The mesher itself failed.
    #[error("mesher failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(z: f64) -> Mesh {
        Mesh {
            vertices: vec![[0.0, 0.0, z], [1.0, 0.0, z], [0.0, 1.0, z]],
            normals: vec![[0.0, 0.0, 1.0]; 3],
            triangles: vec![[0, 1, 2]],
            edges: None,
            accuracy: 0.1,
        }
    }

    #[test]
    fn test_bounding_box_includes_edges() {
        let mut m = triangle(0.0);
        m.edges = Some(vec![[[0.0, 0.0, 0.0], [0.0, 0.0, 7.0]]]);
        let bb = m.bounding_box().unwrap();
        assert_eq!(bb.max.z, 7.0);
        assert_eq!(bb.max.x, 1.0);
    }

    #[test]
    fn test_empty_mesh_has_no_box() {
        assert!(Mesh::new().bounding_box().is_none());
    }

    #[test]
    fn test_point_mesh() {
        let m = Mesh::from_points(vec![Point3::new(1.0, 2.0, 3.0)]);
        assert_eq!(m.num_vertices(), 1);
        assert_eq!(m.num_triangles(), 0);
        let bb = m.bounding_box().unwrap();
        assert_eq!(bb.min, bb.max);
    }

    #[test]
    fn test_mesh_error_display() {
        let e = MeshError::Failed("boom".into());
        assert_eq!(e.to_string(), "mesher failed: boom");
    }
}
