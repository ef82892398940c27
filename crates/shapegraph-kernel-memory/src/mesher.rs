//! Deterministic grid mesher for the in-memory topology.
//!
//! Every planar rectangle is split into an `nu x nv` grid of quads, where
//! `n = ceil(extent / quality)` clamped to `1..=MAX_DIVISIONS`. Triangle
//! counts therefore depend only on the shape and the quality value.

use shapegraph_kernel::{Mesh, MeshError};
use shapegraph_math::{Point3, Transform, Vec3};

use crate::shape::{MemoryShape, Topo};

/// Upper bound on grid divisions per face side.
pub const MAX_DIVISIONS: usize = 64;

/// Number of grid divisions for an extent at the given quality.
pub fn divisions(extent: f64, quality: f64) -> usize {
    if quality <= 0.0 || !quality.is_finite() {
        return MAX_DIVISIONS;
    }
    ((extent / quality).ceil() as usize).clamp(1, MAX_DIVISIONS)
}

/// Tessellate `shape` (including its own location) into a fresh mesh.
pub fn mesh_shape(shape: &MemoryShape, quality: f64, include_edges: bool) -> Result<Mesh, MeshError> {
    let mut mesh = Mesh {
        accuracy: quality,
        ..Mesh::default()
    };
    append_faces(shape, quality, &mut mesh)?;
    if include_edges {
        let mut edges = Vec::new();
        append_edges(shape, &mut edges);
        mesh.edges = Some(edges);
    }
    Ok(mesh)
}

fn append_faces(shape: &MemoryShape, quality: f64, mesh: &mut Mesh) -> Result<(), MeshError> {
    match &*shape.topo {
        Topo::Faulty { reason } => Err(MeshError::Failed(reason.clone())),
        Topo::Cuboid { size } => {
            if size.iter().any(|s| *s <= 0.0) {
                return Err(MeshError::Degenerate(format!("cuboid of size {size:?}")));
            }
            for face in shape.cuboid_faces(*size) {
                append_faces(&face, quality, mesh)?;
            }
            Ok(())
        }
        Topo::Plate { width, height } => {
            if *width <= 0.0 || *height <= 0.0 {
                return Err(MeshError::Degenerate(format!("plate of size {width} x {height}")));
            }
            append_grid(&shape.location, *width, *height, quality, mesh);
            Ok(())
        }
        Topo::Shell(_) | Topo::Compound(_) | Topo::Wire(_) => {
            for sub in shape.sub_shapes() {
                append_faces(&sub, quality, mesh)?;
            }
            Ok(())
        }
        Topo::Segment { .. } => Ok(()),
        Topo::Point(p) => {
            let p = shape.location.apply_point(p);
            mesh.vertices.push([p.x, p.y, p.z]);
            Ok(())
        }
    }
}

fn append_grid(location: &Transform, width: f64, height: f64, quality: f64, mesh: &mut Mesh) {
    let nu = divisions(width, quality);
    let nv = divisions(height, quality);
    let base = mesh.vertices.len() as u32;
    let n = location.apply_vec(&Vec3::z());

    for j in 0..=nv {
        for i in 0..=nu {
            let local = Point3::new(
                width * i as f64 / nu as f64,
                height * j as f64 / nv as f64,
                0.0,
            );
            let p = location.apply_point(&local);
            mesh.vertices.push([p.x, p.y, p.z]);
            mesh.normals.push([n.x, n.y, n.z]);
        }
    }

    let row = (nu + 1) as u32;
    for j in 0..nv as u32 {
        for i in 0..nu as u32 {
            let v00 = base + j * row + i;
            let v10 = v00 + 1;
            let v01 = v00 + row;
            let v11 = v01 + 1;
            mesh.triangles.push([v00, v10, v11]);
            mesh.triangles.push([v00, v11, v01]);
        }
    }
}

/// Straight edges of `shape` as world-frame segments.
pub fn append_edges(shape: &MemoryShape, out: &mut Vec<[[f64; 3]; 2]>) {
    match &*shape.topo {
        Topo::Segment { start, end } => {
            let a = shape.location.apply_point(start);
            let b = shape.location.apply_point(end);
            out.push([[a.x, a.y, a.z], [b.x, b.y, b.z]]);
        }
        Topo::Plate { width, height } => {
            let corners = [
                Point3::origin(),
                Point3::new(*width, 0.0, 0.0),
                Point3::new(*width, *height, 0.0),
                Point3::new(0.0, *height, 0.0),
            ];
            for k in 0..4 {
                let a = shape.location.apply_point(&corners[k]);
                let b = shape.location.apply_point(&corners[(k + 1) % 4]);
                out.push([[a.x, a.y, a.z], [b.x, b.y, b.z]]);
            }
        }
        Topo::Cuboid { size } => {
            for face in shape.cuboid_faces(*size) {
                append_edges(&face, out);
            }
        }
        Topo::Shell(_) | Topo::Wire(_) | Topo::Compound(_) => {
            for sub in shape.sub_shapes() {
                append_edges(&sub, out);
            }
        }
        Topo::Point(_) | Topo::Faulty { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divisions() {
        assert_eq!(divisions(10.0, 1.0), 10);
        assert_eq!(divisions(0.5, 1.0), 1);
        assert_eq!(divisions(1000.0, 1.0), MAX_DIVISIONS);
        assert_eq!(divisions(1.0, 0.0), MAX_DIVISIONS);
    }

    #[test]
    fn test_plate_triangle_count() {
        let plate = MemoryShape::plate(4.0, 2.0);
        let mesh = mesh_shape(&plate, 1.0, false).unwrap();
        assert_eq!(mesh.num_triangles(), 2 * 4 * 2);
        assert_eq!(mesh.num_vertices(), 5 * 3);
        assert_eq!(mesh.normals.len(), mesh.vertices.len());
        assert!(mesh.edges.is_none());
    }

    #[test]
    fn test_cuboid_mesh_bounds_match_box() {
        let cube = MemoryShape::cuboid(1.0, 2.0, 3.0);
        let mesh = mesh_shape(&cube, 0.5, true).unwrap();
        let bb = mesh.bounding_box().unwrap();
        let expected = cube.local_box().unwrap();
        assert!(bb.contains(&expected, 1e-9) && expected.contains(&bb, 1e-9));
        assert_eq!(mesh.num_edge_segments(), 24);
    }

    #[test]
    fn test_faulty_fails() {
        let err = mesh_shape(&MemoryShape::faulty("bad surface"), 0.1, false).unwrap_err();
        assert_eq!(err, MeshError::Failed("bad surface".into()));
    }

    #[test]
    fn test_degenerate_plate() {
        let err = mesh_shape(&MemoryShape::plate(0.0, 1.0), 0.1, false).unwrap_err();
        assert!(matches!(err, MeshError::Degenerate(_)));
    }
}
