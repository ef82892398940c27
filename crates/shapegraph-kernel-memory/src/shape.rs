//! Shared topology plus per-occurrence location.

use std::f64::consts::{FRAC_PI_2, PI};
use std::sync::Arc;

use shapegraph_kernel::VariantTag;
use shapegraph_math::{BoundingBox, Point3, Transform};

/// Underlying boundary data. Shared between every [`MemoryShape`] that
/// wraps it; the `Arc` address is the topology identity.
#[derive(Debug)]
pub enum Topo {
    /// Axis-aligned box with one corner at the origin.
    Cuboid {
        /// Extent along X, Y and Z.
        size: [f64; 3],
    },
    /// Rectangle in the XY plane with one corner at the origin.
    Plate {
        /// Extent along X.
        width: f64,
        /// Extent along Y.
        height: f64,
    },
    /// Straight edge.
    Segment {
        /// Start point.
        start: Point3,
        /// End point.
        end: Point3,
    },
    /// Vertex.
    Point(Point3),
    /// Connected faces.
    Shell(Vec<MemoryShape>),
    /// Connected edges.
    Wire(Vec<MemoryShape>),
    /// Arbitrary collection of shapes.
    Compound(Vec<MemoryShape>),
    /// A solid the mesher always rejects.
    Faulty {
        /// Reason reported by the mesher.
        reason: String,
    },
}

/// A shape handle: shared topology placed at a location.
#[derive(Debug, Clone)]
pub struct MemoryShape {
    /// Shared topology.
    pub topo: Arc<Topo>,
    /// Pose of this occurrence.
    pub location: Transform,
}

impl MemoryShape {
    fn from_topo(topo: Topo) -> Self {
        Self {
            topo: Arc::new(topo),
            location: Transform::identity(),
        }
    }

    /// Box solid of size `(sx, sy, sz)` with a corner at the origin.
    pub fn cuboid(sx: f64, sy: f64, sz: f64) -> Self {
        Self::from_topo(Topo::Cuboid { size: [sx, sy, sz] })
    }

    /// Rectangular face of size `(width, height)` in the XY plane.
    pub fn plate(width: f64, height: f64) -> Self {
        Self::from_topo(Topo::Plate { width, height })
    }

    /// Straight edge from `start` to `end`.
    pub fn segment(start: Point3, end: Point3) -> Self {
        Self::from_topo(Topo::Segment { start, end })
    }

    /// Vertex at `p`.
    pub fn point(p: Point3) -> Self {
        Self::from_topo(Topo::Point(p))
    }

    /// Shell made of `faces`.
    pub fn shell(faces: Vec<MemoryShape>) -> Self {
        Self::from_topo(Topo::Shell(faces))
    }

    /// Wire made of `edges`.
    pub fn wire(edges: Vec<MemoryShape>) -> Self {
        Self::from_topo(Topo::Wire(edges))
    }

    /// Compound of arbitrary shapes.
    pub fn compound(items: Vec<MemoryShape>) -> Self {
        Self::from_topo(Topo::Compound(items))
    }

    /// Solid whose tessellation always fails with `reason`.
    pub fn faulty(reason: impl Into<String>) -> Self {
        Self::from_topo(Topo::Faulty {
            reason: reason.into(),
        })
    }

    /// Same topology, moved by `t` (applied after the current location).
    pub fn moved(&self, t: &Transform) -> Self {
        Self {
            topo: Arc::clone(&self.topo),
            location: t.then(&self.location),
        }
    }

    /// Same topology at exactly `location`.
    pub fn located(&self, location: Transform) -> Self {
        Self {
            topo: Arc::clone(&self.topo),
            location,
        }
    }

    /// Whether both handles wrap the same topology.
    pub fn is_same(&self, other: &MemoryShape) -> bool {
        Arc::ptr_eq(&self.topo, &other.topo)
    }

    /// Shape tag of this handle.
    pub fn tag(&self) -> VariantTag {
        match &*self.topo {
            Topo::Cuboid { .. } | Topo::Faulty { .. } => VariantTag::Solid,
            Topo::Plate { .. } => VariantTag::Face,
            Topo::Segment { .. } => VariantTag::Edge,
            Topo::Point(_) => VariantTag::Vertex,
            Topo::Shell(_) => VariantTag::Shell,
            Topo::Wire(_) => VariantTag::Wire,
            Topo::Compound(_) => VariantTag::Compound,
        }
    }

    /// Direct sub-shapes with this handle's location applied.
    pub fn sub_shapes(&self) -> Vec<MemoryShape> {
        match &*self.topo {
            Topo::Shell(items) | Topo::Wire(items) | Topo::Compound(items) => {
                items.iter().map(|s| s.moved(&self.location)).collect()
            }
            _ => Vec::new(),
        }
    }

    /// The six faces of a cuboid, as fresh plates at this handle's location.
    pub(crate) fn cuboid_faces(&self, size: [f64; 3]) -> Vec<MemoryShape> {
        let [sx, sy, sz] = size;
        let placed = |w: f64, h: f64, t: Transform| {
            MemoryShape::plate(w, h).located(self.location.then(&t))
        };
        vec![
            placed(sx, sy, Transform::rotation_x(PI).then(&Transform::translation(0.0, -sy, 0.0))),
            placed(sx, sy, Transform::translation(0.0, 0.0, sz)),
            placed(sx, sz, Transform::rotation_x(FRAC_PI_2)),
            placed(sx, sz, Transform::translation(0.0, sy, sz).then(&Transform::rotation_x(-FRAC_PI_2))),
            placed(sz, sy, Transform::rotation_y(-FRAC_PI_2)),
            placed(sz, sy, Transform::translation(sx, 0.0, sz).then(&Transform::rotation_y(FRAC_PI_2))),
        ]
    }

    /// Box of this handle in its parent frame, `None` when empty.
    pub fn local_box(&self) -> Option<BoundingBox> {
        let own = match &*self.topo {
            Topo::Cuboid { size } => Some(BoundingBox::new(
                Point3::origin(),
                Point3::new(size[0], size[1], size[2]),
            )),
            Topo::Plate { width, height } => Some(BoundingBox::new(
                Point3::origin(),
                Point3::new(*width, *height, 0.0),
            )),
            Topo::Segment { start, end } => BoundingBox::from_points([*start, *end]),
            Topo::Point(p) => Some(BoundingBox::from_point(*p)),
            Topo::Faulty { .. } => Some(BoundingBox::new(
                Point3::origin(),
                Point3::new(1.0, 1.0, 1.0),
            )),
            Topo::Shell(items) | Topo::Wire(items) | Topo::Compound(items) => {
                let boxes: Vec<BoundingBox> = items.iter().filter_map(|s| s.local_box()).collect();
                BoundingBox::union_all(&boxes)
            }
        };
        own.map(|bb| bb.transformed(&self.location))
    }
}
