//! Phase 3: bottom-up bounding boxes.

use shapegraph_math::{BoundingBox, Transform};

use crate::cache::MeshTable;
use crate::error::{ConvertError, Result};
use crate::node::{GroupNode, MeshSlot, Node, ShapeNode, ShapeSource};

/// Fills in `bbox` on every group and shape leaf.
///
/// A node's box is expressed in its parent's frame: a leaf's mesh box is
/// moved by the leaf transform, a group's is the union of its children's
/// moved by the group transform. Helpers and placeholders contribute
/// nothing. A leaf whose mesh failed gets no box and is flagged
/// `degraded`. Running it twice gives the same result.
pub struct BoundingBoxAggregator<'t, 'm> {
    meshes: &'t MeshTable<'m>,
}

impl<'t, 'm> BoundingBoxAggregator<'t, 'm> {
    /// Aggregator reading instance meshes from `meshes`.
    pub fn new(meshes: &'t MeshTable<'m>) -> Self {
        Self { meshes }
    }

    /// Aggregate the tree under `root`; returns the root's box.
    pub fn aggregate<S>(&self, root: &mut GroupNode<S>) -> Result<Option<BoundingBox>> {
        let bbox = self.group(root)?;
        match &bbox {
            Some(bb) => tracing::debug!(
                min = ?bb.min,
                max = ?bb.max,
                "scene bounding box"
            ),
            None => tracing::debug!("scene has no bounding box"),
        }
        Ok(bbox)
    }

    fn group<S>(&self, group: &mut GroupNode<S>) -> Result<Option<BoundingBox>> {
        let mut boxes = Vec::with_capacity(group.children.len());
        for child in &mut group.children {
            if let Some(bb) = self.node(child)? {
                boxes.push(bb);
            }
        }
        group.bbox = BoundingBox::union_all(&boxes).map(|bb| bb.transformed(&group.transform));
        Ok(group.bbox)
    }

    fn node<S>(&self, node: &mut Node<S>) -> Result<Option<BoundingBox>> {
        match node {
            Node::Group(group) => self.group(group),
            Node::Shape(leaf) => self.leaf(leaf),
            Node::CoordSystem(_) | Node::CoordAxis(_) => Ok(None),
        }
    }

    fn leaf<S>(&self, leaf: &mut ShapeNode<S>) -> Result<Option<BoundingBox>> {
        let slot = match &leaf.source {
            ShapeSource::Instance { instance_ref } => {
                self.meshes.get(*instance_ref).ok_or_else(|| {
                    ConvertError::InvariantViolation(format!(
                        "{} refers to instance {instance_ref} of {}",
                        leaf.name,
                        self.meshes.len()
                    ))
                })?
            }
            ShapeSource::Inline { mesh, .. } => mesh,
            ShapeSource::Placeholder => {
                leaf.bbox = None;
                return Ok(None);
            }
        };
        leaf.degraded = slot.is_failed();
        leaf.bbox = slot_box(slot, &leaf.transform);
        Ok(leaf.bbox)
    }
}

fn slot_box(slot: &MeshSlot, transform: &Transform) -> Option<BoundingBox> {
    slot.mesh()?.bounding_box().map(|bb| bb.transformed(transform))
}
