//! Instance cache: one entry per distinct topology.
//!
//! Shapes are relocated before lookup, so every entry is stored pose-free
//! and each occurrence keeps only its own transform. Registration order is
//! the instance index and never changes.

use std::collections::HashMap;

use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;
use shapegraph_kernel::{GeometryKernel, Mesh};
use shapegraph_math::Transform;

use crate::node::MeshSlot;

/// One distinct shape.
#[derive(Debug, Clone)]
pub struct ShapeEntry<K: GeometryKernel> {
    /// Topology identity.
    pub key: K::Key,
    /// Canonical, pose-free shape.
    pub shape: K::Shape,
    /// Tessellation result.
    pub mesh: MeshSlot,
    /// Build path of the first occurrence.
    pub origin: String,
}

/// Result of [`InstanceCache::lookup_or_register`].
#[derive(Debug, Clone, Copy)]
pub struct CacheLookup {
    /// Instance index.
    pub index: usize,
    /// Pose of this occurrence, factored out of the shape.
    pub transform: Transform,
    /// Whether the entry was created by this call.
    pub is_new: bool,
}

/// Deduplicating shape table, keyed by topology identity.
///
/// May be kept across conversions of a growing scene; entries that are
/// already meshed are not tessellated again.
pub struct InstanceCache<K: GeometryKernel> {
    entries: Vec<ShapeEntry<K>>,
    index: HashMap<K::Key, usize>,
}

impl<K: GeometryKernel + std::fmt::Debug> std::fmt::Debug for InstanceCache<K>
where
    K::Shape: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceCache")
            .field("entries", &self.entries)
            .field("index", &self.index)
            .finish()
    }
}

impl<K: GeometryKernel> Default for InstanceCache<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: GeometryKernel> InstanceCache<K> {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Relocate `shape` and return its instance, registering it on a miss.
    ///
    /// `origin` is recorded on registration only.
    pub fn lookup_or_register(
        &mut self,
        kernel: &K,
        shape: &K::Shape,
        origin: &str,
    ) -> CacheLookup {
        let (canonical, transform) = kernel.relocate(shape);
        let key = kernel.topology_identity(&canonical);
        if let Some(&index) = self.index.get(&key) {
            tracing::debug!(index, ?key, "instance cache hit");
            return CacheLookup {
                index,
                transform,
                is_new: false,
            };
        }
        let index = self.entries.len();
        tracing::debug!(index, ?key, origin, "instance cache miss, registered");
        self.index.insert(key.clone(), index);
        self.entries.push(ShapeEntry {
            key,
            shape: canonical,
            mesh: MeshSlot::Pending,
            origin: origin.to_string(),
        });
        CacheLookup {
            index,
            transform,
            is_new: true,
        }
    }

    /// Number of distinct shapes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`.
    pub fn get(&self, index: usize) -> Option<&ShapeEntry<K>> {
        self.entries.get(index)
    }

    /// All entries in registration order.
    pub fn entries(&self) -> &[ShapeEntry<K>] {
        &self.entries
    }

    /// Mutable entries, for the tessellation phase. The slice cannot grow.
    pub(crate) fn entries_mut(&mut self) -> &mut [ShapeEntry<K>] {
        &mut self.entries
    }

    /// Number of entries still waiting for a mesh.
    pub fn pending(&self) -> usize {
        self.entries.iter().filter(|e| e.mesh.is_pending()).count()
    }

    /// Read-only view of the meshes, indexed by instance.
    pub fn mesh_table(&self) -> MeshTable<'_> {
        MeshTable {
            slots: self.entries.iter().map(|e| &e.mesh).collect(),
        }
    }
}

/// Meshes of an [`InstanceCache`], indexed by `instance_ref`.
#[derive(Debug, Clone)]
pub struct MeshTable<'a> {
    slots: Vec<&'a MeshSlot>,
}

impl<'a> MeshTable<'a> {
    /// Slot for an instance.
    pub fn get(&self, index: usize) -> Option<&'a MeshSlot> {
        self.slots.get(index).copied()
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Ready meshes with their instance index.
    pub fn meshes(&self) -> impl Iterator<Item = (usize, &'a Mesh)> + '_ {
        self.slots
            .iter()
            .copied()
            .enumerate()
            .filter_map(|(i, slot)| slot.mesh().map(|m| (i, m)))
    }

    /// Length for drawing normals: `max(accuracy) / deviation * 4`.
    ///
    /// Zero when no mesh is ready.
    pub fn normal_length(&self, deviation: f64) -> f64 {
        let max_accuracy = self
            .meshes()
            .map(|(_, m)| m.accuracy)
            .fold(0.0_f64, f64::max);
        max_accuracy / deviation * 4.0
    }
}

impl Serialize for MeshTable<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.slots.len()))?;
        for slot in &self.slots {
            seq.serialize_element(slot)?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapegraph_kernel_memory::{MemoryKernel, MemoryShape};
    use std::sync::Arc;

    #[test]
    fn test_same_topology_hits() {
        let k = MemoryKernel::new();
        let mut cache = InstanceCache::new();
        let base = MemoryShape::cuboid(1.0, 1.0, 1.0);
        let a = base.moved(&Transform::translation(1.0, 0.0, 0.0));
        let b = base.moved(&Transform::translation(0.0, 2.0, 0.0));

        let first = cache.lookup_or_register(&k, &a, "/a");
        let second = cache.lookup_or_register(&k, &b, "/b");
        assert!(first.is_new);
        assert!(!second.is_new);
        assert_eq!(first.index, second.index);
        assert_eq!(cache.len(), 1);
        assert_eq!(first.transform.translation_vector().x, 1.0);
        assert_eq!(second.transform.translation_vector().y, 2.0);
        assert_eq!(cache.get(0).unwrap().origin, "/a");
    }

    #[test]
    fn test_equal_looking_shapes_are_distinct() {
        let k = MemoryKernel::new();
        let mut cache = InstanceCache::new();
        cache.lookup_or_register(&k, &MemoryShape::cuboid(1.0, 1.0, 1.0), "/[0]");
        let second = cache.lookup_or_register(&k, &MemoryShape::cuboid(1.0, 1.0, 1.0), "/[1]");
        assert!(second.is_new);
        assert_eq!(second.index, 1);
    }

    #[test]
    fn test_entries_are_pose_free() {
        let k = MemoryKernel::new();
        let mut cache = InstanceCache::new();
        let moved = MemoryShape::plate(1.0, 1.0).moved(&Transform::rotation_z(0.5));
        cache.lookup_or_register(&k, &moved, "/plate");
        let entry = cache.get(0).unwrap();
        assert!(entry.shape.location.is_identity(&Default::default()));
        assert!(entry.mesh.is_pending());
        assert_eq!(cache.pending(), 1);
    }

    #[test]
    fn test_normal_length() {
        let k = MemoryKernel::new();
        let mut cache = InstanceCache::new();
        cache.lookup_or_register(&k, &MemoryShape::cuboid(1.0, 1.0, 1.0), "/[0]");
        cache.lookup_or_register(&k, &MemoryShape::cuboid(2.0, 1.0, 1.0), "/[1]");
        assert_eq!(cache.mesh_table().normal_length(0.1), 0.0);
        for (i, e) in cache.entries_mut().iter_mut().enumerate() {
            e.mesh = MeshSlot::Ready(Arc::new(Mesh {
                accuracy: 0.01 * (i + 1) as f64,
                ..Mesh::default()
            }));
        }
        let table = cache.mesh_table();
        assert!((table.normal_length(0.1) - 0.8).abs() < 1e-12);
        assert_eq!(table.meshes().count(), 2);
    }
}
