//! Phase 2: mesh every distinct shape once, at a size-adaptive quality.
//!
//! The instance table is frozen while this runs; each worker writes only
//! the mesh slot of the entry it was handed, so entries are processed on
//! the rayon pool without locking. Inline edge and vertex leaves are
//! discretized afterwards on the calling thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;
use shapegraph_kernel::{GeometryKernel, Mesh, MeshError};
use shapegraph_math::BoundingBox;

use crate::cache::{InstanceCache, ShapeEntry};
use crate::error::{ConvertError, Result};
use crate::node::{GroupNode, MeshSlot, Node, ShapeKind, ShapeSource};
use crate::options::ConvertOptions;

/// Lower bound for the absolute deflection handed to the kernel.
pub const MIN_QUALITY: f64 = 1e-6;

/// Absolute deflection for a shape with box `bbox` at relative `deviation`.
///
/// `diagonal * deviation / (100 * sqrt(3))`: for a cube of side `a` this is
/// `a * deviation / 100`, so the triangle count stays roughly the same at
/// every scale. Empty shapes get [`MIN_QUALITY`].
pub fn compute_quality(bbox: Option<&BoundingBox>, deviation: f64) -> f64 {
    let diagonal = bbox.map_or(0.0, BoundingBox::diagonal);
    (diagonal * deviation / (100.0 * 3.0_f64.sqrt())).max(MIN_QUALITY)
}

/// One completed entry, as reported to a progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Instance index.
    pub index: usize,
    /// Entries completed so far in this run, including this one.
    pub completed: usize,
    /// Entries to mesh in this run.
    pub total: usize,
    /// Whether meshing succeeded.
    pub ok: bool,
}

/// Thread-safe progress tally, usable as a progress callback.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl ProgressCounter {
    /// Zeroed counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed entry.
    pub fn record(&self, progress: Progress) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if !progress.ok {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Entries completed.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    /// Entries that failed.
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Summary of a [`TessellationScheduler::run`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct TessellationReport {
    /// Entries meshed by this run.
    pub meshed: usize,
    /// Entries that already had a result and were skipped.
    pub reused: usize,
    /// Instance indices whose meshing failed in this run.
    pub failed: Vec<usize>,
    /// Triangles produced by this run.
    pub triangles: usize,
    /// Wall time of the run.
    pub elapsed: Duration,
}

/// Summary of [`TessellationScheduler::discretize_inline`].
#[derive(Debug, Default)]
pub struct InlineReport {
    /// Inline leaves discretized.
    pub discretized: usize,
    /// Leaves that failed, by build path.
    pub failures: Vec<(String, MeshError)>,
}

/// Callback invoked once per completed entry, from worker threads.
pub type ProgressFn<'p> = &'p (dyn Fn(Progress) + Send + Sync);

/// Meshes the instance table and inline leaves.
pub struct TessellationScheduler<'p> {
    deviation: f64,
    angular_tolerance: f64,
    render_edges: bool,
    edge_accuracy: Option<f64>,
    parallel: bool,
    threads: Option<usize>,
    progress: Option<ProgressFn<'p>>,
}

impl<'p> TessellationScheduler<'p> {
    /// Scheduler with the given tolerances, running on the global rayon pool.
    pub fn new(deviation: f64, angular_tolerance: f64, render_edges: bool) -> Self {
        Self {
            deviation,
            angular_tolerance,
            render_edges,
            edge_accuracy: None,
            parallel: true,
            threads: None,
            progress: None,
        }
    }

    /// Scheduler configured from conversion options.
    pub fn from_options(options: &ConvertOptions) -> Self {
        Self {
            edge_accuracy: options.edge_accuracy,
            parallel: options.parallel,
            threads: options.threads,
            ..Self::new(options.deviation, options.angular_tolerance, options.render_edges)
        }
    }

    /// Report each completed entry to `progress`.
    pub fn with_progress(mut self, progress: ProgressFn<'p>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Mesh every entry that has no result yet.
    ///
    /// A failing entry is marked [`MeshSlot::Failed`] and does not stop the
    /// others. Only building a bounded worker pool can fail.
    pub fn run<K: GeometryKernel>(
        &self,
        kernel: &K,
        cache: &mut InstanceCache<K>,
    ) -> Result<TessellationReport> {
        let _span = tracing::info_span!("tessellate").entered();
        let start = Instant::now();
        let pending: Vec<usize> = cache
            .entries()
            .iter()
            .enumerate()
            .filter(|(_, e)| e.mesh.is_pending())
            .map(|(i, _)| i)
            .collect();
        let total = pending.len();
        let reused = cache.len() - total;
        let completed = AtomicUsize::new(0);

        let work = |(index, entry): (usize, &mut ShapeEntry<K>)| {
            entry.mesh = self.mesh_entry(kernel, index, &entry.shape, &completed, total);
        };
        let entries = cache.entries_mut();
        if self.parallel {
            let mut run = move || {
                entries
                    .par_iter_mut()
                    .enumerate()
                    .filter(|(_, e)| e.mesh.is_pending())
                    .for_each(&work)
            };
            match self.threads {
                Some(n) => {
                    let pool = rayon::ThreadPoolBuilder::new()
                        .num_threads(n)
                        .build()
                        .map_err(|e| {
                            ConvertError::InvalidOptions(format!(
                                "cannot start {n} tessellation threads: {e}"
                            ))
                        })?;
                    pool.install(run);
                }
                None => run(),
            }
        } else {
            entries
                .iter_mut()
                .enumerate()
                .filter(|(_, e)| e.mesh.is_pending())
                .for_each(&work);
        }

        let mut report = TessellationReport {
            meshed: total,
            reused,
            ..Default::default()
        };
        for index in pending {
            match cache.get(index).map(|e| &e.mesh) {
                Some(MeshSlot::Failed(_)) => report.failed.push(index),
                Some(MeshSlot::Ready(mesh)) => report.triangles += mesh.num_triangles(),
                _ => {}
            }
        }
        report.elapsed = start.elapsed();
        tracing::info!(
            meshed = report.meshed,
            reused = report.reused,
            failed = report.failed.len(),
            triangles = report.triangles,
            elapsed_ms = report.elapsed.as_secs_f64() * 1000.0,
            "tessellation finished"
        );
        Ok(report)
    }

    fn mesh_entry<K: GeometryKernel>(
        &self,
        kernel: &K,
        index: usize,
        shape: &K::Shape,
        completed: &AtomicUsize,
        total: usize,
    ) -> MeshSlot {
        let started = Instant::now();
        let bbox = kernel.rough_bounding_box(shape, None);
        let quality = compute_quality(bbox.as_ref(), self.deviation);
        let result = kernel.generate_mesh(shape, quality, self.angular_tolerance, self.render_edges);
        match &result {
            Ok(mesh) => tracing::debug!(
                index,
                quality,
                triangles = mesh.num_triangles(),
                elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                "meshed instance"
            ),
            Err(error) => tracing::warn!(index, quality, %error, "mesh generation failed"),
        }
        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(progress) = self.progress {
            progress(Progress {
                index,
                completed: done,
                total,
                ok: result.is_ok(),
            });
        }
        result.into()
    }

    /// Discretize inline edge leaves into segments and inline vertex leaves
    /// into point lists. Leaves that already have a result are skipped.
    pub fn discretize_inline<K: GeometryKernel>(
        &self,
        kernel: &K,
        root: &mut GroupNode<K::Shape>,
    ) -> InlineReport {
        let mut report = InlineReport::default();
        for child in &mut root.children {
            self.discretize_node(kernel, child, &mut report);
        }
        tracing::debug!(
            discretized = report.discretized,
            failed = report.failures.len(),
            "inline geometry discretized"
        );
        report
    }

    fn discretize_node<K: GeometryKernel>(
        &self,
        kernel: &K,
        node: &mut Node<K::Shape>,
        report: &mut InlineReport,
    ) {
        match node {
            Node::Group(group) => {
                for child in &mut group.children {
                    self.discretize_node(kernel, child, report);
                }
            }
            Node::Shape(leaf) => {
                let ShapeSource::Inline { shapes, mesh, path } = &mut leaf.source else {
                    return;
                };
                if !mesh.is_pending() {
                    return;
                }
                let result = match leaf.kind {
                    ShapeKind::Edge => {
                        let boxes: Vec<BoundingBox> = shapes
                            .iter()
                            .filter_map(|s| kernel.rough_bounding_box(s, None))
                            .collect();
                        let quality =
                            compute_quality(BoundingBox::union_all(&boxes).as_ref(), self.deviation);
                        let deflection = self.edge_accuracy.unwrap_or(quality / 100.0);
                        kernel.discretize_edges(shapes, deflection)
                    }
                    ShapeKind::Vertex => Ok(Mesh::from_points(kernel.vertex_points(shapes))),
                    kind => Err(MeshError::Unsupported(format!(
                        "{} cannot be stored inline",
                        kind.name(1)
                    ))),
                };
                report.discretized += 1;
                if let Err(error) = &result {
                    tracing::warn!(%path, %error, "inline discretization failed");
                    report.failures.push((path.clone(), error.clone()));
                }
                *mesh = result.into();
            }
            Node::CoordSystem(_) | Node::CoordAxis(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapegraph_kernel_memory::{MemoryKernel, MemoryShape};
    use shapegraph_math::{Point3, Transform};

    fn inline_node(kind: ShapeKind, shapes: Vec<MemoryShape>) -> Node<MemoryShape> {
        Node::Shape(crate::node::ShapeNode {
            kind,
            name: kind.name(1).into(),
            transform: Transform::identity(),
            color: shapegraph_kernel::Rgba::rgb(0.0, 0.0, 0.0),
            source: ShapeSource::Inline {
                shapes,
                mesh: MeshSlot::Pending,
                path: format!("/{}", kind.name(1)),
            },
            size: None,
            bbox: None,
            degraded: false,
        })
    }

    fn inline_mesh(node: &Node<MemoryShape>) -> Option<&Mesh> {
        match node {
            Node::Shape(s) => match &s.source {
                ShapeSource::Inline { mesh, .. } => mesh.mesh(),
                _ => None,
            },
            _ => None,
        }
    }

    fn cache_of(kernel: &MemoryKernel, shapes: &[MemoryShape]) -> InstanceCache<MemoryKernel> {
        let mut cache = InstanceCache::new();
        for s in shapes {
            cache.lookup_or_register(kernel, s, "/");
        }
        cache
    }

    #[test]
    fn test_quality_scales_with_size() {
        let small = BoundingBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let large = BoundingBox::new(Point3::origin(), Point3::new(100.0, 100.0, 100.0));
        let q_small = compute_quality(Some(&small), 0.1);
        let q_large = compute_quality(Some(&large), 0.1);
        assert!((q_small - 0.001).abs() < 1e-12, "{q_small}");
        assert!((q_large / q_small - 100.0).abs() < 1e-9);
        assert_eq!(compute_quality(None, 0.1), MIN_QUALITY);
    }

    #[test]
    fn test_every_entry_meshed_once() {
        let kernel = MemoryKernel::new();
        let mut cache = cache_of(
            &kernel,
            &[
                MemoryShape::cuboid(1.0, 1.0, 1.0),
                MemoryShape::cuboid(10.0, 10.0, 10.0),
                MemoryShape::plate(2.0, 3.0),
            ],
        );
        let report = TessellationScheduler::new(0.1, 0.2, true)
            .run(&kernel, &mut cache)
            .unwrap();
        assert_eq!(report.meshed, 3);
        assert_eq!(report.reused, 0);
        assert!(report.failed.is_empty());
        assert_eq!(kernel.mesh_calls(), 3);
        assert!(cache.entries().iter().all(|e| e.mesh.mesh().is_some()));
        assert_eq!(cache.pending(), 0);
    }

    #[test]
    fn test_failure_is_per_entry() {
        let kernel = MemoryKernel::new();
        let mut cache = cache_of(
            &kernel,
            &[
                MemoryShape::cuboid(1.0, 1.0, 1.0),
                MemoryShape::faulty("self-intersecting"),
                MemoryShape::plate(1.0, 1.0),
            ],
        );
        let report = TessellationScheduler::new(0.1, 0.2, false)
            .run(&kernel, &mut cache)
            .unwrap();
        assert_eq!(report.failed, vec![1]);
        assert!(cache.get(0).unwrap().mesh.mesh().is_some());
        assert!(cache.get(1).unwrap().mesh.is_failed());
        assert!(cache.get(2).unwrap().mesh.mesh().is_some());
    }

    #[test]
    fn test_rerun_meshes_only_new_entries() {
        let kernel = MemoryKernel::new();
        let cube = MemoryShape::cuboid(1.0, 1.0, 1.0);
        let mut cache = cache_of(&kernel, &[cube.clone()]);
        let scheduler = TessellationScheduler::new(0.1, 0.2, false);
        scheduler.run(&kernel, &mut cache).unwrap();

        let moved = cube.moved(&Transform::translation(3.0, 0.0, 0.0));
        cache.lookup_or_register(&kernel, &moved, "/a");
        cache.lookup_or_register(&kernel, &MemoryShape::plate(1.0, 1.0), "/b");
        let report = scheduler.run(&kernel, &mut cache).unwrap();
        assert_eq!(report.meshed, 1);
        assert_eq!(report.reused, 1);
        assert_eq!(kernel.mesh_calls(), 2);
    }

    #[test]
    fn test_deterministic_triangle_counts() {
        let shapes = [
            MemoryShape::cuboid(1.0, 2.0, 3.0),
            MemoryShape::cuboid(50.0, 1.0, 1.0),
        ];
        let counts = |parallel: bool| {
            let kernel = MemoryKernel::new();
            let mut cache = cache_of(&kernel, &shapes);
            let mut scheduler = TessellationScheduler::new(0.1, 0.2, false);
            scheduler.parallel = parallel;
            scheduler.run(&kernel, &mut cache).unwrap();
            cache
                .entries()
                .iter()
                .map(|e| e.mesh.mesh().map(Mesh::num_triangles))
                .collect::<Vec<_>>()
        };
        assert_eq!(counts(true), counts(false));
        assert_eq!(counts(true), counts(true));
    }

    #[test]
    fn test_bounded_pool_and_progress() {
        let kernel = MemoryKernel::new();
        let shapes: Vec<MemoryShape> = (1..=8)
            .map(|i| MemoryShape::cuboid(i as f64, 1.0, 1.0))
            .collect();
        let mut cache = cache_of(&kernel, &shapes);
        let counter = ProgressCounter::new();
        let record = |p: Progress| {
            assert!(p.completed <= p.total);
            counter.record(p);
        };
        let options = ConvertOptions {
            threads: Some(2),
            ..Default::default()
        };
        let report = TessellationScheduler::from_options(&options)
            .with_progress(&record)
            .run(&kernel, &mut cache)
            .unwrap();
        assert_eq!(report.meshed, 8);
        assert_eq!(counter.completed(), 8);
        assert_eq!(counter.failed(), 0);
    }

    #[test]
    fn test_discretize_inline() {
        let kernel = MemoryKernel::new();
        let edge = MemoryShape::segment(Point3::origin(), Point3::new(1.0, 0.0, 0.0));
        let point = MemoryShape::point(Point3::new(0.0, 0.0, 4.0));
        let mut root: GroupNode<MemoryShape> = GroupNode::new("Group", Transform::identity());
        root.children.push(inline_node(ShapeKind::Edge, vec![edge]));
        root.children.push(inline_node(ShapeKind::Vertex, vec![point]));
        let scheduler = TessellationScheduler::new(0.1, 0.2, true);
        let report = scheduler.discretize_inline(&kernel, &mut root);
        assert_eq!(report.discretized, 2);
        assert!(report.failures.is_empty());
        let meshes: Vec<&Mesh> = root.children.iter().filter_map(inline_mesh).collect();
        assert_eq!(meshes[0].num_edge_segments(), 1);
        assert_eq!(meshes[1].vertices, vec![[0.0, 0.0, 4.0]]);
        assert_eq!(kernel.mesh_calls(), 0);

        let again = scheduler.discretize_inline(&kernel, &mut root);
        assert_eq!(again.discretized, 0);
    }

    #[test]
    fn test_edge_accuracy_overrides_deflection() {
        let kernel = MemoryKernel::new();
        let edge = MemoryShape::segment(Point3::origin(), Point3::new(10.0, 0.0, 0.0));
        let accuracy = |options: &ConvertOptions| {
            let mut root = GroupNode::new("Group", Transform::identity());
            root.children.push(inline_node(ShapeKind::Edge, vec![edge.clone()]));
            TessellationScheduler::from_options(options).discretize_inline(&kernel, &mut root);
            inline_mesh(&root.children[0]).map(|m| m.accuracy)
        };

        let fixed = ConvertOptions {
            edge_accuracy: Some(0.02),
            ..Default::default()
        };
        assert_eq!(accuracy(&fixed), Some(0.02));

        let derived = compute_quality(kernel.rough_bounding_box(&edge, None).as_ref(), 0.1) / 100.0;
        let default = accuracy(&ConvertOptions::default()).unwrap();
        assert!((default - derived).abs() < 1e-15, "{default} != {derived}");
        assert!(default < 0.02);
    }
}
