#![warn(missing_docs)]

//! Scene-graph normalization and parallel tessellation for CAD scenes.
//!
//! A conversion runs in three phases:
//!
//! 1. [`SceneGraphBuilder`] walks a heterogeneous input forest and produces
//!    a tree of groups, shape leaves and helpers. Solids and faces are
//!    registered in an [`InstanceCache`] keyed by topology identity, so a
//!    part placed a hundred times is stored once.
//! 2. [`TessellationScheduler`] meshes every distinct entry once, on a rayon
//!    pool, at a quality that scales with the shape's size.
//! 3. [`BoundingBoxAggregator`] fills in per-node boxes bottom-up.
//!
//! # Example
//!
//! ```ignore
//! use shapegraph::{convert, ConvertOptions, InstanceCache, Labels};
//!
//! let mut cache = InstanceCache::new();
//! let conversion = convert(&kernel, &kernel, &objects, &Labels::default(),
//!     &ConvertOptions::default(), &mut cache)?;
//! println!("{} instances", cache.len());
//! println!("{:?}", conversion.bounding_box());
//! ```

pub mod bounds;
pub mod builder;
pub mod cache;
pub mod error;
pub mod names;
pub mod node;
pub mod options;
pub mod tessellate;

pub use bounds::BoundingBoxAggregator;
pub use builder::{BuildOutput, Labels, SceneGraphBuilder};
pub use cache::{CacheLookup, InstanceCache, MeshTable, ShapeEntry};
pub use error::{ConvertError, Diagnostic, Result};
pub use names::make_unique;
pub use node::{
    CoordAxisNode, CoordSystemNode, GroupNode, MeshSlot, Node, ShapeKind, ShapeNode, ShapeSource,
};
pub use options::ConvertOptions;
pub use tessellate::{
    compute_quality, InlineReport, Progress, ProgressCounter, TessellationReport,
    TessellationScheduler,
};

use serde::Serialize;
use shapegraph_kernel::{GeometryKernel, ShapeClassifier};
use shapegraph_math::BoundingBox;

/// Result of [`convert`].
#[derive(Debug, Serialize)]
#[serde(bound = "")]
pub struct Conversion<S> {
    /// Root of the normalized tree, with boxes filled in.
    pub root: GroupNode<S>,
    /// Non-fatal problems, in the order they were found.
    pub diagnostics: Vec<Diagnostic>,
    /// What the tessellation phase did.
    pub report: TessellationReport,
}

/// Node counts of a converted tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SceneStats {
    /// Groups, including the root.
    pub groups: usize,
    /// Solid leaves.
    pub solids: usize,
    /// Face leaves.
    pub faces: usize,
    /// Edge leaves.
    pub edges: usize,
    /// Vertex leaves, excluding placeholders.
    pub vertices: usize,
    /// Coordinate system and axis helpers.
    pub helpers: usize,
    /// Placeholders for empty input.
    pub placeholders: usize,
    /// Leaves whose geometry failed to tessellate.
    pub degraded: usize,
}

impl SceneStats {
    /// Shape leaves of every kind, placeholders excluded.
    pub fn shapes(&self) -> usize {
        self.solids + self.faces + self.edges + self.vertices
    }
}

impl<S> Conversion<S> {
    /// Box of the whole scene in the root's parent frame.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.root.bbox
    }

    /// Count the nodes of the tree.
    pub fn stats(&self) -> SceneStats {
        let mut stats = SceneStats::default();
        stats.groups += 1;
        for child in &self.root.children {
            child.walk(&mut |node| match node {
                Node::Group(_) => stats.groups += 1,
                Node::Shape(leaf) => {
                    if leaf.degraded {
                        stats.degraded += 1;
                    }
                    match (&leaf.source, leaf.kind) {
                        (ShapeSource::Placeholder, _) => stats.placeholders += 1,
                        (_, ShapeKind::Solid) => stats.solids += 1,
                        (_, ShapeKind::Face) => stats.faces += 1,
                        (_, ShapeKind::Edge) => stats.edges += 1,
                        (_, ShapeKind::Vertex) => stats.vertices += 1,
                    }
                }
                Node::CoordSystem(_) | Node::CoordAxis(_) => stats.helpers += 1,
            });
        }
        stats
    }

    /// Pair the tree with the meshes it refers to, for serialization.
    pub fn output<'a>(&'a self, meshes: MeshTable<'a>, deviation: f64) -> SceneOutput<'a, S> {
        SceneOutput {
            normal_length: meshes.normal_length(deviation),
            bbox: self.bounding_box(),
            stats: self.stats(),
            root: &self.root,
            instances: meshes,
            diagnostics: &self.diagnostics,
        }
    }
}

/// Serializable view of a finished conversion.
#[derive(Debug, Serialize)]
#[serde(bound = "")]
pub struct SceneOutput<'a, S> {
    /// The normalized tree.
    pub root: &'a GroupNode<S>,
    /// Meshes indexed by `instance_ref`.
    pub instances: MeshTable<'a>,
    /// Box of the whole scene.
    pub bbox: Option<BoundingBox>,
    /// Node counts.
    pub stats: SceneStats,
    /// Suggested length for drawing normals.
    pub normal_length: f64,
    /// Non-fatal problems.
    pub diagnostics: &'a [Diagnostic],
}

/// Convert `objects` into a tessellated, boxed scene tree.
///
/// Runs build, tessellation and aggregation in order. `cache` may come from
/// an earlier conversion of the same (growing) scene; entries it already
/// meshed are reused as they are.
pub fn convert<C, K>(
    classifier: &C,
    kernel: &K,
    objects: &[C::Object],
    labels: &Labels,
    options: &ConvertOptions,
    cache: &mut InstanceCache<K>,
) -> Result<Conversion<K::Shape>>
where
    K: GeometryKernel,
    C: ShapeClassifier<Shape = K::Shape>,
{
    options.validate()?;
    let _span = tracing::info_span!("convert", objects = objects.len()).entered();

    let BuildOutput {
        mut root,
        mut diagnostics,
    } = SceneGraphBuilder::new(classifier, kernel, options).build(objects, labels, cache)?;

    let scheduler = TessellationScheduler::from_options(options);
    let report = scheduler.run(kernel, cache)?;
    let inline = scheduler.discretize_inline(kernel, &mut root);

    for &index in &report.failed {
        if let Some(entry) = cache.get(index) {
            if let MeshSlot::Failed(reason) = &entry.mesh {
                diagnostics.push(Diagnostic::new(
                    entry.origin.clone(),
                    ConvertError::MeshGenerationFailed {
                        target: format!("instance {index}"),
                        reason: reason.clone(),
                    },
                ));
            }
        }
    }
    for (path, reason) in inline.failures {
        diagnostics.push(Diagnostic::new(
            path.clone(),
            ConvertError::MeshGenerationFailed {
                target: path,
                reason,
            },
        ));
    }

    BoundingBoxAggregator::new(&cache.mesh_table()).aggregate(&mut root)?;
    if !diagnostics.is_empty() {
        tracing::warn!(count = diagnostics.len(), "conversion finished with diagnostics");
    }
    Ok(Conversion {
        root,
        diagnostics,
        report,
    })
}
