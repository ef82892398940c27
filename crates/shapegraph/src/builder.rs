//! Phase 1: normalize an input forest into a reference tree.
//!
//! Dispatch is on the classifier's [`VariantTag`] alone, in this order:
//! scalars are skipped, unsupported objects fail (or are skipped in
//! permissive mode), sequences and mappings become groups, assemblies
//! become posed groups, shapes become instance or inline leaves, poses and
//! axes become helpers. Solids and faces go through the [`InstanceCache`];
//! edges and vertices stay inline.

use shapegraph_kernel::{GeometryKernel, Rgba, ShapeClassifier, VariantTag};
use shapegraph_math::{Tolerance, Transform};

use crate::cache::InstanceCache;
use crate::error::{ConvertError, Diagnostic, Result};
use crate::names::make_unique;
use crate::node::{
    CoordAxisNode, CoordSystemNode, GroupNode, MeshSlot, Node, ShapeKind, ShapeNode, ShapeSource,
};
use crate::options::ConvertOptions;

/// Line width of edge leaves.
pub const EDGE_WIDTH: f64 = 2.0;
/// Point size of vertex leaves.
pub const VERTEX_SIZE: f64 = 6.0;
/// Alpha of the placeholder emitted for empty input.
pub const PLACEHOLDER_ALPHA: f64 = 0.1;
/// Alpha of parent outlines.
pub const PARENT_ALPHA: f64 = 0.25;

const ROOT_NAME: &str = "Group";

/// Per-object overrides, parallel to the object list. Each list is either
/// absent or exactly as long as the objects.
#[derive(Debug, Clone, Default)]
pub struct Labels {
    /// Explicit names.
    pub names: Option<Vec<Option<String>>>,
    /// Explicit colors.
    pub colors: Option<Vec<Option<Rgba>>>,
    /// Explicit alphas.
    pub alphas: Option<Vec<Option<f64>>>,
}

impl Labels {
    /// Check every present list against the object count.
    pub fn check(&self, expected: usize) -> Result<()> {
        let lengths = [
            ("names", self.names.as_ref().map(Vec::len)),
            ("colors", self.colors.as_ref().map(Vec::len)),
            ("alphas", self.alphas.as_ref().map(Vec::len)),
        ];
        for (field, actual) in lengths {
            if let Some(actual) = actual {
                if actual != expected {
                    return Err(ConvertError::LengthMismatch {
                        field,
                        expected,
                        actual,
                    });
                }
            }
        }
        Ok(())
    }

    fn attrs(&self, i: usize) -> Attrs {
        fn pick<T: Clone>(list: &Option<Vec<Option<T>>>, i: usize) -> Option<T> {
            list.as_ref().and_then(|l| l.get(i).cloned().flatten())
        }
        Attrs {
            name: pick(&self.names, i),
            color: pick(&self.colors, i),
            alpha: pick(&self.alphas, i),
        }
    }
}

/// Output of [`SceneGraphBuilder::build`].
#[derive(Debug)]
pub struct BuildOutput<S> {
    /// Root of the reference tree.
    pub root: GroupNode<S>,
    /// Non-fatal problems.
    pub diagnostics: Vec<Diagnostic>,
}

/// Explicit attributes flowing down from the caller. The name applies to
/// one node; color and alpha apply to the whole subtree.
#[derive(Debug, Clone, Default)]
struct Attrs {
    name: Option<String>,
    color: Option<Rgba>,
    alpha: Option<f64>,
}

impl Attrs {
    fn inherit(&self, name: Option<String>) -> Attrs {
        Attrs {
            name,
            color: self.color,
            alpha: self.alpha,
        }
    }
}

/// State of one `build` call.
struct BuildContext<'c, K: GeometryKernel> {
    cache: &'c mut InstanceCache<K>,
    diagnostics: Vec<Diagnostic>,
    path: Vec<String>,
}

impl<K: GeometryKernel> BuildContext<'_, K> {
    fn path(&self) -> String {
        format!("/{}", self.path.join("/"))
    }
}

/// Recursive classifier-driven tree builder.
pub struct SceneGraphBuilder<'a, C, K> {
    classifier: &'a C,
    kernel: &'a K,
    options: &'a ConvertOptions,
}

impl<'a, C, K> SceneGraphBuilder<'a, C, K>
where
    K: GeometryKernel,
    C: ShapeClassifier<Shape = K::Shape>,
{
    /// Create a builder.
    pub fn new(classifier: &'a C, kernel: &'a K, options: &'a ConvertOptions) -> Self {
        Self {
            classifier,
            kernel,
            options,
        }
    }

    /// Build the reference tree for `objects`, registering solids and faces
    /// in `cache`.
    pub fn build(
        &self,
        objects: &[C::Object],
        labels: &Labels,
        cache: &mut InstanceCache<K>,
    ) -> Result<BuildOutput<K::Shape>> {
        labels.check(objects.len())?;
        let registered_before = cache.len();
        let mut ctx = BuildContext {
            cache,
            diagnostics: Vec::new(),
            path: Vec::new(),
        };

        let mut nodes = Vec::new();
        for (i, obj) in objects.iter().enumerate() {
            let attrs = labels.attrs(i);
            ctx.path
                .push(attrs.name.clone().unwrap_or_else(|| format!("[{i}]")));
            let node = self.convert_object(&mut ctx, obj, attrs);
            ctx.path.pop();
            if let Some(node) = node? {
                nodes.push(node);
            }
        }

        if nodes.is_empty() {
            nodes.push(self.placeholder(&mut ctx, ROOT_NAME));
        }
        let root = match nodes.pop() {
            Some(Node::Group(group)) if nodes.is_empty() => group,
            Some(last) => {
                nodes.push(last);
                let mut root = GroupNode::new(ROOT_NAME, Transform::identity());
                root.children = uniquify(nodes);
                root
            }
            None => GroupNode::new(ROOT_NAME, Transform::identity()),
        };

        check_tree(&root, ctx.cache.len())?;
        tracing::info!(
            instances = ctx.cache.len(),
            new_instances = ctx.cache.len() - registered_before,
            diagnostics = ctx.diagnostics.len(),
            "scene graph built"
        );
        Ok(BuildOutput {
            root,
            diagnostics: ctx.diagnostics,
        })
    }

    fn convert_object(
        &self,
        ctx: &mut BuildContext<'_, K>,
        obj: &C::Object,
        attrs: Attrs,
    ) -> Result<Option<Node<K::Shape>>> {
        let tag = self.classifier.classify(obj);
        tracing::debug!(path = %ctx.path(), ?tag, "classified");
        let label = self.classifier.label(obj);

        match tag {
            VariantTag::Scalar => Ok(None),
            VariantTag::Unsupported => self.unsupported(ctx, obj),
            VariantTag::Sequence | VariantTag::Mapping => {
                let fallback = if tag == VariantTag::Mapping { "Dict" } else { "List" };
                let name = attrs
                    .name
                    .clone()
                    .or(label)
                    .unwrap_or_else(|| fallback.to_string());
                let mut nodes = Vec::new();
                for (i, child) in self.classifier.children(obj).into_iter().enumerate() {
                    ctx.path
                        .push(child.key.clone().unwrap_or_else(|| format!("[{i}]")));
                    let node = self.convert_object(ctx, child.object, attrs.inherit(child.key));
                    ctx.path.pop();
                    if let Some(node) = node? {
                        nodes.push(node);
                    }
                }
                if nodes.is_empty() {
                    return Ok(Some(self.placeholder(ctx, &name)));
                }
                Ok(Some(finish_group(name, Transform::identity(), nodes)))
            }
            VariantTag::Assembly => match self.classifier.assembly(obj) {
                Some(view) => {
                    let name = attrs
                        .name
                        .clone()
                        .or(view.name)
                        .or(label)
                        .unwrap_or_else(|| "Assembly".to_string());
                    let mut nodes = Vec::new();
                    if let Some(shape) = &view.shape {
                        nodes.push(self.convert_shape(ctx, shape, &attrs.inherit(None), None, None)?);
                    }
                    if self.options.render_mates && !view.mates.is_empty() {
                        let mates = view
                            .mates
                            .iter()
                            .map(|(mate, frame)| {
                                Node::CoordSystem(CoordSystemNode {
                                    name: mate.clone(),
                                    frame: *frame,
                                    size: self.options.helper_scale,
                                })
                            })
                            .collect();
                        nodes.push(finish_group(
                            "mates".to_string(),
                            Transform::identity(),
                            mates,
                        ));
                    }
                    for (i, part) in view.parts.iter().enumerate() {
                        ctx.path.push(format!("[{i}]"));
                        let node = self.convert_object(ctx, part, attrs.inherit(None));
                        ctx.path.pop();
                        if let Some(node) = node? {
                            nodes.push(node);
                        }
                    }
                    if nodes.is_empty() {
                        return Ok(Some(self.placeholder(ctx, &name)));
                    }
                    Ok(Some(finish_group(name, view.pose, nodes)))
                }
                None => self.unsupported(ctx, obj),
            },
            VariantTag::Compound
            | VariantTag::Solid
            | VariantTag::Shell
            | VariantTag::Face
            | VariantTag::Wire
            | VariantTag::Edge
            | VariantTag::Vertex => match self.classifier.shape(obj) {
                Some(shape) => {
                    let attached = self.classifier.color(obj);
                    let node = self.convert_shape(ctx, &shape, &attrs, label, attached)?;
                    if !self.options.show_parent {
                        return Ok(Some(node));
                    }
                    let parents = self.classifier.parents(obj);
                    Ok(Some(self.with_parents(ctx, node, &parents)))
                }
                None => self.unsupported(ctx, obj),
            },
            VariantTag::Pose => match self.classifier.coord_frame(obj) {
                Some(frame) => Ok(Some(Node::CoordSystem(CoordSystemNode {
                    name: attrs.name.or(label).unwrap_or_else(|| "location".to_string()),
                    frame,
                    size: self.options.helper_scale,
                }))),
                None => self.unsupported(ctx, obj),
            },
            VariantTag::Axis => match self.classifier.axis_frame(obj) {
                Some(axis) => Ok(Some(Node::CoordAxis(CoordAxisNode {
                    name: attrs.name.or(label).unwrap_or_else(|| "axis".to_string()),
                    axis,
                    size: self.options.helper_scale,
                }))),
                None => self.unsupported(ctx, obj),
            },
        }
    }

    /// Shape dispatch: homogeneous solids, faces, edges or vertices become
    /// one leaf; anything else is split into its elements.
    fn convert_shape(
        &self,
        ctx: &mut BuildContext<'_, K>,
        shape: &K::Shape,
        attrs: &Attrs,
        label: Option<String>,
        attached: Option<Rgba>,
    ) -> Result<Node<K::Shape>> {
        let kernel = self.kernel;
        let tag = kernel.shape_tag(shape);
        let elements = match tag {
            VariantTag::Compound => kernel.elements_of(shape),
            _ => vec![shape.clone()],
        };
        let explicit = attrs.name.clone().or(label);
        if elements.is_empty() {
            let name = explicit.unwrap_or_else(|| "Compound".to_string());
            return Ok(self.placeholder(ctx, &name));
        }

        let tags: Vec<VariantTag> = elements.iter().map(|e| kernel.shape_tag(e)).collect();
        let first = tags[0].dimension();
        let dimension = if tags.iter().all(|t| t.dimension() == first) {
            first
        } else {
            None
        };

        match dimension {
            Some(3) => {
                let target = if elements.len() == 1 { &elements[0] } else { shape };
                let name =
                    explicit.unwrap_or_else(|| ShapeKind::Solid.name(elements.len()).to_string());
                let color = self.color(ShapeKind::Solid, attrs, attached);
                return Ok(self.instance_leaf(ctx, ShapeKind::Solid, name, target, color));
            }
            Some(2) => {
                let single_face = elements.len() == 1 && tags[0] == VariantTag::Face;
                let target = if single_face { &elements[0] } else { shape };
                let count = if single_face { 1 } else { kernel.faces_of(shape).len() };
                let name = explicit.unwrap_or_else(|| ShapeKind::Face.name(count).to_string());
                let color = self.color(ShapeKind::Face, attrs, attached);
                return Ok(self.instance_leaf(ctx, ShapeKind::Face, name, target, color));
            }
            Some(1) => {
                let edges: Vec<K::Shape> = elements
                    .iter()
                    .flat_map(|e| match kernel.shape_tag(e) {
                        VariantTag::Wire => kernel.edges_of(e),
                        _ => vec![e.clone()],
                    })
                    .collect();
                let name =
                    explicit.unwrap_or_else(|| ShapeKind::Edge.name(edges.len()).to_string());
                let color = self.color(ShapeKind::Edge, attrs, attached);
                let path = ctx.path();
                return Ok(inline_leaf(path, ShapeKind::Edge, name, edges, color, EDGE_WIDTH));
            }
            Some(0) => {
                let name =
                    explicit.unwrap_or_else(|| ShapeKind::Vertex.name(elements.len()).to_string());
                let color = self.color(ShapeKind::Vertex, attrs, attached);
                return Ok(inline_leaf(
                    ctx.path(),
                    ShapeKind::Vertex,
                    name,
                    elements,
                    color,
                    VERTEX_SIZE,
                ));
            }
            _ => {}
        }

        // Mixed dimensionality or nested compounds: every element re-enters
        // the dispatch on its own.
        tracing::debug!(path = %ctx.path(), elements = elements.len(), "splitting mixed compound");
        let name = explicit.unwrap_or_else(|| "Compound".to_string());
        let mut nodes = Vec::with_capacity(elements.len());
        for (i, element) in elements.iter().enumerate() {
            ctx.path.push(format!("[{i}]"));
            let node = self.convert_shape(ctx, element, &attrs.inherit(None), None, attached);
            ctx.path.pop();
            nodes.push(node?);
        }
        Ok(finish_group(name, Transform::identity(), nodes))
    }

    /// Put edge outlines of `parents` (nearest first) ahead of `node`,
    /// outermost first. The nearest is named `parent`, the next
    /// `parent(-1)`, and so on. Parents without edges are left out.
    fn with_parents(
        &self,
        ctx: &mut BuildContext<'_, K>,
        node: Node<K::Shape>,
        parents: &[K::Shape],
    ) -> Node<K::Shape> {
        if parents.is_empty() {
            return node;
        }
        let color = self.options.edge_color.with_alpha(PARENT_ALPHA);
        let mut nodes = Vec::with_capacity(parents.len() + 1);
        for (depth, parent) in parents.iter().enumerate().rev() {
            let name = match depth {
                0 => "parent".to_string(),
                d => format!("parent(-{d})"),
            };
            ctx.path.push(name.clone());
            let path = ctx.path();
            ctx.path.pop();
            let edges = self.kernel.edges_of(parent);
            if edges.is_empty() {
                tracing::debug!(%path, "parent has no edges, not outlined");
                continue;
            }
            nodes.push(inline_leaf(path, ShapeKind::Edge, name, edges, color, EDGE_WIDTH));
        }
        let name = node.name().to_string();
        nodes.push(node);
        finish_group(name, Transform::identity(), nodes)
    }

    fn instance_leaf(
        &self,
        ctx: &mut BuildContext<'_, K>,
        kind: ShapeKind,
        name: String,
        shape: &K::Shape,
        color: Rgba,
    ) -> Node<K::Shape> {
        let path = ctx.path();
        let lookup = ctx.cache.lookup_or_register(self.kernel, shape, &path);
        Node::Shape(ShapeNode {
            kind,
            name,
            transform: lookup.transform,
            color,
            source: ShapeSource::Instance {
                instance_ref: lookup.index,
            },
            size: None,
            bbox: None,
            degraded: false,
        })
    }

    /// Explicit color, else attached color, else the kind default; an
    /// explicit alpha replaces whatever alpha that color has.
    fn color(&self, kind: ShapeKind, attrs: &Attrs, attached: Option<Rgba>) -> Rgba {
        let default = match kind {
            ShapeKind::Solid => self.options.default_color,
            ShapeKind::Face => self.options.face_color,
            ShapeKind::Edge => self.options.edge_color,
            ShapeKind::Vertex => self.options.vertex_color,
        };
        let color = attrs.color.or(attached).unwrap_or(default);
        match attrs.alpha {
            Some(alpha) => color.with_alpha(alpha),
            None => color,
        }
    }

    fn unsupported(
        &self,
        ctx: &mut BuildContext<'_, K>,
        obj: &C::Object,
    ) -> Result<Option<Node<K::Shape>>> {
        let error = ConvertError::UnsupportedType {
            name: ctx.path(),
            type_name: self.classifier.type_name(obj),
        };
        if self.options.strict {
            return Err(error);
        }
        tracing::warn!(%error, "skipping unsupported object");
        let path = ctx.path();
        ctx.diagnostics.push(Diagnostic::new(path, error));
        Ok(None)
    }

    /// Zero-size stand-in for an input that produced nothing.
    fn placeholder(&self, ctx: &mut BuildContext<'_, K>, name: &str) -> Node<K::Shape> {
        let error = ConvertError::EmptyInput {
            name: name.to_string(),
        };
        let path = ctx.path();
        tracing::warn!(%path, %error, "empty input replaced by placeholder");
        ctx.diagnostics.push(Diagnostic::new(path, error));
        Node::Shape(ShapeNode {
            kind: ShapeKind::Vertex,
            name: format!("{name} (empty)"),
            transform: Transform::identity(),
            color: self.options.vertex_color.with_alpha(PLACEHOLDER_ALPHA),
            source: ShapeSource::Placeholder,
            size: Some(1.0),
            bbox: None,
            degraded: false,
        })
    }
}

fn inline_leaf<S>(
    path: String,
    kind: ShapeKind,
    name: String,
    shapes: Vec<S>,
    color: Rgba,
    size: f64,
) -> Node<S> {
    Node::Shape(ShapeNode {
        kind,
        name,
        transform: Transform::identity(),
        color,
        source: ShapeSource::Inline {
            shapes,
            mesh: MeshSlot::Pending,
            path,
        },
        size: Some(size),
        bbox: None,
        degraded: false,
    })
}

/// Close a group: a single child replaces the group, taking on the group's
/// transform; otherwise sibling names are made unique.
fn finish_group<S>(name: String, transform: Transform, mut nodes: Vec<Node<S>>) -> Node<S> {
    if nodes.len() == 1 {
        if let Some(mut child) = nodes.pop() {
            if !transform.is_identity(&Tolerance::DEFAULT) {
                child.prepend_transform(&transform);
            }
            return child;
        }
    }
    let mut group = GroupNode::new(name, transform);
    group.children = uniquify(nodes);
    Node::Group(group)
}

fn uniquify<S>(mut nodes: Vec<Node<S>>) -> Vec<Node<S>> {
    let names: Vec<String> = nodes.iter().map(|n| n.name().to_string()).collect();
    for (node, name) in nodes.iter_mut().zip(make_unique(&names)) {
        node.set_name(name);
    }
    nodes
}

/// Post-build invariants: finite transforms, in-range instance references.
fn check_tree<S>(root: &GroupNode<S>, instances: usize) -> Result<()> {
    if !root.transform.is_finite() {
        return Err(ConvertError::InvariantViolation(format!(
            "group {:?} has a non-finite transform",
            root.name
        )));
    }
    let mut problem = None;
    for child in &root.children {
        child.walk(&mut |node| {
            if problem.is_some() {
                return;
            }
            if !node.transform().is_finite() {
                problem = Some(format!("node {:?} has a non-finite transform", node.name()));
            }
            if let Node::Shape(ShapeNode {
                source: ShapeSource::Instance { instance_ref },
                name,
                ..
            }) = node
            {
                if *instance_ref >= instances {
                    problem = Some(format!(
                        "node {name:?} references instance {instance_ref} of {instances}"
                    ));
                }
            }
        });
    }
    match problem {
        Some(msg) => Err(ConvertError::InvariantViolation(msg)),
        None => Ok(()),
    }
}
