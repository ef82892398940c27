//! Scene objects understood by [`MemoryKernel`](crate::MemoryKernel)'s
//! classifier.

use shapegraph_kernel::{AxisFrame, CoordFrame, Rgba};
use shapegraph_math::Transform;

use crate::MemoryShape;

/// A shape with optional presentation attributes.
#[derive(Debug, Clone)]
pub struct ShapeObject {
    /// The shape.
    pub shape: MemoryShape,
    /// Attached label.
    pub label: Option<String>,
    /// Attached color.
    pub color: Option<Rgba>,
    /// Shapes this one was derived from, nearest first.
    pub parents: Vec<MemoryShape>,
}

/// An assembly: a posed container of parts with optional own shape and mates.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssembly {
    /// Assembly name.
    pub name: Option<String>,
    /// Pose relative to the parent.
    pub location: Transform,
    /// Shape owned by the assembly itself.
    pub shape: Option<MemoryShape>,
    /// Sub-parts.
    pub parts: Vec<MemoryObject>,
    /// Named mate frames.
    pub mates: Vec<(String, CoordFrame)>,
}

/// Input object for the in-memory kernel.
#[derive(Debug, Clone)]
pub enum MemoryObject {
    /// A number.
    Number(f64),
    /// A boolean.
    Flag(bool),
    /// A string.
    Text(String),
    /// A shape.
    Shape(ShapeObject),
    /// Ordered list.
    List(Vec<MemoryObject>),
    /// Keyed map, in insertion order.
    Map(Vec<(String, MemoryObject)>),
    /// Assembly.
    Assembly(MemoryAssembly),
    /// A bare location.
    Location(Transform),
    /// A plane.
    Plane(CoordFrame),
    /// An axis.
    Axis(AxisFrame),
    /// An object of a type nothing understands.
    Foreign(String),
}

impl MemoryObject {
    /// Plain shape object without label or color.
    pub fn shape(shape: MemoryShape) -> Self {
        MemoryObject::Shape(ShapeObject {
            shape,
            label: None,
            color: None,
            parents: Vec::new(),
        })
    }

    /// Shape object carrying a label.
    pub fn labeled(shape: MemoryShape, label: impl Into<String>) -> Self {
        MemoryObject::Shape(ShapeObject {
            shape,
            label: Some(label.into()),
            color: None,
            parents: Vec::new(),
        })
    }

    /// Attach a color to a shape object. Other objects are returned unchanged.
    pub fn with_color(mut self, color: Rgba) -> Self {
        if let MemoryObject::Shape(obj) = &mut self {
            obj.color = Some(color);
        }
        self
    }

    /// Record `parent` as the next, more distant shape this object was
    /// derived from. Other objects are returned unchanged.
    pub fn with_parent(mut self, parent: MemoryShape) -> Self {
        if let MemoryObject::Shape(obj) = &mut self {
            obj.parents.push(parent);
        }
        self
    }
}

impl From<MemoryShape> for MemoryObject {
    fn from(shape: MemoryShape) -> Self {
        MemoryObject::shape(shape)
    }
}
