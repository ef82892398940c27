#![warn(missing_docs)]

//! Declarative scene documents for shapegraph.
//!
//! A document holds a library of named shapes and a forest of scene
//! objects. Library shapes are resolved once, so every `Ref` to the same
//! name shares one topology and deduplicates downstream. Resolution turns
//! the document into [`shapegraph_kernel_memory`] objects.

mod error;
mod resolve;

pub use error::{IrError, Result};
pub use resolve::ResolvedScene;

use serde::{Deserialize, Serialize};
use shapegraph_kernel::Rgba;
use shapegraph_math::Transform;
use std::collections::BTreeMap;
use std::path::Path;

/// 3D vector with f64 components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// Create a new Vec3.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn point(&self) -> shapegraph_math::Point3 {
        shapegraph_math::Point3::new(self.x, self.y, self.z)
    }

    fn vector(&self) -> shapegraph_math::Vec3 {
        shapegraph_math::Vec3::new(self.x, self.y, self.z)
    }
}

/// Pose given as a translation plus Euler angles in degrees
/// (applied as X, then Y, then Z, before translating).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Translation.
    #[serde(default)]
    pub translation: Vec3,
    /// Rotation angles in degrees.
    #[serde(default)]
    pub rotation: Vec3,
}

impl Placement {
    /// The rigid transform this placement denotes.
    pub fn to_transform(&self) -> Transform {
        let t = self.translation;
        let r = self.rotation;
        Transform::translation(t.x, t.y, t.z).then(&Transform::from_euler_degrees(r.x, r.y, r.z))
    }
}

/// Shape definition: a primitive, a composite, or a reference into the
/// document's library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ShapeDef {
    /// Box solid with a corner at the origin.
    Cuboid {
        /// Size along each axis.
        size: Vec3,
    },
    /// Rectangular face in the XY plane.
    Plate {
        /// Extent along X.
        width: f64,
        /// Extent along Y.
        height: f64,
    },
    /// Straight edge.
    Segment {
        /// Start point.
        start: Vec3,
        /// End point.
        end: Vec3,
    },
    /// Vertex.
    Point {
        /// Position.
        at: Vec3,
    },
    /// Solid whose tessellation fails.
    Faulty {
        /// Failure reason.
        reason: String,
    },
    /// Library shape, optionally placed. Shares topology with every other
    /// reference to the same name.
    Ref {
        /// Library key.
        name: String,
        /// Pose of this occurrence.
        #[serde(default)]
        placement: Option<Placement>,
    },
    /// Connected faces.
    Shell {
        /// Faces.
        faces: Vec<ShapeDef>,
    },
    /// Connected edges.
    Wire {
        /// Edges.
        edges: Vec<ShapeDef>,
    },
    /// Collection of shapes.
    Compound {
        /// Members.
        items: Vec<ShapeDef>,
    },
    /// Another shape definition, moved.
    Moved {
        /// Shape to move.
        shape: Box<ShapeDef>,
        /// Pose applied on top of the shape's own.
        placement: Placement,
    },
}

/// Key/value pair of a [`ObjectDef::Map`], kept in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapEntry {
    /// Key, used as the child's name.
    pub key: String,
    /// Value.
    pub value: ObjectDef,
}

/// Named mate frame of an assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MateDef {
    /// Mate name.
    pub name: String,
    /// Frame relative to the assembly.
    #[serde(default)]
    pub placement: Placement,
}

/// Scene object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectDef {
    /// Number (ignored by the converter).
    Number {
        /// Value.
        value: f64,
    },
    /// Boolean (ignored by the converter).
    Flag {
        /// Value.
        value: bool,
    },
    /// String (ignored by the converter).
    Text {
        /// Value.
        value: String,
    },
    /// A shape with optional label and color.
    Shape {
        /// Geometry.
        shape: ShapeDef,
        /// Label.
        #[serde(default)]
        label: Option<String>,
        /// Color.
        #[serde(default)]
        color: Option<Rgba>,
        /// Shapes this one was derived from, nearest first.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        parents: Vec<ShapeDef>,
    },
    /// Ordered list.
    List {
        /// Elements.
        items: Vec<ObjectDef>,
    },
    /// Keyed map.
    Map {
        /// Entries in order.
        entries: Vec<MapEntry>,
    },
    /// Posed container of parts.
    Assembly {
        /// Assembly name.
        #[serde(default)]
        name: Option<String>,
        /// Pose relative to the parent.
        #[serde(default)]
        placement: Placement,
        /// Shape owned by the assembly.
        #[serde(default)]
        shape: Option<ShapeDef>,
        /// Sub-parts.
        #[serde(default)]
        parts: Vec<ObjectDef>,
        /// Mate frames.
        #[serde(default)]
        mates: Vec<MateDef>,
    },
    /// Bare location, shown as a coordinate system.
    Location {
        /// The pose.
        placement: Placement,
    },
    /// Plane, shown as a coordinate system.
    Plane {
        /// Origin.
        origin: Vec3,
        /// In-plane X direction.
        x_dir: Vec3,
        /// Normal.
        normal: Vec3,
    },
    /// Axis.
    Axis {
        /// Origin.
        origin: Vec3,
        /// Direction.
        direction: Vec3,
    },
    /// Object of a type the converter does not understand.
    Foreign {
        /// Type name reported in diagnostics.
        type_name: String,
    },
}

/// A shapegraph scene document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Format version string (e.g. "0.1").
    pub version: String,
    /// Shape library, keyed by name.
    #[serde(default)]
    pub library: BTreeMap<String, ShapeDef>,
    /// Top-level scene objects.
    #[serde(default)]
    pub scene: Vec<ObjectDef>,
    /// Explicit names, parallel to `scene`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<Option<String>>>,
    /// Explicit colors, parallel to `scene`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<Option<Rgba>>>,
    /// Explicit alphas, parallel to `scene`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alphas: Option<Vec<Option<f64>>>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            library: BTreeMap::new(),
            scene: Vec::new(),
            names: None,
            colors: None,
            alphas: None,
        }
    }
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a document file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Resolve into in-memory kernel objects.
    pub fn resolve(&self) -> Result<ResolvedScene> {
        resolve::resolve(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_document() {
        let doc = Document::new();
        assert_eq!(doc.version, "0.1");
        assert!(doc.library.is_empty());
        assert!(doc.scene.is_empty());
        assert!(doc.names.is_none());
    }

    #[test]
    fn test_serde_tagged_enum() {
        let def = ShapeDef::Cuboid {
            size: Vec3::new(1.0, 2.0, 3.0),
        };
        let json = serde_json::to_string(&def).unwrap();
        assert!(json.contains(r#""type":"Cuboid""#));
        let restored: ShapeDef = serde_json::from_str(&json).unwrap();
        assert_eq!(def, restored);
    }

    #[test]
    fn test_document_json_round_trip() {
        let mut doc = Document::new();
        doc.scene.push(ObjectDef::Shape {
            shape: ShapeDef::Plate {
                width: 2.0,
                height: 1.0,
            },
            label: Some("top".into()),
            color: None,
            parents: vec![ShapeDef::Cuboid {
                size: Vec3::new(2.0, 1.0, 1.0),
            }],
        });
        doc.scene.push(ObjectDef::Shape {
            shape: ShapeDef::Cuboid {
                size: Vec3::new(1.0, 1.0, 1.0),
            },
            label: None,
            color: None,
            parents: Vec::new(),
        });
        let json = doc.to_json().unwrap();
        assert_eq!(json.matches("\"parents\"").count(), 1);
        assert_eq!(Document::from_json(&json).unwrap(), doc);
    }

    #[test]
    fn test_parse_minimal_scene() {
        let json = r##"{
            "version": "0.1",
            "library": { "bolt": { "type": "Cuboid", "size": { "x": 1, "y": 1, "z": 4 } } },
            "scene": [
                { "type": "Shape", "shape": { "type": "Ref", "name": "bolt" }, "color": "#ff0000" },
                { "type": "Number", "value": 3 }
            ],
            "names": ["first", null]
        }"##;
        let doc = Document::from_json(json).unwrap();
        assert_eq!(doc.scene.len(), 2);
        assert_eq!(doc.names.as_ref().unwrap()[0].as_deref(), Some("first"));
        match &doc.scene[0] {
            ObjectDef::Shape { color: Some(c), .. } => assert_eq!(c.r, 1.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_placement_translates_after_rotating() {
        let p = Placement {
            translation: Vec3::new(10.0, 0.0, 0.0),
            rotation: Vec3::new(0.0, 0.0, 90.0),
        };
        let q = p
            .to_transform()
            .apply_point(&shapegraph_math::Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(q.x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(q.y, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rejects_unknown_type() {
        let json = r#"{ "version": "0.1", "scene": [ { "type": "Sphere" } ] }"#;
        assert!(matches!(Document::from_json(json), Err(IrError::Json(_))));
    }
}
