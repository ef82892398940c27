//! Resolution of documents into in-memory kernel objects.

use std::collections::HashMap;

use shapegraph_kernel::{AxisFrame, CoordFrame, Rgba};
use shapegraph_kernel_memory::{MemoryAssembly, MemoryObject, MemoryShape, ShapeObject};

use crate::{Document, IrError, ObjectDef, Result, ShapeDef, Vec3};

/// A resolved document: converter input plus the per-object overrides.
#[derive(Debug, Clone, Default)]
pub struct ResolvedScene {
    /// Top-level objects.
    pub objects: Vec<MemoryObject>,
    /// Explicit names.
    pub names: Option<Vec<Option<String>>>,
    /// Explicit colors.
    pub colors: Option<Vec<Option<Rgba>>>,
    /// Explicit alphas.
    pub alphas: Option<Vec<Option<f64>>>,
}

pub(crate) fn resolve(doc: &Document) -> Result<ResolvedScene> {
    let mut resolver = Resolver {
        doc,
        memo: HashMap::new(),
        visiting: Vec::new(),
    };
    let objects = doc
        .scene
        .iter()
        .map(|obj| resolver.object(obj))
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!(
        objects = objects.len(),
        library = resolver.memo.len(),
        "resolved scene document"
    );
    Ok(ResolvedScene {
        objects,
        names: doc.names.clone(),
        colors: doc.colors.clone(),
        alphas: doc.alphas.clone(),
    })
}

struct Resolver<'a> {
    doc: &'a Document,
    memo: HashMap<String, MemoryShape>,
    visiting: Vec<String>,
}

fn check_extent(what: &'static str, values: &[f64]) -> Result<()> {
    match values.iter().find(|v| !v.is_finite() || **v < 0.0) {
        Some(v) => Err(IrError::InvalidDimensions {
            what,
            reason: format!("extent {v} must be finite and non-negative"),
        }),
        None => Ok(()),
    }
}

impl Resolver<'_> {
    fn library_shape(&mut self, name: &str) -> Result<MemoryShape> {
        if let Some(shape) = self.memo.get(name) {
            return Ok(shape.clone());
        }
        if self.visiting.iter().any(|n| n == name) {
            return Err(IrError::CyclicReference(name.to_string()));
        }
        let doc = self.doc;
        let def = doc
            .library
            .get(name)
            .ok_or_else(|| IrError::UnknownShape(name.to_string()))?;
        self.visiting.push(name.to_string());
        let shape = self.shape(def);
        self.visiting.pop();
        let shape = shape?;
        self.memo.insert(name.to_string(), shape.clone());
        Ok(shape)
    }

    fn shapes(&mut self, defs: &[ShapeDef]) -> Result<Vec<MemoryShape>> {
        defs.iter().map(|d| self.shape(d)).collect()
    }

    fn shape(&mut self, def: &ShapeDef) -> Result<MemoryShape> {
        Ok(match def {
            ShapeDef::Cuboid { size } => {
                check_extent("cuboid", &[size.x, size.y, size.z])?;
                MemoryShape::cuboid(size.x, size.y, size.z)
            }
            ShapeDef::Plate { width, height } => {
                check_extent("plate", &[*width, *height])?;
                MemoryShape::plate(*width, *height)
            }
            ShapeDef::Segment { start, end } => MemoryShape::segment(start.point(), end.point()),
            ShapeDef::Point { at } => MemoryShape::point(at.point()),
            ShapeDef::Faulty { reason } => MemoryShape::faulty(reason.clone()),
            ShapeDef::Ref { name, placement } => {
                let shape = self.library_shape(name)?;
                match placement {
                    Some(p) => shape.moved(&p.to_transform()),
                    None => shape,
                }
            }
            ShapeDef::Shell { faces } => MemoryShape::shell(self.shapes(faces)?),
            ShapeDef::Wire { edges } => MemoryShape::wire(self.shapes(edges)?),
            ShapeDef::Compound { items } => MemoryShape::compound(self.shapes(items)?),
            ShapeDef::Moved { shape, placement } => {
                self.shape(shape)?.moved(&placement.to_transform())
            }
        })
    }

    fn object(&mut self, def: &ObjectDef) -> Result<MemoryObject> {
        Ok(match def {
            ObjectDef::Number { value } => MemoryObject::Number(*value),
            ObjectDef::Flag { value } => MemoryObject::Flag(*value),
            ObjectDef::Text { value } => MemoryObject::Text(value.clone()),
            ObjectDef::Shape {
                shape,
                label,
                color,
                parents,
            } => MemoryObject::Shape(ShapeObject {
                shape: self.shape(shape)?,
                label: label.clone(),
                color: *color,
                parents: parents
                    .iter()
                    .map(|p| self.shape(p))
                    .collect::<Result<Vec<_>>>()?,
            }),
            ObjectDef::List { items } => MemoryObject::List(
                items
                    .iter()
                    .map(|o| self.object(o))
                    .collect::<Result<Vec<_>>>()?,
            ),
            ObjectDef::Map { entries } => MemoryObject::Map(
                entries
                    .iter()
                    .map(|e| Ok((e.key.clone(), self.object(&e.value)?)))
                    .collect::<Result<Vec<_>>>()?,
            ),
            ObjectDef::Assembly {
                name,
                placement,
                shape,
                parts,
                mates,
            } => MemoryObject::Assembly(MemoryAssembly {
                name: name.clone(),
                location: placement.to_transform(),
                shape: shape.as_ref().map(|s| self.shape(s)).transpose()?,
                parts: parts
                    .iter()
                    .map(|o| self.object(o))
                    .collect::<Result<Vec<_>>>()?,
                mates: mates
                    .iter()
                    .map(|m| {
                        (
                            m.name.clone(),
                            CoordFrame::from_transform(&m.placement.to_transform()),
                        )
                    })
                    .collect(),
            }),
            ObjectDef::Location { placement } => MemoryObject::Location(placement.to_transform()),
            ObjectDef::Plane {
                origin,
                x_dir,
                normal,
            } => MemoryObject::Plane(CoordFrame {
                origin: origin.point(),
                x_dir: unit(x_dir, "plane x direction")?,
                z_dir: unit(normal, "plane normal")?,
            }),
            ObjectDef::Axis { origin, direction } => MemoryObject::Axis(AxisFrame {
                origin: origin.point(),
                z_dir: unit(direction, "axis direction")?,
            }),
            ObjectDef::Foreign { type_name } => MemoryObject::Foreign(type_name.clone()),
        })
    }
}

fn unit(v: &Vec3, what: &'static str) -> Result<shapegraph_math::Vec3> {
    v.vector()
        .try_normalize(1e-12)
        .ok_or_else(|| IrError::InvalidDimensions {
            what,
            reason: "zero-length direction".to_string(),
        })
}
