//! The unified scene model both decoders produce.

use nalgebra::{Point3, Vector3};

use crate::format::ModelFormat;
use crate::geometry::{Aabb, Part};

/// Display name of the single body of an STL model
pub const STL_BODY_NAME: &str = "Main Body";

/// An immutable, non-empty sequence of parts with their combined bounds
///
/// Built once per successful load and never mutated afterwards, so it can
/// be moved across threads freely.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    format: ModelFormat,
    parts: Vec<Part>,
    bounds: Aabb,
}

impl Scene {
    /// Assemble a scene; `None` when there are no parts.
    pub fn from_parts(format: ModelFormat, parts: Vec<Part>) -> Option<Self> {
        let bounds = parts
            .iter()
            .map(Part::bounds)
            .reduce(|acc, b| acc.union(&b))?;

        Some(Self {
            format,
            parts,
            bounds,
        })
    }

    /// Format the scene was decoded from
    pub fn format(&self) -> ModelFormat {
        self.format
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn triangle_count(&self) -> usize {
        self.parts.iter().map(Part::triangle_count).sum()
    }

    pub fn vertex_count(&self) -> usize {
        self.parts.iter().map(Part::vertex_count).sum()
    }

    /// Mean of every vertex position across all parts
    pub fn centroid(&self) -> Point3<f32> {
        let sum = self
            .parts
            .iter()
            .flat_map(Part::positions)
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Point3::from(sum / self.vertex_count() as f32)
    }

    /// One display name per part for the hierarchy tree.
    ///
    /// STL models are a single body; OBJ parts use their group name or
    /// `Part N` (1-indexed) when the group was unnamed.
    pub fn hierarchy(&self) -> Vec<String> {
        match self.format {
            ModelFormat::Stl => vec![STL_BODY_NAME.to_string()],
            ModelFormat::Obj => self
                .parts
                .iter()
                .enumerate()
                .map(|(i, part)| match part.explicit_name() {
                    Some(name) => name.to_string(),
                    None => format!("Part {}", i + 1),
                })
                .collect(),
        }
    }
}
