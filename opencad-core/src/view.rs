//! View modifiers and the render descriptors derived from them.

use nalgebra::{Point3, Vector3};

use crate::config::ViewConfig;
use crate::geometry::{Part, Triangle};
use crate::scene::Scene;

/// A clipping plane; points with `normal·p + offset < 0` are cut away
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClipPlane {
    pub normal: Vector3<f32>,
    pub offset: f32,
}

impl ClipPlane {
    pub const fn new(normal: Vector3<f32>, offset: f32) -> Self {
        Self { normal, offset }
    }

    pub fn signed_distance(&self, point: &Point3<f32>) -> f32 {
        self.normal.dot(&point.coords) + self.offset
    }

    pub fn keeps(&self, point: &Point3<f32>) -> bool {
        self.signed_distance(point) >= 0.0
    }
}

/// UI-controlled view flags
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewModifiers {
    pub wireframe: bool,
    pub sectioning: bool,
    pub exploded: bool,
    pub explode_factor: f32,
}

impl ViewModifiers {
    pub fn with_wireframe(self, wireframe: bool) -> Self {
        Self { wireframe, ..self }
    }

    pub fn with_sectioning(self, sectioning: bool) -> Self {
        Self { sectioning, ..self }
    }

    pub fn with_exploded(self, exploded: bool) -> Self {
        Self { exploded, ..self }
    }

    /// Clamp into `[0, max]`; NaN leaves the factor unchanged.
    pub fn with_explode_factor(self, factor: f32, max: f32) -> Self {
        if factor.is_nan() {
            return self;
        }
        Self {
            explode_factor: factor.clamp(0.0, max),
            ..self
        }
    }
}

/// Where a triangle ends up relative to the active clip planes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriangleClip {
    /// Entirely on the kept side of every plane
    Kept,
    /// Entirely behind at least one plane
    Clipped,
    /// Partly cut by a plane
    Straddling,
}

/// Render state for one part
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderDescriptor {
    /// Index into `Scene::parts`
    pub part: usize,
    pub wireframe: bool,
    /// Empty unless sectioning is on
    pub clip_planes: Vec<ClipPlane>,
    /// Zero unless exploded
    pub translation: Vector3<f32>,
}

impl RenderDescriptor {
    /// Classify a triangle of this part after applying the translation.
    pub fn classify(&self, triangle: &Triangle) -> TriangleClip {
        let moved = triangle.vertices.map(|v| v + self.translation);
        let mut straddling = false;

        for plane in &self.clip_planes {
            let kept = moved.iter().filter(|v| plane.keeps(v)).count();
            match kept {
                0 => return TriangleClip::Clipped,
                3 => {}
                _ => straddling = true,
            }
        }

        if straddling {
            TriangleClip::Straddling
        } else {
            TriangleClip::Kept
        }
    }
}

/// Unit direction a part moves in when exploded.
///
/// Points from the scene centroid to the part centroid, or along
/// `(1,1,1)` when the two coincide within `epsilon` or the offset is not
/// finite.
pub fn explode_direction(part: &Part, scene_centroid: &Point3<f32>, epsilon: f32) -> Vector3<f32> {
    let offset = part.centroid() - scene_centroid;
    let length = offset.norm();
    if length.is_finite() && length > epsilon {
        offset / length
    } else {
        Vector3::new(1.0, 1.0, 1.0).normalize()
    }
}

/// Derive one descriptor per part. Pure: equal inputs give bit-identical
/// output.
pub fn compute_render_descriptors(
    scene: &Scene,
    modifiers: &ViewModifiers,
    config: &ViewConfig,
) -> Vec<RenderDescriptor> {
    let clip_planes = if modifiers.sectioning {
        config.section_planes.clone()
    } else {
        Vec::new()
    };
    let scene_centroid = scene.centroid();

    scene
        .parts()
        .iter()
        .enumerate()
        .map(|(index, part)| RenderDescriptor {
            part: index,
            wireframe: modifiers.wireframe,
            clip_planes: clip_planes.clone(),
            translation: if modifiers.exploded {
                explode_direction(part, &scene_centroid, config.degenerate_epsilon)
                    * modifiers.explode_factor
            } else {
                Vector3::zeros()
            },
        })
        .collect()
}
