/// Geometry primitives shared by the STL and OBJ decoders
use nalgebra::{Point3, Vector3};

/// Name reported for parts that were never given one
pub const DEFAULT_PART_NAME: &str = "<default>";

/// A triangle with its face normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub vertices: [Point3<f32>; 3],
    pub normal: Vector3<f32>,
}

impl Triangle {
    pub fn new(v0: Point3<f32>, v1: Point3<f32>, v2: Point3<f32>) -> Self {
        Self {
            vertices: [v0, v1, v2],
            normal: face_normal(&v0, &v1, &v2),
        }
    }
}

/// Unnormalized face normal; its length is twice the triangle area.
pub fn area_normal(a: &Point3<f32>, b: &Point3<f32>, c: &Point3<f32>) -> Vector3<f32> {
    (b - a).cross(&(c - a))
}

/// Unit face normal, or zero for a degenerate triangle.
pub fn face_normal(a: &Point3<f32>, b: &Point3<f32>, c: &Point3<f32>) -> Vector3<f32> {
    area_normal(a, b, c)
        .try_normalize(0.0)
        .unwrap_or_else(Vector3::zeros)
}

/// Average the area-weighted face normals around every vertex.
///
/// Vertices only touched by degenerate triangles get a zero normal.
pub fn smooth_vertex_normals(positions: &[Point3<f32>], indices: &[u32]) -> Vec<Vector3<f32>> {
    let mut sums = vec![Vector3::zeros(); positions.len()];

    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let n = area_normal(&positions[a], &positions[b], &positions[c]);
        sums[a] += n;
        sums[b] += n;
        sums[c] += n;
    }

    sums.into_iter()
        .map(|n| n.try_normalize(0.0).unwrap_or_else(Vector3::zeros))
        .collect()
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    /// Fold min/max over a point set; `None` when the set is empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f32>>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;
        Some(points.fold(Self { min: first, max: first }, |acc, p| Self {
            min: acc.min.inf(p),
            max: acc.max.sup(p),
        }))
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }
}

/// A named sub-mesh held as indexed vertex/normal/index buffers
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    name: Option<String>,
    positions: Vec<Point3<f32>>,
    normals: Vec<Vector3<f32>>,
    indices: Vec<u32>,
    bounds: Aabb,
}

impl Part {
    /// Name as displayed by diagnostics, `<default>` when unnamed
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_PART_NAME)
    }

    /// Name given by the source file, if any
    pub fn explicit_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn positions(&self) -> &[Point3<f32>] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vector3<f32>] {
        &self.normals
    }

    /// Triangle list, three indices per triangle
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Triangles in source order
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.indices.chunks_exact(3).map(move |tri| {
            Triangle::new(
                self.positions[tri[0] as usize],
                self.positions[tri[1] as usize],
                self.positions[tri[2] as usize],
            )
        })
    }

    /// Arithmetic mean of the vertex positions
    pub fn centroid(&self) -> Point3<f32> {
        let sum = self
            .positions
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Point3::from(sum / self.positions.len() as f32)
    }
}

/// Accumulates indexed geometry for one part.
///
/// Vertices pushed without a normal receive the smoothed normal of the
/// triangles around them when the part is built.
#[derive(Debug, Default)]
pub(crate) struct MeshBuilder {
    positions: Vec<Point3<f32>>,
    normals: Vec<Option<Vector3<f32>>>,
    indices: Vec<u32>,
}

impl MeshBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_capacity(vertices: usize, triangles: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertices),
            normals: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(triangles * 3),
        }
    }

    pub(crate) fn push_vertex(&mut self, position: Point3<f32>, normal: Option<Vector3<f32>>) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position);
        self.normals.push(normal);
        index
    }

    pub(crate) fn push_triangle(&mut self, triangle: [u32; 3]) {
        self.indices.extend_from_slice(&triangle);
    }

    pub(crate) fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Finish the part; `None` when no triangle was pushed.
    pub(crate) fn build(self, name: Option<String>) -> Option<Part> {
        if self.indices.is_empty() {
            return None;
        }

        let normals = if self.normals.iter().all(Option::is_some) {
            self.normals.into_iter().flatten().collect()
        } else {
            let smoothed = smooth_vertex_normals(&self.positions, &self.indices);
            self.normals
                .into_iter()
                .zip(smoothed)
                .map(|(explicit, smooth)| explicit.unwrap_or(smooth))
                .collect()
        };

        let bounds = Aabb::from_points(&self.positions)?;

        Some(Part {
            name: name.filter(|n| !n.is_empty()),
            positions: self.positions,
            normals,
            indices: self.indices,
            bounds,
        })
    }
}
