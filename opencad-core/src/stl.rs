/// STL decoder for binary and ASCII files
use nalgebra::Point3;
use nom::{
    bytes::complete::{tag, take},
    character::complete::{multispace0, multispace1, not_line_ending},
    multi::{many0, many1},
    number::complete::{float, le_f32, le_u16, le_u32},
    sequence::{preceded, tuple},
    IResult,
};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::format::ModelFormat;
use crate::geometry::MeshBuilder;
use crate::scene::Scene;

/// Ignored header preceding the triangle count
pub const HEADER_LEN: usize = 80;
/// Header plus the little-endian triangle count
pub const PREAMBLE_LEN: usize = HEADER_LEN + 4;
/// Normal, three vertices and the attribute word
pub const RECORD_LEN: usize = 50;

/// Total length a binary STL declaring `count` triangles must have
pub fn expected_len(count: u32) -> Option<usize> {
    (count as usize)
        .checked_mul(RECORD_LEN)
        .and_then(|body| body.checked_add(PREAMBLE_LEN))
}

/// Decode a binary STL buffer.
///
/// The stored facet normals are ignored; vertices with identical positions
/// are welded and given smoothed normals instead. Bytes past the last
/// declared record are not read.
pub fn decode_stl(data: &[u8]) -> Result<Scene> {
    if data.len() < PREAMBLE_LEN {
        return Err(Error::MalformedStl(format!(
            "buffer is {} bytes, shorter than the {PREAMBLE_LEN} byte header",
            data.len()
        )));
    }

    let (records, count) = triangle_count(data).map_err(|e| Error::MalformedStl(e.to_string()))?;
    let expected = expected_len(count).ok_or_else(|| {
        Error::MalformedStl(format!("triangle count {count} does not fit in memory"))
    })?;

    if data.len() < expected {
        return Err(Error::MalformedStl(format!(
            "declares {count} triangles ({expected} bytes) but buffer is {} bytes",
            data.len()
        )));
    }
    if count == 0 {
        return Err(Error::MalformedStl("declares zero triangles".to_string()));
    }
    if data.len() > expected {
        debug!(trailing = data.len() - expected, "Ignoring bytes after last STL record");
    }

    let mut welder = Welder::with_capacity(count as usize);
    let mut input = &records[..expected - PREAMBLE_LEN];
    for _ in 0..count {
        let (rest, corners) = facet(input).map_err(|e| Error::MalformedStl(e.to_string()))?;
        welder.push_triangle(corners)?;
        input = rest;
    }

    welder.finish()
}

/// Decode an ASCII STL document.
///
/// Every `solid ... endsolid` block is read and merged into one part.
pub fn decode_ascii_stl(input: &str) -> Result<Scene> {
    let (rest, solids) = many1(ascii_solid)(input)
        .map_err(|e| Error::MalformedStl(format!("failed to parse ASCII STL: {e}")))?;

    let rest = rest.trim_start();
    if !rest.is_empty() {
        let line = rest.lines().next().unwrap_or_default();
        return Err(Error::MalformedStl(format!(
            "unexpected content after endsolid: {line:?}"
        )));
    }

    let facets: Vec<_> = solids.into_iter().flatten().collect();
    if facets.is_empty() {
        return Err(Error::MalformedStl("ASCII STL contains no facets".to_string()));
    }

    let mut welder = Welder::with_capacity(facets.len());
    for corners in facets {
        welder.push_triangle(corners)?;
    }
    welder.finish()
}

/// Detect and decode an STL file (binary or ASCII).
///
/// A buffer whose length matches its declared triangle count is always
/// binary, even if the header happens to begin with `solid`.
pub fn parse_stl(data: &[u8]) -> Result<Scene> {
    let exact_binary = data.len() >= PREAMBLE_LEN
        && triangle_count(data)
            .ok()
            .and_then(|(_, count)| expected_len(count))
            == Some(data.len());

    if !exact_binary && data.starts_with(b"solid") {
        if let Ok(text) = std::str::from_utf8(data) {
            match decode_ascii_stl(text) {
                Ok(scene) => return Ok(scene),
                Err(e) => debug!(error = %e, "Not an ASCII STL, decoding as binary"),
            }
        }
    }

    decode_stl(data)
}

fn triangle_count(input: &[u8]) -> IResult<&[u8], u32> {
    preceded(take(HEADER_LEN), le_u32)(input)
}

fn vector3(input: &[u8]) -> IResult<&[u8], Point3<f32>> {
    let (input, (x, y, z)) = tuple((le_f32, le_f32, le_f32))(input)?;
    Ok((input, Point3::new(x, y, z)))
}

fn facet(input: &[u8]) -> IResult<&[u8], [Point3<f32>; 3]> {
    let (input, _stored_normal) = vector3(input)?;
    let (input, (a, b, c)) = tuple((vector3, vector3, vector3))(input)?;
    let (input, _attribute) = le_u16(input)?;
    Ok((input, [a, b, c]))
}

fn ascii_solid(input: &str) -> IResult<&str, Vec<[Point3<f32>; 3]>> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    let (input, _name) = not_line_ending(input)?;
    let (input, facets) = many0(ascii_facet)(input)?;
    let (input, _) = preceded(multispace0, tag("endsolid"))(input)?;
    let (input, _name) = not_line_ending(input)?;
    Ok((input, facets))
}

fn ascii_facet(input: &str) -> IResult<&str, [Point3<f32>; 3]> {
    let (input, _) = preceded(multispace0, tag("facet"))(input)?;
    let (input, _) = preceded(multispace1, tag("normal"))(input)?;
    let (input, _stored_normal) = ascii_vector3(input)?;
    let (input, _) = preceded(multispace0, tag("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag("loop"))(input)?;
    let (input, a) = ascii_vertex(input)?;
    let (input, b) = ascii_vertex(input)?;
    let (input, c) = ascii_vertex(input)?;
    let (input, _) = preceded(multispace0, tag("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag("endfacet"))(input)?;
    Ok((input, [a, b, c]))
}

fn ascii_vertex(input: &str) -> IResult<&str, Point3<f32>> {
    let (input, _) = preceded(multispace0, tag("vertex"))(input)?;
    ascii_vector3(input)
}

fn ascii_vector3(input: &str) -> IResult<&str, Point3<f32>> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, Point3::new(x, y, z)))
}

/// Merges corners that share an exact position into one indexed vertex.
struct Welder {
    builder: MeshBuilder,
    lookup: FxHashMap<[u32; 3], u32>,
}

impl Welder {
    fn with_capacity(triangles: usize) -> Self {
        // Closed meshes have roughly half as many vertices as triangles
        Self {
            builder: MeshBuilder::with_capacity(triangles / 2 + 3, triangles),
            lookup: FxHashMap::default(),
        }
    }

    fn vertex(&mut self, p: Point3<f32>) -> u32 {
        // Adding 0.0 folds -0.0 into 0.0 so both weld together
        let key = [(p.x + 0.0).to_bits(), (p.y + 0.0).to_bits(), (p.z + 0.0).to_bits()];
        let builder = &mut self.builder;
        *self
            .lookup
            .entry(key)
            .or_insert_with(|| builder.push_vertex(p, None))
    }

    fn push_triangle(&mut self, corners: [Point3<f32>; 3]) -> Result<()> {
        if !corners.iter().all(|p| p.coords.iter().all(|c| c.is_finite())) {
            return Err(Error::MalformedStl(format!(
                "triangle {} has a non-finite coordinate",
                self.builder.triangle_count()
            )));
        }
        let [a, b, c] = corners;
        let tri = [self.vertex(a), self.vertex(b), self.vertex(c)];
        self.builder.push_triangle(tri);
        Ok(())
    }

    fn finish(self) -> Result<Scene> {
        debug!(
            triangles = self.builder.triangle_count(),
            vertices = self.lookup.len(),
            "Decoded STL"
        );
        self.builder
            .build(None)
            .and_then(|part| Scene::from_parts(ModelFormat::Stl, vec![part]))
            .ok_or_else(|| Error::MalformedStl("no triangles decoded".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::DEFAULT_PART_NAME;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use proptest::prelude::*;

    fn binary_stl(declared: u32, triangles: &[[[f32; 3]; 3]]) -> Vec<u8> {
        let mut data = vec![0u8; HEADER_LEN];
        data.extend_from_slice(&declared.to_le_bytes());
        for tri in triangles {
            // Stored normal deliberately bogus
            for _ in 0..3 {
                data.extend_from_slice(&f32::NAN.to_le_bytes());
            }
            for vertex in tri {
                for coord in vertex {
                    data.extend_from_slice(&coord.to_le_bytes());
                }
            }
            data.extend_from_slice(&0u16.to_le_bytes());
        }
        data
    }

    const TRI_A: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    const TRI_B: [[f32; 3]; 3] = [[1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];

    #[test]
    fn test_decode_two_triangles() {
        let data = binary_stl(2, &[TRI_A, TRI_B]);
        assert_eq!(data.len(), 84 + 2 * 50);

        let scene = decode_stl(&data).unwrap();
        assert_eq!(scene.format(), ModelFormat::Stl);
        assert_eq!(scene.parts().len(), 1);

        let part = &scene.parts()[0];
        assert_eq!(part.name(), DEFAULT_PART_NAME);
        assert_eq!(part.triangle_count(), 2);
        // Shared edge corners are welded
        assert_eq!(part.vertex_count(), 4);

        // Stored NaN normals are replaced by recomputed ones
        for normal in part.normals() {
            assert_relative_eq!(*normal, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-6);
        }

        let triangles: Vec<_> = part.triangles().collect();
        assert_eq!(triangles[0].vertices[1], Point3::new(1.0, 0.0, 0.0));
        assert_eq!(triangles[1].vertices[1], Point3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_header_too_short() {
        let data = vec![0u8; 83];
        assert!(matches!(decode_stl(&data), Err(Error::MalformedStl(_))));
    }

    #[test]
    fn test_truncated_record_fails() {
        // Declares two triangles but carries only one full record
        let data = binary_stl(2, &[TRI_A]);
        assert!(matches!(decode_stl(&data), Err(Error::MalformedStl(_))));

        let mut data = binary_stl(1, &[TRI_A]);
        data.pop();
        assert!(matches!(decode_stl(&data), Err(Error::MalformedStl(_))));
    }

    #[test]
    fn test_zero_triangles_fails() {
        let data = binary_stl(0, &[]);
        assert!(matches!(decode_stl(&data), Err(Error::MalformedStl(_))));
    }

    #[test]
    fn test_huge_count_fails_without_allocating() {
        let data = binary_stl(u32::MAX, &[TRI_A]);
        assert!(matches!(decode_stl(&data), Err(Error::MalformedStl(_))));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut data = binary_stl(1, &[TRI_A]);
        data.extend_from_slice(&[0xAB; 7]);
        let scene = decode_stl(&data).unwrap();
        assert_eq!(scene.triangle_count(), 1);
    }

    #[test]
    fn test_binary_header_starting_with_solid() {
        let mut data = binary_stl(1, &[TRI_A]);
        data[..5].copy_from_slice(b"solid");
        let scene = parse_stl(&data).unwrap();
        assert_eq!(scene.triangle_count(), 1);
    }

    #[test]
    fn test_parse_ascii() {
        let text = "solid cube_corner
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 1 0
    endloop
  endfacet
  facet normal 0 0 1
    outer loop
      vertex 1 0 0
      vertex 1 1 0
      vertex 0 1 0
    endloop
  endfacet
endsolid cube_corner
";
        let scene = parse_stl(text.as_bytes()).unwrap();
        assert_eq!(scene.triangle_count(), 2);
        assert_eq!(scene.parts()[0].vertex_count(), 4);
        assert_eq!(scene.bounds().max, Point3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_empty_ascii_solid_fails() {
        assert!(matches!(
            parse_stl(b"solid empty\nendsolid empty\n"),
            Err(Error::MalformedStl(_))
        ));
    }

    #[test]
    fn test_parse_ascii_multiple_solids() {
        let text = "solid first
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 1 0
    endloop
  endfacet
endsolid first
solid second
  facet normal 0 0 1
    outer loop
      vertex 0 0 2
      vertex 1 0 2
      vertex 0 1 2
    endloop
  endfacet
endsolid second
";
        let scene = parse_stl(text.as_bytes()).unwrap();
        assert_eq!(scene.parts().len(), 1);
        assert_eq!(scene.triangle_count(), 2);
        assert_eq!(scene.bounds().max, Point3::new(1.0, 1.0, 2.0));
    }

    #[test]
    fn test_ascii_trailing_garbage_fails() {
        let text = "solid a\nfacet normal 0 0 1\nouter loop\nvertex 0 0 0\nvertex 1 0 0\n\
                    vertex 0 1 0\nendloop\nendfacet\nendsolid a\ngarbage\n";
        assert!(matches!(decode_ascii_stl(text), Err(Error::MalformedStl(_))));
    }

    #[test]
    fn test_non_finite_coordinates_rejected() {
        let nan = [[f32::NAN, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let data = binary_stl(2, &[TRI_A, nan]);
        assert!(matches!(decode_stl(&data), Err(Error::MalformedStl(_))));

        let inf = [[0.0, 0.0, 0.0], [f32::INFINITY, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let data = binary_stl(1, &[inf]);
        assert!(matches!(parse_stl(&data), Err(Error::MalformedStl(_))));

        let text = "solid a\nfacet normal 0 0 1\nouter loop\nvertex nan 0 0\nvertex 1 0 0\n\
                    vertex 0 1 0\nendloop\nendfacet\nendsolid a\n";
        assert!(matches!(decode_ascii_stl(text), Err(Error::MalformedStl(_))));
    }

    proptest! {
        #[test]
        fn prop_triangle_count_matches_header(
            coords in prop::collection::vec(prop::array::uniform9(-1000.0f32..1000.0), 1..40)
        ) {
            let triangles: Vec<[[f32; 3]; 3]> = coords
                .iter()
                .map(|c| [[c[0], c[1], c[2]], [c[3], c[4], c[5]], [c[6], c[7], c[8]]])
                .collect();
            let data = binary_stl(triangles.len() as u32, &triangles);
            prop_assert_eq!(Some(data.len()), expected_len(triangles.len() as u32));

            let scene = decode_stl(&data).unwrap();
            prop_assert_eq!(scene.triangle_count(), triangles.len());

            let mut short = data.clone();
            short.truncate(data.len() - 1);
            prop_assert!(matches!(decode_stl(&short), Err(Error::MalformedStl(_))));
        }
    }
}
