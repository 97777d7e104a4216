//! Wavefront OBJ parser.
//!
//! Parsing is line oriented and forgiving: directives other than `v`, `vn`,
//! `o`, `g` and `f` are skipped, so files carrying materials, texture
//! coordinates or smoothing groups load fine. Each `o`/`g` starts a new
//! part; faces seen before any of them go to an unnamed default part.
//!
//! Polygons are fan-triangulated around their first vertex. This is exact
//! for convex faces only; concave polygons can produce overlapping
//! triangles, which is an accepted limitation.

use nalgebra::{Point3, Vector3};
use nom::{
    character::complete::{char, i64 as integer, space0, space1},
    combinator::opt,
    number::complete::float,
    sequence::preceded,
    IResult,
};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::format::ModelFormat;
use crate::geometry::{MeshBuilder, Part};
use crate::scene::Scene;

/// Parse an OBJ document into a scene with one part per group.
pub fn parse_obj(input: &str) -> Result<Scene> {
    let mut parser = ObjParser::default();

    for (line_no, line) in logical_lines(input) {
        parser.parse_line(line_no, &line)?;
    }

    parser.finish()
}

/// Yields `(1-based line number, content)` with comments stripped and
/// backslash continuations joined.
fn logical_lines(input: &str) -> impl Iterator<Item = (usize, String)> + '_ {
    let mut lines = input.lines().enumerate();
    std::iter::from_fn(move || {
        let (index, first) = lines.next()?;
        let mut line = strip_comment(first).to_string();
        while line.ends_with('\\') {
            line.pop();
            match lines.next() {
                Some((_, next)) => {
                    line.push(' ');
                    line.push_str(strip_comment(next));
                }
                None => break,
            }
        }
        Some((index + 1, line))
    })
}

fn strip_comment(line: &str) -> &str {
    let line = line.split('#').next().unwrap_or_default();
    line.trim_end_matches('\r').trim_end()
}

/// Vertex reference inside a face: position and optional normal, 0-indexed
type Corner = (usize, Option<usize>);

struct PartInProgress {
    name: Option<String>,
    builder: MeshBuilder,
    lookup: FxHashMap<Corner, u32>,
}

impl PartInProgress {
    fn new(name: Option<String>) -> Self {
        Self {
            name,
            builder: MeshBuilder::new(),
            lookup: FxHashMap::default(),
        }
    }
}

#[derive(Default)]
struct ObjParser {
    positions: Vec<Point3<f32>>,
    normals: Vec<Vector3<f32>>,
    parts: Vec<Part>,
    current: Option<PartInProgress>,
    skipped_faces: usize,
}

impl ObjParser {
    fn parse_line(&mut self, line_no: usize, line: &str) -> Result<()> {
        let line = line.trim_start();
        let (keyword, rest) = match line.split_once(|c: char| c.is_whitespace()) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (line, ""),
        };

        match keyword {
            "v" => {
                let p = parse_vector3(rest).map_err(|e| Error::obj_at(line_no, e))?;
                self.positions.push(Point3::from(p));
            }
            "vn" => {
                let n = parse_vector3(rest).map_err(|e| Error::obj_at(line_no, e))?;
                self.normals.push(n);
            }
            "o" | "g" => {
                self.finish_part();
                let name = (!rest.is_empty()).then(|| rest.to_string());
                self.current = Some(PartInProgress::new(name));
            }
            "f" => self.parse_face(line_no, rest)?,
            _ => {}
        }

        Ok(())
    }

    fn parse_face(&mut self, line_no: usize, rest: &str) -> Result<()> {
        let corners = rest
            .split_whitespace()
            .map(|token| self.resolve_corner(token).map_err(|e| Error::obj_at(line_no, e)))
            .collect::<Result<Vec<Corner>>>()?;

        if corners.len() < 3 {
            warn!(line = line_no, corners = corners.len(), "Skipping face with fewer than 3 vertices");
            self.skipped_faces += 1;
            return Ok(());
        }

        let part = self.current.get_or_insert_with(|| PartInProgress::new(None));
        let indices: Vec<u32> = corners
            .iter()
            .map(|&corner| {
                let (position, normal) = corner;
                let builder = &mut part.builder;
                let positions = &self.positions;
                let normals = &self.normals;
                *part.lookup.entry(corner).or_insert_with(|| {
                    builder.push_vertex(positions[position], normal.map(|n| normals[n]))
                })
            })
            .collect();

        for i in 1..indices.len() - 1 {
            part.builder.push_triangle([indices[0], indices[i], indices[i + 1]]);
        }

        Ok(())
    }

    /// Resolve a `v`, `v/vt`, `v//vn` or `v/vt/vn` token against the lists
    /// read so far.
    fn resolve_corner(&self, token: &str) -> std::result::Result<Corner, String> {
        let (rest, (position, normal)) =
            face_token(token).map_err(|_| format!("unparsable face vertex {token:?}"))?;
        if !rest.is_empty() {
            return Err(format!("unparsable face vertex {token:?}"));
        }

        let position = resolve_index(position, self.positions.len(), "vertex")?;
        let normal = normal
            .map(|n| resolve_index(n, self.normals.len(), "normal"))
            .transpose()?;
        Ok((position, normal))
    }

    fn finish_part(&mut self) {
        if let Some(part) = self.current.take() {
            let name = part.name.clone();
            match part.builder.build(part.name) {
                Some(built) => self.parts.push(built),
                None => debug!(name = ?name, "Dropping OBJ group without faces"),
            }
        }
    }

    fn finish(mut self) -> Result<Scene> {
        self.finish_part();

        debug!(
            parts = self.parts.len(),
            positions = self.positions.len(),
            normals = self.normals.len(),
            skipped_faces = self.skipped_faces,
            "Parsed OBJ"
        );

        Scene::from_parts(ModelFormat::Obj, self.parts)
            .ok_or_else(|| Error::MalformedObj("no faces found".to_string()))
    }
}

/// Map a 1-based (or negative, end-relative) OBJ index onto `0..len`.
fn resolve_index(raw: i64, len: usize, kind: &str) -> std::result::Result<usize, String> {
    let resolved = match raw {
        0 => None,
        i if i > 0 => usize::try_from(i - 1).ok().filter(|&i| i < len),
        i => i
            .checked_neg()
            .and_then(|back| usize::try_from(back).ok())
            .and_then(|back| len.checked_sub(back)),
    };
    resolved.ok_or_else(|| format!("{kind} index {raw} out of range ({len} defined)"))
}

fn parse_vector3(input: &str) -> std::result::Result<Vector3<f32>, String> {
    let (_, v) = vector3(input).map_err(|_| format!("unparsable coordinates {input:?}"))?;
    if !v.iter().all(|c| c.is_finite()) {
        return Err(format!("non-finite coordinates {input:?}"));
    }
    Ok(v)
}

/// Three whitespace separated floats; trailing values such as `w` or vertex
/// colors are ignored.
fn vector3(input: &str) -> IResult<&str, Vector3<f32>> {
    let (input, x) = preceded(space0, float)(input)?;
    let (input, y) = preceded(space1, float)(input)?;
    let (input, z) = preceded(space1, float)(input)?;
    Ok((input, Vector3::new(x, y, z)))
}

fn face_token(input: &str) -> IResult<&str, (i64, Option<i64>)> {
    let (input, position) = integer(input)?;
    let (input, _texture) = opt(preceded(char('/'), opt(integer)))(input)?;
    let (input, normal) = opt(preceded(char('/'), integer))(input)?;
    Ok((input, (position, normal)))
}
