//! Model format tags and the load entry point.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::scene::Scene;
use crate::{obj, stl};

/// Supported model file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ModelFormat {
    Stl,
    Obj,
}

impl ModelFormat {
    /// Lowercase tag, also used as the file extension
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFormat::Stl => "stl",
            ModelFormat::Obj => "obj",
        }
    }

    /// Format from a file name's extension, case-insensitive
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;
        ext.parse()
    }
}

impl FromStr for ModelFormat {
    type Err = Error;

    /// Parse a lowercase format tag
    fn from_str(tag: &str) -> Result<Self> {
        match tag {
            "stl" => Ok(ModelFormat::Stl),
            "obj" => Ok(ModelFormat::Obj),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw bytes of a model file together with what is needed to reload it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSource {
    pub data: Vec<u8>,
    pub format: ModelFormat,
    /// File name shown to the user
    pub name: String,
}

impl ModelSource {
    pub fn new(data: Vec<u8>, format: ModelFormat, name: impl Into<String>) -> Self {
        Self {
            data,
            format,
            name: name.into(),
        }
    }

    /// Decode the bytes into a scene.
    pub fn decode(&self) -> Result<Scene> {
        load_scene(&self.data, self.format)
    }
}

/// Decode raw file bytes into a scene.
#[instrument(skip(data), fields(len = data.len()))]
pub fn load_scene(data: &[u8], format: ModelFormat) -> Result<Scene> {
    let scene = match format {
        ModelFormat::Stl => stl::parse_stl(data)?,
        ModelFormat::Obj => obj::parse_obj(&String::from_utf8_lossy(data))?,
    };

    debug!(
        parts = scene.parts().len(),
        triangles = scene.triangle_count(),
        vertices = scene.vertex_count(),
        "Scene loaded"
    );
    Ok(scene)
}

/// Decode raw file bytes given a format tag such as `"stl"`.
pub fn load(data: &[u8], tag: &str) -> Result<Scene> {
    load_scene(data, tag.parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!("stl".parse::<ModelFormat>().unwrap(), ModelFormat::Stl);
        assert_eq!("obj".parse::<ModelFormat>().unwrap(), ModelFormat::Obj);
        assert!(matches!(
            "step".parse::<ModelFormat>(),
            Err(Error::UnsupportedFormat(tag)) if tag == "step"
        ));
        // Tags are lowercase by contract
        assert!("STL".parse::<ModelFormat>().is_err());
    }

    #[test]
    fn test_from_path() {
        assert_eq!(ModelFormat::from_path("models/Gear.STL").unwrap(), ModelFormat::Stl);
        assert_eq!(ModelFormat::from_path("car.obj").unwrap(), ModelFormat::Obj);
        assert!(matches!(ModelFormat::from_path("part.iges"), Err(Error::UnsupportedFormat(_))));
        assert!(matches!(ModelFormat::from_path("README"), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_load_rejects_unknown_tag() {
        assert!(matches!(load(b"v 0 0 0", "ply"), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_load_obj_text() {
        let scene = load(b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n", "obj").unwrap();
        assert_eq!(scene.format(), ModelFormat::Obj);
        assert_eq!(scene.triangle_count(), 1);
    }
}
