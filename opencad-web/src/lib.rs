//! OpenCAD Web - WebAssembly bindings for the viewer engine
//!
//! Exposes a `WebViewer` class that loads STL/OBJ bytes, tracks the view
//! modifiers and hands per-part buffers plus render descriptors to a
//! JavaScript renderer.

use js_sys::{Float32Array, Uint32Array};
use opencad_core::{EngineConfig, Part, ViewerSession};
use wasm_bindgen::prelude::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get the version of the bindings
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Viewer session exposed to JavaScript
#[wasm_bindgen]
pub struct WebViewer {
    session: ViewerSession,
}

impl Default for WebViewer {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl WebViewer {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WebViewer {
        WebViewer {
            session: ViewerSession::new(EngineConfig::default()),
        }
    }

    /// Load model bytes tagged `"stl"` or `"obj"`
    pub fn load(&mut self, bytes: &[u8], ext: &str, name: &str) -> Result<(), JsError> {
        let scene = self.session.load_bytes(bytes.to_vec(), ext, name)?;
        log(&format!(
            "Loaded {name}: {} parts, {} triangles",
            scene.parts().len(),
            scene.triangle_count()
        ));
        Ok(())
    }

    /// Load the model carried by a share token (the URL fragment)
    #[wasm_bindgen(js_name = loadShareToken)]
    pub fn load_share_token(&mut self, token: &str) -> Result<(), JsError> {
        self.session.load_share_token(token)?;
        Ok(())
    }

    /// Drop the current model
    pub fn unload(&mut self) {
        self.session.unload();
    }

    #[wasm_bindgen(getter, js_name = isLoaded)]
    pub fn is_loaded(&self) -> bool {
        self.session.is_loaded()
    }

    /// Bumped whenever the render output may have changed
    #[wasm_bindgen(getter)]
    pub fn revision(&self) -> f64 {
        self.session.revision() as f64
    }

    /// File name of the loaded model
    #[wasm_bindgen(getter, js_name = fileName)]
    pub fn file_name(&self) -> Option<String> {
        self.session.source().map(|source| source.name.clone())
    }

    #[wasm_bindgen(js_name = setWireframe)]
    pub fn set_wireframe(&mut self, wireframe: bool) -> bool {
        self.session.set_wireframe(wireframe)
    }

    #[wasm_bindgen(js_name = setSectioning)]
    pub fn set_sectioning(&mut self, sectioning: bool) -> bool {
        self.session.set_sectioning(sectioning)
    }

    #[wasm_bindgen(js_name = setExploded)]
    pub fn set_exploded(&mut self, exploded: bool) -> bool {
        self.session.set_exploded(exploded)
    }

    #[wasm_bindgen(js_name = setExplodeFactor)]
    pub fn set_explode_factor(&mut self, factor: f32) -> bool {
        self.session.set_explode_factor(factor)
    }

    #[wasm_bindgen(js_name = toggleWireframe)]
    pub fn toggle_wireframe(&mut self) -> bool {
        self.session.toggle_wireframe()
    }

    #[wasm_bindgen(js_name = toggleSectioning)]
    pub fn toggle_sectioning(&mut self) -> bool {
        self.session.toggle_sectioning()
    }

    #[wasm_bindgen(js_name = toggleExploded)]
    pub fn toggle_exploded(&mut self) -> bool {
        self.session.toggle_exploded()
    }

    /// Current view modifiers as a plain object
    pub fn modifiers(&self) -> Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(&self.session.modifiers())?)
    }

    /// Display names for the hierarchy tree
    pub fn hierarchy(&self) -> Vec<String> {
        self.session.hierarchy()
    }

    #[wasm_bindgen(getter, js_name = partCount)]
    pub fn part_count(&self) -> usize {
        self.session.scene().map_or(0, |scene| scene.parts().len())
    }

    /// Part vertex positions as a flat `[x, y, z, ...]` array
    #[wasm_bindgen(js_name = partPositions)]
    pub fn part_positions(&self, index: usize) -> Option<Float32Array> {
        self.part(index)
            .map(|part| Float32Array::from(&flat_positions(part)[..]))
    }

    /// Part vertex normals as a flat `[x, y, z, ...]` array
    #[wasm_bindgen(js_name = partNormals)]
    pub fn part_normals(&self, index: usize) -> Option<Float32Array> {
        self.part(index)
            .map(|part| Float32Array::from(&flat_normals(part)[..]))
    }

    /// Part triangle indices, three per triangle
    #[wasm_bindgen(js_name = partIndices)]
    pub fn part_indices(&self, index: usize) -> Option<Uint32Array> {
        self.part(index).map(|part| Uint32Array::from(part.indices()))
    }

    /// Scene bounds as `[minX, minY, minZ, maxX, maxY, maxZ]`
    pub fn bounds(&self) -> Option<Vec<f32>> {
        self.session.scene().map(|scene| {
            let bounds = scene.bounds();
            vec![
                bounds.min.x,
                bounds.min.y,
                bounds.min.z,
                bounds.max.x,
                bounds.max.y,
                bounds.max.z,
            ]
        })
    }

    /// One descriptor per part: `{ part, wireframe, clip_planes, translation }`
    #[wasm_bindgen(js_name = renderDescriptors)]
    pub fn render_descriptors(&self) -> Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(
            &self.session.render_descriptors(),
        )?)
    }

    /// Share token for the loaded model, `undefined` when nothing is loaded
    #[wasm_bindgen(js_name = shareToken)]
    pub fn share_token(&self) -> Result<Option<String>, JsError> {
        Ok(self.session.share_token().transpose()?)
    }
}

impl WebViewer {
    fn part(&self, index: usize) -> Option<&Part> {
        self.session.scene()?.parts().get(index)
    }
}

fn flat_positions(part: &Part) -> Vec<f32> {
    part.positions()
        .iter()
        .flat_map(|p| [p.x, p.y, p.z])
        .collect()
}

fn flat_normals(part: &Part) -> Vec<f32> {
    part.normals()
        .iter()
        .flat_map(|n| [n.x, n.y, n.z])
        .collect()
}

fn log(message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::log_1(&JsValue::from_str(message));
    #[cfg(not(target_arch = "wasm32"))]
    let _ = message;
}
